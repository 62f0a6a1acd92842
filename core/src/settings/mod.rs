//! Engine configuration.
//!
//! Everything the original system kept as process-wide state is an explicit
//! value here, passed into compilation and evaluation.

/// Syntax dialect accepted by the parser.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Syntax {
    /// Accept engine extensions silently.
    #[default]
    Enhanced,
    /// Warn when an extension operation is used.
    Compatible,
}

/// A wall-clock instant, broken down in the Gregorian calendar.
///
/// Supplied by the host so that `$DATE`, `$JDATE` and `$TIME` are
/// deterministic under test.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockTime {
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub hour: i32,
    pub minute: i32,
    pub second: i32,
}

impl Default for ClockTime {
    fn default() -> Self {
        Self {
            year: 2000,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }
}

/// Explicit engine configuration.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Default number of fuzz bits for `RND` and `TRUNC` when the caller
    /// does not pass one explicitly.
    pub fuzzbits: u32,
    /// Syntax dialect; controls extension warnings.
    pub syntax: Syntax,
    /// True while temporary transformations are in effect; operations
    /// marked permanent-only are then rejected.
    pub in_temporary_transformations: bool,
    /// The "current" time used by the `$DATE`/`$JDATE`/`$TIME` system
    /// variables.
    pub now: ClockTime,
    /// Terminal page length, reported by `$LENGTH`.
    pub view_length: i32,
    /// Terminal page width, reported by `$WIDTH`.
    pub view_width: i32,
    /// Seed for the random-variate operations.
    pub rng_seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fuzzbits: 6,
            syntax: Syntax::default(),
            in_temporary_transformations: false,
            now: ClockTime::default(),
            view_length: 24,
            view_width: 79,
            rng_seed: 0x5eed,
        }
    }
}
