//! Numeric format specifications.
//!
//! A deliberately compact subset of the host system's format zoo: enough
//! for the `NUMBER` (input) and `STRING` (output) operations.  A spec is
//! `TYPEw.d`, e.g. `F8.2`, `N4`, `E10.3`, `COMMA9.2`, `PCT6.1`.

use core::fmt;

use thiserror::Error;

use crate::data::SYSMIS;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FmtType {
    /// Plain decimal.
    F,
    /// Decimal with thousands separators on output.
    Comma,
    /// Scientific notation.
    E,
    /// Unsigned, zero-padded.
    N,
    /// Decimal with a trailing percent sign on output.
    Pct,
}

impl FmtType {
    fn name(self) -> &'static str {
        match self {
            FmtType::F => "F",
            FmtType::Comma => "COMMA",
            FmtType::E => "E",
            FmtType::N => "N",
            FmtType::Pct => "PCT",
        }
    }

    /// Width consumed by everything that is not a digit or decimal point.
    fn overhead(self) -> u16 {
        match self {
            FmtType::Pct => 1,
            // Sign, mantissa point, "E+dd".
            FmtType::E => 6,
            _ => 0,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FormatError {
    #[error("unknown format type `{0}`")]
    UnknownType(String),
    #[error("format {0} has a malformed width specification")]
    BadSyntax(String),
    #[error("{spec} requires a width between {min} and {max}")]
    BadWidth { spec: String, min: u16, max: u16 },
    #[error("{0} has more decimals than its width allows")]
    TooManyDecimals(String),
}

pub const MAX_WIDTH: u16 = 40;
pub const MAX_DECIMALS: u8 = 16;

/// A parsed format specification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FmtSpec {
    pub type_: FmtType,
    pub w: u16,
    pub d: u8,
}

impl FmtSpec {
    pub fn new(type_: FmtType, w: u16, d: u8) -> Self {
        Self { type_, w, d }
    }

    /// Parses `F8.2`-style text, case-insensitively.
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        let letters: String = text
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        let rest = &text[letters.len()..];
        let type_ = if letters.eq_ignore_ascii_case("F") {
            FmtType::F
        } else if letters.eq_ignore_ascii_case("COMMA") {
            FmtType::Comma
        } else if letters.eq_ignore_ascii_case("E") {
            FmtType::E
        } else if letters.eq_ignore_ascii_case("N") {
            FmtType::N
        } else if letters.eq_ignore_ascii_case("PCT") {
            FmtType::Pct
        } else {
            return Err(FormatError::UnknownType(letters));
        };
        let (w_text, d_text) = match rest.split_once('.') {
            Some((w, d)) => (w, Some(d)),
            None => (rest, None),
        };
        let w: u16 = w_text
            .parse()
            .map_err(|_| FormatError::BadSyntax(text.into()))?;
        let d: u8 = match d_text {
            Some(d) => d.parse().map_err(|_| FormatError::BadSyntax(text.into()))?,
            None => 0,
        };
        let spec = Self { type_, w, d };
        spec.check()?;
        Ok(spec)
    }

    /// Structural validity: width and decimal limits.
    pub fn check(&self) -> Result<(), FormatError> {
        let min_w = 1 + self.type_.overhead();
        if self.w < min_w || self.w > MAX_WIDTH {
            return Err(FormatError::BadWidth {
                spec: self.to_string(),
                min: min_w,
                max: MAX_WIDTH,
            });
        }
        if self.d > MAX_DECIMALS {
            return Err(FormatError::TooManyDecimals(self.to_string()));
        }
        if self.d > 0 && self.type_ != FmtType::E && u16::from(self.d) + 2 > self.w {
            return Err(FormatError::TooManyDecimals(self.to_string()));
        }
        Ok(())
    }

    /// Validity as an input (parsing) format for numeric data.
    pub fn check_input(&self) -> Result<(), FormatError> {
        self.check()
    }

    /// Validity as an output (display) format for numeric data.
    pub fn check_output(&self) -> Result<(), FormatError> {
        self.check()
    }

    /// Parses a data string according to this input format.
    ///
    /// Returns `None` when the field is malformed.  An entirely blank field
    /// is the missing value.  When the field contains no explicit decimal
    /// point, `d` implied decimal places are applied.
    pub fn parse_number(&self, field: &str) -> Option<f64> {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            return Some(SYSMIS);
        }
        let cleaned: String = match self.type_ {
            FmtType::Comma => trimmed.chars().filter(|&c| c != ',').collect(),
            FmtType::Pct => trimmed.trim_end_matches('%').to_string(),
            _ => trimmed.to_string(),
        };
        if self.type_ == FmtType::N && !cleaned.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value: f64 = cleaned.parse().ok()?;
        if !cleaned.contains('.') && !cleaned.contains(['e', 'E']) && self.d > 0 {
            Some(value / 10f64.powi(i32::from(self.d)))
        } else {
            Some(value)
        }
    }

    /// Renders a number according to this output format, right-justified in
    /// exactly `w` bytes.  Values that cannot be represented render as a
    /// field of asterisks; the missing sentinel renders as a lone period.
    pub fn format_number(&self, value: f64) -> String {
        let w = usize::from(self.w);
        if value == SYSMIS {
            return format!("{:>w$}", ".");
        }
        let body = match self.type_ {
            FmtType::F => format!("{:.*}", usize::from(self.d), value),
            FmtType::Comma => group_thousands(&format!("{:.*}", usize::from(self.d), value)),
            FmtType::Pct => format!("{:.*}%", usize::from(self.d), value),
            FmtType::N => {
                if value < 0.0 || value != value.trunc() {
                    return "*".repeat(w);
                }
                let digits = format!("{:.0}", value);
                if digits.len() > w {
                    return "*".repeat(w);
                }
                return format!("{:0>w$}", digits);
            }
            FmtType::E => {
                let e = format!("{:.*e}", usize::from(self.d), value);
                match e.split_once('e') {
                    Some((mantissa, exp)) => {
                        let exp: i32 = exp.parse().unwrap_or(0);
                        format!("{mantissa}E{exp:+03}")
                    }
                    None => e,
                }
            }
        };
        if body.len() > w {
            "*".repeat(w)
        } else {
            format!("{body:>w$}")
        }
    }
}

impl fmt::Display for FmtSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.d > 0 {
            write!(f, "{}{}.{}", self.type_.name(), self.w, self.d)
        } else {
            write!(f, "{}{}", self.type_.name(), self.w)
        }
    }
}

/// Inserts `,` thousands separators into a plain decimal rendering.
fn group_thousands(s: &str) -> String {
    let (sign, rest) = s.strip_prefix('-').map_or(("", s), |r| ("-", r));
    let (int_part, frac_part) = match rest.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rest, None),
    };
    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    match frac_part {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_specs() {
        assert_eq!(FmtSpec::parse("F8.2").unwrap(), FmtSpec::new(FmtType::F, 8, 2));
        assert_eq!(FmtSpec::parse("n4").unwrap(), FmtSpec::new(FmtType::N, 4, 0));
        assert_eq!(
            FmtSpec::parse("comma9.2").unwrap(),
            FmtSpec::new(FmtType::Comma, 9, 2)
        );
        assert!(FmtSpec::parse("Z8").is_err());
        assert!(FmtSpec::parse("F0").is_err());
        assert!(FmtSpec::parse("F3.2").is_err());
        assert!(FmtSpec::parse("F8.x").is_err());
    }

    #[test]
    fn render_f() {
        let spec = FmtSpec::new(FmtType::F, 8, 2);
        assert_eq!(spec.format_number(3.14159), "    3.14");
        assert_eq!(spec.format_number(-3.5), "   -3.50");
        assert_eq!(spec.format_number(SYSMIS), "       .");
        assert_eq!(spec.format_number(123456789.0), "********");
    }

    #[test]
    fn render_n_and_comma() {
        assert_eq!(FmtSpec::new(FmtType::N, 4, 0).format_number(42.0), "0042");
        assert_eq!(FmtSpec::new(FmtType::N, 4, 0).format_number(-1.0), "****");
        assert_eq!(
            FmtSpec::new(FmtType::Comma, 12, 2).format_number(1234567.5),
            "1,234,567.50"
        );
        assert_eq!(
            FmtSpec::new(FmtType::Comma, 11, 2).format_number(1234567.5),
            "***********"
        );
    }

    #[test]
    fn render_e() {
        let s = FmtSpec::new(FmtType::E, 10, 3).format_number(1234.8);
        assert_eq!(s, " 1.235E+03");
    }

    #[test]
    fn parse_field() {
        let spec = FmtSpec::new(FmtType::F, 8, 2);
        assert_eq!(spec.parse_number("  3.5 "), Some(3.5));
        // Implied decimals when the field has no point.
        assert_eq!(spec.parse_number("123"), Some(1.23));
        assert_eq!(spec.parse_number("   "), Some(SYSMIS));
        assert_eq!(spec.parse_number("abc"), None);
        assert_eq!(FmtSpec::new(FmtType::N, 4, 0).parse_number("-12"), None);
        assert_eq!(
            FmtSpec::new(FmtType::Comma, 9, 0).parse_number("1,234"),
            Some(1234.0)
        );
    }
}
