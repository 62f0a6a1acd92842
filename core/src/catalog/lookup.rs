//! Name-to-operation resolution.
//!
//! Function names match case-insensitively with word-wise abbreviation:
//! the candidate splits on `.` and each word must equal the catalog word or
//! be a prefix of it at least three characters long.  An exact match always
//! beats an abbreviation.  Lookup returns the whole block of same-named
//! overloads, in catalog order.

use lazy_static::lazy_static;

use super::{ALL_OPCODES, OpFlags, Opcode};

lazy_static! {
    /// Function opcodes sorted by (display name, catalog position).
    /// Overloads of one name are contiguous.
    static ref FUNCTIONS: Vec<Opcode> = {
        let mut funcs: Vec<(usize, Opcode)> = ALL_OPCODES
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, op)| op.is_function())
            .collect();
        funcs.sort_by(|a, b| a.1.info().name.cmp(b.1.info().name).then(a.0.cmp(&b.0)));
        funcs.into_iter().map(|(_, op)| op).collect()
    };
}

/// True when `test` matches catalog word `name` exactly or as a prefix of
/// at least three characters.
fn word_matches(test: &str, name: &str, allow_abbrev: bool) -> bool {
    if test.eq_ignore_ascii_case(name) {
        return true;
    }
    allow_abbrev
        && test.len() >= 3
        && test.len() < name.len()
        && name[..test.len()].eq_ignore_ascii_case(test)
}

/// 0 = no match, 1 = abbreviation, 2 = exact.
fn compare_names(token: &str, name: &str, allow_abbrev: bool) -> u8 {
    let mut token_words = token.split('.');
    let mut name_words = name.split('.');
    loop {
        match (token_words.next(), name_words.next()) {
            (None, None) => break,
            (Some(t), Some(n)) if word_matches(t, n, allow_abbrev) => continue,
            _ => return 0,
        }
    }
    if token.eq_ignore_ascii_case(name) { 2 } else { 1 }
}

/// Finds the block of function overloads matching `token`.
///
/// The candidate name must already have any `.n` minimum-valid suffix
/// removed (see [`extract_min_valid`]).
pub fn lookup_function(token: &str) -> Option<&'static [Opcode]> {
    let mut best: Option<usize> = None;
    for (idx, op) in FUNCTIONS.iter().enumerate() {
        let info = op.info();
        let allow_abbrev = !info.flags.contains(OpFlags::NO_ABBREV);
        match compare_names(token, info.name, allow_abbrev) {
            2 => {
                best = Some(idx);
                break;
            }
            1 if best.is_none() => best = Some(idx),
            _ => {}
        }
    }
    let first = best?;
    let name = FUNCTIONS[first].info().name;
    // Back up to the start of the overload block, then take the whole
    // block.  (An abbreviation can land mid-block.)
    let start = FUNCTIONS[..first]
        .iter()
        .rposition(|op| op.info().name != name)
        .map_or(0, |i| i + 1);
    let end = start
        + FUNCTIONS[start..]
            .iter()
            .take_while(|op| op.info().name == name)
            .count();
    Some(&FUNCTIONS[start..end])
}

/// Splits a trailing `.n` minimum-valid-count suffix off a function name.
///
/// `MEAN.2` yields `("MEAN", Some(2))`; names without an all-digit final
/// word pass through unchanged.
pub fn extract_min_valid(name: &str) -> (&str, Option<usize>) {
    match name.rsplit_once('.') {
        Some((prefix, suffix))
            if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) =>
        {
            (prefix, suffix.parse().ok())
        }
        _ => (name, None),
    }
}
