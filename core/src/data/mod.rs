//! Dictionary, variables, vectors, and per-record data.
//!
//! This is the engine's view of the tabular store it evaluates against.
//! Numeric "no value" is the [`SYSMIS`] sentinel; string absence is a
//! zero-length string, never a sentinel.

use ecow::EcoString;
use hashbrown::HashMap;
use smallvec::SmallVec;
use thiserror::Error;

/// The system-missing value for numeric data.
pub const SYSMIS: f64 = -f64::MAX;

/// Longest string value the engine produces.
pub const MAX_STRING: usize = 32767;

/// True for any numeric value other than the missing sentinel.
#[inline]
pub fn is_valid(x: f64) -> bool {
    x != SYSMIS
}

/// Number of valid (non-missing) values in `xs`.
pub fn count_valid(xs: &[f64]) -> usize {
    xs.iter().copied().filter(|&x| is_valid(x)).count()
}

/// A numeric or string result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value<'a> {
    Number(f64),
    Str(&'a str),
}

impl<'a> Value<'a> {
    pub fn as_number(self) -> f64 {
        match self {
            Value::Number(x) => x,
            Value::Str(_) => panic!("string value where a number was required"),
        }
    }

    pub fn as_str(self) -> &'a str {
        match self {
            Value::Str(s) => s,
            Value::Number(_) => panic!("numeric value where a string was required"),
        }
    }
}

/// Whether a variable (or expression) holds numbers or strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    Numeric,
    String,
}

/// Handle to a variable in a [`Dictionary`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VarId(pub u32);

/// Handle to a vector in a [`Dictionary`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VectorId(pub u32);

/// User-missing classification for a numeric variable.
///
/// Up to three discrete values plus an optional inclusive range.
#[derive(Clone, Debug, Default)]
pub struct MissingValues {
    pub values: SmallVec<[f64; 3]>,
    pub range: Option<(f64, f64)>,
}

impl MissingValues {
    pub fn is_user_missing(&self, x: f64) -> bool {
        if !is_valid(x) {
            return false;
        }
        self.values.contains(&x)
            || self
                .range
                .is_some_and(|(lo, hi)| x >= lo && x <= hi)
    }
}

/// One column of the data store.
#[derive(Clone, Debug)]
pub struct Variable {
    pub name: String,
    /// 0 for numeric variables, otherwise the string width in bytes.
    pub width: u16,
    pub missing: MissingValues,
}

impl Variable {
    pub fn is_numeric(&self) -> bool {
        self.width == 0
    }

    pub fn value_type(&self) -> ValueType {
        if self.is_numeric() {
            ValueType::Numeric
        } else {
            ValueType::String
        }
    }
}

/// A named, ordered group of same-typed variables addressed by 1-based
/// index.
#[derive(Clone, Debug)]
pub struct Vector {
    pub name: String,
    pub vars: Vec<VarId>,
    pub value_type: ValueType,
}

#[derive(Debug, Error)]
pub enum DictError {
    #[error("duplicate variable name {0}")]
    DuplicateVariable(String),
    #[error("duplicate vector name {0}")]
    DuplicateVector(String),
    #[error("vector {0} mixes numeric and string variables")]
    MixedVector(String),
    #[error("vector {0} has no variables")]
    EmptyVector(String),
}

/// Variable and vector metadata for one data source.
///
/// Lookups are case-insensitive, matching the host language's rules.
#[derive(Default)]
pub struct Dictionary {
    vars: Vec<Variable>,
    vars_by_name: HashMap<String, VarId>,
    vectors: Vec<Vector>,
    vectors_by_name: HashMap<String, VectorId>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable; width 0 is numeric.
    pub fn create_var(&mut self, name: &str, width: u16) -> Result<VarId, DictError> {
        let key = name.to_ascii_uppercase();
        if self.vars_by_name.contains_key(&key) {
            return Err(DictError::DuplicateVariable(name.into()));
        }
        let id = VarId(self.vars.len() as u32);
        self.vars.push(Variable {
            name: name.into(),
            width,
            missing: MissingValues::default(),
        });
        self.vars_by_name.insert(key, id);
        Ok(id)
    }

    pub fn create_vector(&mut self, name: &str, vars: Vec<VarId>) -> Result<VectorId, DictError> {
        let key = name.to_ascii_uppercase();
        if self.vectors_by_name.contains_key(&key) {
            return Err(DictError::DuplicateVector(name.into()));
        }
        let Some(first) = vars.first() else {
            return Err(DictError::EmptyVector(name.into()));
        };
        let value_type = self.var(*first).value_type();
        if vars.iter().any(|&v| self.var(v).value_type() != value_type) {
            return Err(DictError::MixedVector(name.into()));
        }
        let id = VectorId(self.vectors.len() as u32);
        self.vectors.push(Vector {
            name: name.into(),
            vars,
            value_type,
        });
        self.vectors_by_name.insert(key, id);
        Ok(id)
    }

    pub fn lookup_var(&self, name: &str) -> Option<VarId> {
        self.vars_by_name.get(&name.to_ascii_uppercase()).copied()
    }

    pub fn lookup_vector(&self, name: &str) -> Option<VectorId> {
        self.vectors_by_name
            .get(&name.to_ascii_uppercase())
            .copied()
    }

    pub fn var(&self, id: VarId) -> &Variable {
        &self.vars[id.0 as usize]
    }

    pub fn var_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.vars[id.0 as usize]
    }

    pub fn vector(&self, id: VectorId) -> &Vector {
        &self.vectors[id.0 as usize]
    }

    pub fn n_vars(&self) -> usize {
        self.vars.len()
    }

    /// Variables in dictionary order; `a TO b` ranges expand over this.
    pub fn var_range(&self, first: VarId, last: VarId) -> Option<Vec<VarId>> {
        if first.0 > last.0 {
            return None;
        }
        Some((first.0..=last.0).map(VarId).collect())
    }
}

/// Stored datum for one variable of one case.
#[derive(Clone, Debug, PartialEq)]
pub enum Datum {
    Number(f64),
    Str(EcoString),
}

/// One record of the data source.
///
/// String data is kept blank-padded to the variable's width, so comparisons
/// and concatenation see exactly what the store holds.
#[derive(Clone, Debug)]
pub struct Case {
    values: Vec<Datum>,
}

impl Case {
    /// A case with every numeric variable missing and every string variable
    /// blank.
    pub fn new(dict: &Dictionary) -> Self {
        let values = dict
            .vars
            .iter()
            .map(|v| {
                if v.is_numeric() {
                    Datum::Number(SYSMIS)
                } else {
                    Datum::Str(blank(v.width as usize))
                }
            })
            .collect();
        Self { values }
    }

    pub fn set_number(&mut self, id: VarId, value: f64) {
        self.values[id.0 as usize] = Datum::Number(value);
    }

    /// Stores a string, blank-padded or truncated to the variable's width.
    pub fn set_string(&mut self, dict: &Dictionary, id: VarId, value: &str) {
        let width = dict.var(id).width as usize;
        let mut s = EcoString::new();
        for c in value.chars() {
            if s.len() + c.len_utf8() > width {
                break;
            }
            s.push(c);
        }
        while s.len() < width {
            s.push(' ');
        }
        self.values[id.0 as usize] = Datum::Str(s);
    }

    pub fn number(&self, id: VarId) -> f64 {
        match &self.values[id.0 as usize] {
            Datum::Number(x) => *x,
            Datum::Str(_) => panic!("numeric access to string variable"),
        }
    }

    pub fn string(&self, id: VarId) -> &str {
        match &self.values[id.0 as usize] {
            Datum::Str(s) => s.as_str(),
            Datum::Number(_) => panic!("string access to numeric variable"),
        }
    }
}

fn blank(width: usize) -> EcoString {
    let mut s = EcoString::new();
    for _ in 0..width {
        s.push(' ');
    }
    s
}

/// Access to earlier records for bounded-lookback operations.
///
/// `lag(1)` is the record just before the current one.  Returns `None` when
/// fewer than `n` records have been read.
pub trait CaseLookback {
    fn lag(&self, n: usize) -> Option<&Case>;
}

/// Fixed-capacity lookback window, enough for the tests and simple hosts.
pub struct LagWindow {
    cases: Vec<Case>,
    depth: usize,
}

impl LagWindow {
    pub fn new(depth: usize) -> Self {
        Self {
            cases: Vec::new(),
            depth,
        }
    }

    /// Records that `case` has been processed, becoming `lag(1)`.
    pub fn push(&mut self, case: Case) {
        self.cases.push(case);
        if self.cases.len() > self.depth {
            self.cases.remove(0);
        }
    }
}

impl CaseLookback for LagWindow {
    fn lag(&self, n: usize) -> Option<&Case> {
        if n == 0 || n > self.cases.len() {
            return None;
        }
        self.cases.get(self.cases.len() - n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_missing_classification() {
        let mv = MissingValues {
            values: smallvec::smallvec![9.0],
            range: Some((90.0, 99.0)),
        };
        assert!(mv.is_user_missing(9.0));
        assert!(mv.is_user_missing(95.0));
        assert!(!mv.is_user_missing(8.0));
        // The system-missing sentinel is not *user*-missing.
        assert!(!mv.is_user_missing(SYSMIS));
    }

    #[test]
    fn case_defaults_and_padding() {
        let mut dict = Dictionary::new();
        let x = dict.create_var("x", 0).unwrap();
        let s = dict.create_var("s", 4).unwrap();
        let mut case = Case::new(&dict);
        assert_eq!(case.number(x), SYSMIS);
        assert_eq!(case.string(s), "    ");
        case.set_string(&dict, s, "ab");
        assert_eq!(case.string(s), "ab  ");
    }

    #[test]
    fn lag_window() {
        let mut dict = Dictionary::new();
        let x = dict.create_var("x", 0).unwrap();
        let mut window = LagWindow::new(2);
        for i in 1..=3 {
            let mut c = Case::new(&dict);
            c.set_number(x, i as f64);
            window.push(c);
        }
        assert_eq!(window.lag(1).unwrap().number(x), 3.0);
        assert_eq!(window.lag(2).unwrap().number(x), 2.0);
        assert!(window.lag(3).is_none());
    }
}
