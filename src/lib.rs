//! tabex — a compiler and evaluator for per-record transformation
//! expressions.
//!
//! A formula such as `MEAN(score1 TO score5) > cutoff` compiles once into a
//! small postfix program and then runs against one data record at a time.
//! The language covers arithmetic, boolean and string operators,
//! statistical aggregates, date/time math, distribution functions, and
//! variable/vector references, with missing-value semantics throughout.
//!
//! This crate is a thin facade: the engine lives in [`tabex_core`], and
//! [`render`] adds terminal-quality reports for the diagnostics the engine
//! collects.
//!
//! ```
//! use tabex::{CompileContext, Expression, EvalContext, Scratch, Settings};
//! use tabex::diagnostics::Collector;
//!
//! let settings = Settings::default();
//! let sink = Collector::new();
//! let ctx = CompileContext::new(&settings, &sink);
//! let expr = Expression::compile_any("(2 + 3) * 4", &ctx, true).unwrap();
//!
//! let mut eval = EvalContext::new(&settings);
//! let mut scratch = Scratch::new();
//! assert_eq!(expr.evaluate_number(&mut eval, &mut scratch), 20.0);
//! ```

pub mod render;

pub use tabex_core::api::{CompileError, parse_any, parse_boolean, parse_expression};
pub use tabex_core::data::{self, ValueType};
pub use tabex_core::diagnostics;
pub use tabex_core::flatten::ResultType;
pub use tabex_core::syntax;
pub use tabex_core::{
    Case, CompileContext, Dictionary, EvalContext, Expression, SYSMIS, Scratch, Settings, Value,
};
