//! The facade crate end to end: compile, evaluate, render diagnostics.

use pretty_assertions::assert_eq;

use tabex::diagnostics::Collector;
use tabex::render::render_diagnostics;
use tabex::{
    Case, CompileContext, Dictionary, EvalContext, Expression, SYSMIS, Scratch, Settings,
    ValueType,
};

#[test]
fn compile_and_evaluate_against_records() {
    let mut dict = Dictionary::new();
    let score = dict.create_var("score", 0).unwrap();

    let settings = Settings::default();
    let sink = Collector::new();
    let ctx = CompileContext::new(&settings, &sink).with_dict(&dict);
    let expr = Expression::compile("SQRT(score) + 1", &ctx, ValueType::Numeric).unwrap();

    let mut scratch = Scratch::new();

    let mut case = Case::new(&dict);
    case.set_number(score, 16.0);
    let mut eval_ctx = EvalContext::new(&settings).with_case(&dict, &case);
    assert_eq!(expr.evaluate_number(&mut eval_ctx, &mut scratch), 5.0);

    // A missing input flows through as a missing output.
    let case = Case::new(&dict);
    let mut eval_ctx = EvalContext::new(&settings).with_case(&dict, &case);
    assert_eq!(expr.evaluate_number(&mut eval_ctx, &mut scratch), SYSMIS);
}

#[test]
fn failed_compilation_renders_a_report() {
    let source = "1 < 'a'";
    let settings = Settings::default();
    let sink = Collector::new();
    let ctx = CompileContext::new(&settings, &sink);
    assert!(Expression::compile(source, &ctx, ValueType::Numeric).is_err());

    let rendered = render_diagnostics(source, &sink.take());
    assert!(
        rendered.contains("Both operands of < must have the same type."),
        "{rendered}"
    );
}
