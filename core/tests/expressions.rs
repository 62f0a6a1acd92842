//! End-to-end exercises through the public API, in the style of the host
//! system's expression-evaluation command: compile a line of text, run it,
//! check the printed value.

use pretty_assertions::assert_eq;

use tabex_core::data::ValueType;
use tabex_core::diagnostics::Collector;
use tabex_core::flatten::ResultType;
use tabex_core::{Case, CompileContext, Dictionary, EvalContext, Expression, SYSMIS, Scratch, Settings, Value};

/// Renders a result the way the debug-evaluate harness would.
fn show(source: &str) -> String {
    let settings = Settings::default();
    let sink = Collector::new();
    let ctx = CompileContext::new(&settings, &sink);
    let Ok(expr) = Expression::compile_any(source, &ctx, true) else {
        return "error".into();
    };
    let mut eval_ctx = EvalContext::new(&settings).with_sink(&sink);
    let mut scratch = Scratch::new();
    match expr.result_type() {
        ResultType::Number => {
            let x = expr.evaluate_number(&mut eval_ctx, &mut scratch);
            if x == SYSMIS {
                "sysmis".into()
            } else {
                format!("{x:.2}")
            }
        }
        ResultType::Boolean => {
            let x = expr.evaluate_number(&mut eval_ctx, &mut scratch);
            if x == SYSMIS {
                "sysmis".into()
            } else if x == 0.0 {
                "false".into()
            } else {
                "true".into()
            }
        }
        ResultType::String => {
            let value = expr.evaluate(&mut eval_ctx, &mut scratch);
            format!("\"{}\"", value.as_str())
        }
    }
}

#[test]
fn evaluation_table() {
    let table = [
        ("1 + 2", "3.00"),
        ("(2 + 3) * 4", "20.00"),
        ("2 ** 10", "1024.00"),
        ("-5**6", "-15625.00"),
        ("1/0", "sysmis"),
        ("MOD(0, 0)", "0.00"),
        ("1 < 2", "true"),
        ("1 > 2", "false"),
        ("1 < 2 AND 2 < 3", "true"),
        ("$TRUE AND $FALSE", "false"),
        ("NOT $FALSE", "true"),
        ("$SYSMIS AND 1", "sysmis"),
        ("'ab' = 'ab '", "true"),
        ("CONCAT('ab', 'cd')", "\"abcd\""),
        ("SUBSTR('hello', 2, 3)", "\"ell\""),
        ("LPAD('5', 3, '0')", "\"005\""),
        ("UPCASE('hi')", "\"HI\""),
        ("MEAN(1, 2, 3, $SYSMIS)", "2.00"),
        ("SUM.3(1, 2, $SYSMIS)", "sysmis"),
        ("SQRT(-1)", "sysmis"),
        ("ABS(-2.5)", "2.50"),
        ("TRUNC(8.9)", "8.00"),
        ("RND(8.9)", "9.00"),
        ("CDF.NORMAL(0, 0, 1)", "0.50"),
        ("CTIME.DAYS(TIME.HMS(12, 0, 0))", "0.50"),
        ("XDATE.YEAR(DATE.DMY(1, 6, 2010))", "2010.00"),
        ("NOSUCHFUNCTION(13)", "error"),
        ("1 +", "error"),
        ("'a' + 1", "error"),
    ];
    for (source, expected) in table {
        assert_eq!(show(source), expected, "{source}");
    }
}

#[test]
fn compiled_programs_are_reusable_across_records() {
    let mut dict = Dictionary::new();
    let x = dict.create_var("x", 0).unwrap();
    let y = dict.create_var("y", 0).unwrap();

    let settings = Settings::default();
    let sink = Collector::new();
    let ctx = CompileContext::new(&settings, &sink).with_dict(&dict);
    let expr = Expression::compile("x * 10 + y", &ctx, ValueType::Numeric).unwrap();

    let mut scratch = Scratch::new();
    let mut results = Vec::new();
    for i in 0..3 {
        let mut case = Case::new(&dict);
        case.set_number(x, f64::from(i));
        case.set_number(y, f64::from(i) / 2.0);
        let mut eval_ctx = EvalContext::new(&settings).with_case(&dict, &case);
        results.push(expr.evaluate_number(&mut eval_ctx, &mut scratch));
    }
    assert_eq!(results, vec![0.0, 10.5, 21.0]);
}

#[test]
fn string_results_survive_until_the_next_evaluation() {
    let settings = Settings::default();
    let sink = Collector::new();
    let ctx = CompileContext::new(&settings, &sink);
    let expr = Expression::compile("CONCAT('a', 'b')", &ctx, ValueType::String).unwrap();

    let mut scratch = Scratch::new();
    let mut eval_ctx = EvalContext::new(&settings);
    let value = expr.evaluate(&mut eval_ctx, &mut scratch);
    // The result remains usable after evaluate() returns...
    let Value::Str(s) = value else { unreachable!() };
    assert_eq!(s, "ab");
    // ...until the scratch is reused for the next evaluation, which the
    // borrow on `scratch` prevents from overlapping.
    let value = expr.evaluate(&mut eval_ctx, &mut scratch);
    assert_eq!(value, Value::Str("ab"));
}

#[test]
fn postfix_dump_is_stable() {
    let settings = Settings::default();
    let sink = Collector::new();
    let ctx = CompileContext::new(&settings, &sink);

    let unoptimized = Expression::compile_any("1 + 2 * 3", &ctx, false).unwrap();
    assert_eq!(unoptimized.postfix(), "n<1> n<2> n<3> * + return_number");

    let optimized = Expression::compile_any("1 + 2 * 3", &ctx, true).unwrap();
    assert_eq!(optimized.postfix(), "n<7> return_number");
}

#[test]
fn diagnostics_carry_spans() {
    let settings = Settings::default();
    let sink = Collector::new();
    let ctx = CompileContext::new(&settings, &sink);
    assert!(Expression::compile("1 < 'a'", &ctx, ValueType::Numeric).is_err());
    let diagnostics = sink.take();
    assert!(!diagnostics.is_empty());
    // The primary error covers the whole comparison.
    let span = diagnostics[0].span.expect("error should carry a span");
    assert_eq!((span.start, span.end), (0, 7));
}
