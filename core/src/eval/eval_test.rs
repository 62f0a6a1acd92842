//! Evaluation semantics: missing propagation, string round trips,
//! boundary behavior, record access.

use pretty_assertions::assert_eq;

use super::{EvalContext, Scratch};
use crate::api::CompileContext;
use crate::data::{Case, Dictionary, LagWindow, SYSMIS, Value};
use crate::diagnostics::Collector;
use crate::flatten::{Expression, ResultType};
use crate::settings::Settings;

fn eval_with(source: &str, optimize: bool) -> (Value<'static>, Vec<String>) {
    let settings = Settings::default();
    let sink = Collector::new();
    let ctx = CompileContext::new(&settings, &sink);
    let expr = Expression::compile_any(source, &ctx, optimize)
        .unwrap_or_else(|_| panic!("compile failed: {:?}", sink.messages()));
    let mut eval_ctx = EvalContext::new(&settings).with_sink(&sink);
    let mut scratch = Scratch::new();
    let value = expr.evaluate(&mut eval_ctx, &mut scratch);
    let owned = match value {
        Value::Number(x) => Value::Number(x),
        Value::Str(s) => Value::Str(Box::leak(s.to_string().into_boxed_str())),
    };
    (owned, sink.messages())
}

fn eval_num(source: &str) -> f64 {
    let (optimized, _) = eval_with(source, true);
    let (interpreted, _) = eval_with(source, false);
    // Folding and interpretation share one implementation; they must
    // always agree.
    assert_eq!(optimized, interpreted, "fold/eval divergence for {source}");
    optimized.as_number()
}

fn eval_str(source: &str) -> String {
    let (optimized, _) = eval_with(source, true);
    let (interpreted, _) = eval_with(source, false);
    assert_eq!(optimized, interpreted, "fold/eval divergence for {source}");
    optimized.as_str().to_string()
}

#[test]
fn arithmetic_scenario() {
    assert_eq!(eval_num("(2 + 3) * 4"), 20.0);
    assert_eq!(eval_num("1 + 2 * 3 ** 2"), 19.0);
    assert_eq!(eval_num("2 ** 3 ** 2"), 64.0); // Left-associative.
}

#[test]
fn division_by_zero_is_missing() {
    assert_eq!(eval_num("1/0"), SYSMIS);
    assert_eq!(eval_num("1/0 + 5"), SYSMIS);
}

#[test]
fn mod_boundaries() {
    assert_eq!(eval_num("MOD(0, 0)"), 0.0);
    assert_eq!(eval_num("MOD(7, 3)"), 1.0);
    assert_eq!(eval_num("MOD(3, 0)"), SYSMIS);
}

#[test]
fn missing_propagation_is_the_default() {
    assert_eq!(eval_num("1 + $SYSMIS"), SYSMIS);
    assert_eq!(eval_num("ABS($SYSMIS)"), SYSMIS);
    assert_eq!(eval_num("SQRT($SYSMIS)"), SYSMIS);
    assert_eq!(eval_num("MEAN(1, 2) + $SYSMIS"), SYSMIS);
}

#[test]
fn absorbing_operations_survive_missing() {
    assert_eq!(eval_num("SYSMIS($SYSMIS)"), 1.0);
    assert_eq!(eval_num("SYSMIS(1)"), 0.0);
    assert_eq!(eval_num("MISSING($SYSMIS)"), 1.0);
    assert_eq!(eval_num("MEAN(1, 2, $SYSMIS)"), 1.5);
    assert_eq!(eval_num("SUM(1, $SYSMIS, 3)"), 4.0);
    assert_eq!(eval_num("NVALID(1, $SYSMIS, 3)"), 2.0);
    assert_eq!(eval_num("NMISS(1, $SYSMIS, 3)"), 1.0);
}

#[test]
fn min_valid_suffix_forces_missing() {
    assert_eq!(eval_num("MEAN.3(1, 2, $SYSMIS)"), SYSMIS);
    assert_eq!(eval_num("MEAN.2(1, 2, $SYSMIS)"), 1.5);
}

#[test]
fn power_missing_identities() {
    assert_eq!(eval_num("$SYSMIS ** 0"), 1.0);
    assert_eq!(eval_num("0 ** $SYSMIS"), 0.0);
    assert_eq!(eval_num("$SYSMIS ** 2"), SYSMIS);
    // 0 to a negative power is undefined, so missing.
    assert_eq!(eval_num("0 ** -1"), SYSMIS);
}

#[test]
fn tri_state_logic() {
    assert_eq!(eval_num("$SYSMIS AND 0"), 0.0);
    assert_eq!(eval_num("$SYSMIS AND 1"), SYSMIS);
    assert_eq!(eval_num("$SYSMIS OR 1"), 1.0);
    assert_eq!(eval_num("$SYSMIS OR 0"), SYSMIS);
    assert_eq!(eval_num("NOT $SYSMIS"), SYSMIS);
    assert_eq!(eval_num("NOT 0"), 1.0);
}

#[test]
fn out_of_range_boolean_operand_warns_and_zeroes() {
    let (value, messages) = eval_with("3 AND 1", false);
    assert_eq!(value, Value::Number(0.0));
    assert!(
        messages.iter().any(|m| m.contains("forced to 0")),
        "{messages:?}"
    );
}

#[test]
fn string_round_trips() {
    assert_eq!(eval_str("SUBSTR('hello', 2, 3)"), "ell");
    assert_eq!(eval_str("CONCAT('a', 'b', 'c')"), "abc");
    assert_eq!(eval_str("LPAD('5', 3, '0')"), "005");
    assert_eq!(eval_str("RPAD('5', 3)"), "5  ");
    assert_eq!(eval_str("UPCASE('ab c')"), "AB C");
    assert_eq!(eval_str("LOWER('AB C')"), "ab c");
    assert_eq!(eval_str("LTRIM('  x')"), "x");
    assert_eq!(eval_str("RTRIM('x  ')"), "x");
    assert_eq!(eval_str("LTRIM('00x', '0')"), "x");
    assert_eq!(eval_str("STRUNC('abc  ', 4)"), "abc");
    assert_eq!(eval_str("REPLACE('banana', 'an', 'o')"), "booa");
    assert_eq!(eval_str("REPLACE('banana', 'an', 'o', 1)"), "boana");
}

#[test]
fn substr_out_of_range_is_empty() {
    assert_eq!(eval_str("SUBSTR('abc', 0)"), "");
    assert_eq!(eval_str("SUBSTR('abc', 4)"), "");
    assert_eq!(eval_str("SUBSTR('abc', 2)"), "bc");
    assert_eq!(eval_str("SUBSTR('abc', 1, 99)"), "abc");
}

#[test]
fn string_search() {
    assert_eq!(eval_num("INDEX('hello', 'll')"), 3.0);
    assert_eq!(eval_num("INDEX('hello', 'x')"), 0.0);
    assert_eq!(eval_num("RINDEX('banana', 'an')"), 4.0);
    assert_eq!(eval_num("INDEX('banana', 'na', 2)"), 3.0);
    assert_eq!(eval_num("LENGTH('abc')"), 3.0);
}

#[test]
fn string_comparisons_pad_with_blanks() {
    assert_eq!(eval_num("'a' = 'a   '"), 1.0);
    assert_eq!(eval_num("'a' < 'b'"), 1.0);
    assert_eq!(eval_num("'b  ' <= 'b'"), 1.0);
    assert_eq!(eval_num("ANY('b', 'a', 'b  ')"), 1.0);
    assert_eq!(eval_num("RANGE('m', 'a', 'z')"), 1.0);
}

#[test]
fn number_and_string_formatting() {
    assert_eq!(eval_num("NUMBER('123', F3.0)"), 123.0);
    assert_eq!(eval_num("NUMBER('123', F3.1)"), 12.3);
    assert_eq!(eval_str("STRING(123, N5)"), "00123");
    assert_eq!(eval_str("STRING(1.5, F5.2)"), " 1.50");

    let (value, messages) = eval_with("NUMBER('xyz', F3.0)", false);
    assert_eq!(value, Value::Number(SYSMIS));
    assert!(
        messages.iter().any(|m| m.contains("could not be parsed")),
        "{messages:?}"
    );
}

#[test]
fn rounding_and_truncation() {
    assert_eq!(eval_num("RND(2.5)"), 3.0);
    assert_eq!(eval_num("RND(-2.5)"), -3.0);
    assert_eq!(eval_num("TRUNC(2.9)"), 2.0);
    assert_eq!(eval_num("TRUNC(-2.9)"), -2.0);
    assert_eq!(eval_num("RND(123, 10)"), 120.0);
    assert_eq!(eval_num("RND(2.5, 0)"), SYSMIS);
    // The fuzz bits make nearly-exact values truncate as if exact.
    assert_eq!(eval_num("TRUNC(2.999999999999999)"), 3.0);
}

#[test]
fn math_domain_errors_are_missing() {
    assert_eq!(eval_num("SQRT(-1)"), SYSMIS);
    assert_eq!(eval_num("LN(0)"), SYSMIS);
    assert_eq!(eval_num("LG10(-3)"), SYSMIS);
    assert_eq!(eval_num("ARSIN(2)"), SYSMIS);
    assert_eq!(eval_num("SQRT(4)"), 2.0);
    assert_eq!(eval_num("EXP(1)"), core::f64::consts::E);
}

#[test]
fn statistics() {
    assert_eq!(eval_num("MEAN(1, 2, 3)"), 2.0);
    assert_eq!(eval_num("MEDIAN(3, 1, 2)"), 2.0);
    assert_eq!(eval_num("MEDIAN(1, 2, 3, $SYSMIS)"), 2.0);
    assert_eq!(eval_num("MIN(3, 1, 2)"), 1.0);
    assert_eq!(eval_num("MAX(3, 1, 2)"), 3.0);
    assert_eq!(eval_num("VARIANCE(1, 2, 3)"), 1.0);
    assert_eq!(eval_num("SD(1, 2, 3)"), 1.0);
    assert_eq!(eval_num("SUM(1, 2, 3)"), 6.0);
    assert_eq!(eval_num("CFVAR(2, 4, 6)"), 0.5);
    assert_eq!(eval_str("MAX('a', 'c', 'b')"), "c");
}

#[test]
fn membership() {
    assert_eq!(eval_num("ANY(2, 1, 2, 3)"), 1.0);
    assert_eq!(eval_num("ANY(5, 1, 2, 3)"), 0.0);
    assert_eq!(eval_num("ANY(5, 1, $SYSMIS)"), SYSMIS);
    assert_eq!(eval_num("ANY($SYSMIS, 1, 2)"), SYSMIS);
    assert_eq!(eval_num("RANGE(5, 1, 10)"), 1.0);
    assert_eq!(eval_num("RANGE(5, 1, 2, 4, 6)"), 1.0);
    assert_eq!(eval_num("RANGE(3, 4, 10)"), 0.0);
}

#[test]
fn dates() {
    assert_eq!(eval_num("YRMODA(1582, 10, 15)"), 1.0);
    assert_eq!(eval_num("YRMODA(82, 10, 15)"), eval_num("YRMODA(1982, 10, 15)"));
    assert_eq!(eval_num("DATE.DMY(15, 10, 1582)"), 86400.0);
    assert_eq!(
        eval_num("DATE.DMY(4, 7, 2024)"),
        eval_num("DATE.MDY(7, 4, 2024)")
    );
    assert_eq!(eval_num("XDATE.YEAR(DATE.DMY(4, 7, 2024))"), 2024.0);
    assert_eq!(eval_num("XDATE.MONTH(DATE.DMY(4, 7, 2024))"), 7.0);
    assert_eq!(eval_num("XDATE.MDAY(DATE.DMY(4, 7, 2024))"), 4.0);
    assert_eq!(eval_num("XDATE.QUARTER(DATE.DMY(4, 7, 2024))"), 3.0);
    assert_eq!(eval_num("XDATE.JDAY(DATE.DMY(1, 2, 2024))"), 32.0);
    // 4 Jul 2024 was a Thursday; 1 = Sunday.
    assert_eq!(eval_num("XDATE.WKDAY(DATE.DMY(4, 7, 2024))"), 5.0);
    assert_eq!(eval_num("TIME.HMS(1, 30, 0)"), 5400.0);
    assert_eq!(eval_num("CTIME.HOURS(TIME.HMS(1, 30, 0))"), 1.5);
    assert_eq!(eval_num("XDATE.TIME(DATE.DMY(4, 7, 2024) + TIME.HMS(6, 0, 0))"), 21600.0);
    assert_eq!(eval_num("XDATE.HOUR(DATE.DMY(4, 7, 2024) + TIME.HMS(6, 0, 0))"), 6.0);
}

#[test]
fn date_validation() {
    let (value, messages) = eval_with("DATE.DMY(32, 1, 2000)", false);
    assert_eq!(value, Value::Number(SYSMIS));
    assert!(!messages.is_empty());

    let (value, _) = eval_with("DATE.DMY(1.5, 1, 2000)", false);
    assert_eq!(value, Value::Number(SYSMIS));
}

#[test]
fn date_differences_and_sums() {
    assert_eq!(
        eval_num("DATEDIFF(DATE.DMY(1, 1, 2000), DATE.DMY(1, 1, 1999), 'years')"),
        1.0
    );
    assert_eq!(
        eval_num("DATEDIFF(DATE.DMY(30, 6, 2000), DATE.DMY(1, 1, 2000), 'months')"),
        5.0
    );
    assert_eq!(
        eval_num("DATEDIFF(DATE.DMY(8, 1, 2000), DATE.DMY(1, 1, 2000), 'days')"),
        7.0
    );
    // Summing one month from 31 Jan: closest stays in February, rollover
    // spills into March.
    assert_eq!(
        eval_num("XDATE.MDAY(DATESUM(DATE.DMY(31, 1, 2001), 1, 'months'))"),
        28.0
    );
    assert_eq!(
        eval_num("XDATE.MDAY(DATESUM(DATE.DMY(31, 1, 2001), 1, 'months', 'rollover'))"),
        3.0
    );
    let (value, messages) = eval_with("DATEDIFF(0, 0, 'fortnights')", false);
    assert_eq!(value, Value::Number(SYSMIS));
    assert!(
        messages.iter().any(|m| m.contains("Unrecognized date unit")),
        "{messages:?}"
    );
}

#[test]
fn distributions() {
    assert_eq!(eval_num("CDF.NORMAL(0, 0, 1)"), 0.5);
    assert!((eval_num("CDF.NORMAL(1.96, 0, 1)") - 0.975).abs() < 1e-3);
    assert!((eval_num("IDF.NORMAL(0.975, 0, 1)") - 1.96).abs() < 1e-2);
    assert!((eval_num("PDF.NORMAL(0, 0, 1)") - 0.3989).abs() < 1e-4);
    assert_eq!(eval_num("CDF.NORMAL(0, 0, -1)"), SYSMIS);
    assert_eq!(eval_num("CDF.UNIFORM(5, 0, 10)"), 0.5);
    assert_eq!(eval_num("IDF.UNIFORM(0.25, 0, 8)"), 2.0);
    assert!((eval_num("CDF.CHISQ(2, 2)") - (1.0 - (-1.0f64).exp())).abs() < 1e-9);
    assert!((eval_num("SIG.CHISQ(2, 2)") - (-1.0f64).exp()).abs() < 1e-9);
    assert_eq!(eval_num("CDF.T(0, 5)"), 0.5);
    assert_eq!(eval_num("CDF.CHISQ(-1, 2)"), SYSMIS);
}

#[test]
fn random_variates_use_the_context_rng() {
    let settings = Settings::default();
    let sink = Collector::new();
    let ctx = CompileContext::new(&settings, &sink);
    let expr = Expression::compile_any("RV.UNIFORM(0, 1)", &ctx, true).unwrap();
    let mut scratch = Scratch::new();

    let mut first = EvalContext::new(&settings);
    let a = expr.evaluate_number(&mut first, &mut scratch);
    assert!((0.0..1.0).contains(&a));

    // Same seed, same stream.
    let mut second = EvalContext::new(&settings);
    let b = expr.evaluate_number(&mut second, &mut scratch);
    assert_eq!(a, b);

    // Consecutive draws from one context differ.
    let c = expr.evaluate_number(&mut second, &mut scratch);
    assert_ne!(b, c);
}

#[test]
fn record_access() {
    let mut dict = Dictionary::new();
    let a = dict.create_var("a", 0).unwrap();
    let b = dict.create_var("b", 0).unwrap();
    let c = dict.create_var("c", 0).unwrap();
    let s = dict.create_var("s", 4).unwrap();
    dict.create_vector("v", vec![a, b, c]).unwrap();

    let mut case = Case::new(&dict);
    case.set_number(a, 3.0);
    case.set_number(b, 2.0);
    case.set_number(c, 1.0);
    case.set_string(&dict, s, "hi");

    let settings = Settings::default();
    let sink = Collector::new();
    let ctx = CompileContext::new(&settings, &sink).with_dict(&dict);
    let mut scratch = Scratch::new();

    let expr = Expression::compile_any("a > b AND b > c", &ctx, true).unwrap();
    assert_eq!(expr.result_type(), ResultType::Boolean);
    let mut eval_ctx = EvalContext::new(&settings).with_case(&dict, &case);
    assert_eq!(expr.evaluate_number(&mut eval_ctx, &mut scratch), 1.0);

    let expr = Expression::compile_any("v(2) * 10", &ctx, true).unwrap();
    let mut eval_ctx = EvalContext::new(&settings).with_case(&dict, &case);
    assert_eq!(expr.evaluate_number(&mut eval_ctx, &mut scratch), 20.0);

    let expr = Expression::compile_any("s = 'hi'", &ctx, true).unwrap();
    let mut eval_ctx = EvalContext::new(&settings).with_case(&dict, &case);
    assert_eq!(expr.evaluate_number(&mut eval_ctx, &mut scratch), 1.0);
}

#[test]
fn vector_index_out_of_range_diagnoses() {
    let mut dict = Dictionary::new();
    let a = dict.create_var("a", 0).unwrap();
    dict.create_vector("v", vec![a]).unwrap();
    let mut case = Case::new(&dict);
    case.set_number(a, 42.0);

    let settings = Settings::default();
    let sink = Collector::new();
    let ctx = CompileContext::new(&settings, &sink).with_dict(&dict);
    let mut scratch = Scratch::new();

    for source in ["v(0)", "v(2)", "v(1.5)"] {
        let expr = Expression::compile_any(source, &ctx, true).unwrap();
        let mut eval_ctx = EvalContext::new(&settings)
            .with_case(&dict, &case)
            .with_sink(&sink);
        assert_eq!(expr.evaluate_number(&mut eval_ctx, &mut scratch), SYSMIS);
    }
    assert_eq!(sink.messages().len(), 3);
    assert!(sink.messages()[0].contains("outside the valid range"));
}

#[test]
fn user_missing_classification() {
    let mut dict = Dictionary::new();
    let x = dict.create_var("x", 0).unwrap();
    dict.var_mut(x).missing.values.push(9.0);

    let mut case = Case::new(&dict);
    case.set_number(x, 9.0);

    let settings = Settings::default();
    let sink = Collector::new();
    let ctx = CompileContext::new(&settings, &sink).with_dict(&dict);
    let mut scratch = Scratch::new();

    // A plain reference maps user-missing to the sentinel...
    let expr = Expression::compile_any("MISSING(x)", &ctx, true).unwrap();
    let mut eval_ctx = EvalContext::new(&settings).with_case(&dict, &case);
    assert_eq!(expr.evaluate_number(&mut eval_ctx, &mut scratch), 1.0);

    // ...but VALUE bypasses the classification...
    let expr = Expression::compile_any("VALUE(x)", &ctx, true).unwrap();
    let mut eval_ctx = EvalContext::new(&settings).with_case(&dict, &case);
    assert_eq!(expr.evaluate_number(&mut eval_ctx, &mut scratch), 9.0);

    // ...and SYSMIS(x) tests the raw record value.
    let expr = Expression::compile_any("SYSMIS(x)", &ctx, true).unwrap();
    let mut eval_ctx = EvalContext::new(&settings).with_case(&dict, &case);
    assert_eq!(expr.evaluate_number(&mut eval_ctx, &mut scratch), 0.0);
}

#[test]
fn sysmis_of_missing_variable_is_true() {
    let mut dict = Dictionary::new();
    dict.create_var("x", 0).unwrap();
    let case = Case::new(&dict); // Numeric variables default to missing.

    let settings = Settings::default();
    let sink = Collector::new();
    let ctx = CompileContext::new(&settings, &sink).with_dict(&dict);
    let expr = Expression::compile_any("SYSMIS(x)", &ctx, true).unwrap();
    let mut scratch = Scratch::new();
    let mut eval_ctx = EvalContext::new(&settings).with_case(&dict, &case);
    assert_eq!(expr.evaluate_number(&mut eval_ctx, &mut scratch), 1.0);
}

#[test]
fn lag_reads_earlier_records() {
    let mut dict = Dictionary::new();
    let x = dict.create_var("x", 0).unwrap();

    let settings = Settings::default();
    let sink = Collector::new();
    let ctx = CompileContext::new(&settings, &sink).with_dict(&dict);
    let expr = Expression::compile_any("LAG(x)", &ctx, true).unwrap();
    let expr2 = Expression::compile_any("LAG(x, 2)", &ctx, true).unwrap();
    assert_eq!(expr2.max_lag(), 2);

    let mut window = LagWindow::new(2);
    let mut scratch = Scratch::new();
    let mut results = Vec::new();
    for i in 1..=3 {
        let mut case = Case::new(&dict);
        case.set_number(x, i as f64);
        {
            let mut eval_ctx = EvalContext::new(&settings).with_case(&dict, &case);
            eval_ctx.lookback = Some(&window);
            results.push((
                expr.evaluate_number(&mut eval_ctx, &mut scratch),
                expr2.evaluate_number(&mut eval_ctx, &mut scratch),
            ));
        }
        window.push(case);
    }
    assert_eq!(
        results,
        vec![(SYSMIS, SYSMIS), (1.0, SYSMIS), (2.0, 1.0)]
    );
}

#[test]
fn casenum_comes_from_the_context() {
    let mut dict = Dictionary::new();
    dict.create_var("x", 0).unwrap();
    let case = Case::new(&dict);

    let settings = Settings::default();
    let sink = Collector::new();
    let ctx = CompileContext::new(&settings, &sink).with_dict(&dict);
    let expr = Expression::compile_any("$CASENUM", &ctx, true).unwrap();
    let mut scratch = Scratch::new();
    let mut eval_ctx = EvalContext::new(&settings).with_case(&dict, &case);
    eval_ctx.case_num = 7.0;
    assert_eq!(expr.evaluate_number(&mut eval_ctx, &mut scratch), 7.0);
}

#[test]
#[should_panic(expected = "record must be supplied")]
fn record_free_program_rejects_a_record_mismatch() {
    let mut dict = Dictionary::new();
    dict.create_var("x", 0).unwrap();

    let settings = Settings::default();
    let sink = Collector::new();
    let ctx = CompileContext::new(&settings, &sink).with_dict(&dict);
    let expr = Expression::compile_any("x + 1", &ctx, true).unwrap();
    // Compiled against a dictionary, evaluated without a record.
    let mut scratch = Scratch::new();
    let mut eval_ctx = EvalContext::new(&settings);
    expr.evaluate(&mut eval_ctx, &mut scratch);
}

#[test]
fn string_results_pad_into_caller_buffers() {
    let settings = Settings::default();
    let sink = Collector::new();
    let ctx = CompileContext::new(&settings, &sink);
    let expr = Expression::compile_any("'abc'", &ctx, true).unwrap();
    let mut scratch = Scratch::new();

    let mut wide = [0u8; 5];
    let mut eval_ctx = EvalContext::new(&settings);
    expr.evaluate_string_into(&mut eval_ctx, &mut scratch, &mut wide);
    assert_eq!(&wide, b"abc  ");

    let mut narrow = [0u8; 2];
    expr.evaluate_string_into(&mut eval_ctx, &mut scratch, &mut narrow);
    assert_eq!(&narrow, b"ab");
}

#[test]
fn shared_program_evaluates_concurrently() {
    let settings = Settings::default();
    let sink = Collector::new();
    let ctx = CompileContext::new(&settings, &sink);
    let expr = Expression::compile_any("SQRT(4) + 2", &ctx, true).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let settings = Settings::default();
                let mut eval_ctx = EvalContext::new(&settings);
                let mut scratch = Scratch::new();
                assert_eq!(expr.evaluate_number(&mut eval_ctx, &mut scratch), 4.0);
            });
        }
    });
}
