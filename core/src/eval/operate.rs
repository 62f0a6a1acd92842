//! Per-operation evaluation logic.
//!
//! Every executable opcode has exactly one implementation here; the
//! optimizer's constant folding runs the same code by flattening and
//! evaluating constant subtrees, so compile-time and run-time results can
//! never drift apart.

use core::cmp::Ordering;

use bumpalo::Bump;
use rand::Rng;
use smallvec::SmallVec;

use super::{EvalContext, dates};
use crate::calendar;
use crate::catalog::Opcode;
use crate::data::{MAX_STRING, SYSMIS, Value, VarId, VectorId, count_valid, is_valid};
use crate::format::FmtSpec;
use crate::special;
use crate::syntax::Span;

/// One operation's popped arguments and inline operands, each in argument
/// order within its kind.
#[derive(Default)]
pub(super) struct Operands<'s> {
    pub nums: SmallVec<[f64; 4]>,
    pub strs: SmallVec<[&'s str; 4]>,
    pub ints: SmallVec<[i64; 2]>,
    pub formats: SmallVec<[FmtSpec; 1]>,
    pub vars: SmallVec<[VarId; 2]>,
    pub vectors: SmallVec<[VectorId; 1]>,
    pub num_array: SmallVec<[f64; 8]>,
    pub str_array: SmallVec<[&'s str; 4]>,
    pub span: Option<Span>,
    pub min_valid: usize,
}

/// Integer view of a number-stack argument declared `integer` in the
/// catalog.  Missing becomes `i64::MIN`, which no valid argument produces.
fn as_int(x: f64) -> i64 {
    if x == SYSMIS { i64::MIN } else { x as i64 }
}

fn boolean(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn opt(x: Option<f64>) -> Value<'static> {
    Value::Number(x.unwrap_or(SYSMIS))
}

fn alloc<'s>(bump: &'s Bump, s: &str) -> Value<'s> {
    Value::Str(bump.alloc_str(s))
}

/// Blank-padded string comparison: the shorter string is treated as if
/// padded with spaces to the longer one's length.
pub(crate) fn str_compare(a: &str, b: &str) -> Ordering {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let n = a.len().min(b.len());
    for i in 0..n {
        if a[i] != b[i] {
            return a[i].cmp(&b[i]);
        }
    }
    for &c in &a[n..] {
        if c != b' ' {
            return Ordering::Greater;
        }
    }
    for &c in &b[n..] {
        if c != b' ' {
            return Ordering::Less;
        }
    }
    Ordering::Equal
}

/// Largest index `<= limit` that is a character boundary of `s`.
fn floor_boundary(s: &str, limit: usize) -> usize {
    let mut i = limit.min(s.len());
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn truncate_to(s: &mut String, limit: usize) {
    let end = floor_boundary(s, limit);
    s.truncate(end);
}

fn substring<'s>(s: &'s str, ofs: f64, len: f64) -> &'s str {
    let ofs = as_int(ofs);
    if ofs < 1 || ofs as usize > s.len() {
        return "";
    }
    let start = floor_boundary(s, ofs as usize - 1);
    let len = as_int(len);
    if len <= 0 {
        return "";
    }
    let end = floor_boundary(s, start.saturating_add(len as usize));
    &s[start..end.max(start)]
}

/// Position of the earliest (or, from the right, latest) occurrence in
/// `haystack` of any `part_len`-byte section of `needles`; 0 when absent.
fn str_index(haystack: &str, needles: &str, part_len: i64, from_right: bool) -> f64 {
    if needles.is_empty() {
        return 0.0;
    }
    if part_len <= 0 || needles.len() as i64 % part_len != 0 {
        return SYSMIS;
    }
    let part_len = part_len as usize;
    let mut best: Option<usize> = None;
    for chunk in needles.as_bytes().chunks(part_len) {
        let h = haystack.as_bytes();
        let positions = (0..h.len().saturating_sub(part_len - 1)).filter(|&i| &h[i..i + part_len] == chunk);
        let found = if from_right {
            positions.last()
        } else {
            positions.clone().next()
        };
        if let Some(pos) = found {
            best = Some(match best {
                None => pos,
                Some(b) if from_right => b.max(pos),
                Some(b) => b.min(pos),
            });
        }
    }
    best.map_or(0.0, |pos| (pos + 1) as f64)
}

fn replace<'s>(bump: &'s Bump, haystack: &'s str, needle: &str, subst: &str, n: f64) -> Value<'s> {
    if needle.is_empty() || haystack.len() < needle.len() || n <= 0.0 || n == SYSMIS {
        return Value::Str(haystack);
    }
    let mut out = String::with_capacity(haystack.len());
    let mut rest = haystack;
    let mut left = n;
    while let Some(pos) = rest.find(needle) {
        out.push_str(&rest[..pos]);
        out.push_str(subst);
        rest = &rest[pos + needle.len()..];
        left -= 1.0;
        if left < 1.0 {
            break;
        }
    }
    out.push_str(rest);
    truncate_to(&mut out, MAX_STRING);
    alloc(bump, &out)
}

fn pad<'s>(
    bump: &'s Bump,
    ctx: &EvalContext<'_>,
    span: Option<Span>,
    s: &'s str,
    n_raw: f64,
    pad: &str,
    on_left: bool,
) -> Value<'s> {
    let n = as_int(n_raw);
    if n < 0 || n as usize > MAX_STRING {
        // A missing length already arrived as i64::MIN; only complain
        // about lengths the user actually wrote.
        if n != i64::MIN {
            ctx.warn(
                span,
                format!("The length argument to LPAD or RPAD must be between 0 and {MAX_STRING}."),
            );
        }
        return Value::Str(s);
    }
    if pad.len() != 1 {
        ctx.warn(
            span,
            "The padding argument to LPAD or RPAD must be exactly one byte long.".into(),
        );
        return Value::Str(s);
    }
    let n = n as usize;
    if s.len() >= n {
        return Value::Str(s);
    }
    let mut out = String::with_capacity(n);
    if on_left {
        for _ in 0..n - s.len() {
            out.push_str(pad);
        }
        out.push_str(s);
    } else {
        out.push_str(s);
        for _ in 0..n - s.len() {
            out.push_str(pad);
        }
    }
    alloc(bump, &out)
}

fn trim<'s>(s: &'s str, pad: &str, from_start: bool) -> &'s str {
    if pad.len() != 1 {
        return s;
    }
    let c = pad.as_bytes()[0] as char;
    if from_start {
        s.trim_start_matches(c)
    } else {
        s.trim_end_matches(c)
    }
}

// === Statistical helpers over numeric arrays ===

fn valid(xs: &[f64]) -> impl Iterator<Item = f64> + '_ {
    xs.iter().copied().filter(|&x| is_valid(x))
}

fn sum(xs: &[f64]) -> f64 {
    valid(xs).sum()
}

fn mean(xs: &[f64]) -> f64 {
    let n = count_valid(xs);
    if n == 0 { SYSMIS } else { sum(xs) / n as f64 }
}

fn variance(xs: &[f64]) -> f64 {
    let n = count_valid(xs);
    if n < 2 {
        return SYSMIS;
    }
    let m = mean(xs);
    valid(xs).map(|x| (x - m) * (x - m)).sum::<f64>() / (n - 1) as f64
}

fn median(xs: &[f64]) -> f64 {
    let mut v: Vec<f64> = valid(xs).collect();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = v.len();
    if n == 0 {
        SYSMIS
    } else if n % 2 == 1 {
        v[n / 2]
    } else {
        (v[n / 2 - 1] + v[n / 2]) / 2.0
    }
}

/// Fuzz-bit rounding shared by `RND` and `TRUNC`.
fn round_common(x: f64, mult: f64, fuzzbits: f64, default_fuzzbits: u32, adjustment: f64) -> f64 {
    let fuzzbits = if fuzzbits <= 0.0 {
        f64::from(default_fuzzbits)
    } else {
        fuzzbits
    };
    // f64 carries 53 mantissa bits.
    let adjustment = adjustment + (fuzzbits - 53.0).exp2();
    let x = x / mult;
    let rounded = if x >= 0.0 {
        (x + adjustment).floor()
    } else {
        -((-x + adjustment).floor())
    };
    rounded * mult
}

fn standard_normal(ctx: &mut EvalContext<'_>) -> f64 {
    // Box-Muller transform over the engine's explicit RNG state.
    let u1: f64 = 1.0 - ctx.rng.r#gen::<f64>();
    let u2: f64 = ctx.rng.r#gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (core::f64::consts::TAU * u2).cos()
}

fn vector_element(
    ctx: &EvalContext<'_>,
    o: &Operands<'_>,
    idx: f64,
) -> Result<VarId, ()> {
    let vector = ctx.vector(o.vectors[0]);
    let n = vector.vars.len();
    if idx != idx.trunc() || idx < 1.0 || idx > n as f64 {
        ctx.warn(
            o.span,
            format!(
                "An index value of {idx} is outside the valid range of 1 to {n} for vector {}.",
                vector.name
            ),
        );
        return Err(());
    }
    Ok(vector.vars[idx as usize - 1])
}

/// Applies one operation to its popped arguments.
pub(super) fn operate<'s>(
    op: Opcode,
    o: &Operands<'s>,
    ctx: &mut EvalContext<'_>,
    bump: &'s Bump,
) -> Value<'s> {
    use Opcode::*;

    match op {
        // === Arithmetic and logical operators ===
        Add => Value::Number(o.nums[0] + o.nums[1]),
        Sub => Value::Number(o.nums[0] - o.nums[1]),
        Mul => Value::Number(o.nums[0] * o.nums[1]),
        Div => Value::Number(o.nums[0] / o.nums[1]),
        Pow => {
            let (x, p) = (o.nums[0], o.nums[1]);
            // Missing base to the zeroth power is 1, and a zero base to a
            // missing power is 0.
            Value::Number(if x == SYSMIS {
                if p == 0.0 { 1.0 } else { SYSMIS }
            } else if p == SYSMIS {
                if x == 0.0 { 0.0 } else { SYSMIS }
            } else {
                x.powf(p)
            })
        }
        Neg => Value::Number(-o.nums[0]),
        Not => Value::Number(1.0 - o.nums[0]),
        And => {
            let (a, b) = (o.nums[0], o.nums[1]);
            Value::Number(if a == 0.0 || b == 0.0 {
                0.0
            } else if a == SYSMIS || b == SYSMIS {
                SYSMIS
            } else {
                1.0
            })
        }
        Or => {
            let (a, b) = (o.nums[0], o.nums[1]);
            Value::Number(if a == 1.0 || b == 1.0 {
                1.0
            } else if a == SYSMIS || b == SYSMIS {
                SYSMIS
            } else {
                0.0
            })
        }
        Eq => Value::Number(boolean(o.nums[0] == o.nums[1])),
        Ne => Value::Number(boolean(o.nums[0] != o.nums[1])),
        Lt => Value::Number(boolean(o.nums[0] < o.nums[1])),
        Le => Value::Number(boolean(o.nums[0] <= o.nums[1])),
        Gt => Value::Number(boolean(o.nums[0] > o.nums[1])),
        Ge => Value::Number(boolean(o.nums[0] >= o.nums[1])),
        EqStr => Value::Number(boolean(str_compare(o.strs[0], o.strs[1]) == Ordering::Equal)),
        NeStr => Value::Number(boolean(str_compare(o.strs[0], o.strs[1]) != Ordering::Equal)),
        LtStr => Value::Number(boolean(str_compare(o.strs[0], o.strs[1]) == Ordering::Less)),
        LeStr => Value::Number(boolean(str_compare(o.strs[0], o.strs[1]) != Ordering::Greater)),
        GtStr => Value::Number(boolean(str_compare(o.strs[0], o.strs[1]) == Ordering::Greater)),
        GeStr => Value::Number(boolean(str_compare(o.strs[0], o.strs[1]) != Ordering::Less)),

        // === Internal conversion operators ===
        ExprToBoolean | OperandToBoolean => {
            let x = o.nums[0];
            if x == 0.0 || x == 1.0 || x == SYSMIS {
                Value::Number(x)
            } else {
                ctx.warn(
                    o.span,
                    "A logical operand was found to have a value other than 0 (false), 1 \
                     (true), or the system-missing value.  The result was forced to 0."
                        .into(),
                );
                Value::Number(0.0)
            }
        }
        NumToInteger => {
            let x = o.nums[0];
            if x == x.trunc() && x.abs() < i32::MAX as f64 {
                Value::Number(x)
            } else {
                ctx.warn(
                    o.span,
                    format!(
                        "The value {x} is not a valid integer argument.  The result will be \
                         system-missing."
                    ),
                );
                Value::Number(SYSMIS)
            }
        }
        Square => Value::Number(o.nums[0] * o.nums[0]),

        // === Record access ===
        NumVar => {
            let x = ctx.case.unwrap().number(o.vars[0]);
            Value::Number(if ctx.var(o.vars[0]).missing.is_user_missing(x) {
                SYSMIS
            } else {
                x
            })
        }
        StrVar => alloc(bump, ctx.case.unwrap().string(o.vars[0])),
        Casenum => Value::Number(ctx.case_num),
        LagNum | LagNumN => {
            let n = o.ints.first().map_or(1, |&n| n as usize);
            match ctx.lookback.and_then(|lb| lb.lag(n)) {
                Some(case) => {
                    let x = case.number(o.vars[0]);
                    Value::Number(if ctx.var(o.vars[0]).missing.is_user_missing(x) {
                        SYSMIS
                    } else {
                        x
                    })
                }
                None => Value::Number(SYSMIS),
            }
        }
        LagStr | LagStrN => {
            let n = o.ints.first().map_or(1, |&n| n as usize);
            match ctx.lookback.and_then(|lb| lb.lag(n)) {
                Some(case) => alloc(bump, case.string(o.vars[0])),
                None => Value::Str(""),
            }
        }
        VecElemNumRaw => {
            if !is_valid(o.nums[0]) {
                return Value::Number(SYSMIS);
            }
            match vector_element(ctx, o, o.nums[0]) {
                Ok(var) => Value::Number(ctx.case.unwrap().number(var)),
                Err(()) => Value::Number(SYSMIS),
            }
        }
        VecElemNum => {
            if !is_valid(o.nums[0]) {
                return Value::Number(SYSMIS);
            }
            match vector_element(ctx, o, o.nums[0]) {
                Ok(var) => {
                    let x = ctx.case.unwrap().number(var);
                    Value::Number(if ctx.var(var).missing.is_user_missing(x) {
                        SYSMIS
                    } else {
                        x
                    })
                }
                Err(()) => Value::Number(SYSMIS),
            }
        }
        VecElemStr => {
            if !is_valid(o.nums[0]) {
                return Value::Str("");
            }
            match vector_element(ctx, o, o.nums[0]) {
                Ok(var) => alloc(bump, ctx.case.unwrap().string(var)),
                Err(()) => Value::Str(""),
            }
        }

        // === Mathematics ===
        Abs => Value::Number(o.nums[0].abs()),
        Arcos => {
            let x = o.nums[0];
            opt((-1.0..=1.0).contains(&x).then(|| x.acos()))
        }
        Arsin => {
            let x = o.nums[0];
            opt((-1.0..=1.0).contains(&x).then(|| x.asin()))
        }
        Artan | Atan => Value::Number(o.nums[0].atan()),
        Cos => Value::Number(o.nums[0].cos()),
        Sin => Value::Number(o.nums[0].sin()),
        Tan => Value::Number(o.nums[0].tan()),
        Exp => Value::Number(o.nums[0].exp()),
        Lg10 => {
            let x = o.nums[0];
            opt((x > 0.0).then(|| x.log10()))
        }
        Ln => {
            let x = o.nums[0];
            opt((x > 0.0).then(|| x.ln()))
        }
        Lngamma => opt(special::ln_gamma(o.nums[0])),
        Sqrt => {
            let x = o.nums[0];
            opt((x >= 0.0).then(|| x.sqrt()))
        }
        Mod => {
            let (n, d) = (o.nums[0], o.nums[1]);
            Value::Number(if n == 0.0 && d != SYSMIS {
                0.0
            } else if n == SYSMIS || d == SYSMIS || d == 0.0 {
                SYSMIS
            } else {
                n % d
            })
        }
        Mod10 => Value::Number(o.nums[0] % 10.0),
        Rnd1 => Value::Number(round_common(
            o.nums[0],
            1.0,
            0.0,
            ctx.settings.fuzzbits,
            0.5,
        )),
        Rnd2 | Rnd3 => {
            let mult = o.nums[1];
            let fuzzbits = o.nums.get(2).copied().unwrap_or(0.0);
            if mult == 0.0 || fuzzbits < 0.0 {
                Value::Number(SYSMIS)
            } else {
                Value::Number(round_common(
                    o.nums[0],
                    mult,
                    fuzzbits,
                    ctx.settings.fuzzbits,
                    0.5,
                ))
            }
        }
        Trunc1 => Value::Number(round_common(
            o.nums[0],
            1.0,
            0.0,
            ctx.settings.fuzzbits,
            0.0,
        )),
        Trunc2 | Trunc3 => {
            let mult = o.nums[1];
            let fuzzbits = o.nums.get(2).copied().unwrap_or(0.0);
            if mult == 0.0 || fuzzbits < 0.0 {
                Value::Number(SYSMIS)
            } else {
                Value::Number(round_common(
                    o.nums[0],
                    mult,
                    fuzzbits,
                    ctx.settings.fuzzbits,
                    0.0,
                ))
            }
        }

        // === Missing-value functions ===
        Missing | SysmisNum => Value::Number(boolean(o.nums[0] == SYSMIS)),
        SysmisVar => Value::Number(boolean(ctx.case.unwrap().number(o.vars[0]) == SYSMIS)),
        ValueVar => Value::Number(ctx.case.unwrap().number(o.vars[0])),
        ValueElem => Value::Number(o.nums[0]),
        Nvalid => Value::Number(count_valid(&o.num_array) as f64),
        Nmiss => Value::Number((o.num_array.len() - count_valid(&o.num_array)) as f64),

        // === Statistical aggregates ===
        Sum => Value::Number(if count_valid(&o.num_array) == 0 {
            SYSMIS
        } else {
            sum(&o.num_array)
        }),
        Mean => Value::Number(mean(&o.num_array)),
        Median => Value::Number(median(&o.num_array)),
        MinNum => opt(valid(&o.num_array).reduce(f64::min)),
        MaxNum => opt(valid(&o.num_array).reduce(f64::max)),
        Variance => Value::Number(variance(&o.num_array)),
        Sd => {
            let v = variance(&o.num_array);
            Value::Number(if v == SYSMIS { SYSMIS } else { v.sqrt() })
        }
        Cfvar => {
            let (m, v) = (mean(&o.num_array), variance(&o.num_array));
            Value::Number(if m == SYSMIS || v == SYSMIS {
                SYSMIS
            } else {
                v.sqrt() / m
            })
        }
        MinStr => Value::Str(
            o.str_array
                .iter()
                .copied()
                .min_by(|a, b| str_compare(a, b))
                .unwrap_or(""),
        ),
        MaxStr => Value::Str(
            o.str_array
                .iter()
                .copied()
                .max_by(|a, b| str_compare(a, b))
                .unwrap_or(""),
        ),

        // === Membership ===
        AnyNum => {
            let x = o.nums[0];
            if !is_valid(x) {
                return Value::Number(SYSMIS);
            }
            let mut saw_missing = false;
            for &v in &o.num_array {
                if !is_valid(v) {
                    saw_missing = true;
                } else if v == x {
                    return Value::Number(1.0);
                }
            }
            Value::Number(if saw_missing { SYSMIS } else { 0.0 })
        }
        AnyStr => Value::Number(boolean(
            o.str_array
                .iter()
                .any(|s| str_compare(o.strs[0], s) == Ordering::Equal),
        )),
        RangeNum => {
            let x = o.nums[0];
            if !is_valid(x) {
                return Value::Number(SYSMIS);
            }
            let mut saw_missing = false;
            for pair in o.num_array.chunks(2) {
                let (lo, hi) = (pair[0], pair[1]);
                if !is_valid(lo) || !is_valid(hi) {
                    saw_missing = true;
                } else if x >= lo && x <= hi {
                    return Value::Number(1.0);
                }
            }
            Value::Number(if saw_missing { SYSMIS } else { 0.0 })
        }
        RangeStr => Value::Number(boolean(o.str_array.chunks(2).any(|pair| {
            str_compare(o.strs[0], pair[0]) != Ordering::Less
                && str_compare(o.strs[0], pair[1]) != Ordering::Greater
        }))),

        // === String functions ===
        Length => Value::Number(o.strs[0].len() as f64),
        Lower => alloc(bump, &o.strs[0].to_ascii_lowercase()),
        Upcase => alloc(bump, &o.strs[0].to_ascii_uppercase()),
        Concat => {
            let mut out = std::string::String::new();
            for s in &o.str_array {
                out.push_str(s);
                if out.len() >= MAX_STRING {
                    truncate_to(&mut out, MAX_STRING);
                    break;
                }
            }
            alloc(bump, &out)
        }
        Index2 => Value::Number(str_index(
            o.strs[0],
            o.strs[1],
            o.strs[1].len() as i64,
            false,
        )),
        Index3 => Value::Number(str_index(o.strs[0], o.strs[1], as_int(o.nums[0]), false)),
        Rindex2 => Value::Number(str_index(
            o.strs[0],
            o.strs[1],
            o.strs[1].len() as i64,
            true,
        )),
        Rindex3 => Value::Number(str_index(o.strs[0], o.strs[1], as_int(o.nums[0]), true)),
        Lpad2 => pad(bump, ctx, o.span, o.strs[0], o.nums[0], " ", true),
        Lpad3 => pad(bump, ctx, o.span, o.strs[0], o.nums[0], o.strs[1], true),
        Rpad2 => pad(bump, ctx, o.span, o.strs[0], o.nums[0], " ", false),
        Rpad3 => pad(bump, ctx, o.span, o.strs[0], o.nums[0], o.strs[1], false),
        Ltrim1 => Value::Str(o.strs[0].trim_start_matches(' ')),
        Ltrim2 => Value::Str(trim(o.strs[0], o.strs[1], true)),
        Rtrim1 => Value::Str(o.strs[0].trim_end_matches(' ')),
        Rtrim2 => Value::Str(trim(o.strs[0], o.strs[1], false)),
        Strunc => {
            let n = as_int(o.nums[0]);
            if n == i64::MIN {
                return Value::Str("");
            }
            if n < 0 {
                ctx.warn(
                    o.span,
                    "The length argument to STRUNC must be nonnegative.".into(),
                );
                return Value::Str("");
            }
            let end = floor_boundary(o.strs[0], n as usize);
            Value::Str(o.strs[0][..end].trim_end_matches(' '))
        }
        Substr2 => Value::Str(substring(o.strs[0], o.nums[0], MAX_STRING as f64)),
        Substr3 => Value::Str(substring(o.strs[0], o.nums[0], o.nums[1])),
        Replace3 => replace(bump, o.strs[0], o.strs[1], o.strs[2], f64::MAX),
        Replace4 => replace(bump, o.strs[0], o.strs[1], o.strs[2], o.nums[0]),

        // === Format conversion ===
        NumberFn => {
            let spec = o.formats[0];
            match spec.parse_number(o.strs[0]) {
                Some(x) => Value::Number(x),
                None => {
                    ctx.warn(
                        o.span,
                        format!(
                            "The string `{}` could not be parsed with format {}.  The result \
                             will be system-missing.",
                            o.strs[0], spec
                        ),
                    );
                    Value::Number(SYSMIS)
                }
            }
        }
        StringFn => alloc(bump, &o.formats[0].format_number(o.nums[0])),

        // === Dates and times ===
        DateDmy => Value::Number(dates::ymd_to_date(ctx, o.nums[2], o.nums[1], o.nums[0])),
        DateMdy => Value::Number(dates::ymd_to_date(ctx, o.nums[2], o.nums[0], o.nums[1])),
        DateMoyr => Value::Number(dates::ymd_to_date(ctx, o.nums[1], o.nums[0], 1.0)),
        DateQyr => {
            let q = o.nums[0];
            if q != q.trunc() || !(1.0..=4.0).contains(&q) {
                ctx.warn(
                    None,
                    format!(
                        "The quarter argument to DATE.QYR must be an integer between 1 and 4 \
                         (not {q})."
                    ),
                );
                Value::Number(SYSMIS)
            } else {
                Value::Number(dates::ymd_to_date(ctx, o.nums[1], q * 3.0 - 2.0, 1.0))
            }
        }
        DateWkyr => Value::Number(dates::wkyr_to_date(ctx, o.nums[0], o.nums[1])),
        DateYrday => Value::Number(dates::yrday_to_date(ctx, o.nums[0], o.nums[1])),
        Yrmoda => Value::Number(dates::yrmoda(ctx, o.nums[0], o.nums[1], o.nums[2])),
        TimeDays => Value::Number(o.nums[0] * calendar::DAY_S),
        TimeHms => {
            let (h, m, s) = (o.nums[0], o.nums[1], o.nums[2]);
            if (h < 0.0 || m < 0.0 || s < 0.0) && (h > 0.0 || m > 0.0 || s > 0.0) {
                ctx.warn(
                    None,
                    "TIME.HMS cannot mix positive and negative arguments.".into(),
                );
                Value::Number(SYSMIS)
            } else {
                Value::Number(h * calendar::H_S + m * calendar::MIN_S + s)
            }
        }
        CtimeDays => Value::Number(o.nums[0] / calendar::DAY_S),
        CtimeHours => Value::Number(o.nums[0] / calendar::H_S),
        CtimeMinutes => Value::Number(o.nums[0] / calendar::MIN_S),
        CtimeSeconds => Value::Number(o.nums[0]),
        XdateDate => Value::Number((o.nums[0] / calendar::DAY_S).floor() * calendar::DAY_S),
        XdateHour => Value::Number(((o.nums[0] / calendar::H_S).floor()) % 24.0),
        XdateJday => {
            let (_, _, _, yday) = calendar::offset_to_gregorian(o.nums[0] / calendar::DAY_S);
            Value::Number(f64::from(yday))
        }
        XdateMday => {
            let (_, _, d, _) = calendar::offset_to_gregorian(o.nums[0] / calendar::DAY_S);
            Value::Number(f64::from(d))
        }
        XdateMinute => Value::Number(((o.nums[0] / calendar::MIN_S).floor()) % 60.0),
        XdateMonth => {
            let (_, m, _, _) = calendar::offset_to_gregorian(o.nums[0] / calendar::DAY_S);
            Value::Number(f64::from(m))
        }
        XdateQuarter => {
            let (_, m, _, _) = calendar::offset_to_gregorian(o.nums[0] / calendar::DAY_S);
            Value::Number(f64::from((m - 1) / 3 + 1))
        }
        XdateSecond => Value::Number(o.nums[0] % 60.0),
        XdateTday => Value::Number((o.nums[0] / calendar::DAY_S).trunc()),
        XdateTime => Value::Number(o.nums[0] - (o.nums[0] / calendar::DAY_S).floor() * calendar::DAY_S),
        XdateWeek => {
            let (_, _, _, yday) = calendar::offset_to_gregorian(o.nums[0] / calendar::DAY_S);
            Value::Number(f64::from((yday - 1) / 7 + 1))
        }
        XdateWkday => Value::Number(f64::from(calendar::offset_to_wkday(
            o.nums[0] / calendar::DAY_S,
        ))),
        XdateYear => {
            let (y, _, _, _) = calendar::offset_to_gregorian(o.nums[0] / calendar::DAY_S);
            Value::Number(f64::from(y))
        }
        Datediff => Value::Number(dates::date_difference(ctx, o.nums[1], o.nums[0], o.strs[0])),
        Datesum3 => Value::Number(dates::date_sum(ctx, o.nums[0], o.nums[1], o.strs[0], "closest")),
        Datesum4 => Value::Number(dates::date_sum(
            ctx,
            o.nums[0],
            o.nums[1],
            o.strs[0],
            o.strs[1],
        )),

        // === Distributions ===
        PdfNormal => {
            let (x, mu, sigma) = (o.nums[0], o.nums[1], o.nums[2]);
            opt((sigma > 0.0).then(|| special::normal_pdf((x - mu) / sigma) / sigma))
        }
        CdfNormal => {
            let (x, mu, sigma) = (o.nums[0], o.nums[1], o.nums[2]);
            opt((sigma > 0.0).then(|| special::normal_cdf((x - mu) / sigma)))
        }
        IdfNormal => {
            let (p, mu, sigma) = (o.nums[0], o.nums[1], o.nums[2]);
            opt(if sigma > 0.0 {
                special::normal_idf(p).map(|z| mu + sigma * z)
            } else {
                None
            })
        }
        RvNormal => {
            let (mu, sigma) = (o.nums[0], o.nums[1]);
            if sigma < 0.0 {
                Value::Number(SYSMIS)
            } else {
                let z = standard_normal(ctx);
                Value::Number(mu + sigma * z)
            }
        }
        Normal => {
            let sigma = o.nums[0];
            if sigma <= 0.0 {
                Value::Number(SYSMIS)
            } else {
                let z = standard_normal(ctx);
                Value::Number(sigma * z)
            }
        }
        PdfUniform => {
            let (x, a, b) = (o.nums[0], o.nums[1], o.nums[2]);
            opt((b > a).then(|| if x >= a && x <= b { 1.0 / (b - a) } else { 0.0 }))
        }
        CdfUniform => {
            let (x, a, b) = (o.nums[0], o.nums[1], o.nums[2]);
            opt((b >= a).then(|| {
                if x <= a {
                    0.0
                } else if x >= b {
                    1.0
                } else {
                    (x - a) / (b - a)
                }
            }))
        }
        IdfUniform => {
            let (p, a, b) = (o.nums[0], o.nums[1], o.nums[2]);
            opt(((0.0..=1.0).contains(&p) && b >= a).then(|| a + p * (b - a)))
        }
        RvUniform => {
            let (a, b) = (o.nums[0], o.nums[1]);
            let u: f64 = ctx.rng.r#gen();
            Value::Number(a + u * (b - a))
        }
        Uniform => {
            let b = o.nums[0];
            if b < 0.0 {
                Value::Number(SYSMIS)
            } else {
                let u: f64 = ctx.rng.r#gen();
                Value::Number(u * b)
            }
        }
        PdfExp => {
            let (x, a) = (o.nums[0], o.nums[1]);
            opt((a > 0.0 && x >= 0.0).then(|| a * (-a * x).exp()))
        }
        CdfExp => {
            let (x, a) = (o.nums[0], o.nums[1]);
            opt((a > 0.0 && x >= 0.0).then(|| 1.0 - (-a * x).exp()))
        }
        IdfExp => {
            let (p, a) = (o.nums[0], o.nums[1]);
            opt((a > 0.0 && (0.0..1.0).contains(&p)).then(|| -(1.0 - p).ln() / a))
        }
        PdfChisq => opt(special::chisq_pdf(o.nums[0], o.nums[1])),
        CdfChisq => opt(special::chisq_cdf(o.nums[0], o.nums[1])),
        SigChisq => opt(special::chisq_sig(o.nums[0], o.nums[1])),
        PdfT => opt(special::t_pdf(o.nums[0], o.nums[1])),
        CdfT => opt(special::t_cdf(o.nums[0], o.nums[1])),
        PdfF => opt(special::f_pdf(o.nums[0], o.nums[1], o.nums[2])),
        CdfF => opt(special::f_cdf(o.nums[0], o.nums[1], o.nums[2])),
        SigF => opt(special::f_sig(o.nums[0], o.nums[1], o.nums[2])),

        _ => unreachable!("{op:?} is not an executable operation"),
    }
}
