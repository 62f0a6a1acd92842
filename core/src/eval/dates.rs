//! Date construction and arithmetic for the `DATE.*`, `YRMODA`,
//! `DATEDIFF` and `DATESUM` operations.
//!
//! Dates are seconds since the calendar epoch.  Out-of-range components
//! are reported and yield the missing value; they never abort evaluation.

use super::EvalContext;
use crate::calendar::{
    self, DAY_S, WEEK_DAY, days_in_month, gregorian_to_offset, offset_to_gregorian,
};
use crate::data::SYSMIS;

/// Converts integral year/month/day arguments to a day offset, reporting
/// and returning missing for fractional or out-of-range components.
pub(super) fn ymd_to_ofs(ctx: &EvalContext<'_>, year: f64, month: f64, day: f64) -> f64 {
    let (y, m, d) = (year as i64, month as i64, day as i64);
    if y as f64 != year || m as f64 != month || d as f64 != day {
        ctx.warn(
            None,
            "One of the arguments to a DATE function is not an integer.  The result will be \
             system-missing."
                .into(),
        );
        return SYSMIS;
    }
    match gregorian_to_offset(y as i32, m as i32, d as i32) {
        Ok(ofs) => ofs,
        Err(error) => {
            ctx.warn(None, error);
            SYSMIS
        }
    }
}

pub(super) fn ymd_to_date(ctx: &EvalContext<'_>, year: f64, month: f64, day: f64) -> f64 {
    let ofs = ymd_to_ofs(ctx, year, month, day);
    if ofs == SYSMIS { SYSMIS } else { ofs * DAY_S }
}

pub(super) fn wkyr_to_date(ctx: &EvalContext<'_>, week: f64, year: f64) -> f64 {
    let w = week as i64;
    if w as f64 != week {
        ctx.warn(
            None,
            "The week argument to DATE.WKYR is not an integer.  The result will be \
             system-missing."
                .into(),
        );
        SYSMIS
    } else if !(1..=53).contains(&w) {
        ctx.warn(
            None,
            "The week argument to DATE.WKYR is outside the acceptable range of 1 to 53.  \
             The result will be system-missing."
                .into(),
        );
        SYSMIS
    } else {
        let jan1 = ymd_to_ofs(ctx, year, 1.0, 1.0);
        if jan1 == SYSMIS {
            SYSMIS
        } else {
            DAY_S * (jan1 + WEEK_DAY * (w - 1) as f64)
        }
    }
}

pub(super) fn yrday_to_date(ctx: &EvalContext<'_>, year: f64, yday: f64) -> f64 {
    let yd = yday as i64;
    if yd as f64 != yday {
        ctx.warn(
            None,
            "The day argument to DATE.YRDAY is not an integer.  The result will be \
             system-missing."
                .into(),
        );
        SYSMIS
    } else if !(1..=366).contains(&yd) {
        ctx.warn(
            None,
            "The day argument to DATE.YRDAY is outside the acceptable range of 1 to 366.  \
             The result will be system-missing."
                .into(),
        );
        SYSMIS
    } else {
        let jan1 = ymd_to_ofs(ctx, year, 1.0, 1.0);
        if jan1 == SYSMIS {
            SYSMIS
        } else {
            DAY_S * (jan1 + (yd - 1) as f64)
        }
    }
}

/// `YRMODA` returns a day offset, not seconds; two-digit years land in the
/// twentieth century.
pub(super) fn yrmoda(ctx: &EvalContext<'_>, year: f64, month: f64, day: f64) -> f64 {
    let year = if (0.0..=99.0).contains(&year) {
        year + 1900.0
    } else {
        year
    };
    if year > 47516.0 {
        ctx.warn(
            None,
            "The year argument to YRMODA is greater than 47516.  The result will be \
             system-missing."
                .into(),
        );
        return SYSMIS;
    }
    ymd_to_ofs(ctx, year, month, day)
}

/// A date-difference or date-sum unit.
#[derive(Clone, Copy, PartialEq, Eq)]
enum DateUnit {
    Years,
    Quarters,
    Months,
    Weeks,
    Days,
    Hours,
    Minutes,
    Seconds,
}

fn recognize_unit(ctx: &EvalContext<'_>, name: &str) -> Option<DateUnit> {
    const UNITS: [(&str, DateUnit); 8] = [
        ("years", DateUnit::Years),
        ("quarters", DateUnit::Quarters),
        ("months", DateUnit::Months),
        ("weeks", DateUnit::Weeks),
        ("days", DateUnit::Days),
        ("hours", DateUnit::Hours),
        ("minutes", DateUnit::Minutes),
        ("seconds", DateUnit::Seconds),
    ];
    let trimmed = name.trim_end_matches(' ');
    for (unit_name, unit) in UNITS {
        if trimmed.eq_ignore_ascii_case(unit_name) {
            return Some(unit);
        }
    }
    ctx.warn(
        None,
        format!(
            "Unrecognized date unit `{trimmed}'.  Valid date units are `years', `quarters', \
             `months', `weeks', `days', `hours', `minutes', and `seconds'."
        ),
    );
    None
}

fn unit_duration(unit: DateUnit) -> f64 {
    match unit {
        DateUnit::Weeks => calendar::WEEK_S,
        DateUnit::Days => calendar::DAY_S,
        DateUnit::Hours => calendar::H_S,
        DateUnit::Minutes => calendar::MIN_S,
        DateUnit::Seconds => 1.0,
        _ => unreachable!("calendar units have no fixed duration"),
    }
}

/// Whole years from `date1` to `date2` (`date2 >= date1`), a year meaning
/// the same or later month, day, and time of day.
fn year_diff(date1: f64, date2: f64) -> f64 {
    debug_assert!(date2 >= date1);
    let (y1, m1, d1, _) = offset_to_gregorian(date1 / DAY_S);
    let (y2, m2, d2, _) = offset_to_gregorian(date2 / DAY_S);
    let mut diff = i64::from(y2) - i64::from(y1);
    if diff > 0 {
        let yd1 = 32 * m1 + d1;
        let yd2 = 32 * m2 + d2;
        if yd2 < yd1 || (yd2 == yd1 && date2 % DAY_S < date1 % DAY_S) {
            diff -= 1;
        }
    }
    diff as f64
}

/// Whole months from `date1` to `date2` (`date2 >= date1`).
fn month_diff(date1: f64, date2: f64) -> f64 {
    debug_assert!(date2 >= date1);
    let (y1, m1, d1, _) = offset_to_gregorian(date1 / DAY_S);
    let (y2, m2, d2, _) = offset_to_gregorian(date2 / DAY_S);
    let mut diff = (i64::from(y2) * 12 + i64::from(m2)) - (i64::from(y1) * 12 + i64::from(m1));
    if diff > 0 && (d2 < d1 || (d2 == d1 && date2 % DAY_S < date1 % DAY_S)) {
        diff -= 1;
    }
    diff as f64
}

fn quarter_diff(date1: f64, date2: f64) -> f64 {
    (month_diff(date1, date2) / 3.0).trunc()
}

/// Span from `date1` to `date2` in the named unit, truncated toward zero.
pub(super) fn date_difference(ctx: &EvalContext<'_>, date1: f64, date2: f64, unit: &str) -> f64 {
    let Some(unit) = recognize_unit(ctx, unit) else {
        return SYSMIS;
    };
    let ordered = |f: fn(f64, f64) -> f64| {
        if date2 >= date1 {
            f(date1, date2)
        } else {
            -f(date2, date1)
        }
    };
    match unit {
        DateUnit::Years => ordered(year_diff),
        DateUnit::Quarters => ordered(quarter_diff),
        DateUnit::Months => ordered(month_diff),
        _ => ((date2 - date1) / unit_duration(unit)).trunc(),
    }
}

/// How day-of-month overflow resolves when adding months.
#[derive(Clone, Copy, PartialEq, Eq)]
enum SumMethod {
    /// Roll extra days into the next month.
    Rollover,
    /// Use the last day of the month.
    Closest,
}

fn recognize_method(ctx: &EvalContext<'_>, name: &str) -> Option<SumMethod> {
    let trimmed = name.trim_end_matches(' ');
    if trimmed.eq_ignore_ascii_case("closest") {
        Some(SumMethod::Closest)
    } else if trimmed.eq_ignore_ascii_case("rollover") {
        Some(SumMethod::Rollover)
    } else {
        ctx.warn(
            None,
            "Invalid DATESUM method.  Valid choices are `closest' and `rollover'.".into(),
        );
        None
    }
}

fn add_months(ctx: &EvalContext<'_>, date: f64, months: f64, method: SumMethod) -> f64 {
    let months = months as i64;
    let (y, m, d, _) = offset_to_gregorian(date / DAY_S);
    let mut y = i64::from(y) + months / 12;
    let mut m = i64::from(m) + months % 12;
    if m < 1 {
        m += 12;
        y -= 1;
    } else if m > 12 {
        m -= 12;
        y += 1;
    }
    debug_assert!((1..=12).contains(&m));

    let mut d = i64::from(d);
    if method == SumMethod::Closest && d > i64::from(days_in_month(y as i32, m as i32)) {
        d = i64::from(days_in_month(y as i32, m as i32));
    }

    // Anchoring on the first of the month lets a rolled-over day spill
    // into the following month.
    match gregorian_to_offset(y as i32, m as i32, 1) {
        Ok(first) => (first + (d - 1) as f64) * DAY_S + date % DAY_S,
        Err(error) => {
            ctx.warn(None, error);
            SYSMIS
        }
    }
}

/// `date` advanced by `quantity` of `unit`, with day-of-month overflow
/// resolved by `method` (`closest` when the caller omitted it).
pub(super) fn date_sum(
    ctx: &EvalContext<'_>,
    date: f64,
    quantity: f64,
    unit: &str,
    method: &str,
) -> f64 {
    let Some(unit) = recognize_unit(ctx, unit) else {
        return SYSMIS;
    };
    let Some(method) = recognize_method(ctx, method) else {
        return SYSMIS;
    };
    match unit {
        DateUnit::Years => add_months(ctx, date, quantity.trunc() * 12.0, method),
        DateUnit::Quarters => add_months(ctx, date, quantity.trunc() * 3.0, method),
        DateUnit::Months => add_months(ctx, date, quantity.trunc(), method),
        _ => date + quantity * unit_duration(unit),
    }
}
