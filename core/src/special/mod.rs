//! Pure numeric kernels for the distribution operations.
//!
//! Domain violations return `None`; the evaluator maps that to the missing
//! sentinel without a diagnostic, because catalog parameter constraints
//! normally reject such arguments earlier.

use core::f64::consts::PI;

const EPS: f64 = 3.0e-16;
const MAX_ITER: usize = 300;

/// Natural log of the gamma function, for x > 0 (Lanczos approximation).
pub fn ln_gamma(x: f64) -> Option<f64> {
    if x <= 0.0 || !x.is_finite() {
        return None;
    }
    const G: [f64; 6] = [
        76.18009172947146,
        -86.50532032941677,
        24.01409824083091,
        -1.231739572450155,
        0.1208650973866179e-2,
        -0.5395239384953e-5,
    ];
    let mut ser = 1.000000000190015;
    let mut denom = x;
    for c in G {
        denom += 1.0;
        ser += c / denom;
    }
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    Some(-tmp + (2.5066282746310005 * ser / x).ln())
}

/// Regularized lower incomplete gamma P(a, x), a > 0, x >= 0.
pub fn gamma_p(a: f64, x: f64) -> Option<f64> {
    if a <= 0.0 || x < 0.0 {
        return None;
    }
    if x == 0.0 {
        return Some(0.0);
    }
    if x < a + 1.0 {
        // Series representation converges quickly here.
        let ln_ga = ln_gamma(a)?;
        let mut ap = a;
        let mut sum = 1.0 / a;
        let mut del = sum;
        for _ in 0..MAX_ITER {
            ap += 1.0;
            del *= x / ap;
            sum += del;
            if del.abs() < sum.abs() * EPS {
                break;
            }
        }
        Some(sum * (-x + a * x.ln() - ln_ga).exp())
    } else {
        gamma_q(a, x).map(|q| 1.0 - q)
    }
}

/// Regularized upper incomplete gamma Q(a, x) = 1 - P(a, x).
pub fn gamma_q(a: f64, x: f64) -> Option<f64> {
    if a <= 0.0 || x < 0.0 {
        return None;
    }
    if x < a + 1.0 {
        return gamma_p(a, x).map(|p| 1.0 - p);
    }
    // Continued fraction (modified Lentz).
    let ln_ga = ln_gamma(a)?;
    let tiny = 1.0e-300;
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / tiny;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..=MAX_ITER {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < tiny {
            d = tiny;
        }
        c = b + an / c;
        if c.abs() < tiny {
            c = tiny;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    Some((-x + a * x.ln() - ln_ga).exp() * h)
}

/// Regularized incomplete beta I_x(a, b), 0 <= x <= 1.
pub fn beta_i(a: f64, b: f64, x: f64) -> Option<f64> {
    if a <= 0.0 || b <= 0.0 || !(0.0..=1.0).contains(&x) {
        return None;
    }
    if x == 0.0 || x == 1.0 {
        return Some(x);
    }
    let ln_front =
        ln_gamma(a + b)? - ln_gamma(a)? - ln_gamma(b)? + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        Some(front * beta_cf(a, b, x) / a)
    } else {
        Some(1.0 - front * beta_cf(b, a, 1.0 - x) / b)
    }
}

/// Continued fraction for the incomplete beta (modified Lentz).
fn beta_cf(a: f64, b: f64, x: f64) -> f64 {
    let tiny = 1.0e-300;
    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < tiny {
        d = tiny;
    }
    d = 1.0 / d;
    let mut h = d;
    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;
        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < tiny {
            d = tiny;
        }
        c = 1.0 + aa / c;
        if c.abs() < tiny {
            c = tiny;
        }
        d = 1.0 / d;
        h *= d * c;
        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < tiny {
            d = tiny;
        }
        c = 1.0 + aa / c;
        if c.abs() < tiny {
            c = tiny;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Error function, via the incomplete gamma.
pub fn erf(x: f64) -> f64 {
    let p = gamma_p(0.5, x * x).unwrap_or(1.0);
    if x >= 0.0 { p } else { -p }
}

/// Standard normal density.
pub fn normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Standard normal CDF.
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / core::f64::consts::SQRT_2))
}

/// Standard normal quantile for 0 < p < 1 (Acklam's rational
/// approximation, polished with one Halley step).
pub fn normal_idf(p: f64) -> Option<f64> {
    if !(0.0..=1.0).contains(&p) || p == 0.0 || p == 1.0 {
        return None;
    }
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    let x = if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    let e = normal_cdf(x) - p;
    let u = e * (2.0 * PI).sqrt() * (x * x / 2.0).exp();
    Some(x - u / (1.0 + x * u / 2.0))
}

/// Chi-square CDF with `df` degrees of freedom.
pub fn chisq_cdf(x: f64, df: f64) -> Option<f64> {
    if x < 0.0 || df <= 0.0 {
        return None;
    }
    gamma_p(df / 2.0, x / 2.0)
}

/// Upper-tail chi-square significance.
pub fn chisq_sig(x: f64, df: f64) -> Option<f64> {
    if x < 0.0 || df <= 0.0 {
        return None;
    }
    gamma_q(df / 2.0, x / 2.0)
}

/// Chi-square density.
pub fn chisq_pdf(x: f64, df: f64) -> Option<f64> {
    if x < 0.0 || df <= 0.0 {
        return None;
    }
    if x == 0.0 {
        return Some(if df < 2.0 {
            f64::INFINITY
        } else if df == 2.0 {
            0.5
        } else {
            0.0
        });
    }
    let h = df / 2.0;
    Some(((h - 1.0) * x.ln() - x / 2.0 - h * core::f64::consts::LN_2 - ln_gamma(h)?).exp())
}

/// Student t CDF with `df` degrees of freedom.
pub fn t_cdf(x: f64, df: f64) -> Option<f64> {
    if df <= 0.0 {
        return None;
    }
    let ib = beta_i(df / 2.0, 0.5, df / (df + x * x))?;
    Some(if x >= 0.0 { 1.0 - ib / 2.0 } else { ib / 2.0 })
}

/// Student t density.
pub fn t_pdf(x: f64, df: f64) -> Option<f64> {
    if df <= 0.0 {
        return None;
    }
    let ln_norm = ln_gamma((df + 1.0) / 2.0)? - ln_gamma(df / 2.0)? - 0.5 * (df * PI).ln();
    Some((ln_norm - (df + 1.0) / 2.0 * (1.0 + x * x / df).ln()).exp())
}

/// F CDF with `df1`, `df2` degrees of freedom.
pub fn f_cdf(x: f64, df1: f64, df2: f64) -> Option<f64> {
    if x < 0.0 || df1 <= 0.0 || df2 <= 0.0 {
        return None;
    }
    beta_i(df1 / 2.0, df2 / 2.0, df1 * x / (df1 * x + df2))
}

/// Upper-tail F significance.
pub fn f_sig(x: f64, df1: f64, df2: f64) -> Option<f64> {
    f_cdf(x, df1, df2).map(|p| 1.0 - p)
}

/// F density.
pub fn f_pdf(x: f64, df1: f64, df2: f64) -> Option<f64> {
    if x < 0.0 || df1 <= 0.0 || df2 <= 0.0 {
        return None;
    }
    if x == 0.0 {
        return Some(if df1 < 2.0 {
            f64::INFINITY
        } else if df1 == 2.0 {
            1.0
        } else {
            0.0
        });
    }
    let h1 = df1 / 2.0;
    let h2 = df2 / 2.0;
    let ln_b = ln_gamma(h1)? + ln_gamma(h2)? - ln_gamma(h1 + h2)?;
    Some(
        (h1 * (df1 / df2).ln() + (h1 - 1.0) * x.ln()
            - (h1 + h2) * (1.0 + df1 * x / df2).ln()
            - ln_b)
            .exp(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{a} !~ {b}");
    }

    #[test]
    fn ln_gamma_integers() {
        // ln Γ(n) = ln (n-1)!
        close(ln_gamma(1.0).unwrap(), 0.0, 1e-12);
        close(ln_gamma(5.0).unwrap(), 24.0f64.ln(), 1e-10);
        assert!(ln_gamma(0.0).is_none());
    }

    #[test]
    fn normal_round_trip() {
        close(normal_cdf(0.0), 0.5, 1e-12);
        close(normal_cdf(1.959963984540054), 0.975, 1e-9);
        close(normal_idf(0.975).unwrap(), 1.959963984540054, 1e-9);
        close(normal_idf(normal_cdf(-0.7)).unwrap(), -0.7, 1e-9);
        assert!(normal_idf(0.0).is_none());
    }

    #[test]
    fn chisq_known_values() {
        // P(X <= df) for df = 2 is 1 - e^-1.
        close(chisq_cdf(2.0, 2.0).unwrap(), 1.0 - (-1.0f64).exp(), 1e-12);
        close(chisq_sig(2.0, 2.0).unwrap(), (-1.0f64).exp(), 1e-12);
        assert!(chisq_cdf(-1.0, 2.0).is_none());
    }

    #[test]
    fn t_symmetry() {
        close(t_cdf(0.0, 7.0).unwrap(), 0.5, 1e-12);
        let p = t_cdf(1.5, 7.0).unwrap();
        close(t_cdf(-1.5, 7.0).unwrap(), 1.0 - p, 1e-12);
    }

    #[test]
    fn f_against_t() {
        // T(df)^2 ~ F(1, df): P(F <= t^2) = P(|T| <= t).
        let t = 1.3;
        let df = 9.0;
        let p_f = f_cdf(t * t, 1.0, df).unwrap();
        let p_t = t_cdf(t, df).unwrap() - t_cdf(-t, df).unwrap();
        close(p_f, p_t, 1e-9);
    }
}
