//! Small numerically-stable math utilities used by the classifier and weights.

/// Stable `log(1 + exp(x))`.
///
/// Branchless: `log(1+exp(x)) = max(x,0) + log(1+exp(-|x|))`.
#[inline]
pub fn log1pexp(x: f64) -> f64 {
    let e = (-x.abs()).exp(); // always in (0, 1], no overflow
    x.max(0.0) + e.ln_1p()
}

/// Stable sigmoid: `1 / (1 + exp(-x))`.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    let e = (-x.abs()).exp();
    let recip = 1.0 / (1.0 + e);
    // x <  0: sigmoid = exp(x)/(1+exp(x)) = e/(1+e)
    if x >= 0.0 { recip } else { e * recip }
}

/// Fused `(log(1+exp(x)), sigmoid(x))` with a single `exp()` call.
///
/// Binary cross-entropy from a logit `eta` with target `t` is
/// `log(1+exp(eta)) - t*eta` and its derivative is `sigmoid(eta) - t`, so the
/// training loop needs both for every event.
#[inline(always)]
pub fn log1pexp_and_sigmoid(x: f64) -> (f64, f64) {
    let e = (-x.abs()).exp();
    let log_term = x.max(0.0) + e.ln_1p();
    let recip = 1.0 / (1.0 + e);
    let sigma = if x >= 0.0 { recip } else { e * recip };
    (log_term, sigma)
}

/// Stable softplus: `log(1 + exp(x))`.
#[inline]
pub fn softplus(x: f64) -> f64 {
    log1pexp(x)
}

/// Log-odds `ln(p / (1 - p))`.
///
/// Returns `-inf` at `p = 0` and `+inf` at `p = 1`.
#[inline]
pub fn logit(p: f64) -> f64 {
    p.ln() - (-p).ln_1p()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log1pexp_matches_naive_moderate_values() {
        let xs: [f64; 7] = [-10.0, -2.0, -0.1, 0.0, 0.1, 2.0, 10.0];
        for x in xs {
            let naive = (1.0 + x.exp()).ln();
            let stable = log1pexp(x);
            assert!((naive - stable).abs() < 1e-12, "x={}: {} vs {}", x, naive, stable);
        }
    }

    #[test]
    fn test_log1pexp_is_finite_extremes() {
        for x in [-1e6, -100.0, 100.0, 1e6] {
            assert!(log1pexp(x).is_finite(), "x={}", x);
        }
        assert!((log1pexp(1e6) - 1e6).abs() < 1e-6);
    }

    #[test]
    fn test_sigmoid_bounds_and_symmetry() {
        for x in [-50.0, -10.0, -1.0, 0.0, 1.0, 10.0, 50.0] {
            let s = sigmoid(x);
            assert!((0.0..=1.0).contains(&s), "sigmoid({})={}", x, s);
            assert!((s + sigmoid(-x) - 1.0).abs() < 1e-15, "symmetry failed at {}", x);
        }
        assert_eq!(sigmoid(0.0), 0.5);
    }

    #[test]
    fn test_fused_matches_separate() {
        for x in [-50.0, -10.0, -2.0, -0.1, 0.0, 0.1, 2.0, 10.0, 50.0] {
            let (l, s) = log1pexp_and_sigmoid(x);
            assert!((l - log1pexp(x)).abs() < 1e-15, "log1pexp mismatch at x={}", x);
            assert!((s - sigmoid(x)).abs() < 1e-15, "sigmoid mismatch at x={}", x);
        }
    }

    #[test]
    fn test_logit_inverts_sigmoid() {
        for x in [-8.0, -1.5, 0.0, 0.7, 6.0] {
            assert!((logit(sigmoid(x)) - x).abs() < 1e-9, "x={}", x);
        }
        assert_eq!(logit(0.0), f64::NEG_INFINITY);
        assert_eq!(logit(1.0), f64::INFINITY);
    }
}
