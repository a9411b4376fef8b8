//! Rolling window statistics over closing prices.
//!
//! SMA(n)[i]    = sum(C[i-j] for j in 0..n) / n
//! STDDEV(n)[i] = sqrt(sum((C[i-j] - SMA(n)[i])^2 for j in 0..n) / (n - 1))
//! Warmup: first (n-1) points have no statistics.
//!
//! The standard deviation is the sample estimator (divisor n-1).

/// Standard deviations at or below this are treated as zero.
pub const MIN_STD: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollingStats {
    pub sma: f64,
    pub std: f64,
}

impl RollingStats {
    /// `(close - sma) / std`, or `None` when the window has no dispersion.
    pub fn z_score(&self, close: f64) -> Option<f64> {
        if self.std <= MIN_STD || !self.std.is_finite() {
            return None;
        }
        Some((close - self.sma) / self.std)
    }
}

/// Statistics for every point of `closes`; `None` during warmup.
///
/// Each window is evaluated in two passes (mean, then squared deviations)
/// so that a flat window yields a standard deviation of exactly zero.
pub fn rolling_stats(closes: &[f64], window: usize) -> Vec<Option<RollingStats>> {
    if window < 2 {
        return vec![None; closes.len()];
    }
    let warmup = window - 1;

    (0..closes.len())
        .map(|i| {
            if i < warmup {
                return None;
            }
            let slice = &closes[i + 1 - window..=i];
            let sma = slice.iter().sum::<f64>() / window as f64;
            let variance = slice
                .iter()
                .map(|c| {
                    let diff = c - sma;
                    diff * diff
                })
                .sum::<f64>()
                / (window - 1) as f64;
            Some(RollingStats {
                sma,
                std: variance.sqrt(),
            })
        })
        .collect()
}
