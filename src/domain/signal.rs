//! Signal generation from a rolling z-score.
//!
//! Annotates each price point with its rolling SMA, sample standard
//! deviation, z-score and a discrete [`Signal`]. Two rules are available,
//! selected explicitly through [`SignalMode`]:
//!
//! - `LocalExtremum`: SELL at a z-score local maximum above `+z_entry`,
//!   BUY at a local minimum below `-z_entry`.
//! - `ThresholdCrossing`: SELL whenever `z > z_entry`, BUY whenever
//!   `z < -z_entry`.
//!
//! Points without a defined, non-zero standard deviation are always HOLD.

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

use super::error::MeanRevertError;
use super::price::PricePoint;
use super::rolling::rolling_stats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    pub fn is_entry(self) -> bool {
        matches!(self, Signal::Buy | Signal::Sell)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
            Signal::Hold => write!(f, "HOLD"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalMode {
    #[default]
    LocalExtremum,
    ThresholdCrossing,
}

impl FromStr for SignalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "extremum" | "local_extremum" => Ok(SignalMode::LocalExtremum),
            "threshold" | "threshold_crossing" => Ok(SignalMode::ThresholdCrossing),
            other => Err(format!(
                "unknown signal mode '{other}' (expected extremum or threshold)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalConfig {
    pub window: usize,
    pub z_entry: f64,
    pub mode: SignalMode,
}

impl SignalConfig {
    pub fn validate(&self) -> Result<(), MeanRevertError> {
        if self.window <= 1 {
            return Err(MeanRevertError::invalid_config(format!(
                "window must be greater than 1, got {}",
                self.window
            )));
        }
        if !(self.z_entry > 0.0) || !self.z_entry.is_finite() {
            return Err(MeanRevertError::invalid_config(format!(
                "z_entry must be positive, got {}",
                self.z_entry
            )));
        }
        Ok(())
    }
}

/// A price point carrying its rolling statistics and signal.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedPoint {
    pub timestamp: NaiveDateTime,
    pub close: f64,
    pub sma: Option<f64>,
    pub std: Option<f64>,
    pub z_score: Option<f64>,
    pub signal: Signal,
}

/// Annotate `series` with rolling statistics and signals.
///
/// Fails with `InsufficientData` when the series is shorter than the window,
/// and with `InvalidConfig` for a malformed `config`. The input is never
/// modified and the output depends only on the input and `config`.
pub fn compute(
    symbol: &str,
    series: &[PricePoint],
    config: &SignalConfig,
) -> Result<Vec<AnnotatedPoint>, MeanRevertError> {
    config.validate()?;
    if series.len() < config.window {
        return Err(MeanRevertError::InsufficientData {
            symbol: symbol.to_string(),
            points: series.len(),
            window: config.window,
        });
    }

    let closes: Vec<f64> = series.iter().map(|p| p.close).collect();
    let stats = rolling_stats(&closes, config.window);
    let z: Vec<Option<f64>> = stats
        .iter()
        .zip(&closes)
        .map(|(s, &close)| s.and_then(|s| s.z_score(close)))
        .collect();

    let annotated = series
        .iter()
        .enumerate()
        .map(|(i, point)| AnnotatedPoint {
            timestamp: point.timestamp,
            close: point.close,
            sma: stats[i].map(|s| s.sma),
            std: stats[i].map(|s| s.std),
            z_score: z[i],
            signal: classify(&z, i, config),
        })
        .collect();

    Ok(annotated)
}

fn classify(z: &[Option<f64>], i: usize, config: &SignalConfig) -> Signal {
    let Some(curr) = z[i] else {
        return Signal::Hold;
    };

    match config.mode {
        SignalMode::ThresholdCrossing => {
            if curr < -config.z_entry {
                Signal::Buy
            } else if curr > config.z_entry {
                Signal::Sell
            } else {
                Signal::Hold
            }
        }
        SignalMode::LocalExtremum => {
            if i < 2 {
                return Signal::Hold;
            }
            let (Some(prev2), Some(prev1)) = (z[i - 2], z[i - 1]) else {
                return Signal::Hold;
            };
            if prev2 < prev1 && prev1 > curr && curr > config.z_entry {
                Signal::Sell
            } else if prev2 > prev1 && prev1 < curr && curr < -config.z_entry {
                Signal::Buy
            } else {
                Signal::Hold
            }
        }
    }
}

/// Approximate signal-following return curve.
///
/// Each step earns the close-to-close return scaled by the previous point's
/// signal: +1 after BUY, -1 after SELL, 0 after HOLD. Returns the cumulative
/// growth factor at each point, starting from 1.0.
pub fn cumulative_strategy_returns(points: &[AnnotatedPoint]) -> Vec<f64> {
    let mut curve = Vec::with_capacity(points.len());
    let mut growth = 1.0;
    for (i, point) in points.iter().enumerate() {
        if i > 0 {
            let prev = &points[i - 1];
            let exposure = match prev.signal {
                Signal::Buy => 1.0,
                Signal::Sell => -1.0,
                Signal::Hold => 0.0,
            };
            if prev.close != 0.0 {
                let ret = point.close / prev.close - 1.0;
                growth *= 1.0 + ret * exposure;
            }
        }
        curve.push(growth);
    }
    curve
}
