#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use meanrevert::domain::backtest::BacktestConfig;
use meanrevert::domain::error::MeanRevertError;
pub use meanrevert::domain::price::PricePoint;
use meanrevert::domain::signal::{AnnotatedPoint, Signal};
use meanrevert::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PricePoint>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_prices(mut self, symbol: &str, points: Vec<PricePoint>) -> Self {
        self.data.insert(symbol.to_string(), points);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_prices(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PricePoint>, MeanRevertError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(MeanRevertError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|points| {
                points
                    .iter()
                    .filter(|p| {
                        let d = p.timestamp.date();
                        start.is_none_or(|s| d >= s) && end.is_none_or(|e| d <= e)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, MeanRevertError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// 2024-06-03 (a Monday) at `h:m`.
pub fn at(h: u32, m: u32) -> NaiveDateTime {
    date(2024, 6, 3).and_hms_opt(h, m, 0).unwrap()
}

pub const BARS_PER_DAY: usize = 75;

/// Five-minute bars from 09:15 on 2024-06-03, 75 per day (09:15 to 15:25),
/// rolling over to the next calendar day.
pub fn series(closes: &[f64]) -> Vec<PricePoint> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let day = (i / BARS_PER_DAY) as i64;
            let slot = (i % BARS_PER_DAY) as i64;
            PricePoint::new(
                at(9, 15) + Duration::days(day) + Duration::minutes(5 * slot),
                close,
            )
        })
        .collect()
}

/// Deterministic noisy oscillation around 100, enough to trigger both
/// entry sides repeatedly.
pub fn wave_closes(count: usize) -> Vec<f64> {
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    (0..count)
        .map(|i| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let noise = ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5;
            100.0 + 5.0 * (i as f64 / 6.0).sin() + noise
        })
        .collect()
}

/// A point with explicit statistics for driving the engine directly.
pub fn annotated(time: NaiveDateTime, close: f64, z: Option<f64>, signal: Signal) -> AnnotatedPoint {
    AnnotatedPoint {
        timestamp: time,
        close,
        sma: z.map(|_| close),
        std: z.map(|_| 1.0),
        z_score: z,
        signal,
    }
}

pub fn sample_config() -> BacktestConfig {
    BacktestConfig {
        window: 5,
        ..BacktestConfig::default()
    }
}
