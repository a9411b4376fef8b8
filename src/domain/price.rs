//! Price point representation and session filtering.

use chrono::{NaiveDateTime, NaiveTime};

/// A single bar of the input series. Only `close` drives the strategy;
/// the remaining OHLCV fields are carried through when the source has them.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub timestamp: NaiveDateTime,
    pub close: f64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<i64>,
}

impl PricePoint {
    pub fn new(timestamp: NaiveDateTime, close: f64) -> Self {
        PricePoint {
            timestamp,
            close,
            open: None,
            high: None,
            low: None,
            volume: None,
        }
    }

    pub fn time_of_day(&self) -> NaiveTime {
        self.timestamp.time()
    }
}

/// A price the engine can size a position against: finite and above zero.
pub fn is_tradable_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Trading session bounds used to drop bars outside market hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Session {
    /// NSE cash-market hours, 09:15 to 15:30 inclusive.
    pub fn nse() -> Self {
        Session {
            start: NaiveTime::from_hms_opt(9, 15, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(15, 30, 0).unwrap_or(NaiveTime::MIN),
        }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.start && time <= self.end
    }
}

/// Keep only points inside `session`, then order ascending by timestamp and
/// drop duplicate timestamps (first occurrence wins).
pub fn restrict_to_session(points: Vec<PricePoint>, session: Session) -> Vec<PricePoint> {
    let mut kept: Vec<PricePoint> = points
        .into_iter()
        .filter(|p| session.contains(p.time_of_day()))
        .collect();
    kept.sort_by_key(|p| p.timestamp);
    kept.dedup_by_key(|p| p.timestamp);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn new_point_has_no_ohlv() {
        let p = PricePoint::new(at(9, 15), 2900.5);
        assert!((p.close - 2900.5).abs() < f64::EPSILON);
        assert!(p.open.is_none());
        assert!(p.volume.is_none());
        assert_eq!(p.time_of_day(), NaiveTime::from_hms_opt(9, 15, 0).unwrap());
    }

    #[test]
    fn nse_session_bounds_inclusive() {
        let s = Session::nse();
        assert!(s.contains(NaiveTime::from_hms_opt(9, 15, 0).unwrap()));
        assert!(s.contains(NaiveTime::from_hms_opt(15, 30, 0).unwrap()));
        assert!(!s.contains(NaiveTime::from_hms_opt(9, 10, 0).unwrap()));
        assert!(!s.contains(NaiveTime::from_hms_opt(15, 35, 0).unwrap()));
    }

    #[test]
    fn restrict_drops_out_of_session_and_sorts() {
        let points = vec![
            PricePoint::new(at(10, 0), 3.0),
            PricePoint::new(at(9, 0), 1.0),
            PricePoint::new(at(9, 30), 2.0),
            PricePoint::new(at(16, 0), 4.0),
        ];
        let kept = restrict_to_session(points, Session::nse());
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].timestamp, at(9, 30));
        assert_eq!(kept[1].timestamp, at(10, 0));
    }

    #[test]
    fn restrict_removes_duplicate_timestamps() {
        let points = vec![
            PricePoint::new(at(10, 0), 1.0),
            PricePoint::new(at(10, 0), 2.0),
        ];
        let kept = restrict_to_session(points, Session::nse());
        assert_eq!(kept.len(), 1);
    }
}
