//! SVG charts of a backtested series.
//!
//! The main chart has two panels. Top: close and SMA with BUY, SELL and EXIT
//! markers. Bottom: z-score with the entry bands and the zero line. Two
//! smaller charts show weekly realized gains as bars and the cumulative
//! signal-following return curve.

use crate::domain::error::MeanRevertError;
use crate::domain::metrics::WeeklyPnl;
use crate::domain::signal::{cumulative_strategy_returns, AnnotatedPoint, Signal};
use crate::domain::trade::{Trade, TradeKind};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

const WIDTH: f64 = 900.0;
const PRICE_HEIGHT: f64 = 300.0;
const Z_HEIGHT: f64 = 160.0;
const GAP: f64 = 30.0;
const PADDING: f64 = 40.0;
const SMALL_HEIGHT: f64 = 220.0;

/// Linear map from a value range onto a vertical pixel band.
struct Scale {
    min: f64,
    factor: f64,
    bottom: f64,
}

impl Scale {
    fn new(values: impl Iterator<Item = f64>, top: f64, height: f64) -> Self {
        let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        let (min, max) = if min.is_finite() { (min, max) } else { (0.0, 1.0) };
        let range = max - min;
        Scale {
            min,
            factor: if range > 0.0 { height / range } else { 1.0 },
            bottom: top + height,
        }
    }

    fn y(&self, value: f64) -> f64 {
        self.bottom - (value - self.min) * self.factor
    }
}

fn polyline(points: &[(f64, f64)], color: &str) -> String {
    let coords: Vec<String> = points
        .iter()
        .map(|(x, y)| format!("{:.1},{:.1}", x, y))
        .collect();
    format!(
        r#"<polyline fill="none" stroke="{}" stroke-width="1" points="{}"/>"#,
        color,
        coords.join(" ")
    )
}

fn hline(y: f64, color: &str) -> String {
    format!(
        r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{}" stroke-dasharray="4 3"/>"#,
        PADDING,
        y,
        WIDTH - PADDING,
        y,
        color
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Opening tag, white background and title.
fn open_svg(height: f64, title: &str) -> String {
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{:.0}" height="{:.0}" viewBox="0 0 {:.0} {:.0}">"#,
        WIDTH, height, WIDTH, height
    );
    svg.push_str(r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = write!(
        svg,
        r#"<text x="{:.0}" y="{:.0}" font-size="14">{}</text>"#,
        PADDING,
        PADDING / 2.0,
        escape(title)
    );
    svg
}

fn placeholder(mut svg: String, message: &str) -> String {
    let _ = write!(
        svg,
        r#"<text x="50%" y="50%" text-anchor="middle">{}</text></svg>"#,
        message
    );
    svg
}

pub fn render_chart(
    symbol: &str,
    points: &[AnnotatedPoint],
    trades: &[Trade],
    z_entry: f64,
) -> String {
    let height = PADDING * 2.0 + PRICE_HEIGHT + GAP + Z_HEIGHT;
    let mut svg = open_svg(height, &format!("{symbol} close, SMA and z-score"));
    if points.is_empty() {
        return placeholder(svg, "No data available.");
    }

    let plot_width = WIDTH - 2.0 * PADDING;
    let scale_x = if points.len() > 1 {
        plot_width / (points.len() - 1) as f64
    } else {
        0.0
    };
    let x = |i: usize| PADDING + i as f64 * scale_x;

    let price_top = PADDING;
    let price = Scale::new(
        points
            .iter()
            .flat_map(|p| std::iter::once(p.close).chain(p.sma)),
        price_top,
        PRICE_HEIGHT,
    );

    let close_line: Vec<(f64, f64)> = points
        .iter()
        .enumerate()
        .map(|(i, p)| (x(i), price.y(p.close)))
        .collect();
    let sma_line: Vec<(f64, f64)> = points
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.sma.map(|s| (x(i), price.y(s))))
        .collect();
    svg.push_str(&polyline(&close_line, "black"));
    svg.push_str(&polyline(&sma_line, "orange"));

    for (i, p) in points.iter().enumerate() {
        let (cx, cy) = (x(i), price.y(p.close));
        match p.signal {
            Signal::Buy => {
                let _ = write!(
                    svg,
                    r#"<polygon class="buy" fill="green" points="{:.1},{:.1} {:.1},{:.1} {:.1},{:.1}"/>"#,
                    cx, cy - 6.0, cx - 5.0, cy + 4.0, cx + 5.0, cy + 4.0
                );
            }
            Signal::Sell => {
                let _ = write!(
                    svg,
                    r#"<polygon class="sell" fill="red" points="{:.1},{:.1} {:.1},{:.1} {:.1},{:.1}"/>"#,
                    cx, cy + 6.0, cx - 5.0, cy - 4.0, cx + 5.0, cy - 4.0
                );
            }
            Signal::Hold => {}
        }
    }

    for trade in trades.iter().filter(|t| t.kind == TradeKind::Exit) {
        if let Some(i) = points.iter().position(|p| p.timestamp == trade.timestamp) {
            let _ = write!(
                svg,
                r#"<circle class="exit" cx="{:.1}" cy="{:.1}" r="4" fill="none" stroke="blue"/>"#,
                x(i),
                price.y(trade.price)
            );
        }
    }

    let z_top = PADDING + PRICE_HEIGHT + GAP;
    let z = Scale::new(
        points
            .iter()
            .filter_map(|p| p.z_score)
            .chain([z_entry, -z_entry]),
        z_top,
        Z_HEIGHT,
    );
    let z_line: Vec<(f64, f64)> = points
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.z_score.map(|v| (x(i), z.y(v))))
        .collect();
    svg.push_str(&polyline(&z_line, "purple"));
    svg.push_str(&hline(z.y(z_entry), "red"));
    svg.push_str(&hline(z.y(-z_entry), "green"));
    svg.push_str(&hline(z.y(0.0), "gray"));

    svg.push_str("</svg>");
    svg
}

/// Weekly realized P&L as bars around a zero line, green for gains and red
/// for losses.
pub fn render_weekly_chart(symbol: &str, weeks: &[WeeklyPnl]) -> String {
    let mut svg = open_svg(SMALL_HEIGHT, &format!("{symbol} weekly gains/losses"));
    if weeks.is_empty() {
        return placeholder(svg, "No EXIT trades.");
    }

    let plot_height = SMALL_HEIGHT - 2.0 * PADDING;
    let scale = Scale::new(
        weeks.iter().map(|w| w.pnl).chain([0.0]),
        PADDING,
        plot_height,
    );
    let slot = (WIDTH - 2.0 * PADDING) / weeks.len() as f64;
    let bar_width = (slot * 0.7).max(1.0);
    let zero = scale.y(0.0);

    for (i, week) in weeks.iter().enumerate() {
        let y = scale.y(week.pnl);
        let (class, color) = if week.pnl >= 0.0 {
            ("gain", "green")
        } else {
            ("loss", "red")
        };
        let left = PADDING + i as f64 * slot + (slot - bar_width) / 2.0;
        let _ = write!(
            svg,
            r#"<rect class="{}" fill="{}" x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}"><title>{} {:.2}</title></rect>"#,
            class,
            color,
            left,
            y.min(zero),
            bar_width,
            (y - zero).abs(),
            week.week_start,
            week.pnl
        );
        let _ = write!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" font-size="9" text-anchor="middle">{}</text>"#,
            left + bar_width / 2.0,
            SMALL_HEIGHT - PADDING / 2.0,
            week.week_start.format("%m-%d")
        );
    }
    svg.push_str(&hline(zero, "gray"));
    svg.push_str("</svg>");
    svg
}

/// Cumulative growth of the signal-following return curve with a baseline
/// at 1.0.
pub fn render_returns_chart(symbol: &str, points: &[AnnotatedPoint]) -> String {
    let mut svg = open_svg(SMALL_HEIGHT, &format!("{symbol} cumulative strategy returns"));
    let curve = cumulative_strategy_returns(points);
    if curve.is_empty() {
        return placeholder(svg, "No data available.");
    }

    let scale = Scale::new(
        curve.iter().copied().chain([1.0]),
        PADDING,
        SMALL_HEIGHT - 2.0 * PADDING,
    );
    let step = if curve.len() > 1 {
        (WIDTH - 2.0 * PADDING) / (curve.len() - 1) as f64
    } else {
        0.0
    };
    let line: Vec<(f64, f64)> = curve
        .iter()
        .enumerate()
        .map(|(i, &g)| (PADDING + i as f64 * step, scale.y(g)))
        .collect();
    svg.push_str(&polyline(&line, "steelblue"));
    svg.push_str(&hline(scale.y(1.0), "gray"));
    svg.push_str("</svg>");
    svg
}

fn write_svg(path: &Path, svg: String) -> Result<(), MeanRevertError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, svg)?;
    Ok(())
}

pub fn write_chart(
    path: &Path,
    symbol: &str,
    points: &[AnnotatedPoint],
    trades: &[Trade],
    z_entry: f64,
) -> Result<(), MeanRevertError> {
    write_svg(path, render_chart(symbol, points, trades, z_entry))
}

pub fn write_weekly_chart(path: &Path, symbol: &str, weeks: &[WeeklyPnl]) -> Result<(), MeanRevertError> {
    write_svg(path, render_weekly_chart(symbol, weeks))
}

pub fn write_returns_chart(
    path: &Path,
    symbol: &str,
    points: &[AnnotatedPoint],
) -> Result<(), MeanRevertError> {
    write_svg(path, render_returns_chart(symbol, points))
}
