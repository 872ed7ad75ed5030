//! Swing-structure trend classification.
//!
//! Works on a secondary (lower-frequency) bar series. A bar is a confirmed
//! pivot high when its high is the maximum across a symmetric window of
//! `strength` bars on each side; pivot lows mirror with the minimum. The
//! trend is read from the two most recent confirmed pivots of each kind:
//! higher highs plus higher lows is an uptrend, lower highs plus lower lows
//! a downtrend, anything else indeterminate.

use crate::types::Bar;

/// Prevailing trend as read from confirmed swing pivots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Indeterminate,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Up => write!(f, "UP"),
            Trend::Down => write!(f, "DOWN"),
            Trend::Indeterminate => write!(f, "INDETERMINATE"),
        }
    }
}

fn is_pivot_high(bars: &[Bar], idx: usize, strength: usize) -> bool {
    let high = bars[idx].high;
    (idx - strength..idx)
        .chain(idx + 1..=idx + strength)
        .all(|j| bars[j].high <= high)
}

fn is_pivot_low(bars: &[Bar], idx: usize, strength: usize) -> bool {
    let low = bars[idx].low;
    (idx - strength..idx)
        .chain(idx + 1..=idx + strength)
        .all(|j| bars[j].low >= low)
}

/// Classify the trend from the last bars of a secondary series.
///
/// Scans backward from the newest confirmable bar (the trailing `strength`
/// bars cannot be confirmed yet) down to `lookback` bars back, collecting
/// the two most recent confirmed pivot highs and lows. Returns `None` when
/// fewer than two of either kind exist within the bound — callers must fail
/// closed and treat that as "structure unknown, suppress entries".
pub fn classify_trend(bars: &[Bar], strength: usize, lookback: usize) -> Option<Trend> {
    if strength == 0 || bars.len() < 2 * strength + 1 {
        return None;
    }

    // Newest index with a full confirmation window on both sides
    let newest = bars.len() - 1 - strength;
    let oldest = newest.saturating_sub(lookback).max(strength);

    let mut highs: Vec<f64> = Vec::with_capacity(2); // newest first
    let mut lows: Vec<f64> = Vec::with_capacity(2);

    let mut idx = newest;
    loop {
        if highs.len() < 2 && is_pivot_high(bars, idx, strength) {
            highs.push(bars[idx].high);
        }
        if lows.len() < 2 && is_pivot_low(bars, idx, strength) {
            lows.push(bars[idx].low);
        }
        if (highs.len() == 2 && lows.len() == 2) || idx == oldest {
            break;
        }
        idx -= 1;
    }

    if highs.len() < 2 || lows.len() < 2 {
        return None;
    }

    let higher_highs = highs[0] > highs[1];
    let higher_lows = lows[0] > lows[1];
    let lower_highs = highs[0] < highs[1];
    let lower_lows = lows[0] < lows[1];

    Some(if higher_highs && higher_lows {
        Trend::Up
    } else if lower_highs && lower_lows {
        Trend::Down
    } else {
        Trend::Indeterminate
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    /// Zero-range bars walking through the given price path.
    fn path(prices: &[f64]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 6, 10, 13, 30, 0).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| Bar {
                timestamp: start + Duration::minutes(15 * i as i64),
                open: p,
                high: p,
                low: p,
                close: p,
            })
            .collect()
    }

    #[test]
    fn test_uptrend_from_higher_highs_and_lows() {
        // Zigzag: highs 12 then 13, lows 10 then 11
        let bars = path(&[
            10.0, 11.0, 12.0, 11.0, 10.0, 11.0, 12.0, 13.0, 12.0, 11.0, 12.0, 13.0, 14.0,
        ]);
        assert_eq!(classify_trend(&bars, 2, 50), Some(Trend::Up));
    }

    #[test]
    fn test_downtrend_from_lower_highs_and_lows() {
        let bars = path(&[
            14.0, 13.0, 12.0, 13.0, 14.0, 13.0, 12.0, 11.0, 12.0, 13.0, 12.0, 11.0, 10.0,
        ]);
        assert_eq!(classify_trend(&bars, 2, 50), Some(Trend::Down));
    }

    #[test]
    fn test_mixed_structure_is_indeterminate() {
        // Higher high but equal lows: neither pattern holds
        let bars = path(&[
            10.0, 11.0, 12.0, 11.0, 10.0, 11.0, 12.0, 13.0, 12.0, 11.0, 10.0, 11.0, 12.0, 13.0,
            14.0,
        ]);
        assert_eq!(classify_trend(&bars, 2, 50), Some(Trend::Indeterminate));
    }

    #[test]
    fn test_too_few_bars_is_insufficient() {
        let bars = path(&[10.0, 11.0, 12.0]);
        assert_eq!(classify_trend(&bars, 2, 50), None);
    }

    #[test]
    fn test_single_swing_is_insufficient() {
        // Only one pivot of each kind exists
        let bars = path(&[10.0, 11.0, 12.0, 11.0, 10.0, 11.0, 12.0]);
        assert_eq!(classify_trend(&bars, 2, 50), None);
    }

    #[test]
    fn test_lookback_bound_limits_the_scan() {
        // The older swing pair sits beyond a 4-bar lookback
        let bars = path(&[
            10.0, 11.0, 12.0, 11.0, 10.0, 11.0, 12.0, 13.0, 12.0, 11.0, 12.0, 13.0, 14.0,
        ]);
        assert_eq!(classify_trend(&bars, 2, 4), None);
    }

    #[test]
    fn test_recent_bars_are_not_confirmable() {
        // A fresh extreme inside the trailing `strength` bars is ignored:
        // the series ends with a spike that has no right-side window yet.
        let bars = path(&[
            10.0, 11.0, 12.0, 11.0, 10.0, 11.0, 12.0, 13.0, 12.0, 11.0, 12.0, 13.0, 20.0,
        ]);
        // Same classification as without the spike
        assert_eq!(classify_trend(&bars, 2, 50), Some(Trend::Up));
    }
}
