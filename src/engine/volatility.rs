//! Volatility regime classification.
//!
//! Decides, per day, whether the market is in a low/compressed volatility
//! regime. The structure trend filter only applies while this classifier
//! reports "active": in a quiet market swing structure is trusted, in a
//! volatile one it is bypassed. Insufficient daily history always defaults
//! to active (conservative: keep the filter on).

use crate::config::StructureFilterMode;
use crate::types::Bar;

/// Daily ATR as a percentage of the mean close, over the last `window`
/// fully closed daily bars.
///
/// True range = max(high-low, |high-prev close|, |low-prev close|). Needs
/// `window + 1` bars for the seed close; returns `None` otherwise.
pub fn atr_percent(daily: &[Bar], window: usize) -> Option<f64> {
    if window == 0 || daily.len() < window + 1 {
        return None;
    }
    let slice = &daily[daily.len() - (window + 1)..];

    let mut sum_tr = 0.0;
    let mut sum_close = 0.0;
    for pair in slice.windows(2) {
        let prev_close = pair[0].close;
        let bar = &pair[1];
        let tr = (bar.high - bar.low)
            .max((bar.high - prev_close).abs())
            .max((bar.low - prev_close).abs());
        sum_tr += tr;
        sum_close += bar.close;
    }

    let atr = sum_tr / window as f64;
    let mean_close = sum_close / window as f64;
    if mean_close <= 0.0 {
        return None;
    }
    Some(atr / mean_close * 100.0)
}

/// Whether the structure filter applies today under the given mode.
pub fn filter_active(mode: &StructureFilterMode, daily: &[Bar]) -> bool {
    match *mode {
        StructureFilterMode::Disabled => false,

        StructureFilterMode::Fixed { atr_days, threshold_pct } => {
            match atr_percent(daily, atr_days) {
                Some(pct) => pct <= threshold_pct,
                None => true,
            }
        }

        StructureFilterMode::Auto { atr_days, sma_days, multiplier } => {
            if sma_days == 0 {
                return true;
            }
            let Some(today) = atr_percent(daily, atr_days) else {
                return true;
            };

            // SMA of ATR%, recomputed for each day in the longer window
            let mut sum = 0.0;
            for back in 0..sma_days {
                if back > daily.len() {
                    return true;
                }
                let end = daily.len() - back;
                match atr_percent(&daily[..end], atr_days) {
                    Some(pct) => sum += pct,
                    None => return true,
                }
            }
            let sma = sum / sma_days as f64;
            if sma <= 0.0 {
                return true;
            }
            today / sma <= multiplier
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    /// Daily bars with the given (high, low, close) triples, one per day.
    fn daily_bars(rows: &[(f64, f64, f64)]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 21, 0, 0).unwrap();
        rows.iter()
            .enumerate()
            .map(|(i, &(high, low, close))| Bar {
                timestamp: start + Duration::days(i as i64),
                open: close,
                high,
                low,
                close,
            })
            .collect()
    }

    #[test]
    fn test_atr_percent_flat_ranges() {
        // Four bars of range 2.0 around close 100 => ATR% = 2.0
        let bars = daily_bars(&[(101.0, 99.0, 100.0); 4]);
        let pct = atr_percent(&bars, 3).unwrap();
        assert!((pct - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_atr_percent_uses_gap_over_range() {
        // Second bar gaps: |high - prev close| dominates the bar range
        let bars = daily_bars(&[(101.0, 99.0, 100.0), (106.0, 104.0, 105.0)]);
        let pct = atr_percent(&bars, 1).unwrap();
        // TR = max(2, |106-100|, |104-100|) = 6 against close 105
        assert!((pct - 6.0 / 105.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_insufficient_data_is_none_and_conservative() {
        let bars = daily_bars(&[(101.0, 99.0, 100.0); 3]);
        assert_eq!(atr_percent(&bars, 3), None);

        let fixed = StructureFilterMode::Fixed { atr_days: 3, threshold_pct: 1.5 };
        assert!(filter_active(&fixed, &bars));

        let auto = StructureFilterMode::Auto { atr_days: 3, sma_days: 5, multiplier: 0.8 };
        assert!(filter_active(&auto, &bars));
    }

    #[test]
    fn test_fixed_mode_thresholds() {
        let bars = daily_bars(&[(101.0, 99.0, 100.0); 6]);

        // ATR% 2.0 above threshold 1.5: high volatility bypasses the filter
        let loose = StructureFilterMode::Fixed { atr_days: 3, threshold_pct: 1.5 };
        assert!(!filter_active(&loose, &bars));

        // Threshold above ATR%: compressed regime, filter applies
        let tight = StructureFilterMode::Fixed { atr_days: 3, threshold_pct: 2.5 };
        assert!(filter_active(&tight, &bars));
    }

    #[test]
    fn test_disabled_mode_never_active() {
        assert!(!filter_active(&StructureFilterMode::Disabled, &[]));
    }

    #[test]
    fn test_auto_mode_detects_compression() {
        // Ten wide-range days followed by three narrow ones: today's ATR%
        // sits well below its own recent average
        let mut rows = vec![(104.0, 96.0, 100.0); 10];
        rows.extend_from_slice(&[(100.5, 99.5, 100.0); 3]);
        let bars = daily_bars(&rows);

        let auto = StructureFilterMode::Auto { atr_days: 3, sma_days: 8, multiplier: 0.8 };
        assert!(filter_active(&auto, &bars));

        // The same history with no compression stays near ratio 1.0
        let steady = daily_bars(&vec![(104.0, 96.0, 100.0); 13]);
        assert!(!filter_active(&auto, &steady));
    }
}
