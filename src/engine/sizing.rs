//! Fixed-fractional position sizing.
//!
//! Converts a stop distance and account balance into an order volume under
//! the broker's lot constraints. The stop distance is always rounded up to
//! whole pips so the realized risk can never exceed the budget through
//! rounding alone.

use crate::types::{Side, SymbolInfo};

/// How raw volume is snapped to the broker's lot step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeRounding {
    /// Round to the nearest step (standard sizing)
    Nearest,
    /// Round down (budget-strict variants that must never exceed risk)
    Down,
}

/// Stop distance in price units for the given side.
///
/// Returns `None` when the distance is not strictly positive — an invalid
/// stop is a "do not trade" sentinel, never an error.
pub fn stop_distance(entry_price: f64, stop_price: f64, side: Side) -> Option<f64> {
    let distance = match side {
        Side::Long => entry_price - stop_price,
        Side::Short => stop_price - entry_price,
    };
    (distance > 0.0 && distance.is_finite()).then_some(distance)
}

/// Snap a raw volume to the broker's lot step.
pub fn quantize_volume(raw: f64, symbol: &SymbolInfo, rounding: VolumeRounding) -> f64 {
    if symbol.volume_step <= 0.0 {
        return raw;
    }
    let steps = raw / symbol.volume_step;
    let steps = match rounding {
        VolumeRounding::Nearest => steps.round(),
        VolumeRounding::Down => steps.floor(),
    };
    steps * symbol.volume_step
}

/// Volume that risks `risk_percent` of `balance` over the given stop
/// distance.
///
/// Pips are rounded up, the raw volume is quantized to the lot step, and the
/// result is clamped to the broker maximum. Returns `None` (do not trade)
/// when the inputs are degenerate or the quantized volume falls below the
/// broker minimum.
pub fn volume_for_risk(
    risk_percent: f64,
    stop_distance: f64,
    balance: f64,
    symbol: &SymbolInfo,
    rounding: VolumeRounding,
) -> Option<f64> {
    if risk_percent <= 0.0 || stop_distance <= 0.0 || balance <= 0.0 {
        return None;
    }
    if symbol.pip_size <= 0.0 || symbol.pip_value <= 0.0 {
        return None;
    }

    let risk_money = balance * risk_percent / 100.0;
    let pips = (stop_distance / symbol.pip_size).ceil();
    let raw = risk_money / (pips * symbol.pip_value);
    if !raw.is_finite() {
        return None;
    }

    let volume = quantize_volume(raw, symbol, rounding).min(symbol.max_volume);
    (volume >= symbol.min_volume && volume > 0.0).then_some(volume)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eurusd() -> SymbolInfo {
        SymbolInfo {
            pip_size: 0.0001,
            pip_value: 0.0001, // per unit of volume
            min_volume: 1_000.0,
            max_volume: 10_000_000.0,
            volume_step: 1_000.0,
        }
    }

    #[test]
    fn test_stop_distance_signs() {
        let long = stop_distance(1.1050, 1.1020, Side::Long).unwrap();
        assert!((long - 0.0030).abs() < 1e-9);
        let short = stop_distance(1.1050, 1.1080, Side::Short).unwrap();
        assert!((short - 0.0030).abs() < 1e-9);
        // Stop on the wrong side is invalid, not a trade
        assert_eq!(stop_distance(1.1050, 1.1080, Side::Long), None);
        assert_eq!(stop_distance(1.1050, 1.1050, Side::Long), None);
    }

    #[test]
    fn test_volume_for_risk_basic() {
        // 1% of 10k = $100 risk; 30 pips at $0.0001/pip/unit = $0.003/unit
        // raw = 100 / 0.003 = 33333.3 -> nearest step = 33000
        let vol = volume_for_risk(1.0, 0.0030, 10_000.0, &eurusd(), VolumeRounding::Nearest);
        assert_eq!(vol, Some(33_000.0));

        let vol = volume_for_risk(1.0, 0.0030, 10_000.0, &eurusd(), VolumeRounding::Down);
        assert_eq!(vol, Some(33_000.0));
    }

    #[test]
    fn test_pips_round_up() {
        // 30.2 pips rounds up to 31, shrinking the volume
        let symbol = eurusd();
        let vol = volume_for_risk(1.0, 0.00302, 10_000.0, &symbol, VolumeRounding::Down).unwrap();
        let risk = vol * (0.00302 / symbol.pip_size).ceil() * symbol.pip_value;
        assert!(risk <= 100.0);
    }

    #[test]
    fn test_risk_never_exceeds_budget() {
        let symbol = eurusd();
        for (pct, dist, balance) in [
            (1.0, 0.0030, 10_000.0),
            (2.0, 0.0015, 25_000.0),
            (0.5, 0.0101, 100_000.0),
            (3.0, 0.0007, 5_000.0),
        ] {
            if let Some(vol) = volume_for_risk(pct, dist, balance, &symbol, VolumeRounding::Down) {
                let pips = (dist / symbol.pip_size).ceil();
                let risk = vol * pips * symbol.pip_value;
                let budget = balance * pct / 100.0;
                assert!(risk <= budget + 1e-9, "risk {risk} exceeds budget {budget}");
            }
        }
    }

    #[test]
    fn test_below_minimum_rejected() {
        // Tiny balance produces volume below the 1000-unit minimum
        let vol = volume_for_risk(1.0, 0.0030, 100.0, &eurusd(), VolumeRounding::Nearest);
        assert_eq!(vol, None);
    }

    #[test]
    fn test_clamped_to_maximum() {
        let mut symbol = eurusd();
        symbol.max_volume = 20_000.0;
        let vol = volume_for_risk(1.0, 0.0030, 10_000.0, &symbol, VolumeRounding::Nearest);
        assert_eq!(vol, Some(20_000.0));
    }

    #[test]
    fn test_degenerate_inputs_rejected() {
        let symbol = eurusd();
        assert_eq!(volume_for_risk(0.0, 0.0030, 10_000.0, &symbol, VolumeRounding::Nearest), None);
        assert_eq!(volume_for_risk(1.0, 0.0, 10_000.0, &symbol, VolumeRounding::Nearest), None);
        assert_eq!(volume_for_risk(1.0, 0.0030, 0.0, &symbol, VolumeRounding::Nearest), None);
    }
}
