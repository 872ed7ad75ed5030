//! Engine configuration.
//!
//! Flat, serde-loadable option surface. Malformed string options (entry
//! cutoff, trailing tier list) recover to safe defaults with a warning and
//! are never fatal.

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Fallback entry cutoff applied when the configured string fails to parse.
pub const DEFAULT_ENTRY_CUTOFF: &str = "11:00";

/// Market-structure filter operating mode.
///
/// Controls when the swing-structure trend check gates entries: never,
/// whenever absolute daily volatility is below a fixed threshold, or
/// whenever current volatility is compressed relative to its own history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StructureFilterMode {
    /// Structure check never applies
    Disabled,
    /// Structure check applies while daily ATR% <= threshold
    Fixed { atr_days: usize, threshold_pct: f64 },
    /// Structure check applies while today's ATR% / its own SMA <= multiplier
    Auto { atr_days: usize, sma_days: usize, multiplier: f64 },
}

/// One trailing tier: once favorable excursion reaches `trigger_r`
/// R-multiples, the stop moves to `target_r` R from entry (0 = breakeven).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingTier {
    pub trigger_r: f64,
    pub target_r: f64,
}

/// Configuration for the decision engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Label attached to every order so the engine only manages its own
    pub label: String,

    /// Risk per trade as percent of balance
    pub risk_percent: f64,

    /// Risk percent used while defensive mode is active
    pub defensive_risk_percent: f64,

    /// Floating drawdown percent that activates defensive mode (0 disables)
    pub drawdown_threshold_pct: f64,

    /// Pips added beyond the signal bar extreme when placing the stop
    pub stop_offset_pips: f64,

    /// Take-profit distance as a multiple of the stop distance (0 = no target)
    pub target_r: f64,

    /// R-multiple that triggers the 50% partial exit (0 disables)
    pub partial_exit_r: f64,

    /// Maximum positions opened per local trading day
    pub daily_trade_limit: u32,

    /// Local time-of-day ("HH:mm") after which the first trade of the day
    /// may no longer be opened
    pub entry_cutoff: String,

    /// Seconds before session close at which all positions are flattened
    /// (clamped to 5..=900)
    pub close_buffer_secs: i64,

    /// Opening-range window in minutes; entries wait for it when > 0
    pub signal_window_minutes: i64,

    /// Trailing tiers as "trigger,target,trigger,target,..." in R-multiples
    pub trailing_tiers: String,

    /// Market-structure filter mode
    pub structure_filter: StructureFilterMode,

    /// Bars required on each side of a swing pivot to confirm it
    pub pivot_strength: usize,

    /// Maximum secondary-timeframe bars scanned backward for pivots
    pub pivot_lookback_bars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            label: "session-engine".to_string(),
            risk_percent: 1.0,
            defensive_risk_percent: 0.5,
            drawdown_threshold_pct: 6.0,
            stop_offset_pips: 2.0,
            target_r: 1.5,
            partial_exit_r: 0.0, // off unless the product variant enables it
            daily_trade_limit: 1,
            entry_cutoff: DEFAULT_ENTRY_CUTOFF.to_string(),
            close_buffer_secs: 60,
            signal_window_minutes: 0,
            trailing_tiers: String::new(),
            structure_filter: StructureFilterMode::Disabled,
            pivot_strength: 3,
            pivot_lookback_bars: 120,
        }
    }
}

impl EngineConfig {
    /// Parse the entry cutoff, falling back to [`DEFAULT_ENTRY_CUTOFF`].
    pub fn cutoff_time(&self) -> NaiveTime {
        parse_cutoff(&self.entry_cutoff)
    }

    /// Parse the trailing tier string into an ascending tier list.
    pub fn tiers(&self) -> Vec<TrailingTier> {
        parse_tiers(&self.trailing_tiers)
    }

    /// Close buffer clamped to the supported 5..=900 second range.
    pub fn close_buffer(&self) -> Duration {
        Duration::seconds(self.close_buffer_secs.clamp(5, 900))
    }

    /// Opening-range window duration (zero when disabled).
    pub fn signal_window(&self) -> Duration {
        Duration::minutes(self.signal_window_minutes.max(0))
    }
}

/// Parse an "HH:mm" cutoff, recovering to the default on malformed input.
pub fn parse_cutoff(spec: &str) -> NaiveTime {
    match NaiveTime::parse_from_str(spec.trim(), "%H:%M") {
        Ok(t) => t,
        Err(_) => {
            warn!(
                "invalid entry cutoff '{}', falling back to {}",
                spec, DEFAULT_ENTRY_CUTOFF
            );
            NaiveTime::from_hms_opt(11, 0, 0).expect("valid fallback time")
        }
    }
}

/// Parse "trigger,target,trigger,target,..." into tiers sorted by trigger.
///
/// Any malformed token, odd token count, or negative value discards the
/// whole list: trailing simply stays off rather than running half a ladder.
pub fn parse_tiers(spec: &str) -> Vec<TrailingTier> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let mut values = Vec::new();
    for token in trimmed.split(',') {
        match token.trim().parse::<f64>() {
            Ok(v) if v >= 0.0 && v.is_finite() => values.push(v),
            _ => {
                warn!("invalid trailing tier token '{}', ignoring tier list", token);
                return Vec::new();
            }
        }
    }

    if values.len() % 2 != 0 {
        warn!("trailing tier list has an odd token count, ignoring tier list");
        return Vec::new();
    }

    let mut tiers: Vec<TrailingTier> = values
        .chunks_exact(2)
        .map(|pair| TrailingTier { trigger_r: pair[0], target_r: pair[1] })
        .collect();
    tiers.sort_by(|a, b| {
        a.trigger_r
            .partial_cmp(&b.trigger_r)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    tiers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cutoff_parsing() {
        assert_eq!(parse_cutoff("10:30"), NaiveTime::from_hms_opt(10, 30, 0).unwrap());
        assert_eq!(parse_cutoff(" 09:45 "), NaiveTime::from_hms_opt(9, 45, 0).unwrap());

        // Malformed strings recover to the 11:00 fallback
        assert_eq!(parse_cutoff("not-a-time"), NaiveTime::from_hms_opt(11, 0, 0).unwrap());
        assert_eq!(parse_cutoff(""), NaiveTime::from_hms_opt(11, 0, 0).unwrap());
    }

    #[test]
    fn test_tier_parsing() {
        let tiers = parse_tiers("1.0,0.0,2.0,1.0");
        assert_eq!(
            tiers,
            vec![
                TrailingTier { trigger_r: 1.0, target_r: 0.0 },
                TrailingTier { trigger_r: 2.0, target_r: 1.0 },
            ]
        );

        // Unordered input is sorted by trigger
        let tiers = parse_tiers("2.0,1.0,1.0,0.0");
        assert_eq!(tiers[0].trigger_r, 1.0);
        assert_eq!(tiers[1].trigger_r, 2.0);
    }

    #[test]
    fn test_tier_parsing_rejects_malformed() {
        assert!(parse_tiers("").is_empty());
        assert!(parse_tiers("1.0,abc").is_empty());
        assert!(parse_tiers("1.0,0.5,2.0").is_empty()); // odd count
        assert!(parse_tiers("-1.0,0.0").is_empty()); // negative trigger
    }

    #[test]
    fn test_close_buffer_clamped() {
        let mut config = EngineConfig::default();
        config.close_buffer_secs = 1;
        assert_eq!(config.close_buffer(), Duration::seconds(5));
        config.close_buffer_secs = 10_000;
        assert_eq!(config.close_buffer(), Duration::seconds(900));
        config.close_buffer_secs = 60;
        assert_eq!(config.close_buffer(), Duration::seconds(60));
    }
}
