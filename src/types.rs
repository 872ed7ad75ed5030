//! Shared market value types consumed by the engine.
//!
//! All of these are plain inputs supplied per event by the host: the engine
//! never fetches data on its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a position or signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1.0 for long, -1.0 for short. Handy for mirrored price arithmetic.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

/// A fully closed OHLC bar at any timeframe.
///
/// `timestamp` is the close instant of the bar in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Live top-of-book quote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
}

impl Quote {
    /// Price a market entry would fill at for the given side.
    pub fn entry_price(&self, side: Side) -> f64 {
        match side {
            Side::Long => self.ask,
            Side::Short => self.bid,
        }
    }

    /// Price an open position of the given side could exit at right now.
    /// Used as the favorable-excursion mark for R-multiple tracking.
    pub fn exit_price(&self, side: Side) -> f64 {
        match side {
            Side::Long => self.bid,
            Side::Short => self.ask,
        }
    }
}

/// Account balance/equity snapshot, polled by the host each event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Realized balance, used for sizing new entries
    pub balance: f64,
    /// Balance plus floating P&L, used for drawdown tracking
    pub equity: f64,
}

/// Broker metadata for the traded symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// Price increment of one pip (e.g. 0.0001 for EURUSD)
    pub pip_size: f64,
    /// Money value of one pip per unit of volume
    pub pip_value: f64,
    /// Smallest volume the broker accepts
    pub min_volume: f64,
    /// Largest volume the broker accepts
    pub max_volume: f64,
    /// Lot-size granularity volumes are quantized to
    pub volume_step: f64,
}

/// Externally computed entry signal for a closed bar.
///
/// Buy and sell are mutually exclusive by convention but not enforced; when
/// both are set the buy flag wins, matching the if/else evaluation order of
/// the signal sources this engine is driven by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarSignal {
    pub buy: bool,
    pub sell: bool,
}

impl BarSignal {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn buy() -> Self {
        Self { buy: true, sell: false }
    }

    pub fn sell() -> Self {
        Self { buy: false, sell: true }
    }

    /// Resolve the signal to a direction, buy flag first.
    pub fn direction(&self) -> Option<Side> {
        if self.buy {
            Some(Side::Long)
        } else if self.sell {
            Some(Side::Short)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_direction() {
        assert_eq!(BarSignal::buy().direction(), Some(Side::Long));
        assert_eq!(BarSignal::sell().direction(), Some(Side::Short));
        assert_eq!(BarSignal::none().direction(), None);

        // Both flags set: buy wins (evaluation-order convention)
        let both = BarSignal { buy: true, sell: true };
        assert_eq!(both.direction(), Some(Side::Long));
    }

    #[test]
    fn test_quote_sides() {
        let q = Quote { bid: 1.1048, ask: 1.1050 };
        assert_eq!(q.entry_price(Side::Long), 1.1050);
        assert_eq!(q.entry_price(Side::Short), 1.1048);
        assert_eq!(q.exit_price(Side::Long), 1.1048);
        assert_eq!(q.exit_price(Side::Short), 1.1050);
    }
}
