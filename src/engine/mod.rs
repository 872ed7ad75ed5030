//! Decision engine core.
//!
//! This module contains the intraday trading engine components:
//! - Entry gating and order construction
//! - Fixed-fractional position sizing
//! - Trailing-tier and partial-exit lifecycle management
//! - Drawdown-driven defensive risk mode
//! - Swing-structure trend classification
//! - Volatility regime detection
//! - Session orchestration over all of the above

pub mod drawdown;
pub mod gate;
pub mod lifecycle;
pub mod sizing;
pub mod structure;
pub mod trader;
pub mod volatility;

// Re-export commonly used types
pub use drawdown::DrawdownController;
pub use gate::{EntryContext, EntryOrder};
pub use lifecycle::{ManagedPosition, PositionBook};
pub use sizing::VolumeRounding;
pub use structure::Trend;
pub use trader::{BarEvent, SessionEngine, TickEvent};
