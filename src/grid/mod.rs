//! Grid trading logic
//!
//! - `levels`: ladder geometry and price formatting
//! - `engine`: startup sequence and fill mirroring
//! - `report`: periodic status notifications

pub mod engine;
pub mod levels;
pub mod report;

pub use engine::{EngineSettings, FillOutcome, GridEngine};
pub use levels::{compute_levels, format_price, initial_side, mirror_index, required_balance, RequiredBalance};
pub use report::StatusReporter;
