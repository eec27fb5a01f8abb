pub mod account;
pub mod action;
pub mod funding;
pub mod rotation;
pub mod transaction;

pub use account::{AccountPool, FundingAccount, WorkerAccount};
pub use action::{PendingAction, PositionParams};
pub use funding::{FundingRequirement, GasQuote};
pub use rotation::{AdvancePolicy, CycleReport, RotationSnapshot, RotationState};
pub use transaction::{TransactionRecord, TxStatus};

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
}

impl Direction {
    /// Parity rule used by the alternating mode: even cycles increase.
    pub fn alternating(cycle: u64) -> Self {
        if cycle % 2 == 0 {
            Direction::Increase
        } else {
            Direction::Decrease
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Increase => write!(f, "increase"),
            Direction::Decrease => write!(f, "decrease"),
        }
    }
}

/// How the direction of each action is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectionMode {
    Alternate,
    Random,
}

impl DirectionMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "alternate" | "alternating" => Some(DirectionMode::Alternate),
            "random" => Some(DirectionMode::Random),
            _ => None,
        }
    }
}

impl fmt::Display for DirectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectionMode::Alternate => write!(f, "alternate"),
            DirectionMode::Random => write!(f, "random"),
        }
    }
}
