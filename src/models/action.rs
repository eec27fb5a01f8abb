use alloy::primitives::U256;
use serde::Serialize;

use super::Direction;

/// Arguments shared by both contract entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PositionParams {
    /// Pair selector (0=BTC, 1=ETH, 2=BNB, 3=USDT).
    pub pair: u8,
    /// Target price, fixed point with 8 decimals.
    pub target_price: U256,
    pub duration_secs: u64,
    pub use_secondary_asset: bool,
    pub secondary_asset_amount: U256,
    /// Payable value in wei.
    pub stake: U256,
}

/// A proposed contract call, drawn fresh every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum PendingAction {
    IncreasePosition(PositionParams),
    DecreasePosition(PositionParams),
}

impl PendingAction {
    pub fn new(direction: Direction, params: PositionParams) -> Self {
        match direction {
            Direction::Increase => PendingAction::IncreasePosition(params),
            Direction::Decrease => PendingAction::DecreasePosition(params),
        }
    }

    pub fn params(&self) -> &PositionParams {
        match self {
            PendingAction::IncreasePosition(p) | PendingAction::DecreasePosition(p) => p,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            PendingAction::IncreasePosition(_) => Direction::Increase,
            PendingAction::DecreasePosition(_) => Direction::Decrease,
        }
    }

    pub fn stake(&self) -> U256 {
        self.params().stake
    }
}
