use std::time::Duration;

use alloy::primitives::U256;
use rand::Rng;

use crate::models::{Direction, DirectionMode, PendingAction, PositionParams};

/// Sleep jitter factor range, `[JITTER_MIN, JITTER_MAX)`.
pub const JITTER_MIN: f64 = 0.5;
pub const JITTER_MAX: f64 = 1.5;

/// Fixed arguments of every action; only stake and direction vary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionTemplate {
    pub pair: u8,
    pub target_price: U256,
    pub duration_secs: u64,
    pub use_secondary_asset: bool,
    pub secondary_asset_amount: U256,
}

impl Default for ActionTemplate {
    fn default() -> Self {
        Self {
            pair: 2,
            target_price: U256::from(600u64) * U256::from(10u64).pow(U256::from(8u64)),
            duration_secs: 3600,
            use_secondary_asset: false,
            secondary_asset_amount: U256::ZERO,
        }
    }
}

/// Inclusive stake range in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StakeBounds {
    pub min: u128,
    pub max: u128,
}

/// Draws per-cycle action parameters and sleep jitter from an injected RNG.
///
/// Seeding the RNG (`StdRng::seed_from_u64`) makes the whole sequence of
/// actions and sleeps reproducible.
pub struct ActionSampler<R> {
    template: ActionTemplate,
    stake: StakeBounds,
    mode: DirectionMode,
    rng: R,
}

impl<R: Rng> ActionSampler<R> {
    pub fn new(template: ActionTemplate, stake: StakeBounds, mode: DirectionMode, rng: R) -> Self {
        let stake = if stake.min <= stake.max {
            stake
        } else {
            StakeBounds {
                min: stake.max,
                max: stake.min,
            }
        };
        Self {
            template,
            stake,
            mode,
            rng,
        }
    }

    /// Draw the action for cycle number `cycle`.
    pub fn draw(&mut self, cycle: u64) -> PendingAction {
        let direction = match self.mode {
            DirectionMode::Alternate => Direction::alternating(cycle),
            DirectionMode::Random => {
                if self.rng.random_bool(0.5) {
                    Direction::Increase
                } else {
                    Direction::Decrease
                }
            }
        };

        let params = PositionParams {
            pair: self.template.pair,
            target_price: self.template.target_price,
            duration_secs: self.template.duration_secs,
            use_secondary_asset: self.template.use_secondary_asset,
            secondary_asset_amount: self.template.secondary_asset_amount,
            stake: self.draw_stake(),
        };

        PendingAction::new(direction, params)
    }

    /// Uniform stake in `[min, max]`.
    pub fn draw_stake(&mut self) -> U256 {
        let StakeBounds { min, max } = self.stake;
        if min == max {
            return U256::from(min);
        }
        U256::from(self.rng.random_range(min..=max))
    }

    /// `base` scaled by a factor drawn uniformly from `[0.5, 1.5)`.
    /// Saturates at [`Duration::MAX`].
    pub fn jittered(&mut self, base: Duration) -> Duration {
        let factor = self.rng.random_range(JITTER_MIN..JITTER_MAX);
        Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    }
}
