use alloy::primitives::U256;
use serde::Serialize;

/// Buffer added on top of the gas cost, in percent.
pub const GAS_BUFFER_PCT: u64 = 10;

/// Minimum balance an account must hold before an action is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FundingRequirement {
    pub stake: U256,
    pub gas_price: u128,
    pub gas_estimate: u64,
    /// ceil(gas_price · gas_estimate · 10%)
    pub buffer: U256,
    /// stake + gas_price · gas_estimate + buffer
    pub total: U256,
}

impl FundingRequirement {
    /// Arithmetic saturates at `U256::MAX` instead of wrapping.
    pub fn new(stake: U256, gas_price: u128, gas_estimate: u64) -> Self {
        let gas_cost = U256::from(gas_price).saturating_mul(U256::from(gas_estimate));
        let buffer = ceil_div(gas_cost.saturating_mul(U256::from(GAS_BUFFER_PCT)), U256::from(100u64));
        let total = stake.saturating_add(gas_cost).saturating_add(buffer);
        Self {
            stake,
            gas_price,
            gas_estimate,
            buffer,
            total,
        }
    }

    pub fn gas_cost(&self) -> U256 {
        U256::from(self.gas_price).saturating_mul(U256::from(self.gas_estimate))
    }
}

/// Output of the two-phase gas estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GasQuote {
    pub gas_price: u128,
    pub gas_estimate: u64,
    pub requirement: FundingRequirement,
}

impl GasQuote {
    /// Gas limit for submission: the estimate plus the buffered headroom,
    /// rounded down so `gas_price · limit` never exceeds what was funded.
    pub fn gas_limit(&self) -> u64 {
        self.gas_estimate
            .saturating_add(self.gas_estimate.saturating_mul(GAS_BUFFER_PCT) / 100)
    }
}

fn ceil_div(n: U256, d: U256) -> U256 {
    let (q, r) = n.div_rem(d);
    if r.is_zero() {
        q
    } else {
        q + U256::from(1u64)
    }
}
