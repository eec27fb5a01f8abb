use std::sync::Arc;

use alloy::primitives::Address;

use crate::chain::contract::encode_call;
use crate::chain::{ChainClient, TxRequest};
use crate::errors::CycleError;
use crate::models::{GasQuote, PendingAction, WorkerAccount};

use super::funding::FundingPlanner;
use super::retry::{with_retry, RetryPolicy};

/// Default worst-case gas used to fund an account before the call can be
/// simulated. Simulation of a payable call fails when the sender cannot cover
/// `value + gas`, so the account has to hold this much first.
pub const DEFAULT_PREFUND_GAS_LIMIT: u64 = 400_000;

/// Two-phase gas estimation.
///
/// 1. Fund the account against the pre-fund gas limit.
/// 2. Simulate the real call, then fund against the refined requirement.
///
/// The second top-up is a no-op whenever the estimate stays under the
/// pre-fund constant, which is the usual case.
pub struct GasEstimator<C> {
    chain: Arc<C>,
    contract: Address,
    prefund_gas_limit: u64,
    retry: RetryPolicy,
}

impl<C: ChainClient> GasEstimator<C> {
    pub fn new(chain: Arc<C>, contract: Address, prefund_gas_limit: u64, retry: RetryPolicy) -> Self {
        Self {
            chain,
            contract,
            prefund_gas_limit,
            retry,
        }
    }

    pub async fn quote(
        &self,
        planner: &FundingPlanner<C>,
        account: &WorkerAccount,
        action: &PendingAction,
        gas_price: u128,
    ) -> Result<GasQuote, CycleError> {
        let stake = action.stake();

        let prefund = planner.requirement(stake, gas_price, self.prefund_gas_limit);
        planner.ensure_funded(account, &prefund).await?;

        let tx = TxRequest::call(account.address, self.contract, encode_call(action), stake)
            .with_gas_price(gas_price);
        let chain = &*self.chain;
        let tx_ref = &tx;
        let gas_estimate = with_retry("estimate_gas", &self.retry, move || chain.estimate_gas(tx_ref))
            .await
            .map_err(|e| {
                e.into_cycle_error("estimate_gas", |err| CycleError::EstimationFailure(err.to_string()))
            })?;

        let requirement = planner.requirement(stake, gas_price, gas_estimate);
        if gas_estimate > self.prefund_gas_limit {
            tracing::info!(
                account = %account.address,
                gas_estimate,
                prefund_gas_limit = self.prefund_gas_limit,
                "Estimate exceeds pre-fund limit, topping up again"
            );
        }
        planner.ensure_funded(account, &requirement).await?;

        Ok(GasQuote {
            gas_price,
            gas_estimate,
            requirement,
        })
    }
}
