use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, TxHash, U256};
use metrics::counter;

use crate::chain::{ChainClient, TxRequest};
use crate::errors::CycleError;
use crate::models::{FundingAccount, FundingRequirement, WorkerAccount};

use super::retry::{with_retry, RetryPolicy};
use super::submission::submit_once;

/// Gas used by a plain value transfer.
pub const TRANSFER_GAS: u64 = 21_000;

/// Result of [`FundingPlanner::ensure_funded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundingOutcome {
    /// Balance already covered the requirement; nothing was sent.
    AlreadyFunded { balance: U256 },
    /// Exactly `deficit` was transferred from the funding account and confirmed.
    ToppedUp { deficit: U256, tx_hash: TxHash },
}

impl FundingOutcome {
    pub fn transferred(&self) -> bool {
        matches!(self, FundingOutcome::ToppedUp { .. })
    }
}

/// Computes balance requirements and covers deficits from the funding account.
pub struct FundingPlanner<C> {
    chain: Arc<C>,
    funder: FundingAccount,
    retry: RetryPolicy,
    confirmation_timeout: Duration,
}

impl<C: ChainClient> FundingPlanner<C> {
    pub fn new(
        chain: Arc<C>,
        funder: FundingAccount,
        retry: RetryPolicy,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            chain,
            funder,
            retry,
            confirmation_timeout,
        }
    }

    /// Minimum balance for an action with this stake and gas profile.
    pub fn requirement(&self, stake: U256, gas_price: u128, gas_estimate: u64) -> FundingRequirement {
        FundingRequirement::new(stake, gas_price, gas_estimate)
    }

    /// Native balance of `address`, retrying transient failures.
    pub async fn balance_of(&self, address: Address) -> Result<U256, CycleError> {
        let chain = &*self.chain;
        with_retry("balance", &self.retry, move || chain.balance(address))
            .await
            .map_err(|e| e.into_cycle_error("balance", |err| CycleError::from_submission("balance", err)))
    }

    /// Make sure `account` holds at least `requirement.total`.
    ///
    /// A no-op when the balance already suffices. Otherwise transfers exactly
    /// the deficit at the requirement's gas price and waits for confirmation.
    /// The funding account must hold the deficit plus its own transfer fee,
    /// otherwise nothing is submitted.
    pub async fn ensure_funded(
        &self,
        account: &WorkerAccount,
        requirement: &FundingRequirement,
    ) -> Result<FundingOutcome, CycleError> {
        let balance = self.balance_of(account.address).await?;
        if balance >= requirement.total {
            tracing::debug!(
                account = %account.address,
                index = account.index,
                balance = %balance,
                required = %requirement.total,
                "Account already funded"
            );
            return Ok(FundingOutcome::AlreadyFunded { balance });
        }

        let deficit = requirement.total - balance;
        let transfer_fee = U256::from(requirement.gas_price) * U256::from(TRANSFER_GAS);
        let available = self.balance_of(self.funder.address).await?;
        if available < deficit + transfer_fee {
            tracing::warn!(
                funder = %self.funder.address,
                available = %available,
                deficit = %deficit,
                transfer_fee = %transfer_fee,
                "Funding account cannot cover top-up"
            );
            return Err(CycleError::FundingExhausted {
                required: deficit + transfer_fee,
                available,
            });
        }

        tracing::info!(
            account = %account.address,
            index = account.index,
            balance = %balance,
            deficit = %deficit,
            gas_price = requirement.gas_price,
            "Funding worker account"
        );

        let tx = TxRequest::transfer(self.funder.address, account.address, deficit)
            .with_gas_price(requirement.gas_price)
            .with_gas_limit(TRANSFER_GAS);
        let tx_hash = submit_once(&*self.chain, "fund_transfer", &self.retry, &tx).await?;

        let receipt = self
            .chain
            .wait_for_receipt(tx_hash, self.confirmation_timeout)
            .await
            .map_err(|err| CycleError::from_submission("fund_transfer", err))?;

        if !receipt.success {
            return Err(CycleError::TransactionReverted {
                operation: "fund_transfer",
                tx_hash,
            });
        }

        counter!("funding_transfers_total").increment(1);
        tracing::info!(
            account = %account.address,
            tx_hash = %tx_hash,
            block = receipt.block_number,
            "Top-up confirmed"
        );

        Ok(FundingOutcome::ToppedUp { deficit, tx_hash })
    }
}
