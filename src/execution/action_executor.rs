use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use chrono::Utc;

use crate::chain::contract::{encode_call, function_name};
use crate::chain::{ChainClient, TxRequest};
use crate::errors::CycleError;
use crate::models::{GasQuote, PendingAction, TransactionRecord, TxStatus, WorkerAccount};

use super::retry::RetryPolicy;
use super::submission::submit_once;

/// Submits one contract action from a worker account and waits for it to land.
pub struct ActionExecutor<C> {
    chain: Arc<C>,
    contract: Address,
    retry: RetryPolicy,
    confirmation_timeout: Duration,
}

impl<C: ChainClient> ActionExecutor<C> {
    pub fn new(chain: Arc<C>, contract: Address, retry: RetryPolicy, confirmation_timeout: Duration) -> Self {
        Self {
            chain,
            contract,
            retry,
            confirmation_timeout,
        }
    }

    /// Execute `action` from `account` with the gas profile in `quote`.
    ///
    /// The gas limit is the estimate plus the funded buffer, so the worst case
    /// fee never exceeds what the account was topped up with.
    pub async fn execute(
        &self,
        account: &WorkerAccount,
        action: &PendingAction,
        quote: &GasQuote,
    ) -> Result<TransactionRecord, CycleError> {
        let tx = TxRequest::call(account.address, self.contract, encode_call(action), action.stake())
            .with_gas_price(quote.gas_price)
            .with_gas_limit(quote.gas_limit());

        tracing::debug!(
            account = %account.address,
            function = function_name(action),
            stake = %action.stake(),
            gas_limit = quote.gas_limit(),
            "Submitting action"
        );

        let tx_hash = submit_once(&*self.chain, "execute", &self.retry, &tx).await?;

        let receipt = self
            .chain
            .wait_for_receipt(tx_hash, self.confirmation_timeout)
            .await
            .map_err(|err| CycleError::from_submission("execute", err))?;

        if !receipt.success {
            return Err(CycleError::TransactionReverted {
                operation: "execute",
                tx_hash,
            });
        }

        Ok(TransactionRecord {
            account: account.address,
            tx_hash,
            block_number: receipt.block_number,
            confirmed_at: Utc::now(),
            status: TxStatus::Confirmed,
        })
    }
}
