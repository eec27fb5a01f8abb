use std::sync::atomic::{AtomicU32, Ordering};

use alloy::primitives::TxHash;

use crate::chain::{ChainClient, ChainError, TxRequest};
use crate::errors::CycleError;

use super::retry::{with_retry, RetryPolicy};

/// Sign `tx` once, then broadcast it, retrying transient failures with the
/// same signed bytes.
///
/// A rebroadcast answered with [`ChainError::NonceConsumed`] means an earlier
/// attempt reached the node even though its response was lost. The
/// transaction is then accepted under its own hash and confirmation decides
/// the outcome.
pub async fn submit_once<C: ChainClient>(
    chain: &C,
    operation: &'static str,
    policy: &RetryPolicy,
    tx: &TxRequest,
) -> Result<TxHash, CycleError> {
    let signed = with_retry(operation, policy, move || chain.sign(tx))
        .await
        .map_err(|e| e.into_cycle_error(operation, |err| CycleError::from_submission(operation, err)))?;

    let attempts = AtomicU32::new(0);
    let attempts_ref = &attempts;
    let signed_ref = &signed;
    with_retry(operation, policy, move || async move {
        let attempt = attempts_ref.fetch_add(1, Ordering::SeqCst) + 1;
        match chain.broadcast(signed_ref).await {
            Err(ChainError::NonceConsumed(reason)) if attempt > 1 => {
                tracing::info!(
                    operation,
                    tx_hash = %signed_ref.hash,
                    nonce = signed_ref.nonce,
                    attempt,
                    reason = %reason,
                    "Earlier broadcast reached the node"
                );
                Ok(signed_ref.hash)
            }
            other => other,
        }
    })
    .await
    .map_err(|e| e.into_cycle_error(operation, |err| CycleError::from_submission(operation, err)))
}
