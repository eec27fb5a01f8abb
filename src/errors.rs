use alloy::primitives::{Address, TxHash, U256};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::chain::ChainError;

/// Startup errors. Any of these aborts the process before the first cycle.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {var}: {reason}")]
    Invalid { var: String, reason: String },

    #[error("no worker credentials configured (set WALLET_PRIVATE_KEYS or WALLET1_PRIVATE_KEY)")]
    EmptyPool,

    #[error("funding account {0} is also listed as a worker")]
    FunderInPool(Address),

    #[error("worker {0} is listed more than once")]
    DuplicateWorker(Address),

    #[error("MIN_STAKE {min} exceeds MAX_STAKE {max}")]
    StakeBounds { min: U256, max: U256 },

    #[error("chain endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("wrong network: expected chain id {expected}, got {actual}")]
    ChainIdMismatch { expected: u64, actual: u64 },
}

/// Reasons a single cycle is abandoned. None of these stop the scheduler.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("{operation}: network retries exhausted after {attempts} attempts: {source}")]
    NetworkExhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: ChainError,
    },

    #[error("funding account holds {available} wei, top-up needs {required} wei")]
    FundingExhausted { required: U256, available: U256 },

    #[error("gas estimation rejected: {0}")]
    EstimationFailure(String),

    #[error("{operation}: submission rejected: {reason}")]
    SubmissionRejected {
        operation: &'static str,
        reason: String,
    },

    #[error("{operation}: transaction {tx_hash} reverted")]
    TransactionReverted {
        operation: &'static str,
        tx_hash: TxHash,
    },

    #[error("{operation}: transaction {tx_hash} not confirmed in time, status unknown")]
    ConfirmationTimeout {
        operation: &'static str,
        tx_hash: TxHash,
    },
}

impl CycleError {
    /// Stable label for logs and the `cycles_abandoned_total` metric.
    pub fn reason(&self) -> &'static str {
        match self {
            CycleError::NetworkExhausted { .. } => "network_exhausted",
            CycleError::FundingExhausted { .. } => "funding_exhausted",
            CycleError::EstimationFailure(_) => "estimation_failure",
            CycleError::SubmissionRejected { .. } => "submission_rejected",
            CycleError::TransactionReverted { .. } => "transaction_reverted",
            CycleError::ConfirmationTimeout { .. } => "confirmation_timeout",
        }
    }

    /// Map a non-retryable chain error raised while submitting or confirming.
    pub(crate) fn from_submission(operation: &'static str, err: ChainError) -> Self {
        match err {
            ChainError::Rejected(reason) | ChainError::NonceConsumed(reason) => {
                CycleError::SubmissionRejected { operation, reason }
            }
            ChainError::ConfirmationTimeout(tx_hash) => {
                CycleError::ConfirmationTimeout { operation, tx_hash }
            }
            ChainError::Network(_) => CycleError::NetworkExhausted {
                operation,
                attempts: 1,
                source: err,
            },
        }
    }
}

/// Error type for the ops HTTP surface.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        };

        (
            status,
            Json(ErrorBody {
                success: false,
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_labels_are_distinct() {
        let hash = TxHash::ZERO;
        let errors = [
            CycleError::FundingExhausted {
                required: U256::from(2),
                available: U256::from(1),
            },
            CycleError::EstimationFailure("execution reverted".into()),
            CycleError::TransactionReverted {
                operation: "execute",
                tx_hash: hash,
            },
            CycleError::ConfirmationTimeout {
                operation: "execute",
                tx_hash: hash,
            },
        ];
        let mut labels: Vec<_> = errors.iter().map(|e| e.reason()).collect();
        labels.dedup();
        assert_eq!(labels.len(), 4);
    }

    #[test]
    fn test_submission_mapping_keeps_timeout_distinct() {
        let hash = TxHash::repeat_byte(0xab);
        let err = CycleError::from_submission("execute", ChainError::ConfirmationTimeout(hash));
        assert!(matches!(err, CycleError::ConfirmationTimeout { tx_hash, .. } if tx_hash == hash));

        let err = CycleError::from_submission("execute", ChainError::NonceConsumed("nonce too low".into()));
        assert_eq!(err.reason(), "submission_rejected");
    }
}
