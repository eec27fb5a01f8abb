//! Chain access for the scheduler.
//!
//! The core only depends on the [`ChainClient`] capability. [`EvmChainClient`]
//! implements it on top of an alloy HTTP provider with local signers; tests
//! provide an in-memory ledger.

pub mod contract;
pub mod evm;
pub mod wallet;

pub use evm::EvmChainClient;
pub use wallet::Credential;

use std::future::Future;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, TxHash, U256};
use thiserror::Error;

/// Errors surfaced by a [`ChainClient`].
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// Transport-level failure (timeout, connection drop). Safe to retry.
    #[error("network error: {0}")]
    Network(String),

    /// The node answered with an error (revert during simulation, bad nonce,
    /// insufficient funds). Retrying with the same input gives the same answer.
    #[error("rejected by node: {0}")]
    Rejected(String),

    /// The sender's nonce is already taken: the node holds this exact
    /// transaction ("already known") or has mined something at that nonce.
    #[error("nonce already used: {0}")]
    NonceConsumed(String),

    /// No receipt observed within the wait bound; the transaction may still land.
    #[error("no receipt for {0} within the confirmation timeout")]
    ConfirmationTimeout(TxHash),
}

impl ChainError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::Network(_))
    }
}

/// Transaction request parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    /// Signing account; must be registered with the client.
    pub from: Address,
    pub to: Address,
    /// Payable value in wei.
    pub value: U256,
    /// Encoded calldata, empty for plain transfers.
    pub data: Bytes,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u128>,
}

impl TxRequest {
    /// Plain value transfer.
    pub fn transfer(from: Address, to: Address, value: U256) -> Self {
        Self {
            from,
            to,
            value,
            data: Bytes::new(),
            gas_limit: None,
            gas_price: None,
        }
    }

    /// Contract call carrying `value` as payable amount.
    pub fn call(from: Address, to: Address, data: impl Into<Bytes>, value: U256) -> Self {
        Self {
            from,
            to,
            value,
            data: data.into(),
            gas_limit: None,
            gas_price: None,
        }
    }

    pub fn with_gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }
}

/// A transaction signed at a fixed nonce, ready to be broadcast.
///
/// Rebroadcasting the same `raw` bytes can never produce a second
/// transaction, whatever happened to an earlier attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    pub hash: TxHash,
    pub nonce: u64,
    /// EIP-2718 encoded envelope.
    pub raw: Bytes,
}

/// The parts of a receipt the scheduler cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub success: bool,
}

/// Capability interface over the remote ledger.
pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> impl Future<Output = Result<u64, ChainError>> + Send;

    /// Native balance in wei.
    fn balance(&self, address: Address) -> impl Future<Output = Result<U256, ChainError>> + Send;

    /// Current legacy gas price in wei.
    fn gas_price(&self) -> impl Future<Output = Result<u128, ChainError>> + Send;

    /// Simulate `tx` and return the gas it would use.
    fn estimate_gas(&self, tx: &TxRequest) -> impl Future<Output = Result<u64, ChainError>> + Send;

    /// Sign with `tx.from` at the sender's current pending nonce.
    /// Nothing is sent to the network.
    fn sign(&self, tx: &TxRequest) -> impl Future<Output = Result<SignedTx, ChainError>> + Send;

    /// Send signed bytes. Returns once the node accepted them.
    fn broadcast(&self, signed: &SignedTx) -> impl Future<Output = Result<TxHash, ChainError>> + Send;

    /// Block until `tx_hash` is included or `timeout` elapses.
    fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> impl Future<Output = Result<TxReceipt, ChainError>> + Send;

    /// Whether bytecode is deployed at `address`.
    fn has_code(&self, address: Address) -> impl Future<Output = Result<bool, ChainError>> + Send;
}
