use std::future::Future;
use std::time::Duration;

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::transports::http::reqwest::Url;
use alloy::transports::{RpcError, TransportErrorKind};
use tokio::time::{sleep, timeout};

use crate::errors::ConfigError;

use super::{ChainClient, ChainError, Credential, SignedTx, TxReceipt, TxRequest};

/// Upper bound on a single JSON-RPC round trip.
const RPC_CALL_TIMEOUT: Duration = Duration::from_secs(20);

/// Delay between receipt polls while waiting for inclusion.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Node error messages meaning the sender's nonce is already taken.
const NONCE_CONSUMED_MARKERS: [&str; 3] = ["already known", "known transaction", "nonce too low"];

/// [`ChainClient`] over an alloy HTTP provider.
///
/// Every configured credential is registered with the local wallet, so a
/// request is signed by whichever account its `from` field names. The funding
/// account is the default signer.
///
/// The provider carries no fillers. Each signature reads the pending nonce
/// from the node, so a failed send never leaves a locally cached nonce ahead
/// of the chain.
pub struct EvmChainClient {
    provider: DynProvider,
    wallet: EthereumWallet,
    chain_id: u64,
}

impl EvmChainClient {
    /// Build the provider and verify the endpoint serves `expected_chain_id`.
    pub async fn connect(
        rpc_url: &str,
        expected_chain_id: u64,
        funder: &Credential,
        workers: &[Credential],
    ) -> Result<Self, ConfigError> {
        let url: Url = rpc_url.parse().map_err(|e| ConfigError::Invalid {
            var: "RPC_URL".into(),
            reason: format!("{e}"),
        })?;

        let mut wallet = EthereumWallet::from(funder.signer().clone());
        for worker in workers {
            wallet.register_signer(worker.signer().clone());
        }

        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_http(url)
            .erased();
        let client = Self::new(provider, wallet, expected_chain_id);

        let actual = client
            .chain_id()
            .await
            .map_err(|e| ConfigError::Unreachable(e.to_string()))?;
        if actual != expected_chain_id {
            return Err(ConfigError::ChainIdMismatch {
                expected: expected_chain_id,
                actual,
            });
        }

        tracing::info!(rpc_url, chain_id = actual, signers = workers.len() + 1, "Connected to chain");
        Ok(client)
    }

    /// Wrap an already built provider. Transactions are signed for `chain_id`.
    pub fn new(provider: DynProvider, wallet: EthereumWallet, chain_id: u64) -> Self {
        Self {
            provider,
            wallet,
            chain_id,
        }
    }
}

impl ChainClient for EvmChainClient {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        rpc("eth_chainId", async { self.provider.get_chain_id().await }).await
    }

    async fn balance(&self, address: Address) -> Result<U256, ChainError> {
        rpc("eth_getBalance", async { self.provider.get_balance(address).await }).await
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        rpc("eth_gasPrice", async { self.provider.get_gas_price().await }).await
    }

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64, ChainError> {
        let request = to_request(tx);
        rpc("eth_estimateGas", async { self.provider.estimate_gas(request).await }).await
    }

    async fn sign(&self, tx: &TxRequest) -> Result<SignedTx, ChainError> {
        let nonce = rpc("eth_getTransactionCount", async {
            self.provider.get_transaction_count(tx.from).pending().await
        })
        .await?;
        let gas_price = match tx.gas_price {
            Some(price) => price,
            None => self.gas_price().await?,
        };
        let gas_limit = match tx.gas_limit {
            Some(limit) => limit,
            None => self.estimate_gas(tx).await?,
        };

        let envelope = to_request(tx)
            .with_nonce(nonce)
            .with_chain_id(self.chain_id)
            .with_gas_price(gas_price)
            .with_gas_limit(gas_limit)
            .build(&self.wallet)
            .await
            .map_err(|e| ChainError::Rejected(format!("sign: {e}")))?;

        Ok(SignedTx {
            hash: *envelope.tx_hash(),
            nonce,
            raw: envelope.encoded_2718().into(),
        })
    }

    async fn broadcast(&self, signed: &SignedTx) -> Result<TxHash, ChainError> {
        let pending = rpc("eth_sendRawTransaction", async {
            self.provider.send_raw_transaction(&signed.raw).await
        })
        .await?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash, wait: Duration) -> Result<TxReceipt, ChainError> {
        let poll = async {
            loop {
                match self.provider.get_transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => {}
                    Err(e) => {
                        // Keep polling; the overall bound decides when to give up.
                        tracing::debug!(tx_hash = %tx_hash, error = %e, "Receipt poll failed");
                    }
                }
                sleep(RECEIPT_POLL_INTERVAL).await;
            }
        };

        let receipt = timeout(wait, poll)
            .await
            .map_err(|_| ChainError::ConfirmationTimeout(tx_hash))?;

        Ok(TxReceipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.unwrap_or_default(),
            success: receipt.status(),
        })
    }

    async fn has_code(&self, address: Address) -> Result<bool, ChainError> {
        let code = rpc("eth_getCode", async { self.provider.get_code_at(address).await }).await?;
        Ok(!code.is_empty())
    }
}

fn to_request(tx: &TxRequest) -> TransactionRequest {
    let mut request = TransactionRequest::default()
        .with_from(tx.from)
        .with_to(tx.to)
        .with_value(tx.value);
    if !tx.data.is_empty() {
        request = request.with_input(tx.data.clone());
    }
    if let Some(gas_limit) = tx.gas_limit {
        request = request.with_gas_limit(gas_limit);
    }
    if let Some(gas_price) = tx.gas_price {
        request = request.with_gas_price(gas_price);
    }
    request
}

/// Run one RPC call under [`RPC_CALL_TIMEOUT`] and classify its failure.
async fn rpc<T, F>(method: &'static str, call: F) -> Result<T, ChainError>
where
    F: Future<Output = Result<T, RpcError<TransportErrorKind>>>,
{
    match timeout(RPC_CALL_TIMEOUT, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(classify(method, e)),
        Err(_) => Err(ChainError::Network(format!(
            "{method} timed out after {}s",
            RPC_CALL_TIMEOUT.as_secs()
        ))),
    }
}

/// Error responses and local usage errors are deterministic; everything else
/// is treated as a transient transport problem.
fn classify(method: &'static str, err: RpcError<TransportErrorKind>) -> ChainError {
    match err {
        RpcError::ErrorResp(payload) => {
            let message = payload.message.to_lowercase();
            if NONCE_CONSUMED_MARKERS.iter().any(|m| message.contains(m)) {
                ChainError::NonceConsumed(format!("{method}: {payload}"))
            } else {
                ChainError::Rejected(format!("{method}: {payload}"))
            }
        }
        RpcError::LocalUsageError(e) => ChainError::Rejected(format!("{method}: {e}")),
        other => ChainError::Network(format!("{method}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Bytes;
    use alloy::transports::mock::Asserter;

    #[test]
    fn test_transfer_request_has_no_input() {
        let from = Address::repeat_byte(1);
        let to = Address::repeat_byte(2);
        let tx = TxRequest::transfer(from, to, U256::from(5u64)).with_gas_price(3);

        let req = to_request(&tx);
        assert_eq!(req.from, Some(from));
        assert_eq!(req.value, Some(U256::from(5u64)));
        assert_eq!(req.gas_price, Some(3));
        assert!(req.input.input().is_none());
        assert!(req.gas.is_none());
    }

    #[test]
    fn test_call_request_carries_limit_and_data() {
        let tx = TxRequest::call(
            Address::repeat_byte(1),
            Address::repeat_byte(2),
            Bytes::from(vec![0xde, 0xad]),
            U256::from(7u64),
        )
        .with_gas_limit(440_000);

        let req = to_request(&tx);
        assert_eq!(req.gas, Some(440_000));
        assert_eq!(req.input.input().map(|b| b.to_vec()), Some(vec![0xde, 0xad]));
    }

    #[test]
    fn test_classify_transport_as_network() {
        let err = classify("eth_gasPrice", TransportErrorKind::custom_str("connection reset"));
        assert!(err.is_transient());
    }

    // anvil/hardhat account #0.
    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn mocked_client(asserter: &Asserter) -> (EvmChainClient, Address) {
        let credential = Credential::from_hex(KEY).unwrap();
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_mocked_client(asserter.clone())
            .erased();
        let client = EvmChainClient::new(provider, EthereumWallet::from(credential.signer().clone()), 56);
        (client, credential.address())
    }

    fn priced_transfer(from: Address) -> TxRequest {
        TxRequest::transfer(from, Address::repeat_byte(2), U256::from(1_000u64))
            .with_gas_price(5_000_000_000)
            .with_gas_limit(21_000)
    }

    #[tokio::test]
    async fn test_rejected_send_leaves_no_nonce_gap() {
        let asserter = Asserter::new();
        let (client, from) = mocked_client(&asserter);
        let tx = priced_transfer(from);

        asserter.push_success(&"0x5");
        let first = client.sign(&tx).await.unwrap();
        asserter.push_failure_msg("insufficient funds for gas * price + value");
        let err = client.broadcast(&first).await.unwrap_err();
        assert!(matches!(err, ChainError::Rejected(_)));

        // The node still reports 5 as pending; the next signature must use it.
        asserter.push_success(&"0x5");
        let second = client.sign(&tx).await.unwrap();
        assert_eq!(first.nonce, 5);
        assert_eq!(second.nonce, 5);
        assert_eq!(second.hash, first.hash);
    }

    #[tokio::test]
    async fn test_broadcast_sends_the_signed_bytes() {
        let asserter = Asserter::new();
        let (client, from) = mocked_client(&asserter);

        asserter.push_success(&"0x0");
        let signed = client.sign(&priced_transfer(from)).await.unwrap();
        asserter.push_success(&signed.hash);
        assert_eq!(client.broadcast(&signed).await.unwrap(), signed.hash);

        asserter.push_failure_msg("already known");
        let err = client.broadcast(&signed).await.unwrap_err();
        assert!(matches!(err, ChainError::NonceConsumed(_)));
    }

    #[tokio::test]
    async fn test_sign_without_registered_key_is_rejected() {
        let asserter = Asserter::new();
        let (client, _) = mocked_client(&asserter);

        asserter.push_success(&"0x0");
        let err = client.sign(&priced_transfer(Address::repeat_byte(9))).await.unwrap_err();
        assert!(matches!(err, ChainError::Rejected(_)));
    }
}
