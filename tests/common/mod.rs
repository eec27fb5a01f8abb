use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, Bytes, TxHash, U256};
use rand::rngs::StdRng;
use rand::SeedableRng;

use rotabot::chain::{ChainClient, ChainError, SignedTx, TxReceipt, TxRequest};
use rotabot::execution::{RetryPolicy, RotationScheduler, SchedulerConfig, StakeBounds, TRANSFER_GAS};
use rotabot::models::{AccountPool, FundingAccount};

/// 0.0005 ether, the reference stake.
#[allow(dead_code)]
pub const STAKE: u128 = 500_000_000_000_000;
/// 5 gwei.
#[allow(dead_code)]
pub const GAS_PRICE: u128 = 5_000_000_000;
/// Requirement for [`STAKE`] at [`GAS_PRICE`] with the 400k pre-fund limit.
#[allow(dead_code)]
pub const REQUIREMENT: u128 = 2_700_000_000_000_000;
/// Fee the funding account pays for one top-up at [`GAS_PRICE`].
#[allow(dead_code)]
pub const TRANSFER_FEE: u128 = TRANSFER_GAS as u128 * GAS_PRICE;
/// Default simulated gas use of a contract call.
#[allow(dead_code)]
pub const CALL_GAS: u64 = 200_000;

/// A value transfer observed by the mock.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub from: Address,
    pub to: Address,
    pub value: U256,
}

#[derive(Default)]
struct Ledger {
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    code: HashSet<Address>,
    signed: HashMap<TxHash, (TxRequest, u64)>,
    included: HashSet<TxHash>,
    transfers: Vec<Transfer>,
    calls: Vec<TxRequest>,
    receipts: HashMap<TxHash, TxReceipt>,
    next_tx: u64,
    block: u64,
    broadcasts: u32,
    balance_failures: u32,
    gas_price_failures: u32,
    submit_failures: u32,
    lost_responses: u32,
    rejected_submits: u32,
    reject_estimates: bool,
    revert_calls: bool,
    drop_call_receipts: bool,
    drop_transfer_receipts: bool,
}

/// In-memory ledger implementing [`ChainClient`].
///
/// Transfers charge `value + gas_limit * gas_price`; contract calls charge
/// `value + call_gas * gas_price` to the sender. Broadcasts must carry the
/// sender's next nonce, as on a real node.
pub struct MockChain {
    ledger: Mutex<Ledger>,
    gas_price: u128,
    call_gas: u64,
}

#[allow(dead_code)]
impl MockChain {
    pub fn new() -> Self {
        Self {
            ledger: Mutex::new(Ledger::default()),
            gas_price: GAS_PRICE,
            call_gas: CALL_GAS,
        }
    }

    pub fn with_call_gas(mut self, call_gas: u64) -> Self {
        self.call_gas = call_gas;
        self
    }

    pub fn set_balance(&self, address: Address, balance: u128) {
        self.ledger
            .lock()
            .unwrap()
            .balances
            .insert(address, U256::from(balance));
    }

    pub fn balance_of(&self, address: Address) -> U256 {
        self.ledger
            .lock()
            .unwrap()
            .balances
            .get(&address)
            .copied()
            .unwrap_or_default()
    }

    pub fn deploy(&self, address: Address) {
        self.ledger.lock().unwrap().code.insert(address);
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.ledger.lock().unwrap().transfers.clone()
    }

    pub fn calls(&self) -> Vec<TxRequest> {
        self.ledger.lock().unwrap().calls.clone()
    }

    /// Fail the next `n` balance reads with a network error.
    pub fn fail_balance_reads(&self, n: u32) {
        self.ledger.lock().unwrap().balance_failures = n;
    }

    pub fn nonce_of(&self, address: Address) -> u64 {
        self.ledger
            .lock()
            .unwrap()
            .nonces
            .get(&address)
            .copied()
            .unwrap_or_default()
    }

    /// Number of broadcast attempts the node has seen.
    pub fn broadcasts(&self) -> u32 {
        self.ledger.lock().unwrap().broadcasts
    }

    /// Drop the next `n` broadcasts before they reach the node.
    pub fn fail_submits(&self, n: u32) {
        self.ledger.lock().unwrap().submit_failures = n;
    }

    /// Include the next `n` broadcasts but lose the node's response.
    pub fn lose_submit_responses(&self, n: u32) {
        self.ledger.lock().unwrap().lost_responses = n;
    }

    /// Reject the next `n` broadcasts as unaffordable.
    pub fn reject_submits(&self, n: u32) {
        self.ledger.lock().unwrap().rejected_submits = n;
    }

    /// Fail the next `n` gas price reads with a network error.
    pub fn fail_gas_price(&self, n: u32) {
        self.ledger.lock().unwrap().gas_price_failures = n;
    }

    pub fn reject_estimates(&self) {
        self.ledger.lock().unwrap().reject_estimates = true;
    }

    pub fn revert_calls(&self) {
        self.ledger.lock().unwrap().revert_calls = true;
    }

    /// Accept contract calls but never produce a receipt for them.
    pub fn drop_call_receipts(&self) {
        self.ledger.lock().unwrap().drop_call_receipts = true;
    }

    /// Accept transfers but never produce a receipt for them.
    pub fn drop_transfer_receipts(&self) {
        self.ledger.lock().unwrap().drop_transfer_receipts = true;
    }

    fn include(&self, ledger: &mut Ledger, tx: &TxRequest, tx_hash: TxHash) -> Result<(), ChainError> {
        let price = U256::from(tx.gas_price.unwrap_or(self.gas_price));
        let is_transfer = tx.data.is_empty();
        let gas = if is_transfer {
            tx.gas_limit.unwrap_or(TRANSFER_GAS)
        } else {
            self.call_gas
        };
        let cost = tx.value + price * U256::from(gas);
        let from_balance = ledger.balances.get(&tx.from).copied().unwrap_or_default();
        if from_balance < cost {
            return Err(ChainError::Rejected("insufficient funds for gas * price + value".into()));
        }

        *ledger.nonces.entry(tx.from).or_default() += 1;
        ledger.included.insert(tx_hash);
        ledger.block += 1;
        let block_number = ledger.block;

        let (success, charged, drop_receipt) = if is_transfer {
            *ledger.balances.entry(tx.to).or_default() += tx.value;
            ledger.transfers.push(Transfer {
                from: tx.from,
                to: tx.to,
                value: tx.value,
            });
            (true, cost, ledger.drop_transfer_receipts)
        } else {
            ledger.calls.push(tx.clone());
            let success = !ledger.revert_calls;
            // A reverted call still pays for gas but keeps its value.
            let charged = if success { cost } else { cost - tx.value };
            (success, charged, ledger.drop_call_receipts)
        };
        ledger.balances.insert(tx.from, from_balance - charged);

        if !drop_receipt {
            ledger.receipts.insert(
                tx_hash,
                TxReceipt {
                    tx_hash,
                    block_number,
                    success,
                },
            );
        }
        Ok(())
    }
}

impl ChainClient for MockChain {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(56)
    }

    async fn balance(&self, address: Address) -> Result<U256, ChainError> {
        let mut ledger = self.ledger.lock().unwrap();
        if ledger.balance_failures > 0 {
            ledger.balance_failures -= 1;
            return Err(ChainError::Network("connection reset".into()));
        }
        Ok(ledger.balances.get(&address).copied().unwrap_or_default())
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        let mut ledger = self.ledger.lock().unwrap();
        if ledger.gas_price_failures > 0 {
            ledger.gas_price_failures -= 1;
            return Err(ChainError::Network("timeout".into()));
        }
        Ok(self.gas_price)
    }

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64, ChainError> {
        let ledger = self.ledger.lock().unwrap();
        if ledger.reject_estimates {
            return Err(ChainError::Rejected("execution reverted".into()));
        }
        let price = tx.gas_price.unwrap_or(self.gas_price);
        let needed = tx.value + U256::from(price) * U256::from(self.call_gas);
        let balance = ledger.balances.get(&tx.from).copied().unwrap_or_default();
        if balance < needed {
            return Err(ChainError::Rejected(
                "insufficient funds for gas * price + value".into(),
            ));
        }
        Ok(self.call_gas)
    }

    async fn sign(&self, tx: &TxRequest) -> Result<SignedTx, ChainError> {
        let mut ledger = self.ledger.lock().unwrap();
        let nonce = ledger.nonces.get(&tx.from).copied().unwrap_or_default();
        ledger.next_tx += 1;
        let hash = TxHash::left_padding_from(&ledger.next_tx.to_be_bytes());
        ledger.signed.insert(hash, (tx.clone(), nonce));
        Ok(SignedTx {
            hash,
            nonce,
            raw: Bytes::copy_from_slice(hash.as_slice()),
        })
    }

    async fn broadcast(&self, signed: &SignedTx) -> Result<TxHash, ChainError> {
        let mut ledger = self.ledger.lock().unwrap();
        ledger.broadcasts += 1;
        if ledger.submit_failures > 0 {
            ledger.submit_failures -= 1;
            return Err(ChainError::Network("connection reset".into()));
        }
        let Some((tx, nonce)) = ledger.signed.get(&signed.hash).cloned() else {
            return Err(ChainError::Rejected("invalid transaction encoding".into()));
        };

        let expected = ledger.nonces.get(&tx.from).copied().unwrap_or_default();
        if nonce < expected {
            let reason = if ledger.included.contains(&signed.hash) {
                "already known"
            } else {
                "nonce too low"
            };
            return Err(ChainError::NonceConsumed(reason.into()));
        }
        if nonce > expected {
            return Err(ChainError::Rejected(format!("nonce gap: expected {expected}, got {nonce}")));
        }
        if ledger.rejected_submits > 0 {
            ledger.rejected_submits -= 1;
            return Err(ChainError::Rejected("insufficient funds for gas * price + value".into()));
        }

        self.include(&mut ledger, &tx, signed.hash)?;
        if ledger.lost_responses > 0 {
            ledger.lost_responses -= 1;
            return Err(ChainError::Network("response lost".into()));
        }
        Ok(signed.hash)
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash, _timeout: Duration) -> Result<TxReceipt, ChainError> {
        let ledger = self.ledger.lock().unwrap();
        ledger
            .receipts
            .get(&tx_hash)
            .copied()
            .ok_or(ChainError::ConfirmationTimeout(tx_hash))
    }

    async fn has_code(&self, address: Address) -> Result<bool, ChainError> {
        Ok(self.ledger.lock().unwrap().code.contains(&address))
    }
}

#[allow(dead_code)]
pub fn funder() -> FundingAccount {
    FundingAccount {
        address: Address::repeat_byte(0xaa),
    }
}

#[allow(dead_code)]
pub fn worker_addresses(n: u8) -> Vec<Address> {
    (1..=n).map(Address::repeat_byte).collect()
}

#[allow(dead_code)]
pub fn pool(n: u8) -> AccountPool {
    AccountPool::new(&worker_addresses(n), &funder()).unwrap()
}

#[allow(dead_code)]
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    }
}

/// Fixed stake, no sleep between cycles, instant retries.
#[allow(dead_code)]
pub fn test_config() -> SchedulerConfig {
    SchedulerConfig {
        stake: StakeBounds {
            min: STAKE,
            max: STAKE,
        },
        base_interval: Duration::ZERO,
        confirmation_timeout: Duration::from_millis(50),
        retry: fast_retry(),
        ..SchedulerConfig::default()
    }
}

#[allow(dead_code)]
pub fn scheduler(
    chain: &Arc<MockChain>,
    pool_size: u8,
    config: SchedulerConfig,
) -> RotationScheduler<MockChain, StdRng> {
    RotationScheduler::new(
        chain.clone(),
        pool(pool_size),
        funder(),
        config,
        StdRng::seed_from_u64(7),
    )
}
