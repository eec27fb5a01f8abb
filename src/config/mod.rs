use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::utils::{parse_ether, parse_units};
use alloy::primitives::{Address, U256};

use crate::chain::contract::{DEFAULT_CONTRACT_ADDRESS, PRICE_DECIMALS};
use crate::chain::Credential;
use crate::errors::ConfigError;
use crate::execution::gas::DEFAULT_PREFUND_GAS_LIMIT;
use crate::execution::{ActionTemplate, RetryPolicy, SchedulerConfig, StakeBounds};
use crate::models::{AdvancePolicy, DirectionMode};

const DEFAULT_RPC_URL: &str = "https://bsc-dataseed.binance.org";
const BSC_CHAIN_ID: u64 = 56;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
/// Upper bound on the base pause between cycles (one week).
const MAX_TX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Chain
    pub rpc_url: String,
    pub expected_chain_id: u64,
    pub admin: Credential,
    pub workers: Vec<Credential>,
    pub contract: Address,

    // Action parameters
    pub pair: u8,
    pub target_price: U256,
    pub duration_secs: u64,
    pub use_secondary_asset: bool,
    pub secondary_asset_amount: U256,
    pub min_stake: U256,
    pub max_stake: U256,

    // Scheduling
    pub tx_interval: Duration,
    pub max_tx: u64,
    pub direction_mode: DirectionMode,
    pub advance_policy: AdvancePolicy,
    pub prefund_gas_limit: u64,
    pub confirmation_timeout: Duration,
    pub rpc_max_retries: u32,
    pub rpc_retry_base: Duration,
    pub rng_seed: Option<u64>,
    pub state_file: Option<PathBuf>,

    // Ops server
    pub ops_enabled: bool,
    pub host: String,
    pub port: u16,
    pub api_token: Option<String>,

    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let admin_key = get("ADMIN_PRIVATE_KEY").ok_or(ConfigError::Missing("ADMIN_PRIVATE_KEY"))?;
        let admin = parse_credential("ADMIN_PRIVATE_KEY", &admin_key)?;
        let workers = worker_credentials(&get)?;
        if workers.is_empty() {
            return Err(ConfigError::EmptyPool);
        }

        let contract = match get("CONTRACT_ADDRESS") {
            Some(raw) => raw.parse::<Address>().map_err(|e| invalid("CONTRACT_ADDRESS", e))?,
            None => DEFAULT_CONTRACT_ADDRESS,
        };

        let min_stake = parse_amount(&get, "MIN_STAKE", "0.00001")?;
        let max_stake = parse_amount(&get, "MAX_STAKE", "0.00002")?;
        if min_stake > max_stake {
            return Err(ConfigError::StakeBounds {
                min: min_stake,
                max: max_stake,
            });
        }
        if u128::try_from(max_stake).is_err() {
            return Err(invalid("MAX_STAKE", "exceeds the supported range"));
        }

        let target_raw = get("TARGET_PRICE").unwrap_or_else(|| "600".into());
        if target_raw.starts_with('-') {
            return Err(invalid("TARGET_PRICE", "must not be negative"));
        }
        let target_price: U256 = parse_units(&target_raw, PRICE_DECIMALS)
            .map_err(|e| invalid("TARGET_PRICE", e))?
            .into();

        let direction_raw = get("DIRECTION_MODE").unwrap_or_else(|| "alternate".into());
        let direction_mode = DirectionMode::from_str(&direction_raw)
            .ok_or_else(|| invalid("DIRECTION_MODE", format!("unknown mode {direction_raw:?}")))?;

        let policy_raw = get("ADVANCE_POLICY").unwrap_or_else(|| "always".into());
        let advance_policy = AdvancePolicy::from_str(&policy_raw)
            .ok_or_else(|| invalid("ADVANCE_POLICY", format!("unknown policy {policy_raw:?}")))?;

        let tx_interval_secs: u64 = parse_var(&get, "TX_INTERVAL_SECONDS", 1200)?;
        if tx_interval_secs > MAX_TX_INTERVAL_SECS {
            return Err(invalid(
                "TX_INTERVAL_SECONDS",
                format!("must be at most {MAX_TX_INTERVAL_SECS}"),
            ));
        }

        let state_file = get("STATE_FILE").map(PathBuf::from);
        let rng_seed = match get("RNG_SEED") {
            Some(raw) => Some(raw.parse().map_err(|e| invalid("RNG_SEED", e))?),
            None => None,
        };

        Ok(Self {
            rpc_url: get("RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.into()),
            expected_chain_id: parse_var(&get, "EXPECTED_CHAIN_ID", BSC_CHAIN_ID)?,
            admin,
            workers,
            contract,

            pair: parse_var(&get, "PAIR", 2)?,
            target_price,
            duration_secs: parse_var(&get, "DURATION_SECONDS", 3600)?,
            use_secondary_asset: parse_var(&get, "USE_SECONDARY_ASSET", false)?,
            secondary_asset_amount: parse_var(&get, "SECONDARY_ASSET_AMOUNT", U256::ZERO)?,
            min_stake,
            max_stake,

            tx_interval: Duration::from_secs(tx_interval_secs),
            max_tx: parse_var(&get, "MAX_TX", 0)?,
            direction_mode,
            advance_policy,
            prefund_gas_limit: parse_var(&get, "PREFUND_GAS_LIMIT", DEFAULT_PREFUND_GAS_LIMIT)?,
            confirmation_timeout: Duration::from_secs(parse_var(&get, "CONFIRMATION_TIMEOUT_SECS", 120)?),
            rpc_max_retries: parse_var(&get, "RPC_MAX_RETRIES", 3)?,
            rpc_retry_base: Duration::from_millis(parse_var(&get, "RPC_RETRY_BASE_MS", 500)?),
            rng_seed,
            state_file,

            ops_enabled: parse_var(&get, "OPS_ENABLED", false)?,
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_var(&get, "PORT", 8080)?,
            api_token: get("API_TOKEN"),

            log_format: LogFormat::from_str(&get("LOG_FORMAT").unwrap_or_default()),
        })
    }

    pub fn admin_address(&self) -> Address {
        self.admin.address()
    }

    pub fn worker_addresses(&self) -> Vec<Address> {
        self.workers.iter().map(Credential::address).collect()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.rpc_max_retries,
            base_delay: self.rpc_retry_base,
            max_delay: MAX_RETRY_DELAY,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            contract: self.contract,
            template: ActionTemplate {
                pair: self.pair,
                target_price: self.target_price,
                duration_secs: self.duration_secs,
                use_secondary_asset: self.use_secondary_asset,
                secondary_asset_amount: self.secondary_asset_amount,
            },
            stake: StakeBounds {
                // Both bounds were checked against u128::MAX while parsing.
                min: u128::try_from(self.min_stake).unwrap_or(u128::MAX),
                max: u128::try_from(self.max_stake).unwrap_or(u128::MAX),
            },
            direction_mode: self.direction_mode,
            advance_policy: self.advance_policy,
            base_interval: self.tx_interval,
            max_cycles: (self.max_tx > 0).then_some(self.max_tx),
            prefund_gas_limit: self.prefund_gas_limit,
            confirmation_timeout: self.confirmation_timeout,
            retry: self.retry_policy(),
        }
    }
}

/// Workers from `WALLET_PRIVATE_KEYS`, then `WALLET1_PRIVATE_KEY`,
/// `WALLET2_PRIVATE_KEY`, ... up to the first gap.
fn worker_credentials<G>(get: &G) -> Result<Vec<Credential>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let mut workers = Vec::new();

    if let Some(list) = get("WALLET_PRIVATE_KEYS") {
        for key in list.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            workers.push(parse_credential("WALLET_PRIVATE_KEYS", key)?);
        }
    }

    for n in 1.. {
        let var = format!("WALLET{n}_PRIVATE_KEY");
        let Some(key) = get(var.as_str()) else { break };
        workers.push(parse_credential(&var, &key)?);
    }

    Ok(workers)
}

fn parse_credential(var: &str, key: &str) -> Result<Credential, ConfigError> {
    Credential::from_hex(key).map_err(|_| invalid(var, "not a valid private key"))
}

fn parse_var<G, T>(get: &G, var: &str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match get(var) {
        Some(raw) => raw.parse().map_err(|e| invalid(var, e)),
        None => Ok(default),
    }
}

/// Ether-denominated amount to wei.
fn parse_amount<G>(get: &G, var: &str, default: &str) -> Result<U256, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let raw = get(var).unwrap_or_else(|| default.into());
    if raw.starts_with('-') {
        return Err(invalid(var, "must not be negative"));
    }
    parse_ether(&raw).map_err(|e| invalid(var, e))
}

fn invalid(var: &str, reason: impl Display) -> ConfigError {
    ConfigError::Invalid {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}
