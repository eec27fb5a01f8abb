use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, U256};

use crate::chain::ChainClient;
use crate::models::{AccountPool, FundingAccount};

/// What the `check` command observed.
#[derive(Debug, Clone)]
pub struct PreflightReport {
    pub admin_balance: U256,
    pub contract_deployed: bool,
    pub worker_balances: Vec<(Address, U256)>,
}

/// Read-only deployment check. The chain id was already verified on connect.
///
/// Fails when no contract is deployed at `contract`; an empty funding
/// account only warns, since workers may already hold enough.
pub async fn run_preflight<C: ChainClient>(
    chain: &C,
    funder: &FundingAccount,
    pool: &AccountPool,
    contract: Address,
) -> anyhow::Result<PreflightReport> {
    let admin_balance = chain.balance(funder.address).await?;
    if admin_balance.is_zero() {
        tracing::warn!(admin = %funder.address, "Funding account has no balance");
    } else {
        tracing::info!(
            admin = %funder.address,
            balance = %format_ether(admin_balance),
            "Funding account balance"
        );
    }

    let contract_deployed = chain.has_code(contract).await?;
    if !contract_deployed {
        tracing::error!(contract = %contract, "No contract code at address");
        anyhow::bail!("no contract deployed at {contract}");
    }
    tracing::info!(contract = %contract, "Contract code present");

    let mut worker_balances = Vec::with_capacity(pool.len());
    for account in pool.iter() {
        let balance = chain.balance(account.address).await?;
        tracing::info!(
            index = account.index,
            account = %account.address,
            balance = %format_ether(balance),
            "Worker balance"
        );
        worker_balances.push((account.address, balance));
    }

    Ok(PreflightReport {
        admin_balance,
        contract_deployed,
        worker_balances,
    })
}
