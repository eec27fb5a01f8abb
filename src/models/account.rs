use std::collections::HashSet;

use alloy::primitives::Address;
use serde::Serialize;

use crate::errors::ConfigError;

/// One of the N rotating executing identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerAccount {
    pub index: usize,
    pub address: Address,
}

/// The single source of top-up funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FundingAccount {
    pub address: Address,
}

/// Fixed-size rotation pool, validated at construction.
#[derive(Debug, Clone)]
pub struct AccountPool {
    accounts: Vec<WorkerAccount>,
}

impl AccountPool {
    /// Build the pool in configuration order.
    ///
    /// Rejects an empty pool, duplicate addresses, and a pool that contains
    /// the funding account.
    pub fn new(addresses: &[Address], funder: &FundingAccount) -> Result<Self, ConfigError> {
        if addresses.is_empty() {
            return Err(ConfigError::EmptyPool);
        }

        let mut seen = HashSet::with_capacity(addresses.len());
        let mut accounts = Vec::with_capacity(addresses.len());
        for (index, &address) in addresses.iter().enumerate() {
            if address == funder.address {
                return Err(ConfigError::FunderInPool(address));
            }
            if !seen.insert(address) {
                return Err(ConfigError::DuplicateWorker(address));
            }
            accounts.push(WorkerAccount { index, address });
        }

        Ok(Self { accounts })
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Account at `index mod N`.
    pub fn get(&self, index: usize) -> WorkerAccount {
        self.accounts[index % self.accounts.len()]
    }

    /// The accounts after `start` in rotation order, excluding `start` itself.
    pub fn failover_order(&self, start: usize) -> impl Iterator<Item = WorkerAccount> + '_ {
        let n = self.accounts.len();
        (1..n).map(move |offset| self.accounts[(start + offset) % n])
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkerAccount> {
        self.accounts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(n: u8) -> Vec<Address> {
        (1..=n).map(Address::repeat_byte).collect()
    }

    fn funder() -> FundingAccount {
        FundingAccount {
            address: Address::repeat_byte(0xff),
        }
    }

    #[test]
    fn test_empty_pool_rejected() {
        assert!(matches!(AccountPool::new(&[], &funder()), Err(ConfigError::EmptyPool)));
    }

    #[test]
    fn test_funder_in_pool_rejected() {
        let mut list = addrs(2);
        list.push(funder().address);
        assert!(matches!(
            AccountPool::new(&list, &funder()),
            Err(ConfigError::FunderInPool(_))
        ));
    }

    #[test]
    fn test_duplicate_rejected() {
        let list = vec![Address::repeat_byte(1), Address::repeat_byte(1)];
        assert!(matches!(
            AccountPool::new(&list, &funder()),
            Err(ConfigError::DuplicateWorker(_))
        ));
    }

    #[test]
    fn test_failover_order_wraps() {
        let pool = AccountPool::new(&addrs(4), &funder()).unwrap();
        let order: Vec<usize> = pool.failover_order(2).map(|a| a.index).collect();
        assert_eq!(order, vec![3, 0, 1]);
    }

    #[test]
    fn test_single_account_has_no_failover() {
        let pool = AccountPool::new(&addrs(1), &funder()).unwrap();
        assert_eq!(pool.failover_order(0).count(), 0);
    }
}
