//! Chain balance lookups used by balance predicates.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use iryshare_core::Address;

use crate::error::{AccessError, Result};

/// Source of native balances.
#[async_trait]
pub trait BalanceOracle: Send + Sync {
    /// Balance of `address` on `chain`, in the chain's smallest unit.
    async fn balance(&self, chain: &str, address: &Address) -> Result<u128>;
}

/// Fixed balances, zero for anyone not listed.
#[derive(Debug, Default)]
pub struct StaticBalances {
    balances: RwLock<HashMap<(String, Address), u128>>,
}

impl StaticBalances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the balance of `address` on `chain`.
    pub fn set(&self, chain: &str, address: Address, amount: u128) {
        let mut balances = self
            .balances
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        balances.insert((chain.to_string(), address), amount);
    }
}

#[async_trait]
impl BalanceOracle for StaticBalances {
    async fn balance(&self, chain: &str, address: &Address) -> Result<u128> {
        let balances = self
            .balances
            .read()
            .map_err(|e| AccessError::Oracle(e.to_string()))?;
        Ok(balances
            .get(&(chain.to_string(), address.clone()))
            .copied()
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unlisted_is_zero() {
        let oracle = StaticBalances::new();
        let a = Address::parse("0xaaa").unwrap();

        assert_eq!(oracle.balance("ethereum", &a).await.unwrap(), 0);

        oracle.set("ethereum", a.clone(), 5);
        assert_eq!(oracle.balance("ethereum", &a).await.unwrap(), 5);
        assert_eq!(oracle.balance("base", &a).await.unwrap(), 0);
    }
}
