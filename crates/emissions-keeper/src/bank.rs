//! Token custody capabilities consumed by the stake ledger.

use crate::error::{EmissionsError, Result};
use crate::prefixes::PREFIX_BANK_BALANCES;
use async_trait::async_trait;
use emissions_math::MathError;
use emissions_storage::{Map, StorageBackend};
use emissions_types::{address_from_seed, Amount};
use std::sync::Arc;
use tracing::{debug, info};

/// Holds staked tokens, own and delegated.
pub const STAKING_MODULE: &str = "emissions_staking";
/// Holds delegator rewards until they are claimed.
pub const PENDING_DELEGATOR_REWARDS_MODULE: &str = "emissions_pending_delegator_rewards";

#[async_trait]
pub trait BankKeeper: Send + Sync {
    async fn get_balance(&self, address: &str, denom: &str) -> Result<Amount>;

    async fn send_coins(&self, from: &str, to: &str, denom: &str, amount: Amount) -> Result<()>;
}

pub trait AccountKeeper: Send + Sync {
    fn module_address(&self, name: &str) -> Result<String>;
}

/// Derives module addresses as `blake3("module/" + name)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModuleAccounts;

impl AccountKeeper for ModuleAccounts {
    fn module_address(&self, name: &str) -> Result<String> {
        Ok(address_from_seed(format!("module/{}", name).as_bytes())?)
    }
}

/// Bank persisted in the keeper's backend, so token moves share the
/// enclosing transaction with ledger writes.
pub struct StoreBank {
    balances: Map<(String, String), Amount>,
}

impl StoreBank {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            balances: Map::new(backend, *PREFIX_BANK_BALANCES),
        }
    }

    async fn write_balance(&self, address: &str, denom: &str, amount: Amount) -> Result<()> {
        let key = (address.to_string(), denom.to_string());
        if amount.is_zero() {
            self.balances.remove(&key).await?;
        } else {
            self.balances.set(&key, &amount).await?;
        }
        Ok(())
    }

    /// Creates tokens out of thin air. Genesis and test funding only.
    pub async fn mint(&self, address: &str, denom: &str, amount: Amount) -> Result<()> {
        let current = self.get_balance(address, denom).await?;
        let updated = current.checked_add(amount).ok_or_else(|| {
            EmissionsError::Math(MathError::Overflow("mint"))
        })?;
        self.write_balance(address, denom, updated).await?;

        info!(
            address = %address,
            denom = %denom,
            amount = %amount,
            balance_after = %updated,
            "🪙 Tokens minted"
        );
        Ok(())
    }
}

#[async_trait]
impl BankKeeper for StoreBank {
    async fn get_balance(&self, address: &str, denom: &str) -> Result<Amount> {
        Ok(self
            .balances
            .get_or_default(&(address.to_string(), denom.to_string()))
            .await?)
    }

    async fn send_coins(&self, from: &str, to: &str, denom: &str, amount: Amount) -> Result<()> {
        if amount.is_zero() || from == to {
            return Ok(());
        }

        let from_balance = self.get_balance(from, denom).await?;
        let from_after =
            from_balance
                .checked_sub(amount)
                .ok_or_else(|| EmissionsError::InsufficientBalance {
                    address: from.to_string(),
                    requested: amount,
                    available: from_balance,
                })?;
        let to_balance = self.get_balance(to, denom).await?;
        let to_after = to_balance.checked_add(amount).ok_or_else(|| {
            EmissionsError::Math(MathError::Overflow("send_coins"))
        })?;

        self.write_balance(from, denom, from_after).await?;
        self.write_balance(to, denom, to_after).await?;

        debug!(
            from = %from,
            to = %to,
            denom = %denom,
            amount = %amount,
            "Coins sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emissions_storage::MemoryBackend;

    const DENOM: &str = "uemx";

    fn addr(seed: &str) -> String {
        address_from_seed(seed.as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn test_mint_and_send() {
        let bank = StoreBank::new(Arc::new(MemoryBackend::new()));
        let alice = addr("alice");
        let bob = addr("bob");

        bank.mint(&alice, DENOM, Amount::new(100)).await.unwrap();
        bank.send_coins(&alice, &bob, DENOM, Amount::new(40))
            .await
            .unwrap();

        assert_eq!(bank.get_balance(&alice, DENOM).await.unwrap(), Amount::new(60));
        assert_eq!(bank.get_balance(&bob, DENOM).await.unwrap(), Amount::new(40));
        assert_eq!(bank.get_balance(&bob, "other").await.unwrap(), Amount::ZERO);
    }

    #[tokio::test]
    async fn test_insufficient_balance() {
        let bank = StoreBank::new(Arc::new(MemoryBackend::new()));
        let alice = addr("alice");
        bank.mint(&alice, DENOM, Amount::new(5)).await.unwrap();

        let err = bank
            .send_coins(&alice, &addr("bob"), DENOM, Amount::new(6))
            .await
            .unwrap_err();
        assert!(matches!(err, EmissionsError::InsufficientBalance { .. }));
        assert_eq!(bank.get_balance(&alice, DENOM).await.unwrap(), Amount::new(5));
    }

    #[test]
    fn test_module_addresses_are_distinct() {
        let accounts = ModuleAccounts;
        let staking = accounts.module_address(STAKING_MODULE).unwrap();
        let rewards = accounts
            .module_address(PENDING_DELEGATOR_REWARDS_MODULE)
            .unwrap();
        assert_ne!(staking, rewards);
        assert!(staking.starts_with("emx1"));
    }
}
