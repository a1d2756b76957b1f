//! Stake accounting across topics, reputers and delegators.
//!
//! Own stake, delegated stake and their cached aggregates (reputer
//! authority, per-delegator sums, stake upon a reputer, topic and total
//! stake) are only ever written together by [`StakeLedger::apply_reputer_stake_delta`]
//! and [`StakeLedger::apply_delegated_stake_delta`]. Both compute every new
//! value with checked arithmetic before the first write, so a failed update
//! touches nothing.

use crate::bank::{AccountKeeper, BankKeeper, PENDING_DELEGATOR_REWARDS_MODULE, STAKING_MODULE};
use crate::error::{EmissionsError, Result};
use crate::prefixes::*;
use emissions_math::{Dec, MathError};
use emissions_storage::{Item, KeyCodec, Map, StorageBackend};
use emissions_types::{Amount, DelegatorInfo, TopicId};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StakeDelta {
    Increase(Amount),
    Decrease(Amount),
}

impl StakeDelta {
    fn apply(self, current: Amount, what: &'static str) -> Result<Amount> {
        match self {
            StakeDelta::Increase(amount) => current
                .checked_add(amount)
                .ok_or(EmissionsError::Math(MathError::Overflow(what))),
            StakeDelta::Decrease(amount) => current.checked_sub(amount).ok_or_else(|| {
                EmissionsError::DataCorruption(format!(
                    "{} would go negative: {} - {}",
                    what, current, amount
                ))
            }),
        }
    }
}

pub struct StakeLedger {
    bank: Arc<dyn BankKeeper>,
    denom: String,
    pub(crate) staking_account: String,
    pub(crate) pending_rewards_account: String,

    pub(crate) stake_reputer: Map<(TopicId, String), Amount>,
    pub(crate) stake_reputer_authority: Map<(TopicId, String), Amount>,
    pub(crate) delegated_stake: Map<(TopicId, String, String), DelegatorInfo>,
    pub(crate) stake_sum_from_delegator: Map<(TopicId, String), Amount>,
    pub(crate) stake_from_delegators_upon_reputer: Map<(TopicId, String), Amount>,
    pub(crate) reward_per_share: Map<(TopicId, String), Dec>,
    pub(crate) topic_stake: Map<TopicId, Amount>,
    pub(crate) total_stake: Item<Amount>,
}

async fn write_amount<K>(map: &Map<K, Amount>, key: &K, amount: Amount) -> Result<()>
where
    K: KeyCodec,
{
    if amount.is_zero() {
        map.remove(key).await?;
    } else {
        map.set(key, &amount).await?;
    }
    Ok(())
}

impl StakeLedger {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        bank: Arc<dyn BankKeeper>,
        accounts: &dyn AccountKeeper,
        denom: &str,
    ) -> Result<Self> {
        let b = || backend.clone();
        Ok(Self {
            bank,
            denom: denom.to_string(),
            staking_account: accounts.module_address(STAKING_MODULE)?,
            pending_rewards_account: accounts.module_address(PENDING_DELEGATOR_REWARDS_MODULE)?,
            stake_reputer: Map::new(b(), *PREFIX_STAKE_REPUTER),
            stake_reputer_authority: Map::new(b(), *PREFIX_STAKE_REPUTER_AUTHORITY),
            delegated_stake: Map::new(b(), *PREFIX_DELEGATED_STAKE),
            stake_sum_from_delegator: Map::new(b(), *PREFIX_STAKE_SUM_FROM_DELEGATOR),
            stake_from_delegators_upon_reputer: Map::new(
                b(),
                *PREFIX_STAKE_FROM_DELEGATORS_UPON_REPUTER,
            ),
            reward_per_share: Map::new(b(), *PREFIX_DELEGATE_REWARD_PER_SHARE),
            topic_stake: Map::new(b(), *PREFIX_TOPIC_STAKE),
            total_stake: Item::new(b(), *PREFIX_TOTAL_STAKE),
        })
    }

    pub fn denom(&self) -> &str {
        &self.denom
    }

    pub fn bank(&self) -> &Arc<dyn BankKeeper> {
        &self.bank
    }

    pub fn staking_account(&self) -> &str {
        &self.staking_account
    }

    pub fn pending_rewards_account(&self) -> &str {
        &self.pending_rewards_account
    }

    // Reads

    pub async fn get_stake_reputer(&self, topic_id: TopicId, reputer: &str) -> Result<Amount> {
        Ok(self
            .stake_reputer
            .get_or_default(&(topic_id, reputer.to_string()))
            .await?)
    }

    pub async fn get_reputer_authority(&self, topic_id: TopicId, reputer: &str) -> Result<Amount> {
        Ok(self
            .stake_reputer_authority
            .get_or_default(&(topic_id, reputer.to_string()))
            .await?)
    }

    pub async fn get_delegator_info(
        &self,
        topic_id: TopicId,
        delegator: &str,
        reputer: &str,
    ) -> Result<DelegatorInfo> {
        Ok(self
            .delegated_stake
            .get_or_default(&(topic_id, delegator.to_string(), reputer.to_string()))
            .await?)
    }

    pub async fn get_stake_sum_from_delegator(
        &self,
        topic_id: TopicId,
        delegator: &str,
    ) -> Result<Amount> {
        Ok(self
            .stake_sum_from_delegator
            .get_or_default(&(topic_id, delegator.to_string()))
            .await?)
    }

    pub async fn get_stake_upon_reputer(&self, topic_id: TopicId, reputer: &str) -> Result<Amount> {
        Ok(self
            .stake_from_delegators_upon_reputer
            .get_or_default(&(topic_id, reputer.to_string()))
            .await?)
    }

    pub async fn get_reward_per_share(&self, topic_id: TopicId, reputer: &str) -> Result<Dec> {
        Ok(self
            .reward_per_share
            .get_or_default(&(topic_id, reputer.to_string()))
            .await?)
    }

    pub async fn get_topic_stake(&self, topic_id: TopicId) -> Result<Amount> {
        Ok(self.topic_stake.get_or_default(&topic_id).await?)
    }

    pub async fn get_total_stake(&self) -> Result<Amount> {
        Ok(self.total_stake.get_or_default().await?)
    }

    /// `amount * reward_per_share - reward_debt`; negative means the ledger is corrupt.
    pub async fn pending_reward(
        &self,
        topic_id: TopicId,
        delegator: &str,
        reputer: &str,
    ) -> Result<Dec> {
        let info = self.get_delegator_info(topic_id, delegator, reputer).await?;
        let share = self.get_reward_per_share(topic_id, reputer).await?;
        Ok(pending_of(&info, share)?)
    }

    // Lock-step writers

    /// Moves a reputer's own stake together with its authority, the topic
    /// stake and the total stake.
    pub(crate) async fn apply_reputer_stake_delta(
        &self,
        topic_id: TopicId,
        reputer: &str,
        delta: StakeDelta,
    ) -> Result<Amount> {
        let key = (topic_id, reputer.to_string());

        let own = self.stake_reputer.get_or_default(&key).await?;
        let new_own = match delta {
            StakeDelta::Decrease(amount) if amount > own => {
                return Err(EmissionsError::InsufficientStake {
                    requested: amount,
                    available: own,
                })
            }
            _ => delta.apply(own, "stake_reputer")?,
        };
        let new_authority = delta.apply(
            self.stake_reputer_authority.get_or_default(&key).await?,
            "stake_reputer_authority",
        )?;
        let new_topic = delta.apply(
            self.topic_stake.get_or_default(&topic_id).await?,
            "topic_stake",
        )?;
        let new_total = delta.apply(self.total_stake.get_or_default().await?, "total_stake")?;

        write_amount(&self.stake_reputer, &key, new_own).await?;
        write_amount(&self.stake_reputer_authority, &key, new_authority).await?;
        write_amount(&self.topic_stake, &topic_id, new_topic).await?;
        self.total_stake.set(&new_total).await?;

        debug!(
            topic_id,
            reputer = %reputer,
            delta = ?delta,
            stake_after = %new_own,
            topic_stake_after = %new_topic,
            "Reputer stake updated"
        );
        Ok(new_own)
    }

    /// Moves one delegated position together with both delegation sums, the
    /// reputer's authority, the topic stake and the total stake. The reward
    /// debt is reset to `new_amount * share`.
    pub(crate) async fn apply_delegated_stake_delta(
        &self,
        topic_id: TopicId,
        delegator: &str,
        reputer: &str,
        delta: StakeDelta,
    ) -> Result<DelegatorInfo> {
        let position_key = (topic_id, delegator.to_string(), reputer.to_string());
        let delegator_key = (topic_id, delegator.to_string());
        let reputer_key = (topic_id, reputer.to_string());

        let info = self.delegated_stake.get_or_default(&position_key).await?;
        let new_amount = match delta {
            StakeDelta::Decrease(amount) if amount > info.amount => {
                return Err(EmissionsError::InsufficientStake {
                    requested: amount,
                    available: info.amount,
                })
            }
            _ => delta.apply(info.amount, "delegated_stake")?,
        };
        let share = self.reward_per_share.get_or_default(&reputer_key).await?;
        let new_info = DelegatorInfo {
            amount: new_amount,
            reward_debt: new_amount.to_dec()?.checked_mul(share)?,
        };

        let new_sum = delta.apply(
            self.stake_sum_from_delegator
                .get_or_default(&delegator_key)
                .await?,
            "stake_sum_from_delegator",
        )?;
        let new_upon = delta.apply(
            self.stake_from_delegators_upon_reputer
                .get_or_default(&reputer_key)
                .await?,
            "stake_from_delegators_upon_reputer",
        )?;
        let new_authority = delta.apply(
            self.stake_reputer_authority
                .get_or_default(&reputer_key)
                .await?,
            "stake_reputer_authority",
        )?;
        let new_topic = delta.apply(
            self.topic_stake.get_or_default(&topic_id).await?,
            "topic_stake",
        )?;
        let new_total = delta.apply(self.total_stake.get_or_default().await?, "total_stake")?;

        if new_info.amount.is_zero() {
            self.delegated_stake.remove(&position_key).await?;
        } else {
            self.delegated_stake.set(&position_key, &new_info).await?;
        }
        write_amount(&self.stake_sum_from_delegator, &delegator_key, new_sum).await?;
        write_amount(&self.stake_from_delegators_upon_reputer, &reputer_key, new_upon).await?;
        write_amount(&self.stake_reputer_authority, &reputer_key, new_authority).await?;
        write_amount(&self.topic_stake, &topic_id, new_topic).await?;
        self.total_stake.set(&new_total).await?;

        debug!(
            topic_id,
            delegator = %delegator,
            reputer = %reputer,
            delta = ?delta,
            position_after = %new_info.amount,
            stake_upon_reputer_after = %new_upon,
            "Delegated stake updated"
        );
        Ok(new_info)
    }

    // Operations

    /// Moves `amount` from the reputer into the staking account and credits it
    /// as own stake.
    pub async fn add_stake(&self, topic_id: TopicId, reputer: &str, amount: Amount) -> Result<()> {
        self.bank
            .send_coins(reputer, &self.staking_account, &self.denom, amount)
            .await?;
        let stake_after = self
            .apply_reputer_stake_delta(topic_id, reputer, StakeDelta::Increase(amount))
            .await?;

        info!(
            topic_id,
            reputer = %reputer,
            amount = %amount,
            stake_after = %stake_after,
            "💰 Stake added"
        );
        Ok(())
    }

    /// Debits own stake and returns the tokens to the reputer.
    pub(crate) async fn withdraw_stake(
        &self,
        topic_id: TopicId,
        reputer: &str,
        amount: Amount,
    ) -> Result<()> {
        let stake_after = self
            .apply_reputer_stake_delta(topic_id, reputer, StakeDelta::Decrease(amount))
            .await?;
        self.bank
            .send_coins(&self.staking_account, reputer, &self.denom, amount)
            .await?;

        info!(
            topic_id,
            reputer = %reputer,
            amount = %amount,
            stake_after = %stake_after,
            "💸 Stake withdrawn"
        );
        Ok(())
    }

    /// Settles the delegator's pending reward, then delegates `amount` upon
    /// `reputer`. Returns the reward paid out.
    pub async fn delegate_stake(
        &self,
        topic_id: TopicId,
        delegator: &str,
        reputer: &str,
        amount: Amount,
    ) -> Result<Amount> {
        let paid = self.pay_pending_reward(topic_id, delegator, reputer).await?;

        self.bank
            .send_coins(delegator, &self.staking_account, &self.denom, amount)
            .await?;
        let info = self
            .apply_delegated_stake_delta(topic_id, delegator, reputer, StakeDelta::Increase(amount))
            .await?;

        info!(
            topic_id,
            delegator = %delegator,
            reputer = %reputer,
            amount = %amount,
            position_after = %info.amount,
            reward_paid = %paid,
            "🤝 Stake delegated"
        );
        Ok(paid)
    }

    /// Settles the pending reward, debits the delegated position and returns
    /// the tokens to the delegator. Returns the reward paid out.
    pub(crate) async fn withdraw_delegated_stake(
        &self,
        topic_id: TopicId,
        delegator: &str,
        reputer: &str,
        amount: Amount,
    ) -> Result<Amount> {
        let paid = self.pay_pending_reward(topic_id, delegator, reputer).await?;

        let info = self
            .apply_delegated_stake_delta(topic_id, delegator, reputer, StakeDelta::Decrease(amount))
            .await?;
        self.bank
            .send_coins(&self.staking_account, delegator, &self.denom, amount)
            .await?;

        info!(
            topic_id,
            delegator = %delegator,
            reputer = %reputer,
            amount = %amount,
            position_after = %info.amount,
            reward_paid = %paid,
            "💸 Delegated stake withdrawn"
        );
        Ok(paid)
    }

    /// Pays the delegator's pending reward and resets its reward debt.
    pub async fn reward_delegate_stake(
        &self,
        topic_id: TopicId,
        delegator: &str,
        reputer: &str,
    ) -> Result<Amount> {
        let paid = self.pay_pending_reward(topic_id, delegator, reputer).await?;
        info!(
            topic_id,
            delegator = %delegator,
            reputer = %reputer,
            amount = %paid,
            "🎁 Delegator reward claimed"
        );
        Ok(paid)
    }

    /// Moves `amount` from `source` into the pending-reward account and
    /// spreads it over the stake delegated upon `reputer`. Returns the new
    /// reward per share.
    pub async fn add_delegator_reward(
        &self,
        topic_id: TopicId,
        reputer: &str,
        source: &str,
        amount: Amount,
    ) -> Result<Dec> {
        let key = (topic_id, reputer.to_string());
        let upon = self
            .stake_from_delegators_upon_reputer
            .get_or_default(&key)
            .await?;
        if upon.is_zero() {
            return Err(EmissionsError::NoDelegatedStake {
                topic_id,
                reputer: reputer.to_string(),
            });
        }

        let share = self.reward_per_share.get_or_default(&key).await?;
        let increment = amount.to_dec()?.checked_quo(upon.to_dec()?)?;
        let new_share = share.checked_add(increment)?;

        self.bank
            .send_coins(source, &self.pending_rewards_account, &self.denom, amount)
            .await?;
        self.reward_per_share.set(&key, &new_share).await?;

        info!(
            topic_id,
            reputer = %reputer,
            amount = %amount,
            stake_upon_reputer = %upon,
            reward_per_share = %new_share,
            "🏆 Delegator reward added"
        );
        Ok(new_share)
    }

    async fn pay_pending_reward(
        &self,
        topic_id: TopicId,
        delegator: &str,
        reputer: &str,
    ) -> Result<Amount> {
        let position_key = (topic_id, delegator.to_string(), reputer.to_string());
        let Some(info) = self.delegated_stake.get(&position_key).await? else {
            return Ok(Amount::ZERO);
        };

        let share = self
            .reward_per_share
            .get_or_default(&(topic_id, reputer.to_string()))
            .await?;
        let owed = info.amount.to_dec()?.checked_mul(share)?;
        let pending = owed.checked_sub(info.reward_debt)?;
        if pending.is_negative() {
            return Err(EmissionsError::DataCorruption(format!(
                "negative pending reward {} for delegator {} upon {} in topic {}",
                pending, delegator, reputer, topic_id
            )));
        }

        let payout = Amount::from_dec_floor(pending)?;
        if !payout.is_zero() {
            self.bank
                .send_coins(&self.pending_rewards_account, delegator, &self.denom, payout)
                .await?;
        }

        let settled = DelegatorInfo {
            amount: info.amount,
            reward_debt: owed,
        };
        self.delegated_stake.set(&position_key, &settled).await?;

        debug!(
            topic_id,
            delegator = %delegator,
            reputer = %reputer,
            payout = %payout,
            "Pending reward settled"
        );
        Ok(payout)
    }
}

pub(crate) fn pending_of(info: &DelegatorInfo, share: Dec) -> std::result::Result<Dec, MathError> {
    info.amount
        .to_dec()?
        .checked_mul(share)?
        .checked_sub(info.reward_debt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::{ModuleAccounts, StoreBank};
    use emissions_storage::MemoryBackend;
    use emissions_types::address_from_seed;

    const DENOM: &str = "uemx";

    fn addr(seed: &str) -> String {
        address_from_seed(seed.as_bytes()).unwrap()
    }

    async fn setup() -> (StakeLedger, Arc<StoreBank>) {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let bank = Arc::new(StoreBank::new(backend.clone()));
        for who in ["reputer", "delegator", "delegator2", "funder"] {
            bank.mint(&addr(who), DENOM, Amount::new(1_000)).await.unwrap();
        }
        let ledger = StakeLedger::new(backend, bank.clone(), &ModuleAccounts, DENOM).unwrap();
        (ledger, bank)
    }

    #[tokio::test]
    async fn test_add_stake_updates_all_aggregates() {
        let (ledger, bank) = setup().await;
        let reputer = addr("reputer");

        ledger.add_stake(1, &reputer, Amount::new(100)).await.unwrap();
        ledger.add_stake(2, &reputer, Amount::new(50)).await.unwrap();

        assert_eq!(ledger.get_stake_reputer(1, &reputer).await.unwrap(), Amount::new(100));
        assert_eq!(ledger.get_reputer_authority(1, &reputer).await.unwrap(), Amount::new(100));
        assert_eq!(ledger.get_topic_stake(1).await.unwrap(), Amount::new(100));
        assert_eq!(ledger.get_total_stake().await.unwrap(), Amount::new(150));
        assert_eq!(
            bank.get_balance(ledger.staking_account(), DENOM).await.unwrap(),
            Amount::new(150)
        );
        assert_eq!(bank.get_balance(&reputer, DENOM).await.unwrap(), Amount::new(850));
    }

    #[tokio::test]
    async fn test_withdraw_more_than_stake_fails_without_writes() {
        let (ledger, _) = setup().await;
        let reputer = addr("reputer");
        ledger.add_stake(1, &reputer, Amount::new(10)).await.unwrap();

        let err = ledger
            .withdraw_stake(1, &reputer, Amount::new(11))
            .await
            .unwrap_err();
        assert!(matches!(err, EmissionsError::InsufficientStake { .. }));
        assert_eq!(ledger.get_topic_stake(1).await.unwrap(), Amount::new(10));
    }

    #[tokio::test]
    async fn test_delegation_keeps_sums_in_lock_step() {
        let (ledger, _) = setup().await;
        let reputer = addr("reputer");
        let delegator = addr("delegator");

        ledger.add_stake(1, &reputer, Amount::new(100)).await.unwrap();
        ledger
            .delegate_stake(1, &delegator, &reputer, Amount::new(40))
            .await
            .unwrap();

        assert_eq!(
            ledger.get_stake_sum_from_delegator(1, &delegator).await.unwrap(),
            Amount::new(40)
        );
        assert_eq!(ledger.get_stake_upon_reputer(1, &reputer).await.unwrap(), Amount::new(40));
        assert_eq!(ledger.get_reputer_authority(1, &reputer).await.unwrap(), Amount::new(140));
        assert_eq!(ledger.get_topic_stake(1).await.unwrap(), Amount::new(140));

        ledger
            .withdraw_delegated_stake(1, &delegator, &reputer, Amount::new(40))
            .await
            .unwrap();

        // emptied entries are deleted
        assert!(ledger.delegated_stake.is_empty().await.unwrap());
        assert!(ledger.stake_sum_from_delegator.is_empty().await.unwrap());
        assert!(ledger.stake_from_delegators_upon_reputer.is_empty().await.unwrap());
        assert_eq!(ledger.get_reputer_authority(1, &reputer).await.unwrap(), Amount::new(100));
    }

    #[tokio::test]
    async fn test_rewards_split_by_delegated_share() {
        let (ledger, bank) = setup().await;
        let reputer = addr("reputer");
        let d1 = addr("delegator");
        let d2 = addr("delegator2");

        ledger.delegate_stake(1, &d1, &reputer, Amount::new(300)).await.unwrap();
        ledger.delegate_stake(1, &d2, &reputer, Amount::new(100)).await.unwrap();

        let share = ledger
            .add_delegator_reward(1, &reputer, &addr("funder"), Amount::new(200))
            .await
            .unwrap();
        assert_eq!(share, "0.5".parse().unwrap());

        assert_eq!(
            ledger.pending_reward(1, &d1, &reputer).await.unwrap(),
            "150".parse().unwrap()
        );
        let paid = ledger.reward_delegate_stake(1, &d1, &reputer).await.unwrap();
        assert_eq!(paid, Amount::new(150));
        assert_eq!(bank.get_balance(&d1, DENOM).await.unwrap(), Amount::new(850));
        assert!(ledger.pending_reward(1, &d1, &reputer).await.unwrap().is_zero());

        // a second claim pays nothing
        assert_eq!(
            ledger.reward_delegate_stake(1, &d1, &reputer).await.unwrap(),
            Amount::ZERO
        );

        // topping up the position settles the pending reward first
        let paid = ledger
            .delegate_stake(1, &d2, &reputer, Amount::new(10))
            .await
            .unwrap();
        assert_eq!(paid, Amount::new(50));
        assert!(ledger.pending_reward(1, &d2, &reputer).await.unwrap().is_zero());
        assert_eq!(
            bank.get_balance(ledger.pending_rewards_account(), DENOM)
                .await
                .unwrap(),
            Amount::ZERO
        );
    }

    #[tokio::test]
    async fn test_reward_without_delegations_is_rejected() {
        let (ledger, _) = setup().await;
        let err = ledger
            .add_delegator_reward(1, &addr("reputer"), &addr("funder"), Amount::new(5))
            .await
            .unwrap_err();
        assert!(matches!(err, EmissionsError::NoDelegatedStake { topic_id: 1, .. }));
    }

    #[tokio::test]
    async fn test_corrupt_reward_debt_is_reported() {
        let (ledger, _) = setup().await;
        let reputer = addr("reputer");
        let delegator = addr("delegator");
        ledger
            .delegate_stake(1, &delegator, &reputer, Amount::new(10))
            .await
            .unwrap();

        let key = (1, delegator.clone(), reputer.clone());
        ledger
            .delegated_stake
            .set(
                &key,
                &DelegatorInfo {
                    amount: Amount::new(10),
                    reward_debt: "5".parse().unwrap(),
                },
            )
            .await
            .unwrap();

        let err = ledger
            .reward_delegate_stake(1, &delegator, &reputer)
            .await
            .unwrap_err();
        assert!(matches!(err, EmissionsError::DataCorruption(_)));
    }
}
