//! Pending stake removals.
//!
//! Each removal lives in two indexes: by unlock block, scanned by the
//! end-of-block sweep, and by actor, used for lookup and cancellation. There
//! is at most one pending removal per actor; a new request replaces it.

use crate::error::{EmissionsError, Result};
use crate::events::EmissionsEvent;
use crate::prefixes::*;
use crate::stake_ledger::StakeLedger;
use emissions_math::MathError;
use emissions_storage::{Map, StorageBackend};
use emissions_types::{Amount, BlockHeight, DelegateStakeRemovalInfo, StakeRemovalInfo, TopicId};
use std::sync::Arc;
use tracing::{debug, info, warn};

type StakeRemovalBlockKey = (BlockHeight, TopicId, String);
type DelegateRemovalBlockKey = (BlockHeight, TopicId, String, String);

#[derive(Clone)]
pub struct StakeRemovalScheduler {
    pub(crate) stake_removals_by_block: Map<StakeRemovalBlockKey, StakeRemovalInfo>,
    pub(crate) stake_removals_by_actor: Map<(TopicId, String), BlockHeight>,
    pub(crate) delegate_removals_by_block: Map<DelegateRemovalBlockKey, DelegateStakeRemovalInfo>,
    pub(crate) delegate_removals_by_actor: Map<(TopicId, String, String), BlockHeight>,
}

fn unlock_height(block_height: BlockHeight, delay: i64) -> Result<BlockHeight> {
    block_height
        .checked_add(delay)
        .ok_or(EmissionsError::Math(MathError::Overflow("removal unlock height")))
}

impl StakeRemovalScheduler {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        let b = || backend.clone();
        Self {
            stake_removals_by_block: Map::new(b(), *PREFIX_STAKE_REMOVALS_BY_BLOCK),
            stake_removals_by_actor: Map::new(b(), *PREFIX_STAKE_REMOVALS_BY_ACTOR),
            delegate_removals_by_block: Map::new(b(), *PREFIX_DELEGATE_REMOVALS_BY_BLOCK),
            delegate_removals_by_actor: Map::new(b(), *PREFIX_DELEGATE_REMOVALS_BY_ACTOR),
        }
    }

    // Reputer removals

    pub async fn get_stake_removal(
        &self,
        topic_id: TopicId,
        reputer: &str,
    ) -> Result<Option<StakeRemovalInfo>> {
        let Some(block) = self
            .stake_removals_by_actor
            .get(&(topic_id, reputer.to_string()))
            .await?
        else {
            return Ok(None);
        };
        let info = self
            .stake_removals_by_block
            .get(&(block, topic_id, reputer.to_string()))
            .await?
            .ok_or_else(|| {
                EmissionsError::DataCorruption(format!(
                    "stake removal index for {} in topic {} points at missing block {}",
                    reputer, topic_id, block
                ))
            })?;
        Ok(Some(info))
    }

    async fn set_stake_removal(&self, info: &StakeRemovalInfo) -> Result<()> {
        let actor_key = (info.topic_id, info.reputer.clone());
        if let Some(previous) = self.stake_removals_by_actor.get(&actor_key).await? {
            self.stake_removals_by_block
                .remove(&(previous, info.topic_id, info.reputer.clone()))
                .await?;
        }
        self.stake_removals_by_block
            .set(
                &(info.block_removal_completed, info.topic_id, info.reputer.clone()),
                info,
            )
            .await?;
        self.stake_removals_by_actor
            .set(&actor_key, &info.block_removal_completed)
            .await?;
        Ok(())
    }

    async fn delete_stake_removal(&self, topic_id: TopicId, reputer: &str) -> Result<StakeRemovalInfo> {
        let info = self
            .get_stake_removal(topic_id, reputer)
            .await?
            .ok_or_else(|| {
                EmissionsError::StakeRemovalNotFound(format!("reputer {} in topic {}", reputer, topic_id))
            })?;
        self.stake_removals_by_block
            .remove(&(info.block_removal_completed, topic_id, reputer.to_string()))
            .await?;
        self.stake_removals_by_actor
            .remove(&(topic_id, reputer.to_string()))
            .await?;
        Ok(info)
    }

    /// Schedules `amount` of the reputer's own stake for removal at
    /// `block_height + delay`. The stake itself is untouched until the sweep.
    pub async fn request_stake_removal(
        &self,
        ledger: &StakeLedger,
        topic_id: TopicId,
        reputer: &str,
        amount: Amount,
        block_height: BlockHeight,
        delay: i64,
    ) -> Result<StakeRemovalInfo> {
        let staked = ledger.get_stake_reputer(topic_id, reputer).await?;
        if amount > staked {
            return Err(EmissionsError::InsufficientStake {
                requested: amount,
                available: staked,
            });
        }

        let info = StakeRemovalInfo {
            block_removal_started: block_height,
            block_removal_completed: unlock_height(block_height, delay)?,
            topic_id,
            reputer: reputer.to_string(),
            amount,
        };
        self.set_stake_removal(&info).await?;

        info!(
            topic_id,
            reputer = %reputer,
            amount = %amount,
            unlock_height = info.block_removal_completed,
            "🔒 Stake removal scheduled"
        );
        Ok(info)
    }

    pub async fn cancel_stake_removal(&self, topic_id: TopicId, reputer: &str) -> Result<StakeRemovalInfo> {
        let info = self.delete_stake_removal(topic_id, reputer).await?;
        info!(
            topic_id,
            reputer = %reputer,
            amount = %info.amount,
            "🔓 Stake removal cancelled"
        );
        Ok(info)
    }

    /// Reputer removals unlocking at or before `block_height`, in key order.
    pub async fn stake_removals_up_to(
        &self,
        block_height: BlockHeight,
        limit: usize,
    ) -> Result<Vec<StakeRemovalInfo>> {
        Ok(self
            .stake_removals_by_block
            .iterate_through(&block_height, limit)
            .await?
            .into_iter()
            .map(|(_, info)| info)
            .collect())
    }

    // Delegate removals

    pub async fn get_delegate_stake_removal(
        &self,
        topic_id: TopicId,
        delegator: &str,
        reputer: &str,
    ) -> Result<Option<DelegateStakeRemovalInfo>> {
        let Some(block) = self
            .delegate_removals_by_actor
            .get(&(topic_id, delegator.to_string(), reputer.to_string()))
            .await?
        else {
            return Ok(None);
        };
        let info = self
            .delegate_removals_by_block
            .get(&(block, topic_id, delegator.to_string(), reputer.to_string()))
            .await?
            .ok_or_else(|| {
                EmissionsError::DataCorruption(format!(
                    "delegate removal index for {} upon {} in topic {} points at missing block {}",
                    delegator, reputer, topic_id, block
                ))
            })?;
        Ok(Some(info))
    }

    async fn set_delegate_stake_removal(&self, info: &DelegateStakeRemovalInfo) -> Result<()> {
        let actor_key = (info.topic_id, info.delegator.clone(), info.reputer.clone());
        if let Some(previous) = self.delegate_removals_by_actor.get(&actor_key).await? {
            self.delegate_removals_by_block
                .remove(&(
                    previous,
                    info.topic_id,
                    info.delegator.clone(),
                    info.reputer.clone(),
                ))
                .await?;
        }
        self.delegate_removals_by_block
            .set(
                &(
                    info.block_removal_completed,
                    info.topic_id,
                    info.delegator.clone(),
                    info.reputer.clone(),
                ),
                info,
            )
            .await?;
        self.delegate_removals_by_actor
            .set(&actor_key, &info.block_removal_completed)
            .await?;
        Ok(())
    }

    async fn delete_delegate_stake_removal(
        &self,
        topic_id: TopicId,
        delegator: &str,
        reputer: &str,
    ) -> Result<DelegateStakeRemovalInfo> {
        let info = self
            .get_delegate_stake_removal(topic_id, delegator, reputer)
            .await?
            .ok_or_else(|| {
                EmissionsError::StakeRemovalNotFound(format!(
                    "delegator {} upon {} in topic {}",
                    delegator, reputer, topic_id
                ))
            })?;
        self.delegate_removals_by_block
            .remove(&(
                info.block_removal_completed,
                topic_id,
                delegator.to_string(),
                reputer.to_string(),
            ))
            .await?;
        self.delegate_removals_by_actor
            .remove(&(topic_id, delegator.to_string(), reputer.to_string()))
            .await?;
        Ok(info)
    }

    pub async fn request_delegate_stake_removal(
        &self,
        ledger: &StakeLedger,
        topic_id: TopicId,
        delegator: &str,
        reputer: &str,
        amount: Amount,
        block_height: BlockHeight,
        delay: i64,
    ) -> Result<DelegateStakeRemovalInfo> {
        let position = ledger.get_delegator_info(topic_id, delegator, reputer).await?;
        if amount > position.amount {
            return Err(EmissionsError::InsufficientStake {
                requested: amount,
                available: position.amount,
            });
        }

        let info = DelegateStakeRemovalInfo {
            block_removal_started: block_height,
            block_removal_completed: unlock_height(block_height, delay)?,
            topic_id,
            delegator: delegator.to_string(),
            reputer: reputer.to_string(),
            amount,
        };
        self.set_delegate_stake_removal(&info).await?;

        info!(
            topic_id,
            delegator = %delegator,
            reputer = %reputer,
            amount = %amount,
            unlock_height = info.block_removal_completed,
            "🔒 Delegate stake removal scheduled"
        );
        Ok(info)
    }

    pub async fn cancel_delegate_stake_removal(
        &self,
        topic_id: TopicId,
        delegator: &str,
        reputer: &str,
    ) -> Result<DelegateStakeRemovalInfo> {
        let info = self
            .delete_delegate_stake_removal(topic_id, delegator, reputer)
            .await?;
        info!(
            topic_id,
            delegator = %delegator,
            reputer = %reputer,
            amount = %info.amount,
            "🔓 Delegate stake removal cancelled"
        );
        Ok(info)
    }

    pub async fn delegate_removals_up_to(
        &self,
        block_height: BlockHeight,
        limit: usize,
    ) -> Result<Vec<DelegateStakeRemovalInfo>> {
        Ok(self
            .delegate_removals_by_block
            .iterate_through(&block_height, limit)
            .await?
            .into_iter()
            .map(|(_, info)| info)
            .collect())
    }

    // Sweep

    /// Finalizes matured removals: reputer removals first, then delegate
    /// removals, each in key order and capped at `max_per_kind`.
    ///
    /// A removal whose amount now exceeds the position it draws on is dropped
    /// from both indexes and reported as skipped.
    pub async fn sweep_matured_removals(
        &self,
        ledger: &StakeLedger,
        block_height: BlockHeight,
        max_per_kind: usize,
    ) -> Result<Vec<EmissionsEvent>> {
        let mut events = Vec::new();

        for removal in self.stake_removals_up_to(block_height, max_per_kind).await? {
            let staked = ledger
                .get_stake_reputer(removal.topic_id, &removal.reputer)
                .await?;
            self.delete_stake_removal(removal.topic_id, &removal.reputer)
                .await?;

            if removal.amount > staked {
                warn!(
                    topic_id = removal.topic_id,
                    reputer = %removal.reputer,
                    requested = %removal.amount,
                    staked = %staked,
                    "⚠️ Skipping stale stake removal"
                );
                events.push(EmissionsEvent::StakeRemovalSkipped {
                    topic_id: removal.topic_id,
                    actor: removal.reputer,
                    amount: removal.amount,
                    reason: format!("stake {} below requested amount", staked),
                });
                continue;
            }

            ledger
                .withdraw_stake(removal.topic_id, &removal.reputer, removal.amount)
                .await?;
            events.push(EmissionsEvent::StakeRemovalFinalized {
                topic_id: removal.topic_id,
                reputer: removal.reputer,
                amount: removal.amount,
            });
        }

        for removal in self.delegate_removals_up_to(block_height, max_per_kind).await? {
            let position = ledger
                .get_delegator_info(removal.topic_id, &removal.delegator, &removal.reputer)
                .await?;
            self.delete_delegate_stake_removal(removal.topic_id, &removal.delegator, &removal.reputer)
                .await?;

            if removal.amount > position.amount {
                warn!(
                    topic_id = removal.topic_id,
                    delegator = %removal.delegator,
                    reputer = %removal.reputer,
                    requested = %removal.amount,
                    delegated = %position.amount,
                    "⚠️ Skipping stale delegate stake removal"
                );
                events.push(EmissionsEvent::StakeRemovalSkipped {
                    topic_id: removal.topic_id,
                    actor: removal.delegator,
                    amount: removal.amount,
                    reason: format!("delegated stake {} below requested amount", position.amount),
                });
                continue;
            }

            let paid = ledger
                .withdraw_delegated_stake(
                    removal.topic_id,
                    &removal.delegator,
                    &removal.reputer,
                    removal.amount,
                )
                .await?;
            if !paid.is_zero() {
                events.push(EmissionsEvent::DelegatorRewardPaid {
                    topic_id: removal.topic_id,
                    delegator: removal.delegator.clone(),
                    reputer: removal.reputer.clone(),
                    amount: paid,
                });
            }
            events.push(EmissionsEvent::DelegateStakeRemovalFinalized {
                topic_id: removal.topic_id,
                delegator: removal.delegator,
                reputer: removal.reputer,
                amount: removal.amount,
            });
        }

        debug!(block_height, events = events.len(), "Removal sweep finished");
        Ok(events)
    }
}
