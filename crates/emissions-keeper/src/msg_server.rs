//! State-changing entry points.
//!
//! Every handler validates its message before touching storage, then runs
//! inside one backend transaction: commit on success, rollback on error.
//! Events are returned only after the commit.

use crate::error::{EmissionsError, Result};
use crate::events::EmissionsEvent;
use crate::inference_synthesis::{get_calc_set_network_regrets, GetCalcSetNetworkRegretsArgs};
use crate::msgs::*;
use crate::{BlockContext, Keeper};
use emissions_math::Dec;
use emissions_types::{Topic, TopicId, ValidationError};
use tracing::{error, info, warn};

impl Keeper {
    async fn finish_transaction<T>(&self, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.backend().commit_transaction().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = self.backend().rollback_transaction().await {
                    error!(error = %rollback_err, "❌ Rollback failed");
                }
                warn!(error = %e, kind = ?e.kind(), "Transaction rolled back");
                Err(e)
            }
        }
    }

    async fn ensure_topic(&self, topic_id: TopicId) -> Result<Topic> {
        self.topics().get_topic(topic_id).await
    }

    pub async fn create_topic(
        &self,
        ctx: &BlockContext,
        msg: MsgCreateTopic,
    ) -> Result<(TopicId, Vec<EmissionsEvent>)> {
        msg.validate_basic()?;
        if msg.alpha_regret < self.params().min_topic_alpha_regret {
            return Err(ValidationError::InvalidParameter {
                name: "alpha_regret",
                reason: format!(
                    "must be at least {}, got {}",
                    self.params().min_topic_alpha_regret,
                    msg.alpha_regret
                ),
            }
            .into());
        }
        let mut topic = Topic {
            id: 0,
            creator: msg.creator,
            metadata: msg.metadata,
            epoch_length: msg.epoch_length,
            ground_truth_lag: msg.ground_truth_lag,
            alpha_regret: msg.alpha_regret,
            p_norm: msg.p_norm,
            epsilon: msg.epsilon,
            initial_regret: Dec::ZERO,
        };
        topic.validate()?;

        self.backend().begin_transaction().await?;
        let outcome = async {
            topic.id = self.topics().allocate_topic_id().await?;
            self.topics().set_topic(&topic).await?;
            Ok::<_, EmissionsError>(topic.id)
        }
        .await;
        let topic_id = self.finish_transaction(outcome).await?;

        info!(
            topic_id,
            creator = %topic.creator,
            block_height = ctx.block_height,
            alpha_regret = %topic.alpha_regret,
            "🆕 Topic created"
        );
        Ok((
            topic_id,
            vec![EmissionsEvent::TopicCreated {
                topic_id,
                creator: topic.creator,
            }],
        ))
    }

    pub async fn add_stake(&self, _ctx: &BlockContext, msg: MsgAddStake) -> Result<Vec<EmissionsEvent>> {
        msg.validate_basic()?;
        self.ensure_topic(msg.topic_id).await?;

        self.backend().begin_transaction().await?;
        let outcome = self
            .ledger()
            .add_stake(msg.topic_id, &msg.sender, msg.amount)
            .await;
        self.finish_transaction(outcome).await?;

        Ok(vec![EmissionsEvent::StakeAdded {
            topic_id: msg.topic_id,
            reputer: msg.sender,
            amount: msg.amount,
        }])
    }

    pub async fn remove_stake(&self, ctx: &BlockContext, msg: MsgRemoveStake) -> Result<Vec<EmissionsEvent>> {
        msg.validate_basic()?;
        self.ensure_topic(msg.topic_id).await?;

        self.backend().begin_transaction().await?;
        let outcome = self
            .removals()
            .request_stake_removal(
                self.ledger(),
                msg.topic_id,
                &msg.sender,
                msg.amount,
                ctx.block_height,
                self.params().remove_stake_delay_window,
            )
            .await;
        let info = self.finish_transaction(outcome).await?;

        Ok(vec![EmissionsEvent::StakeRemovalRequested {
            topic_id: info.topic_id,
            reputer: info.reputer,
            amount: info.amount,
            block_removal_completed: info.block_removal_completed,
        }])
    }

    pub async fn cancel_remove_stake(
        &self,
        _ctx: &BlockContext,
        msg: MsgCancelRemoveStake,
    ) -> Result<Vec<EmissionsEvent>> {
        msg.validate_basic()?;
        self.ensure_topic(msg.topic_id).await?;

        self.backend().begin_transaction().await?;
        let outcome = self
            .removals()
            .cancel_stake_removal(msg.topic_id, &msg.sender)
            .await;
        self.finish_transaction(outcome).await?;

        Ok(vec![EmissionsEvent::StakeRemovalCancelled {
            topic_id: msg.topic_id,
            reputer: msg.sender,
        }])
    }

    pub async fn delegate_stake(
        &self,
        _ctx: &BlockContext,
        msg: MsgDelegateStake,
    ) -> Result<Vec<EmissionsEvent>> {
        msg.validate_basic()?;
        self.ensure_topic(msg.topic_id).await?;

        self.backend().begin_transaction().await?;
        let outcome = self
            .ledger()
            .delegate_stake(msg.topic_id, &msg.sender, &msg.reputer, msg.amount)
            .await;
        let paid = self.finish_transaction(outcome).await?;

        let mut events = Vec::new();
        if !paid.is_zero() {
            events.push(EmissionsEvent::DelegatorRewardPaid {
                topic_id: msg.topic_id,
                delegator: msg.sender.clone(),
                reputer: msg.reputer.clone(),
                amount: paid,
            });
        }
        events.push(EmissionsEvent::DelegateStakeAdded {
            topic_id: msg.topic_id,
            delegator: msg.sender,
            reputer: msg.reputer,
            amount: msg.amount,
        });
        Ok(events)
    }

    pub async fn remove_delegate_stake(
        &self,
        ctx: &BlockContext,
        msg: MsgRemoveDelegateStake,
    ) -> Result<Vec<EmissionsEvent>> {
        msg.validate_basic()?;
        self.ensure_topic(msg.topic_id).await?;

        self.backend().begin_transaction().await?;
        let outcome = self
            .removals()
            .request_delegate_stake_removal(
                self.ledger(),
                msg.topic_id,
                &msg.sender,
                &msg.reputer,
                msg.amount,
                ctx.block_height,
                self.params().remove_stake_delay_window,
            )
            .await;
        let info = self.finish_transaction(outcome).await?;

        Ok(vec![EmissionsEvent::DelegateStakeRemovalRequested {
            topic_id: info.topic_id,
            delegator: info.delegator,
            reputer: info.reputer,
            amount: info.amount,
            block_removal_completed: info.block_removal_completed,
        }])
    }

    pub async fn cancel_remove_delegate_stake(
        &self,
        _ctx: &BlockContext,
        msg: MsgCancelRemoveDelegateStake,
    ) -> Result<Vec<EmissionsEvent>> {
        msg.validate_basic()?;
        self.ensure_topic(msg.topic_id).await?;

        self.backend().begin_transaction().await?;
        let outcome = self
            .removals()
            .cancel_delegate_stake_removal(msg.topic_id, &msg.sender, &msg.reputer)
            .await;
        self.finish_transaction(outcome).await?;

        Ok(vec![EmissionsEvent::DelegateStakeRemovalCancelled {
            topic_id: msg.topic_id,
            delegator: msg.sender,
            reputer: msg.reputer,
        }])
    }

    pub async fn reward_delegate_stake(
        &self,
        _ctx: &BlockContext,
        msg: MsgRewardDelegateStake,
    ) -> Result<Vec<EmissionsEvent>> {
        msg.validate_basic()?;
        self.ensure_topic(msg.topic_id).await?;

        self.backend().begin_transaction().await?;
        let outcome = self
            .ledger()
            .reward_delegate_stake(msg.topic_id, &msg.sender, &msg.reputer)
            .await;
        let paid = self.finish_transaction(outcome).await?;

        Ok(vec![EmissionsEvent::DelegatorRewardPaid {
            topic_id: msg.topic_id,
            delegator: msg.sender,
            reputer: msg.reputer,
            amount: paid,
        }])
    }

    pub async fn add_delegator_reward(
        &self,
        _ctx: &BlockContext,
        msg: MsgAddDelegatorReward,
    ) -> Result<Vec<EmissionsEvent>> {
        msg.validate_basic()?;
        self.ensure_topic(msg.topic_id).await?;

        self.backend().begin_transaction().await?;
        let outcome = self
            .ledger()
            .add_delegator_reward(msg.topic_id, &msg.reputer, &msg.sender, msg.amount)
            .await;
        let reward_per_share = self.finish_transaction(outcome).await?;

        Ok(vec![EmissionsEvent::DelegatorRewardAdded {
            topic_id: msg.topic_id,
            reputer: msg.reputer,
            amount: msg.amount,
            reward_per_share,
        }])
    }

    /// Applies a reputer's value bundle to the topic's regrets.
    pub async fn insert_network_losses(
        &self,
        _ctx: &BlockContext,
        msg: MsgInsertNetworkLosses,
    ) -> Result<Vec<EmissionsEvent>> {
        msg.validate_basic()?;
        let topic = self.ensure_topic(msg.bundle.topic_id).await?;

        let args = GetCalcSetNetworkRegretsArgs {
            topic_id: topic.id,
            network_losses: &msg.bundle,
            nonce: msg.bundle.reputer_nonce,
            alpha_regret: topic.alpha_regret,
            c_norm: self.params().c_norm,
            p_norm: topic.p_norm,
            epsilon_topic: topic.epsilon,
            initial_regret_quantile: self.params().initial_regret_quantile,
            p_norm_safe_div: self.params().p_norm_safe_div,
        };

        self.backend().begin_transaction().await?;
        let outcome = get_calc_set_network_regrets(self.regrets(), self.topics(), args).await;
        let summary = self.finish_transaction(outcome).await?;

        let mut events = vec![EmissionsEvent::NetworkRegretsUpdated {
            topic_id: topic.id,
            block_height: msg.bundle.reputer_nonce.block_height,
            inferers: summary.inferers,
            forecasters: summary.forecasters,
        }];
        if let Some(initial_regret) = summary.initial_regret {
            events.push(EmissionsEvent::InitialRegretUpdated {
                topic_id: topic.id,
                initial_regret,
            });
        }
        Ok(events)
    }

    /// End-of-block hook: finalizes matured stake removals in one transaction.
    pub async fn end_block(&self, ctx: &BlockContext) -> Result<Vec<EmissionsEvent>> {
        let limit = usize::try_from(self.params().max_stake_removals_per_block).map_err(|_| {
            EmissionsError::Validation(ValidationError::InvalidParameter {
                name: "max_stake_removals_per_block",
                reason: "does not fit in usize".to_string(),
            })
        })?;

        self.backend().begin_transaction().await?;
        let outcome = self
            .removals()
            .sweep_matured_removals(self.ledger(), ctx.block_height, limit)
            .await;
        let events = self.finish_transaction(outcome).await?;

        if !events.is_empty() {
            info!(
                block_height = ctx.block_height,
                events = events.len(),
                "🏁 Matured stake removals processed"
            );
        }
        Ok(events)
    }
}
