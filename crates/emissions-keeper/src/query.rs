//! Read-only queries.

use crate::error::{EmissionsError, Result};
use crate::inference_synthesis::experience_threshold;
use crate::prefixes::prefix_name;
use crate::regret_store::{PairRegretKind, WorkerRegretKind};
use crate::Keeper;
use emissions_math::Dec;
use emissions_storage::PREFIX_LEN;
use emissions_types::{
    ActorType, Amount, BlockHeight, DelegateStakeRemovalInfo, DelegatorInfo, StakeRemovalInfo,
    TimestampedValue, Topic, TopicId,
};
use std::collections::BTreeMap;
use tracing::debug;

impl Keeper {
    pub async fn get_topic(&self, topic_id: TopicId) -> Result<Topic> {
        self.topics().get_topic(topic_id).await
    }

    pub async fn get_topic_ids(&self) -> Result<Vec<TopicId>> {
        self.topics().topic_ids().await
    }

    async fn worker_regret(
        &self,
        kind: WorkerRegretKind,
        topic_id: TopicId,
        worker: &str,
    ) -> Result<(TimestampedValue, bool)> {
        let topic = self.topics().get_topic(topic_id).await?;
        self.regrets().get_regret(kind, &topic, worker).await
    }

    async fn pair_regret(
        &self,
        kind: PairRegretKind,
        topic_id: TopicId,
        first: &str,
        second: &str,
    ) -> Result<(TimestampedValue, bool)> {
        let topic = self.topics().get_topic(topic_id).await?;
        self.regrets().get_pair_regret(kind, &topic, first, second).await
    }

    // Regrets. Each returns the regret and whether it is a cold start.

    pub async fn get_inferer_network_regret(
        &self,
        topic_id: TopicId,
        worker: &str,
    ) -> Result<(TimestampedValue, bool)> {
        self.worker_regret(WorkerRegretKind::Inferer, topic_id, worker).await
    }

    pub async fn get_forecaster_network_regret(
        &self,
        topic_id: TopicId,
        worker: &str,
    ) -> Result<(TimestampedValue, bool)> {
        self.worker_regret(WorkerRegretKind::Forecaster, topic_id, worker).await
    }

    pub async fn get_naive_inferer_network_regret(
        &self,
        topic_id: TopicId,
        worker: &str,
    ) -> Result<(TimestampedValue, bool)> {
        self.worker_regret(WorkerRegretKind::NaiveInferer, topic_id, worker).await
    }

    pub async fn get_one_out_inferer_inferer_network_regret(
        &self,
        topic_id: TopicId,
        withheld: &str,
        inferer: &str,
    ) -> Result<(TimestampedValue, bool)> {
        self.pair_regret(PairRegretKind::OneOutInfererInferer, topic_id, withheld, inferer)
            .await
    }

    pub async fn get_one_out_inferer_forecaster_network_regret(
        &self,
        topic_id: TopicId,
        withheld: &str,
        forecaster: &str,
    ) -> Result<(TimestampedValue, bool)> {
        self.pair_regret(PairRegretKind::OneOutInfererForecaster, topic_id, withheld, forecaster)
            .await
    }

    pub async fn get_one_out_forecaster_inferer_network_regret(
        &self,
        topic_id: TopicId,
        withheld: &str,
        inferer: &str,
    ) -> Result<(TimestampedValue, bool)> {
        self.pair_regret(PairRegretKind::OneOutForecasterInferer, topic_id, withheld, inferer)
            .await
    }

    pub async fn get_one_out_forecaster_forecaster_network_regret(
        &self,
        topic_id: TopicId,
        withheld: &str,
        forecaster: &str,
    ) -> Result<(TimestampedValue, bool)> {
        self.pair_regret(
            PairRegretKind::OneOutForecasterForecaster,
            topic_id,
            withheld,
            forecaster,
        )
        .await
    }

    pub async fn get_one_in_forecaster_network_regret(
        &self,
        topic_id: TopicId,
        forecaster: &str,
        worker: &str,
    ) -> Result<(TimestampedValue, bool)> {
        self.pair_regret(PairRegretKind::OneInForecaster, topic_id, forecaster, worker)
            .await
    }

    /// Every stored regret of one kind in the topic, ordered by worker.
    pub async fn get_network_regrets_in_topic(
        &self,
        topic_id: TopicId,
        kind: WorkerRegretKind,
    ) -> Result<Vec<(String, TimestampedValue)>> {
        self.topics().get_topic(topic_id).await?;
        self.regrets().regrets_in_topic(kind, topic_id).await
    }

    pub async fn get_inclusion_count(
        &self,
        topic_id: TopicId,
        actor: &str,
        role: ActorType,
    ) -> Result<u64> {
        self.regrets().get_inclusion_count(topic_id, actor, role).await
    }

    /// Whether the actor's regret in `role` feeds the topic's initial regret.
    pub async fn is_experienced(&self, topic_id: TopicId, actor: &str, role: ActorType) -> Result<bool> {
        let topic = self.topics().get_topic(topic_id).await?;
        let threshold = experience_threshold(topic.alpha_regret)?;
        let count = self.regrets().get_inclusion_count(topic_id, actor, role).await?;
        debug!(topic_id, actor = %actor, role = %role, count, threshold, "Experience lookup");
        Ok(count >= threshold)
    }

    // Stake

    pub async fn get_stake_reputer(&self, topic_id: TopicId, reputer: &str) -> Result<Amount> {
        self.ledger().get_stake_reputer(topic_id, reputer).await
    }

    pub async fn get_reputer_authority(&self, topic_id: TopicId, reputer: &str) -> Result<Amount> {
        self.ledger().get_reputer_authority(topic_id, reputer).await
    }

    pub async fn get_delegate_stake_placement(
        &self,
        topic_id: TopicId,
        delegator: &str,
        reputer: &str,
    ) -> Result<DelegatorInfo> {
        self.ledger()
            .get_delegator_info(topic_id, delegator, reputer)
            .await
    }

    pub async fn get_stake_from_delegator_in_topic(
        &self,
        topic_id: TopicId,
        delegator: &str,
    ) -> Result<Amount> {
        self.ledger()
            .get_stake_sum_from_delegator(topic_id, delegator)
            .await
    }

    pub async fn get_delegate_stake_upon_reputer(
        &self,
        topic_id: TopicId,
        reputer: &str,
    ) -> Result<Amount> {
        self.ledger().get_stake_upon_reputer(topic_id, reputer).await
    }

    pub async fn get_topic_stake(&self, topic_id: TopicId) -> Result<Amount> {
        self.ledger().get_topic_stake(topic_id).await
    }

    pub async fn get_total_stake(&self) -> Result<Amount> {
        self.ledger().get_total_stake().await
    }

    // Removals

    pub async fn get_stake_removal_for_reputer(
        &self,
        topic_id: TopicId,
        reputer: &str,
    ) -> Result<Option<StakeRemovalInfo>> {
        self.removals().get_stake_removal(topic_id, reputer).await
    }

    pub async fn get_delegate_stake_removal(
        &self,
        topic_id: TopicId,
        delegator: &str,
        reputer: &str,
    ) -> Result<Option<DelegateStakeRemovalInfo>> {
        self.removals()
            .get_delegate_stake_removal(topic_id, delegator, reputer)
            .await
    }

    pub async fn get_stake_removals_up_to_block(
        &self,
        block_height: BlockHeight,
        limit: usize,
    ) -> Result<Vec<StakeRemovalInfo>> {
        self.removals().stake_removals_up_to(block_height, limit).await
    }

    pub async fn get_delegate_stake_removals_up_to_block(
        &self,
        block_height: BlockHeight,
        limit: usize,
    ) -> Result<Vec<DelegateStakeRemovalInfo>> {
        self.removals().delegate_removals_up_to(block_height, limit).await
    }

    // Rewards

    pub async fn get_delegate_reward_per_share(&self, topic_id: TopicId, reputer: &str) -> Result<Dec> {
        self.ledger().get_reward_per_share(topic_id, reputer).await
    }

    pub async fn get_pending_delegator_reward(
        &self,
        topic_id: TopicId,
        delegator: &str,
        reputer: &str,
    ) -> Result<Dec> {
        self.ledger().pending_reward(topic_id, delegator, reputer).await
    }

    /// Stored entries per collection. Keys outside any known collection are
    /// grouped under the hex of their first bytes.
    pub async fn get_collection_sizes(&self) -> Result<BTreeMap<String, usize>> {
        let mut sizes = BTreeMap::new();
        for (key, _) in self.backend().iterate_prefix(&[]).await? {
            let name = match key.get(..PREFIX_LEN) {
                Some(head) => {
                    let mut prefix = [0u8; PREFIX_LEN];
                    prefix.copy_from_slice(head);
                    prefix_name(&prefix)
                        .map(str::to_string)
                        .unwrap_or_else(|| hex::encode(prefix))
                }
                None => hex::encode(&key),
            };
            *sizes.entry(name).or_insert(0) += 1;
        }
        Ok(sizes)
    }

    // Invariants

    /// First broken invariant, or an all-clear diagnostic.
    pub async fn check_invariants(&self) -> Result<(String, bool)> {
        self.invariant_checker().check_invariants().await
    }

    /// Like [`Keeper::check_invariants`], but a broken invariant is an error.
    pub async fn assert_invariants(&self) -> Result<()> {
        let (diagnostic, broken) = self.check_invariants().await?;
        if broken {
            return Err(EmissionsError::InvariantViolation(diagnostic));
        }
        Ok(())
    }
}
