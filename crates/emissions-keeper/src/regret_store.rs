//! Persistent regrets and inclusion counters.
//!
//! A regret that was never written reads back as the topic's
//! `initial_regret` at block height 0, flagged with `no_prior_regret = true`.

use crate::error::{EmissionsError, Result};
use crate::prefixes::*;
use emissions_storage::{Map, StorageBackend};
use emissions_types::{ActorType, TimestampedValue, Topic, TopicId};
use std::sync::Arc;

/// Regrets keyed by `(topic, worker)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerRegretKind {
    Inferer,
    Forecaster,
    NaiveInferer,
}

/// Regrets keyed by `(topic, first, second)`.
///
/// For one-out kinds `first` is the withheld worker; for the one-in kind it
/// is the forecaster whose forecast was added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairRegretKind {
    OneOutInfererInferer,
    OneOutInfererForecaster,
    OneOutForecasterInferer,
    OneOutForecasterForecaster,
    OneInForecaster,
}

type WorkerKey = (TopicId, String);
type PairKey = (TopicId, String, String);

#[derive(Clone)]
pub struct RegretStore {
    inferer: Map<WorkerKey, TimestampedValue>,
    forecaster: Map<WorkerKey, TimestampedValue>,
    naive_inferer: Map<WorkerKey, TimestampedValue>,
    one_out_inferer_inferer: Map<PairKey, TimestampedValue>,
    one_out_inferer_forecaster: Map<PairKey, TimestampedValue>,
    one_out_forecaster_inferer: Map<PairKey, TimestampedValue>,
    one_out_forecaster_forecaster: Map<PairKey, TimestampedValue>,
    one_in_forecaster: Map<PairKey, TimestampedValue>,
    inclusion_counts: Map<(TopicId, String, u8), u64>,
}

fn cold_start(topic: &Topic) -> (TimestampedValue, bool) {
    (
        TimestampedValue {
            block_height: 0,
            value: topic.initial_regret,
        },
        true,
    )
}

impl RegretStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        let b = || backend.clone();
        Self {
            inferer: Map::new(b(), *PREFIX_INFERER_REGRETS),
            forecaster: Map::new(b(), *PREFIX_FORECASTER_REGRETS),
            naive_inferer: Map::new(b(), *PREFIX_NAIVE_INFERER_REGRETS),
            one_out_inferer_inferer: Map::new(b(), *PREFIX_ONE_OUT_INFERER_INFERER_REGRETS),
            one_out_inferer_forecaster: Map::new(b(), *PREFIX_ONE_OUT_INFERER_FORECASTER_REGRETS),
            one_out_forecaster_inferer: Map::new(b(), *PREFIX_ONE_OUT_FORECASTER_INFERER_REGRETS),
            one_out_forecaster_forecaster: Map::new(
                b(),
                *PREFIX_ONE_OUT_FORECASTER_FORECASTER_REGRETS,
            ),
            one_in_forecaster: Map::new(b(), *PREFIX_ONE_IN_FORECASTER_REGRETS),
            inclusion_counts: Map::new(b(), *PREFIX_INCLUSION_COUNTS),
        }
    }

    fn worker_map(&self, kind: WorkerRegretKind) -> &Map<WorkerKey, TimestampedValue> {
        match kind {
            WorkerRegretKind::Inferer => &self.inferer,
            WorkerRegretKind::Forecaster => &self.forecaster,
            WorkerRegretKind::NaiveInferer => &self.naive_inferer,
        }
    }

    fn pair_map(&self, kind: PairRegretKind) -> &Map<PairKey, TimestampedValue> {
        match kind {
            PairRegretKind::OneOutInfererInferer => &self.one_out_inferer_inferer,
            PairRegretKind::OneOutInfererForecaster => &self.one_out_inferer_forecaster,
            PairRegretKind::OneOutForecasterInferer => &self.one_out_forecaster_inferer,
            PairRegretKind::OneOutForecasterForecaster => &self.one_out_forecaster_forecaster,
            PairRegretKind::OneInForecaster => &self.one_in_forecaster,
        }
    }

    /// Returns the stored regret and `false`, or the cold-start value and `true`.
    pub async fn get_regret(
        &self,
        kind: WorkerRegretKind,
        topic: &Topic,
        worker: &str,
    ) -> Result<(TimestampedValue, bool)> {
        match self
            .worker_map(kind)
            .get(&(topic.id, worker.to_string()))
            .await?
        {
            Some(value) => Ok((value, false)),
            None => Ok(cold_start(topic)),
        }
    }

    pub async fn set_regret(
        &self,
        kind: WorkerRegretKind,
        topic_id: TopicId,
        worker: &str,
        value: TimestampedValue,
    ) -> Result<()> {
        self.worker_map(kind)
            .set(&(topic_id, worker.to_string()), &value)
            .await?;
        Ok(())
    }

    pub async fn get_pair_regret(
        &self,
        kind: PairRegretKind,
        topic: &Topic,
        first: &str,
        second: &str,
    ) -> Result<(TimestampedValue, bool)> {
        let key = (topic.id, first.to_string(), second.to_string());
        match self.pair_map(kind).get(&key).await? {
            Some(value) => Ok((value, false)),
            None => Ok(cold_start(topic)),
        }
    }

    pub async fn set_pair_regret(
        &self,
        kind: PairRegretKind,
        topic_id: TopicId,
        first: &str,
        second: &str,
        value: TimestampedValue,
    ) -> Result<()> {
        let key = (topic_id, first.to_string(), second.to_string());
        self.pair_map(kind).set(&key, &value).await?;
        Ok(())
    }

    /// Stored regrets of one kind in a topic, ordered by worker address.
    pub async fn regrets_in_topic(
        &self,
        kind: WorkerRegretKind,
        topic_id: TopicId,
    ) -> Result<Vec<(String, TimestampedValue)>> {
        Ok(self
            .worker_map(kind)
            .iterate_prefix(&topic_id)
            .await?
            .into_iter()
            .map(|((_, worker), value)| (worker, value))
            .collect())
    }

    pub async fn get_inclusion_count(
        &self,
        topic_id: TopicId,
        actor: &str,
        role: ActorType,
    ) -> Result<u64> {
        Ok(self
            .inclusion_counts
            .get_or_default(&(topic_id, actor.to_string(), role.as_u8()))
            .await?)
    }

    pub async fn increment_inclusion_count(
        &self,
        topic_id: TopicId,
        actor: &str,
        role: ActorType,
    ) -> Result<u64> {
        let key = (topic_id, actor.to_string(), role.as_u8());
        let count = self.inclusion_counts.get_or_default(&key).await?;
        let next = count.checked_add(1).ok_or_else(|| {
            EmissionsError::DataCorruption(format!("inclusion count overflow for {}", actor))
        })?;
        self.inclusion_counts.set(&key, &next).await?;
        Ok(next)
    }
}
