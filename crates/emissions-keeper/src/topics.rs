use crate::error::{EmissionsError, Result};
use crate::prefixes::{PREFIX_NEXT_TOPIC_ID, PREFIX_TOPICS};
use emissions_math::Dec;
use emissions_storage::{Item, Map, StorageBackend};
use emissions_types::{Topic, TopicId};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct TopicStore {
    topics: Map<TopicId, Topic>,
    next_topic_id: Item<TopicId>,
}

impl TopicStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            topics: Map::new(backend.clone(), *PREFIX_TOPICS),
            next_topic_id: Item::new(backend, *PREFIX_NEXT_TOPIC_ID),
        }
    }

    /// Reserves the next topic id. Ids start at 1.
    pub async fn allocate_topic_id(&self) -> Result<TopicId> {
        let id = self.next_topic_id.get().await?.unwrap_or(1);
        let next = id
            .checked_add(1)
            .ok_or_else(|| EmissionsError::DataCorruption("topic id space exhausted".into()))?;
        self.next_topic_id.set(&next).await?;
        Ok(id)
    }

    pub async fn get_topic(&self, topic_id: TopicId) -> Result<Topic> {
        self.topics
            .get(&topic_id)
            .await?
            .ok_or(EmissionsError::TopicNotFound(topic_id))
    }

    pub async fn set_topic(&self, topic: &Topic) -> Result<()> {
        self.topics.set(&topic.id, topic).await?;
        Ok(())
    }

    pub async fn update_initial_regret(&self, topic_id: TopicId, initial_regret: Dec) -> Result<()> {
        let mut topic = self.get_topic(topic_id).await?;
        topic.initial_regret = initial_regret;
        self.set_topic(&topic).await?;
        debug!(topic_id, initial_regret = %initial_regret, "Topic initial regret stored");
        Ok(())
    }

    pub async fn topic_ids(&self) -> Result<Vec<TopicId>> {
        Ok(self
            .topics
            .iterate()
            .await?
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emissions_storage::MemoryBackend;

    fn topic(id: TopicId) -> Topic {
        Topic {
            id,
            creator: String::new(),
            metadata: String::new(),
            epoch_length: 10,
            ground_truth_lag: 10,
            alpha_regret: "0.1".parse().unwrap(),
            p_norm: "3".parse().unwrap(),
            epsilon: "0.0001".parse().unwrap(),
            initial_regret: Dec::ZERO,
        }
    }

    #[tokio::test]
    async fn test_topic_ids_are_sequential() {
        let store = TopicStore::new(Arc::new(MemoryBackend::new()));
        assert_eq!(store.allocate_topic_id().await.unwrap(), 1);
        assert_eq!(store.allocate_topic_id().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_missing_topic() {
        let store = TopicStore::new(Arc::new(MemoryBackend::new()));
        assert!(matches!(
            store.get_topic(9).await,
            Err(EmissionsError::TopicNotFound(9))
        ));
        assert!(store.topic_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_initial_regret() {
        let store = TopicStore::new(Arc::new(MemoryBackend::new()));
        store.set_topic(&topic(3)).await.unwrap();

        let value: Dec = "0.42".parse().unwrap();
        store.update_initial_regret(3, value).await.unwrap();

        assert_eq!(store.get_topic(3).await.unwrap().initial_regret, value);
        assert_eq!(store.topic_ids().await.unwrap(), vec![3]);
    }
}
