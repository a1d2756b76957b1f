//! Events emitted by state transitions.
//!
//! Handlers return the events of a transaction only after it commits, so a
//! rolled-back transaction never leaks events.

use emissions_math::Dec;
use emissions_types::{Amount, BlockHeight, TopicId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EmissionsEvent {
    TopicCreated {
        topic_id: TopicId,
        creator: String,
    },

    StakeAdded {
        topic_id: TopicId,
        reputer: String,
        amount: Amount,
    },

    StakeRemovalRequested {
        topic_id: TopicId,
        reputer: String,
        amount: Amount,
        block_removal_completed: BlockHeight,
    },

    StakeRemovalCancelled {
        topic_id: TopicId,
        reputer: String,
    },

    StakeRemovalFinalized {
        topic_id: TopicId,
        reputer: String,
        amount: Amount,
    },

    DelegateStakeAdded {
        topic_id: TopicId,
        delegator: String,
        reputer: String,
        amount: Amount,
    },

    DelegateStakeRemovalRequested {
        topic_id: TopicId,
        delegator: String,
        reputer: String,
        amount: Amount,
        block_removal_completed: BlockHeight,
    },

    DelegateStakeRemovalCancelled {
        topic_id: TopicId,
        delegator: String,
        reputer: String,
    },

    DelegateStakeRemovalFinalized {
        topic_id: TopicId,
        delegator: String,
        reputer: String,
        amount: Amount,
    },

    /// A matured removal no longer covered by the position it drew on.
    StakeRemovalSkipped {
        topic_id: TopicId,
        actor: String,
        amount: Amount,
        reason: String,
    },

    DelegatorRewardAdded {
        topic_id: TopicId,
        reputer: String,
        amount: Amount,
        reward_per_share: Dec,
    },

    DelegatorRewardPaid {
        topic_id: TopicId,
        delegator: String,
        reputer: String,
        amount: Amount,
    },

    NetworkRegretsUpdated {
        topic_id: TopicId,
        block_height: BlockHeight,
        inferers: usize,
        forecasters: usize,
    },

    InitialRegretUpdated {
        topic_id: TopicId,
        initial_regret: Dec,
    },
}

impl EmissionsEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            EmissionsEvent::TopicCreated { .. } => "topic.created",
            EmissionsEvent::StakeAdded { .. } => "stake.added",
            EmissionsEvent::StakeRemovalRequested { .. } => "stake.removal_requested",
            EmissionsEvent::StakeRemovalCancelled { .. } => "stake.removal_cancelled",
            EmissionsEvent::StakeRemovalFinalized { .. } => "stake.removal_finalized",
            EmissionsEvent::DelegateStakeAdded { .. } => "delegate.added",
            EmissionsEvent::DelegateStakeRemovalRequested { .. } => "delegate.removal_requested",
            EmissionsEvent::DelegateStakeRemovalCancelled { .. } => "delegate.removal_cancelled",
            EmissionsEvent::DelegateStakeRemovalFinalized { .. } => "delegate.removal_finalized",
            EmissionsEvent::StakeRemovalSkipped { .. } => "stake.removal_skipped",
            EmissionsEvent::DelegatorRewardAdded { .. } => "reward.added",
            EmissionsEvent::DelegatorRewardPaid { .. } => "reward.paid",
            EmissionsEvent::NetworkRegretsUpdated { .. } => "regrets.updated",
            EmissionsEvent::InitialRegretUpdated { .. } => "regrets.initial_updated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_json_shape() {
        let event = EmissionsEvent::StakeAdded {
            topic_id: 1,
            reputer: "emx1reputer".to_string(),
            amount: Amount::new(10),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "StakeAdded");
        assert_eq!(json["data"]["topic_id"], 1);
        assert_eq!(event.event_type(), "stake.added");
    }
}
