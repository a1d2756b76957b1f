use crate::amount::Amount;
use crate::topic::TopicId;
use crate::values::BlockHeight;
use emissions_math::Dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role an actor plays in a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActorType {
    Inferer,
    Forecaster,
    Reputer,
}

impl ActorType {
    pub fn as_u8(&self) -> u8 {
        match self {
            ActorType::Inferer => 0,
            ActorType::Forecaster => 1,
            ActorType::Reputer => 2,
        }
    }
}

impl fmt::Display for ActorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorType::Inferer => write!(f, "inferer"),
            ActorType::Forecaster => write!(f, "forecaster"),
            ActorType::Reputer => write!(f, "reputer"),
        }
    }
}

/// A delegator's position upon one reputer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DelegatorInfo {
    pub amount: Amount,
    /// `amount * reward_per_share` at the last settlement.
    pub reward_debt: Dec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeRemovalInfo {
    pub block_removal_started: BlockHeight,
    pub block_removal_completed: BlockHeight,
    pub topic_id: TopicId,
    pub reputer: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateStakeRemovalInfo {
    pub block_removal_started: BlockHeight,
    pub block_removal_completed: BlockHeight,
    pub topic_id: TopicId,
    pub delegator: String,
    pub reputer: String,
    pub amount: Amount,
}
