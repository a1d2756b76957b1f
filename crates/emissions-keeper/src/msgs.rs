//! Transaction messages accepted by the keeper.
//!
//! `validate_basic` covers what can be checked without reading state.

use emissions_math::Dec;
use emissions_types::{validate_address, Amount, TopicId, ValidationError, ValueBundle};
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, ValidationError>;

fn positive(amount: Amount) -> Result<()> {
    if amount.is_zero() {
        return Err(ValidationError::NonPositiveAmount);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCreateTopic {
    pub creator: String,
    pub metadata: String,
    pub epoch_length: i64,
    pub ground_truth_lag: i64,
    pub alpha_regret: Dec,
    pub p_norm: Dec,
    pub epsilon: Dec,
}

impl MsgCreateTopic {
    pub fn validate_basic(&self) -> Result<()> {
        validate_address(&self.creator)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgAddStake {
    pub sender: String,
    pub topic_id: TopicId,
    pub amount: Amount,
}

impl MsgAddStake {
    pub fn validate_basic(&self) -> Result<()> {
        validate_address(&self.sender)?;
        positive(self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRemoveStake {
    pub sender: String,
    pub topic_id: TopicId,
    pub amount: Amount,
}

impl MsgRemoveStake {
    pub fn validate_basic(&self) -> Result<()> {
        validate_address(&self.sender)?;
        positive(self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCancelRemoveStake {
    pub sender: String,
    pub topic_id: TopicId,
}

impl MsgCancelRemoveStake {
    pub fn validate_basic(&self) -> Result<()> {
        validate_address(&self.sender)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgDelegateStake {
    pub sender: String,
    pub topic_id: TopicId,
    pub reputer: String,
    pub amount: Amount,
}

impl MsgDelegateStake {
    pub fn validate_basic(&self) -> Result<()> {
        validate_address(&self.sender)?;
        validate_address(&self.reputer)?;
        positive(self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRemoveDelegateStake {
    pub sender: String,
    pub topic_id: TopicId,
    pub reputer: String,
    pub amount: Amount,
}

impl MsgRemoveDelegateStake {
    pub fn validate_basic(&self) -> Result<()> {
        validate_address(&self.sender)?;
        validate_address(&self.reputer)?;
        positive(self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCancelRemoveDelegateStake {
    pub sender: String,
    pub topic_id: TopicId,
    pub reputer: String,
}

impl MsgCancelRemoveDelegateStake {
    pub fn validate_basic(&self) -> Result<()> {
        validate_address(&self.sender)?;
        validate_address(&self.reputer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRewardDelegateStake {
    pub sender: String,
    pub topic_id: TopicId,
    pub reputer: String,
}

impl MsgRewardDelegateStake {
    pub fn validate_basic(&self) -> Result<()> {
        validate_address(&self.sender)?;
        validate_address(&self.reputer)
    }
}

/// Funds the delegators of `reputer` from `sender`'s balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgAddDelegatorReward {
    pub sender: String,
    pub topic_id: TopicId,
    pub reputer: String,
    pub amount: Amount,
}

impl MsgAddDelegatorReward {
    pub fn validate_basic(&self) -> Result<()> {
        validate_address(&self.sender)?;
        validate_address(&self.reputer)?;
        positive(self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgInsertNetworkLosses {
    pub sender: String,
    pub bundle: ValueBundle,
}

impl MsgInsertNetworkLosses {
    pub fn validate_basic(&self) -> Result<()> {
        validate_address(&self.sender)?;
        self.bundle.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emissions_types::address_from_seed;

    #[test]
    fn test_zero_amount_rejected() {
        let msg = MsgAddStake {
            sender: address_from_seed(b"reputer").unwrap(),
            topic_id: 1,
            amount: Amount::ZERO,
        };
        assert_eq!(msg.validate_basic(), Err(ValidationError::NonPositiveAmount));
    }

    #[test]
    fn test_bad_reputer_address_rejected() {
        let msg = MsgDelegateStake {
            sender: address_from_seed(b"delegator").unwrap(),
            topic_id: 1,
            reputer: "cosmos1notours".to_string(),
            amount: Amount::new(1),
        };
        assert!(matches!(
            msg.validate_basic(),
            Err(ValidationError::InvalidAddress { .. })
        ));
    }
}
