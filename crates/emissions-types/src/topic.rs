use crate::error::{Result, ValidationError};
use emissions_math::Dec;
use serde::{Deserialize, Serialize};

pub type TopicId = u64;

/// Prediction task configuration together with its cold-start regret baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub creator: String,
    pub metadata: String,
    pub epoch_length: i64,
    pub ground_truth_lag: i64,
    /// EMA smoothing factor, `0 < alpha_regret <= 1`.
    pub alpha_regret: Dec,
    pub p_norm: Dec,
    pub epsilon: Dec,
    /// Regret assumed for a worker with no history. Starts at zero.
    pub initial_regret: Dec,
}

impl Topic {
    pub fn validate(&self) -> Result<()> {
        if self.epoch_length <= 0 {
            return Err(ValidationError::InvalidParameter {
                name: "epoch_length",
                reason: format!("must be positive, got {}", self.epoch_length),
            });
        }
        if self.ground_truth_lag < 0 {
            return Err(ValidationError::InvalidParameter {
                name: "ground_truth_lag",
                reason: format!("must not be negative, got {}", self.ground_truth_lag),
            });
        }
        if !self.alpha_regret.is_positive() || self.alpha_regret > Dec::ONE {
            return Err(ValidationError::InvalidParameter {
                name: "alpha_regret",
                reason: format!("must be in (0, 1], got {}", self.alpha_regret),
            });
        }
        if !self.p_norm.is_positive() {
            return Err(ValidationError::InvalidParameter {
                name: "p_norm",
                reason: format!("must be positive, got {}", self.p_norm),
            });
        }
        if !self.epsilon.is_positive() {
            return Err(ValidationError::InvalidParameter {
                name: "epsilon",
                reason: format!("must be positive, got {}", self.epsilon),
            });
        }
        Ok(())
    }
}
