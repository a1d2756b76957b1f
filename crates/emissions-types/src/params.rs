use crate::error::{Result, ValidationError};
use emissions_math::Dec;
use serde::{Deserialize, Serialize};

/// Module-wide parameters shared by every topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleParams {
    /// Blocks between a removal request and its maturity
    pub remove_stake_delay_window: i64,

    /// Upper bound on removals of each kind finalized per block
    pub max_stake_removals_per_block: u64,

    /// Scaling applied to `p_norm` when offsetting the initial regret
    pub c_norm: Dec,

    /// Quantile of normalized experienced regrets used for cold starts
    pub initial_regret_quantile: Dec,

    /// Numerator of the initial-regret offset
    pub p_norm_safe_div: Dec,

    /// Denomination of staked tokens
    pub bond_denom: String,

    /// Smallest `alpha_regret` a topic may be created with
    pub min_topic_alpha_regret: Dec,
}

impl Default for ModuleParams {
    fn default() -> Self {
        Self {
            // three weeks of 5 second blocks
            remove_stake_delay_window: 3 * 7 * 24 * 60 * 12,
            max_stake_removals_per_block: 100,
            c_norm: Dec::new(75, 2),
            initial_regret_quantile: Dec::new(25, 2),
            p_norm_safe_div: Dec::new(825, 2),
            bond_denom: "uemx".to_string(),
            min_topic_alpha_regret: Dec::new(1, 2),
        }
    }
}

impl ModuleParams {
    pub fn validate(&self) -> Result<()> {
        if self.remove_stake_delay_window < 0 {
            return Err(ValidationError::InvalidParameter {
                name: "remove_stake_delay_window",
                reason: format!("must not be negative, got {}", self.remove_stake_delay_window),
            });
        }
        if self.max_stake_removals_per_block == 0 {
            return Err(ValidationError::InvalidParameter {
                name: "max_stake_removals_per_block",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.c_norm.is_negative() {
            return Err(ValidationError::InvalidParameter {
                name: "c_norm",
                reason: format!("must not be negative, got {}", self.c_norm),
            });
        }
        if self.initial_regret_quantile.is_negative() || self.initial_regret_quantile > Dec::ONE {
            return Err(ValidationError::InvalidParameter {
                name: "initial_regret_quantile",
                reason: format!("must be in [0, 1], got {}", self.initial_regret_quantile),
            });
        }
        if !self.p_norm_safe_div.is_positive() {
            return Err(ValidationError::InvalidParameter {
                name: "p_norm_safe_div",
                reason: format!("must be positive, got {}", self.p_norm_safe_div),
            });
        }
        if self.bond_denom.trim().is_empty() {
            return Err(ValidationError::InvalidParameter {
                name: "bond_denom",
                reason: "must not be empty".to_string(),
            });
        }
        if !self.min_topic_alpha_regret.is_positive() || self.min_topic_alpha_regret > Dec::ONE {
            return Err(ValidationError::InvalidParameter {
                name: "min_topic_alpha_regret",
                reason: format!("must be in (0, 1], got {}", self.min_topic_alpha_regret),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = ModuleParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.c_norm.to_string(), "0.75");
        assert_eq!(params.p_norm_safe_div.to_string(), "8.25");
    }

    #[test]
    fn test_quantile_out_of_range() {
        let params = ModuleParams {
            initial_regret_quantile: "1.5".parse().unwrap(),
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_zero_sweep_limit_rejected() {
        let params = ModuleParams {
            max_stake_removals_per_block: 0,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ValidationError::InvalidParameter { name: "max_stake_removals_per_block", .. })
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let params: ModuleParams =
            serde_json::from_str(r#"{"remove_stake_delay_window": 10, "c_norm": "0.5"}"#).unwrap();
        assert_eq!(params.remove_stake_delay_window, 10);
        assert_eq!(params.c_norm, "0.5".parse().unwrap());
        assert_eq!(params.bond_denom, "uemx");
    }
}
