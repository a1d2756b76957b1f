use crate::address::validate_address;
use crate::error::{Result, ValidationError};
use crate::topic::TopicId;
use emissions_math::Dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type BlockHeight = i64;

/// One regret sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampedValue {
    pub block_height: BlockHeight,
    pub value: Dec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nonce {
    pub block_height: BlockHeight,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerAttributedValue {
    pub worker: String,
    pub value: Dec,
}

/// Value of the network with `worker` withheld.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithheldWorkerAttributedValue {
    pub worker: String,
    pub value: Dec,
}

/// Losses reported by one reputer for one topic at one nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueBundle {
    pub topic_id: TopicId,
    pub reputer: String,
    pub reputer_nonce: Nonce,
    pub combined_value: Dec,
    pub naive_value: Dec,
    #[serde(default)]
    pub inferer_values: Vec<WorkerAttributedValue>,
    #[serde(default)]
    pub forecaster_values: Vec<WorkerAttributedValue>,
    #[serde(default)]
    pub one_out_inferer_values: Vec<WithheldWorkerAttributedValue>,
    #[serde(default)]
    pub one_out_forecaster_values: Vec<WithheldWorkerAttributedValue>,
    #[serde(default)]
    pub one_in_forecaster_values: Vec<WorkerAttributedValue>,
}

fn check_unique<'a>(list: &'static str, workers: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = BTreeSet::new();
    for worker in workers {
        validate_address(worker)?;
        if !seen.insert(worker) {
            return Err(ValidationError::MalformedBundle(format!(
                "worker {} appears twice in {}",
                worker, list
            )));
        }
    }
    Ok(())
}

impl ValueBundle {
    /// Checks addresses and rejects duplicate workers within any list.
    pub fn validate(&self) -> Result<()> {
        validate_address(&self.reputer)?;
        check_unique("inferer values", self.inferer_values.iter().map(|v| v.worker.as_str()))?;
        check_unique(
            "forecaster values",
            self.forecaster_values.iter().map(|v| v.worker.as_str()),
        )?;
        check_unique(
            "one-out inferer values",
            self.one_out_inferer_values.iter().map(|v| v.worker.as_str()),
        )?;
        check_unique(
            "one-out forecaster values",
            self.one_out_forecaster_values.iter().map(|v| v.worker.as_str()),
        )?;
        check_unique(
            "one-in forecaster values",
            self.one_in_forecaster_values.iter().map(|v| v.worker.as_str()),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::address_from_seed;

    fn wav(seed: &str, value: &str) -> WorkerAttributedValue {
        WorkerAttributedValue {
            worker: address_from_seed(seed.as_bytes()).unwrap(),
            value: value.parse().unwrap(),
        }
    }

    fn bundle() -> ValueBundle {
        ValueBundle {
            topic_id: 1,
            reputer: address_from_seed(b"reputer").unwrap(),
            reputer_nonce: Nonce { block_height: 100 },
            combined_value: "0.1".parse().unwrap(),
            naive_value: "0.1".parse().unwrap(),
            inferer_values: vec![wav("w1", "0.1"), wav("w2", "0.2")],
            forecaster_values: vec![wav("w1", "0.1")],
            one_out_inferer_values: vec![],
            one_out_forecaster_values: vec![],
            one_in_forecaster_values: vec![],
        }
    }

    #[test]
    fn test_valid_bundle() {
        assert!(bundle().validate().is_ok());
    }

    #[test]
    fn test_duplicate_worker_rejected() {
        let mut b = bundle();
        b.inferer_values.push(wav("w1", "0.3"));
        assert!(matches!(b.validate(), Err(ValidationError::MalformedBundle(_))));
    }

    #[test]
    fn test_bad_reputer_rejected() {
        let mut b = bundle();
        b.reputer = "nope".to_string();
        assert!(matches!(b.validate(), Err(ValidationError::InvalidAddress { .. })));
    }

    #[test]
    fn test_missing_lists_default_to_empty() {
        let reputer = address_from_seed(b"reputer").unwrap();
        let json = format!(
            r#"{{"topic_id":1,"reputer":"{}","reputer_nonce":{{"block_height":5}},"combined_value":"0.5","naive_value":"0.6"}}"#,
            reputer
        );
        let parsed: ValueBundle = serde_json::from_str(&json).unwrap();
        assert!(parsed.inferer_values.is_empty());
        assert!(parsed.one_in_forecaster_values.is_empty());
        assert!(parsed.validate().is_ok());
    }
}
