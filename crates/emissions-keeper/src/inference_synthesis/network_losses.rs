use emissions_math::Dec;
use emissions_types::ValueBundle;
use std::collections::BTreeMap;

/// A value bundle reshaped into per-worker lookups, ordered by address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkLossesByWorker {
    pub combined_loss: Dec,
    pub naive_loss: Dec,
    pub inferer_losses: BTreeMap<String, Dec>,
    pub forecaster_losses: BTreeMap<String, Dec>,
    pub one_out_inferer_losses: BTreeMap<String, Dec>,
    pub one_out_forecaster_losses: BTreeMap<String, Dec>,
    pub one_in_forecaster_losses: BTreeMap<String, Dec>,
}

pub fn convert_value_bundle_to_network_losses_by_worker(
    bundle: &ValueBundle,
) -> NetworkLossesByWorker {
    NetworkLossesByWorker {
        combined_loss: bundle.combined_value,
        naive_loss: bundle.naive_value,
        inferer_losses: bundle
            .inferer_values
            .iter()
            .map(|v| (v.worker.clone(), v.value))
            .collect(),
        forecaster_losses: bundle
            .forecaster_values
            .iter()
            .map(|v| (v.worker.clone(), v.value))
            .collect(),
        one_out_inferer_losses: bundle
            .one_out_inferer_values
            .iter()
            .map(|v| (v.worker.clone(), v.value))
            .collect(),
        one_out_forecaster_losses: bundle
            .one_out_forecaster_values
            .iter()
            .map(|v| (v.worker.clone(), v.value))
            .collect(),
        one_in_forecaster_losses: bundle
            .one_in_forecaster_values
            .iter()
            .map(|v| (v.worker.clone(), v.value))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emissions_types::{Nonce, WithheldWorkerAttributedValue, WorkerAttributedValue};

    fn d(s: &str) -> Dec {
        s.parse().unwrap()
    }

    fn wav(worker: &str, value: &str) -> WorkerAttributedValue {
        WorkerAttributedValue {
            worker: worker.to_string(),
            value: d(value),
        }
    }

    fn withheld(worker: &str, value: &str) -> WithheldWorkerAttributedValue {
        WithheldWorkerAttributedValue {
            worker: worker.to_string(),
            value: d(value),
        }
    }

    #[test]
    fn test_convert_value_bundle() {
        let bundle = ValueBundle {
            topic_id: 1,
            reputer: "r".to_string(),
            reputer_nonce: Nonce { block_height: 100 },
            combined_value: d("0.1"),
            naive_value: d("0.1"),
            inferer_values: vec![wav("w1", "0.1"), wav("w2", "0.2")],
            forecaster_values: vec![wav("w1", "0.1"), wav("w2", "0.2")],
            one_out_inferer_values: vec![withheld("w1", "0.1"), withheld("w2", "0.2")],
            one_out_forecaster_values: vec![withheld("w1", "0.1"), withheld("w2", "0.2")],
            one_in_forecaster_values: vec![wav("w1", "0.1"), wav("w2", "0.2")],
        };

        let result = convert_value_bundle_to_network_losses_by_worker(&bundle);

        assert_eq!(result.combined_loss, d("0.1"));
        assert_eq!(result.naive_loss, d("0.1"));
        for losses in [
            &result.inferer_losses,
            &result.forecaster_losses,
            &result.one_out_inferer_losses,
            &result.one_out_forecaster_losses,
            &result.one_in_forecaster_losses,
        ] {
            assert_eq!(losses["w1"], d("0.1"));
            assert_eq!(losses["w2"], d("0.2"));
        }
    }

    #[test]
    fn test_absent_lists_give_empty_maps() {
        let bundle = ValueBundle {
            topic_id: 1,
            reputer: "r".to_string(),
            reputer_nonce: Nonce { block_height: 1 },
            combined_value: d("1"),
            naive_value: d("2"),
            inferer_values: vec![wav("w1", "0.5")],
            forecaster_values: vec![],
            one_out_inferer_values: vec![],
            one_out_forecaster_values: vec![],
            one_in_forecaster_values: vec![],
        };

        let result = convert_value_bundle_to_network_losses_by_worker(&bundle);
        assert_eq!(result.inferer_losses.len(), 1);
        assert!(result.forecaster_losses.is_empty());
        assert!(result.one_in_forecaster_losses.is_empty());
    }
}
