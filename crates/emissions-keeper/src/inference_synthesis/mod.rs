//! Regret synthesis from reputer-reported network losses.

pub mod network_losses;
pub mod network_regrets;

pub use network_losses::{convert_value_bundle_to_network_losses_by_worker, NetworkLossesByWorker};
pub use network_regrets::{
    calc_topic_initial_regret, compute_and_build_em_regret, experience_threshold,
    get_calc_set_network_regrets, GetCalcSetNetworkRegretsArgs, RegretUpdateSummary,
};
