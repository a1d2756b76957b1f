use super::network_losses::{convert_value_bundle_to_network_losses_by_worker, NetworkLossesByWorker};
use crate::error::Result;
use crate::regret_store::{PairRegretKind, RegretStore, WorkerRegretKind};
use crate::topics::TopicStore;
use emissions_math::{quantile, std_dev, Dec, MathError};
use emissions_types::{ActorType, BlockHeight, Nonce, TimestampedValue, Topic, TopicId, ValueBundle};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// `(1 - alpha) * previous_regret + alpha * (loss_a - loss_b)`, stamped with `block_height`.
pub fn compute_and_build_em_regret(
    loss_a: Dec,
    loss_b: Dec,
    previous_regret: Dec,
    alpha: Dec,
    block_height: BlockHeight,
) -> std::result::Result<TimestampedValue, MathError> {
    check_alpha(alpha)?;

    let regret = loss_a.checked_sub(loss_b)?;
    let decayed = Dec::ONE.checked_sub(alpha)?.checked_mul(previous_regret)?;
    let value = decayed.checked_add(alpha.checked_mul(regret)?)?;

    Ok(TimestampedValue {
        block_height,
        value,
    })
}

fn check_alpha(alpha: Dec) -> std::result::Result<(), MathError> {
    if !alpha.is_positive() || alpha > Dec::ONE {
        return Err(MathError::OutOfDomain {
            name: "alpha_regret",
            value: alpha.to_string(),
            expected: "(0, 1]",
        });
    }
    Ok(())
}

/// Inclusions needed before an actor's regret shapes the topic baseline.
pub fn experience_threshold(alpha: Dec) -> std::result::Result<u64, MathError> {
    check_alpha(alpha)?;
    Dec::ONE.checked_quo(alpha)?.ceil().to_u64()
}

/// Cold-start regret for a topic from its experienced actors' regrets.
///
/// The regrets are scaled by `s = |sample std-dev| + epsilon`, the `quantile`
/// of the scaled values is taken with linear interpolation, shifted down by
/// `(p_norm_safe_div - c_norm * p_norm) / p_norm` and scaled back by `s`.
/// The result does not depend on input order.
pub fn calc_topic_initial_regret(
    regrets: &[Dec],
    epsilon: Dec,
    p_norm: Dec,
    c_norm: Dec,
    quantile_q: Dec,
    p_norm_safe_div: Dec,
) -> std::result::Result<Dec, MathError> {
    let sigma = std_dev(regrets)?;
    let scale = sigma.abs().checked_add(epsilon)?;

    let normalized = regrets
        .iter()
        .map(|r| r.checked_quo(scale))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let q = quantile(&normalized, quantile_q)?;

    let offset = p_norm_safe_div
        .checked_sub(c_norm.checked_mul(p_norm)?)?
        .checked_quo(p_norm)?;

    q.checked_sub(offset)?.checked_mul(scale)
}

pub struct GetCalcSetNetworkRegretsArgs<'a> {
    pub topic_id: TopicId,
    pub network_losses: &'a ValueBundle,
    pub nonce: Nonce,
    pub alpha_regret: Dec,
    pub c_norm: Dec,
    pub p_norm: Dec,
    pub epsilon_topic: Dec,
    pub initial_regret_quantile: Dec,
    pub p_norm_safe_div: Dec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegretUpdateSummary {
    pub inferers: usize,
    pub forecasters: usize,
    pub regrets_written: usize,
    /// New topic baseline, when any experienced actor took part.
    pub initial_regret: Option<Dec>,
}

struct RegretWriter<'a> {
    store: &'a RegretStore,
    topic: &'a Topic,
    alpha: Dec,
    block_height: BlockHeight,
    written: usize,
}

impl RegretWriter<'_> {
    async fn update_worker(
        &mut self,
        kind: WorkerRegretKind,
        worker: &str,
        loss_a: Dec,
        loss_b: Dec,
    ) -> Result<TimestampedValue> {
        let (previous, no_prior) = self.store.get_regret(kind, self.topic, worker).await?;
        let updated =
            compute_and_build_em_regret(loss_a, loss_b, previous.value, self.alpha, self.block_height)?;
        self.store
            .set_regret(kind, self.topic.id, worker, updated)
            .await?;
        self.written += 1;

        debug!(
            topic_id = self.topic.id,
            worker = %worker,
            kind = ?kind,
            cold_start = no_prior,
            previous = %previous.value,
            regret = %updated.value,
            "Regret updated"
        );
        Ok(updated)
    }

    async fn update_pair(
        &mut self,
        kind: PairRegretKind,
        first: &str,
        second: &str,
        loss_a: Dec,
        loss_b: Dec,
    ) -> Result<()> {
        let (previous, _) = self
            .store
            .get_pair_regret(kind, self.topic, first, second)
            .await?;
        let updated =
            compute_and_build_em_regret(loss_a, loss_b, previous.value, self.alpha, self.block_height)?;
        self.store
            .set_pair_regret(kind, self.topic.id, first, second, updated)
            .await?;
        self.written += 1;
        Ok(())
    }

    /// One-out losses against every inferer and forecaster in the bundle.
    async fn update_one_out(
        &mut self,
        losses: &NetworkLossesByWorker,
        one_out: &BTreeMap<String, Dec>,
        versus_inferer: PairRegretKind,
        versus_forecaster: PairRegretKind,
    ) -> Result<()> {
        for (withheld, one_out_loss) in one_out {
            for (inferer, inferer_loss) in &losses.inferer_losses {
                self.update_pair(versus_inferer, withheld, inferer, *one_out_loss, *inferer_loss)
                    .await?;
            }
            for (forecaster, forecaster_loss) in &losses.forecaster_losses {
                self.update_pair(
                    versus_forecaster,
                    withheld,
                    forecaster,
                    *one_out_loss,
                    *forecaster_loss,
                )
                .await?;
            }
        }
        Ok(())
    }
}

/// Applies one value bundle to every regret it touches and refreshes the
/// topic's initial regret from the experienced actors in the bundle.
///
/// Writes go straight to storage; callers run this inside a transaction so
/// that a failure part-way leaves no trace.
pub async fn get_calc_set_network_regrets(
    regrets: &RegretStore,
    topics: &TopicStore,
    args: GetCalcSetNetworkRegretsArgs<'_>,
) -> Result<RegretUpdateSummary> {
    check_alpha(args.alpha_regret)?;
    let threshold = experience_threshold(args.alpha_regret)?;
    let topic = topics.get_topic(args.topic_id).await?;
    let losses = convert_value_bundle_to_network_losses_by_worker(args.network_losses);

    let mut writer = RegretWriter {
        store: regrets,
        topic: &topic,
        alpha: args.alpha_regret,
        block_height: args.nonce.block_height,
        written: 0,
    };
    let mut experienced = Vec::new();

    for (inferer, loss) in &losses.inferer_losses {
        let updated = writer
            .update_worker(WorkerRegretKind::Inferer, inferer, losses.combined_loss, *loss)
            .await?;
        writer
            .update_worker(WorkerRegretKind::NaiveInferer, inferer, losses.naive_loss, *loss)
            .await?;

        let count = regrets
            .increment_inclusion_count(topic.id, inferer, ActorType::Inferer)
            .await?;
        if count >= threshold {
            experienced.push(updated.value);
        }
    }

    for (forecaster, loss) in &losses.forecaster_losses {
        let updated = writer
            .update_worker(WorkerRegretKind::Forecaster, forecaster, losses.combined_loss, *loss)
            .await?;

        let count = regrets
            .increment_inclusion_count(topic.id, forecaster, ActorType::Forecaster)
            .await?;
        if count >= threshold {
            experienced.push(updated.value);
        }
    }

    writer
        .update_one_out(
            &losses,
            &losses.one_out_inferer_losses,
            PairRegretKind::OneOutInfererInferer,
            PairRegretKind::OneOutInfererForecaster,
        )
        .await?;
    writer
        .update_one_out(
            &losses,
            &losses.one_out_forecaster_losses,
            PairRegretKind::OneOutForecasterInferer,
            PairRegretKind::OneOutForecasterForecaster,
        )
        .await?;

    for (forecaster, one_in_loss) in &losses.one_in_forecaster_losses {
        for (inferer, inferer_loss) in &losses.inferer_losses {
            // the (forecaster, forecaster) pair is written below against its forecast loss
            if inferer == forecaster && losses.forecaster_losses.contains_key(forecaster) {
                continue;
            }
            writer
                .update_pair(
                    PairRegretKind::OneInForecaster,
                    forecaster,
                    inferer,
                    *one_in_loss,
                    *inferer_loss,
                )
                .await?;
        }
        if let Some(forecaster_loss) = losses.forecaster_losses.get(forecaster) {
            writer
                .update_pair(
                    PairRegretKind::OneInForecaster,
                    forecaster,
                    forecaster,
                    *one_in_loss,
                    *forecaster_loss,
                )
                .await?;
        }
    }

    let mut summary = RegretUpdateSummary {
        inferers: losses.inferer_losses.len(),
        forecasters: losses.forecaster_losses.len(),
        regrets_written: writer.written,
        initial_regret: None,
    };

    if !experienced.is_empty() {
        let initial_regret = calc_topic_initial_regret(
            &experienced,
            args.epsilon_topic,
            args.p_norm,
            args.c_norm,
            args.initial_regret_quantile,
            args.p_norm_safe_div,
        )?;
        topics.update_initial_regret(topic.id, initial_regret).await?;
        summary.initial_regret = Some(initial_regret);
    }

    info!(
        topic_id = topic.id,
        block_height = args.nonce.block_height,
        inferers = summary.inferers,
        forecasters = summary.forecasters,
        regrets_written = summary.regrets_written,
        experienced = experienced.len(),
        initial_regret = ?summary.initial_regret.map(|d| d.to_string()),
        "📉 Network regrets updated"
    );

    Ok(summary)
}
