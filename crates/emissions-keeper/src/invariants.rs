//! Read-only audits of the stake ledger.
//!
//! Every predicate rescans primary storage and returns a diagnostic together
//! with `broken`. Nothing here writes; what to do about a broken invariant is
//! up to the caller.

use crate::error::Result;
use crate::removals::StakeRemovalScheduler;
use crate::stake_ledger::{pending_of, StakeLedger};
use emissions_math::{Dec, MathError};
use emissions_types::{Amount, TopicId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::error;

pub type InvariantResult = Result<(String, bool)>;

fn add(total: Amount, amount: Amount, what: &'static str) -> Result<Amount> {
    Ok(total
        .checked_add(amount)
        .ok_or(MathError::Overflow(what))?)
}

fn accumulate<K: Ord>(sums: &mut BTreeMap<K, Amount>, key: K, amount: Amount) -> Result<()> {
    let entry = sums.entry(key).or_default();
    *entry = add(*entry, amount, "invariant sum")?;
    Ok(())
}

fn ok(name: &str) -> (String, bool) {
    (format!("{}: ok", name), false)
}

pub struct InvariantChecker<'a> {
    ledger: &'a StakeLedger,
    removals: &'a StakeRemovalScheduler,
}

impl<'a> InvariantChecker<'a> {
    pub fn new(ledger: &'a StakeLedger, removals: &'a StakeRemovalScheduler) -> Self {
        Self { ledger, removals }
    }

    /// Total stake equals what the staking account holds.
    pub async fn total_stake_equals_staking_balance(&self) -> InvariantResult {
        let total = self.ledger.get_total_stake().await?;
        let balance = self
            .ledger
            .bank()
            .get_balance(self.ledger.staking_account(), self.ledger.denom())
            .await?;

        if total != balance {
            return Ok((
                format!(
                    "total stake {} does not match staking account balance {}",
                    total, balance
                ),
                true,
            ));
        }
        Ok(ok("total-stake-equals-staking-balance"))
    }

    /// Both removal kinds have as many by-block entries as by-actor entries.
    pub async fn removal_indexes_balanced(&self) -> InvariantResult {
        let by_block = self.removals.stake_removals_by_block.len().await?;
        let by_actor = self.removals.stake_removals_by_actor.len().await?;
        if by_block != by_actor {
            return Ok((
                format!(
                    "stake removals by block ({}) and by actor ({}) differ",
                    by_block, by_actor
                ),
                true,
            ));
        }

        let by_block = self.removals.delegate_removals_by_block.len().await?;
        let by_actor = self.removals.delegate_removals_by_actor.len().await?;
        if by_block != by_actor {
            return Ok((
                format!(
                    "delegate stake removals by block ({}) and by actor ({}) differ",
                    by_block, by_actor
                ),
                true,
            ));
        }
        Ok(ok("removal-indexes-balanced"))
    }

    /// Pending removals never exceed the stake they draw on, in total and per topic.
    pub async fn pending_removals_within_stake(&self) -> InvariantResult {
        let mut per_topic: BTreeMap<TopicId, Amount> = BTreeMap::new();
        for (_, info) in self.removals.stake_removals_by_block.iterate().await? {
            accumulate(&mut per_topic, info.topic_id, info.amount)?;
        }
        for (_, info) in self.removals.delegate_removals_by_block.iterate().await? {
            accumulate(&mut per_topic, info.topic_id, info.amount)?;
        }

        let mut pending_total = Amount::ZERO;
        for (topic_id, pending) in &per_topic {
            let topic_stake = self.ledger.get_topic_stake(*topic_id).await?;
            if *pending > topic_stake {
                return Ok((
                    format!(
                        "pending removals {} exceed stake {} in topic {}",
                        pending, topic_stake, topic_id
                    ),
                    true,
                ));
            }
            pending_total = add(pending_total, *pending, "pending removals")?;
        }

        let total = self.ledger.get_total_stake().await?;
        if pending_total > total {
            return Ok((
                format!(
                    "pending removals {} exceed total stake {}",
                    pending_total, total
                ),
                true,
            ));
        }
        Ok(ok("pending-removals-within-stake"))
    }

    /// Delegated positions add up to both cached delegation sums.
    pub async fn delegated_stakes(&self) -> InvariantResult {
        let mut by_delegator: BTreeMap<(TopicId, String), Amount> = BTreeMap::new();
        let mut by_reputer: BTreeMap<(TopicId, String), Amount> = BTreeMap::new();
        for ((topic_id, delegator, reputer), info) in self.ledger.delegated_stake.iterate().await? {
            accumulate(&mut by_delegator, (topic_id, delegator), info.amount)?;
            accumulate(&mut by_reputer, (topic_id, reputer), info.amount)?;
        }

        let cached_by_delegator: BTreeMap<_, _> = self
            .ledger
            .stake_sum_from_delegator
            .iterate()
            .await?
            .into_iter()
            .collect();
        if let Some(diagnostic) = compare_sums(&by_delegator, &cached_by_delegator, "delegator") {
            return Ok((diagnostic, true));
        }

        let cached_by_reputer: BTreeMap<_, _> = self
            .ledger
            .stake_from_delegators_upon_reputer
            .iterate()
            .await?
            .into_iter()
            .collect();
        if let Some(diagnostic) = compare_sums(&by_reputer, &cached_by_reputer, "reputer") {
            return Ok((diagnostic, true));
        }

        Ok(ok("delegated-stakes"))
    }

    /// Topic stakes add up to the total stake.
    pub async fn topic_stakes_sum_to_total(&self) -> InvariantResult {
        let mut sum = Amount::ZERO;
        for (_, stake) in self.ledger.topic_stake.iterate().await? {
            sum = add(sum, stake, "topic stakes")?;
        }
        let total = self.ledger.get_total_stake().await?;
        if sum != total {
            return Ok((
                format!("sum of topic stakes {} does not match total stake {}", sum, total),
                true,
            ));
        }
        Ok(ok("topic-stakes-sum-to-total"))
    }

    /// Every reputer's authority is its own stake plus the stake delegated
    /// upon it, and authorities add up to the topic stake.
    pub async fn reputer_authority_matches_topic_stake(&self) -> InvariantResult {
        let own: BTreeMap<_, _> = self.ledger.stake_reputer.iterate().await?.into_iter().collect();
        let upon: BTreeMap<_, _> = self
            .ledger
            .stake_from_delegators_upon_reputer
            .iterate()
            .await?
            .into_iter()
            .collect();
        let authority: BTreeMap<_, _> = self
            .ledger
            .stake_reputer_authority
            .iterate()
            .await?
            .into_iter()
            .collect();

        let keys: BTreeSet<&(TopicId, String)> =
            own.keys().chain(upon.keys()).chain(authority.keys()).collect();
        let mut per_topic: BTreeMap<TopicId, Amount> = BTreeMap::new();
        for key in keys {
            let expected = add(
                own.get(key).copied().unwrap_or_default(),
                upon.get(key).copied().unwrap_or_default(),
                "reputer authority",
            )?;
            let cached = authority.get(key).copied().unwrap_or_default();
            if expected != cached {
                return Ok((
                    format!(
                        "authority of {} in topic {} is {}, own plus delegated is {}",
                        key.1, key.0, cached, expected
                    ),
                    true,
                ));
            }
            accumulate(&mut per_topic, key.0, cached)?;
        }

        let topic_stakes: BTreeMap<_, _> = self.ledger.topic_stake.iterate().await?.into_iter().collect();
        let topics: BTreeSet<TopicId> = per_topic.keys().chain(topic_stakes.keys()).copied().collect();
        for topic_id in topics {
            let summed = per_topic.get(&topic_id).copied().unwrap_or_default();
            let stored = topic_stakes.get(&topic_id).copied().unwrap_or_default();
            if summed != stored {
                return Ok((
                    format!(
                        "authorities in topic {} sum to {}, topic stake is {}",
                        topic_id, summed, stored
                    ),
                    true,
                ));
            }
        }
        Ok(ok("reputer-authority-matches-topic-stake"))
    }

    /// The pending-reward account covers every delegator's claimable reward.
    pub async fn pending_rewards_covered(&self) -> InvariantResult {
        let balance = self
            .ledger
            .bank()
            .get_balance(self.ledger.pending_rewards_account(), self.ledger.denom())
            .await?;

        let mut owed = Amount::ZERO;
        for ((topic_id, _, reputer), info) in self.ledger.delegated_stake.iterate().await? {
            let share = self.ledger.get_reward_per_share(topic_id, &reputer).await?;
            let pending = pending_of(&info, share)?;
            if pending > Dec::ZERO {
                owed = add(owed, Amount::from_dec_floor(pending)?, "pending rewards")?;
            }
        }

        if owed > balance {
            return Ok((
                format!(
                    "pending rewards {} exceed pending-reward account balance {}",
                    owed, balance
                ),
                true,
            ));
        }
        Ok(ok("pending-rewards-covered"))
    }

    /// Runs every predicate in order and returns the first violation, or an
    /// all-clear diagnostic.
    pub async fn check_invariants(&self) -> InvariantResult {
        let checks = [
            ("total-stake-equals-staking-balance", self.total_stake_equals_staking_balance().await?),
            ("removal-indexes-balanced", self.removal_indexes_balanced().await?),
            ("pending-removals-within-stake", self.pending_removals_within_stake().await?),
            ("delegated-stakes", self.delegated_stakes().await?),
            ("topic-stakes-sum-to-total", self.topic_stakes_sum_to_total().await?),
            (
                "reputer-authority-matches-topic-stake",
                self.reputer_authority_matches_topic_stake().await?,
            ),
            ("pending-rewards-covered", self.pending_rewards_covered().await?),
        ];

        for (name, (diagnostic, broken)) in checks {
            if broken {
                error!(invariant = name, diagnostic = %diagnostic, "❌ Invariant broken");
                return Ok((format!("{}: {}", name, diagnostic), true));
            }
        }
        Ok(("all invariants hold".to_string(), false))
    }
}

/// First mismatch between recomputed and cached sums, including cache
/// entries with no positions behind them.
fn compare_sums(
    computed: &BTreeMap<(TopicId, String), Amount>,
    cached: &BTreeMap<(TopicId, String), Amount>,
    role: &str,
) -> Option<String> {
    let keys: BTreeSet<_> = computed.keys().chain(cached.keys()).collect();
    keys.into_iter().find_map(|key| {
        let expected = computed.get(key).copied().unwrap_or_default();
        let actual = cached.get(key).copied().unwrap_or_default();
        (expected != actual).then(|| {
            format!(
                "{} {} in topic {}: positions sum to {}, cached sum is {}",
                role, key.1, key.0, expected, actual
            )
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::{BankKeeper, ModuleAccounts, StoreBank};
    use emissions_storage::{MemoryBackend, StorageBackend};
    use emissions_types::address_from_seed;
    use std::sync::Arc;

    const DENOM: &str = "uemx";

    fn addr(seed: &str) -> String {
        address_from_seed(seed.as_bytes()).unwrap()
    }

    async fn populated() -> (StakeLedger, StakeRemovalScheduler, Arc<StoreBank>) {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let bank = Arc::new(StoreBank::new(backend.clone()));
        for who in ["r1", "d1", "funder"] {
            bank.mint(&addr(who), DENOM, Amount::new(1_000)).await.unwrap();
        }
        let ledger = StakeLedger::new(backend.clone(), bank.clone(), &ModuleAccounts, DENOM).unwrap();
        let removals = StakeRemovalScheduler::new(backend);

        ledger.add_stake(1, &addr("r1"), Amount::new(100)).await.unwrap();
        ledger
            .delegate_stake(1, &addr("d1"), &addr("r1"), Amount::new(30))
            .await
            .unwrap();
        ledger
            .add_delegator_reward(1, &addr("r1"), &addr("funder"), Amount::new(7))
            .await
            .unwrap();
        removals
            .request_stake_removal(&ledger, 1, &addr("r1"), Amount::new(10), 1, 5)
            .await
            .unwrap();
        (ledger, removals, bank)
    }

    #[tokio::test]
    async fn test_consistent_ledger_passes() {
        let (ledger, removals, _) = populated().await;
        let (diagnostic, broken) = InvariantChecker::new(&ledger, &removals)
            .check_invariants()
            .await
            .unwrap();
        assert!(!broken, "{}", diagnostic);
    }

    #[tokio::test]
    async fn test_detects_corrupt_delegator_sum() {
        let (ledger, removals, _) = populated().await;
        ledger
            .stake_sum_from_delegator
            .set(&(1, addr("d1")), &Amount::new(31))
            .await
            .unwrap();

        let checker = InvariantChecker::new(&ledger, &removals);
        let (_, broken) = checker.delegated_stakes().await.unwrap();
        assert!(broken);
        let (diagnostic, broken) = checker.check_invariants().await.unwrap();
        assert!(broken);
        assert!(diagnostic.starts_with("delegated-stakes"));
    }

    #[tokio::test]
    async fn test_detects_orphaned_cache_entry() {
        let (ledger, removals, _) = populated().await;
        ledger
            .stake_from_delegators_upon_reputer
            .set(&(2, addr("ghost")), &Amount::new(1))
            .await
            .unwrap();

        let (_, broken) = InvariantChecker::new(&ledger, &removals)
            .delegated_stakes()
            .await
            .unwrap();
        assert!(broken);
    }

    #[tokio::test]
    async fn test_detects_unbalanced_removal_index() {
        let (ledger, removals, _) = populated().await;
        removals
            .stake_removals_by_actor
            .set(&(9, addr("ghost")), &3)
            .await
            .unwrap();

        let (_, broken) = InvariantChecker::new(&ledger, &removals)
            .removal_indexes_balanced()
            .await
            .unwrap();
        assert!(broken);
    }

    #[tokio::test]
    async fn test_detects_staking_balance_drift() {
        let (ledger, removals, bank) = populated().await;
        bank.mint(ledger.staking_account(), DENOM, Amount::new(1))
            .await
            .unwrap();

        let checker = InvariantChecker::new(&ledger, &removals);
        let (_, broken) = checker.total_stake_equals_staking_balance().await.unwrap();
        assert!(broken);
    }

    #[tokio::test]
    async fn test_detects_total_and_authority_drift() {
        let (ledger, removals, _) = populated().await;
        ledger.total_stake.set(&Amount::new(999)).await.unwrap();
        ledger
            .stake_reputer_authority
            .set(&(1, addr("r1")), &Amount::new(1))
            .await
            .unwrap();

        let checker = InvariantChecker::new(&ledger, &removals);
        assert!(checker.topic_stakes_sum_to_total().await.unwrap().1);
        assert!(checker.reputer_authority_matches_topic_stake().await.unwrap().1);
        assert!(!checker.pending_removals_within_stake().await.unwrap().1);
    }

    #[tokio::test]
    async fn test_detects_uncovered_rewards() {
        let (ledger, removals, bank) = populated().await;
        bank.send_coins(ledger.pending_rewards_account(), &addr("funder"), DENOM, Amount::new(7))
            .await
            .unwrap();

        let (_, broken) = InvariantChecker::new(&ledger, &removals)
            .pending_rewards_covered()
            .await
            .unwrap();
        assert!(broken);
    }
}
