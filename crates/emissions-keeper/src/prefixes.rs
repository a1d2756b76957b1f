//! Storage prefixes of every keeper collection.
//!
//! Format: first 10 bytes of `blake3(collection_name)`.

use emissions_storage::{hash_prefix, PREFIX_LEN};

lazy_static::lazy_static! {
    /// `topic_id -> Topic`
    pub static ref PREFIX_TOPICS: [u8; PREFIX_LEN] = hash_prefix(b"topics");
    pub static ref PREFIX_NEXT_TOPIC_ID: [u8; PREFIX_LEN] = hash_prefix(b"next_topic_id");

    /// `(topic, worker) -> TimestampedValue`
    pub static ref PREFIX_INFERER_REGRETS: [u8; PREFIX_LEN] = hash_prefix(b"inferer_network_regrets");
    pub static ref PREFIX_FORECASTER_REGRETS: [u8; PREFIX_LEN] = hash_prefix(b"forecaster_network_regrets");
    pub static ref PREFIX_NAIVE_INFERER_REGRETS: [u8; PREFIX_LEN] = hash_prefix(b"naive_inferer_network_regrets");

    /// `(topic, withheld, worker) -> TimestampedValue`
    pub static ref PREFIX_ONE_OUT_INFERER_INFERER_REGRETS: [u8; PREFIX_LEN] = hash_prefix(b"one_out_inferer_inferer_network_regrets");
    pub static ref PREFIX_ONE_OUT_INFERER_FORECASTER_REGRETS: [u8; PREFIX_LEN] = hash_prefix(b"one_out_inferer_forecaster_network_regrets");
    pub static ref PREFIX_ONE_OUT_FORECASTER_INFERER_REGRETS: [u8; PREFIX_LEN] = hash_prefix(b"one_out_forecaster_inferer_network_regrets");
    pub static ref PREFIX_ONE_OUT_FORECASTER_FORECASTER_REGRETS: [u8; PREFIX_LEN] = hash_prefix(b"one_out_forecaster_forecaster_network_regrets");

    /// `(topic, forecaster, worker) -> TimestampedValue`
    pub static ref PREFIX_ONE_IN_FORECASTER_REGRETS: [u8; PREFIX_LEN] = hash_prefix(b"one_in_forecaster_network_regrets");

    /// `(topic, actor, role) -> u64`
    pub static ref PREFIX_INCLUSION_COUNTS: [u8; PREFIX_LEN] = hash_prefix(b"inclusion_counts");

    /// `(topic, reputer) -> Amount`, own stake only
    pub static ref PREFIX_STAKE_REPUTER: [u8; PREFIX_LEN] = hash_prefix(b"stake_reputer");
    /// `(topic, reputer) -> Amount`, own stake plus stake delegated upon it
    pub static ref PREFIX_STAKE_REPUTER_AUTHORITY: [u8; PREFIX_LEN] = hash_prefix(b"stake_reputer_authority");
    /// `(topic, delegator, reputer) -> DelegatorInfo`
    pub static ref PREFIX_DELEGATED_STAKE: [u8; PREFIX_LEN] = hash_prefix(b"delegated_stake");
    /// `(topic, delegator) -> Amount`
    pub static ref PREFIX_STAKE_SUM_FROM_DELEGATOR: [u8; PREFIX_LEN] = hash_prefix(b"stake_sum_from_delegator");
    /// `(topic, reputer) -> Amount`
    pub static ref PREFIX_STAKE_FROM_DELEGATORS_UPON_REPUTER: [u8; PREFIX_LEN] = hash_prefix(b"stake_from_delegators_upon_reputer");
    /// `(topic, reputer) -> Dec`
    pub static ref PREFIX_DELEGATE_REWARD_PER_SHARE: [u8; PREFIX_LEN] = hash_prefix(b"delegate_reward_per_share");
    /// `topic -> Amount`
    pub static ref PREFIX_TOPIC_STAKE: [u8; PREFIX_LEN] = hash_prefix(b"topic_stake");
    pub static ref PREFIX_TOTAL_STAKE: [u8; PREFIX_LEN] = hash_prefix(b"total_stake");

    /// `(block, topic, reputer) -> StakeRemovalInfo`
    pub static ref PREFIX_STAKE_REMOVALS_BY_BLOCK: [u8; PREFIX_LEN] = hash_prefix(b"stake_removals_by_block");
    /// `(topic, reputer) -> block`
    pub static ref PREFIX_STAKE_REMOVALS_BY_ACTOR: [u8; PREFIX_LEN] = hash_prefix(b"stake_removals_by_actor");
    /// `(block, topic, delegator, reputer) -> DelegateStakeRemovalInfo`
    pub static ref PREFIX_DELEGATE_REMOVALS_BY_BLOCK: [u8; PREFIX_LEN] = hash_prefix(b"delegate_stake_removals_by_block");
    /// `(topic, delegator, reputer) -> block`
    pub static ref PREFIX_DELEGATE_REMOVALS_BY_ACTOR: [u8; PREFIX_LEN] = hash_prefix(b"delegate_stake_removals_by_actor");

    /// `(address, denom) -> Amount`
    pub static ref PREFIX_BANK_BALANCES: [u8; PREFIX_LEN] = hash_prefix(b"bank_balances");
}

fn named_prefixes() -> Vec<(&'static str, [u8; PREFIX_LEN])> {
    vec![
        ("topics", *PREFIX_TOPICS),
        ("next_topic_id", *PREFIX_NEXT_TOPIC_ID),
        ("inferer_network_regrets", *PREFIX_INFERER_REGRETS),
        ("forecaster_network_regrets", *PREFIX_FORECASTER_REGRETS),
        ("naive_inferer_network_regrets", *PREFIX_NAIVE_INFERER_REGRETS),
        ("one_out_inferer_inferer_network_regrets", *PREFIX_ONE_OUT_INFERER_INFERER_REGRETS),
        ("one_out_inferer_forecaster_network_regrets", *PREFIX_ONE_OUT_INFERER_FORECASTER_REGRETS),
        ("one_out_forecaster_inferer_network_regrets", *PREFIX_ONE_OUT_FORECASTER_INFERER_REGRETS),
        ("one_out_forecaster_forecaster_network_regrets", *PREFIX_ONE_OUT_FORECASTER_FORECASTER_REGRETS),
        ("one_in_forecaster_network_regrets", *PREFIX_ONE_IN_FORECASTER_REGRETS),
        ("inclusion_counts", *PREFIX_INCLUSION_COUNTS),
        ("stake_reputer", *PREFIX_STAKE_REPUTER),
        ("stake_reputer_authority", *PREFIX_STAKE_REPUTER_AUTHORITY),
        ("delegated_stake", *PREFIX_DELEGATED_STAKE),
        ("stake_sum_from_delegator", *PREFIX_STAKE_SUM_FROM_DELEGATOR),
        ("stake_from_delegators_upon_reputer", *PREFIX_STAKE_FROM_DELEGATORS_UPON_REPUTER),
        ("delegate_reward_per_share", *PREFIX_DELEGATE_REWARD_PER_SHARE),
        ("topic_stake", *PREFIX_TOPIC_STAKE),
        ("total_stake", *PREFIX_TOTAL_STAKE),
        ("stake_removals_by_block", *PREFIX_STAKE_REMOVALS_BY_BLOCK),
        ("stake_removals_by_actor", *PREFIX_STAKE_REMOVALS_BY_ACTOR),
        ("delegate_stake_removals_by_block", *PREFIX_DELEGATE_REMOVALS_BY_BLOCK),
        ("delegate_stake_removals_by_actor", *PREFIX_DELEGATE_REMOVALS_BY_ACTOR),
        ("bank_balances", *PREFIX_BANK_BALANCES),
    ]
}

/// Decode a prefix hash back to its collection name (for debugging/tooling)
pub fn prefix_name(prefix: &[u8; PREFIX_LEN]) -> Option<&'static str> {
    named_prefixes()
        .into_iter()
        .find(|(_, candidate)| candidate == prefix)
        .map(|(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_uniqueness() {
        let named = named_prefixes();
        for i in 0..named.len() {
            for j in (i + 1)..named.len() {
                assert_ne!(
                    named[i].1, named[j].1,
                    "Prefix collision between {} and {}",
                    named[i].0, named[j].0
                );
            }
        }
    }

    #[test]
    fn test_prefix_name_lookup() {
        assert_eq!(prefix_name(&PREFIX_TOTAL_STAKE), Some("total_stake"));
        assert_eq!(prefix_name(&hash_prefix(b"unknown")), None);
    }
}
