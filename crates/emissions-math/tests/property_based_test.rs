use emissions_math::{max, mean, quantile, std_dev, sum, Dec};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Decimals in roughly [-1000, 1000] with up to 6 fractional digits
fn arbitrary_dec() -> impl Strategy<Value = Dec> {
    (-1_000_000_000i64..1_000_000_000).prop_map(|m| Dec::from(Decimal::new(m, 6)))
}

fn dec_vec() -> impl Strategy<Value = Vec<Dec>> {
    prop::collection::vec(arbitrary_dec(), 1..20)
}

fn unit_interval() -> impl Strategy<Value = Dec> {
    (0i64..=1000).prop_map(|m| Dec::from(Decimal::new(m, 3)))
}

proptest! {
    /// Property: quantile does not depend on input order
    #[test]
    fn prop_quantile_order_invariant(values in dec_vec(), q in unit_interval()) {
        let mut reversed = values.clone();
        reversed.reverse();
        prop_assert_eq!(quantile(&values, q).unwrap(), quantile(&reversed, q).unwrap());
    }

    /// Property: quantile stays within [min, max]
    #[test]
    fn prop_quantile_bounded(values in dec_vec(), q in unit_interval()) {
        let result = quantile(&values, q).unwrap();
        let lo = values.iter().copied().min().unwrap();
        let hi = max(&values).unwrap();
        prop_assert!(result >= lo && result <= hi, "{} not in [{}, {}]", result, lo, hi);
    }

    /// Property: quantile is monotone in q
    #[test]
    fn prop_quantile_monotone(values in dec_vec(), a in unit_interval(), b in unit_interval()) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(quantile(&values, lo).unwrap() <= quantile(&values, hi).unwrap());
    }

    /// Property: sample standard deviation is never negative
    #[test]
    fn prop_std_dev_non_negative(values in dec_vec()) {
        prop_assert!(!std_dev(&values).unwrap().is_negative());
    }

    /// Property: shifting every value leaves the spread unchanged
    #[test]
    fn prop_std_dev_shift_invariant(values in dec_vec(), shift in arbitrary_dec()) {
        let shifted: Vec<Dec> = values.iter().map(|v| v.checked_add(shift).unwrap()).collect();
        let tolerance: Dec = "1e-12".parse().unwrap();
        prop_assert!(Dec::in_delta(std_dev(&values).unwrap(), std_dev(&shifted).unwrap(), tolerance));
    }

    /// Property: mean times count equals sum
    #[test]
    fn prop_mean_matches_sum(values in dec_vec()) {
        let n = Dec::from_i64(values.len() as i64);
        let tolerance: Dec = "1e-18".parse().unwrap();
        let rebuilt = mean(&values).unwrap().checked_mul(n).unwrap();
        prop_assert!(Dec::in_delta(rebuilt, sum(&values).unwrap(), tolerance));
    }
}
