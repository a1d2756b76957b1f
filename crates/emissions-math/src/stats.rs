//! Order-independent statistics over slices of [`Dec`].

use crate::dec::Dec;
use crate::error::{MathError, Result};

pub fn sum(values: &[Dec]) -> Result<Dec> {
    values.iter().try_fold(Dec::ZERO, |acc, v| acc.checked_add(*v))
}

pub fn mean(values: &[Dec]) -> Result<Dec> {
    if values.is_empty() {
        return Err(MathError::EmptySet("mean"));
    }
    let n = Dec::from_i64(values.len() as i64);
    sum(values)?.checked_quo(n)
}

pub fn max(values: &[Dec]) -> Result<Dec> {
    values
        .iter()
        .copied()
        .max()
        .ok_or(MathError::EmptySet("max"))
}

/// Sample standard deviation (divisor `n - 1`). A single value has zero spread.
pub fn std_dev(values: &[Dec]) -> Result<Dec> {
    match values.len() {
        0 => Err(MathError::EmptySet("standard deviation")),
        1 => Ok(Dec::ZERO),
        n => {
            let avg = mean(values)?;
            let mut squares = Dec::ZERO;
            for v in values {
                let diff = v.checked_sub(avg)?;
                squares = squares.checked_add(diff.checked_mul(diff)?)?;
            }
            let variance = squares.checked_quo(Dec::from_i64(n as i64 - 1))?;
            variance.sqrt()
        }
    }
}

/// Quantile `q` in `[0, 1]` by linear interpolation between the closest
/// ranks of the sorted input, at position `q * (n - 1)`.
pub fn quantile(values: &[Dec], q: Dec) -> Result<Dec> {
    if values.is_empty() {
        return Err(MathError::EmptySet("quantile"));
    }
    if q.is_negative() || q > Dec::ONE {
        return Err(MathError::OutOfDomain {
            name: "quantile",
            value: q.to_string(),
            expected: "[0, 1]",
        });
    }

    let mut sorted = values.to_vec();
    sorted.sort();

    let last = Dec::from_i64(sorted.len() as i64 - 1);
    let position = q.checked_mul(last)?;
    let lower_rank = position.trunc_to_u128()?;
    let lower = usize::try_from(lower_rank).map_err(|_| MathError::Overflow("quantile rank"))?;
    if lower + 1 >= sorted.len() {
        return Ok(sorted[sorted.len() - 1]);
    }

    let fraction = position.checked_sub(Dec::from_u128(lower_rank)?)?;
    let span = sorted[lower + 1].checked_sub(sorted[lower])?;
    sorted[lower].checked_add(fraction.checked_mul(span)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Dec {
        s.parse().unwrap()
    }

    fn decs(raw: &[&str]) -> Vec<Dec> {
        raw.iter().map(|s| d(s)).collect()
    }

    #[test]
    fn test_empty_inputs_are_errors() {
        assert_eq!(mean(&[]), Err(MathError::EmptySet("mean")));
        assert!(max(&[]).is_err());
        assert!(std_dev(&[]).is_err());
        assert!(quantile(&[], d("0.5")).is_err());
        assert_eq!(sum(&[]).unwrap(), Dec::ZERO);
    }

    #[test]
    fn test_sample_std_dev() {
        let values = decs(&["2", "4", "4", "4", "5", "5", "7", "9"]);
        // population sd is 2, sample sd is sqrt(32 / 7)
        let expected = d("2.1380899352993950");
        assert!(Dec::in_delta(std_dev(&values).unwrap(), expected, d("1e-15")));
    }

    #[test]
    fn test_single_value_std_dev_is_zero() {
        assert_eq!(std_dev(&decs(&["42"])).unwrap(), Dec::ZERO);
    }

    #[test]
    fn test_quantile_interpolates() {
        let values = decs(&["4", "1", "3", "2"]);
        assert_eq!(quantile(&values, Dec::ZERO).unwrap(), d("1"));
        assert_eq!(quantile(&values, Dec::ONE).unwrap(), d("4"));
        assert_eq!(quantile(&values, d("0.5")).unwrap(), d("2.5"));
        assert_eq!(quantile(&values, d("0.25")).unwrap(), d("1.75"));
    }

    #[test]
    fn test_quantile_rejects_out_of_range() {
        let values = decs(&["1", "2"]);
        assert!(quantile(&values, d("1.01")).is_err());
        assert!(quantile(&values, d("-0.1")).is_err());
    }
}
