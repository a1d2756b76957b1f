//! Deterministic decimal arithmetic used by the emissions module.
//!
//! All consensus-relevant math goes through [`Dec`], a fixed-point decimal
//! with checked operations. Floating point never enters a state transition.

pub mod dec;
pub mod error;
pub mod stats;

pub use dec::Dec;
pub use error::{MathError, Result};
pub use stats::{max, mean, quantile, std_dev, sum};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let values = vec![Dec::from_i64(1), Dec::from_i64(3)];
        assert_eq!(mean(&values).unwrap(), Dec::from_i64(2));
        assert_eq!(max(&values).unwrap(), Dec::from_i64(3));
        assert_eq!(sum(&values).unwrap(), Dec::from_i64(4));
    }
}
