use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("Overflow in calculation: {0}")]
    Overflow(&'static str),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid decimal string: {0}")]
    InvalidDecimal(String),

    #[error("Value out of domain: {name} = {value} (expected {expected})")]
    OutOfDomain {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Cannot compute {0} of an empty set")]
    EmptySet(&'static str),

    #[error("Cannot convert negative value {0} to an unsigned amount")]
    NegativeAmount(String),
}

pub type Result<T> = std::result::Result<T, MathError>;
