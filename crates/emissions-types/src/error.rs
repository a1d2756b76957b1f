use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Amount must be positive")]
    NonPositiveAmount,

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Malformed value bundle: {0}")]
    MalformedBundle(String),
}

pub type Result<T> = std::result::Result<T, ValidationError>;
