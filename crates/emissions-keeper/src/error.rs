use emissions_math::MathError;
use emissions_storage::StorageError;
use emissions_types::{Amount, TopicId, ValidationError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmissionsError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Math error: {0}")]
    Math(#[from] MathError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Topic {0} does not exist")]
    TopicNotFound(TopicId),

    #[error("Insufficient stake: requested {requested}, available {available}")]
    InsufficientStake { requested: Amount, available: Amount },

    #[error("Insufficient balance in {address}: requested {requested}, available {available}")]
    InsufficientBalance {
        address: String,
        requested: Amount,
        available: Amount,
    },

    #[error("No pending stake removal for {0}")]
    StakeRemovalNotFound(String),

    #[error("No stake delegated upon reputer {reputer} in topic {topic_id}")]
    NoDelegatedStake { topic_id: TopicId, reputer: String },

    #[error("Data corruption: {0}")]
    DataCorruption(String),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}

/// Coarse classification callers use to decide between rejecting a
/// transaction and halting the affected subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    InsufficientFunds,
    Math,
    Storage,
    InvariantViolation,
}

impl EmissionsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EmissionsError::Validation(_) | EmissionsError::TopicNotFound(_) => {
                ErrorKind::Validation
            }
            EmissionsError::InsufficientStake { .. }
            | EmissionsError::InsufficientBalance { .. }
            | EmissionsError::StakeRemovalNotFound(_)
            | EmissionsError::NoDelegatedStake { .. } => ErrorKind::InsufficientFunds,
            EmissionsError::Math(_) => ErrorKind::Math,
            EmissionsError::Storage(_) => ErrorKind::Storage,
            EmissionsError::DataCorruption(_) | EmissionsError::InvariantViolation(_) => {
                ErrorKind::InvariantViolation
            }
        }
    }

    /// Errors that signal broken bookkeeping rather than a bad request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvariantViolation | ErrorKind::Storage
        )
    }
}

pub type Result<T> = std::result::Result<T, EmissionsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            EmissionsError::from(ValidationError::NonPositiveAmount).kind(),
            ErrorKind::Validation
        );
        assert_eq!(EmissionsError::TopicNotFound(3).kind(), ErrorKind::Validation);
        assert_eq!(
            EmissionsError::InsufficientStake {
                requested: Amount::new(2),
                available: Amount::new(1),
            }
            .kind(),
            ErrorKind::InsufficientFunds
        );
        assert_eq!(
            EmissionsError::from(MathError::DivisionByZero).kind(),
            ErrorKind::Math
        );
        assert_eq!(
            EmissionsError::DataCorruption("x".into()).kind(),
            ErrorKind::InvariantViolation
        );
    }

    #[test]
    fn test_fatal_errors() {
        assert!(EmissionsError::from(StorageError::BackendError("disk".into())).is_fatal());
        assert!(EmissionsError::InvariantViolation("sum".into()).is_fatal());
        assert!(!EmissionsError::TopicNotFound(1).is_fatal());
    }
}
