use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("Validation: {0}")]
    Validation(String),

    #[error("A parking lot already exists at address '{0}'")]
    DuplicateAddress(String),

    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Parking lot {0} already has spaces in use")]
    AlreadyConfigured(Uuid),

    #[error("Allocation plan covers {actual} spaces but the lot capacity is {expected}")]
    CapacityMismatch { expected: u32, actual: u32 },

    #[error("Space {0} is not available")]
    SpaceNotAvailable(Uuid),

    #[error("Cannot {action} {entity} in state {from}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        action: &'static str,
    },

    #[error("Busy: {0}")]
    Busy(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            field: "id",
            value: id.to_string(),
        }
    }

    /// Contention on a lock or a stale optimistic check. The caller may retry
    /// the whole request with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::Busy(_))
    }

    /// Whether this error is a persistence failure (connection lost, pool
    /// exhausted) that the core retries itself before giving up.
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_busy_is_retryable() {
        assert!(DomainError::Busy("space".into()).is_retryable());
        assert!(!DomainError::SpaceNotAvailable(Uuid::nil()).is_retryable());
        assert!(!DomainError::Storage("conn".into()).is_retryable());
    }

    #[test]
    fn only_storage_is_transient() {
        assert!(DomainError::Storage("pool timed out".into()).is_transient());
        assert!(!DomainError::Internal("bad query".into()).is_transient());
        assert!(!DomainError::Busy("space".into()).is_transient());
    }

    #[test]
    fn capacity_mismatch_message_names_both_sides() {
        let e = DomainError::CapacityMismatch {
            expected: 30,
            actual: 28,
        };
        assert_eq!(
            e.to_string(),
            "Allocation plan covers 28 spaces but the lot capacity is 30"
        );
    }
}
