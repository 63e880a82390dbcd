use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storage::error::StorageError;
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, LeagueError>;

/// Raised when an explicit assignment would take a tag away from a member
/// who is not part of the request. The caller must resubmit it as a swap
/// that includes the current holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSwapNeeded {
    pub guild_id: String,
    pub requestor_id: String,
    pub current_holder_id: String,
    pub target_tag: i32,
    pub requestor_current_tag: Option<i32>,
}

#[derive(Error, Debug)]
pub enum LeagueError {
    #[error("Failed to acquire guild lock for {guild_id}: {source}")]
    Lock {
        guild_id: String,
        #[source]
        source: StorageError,
    },

    #[error(
        "Stale recalculation: round {round_id} was processed at {processed_at}, outside the {window_secs}s recalculation window"
    )]
    StaleRecalculation {
        round_id: Uuid,
        processed_at: DateTime<Utc>,
        window_secs: i64,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(
        "Tag swap needed: tag {} is held by {}, requested by {}",
        .0.target_tag,
        .0.current_holder_id,
        .0.requestor_id
    )]
    TagSwapNeeded(TagSwapNeeded),

    #[error("{operation} failed: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: StorageError,
    },
}

impl LeagueError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True for failures the caller can fix by changing the request.
    pub fn is_caller_correctable(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::TagSwapNeeded(_))
    }
}

impl From<ValidationErrors> for LeagueError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

/// Attaches the operation name to storage failures.
pub trait OperationContext<T> {
    fn in_op(self, operation: &'static str) -> Result<T>;
}

impl<T> OperationContext<T> for std::result::Result<T, StorageError> {
    fn in_op(self, operation: &'static str) -> Result<T> {
        self.map_err(|source| LeagueError::Storage { operation, source })
    }
}

impl<T> OperationContext<T> for std::result::Result<T, sqlx::Error> {
    fn in_op(self, operation: &'static str) -> Result<T> {
        self.map_err(|e| LeagueError::Storage {
            operation,
            source: StorageError::from(e),
        })
    }
}
