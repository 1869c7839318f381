use serde::Serialize;
use uuid::Uuid;

/// Engine error taxonomy.
///
/// Expected business rejections (invalid coupon, insufficient points, unknown
/// status) are typed variants returned through `Result`; callers surface the
/// specific reason to the shopper. Only infrastructure failures end up in
/// `DatabaseError` / `Other`.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A precondition on current persisted state failed: coupon expired or
    /// exhausted, gift card drained, order already in a terminal state.
    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Insufficient points: requested {requested}, available {available}")]
    InsufficientPoints { requested: i64, available: i64 },

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(Uuid),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// True when the error is an expected business rejection rather than an
    /// infrastructure failure; consumers map these to 4xx responses.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::ValidationError(_)
                | Self::StateConflict(_)
                | Self::InsufficientPoints { .. }
                | Self::InvalidStatus(_)
        )
    }

    /// Message suitable for user-facing responses. Internal errors return a
    /// generic message to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) | Self::Other(_) => "Internal server error".to_string(),
            Self::ConcurrentModification(id) => {
                format!("Concurrent modification for ID {}", id)
            }
            _ => self.to_string(),
        }
    }
}
