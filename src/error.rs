//! Errors returned by [`Connection`](crate::connection::Connection) lookups

use thiserror::Error;

use crate::api::ApiError;

/// Error returned by single-record lookups
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No record with this key exists in the reference cache
    #[error("{kind} '{key}' not found")]
    NotFound { kind: &'static str, key: String },

    /// The remote capability failed
    #[error(transparent)]
    Fetch(#[from] ApiError),
}

impl GatewayError {
    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        GatewayError::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    /// Whether this error means the record does not exist, locally or remotely
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GatewayError::NotFound { .. } | GatewayError::Fetch(ApiError::NotFound { .. })
        )
    }
}
