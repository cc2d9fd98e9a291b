//! Remote fetch capability
//!
//! [`SplitwiseApi`] is the seam between the streaming core and the wire-level
//! client: each method fetches one batch (or one record) of a resource kind.
//! [`SplitwiseClient`] is the HTTP implementation; tests substitute scripted
//! implementations.

pub mod client;
pub mod params;

pub use client::SplitwiseClient;
pub use params::{
    ExpensesKey, ExpensesParams, NotificationsKey, NotificationsParams, OffsetKey, ParamKey,
    ParamValue, Params,
};

use async_trait::async_trait;
use thiserror::Error;

use crate::resources::{Currency, Expense, Friend, Group, Identifier, MainCategory, Notification};

/// Errors returned by the remote capability
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to parse JSON response
    #[error("Failed to parse API response: {0}")]
    Parse(#[from] serde_json::Error),

    /// The API answered with a non-success status
    #[error("API returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The requested record does not exist
    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: String },
}

/// One page or one record of a resource kind, fetched from the remote API
#[async_trait]
pub trait SplitwiseApi: Send + Sync + std::fmt::Debug {
    async fn get_expenses(&self, params: &ExpensesParams) -> Result<Vec<Expense>, ApiError>;

    async fn get_expense(&self, id: Identifier) -> Result<Expense, ApiError>;

    async fn get_friends(&self) -> Result<Vec<Friend>, ApiError>;

    async fn get_friend(&self, id: Identifier) -> Result<Friend, ApiError>;

    async fn get_groups(&self) -> Result<Vec<Group>, ApiError>;

    async fn get_group(&self, id: Identifier) -> Result<Group, ApiError>;

    async fn get_notifications(
        &self,
        params: &NotificationsParams,
    ) -> Result<Vec<Notification>, ApiError>;

    async fn get_categories(&self) -> Result<Vec<MainCategory>, ApiError>;

    async fn get_currencies(&self) -> Result<Vec<Currency>, ApiError>;
}
