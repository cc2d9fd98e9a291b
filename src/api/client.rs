//! Splitwise REST API client
//!
//! Fetches resources from the Splitwise v3.0 API using a bearer token and
//! unwraps the JSON envelopes the API puts around every response.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use super::{ApiError, ExpensesParams, NotificationsParams, SplitwiseApi};
use crate::resources::{Currency, Expense, Friend, Group, Identifier, MainCategory, Notification};

/// Base URL for the Splitwise API
pub const SPLITWISE_BASE_URL: &str = "https://secure.splitwise.com/api/v3.0";

#[derive(Debug, Deserialize)]
struct ExpensesEnvelope {
    expenses: Vec<Expense>,
}

#[derive(Debug, Deserialize)]
struct ExpenseEnvelope {
    expense: Expense,
}

#[derive(Debug, Deserialize)]
struct FriendsEnvelope {
    friends: Vec<Friend>,
}

#[derive(Debug, Deserialize)]
struct FriendEnvelope {
    friend: Friend,
}

#[derive(Debug, Deserialize)]
struct GroupsEnvelope {
    groups: Vec<Group>,
}

#[derive(Debug, Deserialize)]
struct GroupEnvelope {
    group: Group,
}

#[derive(Debug, Deserialize)]
struct NotificationsEnvelope {
    notifications: Vec<Notification>,
}

#[derive(Debug, Deserialize)]
struct CategoriesEnvelope {
    categories: Vec<MainCategory>,
}

#[derive(Debug, Deserialize)]
struct CurrenciesEnvelope {
    currencies: Vec<Currency>,
}

/// Error body returned by the API. Both shapes occur in the wild.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    errors: Option<HashMap<String, Vec<String>>>,
}

/// Client for the Splitwise REST API
#[derive(Clone)]
pub struct SplitwiseClient {
    http_client: Client,
    token: String,
    /// Base URL for the API (allows override for testing and proxies)
    base_url: String,
}

impl fmt::Debug for SplitwiseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitwiseClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl SplitwiseClient {
    /// Creates a new client for the given API token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            token: token.into(),
            base_url: SPLITWISE_BASE_URL.to_string(),
        }
    }

    /// Creates a client with a custom base URL and request timeout
    pub fn with_settings(
        token: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            token: token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Performs a GET request and decodes the envelope
    async fn fetch<E: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<E, ApiError> {
        let url = self.endpoint(path);
        debug!("GET {} {:?}", url, query);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&text, status),
            });
        }

        Ok(serde_json::from_str(&text)?)
    }

    /// Fetches a single record, turning a 404 into `ApiError::NotFound`
    async fn fetch_one<E: DeserializeOwned>(
        &self,
        resource: &'static str,
        id: Identifier,
    ) -> Result<E, ApiError> {
        let path = format!("get_{}/{}", resource, id);
        match self.fetch(&path, &[]).await {
            Err(ApiError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Err(ApiError::NotFound {
                    resource,
                    id: id.to_string(),
                })
            }
            other => other,
        }
    }
}

/// Extracts a readable message from an error body
fn error_message(body: &str, status: StatusCode) -> String {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();

    if let Some(body) = parsed {
        if let Some(error) = body.error {
            return error;
        }
        if let Some(errors) = body.errors {
            let mut messages: Vec<String> = errors.into_values().flatten().collect();
            if !messages.is_empty() {
                messages.sort();
                return messages.join("; ");
            }
        }
    }

    status
        .canonical_reason()
        .unwrap_or("unexpected response")
        .to_string()
}

#[async_trait]
impl SplitwiseApi for SplitwiseClient {
    async fn get_expenses(&self, params: &ExpensesParams) -> Result<Vec<Expense>, ApiError> {
        let envelope: ExpensesEnvelope = self.fetch("get_expenses", &params.to_query()).await?;
        Ok(envelope.expenses)
    }

    async fn get_expense(&self, id: Identifier) -> Result<Expense, ApiError> {
        let envelope: ExpenseEnvelope = self.fetch_one("expense", id).await?;
        Ok(envelope.expense)
    }

    async fn get_friends(&self) -> Result<Vec<Friend>, ApiError> {
        let envelope: FriendsEnvelope = self.fetch("get_friends", &[]).await?;
        Ok(envelope.friends)
    }

    async fn get_friend(&self, id: Identifier) -> Result<Friend, ApiError> {
        let envelope: FriendEnvelope = self.fetch_one("friend", id).await?;
        Ok(envelope.friend)
    }

    async fn get_groups(&self) -> Result<Vec<Group>, ApiError> {
        let envelope: GroupsEnvelope = self.fetch("get_groups", &[]).await?;
        Ok(envelope.groups)
    }

    async fn get_group(&self, id: Identifier) -> Result<Group, ApiError> {
        let envelope: GroupEnvelope = self.fetch_one("group", id).await?;
        Ok(envelope.group)
    }

    async fn get_notifications(
        &self,
        params: &NotificationsParams,
    ) -> Result<Vec<Notification>, ApiError> {
        let envelope: NotificationsEnvelope =
            self.fetch("get_notifications", &params.to_query()).await?;
        Ok(envelope.notifications)
    }

    async fn get_categories(&self) -> Result<Vec<MainCategory>, ApiError> {
        let envelope: CategoriesEnvelope = self.fetch("get_categories", &[]).await?;
        Ok(envelope.categories)
    }

    async fn get_currencies(&self) -> Result<Vec<Currency>, ApiError> {
        let envelope: CurrenciesEnvelope = self.fetch("get_currencies", &[]).await?;
        Ok(envelope.currencies)
    }
}
