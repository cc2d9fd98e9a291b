//! Entry point for callers: one authenticated connection to the API
//!
//! A [`Connection`] bundles the token, the caller's cancellation token and the
//! tracing span producers log under. It hands out streams for every list
//! endpoint and passes single-record lookups straight through. It performs no
//! network I/O on construction and is cheap to clone.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::api::{ExpensesParams, NotificationsParams, SplitwiseApi, SplitwiseClient};
use crate::cache::ReferenceCache;
use crate::error::GatewayError;
use crate::resources::{Currency, Expense, Friend, Group, Identifier, MainCategory, Notification};
use crate::stream::{PaginationLimits, ResultStream, StreamContext};

#[derive(Debug, Clone)]
pub struct Connection {
    token: Arc<str>,
    api: Arc<dyn SplitwiseApi>,
    cache: Arc<ReferenceCache>,
    ctx: StreamContext,
    limits: PaginationLimits,
}

impl Connection {
    /// Opens a connection to the Splitwise API using the process-wide cache
    pub fn open(token: impl Into<String>, cancel: CancellationToken, span: Span) -> Self {
        let token: String = token.into();
        let api = Arc::new(SplitwiseClient::new(token.clone()));
        Self::with_api(token, api, cancel, span)
    }

    /// Builds a connection around any implementation of the remote capability
    pub fn with_api(
        token: impl Into<String>,
        api: Arc<dyn SplitwiseApi>,
        cancel: CancellationToken,
        span: Span,
    ) -> Self {
        Self {
            token: Arc::from(token.into()),
            api,
            cache: ReferenceCache::global(),
            ctx: StreamContext::new(cancel, span),
            limits: PaginationLimits::default(),
        }
    }

    /// Replaces the reference cache (tests use an isolated one)
    pub fn with_cache(mut self, cache: Arc<ReferenceCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_limits(mut self, limits: PaginationLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.ctx.cancel
    }

    pub fn span(&self) -> &Span {
        &self.ctx.span
    }

    pub fn cache(&self) -> &Arc<ReferenceCache> {
        &self.cache
    }

    pub fn limits(&self) -> PaginationLimits {
        self.limits
    }

    /// Fetches categories and currencies into the cache up front
    ///
    /// Returns the number of `(currencies, categories)` cached.
    pub async fn warm_cache(&self) -> (usize, usize) {
        self.cache.warm(self.api.clone(), &self.ctx).await
    }

    pub async fn main_categories(&self) -> ResultStream<MainCategory> {
        self.cache.main_categories(self.api.clone(), &self.ctx).await
    }

    pub async fn main_category(&self, id: Identifier) -> Result<MainCategory, GatewayError> {
        self.cache.main_category(self.api.clone(), &self.ctx, id).await
    }

    pub async fn currencies(&self) -> ResultStream<Currency> {
        self.cache.currencies(self.api.clone(), &self.ctx).await
    }

    pub async fn currency(&self, code: &str) -> Result<Currency, GatewayError> {
        self.cache.currency(self.api.clone(), &self.ctx, code).await
    }

    pub fn friends(&self) -> ResultStream<Friend> {
        let api = self.api.clone();
        ResultStream::spawn(&self.ctx, move || async move { api.get_friends().await })
    }

    pub async fn friend(&self, id: Identifier) -> Result<Friend, GatewayError> {
        Ok(self.api.get_friend(id).await?)
    }

    pub fn groups(&self) -> ResultStream<Group> {
        let api = self.api.clone();
        ResultStream::spawn(&self.ctx, move || async move { api.get_groups().await })
    }

    pub async fn group(&self, id: Identifier) -> Result<Group, GatewayError> {
        Ok(self.api.get_group(id).await?)
    }

    pub fn notifications(&self, params: NotificationsParams) -> ResultStream<Notification> {
        let api = self.api.clone();
        ResultStream::spawn(&self.ctx, move || async move {
            api.get_notifications(&params).await
        })
    }

    pub async fn expense(&self, id: Identifier) -> Result<Expense, GatewayError> {
        Ok(self.api.get_expense(id).await?)
    }

    /// Streams every expense matching `params`, page by page
    pub fn expenses(&self, params: ExpensesParams) -> ResultStream<Expense> {
        let api = self.api.clone();
        let fetch = move |page: ExpensesParams| {
            let api = api.clone();
            async move { api.get_expenses(&page).await }
        };
        ResultStream::paginated(&self.ctx, fetch, params, self.limits)
    }
}
