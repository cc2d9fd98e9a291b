//! Shared helpers for unit tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use crate::api::{ApiError, ExpensesParams, NotificationsParams, SplitwiseApi};
use crate::resources::{
    CategoryRef, Currency, Expense, Friend, Group, Identifier, MainCategory, Notification, Picture,
};

/// Counts warning and error events emitted while it is installed
#[derive(Clone, Default)]
struct LevelCounter {
    errors: Arc<AtomicUsize>,
    warnings: Arc<AtomicUsize>,
}

impl<S: Subscriber> Layer<S> for LevelCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        match *event.metadata().level() {
            Level::ERROR => {
                self.errors.fetch_add(1, Ordering::SeqCst);
            }
            Level::WARN => {
                self.warnings.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
    }
}

/// Log capture scoped to the current thread
///
/// Works with `#[tokio::test]` because the default runtime is
/// current-thread, so spawned producers log on the test's thread.
pub struct LogCapture {
    counter: LevelCounter,
    _guard: DefaultGuard,
}

impl LogCapture {
    pub fn errors(&self) -> usize {
        self.counter.errors.load(Ordering::SeqCst)
    }

    pub fn warnings(&self) -> usize {
        self.counter.warnings.load(Ordering::SeqCst)
    }
}

pub fn capture_logs() -> LogCapture {
    let counter = LevelCounter::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());
    let guard = tracing::subscriber::set_default(subscriber);
    LogCapture {
        counter,
        _guard: guard,
    }
}

pub fn currency(code: &str, unit: &str) -> Currency {
    Currency {
        currency_code: code.to_string(),
        unit: unit.to_string(),
    }
}

pub fn category(id: i64, name: &str) -> MainCategory {
    MainCategory {
        id: Identifier(id),
        name: name.to_string(),
        icon: None,
        subcategories: vec![],
    }
}

pub fn friend(id: i64, first_name: &str) -> Friend {
    Friend {
        id: Identifier(id),
        first_name: first_name.to_string(),
        last_name: None,
        email: None,
        registration_status: Some("confirmed".to_string()),
        picture: Picture::default(),
        groups: vec![],
        balance: vec![],
        updated_at: None,
    }
}

pub fn group(id: i64, name: &str) -> Group {
    Group {
        id: Identifier(id),
        name: name.to_string(),
        group_type: None,
        updated_at: None,
        simplify_by_default: false,
        members: vec![],
        original_debts: vec![],
        simplified_debts: vec![],
        whiteboard: None,
        invite_link: None,
    }
}

pub fn expense(id: i64) -> Expense {
    Expense {
        id: Identifier(id),
        group_id: None,
        friendship_id: None,
        expense_bundle_id: None,
        description: format!("expense {}", id),
        details: None,
        payment: false,
        cost: "10.0".to_string(),
        currency_code: "USD".to_string(),
        date: chrono::Utc::now(),
        created_at: None,
        updated_at: None,
        deleted_at: None,
        category: CategoryRef {
            id: Identifier(18),
            name: "General".to_string(),
        },
        repayments: vec![],
        users: vec![],
    }
}

pub fn notification(id: i64) -> Notification {
    Notification {
        id: Identifier(id),
        kind: 0,
        created_at: chrono::Utc::now(),
        created_by: None,
        source: None,
        image_url: None,
        image_shape: None,
        content: format!("notification {}", id),
    }
}

/// Call counts of a [`StubApi`]
#[derive(Debug, Default)]
pub struct Calls {
    pub currencies: AtomicUsize,
    pub categories: AtomicUsize,
    pub friends: AtomicUsize,
    pub expenses: AtomicUsize,
    pub notifications: AtomicUsize,
}

/// Scripted in-memory API
#[derive(Debug, Default)]
pub struct StubApi {
    pub currencies: Vec<Currency>,
    pub categories: Vec<MainCategory>,
    pub friends: Vec<Friend>,
    pub groups: Vec<Group>,
    pub notifications: Vec<Notification>,
    /// Pages returned by successive expense fetches; empty once exhausted
    pub expense_pages: Mutex<VecDeque<Vec<Expense>>>,
    /// Offsets seen by expense fetches
    pub expense_offsets: Mutex<Vec<i64>>,
    /// When set, every batch fetch fails
    pub failing: bool,
    pub calls: Calls,
}

impl StubApi {
    pub fn with_reference_data() -> Self {
        Self {
            currencies: vec![currency("USD", "$"), currency("ARS", "$"), currency("EUR", "€")],
            categories: vec![
                category(1, "Utilities"),
                category(2, "Uncategorized"),
                category(19, "Entertainment"),
            ],
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), ApiError> {
        if self.failing {
            return Err(ApiError::Status {
                status: 503,
                message: "Service Unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SplitwiseApi for StubApi {
    async fn get_expenses(&self, params: &ExpensesParams) -> Result<Vec<Expense>, ApiError> {
        self.calls.expenses.fetch_add(1, Ordering::SeqCst);
        self.expense_offsets.lock().unwrap().push(params.offset());
        self.check()?;
        Ok(self.expense_pages.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn get_expense(&self, id: Identifier) -> Result<Expense, ApiError> {
        self.check()?;
        Ok(expense(id.0))
    }

    async fn get_friends(&self) -> Result<Vec<Friend>, ApiError> {
        self.calls.friends.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.friends.clone())
    }

    async fn get_friend(&self, id: Identifier) -> Result<Friend, ApiError> {
        self.check()?;
        self.friends
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound {
                resource: "friend",
                id: id.to_string(),
            })
    }

    async fn get_groups(&self) -> Result<Vec<Group>, ApiError> {
        self.check()?;
        Ok(self.groups.clone())
    }

    async fn get_group(&self, id: Identifier) -> Result<Group, ApiError> {
        self.check()?;
        self.groups
            .iter()
            .find(|g| g.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound {
                resource: "group",
                id: id.to_string(),
            })
    }

    async fn get_notifications(
        &self,
        _params: &NotificationsParams,
    ) -> Result<Vec<Notification>, ApiError> {
        self.calls.notifications.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.notifications.clone())
    }

    async fn get_categories(&self) -> Result<Vec<MainCategory>, ApiError> {
        self.calls.categories.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.categories.clone())
    }

    async fn get_currencies(&self) -> Result<Vec<Currency>, ApiError> {
        self.calls.currencies.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.currencies.clone())
    }
}
