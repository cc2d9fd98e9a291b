//! Resource records returned by the Splitwise API
//!
//! These are plain, immutable values. The streaming and caching layers are
//! generic over them and only ever look at the identifying key exposed through
//! [`Keyed`] when a record is stored in the reference cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Numeric identifier used by the remote API for users, groups, expenses and categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(pub i64);

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Identifier {
    fn from(value: i64) -> Self {
        Identifier(value)
    }
}

/// A record that can be stored in a keyed store by its natural identifier
pub trait Keyed {
    /// Type of the natural key
    type Key: Eq + Hash + Clone + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Human-readable name of the resource kind, used in errors and logs
    const KIND: &'static str;

    /// Returns the natural key of this record
    fn key(&self) -> Self::Key;
}

/// An amount owed in a single currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub currency_code: String,
    /// Decimal amount as sent by the API (e.g. "414.5")
    pub amount: String,
}

/// Avatar URLs of a user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Picture {
    #[serde(default)]
    pub small: Option<String>,
    #[serde(default)]
    pub medium: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
}

/// A user as embedded in other resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Identifier,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub picture: Picture,
}

/// Balance of a friend inside one shared group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBalance {
    pub group_id: Identifier,
    #[serde(default)]
    pub balance: Vec<Balance>,
}

/// A friend of the authenticated user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Friend {
    pub id: Identifier,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub registration_status: Option<String>,
    #[serde(default)]
    pub picture: Picture,
    #[serde(default)]
    pub groups: Vec<GroupBalance>,
    #[serde(default)]
    pub balance: Vec<Balance>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Friend {
    /// Full display name ("First Last", or just the first name)
    pub fn display_name(&self) -> String {
        match self.last_name.as_deref() {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

/// A debt between two users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Debt {
    pub from: Identifier,
    pub to: Identifier,
    pub amount: String,
    #[serde(default)]
    pub currency_code: Option<String>,
}

/// Member of a group together with their balances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub id: Identifier,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub balance: Vec<Balance>,
}

/// A group of users sharing expenses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: Identifier,
    pub name: String,
    #[serde(default)]
    pub group_type: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub simplify_by_default: bool,
    #[serde(default)]
    pub members: Vec<GroupMember>,
    #[serde(default)]
    pub original_debts: Vec<Debt>,
    #[serde(default)]
    pub simplified_debts: Vec<Debt>,
    #[serde(default)]
    pub whiteboard: Option<String>,
    #[serde(default)]
    pub invite_link: Option<String>,
}

/// Category reference embedded in an expense
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: Identifier,
    pub name: String,
}

/// One user's share of an expense
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseShare {
    #[serde(default)]
    pub user: Option<User>,
    pub user_id: Identifier,
    pub paid_share: String,
    pub owed_share: String,
    pub net_balance: String,
}

/// An expense or payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Identifier,
    #[serde(default)]
    pub group_id: Option<Identifier>,
    #[serde(default)]
    pub friendship_id: Option<Identifier>,
    #[serde(default)]
    pub expense_bundle_id: Option<Identifier>,
    pub description: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub payment: bool,
    /// Decimal amount as sent by the API (e.g. "25.0")
    pub cost: String,
    pub currency_code: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub category: CategoryRef,
    #[serde(default)]
    pub repayments: Vec<Debt>,
    #[serde(default)]
    pub users: Vec<ExpenseShare>,
}

/// Where a notification points to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: Identifier,
    #[serde(default)]
    pub url: Option<String>,
}

/// An entry of the user's activity feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Identifier,
    /// Numeric notification type as defined by the API
    #[serde(rename = "type")]
    pub kind: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<Identifier>,
    #[serde(default)]
    pub source: Option<NotificationSource>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_shape: Option<String>,
    /// HTML fragment describing the event
    pub content: String,
}

/// Subcategory of a main category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Identifier,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
}

/// Top-level expense category with its subcategories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainCategory {
    pub id: Identifier,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub subcategories: Vec<Category>,
}

/// A currency supported by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    pub currency_code: String,
    pub unit: String,
}

impl Keyed for MainCategory {
    type Key = Identifier;
    const KIND: &'static str = "category";

    fn key(&self) -> Identifier {
        self.id
    }
}

impl Keyed for Currency {
    type Key = String;
    const KIND: &'static str = "currency";

    fn key(&self) -> String {
        self.currency_code.clone()
    }
}
