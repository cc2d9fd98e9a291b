//! Fetch parameters for list endpoints
//!
//! A parameter set is a small mutable bag keyed by a closed enumeration of
//! the filters an endpoint understands. The pagination driver only ever
//! touches the offset key.

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// A key understood by one list endpoint
pub trait ParamKey: Copy + Ord + fmt::Debug + Send + Sync + 'static {
    /// Query-string name of the key
    fn as_str(&self) -> &'static str;
}

/// A key set that supports offset pagination
pub trait OffsetKey: ParamKey {
    /// The key holding the number of records to skip
    const OFFSET: Self;
}

/// Value of a single parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Text(String),
    Date(DateTime<Utc>),
}

impl ParamValue {
    /// Renders the value the way the API expects it in a query string
    pub fn to_query_value(&self) -> String {
        match self {
            ParamValue::Int(v) => v.to_string(),
            ParamValue::Text(v) => v.clone(),
            ParamValue::Date(v) => v.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    /// Returns the integer value, if this is an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<usize> for ParamValue {
    fn from(value: usize) -> Self {
        ParamValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<crate::resources::Identifier> for ParamValue {
    fn from(value: crate::resources::Identifier) -> Self {
        ParamValue::Int(value.0)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<DateTime<Utc>> for ParamValue {
    fn from(value: DateTime<Utc>) -> Self {
        ParamValue::Date(value)
    }
}

/// Mutable parameter bag for one list endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct Params<K: ParamKey> {
    values: BTreeMap<K, ParamValue>,
}

impl<K: ParamKey> Default for Params<K> {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }
}

impl<K: ParamKey> Params<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, key: K, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: K, value: impl Into<ParamValue>) {
        self.values.insert(key, value.into());
    }

    pub fn get(&self, key: K) -> Option<&ParamValue> {
        self.values.get(&key)
    }

    pub fn remove(&mut self, key: K) -> Option<ParamValue> {
        self.values.remove(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the (name, value) pairs in key order
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value.to_query_value()))
            .collect()
    }
}

impl<K: OffsetKey> Params<K> {
    /// Current offset, or 0 when unset or not an integer
    pub fn offset(&self) -> i64 {
        self.get(K::OFFSET).and_then(ParamValue::as_int).unwrap_or(0)
    }

    pub fn set_offset(&mut self, offset: i64) {
        self.set(K::OFFSET, offset);
    }
}

/// Filters accepted by the expenses listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExpensesKey {
    GroupId,
    FriendId,
    DatedAfter,
    DatedBefore,
    UpdatedAfter,
    UpdatedBefore,
    Limit,
    Offset,
}

impl ParamKey for ExpensesKey {
    fn as_str(&self) -> &'static str {
        match self {
            ExpensesKey::GroupId => "group_id",
            ExpensesKey::FriendId => "friend_id",
            ExpensesKey::DatedAfter => "dated_after",
            ExpensesKey::DatedBefore => "dated_before",
            ExpensesKey::UpdatedAfter => "updated_after",
            ExpensesKey::UpdatedBefore => "updated_before",
            ExpensesKey::Limit => "limit",
            ExpensesKey::Offset => "offset",
        }
    }
}

impl OffsetKey for ExpensesKey {
    const OFFSET: Self = ExpensesKey::Offset;
}

/// Filters accepted by the notifications listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NotificationsKey {
    UpdatedAfter,
    Limit,
}

impl ParamKey for NotificationsKey {
    fn as_str(&self) -> &'static str {
        match self {
            NotificationsKey::UpdatedAfter => "updated_after",
            NotificationsKey::Limit => "limit",
        }
    }
}

pub type ExpensesParams = Params<ExpensesKey>;
pub type NotificationsParams = Params<NotificationsKey>;
