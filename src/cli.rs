//! Command-line interface parsing for splitstream
//!
//! Parses arguments with clap and turns them into a validated [`Request`]
//! before any network or token handling happens.

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;

use crate::api::{ExpensesKey, ExpensesParams, NotificationsKey, NotificationsParams};
use crate::resources::Identifier;

/// Default number of notifications requested
pub const DEFAULT_NOTIFICATIONS_LIMIT: i64 = 1000;

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// A date argument is neither YYYY-MM-DD nor RFC 3339
    #[error("Invalid date: '{0}'. Use YYYY-MM-DD or an RFC 3339 timestamp")]
    InvalidDate(String),

    /// A limit of zero or less was given
    #[error("Invalid limit: {0}. The limit must be positive")]
    InvalidLimit(i64),
}

/// splitstream - stream Splitwise expenses, friends, groups and reference data
#[derive(Parser, Debug)]
#[command(name = "splitstream")]
#[command(about = "Stream records from the Splitwise API")]
#[command(version)]
pub struct Cli {
    /// API token (otherwise SPLITWISE_TOKEN or api.token in the config file)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Path to config file
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log level (overrides config file)
    #[arg(short, long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Stop after N records and close the stream
    #[arg(long, global = true, value_name = "N")]
    pub take: Option<usize>,

    /// Print each record as a JSON line
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Stream expenses, walking every page
    Expenses {
        /// Only expenses of this group
        #[arg(long, value_name = "ID")]
        group: Option<i64>,
        /// Only expenses shared with this friend
        #[arg(long, value_name = "ID")]
        friend: Option<i64>,
        /// Only expenses dated after this date (default: January 1st of this year)
        #[arg(long, value_name = "DATE")]
        after: Option<String>,
        /// Only expenses dated before this date
        #[arg(long, value_name = "DATE")]
        before: Option<String>,
        /// Page size (default: pagination.page_limit from the config file)
        #[arg(long, value_name = "N")]
        limit: Option<i64>,
        /// Also print payments between users
        #[arg(long)]
        payments: bool,
    },
    /// Show one expense
    Expense { id: i64 },
    /// Stream friends
    Friends,
    /// Show one friend
    Friend { id: i64 },
    /// Stream groups
    Groups,
    /// Show one group
    Group { id: i64 },
    /// Stream recent notifications
    Notifications {
        /// Maximum number of notifications
        #[arg(long, value_name = "N")]
        limit: Option<i64>,
        /// Only notifications updated after this date
        #[arg(long, value_name = "DATE")]
        updated_after: Option<String>,
    },
    /// Stream main categories (cached)
    Categories,
    /// Show one main category (cached)
    Category { id: i64 },
    /// Stream currencies (cached)
    Currencies,
    /// Show one currency by ISO code (cached)
    Currency { code: String },
}

/// A validated unit of work for the driver
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Expenses {
        params: ExpensesParams,
        include_payments: bool,
    },
    Expense(Identifier),
    Friends,
    Friend(Identifier),
    Groups,
    Group(Identifier),
    Notifications(NotificationsParams),
    Categories,
    Category(Identifier),
    Currencies,
    Currency(String),
}

/// Parses a date argument, either `YYYY-MM-DD` (local midnight) or RFC 3339
pub fn parse_date_arg(s: &str) -> Result<DateTime<Utc>, CliError> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(s) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    let date =
        NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| CliError::InvalidDate(s.to_string()))?;
    local_midnight(date).ok_or_else(|| CliError::InvalidDate(s.to_string()))
}

fn local_midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// January 1st of the year `today` falls in, at local midnight
pub fn start_of_year(today: NaiveDate) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(today.year(), 1, 1).and_then(local_midnight)
}

fn positive(limit: i64) -> Result<i64, CliError> {
    if limit <= 0 {
        return Err(CliError::InvalidLimit(limit));
    }
    Ok(limit)
}

impl Request {
    /// Whether the request is served from the reference cache
    pub fn uses_reference_data(&self) -> bool {
        matches!(
            self,
            Request::Categories | Request::Category(_) | Request::Currencies | Request::Currency(_)
        )
    }

    /// Builds a request from parsed CLI arguments
    ///
    /// # Arguments
    /// * `command` - The parsed subcommand
    /// * `page_limit` - Page size to use when `--limit` is not given
    /// * `today` - Reference date for the default `--after` filter
    pub fn from_command(
        command: &Command,
        page_limit: i64,
        today: NaiveDate,
    ) -> Result<Self, CliError> {
        let request = match command {
            Command::Expenses {
                group,
                friend,
                after,
                before,
                limit,
                payments,
            } => {
                let mut params = ExpensesParams::new()
                    .with(ExpensesKey::Limit, positive(limit.unwrap_or(page_limit))?);

                let dated_after = match after {
                    Some(after) => Some(parse_date_arg(after)?),
                    None => start_of_year(today),
                };
                if let Some(dated_after) = dated_after {
                    params.set(ExpensesKey::DatedAfter, dated_after);
                }
                if let Some(before) = before {
                    params.set(ExpensesKey::DatedBefore, parse_date_arg(before)?);
                }
                if let Some(group) = group {
                    params.set(ExpensesKey::GroupId, *group);
                }
                if let Some(friend) = friend {
                    params.set(ExpensesKey::FriendId, *friend);
                }

                Request::Expenses {
                    params,
                    include_payments: *payments,
                }
            }
            Command::Expense { id } => Request::Expense(Identifier(*id)),
            Command::Friends => Request::Friends,
            Command::Friend { id } => Request::Friend(Identifier(*id)),
            Command::Groups => Request::Groups,
            Command::Group { id } => Request::Group(Identifier(*id)),
            Command::Notifications {
                limit,
                updated_after,
            } => {
                let mut params = NotificationsParams::new().with(
                    NotificationsKey::Limit,
                    positive(limit.unwrap_or(DEFAULT_NOTIFICATIONS_LIMIT))?,
                );
                if let Some(updated_after) = updated_after {
                    params.set(NotificationsKey::UpdatedAfter, parse_date_arg(updated_after)?);
                }
                Request::Notifications(params)
            }
            Command::Categories => Request::Categories,
            Command::Category { id } => Request::Category(Identifier(*id)),
            Command::Currencies => Request::Currencies,
            Command::Currency { code } => Request::Currency(code.to_uppercase()),
        };
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ParamValue;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    #[test]
    fn test_parse_date_arg_rfc3339() {
        let date = parse_date_arg("2026-03-01T12:30:00Z").unwrap();
        assert_eq!(date, Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_date_arg_plain_date_is_local_midnight() {
        let date = parse_date_arg("2026-03-01").unwrap();
        let local = date.with_timezone(&Local);
        assert_eq!(local.date_naive(), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
    }

    #[test]
    fn test_parse_date_arg_invalid() {
        let err = parse_date_arg("yesterday").unwrap_err();
        assert!(err.to_string().contains("Invalid date"));
        assert!(err.to_string().contains("yesterday"));
    }

    #[test]
    fn test_cli_parse_expenses_flags() {
        let cli = Cli::parse_from([
            "splitstream",
            "expenses",
            "--group",
            "391",
            "--limit",
            "50",
            "--take",
            "10",
        ]);
        assert_eq!(cli.take, Some(10));
        assert!(matches!(
            cli.command,
            Command::Expenses {
                group: Some(391),
                limit: Some(50),
                ..
            }
        ));
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["splitstream", "currencies", "--json", "--token", "abc"]);
        assert!(cli.json);
        assert_eq!(cli.token.as_deref(), Some("abc"));
        assert_eq!(cli.command, Command::Currencies);
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["splitstream"]).is_err());
    }

    #[test]
    fn test_expenses_defaults() {
        let command = Command::Expenses {
            group: None,
            friend: None,
            after: None,
            before: None,
            limit: None,
            payments: false,
        };

        let request = Request::from_command(&command, 200, today()).unwrap();
        let Request::Expenses {
            params,
            include_payments,
        } = request
        else {
            panic!("expected an expenses request");
        };

        assert!(!include_payments);
        assert_eq!(params.get(ExpensesKey::Limit), Some(&ParamValue::Int(200)));
        assert_eq!(
            params.get(ExpensesKey::DatedAfter),
            start_of_year(today()).map(ParamValue::Date).as_ref()
        );
        assert!(params.get(ExpensesKey::GroupId).is_none());
        assert!(params.get(ExpensesKey::Offset).is_none());
    }

    #[test]
    fn test_expenses_filters() {
        let command = Command::Expenses {
            group: Some(391),
            friend: Some(7),
            after: Some("2025-01-01T00:00:00Z".to_string()),
            before: Some("2025-06-30T00:00:00Z".to_string()),
            limit: Some(50),
            payments: true,
        };

        let request = Request::from_command(&command, 200, today()).unwrap();
        let Request::Expenses { params, .. } = request else {
            panic!("expected an expenses request");
        };

        assert_eq!(params.get(ExpensesKey::GroupId), Some(&ParamValue::Int(391)));
        assert_eq!(params.get(ExpensesKey::FriendId), Some(&ParamValue::Int(7)));
        assert_eq!(params.get(ExpensesKey::Limit), Some(&ParamValue::Int(50)));
        assert_eq!(
            params.get(ExpensesKey::DatedBefore),
            Some(&ParamValue::Date(Utc.with_ymd_and_hms(2025, 6, 30, 0, 0, 0).unwrap()))
        );
    }

    #[test]
    fn test_expenses_invalid_date() {
        let command = Command::Expenses {
            group: None,
            friend: None,
            after: Some("not-a-date".to_string()),
            before: None,
            limit: None,
            payments: false,
        };
        assert!(matches!(
            Request::from_command(&command, 200, today()),
            Err(CliError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let command = Command::Notifications {
            limit: Some(0),
            updated_after: None,
        };
        assert!(matches!(
            Request::from_command(&command, 200, today()),
            Err(CliError::InvalidLimit(0))
        ));
    }

    #[test]
    fn test_notifications_default_limit() {
        let command = Command::Notifications {
            limit: None,
            updated_after: None,
        };
        let Request::Notifications(params) = Request::from_command(&command, 200, today()).unwrap()
        else {
            panic!("expected a notifications request");
        };
        assert_eq!(
            params.get(NotificationsKey::Limit),
            Some(&ParamValue::Int(DEFAULT_NOTIFICATIONS_LIMIT))
        );
    }

    #[test]
    fn test_reference_requests_use_the_cache() {
        assert!(Request::Currencies.uses_reference_data());
        assert!(Request::Category(Identifier(1)).uses_reference_data());
        assert!(!Request::Friends.uses_reference_data());
        assert!(!Request::Expense(Identifier(1)).uses_reference_data());
    }

    #[test]
    fn test_currency_code_is_uppercased() {
        let command = Command::Currency {
            code: "usd".to_string(),
        };
        assert_eq!(
            Request::from_command(&command, 200, today()).unwrap(),
            Request::Currency("USD".to_string())
        );
    }
}
