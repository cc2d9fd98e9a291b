//! splitstream library
//!
//! Streams records from the Splitwise API. A [`Connection`] hands out
//! [`ResultStream`]s that a background task fills one record at a time, walks
//! offset-paginated collections until an empty page, and serves categories
//! and currencies from a process-wide [`ReferenceCache`].

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod output;
pub mod resources;
pub mod stream;

#[cfg(test)]
mod test_support;

pub use api::{ApiError, SplitwiseApi, SplitwiseClient};
pub use cache::ReferenceCache;
pub use connection::Connection;
pub use error::GatewayError;
pub use stream::{PaginationLimits, ResultStream, StreamContext, StreamError};
