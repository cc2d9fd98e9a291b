//! Offset-paginated producer
//!
//! Repeats a page fetch, advancing the offset parameter, until the remote
//! capability returns an empty page, a fetch fails, the consumer cancels, or
//! the page budget runs out.
//!
//! The offset sent with page `n + 1` is the caller's starting offset plus the
//! number of records emitted so far over the whole stream.

use std::future::Future;
use tracing::{debug, error, warn, Instrument};

use super::{Producer, ResultStream, StreamContext, StreamError};
use crate::api::{ApiError, OffsetKey, Params};

/// Default maximum number of pages fetched by one stream
pub const DEFAULT_MAX_PAGES: usize = 1000;

/// Safety bound for paginated streams
///
/// A remote that keeps returning full pages would otherwise keep the producer
/// looping forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationLimits {
    /// Maximum number of fetches per stream; `None` disables the bound
    pub max_pages: Option<usize>,
}

impl Default for PaginationLimits {
    fn default() -> Self {
        Self {
            max_pages: Some(DEFAULT_MAX_PAGES),
        }
    }
}

impl PaginationLimits {
    pub fn unbounded() -> Self {
        Self { max_pages: None }
    }

    pub fn max_pages(pages: usize) -> Self {
        Self {
            max_pages: Some(pages),
        }
    }
}

impl<T: Send + 'static> ResultStream<T> {
    /// Starts a producer that walks an offset-paginated endpoint
    ///
    /// `fetch` receives a copy of `params` with the offset for the page to load.
    pub fn paginated<K, F, Fut>(
        ctx: &StreamContext,
        fetch: F,
        params: Params<K>,
        limits: PaginationLimits,
    ) -> Self
    where
        K: OffsetKey,
        F: FnMut(Params<K>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<T>, ApiError>> + Send + 'static,
    {
        let (stream, producer) = Self::channel(ctx);
        tokio::spawn(
            run_paginated(producer, fetch, params, limits).instrument(ctx.span.clone()),
        );
        stream
    }
}

async fn run_paginated<T, K, F, Fut>(
    producer: Producer<T>,
    mut fetch: F,
    mut params: Params<K>,
    limits: PaginationLimits,
) where
    T: Send + 'static,
    K: OffsetKey,
    F: FnMut(Params<K>) -> Fut,
    Fut: Future<Output = Result<Vec<T>, ApiError>>,
{
    let start_offset = params.offset();
    let mut emitted: i64 = 0;
    let mut pages: usize = 0;

    while !producer.is_cancelled() {
        if let Some(max_pages) = limits.max_pages {
            if pages >= max_pages {
                warn!(
                    "stopping after {} pages at offset {}; remote never returned an empty page",
                    pages,
                    params.offset()
                );
                producer.record(StreamError::PageLimitReached { pages });
                break;
            }
        }

        debug!("fetching page {} at offset {}", pages + 1, params.offset());
        let page = match producer.fetch(fetch(params.clone())).await {
            Some(Ok(page)) => page,
            Some(Err(err)) => {
                error!("{}", err);
                producer.record(StreamError::Fetch(err));
                break;
            }
            None => {
                debug!("stream cancelled during page fetch");
                return;
            }
        };
        pages += 1;

        if page.is_empty() {
            debug!("empty page, {} records emitted over {} pages", emitted, pages);
            break;
        }

        for record in page {
            if !producer.push(record).await {
                debug!("stream stopped mid-page after {} records", emitted);
                return;
            }
            emitted += 1;
        }

        params.set_offset(start_offset + emitted);
    }
}
