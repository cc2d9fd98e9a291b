//! Cancellable background producers for remote collections
//!
//! A [`ResultStream`] owns the receiving half of a single-slot channel. A
//! tokio task (the producer) fetches records through the remote capability
//! and hands them over one at a time, checking the stream's cancellation
//! token before every hand-off.
//!
//! ```text
//!   caller ──spawn──► producer task ──fetch──► SplitwiseApi
//!      ▲                    │
//!      └──── next() ◄── mpsc(1) ◄── push (cancel checked first)
//! ```
//!
//! A fetch failure never reaches the consumer as an item: it is logged, the
//! stream ends early, and the failure is kept for [`ResultStream::terminal_error`].

pub mod paginated;

use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, Instrument, Span};

use crate::api::ApiError;

pub use paginated::PaginationLimits;

/// Why a stream ended before the remote collection was exhausted
#[derive(Debug, Error)]
pub enum StreamError {
    /// The remote capability returned an error
    #[error("fetch failed: {0}")]
    Fetch(#[from] ApiError),

    /// The pagination safety bound was reached before an empty page
    #[error("page limit reached after {pages} pages")]
    PageLimitReached { pages: usize },
}

/// Cancellation and logging scope a producer runs under
#[derive(Debug, Clone)]
pub struct StreamContext {
    /// Parent token; each stream derives a child token from it
    pub cancel: CancellationToken,
    /// Span every producer log line is recorded under
    pub span: Span,
}

impl StreamContext {
    pub fn new(cancel: CancellationToken, span: Span) -> Self {
        Self { cancel, span }
    }
}

impl Default for StreamContext {
    fn default() -> Self {
        Self::new(CancellationToken::new(), Span::none())
    }
}

#[derive(Debug, Default)]
struct StreamState {
    closed: AtomicBool,
    error: Mutex<Option<Arc<StreamError>>>,
}

impl StreamState {
    fn set_error(&self, err: StreamError) {
        let mut slot = match self.error.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(Arc::new(err));
    }

    fn error(&self) -> Option<Arc<StreamError>> {
        match self.error.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Sequence of records produced in the background from one remote collection
///
/// Exactly one consumer may drain a stream. Records arrive in the order the
/// remote capability returned them.
#[derive(Debug)]
pub struct ResultStream<T> {
    rx: mpsc::Receiver<T>,
    cancel: CancellationToken,
    state: Arc<StreamState>,
}

/// Sending half held by the producer task
///
/// Dropping it marks the stream closed and then releases the channel, so a
/// consumer that sees the end of the sequence always observes `is_closed()`.
pub(crate) struct Producer<T> {
    tx: mpsc::Sender<T>,
    cancel: CancellationToken,
    state: Arc<StreamState>,
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        self.state.closed.store(true, Ordering::Release);
    }
}

impl<T: Send + 'static> Producer<T> {
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Hands one record to the consumer
    ///
    /// Returns `false` without sending when the stream was cancelled, or when
    /// the consumer went away.
    pub(crate) async fn push(&self, item: T) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            result = self.tx.send(item) => result.is_ok(),
        }
    }

    /// Runs one remote call, abandoning it if the stream is cancelled first
    pub(crate) async fn fetch<R, Fut>(&self, request: Fut) -> Option<Result<R, ApiError>>
    where
        Fut: Future<Output = Result<R, ApiError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = request => Some(result),
        }
    }

    /// Records the reason the stream ended early
    pub(crate) fn record(&self, err: StreamError) {
        self.state.set_error(err);
    }

    async fn run_once<F, Fut>(self, fetch: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, ApiError>>,
    {
        let records = match self.fetch(fetch()).await {
            Some(Ok(records)) => records,
            Some(Err(err)) => {
                error!("{}", err);
                self.record(StreamError::Fetch(err));
                return;
            }
            None => {
                debug!("stream cancelled during fetch");
                return;
            }
        };

        let total = records.len();
        for (sent, record) in records.into_iter().enumerate() {
            if !self.push(record).await {
                debug!("stream stopped after {} of {} records", sent, total);
                return;
            }
        }
        debug!("stream finished after {} records", total);
    }
}

impl<T: Send + 'static> ResultStream<T> {
    fn channel(ctx: &StreamContext) -> (Self, Producer<T>) {
        let (tx, rx) = mpsc::channel(1);
        let cancel = ctx.cancel.child_token();
        let state = Arc::new(StreamState::default());

        let stream = Self {
            rx,
            cancel: cancel.clone(),
            state: state.clone(),
        };
        let producer = Producer { tx, cancel, state };
        (stream, producer)
    }

    /// Starts a producer that performs a single fetch and emits its records
    ///
    /// Returns immediately; the fetch runs on a spawned tokio task. Must be
    /// called from within a tokio runtime.
    pub fn spawn<F, Fut>(ctx: &StreamContext, fetch: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<T>, ApiError>> + Send + 'static,
    {
        let (stream, producer) = Self::channel(ctx);
        tokio::spawn(producer.run_once(fetch).instrument(ctx.span.clone()));
        stream
    }

    /// Starts a producer that replays records already held in memory
    pub fn from_records(ctx: &StreamContext, records: Vec<T>) -> Self {
        Self::spawn(ctx, move || async move { Ok(records) })
    }

    /// Waits for the next record; `None` once the stream has ended
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Drains the whole stream into a vector
    pub async fn collect_all(mut self) -> Vec<T> {
        let mut records = Vec::new();
        while let Some(record) = self.rx.recv().await {
            records.push(record);
        }
        records
    }

    /// Cancels the producer and waits until it has let go of the stream
    ///
    /// Records still in flight are discarded. After this returns,
    /// `is_closed()` is true and `next()` yields `None`.
    pub async fn close(&mut self) {
        self.cancel.cancel();
        while self.rx.recv().await.is_some() {}
        self.state.closed.store(true, Ordering::Release);
    }
}

impl<T> ResultStream<T> {
    /// Whether the stream has ended, either by the producer finishing or by `close()`
    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::Acquire)
    }

    /// The failure that ended the stream early, if any
    pub fn terminal_error(&self) -> Option<Arc<StreamError>> {
        self.state.error()
    }
}

impl<T> Stream for ResultStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

impl<T> Drop for ResultStream<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
