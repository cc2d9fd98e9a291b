//! Process-wide cache of categories and currencies
//!
//! Both collections are small and practically static, and are looked up by
//! key far more often than they change. Each store is filled once, on first
//! access, by draining a one-shot [`ResultStream`]; afterwards every access
//! is served from memory.
//!
//! Filling is not atomic: two callers that both see an empty store each run
//! a fill, and both write the same records under the same keys.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use super::SnapshotStore;
use crate::api::{ApiError, SplitwiseApi};
use crate::error::GatewayError;
use crate::resources::{Currency, Identifier, Keyed, MainCategory};
use crate::stream::{ResultStream, StreamContext};

static GLOBAL: OnceLock<Arc<ReferenceCache>> = OnceLock::new();

/// Keyed store for one cached resource kind
#[derive(Debug)]
struct KeyedStore<T: Keyed> {
    entries: RwLock<HashMap<T::Key, T>>,
}

impl<T: Keyed + Clone> KeyedStore<T> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<T::Key, T>> {
        match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<T::Key, T>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn len(&self) -> usize {
        self.read().len()
    }

    fn get(&self, key: &T::Key) -> Option<T> {
        self.read().get(key).cloned()
    }

    /// Current contents, in map order
    fn values(&self) -> Vec<T> {
        self.read().values().cloned().collect()
    }

    fn insert(&self, record: T) {
        self.write().insert(record.key(), record);
    }
}

/// Cache of the two reference collections shared by every connection
///
/// Entries are never updated or evicted once loaded.
#[derive(Debug)]
pub struct ReferenceCache {
    categories: KeyedStore<MainCategory>,
    currencies: KeyedStore<Currency>,
    snapshots: Option<SnapshotStore>,
}

impl Default for ReferenceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceCache {
    /// Creates an empty, memory-only cache
    pub fn new() -> Self {
        Self {
            categories: KeyedStore::new(),
            currencies: KeyedStore::new(),
            snapshots: None,
        }
    }

    /// Creates an empty cache that fills from, and saves to, on-disk snapshots
    pub fn with_snapshots(snapshots: SnapshotStore) -> Self {
        Self {
            snapshots: Some(snapshots),
            ..Self::new()
        }
    }

    /// The process-wide cache, created empty on first use
    pub fn global() -> Arc<ReferenceCache> {
        GLOBAL.get_or_init(|| Arc::new(ReferenceCache::new())).clone()
    }

    /// Installs `cache` as the process-wide cache unless one already exists
    ///
    /// Returns whichever cache is global afterwards.
    pub fn install_global(cache: ReferenceCache) -> Arc<ReferenceCache> {
        GLOBAL.get_or_init(|| Arc::new(cache)).clone()
    }

    pub fn len_categories(&self) -> usize {
        self.categories.len()
    }

    pub fn len_currencies(&self) -> usize {
        self.currencies.len()
    }

    /// Streams every main category, filling the store first if it is empty
    pub async fn main_categories(
        &self,
        api: Arc<dyn SplitwiseApi>,
        ctx: &StreamContext,
    ) -> ResultStream<MainCategory> {
        if self.categories.is_empty() {
            self.fill_categories(api, ctx).await;
        }
        ResultStream::from_records(ctx, self.categories.values())
    }

    /// Looks up one main category by id
    pub async fn main_category(
        &self,
        api: Arc<dyn SplitwiseApi>,
        ctx: &StreamContext,
        id: Identifier,
    ) -> Result<MainCategory, GatewayError> {
        if self.categories.is_empty() {
            self.fill_categories(api, ctx).await;
        }
        self.categories
            .get(&id)
            .ok_or_else(|| GatewayError::not_found(MainCategory::KIND, id))
    }

    /// Streams every currency, filling the store first if it is empty
    pub async fn currencies(
        &self,
        api: Arc<dyn SplitwiseApi>,
        ctx: &StreamContext,
    ) -> ResultStream<Currency> {
        if self.currencies.is_empty() {
            self.fill_currencies(api, ctx).await;
        }
        ResultStream::from_records(ctx, self.currencies.values())
    }

    /// Looks up one currency by its ISO code
    pub async fn currency(
        &self,
        api: Arc<dyn SplitwiseApi>,
        ctx: &StreamContext,
        code: &str,
    ) -> Result<Currency, GatewayError> {
        if self.currencies.is_empty() {
            self.fill_currencies(api, ctx).await;
        }
        self.currencies
            .get(&code.to_string())
            .ok_or_else(|| GatewayError::not_found(Currency::KIND, code))
    }

    /// Fills any empty store and reports `(currencies, categories)` counts
    pub async fn warm(&self, api: Arc<dyn SplitwiseApi>, ctx: &StreamContext) -> (usize, usize) {
        if self.currencies.is_empty() {
            self.fill_currencies(api.clone(), ctx).await;
        }
        if self.categories.is_empty() {
            self.fill_categories(api, ctx).await;
        }
        (self.len_currencies(), self.len_categories())
    }

    async fn fill_categories(&self, api: Arc<dyn SplitwiseApi>, ctx: &StreamContext) {
        let fetch = move || async move { api.get_categories().await };
        self.fill(&self.categories, "categories", ctx, fetch).await;
    }

    async fn fill_currencies(&self, api: Arc<dyn SplitwiseApi>, ctx: &StreamContext) {
        let fetch = move || async move { api.get_currencies().await };
        self.fill(&self.currencies, "currencies", ctx, fetch).await;
    }

    /// Populates `store` from a fresh snapshot or, failing that, from the API
    ///
    /// Records are committed only when the fetch finished cleanly. A failed or
    /// cancelled fetch leaves the store empty so that the next access retries.
    async fn fill<T, F, Fut>(
        &self,
        store: &KeyedStore<T>,
        name: &str,
        ctx: &StreamContext,
        fetch: F,
    ) where
        T: Keyed + Clone + Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<T>, ApiError>> + Send + 'static,
    {
        if let Some(snapshots) = &self.snapshots {
            match snapshots.read_fresh::<Vec<T>>(name) {
                Some(records) if !records.is_empty() => {
                    debug!("filling {} cache from snapshot", name);
                    for record in records {
                        store.insert(record);
                    }
                    info!("{} cache loaded with {} values", name, store.len());
                    return;
                }
                Some(_) => debug!("ignoring empty {} snapshot", name),
                None => {}
            }
        }

        let mut stream = ResultStream::spawn(ctx, fetch);
        let mut fetched = Vec::new();
        while let Some(record) = stream.next().await {
            fetched.push(record);
        }

        if stream.terminal_error().is_some() {
            warn!("{} cache left empty after failed fetch", name);
            return;
        }
        if ctx.cancel.is_cancelled() {
            debug!("{} cache fill cancelled after {} values", name, fetched.len());
            return;
        }

        for record in &fetched {
            store.insert(record.clone());
        }
        info!("{} cache loaded with {} values", name, store.len());

        if fetched.is_empty() {
            return;
        }
        if let Some(snapshots) = &self.snapshots {
            if let Err(e) = snapshots.write(name, &fetched) {
                warn!("failed to write {} snapshot: {}", name, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{capture_logs, category, currency, StubApi};
    use std::collections::HashSet;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn setup(api: StubApi) -> (ReferenceCache, Arc<StubApi>, StreamContext) {
        (ReferenceCache::new(), Arc::new(api), StreamContext::default())
    }

    fn codes(records: &[Currency]) -> HashSet<String> {
        records.iter().map(|c| c.currency_code.clone()).collect()
    }

    #[tokio::test]
    async fn test_lookup_on_empty_cache_fills_once() {
        let (cache, api, ctx) = setup(StubApi::with_reference_data());

        let usd = cache.currency(api.clone(), &ctx, "USD").await.unwrap();
        assert_eq!(usd.unit, "$");
        assert_eq!(api.calls.currencies.load(Ordering::SeqCst), 1);

        let eur = cache.currency(api.clone(), &ctx, "EUR").await.unwrap();
        assert_eq!(eur.unit, "€");
        assert_eq!(api.calls.currencies.load(Ordering::SeqCst), 1);
        assert_eq!(api.calls.categories.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_absent_currency_is_not_found_before_and_after_fill() {
        let (cache, api, ctx) = setup(StubApi::with_reference_data());

        let err = cache.currency(api.clone(), &ctx, "US").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound { kind: "currency", .. }));
        assert_eq!(cache.len_currencies(), 3);

        let err = cache.currency(api.clone(), &ctx, "US").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound { .. }));
        assert_eq!(api.calls.currencies.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_category_zero_is_never_present() {
        let (cache, api, ctx) = setup(StubApi::with_reference_data());

        let utilities = cache.main_category(api.clone(), &ctx, Identifier(1)).await.unwrap();
        assert_eq!(utilities.name, "Utilities");

        let err = cache.main_category(api.clone(), &ctx, Identifier(0)).await.unwrap_err();
        assert_eq!(err.to_string(), "category '0' not found");
    }

    #[tokio::test]
    async fn test_get_all_twice_issues_one_fetch() {
        let (cache, api, ctx) = setup(StubApi::with_reference_data());

        let first = cache.currencies(api.clone(), &ctx).await.collect_all().await;
        let second = cache.currencies(api.clone(), &ctx).await.collect_all().await;

        assert_eq!(api.calls.currencies.load(Ordering::SeqCst), 1);
        assert_eq!(first.len(), 3);
        assert_eq!(codes(&first), codes(&second));
    }

    #[tokio::test]
    async fn test_failed_fill_leaves_store_empty_and_retries() {
        let (cache, api, ctx) = setup(StubApi::failing());
        let logs = capture_logs();

        let records = cache.main_categories(api.clone(), &ctx).await.collect_all().await;
        assert!(records.is_empty());
        assert_eq!(cache.len_categories(), 0);
        assert_eq!(logs.errors(), 1);

        let err = cache.main_category(api.clone(), &ctx, Identifier(1)).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound { .. }));
        assert_eq!(api.calls.categories.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_fills_merge_idempotently() {
        let (cache, api, ctx) = setup(StubApi::with_reference_data());

        let (a, b) = tokio::join!(
            cache.currencies(api.clone(), &ctx),
            cache.currencies(api.clone(), &ctx)
        );
        let (a, b) = tokio::join!(a.collect_all(), b.collect_all());

        assert_eq!(codes(&a), codes(&b));
        assert_eq!(cache.len_currencies(), 3);
        let fills = api.calls.currencies.load(Ordering::SeqCst);
        assert!((1..=2).contains(&fills));
    }

    #[tokio::test]
    async fn test_warm_fills_both_stores() {
        let (cache, api, ctx) = setup(StubApi::with_reference_data());

        assert_eq!(cache.warm(api.clone(), &ctx).await, (3, 3));
        assert_eq!(cache.warm(api.clone(), &ctx).await, (3, 3));
        assert_eq!(api.calls.currencies.load(Ordering::SeqCst), 1);
        assert_eq!(api.calls.categories.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fill_writes_and_reuses_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let snapshots = SnapshotStore::with_dir(temp_dir.path().to_path_buf(), 24);
        let ctx = StreamContext::default();

        let api = Arc::new(StubApi::with_reference_data());
        let first = ReferenceCache::with_snapshots(snapshots.clone());
        first.currency(api.clone(), &ctx, "USD").await.unwrap();
        assert!(temp_dir.path().join("currencies.json").exists());

        // A new process with an API that would fail still fills from disk
        let offline = Arc::new(StubApi::failing());
        let second = ReferenceCache::with_snapshots(snapshots);
        let ars = second.currency(offline.clone(), &ctx, "ARS").await.unwrap();
        assert_eq!(ars.unit, "$");
        assert_eq!(offline.calls.currencies.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_snapshot_falls_back_to_api() {
        let temp_dir = TempDir::new().unwrap();
        let snapshots = SnapshotStore::with_dir(temp_dir.path().to_path_buf(), 0);
        snapshots
            .write("categories", &vec![category(7, "Stale")])
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));

        let api = Arc::new(StubApi::with_reference_data());
        let cache = ReferenceCache::with_snapshots(snapshots);
        let ctx = StreamContext::default();

        let err = cache.main_category(api.clone(), &ctx, Identifier(7)).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(api.calls.categories.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_fill_is_not_committed_or_snapshotted() {
        let dir = TempDir::new().unwrap();
        let snapshots = SnapshotStore::with_dir(dir.path().to_path_buf(), 24);

        let cancelled = StreamContext::default();
        cancelled.cancel.cancel();
        let api = Arc::new(StubApi::with_reference_data());
        let cache = ReferenceCache::with_snapshots(snapshots.clone());

        let err = cache.currency(api.clone(), &cancelled, "USD").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(cache.len_currencies(), 0);
        assert!(snapshots.read::<Vec<Currency>>("currencies").is_none());

        // The same cache retries once the context is live
        let ctx = StreamContext::default();
        assert_eq!(cache.currency(api.clone(), &ctx, "USD").await.unwrap().unit, "$");

        // A new process reads the snapshot written by the clean fill
        let fresh_api = Arc::new(StubApi::with_reference_data());
        let next = ReferenceCache::with_snapshots(snapshots);
        assert_eq!(next.currency(fresh_api.clone(), &ctx, "EUR").await.unwrap().unit, "€");
        assert_eq!(fresh_api.calls.currencies.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_snapshot_falls_back_to_api() {
        let dir = TempDir::new().unwrap();
        let snapshots = SnapshotStore::with_dir(dir.path().to_path_buf(), 24);
        snapshots.write("currencies", &Vec::<Currency>::new()).unwrap();

        let api = Arc::new(StubApi::with_reference_data());
        let cache = ReferenceCache::with_snapshots(snapshots);
        let ctx = StreamContext::default();

        assert_eq!(cache.currency(api.clone(), &ctx, "USD").await.unwrap().unit, "$");
        assert_eq!(api.calls.currencies.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_remote_collection_writes_no_snapshot() {
        let dir = TempDir::new().unwrap();
        let snapshots = SnapshotStore::with_dir(dir.path().to_path_buf(), 24);
        let api = Arc::new(StubApi::default());
        let cache = ReferenceCache::with_snapshots(snapshots.clone());

        let records = cache
            .currencies(api.clone(), &StreamContext::default())
            .await
            .collect_all()
            .await;
        assert!(records.is_empty());
        assert!(snapshots.read::<Vec<Currency>>("currencies").is_none());
    }

    #[test]
    fn test_keyed_store_overwrites_same_key() {
        let store: KeyedStore<Currency> = KeyedStore::new();
        store.insert(currency("USD", "$"));
        store.insert(currency("USD", "US$"));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&"USD".to_string()).unwrap().unit, "US$");
    }

    #[test]
    fn test_global_is_shared() {
        let a = ReferenceCache::global();
        let b = ReferenceCache::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
