//! Uniform, failure-tolerant access to the per-category evidence stores.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use pawtrip_core::{AppError, AppResult};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::types::{Category, EvidenceItem};
use crate::update_log::{UpdateEntry, UpdateLog};

/// Category → store name. `Conditions` is live-only and has no store.
pub fn store_name(category: Category) -> Option<&'static str> {
    match category {
        Category::Attractions => Some("pet_places"),
        Category::Lodging => Some("pet_lodging"),
        Category::Transit => Some("pet_transit_rules"),
        Category::Conditions => None,
    }
}

/// A set of named similarity indexes.
///
/// `search` returns `(item, distance)` pairs, smaller distance meaning
/// closer, in index order for equal distances.
#[async_trait::async_trait]
pub trait EvidenceStore: Send + Sync {
    async fn search(&self, store: &str, query: &str, k: usize)
        -> AppResult<Vec<(EvidenceItem, f32)>>;

    async fn add_items(&self, store: &str, items: &[EvidenceItem]) -> AppResult<usize>;

    async fn count(&self, store: &str) -> AppResult<usize>;

    async fn exists(&self, store: &str) -> bool;

    async fn reset(&self, store: &str) -> AppResult<()>;
}

/// Item count for one category's store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub category: Category,
    pub store_name: String,
    pub exists: bool,
    pub items: usize,
}

/// Wraps an [`EvidenceStore`] with category routing, weighting, timeouts
/// and per-store write serialization.
pub struct EvidenceGateway {
    store: Arc<dyn EvidenceStore>,
    weights: HashMap<Category, f32>,
    search_timeout: Duration,
    write_locks: HashMap<&'static str, Mutex<()>>,
    update_log: Option<Arc<UpdateLog>>,
}

impl EvidenceGateway {
    pub fn new(store: Arc<dyn EvidenceStore>, search_timeout: Duration) -> Self {
        let write_locks = Category::ALL
            .iter()
            .filter_map(|c| store_name(*c))
            .map(|name| (name, Mutex::new(())))
            .collect();

        Self {
            store,
            weights: HashMap::new(),
            search_timeout,
            write_locks,
            update_log: None,
        }
    }

    pub fn with_weights(mut self, weights: impl IntoIterator<Item = (Category, f32)>) -> Self {
        self.weights = weights.into_iter().collect();
        self
    }

    pub fn with_update_log(mut self, log: Arc<UpdateLog>) -> Self {
        self.update_log = Some(log);
        self
    }

    fn weight(&self, category: Category) -> f32 {
        self.weights.get(&category).copied().unwrap_or(1.0)
    }

    /// Ranked items for a category. Never fails.
    ///
    /// Unknown categories, missing indexes, search errors and timeouts all
    /// come back as an empty list with a warning.
    pub async fn search(&self, category: Category, query: &str, k: usize) -> Vec<(EvidenceItem, f32)> {
        let Some(store) = store_name(category) else {
            tracing::warn!(%category, "no evidence store for category");
            return Vec::new();
        };
        let k = k.max(1);

        let raw = match tokio::time::timeout(self.search_timeout, self.store.search(store, query, k)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                tracing::warn!(%category, store, error = %e, "evidence search failed");
                return Vec::new();
            }
            Err(_) => {
                let e = AppError::timeout(format!("search {}", store), self.search_timeout.as_secs());
                tracing::warn!(%category, store, error = %e, "evidence search timed out");
                return Vec::new();
            }
        };

        let weight = self.weight(category);
        let total = raw.len();
        let mut ranked: Vec<(EvidenceItem, f32)> = raw
            .into_iter()
            .map(|(item, distance)| (item, (1.0 - distance) * weight))
            .filter(|(_, relevance)| relevance.is_finite())
            .collect();
        if ranked.len() < total {
            tracing::warn!(%category, store, dropped = total - ranked.len(), "dropped hits with non-finite relevance");
        }

        // sort_by is stable: equal relevance keeps index order.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(k);

        tracing::debug!(%category, store, hits = ranked.len(), k, "evidence search");
        ranked
    }

    /// Write items into a category's store, one writer per store at a time.
    pub async fn write(&self, category: Category, items: &[EvidenceItem]) -> AppResult<usize> {
        let store = store_name(category)
            .ok_or_else(|| AppError::Store(format!("category {} has no evidence store", category)))?;
        let lock = self
            .write_locks
            .get(store)
            .ok_or_else(|| AppError::Store(format!("no write lock for store {}", store)))?;

        let _guard = lock.lock().await;
        self.store.add_items(store, items).await
    }

    /// Write externally fetched items and record the update.
    pub async fn persist_external(&self, category: Category, items: &[EvidenceItem]) -> AppResult<usize> {
        let added = self.write(category, items).await?;

        if let (Some(log), Some(store)) = (&self.update_log, store_name(category)) {
            if let Err(e) = log.append(UpdateEntry::external(category, store, added)).await {
                tracing::warn!(error = %e, "failed to record store update");
            }
        }

        tracing::info!(%category, added, "persisted external items");
        Ok(added)
    }

    pub async fn reset(&self, category: Category) -> AppResult<()> {
        let store = store_name(category)
            .ok_or_else(|| AppError::Store(format!("category {} has no evidence store", category)))?;
        self.store.reset(store).await
    }

    /// Counts for every category that has a store.
    pub async fn stats(&self) -> AppResult<Vec<StoreStats>> {
        let mut out = Vec::new();
        for category in Category::ALL {
            let Some(store) = store_name(category) else {
                continue;
            };
            out.push(StoreStats {
                category,
                store_name: store.to_string(),
                exists: self.store.exists(store).await,
                items: self.store.count(store).await?,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn item(title: &str) -> EvidenceItem {
        EvidenceItem::indexed(
            format!("{} 설명", title),
            json!({ "title": title }).as_object().cloned().unwrap_or_else(Map::new),
        )
    }

    /// Returns fixed hits for `pet_places`, fails for everything else.
    struct FixedStore {
        hits: Vec<(EvidenceItem, f32)>,
        writes: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl EvidenceStore for FixedStore {
        async fn search(&self, store: &str, _q: &str, _k: usize) -> AppResult<Vec<(EvidenceItem, f32)>> {
            if store == "pet_places" {
                Ok(self.hits.clone())
            } else {
                Err(AppError::Store("index not found".to_string()))
            }
        }

        async fn add_items(&self, _store: &str, items: &[EvidenceItem]) -> AppResult<usize> {
            self.writes.fetch_add(items.len(), Ordering::SeqCst);
            Ok(items.len())
        }

        async fn count(&self, _store: &str) -> AppResult<usize> {
            Ok(self.writes.load(Ordering::SeqCst))
        }

        async fn exists(&self, store: &str) -> bool {
            store == "pet_places"
        }

        async fn reset(&self, _store: &str) -> AppResult<()> {
            Ok(())
        }
    }

    fn gateway(hits: Vec<(EvidenceItem, f32)>) -> EvidenceGateway {
        EvidenceGateway::new(
            Arc::new(FixedStore {
                hits,
                writes: AtomicUsize::new(0),
            }),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_store_table() {
        assert_eq!(store_name(Category::Attractions), Some("pet_places"));
        assert_eq!(store_name(Category::Lodging), Some("pet_lodging"));
        assert_eq!(store_name(Category::Transit), Some("pet_transit_rules"));
        assert_eq!(store_name(Category::Conditions), None);
    }

    #[tokio::test]
    async fn test_relevance_sorted_and_truncated() {
        let gw = gateway(vec![(item("a"), 0.6), (item("b"), 0.1), (item("c"), 0.3)]);
        let results = gw.search(Category::Attractions, "q", 2).await;

        let titles: Vec<_> = results.iter().map(|(i, _)| i.title().unwrap_or("")).collect();
        assert_eq!(titles, vec!["b", "c"]);
        assert!((results[0].1 - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_ties_keep_index_order() {
        let gw = gateway(vec![(item("x"), 0.2), (item("y"), 0.2), (item("z"), 0.2)]);
        let titles: Vec<_> = gw
            .search(Category::Attractions, "q", 3)
            .await
            .into_iter()
            .map(|(i, _)| i.title().unwrap_or("").to_string())
            .collect();
        assert_eq!(titles, vec!["x", "y", "z"]);
    }

    #[tokio::test]
    async fn test_weight_scales_relevance() {
        let gw = gateway(vec![(item("a"), 0.5)]).with_weights([(Category::Attractions, 2.0)]);
        let results = gw.search(Category::Attractions, "q", 1).await;
        assert!((results[0].1 - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_k_is_clamped_to_one() {
        let gw = gateway(vec![(item("a"), 0.1), (item("b"), 0.2)]);
        assert_eq!(gw.search(Category::Attractions, "q", 0).await.len(), 1);
    }

    #[tokio::test]
    async fn test_failures_and_unmapped_are_empty() {
        let gw = gateway(vec![(item("a"), 0.1)]);
        assert!(gw.search(Category::Lodging, "q", 4).await.is_empty());
        assert!(gw.search(Category::Conditions, "q", 4).await.is_empty());
    }

    #[tokio::test]
    async fn test_search_timeout_is_empty() {
        struct SlowStore;

        #[async_trait::async_trait]
        impl EvidenceStore for SlowStore {
            async fn search(&self, _s: &str, _q: &str, _k: usize) -> AppResult<Vec<(EvidenceItem, f32)>> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Vec::new())
            }
            async fn add_items(&self, _s: &str, _i: &[EvidenceItem]) -> AppResult<usize> {
                Ok(0)
            }
            async fn count(&self, _s: &str) -> AppResult<usize> {
                Ok(0)
            }
            async fn exists(&self, _s: &str) -> bool {
                false
            }
            async fn reset(&self, _s: &str) -> AppResult<()> {
                Ok(())
            }
        }

        let gw = EvidenceGateway::new(Arc::new(SlowStore), Duration::from_millis(20));
        assert!(gw.search(Category::Attractions, "q", 4).await.is_empty());
    }

    #[tokio::test]
    async fn test_persist_external_logs_update() {
        let temp = tempfile::TempDir::new().unwrap();
        let log = Arc::new(UpdateLog::new(temp.path().join("updates.json")));
        let gw = gateway(Vec::new()).with_update_log(log.clone());

        let added = gw
            .persist_external(Category::Lodging, &[item("펜션")])
            .await
            .unwrap();
        assert_eq!(added, 1);

        let history = log.history(Some(Category::Lodging), 10).await.unwrap();
        assert_eq!(history[0].store_name, "pet_lodging");
        assert_eq!(history[0].items_added, 1);
    }

    #[tokio::test]
    async fn test_nan_hits_are_dropped_and_rest_ranked() {
        let hits = (0..30)
            .map(|i| {
                let distance = if i % 3 == 0 { f32::NAN } else { (i as f32) / 100.0 };
                (item(&format!("p{}", i)), distance)
            })
            .collect();
        let gw = gateway(hits);

        let results = gw.search(Category::Attractions, "q", 30).await;
        assert_eq!(results.len(), 20);
        assert!(results.iter().all(|(_, r)| r.is_finite()));
        assert!(results.windows(2).all(|w| w[0].1 >= w[1].1));
        assert_eq!(results[0].0.title(), Some("p1"));
    }

    /// Tracks how many `add_items` calls are in flight at once, per store
    /// and overall.
    #[derive(Default)]
    struct ConcurrencyStore {
        active: std::sync::Mutex<HashMap<String, usize>>,
        in_flight: AtomicUsize,
        peak_same_store: AtomicUsize,
        peak_total: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl EvidenceStore for ConcurrencyStore {
        async fn search(&self, _s: &str, _q: &str, _k: usize) -> AppResult<Vec<(EvidenceItem, f32)>> {
            Ok(Vec::new())
        }

        async fn add_items(&self, store: &str, items: &[EvidenceItem]) -> AppResult<usize> {
            let same = {
                let mut active = self.active.lock().unwrap();
                let n = active.entry(store.to_string()).or_insert(0);
                *n += 1;
                *n
            };
            let total = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_same_store.fetch_max(same, Ordering::SeqCst);
            self.peak_total.fetch_max(total, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(30)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if let Some(n) = self.active.lock().unwrap().get_mut(store) {
                *n -= 1;
            }
            Ok(items.len())
        }

        async fn count(&self, _s: &str) -> AppResult<usize> {
            Ok(0)
        }

        async fn exists(&self, _s: &str) -> bool {
            true
        }

        async fn reset(&self, _s: &str) -> AppResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_writes_to_one_store_never_overlap() {
        let store = Arc::new(ConcurrencyStore::default());
        let gw = EvidenceGateway::new(store.clone(), Duration::from_secs(5));
        let items = [item("펜션")];

        let (a, b, c) = tokio::join!(
            gw.write(Category::Lodging, &items),
            gw.write(Category::Lodging, &items),
            gw.write(Category::Lodging, &items),
        );
        assert_eq!(a.unwrap() + b.unwrap() + c.unwrap(), 3);
        assert_eq!(store.peak_same_store.load(Ordering::SeqCst), 1);
        assert_eq!(store.peak_total.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_writes_to_different_stores_may_overlap() {
        let store = Arc::new(ConcurrencyStore::default());
        let gw = EvidenceGateway::new(store.clone(), Duration::from_secs(5));
        let items = [item("해변")];

        let (a, b) = tokio::join!(
            gw.write(Category::Lodging, &items),
            gw.write(Category::Attractions, &items),
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(store.peak_same_store.load(Ordering::SeqCst), 1);
        assert_eq!(store.peak_total.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_write_to_conditions_is_error() {
        let gw = gateway(Vec::new());
        assert!(gw.write(Category::Conditions, &[item("x")]).await.is_err());
    }

    #[tokio::test]
    async fn test_stats_cover_mapped_categories() {
        let gw = gateway(Vec::new());
        let stats = gw.stats().await.unwrap();
        assert_eq!(stats.len(), 3);
        assert!(stats[0].exists);
        assert!(!stats[1].exists);
    }
}
