//! Fills thin categories with records from an external place source.

mod tour_api;

pub use tour_api::PetTourClient;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use pawtrip_core::{AppError, AppResult};
use serde_json::{Map, Value};

use crate::gateway::EvidenceGateway;
use crate::types::{present, Category, EvidenceItem, Intent, PlaceRecord};

/// Which external listing serves a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetcher {
    PetTourAttractions,
    /// Same listing, filtered by lodging keywords
    PetTourLodging,
}

/// Category → fetcher. Transit and conditions have none.
pub fn fetcher_for(category: Category) -> Option<Fetcher> {
    match category {
        Category::Attractions => Some(Fetcher::PetTourAttractions),
        Category::Lodging => Some(Fetcher::PetTourLodging),
        Category::Transit | Category::Conditions => None,
    }
}

/// Supplies raw place records for a category.
#[async_trait::async_trait]
pub trait ExternalSource: Send + Sync {
    async fn fetch(&self, category: Category, intent: &Intent, max_count: usize) -> AppResult<Vec<PlaceRecord>>;
}

/// Drop records whose id or title is already known.
///
/// Blank keys count as absent; a record with neither key is always kept.
pub fn dedupe(records: Vec<PlaceRecord>, titles: &HashSet<String>, ids: &HashSet<String>) -> Vec<PlaceRecord> {
    records
        .into_iter()
        .filter(|record| {
            let id_known = record.id_key().is_some_and(|id| ids.contains(id));
            let title_known = record.title_key().is_some_and(|t| titles.contains(t));
            !id_known && !title_known
        })
        .collect()
}

/// Turn a record into an external evidence item.
///
/// Content lists the present fields in a fixed order; metadata keeps the
/// raw fields plus provenance.
pub fn to_evidence(record: PlaceRecord, category: Category, fetch_time: DateTime<Local>) -> EvidenceItem {
    let mut lines = Vec::with_capacity(4);
    if let Some(title) = present(&record.title) {
        lines.push(format!("**{}**", title));
    }
    if let Some(address) = present(&record.address) {
        lines.push(format!("주소: {}", address));
    }
    if let Some(contact) = present(&record.contact) {
        lines.push(format!("연락처: {}", contact));
    }
    if let Some(note) = present(&record.pet_note) {
        lines.push(format!("반려동물 정보: {}", note));
    }

    let title = record.title_key().map(str::to_string);
    let external_id = record.id_key().map(str::to_string);

    let mut metadata = match serde_json::to_value(&record) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    metadata.insert("data_source".into(), Value::from("external_api"));
    metadata.insert("fetch_time".into(), Value::from(fetch_time.to_rfc3339()));
    metadata.insert("category".into(), Value::from(category.as_str()));

    EvidenceItem::external(lines.join("\n"), metadata, title, external_id)
}

/// Metadata added when an item is written back to its index.
fn enrichment(item: &EvidenceItem, query: &str, now: DateTime<Local>) -> Map<String, Value> {
    let has_pet_info = item
        .metadata()
        .get("pet_info")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty());

    let mut extra = Map::new();
    extra.insert("original_query".into(), Value::from(query));
    extra.insert("added_timestamp".into(), Value::from(now.to_rfc3339()));
    extra.insert("content_length".into(), Value::from(item.char_len()));
    extra.insert("has_pet_info".into(), Value::from(has_pet_info));
    extra
}

/// Fetch, dedupe, convert and optionally persist supplementary items.
pub struct Augmenter {
    source: Arc<dyn ExternalSource>,
    gateway: Arc<EvidenceGateway>,
    max_external_results: usize,
    enable_persistence: bool,
    fetch_timeout: Duration,
}

impl Augmenter {
    pub fn new(source: Arc<dyn ExternalSource>, gateway: Arc<EvidenceGateway>) -> Self {
        Self {
            source,
            gateway,
            max_external_results: 30,
            enable_persistence: true,
            fetch_timeout: Duration::from_secs(15),
        }
    }

    pub fn with_max_external_results(mut self, max: usize) -> Self {
        self.max_external_results = max;
        self
    }

    pub fn with_persistence(mut self, enabled: bool) -> Self {
        self.enable_persistence = enabled;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Up to `shortfall` new items for `category`, in source order.
    ///
    /// Never fails: fetch errors and timeouts yield an empty list, and
    /// persistence errors are logged without affecting the result.
    pub async fn augment(
        &self,
        category: Category,
        intent: &Intent,
        existing: &[EvidenceItem],
        shortfall: usize,
        query: &str,
    ) -> Vec<EvidenceItem> {
        if shortfall == 0 {
            return Vec::new();
        }
        if fetcher_for(category).is_none() {
            tracing::debug!(%category, "no external fetcher registered");
            return Vec::new();
        }

        let titles: HashSet<String> = existing
            .iter()
            .filter_map(|i| i.title())
            .map(str::to_string)
            .collect();
        let ids: HashSet<String> = existing
            .iter()
            .filter_map(|i| i.external_id())
            .map(str::to_string)
            .collect();

        let records = match self.fetch(category, intent).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(%category, error = %e, "external fetch failed");
                return Vec::new();
            }
        };
        let fetched = records.len();

        let now = Local::now();
        let items: Vec<EvidenceItem> = dedupe(records, &titles, &ids)
            .into_iter()
            .take(shortfall)
            .map(|record| to_evidence(record, category, now))
            .collect();

        tracing::info!(%category, fetched, kept = items.len(), shortfall, "augmented category");

        if self.enable_persistence && !items.is_empty() {
            let enriched: Vec<EvidenceItem> = items
                .iter()
                .map(|item| item.with_metadata(enrichment(item, query, now)))
                .collect();
            if let Err(e) = self.gateway.persist_external(category, &enriched).await {
                tracing::error!(%category, error = %e, "failed to persist external items");
            }
        }

        items
    }

    async fn fetch(&self, category: Category, intent: &Intent) -> AppResult<Vec<PlaceRecord>> {
        tokio::time::timeout(
            self.fetch_timeout,
            self.source.fetch(category, intent, self.max_external_results),
        )
        .await
        .map_err(|_| AppError::timeout(format!("external fetch {}", category), self.fetch_timeout.as_secs()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::EvidenceStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn set(values: &[&str]) -> HashSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn record(title: Option<&str>, id: Option<&str>) -> PlaceRecord {
        PlaceRecord {
            title: title.map(str::to_string),
            content_id: id.map(str::to_string),
            ..PlaceRecord::default()
        }
    }

    #[test]
    fn test_fetcher_table() {
        assert_eq!(fetcher_for(Category::Attractions), Some(Fetcher::PetTourAttractions));
        assert_eq!(fetcher_for(Category::Lodging), Some(Fetcher::PetTourLodging));
        assert_eq!(fetcher_for(Category::Transit), None);
        assert_eq!(fetcher_for(Category::Conditions), None);
    }

    #[test]
    fn test_dedupe_by_title() {
        let kept = dedupe(
            vec![record(Some("A"), None), record(Some("C"), None), record(None, None)],
            &set(&["A", "B"]),
            &HashSet::new(),
        );
        let titles: Vec<Option<&str>> = kept.iter().map(|r| r.title_key()).collect();
        assert_eq!(titles, vec![Some("C"), None]);
    }

    #[test]
    fn test_dedupe_drops_when_either_key_matches() {
        let kept = dedupe(
            vec![
                record(Some("새 이름"), Some("100")),
                record(Some("A"), Some("200")),
                record(Some("D"), Some("300")),
            ],
            &set(&["A"]),
            &set(&["100"]),
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title_key(), Some("D"));
    }

    #[test]
    fn test_conversion_field_order() {
        let record = PlaceRecord {
            title: Some("속초 펫 리조트".to_string()),
            address: Some("강원 속초시".to_string()),
            contact: Some(" ".to_string()),
            pet_note: Some("소형견 동반 가능".to_string()),
            content_id: Some("42".to_string()),
            ..PlaceRecord::default()
        };

        let item = to_evidence(record, Category::Lodging, Local::now());
        assert_eq!(
            item.content(),
            "**속초 펫 리조트**\n주소: 강원 속초시\n반려동물 정보: 소형견 동반 가능"
        );
        assert_eq!(item.external_id(), Some("42"));
        assert_eq!(item.metadata()["data_source"], "external_api");
        assert_eq!(item.metadata()["category"], "lodging");
        assert_eq!(item.metadata()["addr1"], "강원 속초시");
        assert!(item.metadata().contains_key("fetch_time"));
    }

    struct ListSource {
        records: Vec<PlaceRecord>,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ExternalSource for ListSource {
        async fn fetch(&self, _c: Category, _i: &Intent, max: usize) -> AppResult<Vec<PlaceRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.records.iter().take(max).cloned().collect())
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        written: Mutex<Vec<EvidenceItem>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl EvidenceStore for RecordingStore {
        async fn search(&self, _s: &str, _q: &str, _k: usize) -> AppResult<Vec<(EvidenceItem, f32)>> {
            Ok(Vec::new())
        }
        async fn add_items(&self, _s: &str, items: &[EvidenceItem]) -> AppResult<usize> {
            if self.fail {
                return Err(AppError::Store("disk full".to_string()));
            }
            let mut written = self.written.lock().map_err(|_| AppError::Other("poisoned".into()))?;
            written.extend_from_slice(items);
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

    fn augmenter(records: Vec<PlaceRecord>, store: Arc<RecordingStore>) -> (Augmenter, Arc<ListSource>) {
        let source = Arc::new(ListSource {
            records,
            calls: AtomicUsize::new(0),
        });
        let gateway = Arc::new(EvidenceGateway::new(store, Duration::from_secs(5)));
        (Augmenter::new(source.clone(), gateway), source)
    }

    #[tokio::test]
    async fn test_zero_shortfall_does_not_fetch() {
        let (aug, source) = augmenter(vec![record(Some("A"), None)], Arc::default());
        let items = aug.augment(Category::Attractions, &Intent::default(), &[], 0, "q").await;
        assert!(items.is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_transit_has_no_fetcher() {
        let (aug, source) = augmenter(vec![record(Some("A"), None)], Arc::default());
        let items = aug.augment(Category::Transit, &Intent::default(), &[], 3, "q").await;
        assert!(items.is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_truncated_to_shortfall_and_persisted_with_enrichment() {
        let store = Arc::new(RecordingStore::default());
        let records = (1..=5).map(|i| record(Some(&format!("장소{}", i)), None)).collect();
        let (aug, _) = augmenter(records, store.clone());

        let items = aug.augment(Category::Attractions, &Intent::default(), &[], 2, "속초 여행").await;
        let titles: Vec<_> = items.iter().filter_map(|i| i.title()).collect();
        assert_eq!(titles, vec!["장소1", "장소2"]);

        let written = store.written.lock().unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].metadata()["original_query"], "속초 여행");
        assert_eq!(written[0].metadata()["has_pet_info"], false);
        assert!(written[0].metadata().contains_key("content_length"));
        // The in-memory result is not enriched.
        assert!(!items[0].metadata().contains_key("original_query"));
    }

    #[tokio::test]
    async fn test_persistence_failure_is_swallowed() {
        let store = Arc::new(RecordingStore {
            written: Mutex::default(),
            fail: true,
        });
        let (aug, _) = augmenter(vec![record(Some("A"), None)], store);
        let items = aug.augment(Category::Lodging, &Intent::default(), &[], 3, "q").await;
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_persistence_disabled() {
        let store = Arc::new(RecordingStore::default());
        let (aug, _) = augmenter(vec![record(Some("A"), None)], store.clone());
        let aug = aug.with_persistence(false);
        aug.augment(Category::Attractions, &Intent::default(), &[], 3, "q").await;
        assert!(store.written.lock().unwrap().is_empty());
    }
}
