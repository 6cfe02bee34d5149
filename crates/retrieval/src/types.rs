//! Domain types shared by every pipeline stage.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Knowledge category. Declaration order is the stable output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// 관광지
    Attractions,
    /// 숙박
    Lodging,
    /// 대중교통
    Transit,
    /// 날씨 (live conditions)
    Conditions,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Attractions,
        Category::Lodging,
        Category::Transit,
        Category::Conditions,
    ];

    /// Parse a Korean label or an English alias.
    pub fn parse(label: &str) -> Option<Self> {
        let cleaned = label
            .trim()
            .trim_matches(|c: char| matches!(c, '"' | '\'' | '-' | '*' | '`' | '.'))
            .trim();

        match cleaned.to_lowercase().as_str() {
            "관광지" | "attractions" | "attraction" => Some(Self::Attractions),
            "숙박" | "lodging" | "accommodation" => Some(Self::Lodging),
            "대중교통" | "transit" | "transport" => Some(Self::Transit),
            "날씨" | "conditions" | "weather" => Some(Self::Conditions),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attractions => "attractions",
            Self::Lodging => "lodging",
            Self::Transit => "transit",
            Self::Conditions => "conditions",
        }
    }

    /// Korean display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Attractions => "관광지",
            Self::Lodging => "숙박",
            Self::Transit => "대중교통",
            Self::Conditions => "날씨",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            format!(
                "unknown category '{}' (expected one of: attractions, lodging, transit, conditions)",
                s
            )
        })
    }
}

/// The set of categories a query touches. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySet(BTreeSet<Category>);

impl CategorySet {
    /// Normalize raw classifier output.
    ///
    /// Accepts a JSON list of labels or a comma/newline separated string.
    /// Unknown labels are dropped with a warning. If nothing survives the
    /// default set is returned.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();

        let labels: Vec<String> = match serde_json::from_str::<Vec<String>>(trimmed) {
            Ok(list) => list,
            Err(_) => trimmed
                .split([',', '\n', '、'])
                .map(str::to_string)
                .collect(),
        };

        let mut set = BTreeSet::new();
        for label in labels.iter().filter(|l| !l.trim().is_empty()) {
            match Category::parse(label) {
                Some(category) => {
                    set.insert(category);
                }
                None => tracing::warn!(label = %label.trim(), "dropping unknown category label"),
            }
        }

        if set.is_empty() {
            tracing::warn!(raw = %trimmed, "classifier produced no known category, using default");
            return Self::default();
        }

        Self(set)
    }

    pub fn contains(&self, category: Category) -> bool {
        self.0.contains(&category)
    }

    pub fn insert(&mut self, category: Category) {
        self.0.insert(category);
    }

    /// Categories in stable order.
    pub fn iter(&self) -> impl Iterator<Item = Category> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for CategorySet {
    fn default() -> Self {
        Self(BTreeSet::from([Category::Attractions]))
    }
}

impl FromIterator<Category> for CategorySet {
    fn from_iter<I: IntoIterator<Item = Category>>(iter: I) -> Self {
        let set: BTreeSet<Category> = iter.into_iter().collect();
        if set.is_empty() {
            Self::default()
        } else {
            Self(set)
        }
    }
}

/// Trip length as the user expressed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Duration {
    Days(i64),
    /// Free text such as "주말" or "다음 주"
    Phrase(String),
}

impl Duration {
    /// Read a duration from extractor output.
    ///
    /// Strings become `Days` only when they are integer literals. Empty
    /// strings and the literal "null" mean unspecified.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                .map(Self::Days),
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() || s.eq_ignore_ascii_case("null") {
                    None
                } else if let Ok(days) = s.parse::<i64>() {
                    Some(Self::Days(days))
                } else {
                    Some(Self::Phrase(s.to_string()))
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Days(days) => write!(f, "{}", days),
            Self::Phrase(phrase) => f.write_str(phrase),
        }
    }
}

/// Structured fields pulled out of the query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub region: Option<String>,
    /// Pet type, e.g. 강아지
    pub subject: Option<String>,
    pub duration: Option<Duration>,
}

impl Intent {
    /// Build from extractor JSON (`region`, `pet_type`, `days`).
    pub fn from_json(value: &Value) -> Self {
        let text = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| value.get(*k))
                .find_map(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
                .map(str::to_string)
        };

        let duration = ["days", "duration"]
            .iter()
            .filter_map(|k| value.get(*k))
            .find_map(Duration::from_value);

        Self {
            region: text(&["region"]),
            subject: text(&["pet_type", "subject"]),
            duration,
        }
    }

    /// Integer day count, if the duration is one.
    pub fn days(&self) -> Option<i64> {
        match self.duration {
            Some(Duration::Days(days)) => Some(days),
            _ => None,
        }
    }
}

/// Where an evidence item came from during this query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceSource {
    Indexed,
    External,
}

/// A passage of evidence. Fields are read-only after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    content: String,
    metadata: Map<String, Value>,
    source: EvidenceSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    external_id: Option<String>,
}

impl EvidenceItem {
    /// Item loaded from an index; identity comes from `title`/`contentid`.
    pub fn indexed(content: impl Into<String>, metadata: Map<String, Value>) -> Self {
        let title = metadata.get("title").and_then(non_empty_string);
        let external_id = metadata.get("contentid").and_then(non_empty_string);
        Self {
            content: content.into(),
            metadata,
            source: EvidenceSource::Indexed,
            title,
            external_id,
        }
    }

    pub fn external(
        content: impl Into<String>,
        metadata: Map<String, Value>,
        title: Option<String>,
        external_id: Option<String>,
    ) -> Self {
        Self {
            content: content.into(),
            metadata,
            source: EvidenceSource::External,
            title,
            external_id,
        }
    }

    /// Passage with no identity, e.g. a weather advisory.
    pub fn passage(content: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            content: content.into(),
            metadata,
            source: EvidenceSource::External,
            title: None,
            external_id: None,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn source(&self) -> EvidenceSource {
        self.source
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    /// Content length in characters, not bytes.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    /// Copy with extra metadata keys merged in.
    pub fn with_metadata(&self, extra: Map<String, Value>) -> Self {
        let mut copy = self.clone();
        copy.metadata.extend(extra);
        copy
    }
}

/// Per-category sufficiency judgement for one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityVerdict {
    pub category: Category,
    pub observed_count: usize,
    pub needed_count: usize,
    pub sufficient_quantity: bool,
    pub sufficient_quality: bool,
    pub needs_augmentation: bool,
}

/// A raw record from an external place source.
///
/// Field names follow the Korea Tourism API; anything else is kept in
/// `extra` and carried into evidence metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceRecord {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(rename = "addr1", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(rename = "tel", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,

    #[serde(rename = "pet_info", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub pet_note: Option<String>,

    #[serde(rename = "contentid", default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlaceRecord {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Title, ignoring blanks.
    pub fn title_key(&self) -> Option<&str> {
        present(&self.title)
    }

    /// External id, ignoring blanks.
    pub fn id_key(&self) -> Option<&str> {
        present(&self.content_id)
    }
}

/// `Some` only for non-blank text.
pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Strings and numbers both become text; blanks become `None`.
fn non_empty_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(non_empty_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_category_parse_labels_and_aliases() {
        assert_eq!(Category::parse("관광지"), Some(Category::Attractions));
        assert_eq!(Category::parse(" 숙박 "), Some(Category::Lodging));
        assert_eq!(Category::parse("- 대중교통"), Some(Category::Transit));
        assert_eq!(Category::parse("\"날씨\""), Some(Category::Conditions));
        assert_eq!(Category::parse("Weather"), Some(Category::Conditions));
        assert_eq!(Category::parse("맛집"), None);
        assert!("lodging".parse::<Category>().is_ok());
        assert!("shopping".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_set_from_comma_list() {
        let set = CategorySet::from_raw("날씨, 관광지, 숙박");
        let order: Vec<Category> = set.iter().collect();
        assert_eq!(
            order,
            vec![Category::Attractions, Category::Lodging, Category::Conditions]
        );
    }

    #[test]
    fn test_category_set_from_json_list() {
        let set = CategorySet::from_raw(r#"["대중교통", "숙박"]"#);
        assert_eq!(set.len(), 2);
        assert!(set.contains(Category::Transit));
    }

    #[test]
    fn test_unknown_labels_are_dropped() {
        let set = CategorySet::from_raw("맛집, 숙박, 쇼핑");
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Category::Lodging]);
    }

    #[test]
    fn test_all_unknown_falls_back_to_default() {
        assert_eq!(CategorySet::from_raw("맛집"), CategorySet::default());
        assert_eq!(CategorySet::from_raw(""), CategorySet::default());
        assert!(CategorySet::default().contains(Category::Attractions));
    }

    #[test]
    fn test_duration_from_value() {
        assert_eq!(Duration::from_value(&json!(3)), Some(Duration::Days(3)));
        assert_eq!(Duration::from_value(&json!("2")), Some(Duration::Days(2)));
        assert_eq!(Duration::from_value(&json!(2.7)), Some(Duration::Days(2)));
        assert_eq!(
            Duration::from_value(&json!("주말")),
            Some(Duration::Phrase("주말".to_string()))
        );
        assert_eq!(Duration::from_value(&json!("null")), None);
        assert_eq!(Duration::from_value(&json!(null)), None);
        assert_eq!(Duration::from_value(&json!("2박 3일")), Some(Duration::Phrase("2박 3일".to_string())));
    }

    #[test]
    fn test_intent_from_json() {
        let intent = Intent::from_json(&json!({
            "region": "제주도",
            "pet_type": "강아지",
            "days": 3
        }));
        assert_eq!(intent.region.as_deref(), Some("제주도"));
        assert_eq!(intent.subject.as_deref(), Some("강아지"));
        assert_eq!(intent.days(), Some(3));

        let vague = Intent::from_json(&json!({"region": "null", "days": "다음 주"}));
        assert!(vague.region.is_none());
        assert!(vague.subject.is_none());
        assert_eq!(vague.days(), None);
        assert_eq!(vague.duration.map(|d| d.to_string()).as_deref(), Some("다음 주"));
    }

    #[test]
    fn test_indexed_item_identity_from_metadata() {
        let metadata = json!({"title": "속초해수욕장", "contentid": 126078})
            .as_object()
            .cloned()
            .unwrap();
        let item = EvidenceItem::indexed("해변", metadata);
        assert_eq!(item.title(), Some("속초해수욕장"));
        assert_eq!(item.external_id(), Some("126078"));
        assert_eq!(item.source(), EvidenceSource::Indexed);
    }

    #[test]
    fn test_char_len_counts_characters() {
        let item = EvidenceItem::indexed("반려견", Map::new());
        assert_eq!(item.char_len(), 3);
    }

    #[test]
    fn test_place_record_lenient_fields() {
        let record: PlaceRecord = serde_json::from_value(json!({
            "title": "속초 펫 리조트",
            "addr1": "강원특별자치도 속초시",
            "tel": "",
            "contentid": 2790000,
            "mapx": "128.59"
        }))
        .unwrap();

        assert_eq!(record.title_key(), Some("속초 펫 리조트"));
        assert_eq!(record.contact, None);
        assert_eq!(record.id_key(), Some("2790000"));
        assert_eq!(record.extra.get("mapx"), Some(&json!("128.59")));
    }
}
