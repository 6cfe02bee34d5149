//! Groups final evidence by category and renders it for the answer prompt.

use std::collections::BTreeMap;

use reqwest::Url;
use serde::Serialize;
use serde_json::Value;

use crate::types::{Category, EvidenceItem};

const PLACE_URL: &str = "https://map.naver.com/p/entry/place";
const SEARCH_URL: &str = "https://map.naver.com/p/search";

/// Places with a known map id.
const KNOWN_PLACES: [(&str, &str); 4] = [
    ("속초해수욕장", "13994080"),
    ("속초관광수산시장", "11491456"),
    ("속초중앙시장", "13545523"),
    ("설악산국립공원", "11491297"),
];

/// Map link for a place title.
///
/// Known places link straight to their entry; anything else becomes a
/// percent-encoded search.
pub fn map_link(title: &str) -> String {
    if let Some((_, id)) = KNOWN_PLACES.iter().find(|(name, _)| *name == title) {
        return format!("{}/{}", PLACE_URL, id);
    }

    let Ok(mut url) = Url::parse(SEARCH_URL) else {
        return "#".to_string();
    };
    match url.path_segments_mut() {
        Ok(mut segments) => {
            segments.push(title);
        }
        Err(()) => return "#".to_string(),
    }
    url.to_string()
}

/// An evidence item with its display reference.
#[derive(Debug, Clone, Serialize)]
pub struct BundledItem {
    pub item: EvidenceItem,
    /// Map link, or `#` for untitled items
    pub display_ref: String,
}

/// Final per-category evidence handed to generation.
///
/// Categories with no items are absent. Iteration follows category order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvidenceBundle {
    pub sections: BTreeMap<Category, Vec<BundledItem>>,
}

impl EvidenceBundle {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn get(&self, category: Category) -> Option<&[BundledItem]> {
        self.sections.get(&category).map(Vec::as_slice)
    }

    /// Markdown sections for the answer prompt.
    pub fn render_sections(&self) -> String {
        self.sections
            .iter()
            .map(|(category, items)| render_section(*category, items))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn render_section(category: Category, items: &[BundledItem]) -> String {
    let mut out = format!("### {} 정보\n", category.label());
    for (i, bundled) in items.iter().enumerate() {
        let n = i + 1;
        let title = bundled
            .item
            .title()
            .map(str::to_string)
            .unwrap_or_else(|| format!("장소 {}", n));

        out.push_str(&format!("**{}. [{}]({})**\n", n, title, bundled.display_ref));
        out.push_str(bundled.item.content());
        if is_fresh(&bundled.item) {
            out.push_str("\n   *(최신 정보)*");
        }
        out.push_str("\n\n");
    }
    out
}

fn is_fresh(item: &EvidenceItem) -> bool {
    item.metadata().get("data_source").and_then(Value::as_str) == Some("external_api")
}

/// Builds the bundle from per-category item lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bundler;

impl Bundler {
    pub fn bundle(&self, results: impl IntoIterator<Item = (Category, Vec<EvidenceItem>)>) -> EvidenceBundle {
        let sections = results
            .into_iter()
            .filter(|(_, items)| !items.is_empty())
            .map(|(category, items)| {
                let bundled = items
                    .into_iter()
                    .map(|item| {
                        let display_ref = item.title().map(map_link).unwrap_or_else(|| "#".to_string());
                        BundledItem { item, display_ref }
                    })
                    .collect();
                (category, bundled)
            })
            .collect();

        EvidenceBundle { sections }
    }
}
