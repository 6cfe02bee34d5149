//! Korea Tourism pet-tour API (`KorPetTourService`).

use futures::future::join_all;
use pawtrip_core::{AppError, AppResult};
use serde_json::Value;

use super::{fetcher_for, ExternalSource, Fetcher};
use crate::config::TourApiConfig;
use crate::types::{Category, Intent, PlaceRecord};

const MOBILE_OS: &str = "ETC";
const MOBILE_APP: &str = "pawtrip";
/// Tourist attraction content type
const CONTENT_TYPE_ATTRACTION: &str = "12";
const NO_PET_INFO: &str = "정보 없음";
const LODGING_KEYWORDS: [&str; 5] = ["호텔", "펜션", "리조트", "게스트하우스", "숙박"];

/// A named area or sigungu code.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AreaCode {
    code: String,
    name: String,
}

/// Client for the data.go.kr pet tour service.
pub struct PetTourClient {
    endpoint: String,
    service_key: Option<String>,
    key_env: String,
    client: reqwest::Client,
}

impl PetTourClient {
    pub fn new(endpoint: impl Into<String>, service_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            service_key,
            key_env: "TOUR_API_KEY".to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Build from config, reading the service key from its env var.
    pub fn from_config(config: &TourApiConfig) -> Self {
        let key = std::env::var(&config.service_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if key.is_none() {
            tracing::debug!(env = %config.service_key_env, "tour API key not set");
        }

        let mut client = Self::new(&config.endpoint, key);
        client.key_env = config.service_key_env.clone();
        client
    }

    fn key(&self) -> AppResult<&str> {
        self.service_key
            .as_deref()
            .ok_or_else(|| AppError::Config(format!("{} is not set", self.key_env)))
    }

    async fn get(&self, operation: &str, params: &[(&str, String)]) -> AppResult<Value> {
        // Keys are issued URL-encoded; appending them verbatim avoids double encoding.
        let url = format!("{}/{}?serviceKey={}", self.endpoint, operation, self.key()?);

        let response = self
            .client
            .get(&url)
            .query(&[("MobileOS", MOBILE_OS), ("MobileApp", MOBILE_APP), ("_type", "json")])
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::External(format!(
                "tour API {} returned {}",
                operation,
                response.status()
            )));
        }

        Ok(response.json::<Value>().await?)
    }

    async fn area_codes(&self, area: Option<&str>) -> AppResult<Vec<AreaCode>> {
        let mut params = vec![("numOfRows", "100".to_string())];
        if let Some(area) = area {
            params.push(("areaCode", area.to_string()));
        }

        let body = self.get("areaCode", &params).await?;
        Ok(items(&body).iter().filter_map(area_code).collect())
    }

    /// Region name → (area code, optional sigungu code).
    async fn match_region(&self, region: &str) -> AppResult<Option<(String, Option<String>)>> {
        let areas = self.area_codes(None).await?;
        if let Some(area) = find_matching(region, &areas) {
            return Ok(Some((area.code.clone(), None)));
        }

        for area in &areas {
            let sigungu = match self.area_codes(Some(&area.code)).await {
                Ok(sigungu) => sigungu,
                Err(e) => {
                    tracing::warn!(area = %area.name, error = %e, "sigungu lookup failed");
                    continue;
                }
            };
            if let Some(hit) = find_matching(region, &sigungu) {
                return Ok(Some((area.code.clone(), Some(hit.code.clone()))));
            }
        }

        Ok(None)
    }

    async fn area_places(&self, area: &str, sigungu: Option<&str>, max_count: usize) -> AppResult<Vec<PlaceRecord>> {
        let mut params = vec![
            ("pageNo", "1".to_string()),
            ("numOfRows", max_count.to_string()),
            ("arrange", "C".to_string()),
            ("contentTypeId", CONTENT_TYPE_ATTRACTION.to_string()),
            ("areaCode", area.to_string()),
            ("listYN", "Y".to_string()),
        ];
        if let Some(sigungu) = sigungu {
            params.push(("sigunguCode", sigungu.to_string()));
        }

        let body = self.get("areaBasedList", &params).await?;
        Ok(items(&body)
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<PlaceRecord>(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed tour record");
                    None
                }
            })
            .collect())
    }

    /// Pet companion note for one place; `정보 없음` when unavailable.
    async fn pet_note(&self, content_id: &str) -> String {
        let params = [("contentId", content_id.to_string())];
        match self.get("detailPetTour", &params).await {
            Ok(body) => items(&body)
                .first()
                .and_then(|item| item.get("acmpyPsblCpam"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(NO_PET_INFO)
                .to_string(),
            Err(e) => {
                tracing::warn!(content_id, error = %e, "pet detail lookup failed");
                NO_PET_INFO.to_string()
            }
        }
    }
}

#[async_trait::async_trait]
impl ExternalSource for PetTourClient {
    async fn fetch(&self, category: Category, intent: &Intent, max_count: usize) -> AppResult<Vec<PlaceRecord>> {
        let Some(fetcher) = fetcher_for(category) else {
            return Ok(Vec::new());
        };
        let Some(region) = intent.region.as_deref() else {
            tracing::debug!(%category, "no region, skipping tour API");
            return Ok(Vec::new());
        };
        self.key()?;

        let Some((area, sigungu)) = self.match_region(region).await? else {
            tracing::info!(region, "region not found in tour API area codes");
            return Ok(Vec::new());
        };
        tracing::debug!(region, %area, sigungu = ?sigungu, "matched region");

        let mut records = self.area_places(&area, sigungu.as_deref(), max_count).await?;
        if fetcher == Fetcher::PetTourLodging {
            records.retain(is_lodging);
        }

        let notes = join_all(records.iter().map(|record| async move {
            match record.id_key() {
                Some(id) => self.pet_note(id).await,
                None => NO_PET_INFO.to_string(),
            }
        }))
        .await;

        for (record, note) in records.iter_mut().zip(notes) {
            record.pet_note = Some(note);
        }

        Ok(records)
    }
}

/// `response.body.items.item`, which may be a list, a single object or `""`.
fn items(body: &Value) -> Vec<Value> {
    match body.pointer("/response/body/items/item") {
        Some(Value::Array(list)) => list.clone(),
        Some(obj @ Value::Object(_)) => vec![obj.clone()],
        _ => Vec::new(),
    }
}

fn area_code(item: &Value) -> Option<AreaCode> {
    let code = match item.get("code")? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let name = item.get("name")?.as_str()?.trim().to_string();
    if code.is_empty() || name.is_empty() {
        return None;
    }
    Some(AreaCode { code, name })
}

/// First entry whose name contains the region or is contained in it.
fn find_matching<'a>(region: &str, codes: &'a [AreaCode]) -> Option<&'a AreaCode> {
    let region = region.trim();
    if region.is_empty() {
        return None;
    }
    codes
        .iter()
        .find(|c| c.name.contains(region) || region.contains(c.name.as_str()))
}

fn is_lodging(record: &PlaceRecord) -> bool {
    record
        .title_key()
        .is_some_and(|title| LODGING_KEYWORDS.iter().any(|k| title.contains(k)))
}
