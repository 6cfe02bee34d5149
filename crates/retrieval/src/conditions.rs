//! Live travel conditions from the KMA ultra-short-term nowcast.
//!
//! The conditions category is never indexed. Every query that asks for it
//! gets exactly one passage: the current report, or a fixed advisory when
//! the report cannot be produced.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{Local, NaiveDateTime, Timelike};
use pawtrip_core::{AppError, AppResult};
use serde_json::{Map, Value};

use crate::config::WeatherConfig;
use crate::types::{Category, EvidenceItem};

pub const FALLBACK_ADVISORY: &str = "날씨 정보를 가져오는데 실패했습니다.";
pub const NO_REGION_ADVISORY: &str = "지역 정보가 없어 날씨를 조회할 수 없습니다.";

const MISSING: &str = "정보 없음";

/// Current observation for a city.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    /// City key as found in the city-info table
    pub city: String,
    pub temperature: Option<String>,
    pub humidity: Option<String>,
    pub precipitation: String,
    pub wind_speed: Option<String>,
    pub observed_at: NaiveDateTime,
}

impl WeatherReport {
    pub fn to_evidence(&self) -> EvidenceItem {
        let or_missing = |v: &Option<String>| v.clone().unwrap_or_else(|| MISSING.to_string());
        let content = format!(
            "### 현재 시간 및 날씨 정보\n- 현재 시간: {}\n- 도시: {}\n- 기온: {}°C\n- 습도: {}%\n- 강수형태: {}\n- 풍속: {} m/s",
            self.observed_at.format("%Y년 %m월 %d일 %H:%M"),
            self.city,
            or_missing(&self.temperature),
            or_missing(&self.humidity),
            self.precipitation,
            or_missing(&self.wind_speed),
        );
        EvidenceItem::passage(content, conditions_metadata("weather_api"))
    }
}

/// Produces a current report for a region.
#[async_trait::async_trait]
pub trait ConditionsSource: Send + Sync {
    async fn current(&self, region: &str) -> AppResult<WeatherReport>;
}

/// The single conditions passage for a query. Never fails.
pub async fn conditions_evidence(
    source: &dyn ConditionsSource,
    region: Option<&str>,
    timeout: Duration,
) -> EvidenceItem {
    let Some(region) = region.map(str::trim).filter(|r| !r.is_empty()) else {
        tracing::info!("no region for conditions lookup");
        return advisory(NO_REGION_ADVISORY);
    };

    match tokio::time::timeout(timeout, source.current(region)).await {
        Ok(Ok(report)) => {
            tracing::debug!(city = %report.city, "conditions report ready");
            report.to_evidence()
        }
        Ok(Err(e)) => {
            tracing::warn!(region, error = %e, "conditions lookup failed");
            advisory(FALLBACK_ADVISORY)
        }
        Err(_) => {
            let e = AppError::timeout(format!("conditions {}", region), timeout.as_secs());
            tracing::warn!(region, error = %e, "conditions lookup timed out");
            advisory(FALLBACK_ADVISORY)
        }
    }
}

fn advisory(text: &str) -> EvidenceItem {
    EvidenceItem::passage(text, conditions_metadata("advisory"))
}

fn conditions_metadata(source: &str) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("category".into(), Value::from(Category::Conditions.as_str()));
    metadata.insert("data_source".into(), Value::from(source));
    metadata
}

/// KMA nowcast client backed by a region → lat/lon table.
pub struct KmaWeatherClient {
    endpoint: String,
    service_key: Option<String>,
    key_env: String,
    city_info_path: PathBuf,
    client: reqwest::Client,
}

impl KmaWeatherClient {
    pub fn new(endpoint: impl Into<String>, service_key: Option<String>, city_info_path: impl Into<PathBuf>) -> Self {
        Self {
            endpoint: endpoint.into(),
            service_key,
            key_env: "OPEN_DATA".to_string(),
            city_info_path: city_info_path.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Build from config, reading the service key from its env var.
    pub fn from_config(config: &WeatherConfig, city_info_path: PathBuf) -> Self {
        let key = std::env::var(&config.service_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if key.is_none() {
            tracing::debug!(env = %config.service_key_env, "weather API key not set");
        }

        let mut client = Self::new(&config.endpoint, key, city_info_path);
        client.key_env = config.service_key_env.clone();
        client
    }

    fn load_cities(&self) -> AppResult<Map<String, Value>> {
        let raw = std::fs::read_to_string(&self.city_info_path).map_err(|e| {
            AppError::Config(format!(
                "Cannot read city info {}: {}",
                self.city_info_path.display(),
                e
            ))
        })?;
        match serde_json::from_str(&raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(AppError::Config(format!(
                "City info {} is not a JSON object",
                self.city_info_path.display()
            ))),
        }
    }
}

#[async_trait::async_trait]
impl ConditionsSource for KmaWeatherClient {
    async fn current(&self, region: &str) -> AppResult<WeatherReport> {
        let key = self
            .service_key
            .as_deref()
            .ok_or_else(|| AppError::Config(format!("{} is not set", self.key_env)))?;

        let cities = self.load_cities()?;
        let (city, lat, lon) = lookup_city(&cities, region)
            .ok_or_else(|| AppError::External(format!("'{}' is not in the city info table", region)))?;

        let (nx, ny) = latlon_to_grid(lat, lon);
        let now = Local::now().naive_local();
        let (base_date, base_time) = base_date_time(now);
        tracing::debug!(%city, nx, ny, %base_date, %base_time, "requesting nowcast");

        let url = format!("{}?serviceKey={}", self.endpoint, key);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("pageNo", "1".to_string()),
                ("numOfRows", "1000".to_string()),
                ("dataType", "JSON".to_string()),
                ("base_date", base_date),
                ("base_time", base_time),
                ("nx", nx.to_string()),
                ("ny", ny.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::External(format!("weather API returned {}", response.status())));
        }

        let body: Value = response.json().await?;
        let observations = parse_observations(&body)?;
        Ok(report_from(city, &observations, now))
    }
}

/// Exact key first, then the first key (in sorted order) containing the region.
fn lookup_city(cities: &Map<String, Value>, region: &str) -> Option<(String, f64, f64)> {
    let key = if cities.contains_key(region) {
        region.to_string()
    } else {
        cities.keys().find(|k| k.contains(region))?.clone()
    };

    let entry = cities.get(&key)?;
    let lat = coordinate(entry.get("lat")?)?;
    let lon = coordinate(entry.get("lon")?)?;
    Some((key, lat, lon))
}

fn coordinate(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Latitude/longitude → KMA 5 km Lambert conformal conic grid.
pub fn latlon_to_grid(lat: f64, lon: f64) -> (i64, i64) {
    const RE: f64 = 6371.00877;
    const GRID: f64 = 5.0;
    const SLAT1: f64 = 30.0;
    const SLAT2: f64 = 60.0;
    const OLON: f64 = 126.0;
    const OLAT: f64 = 38.0;
    const XO: f64 = 43.0;
    const YO: f64 = 136.0;

    let rad = PI / 180.0;
    let re = RE / GRID;
    let slat1 = SLAT1 * rad;
    let slat2 = SLAT2 * rad;
    let olon = OLON * rad;
    let olat = OLAT * rad;

    let quarter = |phi: f64| (PI * 0.25 + phi * 0.5).tan();

    let sn = (slat1.cos() / slat2.cos()).ln() / (quarter(slat2) / quarter(slat1)).ln();
    let sf = quarter(slat1).powf(sn) * slat1.cos() / sn;
    let ro = re * sf / quarter(olat).powf(sn);
    let ra = re * sf / quarter(lat * rad).powf(sn);

    let mut theta = lon * rad - olon;
    if theta > PI {
        theta -= 2.0 * PI;
    }
    if theta < -PI {
        theta += 2.0 * PI;
    }
    theta *= sn;

    let x = ra * theta.sin() + XO + 0.5;
    let y = ro - ra * theta.cos() + YO + 0.5;
    (x as i64, y as i64)
}

/// Latest published base date/time. Observations land at minute 40.
pub fn base_date_time(now: NaiveDateTime) -> (String, String) {
    if now.minute() >= 40 {
        return (now.format("%Y%m%d").to_string(), format!("{:02}00", now.hour()));
    }
    if now.hour() == 0 {
        let yesterday = now - chrono::Duration::days(1);
        return (yesterday.format("%Y%m%d").to_string(), "2300".to_string());
    }
    (now.format("%Y%m%d").to_string(), format!("{:02}00", now.hour() - 1))
}

/// `category → obsrValue` from a nowcast response.
fn parse_observations(body: &Value) -> AppResult<HashMap<String, String>> {
    let header = body
        .pointer("/response/header")
        .ok_or_else(|| AppError::External("weather response has no header".to_string()))?;
    let code = header.get("resultCode").and_then(Value::as_str).unwrap_or("");
    let message = header.get("resultMsg").and_then(Value::as_str).unwrap_or("");

    match code {
        "00" => {}
        "03" => return Err(AppError::External("weather API has no data (NO_DATA)".to_string())),
        _ => {
            return Err(AppError::External(format!(
                "weather API error: {} (code: {})",
                message, code
            )))
        }
    }

    let observations: HashMap<String, String> = body
        .pointer("/response/body/items/item")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let category = item.get("category")?.as_str()?;
                    let value = match item.get("obsrValue")? {
                        Value::String(s) => s.trim().to_string(),
                        Value::Number(n) => n.to_string(),
                        _ => return None,
                    };
                    Some((category.to_string(), value))
                })
                .collect()
        })
        .unwrap_or_default();

    if observations.is_empty() {
        return Err(AppError::External("weather response has no observations".to_string()));
    }
    Ok(observations)
}

/// Precipitation type code → label.
pub fn precipitation_label(code: &str) -> &'static str {
    match code {
        "0" => "맑음",
        "1" => "비",
        "2" => "비/눈",
        "3" => "눈",
        "4" => "소나기",
        _ => "알수없음",
    }
}

fn report_from(city: String, observations: &HashMap<String, String>, observed_at: NaiveDateTime) -> WeatherReport {
    WeatherReport {
        city,
        temperature: observations.get("T1H").cloned(),
        humidity: observations.get("REH").cloned(),
        precipitation: precipitation_label(observations.get("PTY").map(String::as_str).unwrap_or("0")).to_string(),
        wind_speed: observations.get("WSD").cloned(),
        observed_at,
    }
}
