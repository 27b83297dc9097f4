use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::MetricsConfig;
use crate::window::LookbackWindow;

const USERNAME_TAG: &str = "username";

/// Follower counts keyed by username, ascending.
pub type Counts = BTreeMap<String, i64>;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("metrics store returned HTTP {0}")]
    Status(u16),
    #[error("metrics store request timed out")]
    Timeout,
    #[error("metrics store request failed: {0}")]
    Transport(String),
    #[error("could not decode metrics response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for QueryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            QueryError::Timeout
        } else {
            QueryError::Transport(err.to_string())
        }
    }
}

/// Source of current and historical follower counts.
pub trait MetricsSource: Send + Sync {
    fn fetch_current(&self) -> impl Future<Output = Result<Counts, QueryError>> + Send;

    fn fetch_historical(
        &self,
        window: &LookbackWindow,
    ) -> impl Future<Output = Result<Counts, QueryError>> + Send;
}

/// Converts a raw store value into a follower count.
///
/// Fractions are truncated toward zero. Non-finite, negative and out of
/// range values have no count.
pub fn count_from_value(value: f64) -> Option<i64> {
    if !value.is_finite() || value < 0.0 || value >= i64::MAX as f64 {
        return None;
    }
    Some(value.trunc() as i64)
}

/// `/api/query/last` reports values as strings, ranged queries as numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawValue {
    Number(f64),
    Text(String),
}

impl RawValue {
    fn count(&self) -> Option<i64> {
        let value = match self {
            RawValue::Number(value) => *value,
            RawValue::Text(text) => text.trim().parse::<f64>().ok()?,
        };
        count_from_value(value)
    }
}

#[derive(Debug, Deserialize)]
struct LastPoint {
    #[serde(default)]
    tags: BTreeMap<String, String>,
    value: RawValue,
}

#[derive(Debug, Deserialize)]
struct RangeSeries {
    #[serde(default)]
    tags: BTreeMap<String, String>,
    #[serde(default)]
    dps: BTreeMap<String, RawValue>,
}

fn decode<'a, T: Deserialize<'a>>(body: &'a [u8]) -> Result<T, QueryError> {
    serde_json::from_slice(body).map_err(|err| QueryError::Decode(err.to_string()))
}

pub fn parse_current(body: &[u8]) -> Result<Counts, QueryError> {
    let points: Vec<LastPoint> = decode(body)?;
    let mut counts = Counts::new();
    for point in points {
        let Some(username) = point.tags.get(USERNAME_TAG) else {
            warn!("Skipping current value without a {USERNAME_TAG} tag");
            continue;
        };
        match point.value.count() {
            Some(count) => {
                counts.insert(username.clone(), count);
            }
            None => warn!("Skipping unusable current value for @{username}"),
        }
    }
    Ok(counts)
}

/// Keeps the chronologically earliest sample of every series.
pub fn parse_historical(body: &[u8]) -> Result<Counts, QueryError> {
    let series: Vec<RangeSeries> = decode(body)?;
    let mut counts = Counts::new();
    for entry in series {
        let Some(username) = entry.tags.get(USERNAME_TAG) else {
            warn!("Skipping historical series without a {USERNAME_TAG} tag");
            continue;
        };
        let earliest = entry
            .dps
            .iter()
            .filter_map(|(ts, value)| ts.parse::<i64>().ok().map(|ts| (ts, value)))
            .min_by_key(|(ts, _)| *ts);
        match earliest.and_then(|(_, value)| value.count()) {
            Some(count) => {
                counts.insert(username.clone(), count);
            }
            None => debug!("No usable historical sample for @{username}"),
        }
    }
    Ok(counts)
}

pub fn current_query(metric: &str) -> Value {
    json!({ "queries": [ { "metric": metric } ] })
}

pub fn historical_query(metric: &str, window: &LookbackWindow) -> Value {
    json!({
        "start": window.start_param(),
        "end": window.end_param(),
        "queries": [
            {
                "metric": metric,
                "aggregator": "max",
                "tags": { USERNAME_TAG: "*" }
            }
        ]
    })
}

/// HTTP client for the store's JSON query API.
pub struct OpenTsdbClient {
    http: reqwest::Client,
    base_url: String,
    user: String,
    read_token: String,
    metric: String,
}

impl OpenTsdbClient {
    pub fn new(config: &MetricsConfig) -> Result<Self, QueryError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            user: config.user.clone(),
            read_token: config.read_token.clone(),
            metric: config.metric.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Vec<u8>, QueryError> {
        let url = self.endpoint(path);
        debug!("POST {url} {body}");
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.user, Some(&self.read_token))
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Status(status.as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

impl MetricsSource for OpenTsdbClient {
    async fn fetch_current(&self) -> Result<Counts, QueryError> {
        let body = self
            .post("/api/query/last", &current_query(&self.metric))
            .await?;
        parse_current(&body)
    }

    async fn fetch_historical(&self, window: &LookbackWindow) -> Result<Counts, QueryError> {
        debug!(
            "Historical slice {:.0}..{:.0}",
            window.start_timestamp(None),
            window.end_timestamp(None)
        );
        let body = self
            .post("/api/query", &historical_query(&self.metric, window))
            .await?;
        parse_historical(&body)
    }
}
