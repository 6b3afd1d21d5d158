use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use shared::domain::{GroupId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendParams {
    pub user_id: UserId,
    pub group_ids: Vec<GroupId>,
    pub max_recommendations: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedItem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSet {
    pub items: Vec<RecommendedItem>,
}

impl RecommendationSet {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[async_trait]
pub trait RecommendationProvider: Send + Sync {
    async fn recommendations(&self, params: &RecommendParams) -> Result<RecommendationSet>;
}

/// One user action worth keeping during an evaluation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    pub user: String,
    pub action: String,
    pub item: String,
    pub item_type: String,
    pub timestamp: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ActionLog: Send + Sync {
    async fn record(&self, record: &ActionRecord) -> Result<()>;
}

#[derive(Clone)]
pub struct HttpRecommendationProvider {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpRecommendationProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// A single group id is passed as the scalar `group` parameter, several
    /// as repeated `group[]` pairs.
    fn request_url(&self, params: &RecommendParams) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint)
            .with_context(|| format!("invalid recommendation endpoint '{}'", self.endpoint))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("user", &params.user_id.0.to_string());
            match params.group_ids.as_slice() {
                [single] => {
                    pairs.append_pair("group", &single.0.to_string());
                }
                many => {
                    for group in many {
                        pairs.append_pair("group[]", &group.0.to_string());
                    }
                }
            }
            pairs.append_pair(
                "max_recommendations",
                &params.max_recommendations.to_string(),
            );
        }
        Ok(url)
    }
}

#[async_trait]
impl RecommendationProvider for HttpRecommendationProvider {
    async fn recommendations(&self, params: &RecommendParams) -> Result<RecommendationSet> {
        let url = self.request_url(params)?;
        let items: Vec<RecommendedItem> = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("recommendation request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("recommendation endpoint {url} rejected the request"))?
            .json()
            .await
            .with_context(|| format!("recommendation payload from {url} was not an item array"))?;
        Ok(RecommendationSet { items })
    }
}

#[derive(Clone)]
pub struct HttpActionLog {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpActionLog {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ActionLog for HttpActionLog {
    async fn record(&self, record: &ActionRecord) -> Result<()> {
        let mut url = Url::parse(&self.endpoint)
            .with_context(|| format!("invalid action log endpoint '{}'", self.endpoint))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("user", &record.user);
            pairs.append_pair("action", &record.action);
            pairs.append_pair("item", &record.item);
            pairs.append_pair("type", &record.item_type);
            let timestamp = record
                .timestamp
                .map(|at| at.to_rfc3339())
                .unwrap_or_default();
            pairs.append_pair("item_timestamp", &timestamp);
        }

        self.http
            .post(url.clone())
            .send()
            .await
            .with_context(|| format!("action log request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("action log endpoint {url} rejected the request"))?;
        Ok(())
    }
}

/// Sink for runs with evaluation disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopActionLog;

#[async_trait]
impl ActionLog for NoopActionLog {
    async fn record(&self, _record: &ActionRecord) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
