use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::VectorIndex;
use crate::core::config::VectorSettings;
use crate::core::errors::ApiError;
use crate::ranking::RawMatch;

const API_VERSION_HEADER: &str = "X-Pinecone-API-Version";
const API_VERSION: &str = "2025-01";

/// Data-plane client for one Pinecone index.
#[derive(Clone)]
pub struct PineconeIndex {
    host: String,
    api_key: String,
    namespace: Option<String>,
    client: Client,
}

impl PineconeIndex {
    /// Connects to the configured index. A configured host is used as is;
    /// otherwise the host is looked up once by index name.
    pub async fn connect(settings: &VectorSettings) -> Result<Self, ApiError> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| ApiError::BadRequest("PINECONE_API_KEY is not set".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(ApiError::internal)?;

        let host = match (&settings.host, &settings.index) {
            (Some(host), _) => normalize_host(host),
            (None, Some(index)) => {
                describe_index_host(&client, &settings.control_plane_url, &api_key, index).await?
            }
            (None, None) => {
                return Err(ApiError::BadRequest(
                    "Set PINECONE_HOST or PINECONE_INDEX".to_string(),
                ))
            }
        };

        tracing::info!("Using Pinecone index at {}", host);

        Ok(Self {
            host,
            api_key,
            namespace: settings.namespace.clone(),
            client,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn name(&self) -> &str {
        "pinecone"
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RawMatch>, ApiError> {
        if vector.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let body = query_body(vector, top_k, self.namespace.as_deref());
        let res = self
            .client
            .post(format!("{}/query", self.host))
            .header("Api-Key", &self.api_key)
            .header(API_VERSION_HEADER, API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "Pinecone query failed ({}): {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::upstream)?;
        Ok(parse_matches(&payload))
    }
}

async fn describe_index_host(
    client: &Client,
    control_plane_url: &str,
    api_key: &str,
    index: &str,
) -> Result<String, ApiError> {
    let url = format!(
        "{}/indexes/{}",
        control_plane_url.trim_end_matches('/'),
        urlencoding::encode(index)
    );

    let res = client
        .get(url)
        .header("Api-Key", api_key)
        .header(API_VERSION_HEADER, API_VERSION)
        .send()
        .await
        .map_err(ApiError::upstream)?;

    if !res.status().is_success() {
        return Err(ApiError::Upstream(format!(
            "Failed to describe Pinecone index '{}': {}",
            index,
            res.status()
        )));
    }

    let payload: Value = res.json().await.map_err(ApiError::upstream)?;
    payload
        .get("host")
        .and_then(|v| v.as_str())
        .filter(|v| !v.trim().is_empty())
        .map(normalize_host)
        .ok_or_else(|| ApiError::Upstream(format!("Pinecone index '{}' has no host", index)))
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

fn query_body(vector: &[f32], top_k: usize, namespace: Option<&str>) -> Value {
    let mut body = json!({
        "vector": vector,
        "topK": top_k,
        "includeMetadata": true,
        "includeValues": false,
    });
    if let (Some(ns), Some(obj)) = (namespace, body.as_object_mut()) {
        obj.insert("namespace".to_string(), json!(ns));
    }
    body
}

fn parse_matches(payload: &Value) -> Vec<RawMatch> {
    payload
        .get("matches")
        .and_then(|v| v.as_array())
        .map(|matches| matches.iter().map(RawMatch::from_json).collect())
        .unwrap_or_default()
}
