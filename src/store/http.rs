//! HTTP clients for the candidate and token stores
//!
//! Both stores authenticate with a bearer key and speak JSON. Every request
//! carries the same fixed timeout.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{CandidateStore, TokenStore, UploadReceipt};
use crate::models::{TokenRecord, VendorId};
use crate::utils::error::StoreError;
use crate::utils::{bearer_value, join_url, parse_http_url};

/// Shared transport of both store clients
#[derive(Debug, Clone)]
struct StoreClient {
    client: Client,
    base_url: String,
    authorization: String,
}

impl StoreClient {
    fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, StoreError> {
        parse_http_url(base_url).map_err(|e| StoreError::InvalidUrl(e.to_string()))?;

        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(StoreError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            authorization: bearer_value(api_key),
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(AUTHORIZATION, &self.authorization)
    }

    fn ensure_success(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(StoreError::Status(status.as_u16()))
        }
    }
}

#[derive(Debug, Deserialize)]
struct SliceResponse {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

/// Candidate store reached over HTTP (`POST {base}/get`)
#[derive(Debug, Clone)]
pub struct HttpCandidateStore {
    inner: StoreClient,
}

impl HttpCandidateStore {
    /// Create a client for the candidate store at `base_url`
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, StoreError> {
        Ok(Self {
            inner: StoreClient::new(base_url, api_key, timeout)?,
        })
    }
}

#[async_trait]
impl CandidateStore for HttpCandidateStore {
    async fn fetch(&self, copy: u32, copies: u32) -> Result<Vec<VendorId>, StoreError> {
        let request = self
            .inner
            .client
            .post(self.inner.url("get"))
            .json(&serde_json::json!({ "copy": copy, "copies": copies }));

        let response = self.inner.authorize(request).send().await?;
        let response = StoreClient::ensure_success(response)?;
        let body: SliceResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        // Ids arrive as strings or bare numbers
        let candidates: Vec<VendorId> = body
            .data
            .into_iter()
            .filter_map(|value| match value {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect();

        debug!(copy, copies, count = candidates.len(), "Fetched candidate slice");
        Ok(candidates)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QueryResponse {
    List(Vec<TokenRecord>),
    Wrapped {
        #[serde(default)]
        data: Vec<TokenRecord>,
    },
}

/// Token store reached over HTTP (`POST {base}/upload`, `GET {base}/get`)
#[derive(Debug, Clone)]
pub struct HttpTokenStore {
    inner: StoreClient,
}

impl HttpTokenStore {
    /// Create a client for the token store at `base_url`
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, StoreError> {
        Ok(Self {
            inner: StoreClient::new(base_url, api_key, timeout)?,
        })
    }
}

#[async_trait]
impl TokenStore for HttpTokenStore {
    async fn upload(&self, record: &TokenRecord) -> Result<UploadReceipt, StoreError> {
        let request = self.inner.client.post(self.inner.url("upload")).json(record);
        let response = self.inner.authorize(request).send().await?;

        let code = response.status().as_u16();
        Ok(UploadReceipt {
            code,
            ok: code == 200,
        })
    }

    async fn query(&self, date: &str) -> Result<Vec<TokenRecord>, StoreError> {
        let request = self
            .inner
            .client
            .get(self.inner.url("get"))
            .query(&[("date", date)]);

        let response = self.inner.authorize(request).send().await?;
        let response = StoreClient::ensure_success(response)?;
        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        let records = match body {
            QueryResponse::List(records) | QueryResponse::Wrapped { data: records } => records,
        };
        debug!(date, count = records.len(), "Queried token records");
        Ok(records)
    }
}
