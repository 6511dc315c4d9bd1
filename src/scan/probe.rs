//! Outbound activity probe
//!
//! A probe asks the shop activity API about one vendor id, using the session
//! of the active identity. The [`Probe`] trait is the seam between the scan
//! engine and the network; [`HttpProbe`] is the production implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::debug;

use super::headers::{build_navigation_headers, build_probe_headers, shop_referer};
use crate::config::ProbeConfig;
use crate::identity::FingerprintProfile;
use crate::utils::error::FetchError;

/// Transient per-identity session state
///
/// Wraps an HTTP client with its own cookie jar, so discarding the session
/// discards every cookie the target handed out.
#[derive(Debug, Clone)]
pub struct Session {
    client: Client,
    user_agent: String,
}

impl Session {
    /// Open a session with a cookie store, fixed timeout and optional proxy
    pub fn new(user_agent: &str, timeout: Duration, proxy: Option<&str>) -> Result<Self, FetchError> {
        let mut builder = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .cookie_store(true)
            .gzip(true);

        if let Some(proxy) = proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| FetchError::InvalidUrl(format!("proxy {proxy}: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| FetchError::Session(e.to_string()))?;

        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
        })
    }

    /// HTTP client bound to this session's cookie jar
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// User agent the session presents
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

/// Body of an activity API response
///
/// `code == "0"` is business success. Only the activation URL is read from
/// the result; everything else is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeResponse {
    #[serde(default, deserialize_with = "code_as_string")]
    pub code: String,
    #[serde(default)]
    pub result: Option<ProbeResult>,
    #[serde(default)]
    pub msg: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeResult {
    #[serde(rename = "signStatus", default)]
    pub sign_status: Option<SignStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignStatus {
    #[serde(rename = "isvUrl", default)]
    pub isv_url: Option<String>,
}

impl ProbeResponse {
    /// Whether the business status code denotes success
    pub fn is_success(&self) -> bool {
        self.code == "0"
    }

    /// Activation URL, if present
    pub fn isv_url(&self) -> Option<&str> {
        self.result
            .as_ref()
            .and_then(|r| r.sign_status.as_ref())
            .and_then(|s| s.isv_url.as_deref())
    }
}

// The API sends the code as a string, but numeric codes show up on errors.
fn code_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Text(String),
        Number(i64),
    }

    Ok(match Code::deserialize(deserializer)? {
        Code::Text(text) => text,
        Code::Number(number) => number.to_string(),
    })
}

/// Network seam of the scan engine
#[async_trait]
pub trait Probe: Send + Sync {
    /// Open a fresh session presenting the given fingerprint
    fn open_session(&self, profile: &FingerprintProfile) -> Result<Session, FetchError>;

    /// Best-effort navigation to an unrelated entry point
    async fn warm_up(&self, session: &Session) -> Result<(), FetchError>;

    /// Query the activity API for one vendor id
    async fn probe(&self, session: &Session, vendor_id: &str) -> Result<ProbeResponse, FetchError>;
}

/// Probe that talks to the real activity endpoint over HTTP
pub struct HttpProbe {
    config: ProbeConfig,
}

impl HttpProbe {
    /// Create a probe from configuration
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// Encoded `body` parameter carrying the vendor id
    fn body_param(&self, vendor_id: &str) -> String {
        serde_json::json!({
            "venderId": vendor_id,
            "source": self.config.source,
        })
        .to_string()
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn open_session(&self, profile: &FingerprintProfile) -> Result<Session, FetchError> {
        Session::new(
            &profile.user_agent,
            self.timeout(),
            self.config.proxy.as_deref(),
        )
    }

    async fn warm_up(&self, session: &Session) -> Result<(), FetchError> {
        let Some(url) = self.config.warm_up_url.as_deref() else {
            return Ok(());
        };

        let response = session
            .client()
            .get(url)
            .headers(build_navigation_headers(session.user_agent()))
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "Warm-up navigation finished");
        if status.is_success() {
            Ok(())
        } else {
            Err(FetchError::ServerError(status.as_u16()))
        }
    }

    async fn probe(&self, session: &Session, vendor_id: &str) -> Result<ProbeResponse, FetchError> {
        let body = self.body_param(vendor_id);
        let form = [
            ("functionId", self.config.function_id.as_str()),
            ("body", body.as_str()),
            ("appid", self.config.app_id.as_str()),
            ("clientVersion", self.config.client_version.as_str()),
            ("client", self.config.client.as_str()),
        ];
        let referer = shop_referer(&self.config.referer_base, vendor_id);
        let headers = build_probe_headers(session.user_agent(), &self.config.origin, &referer);

        let response = session
            .client()
            .post(&self.config.endpoint)
            .headers(headers)
            .form(&form)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::ServerError(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(FetchError::from_reqwest)?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// Look up the public address requests leave from
pub async fn egress_ip(url: &str, timeout: Duration) -> Result<String, FetchError> {
    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| FetchError::Session(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(FetchError::from_reqwest)?;
    let text = response.text().await.map_err(FetchError::from_reqwest)?;
    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_success_with_url() {
        let body = r#"{"code":"0","result":{"signStatus":{"isvUrl":"https://x/?a=1&token=abc"}}}"#;
        let response: ProbeResponse = serde_json::from_str(body).unwrap();
        assert!(response.is_success());
        assert_eq!(response.isv_url(), Some("https://x/?a=1&token=abc"));
    }

    #[test]
    fn test_response_numeric_code() {
        let response: ProbeResponse = serde_json::from_str(r#"{"code":3,"msg":"busy"}"#).unwrap();
        assert_eq!(response.code, "3");
        assert!(!response.is_success());
        assert_eq!(response.msg.as_deref(), Some("busy"));
    }

    #[test]
    fn test_response_missing_fields() {
        let response: ProbeResponse = serde_json::from_str(r#"{"code":"0","result":{}}"#).unwrap();
        assert!(response.is_success());
        assert_eq!(response.isv_url(), None);

        let empty: ProbeResponse = serde_json::from_str("{}").unwrap();
        assert!(!empty.is_success());
    }

    #[test]
    fn test_body_param() {
        let probe = HttpProbe::new(ProbeConfig::default());
        let body: serde_json::Value = serde_json::from_str(&probe.body_param("123")).unwrap();
        assert_eq!(body["venderId"], "123");
        assert_eq!(body["source"], "m-shop");
    }

    #[test]
    fn test_session_rejects_bad_proxy() {
        let result = Session::new("ua", Duration::from_secs(1), Some("::not a proxy::"));
        assert!(result.is_err());
    }
}
