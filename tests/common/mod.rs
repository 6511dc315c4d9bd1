//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vidscan::config::BackoffConfig;
use vidscan::identity::{FingerprintProfile, IdentityManager, RotationStrategy};
use vidscan::models::{TokenRecord, VendorId};
use vidscan::scan::{
    BackoffController, EngineSettings, ParseErrorPolicy, Probe, ProbeResponse, ScanEngine, Session,
};
use vidscan::store::{CandidateStore, TokenStore, UploadReceipt};
use vidscan::utils::error::{FetchError, StoreError};
use vidscan::utils::retry::RetryConfig;

/// Pattern the scripted probe puts into matching URLs
pub const SIGNATURE: &str = "SIG-2PAA";

/// What the scripted probe answers for one call
#[derive(Debug, Clone)]
pub enum Reply {
    Match(&'static str),
    NoMatch,
    Timeout,
    BusinessError,
    MatchWithoutToken,
}

impl Reply {
    fn into_result(self) -> Result<ProbeResponse, FetchError> {
        let body = match self {
            Reply::Match(token) => format!(
                r#"{{"code":"0","result":{{"signStatus":{{"isvUrl":"https://isv.example/{SIGNATURE}/index?a=1&token={token}&b=2"}}}}}}"#
            ),
            Reply::NoMatch => r#"{"code":"0","result":{"signStatus":{}}}"#.to_string(),
            Reply::Timeout => return Err(FetchError::Timeout),
            Reply::BusinessError => r#"{"code":"402","msg":"busy"}"#.to_string(),
            Reply::MatchWithoutToken => {
                format!(r#"{{"code":"0","result":{{"signStatus":{{"isvUrl":"https://isv.example/{SIGNATURE}/index"}}}}}}"#)
            }
        };
        Ok(serde_json::from_str(&body).expect("scripted body is valid JSON"))
    }
}

/// Probe answering from per-vendor scripts; unscripted calls get `NoMatch`
#[derive(Default)]
pub struct ScriptedProbe {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallback: Mutex<Option<Reply>>,
    calls: Mutex<Vec<String>>,
    sessions: Mutex<u32>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue replies for a vendor id, consumed in order
    pub fn script(self, vendor_id: &str, replies: Vec<Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(vendor_id.to_string(), replies.into());
        self
    }

    /// Reply used once a vendor's script is empty
    pub fn otherwise(self, reply: Reply) -> Self {
        *self.fallback.lock().unwrap() = Some(reply);
        self
    }

    /// Every probed vendor id, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sessions_opened(&self) -> u32 {
        *self.sessions.lock().unwrap()
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    fn open_session(&self, profile: &FingerprintProfile) -> Result<Session, FetchError> {
        *self.sessions.lock().unwrap() += 1;
        Session::new(&profile.user_agent, Duration::from_secs(1), None)
    }

    async fn warm_up(&self, _session: &Session) -> Result<(), FetchError> {
        Ok(())
    }

    async fn probe(&self, _session: &Session, vendor_id: &str) -> Result<ProbeResponse, FetchError> {
        self.calls.lock().unwrap().push(vendor_id.to_string());
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(vendor_id)
            .and_then(|queue| queue.pop_front());
        let reply = scripted
            .or_else(|| self.fallback.lock().unwrap().clone())
            .unwrap_or(Reply::NoMatch);
        reply.into_result()
    }
}

/// Token store keeping uploads in memory
#[derive(Default)]
pub struct MemoryTokenStore {
    pub uploaded: Mutex<Vec<TokenRecord>>,
    pub by_date: Mutex<HashMap<String, Vec<TokenRecord>>>,
}

impl MemoryTokenStore {
    pub fn uploaded(&self) -> Vec<TokenRecord> {
        self.uploaded.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn upload(&self, record: &TokenRecord) -> Result<UploadReceipt, StoreError> {
        self.uploaded.lock().unwrap().push(record.clone());
        Ok(UploadReceipt { code: 200, ok: true })
    }

    async fn query(&self, date: &str) -> Result<Vec<TokenRecord>, StoreError> {
        Ok(self
            .by_date
            .lock()
            .unwrap()
            .get(date)
            .cloned()
            .unwrap_or_default())
    }
}

/// Candidate store serving a fixed list, or failing
pub struct FixedCandidates {
    pub candidates: Option<Vec<VendorId>>,
    pub requests: Mutex<Vec<(u32, u32)>>,
}

impl FixedCandidates {
    pub fn serving(candidates: Vec<VendorId>) -> Self {
        Self {
            candidates: Some(candidates),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            candidates: None,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CandidateStore for FixedCandidates {
    async fn fetch(&self, copy: u32, copies: u32) -> Result<Vec<VendorId>, StoreError> {
        self.requests.lock().unwrap().push((copy, copies));
        self.candidates.clone().ok_or(StoreError::Status(503))
    }
}

/// `v0`, `v1`, ... `v{n-1}`
pub fn vendor_ids(n: usize) -> Vec<VendorId> {
    (0..n).map(|i| format!("v{i}")).collect()
}

/// Engine with zero backoff and a generous budget
pub fn quick_engine(
    probe: Arc<ScriptedProbe>,
    tokens: Arc<MemoryTokenStore>,
    strategy: RotationStrategy,
    max_consecutive_errors: u32,
    parse_error_policy: ParseErrorPolicy,
) -> ScanEngine {
    let settings = EngineSettings {
        target_pattern: SIGNATURE.to_string(),
        parse_error_policy,
        upload_retry: RetryConfig::with_delays(1, 1, 1),
    };
    ScanEngine::new(
        probe,
        tokens,
        IdentityManager::new(strategy, false, Some(7)),
        BackoffController::new(&BackoffConfig::immediate(max_consecutive_errors), Some(7)),
        settings,
        Duration::from_secs(600),
    )
}
