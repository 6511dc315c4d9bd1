//! Scan engine and its collaborators
//!
//! ```text
//! RetryRoundController
//!        │ run_round(tag, queue)
//!        ▼
//!   ScanEngine ──acquire──▶ IdentityManager
//!        │ probe                 │ open_session / warm_up
//!        ▼                       ▼
//!      Probe ◀───────────────────┘
//!        │ response
//!        ▼
//!    classify ─▶ ScanOutcome ─▶ BackoffController
//! ```

pub mod backoff;
pub mod classify;
pub mod engine;
pub mod headers;
pub mod probe;
pub mod rounds;

pub use backoff::{BackoffController, BackoffDecision, DelayWindow};
pub use classify::{classify, extract_token};
pub use engine::{EngineSettings, ParseErrorPolicy, RoundResult, RoundStop, ScanEngine};
pub use probe::{HttpProbe, Probe, ProbeResponse, Session};
pub use rounds::{RetryRoundController, RetrySummary, RoundPolicy, RoundTag, RunOutcome};
