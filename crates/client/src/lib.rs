//! Haki Yetu API client
//!
//! Session-aware HTTP client for the Haki Yetu marketplace backend.
//! Every outbound call goes through the session gateway: the bearer
//! credential is attached at send time, a token already known to be
//! expired is refreshed before the request leaves the process, and an
//! unauthorized response triggers one refresh-and-retry cycle. Concurrent
//! requests share a single in-flight refresh call.

pub mod auth;
pub mod client;
pub mod error;
pub mod recovery;
pub mod session;
pub mod types;

pub use client::{HakiClient, HakiClientBuilder};
pub use error::ClientError;
pub use recovery::{LogoutReason, RecoveryDecision, RecoveryPolicy};
pub use session::SessionManager;
