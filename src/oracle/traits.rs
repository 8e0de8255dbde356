//! Core trait for the compatibility oracle.
//!
//! The oracle is an external AI service: given two users it returns a
//! 0-100 score plus an opaque reasons payload. The engine treats it as a
//! black box that may fail or time out; how the score is produced is not
//! part of this crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error types for oracle calls.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OracleError {
    /// Oracle is not reachable
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// Call exceeded its deadline
    #[error("oracle call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Request was rejected or failed
    #[error("oracle request failed: {0}")]
    RequestFailed(String),

    /// Response could not be interpreted
    #[error("oracle parse error: {0}")]
    ParseError(String),
}

/// Score and explanation for one user pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    /// Compatibility score, 0-100
    pub score: u8,
    /// Opaque explanatory payload, stored with the meeting for display
    pub reasons: serde_json::Value,
}

/// External compatibility scoring function.
#[async_trait]
pub trait CompatibilityOracle: Send + Sync {
    /// Score one user against another.
    ///
    /// Calls are read-only and idempotent; the engine may issue them
    /// concurrently and bounds each with its own timeout.
    async fn score(&self, user_a: &str, user_b: &str) -> Result<CompatibilityReport, OracleError>;
}
