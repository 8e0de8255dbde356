//! Mock compatibility oracle for testing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::traits::*;

/// Mock oracle with scripted scores, failure and latency injection.
pub struct MockOracle {
    default_score: u8,
    scores: HashMap<String, u8>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    call_count: AtomicU32,
}

impl MockOracle {
    /// Create a mock returning `default_score` for every pair.
    pub fn new(default_score: u8) -> Self {
        Self {
            default_score,
            scores: HashMap::new(),
            failing: HashSet::new(),
            delay: None,
            call_count: AtomicU32::new(0),
        }
    }

    /// Script the score returned whenever `user` is either side of the
    /// pair.
    pub fn with_score(mut self, user: impl Into<String>, score: u8) -> Self {
        self.scores.insert(user.into(), score);
        self
    }

    /// Make any call involving `user` fail.
    pub fn with_failure(mut self, user: impl Into<String>) -> Self {
        self.failing.insert(user.into());
        self
    }

    /// Delay every call, for timeout tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of score calls made.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new(50)
    }
}

#[async_trait]
impl CompatibilityOracle for MockOracle {
    async fn score(&self, user_a: &str, user_b: &str) -> Result<CompatibilityReport, OracleError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.contains(user_a) || self.failing.contains(user_b) {
            return Err(OracleError::Unavailable("mock oracle failure".to_string()));
        }

        let score = self
            .scores
            .get(user_b)
            .or_else(|| self.scores.get(user_a))
            .copied()
            .unwrap_or(self.default_score);

        Ok(CompatibilityReport {
            score,
            reasons: serde_json::json!({
                "summary": format!("mock pairing of {user_a} and {user_b}"),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_scores() {
        let oracle = MockOracle::new(40).with_score("bob", 90);

        assert_eq!(oracle.score("alice", "bob").await.unwrap().score, 90);
        assert_eq!(oracle.score("alice", "carol").await.unwrap().score, 40);
        assert_eq!(oracle.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let oracle = MockOracle::default().with_failure("bob");

        assert!(oracle.score("alice", "bob").await.is_err());
        assert!(oracle.score("alice", "carol").await.is_ok());
    }
}
