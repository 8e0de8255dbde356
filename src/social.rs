//! Contracts with the social-graph and profile subsystems.
//!
//! Blocks, friendships and profiles are owned elsewhere; the engine only
//! reads them when computing eligibility. `MeetingHistoryGraph` is the
//! default wiring: it answers the already-met relation from the meeting
//! store and takes block facts by injection, which is also what the test
//! suite uses.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::store::{MeetingStore, StoreError};
use crate::types::UserProfile;

/// Read-only social facts consulted by the eligibility filter.
#[async_trait]
pub trait SocialGraph: Send + Sync {
    /// Whether either user has blocked the other. Symmetric.
    async fn is_blocked(&self, a: &str, b: &str) -> Result<bool, StoreError>;

    /// Whether any meeting record links the two users, any state.
    async fn have_met_before(&self, a: &str, b: &str) -> Result<bool, StoreError>;
}

/// Read-only profile lookup for optional eligibility rules.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn profile(&self, user: &str) -> Result<Option<UserProfile>, StoreError>;
}

/// Social graph backed by the engine's own meeting history plus an
/// injected block list.
pub struct MeetingHistoryGraph {
    meetings: Arc<dyn MeetingStore>,
    blocks: RwLock<HashSet<(String, String)>>,
}

impl MeetingHistoryGraph {
    pub fn new(meetings: Arc<dyn MeetingStore>) -> Self {
        Self {
            meetings,
            blocks: RwLock::new(HashSet::new()),
        }
    }

    /// Record a block between two users. Direction does not matter.
    pub async fn block(&self, a: impl Into<String>, b: impl Into<String>) {
        let mut blocks = self.blocks.write().await;
        blocks.insert(Self::pair(a.into(), b.into()));
    }

    /// Remove a block between two users.
    pub async fn unblock(&self, a: &str, b: &str) {
        let mut blocks = self.blocks.write().await;
        blocks.remove(&Self::pair(a.to_string(), b.to_string()));
    }

    fn pair(a: String, b: String) -> (String, String) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

#[async_trait]
impl SocialGraph for MeetingHistoryGraph {
    async fn is_blocked(&self, a: &str, b: &str) -> Result<bool, StoreError> {
        let blocks = self.blocks.read().await;
        Ok(blocks.contains(&Self::pair(a.to_string(), b.to_string())))
    }

    async fn have_met_before(&self, a: &str, b: &str) -> Result<bool, StoreError> {
        Ok(!self.meetings.meetings_between(a, b).await?.is_empty())
    }
}

/// Directory over a fixed profile set.
#[derive(Default)]
pub struct StaticDirectory {
    profiles: RwLock<Vec<UserProfile>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a profile.
    pub async fn upsert(&self, profile: UserProfile) {
        let mut profiles = self.profiles.write().await;
        profiles.retain(|p| p.user_id != profile.user_id);
        profiles.push(profile);
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn profile(&self, user: &str) -> Result<Option<UserProfile>, StoreError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.iter().find(|p| p.user_id == user).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_block_is_symmetric() {
        let store = Arc::new(MemoryStore::new());
        let graph = MeetingHistoryGraph::new(store);

        graph.block("alice", "bob").await;
        assert!(graph.is_blocked("alice", "bob").await.unwrap());
        assert!(graph.is_blocked("bob", "alice").await.unwrap());
        assert!(!graph.is_blocked("alice", "carol").await.unwrap());

        graph.unblock("bob", "alice").await;
        assert!(!graph.is_blocked("alice", "bob").await.unwrap());
    }

    #[tokio::test]
    async fn test_directory_lookup() {
        let directory = StaticDirectory::new();
        directory
            .upsert(UserProfile {
                user_id: "alice".into(),
                locality: Some("berlin".into()),
                stage: None,
            })
            .await;

        let profile = directory.profile("alice").await.unwrap().unwrap();
        assert_eq!(profile.locality.as_deref(), Some("berlin"));
        assert!(directory.profile("bob").await.unwrap().is_none());
    }
}
