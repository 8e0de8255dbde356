//! Eligibility filter: who may be matched against a given window.
//!
//! Candidates are open slots with the exact same (date, time, duration)
//! triple. Matching to slot granularity rather than interval overlap is
//! product policy and keeps candidate lookup linear in pool size.

use std::sync::Arc;

use tracing::debug;

use crate::social::{SocialGraph, UserDirectory};
use crate::store::AvailabilityStore;
use crate::types::{AvailabilitySlot, MeetingWindow, Result, UserProfile};

/// Pluggable predicate over candidate profiles.
///
/// Locality/stage policy mapping is product policy supplied by the
/// caller, never hard-coded here. A candidate without a directory
/// profile fails every rule other than [`ProfileRule::Any`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileRule {
    /// Always matches
    Any,
    /// Matches candidates with this locality
    LocalityIs(String),
    /// Matches candidates with this stage
    StageIs(String),
    /// Logical AND of rules
    All(Vec<ProfileRule>),
    /// Logical OR of rules
    AnyOf(Vec<ProfileRule>),
}

impl ProfileRule {
    /// Evaluate the rule against a candidate profile.
    pub fn evaluate(&self, profile: &UserProfile) -> bool {
        match self {
            ProfileRule::Any => true,
            ProfileRule::LocalityIs(locality) => profile.locality.as_deref() == Some(locality),
            ProfileRule::StageIs(stage) => profile.stage.as_deref() == Some(stage),
            ProfileRule::All(rules) => rules.iter().all(|r| r.evaluate(profile)),
            ProfileRule::AnyOf(rules) => rules.iter().any(|r| r.evaluate(profile)),
        }
    }
}

/// Computes the candidate pool for one requester and window.
pub struct EligibilityFilter {
    availability: Arc<dyn AvailabilityStore>,
    social: Arc<dyn SocialGraph>,
    directory: Arc<dyn UserDirectory>,
}

impl EligibilityFilter {
    pub fn new(
        availability: Arc<dyn AvailabilityStore>,
        social: Arc<dyn SocialGraph>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            availability,
            social,
            directory,
        }
    }

    /// Eligible open slots for the exact window triple.
    ///
    /// Excludes the requester's own slots, anyone sharing a meeting
    /// record with the requester (any state) and anyone in a block
    /// relation with the requester (either direction). Result order is
    /// undefined; callers must not rely on it.
    pub async fn candidates(
        &self,
        requester: &str,
        window: &MeetingWindow,
        rule: &ProfileRule,
    ) -> Result<Vec<AvailabilitySlot>> {
        let pool = self.availability.open_slots_matching(window).await?;
        let pool_size = pool.len();

        let mut eligible = Vec::with_capacity(pool.len());
        for slot in pool {
            if slot.owner == requester {
                continue;
            }
            if self.social.have_met_before(requester, &slot.owner).await? {
                continue;
            }
            if self.social.is_blocked(requester, &slot.owner).await? {
                continue;
            }
            if !matches!(rule, ProfileRule::Any) {
                let passes = match self.directory.profile(&slot.owner).await? {
                    Some(profile) => rule.evaluate(&profile),
                    None => false,
                };
                if !passes {
                    continue;
                }
            }
            eligible.push(slot);
        }

        debug!(
            requester = %requester,
            date = %window.date,
            time = %window.time_of_day,
            pool = pool_size,
            eligible = eligible.len(),
            "Computed candidate pool"
        );

        Ok(eligible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    use crate::social::{MeetingHistoryGraph, StaticDirectory};
    use crate::store::traits::MeetingStore;
    use crate::store::MemoryStore;
    use crate::time::ClockTime;
    use crate::types::{Meeting, MeetingState};

    fn window(time: &str, duration: u16) -> MeetingWindow {
        MeetingWindow::new(
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            ClockTime::parse(time).unwrap(),
            duration,
        )
    }

    async fn fixture() -> (Arc<MemoryStore>, Arc<MeetingHistoryGraph>, Arc<StaticDirectory>, EligibilityFilter)
    {
        let store = Arc::new(MemoryStore::new());
        let social = Arc::new(MeetingHistoryGraph::new(store.clone()));
        let directory = Arc::new(StaticDirectory::new());
        let filter =
            EligibilityFilter::new(store.clone(), social.clone(), directory.clone());
        (store, social, directory, filter)
    }

    async fn seed_slot(store: &MemoryStore, owner: &str, w: &MeetingWindow) -> AvailabilitySlot {
        let slot = AvailabilitySlot::open(owner, w, Utc::now());
        store.insert_slots(vec![slot.clone()]).await.unwrap();
        slot
    }

    #[tokio::test]
    async fn test_excludes_requester_and_requires_exact_triple() {
        let (store, _social, _dir, filter) = fixture().await;
        let w = window("10:00", 15);

        seed_slot(&store, "requester", &w).await;
        let theirs = seed_slot(&store, "other", &w).await;
        // Overlapping interval, different start: not a candidate.
        seed_slot(&store, "near-miss", &window("10:05", 15)).await;
        // Same start, different duration: not a candidate.
        seed_slot(&store, "wrong-duration", &window("10:00", 45)).await;

        let candidates = filter
            .candidates("requester", &w, &ProfileRule::Any)
            .await
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, theirs.id);
    }

    #[tokio::test]
    async fn test_excludes_blocked_either_direction() {
        let (store, social, _dir, filter) = fixture().await;
        let w = window("10:00", 15);
        seed_slot(&store, "bob", &w).await;

        social.block("bob", "alice").await;
        assert!(filter
            .candidates("alice", &w, &ProfileRule::Any)
            .await
            .unwrap()
            .is_empty());

        // And symmetrically from the other side.
        seed_slot(&store, "alice", &w).await;
        assert!(filter
            .candidates("bob", &w, &ProfileRule::Any)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_excludes_already_met_any_state() {
        let (store, _social, _dir, filter) = fixture().await;
        let w = window("10:00", 15);
        seed_slot(&store, "bob", &w).await;

        store
            .insert_meeting(Meeting {
                id: "m-1".into(),
                party_a: "alice".into(),
                party_b: "bob".into(),
                slot_a: "s-1".into(),
                slot_b: "s-2".into(),
                date: w.date,
                time_of_day: w.time_of_day,
                duration_minutes: w.duration_minutes,
                compatibility_score: 60,
                compatibility_reasons: serde_json::json!({}),
                state: MeetingState::Cancelled,
                join_url: "https://example.test/j/m-1".into(),
                scheduled_at: Utc::now(),
            })
            .await
            .unwrap();

        // Even a cancelled meeting excludes the pair from rematching.
        assert!(filter
            .candidates("alice", &w, &ProfileRule::Any)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_profile_rule_filtering() {
        let (store, _social, directory, filter) = fixture().await;
        let w = window("10:00", 15);
        seed_slot(&store, "bob", &w).await;
        seed_slot(&store, "carol", &w).await;
        seed_slot(&store, "dave", &w).await;

        directory
            .upsert(UserProfile {
                user_id: "bob".into(),
                locality: Some("berlin".into()),
                stage: Some("senior".into()),
            })
            .await;
        directory
            .upsert(UserProfile {
                user_id: "carol".into(),
                locality: Some("hamburg".into()),
                stage: Some("senior".into()),
            })
            .await;
        // dave has no profile: fails any non-trivial rule.

        let rule = ProfileRule::All(vec![
            ProfileRule::LocalityIs("berlin".into()),
            ProfileRule::StageIs("senior".into()),
        ]);
        let candidates = filter.candidates("alice", &w, &rule).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].owner, "bob");

        let either = ProfileRule::AnyOf(vec![
            ProfileRule::LocalityIs("berlin".into()),
            ProfileRule::LocalityIs("hamburg".into()),
        ]);
        assert_eq!(filter.candidates("alice", &w, &either).await.unwrap().len(), 2);

        assert_eq!(
            filter
                .candidates("alice", &w, &ProfileRule::Any)
                .await
                .unwrap()
                .len(),
            3
        );
    }

    #[tokio::test]
    async fn test_reserved_slots_are_not_candidates() {
        let (store, _social, _dir, filter) = fixture().await;
        let w = window("10:00", 15);
        let slot = seed_slot(&store, "bob", &w).await;

        store
            .try_transition_slot(
                &slot.id,
                crate::types::SlotState::Open,
                crate::types::SlotState::Reserved,
            )
            .await
            .unwrap();

        assert!(filter
            .candidates("alice", &w, &ProfileRule::Any)
            .await
            .unwrap()
            .is_empty());
    }
}
