//! Meeting lifecycle manager.
//!
//! Drives a committed meeting out of `Scheduled` into one of its three
//! terminal states, applying the compensating transition to both
//! consumed slots. The meeting-state flip itself is a conditional
//! update, so two parties racing to close the same meeting resolve to
//! exactly one winner.

use std::sync::Arc;

use tracing::{info, warn};

use crate::store::{AvailabilityStore, MeetingStore};
use crate::types::{EngineError, Meeting, MeetingState, Result, SlotState};

/// Manages transitions of committed meetings.
pub struct LifecycleManager {
    availability: Arc<dyn AvailabilityStore>,
    meetings: Arc<dyn MeetingStore>,
}

impl LifecycleManager {
    pub fn new(availability: Arc<dyn AvailabilityStore>, meetings: Arc<dyn MeetingStore>) -> Self {
        Self {
            availability,
            meetings,
        }
    }

    /// Cancel a scheduled meeting. Either party may cancel; both slots
    /// revert to `Open` and become available for rematching.
    pub async fn cancel(&self, meeting_id: &str, acting_user: &str) -> Result<Meeting> {
        self.close(meeting_id, Some(acting_user), MeetingState::Cancelled, SlotState::Open)
            .await
    }

    /// Complete a scheduled meeting. Either party may mark it; both
    /// slots move to `Completed` and stay in the already-met history.
    pub async fn complete(&self, meeting_id: &str, acting_user: &str) -> Result<Meeting> {
        self.close(
            meeting_id,
            Some(acting_user),
            MeetingState::Completed,
            SlotState::Completed,
        )
        .await
    }

    /// Mark a no-show. Operator/administrative path only, so no party
    /// check; slots are consumed like a completion.
    pub async fn mark_no_show(&self, meeting_id: &str) -> Result<Meeting> {
        self.close(meeting_id, None, MeetingState::NoShow, SlotState::Completed)
            .await
    }

    async fn close(
        &self,
        meeting_id: &str,
        actor: Option<&str>,
        to: MeetingState,
        slot_target: SlotState,
    ) -> Result<Meeting> {
        let mut meeting = self
            .meetings
            .get_meeting(meeting_id)
            .await?
            .ok_or_else(|| EngineError::MeetingNotFound(meeting_id.to_string()))?;

        if let Some(actor) = actor {
            if !meeting.is_party(actor) {
                return Err(EngineError::Unauthorized {
                    user: actor.to_string(),
                    resource: format!("meeting {meeting_id}"),
                });
            }
        }

        if meeting.state.is_terminal() {
            return Err(EngineError::InvalidTransition {
                meeting: meeting_id.to_string(),
                from: meeting.state,
            });
        }

        let won = self
            .meetings
            .try_transition_meeting(meeting_id, MeetingState::Scheduled, to)
            .await?;
        if !won {
            // Lost a race against another closer; report the state that
            // actually stuck.
            let from = self
                .meetings
                .get_meeting(meeting_id)
                .await?
                .map(|m| m.state)
                .unwrap_or(MeetingState::Scheduled);
            return Err(EngineError::InvalidTransition {
                meeting: meeting_id.to_string(),
                from,
            });
        }

        for slot_id in [&meeting.slot_a, &meeting.slot_b] {
            let flipped = self
                .availability
                .try_transition_slot(slot_id, SlotState::Reserved, slot_target)
                .await?;
            if !flipped {
                // A reserved slot of a scheduled meeting should always
                // flip; anything else is an integrity fault worth noise.
                warn!(
                    meeting_id = %meeting_id,
                    slot_id = %slot_id,
                    target = ?slot_target,
                    "Slot was not Reserved while its meeting closed"
                );
            }
        }

        meeting.state = to;
        info!(
            meeting_id = %meeting_id,
            state = ?to,
            actor = actor.unwrap_or("operator"),
            "Meeting closed"
        );
        Ok(meeting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    use crate::store::MemoryStore;
    use crate::time::ClockTime;
    use crate::types::{AvailabilitySlot, MeetingWindow};

    async fn scheduled_meeting(store: &Arc<MemoryStore>) -> Meeting {
        let window = MeetingWindow::new(
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            ClockTime::parse("10:00").unwrap(),
            15,
        );
        let mut slot_a = AvailabilitySlot::open("alice", &window, Utc::now());
        let mut slot_b = AvailabilitySlot::open("bob", &window, Utc::now());
        slot_a.state = SlotState::Reserved;
        slot_b.state = SlotState::Reserved;
        store
            .insert_slots(vec![slot_a.clone(), slot_b.clone()])
            .await
            .unwrap();

        let meeting = Meeting {
            id: uuid::Uuid::new_v4().to_string(),
            party_a: "alice".into(),
            party_b: "bob".into(),
            slot_a: slot_a.id,
            slot_b: slot_b.id,
            date: window.date,
            time_of_day: window.time_of_day,
            duration_minutes: window.duration_minutes,
            compatibility_score: 75,
            compatibility_reasons: serde_json::json!({}),
            state: MeetingState::Scheduled,
            join_url: "https://example.test/j/x".into(),
            scheduled_at: Utc::now(),
        };
        store.insert_meeting(meeting.clone()).await.unwrap();
        meeting
    }

    fn manager(store: &Arc<MemoryStore>) -> LifecycleManager {
        LifecycleManager::new(store.clone(), store.clone())
    }

    async fn slot_state(store: &MemoryStore, id: &str) -> SlotState {
        crate::store::AvailabilityStore::get_slot(store, id)
            .await
            .unwrap()
            .unwrap()
            .state
    }

    #[tokio::test]
    async fn test_cancel_reopens_both_slots() {
        let store = Arc::new(MemoryStore::new());
        let meeting = scheduled_meeting(&store).await;

        let closed = manager(&store).cancel(&meeting.id, "bob").await.unwrap();
        assert_eq!(closed.state, MeetingState::Cancelled);
        assert_eq!(slot_state(&store, &meeting.slot_a).await, SlotState::Open);
        assert_eq!(slot_state(&store, &meeting.slot_b).await, SlotState::Open);
    }

    #[tokio::test]
    async fn test_complete_consumes_both_slots() {
        let store = Arc::new(MemoryStore::new());
        let meeting = scheduled_meeting(&store).await;

        let closed = manager(&store).complete(&meeting.id, "alice").await.unwrap();
        assert_eq!(closed.state, MeetingState::Completed);
        assert_eq!(slot_state(&store, &meeting.slot_a).await, SlotState::Completed);
        assert_eq!(slot_state(&store, &meeting.slot_b).await, SlotState::Completed);
    }

    #[tokio::test]
    async fn test_terminal_states_reject_transitions() {
        let store = Arc::new(MemoryStore::new());
        let meeting = scheduled_meeting(&store).await;
        let manager = manager(&store);

        manager.complete(&meeting.id, "alice").await.unwrap();

        let retry = manager.cancel(&meeting.id, "alice").await;
        assert!(matches!(
            retry,
            Err(EngineError::InvalidTransition {
                from: MeetingState::Completed,
                ..
            })
        ));
        let retry = manager.complete(&meeting.id, "bob").await;
        assert!(matches!(retry, Err(EngineError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_only_parties_may_close() {
        let store = Arc::new(MemoryStore::new());
        let meeting = scheduled_meeting(&store).await;

        let result = manager(&store).cancel(&meeting.id, "mallory").await;
        assert!(matches!(result, Err(EngineError::Unauthorized { .. })));
        // Meeting untouched.
        let stored = crate::store::MeetingStore::get_meeting(store.as_ref(), &meeting.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.state, MeetingState::Scheduled);
    }

    #[tokio::test]
    async fn test_no_show_is_operator_only_and_terminal() {
        let store = Arc::new(MemoryStore::new());
        let meeting = scheduled_meeting(&store).await;
        let manager = manager(&store);

        let closed = manager.mark_no_show(&meeting.id).await.unwrap();
        assert_eq!(closed.state, MeetingState::NoShow);
        assert_eq!(slot_state(&store, &meeting.slot_a).await, SlotState::Completed);

        let retry = manager.mark_no_show(&meeting.id).await;
        assert!(matches!(retry, Err(EngineError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_racing_closers_have_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let meeting = scheduled_meeting(&store).await;

        let (m1, m2) = (manager(&store), manager(&store));
        let (id1, id2) = (meeting.id.clone(), meeting.id.clone());
        let (cancel, complete) = tokio::join!(
            tokio::spawn(async move { m1.cancel(&id1, "alice").await }),
            tokio::spawn(async move { m2.complete(&id2, "bob").await }),
        );
        let outcomes = [cancel.unwrap(), complete.unwrap()];
        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);

        let stored = crate::store::MeetingStore::get_meeting(store.as_ref(), &meeting.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.state.is_terminal());
    }

    #[tokio::test]
    async fn test_unknown_meeting() {
        let store = Arc::new(MemoryStore::new());
        let result = manager(&store).cancel("missing", "alice").await;
        assert!(matches!(result, Err(EngineError::MeetingNotFound(_))));
    }
}
