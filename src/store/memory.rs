//! In-memory store implementation.
//!
//! Backs the test suite and small single-process deployments. The
//! conditional transitions hold the write lock across check-and-set,
//! which is what makes them behave like the per-row conditional update
//! a real store would provide.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::traits::{AvailabilityStore, MeetingStore, StoreError};
use crate::types::{AvailabilitySlot, Meeting, MeetingState, MeetingWindow, SlotState};

/// In-memory slot and meeting store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    slots: Arc<RwLock<HashMap<String, AvailabilitySlot>>>,
    meetings: Arc<RwLock<HashMap<String, Meeting>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of slots, any state.
    pub async fn slot_count(&self) -> usize {
        self.slots.read().await.len()
    }

    /// Total number of meetings, any state.
    pub async fn meeting_count(&self) -> usize {
        self.meetings.read().await.len()
    }
}

#[async_trait]
impl AvailabilityStore for MemoryStore {
    async fn insert_slots(
        &self,
        slots: Vec<AvailabilitySlot>,
    ) -> Result<Option<String>, StoreError> {
        let mut guard = self.slots.write().await;

        if let Some(slot) = slots.iter().find(|s| guard.contains_key(&s.id)) {
            return Err(StoreError::Duplicate(slot.id.clone()));
        }
        // Overlap check under the same write lock as the insert, so two
        // concurrent submissions cannot both pass validation.
        for (i, slot) in slots.iter().enumerate() {
            let conflict = guard
                .values()
                .chain(slots[..i].iter())
                .find(|other| {
                    other.owner == slot.owner
                        && other.occupies_calendar()
                        && other.window().overlaps(&slot.window())
                });
            if let Some(conflict) = conflict {
                return Ok(Some(conflict.id.clone()));
            }
        }
        for slot in slots {
            guard.insert(slot.id.clone(), slot);
        }
        Ok(None)
    }

    async fn get_slot(&self, id: &str) -> Result<Option<AvailabilitySlot>, StoreError> {
        Ok(self.slots.read().await.get(id).cloned())
    }

    async fn slots_by_owner(&self, owner: &str) -> Result<Vec<AvailabilitySlot>, StoreError> {
        Ok(self
            .slots
            .read()
            .await
            .values()
            .filter(|s| s.owner == owner)
            .cloned()
            .collect())
    }

    async fn open_slots_matching(
        &self,
        window: &MeetingWindow,
    ) -> Result<Vec<AvailabilitySlot>, StoreError> {
        Ok(self
            .slots
            .read()
            .await
            .values()
            .filter(|s| s.state == SlotState::Open && s.matches_window(window))
            .cloned()
            .collect())
    }

    async fn try_transition_slot(
        &self,
        id: &str,
        from: SlotState,
        to: SlotState,
    ) -> Result<bool, StoreError> {
        let mut guard = self.slots.write().await;
        match guard.get_mut(id) {
            Some(slot) if slot.state == from => {
                slot.state = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl MeetingStore for MemoryStore {
    async fn insert_meeting(&self, meeting: Meeting) -> Result<(), StoreError> {
        let mut guard = self.meetings.write().await;
        if guard.contains_key(&meeting.id) {
            return Err(StoreError::Duplicate(meeting.id));
        }
        guard.insert(meeting.id.clone(), meeting);
        Ok(())
    }

    async fn get_meeting(&self, id: &str) -> Result<Option<Meeting>, StoreError> {
        Ok(self.meetings.read().await.get(id).cloned())
    }

    async fn meetings_by_user(
        &self,
        user: &str,
        state: Option<MeetingState>,
    ) -> Result<Vec<Meeting>, StoreError> {
        Ok(self
            .meetings
            .read()
            .await
            .values()
            .filter(|m| m.is_party(user) && state.map_or(true, |s| m.state == s))
            .cloned()
            .collect())
    }

    async fn meetings_between(&self, a: &str, b: &str) -> Result<Vec<Meeting>, StoreError> {
        Ok(self
            .meetings
            .read()
            .await
            .values()
            .filter(|m| m.is_party(a) && m.is_party(b))
            .cloned()
            .collect())
    }

    async fn try_transition_meeting(
        &self,
        id: &str,
        from: MeetingState,
        to: MeetingState,
    ) -> Result<bool, StoreError> {
        let mut guard = self.meetings.write().await;
        match guard.get_mut(id) {
            Some(meeting) if meeting.state == from => {
                meeting.state = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_meeting_score(
        &self,
        id: &str,
        score: u8,
        reasons: serde_json::Value,
    ) -> Result<bool, StoreError> {
        let mut guard = self.meetings.write().await;
        match guard.get_mut(id) {
            Some(meeting) => {
                meeting.compatibility_score = score;
                meeting.compatibility_reasons = reasons;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
