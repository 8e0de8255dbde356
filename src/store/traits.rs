//! Repository traits for the availability and meeting stores.
//!
//! The engine's correctness under concurrent commits rests on a single
//! primitive: the conditional state transition (`set state = to where
//! id = X and state = from`). Any storage engine that can express that
//! write can back this engine; everything else here is plain
//! get/list/insert.

use async_trait::async_trait;

use crate::types::{AvailabilitySlot, Meeting, MeetingState, MeetingWindow, SlotId, SlotState};

/// Error types for storage backends.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Insert collided with an existing id
    #[error("duplicate id: {0}")]
    Duplicate(String),

    /// Backend failure (connection, serialization, ...)
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Read/write access to declared availability slots.
#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    /// Conditionally persist a batch of freshly minted slots.
    ///
    /// The overlap check and the insert are one atomic step, like the
    /// conditional transitions: if any slot in the batch overlaps a
    /// non-withdrawn slot of the same owner (already stored or earlier
    /// in the batch), nothing is written and the conflicting slot's id
    /// is returned. `Ok(None)` means the whole batch was persisted.
    async fn insert_slots(
        &self,
        slots: Vec<AvailabilitySlot>,
    ) -> Result<Option<SlotId>, StoreError>;

    /// Fetch one slot by id.
    async fn get_slot(&self, id: &str) -> Result<Option<AvailabilitySlot>, StoreError>;

    /// All slots declared by an owner, any state.
    async fn slots_by_owner(&self, owner: &str) -> Result<Vec<AvailabilitySlot>, StoreError>;

    /// All `Open` slots matching the exact (date, time, duration) triple.
    ///
    /// Result order is undefined.
    async fn open_slots_matching(
        &self,
        window: &MeetingWindow,
    ) -> Result<Vec<AvailabilitySlot>, StoreError>;

    /// Conditional state transition: succeeds (returns `true`) only if
    /// the slot exists and is currently in `from`. Returns `false`
    /// without writing otherwise.
    async fn try_transition_slot(
        &self,
        id: &str,
        from: SlotState,
        to: SlotState,
    ) -> Result<bool, StoreError>;
}

/// Read/write access to committed meetings.
#[async_trait]
pub trait MeetingStore: Send + Sync {
    /// Persist a freshly committed meeting.
    async fn insert_meeting(&self, meeting: Meeting) -> Result<(), StoreError>;

    /// Fetch one meeting by id.
    async fn get_meeting(&self, id: &str) -> Result<Option<Meeting>, StoreError>;

    /// Meetings a user is party to, optionally filtered by state.
    async fn meetings_by_user(
        &self,
        user: &str,
        state: Option<MeetingState>,
    ) -> Result<Vec<Meeting>, StoreError>;

    /// Meetings linking two users, any state.
    async fn meetings_between(&self, a: &str, b: &str) -> Result<Vec<Meeting>, StoreError>;

    /// Conditional state transition, same contract as
    /// [`AvailabilityStore::try_transition_slot`].
    async fn try_transition_meeting(
        &self,
        id: &str,
        from: MeetingState,
        to: MeetingState,
    ) -> Result<bool, StoreError>;

    /// Replace the stored compatibility payload (background re-scoring).
    ///
    /// Returns `false` if the meeting no longer exists.
    async fn update_meeting_score(
        &self,
        id: &str,
        score: u8,
        reasons: serde_json::Value,
    ) -> Result<bool, StoreError>;
}
