//! Core data model and error taxonomy for the scheduling engine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::store::StoreError;
use crate::time::{self, ClockTime, TimeError};

/// User identifier, owned by the account subsystem.
pub type UserId = String;
/// Availability slot identifier.
pub type SlotId = String;
/// Meeting identifier.
pub type MeetingId = String;

/// Meeting lengths users may offer, in minutes.
pub const ALLOWED_DURATIONS: [u16; 3] = [5, 15, 45];

/// A caller-facing time window before persistence: one calendar day,
/// a wall-clock start and a duration from the fixed enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeetingWindow {
    /// Calendar day (single canonical calendar, no timezone handling)
    pub date: NaiveDate,
    /// Wall-clock start time
    pub time_of_day: ClockTime,
    /// Duration in minutes
    pub duration_minutes: u16,
}

impl MeetingWindow {
    pub fn new(date: NaiveDate, time_of_day: ClockTime, duration_minutes: u16) -> Self {
        Self {
            date,
            time_of_day,
            duration_minutes,
        }
    }

    /// Check the duration against the allowed enumeration and that the
    /// interval stays within its calendar day.
    pub fn validate(&self) -> Result<()> {
        if !ALLOWED_DURATIONS.contains(&self.duration_minutes) {
            return Err(EngineError::MalformedInput(format!(
                "duration {} is not one of {:?}",
                self.duration_minutes, ALLOWED_DURATIONS
            )));
        }
        self.time_of_day.end_of(self.duration_minutes)?;
        Ok(())
    }

    /// Start offset in minutes since midnight.
    pub fn start_minutes(&self) -> u16 {
        self.time_of_day.minutes()
    }

    /// Same-day half-open interval intersection.
    pub fn overlaps(&self, other: &MeetingWindow) -> bool {
        self.date == other.date
            && time::overlaps(
                self.start_minutes(),
                self.duration_minutes,
                other.start_minutes(),
                other.duration_minutes,
            )
    }
}

/// Lifecycle state of an availability slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    /// Declared and matchable
    Open,
    /// Consumed by a scheduled meeting
    Reserved,
    /// Its meeting completed; permanently unavailable
    Completed,
    /// Deleted by its owner while still open
    Withdrawn,
}

/// A single declared window of time a user is willing to meet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    /// Unique slot ID
    pub id: SlotId,
    /// Declaring user
    pub owner: UserId,
    /// Calendar day
    pub date: NaiveDate,
    /// Wall-clock start time
    pub time_of_day: ClockTime,
    /// Duration in minutes
    pub duration_minutes: u16,
    /// Lifecycle state
    pub state: SlotState,
    /// When the owner submitted the slot
    pub created_at: DateTime<Utc>,
}

impl AvailabilitySlot {
    /// Mint a fresh open slot from a submitted window.
    pub fn open(owner: impl Into<UserId>, window: &MeetingWindow, created_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner: owner.into(),
            date: window.date,
            time_of_day: window.time_of_day,
            duration_minutes: window.duration_minutes,
            state: SlotState::Open,
            created_at,
        }
    }

    /// The window this slot was created from.
    pub fn window(&self) -> MeetingWindow {
        MeetingWindow::new(self.date, self.time_of_day, self.duration_minutes)
    }

    /// Exact (date, time, duration) triple equality — the matching key.
    pub fn matches_window(&self, window: &MeetingWindow) -> bool {
        self.date == window.date
            && self.time_of_day == window.time_of_day
            && self.duration_minutes == window.duration_minutes
    }

    /// Counts toward the owner's no-self-overlap invariant.
    pub fn occupies_calendar(&self) -> bool {
        self.state != SlotState::Withdrawn
    }
}

/// Lifecycle state of a committed meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingState {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl MeetingState {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        !matches!(self, MeetingState::Scheduled)
    }
}

/// A committed two-party meeting consuming two availability slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    /// Unique meeting ID
    pub id: MeetingId,
    /// Requesting party
    pub party_a: UserId,
    /// Matched counterpart
    pub party_b: UserId,
    /// Requester's consumed slot
    pub slot_a: SlotId,
    /// Counterpart's consumed slot
    pub slot_b: SlotId,
    /// Calendar day, copied from the matched slots at commit time
    pub date: NaiveDate,
    /// Wall-clock start, copied at commit time
    pub time_of_day: ClockTime,
    /// Duration in minutes, copied at commit time
    pub duration_minutes: u16,
    /// Compatibility score from the oracle (0-100)
    pub compatibility_score: u8,
    /// Opaque reasons payload from the oracle, kept for display/audit
    pub compatibility_reasons: serde_json::Value,
    /// Lifecycle state
    pub state: MeetingState,
    /// Join link, generated once at commit
    pub join_url: String,
    /// When the meeting was committed
    pub scheduled_at: DateTime<Utc>,
}

impl Meeting {
    /// Whether the user is one of the two parties.
    pub fn is_party(&self, user: &str) -> bool {
        self.party_a == user || self.party_b == user
    }

    /// The other party, if the user is a party at all.
    pub fn counterpart_of(&self, user: &str) -> Option<&UserId> {
        if self.party_a == user {
            Some(&self.party_b)
        } else if self.party_b == user {
            Some(&self.party_a)
        } else {
            None
        }
    }
}

/// Profile attributes consulted by optional eligibility rules.
///
/// Owned by the profile subsystem; the engine only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    /// Free-form locality label (e.g. metro area)
    pub locality: Option<String>,
    /// Free-form career/life stage label
    pub stage: Option<String>,
}

/// Error types for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Bad time/date/duration values
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Window starts strictly before "now"
    #[error("window {date} {time_of_day} starts in the past")]
    PastWindow { date: NaiveDate, time_of_day: ClockTime },

    /// Window overlaps a non-withdrawn slot of the same owner
    #[error("window overlaps existing slot {conflicting_slot}")]
    ConflictingWindow { conflicting_slot: SlotId },

    /// Lost a race at commit time; caller should re-run matching
    #[error("slot {0} is no longer available")]
    SlotNoLongerAvailable(SlotId),

    /// Operation not legal for the slot's current lifecycle state
    #[error("slot {slot} is {actual:?}, operation requires {required:?}")]
    InvalidState {
        slot: SlotId,
        required: SlotState,
        actual: SlotState,
    },

    /// Transition attempted from a terminal meeting state
    #[error("meeting {meeting} cannot transition out of {from:?}")]
    InvalidTransition { meeting: MeetingId, from: MeetingState },

    /// Actor is not a party to the resource
    #[error("user {user} is not authorized to act on {resource}")]
    Unauthorized { user: UserId, resource: String },

    /// Scoring failed or timed out for every candidate of a window
    #[error("compatibility oracle unavailable for all candidates")]
    OracleUnavailable,

    /// Unknown slot id
    #[error("slot {0} not found")]
    SlotNotFound(SlotId),

    /// Unknown meeting id
    #[error("meeting {0} not found")]
    MeetingNotFound(MeetingId),

    /// Storage backend failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<TimeError> for EngineError {
    fn from(err: TimeError) -> Self {
        EngineError::MalformedInput(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
