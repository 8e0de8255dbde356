//! SchedulingService - main entry point for the scheduling engine.
//!
//! Wires the eligibility filter, match selector, lifecycle manager and
//! stores together behind the caller-facing API, and owns the commit
//! transaction that turns two open slots into one scheduled meeting.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Timelike};
use tracing::{debug, info, warn};

use crate::eligibility::{EligibilityFilter, ProfileRule};
use crate::lifecycle::LifecycleManager;
use crate::matching::{MatchCandidate, MatchSelector, WindowMatch};
use crate::oracle::CompatibilityOracle;
use crate::social::{SocialGraph, UserDirectory};
use crate::store::{AvailabilityStore, MeetingStore};
use crate::time::{Clock, SystemClock};
use crate::types::{
    AvailabilitySlot, EngineError, Meeting, MeetingState, MeetingWindow, Result, SlotId, SlotState,
};

/// Configuration for the scheduling service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Deadline for each individual oracle scoring call
    pub oracle_timeout: Duration,
    /// Cap on concurrent in-flight oracle calls
    pub max_concurrent_scoring: usize,
    /// Base URL for generated meeting join links
    pub join_link_base: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            oracle_timeout: Duration::from_secs(10),
            max_concurrent_scoring: 8,
            join_link_base: "https://meet.tandem.app/j".to_string(),
        }
    }
}

/// A caller-confirmed match, ready to commit.
///
/// Carries the score and reasons the caller saw when confirming, so the
/// committed meeting records exactly what was presented.
#[derive(Debug, Clone)]
pub struct MatchConfirmation {
    /// The requester's own open slot
    pub own_slot: SlotId,
    /// The chosen counterpart's open slot
    pub candidate_slot: SlotId,
    /// Compatibility score shown at confirmation
    pub score: u8,
    /// Oracle reasons payload shown at confirmation
    pub reasons: serde_json::Value,
}

impl MatchConfirmation {
    /// Build a confirmation from a selected candidate.
    pub fn from_candidate(own_slot: impl Into<SlotId>, candidate: &MatchCandidate) -> Self {
        Self {
            own_slot: own_slot.into(),
            candidate_slot: candidate.slot.id.clone(),
            score: candidate.score,
            reasons: candidate.reasons.clone(),
        }
    }
}

/// Main entry point for availability submission, matching and meeting
/// scheduling.
pub struct SchedulingService {
    config: ServiceConfig,
    clock: Arc<dyn Clock>,
    availability: Arc<dyn AvailabilityStore>,
    meetings: Arc<dyn MeetingStore>,
    social: Arc<dyn SocialGraph>,
    directory: Arc<dyn UserDirectory>,
    oracle: Arc<dyn CompatibilityOracle>,
    selector: MatchSelector,
    lifecycle: LifecycleManager,
}

impl SchedulingService {
    /// Create a service over the given collaborators with default
    /// configuration.
    pub fn new(
        availability: Arc<dyn AvailabilityStore>,
        meetings: Arc<dyn MeetingStore>,
        social: Arc<dyn SocialGraph>,
        directory: Arc<dyn UserDirectory>,
        oracle: Arc<dyn CompatibilityOracle>,
    ) -> Self {
        let config = ServiceConfig::default();
        let selector = Self::build_selector(
            &config,
            &availability,
            &social,
            &directory,
            &oracle,
        );
        let lifecycle = LifecycleManager::new(availability.clone(), meetings.clone());
        Self {
            config,
            clock: Arc::new(SystemClock),
            availability,
            meetings,
            social,
            directory,
            oracle,
            selector,
            lifecycle,
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.selector = Self::build_selector(
            &config,
            &self.availability,
            &self.social,
            &self.directory,
            &self.oracle,
        );
        self.config = config;
        self
    }

    /// Replace the clock (tests pin the calendar this way).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn build_selector(
        config: &ServiceConfig,
        availability: &Arc<dyn AvailabilityStore>,
        social: &Arc<dyn SocialGraph>,
        directory: &Arc<dyn UserDirectory>,
        oracle: &Arc<dyn CompatibilityOracle>,
    ) -> MatchSelector {
        let filter =
            EligibilityFilter::new(availability.clone(), social.clone(), directory.clone());
        MatchSelector::new(
            filter,
            oracle.clone(),
            config.oracle_timeout,
            config.max_concurrent_scoring,
        )
    }

    /// Persist a batch of windows as open slots.
    ///
    /// The whole batch is validated before anything is written: a past
    /// window, a window overlapping an existing non-withdrawn slot of
    /// the owner, or two overlapping windows within the batch itself
    /// reject the entire submission.
    pub async fn submit_availability(
        &self,
        owner: &str,
        windows: Vec<MeetingWindow>,
    ) -> Result<Vec<AvailabilitySlot>> {
        let now = self.clock.now_utc();
        let today = now.date_naive();
        let now_minutes = (now.time().hour() * 60 + now.time().minute()) as u16;

        let mut accepted: Vec<AvailabilitySlot> = Vec::with_capacity(windows.len());
        for window in &windows {
            window.validate()?;

            let in_past = window.date < today
                || (window.date == today && window.start_minutes() < now_minutes);
            if in_past {
                return Err(EngineError::PastWindow {
                    date: window.date,
                    time_of_day: window.time_of_day,
                });
            }

            accepted.push(AvailabilitySlot::open(owner, window, now));
        }

        // The overlap check lives inside the conditional insert, atomic
        // with the write; two concurrent overlapping submissions by the
        // same owner resolve to exactly one winner.
        if let Some(conflicting_slot) = self.availability.insert_slots(accepted.clone()).await? {
            return Err(EngineError::ConflictingWindow { conflicting_slot });
        }
        info!(owner = %owner, count = accepted.len(), "Availability submitted");
        Ok(accepted)
    }

    /// Withdraw an open slot. Only the owner may withdraw, and only
    /// while the slot is still `Open`.
    pub async fn withdraw_availability(&self, slot_id: &str, owner: &str) -> Result<()> {
        let slot = self
            .availability
            .get_slot(slot_id)
            .await?
            .ok_or_else(|| EngineError::SlotNotFound(slot_id.to_string()))?;

        if slot.owner != owner {
            return Err(EngineError::Unauthorized {
                user: owner.to_string(),
                resource: format!("slot {slot_id}"),
            });
        }

        let withdrawn = self
            .availability
            .try_transition_slot(slot_id, SlotState::Open, SlotState::Withdrawn)
            .await?;
        if !withdrawn {
            let actual = self
                .availability
                .get_slot(slot_id)
                .await?
                .map(|s| s.state)
                .ok_or_else(|| EngineError::SlotNotFound(slot_id.to_string()))?;
            return Err(EngineError::InvalidState {
                slot: slot_id.to_string(),
                required: SlotState::Open,
                actual,
            });
        }

        info!(owner = %owner, slot_id = %slot_id, "Availability withdrawn");
        Ok(())
    }

    /// List an owner's slots, optionally from a date and/or in a state.
    pub async fn list_availability(
        &self,
        owner: &str,
        date_from: Option<NaiveDate>,
        state: Option<SlotState>,
    ) -> Result<Vec<AvailabilitySlot>> {
        let mut slots: Vec<AvailabilitySlot> = self
            .availability
            .slots_by_owner(owner)
            .await?
            .into_iter()
            .filter(|s| date_from.map_or(true, |d| s.date >= d))
            .filter(|s| state.map_or(true, |st| s.state == st))
            .collect();
        slots.sort_by(|a, b| (a.date, a.time_of_day).cmp(&(b.date, b.time_of_day)));
        Ok(slots)
    }

    /// Find the best counterpart for each window, independently.
    pub async fn find_best_matches(
        &self,
        owner: &str,
        windows: Vec<MeetingWindow>,
        rule: Option<ProfileRule>,
    ) -> Result<Vec<WindowMatch>> {
        self.selector
            .find_best_matches(owner, windows, &rule.unwrap_or(ProfileRule::Any))
            .await
    }

    /// Commit a confirmed match: two open slots become one scheduled
    /// meeting, or nothing changes at all.
    ///
    /// Both slots are re-validated at commit time with a conditional
    /// `Open -> Reserved` write; losing either race yields
    /// [`EngineError::SlotNoLongerAvailable`] and any already-applied
    /// step is compensated. The caller re-runs matching on that error;
    /// the engine never silently substitutes a different counterpart.
    pub async fn confirm_meeting(
        &self,
        owner: &str,
        confirmation: MatchConfirmation,
    ) -> Result<Meeting> {
        let MatchConfirmation {
            own_slot: own_id,
            candidate_slot: candidate_id,
            score,
            reasons,
        } = confirmation;

        if score > 100 {
            return Err(EngineError::MalformedInput(format!(
                "score {score} outside 0-100"
            )));
        }

        let own = self
            .availability
            .get_slot(&own_id)
            .await?
            .ok_or_else(|| EngineError::SlotNotFound(own_id.clone()))?;
        if own.owner != owner {
            return Err(EngineError::Unauthorized {
                user: owner.to_string(),
                resource: format!("slot {own_id}"),
            });
        }

        let candidate = self
            .availability
            .get_slot(&candidate_id)
            .await?
            .ok_or_else(|| EngineError::SlotNoLongerAvailable(candidate_id.clone()))?;
        if candidate.owner == owner {
            return Err(EngineError::MalformedInput(
                "cannot confirm a meeting with yourself".to_string(),
            ));
        }
        if !candidate.matches_window(&own.window()) {
            return Err(EngineError::MalformedInput(
                "slots do not share the same date, time and duration".to_string(),
            ));
        }

        // Step 1 of the commit: conditionally reserve the counterpart's
        // slot. This is where concurrent confirmations racing for the
        // same candidate are decided.
        let won_candidate = self
            .availability
            .try_transition_slot(&candidate_id, SlotState::Open, SlotState::Reserved)
            .await?;
        if !won_candidate {
            debug!(slot_id = %candidate_id, "Candidate slot lost at commit");
            return Err(EngineError::SlotNoLongerAvailable(candidate_id));
        }

        // Step 2: reserve our own slot, releasing the counterpart's on
        // failure so no partial state survives.
        let won_own = self
            .availability
            .try_transition_slot(&own_id, SlotState::Open, SlotState::Reserved)
            .await?;
        if !won_own {
            self.release_reserved(&candidate_id).await;
            debug!(slot_id = %own_id, "Own slot lost at commit");
            return Err(EngineError::SlotNoLongerAvailable(own_id));
        }

        // Step 3: persist the meeting; compensate both reservations if
        // the insert itself fails.
        let meeting_id = uuid::Uuid::new_v4().to_string();
        let join_url = format!(
            "{}/{}",
            self.config.join_link_base.trim_end_matches('/'),
            meeting_id
        );
        let meeting = Meeting {
            id: meeting_id,
            party_a: owner.to_string(),
            party_b: candidate.owner.clone(),
            slot_a: own_id.clone(),
            slot_b: candidate_id.clone(),
            date: own.date,
            time_of_day: own.time_of_day,
            duration_minutes: own.duration_minutes,
            compatibility_score: score,
            compatibility_reasons: reasons,
            state: MeetingState::Scheduled,
            join_url,
            scheduled_at: self.clock.now_utc(),
        };

        if let Err(err) = self.meetings.insert_meeting(meeting.clone()).await {
            self.release_reserved(&own_id).await;
            self.release_reserved(&candidate_id).await;
            return Err(err.into());
        }

        info!(
            meeting_id = %meeting.id,
            party_a = %meeting.party_a,
            party_b = %meeting.party_b,
            date = %meeting.date,
            time = %meeting.time_of_day,
            score = meeting.compatibility_score,
            "Meeting scheduled"
        );
        Ok(meeting)
    }

    /// Compensating release of a slot this transaction reserved.
    async fn release_reserved(&self, slot_id: &str) {
        match self
            .availability
            .try_transition_slot(slot_id, SlotState::Reserved, SlotState::Open)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(slot_id = %slot_id, "Compensating release found slot not Reserved");
            }
            Err(err) => {
                warn!(slot_id = %slot_id, error = %err, "Compensating release failed");
            }
        }
    }

    /// Cancel a scheduled meeting (either party).
    pub async fn cancel_meeting(&self, meeting_id: &str, acting_user: &str) -> Result<Meeting> {
        self.lifecycle.cancel(meeting_id, acting_user).await
    }

    /// Complete a scheduled meeting (either party).
    pub async fn complete_meeting(&self, meeting_id: &str, acting_user: &str) -> Result<Meeting> {
        self.lifecycle.complete(meeting_id, acting_user).await
    }

    /// Mark a no-show (operator path).
    pub async fn mark_no_show(&self, meeting_id: &str) -> Result<Meeting> {
        self.lifecycle.mark_no_show(meeting_id).await
    }

    /// Fetch one meeting, restricted to its parties.
    pub async fn get_meeting(&self, meeting_id: &str, acting_user: &str) -> Result<Meeting> {
        let meeting = self
            .meetings
            .get_meeting(meeting_id)
            .await?
            .ok_or_else(|| EngineError::MeetingNotFound(meeting_id.to_string()))?;
        if !meeting.is_party(acting_user) {
            return Err(EngineError::Unauthorized {
                user: acting_user.to_string(),
                resource: format!("meeting {meeting_id}"),
            });
        }
        Ok(meeting)
    }

    /// List a user's meetings, optionally filtered by state.
    pub async fn list_meetings(
        &self,
        owner: &str,
        state: Option<MeetingState>,
    ) -> Result<Vec<Meeting>> {
        let mut meetings = self.meetings.meetings_by_user(owner, state).await?;
        meetings.sort_by(|a, b| (a.date, a.time_of_day).cmp(&(b.date, b.time_of_day)));
        Ok(meetings)
    }
}
