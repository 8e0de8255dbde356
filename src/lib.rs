//! Tandem Engine - Availability Matching & Meeting Scheduling
//!
//! Core engine for a two-party matchmaking product:
//! - Availability declared as exact (date, time-of-day, duration) slots
//! - AI compatibility scoring through a pluggable oracle
//! - Race-safe meeting commits built on conditional state transitions
//! - Meeting lifecycle (cancel / complete / no-show) with slot recycling
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          SchedulingService              │
//! │   (Main entry point for scheduling)     │
//! └────────────────┬────────────────────────┘
//!                  │
//!      ┌───────────┼───────────────┐
//!      ▼           ▼               ▼
//! ┌───────────┐ ┌────────────┐ ┌───────────┐
//! │ Match     │ │ Lifecycle  │ │ Stores    │
//! │ Selector  │ │ Manager    │ │ (slots /  │
//! │           │ │            │ │ meetings) │
//! └─────┬─────┘ └────────────┘ └───────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │Compatibility│
//! │ Oracle      │
//! │ (HTTP/Mock) │
//! └─────────────┘
//! ```

pub mod eligibility;
pub mod lifecycle;
pub mod matching;
pub mod oracle;
pub mod rescore;
pub mod service;
pub mod social;
pub mod store;
pub mod time;
pub mod types;

// Re-export main types for convenience
pub use eligibility::{EligibilityFilter, ProfileRule};
pub use lifecycle::LifecycleManager;
pub use matching::{MatchCandidate, MatchSelector, WindowMatch};
pub use oracle::{CompatibilityOracle, CompatibilityReport, HttpOracle, MockOracle, OracleError};
pub use rescore::{RescoreHandle, RescoreWorker};
pub use service::{MatchConfirmation, SchedulingService, ServiceConfig};
pub use social::{MeetingHistoryGraph, SocialGraph, StaticDirectory, UserDirectory};
pub use store::{AvailabilityStore, MeetingStore, MemoryStore, StoreError};
pub use time::{Clock, ClockTime, FixedClock, SystemClock, TimeError};
pub use types::*;
