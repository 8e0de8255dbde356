//! Storage seams for slots and meetings.

pub mod memory;
pub mod traits;

pub use memory::MemoryStore;
pub use traits::{AvailabilityStore, MeetingStore, StoreError};
