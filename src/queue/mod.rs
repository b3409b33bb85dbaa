//! Queue storage for players waiting to be matched
//!
//! This module owns the set of waiting players, their enqueue stamps and the
//! clock those stamps are read from.

pub mod clock;
pub mod store;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use store::QueueStore;
