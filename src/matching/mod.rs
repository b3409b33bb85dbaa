//! Match search algorithms
//!
//! This module sorts a queue snapshot by rating, scans fixed-size windows for
//! one whose spread fits the wait-dependent tolerance, and splits the winner
//! into two balanced teams.

pub mod finder;
pub mod window;

// Re-export commonly used types
pub use finder::{MatchCandidate, MatchFinder, MatchRequest};
pub use window::{RangePolicy, WindowMatch};
