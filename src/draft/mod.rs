//! Map draft: a strict-alternation elimination protocol
//!
//! Two players take turns striking maps from a fixed pool until one map
//! survives. A slow player forfeits the pick to a uniformly random strike,
//! so the draft always terminates in at most N-1 picks.

pub mod coordinator;
pub mod session;

pub use coordinator::DraftCoordinator;
pub use session::{DraftParticipant, DraftSession, DraftStep};
