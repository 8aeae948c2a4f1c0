//! Matchmaking queue: waiting lists, the periodic pairing pass, and the
//! shared match-creation path
//!
//! Concrete modes pair only within themselves; the any-mode list is the sole
//! bridge between ladders, so mode ladders stay mode-pure while players
//! indifferent to mode are still serviced.

pub mod launcher;
pub mod manager;
pub mod matcher;

pub use launcher::MatchLauncher;
pub use manager::{QueueManager, QueueStats};
pub use matcher::QueueEntry;
