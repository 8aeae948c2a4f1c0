//! Arena Ladder - competitive-ladder matchmaking service
//!
//! Players queue per game mode, are paired by rating proximity, play
//! externally, and submit results that must be confirmed (by the opponent
//! or a moderator) before the rating engine moves anything. The same match
//! primitives drive single-elimination tournament brackets.

pub mod amqp;
pub mod config;
pub mod draft;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod queue;
pub mod rating;
pub mod results;
pub mod service;
pub mod store;
pub mod sweeper;
pub mod tournament;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{LadderError, Result};
pub use types::*;

// Re-export key components
pub use notify::{Notice, Notifier, Recipient};
pub use queue::QueueManager;
pub use results::ResultsCoordinator;
pub use store::{LadderStore, MemoryStore};
pub use tournament::TournamentCoordinator;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
