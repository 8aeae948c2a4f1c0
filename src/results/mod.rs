//! Result confirmation: the state machine between "someone says they won"
//! and "the ladder believes it"
//!
//! A submitted result waits for the opponent (or a moderator) before any
//! rating moves. Disputes, lapsed confirmation windows and reports all end
//! up in moderator adjudication; a technical loss over an already-verified
//! match rolls the old outcome back before applying the new one.

pub mod apply;
pub mod coordinator;
pub mod pending;

pub use coordinator::{BracketObserver, NoopBracketObserver, ResultsCoordinator};
pub use pending::{ModeratorDecision, PendingReport, PendingResult, ReportDecision};
