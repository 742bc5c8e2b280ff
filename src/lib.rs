//! Voice-driven browser automation.
//!
//! A spoken command either names a webpage, which starts a session that
//! describes the page aloud and carries out spoken follow-ups in a live
//! Chrome, or is a plain question answered directly.

pub mod brain;
pub mod cache;
pub mod config;
pub mod dom;
pub mod error;
pub mod face;
pub mod hands;
pub mod inspector;
pub mod intent;
pub mod interpreter;
pub mod session;
pub mod types;
pub mod voice;

#[cfg(test)]
mod testing;

pub use intent::IntentExtractor;
pub use interpreter::ActionInterpreter;
pub use session::{SessionContext, SessionController};
pub use types::{Action, Intent, PageSnapshot, Session, SessionOutcome, SessionState};
