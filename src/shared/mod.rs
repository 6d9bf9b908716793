//! Shared state and messaging between the scan pipeline and its consumers
//!
//! The pipeline owns the session; presentation code observes it through
//! change notifications and a read-only runtime state.

pub mod messages;
pub mod state;

pub use messages::SessionEvent;
pub use state::RuntimeState;
