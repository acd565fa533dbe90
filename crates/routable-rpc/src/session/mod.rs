//! Session layer: pending-call registry, lifecycle state and the
//! orchestrator that ties a transport to the envelope protocol.

mod pending;
mod runtime;
mod state;
mod url;

pub use pending::{Completion, Outcome, PendingCall, PendingCalls};
pub use runtime::{SendOptions, Session, CLOSE_KEY, OPEN_KEY};
pub use state::SessionState;
pub use url::to_absolute_url;
