use std::fmt;

use crate::transport::ready_state;

/// Connection state, always derived from the transport's readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closing,
    Closed,
    Unknown,
}

impl SessionState {
    pub fn from_ready_state(code: u16) -> Self {
        match code {
            ready_state::CONNECTING => SessionState::Connecting,
            ready_state::OPEN => SessionState::Open,
            ready_state::CLOSING => SessionState::Closing,
            ready_state::CLOSED => SessionState::Closed,
            _ => SessionState::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Connecting => "CONNECTING",
            SessionState::Open => "OPEN",
            SessionState::Closing => "CLOSING",
            SessionState::Closed => "CLOSED",
            SessionState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
