use crate::model::breakpoint::BreakpointId;
use crate::session::{SessionId, State};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- session state machine -------------------------------------
    #[error("session is not active")]
    SessionInactive,
    #[error("illegal session transition: {request} requested while {from}")]
    IllegalTransition {
        from: State,
        request: &'static str,
    },
    #[error("initialize failed: {0}")]
    Initialize(anyhow::Error),
    #[error("{request} failed: {error}")]
    Run {
        request: &'static str,
        error: anyhow::Error,
    },

    // --------------------------------- entity not found ------------------------------------------
    #[error("session {0} not found")]
    SessionNotFound(SessionId),
    #[error("thread {0} not found")]
    ThreadNotFound(i64),
    #[error("frame {0} not found in thread {1}")]
    FrameNotFound(i64, i64),
    #[error("breakpoint {0} not found")]
    BreakpointNotFound(BreakpointId),

    // --------------------------------- collaborator errors ---------------------------------------
    #[error("adapter request failed: {0}")]
    Adapter(anyhow::Error),
    #[error("malformed virtual source address: {0}")]
    SourceAddress(String),
}

impl Error {
    /// Return a hint to an embedder - a fatal error terminates the session it
    /// came from (threads and call-stack caches are already released), while
    /// a non-fatal error is a recoverable condition of a still-living model.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::SessionInactive => false,
            Error::IllegalTransition { .. } => false,
            Error::SessionNotFound(_) => false,
            Error::ThreadNotFound(_) => false,
            Error::FrameNotFound(_, _) => false,
            Error::BreakpointNotFound(_) => false,
            Error::SourceAddress(_) => false,

            // currently fatal errors
            Error::Initialize(_) => true,
            Error::Run { .. } => true,
            Error::Adapter(_) => true,
        }
    }
}
