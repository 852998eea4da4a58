use crate::SessionId;
use flowsim_core::SimError;
use thiserror::Error;

/// Error returned by session and registry operations.
///
/// Only [`SessionError::SessionLimitReached`] relates to the registry as
/// a whole; every other variant rejects one command and leaves the
/// session (and its tick loop) as it was.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Sim(#[from] SimError),
    #[error("session ({0}) Not Found")]
    SessionNotFound(SessionId),
    #[error("session ({0}) is stopped")]
    Stopped(SessionId),
    #[error("session ({0}) is not started")]
    NotStarted(SessionId),
    #[error("session ({0}) is already running")]
    AlreadyRunning(SessionId),
    #[error("session limit reached ({limit} live sessions)")]
    SessionLimitReached { limit: usize },
}
