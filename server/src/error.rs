use bingo_shared::ConnectionId;
use thiserror::Error;

/// Failures of individual requests. None of these is fatal to the session;
/// the `Display` text is what the requester receives in an `error` packet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Session is full")]
    SessionFull,
    #[error("Game is full")]
    GameFull,
    #[error("Already joined")]
    AlreadyJoined,
    #[error("Invalid secret")]
    InvalidSecret,
    #[error("Not found")]
    NotFound,
    #[error("Connection {0} already has a player")]
    DuplicateConnection(ConnectionId),
    #[error("Not authorized")]
    Unauthorized,
}
