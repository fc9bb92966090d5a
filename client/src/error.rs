//! Error taxonomy (C13) for the client engine's leaf failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JoinError {
    #[error("server rejected the session password")]
    AuthFailed,
    #[error("username already taken")]
    NameTaken,
    #[error("server sent an unexpected message before hello completed")]
    UnexpectedMessage,
    #[error(transparent)]
    Frame(#[from] conference_proto::FrameError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum FileTransferError {
    #[error("server does not have that file")]
    NotFound,
    #[error(transparent)]
    Frame(#[from] conference_proto::FrameError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
