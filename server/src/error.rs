//! Error taxonomy (C13) for the parts of the server that need a typed
//! error rather than a bag of `anyhow::Error`. Worker entry points still
//! return `anyhow::Result<()>`; these are the leaf errors that get
//! `.into()`'d at the boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("username already taken")]
    NameTaken,
}
