//! Adapters for the services the marketplace talks to: the payment provider
//! and object storage for profile photos.

pub mod billing;
pub mod storage;

use thiserror::Error;

/// Failure of an outbound collaborator call.
#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("provider returned {status}: {body}")]
  Status { status: u16, body: String },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
