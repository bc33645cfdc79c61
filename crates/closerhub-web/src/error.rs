//! Error types and axum `IntoResponse` implementation.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::collab::{self, billing::SignatureError};

#[derive(Debug, Error)]
pub enum Error {
  /// Access gate outcome: not an error for the caller, just a 303.
  #[error("redirect to {0}")]
  Redirect(&'static str),

  #[error("invalid email or password")]
  InvalidCredentials,

  #[error("email already registered")]
  EmailTaken,

  #[error("not found")]
  NotFound,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Input(#[from] closerhub_core::Error),

  #[error("webhook signature rejected: {0}")]
  Signature(#[from] SignatureError),

  #[error("upstream service error: {0}")]
  Upstream(#[from] collab::Error),

  #[error("password hashing failed: {0}")]
  PasswordHash(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Error::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      Error::Redirect(to) => Redirect::to(to).into_response(),
      Error::InvalidCredentials => {
        (StatusCode::UNAUTHORIZED, "invalid email or password").into_response()
      }
      Error::EmailTaken => {
        (StatusCode::CONFLICT, "email already registered").into_response()
      }
      Error::NotFound => (StatusCode::NOT_FOUND, "not found").into_response(),
      Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
      Error::Input(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
      Error::Signature(e) => {
        tracing::warn!(error = %e, "rejected billing webhook");
        (StatusCode::BAD_REQUEST, "invalid signature").into_response()
      }
      Error::Upstream(e) => {
        tracing::error!(error = %e, "external service failure");
        (StatusCode::BAD_GATEWAY, "upstream service unavailable").into_response()
      }
      Error::PasswordHash(msg) => {
        tracing::error!(error = %msg, "password hashing failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
      }
      Error::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
      }
    }
  }
}
