//! Server-side sessions.
//!
//! The browser holds an opaque random token; the store only ever sees its
//! SHA-256 digest. The payload is a small identity snapshot that is re-read
//! on every request.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::Role;

pub const MIN_SESSION_TTL_DAYS: i64 = 30;
pub const MAX_SESSION_TTL_DAYS: i64 = 60;

/// Clamp a configured lifetime into the supported 30–60 day window.
pub fn session_ttl(days: i64) -> Duration {
  Duration::days(days.clamp(MIN_SESSION_TTL_DAYS, MAX_SESSION_TTL_DAYS))
}

/// Who the session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
  pub account_id:   Uuid,
  pub role:         Role,
  pub display_name: String,
  /// Snapshot taken at login and refreshed at gating points. Always `false`
  /// for companies.
  pub is_premium:   bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
  /// Hex SHA-256 digest of the cookie token.
  pub token_digest: String,
  pub identity:     SessionIdentity,
  pub created_at:   DateTime<Utc>,
  pub expires_at:   DateTime<Utc>,
}

impl Session {
  pub fn new(
    token_digest: String,
    identity: SessionIdentity,
    now: DateTime<Utc>,
    ttl: Duration,
  ) -> Self {
    Self { token_digest, identity, created_at: now, expires_at: now + ttl }
  }

  pub fn is_expired(&self, now: DateTime<Utc>) -> bool { now >= self.expires_at }
}
