//! Accounts: the single identity table and the two roles that share it.
//!
//! Closers and Companies live in one identity space keyed by a normalised
//! email, so uniqueness across roles is a property of the data model rather
//! than of lookup order.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Role ────────────────────────────────────────────────────────────────────

/// The role discriminant stored on every account.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  Closer,
  Company,
}

// ─── Classification enums ────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum ProfileType {
  Commercial,
  Closeur,
  Setter,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Market {
  B2B,
  B2C,
  Both,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Availability {
  #[strum(to_string = "FullTime", serialize = "full-time")]
  FullTime,
  #[strum(to_string = "HalfTime", serialize = "half-time")]
  HalfTime,
}

/// Shared by closer expectations and offers.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum MissionType {
  Mission,
  #[default]
  #[strum(to_string = "LongTerm", serialize = "Long terme")]
  LongTerm,
}

/// Parse an optional form value into one of the enums above.
///
/// Absent or blank input is `Ok(None)`; anything that is present but not a
/// known variant is an error.
pub fn parse_choice<T: FromStr>(
  kind: &'static str,
  raw: Option<&str>,
) -> Result<Option<T>> {
  match raw.map(str::trim).filter(|s| !s.is_empty()) {
    None => Ok(None),
    Some(s) => s
      .parse()
      .map(Some)
      .map_err(|_| Error::UnknownVariant { kind, value: s.to_owned() }),
  }
}

// ─── Account ─────────────────────────────────────────────────────────────────

/// A row of the identity table, without the credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
  pub account_id:   Uuid,
  pub email:        String,
  pub role:         Role,
  /// First name for closers, company name for companies.
  pub display_name: String,
  pub created_at:   DateTime<Utc>,
}

/// An account together with its stored argon2 PHC string. Only returned by
/// the credential lookup used at login.
#[derive(Debug, Clone)]
pub struct Credentials {
  pub account:       Account,
  pub password_hash: String,
}

// ─── Closer ──────────────────────────────────────────────────────────────────

/// Ceiling for `total_closed` and its directory threshold. Larger inputs are
/// clamped here so every backend compares the same values.
pub const MAX_AMOUNT: u64 = i64::MAX as u64;

/// The self-service part of a closer profile. Everything here may be edited
/// from the dashboard; email, credential and subscription fields may not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloserProfile {
  pub first_name:       String,
  pub last_name:        String,
  pub phone:            Option<String>,
  pub profile_type:     Option<ProfileType>,
  pub market:           Option<Market>,
  pub availability:     Option<Availability>,
  pub years_experience: u32,
  /// Whole euros closed over the closer's career.
  pub total_closed:     u64,
  pub product_types:    Vec<String>,
  pub past_clients:     Option<String>,
  pub contract_types:   Vec<String>,
  pub desired_income:   Option<String>,
  pub mission_type:     Option<MissionType>,
  pub vision:           Option<String>,
  pub bio:              Option<String>,
}

impl CloserProfile {
  /// The name shown in sessions and on the denormalised account row.
  pub fn display_name(&self) -> String {
    let first = self.first_name.trim();
    if first.is_empty() {
      self.last_name.trim().to_owned()
    } else {
      first.to_owned()
    }
  }
}

/// Billing-owned fields of a closer. Written only through
/// [`crate::subscription::SubscriptionUpdate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
  pub is_premium:       bool,
  pub customer_ref:     Option<String>,
  pub subscription_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Closer {
  pub closer_id:    Uuid,
  pub email:        String,
  pub photo_url:    Option<String>,
  pub profile:      CloserProfile,
  pub subscription: Subscription,
  pub created_at:   DateTime<Utc>,
}

impl Closer {
  pub fn is_premium(&self) -> bool { self.subscription.is_premium }
}

/// What the directory and applicant lists expose: no email, no billing
/// references.
#[derive(Debug, Clone, Serialize)]
pub struct PublicCloser {
  pub closer_id:  Uuid,
  pub photo_url:  Option<String>,
  pub profile:    CloserProfile,
  pub is_premium: bool,
  pub created_at: DateTime<Utc>,
}

impl From<Closer> for PublicCloser {
  fn from(c: Closer) -> Self {
    Self {
      closer_id:  c.closer_id,
      photo_url:  c.photo_url,
      is_premium: c.subscription.is_premium,
      profile:    c.profile,
      created_at: c.created_at,
    }
  }
}

/// Input to [`crate::store::MarketStore::create_closer`]. The email must
/// already be normalised and the password already hashed.
#[derive(Debug, Clone)]
pub struct NewCloser {
  pub email:         String,
  pub password_hash: String,
  pub photo_url:     Option<String>,
  pub profile:       CloserProfile,
}

// ─── Company ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
  pub company_id:   Uuid,
  pub email:        String,
  pub company_name: String,
  pub created_at:   DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCompany {
  pub email:         String,
  pub password_hash: String,
  pub company_name:  String,
}

// ─── Registration outcome ────────────────────────────────────────────────────

/// Result of creating an account. A taken email is an expected outcome, not
/// a store failure.
#[derive(Debug, Clone)]
pub enum Registration<T> {
  Created(T),
  EmailTaken,
}
