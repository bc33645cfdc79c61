//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings with a fixed microsecond width so that
//! lexical order equals chronological order. String sets are compact JSON
//! arrays. UUIDs are hyphenated lowercase strings. Enums use their strum
//! names.

use std::{collections::BTreeSet, str::FromStr};

use chrono::{DateTime, SecondsFormat, Utc};
use closerhub_core::{
  account::{Account, Closer, CloserProfile, Credentials, Role, Subscription},
  normalize,
  offer::Offer,
  session::{Session, SessionIdentity},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_enum<T: FromStr>(kind: &'static str, s: &str) -> Result<T> {
  s.parse()
    .map_err(|_| Error::UnknownValue { kind, value: s.to_owned() })
}

fn decode_opt_enum<T: FromStr>(kind: &'static str, s: Option<String>) -> Result<Option<T>> {
  s.as_deref().map(|v| decode_enum(kind, v)).transpose()
}

pub fn encode_opt_enum<T: AsRef<str>>(v: Option<T>) -> Option<String> {
  v.map(|v| v.as_ref().to_owned())
}

pub fn encode_list(items: &[String]) -> Result<String> {
  Ok(serde_json::to_string(items)?)
}

pub fn decode_list(s: &str) -> Result<Vec<String>> { Ok(serde_json::from_str(s)?) }

/// Amounts are `u64` in the domain and `INTEGER` (i64) in SQLite.
pub fn encode_amount(v: u64) -> i64 { i64::try_from(v).unwrap_or(i64::MAX) }

pub fn decode_amount(v: i64) -> u64 { u64::try_from(v).unwrap_or(0) }

// ─── Accounts ────────────────────────────────────────────────────────────────

pub const ACCOUNT_COLUMNS: &str =
  "a.account_id, a.email, a.role, a.display_name, a.created_at, a.password_hash";

/// Raw strings read from an `accounts` row.
pub struct RawAccount {
  pub account_id:    String,
  pub email:         String,
  pub role:          String,
  pub display_name:  String,
  pub created_at:    String,
  pub password_hash: String,
}

impl RawAccount {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      account_id:    row.get(0)?,
      email:         row.get(1)?,
      role:          row.get(2)?,
      display_name:  row.get(3)?,
      created_at:    row.get(4)?,
      password_hash: row.get(5)?,
    })
  }

  pub fn into_credentials(self) -> Result<Credentials> {
    Ok(Credentials {
      account:       Account {
        account_id:   decode_uuid(&self.account_id)?,
        email:        self.email,
        role:         decode_enum::<Role>("role", &self.role)?,
        display_name: self.display_name,
        created_at:   decode_dt(&self.created_at)?,
      },
      password_hash: self.password_hash,
    })
  }
}

// ─── Closers ─────────────────────────────────────────────────────────────────

/// Select list for [`RawCloser::from_row`]; expects `accounts a` joined with
/// `closer_profiles p`.
pub const CLOSER_COLUMNS: &str = "
  a.account_id, a.email, a.created_at,
  p.first_name, p.last_name, p.phone, p.photo_url,
  p.profile_type, p.market, p.availability,
  p.years_experience, p.total_closed, p.product_types, p.past_clients,
  p.contract_types, p.desired_income, p.mission_type, p.vision, p.bio,
  p.is_premium, p.billing_customer_ref, p.billing_subscription_ref";

pub struct RawCloser {
  pub account_id:       String,
  pub email:            String,
  pub created_at:       String,
  pub first_name:       String,
  pub last_name:        String,
  pub phone:            Option<String>,
  pub photo_url:        Option<String>,
  pub profile_type:     Option<String>,
  pub market:           Option<String>,
  pub availability:     Option<String>,
  pub years_experience: i64,
  pub total_closed:     i64,
  pub product_types:    String,
  pub past_clients:     Option<String>,
  pub contract_types:   String,
  pub desired_income:   Option<String>,
  pub mission_type:     Option<String>,
  pub vision:           Option<String>,
  pub bio:              Option<String>,
  pub is_premium:       bool,
  pub customer_ref:     Option<String>,
  pub subscription_ref: Option<String>,
}

impl RawCloser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      account_id:       row.get(0)?,
      email:            row.get(1)?,
      created_at:       row.get(2)?,
      first_name:       row.get(3)?,
      last_name:        row.get(4)?,
      phone:            row.get(5)?,
      photo_url:        row.get(6)?,
      profile_type:     row.get(7)?,
      market:           row.get(8)?,
      availability:     row.get(9)?,
      years_experience: row.get(10)?,
      total_closed:     row.get(11)?,
      product_types:    row.get(12)?,
      past_clients:     row.get(13)?,
      contract_types:   row.get(14)?,
      desired_income:   row.get(15)?,
      mission_type:     row.get(16)?,
      vision:           row.get(17)?,
      bio:              row.get(18)?,
      is_premium:       row.get(19)?,
      customer_ref:     row.get(20)?,
      subscription_ref: row.get(21)?,
    })
  }

  pub fn into_closer(self) -> Result<Closer> {
    let profile = CloserProfile {
      first_name:       self.first_name,
      last_name:        self.last_name,
      phone:            self.phone,
      profile_type:     decode_opt_enum("profile type", self.profile_type)?,
      market:           decode_opt_enum("market", self.market)?,
      availability:     decode_opt_enum("availability", self.availability)?,
      years_experience: u32::try_from(self.years_experience).unwrap_or(0),
      total_closed:     decode_amount(self.total_closed),
      product_types:    decode_list(&self.product_types)?,
      past_clients:     self.past_clients,
      contract_types:   decode_list(&self.contract_types)?,
      desired_income:   self.desired_income,
      mission_type:     decode_opt_enum("mission type", self.mission_type)?,
      vision:           self.vision,
      bio:              self.bio,
    };

    Ok(Closer {
      closer_id: decode_uuid(&self.account_id)?,
      email: self.email,
      photo_url: self.photo_url,
      profile,
      subscription: Subscription {
        is_premium:       self.is_premium,
        customer_ref:     self.customer_ref,
        subscription_ref: self.subscription_ref,
      },
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Bound parameters for the editable profile columns, plus the case-folded
/// list copies the directory search runs against.
pub struct EncodedProfile {
  pub first_name:       String,
  pub last_name:        String,
  pub phone:            Option<String>,
  pub profile_type:     Option<String>,
  pub market:           Option<String>,
  pub availability:     Option<String>,
  pub years_experience: i64,
  pub total_closed:     i64,
  pub product_types:    String,
  pub past_clients:     Option<String>,
  pub contract_types:   String,
  pub desired_income:   Option<String>,
  pub mission_type:     Option<String>,
  pub vision:           Option<String>,
  pub bio:              Option<String>,
  pub products_folded:  String,
  pub contracts_folded: String,
}

impl EncodedProfile {
  pub fn new(p: &CloserProfile) -> Result<Self> {
    Ok(Self {
      first_name:       p.first_name.clone(),
      last_name:        p.last_name.clone(),
      phone:            p.phone.clone(),
      profile_type:     encode_opt_enum(p.profile_type),
      market:           encode_opt_enum(p.market),
      availability:     encode_opt_enum(p.availability),
      years_experience: i64::from(p.years_experience),
      total_closed:     encode_amount(p.total_closed),
      product_types:    encode_list(&p.product_types)?,
      past_clients:     p.past_clients.clone(),
      contract_types:   encode_list(&p.contract_types)?,
      desired_income:   p.desired_income.clone(),
      mission_type:     encode_opt_enum(p.mission_type),
      vision:           p.vision.clone(),
      bio:              p.bio.clone(),
      products_folded:  encode_list(&normalize::fold_list(&p.product_types))?,
      contracts_folded: encode_list(&normalize::fold_list(&p.contract_types))?,
    })
  }
}

// ─── Offers ──────────────────────────────────────────────────────────────────

/// Select list for [`RawOffer::from_row`]; expects `offers o`. The applicant
/// set is folded into a JSON array by a correlated subquery.
pub const OFFER_COLUMNS: &str = "
  o.offer_id, o.company_id, o.company_name, o.title, o.description,
  o.remuneration, o.niche, o.mission_type, o.created_at,
  (SELECT json_group_array(x.closer_id) FROM offer_applicants x WHERE x.offer_id = o.offer_id)";

pub struct RawOffer {
  pub offer_id:     String,
  pub company_id:   String,
  pub company_name: String,
  pub title:        String,
  pub description:  String,
  pub remuneration: Option<String>,
  pub niche:        Option<String>,
  pub mission_type: String,
  pub created_at:   String,
  pub applicants:   String,
}

impl RawOffer {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      offer_id:     row.get(0)?,
      company_id:   row.get(1)?,
      company_name: row.get(2)?,
      title:        row.get(3)?,
      description:  row.get(4)?,
      remuneration: row.get(5)?,
      niche:        row.get(6)?,
      mission_type: row.get(7)?,
      created_at:   row.get(8)?,
      applicants:   row.get(9)?,
    })
  }

  pub fn into_offer(self) -> Result<Offer> {
    let applicants = decode_list(&self.applicants)?
      .iter()
      .map(|s| decode_uuid(s))
      .collect::<Result<BTreeSet<Uuid>>>()?;

    Ok(Offer {
      offer_id: decode_uuid(&self.offer_id)?,
      company_id: decode_uuid(&self.company_id)?,
      company_name: self.company_name,
      title: self.title,
      description: self.description,
      remuneration: self.remuneration,
      niche: self.niche,
      mission_type: decode_enum("mission type", &self.mission_type)?,
      applicants,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

// ─── Sessions ────────────────────────────────────────────────────────────────

pub struct RawSession {
  pub token_digest: String,
  pub account_id:   String,
  pub role:         String,
  pub display_name: String,
  pub is_premium:   bool,
  pub created_at:   String,
  pub expires_at:   String,
}

impl RawSession {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      token_digest: row.get(0)?,
      account_id:   row.get(1)?,
      role:         row.get(2)?,
      display_name: row.get(3)?,
      is_premium:   row.get(4)?,
      created_at:   row.get(5)?,
      expires_at:   row.get(6)?,
    })
  }

  pub fn into_session(self) -> Result<Session> {
    Ok(Session {
      token_digest: self.token_digest,
      identity:     SessionIdentity {
        account_id:   decode_uuid(&self.account_id)?,
        role:         decode_enum("role", &self.role)?,
        display_name: self.display_name,
        is_premium:   self.is_premium,
      },
      created_at:   decode_dt(&self.created_at)?,
      expires_at:   decode_dt(&self.expires_at)?,
    })
  }
}
