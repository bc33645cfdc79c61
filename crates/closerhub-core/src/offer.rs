//! Job-board offers and the application set.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::MissionType;

/// A mission posted by a company.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
  pub offer_id:     Uuid,
  /// Owning company; never changes after creation.
  pub company_id:   Uuid,
  /// Copy of the company's display name taken when the offer was created.
  pub company_name: String,
  pub title:        String,
  pub description:  String,
  pub remuneration: Option<String>,
  pub niche:        Option<String>,
  pub mission_type: MissionType,
  /// Closer ids; membership is unique and carries no order.
  pub applicants:   BTreeSet<Uuid>,
  pub created_at:   DateTime<Utc>,
}

/// Input to [`crate::store::MarketStore::create_offer`]. The company name is
/// filled in by the store from the identity table.
#[derive(Debug, Clone)]
pub struct NewOffer {
  pub company_id:   Uuid,
  pub title:        String,
  pub description:  String,
  pub remuneration: Option<String>,
  pub niche:        Option<String>,
  pub mission_type: MissionType,
}

/// What happened when a closer applied to an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
  Applied,
  /// The closer was already in the applicant set; nothing changed.
  AlreadyApplied,
  /// No such offer; nothing was written.
  OfferNotFound,
}
