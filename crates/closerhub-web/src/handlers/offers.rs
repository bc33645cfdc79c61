//! Job board: offers, applications and applicant lists.

use axum::{
  Form, Json,
  extract::{Path, State},
  response::Redirect,
};
use chrono::{DateTime, Utc};
use closerhub_core::{
  account::{MissionType, PublicCloser},
  offer::{ApplyOutcome, Offer},
  store::MarketStore,
};
use serde::Serialize;
use uuid::Uuid;

use super::{public_view, record_id};
use crate::{
  AppState,
  auth::{AnyRole, Authenticated, Closers, Companies},
  error::{Error, Result},
  forms::OfferForm,
};

/// An offer as listed to users: applicant ids are reduced to a count and
/// whether the viewer is among them.
#[derive(Debug, Serialize)]
pub struct OfferSummary {
  pub offer_id:        Uuid,
  pub company_id:      Uuid,
  pub company_name:    String,
  pub title:           String,
  pub description:     String,
  pub remuneration:    Option<String>,
  pub niche:           Option<String>,
  pub mission_type:    MissionType,
  pub applicant_count: usize,
  pub has_applied:     bool,
  pub created_at:      DateTime<Utc>,
}

impl OfferSummary {
  fn new(offer: Offer, viewer: Uuid) -> Self {
    Self {
      applicant_count: offer.applicants.len(),
      has_applied:     offer.applicants.contains(&viewer),
      offer_id:        offer.offer_id,
      company_id:      offer.company_id,
      company_name:    offer.company_name,
      title:           offer.title,
      description:     offer.description,
      remuneration:    offer.remuneration,
      niche:           offer.niche,
      mission_type:    offer.mission_type,
      created_at:      offer.created_at,
    }
  }
}

fn summarise(offers: Vec<Offer>, viewer: Uuid) -> Vec<OfferSummary> {
  offers.into_iter().map(|o| OfferSummary::new(o, viewer)).collect()
}

/// `GET /offers`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated<AnyRole>,
) -> Result<Json<Vec<OfferSummary>>>
where
  S: MarketStore + Clone + 'static,
{
  let offers = state.store.list_offers().await.map_err(Error::store)?;
  Ok(Json(summarise(offers, auth.account_id())))
}

/// `POST /offers`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated<Companies>,
  Form(form): Form<OfferForm>,
) -> Result<Redirect>
where
  S: MarketStore + Clone + 'static,
{
  let input = form.into_new_offer(auth.account_id())?;
  let offer = state
    .store
    .create_offer(input)
    .await
    .map_err(Error::store)?
    .ok_or(Error::NotFound)?;
  tracing::info!(offer_id = %offer.offer_id, company_id = %offer.company_id, "offer created");
  Ok(Redirect::to("/offers/mine"))
}

/// `GET /offers/mine`
pub async fn mine<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated<Companies>,
) -> Result<Json<Vec<OfferSummary>>>
where
  S: MarketStore + Clone + 'static,
{
  let offers = state
    .store
    .list_company_offers(auth.account_id())
    .await
    .map_err(Error::store)?;
  Ok(Json(summarise(offers, auth.account_id())))
}

/// `POST /offers/{id}/apply`: idempotent. A missing offer is not an error
/// for the caller: nothing is written and they land back on the list.
pub async fn apply<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated<Closers>,
  Path(raw_id): Path<String>,
) -> Result<Redirect>
where
  S: MarketStore + Clone + 'static,
{
  let Some(offer_id) = record_id(&raw_id) else {
    tracing::debug!(%raw_id, "application to malformed offer id");
    return Ok(Redirect::to("/offers"));
  };
  let outcome = state
    .store
    .apply_to_offer(offer_id, auth.account_id())
    .await
    .map_err(Error::store)?;
  match outcome {
    ApplyOutcome::Applied => {
      tracing::info!(%offer_id, closer_id = %auth.account_id(), "application recorded");
    }
    ApplyOutcome::AlreadyApplied | ApplyOutcome::OfferNotFound => {
      tracing::debug!(%offer_id, ?outcome, "application not recorded");
    }
  }
  Ok(Redirect::to("/offers"))
}

/// `GET /offers/{id}/applicants`: owner only; a foreign offer is reported
/// exactly like a missing one.
pub async fn applicants<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated<Companies>,
  Path(raw_id): Path<String>,
) -> Result<Json<Vec<PublicCloser>>>
where
  S: MarketStore + Clone + 'static,
{
  let offer_id = record_id(&raw_id).ok_or(Error::NotFound)?;
  let closers = state
    .store
    .offer_applicants(offer_id, auth.account_id())
    .await
    .map_err(Error::store)?
    .ok_or(Error::NotFound)?;
  let placeholder = &state.config.placeholder_photo_url;
  Ok(Json(closers.into_iter().map(|c| public_view(c, placeholder)).collect()))
}

/// `POST /offers/{id}/delete`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated<Companies>,
  Path(raw_id): Path<String>,
) -> Result<Redirect>
where
  S: MarketStore + Clone + 'static,
{
  let offer_id = record_id(&raw_id).ok_or(Error::NotFound)?;
  let deleted = state
    .store
    .delete_offer(offer_id, auth.account_id())
    .await
    .map_err(Error::store)?;
  if !deleted {
    return Err(Error::NotFound);
  }
  tracing::info!(%offer_id, "offer deleted");
  Ok(Redirect::to("/offers/mine"))
}
