//! Checkout, customer portal and the inbound billing webhook.

use axum::{
  body::Bytes,
  extract::State,
  http::{HeaderMap, StatusCode},
  response::Redirect,
};
use chrono::Utc;
use closerhub_core::store::MarketStore;

use crate::{
  AppState,
  auth::{Authenticated, Closers},
  collab::billing::{SIGNATURE_HEADER, parse_event, verify_signature},
  error::{Error, Result},
};

/// `POST /billing/checkout`: redirect to the provider's hosted checkout.
/// Already-premium closers go back to their dashboard.
pub async fn checkout<S>(
  State(state): State<AppState<S>>,
  mut auth: Authenticated<Closers>,
) -> Result<Redirect>
where
  S: MarketStore + Clone + 'static,
{
  if auth.session.refresh_premium(&state).await? {
    return Ok(Redirect::to("/dashboard"));
  }
  let closer = state
    .store
    .get_closer(auth.account_id())
    .await
    .map_err(Error::store)?
    .ok_or(Error::NotFound)?;

  let url = state.billing.create_checkout(&closer.email, closer.closer_id).await?;
  Ok(Redirect::to(&url))
}

/// `POST /billing/portal`: only meaningful once a customer exists.
pub async fn portal<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated<Closers>,
) -> Result<Redirect>
where
  S: MarketStore + Clone + 'static,
{
  let closer = state
    .store
    .get_closer(auth.account_id())
    .await
    .map_err(Error::store)?
    .ok_or(Error::NotFound)?;
  let Some(customer_ref) = closer.subscription.customer_ref else {
    return Ok(Redirect::to("/dashboard"));
  };

  let url = state.billing.create_portal(&customer_ref).await?;
  Ok(Redirect::to(&url))
}

/// `POST /webhooks/billing`: signature first, then decode, then one
/// atomic update. Events that match no closer are acknowledged.
pub async fn webhook<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<StatusCode>
where
  S: MarketStore + Clone + 'static,
{
  let billing = &state.config.billing;
  verify_signature(
    &billing.webhook_secret,
    headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()),
    &body,
    Utc::now().timestamp(),
    billing.signature_tolerance_secs,
  )?;

  let Some(event) = parse_event(&body)? else {
    return Ok(StatusCode::OK);
  };

  let applied = state
    .store
    .apply_subscription_update(event.transition())
    .await
    .map_err(Error::store)?;
  if applied {
    tracing::info!(event = event.kind(), "billing event applied");
  } else {
    tracing::warn!(event = event.kind(), "billing event matched no closer");
  }
  Ok(StatusCode::OK)
}
