//! The closer's own dashboard: profile, subscription and applications.

use axum::{
  Form, Json,
  body::Bytes,
  extract::{Multipart, State, multipart::Field},
  response::Redirect,
};
use chrono::{DateTime, Utc};
use closerhub_core::{
  account::CloserProfile,
  offer::Offer,
  store::MarketStore,
  subscription::SubscriptionState,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::{Authenticated, Closers},
  error::{Error, Result},
  forms::ProfileForm,
};

pub const PHOTO_FIELD: &str = "photo";

#[derive(Serialize)]
pub struct DashboardPage {
  pub closer_id:          Uuid,
  pub email:              String,
  pub photo_url:          String,
  pub profile:            CloserProfile,
  pub subscription:       SubscriptionState,
  /// Whether the billing portal is reachable (a customer exists).
  pub can_manage_billing: bool,
  pub applications:       Vec<Offer>,
  pub created_at:         DateTime<Utc>,
}

/// `GET /dashboard`
pub async fn show<S>(
  State(state): State<AppState<S>>,
  mut auth: Authenticated<Closers>,
) -> Result<Json<DashboardPage>>
where
  S: MarketStore + Clone + 'static,
{
  auth.session.refresh_premium(&state).await?;

  let closer = state
    .store
    .get_closer(auth.account_id())
    .await
    .map_err(Error::store)?
    .ok_or(Error::NotFound)?;
  let applications = state
    .store
    .list_applied_offers(closer.closer_id)
    .await
    .map_err(Error::store)?;

  Ok(Json(DashboardPage {
    closer_id: closer.closer_id,
    email: closer.email,
    photo_url: closer
      .photo_url
      .unwrap_or_else(|| state.config.placeholder_photo_url.clone()),
    subscription: closer.subscription.state(),
    can_manage_billing: closer.subscription.customer_ref.is_some(),
    profile: closer.profile,
    applications,
    created_at: closer.created_at,
  }))
}

/// `POST /dashboard/update`: replaces the editable profile fields.
pub async fn update<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated<Closers>,
  Form(form): Form<ProfileForm>,
) -> Result<Redirect>
where
  S: MarketStore + Clone + 'static,
{
  let profile = form.into_profile()?;
  let updated = state
    .store
    .update_closer_profile(auth.account_id(), profile)
    .await
    .map_err(Error::store)?;
  if !updated {
    return Err(Error::NotFound);
  }
  Ok(Redirect::to("/dashboard"))
}

/// An uploaded profile photo that passed validation.
pub(crate) struct Photo {
  filename:     String,
  content_type: String,
  bytes:        Bytes,
}

/// Read the `photo` part: it must be a non-empty image within `max_bytes`.
pub(crate) async fn read_photo(field: Field<'_>, max_bytes: usize) -> Result<Photo> {
  let filename = field.file_name().unwrap_or_default().to_owned();
  let content_type = field
    .content_type()
    .filter(|ct| ct.starts_with("image/"))
    .map(str::to_owned)
    .ok_or_else(|| Error::BadRequest("photo must be an image".into()))?;
  let bytes = field.bytes().await.map_err(|e| Error::BadRequest(e.to_string()))?;
  if bytes.is_empty() {
    return Err(Error::BadRequest("photo is empty".into()));
  }
  if bytes.len() > max_bytes {
    return Err(Error::BadRequest("photo is too large".into()));
  }
  Ok(Photo { filename, content_type, bytes })
}

/// Hand the photo to object storage and return its public URL.
pub(crate) async fn store_photo<S>(state: &AppState<S>, photo: Photo) -> Result<String>
where
  S: MarketStore + Clone + 'static,
{
  let url = state
    .storage
    .put(PHOTO_FIELD, &photo.filename, Some(&photo.content_type), photo.bytes)
    .await?;
  Ok(url)
}

/// `POST /dashboard/photo`: multipart upload of an image in the `photo`
/// field. Other fields are ignored.
pub async fn upload_photo<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated<Closers>,
  mut multipart: Multipart,
) -> Result<Redirect>
where
  S: MarketStore + Clone + 'static,
{
  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| Error::BadRequest(e.to_string()))?
  {
    if field.name() != Some(PHOTO_FIELD) {
      continue;
    }

    let photo = read_photo(field, state.config.uploads.max_bytes).await?;
    let url = store_photo(&state, photo).await?;
    let stored = state
      .store
      .set_closer_photo(auth.account_id(), url)
      .await
      .map_err(Error::store)?;
    if !stored {
      return Err(Error::NotFound);
    }
    return Ok(Redirect::to("/dashboard"));
  }

  Err(Error::BadRequest("missing photo field".into()))
}
