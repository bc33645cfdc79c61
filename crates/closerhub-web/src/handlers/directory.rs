//! Public closer directory and profile pages.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use closerhub_core::{
  account::PublicCloser,
  directory::DirectoryQuery,
  session::SessionIdentity,
  store::MarketStore,
};
use serde::Serialize;

use super::{public_view, record_id};
use crate::{AppState, auth::MaybeUser, error::{Error, Result}};

#[derive(Serialize)]
pub struct DirectoryPage {
  pub viewer:  Option<SessionIdentity>,
  pub count:   usize,
  pub closers: Vec<PublicCloser>,
}

/// `GET /`: filtered, sorted directory. Unparseable filters are dropped
/// rather than rejected.
pub async fn list<S>(
  State(state): State<AppState<S>>,
  MaybeUser(current): MaybeUser,
  Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<DirectoryPage>>
where
  S: MarketStore + Clone + 'static,
{
  let viewer = match current {
    Some(mut session) => {
      session.refresh_premium(&state).await?;
      Some(session.identity)
    }
    None => None,
  };

  let query = DirectoryQuery::from_pairs(pairs);
  let closers: Vec<PublicCloser> = state
    .store
    .search_closers(&query)
    .await
    .map_err(Error::store)?
    .into_iter()
    .map(|c| public_view(c, &state.config.placeholder_photo_url))
    .collect();

  Ok(Json(DirectoryPage { viewer, count: closers.len(), closers }))
}

/// `GET /closers/{id}`
pub async fn profile<S>(
  State(state): State<AppState<S>>,
  Path(raw_id): Path<String>,
) -> Result<Json<PublicCloser>>
where
  S: MarketStore + Clone + 'static,
{
  let id = record_id(&raw_id).ok_or(Error::NotFound)?;
  let closer = state
    .store
    .get_closer(id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::NotFound)?;
  Ok(Json(public_view(closer, &state.config.placeholder_photo_url)))
}
