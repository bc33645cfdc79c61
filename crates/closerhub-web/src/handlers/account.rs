//! Registration, login and logout.

use axum::{
  Form, Json,
  extract::{FromRequest, Multipart, Request, State},
  http::header,
  response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use closerhub_core::{
  Error as CoreError,
  account::{Account, NewCloser, NewCompany, Registration, Role},
  normalize::{self, optional_text},
  store::MarketStore,
};
use serde::Serialize;

use super::dashboard::{PHOTO_FIELD, Photo, read_photo, store_photo};
use crate::{
  AppState,
  auth::{self, MaybeUser, landing_page},
  error::{Error, Result},
  forms::{LoginForm, RegisterCloserForm, RegisterCompanyForm, new_credentials},
};

/// `POST /register/closer`: creates the account and logs it in. Accepts a
/// URL-encoded form, or multipart with an optional `photo` part.
pub async fn register_closer<S>(
  State(state): State<AppState<S>>,
  jar: CookieJar,
  request: Request,
) -> Result<(CookieJar, Redirect)>
where
  S: MarketStore + Clone + 'static,
{
  let (form, photo) = closer_registration(&state, request).await?;
  let (email, password) = new_credentials(form.email.as_deref(), form.password.as_deref())?;
  let profile = form.profile.into_profile()?;
  let password_hash = auth::hash_password(&password)?;
  let photo_url = match photo {
    Some(photo) => Some(store_photo(&state, photo).await?),
    None => None,
  };

  let registration = state
    .store
    .create_closer(NewCloser { email, password_hash, photo_url, profile })
    .await
    .map_err(Error::store)?;

  let Registration::Created(closer) = registration else {
    return Err(Error::EmailTaken);
  };
  tracing::info!(closer_id = %closer.closer_id, "closer registered");

  let account = Account {
    account_id:   closer.closer_id,
    email:        closer.email.clone(),
    role:         Role::Closer,
    display_name: closer.profile.display_name(),
    created_at:   closer.created_at,
  };
  let cookie = auth::start_session(&state, &account, closer.is_premium()).await?;
  Ok((jar.add(cookie), Redirect::to(landing_page(Role::Closer))))
}

/// Decode a closer registration body. Multipart text parts become form
/// fields; a `photo` part with no file name is an unfilled file input.
async fn closer_registration<S>(
  state: &AppState<S>,
  request: Request,
) -> Result<(RegisterCloserForm, Option<Photo>)>
where
  S: MarketStore + Clone + 'static,
{
  let is_multipart = request
    .headers()
    .get(header::CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|ct| ct.starts_with("multipart/form-data"));

  if !is_multipart {
    let Form(form) = Form::<RegisterCloserForm>::from_request(request, state)
      .await
      .map_err(|e| Error::BadRequest(e.body_text()))?;
    return Ok((form, None));
  }

  let mut multipart = Multipart::from_request(request, state)
    .await
    .map_err(|e| Error::BadRequest(e.body_text()))?;
  let mut fields = serde_json::Map::new();
  let mut photo = None;
  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| Error::BadRequest(e.to_string()))?
  {
    let Some(name) = field.name().map(str::to_owned) else {
      continue;
    };
    if name == PHOTO_FIELD {
      if field.file_name().is_some_and(|f| !f.is_empty()) {
        photo = Some(read_photo(field, state.config.uploads.max_bytes).await?);
      }
      continue;
    }
    let value = field.text().await.map_err(|e| Error::BadRequest(e.to_string()))?;
    fields.insert(name, value.into());
  }

  let form = serde_json::from_value(fields.into()).map_err(CoreError::from)?;
  Ok((form, photo))
}

/// `POST /register/company`
pub async fn register_company<S>(
  State(state): State<AppState<S>>,
  jar: CookieJar,
  Form(form): Form<RegisterCompanyForm>,
) -> Result<(CookieJar, Redirect)>
where
  S: MarketStore + Clone + 'static,
{
  let (email, password) = new_credentials(form.email.as_deref(), form.password.as_deref())?;
  let company_name = optional_text(form.company_name.as_deref())
    .ok_or(CoreError::MissingField("companyName"))?;
  let password_hash = auth::hash_password(&password)?;

  let registration = state
    .store
    .create_company(NewCompany { email, password_hash, company_name })
    .await
    .map_err(Error::store)?;

  let Registration::Created(company) = registration else {
    return Err(Error::EmailTaken);
  };
  tracing::info!(company_id = %company.company_id, "company registered");

  let account = Account {
    account_id:   company.company_id,
    email:        company.email,
    role:         Role::Company,
    display_name: company.company_name,
    created_at:   company.created_at,
  };
  let cookie = auth::start_session(&state, &account, false).await?;
  Ok((jar.add(cookie), Redirect::to(landing_page(Role::Company))))
}

#[derive(Serialize)]
pub struct LoginPage {
  pub action: &'static str,
  pub method: &'static str,
  pub fields: [&'static str; 2],
}

/// `GET /login`: where the gates send anonymous callers. Someone already
/// signed in goes straight to their landing page.
pub async fn login_page<S>(MaybeUser(current): MaybeUser) -> Response
where
  S: MarketStore + Clone + 'static,
{
  match current {
    Some(session) => Redirect::to(landing_page(session.identity.role)).into_response(),
    None => Json(LoginPage {
      action: auth::LOGIN_PAGE,
      method: "POST",
      fields: ["email", "password"],
    })
    .into_response(),
  }
}

/// `POST /login`: one identity table, one lookup. Every failure looks the
/// same to the caller.
pub async fn login<S>(
  State(state): State<AppState<S>>,
  jar: CookieJar,
  Form(form): Form<LoginForm>,
) -> Result<(CookieJar, Redirect)>
where
  S: MarketStore + Clone + 'static,
{
  let email = normalize::email(&form.email);
  let credentials = state
    .store
    .find_credentials(email)
    .await
    .map_err(Error::store)?;

  let stored = credentials.as_ref().map(|c| c.password_hash.as_str());
  if !auth::verify_password(&form.password, stored) {
    tracing::debug!(known_account = credentials.is_some(), "login rejected");
    return Err(Error::InvalidCredentials);
  }
  let Some(credentials) = credentials else {
    return Err(Error::InvalidCredentials);
  };
  let account = credentials.account;

  let is_premium = match account.role {
    Role::Closer => state
      .store
      .get_closer(account.account_id)
      .await
      .map_err(Error::store)?
      .is_some_and(|c| c.is_premium()),
    Role::Company => false,
  };

  let cookie = auth::start_session(&state, &account, is_premium).await?;
  tracing::debug!(account_id = %account.account_id, role = %account.role, "login");
  Ok((jar.add(cookie), Redirect::to(landing_page(account.role))))
}

/// `GET|POST /logout`
pub async fn logout<S>(
  State(state): State<AppState<S>>,
  jar: CookieJar,
  MaybeUser(current): MaybeUser,
) -> Result<(CookieJar, Redirect)>
where
  S: MarketStore + Clone + 'static,
{
  if let Some(session) = current {
    state
      .store
      .delete_session(session.token_digest)
      .await
      .map_err(Error::store)?;
  }
  let cookie = auth::clear_cookie(state.config.secure_cookies);
  Ok((jar.add(cookie), Redirect::to("/")))
}
