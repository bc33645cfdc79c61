//! Passwords, session cookies and the role-gated extractors.
//!
//! The cookie carries a random token; the store only knows its SHA-256
//! digest. Every request re-reads the session row, so logout and expiry take
//! effect immediately.

use std::marker::PhantomData;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use closerhub_core::{
  access::{Access, AccessRule, check},
  account::{Account, Role},
  session::{Session, SessionIdentity, session_ttl},
  store::MarketStore,
};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{AppState, error::{Error, Result}};

pub const SESSION_COOKIE: &str = "closerhub_session";
pub const LOGIN_PAGE: &str = "/login";

/// Verified against when the email is unknown, so a miss costs as much as a
/// wrong password. Parameters match `Argon2::default()`.
const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Where an authenticated account lands after login or a role mismatch.
pub fn landing_page(role: Role) -> &'static str {
  match role {
    Role::Closer => "/dashboard",
    Role::Company => "/offers/mine",
  }
}

// ─── Passwords ───────────────────────────────────────────────────────────────

pub fn hash_password(password: &str) -> Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| Error::PasswordHash(e.to_string()))
}

/// `stored` is `None` when no account matched; a dummy hash is checked
/// instead and the result is always `false`.
pub fn verify_password(password: &str, stored: Option<&str>) -> bool {
  let Ok(parsed) = PasswordHash::new(stored.unwrap_or(DUMMY_HASH)) else {
    return false;
  };
  let valid = Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .is_ok();
  valid && stored.is_some()
}

// ─── Tokens & cookies ────────────────────────────────────────────────────────

pub fn new_token() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  URL_SAFE_NO_PAD.encode(bytes)
}

pub fn token_digest(token: &str) -> String {
  hex::encode(Sha256::digest(token.as_bytes()))
}

pub fn session_cookie(token: String, ttl: Duration, secure: bool) -> Cookie<'static> {
  Cookie::build((SESSION_COOKIE, token))
    .http_only(true)
    .same_site(SameSite::Lax)
    .path("/")
    .max_age(time::Duration::seconds(ttl.num_seconds()))
    .secure(secure)
    .build()
}

/// Same name and path as the session cookie, emptied and already expired.
pub fn clear_cookie(secure: bool) -> Cookie<'static> {
  let mut cookie = session_cookie(String::new(), Duration::zero(), secure);
  cookie.make_removal();
  cookie
}

/// The session token carried by the request, if present and non-empty.
/// Surrounding double quotes are not part of the token.
pub fn cookie_token(jar: &CookieJar) -> Option<String> {
  jar
    .get(SESSION_COOKIE)
    .map(|c| c.value_trimmed())
    .filter(|v| !v.is_empty())
    .map(str::to_owned)
}

/// Create a session row for `account` and return the cookie naming it.
pub async fn start_session<S>(
  state: &AppState<S>,
  account: &Account,
  is_premium: bool,
) -> Result<Cookie<'static>>
where
  S: MarketStore + Clone + 'static,
{
  let token = new_token();
  let ttl = session_ttl(state.config.session_ttl_days);
  let identity = SessionIdentity {
    account_id:   account.account_id,
    role:         account.role,
    display_name: account.display_name.clone(),
    is_premium:   is_premium && account.role == Role::Closer,
  };
  state
    .store
    .create_session(Session::new(token_digest(&token), identity, Utc::now(), ttl))
    .await
    .map_err(Error::store)?;
  Ok(session_cookie(token, ttl, state.config.secure_cookies))
}

// ─── Extractors ──────────────────────────────────────────────────────────────

/// A live session resolved from the request cookie.
#[derive(Debug, Clone)]
pub struct CurrentSession {
  pub token_digest: String,
  pub identity:     SessionIdentity,
}

impl CurrentSession {
  pub fn account_id(&self) -> Uuid { self.identity.account_id }

  /// Re-read the premium flag from the closer record and write it back to
  /// the session when it changed. Companies are never premium.
  pub async fn refresh_premium<S>(&mut self, state: &AppState<S>) -> Result<bool>
  where
    S: MarketStore + Clone + 'static,
  {
    if self.identity.role != Role::Closer {
      return Ok(false);
    }
    let premium = state
      .store
      .get_closer(self.identity.account_id)
      .await
      .map_err(Error::store)?
      .is_some_and(|c| c.is_premium());
    if premium != self.identity.is_premium {
      state
        .store
        .refresh_session_premium(self.token_digest.clone(), premium)
        .await
        .map_err(Error::store)?;
      self.identity.is_premium = premium;
    }
    Ok(premium)
  }
}

/// The session if there is one. Never rejects for lack of a cookie.
pub struct MaybeUser(pub Option<CurrentSession>);

impl<S> FromRequestParts<AppState<S>> for MaybeUser
where
  S: MarketStore + Clone + 'static,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let jar = CookieJar::from_headers(&parts.headers);
    let Some(token) = cookie_token(&jar) else {
      return Ok(MaybeUser(None));
    };
    let digest = token_digest(&token);
    let session = state
      .store
      .get_session(digest, Utc::now())
      .await
      .map_err(Error::store)?;
    Ok(MaybeUser(session.map(|s| CurrentSession {
      token_digest: s.token_digest,
      identity:     s.identity,
    })))
  }
}

/// Compile-time route gate for [`Authenticated`].
pub trait Gate {
  const RULE: AccessRule;
}

pub struct Closers;
pub struct Companies;
pub struct AnyRole;

impl Gate for Closers {
  const RULE: AccessRule = AccessRule::Closer;
}
impl Gate for Companies {
  const RULE: AccessRule = AccessRule::Company;
}
impl Gate for AnyRole {
  const RULE: AccessRule = AccessRule::Any;
}

/// Present in a handler only when the session satisfies `G`. Otherwise the
/// request is redirected: to the login page without a session, to the
/// caller's own landing page on a role mismatch.
pub struct Authenticated<G> {
  pub session: CurrentSession,
  _gate:       PhantomData<G>,
}

impl<G> Authenticated<G> {
  pub fn account_id(&self) -> Uuid { self.session.account_id() }
}

impl<S, G> FromRequestParts<AppState<S>> for Authenticated<G>
where
  S: MarketStore + Clone + 'static,
  G: Gate + Send + Sync,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let MaybeUser(current) = MaybeUser::from_request_parts(parts, state).await?;
    let access = check(G::RULE, current.as_ref().map(|c| &c.identity));
    match (access, current) {
      (Access::Granted, Some(session)) => Ok(Authenticated { session, _gate: PhantomData }),
      (Access::WrongRole(role), _) => Err(Error::Redirect(landing_page(role))),
      _ => Err(Error::Redirect(LOGIN_PAGE)),
    }
  }
}
