//! HTTP layer for the closerhub marketplace.
//!
//! Exposes an axum [`Router`] backed by any [`MarketStore`], with the
//! payment provider and object storage injected as trait objects.

pub mod auth;
pub mod collab;
pub mod error;
pub mod forms;
pub mod handlers;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, post},
};
use closerhub_core::{session::MAX_SESSION_TTL_DAYS, store::MarketStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use collab::{billing::BillingProvider, storage::ObjectStorage};
use handlers::{account, billing, dashboard, directory, offers};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `CLOSERHUB__*` environment variables.
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                  String,
  pub port:                  u16,
  /// Absolute URL the site is reachable at; used for provider return URLs.
  pub base_url:              String,
  pub store_path:            PathBuf,
  pub secure_cookies:        bool,
  /// Clamped to 30–60 days.
  pub session_ttl_days:      i64,
  pub placeholder_photo_url: String,
  pub billing:               BillingConfig,
  pub uploads:               UploadConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                  "127.0.0.1".to_owned(),
      port:                  3000,
      base_url:              "http://localhost:3000".to_owned(),
      store_path:            PathBuf::from("closerhub.db"),
      secure_cookies:        false,
      session_ttl_days:      MAX_SESSION_TTL_DAYS,
      placeholder_photo_url: "https://via.placeholder.com/150".to_owned(),
      billing:               BillingConfig::default(),
      uploads:               UploadConfig::default(),
    }
  }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct BillingConfig {
  pub api_base:                 String,
  pub secret_key:               String,
  /// Price of the premium subscription.
  pub price_id:                 String,
  /// Webhooks are rejected while this is empty.
  pub webhook_secret:           String,
  pub signature_tolerance_secs: i64,
}

impl Default for BillingConfig {
  fn default() -> Self {
    Self {
      api_base:                 "https://api.stripe.com".to_owned(),
      secret_key:               String::new(),
      price_id:                 String::new(),
      webhook_secret:           String::new(),
      signature_tolerance_secs: 300,
    }
  }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct UploadConfig {
  pub dir:             PathBuf,
  /// Prefix of the URLs handed out for stored objects.
  pub public_base_url: String,
  pub max_bytes:       usize,
}

impl Default for UploadConfig {
  fn default() -> Self {
    Self {
      dir:             PathBuf::from("uploads"),
      public_base_url: "/uploads".to_owned(),
      max_bytes:       5 * 1024 * 1024,
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: MarketStore> {
  pub store:   Arc<S>,
  pub config:  Arc<ServerConfig>,
  pub billing: Arc<dyn BillingProvider>,
  pub storage: Arc<dyn ObjectStorage>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the marketplace [`Router`].
pub fn router<S>(state: AppState<S>) -> Router
where
  S: MarketStore + Clone + 'static,
{
  // Multipart framing on top of the largest accepted photo.
  let photo_limit = state.config.uploads.max_bytes + 64 * 1024;

  Router::new()
    .route("/",                        get(directory::list::<S>))
    .route("/closers/{id}",            get(directory::profile::<S>))
    .route(
      "/register/closer",
      post(account::register_closer::<S>).layer(DefaultBodyLimit::max(photo_limit)),
    )
    .route("/register/company",        post(account::register_company::<S>))
    .route("/login",                   get(account::login_page::<S>).post(account::login::<S>))
    .route("/logout",                  get(account::logout::<S>).post(account::logout::<S>))
    .route("/dashboard",               get(dashboard::show::<S>))
    .route("/dashboard/update",        post(dashboard::update::<S>))
    .route(
      "/dashboard/photo",
      post(dashboard::upload_photo::<S>).layer(DefaultBodyLimit::max(photo_limit)),
    )
    .route("/offers",                  get(offers::list::<S>).post(offers::create::<S>))
    .route("/offers/mine",             get(offers::mine::<S>))
    .route("/offers/{id}/apply",       post(offers::apply::<S>))
    .route("/offers/{id}/applicants",  get(offers::applicants::<S>))
    .route("/offers/{id}/delete",      post(offers::delete::<S>))
    .route("/billing/checkout",        post(billing::checkout::<S>))
    .route("/billing/portal",          post(billing::portal::<S>))
    .route("/webhooks/billing",        post(billing::webhook::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex;

  use async_trait::async_trait;
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use bytes::Bytes;
  use closerhub_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use crate::collab::{self, billing::sign};

  const WEBHOOK_SECRET: &str = "whsec_test";

  #[derive(Default)]
  struct FakeBilling {
    checkouts: Mutex<Vec<(String, Uuid)>>,
  }

  #[async_trait]
  impl BillingProvider for FakeBilling {
    async fn create_checkout(&self, email: &str, closer_id: Uuid) -> collab::Result<String> {
      self.checkouts.lock().unwrap().push((email.to_owned(), closer_id));
      Ok(format!("https://billing.test/checkout/{closer_id}"))
    }

    async fn create_portal(&self, customer_ref: &str) -> collab::Result<String> {
      Ok(format!("https://billing.test/portal/{customer_ref}"))
    }
  }

  struct FakeStorage;

  #[async_trait]
  impl ObjectStorage for FakeStorage {
    async fn put(
      &self,
      _field: &str,
      filename: &str,
      _content_type: Option<&str>,
      _bytes: Bytes,
    ) -> collab::Result<String> {
      Ok(format!("https://cdn.test/{filename}"))
    }
  }

  async fn make_state() -> (AppState<SqliteStore>, Arc<FakeBilling>) {
    let billing = Arc::new(FakeBilling::default());
    let state = AppState {
      store:   Arc::new(SqliteStore::open_in_memory().await.unwrap()),
      config:  Arc::new(ServerConfig {
        billing: BillingConfig {
          webhook_secret: WEBHOOK_SECRET.to_owned(),
          ..BillingConfig::default()
        },
        ..ServerConfig::default()
      }),
      billing: billing.clone(),
      storage: Arc::new(FakeStorage),
    };
    (state, billing)
  }

  async fn send(
    state:        &AppState<SqliteStore>,
    method:       &str,
    uri:          &str,
    cookie:       Option<&str>,
    content_type: Option<&str>,
    body:         impl Into<Body>,
  ) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
      builder = builder.header(header::COOKIE, cookie);
    }
    if let Some(ct) = content_type {
      builder = builder.header(header::CONTENT_TYPE, ct);
    }
    let req = builder.body(body.into()).unwrap();
    router(state.clone()).oneshot(req).await.unwrap()
  }

  async fn get_as(state: &AppState<SqliteStore>, uri: &str, cookie: Option<&str>) -> Response {
    send(state, "GET", uri, cookie, None, Body::empty()).await
  }

  async fn post_form(
    state:  &AppState<SqliteStore>,
    uri:    &str,
    cookie: Option<&str>,
    form:   &str,
  ) -> Response {
    send(
      state,
      "POST",
      uri,
      cookie,
      Some("application/x-www-form-urlencoded"),
      form.to_owned(),
    )
    .await
  }

  fn location(resp: &Response) -> &str {
    resp.headers().get(header::LOCATION).unwrap().to_str().unwrap()
  }

  /// `name=value` part of the session `Set-Cookie` header.
  fn cookie_of(resp: &Response) -> String {
    let set = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    set.split(';').next().unwrap().to_owned()
  }

  async fn text(resp: Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
  }

  async fn json(resp: Response) -> serde_json::Value {
    serde_json::from_str(&text(resp).await).unwrap()
  }

  async fn register_closer(state: &AppState<SqliteStore>, email: &str, extra: &str) -> String {
    let form = format!("email={email}&password=pw123&firstName=Ann&lastName=Lee{extra}");
    let resp = post_form(state, "/register/closer", None, &form).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/dashboard");
    cookie_of(&resp)
  }

  async fn register_company(state: &AppState<SqliteStore>, email: &str, name: &str) -> String {
    let form = format!("email={email}&password=pw123&companyName={name}");
    let resp = post_form(state, "/register/company", None, &form).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/offers/mine");
    cookie_of(&resp)
  }

  async fn closer_id(state: &AppState<SqliteStore>, cookie: &str) -> Uuid {
    let page = json(get_as(state, "/dashboard", Some(cookie)).await).await;
    page["closer_id"].as_str().unwrap().parse().unwrap()
  }

  async fn webhook(state: &AppState<SqliteStore>, body: &str, signature: &str) -> Response {
    let req = Request::builder()
      .method("POST")
      .uri("/webhooks/billing")
      .header("stripe-signature", signature)
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_owned()))
      .unwrap();
    router(state.clone()).oneshot(req).await.unwrap()
  }

  fn signed(body: &str) -> String {
    sign(WEBHOOK_SECRET, chrono::Utc::now().timestamp(), body.as_bytes())
  }

  fn checkout_event(closer_id: Uuid, customer: &str) -> String {
    format!(
      r#"{{"type":"checkout.session.completed","data":{{"object":{{"client_reference_id":"{closer_id}","customer":"{customer}","subscription":"sub_{customer}"}}}}}}"#
    )
  }

  // ── Registration & login ────────────────────────────────────────────────────

  #[tokio::test]
  async fn registration_logs_in() {
    let (state, _) = make_state().await;
    let cookie = register_closer(&state, "ann@example.com", "&market=B2B").await;

    let resp = get_as(&state, "/dashboard", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = json(resp).await;
    assert_eq!(page["email"], "ann@example.com");
    assert_eq!(page["profile"]["first_name"], "Ann");
    assert_eq!(page["subscription"], "free");
    assert_eq!(page["photo_url"], "https://via.placeholder.com/150");
  }

  #[tokio::test]
  async fn company_registration_logs_in() {
    let (state, _) = make_state().await;
    let cookie = register_company(&state, "hr@acme.test", "Acme").await;
    let resp = get_as(&state, "/offers/mine", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn duplicate_email_is_conflict_across_roles() {
    let (state, _) = make_state().await;
    register_closer(&state, "dup@example.com", "").await;

    let resp = post_form(
      &state,
      "/register/company",
      None,
      "email=DUP@example.com&password=x&companyName=Acme",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());

    let resp = post_form(
      &state,
      "/register/closer",
      None,
      "email=dup@example.com&password=x&firstName=B&lastName=C",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn registration_validates_fields() {
    let (state, _) = make_state().await;
    let missing_name =
      post_form(&state, "/register/closer", None, "email=a@b.c&password=x&lastName=L").await;
    assert_eq!(missing_name.status(), StatusCode::BAD_REQUEST);

    let bad_enum = post_form(
      &state,
      "/register/closer",
      None,
      "email=a@b.c&password=x&firstName=F&lastName=L&profileType=Wizard",
    )
    .await;
    assert_eq!(bad_enum.status(), StatusCode::BAD_REQUEST);

    let no_company =
      post_form(&state, "/register/company", None, "email=a@b.c&password=x").await;
    assert_eq!(no_company.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn login_failures_are_generic() {
    let (state, _) = make_state().await;
    register_closer(&state, "ann@example.com", "").await;

    let wrong_password =
      post_form(&state, "/login", None, "email=ann@example.com&password=nope").await;
    let unknown_email =
      post_form(&state, "/login", None, "email=bob@example.com&password=pw123").await;

    for resp in [wrong_password, unknown_email] {
      assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
      assert!(resp.headers().get(header::SET_COOKIE).is_none());
      assert_eq!(text(resp).await, "invalid email or password");
    }
  }

  #[tokio::test]
  async fn login_lands_by_role() {
    let (state, _) = make_state().await;
    register_closer(&state, "ann@example.com", "").await;
    register_company(&state, "hr@acme.test", "Acme").await;

    let closer = post_form(&state, "/login", None, "email=ANN@example.com&password=pw123").await;
    assert_eq!(closer.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&closer), "/dashboard");
    let cookie = cookie_of(&closer);
    assert_eq!(get_as(&state, "/dashboard", Some(&cookie)).await.status(), StatusCode::OK);

    let company = post_form(&state, "/login", None, "email=hr@acme.test&password=pw123").await;
    assert_eq!(location(&company), "/offers/mine");
  }

  #[tokio::test]
  async fn logout_ends_the_session() {
    let (state, _) = make_state().await;
    let cookie = register_closer(&state, "ann@example.com", "").await;

    let resp = get_as(&state, "/logout", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");
    let cleared = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cleared.contains("Max-Age=0"));

    let resp = get_as(&state, "/dashboard", Some(&cookie)).await;
    assert_eq!(location(&resp), "/login");

    let resp = send(&state, "POST", "/logout", None, None, Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
  }

  #[tokio::test]
  async fn quoted_session_cookie_is_accepted() {
    let (state, _) = make_state().await;
    let cookie = register_closer(&state, "ann@example.com", "").await;
    let (name, token) = cookie.split_once('=').unwrap();
    let quoted = format!("theme=dark; {name}=\"{token}\"");

    let resp = get_as(&state, "/dashboard", Some(&quoted)).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn multipart_registration_with_photo() {
    let (state, _) = make_state().await;
    let ct = "multipart/form-data; boundary=XBOUNDARY";
    let body = [
      text_part("XBOUNDARY", "email", "ann@example.com"),
      text_part("XBOUNDARY", "password", "pw123"),
      text_part("XBOUNDARY", "firstName", "Ann"),
      text_part("XBOUNDARY", "lastName", "Lee"),
      text_part("XBOUNDARY", "skills", "SaaS, Immo"),
      multipart("XBOUNDARY", "photo", "me.png", "image/png", "PNGDATA"),
    ]
    .concat();

    let resp = send(&state, "POST", "/register/closer", None, Some(ct), body).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/dashboard");
    let cookie = cookie_of(&resp);

    let page = json(get_as(&state, "/dashboard", Some(&cookie)).await).await;
    assert_eq!(page["photo_url"], "https://cdn.test/me.png");
    assert_eq!(page["profile"]["product_types"], serde_json::json!(["SaaS", "Immo"]));
  }

  #[tokio::test]
  async fn multipart_registration_without_file_or_with_bad_file() {
    let (state, _) = make_state().await;
    let ct = "multipart/form-data; boundary=XBOUNDARY";
    let fields = [
      text_part("XBOUNDARY", "email", "ann@example.com"),
      text_part("XBOUNDARY", "password", "pw123"),
      text_part("XBOUNDARY", "firstName", "Ann"),
      text_part("XBOUNDARY", "lastName", "Lee"),
    ]
    .concat();

    let not_an_image = format!(
      "{fields}{}",
      multipart("XBOUNDARY", "photo", "notes.txt", "text/plain", "hello")
    );
    let resp = send(&state, "POST", "/register/closer", None, Some(ct), not_an_image).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let empty_input = format!(
      "{fields}{}",
      multipart("XBOUNDARY", "photo", "", "application/octet-stream", "")
    );
    let resp = send(&state, "POST", "/register/closer", None, Some(ct), empty_input).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let page = json(get_as(&state, "/dashboard", Some(&cookie_of(&resp))).await).await;
    assert_eq!(page["photo_url"], "https://via.placeholder.com/150");
  }

  // ── Access gates ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn gates_redirect_instead_of_failing() {
    let (state, _) = make_state().await;
    let closer = register_closer(&state, "ann@example.com", "").await;
    let company = register_company(&state, "hr@acme.test", "Acme").await;

    let anonymous = get_as(&state, "/dashboard", None).await;
    assert_eq!(anonymous.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&anonymous), "/login");

    let login = get_as(&state, location(&anonymous), None).await;
    assert_eq!(login.status(), StatusCode::OK);
    let login = json(login).await;
    assert_eq!(login["action"], "/login");
    assert_eq!(login["method"], "POST");

    let signed_in = get_as(&state, "/login", Some(&company)).await;
    assert_eq!(location(&signed_in), "/offers/mine");

    let forged = get_as(&state, "/offers", Some("closerhub_session=forged")).await;
    assert_eq!(location(&forged), "/login");

    let company_on_dashboard = get_as(&state, "/dashboard", Some(&company)).await;
    assert_eq!(location(&company_on_dashboard), "/offers/mine");

    let closer_on_mine = get_as(&state, "/offers/mine", Some(&closer)).await;
    assert_eq!(location(&closer_on_mine), "/dashboard");

    let closer_posting = post_form(&state, "/offers", Some(&closer), "title=t&description=d").await;
    assert_eq!(location(&closer_posting), "/dashboard");

    assert_eq!(get_as(&state, "/offers", Some(&closer)).await.status(), StatusCode::OK);
    assert_eq!(get_as(&state, "/offers", Some(&company)).await.status(), StatusCode::OK);
  }

  // ── Directory ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn directory_filters_and_public_view() {
    let (state, _) = make_state().await;
    register_closer(&state, "a@x.test", "&market=B2B&yearsExperience=7&skills=SaaS").await;
    register_closer(&state, "b@x.test", "&market=B2B&yearsExperience=2").await;
    register_closer(&state, "c@x.test", "&market=B2C&yearsExperience=9").await;

    let all = json(get_as(&state, "/", None).await).await;
    assert_eq!(all["count"], 3);
    assert!(all["viewer"].is_null());

    let filtered = json(get_as(&state, "/?market=B2B&yearsExperience=5", None).await).await;
    assert_eq!(filtered["count"], 1);
    assert_eq!(filtered["closers"][0]["profile"]["years_experience"], 7);

    let product = json(get_as(&state, "/?product=saa", None).await).await;
    assert_eq!(product["count"], 1);

    let junk = json(get_as(&state, "/?market=B2G&yearsExperience=lots&sort=weird", None).await).await;
    assert_eq!(junk["count"], 3);

    let id = filtered["closers"][0]["closer_id"].as_str().unwrap().to_owned();
    let resp = get_as(&state, &format!("/closers/{id}"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let profile = json(resp).await;
    assert!(profile.get("email").is_none());
    assert!(profile.get("subscription").is_none());
    assert_eq!(profile["photo_url"], "https://via.placeholder.com/150");

    let missing = get_as(&state, &format!("/closers/{}", Uuid::new_v4()), None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
  }

  // ── Dashboard ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn profile_update_round_trip() {
    let (state, _) = make_state().await;
    let cookie = register_closer(&state, "ann@example.com", "").await;

    let resp = post_form(
      &state,
      "/dashboard/update",
      Some(&cookie),
      "firstName=Anna&lastName=Lee&yearsExperience=3&productTypes=SaaS,+Immo&market=Both",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/dashboard");

    let page = json(get_as(&state, "/dashboard", Some(&cookie)).await).await;
    assert_eq!(page["profile"]["first_name"], "Anna");
    assert_eq!(page["profile"]["years_experience"], 3);
    assert_eq!(page["profile"]["product_types"], serde_json::json!(["SaaS", "Immo"]));
    assert_eq!(page["email"], "ann@example.com");

    let bad = post_form(
      &state,
      "/dashboard/update",
      Some(&cookie),
      "firstName=Anna&lastName=Lee&market=Mars",
    )
    .await;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
  }

  fn text_part(boundary: &str, name: &str, value: &str) -> String {
    format!(
      "--{boundary}\r\n\
       Content-Disposition: form-data; name=\"{name}\"\r\n\r\n\
       {value}\r\n"
    )
  }

  fn multipart(boundary: &str, name: &str, filename: &str, content_type: &str, data: &str) -> String {
    format!(
      "--{boundary}\r\n\
       Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
       Content-Type: {content_type}\r\n\r\n\
       {data}\r\n\
       --{boundary}--\r\n"
    )
  }

  #[tokio::test]
  async fn photo_upload_stores_url() {
    let (state, _) = make_state().await;
    let cookie = register_closer(&state, "ann@example.com", "").await;
    let ct = "multipart/form-data; boundary=XBOUNDARY";

    let body = multipart("XBOUNDARY", "photo", "me.png", "image/png", "PNGDATA");
    let resp = send(&state, "POST", "/dashboard/photo", Some(&cookie), Some(ct), body).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let page = json(get_as(&state, "/dashboard", Some(&cookie)).await).await;
    assert_eq!(page["photo_url"], "https://cdn.test/me.png");

    let body = multipart("XBOUNDARY", "photo", "notes.txt", "text/plain", "hello");
    let resp = send(&state, "POST", "/dashboard/photo", Some(&cookie), Some(ct), body).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body = multipart("XBOUNDARY", "avatar", "me.png", "image/png", "PNGDATA");
    let resp = send(&state, "POST", "/dashboard/photo", Some(&cookie), Some(ct), body).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  // ── Job board ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn job_board_flow() {
    let (state, _) = make_state().await;
    let owner = register_company(&state, "c@corp.test", "C+Corp").await;
    let other = register_company(&state, "b@corp.test", "B+Corp").await;
    let closer = register_closer(&state, "ann@example.com", "").await;

    let resp = post_form(
      &state,
      "/offers",
      Some(&owner),
      "title=Closer+SaaS&description=Inbound&missionType=Mission",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/offers/mine");

    let mine = json(get_as(&state, "/offers/mine", Some(&owner)).await).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["company_name"], "C Corp");
    assert_eq!(mine[0]["applicant_count"], 0);
    let offer_id = mine[0]["offer_id"].as_str().unwrap().to_owned();
    let applicants_uri = format!("/offers/{offer_id}/applicants");

    let before = json(get_as(&state, &applicants_uri, Some(&owner)).await).await;
    assert_eq!(before, serde_json::json!([]));

    for _ in 0..2 {
      let resp = post_form(&state, &format!("/offers/{offer_id}/apply"), Some(&closer), "").await;
      assert_eq!(resp.status(), StatusCode::SEE_OTHER);
      assert_eq!(location(&resp), "/offers");
      let after = json(get_as(&state, &applicants_uri, Some(&owner)).await).await;
      assert_eq!(after.as_array().unwrap().len(), 1);
      assert_eq!(after[0]["profile"]["first_name"], "Ann");
      assert!(after[0].get("email").is_none());
    }

    let listed = json(get_as(&state, "/offers", Some(&closer)).await).await;
    assert_eq!(listed[0]["has_applied"], true);
    assert_eq!(listed[0]["applicant_count"], 1);

    let foreign = get_as(&state, &applicants_uri, Some(&other)).await;
    let missing = get_as(&state, &format!("/offers/{}/applicants", Uuid::new_v4()), Some(&owner)).await;
    assert_eq!(foreign.status(), StatusCode::NOT_FOUND);
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(text(foreign).await, text(missing).await);

    let resp = post_form(&state, &format!("/offers/{}/apply", Uuid::new_v4()), Some(&closer), "").await;
    assert_eq!(location(&resp), "/offers");

    let delete_uri = format!("/offers/{offer_id}/delete");
    let resp = post_form(&state, &delete_uri, Some(&other), "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = post_form(&state, &delete_uri, Some(&owner), "").await;
    assert_eq!(location(&resp), "/offers/mine");
    let resp = post_form(&state, &delete_uri, Some(&owner), "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let page = json(get_as(&state, "/dashboard", Some(&closer)).await).await;
    assert_eq!(page["applications"], serde_json::json!([]));
  }

  #[tokio::test]
  async fn malformed_ids_look_like_unknown_ones() {
    let (state, _) = make_state().await;
    let owner = register_company(&state, "c@corp.test", "Corp").await;
    let closer = register_closer(&state, "ann@example.com", "").await;

    for uri in ["/offers/not-a-uuid/applicants", "/offers/42/applicants"] {
      let resp = get_as(&state, uri, Some(&owner)).await;
      assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
    }
    let resp = post_form(&state, "/offers/not-a-uuid/delete", Some(&owner), "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = post_form(&state, "/offers/not-a-uuid/apply", Some(&closer), "").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/offers");

    let resp = get_as(&state, "/closers/not-a-uuid", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn offer_requires_title_and_description() {
    let (state, _) = make_state().await;
    let owner = register_company(&state, "c@corp.test", "Corp").await;
    let resp = post_form(&state, "/offers", Some(&owner), "title=Only+a+title").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  // ── Billing ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn checkout_webhook_and_portal() {
    let (state, billing) = make_state().await;
    let cookie = register_closer(&state, "ann@example.com", "").await;
    let id = closer_id(&state, &cookie).await;

    let portal = send(&state, "POST", "/billing/portal", Some(&cookie), None, Body::empty()).await;
    assert_eq!(location(&portal), "/dashboard");

    let checkout = send(&state, "POST", "/billing/checkout", Some(&cookie), None, Body::empty()).await;
    assert_eq!(checkout.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&checkout), format!("https://billing.test/checkout/{id}"));
    assert_eq!(
      billing.checkouts.lock().unwrap().as_slice(),
      &[("ann@example.com".to_owned(), id)]
    );

    let event = checkout_event(id, "cus_ann");
    for _ in 0..2 {
      let resp = webhook(&state, &event, &signed(&event)).await;
      assert_eq!(resp.status(), StatusCode::OK);
      let page = json(get_as(&state, "/dashboard", Some(&cookie)).await).await;
      assert_eq!(page["subscription"], "premium");
      assert_eq!(page["can_manage_billing"], true);
    }

    let directory = json(get_as(&state, "/", Some(&cookie)).await).await;
    assert_eq!(directory["viewer"]["is_premium"], true);

    let again = send(&state, "POST", "/billing/checkout", Some(&cookie), None, Body::empty()).await;
    assert_eq!(location(&again), "/dashboard");
    assert_eq!(billing.checkouts.lock().unwrap().len(), 1);

    let portal = send(&state, "POST", "/billing/portal", Some(&cookie), None, Body::empty()).await;
    assert_eq!(location(&portal), "https://billing.test/portal/cus_ann");

    let failed = r#"{"type":"invoice.payment_failed","data":{"object":{"customer":"cus_ann"}}}"#;
    assert_eq!(webhook(&state, failed, &signed(failed)).await.status(), StatusCode::OK);
    let page = json(get_as(&state, "/dashboard", Some(&cookie)).await).await;
    assert_eq!(page["subscription"], "free");
  }

  #[tokio::test]
  async fn webhook_rejects_bad_signatures() {
    let (state, _) = make_state().await;
    let cookie = register_closer(&state, "ann@example.com", "").await;
    let id = closer_id(&state, &cookie).await;
    let event = checkout_event(id, "cus_ann");

    let forged = sign("whsec_attacker", chrono::Utc::now().timestamp(), event.as_bytes());
    assert_eq!(webhook(&state, &event, &forged).await.status(), StatusCode::BAD_REQUEST);

    let stale = sign(WEBHOOK_SECRET, chrono::Utc::now().timestamp() - 301, event.as_bytes());
    assert_eq!(webhook(&state, &event, &stale).await.status(), StatusCode::BAD_REQUEST);

    let page = json(get_as(&state, "/dashboard", Some(&cookie)).await).await;
    assert_eq!(page["subscription"], "free");
  }

  #[tokio::test]
  async fn webhook_for_unknown_customer_is_acknowledged() {
    let (state, _) = make_state().await;
    let cookie = register_closer(&state, "ann@example.com", "").await;

    let body = r#"{"type":"invoice.payment_failed","data":{"object":{"customer":"cus_ghost"}}}"#;
    assert_eq!(webhook(&state, body, &signed(body)).await.status(), StatusCode::OK);

    let ignored = r#"{"type":"customer.created","data":{"object":{"id":"cus_1"}}}"#;
    assert_eq!(webhook(&state, ignored, &signed(ignored)).await.status(), StatusCode::OK);

    let page = json(get_as(&state, "/dashboard", Some(&cookie)).await).await;
    assert_eq!(page["subscription"], "free");
  }
}
