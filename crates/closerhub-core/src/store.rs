//! The `MarketStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `closerhub-store-sqlite`). The web layer depends on this abstraction, not
//! on any concrete backend.
//!
//! Writes that can race with other requests are expressed as single atomic
//! operations: adding an applicant is an insert-if-absent, subscription
//! changes are column updates, offer deletion is scoped by owner in the same
//! statement that removes it.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  account::{
    Closer, CloserProfile, Company, Credentials, NewCloser, NewCompany, Registration,
  },
  directory::DirectoryQuery,
  offer::{ApplyOutcome, NewOffer, Offer},
  session::Session,
  subscription::SubscriptionUpdate,
};

/// Abstraction over a closerhub store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait MarketStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Identity ──────────────────────────────────────────────────────────

  /// Create a closer account and profile. Returns
  /// [`Registration::EmailTaken`] if any account, of either role, already
  /// uses the email.
  fn create_closer(
    &self,
    input: NewCloser,
  ) -> impl Future<Output = Result<Registration<Closer>, Self::Error>> + Send + '_;

  /// Create a company account. Same uniqueness rule as
  /// [`Self::create_closer`].
  fn create_company(
    &self,
    input: NewCompany,
  ) -> impl Future<Output = Result<Registration<Company>, Self::Error>> + Send + '_;

  /// Look up an account and its credential by normalised email.
  fn find_credentials(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<Credentials>, Self::Error>> + Send + '_;

  fn get_closer(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Closer>, Self::Error>> + Send + '_;

  /// Replace the editable profile fields of a closer. Subscription fields,
  /// email and credential are untouched. Returns `false` if no such closer.
  fn update_closer_profile(
    &self,
    id: Uuid,
    profile: CloserProfile,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Store the object-storage reference of a closer's photo.
  fn set_closer_photo(
    &self,
    id: Uuid,
    url: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Directory ─────────────────────────────────────────────────────────

  /// Every closer satisfying `query`, in the query's sort order.
  fn search_closers<'a>(
    &'a self,
    query: &'a DirectoryQuery,
  ) -> impl Future<Output = Result<Vec<Closer>, Self::Error>> + Send + 'a;

  // ── Subscription ──────────────────────────────────────────────────────

  /// Apply a state-machine update atomically. Returns `false` when the
  /// target matched no closer.
  fn apply_subscription_update(
    &self,
    update: SubscriptionUpdate,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Sessions ──────────────────────────────────────────────────────────

  /// Persist a new session and sweep expired ones.
  fn create_session(
    &self,
    session: Session,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Fetch a live session by token digest. Expired sessions are `None`.
  fn get_session(
    &self,
    token_digest: String,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + '_;

  /// Overwrite the premium snapshot of a session.
  fn refresh_session_premium(
    &self,
    token_digest: String,
    is_premium: bool,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn delete_session(
    &self,
    token_digest: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Job board ─────────────────────────────────────────────────────────

  /// Create an offer, copying the company's current display name onto it.
  /// Returns `None` if `company_id` is not a company account.
  fn create_offer(
    &self,
    input: NewOffer,
  ) -> impl Future<Output = Result<Option<Offer>, Self::Error>> + Send + '_;

  /// All offers, newest first.
  fn list_offers(
    &self,
  ) -> impl Future<Output = Result<Vec<Offer>, Self::Error>> + Send + '_;

  /// Offers owned by `company_id`, newest first.
  fn list_company_offers(
    &self,
    company_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Offer>, Self::Error>> + Send + '_;

  /// Offers `closer_id` has applied to, newest first.
  fn list_applied_offers(
    &self,
    closer_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Offer>, Self::Error>> + Send + '_;

  /// Add `closer_id` to the offer's applicant set if absent.
  fn apply_to_offer(
    &self,
    offer_id: Uuid,
    closer_id: Uuid,
  ) -> impl Future<Output = Result<ApplyOutcome, Self::Error>> + Send + '_;

  /// Applicant profiles of an offer owned by `company_id`. `None` when the
  /// offer does not exist or belongs to another company; callers cannot
  /// tell the two apart.
  fn offer_applicants(
    &self,
    offer_id: Uuid,
    company_id: Uuid,
  ) -> impl Future<Output = Result<Option<Vec<Closer>>, Self::Error>> + Send + '_;

  /// Delete an offer owned by `company_id`. `false` when nothing matched.
  fn delete_offer(
    &self,
    offer_id: Uuid,
    company_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
