pub mod account;
pub mod billing;
pub mod dashboard;
pub mod directory;
pub mod offers;

use closerhub_core::account::{Closer, PublicCloser};
use uuid::Uuid;

/// Public view of a closer, with the placeholder photo filled in.
pub(crate) fn public_view(closer: Closer, placeholder: &str) -> PublicCloser {
  let mut view = PublicCloser::from(closer);
  if view.photo_url.is_none() {
    view.photo_url = Some(placeholder.to_owned());
  }
  view
}

/// Record ids arrive as raw path segments. One that is not a UUID names no
/// record, so callers treat `None` exactly like a well-formed unknown id.
pub(crate) fn record_id(raw: &str) -> Option<Uuid> { Uuid::parse_str(raw).ok() }
