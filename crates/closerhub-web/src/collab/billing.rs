//! Payment provider: hosted checkout, customer portal and inbound webhook
//! verification.

use std::time::Duration;

use async_trait::async_trait;
use closerhub_core::{Error as CoreError, subscription::BillingEvent};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use super::{Error, Result};
use crate::BillingConfig;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

// ─── Provider ────────────────────────────────────────────────────────────────

/// Outbound calls to the payment provider. Both return the URL the browser
/// should be redirected to.
#[async_trait]
pub trait BillingProvider: Send + Sync {
  async fn create_checkout(&self, email: &str, closer_id: Uuid) -> Result<String>;

  async fn create_portal(&self, customer_ref: &str) -> Result<String>;
}

/// Stripe REST adapter. Requests are form-encoded, as the Stripe API expects.
#[derive(Clone)]
pub struct StripeBilling {
  client:     reqwest::Client,
  api_base:   String,
  secret_key: String,
  price_id:   String,
  return_url: String,
}

#[derive(Deserialize)]
struct HostedSession {
  url: String,
}

impl StripeBilling {
  pub fn new(config: &BillingConfig, base_url: &str) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(15))
      .build()?;
    Ok(Self {
      client,
      api_base: config.api_base.trim_end_matches('/').to_owned(),
      secret_key: config.secret_key.clone(),
      price_id: config.price_id.clone(),
      return_url: format!("{}/dashboard", base_url.trim_end_matches('/')),
    })
  }

  async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<String> {
    let response = self
      .client
      .post(format!("{}{path}", self.api_base))
      .bearer_auth(&self.secret_key)
      .form(form)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(Error::Status { status: status.as_u16(), body });
    }

    let session: HostedSession = response.json().await?;
    Ok(session.url)
  }
}

#[async_trait]
impl BillingProvider for StripeBilling {
  async fn create_checkout(&self, email: &str, closer_id: Uuid) -> Result<String> {
    let reference = closer_id.to_string();
    let success_url = format!("{}?checkout=success", self.return_url);
    self
      .post_form("/v1/checkout/sessions", &[
        ("mode", "subscription"),
        ("line_items[0][price]", self.price_id.as_str()),
        ("line_items[0][quantity]", "1"),
        ("success_url", success_url.as_str()),
        ("cancel_url", self.return_url.as_str()),
        ("customer_email", email),
        ("client_reference_id", reference.as_str()),
      ])
      .await
  }

  async fn create_portal(&self, customer_ref: &str) -> Result<String> {
    self
      .post_form("/v1/billing_portal/sessions", &[
        ("customer", customer_ref),
        ("return_url", self.return_url.as_str()),
      ])
      .await
  }
}

// ─── Webhook signature ───────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
  #[error("webhook secret is not configured")]
  NotConfigured,
  #[error("missing signature header")]
  Missing,
  #[error("malformed signature header")]
  Malformed,
  #[error("signature timestamp outside tolerance")]
  Stale,
  #[error("signature mismatch")]
  Mismatch,
}

/// Check a `t=<unix>,v1=<hex>` header against the raw request body.
///
/// The signed payload is `"<t>.<body>"`. Any `v1` entry may match; other
/// schemes are ignored.
pub fn verify_signature(
  secret: &str,
  header: Option<&str>,
  body: &[u8],
  now: i64,
  tolerance_secs: i64,
) -> Result<(), SignatureError> {
  if secret.is_empty() {
    return Err(SignatureError::NotConfigured);
  }
  let header = header.ok_or(SignatureError::Missing)?;

  let mut timestamp = None;
  let mut candidates = Vec::new();
  for part in header.split(',') {
    match part.trim().split_once('=') {
      Some(("t", v)) => timestamp = v.parse::<i64>().ok(),
      Some(("v1", v)) => candidates.push(v),
      _ => {}
    }
  }
  let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
  if candidates.is_empty() {
    return Err(SignatureError::Malformed);
  }
  if (now - timestamp).abs() > tolerance_secs {
    return Err(SignatureError::Stale);
  }

  let expected = expected_signature(secret, timestamp, body)?;
  let matched = candidates
    .iter()
    .filter_map(|c| hex::decode(c).ok())
    .any(|sig| bool::from(sig.as_slice().ct_eq(expected.as_slice())));

  if matched { Ok(()) } else { Err(SignatureError::Mismatch) }
}

fn expected_signature(
  secret: &str,
  timestamp: i64,
  body: &[u8],
) -> Result<Vec<u8>, SignatureError> {
  let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
    .map_err(|_| SignatureError::NotConfigured)?;
  mac.update(timestamp.to_string().as_bytes());
  mac.update(b".");
  mac.update(body);
  Ok(mac.finalize().into_bytes().to_vec())
}

/// Build a header value the way the provider does.
#[cfg(test)]
pub(crate) fn sign(secret: &str, timestamp: i64, body: &[u8]) -> String {
  let signature = expected_signature(secret, timestamp, body).unwrap();
  format!("t={timestamp},v1={}", hex::encode(signature))
}

// ─── Webhook payload ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct Envelope {
  #[serde(rename = "type")]
  kind: String,
  data: EnvelopeData,
}

#[derive(Deserialize)]
struct EnvelopeData {
  object: serde_json::Value,
}

#[derive(Deserialize)]
struct CheckoutSession {
  client_reference_id: Option<String>,
  customer:            Option<String>,
  subscription:        Option<String>,
}

/// Subscriptions and invoices both carry the customer id we key on.
#[derive(Deserialize)]
struct CustomerScoped {
  customer: Option<String>,
}

/// Decode a verified webhook body. Event types the marketplace does not
/// consume decode to `None`.
pub fn parse_event(body: &[u8]) -> closerhub_core::Result<Option<BillingEvent>> {
  let envelope: Envelope = serde_json::from_slice(body)?;

  let event = match envelope.kind.as_str() {
    "checkout.session.completed" => {
      let session: CheckoutSession = serde_json::from_value(envelope.data.object)?;
      let reference = session
        .client_reference_id
        .ok_or(CoreError::MissingField("client_reference_id"))?;
      let closer_id = Uuid::parse_str(&reference)
        .map_err(|_| CoreError::MalformedEvent(format!("bad client_reference_id: {reference:?}")))?;
      BillingEvent::CheckoutCompleted {
        closer_id,
        customer_ref: session.customer.ok_or(CoreError::MissingField("customer"))?,
        subscription_ref: session.subscription,
      }
    }
    "customer.subscription.deleted" => {
      let object: CustomerScoped = serde_json::from_value(envelope.data.object)?;
      BillingEvent::SubscriptionDeleted {
        customer_ref: object.customer.ok_or(CoreError::MissingField("customer"))?,
      }
    }
    "invoice.payment_failed" => {
      let object: CustomerScoped = serde_json::from_value(envelope.data.object)?;
      BillingEvent::PaymentFailed {
        customer_ref: object.customer.ok_or(CoreError::MissingField("customer"))?,
      }
    }
    _ => return Ok(None),
  };

  Ok(Some(event))
}
