//! The subscription state machine.
//!
//! A closer is either `Free` or `Premium`. The only inputs are billing
//! provider events; each event maps to exactly one [`SubscriptionUpdate`],
//! which a store applies as a single atomic column update. Nothing else in
//! the system writes the premium flag.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::Subscription;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
  Free,
  Premium,
}

impl SubscriptionState {
  pub fn is_premium(self) -> bool { matches!(self, Self::Premium) }
}

impl Subscription {
  pub fn state(&self) -> SubscriptionState {
    if self.is_premium { SubscriptionState::Premium } else { SubscriptionState::Free }
  }
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// A verified billing event, already stripped of provider-specific framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEvent {
  CheckoutCompleted {
    closer_id:        Uuid,
    customer_ref:     String,
    subscription_ref: Option<String>,
  },
  SubscriptionDeleted {
    customer_ref: String,
  },
  PaymentFailed {
    customer_ref: String,
  },
}

impl BillingEvent {
  /// Short name used in logs.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::CheckoutCompleted { .. } => "checkout_completed",
      Self::SubscriptionDeleted { .. } => "subscription_deleted",
      Self::PaymentFailed { .. } => "payment_failed",
    }
  }

  /// The update this event requires.
  pub fn transition(&self) -> SubscriptionUpdate {
    match self {
      Self::CheckoutCompleted { closer_id, customer_ref, subscription_ref } => {
        SubscriptionUpdate {
          target:           SubscriptionTarget::Closer(*closer_id),
          state:            SubscriptionState::Premium,
          customer_ref:     RefChange::Set(customer_ref.clone()),
          subscription_ref: subscription_ref
            .clone()
            .map_or(RefChange::Keep, RefChange::Set),
        }
      }
      Self::SubscriptionDeleted { customer_ref } => SubscriptionUpdate {
        target:           SubscriptionTarget::Customer(customer_ref.clone()),
        state:            SubscriptionState::Free,
        customer_ref:     RefChange::Keep,
        subscription_ref: RefChange::Clear,
      },
      Self::PaymentFailed { customer_ref } => SubscriptionUpdate {
        target:           SubscriptionTarget::Customer(customer_ref.clone()),
        state:            SubscriptionState::Free,
        customer_ref:     RefChange::Keep,
        subscription_ref: RefChange::Keep,
      },
    }
  }
}

// ─── Updates ─────────────────────────────────────────────────────────────────

/// Which closer row an update applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionTarget {
  Closer(Uuid),
  /// Looked up by billing customer reference.
  Customer(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefChange {
  Keep,
  Set(String),
  Clear,
}

impl RefChange {
  pub fn apply(&self, current: Option<String>) -> Option<String> {
    match self {
      Self::Keep => current,
      Self::Set(v) => Some(v.clone()),
      Self::Clear => None,
    }
  }
}

/// A field-level write to a closer's subscription columns.
///
/// Every update assigns absolute values, so applying it twice leaves the
/// same state as applying it once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionUpdate {
  pub target:           SubscriptionTarget,
  pub state:            SubscriptionState,
  pub customer_ref:     RefChange,
  pub subscription_ref: RefChange,
}

impl SubscriptionUpdate {
  /// The subscription that results from applying this update to `current`.
  pub fn apply_to(&self, current: &Subscription) -> Subscription {
    Subscription {
      is_premium:       self.state.is_premium(),
      customer_ref:     self.customer_ref.apply(current.customer_ref.clone()),
      subscription_ref: self.subscription_ref.apply(current.subscription_ref.clone()),
    }
  }

  /// Whether this update targets `closer_id` holding `current`.
  pub fn targets(&self, closer_id: Uuid, current: &Subscription) -> bool {
    match &self.target {
      SubscriptionTarget::Closer(id) => *id == closer_id,
      SubscriptionTarget::Customer(r) => current.customer_ref.as_deref() == Some(r.as_str()),
    }
  }
}
