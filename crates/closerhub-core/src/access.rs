//! Role gates.
//!
//! Routes declare an [`AccessRule`]; [`check`] decides whether the current
//! session satisfies it. Mismatches are never errors: the web layer turns
//! them into redirects.

use crate::{account::Role, session::SessionIdentity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRule {
  Closer,
  Company,
  /// Any authenticated account.
  Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
  Granted,
  /// No session: send the caller to the login entry point.
  Login,
  /// Authenticated with the wrong role: send the caller to their own
  /// landing page.
  WrongRole(Role),
}

pub fn check(rule: AccessRule, identity: Option<&SessionIdentity>) -> Access {
  let Some(identity) = identity else {
    return Access::Login;
  };
  let allowed = match rule {
    AccessRule::Any => true,
    AccessRule::Closer => identity.role == Role::Closer,
    AccessRule::Company => identity.role == Role::Company,
  };
  if allowed { Access::Granted } else { Access::WrongRole(identity.role) }
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;

  fn identity(role: Role) -> SessionIdentity {
    SessionIdentity {
      account_id: Uuid::new_v4(),
      role,
      display_name: "x".into(),
      is_premium: false,
    }
  }

  #[test]
  fn anonymous_goes_to_login() {
    assert_eq!(check(AccessRule::Any, None), Access::Login);
    assert_eq!(check(AccessRule::Closer, None), Access::Login);
  }

  #[test]
  fn matching_role_is_granted() {
    assert_eq!(check(AccessRule::Closer, Some(&identity(Role::Closer))), Access::Granted);
    assert_eq!(check(AccessRule::Company, Some(&identity(Role::Company))), Access::Granted);
    assert_eq!(check(AccessRule::Any, Some(&identity(Role::Company))), Access::Granted);
  }

  #[test]
  fn mismatch_reports_actual_role() {
    assert_eq!(
      check(AccessRule::Company, Some(&identity(Role::Closer))),
      Access::WrongRole(Role::Closer)
    );
    assert_eq!(
      check(AccessRule::Closer, Some(&identity(Role::Company))),
      Access::WrongRole(Role::Company)
    );
  }
}
