//! The directory query builder.
//!
//! [`DirectoryQuery::from_pairs`] is the only place untrusted filter
//! parameters are interpreted. It never fails: a value that cannot be
//! understood contributes no constraint. Storage backends compile the typed
//! query into their own query language; [`DirectoryQuery::matches`] and
//! [`DirectoryQuery::compare`] are the reference semantics they must agree
//! with.

use std::{cmp::Ordering, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
  account::{Closer, MAX_AMOUNT, Market, MissionType, ProfileType},
  normalize,
};

// ─── Sort ────────────────────────────────────────────────────────────────────

/// Result ordering. Premium closers always come first in both modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
  /// Premium first, then newest first.
  #[default]
  Default,
  /// Premium first, then highest `total_closed` first, then newest first.
  Best,
}

impl SortMode {
  pub fn from_param(raw: &str) -> Self {
    if raw.trim().eq_ignore_ascii_case("best") { Self::Best } else { Self::Default }
  }
}

// ─── Query ───────────────────────────────────────────────────────────────────

/// A validated directory filter. All populated constraints are ANDed; empty
/// or `None` fields constrain nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryQuery {
  /// Case-folded terms; each must be a substring of some product type.
  pub product_terms:        Vec<String>,
  pub profile_type:         Option<ProfileType>,
  pub market:               Option<Market>,
  pub mission_type:         Option<MissionType>,
  /// The closer's product types must intersect this set.
  pub product_types:        Vec<String>,
  /// Case-folded terms; each must be a substring of some contract type.
  pub contract_terms:       Vec<String>,
  pub min_years_experience: Option<u32>,
  pub min_total_closed:     Option<u64>,
  pub sort:                 SortMode,
}

impl DirectoryQuery {
  /// Build a query from raw `(key, value)` pairs, e.g. a decoded query
  /// string. Keys may repeat. Unknown keys are ignored.
  pub fn from_pairs<I, K, V>(pairs: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
  {
    let mut q = Self::default();
    let mut product_types_raw: Vec<String> = Vec::new();

    for (key, value) in pairs {
      let value = value.as_ref().trim();
      if value.is_empty() {
        continue;
      }
      match key.as_ref() {
        "product" | "skill" => push_term(&mut q.product_terms, value),
        "profileType" => q.profile_type = parse_enum(value).or(q.profile_type),
        "market" => q.market = parse_enum(value).or(q.market),
        "missionType" => q.mission_type = parse_enum(value).or(q.mission_type),
        "productTypes" | "productTypes[]" => {
          product_types_raw.extend(value.split(',').map(str::to_owned));
        }
        "contractType" => push_term(&mut q.contract_terms, value),
        "yearsExperience" => {
          q.min_years_experience = max_opt(q.min_years_experience, parse_threshold(value));
        }
        "totalClosed" | "revenueMin" => {
          let min = parse_threshold::<u64>(value).map(|v| v.min(MAX_AMOUNT));
          q.min_total_closed = max_opt(q.min_total_closed, min);
        }
        "sort" => q.sort = SortMode::from_param(value),
        _ => {}
      }
    }

    q.product_types = normalize::dedupe(product_types_raw);
    q
  }

  /// Whether `closer` satisfies every constraint.
  pub fn matches(&self, closer: &Closer) -> bool {
    let p = &closer.profile;

    let products_lower = normalize::fold_list(&p.product_types);
    let contracts_lower = normalize::fold_list(&p.contract_types);

    self
      .product_terms
      .iter()
      .all(|t| products_lower.iter().any(|v| v.contains(t.as_str())))
      && self.profile_type.is_none_or(|v| p.profile_type == Some(v))
      && self.market.is_none_or(|v| p.market == Some(v))
      && self.mission_type.is_none_or(|v| p.mission_type == Some(v))
      && (self.product_types.is_empty()
        || p.product_types.iter().any(|v| self.product_types.contains(v)))
      && self
        .contract_terms
        .iter()
        .all(|t| contracts_lower.iter().any(|v| v.contains(t.as_str())))
      && self.min_years_experience.is_none_or(|m| p.years_experience >= m)
      && self.min_total_closed.is_none_or(|m| p.total_closed >= m)
  }

  /// Order two closers according to [`Self::sort`].
  pub fn compare(&self, a: &Closer, b: &Closer) -> Ordering {
    let premium = b.is_premium().cmp(&a.is_premium());
    let newest = b.created_at.cmp(&a.created_at);
    match self.sort {
      SortMode::Default => premium.then(newest),
      SortMode::Best => premium
        .then(b.profile.total_closed.cmp(&a.profile.total_closed))
        .then(newest),
    }
  }
}

// ─── Parsing helpers ─────────────────────────────────────────────────────────

fn push_term(terms: &mut Vec<String>, value: &str) {
  let term = normalize::fold_case(value);
  if !terms.contains(&term) {
    terms.push(term);
  }
}

fn parse_enum<T: FromStr>(value: &str) -> Option<T> { value.parse().ok() }

fn parse_threshold<T: FromStr>(value: &str) -> Option<T> {
  value.trim_start_matches('+').parse().ok()
}

fn max_opt<T: Ord>(a: Option<T>, b: Option<T>) -> Option<T> {
  match (a, b) {
    (Some(a), Some(b)) => Some(a.max(b)),
    (a, b) => a.or(b),
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, Utc};
  use uuid::Uuid;

  use super::*;
  use crate::account::{CloserProfile, Subscription};

  fn closer(profile: CloserProfile, premium: bool, age_secs: i64) -> Closer {
    Closer {
      closer_id: Uuid::new_v4(),
      email: "c@example.com".into(),
      photo_url: None,
      profile,
      subscription: Subscription { is_premium: premium, ..Default::default() },
      created_at: Utc::now() - Duration::seconds(age_secs),
    }
  }

  fn q(pairs: &[(&str, &str)]) -> DirectoryQuery {
    DirectoryQuery::from_pairs(pairs.iter().copied())
  }

  /// No filter set; the sort mode is not a filter.
  fn unconstrained(query: &DirectoryQuery) -> bool {
    DirectoryQuery { sort: query.sort, ..DirectoryQuery::default() } == *query
  }

  #[test]
  fn empty_input_is_unconstrained() {
    let query = q(&[]);
    assert!(unconstrained(&query));
    assert_eq!(query.sort, SortMode::Default);
  }

  #[test]
  fn unknown_keys_are_ignored() {
    let query = q(&[("$where", "1"), ("password", "x"), ("sort", "best")]);
    assert!(unconstrained(&query));
    assert_eq!(query.sort, SortMode::Best);
  }

  #[test]
  fn malformed_values_degrade_to_no_constraint() {
    let query = q(&[
      ("yearsExperience", "five"),
      ("totalClosed", "-3"),
      ("revenueMin", "1e9"),
      ("market", "B2G"),
      ("profileType", ""),
      ("sort", "worst"),
    ]);
    assert!(unconstrained(&query));
    assert_eq!(query.sort, SortMode::Default);
  }

  #[test]
  fn product_and_skill_are_lowercased_terms() {
    let query = q(&[("product", "SaaS"), ("skill", "Immo"), ("skill", "saas")]);
    assert_eq!(query.product_terms, vec!["saas".to_string(), "immo".to_string()]);
  }

  #[test]
  fn product_types_accepts_single_repeated_and_comma_lists() {
    let single = q(&[("productTypes", "SaaS")]);
    assert_eq!(single.product_types, vec!["SaaS".to_string()]);

    let many = q(&[
      ("productTypes", "SaaS"),
      ("productTypes[]", "Immo, Formation"),
      ("productTypes", "SaaS"),
    ]);
    assert_eq!(
      many.product_types,
      vec!["SaaS".to_string(), "Immo".to_string(), "Formation".to_string()]
    );
  }

  #[test]
  fn threshold_keys_keep_the_strictest() {
    let query = q(&[("totalClosed", "10000"), ("revenueMin", "25000")]);
    assert_eq!(query.min_total_closed, Some(25_000));
    let query = q(&[("revenueMin", "25000"), ("totalClosed", "10000")]);
    assert_eq!(query.min_total_closed, Some(25_000));
  }

  #[test]
  fn market_and_years_scenario() {
    let query = q(&[("market", "B2B"), ("yearsExperience", "5")]);

    let senior_b2b = closer(
      CloserProfile { market: Some(Market::B2B), years_experience: 7, ..Default::default() },
      false,
      0,
    );
    let junior_b2b = closer(
      CloserProfile { market: Some(Market::B2B), years_experience: 2, ..Default::default() },
      false,
      0,
    );
    let senior_b2c = closer(
      CloserProfile { market: Some(Market::B2C), years_experience: 9, ..Default::default() },
      false,
      0,
    );
    let exactly_five = closer(
      CloserProfile { market: Some(Market::B2B), years_experience: 5, ..Default::default() },
      false,
      0,
    );

    assert!(query.matches(&senior_b2b));
    assert!(query.matches(&exactly_five));
    assert!(!query.matches(&junior_b2b));
    assert!(!query.matches(&senior_b2c));
  }

  #[test]
  fn product_substring_is_case_insensitive() {
    let c = closer(
      CloserProfile { product_types: vec!["High-Ticket Coaching".into()], ..Default::default() },
      false,
      0,
    );
    assert!(q(&[("product", "ticket")]).matches(&c));
    assert!(q(&[("skill", "COACH")]).matches(&c));
    assert!(!q(&[("product", "immo")]).matches(&c));
  }

  #[test]
  fn substring_terms_fold_accented_capitals() {
    let c = closer(
      CloserProfile {
        product_types: vec!["Formation Énergie".into()],
        contract_types: vec!["Intérim".into()],
        ..Default::default()
      },
      false,
      0,
    );
    assert!(q(&[("product", "énergie")]).matches(&c));
    assert!(q(&[("skill", "ÉNERGIE")]).matches(&c));
    assert!(q(&[("contractType", "INTÉRIM")]).matches(&c));
    assert!(!q(&[("product", "energie")]).matches(&c));
  }

  #[test]
  fn oversized_total_threshold_is_clamped() {
    let query = q(&[("totalClosed", "18446744073709551615")]);
    assert_eq!(query.min_total_closed, Some(MAX_AMOUNT));
    let query = q(&[("totalClosed", "18446744073709551616")]);
    assert_eq!(query.min_total_closed, None);
  }

  #[test]
  fn product_types_membership_is_exact_intersection() {
    let c = closer(
      CloserProfile { product_types: vec!["SaaS".into(), "Immo".into()], ..Default::default() },
      false,
      0,
    );
    assert!(q(&[("productTypes", "Formation,Immo")]).matches(&c));
    assert!(!q(&[("productTypes", "Saa")]).matches(&c));
  }

  #[test]
  fn contract_type_matches_substring() {
    let c = closer(
      CloserProfile { contract_types: vec!["Freelance".into(), "CDI".into()], ..Default::default() },
      false,
      0,
    );
    assert!(q(&[("contractType", "cdi")]).matches(&c));
    assert!(q(&[("contractType", "free")]).matches(&c));
    assert!(!q(&[("contractType", "CDD")]).matches(&c));
  }

  #[test]
  fn absent_enum_field_fails_enum_filter() {
    let c = closer(CloserProfile::default(), false, 0);
    assert!(!q(&[("profileType", "Setter")]).matches(&c));
    assert!(q(&[]).matches(&c));
  }

  #[test]
  fn best_sort_puts_premium_first_then_total_closed() {
    let query = q(&[("sort", "best")]);
    let mut closers = vec![
      closer(CloserProfile { total_closed: 900_000, ..Default::default() }, false, 10),
      closer(CloserProfile { total_closed: 1_000, ..Default::default() }, true, 20),
      closer(CloserProfile { total_closed: 50_000, ..Default::default() }, true, 30),
      closer(CloserProfile { total_closed: 2_000, ..Default::default() }, false, 40),
    ];
    closers.sort_by(|a, b| query.compare(a, b));

    let order: Vec<(bool, u64)> =
      closers.iter().map(|c| (c.is_premium(), c.profile.total_closed)).collect();
    assert_eq!(order, vec![(true, 50_000), (true, 1_000), (false, 900_000), (false, 2_000)]);
  }

  #[test]
  fn default_sort_puts_premium_first_then_newest() {
    let query = q(&[]);
    let mut closers = vec![
      closer(CloserProfile { first_name: "old-free".into(), ..Default::default() }, false, 300),
      closer(CloserProfile { first_name: "new-free".into(), ..Default::default() }, false, 1),
      closer(CloserProfile { first_name: "old-premium".into(), ..Default::default() }, true, 500),
    ];
    closers.sort_by(|a, b| query.compare(a, b));
    let names: Vec<&str> = closers.iter().map(|c| c.profile.first_name.as_str()).collect();
    assert_eq!(names, vec!["old-premium", "new-free", "old-free"]);
  }
}
