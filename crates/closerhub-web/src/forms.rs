//! URL-encoded form bodies and their validation into core types.
//!
//! Form fields arrive as optional strings; everything is trimmed here, list
//! fields are split on commas once, and enum fields must name a known
//! variant.

use std::str::FromStr;

use closerhub_core::{
  Error as CoreError,
  account::{CloserProfile, MAX_AMOUNT, MissionType, parse_choice},
  normalize::{self, optional_text, split_list},
  offer::NewOffer,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Editable closer fields, shared by registration and the dashboard.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileForm {
  pub first_name:       Option<String>,
  pub last_name:        Option<String>,
  pub phone:            Option<String>,
  pub profile_type:     Option<String>,
  pub market:           Option<String>,
  pub availability:     Option<String>,
  pub years_experience: Option<String>,
  pub total_closed:     Option<String>,
  #[serde(alias = "skills")]
  pub product_types:    Option<String>,
  pub past_clients:     Option<String>,
  #[serde(alias = "contractTypes")]
  pub contract_type:    Option<String>,
  pub desired_income:   Option<String>,
  pub mission_type:     Option<String>,
  pub vision:           Option<String>,
  pub bio:              Option<String>,
}

impl ProfileForm {
  pub fn into_profile(self) -> Result<CloserProfile> {
    Ok(CloserProfile {
      first_name:       required("firstName", self.first_name.as_deref())?,
      last_name:        required("lastName", self.last_name.as_deref())?,
      phone:            optional_text(self.phone.as_deref()),
      profile_type:     parse_choice("profileType", self.profile_type.as_deref())?,
      market:           parse_choice("market", self.market.as_deref())?,
      availability:     parse_choice("availability", self.availability.as_deref())?,
      years_experience: count("yearsExperience", self.years_experience.as_deref())?,
      total_closed:     amount("totalClosed", self.total_closed.as_deref())?,
      product_types:    self.product_types.as_deref().map(split_list).unwrap_or_default(),
      past_clients:     optional_text(self.past_clients.as_deref()),
      contract_types:   self.contract_type.as_deref().map(split_list).unwrap_or_default(),
      desired_income:   optional_text(self.desired_income.as_deref()),
      mission_type:     parse_choice("missionType", self.mission_type.as_deref())?,
      vision:           optional_text(self.vision.as_deref()),
      bio:              optional_text(self.bio.as_deref()),
    })
  }
}

#[derive(Debug, Deserialize)]
pub struct RegisterCloserForm {
  pub email:    Option<String>,
  pub password: Option<String>,
  #[serde(flatten)]
  pub profile:  ProfileForm,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCompanyForm {
  pub email:        Option<String>,
  pub password:     Option<String>,
  pub company_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
  pub email:    String,
  pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferForm {
  pub title:        Option<String>,
  pub description:  Option<String>,
  pub remuneration: Option<String>,
  pub niche:        Option<String>,
  pub mission_type: Option<String>,
}

impl OfferForm {
  pub fn into_new_offer(self, company_id: Uuid) -> Result<NewOffer> {
    let mission_type: Option<MissionType> =
      parse_choice("missionType", self.mission_type.as_deref())?;
    Ok(NewOffer {
      company_id,
      title: required("title", self.title.as_deref())?,
      description: required("description", self.description.as_deref())?,
      remuneration: optional_text(self.remuneration.as_deref()),
      niche: optional_text(self.niche.as_deref()),
      mission_type: mission_type.unwrap_or_default(),
    })
  }
}

/// Normalised email and raw password for a new account.
pub fn new_credentials(
  email: Option<&str>,
  password: Option<&str>,
) -> Result<(String, String)> {
  let email = normalize::email(email.unwrap_or_default());
  if email.is_empty() {
    return Err(CoreError::MissingField("email").into());
  }
  if !email.contains('@') {
    return Err(Error::BadRequest(format!("invalid email: {email:?}")));
  }
  let password = password.unwrap_or_default();
  if password.is_empty() {
    return Err(CoreError::MissingField("password").into());
  }
  Ok((email, password.to_owned()))
}

fn required(field: &'static str, raw: Option<&str>) -> Result<String> {
  optional_text(raw).ok_or_else(|| CoreError::MissingField(field).into())
}

/// Blank is zero; anything else must be a non-negative integer.
fn count<T: FromStr + Default>(field: &'static str, raw: Option<&str>) -> Result<T> {
  match raw.map(str::trim).filter(|s| !s.is_empty()) {
    None => Ok(T::default()),
    Some(s) => s
      .parse()
      .map_err(|_| Error::BadRequest(format!("invalid {field}: {s:?}"))),
  }
}

/// A [`count`] of whole euros, clamped to [`MAX_AMOUNT`].
fn amount(field: &'static str, raw: Option<&str>) -> Result<u64> {
  count::<u64>(field, raw).map(|v| v.min(MAX_AMOUNT))
}
