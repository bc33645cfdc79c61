//! [`SqliteStore`]: the SQLite implementation of [`MarketStore`].

use std::path::Path;

use chrono::{DateTime, SubsecRound as _, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use closerhub_core::{
  account::{
    Account, Closer, CloserProfile, Company, Credentials, NewCloser, NewCompany,
    Registration, Role, Subscription,
  },
  directory::DirectoryQuery,
  offer::{ApplyOutcome, NewOffer, Offer},
  session::Session,
  store::MarketStore,
  subscription::{RefChange, SubscriptionTarget, SubscriptionUpdate},
};

use crate::{
  Error, Result,
  directory::compile,
  encode::{
    ACCOUNT_COLUMNS, CLOSER_COLUMNS, EncodedProfile, OFFER_COLUMNS, RawAccount,
    RawCloser, RawOffer, RawSession, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A closerhub store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert an identity row. Returns `false` when the email is taken.
  async fn insert_account(
    &self,
    account: &Account,
    password_hash: String,
    profile: Option<(Option<String>, EncodedProfile)>,
  ) -> Result<bool> {
    let id_str       = encode_uuid(account.account_id);
    let email        = account.email.clone();
    let role_str     = account.role.as_ref().to_owned();
    let display_name = account.display_name.clone();
    let at_str       = encode_dt(account.created_at);

    let created = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let inserted = tx.execute(
          "INSERT INTO accounts (account_id, email, password_hash, role, display_name, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, email, password_hash, role_str, display_name, at_str],
        );
        match inserted {
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => return Ok(false),
          Err(e) => return Err(e.into()),
        }

        if let Some((photo_url, p)) = profile {
          tx.execute(
            "INSERT INTO closer_profiles (
               account_id, photo_url,
               first_name, last_name, phone, profile_type, market, availability,
               years_experience, total_closed, product_types, past_clients,
               contract_types, desired_income, mission_type, vision, bio,
               product_types_folded, contract_types_folded
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                       ?18, ?19)",
            rusqlite::params![
              id_str,
              photo_url,
              p.first_name,
              p.last_name,
              p.phone,
              p.profile_type,
              p.market,
              p.availability,
              p.years_experience,
              p.total_closed,
              p.product_types,
              p.past_clients,
              p.contract_types,
              p.desired_income,
              p.mission_type,
              p.vision,
              p.bio,
              p.products_folded,
              p.contracts_folded,
            ],
          )?;
        }

        tx.commit()?;
        Ok(true)
      })
      .await?;

    Ok(created)
  }

  /// Run a query returning offer rows.
  async fn query_offers(&self, sql: String, param: Option<String>) -> Result<Vec<Offer>> {
    let raws: Vec<RawOffer> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = match param {
          Some(p) => stmt
            .query_map(rusqlite::params![p], RawOffer::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
          None => stmt
            .query_map([], RawOffer::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawOffer::into_offer).collect()
  }
}

/// Timestamps are stored at microsecond precision; truncate up front so the
/// values we hand back equal the values we would read back.
fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _)
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

// ─── MarketStore impl ────────────────────────────────────────────────────────

impl MarketStore for SqliteStore {
  type Error = Error;

  // ── Identity ──────────────────────────────────────────────────────────────

  async fn create_closer(&self, input: NewCloser) -> Result<Registration<Closer>> {
    let closer = Closer {
      closer_id:    Uuid::new_v4(),
      email:        input.email,
      photo_url:    input.photo_url,
      profile:      input.profile,
      subscription: Subscription::default(),
      created_at:   now(),
    };
    let account = Account {
      account_id:   closer.closer_id,
      email:        closer.email.clone(),
      role:         Role::Closer,
      display_name: closer.profile.display_name(),
      created_at:   closer.created_at,
    };
    let profile = EncodedProfile::new(&closer.profile)?;

    let created = self
      .insert_account(&account, input.password_hash, Some((closer.photo_url.clone(), profile)))
      .await?;

    Ok(if created { Registration::Created(closer) } else { Registration::EmailTaken })
  }

  async fn create_company(&self, input: NewCompany) -> Result<Registration<Company>> {
    let company = Company {
      company_id:   Uuid::new_v4(),
      email:        input.email,
      company_name: input.company_name,
      created_at:   now(),
    };
    let account = Account {
      account_id:   company.company_id,
      email:        company.email.clone(),
      role:         Role::Company,
      display_name: company.company_name.clone(),
      created_at:   company.created_at,
    };

    let created = self.insert_account(&account, input.password_hash, None).await?;

    Ok(if created { Registration::Created(company) } else { Registration::EmailTaken })
  }

  async fn find_credentials(&self, email: String) -> Result<Option<Credentials>> {
    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts a WHERE a.email = ?1"),
              rusqlite::params![email],
              RawAccount::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAccount::into_credentials).transpose()
  }

  async fn get_closer(&self, id: Uuid) -> Result<Option<Closer>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawCloser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {CLOSER_COLUMNS}
                 FROM accounts a
                 JOIN closer_profiles p ON p.account_id = a.account_id
                 WHERE a.account_id = ?1"
              ),
              rusqlite::params![id_str],
              RawCloser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCloser::into_closer).transpose()
  }

  async fn update_closer_profile(&self, id: Uuid, profile: CloserProfile) -> Result<bool> {
    let id_str       = encode_uuid(id);
    let display_name = profile.display_name();
    let p            = EncodedProfile::new(&profile)?;

    let updated = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE closer_profiles SET
             first_name = ?2, last_name = ?3, phone = ?4,
             profile_type = ?5, market = ?6, availability = ?7,
             years_experience = ?8, total_closed = ?9, product_types = ?10,
             past_clients = ?11, contract_types = ?12, desired_income = ?13,
             mission_type = ?14, vision = ?15, bio = ?16,
             product_types_folded = ?17, contract_types_folded = ?18
           WHERE account_id = ?1",
          rusqlite::params![
            id_str,
            p.first_name,
            p.last_name,
            p.phone,
            p.profile_type,
            p.market,
            p.availability,
            p.years_experience,
            p.total_closed,
            p.product_types,
            p.past_clients,
            p.contract_types,
            p.desired_income,
            p.mission_type,
            p.vision,
            p.bio,
            p.products_folded,
            p.contracts_folded,
          ],
        )?;
        if changed == 0 {
          return Ok(false);
        }
        tx.execute(
          "UPDATE accounts SET display_name = ?2 WHERE account_id = ?1",
          rusqlite::params![id_str, display_name],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    Ok(updated)
  }

  async fn set_closer_photo(&self, id: Uuid, url: String) -> Result<bool> {
    let id_str = encode_uuid(id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE closer_profiles SET photo_url = ?2 WHERE account_id = ?1",
          rusqlite::params![id_str, url],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  // ── Directory ─────────────────────────────────────────────────────────────

  async fn search_closers(&self, query: &DirectoryQuery) -> Result<Vec<Closer>> {
    let compiled = compile(query);

    let raws: Vec<RawCloser> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&compiled.sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(compiled.params.iter()), RawCloser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCloser::into_closer).collect()
  }

  // ── Subscription ──────────────────────────────────────────────────────────

  async fn apply_subscription_update(&self, update: SubscriptionUpdate) -> Result<bool> {
    let mut sets: Vec<String> = vec!["is_premium = ?1".to_owned()];
    let mut params: Vec<rusqlite::types::Value> =
      vec![rusqlite::types::Value::Integer(i64::from(update.state.is_premium()))];

    for (column, change) in [
      ("billing_customer_ref", &update.customer_ref),
      ("billing_subscription_ref", &update.subscription_ref),
    ] {
      match change {
        RefChange::Keep => {}
        RefChange::Set(v) => {
          params.push(rusqlite::types::Value::Text(v.clone()));
          sets.push(format!("{column} = ?{}", params.len()));
        }
        RefChange::Clear => sets.push(format!("{column} = NULL")),
      }
    }

    let target = match &update.target {
      SubscriptionTarget::Closer(id) => {
        params.push(rusqlite::types::Value::Text(encode_uuid(*id)));
        format!("account_id = ?{}", params.len())
      }
      SubscriptionTarget::Customer(customer_ref) => {
        params.push(rusqlite::types::Value::Text(customer_ref.clone()));
        format!("billing_customer_ref = ?{}", params.len())
      }
    };

    let sql = format!("UPDATE closer_profiles SET {} WHERE {target}", sets.join(", "));

    let changed = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, rusqlite::params_from_iter(params.iter()))?))
      .await?;

    Ok(changed > 0)
  }

  // ── Sessions ──────────────────────────────────────────────────────────────

  async fn create_session(&self, session: Session) -> Result<()> {
    let now_str     = encode_dt(now());
    let digest      = session.token_digest;
    let account_str = encode_uuid(session.identity.account_id);
    let role_str    = session.identity.role.as_ref().to_owned();
    let name        = session.identity.display_name;
    let premium     = session.identity.is_premium;
    let created_str = encode_dt(session.created_at);
    let expires_str = encode_dt(session.expires_at);

    let swept = self
      .conn
      .call(move |conn| {
        let swept = conn.execute(
          "DELETE FROM sessions WHERE expires_at <= ?1",
          rusqlite::params![now_str],
        )?;
        conn.execute(
          "INSERT INTO sessions (token_digest, account_id, role, display_name, is_premium, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![digest, account_str, role_str, name, premium, created_str, expires_str],
        )?;
        Ok(swept)
      })
      .await?;

    if swept > 0 {
      tracing::debug!(swept, "removed expired sessions");
    }
    Ok(())
  }

  async fn get_session(&self, token_digest: String, at: DateTime<Utc>) -> Result<Option<Session>> {
    let at_str = encode_dt(at);

    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT token_digest, account_id, role, display_name, is_premium, created_at, expires_at
               FROM sessions
               WHERE token_digest = ?1 AND expires_at > ?2",
              rusqlite::params![token_digest, at_str],
              RawSession::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSession::into_session).transpose()
  }

  async fn refresh_session_premium(&self, token_digest: String, is_premium: bool) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE sessions SET is_premium = ?2 WHERE token_digest = ?1",
          rusqlite::params![token_digest, is_premium],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_session(&self, token_digest: String) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM sessions WHERE token_digest = ?1",
          rusqlite::params![token_digest],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Job board ─────────────────────────────────────────────────────────────

  async fn create_offer(&self, input: NewOffer) -> Result<Option<Offer>> {
    let offer_str   = encode_uuid(Uuid::new_v4());
    let company_str = encode_uuid(input.company_id);
    let mission     = input.mission_type.as_ref().to_owned();
    let at_str      = encode_dt(now());

    let raw: Option<RawOffer> = self
      .conn
      .call(move |conn| {
        // The company name is copied from the identity row in the same
        // statement that creates the offer.
        let inserted = conn.execute(
          "INSERT INTO offers (
             offer_id, company_id, company_name, title, description,
             remuneration, niche, mission_type, created_at
           )
           SELECT ?1, a.account_id, a.display_name, ?3, ?4, ?5, ?6, ?7, ?8
           FROM accounts a
           WHERE a.account_id = ?2 AND a.role = 'company'",
          rusqlite::params![
            offer_str,
            company_str,
            input.title,
            input.description,
            input.remuneration,
            input.niche,
            mission,
            at_str,
          ],
        )?;
        if inserted == 0 {
          return Ok(None);
        }
        Ok(Some(conn.query_row(
          &format!("SELECT {OFFER_COLUMNS} FROM offers o WHERE o.offer_id = ?1"),
          rusqlite::params![offer_str],
          RawOffer::from_row,
        )?))
      })
      .await?;

    raw.map(RawOffer::into_offer).transpose()
  }

  async fn list_offers(&self) -> Result<Vec<Offer>> {
    self
      .query_offers(
        format!("SELECT {OFFER_COLUMNS} FROM offers o ORDER BY o.created_at DESC, o.rowid DESC"),
        None,
      )
      .await
  }

  async fn list_company_offers(&self, company_id: Uuid) -> Result<Vec<Offer>> {
    self
      .query_offers(
        format!(
          "SELECT {OFFER_COLUMNS} FROM offers o
           WHERE o.company_id = ?1
           ORDER BY o.created_at DESC, o.rowid DESC"
        ),
        Some(encode_uuid(company_id)),
      )
      .await
  }

  async fn list_applied_offers(&self, closer_id: Uuid) -> Result<Vec<Offer>> {
    self
      .query_offers(
        format!(
          "SELECT {OFFER_COLUMNS} FROM offers o
           JOIN offer_applicants ap ON ap.offer_id = o.offer_id
           WHERE ap.closer_id = ?1
           ORDER BY o.created_at DESC, o.rowid DESC"
        ),
        Some(encode_uuid(closer_id)),
      )
      .await
  }

  async fn apply_to_offer(&self, offer_id: Uuid, closer_id: Uuid) -> Result<ApplyOutcome> {
    let offer_str  = encode_uuid(offer_id);
    let closer_str = encode_uuid(closer_id);
    let at_str     = encode_dt(now());

    let outcome = self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT OR IGNORE INTO offer_applicants (offer_id, closer_id, applied_at)
           SELECT ?1, ?2, ?3
           WHERE EXISTS (SELECT 1 FROM offers WHERE offer_id = ?1)",
          rusqlite::params![offer_str, closer_str, at_str],
        )?;
        if inserted > 0 {
          return Ok(ApplyOutcome::Applied);
        }
        let exists = conn
          .query_row(
            "SELECT 1 FROM offers WHERE offer_id = ?1",
            rusqlite::params![offer_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        Ok(if exists { ApplyOutcome::AlreadyApplied } else { ApplyOutcome::OfferNotFound })
      })
      .await?;

    Ok(outcome)
  }

  async fn offer_applicants(&self, offer_id: Uuid, company_id: Uuid) -> Result<Option<Vec<Closer>>> {
    let offer_str   = encode_uuid(offer_id);
    let company_str = encode_uuid(company_id);

    let raws: Option<Vec<RawCloser>> = self
      .conn
      .call(move |conn| {
        let owned = conn
          .query_row(
            "SELECT 1 FROM offers WHERE offer_id = ?1 AND company_id = ?2",
            rusqlite::params![offer_str, company_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !owned {
          return Ok(None);
        }

        let mut stmt = conn.prepare(&format!(
          "SELECT {CLOSER_COLUMNS}
           FROM offer_applicants ap
           JOIN accounts a        ON a.account_id = ap.closer_id
           JOIN closer_profiles p ON p.account_id = a.account_id
           WHERE ap.offer_id = ?1
           ORDER BY ap.applied_at, a.rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![offer_str], RawCloser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(rows))
      })
      .await?;

    raws
      .map(|rs| rs.into_iter().map(RawCloser::into_closer).collect::<Result<Vec<_>>>())
      .transpose()
  }

  async fn delete_offer(&self, offer_id: Uuid, company_id: Uuid) -> Result<bool> {
    let offer_str   = encode_uuid(offer_id);
    let company_str = encode_uuid(company_id);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM offers WHERE offer_id = ?1 AND company_id = ?2",
          rusqlite::params![offer_str, company_str],
        )?)
      })
      .await?;

    Ok(deleted > 0)
  }
}
