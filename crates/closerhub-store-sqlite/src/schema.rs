//! SQL schema for the closerhub SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One identity table for both roles. The UNIQUE constraint on the
-- normalised email is what makes an address unusable by a second account,
-- whatever its role.
CREATE TABLE IF NOT EXISTS accounts (
    account_id     TEXT PRIMARY KEY,
    email          TEXT NOT NULL UNIQUE,
    password_hash  TEXT NOT NULL,
    role           TEXT NOT NULL CHECK (role IN ('closer', 'company')),
    display_name   TEXT NOT NULL,
    created_at     TEXT NOT NULL    -- RFC 3339 UTC, fixed microsecond width
);

CREATE TABLE IF NOT EXISTS closer_profiles (
    account_id               TEXT PRIMARY KEY REFERENCES accounts(account_id),
    first_name               TEXT NOT NULL,
    last_name                TEXT NOT NULL,
    phone                    TEXT,
    photo_url                TEXT,
    profile_type             TEXT,
    market                   TEXT,
    availability             TEXT,
    years_experience         INTEGER NOT NULL DEFAULT 0 CHECK (years_experience >= 0),
    total_closed             INTEGER NOT NULL DEFAULT 0 CHECK (total_closed >= 0),
    product_types            TEXT NOT NULL DEFAULT '[]',   -- JSON array
    past_clients             TEXT,
    contract_types           TEXT NOT NULL DEFAULT '[]',   -- JSON array
    -- Case-folded copies of the two lists above, searched by LIKE.
    product_types_folded     TEXT NOT NULL DEFAULT '[]',
    contract_types_folded    TEXT NOT NULL DEFAULT '[]',
    desired_income           TEXT,
    mission_type             TEXT,
    vision                   TEXT,
    bio                      TEXT,
    -- Written only by subscription updates.
    is_premium               INTEGER NOT NULL DEFAULT 0,
    billing_customer_ref     TEXT,
    billing_subscription_ref TEXT
);

CREATE TABLE IF NOT EXISTS offers (
    offer_id      TEXT PRIMARY KEY,
    company_id    TEXT NOT NULL REFERENCES accounts(account_id),
    company_name  TEXT NOT NULL,   -- copied from accounts at creation
    title         TEXT NOT NULL,
    description   TEXT NOT NULL,
    remuneration  TEXT,
    niche         TEXT,
    mission_type  TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

-- The applicant set. The composite key makes membership unique, so adding
-- an applicant is a single INSERT OR IGNORE.
CREATE TABLE IF NOT EXISTS offer_applicants (
    offer_id    TEXT NOT NULL REFERENCES offers(offer_id) ON DELETE CASCADE,
    closer_id   TEXT NOT NULL REFERENCES accounts(account_id),
    applied_at  TEXT NOT NULL,
    PRIMARY KEY (offer_id, closer_id)
);

CREATE TABLE IF NOT EXISTS sessions (
    token_digest  TEXT PRIMARY KEY,   -- hex SHA-256 of the cookie token
    account_id    TEXT NOT NULL REFERENCES accounts(account_id),
    role          TEXT NOT NULL,
    display_name  TEXT NOT NULL,
    is_premium    INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL,
    expires_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS closer_profiles_customer_idx ON closer_profiles(billing_customer_ref);
CREATE INDEX IF NOT EXISTS offers_company_idx           ON offers(company_id);
CREATE INDEX IF NOT EXISTS offer_applicants_closer_idx  ON offer_applicants(closer_id);
CREATE INDEX IF NOT EXISTS sessions_expires_idx         ON sessions(expires_at);

PRAGMA user_version = 1;
";
