//! SQL schema for the Grange SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Directory rows are soft-deleted: a `deleted` flag is set and every read
/// filters on it. Slug uniqueness is enforced by partial indexes so a
/// deleted row's slug becomes reusable.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id         INTEGER PRIMARY KEY AUTOINCREMENT,
    email           TEXT NOT NULL UNIQUE,
    password_hash   TEXT NOT NULL,   -- argon2 PHC string
    is_system_admin INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL    -- ISO 8601 UTC
);

CREATE TABLE IF NOT EXISTS sessions (
    session_id         INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id            INTEGER NOT NULL REFERENCES users(user_id),
    token_hash         TEXT NOT NULL UNIQUE,   -- SHA-256 hex of the bearer token
    created_at         TEXT NOT NULL,
    expires_at         TEXT NOT NULL,
    masquerade_user_id INTEGER REFERENCES users(user_id)
);

CREATE TABLE IF NOT EXISTS persons (
    person_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id      INTEGER REFERENCES users(user_id),   -- NULL until claimed
    slug         TEXT NOT NULL,
    display_name TEXT NOT NULL,
    given_name   TEXT,
    family_name  TEXT,
    deleted      INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS contact_infos (
    contact_info_id INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id       INTEGER NOT NULL REFERENCES persons(person_id),
    kind            TEXT NOT NULL,   -- 'email' | 'phone' | 'address' | 'url' | 'social' | 'other'
    value           TEXT NOT NULL,
    label           TEXT,
    deleted         INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS interest_vectors (
    person_id   INTEGER PRIMARY KEY REFERENCES persons(person_id),
    vector_json TEXT NOT NULL,   -- JSON array of floats
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS groups (
    group_id          INTEGER PRIMARY KEY AUTOINCREMENT,
    slug              TEXT NOT NULL,
    name              TEXT NOT NULL,
    parent_group_id   INTEGER REFERENCES groups(group_id),
    members_visible   INTEGER NOT NULL DEFAULT 1,
    subgroups_allowed INTEGER NOT NULL DEFAULT 1,
    deleted           INTEGER NOT NULL DEFAULT 0,
    created_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS memberships (
    membership_id INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id     INTEGER NOT NULL REFERENCES persons(person_id),
    group_id      INTEGER NOT NULL REFERENCES groups(group_id),
    is_admin      INTEGER NOT NULL DEFAULT 0,
    deleted       INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS claims (
    claim_id            INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id           INTEGER NOT NULL REFERENCES persons(person_id),
    token_hash          TEXT NOT NULL UNIQUE,
    created_by_user_id  INTEGER NOT NULL REFERENCES users(user_id),
    created_at          TEXT NOT NULL,
    expires_at          TEXT NOT NULL,
    redeemed_at         TEXT,
    redeemed_by_user_id INTEGER REFERENCES users(user_id)
);

CREATE TABLE IF NOT EXISTS audit_log (
    audit_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    actor_user_id INTEGER NOT NULL REFERENCES users(user_id),
    action        TEXT NOT NULL,    -- dotted action name, e.g. 'membership.delete'
    entity_id     INTEGER,
    detail_json   TEXT,
    created_at    TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS persons_slug_live_idx
    ON persons(slug) WHERE deleted = 0;
CREATE UNIQUE INDEX IF NOT EXISTS groups_slug_live_idx
    ON groups(slug) WHERE deleted = 0;
CREATE UNIQUE INDEX IF NOT EXISTS memberships_person_group_live_idx
    ON memberships(person_id, group_id) WHERE deleted = 0;

CREATE INDEX IF NOT EXISTS persons_user_idx       ON persons(user_id);
CREATE INDEX IF NOT EXISTS contact_infos_person_idx ON contact_infos(person_id);
CREATE INDEX IF NOT EXISTS groups_parent_idx      ON groups(parent_group_id);
CREATE INDEX IF NOT EXISTS memberships_group_idx  ON memberships(group_id);
CREATE INDEX IF NOT EXISTS memberships_person_idx ON memberships(person_id);
CREATE INDEX IF NOT EXISTS sessions_expires_idx   ON sessions(expires_at);
CREATE INDEX IF NOT EXISTS claims_person_idx      ON claims(person_id);
CREATE INDEX IF NOT EXISTS audit_log_actor_idx    ON audit_log(actor_user_id);

PRAGMA user_version = 1;
";
