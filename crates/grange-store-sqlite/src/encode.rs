//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings, booleans as 0/1
//! integers, and interest vectors as compact JSON arrays.

use chrono::{DateTime, Utc};
use grange_core::{
  Error, Result,
  audit::AuditEntry,
  group::{Group, Membership},
  identity::{Claim, Session, User},
  person::{ContactInfo, ContactKind, Person},
};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Storage(format!("bad timestamp {s:?}: {e}")))
}

// ─── ContactKind ─────────────────────────────────────────────────────────────

pub fn decode_contact_kind(s: &str) -> Result<ContactKind> {
  ContactKind::parse(s)
    .ok_or_else(|| Error::Storage(format!("unknown contact kind: {s:?}")))
}

// ─── Interest vectors ────────────────────────────────────────────────────────

pub fn encode_vector(v: &[f32]) -> Result<String> {
  Ok(serde_json::to_string(v)?)
}

pub fn decode_vector(s: &str) -> Result<Vec<f32>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `users` row.
pub struct RawUser {
  pub user_id:         i64,
  pub email:           String,
  pub password_hash:   String,
  pub is_system_admin: bool,
  pub created_at:      String,
}

impl RawUser {
  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:         self.user_id,
      email:           self.email,
      password_hash:   self.password_hash,
      is_system_admin: self.is_system_admin,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `sessions` row.
pub struct RawSession {
  pub session_id:         i64,
  pub user_id:            i64,
  pub token_hash:         String,
  pub created_at:         String,
  pub expires_at:         String,
  pub masquerade_user_id: Option<i64>,
}

impl RawSession {
  pub fn into_session(self) -> Result<Session> {
    Ok(Session {
      session_id:         self.session_id,
      user_id:            self.user_id,
      token_hash:         self.token_hash,
      created_at:         decode_dt(&self.created_at)?,
      expires_at:         decode_dt(&self.expires_at)?,
      masquerade_user_id: self.masquerade_user_id,
    })
  }
}

/// Raw values read directly from a `persons` row.
pub struct RawPerson {
  pub person_id:    i64,
  pub user_id:      Option<i64>,
  pub slug:         String,
  pub display_name: String,
  pub given_name:   Option<String>,
  pub family_name:  Option<String>,
  pub created_at:   String,
}

impl RawPerson {
  pub fn into_person(self) -> Result<Person> {
    Ok(Person {
      person_id:    self.person_id,
      user_id:      self.user_id,
      slug:         self.slug,
      display_name: self.display_name,
      given_name:   self.given_name,
      family_name:  self.family_name,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `contact_infos` row.
pub struct RawContactInfo {
  pub contact_info_id: i64,
  pub person_id:       i64,
  pub kind:            String,
  pub value:           String,
  pub label:           Option<String>,
  pub created_at:      String,
}

impl RawContactInfo {
  pub fn into_contact_info(self) -> Result<ContactInfo> {
    Ok(ContactInfo {
      contact_info_id: self.contact_info_id,
      person_id:       self.person_id,
      kind:            decode_contact_kind(&self.kind)?,
      value:           self.value,
      label:           self.label,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `groups` row.
pub struct RawGroup {
  pub group_id:          i64,
  pub slug:              String,
  pub name:              String,
  pub parent_group_id:   Option<i64>,
  pub members_visible:   bool,
  pub subgroups_allowed: bool,
  pub created_at:        String,
}

impl RawGroup {
  pub fn into_group(self) -> Result<Group> {
    Ok(Group {
      group_id:          self.group_id,
      slug:              self.slug,
      name:              self.name,
      parent_group_id:   self.parent_group_id,
      members_visible:   self.members_visible,
      subgroups_allowed: self.subgroups_allowed,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `memberships` row.
pub struct RawMembership {
  pub membership_id: i64,
  pub person_id:     i64,
  pub group_id:      i64,
  pub is_admin:      bool,
  pub created_at:    String,
}

impl RawMembership {
  pub fn into_membership(self) -> Result<Membership> {
    Ok(Membership {
      membership_id: self.membership_id,
      person_id:     self.person_id,
      group_id:      self.group_id,
      is_admin:      self.is_admin,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `claims` row.
pub struct RawClaim {
  pub claim_id:            i64,
  pub person_id:           i64,
  pub token_hash:          String,
  pub created_by_user_id:  i64,
  pub created_at:          String,
  pub expires_at:          String,
  pub redeemed_at:         Option<String>,
  pub redeemed_by_user_id: Option<i64>,
}

impl RawClaim {
  pub fn into_claim(self) -> Result<Claim> {
    Ok(Claim {
      claim_id:            self.claim_id,
      person_id:           self.person_id,
      token_hash:          self.token_hash,
      created_by_user_id:  self.created_by_user_id,
      created_at:          decode_dt(&self.created_at)?,
      expires_at:          decode_dt(&self.expires_at)?,
      redeemed_at:         self.redeemed_at.as_deref().map(decode_dt).transpose()?,
      redeemed_by_user_id: self.redeemed_by_user_id,
    })
  }
}

/// Raw values read directly from an `audit_log` row.
pub struct RawAuditEntry {
  pub audit_id:      i64,
  pub actor_user_id: i64,
  pub action:        String,
  pub entity_id:     Option<i64>,
  pub detail_json:   Option<String>,
  pub created_at:    String,
}

impl RawAuditEntry {
  pub fn into_audit_entry(self) -> Result<AuditEntry> {
    let detail = self
      .detail_json
      .as_deref()
      .map(serde_json::from_str)
      .transpose()?;

    Ok(AuditEntry {
      audit_id:      self.audit_id,
      actor_user_id: self.actor_user_id,
      action:        self.action,
      entity_id:     self.entity_id,
      detail,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}
