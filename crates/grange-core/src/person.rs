//! Person records and their contact information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A directory entry for a human being. `user_id` links the record to the
/// account that manages it; unowned records exist until claimed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
  pub person_id:    i64,
  pub user_id:      Option<i64>,
  /// URL-friendly unique identifier, e.g. `"alice-liddell"`.
  pub slug:         String,
  pub display_name: String,
  pub given_name:   Option<String>,
  pub family_name:  Option<String>,
  pub created_at:   DateTime<Utc>,
}

/// Input to [`crate::store::DirectoryStore::create_person`].
#[derive(Debug, Clone)]
pub struct NewPerson {
  pub user_id:      Option<i64>,
  pub slug:         String,
  pub display_name: String,
  pub given_name:   Option<String>,
  pub family_name:  Option<String>,
}

/// Partial update to a person; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct PersonPatch {
  pub slug:         Option<String>,
  pub display_name: Option<String>,
  pub given_name:   Option<Option<String>>,
  pub family_name:  Option<Option<String>>,
}

/// The channel a piece of contact information belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
  Email,
  Phone,
  Address,
  Url,
  Social,
  Other,
}

impl ContactKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Email => "email",
      Self::Phone => "phone",
      Self::Address => "address",
      Self::Url => "url",
      Self::Social => "social",
      Self::Other => "other",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "email" => Some(Self::Email),
      "phone" => Some(Self::Phone),
      "address" => Some(Self::Address),
      "url" => Some(Self::Url),
      "social" => Some(Self::Social),
      "other" => Some(Self::Other),
      _ => None,
    }
  }
}

/// A single way to reach a person. Visible only to the person's owner and
/// to system administrators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
  pub contact_info_id: i64,
  pub person_id:       i64,
  pub kind:            ContactKind,
  pub value:           String,
  pub label:           Option<String>,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::DirectoryStore::add_contact_info`].
#[derive(Debug, Clone)]
pub struct NewContactInfo {
  pub person_id: i64,
  pub kind:      ContactKind,
  pub value:     String,
  pub label:     Option<String>,
}

/// A similarity-search hit: a person and the cosine score of their interest
/// vector against the query person's.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarPerson {
  pub person: Person,
  pub score:  f64,
}
