//! [`SqliteStore`] — the SQLite implementation of [`DirectoryStore`].
//!
//! Closures handed to [`tokio_rusqlite`] return
//! `tokio_rusqlite::Result<grange_core::Result<T>>`: the outer layer
//! carries database failures, the inner layer carries domain outcomes
//! decided while the closure holds the connection. Mutations that must
//! observe the last-admin guard open an `IMMEDIATE` transaction so the
//! guard's counts and the write cannot be interleaved with another writer.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};

use grange_core::{
  Error, Result, authz,
  audit::{AuditEntry, NewAuditEntry},
  group::{Group, GroupPatch, Membership, NewGroup, NewMembership},
  identity::{Claim, NewUser, Session, User},
  person::{
    ContactInfo, NewContactInfo, NewPerson, Person, PersonPatch, SimilarPerson,
  },
  store::DirectoryStore,
};

use crate::{
  encode::{
    RawAuditEntry, RawClaim, RawContactInfo, RawGroup, RawMembership,
    RawPerson, RawSession, RawUser, decode_vector, encode_dt, encode_vector,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Grange directory store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path)
      .await
      .map_err(storage)?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory()
      .await
      .map_err(storage)?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await
  }

  /// Run `f` on the database thread, mapping infrastructure failures to
  /// [`Error::Storage`].
  async fn call<R, F>(&self, f: F) -> Result<R>
  where
    R: Send + 'static,
    F: FnOnce(&mut rusqlite::Connection) -> tokio_rusqlite::Result<R>
      + Send
      + 'static,
  {
    self.conn.call(f).await.map_err(storage)
  }
}

fn storage(e: tokio_rusqlite::Error) -> Error { Error::Storage(e.to_string()) }

// ─── DirectoryStore impl ─────────────────────────────────────────────────────

impl DirectoryStore for SqliteStore {
  // ── Users ──────────────────────────────────────────────────────────────────

  async fn create_user(&self, input: NewUser) -> Result<User> {
    let created_at = Utc::now();
    let at_str = encode_dt(created_at);
    let NewUser { email, password_hash, is_system_admin } = input;

    let (user_id, email, password_hash) = self
      .call(move |conn| {
        let taken: bool = conn
          .query_row(
            "SELECT 1 FROM users WHERE email = ?1",
            rusqlite::params![email],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);

        if taken {
          return Ok(Err(Error::DuplicateEmail(email)));
        }

        conn.execute(
          "INSERT INTO users (email, password_hash, is_system_admin, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![email, password_hash, is_system_admin, at_str],
        )?;

        Ok(Ok((conn.last_insert_rowid(), email, password_hash)))
      })
      .await??;

    Ok(User { user_id, email, password_hash, is_system_admin, created_at })
  }

  async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
    let raw: Option<RawUser> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id, email, password_hash, is_system_admin, created_at
               FROM users WHERE user_id = ?1",
              rusqlite::params![user_id],
              user_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn get_user_by_email(&self, email: String) -> Result<Option<User>> {
    let raw: Option<RawUser> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id, email, password_hash, is_system_admin, created_at
               FROM users WHERE email = ?1",
              rusqlite::params![email],
              user_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  // ── Sessions ───────────────────────────────────────────────────────────────

  async fn create_session(
    &self,
    user_id: i64,
    token_hash: String,
    expires_at: DateTime<Utc>,
  ) -> Result<Session> {
    let created_at = Utc::now();
    let at_str = encode_dt(created_at);
    let expires_str = encode_dt(expires_at);
    let hash_for_row = token_hash.clone();

    let session_id = self
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sessions (user_id, token_hash, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![user_id, hash_for_row, at_str, expires_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Session {
      session_id,
      user_id,
      token_hash,
      created_at,
      expires_at,
      masquerade_user_id: None,
    })
  }

  async fn get_session_by_token_hash(
    &self,
    token_hash: String,
  ) -> Result<Option<Session>> {
    let raw: Option<RawSession> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT session_id, user_id, token_hash, created_at, expires_at,
                      masquerade_user_id
               FROM sessions WHERE token_hash = ?1",
              rusqlite::params![token_hash],
              session_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSession::into_session).transpose()
  }

  async fn set_session_masquerade(
    &self,
    session_id: i64,
    masquerade_user_id: Option<i64>,
  ) -> Result<Session> {
    let raw = self
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE sessions SET masquerade_user_id = ?2 WHERE session_id = ?1",
          rusqlite::params![session_id, masquerade_user_id],
        )?;
        if n == 0 {
          return Ok(Err(Error::SessionNotFound(session_id)));
        }

        let raw = conn.query_row(
          "SELECT session_id, user_id, token_hash, created_at, expires_at,
                  masquerade_user_id
           FROM sessions WHERE session_id = ?1",
          rusqlite::params![session_id],
          session_row,
        )?;
        Ok(Ok(raw))
      })
      .await??;

    raw.into_session()
  }

  async fn delete_session(&self, session_id: i64) -> Result<()> {
    self
      .call(move |conn| {
        conn.execute(
          "DELETE FROM sessions WHERE session_id = ?1",
          rusqlite::params![session_id],
        )?;
        Ok(())
      })
      .await
  }

  async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
    let now_str = encode_dt(now);
    self
      .call(move |conn| {
        let n = conn.execute(
          "DELETE FROM sessions WHERE expires_at < ?1",
          rusqlite::params![now_str],
        )?;
        Ok(n as u64)
      })
      .await
  }

  // ── Persons ────────────────────────────────────────────────────────────────

  async fn create_person(&self, input: NewPerson) -> Result<Person> {
    let created_at = Utc::now();
    let at_str = encode_dt(created_at);
    let NewPerson { user_id, slug, display_name, given_name, family_name } =
      input;

    let (person_id, slug, display_name, given_name, family_name) = self
      .call(move |conn| {
        if person_slug_taken(conn, &slug)? {
          return Ok(Err(Error::DuplicateSlug(slug)));
        }

        conn.execute(
          "INSERT INTO persons
             (user_id, slug, display_name, given_name, family_name, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            user_id,
            slug,
            display_name,
            given_name,
            family_name,
            at_str
          ],
        )?;

        Ok(Ok((
          conn.last_insert_rowid(),
          slug,
          display_name,
          given_name,
          family_name,
        )))
      })
      .await??;

    Ok(Person {
      person_id,
      user_id,
      slug,
      display_name,
      given_name,
      family_name,
      created_at,
    })
  }

  async fn get_person(&self, person_id: i64) -> Result<Option<Person>> {
    let raw = self
      .call(move |conn| Ok(live_person(conn, person_id)?))
      .await?;
    raw.map(RawPerson::into_person).transpose()
  }

  async fn get_person_by_slug(&self, slug: String) -> Result<Option<Person>> {
    let raw: Option<RawPerson> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT person_id, user_id, slug, display_name, given_name,
                      family_name, created_at
               FROM persons WHERE slug = ?1 AND deleted = 0",
              rusqlite::params![slug],
              person_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPerson::into_person).transpose()
  }

  async fn list_persons(&self, limit: i64, offset: i64) -> Result<Vec<Person>> {
    let raws: Vec<RawPerson> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT person_id, user_id, slug, display_name, given_name,
                  family_name, created_at
           FROM persons WHERE deleted = 0
           ORDER BY person_id
           LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![limit, offset], person_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPerson::into_person).collect()
  }

  async fn list_owned_persons(&self, user_id: i64) -> Result<Vec<Person>> {
    let raws: Vec<RawPerson> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT person_id, user_id, slug, display_name, given_name,
                  family_name, created_at
           FROM persons WHERE user_id = ?1 AND deleted = 0
           ORDER BY person_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_id], person_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPerson::into_person).collect()
  }

  async fn update_person(
    &self,
    person_id: i64,
    patch: PersonPatch,
  ) -> Result<Person> {
    let raw = self
      .call(move |conn| {
        let Some(current) = live_person(conn, person_id)? else {
          return Ok(Err(Error::PersonNotFound(person_id)));
        };

        let slug = match patch.slug {
          Some(slug) if slug != current.slug => {
            if person_slug_taken(conn, &slug)? {
              return Ok(Err(Error::DuplicateSlug(slug)));
            }
            slug
          }
          Some(slug) => slug,
          None => current.slug,
        };
        let display_name = patch.display_name.unwrap_or(current.display_name);
        let given_name = patch.given_name.unwrap_or(current.given_name);
        let family_name = patch.family_name.unwrap_or(current.family_name);

        conn.execute(
          "UPDATE persons
           SET slug = ?2, display_name = ?3, given_name = ?4, family_name = ?5
           WHERE person_id = ?1",
          rusqlite::params![
            person_id,
            slug,
            display_name,
            given_name,
            family_name
          ],
        )?;

        Ok(Ok(RawPerson {
          person_id,
          user_id: current.user_id,
          slug,
          display_name,
          given_name,
          family_name,
          created_at: current.created_at,
        }))
      })
      .await??;

    raw.into_person()
  }

  async fn delete_person(&self, person_id: i64) -> Result<()> {
    self
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !person_is_live(&tx, person_id)? {
          return Ok(Err(Error::PersonNotFound(person_id)));
        }

        let admin_group_ids: Vec<i64> = {
          let mut stmt = tx.prepare(
            "SELECT group_id FROM memberships
             WHERE person_id = ?1 AND is_admin = 1 AND deleted = 0",
          )?;
          let ids = stmt
            .query_map(rusqlite::params![person_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          ids
        };

        for group_id in admin_group_ids {
          let admins = live_admin_count(&tx, group_id)?;
          let members = live_member_count(&tx, group_id)?;
          if let Err(e) =
            authz::assert_admin_removal_allowed(group_id, admins, members)
          {
            return Ok(Err(e));
          }
        }

        tx.execute(
          "UPDATE memberships SET deleted = 1 WHERE person_id = ?1 AND deleted = 0",
          rusqlite::params![person_id],
        )?;
        tx.execute(
          "UPDATE contact_infos SET deleted = 1 WHERE person_id = ?1 AND deleted = 0",
          rusqlite::params![person_id],
        )?;
        tx.execute(
          "DELETE FROM interest_vectors WHERE person_id = ?1",
          rusqlite::params![person_id],
        )?;
        tx.execute(
          "UPDATE persons SET deleted = 1 WHERE person_id = ?1",
          rusqlite::params![person_id],
        )?;

        tx.commit()?;
        Ok(Ok(()))
      })
      .await?
  }

  // ── Contact info ───────────────────────────────────────────────────────────

  async fn add_contact_info(
    &self,
    input: NewContactInfo,
  ) -> Result<ContactInfo> {
    let created_at = Utc::now();
    let at_str = encode_dt(created_at);
    let NewContactInfo { person_id, kind, value, label } = input;
    let kind_str = kind.as_str();
    let value_for_row = value.clone();
    let label_for_row = label.clone();

    let contact_info_id = self
      .call(move |conn| {
        if !person_is_live(conn, person_id)? {
          return Ok(Err(Error::PersonNotFound(person_id)));
        }

        conn.execute(
          "INSERT INTO contact_infos (person_id, kind, value, label, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            person_id,
            kind_str,
            value_for_row,
            label_for_row,
            at_str
          ],
        )?;

        Ok(Ok(conn.last_insert_rowid()))
      })
      .await??;

    Ok(ContactInfo { contact_info_id, person_id, kind, value, label, created_at })
  }

  async fn get_contact_info(
    &self,
    contact_info_id: i64,
  ) -> Result<Option<ContactInfo>> {
    let raw: Option<RawContactInfo> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT contact_info_id, person_id, kind, value, label, created_at
               FROM contact_infos WHERE contact_info_id = ?1 AND deleted = 0",
              rusqlite::params![contact_info_id],
              contact_info_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawContactInfo::into_contact_info).transpose()
  }

  async fn list_contact_info(&self, person_id: i64) -> Result<Vec<ContactInfo>> {
    let raws: Vec<RawContactInfo> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT contact_info_id, person_id, kind, value, label, created_at
           FROM contact_infos WHERE person_id = ?1 AND deleted = 0
           ORDER BY contact_info_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![person_id], contact_info_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawContactInfo::into_contact_info)
      .collect()
  }

  async fn delete_contact_info(&self, contact_info_id: i64) -> Result<()> {
    self
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE contact_infos SET deleted = 1
           WHERE contact_info_id = ?1 AND deleted = 0",
          rusqlite::params![contact_info_id],
        )?;
        if n == 0 {
          return Ok(Err(Error::ContactInfoNotFound(contact_info_id)));
        }
        Ok(Ok(()))
      })
      .await?
  }

  // ── Interests ──────────────────────────────────────────────────────────────

  async fn set_interest_vector(
    &self,
    person_id: i64,
    vector: Vec<f32>,
  ) -> Result<()> {
    let vector_json = encode_vector(&vector)?;
    let updated_str = encode_dt(Utc::now());

    self
      .call(move |conn| {
        if !person_is_live(conn, person_id)? {
          return Ok(Err(Error::PersonNotFound(person_id)));
        }
        conn.execute(
          "INSERT INTO interest_vectors (person_id, vector_json, updated_at)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (person_id) DO UPDATE SET vector_json = ?2, updated_at = ?3",
          rusqlite::params![person_id, vector_json, updated_str],
        )?;
        Ok(Ok(()))
      })
      .await?
  }

  async fn get_interest_vector(
    &self,
    person_id: i64,
  ) -> Result<Option<Vec<f32>>> {
    let json: Option<String> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT vector_json FROM interest_vectors WHERE person_id = ?1",
              rusqlite::params![person_id],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    json.as_deref().map(decode_vector).transpose()
  }

  async fn similar_persons(
    &self,
    person_id: i64,
    limit: i64,
  ) -> Result<Vec<SimilarPerson>> {
    let (query_json, rows) = self
      .call(move |conn| {
        if !person_is_live(conn, person_id)? {
          return Ok(Err(Error::PersonNotFound(person_id)));
        }

        let query_json: Option<String> = conn
          .query_row(
            "SELECT vector_json FROM interest_vectors WHERE person_id = ?1",
            rusqlite::params![person_id],
            |row| row.get(0),
          )
          .optional()?;
        let Some(query_json) = query_json else {
          return Ok(Err(Error::NoInterestVector(person_id)));
        };

        let mut stmt = conn.prepare(
          "SELECT p.person_id, p.user_id, p.slug, p.display_name, p.given_name,
                  p.family_name, p.created_at, iv.vector_json
           FROM interest_vectors iv
           JOIN persons p ON p.person_id = iv.person_id
           WHERE p.deleted = 0 AND p.person_id != ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![person_id], |row| {
            Ok((
              RawPerson {
                person_id:    row.get(0)?,
                user_id:      row.get(1)?,
                slug:         row.get(2)?,
                display_name: row.get(3)?,
                given_name:   row.get(4)?,
                family_name:  row.get(5)?,
                created_at:   row.get(6)?,
              },
              row.get::<_, String>(7)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Ok((query_json, rows)))
      })
      .await??;

    let query_vec = decode_vector(&query_json)?;

    let mut hits = Vec::with_capacity(rows.len());
    for (raw, vector_json) in rows {
      let vector = decode_vector(&vector_json)?;
      let score = cosine_similarity(&query_vec, &vector);
      hits.push(SimilarPerson { person: raw.into_person()?, score });
    }

    hits.sort_by(|a, b| {
      b.score
        .partial_cmp(&a.score)
        .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(limit.max(0) as usize);

    Ok(hits)
  }

  // ── Groups ─────────────────────────────────────────────────────────────────

  async fn create_group(
    &self,
    input: NewGroup,
    initial_admin_person_id: Option<i64>,
  ) -> Result<Group> {
    let created_at = Utc::now();
    let at_str = encode_dt(created_at);
    let NewGroup {
      slug,
      name,
      parent_group_id,
      members_visible,
      subgroups_allowed,
    } = input;

    let (group_id, slug, name) = self
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if group_slug_taken(&tx, &slug)? {
          return Ok(Err(Error::DuplicateSlug(slug)));
        }
        if let Some(person_id) = initial_admin_person_id {
          if !person_is_live(&tx, person_id)? {
            return Ok(Err(Error::PersonNotFound(person_id)));
          }
        }

        tx.execute(
          "INSERT INTO groups
             (slug, name, parent_group_id, members_visible, subgroups_allowed,
              created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            slug,
            name,
            parent_group_id,
            members_visible,
            subgroups_allowed,
            at_str
          ],
        )?;
        let group_id = tx.last_insert_rowid();

        if let Some(person_id) = initial_admin_person_id {
          tx.execute(
            "INSERT INTO memberships (person_id, group_id, is_admin, created_at)
             VALUES (?1, ?2, 1, ?3)",
            rusqlite::params![person_id, group_id, at_str],
          )?;
        }

        tx.commit()?;
        Ok(Ok((group_id, slug, name)))
      })
      .await??;

    Ok(Group {
      group_id,
      slug,
      name,
      parent_group_id,
      members_visible,
      subgroups_allowed,
      created_at,
    })
  }

  async fn get_group(&self, group_id: i64) -> Result<Option<Group>> {
    let raw = self.call(move |conn| Ok(live_group(conn, group_id)?)).await?;
    raw.map(RawGroup::into_group).transpose()
  }

  async fn get_group_by_slug(&self, slug: String) -> Result<Option<Group>> {
    let raw: Option<RawGroup> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT group_id, slug, name, parent_group_id, members_visible,
                      subgroups_allowed, created_at
               FROM groups WHERE slug = ?1 AND deleted = 0",
              rusqlite::params![slug],
              group_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawGroup::into_group).transpose()
  }

  async fn list_groups(&self, limit: i64, offset: i64) -> Result<Vec<Group>> {
    let raws: Vec<RawGroup> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT group_id, slug, name, parent_group_id, members_visible,
                  subgroups_allowed, created_at
           FROM groups WHERE deleted = 0
           ORDER BY group_id
           LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![limit, offset], group_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawGroup::into_group).collect()
  }

  async fn list_subgroups(&self, group_id: i64) -> Result<Vec<Group>> {
    let raws: Vec<RawGroup> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT group_id, slug, name, parent_group_id, members_visible,
                  subgroups_allowed, created_at
           FROM groups WHERE parent_group_id = ?1 AND deleted = 0
           ORDER BY group_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![group_id], group_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawGroup::into_group).collect()
  }

  async fn update_group(
    &self,
    group_id: i64,
    patch: GroupPatch,
  ) -> Result<Group> {
    let raw = self
      .call(move |conn| {
        let Some(current) = live_group(conn, group_id)? else {
          return Ok(Err(Error::GroupNotFound(group_id)));
        };

        let slug = match patch.slug {
          Some(slug) if slug != current.slug => {
            if group_slug_taken(conn, &slug)? {
              return Ok(Err(Error::DuplicateSlug(slug)));
            }
            slug
          }
          Some(slug) => slug,
          None => current.slug,
        };
        let name = patch.name.unwrap_or(current.name);

        let parent_group_id = match patch.parent_group_id {
          None => current.parent_group_id,
          Some(None) => None,
          Some(Some(new_parent)) => {
            // Walk up from the proposed parent; reaching the group itself
            // means the re-parent would close a cycle.
            let mut cursor = Some(new_parent);
            while let Some(current_id) = cursor {
              if current_id == group_id {
                return Ok(Err(Error::GroupCycle(group_id)));
              }
              cursor = conn
                .query_row(
                  "SELECT parent_group_id FROM groups
                   WHERE group_id = ?1 AND deleted = 0",
                  rusqlite::params![current_id],
                  |row| row.get(0),
                )
                .optional()?
                .flatten();
            }
            Some(new_parent)
          }
        };

        let members_visible =
          patch.members_visible.unwrap_or(current.members_visible);
        let subgroups_allowed =
          patch.subgroups_allowed.unwrap_or(current.subgroups_allowed);

        conn.execute(
          "UPDATE groups
           SET slug = ?2, name = ?3, parent_group_id = ?4,
               members_visible = ?5, subgroups_allowed = ?6
           WHERE group_id = ?1",
          rusqlite::params![
            group_id,
            slug,
            name,
            parent_group_id,
            members_visible,
            subgroups_allowed
          ],
        )?;

        Ok(Ok(RawGroup {
          group_id,
          slug,
          name,
          parent_group_id,
          members_visible,
          subgroups_allowed,
          created_at: current.created_at,
        }))
      })
      .await??;

    raw.into_group()
  }

  async fn delete_group(&self, group_id: i64) -> Result<()> {
    self
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !group_is_live(&tx, group_id)? {
          return Ok(Err(Error::GroupNotFound(group_id)));
        }

        let subgroups: i64 = tx.query_row(
          "SELECT COUNT(*) FROM groups WHERE parent_group_id = ?1 AND deleted = 0",
          rusqlite::params![group_id],
          |row| row.get(0),
        )?;
        if subgroups > 0 {
          return Ok(Err(Error::GroupHasSubgroups(group_id)));
        }

        tx.execute(
          "UPDATE memberships SET deleted = 1 WHERE group_id = ?1 AND deleted = 0",
          rusqlite::params![group_id],
        )?;
        tx.execute(
          "UPDATE groups SET deleted = 1 WHERE group_id = ?1",
          rusqlite::params![group_id],
        )?;

        tx.commit()?;
        Ok(Ok(()))
      })
      .await?
  }

  // ── Memberships ────────────────────────────────────────────────────────────

  async fn create_membership(&self, input: NewMembership) -> Result<Membership> {
    let created_at = Utc::now();
    let at_str = encode_dt(created_at);
    let NewMembership { person_id, group_id, is_admin } = input;

    let membership_id = self
      .call(move |conn| {
        if !person_is_live(conn, person_id)? {
          return Ok(Err(Error::PersonNotFound(person_id)));
        }
        if !group_is_live(conn, group_id)? {
          return Ok(Err(Error::GroupNotFound(group_id)));
        }

        let existing: Option<i64> = conn
          .query_row(
            "SELECT membership_id FROM memberships
             WHERE person_id = ?1 AND group_id = ?2 AND deleted = 0",
            rusqlite::params![person_id, group_id],
            |row| row.get(0),
          )
          .optional()?;
        if existing.is_some() {
          return Ok(Err(Error::AlreadyMember { person_id, group_id }));
        }

        conn.execute(
          "INSERT INTO memberships (person_id, group_id, is_admin, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![person_id, group_id, is_admin, at_str],
        )?;

        Ok(Ok(conn.last_insert_rowid()))
      })
      .await??;

    Ok(Membership { membership_id, person_id, group_id, is_admin, created_at })
  }

  async fn get_membership(
    &self,
    membership_id: i64,
  ) -> Result<Option<Membership>> {
    let raw = self
      .call(move |conn| Ok(live_membership(conn, membership_id)?))
      .await?;
    raw.map(RawMembership::into_membership).transpose()
  }

  async fn list_group_memberships(
    &self,
    group_id: i64,
  ) -> Result<Vec<Membership>> {
    let raws: Vec<RawMembership> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT membership_id, person_id, group_id, is_admin, created_at
           FROM memberships WHERE group_id = ?1 AND deleted = 0
           ORDER BY membership_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![group_id], membership_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawMembership::into_membership)
      .collect()
  }

  async fn list_person_memberships(
    &self,
    person_id: i64,
  ) -> Result<Vec<Membership>> {
    let raws: Vec<RawMembership> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT membership_id, person_id, group_id, is_admin, created_at
           FROM memberships WHERE person_id = ?1 AND deleted = 0
           ORDER BY membership_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![person_id], membership_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawMembership::into_membership)
      .collect()
  }

  async fn group_admin_person_ids(&self, group_id: i64) -> Result<Vec<i64>> {
    self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT person_id FROM memberships
           WHERE group_id = ?1 AND is_admin = 1 AND deleted = 0",
        )?;
        let ids = stmt
          .query_map(rusqlite::params![group_id], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
      })
      .await
  }

  async fn set_membership_admin(
    &self,
    membership_id: i64,
    is_admin: bool,
  ) -> Result<Membership> {
    let raw = self
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(current) = live_membership(&tx, membership_id)? else {
          return Ok(Err(Error::MembershipNotFound(membership_id)));
        };

        if current.is_admin && !is_admin {
          let admins = live_admin_count(&tx, current.group_id)?;
          if let Err(e) =
            authz::assert_admin_demotion_allowed(current.group_id, admins)
          {
            return Ok(Err(e));
          }
        }

        tx.execute(
          "UPDATE memberships SET is_admin = ?2 WHERE membership_id = ?1",
          rusqlite::params![membership_id, is_admin],
        )?;
        tx.commit()?;

        Ok(Ok(RawMembership { is_admin, ..current }))
      })
      .await??;

    raw.into_membership()
  }

  async fn delete_membership(&self, membership_id: i64) -> Result<()> {
    self
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(current) = live_membership(&tx, membership_id)? else {
          return Ok(Err(Error::MembershipNotFound(membership_id)));
        };

        if current.is_admin {
          let admins = live_admin_count(&tx, current.group_id)?;
          let members = live_member_count(&tx, current.group_id)?;
          if let Err(e) = authz::assert_admin_removal_allowed(
            current.group_id,
            admins,
            members,
          ) {
            return Ok(Err(e));
          }
        }

        tx.execute(
          "UPDATE memberships SET deleted = 1 WHERE membership_id = ?1",
          rusqlite::params![membership_id],
        )?;
        tx.commit()?;

        Ok(Ok(()))
      })
      .await?
  }

  // ── Claims ─────────────────────────────────────────────────────────────────

  async fn create_claim(
    &self,
    person_id: i64,
    token_hash: String,
    created_by_user_id: i64,
    expires_at: DateTime<Utc>,
  ) -> Result<Claim> {
    let created_at = Utc::now();
    let at_str = encode_dt(created_at);
    let expires_str = encode_dt(expires_at);
    let hash_for_row = token_hash.clone();

    let claim_id = self
      .call(move |conn| {
        if !person_is_live(conn, person_id)? {
          return Ok(Err(Error::PersonNotFound(person_id)));
        }
        conn.execute(
          "INSERT INTO claims
             (person_id, token_hash, created_by_user_id, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            person_id,
            hash_for_row,
            created_by_user_id,
            at_str,
            expires_str
          ],
        )?;
        Ok(Ok(conn.last_insert_rowid()))
      })
      .await??;

    Ok(Claim {
      claim_id,
      person_id,
      token_hash,
      created_by_user_id,
      created_at,
      expires_at,
      redeemed_at: None,
      redeemed_by_user_id: None,
    })
  }

  async fn get_claim_by_token_hash(
    &self,
    token_hash: String,
  ) -> Result<Option<Claim>> {
    let raw: Option<RawClaim> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT claim_id, person_id, token_hash, created_by_user_id,
                      created_at, expires_at, redeemed_at, redeemed_by_user_id
               FROM claims WHERE token_hash = ?1",
              rusqlite::params![token_hash],
              claim_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawClaim::into_claim).transpose()
  }

  async fn list_person_claims(&self, person_id: i64) -> Result<Vec<Claim>> {
    let raws: Vec<RawClaim> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT claim_id, person_id, token_hash, created_by_user_id,
                  created_at, expires_at, redeemed_at, redeemed_by_user_id
           FROM claims WHERE person_id = ?1
           ORDER BY claim_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![person_id], claim_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawClaim::into_claim).collect()
  }

  async fn redeem_claim(
    &self,
    claim_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
  ) -> Result<Person> {
    let now_str = encode_dt(now);

    let raw = self
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let claim = tx
          .query_row(
            "SELECT claim_id, person_id, token_hash, created_by_user_id,
                    created_at, expires_at, redeemed_at, redeemed_by_user_id
             FROM claims WHERE claim_id = ?1",
            rusqlite::params![claim_id],
            claim_row,
          )
          .optional()?;
        let Some(claim) = claim else {
          return Ok(Err(Error::ClaimNotFound(claim_id)));
        };

        if claim.redeemed_at.is_some() {
          return Ok(Err(Error::ClaimAlreadyRedeemed(claim_id)));
        }
        // RFC 3339 strings with a fixed UTC offset compare chronologically.
        if claim.expires_at.as_str() < now_str.as_str() {
          return Ok(Err(Error::ClaimExpired(claim_id)));
        }

        let Some(person) = live_person(&tx, claim.person_id)? else {
          return Ok(Err(Error::PersonNotFound(claim.person_id)));
        };

        tx.execute(
          "UPDATE claims SET redeemed_at = ?2, redeemed_by_user_id = ?3
           WHERE claim_id = ?1",
          rusqlite::params![claim_id, now_str, user_id],
        )?;
        tx.execute(
          "UPDATE persons SET user_id = ?2 WHERE person_id = ?1",
          rusqlite::params![claim.person_id, user_id],
        )?;

        tx.commit()?;
        Ok(Ok(RawPerson { user_id: Some(user_id), ..person }))
      })
      .await??;

    raw.into_person()
  }

  // ── Audit ──────────────────────────────────────────────────────────────────

  async fn record_audit(&self, entry: NewAuditEntry) -> Result<AuditEntry> {
    let created_at = Utc::now();
    let at_str = encode_dt(created_at);
    let detail_json = entry.detail.as_ref().map(serde_json::to_string).transpose()?;
    let NewAuditEntry { actor_user_id, action, entity_id, detail } = entry;
    let action_for_row = action.clone();

    let audit_id = self
      .call(move |conn| {
        conn.execute(
          "INSERT INTO audit_log
             (actor_user_id, action, entity_id, detail_json, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            actor_user_id,
            action_for_row,
            entity_id,
            detail_json,
            at_str
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(AuditEntry { audit_id, actor_user_id, action, entity_id, detail, created_at })
  }

  async fn list_audit(&self, limit: i64, offset: i64) -> Result<Vec<AuditEntry>> {
    let raws: Vec<RawAuditEntry> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT audit_id, actor_user_id, action, entity_id, detail_json,
                  created_at
           FROM audit_log
           ORDER BY audit_id DESC
           LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![limit, offset], audit_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawAuditEntry::into_audit_entry)
      .collect()
  }
}

// ─── Row mappers ─────────────────────────────────────────────────────────────

fn user_row(row: &rusqlite::Row) -> rusqlite::Result<RawUser> {
  Ok(RawUser {
    user_id:         row.get(0)?,
    email:           row.get(1)?,
    password_hash:   row.get(2)?,
    is_system_admin: row.get(3)?,
    created_at:      row.get(4)?,
  })
}

fn session_row(row: &rusqlite::Row) -> rusqlite::Result<RawSession> {
  Ok(RawSession {
    session_id:         row.get(0)?,
    user_id:            row.get(1)?,
    token_hash:         row.get(2)?,
    created_at:         row.get(3)?,
    expires_at:         row.get(4)?,
    masquerade_user_id: row.get(5)?,
  })
}

fn person_row(row: &rusqlite::Row) -> rusqlite::Result<RawPerson> {
  Ok(RawPerson {
    person_id:    row.get(0)?,
    user_id:      row.get(1)?,
    slug:         row.get(2)?,
    display_name: row.get(3)?,
    given_name:   row.get(4)?,
    family_name:  row.get(5)?,
    created_at:   row.get(6)?,
  })
}

fn contact_info_row(row: &rusqlite::Row) -> rusqlite::Result<RawContactInfo> {
  Ok(RawContactInfo {
    contact_info_id: row.get(0)?,
    person_id:       row.get(1)?,
    kind:            row.get(2)?,
    value:           row.get(3)?,
    label:           row.get(4)?,
    created_at:      row.get(5)?,
  })
}

fn group_row(row: &rusqlite::Row) -> rusqlite::Result<RawGroup> {
  Ok(RawGroup {
    group_id:          row.get(0)?,
    slug:              row.get(1)?,
    name:              row.get(2)?,
    parent_group_id:   row.get(3)?,
    members_visible:   row.get(4)?,
    subgroups_allowed: row.get(5)?,
    created_at:        row.get(6)?,
  })
}

fn membership_row(row: &rusqlite::Row) -> rusqlite::Result<RawMembership> {
  Ok(RawMembership {
    membership_id: row.get(0)?,
    person_id:     row.get(1)?,
    group_id:      row.get(2)?,
    is_admin:      row.get(3)?,
    created_at:    row.get(4)?,
  })
}

fn claim_row(row: &rusqlite::Row) -> rusqlite::Result<RawClaim> {
  Ok(RawClaim {
    claim_id:            row.get(0)?,
    person_id:           row.get(1)?,
    token_hash:          row.get(2)?,
    created_by_user_id:  row.get(3)?,
    created_at:          row.get(4)?,
    expires_at:          row.get(5)?,
    redeemed_at:         row.get(6)?,
    redeemed_by_user_id: row.get(7)?,
  })
}

fn audit_row(row: &rusqlite::Row) -> rusqlite::Result<RawAuditEntry> {
  Ok(RawAuditEntry {
    audit_id:      row.get(0)?,
    actor_user_id: row.get(1)?,
    action:        row.get(2)?,
    entity_id:     row.get(3)?,
    detail_json:   row.get(4)?,
    created_at:    row.get(5)?,
  })
}

// ─── Query helpers ───────────────────────────────────────────────────────────

fn live_person(
  conn: &rusqlite::Connection,
  person_id: i64,
) -> rusqlite::Result<Option<RawPerson>> {
  conn
    .query_row(
      "SELECT person_id, user_id, slug, display_name, given_name, family_name,
              created_at
       FROM persons WHERE person_id = ?1 AND deleted = 0",
      rusqlite::params![person_id],
      person_row,
    )
    .optional()
}

fn live_group(
  conn: &rusqlite::Connection,
  group_id: i64,
) -> rusqlite::Result<Option<RawGroup>> {
  conn
    .query_row(
      "SELECT group_id, slug, name, parent_group_id, members_visible,
              subgroups_allowed, created_at
       FROM groups WHERE group_id = ?1 AND deleted = 0",
      rusqlite::params![group_id],
      group_row,
    )
    .optional()
}

fn live_membership(
  conn: &rusqlite::Connection,
  membership_id: i64,
) -> rusqlite::Result<Option<RawMembership>> {
  conn
    .query_row(
      "SELECT membership_id, person_id, group_id, is_admin, created_at
       FROM memberships WHERE membership_id = ?1 AND deleted = 0",
      rusqlite::params![membership_id],
      membership_row,
    )
    .optional()
}

fn person_is_live(
  conn: &rusqlite::Connection,
  person_id: i64,
) -> rusqlite::Result<bool> {
  conn
    .query_row(
      "SELECT 1 FROM persons WHERE person_id = ?1 AND deleted = 0",
      rusqlite::params![person_id],
      |_| Ok(true),
    )
    .optional()
    .map(|o| o.unwrap_or(false))
}

fn group_is_live(
  conn: &rusqlite::Connection,
  group_id: i64,
) -> rusqlite::Result<bool> {
  conn
    .query_row(
      "SELECT 1 FROM groups WHERE group_id = ?1 AND deleted = 0",
      rusqlite::params![group_id],
      |_| Ok(true),
    )
    .optional()
    .map(|o| o.unwrap_or(false))
}

fn person_slug_taken(
  conn: &rusqlite::Connection,
  slug: &str,
) -> rusqlite::Result<bool> {
  conn
    .query_row(
      "SELECT 1 FROM persons WHERE slug = ?1 AND deleted = 0",
      rusqlite::params![slug],
      |_| Ok(true),
    )
    .optional()
    .map(|o| o.unwrap_or(false))
}

fn group_slug_taken(
  conn: &rusqlite::Connection,
  slug: &str,
) -> rusqlite::Result<bool> {
  conn
    .query_row(
      "SELECT 1 FROM groups WHERE slug = ?1 AND deleted = 0",
      rusqlite::params![slug],
      |_| Ok(true),
    )
    .optional()
    .map(|o| o.unwrap_or(false))
}

fn live_admin_count(
  conn: &rusqlite::Connection,
  group_id: i64,
) -> rusqlite::Result<i64> {
  conn.query_row(
    "SELECT COUNT(*) FROM memberships
     WHERE group_id = ?1 AND is_admin = 1 AND deleted = 0",
    rusqlite::params![group_id],
    |row| row.get(0),
  )
}

fn live_member_count(
  conn: &rusqlite::Connection,
  group_id: i64,
) -> rusqlite::Result<i64> {
  conn.query_row(
    "SELECT COUNT(*) FROM memberships WHERE group_id = ?1 AND deleted = 0",
    rusqlite::params![group_id],
    |row| row.get(0),
  )
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
  // Vectors of different dimensions are not comparable; rank them last
  // rather than truncating to the shorter one.
  if a.len() != b.len() {
    return 0.0;
  }
  let dot: f64 = a
    .iter()
    .zip(b)
    .map(|(x, y)| f64::from(*x) * f64::from(*y))
    .sum();
  let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
  let norm_b: f64 = b.iter().map(|y| f64::from(*y).powi(2)).sum::<f64>().sqrt();
  if norm_a == 0.0 || norm_b == 0.0 {
    return 0.0;
  }
  dot / (norm_a * norm_b)
}
