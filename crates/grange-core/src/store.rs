//! The [`DirectoryStore`] trait implemented by storage backends.
//!
//! The API layer is generic over this trait, so handlers can be exercised
//! against any backend. Implementations translate their native failures
//! into the [`crate::Error`] taxonomy; the trait deliberately fixes the
//! error type so callers can match on domain outcomes.
//!
//! Soft-deleted rows are invisible to every read, and mutations against
//! them behave as if the row did not exist. Membership mutations that
//! could leave a group without an administrator must run the last-admin
//! guard atomically with the write and surface [`crate::Error::LastAdmin`]
//! on violation.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  Result,
  audit::{AuditEntry, NewAuditEntry},
  group::{Group, GroupPatch, Membership, NewGroup, NewMembership},
  identity::{Claim, NewUser, Session, User},
  person::{
    ContactInfo, NewContactInfo, NewPerson, Person, PersonPatch, SimilarPerson,
  },
};

pub trait DirectoryStore: Send + Sync {
  // ── Users ─────────────────────────────────────────────────────────

  /// Persists a new user. Fails with [`crate::Error::DuplicateEmail`] if
  /// the address is already registered.
  fn create_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User>> + Send + '_;

  fn get_user(
    &self,
    user_id: i64,
  ) -> impl Future<Output = Result<Option<User>>> + Send + '_;

  fn get_user_by_email(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<User>>> + Send + '_;

  // ── Sessions ──────────────────────────────────────────────────────

  fn create_session(
    &self,
    user_id: i64,
    token_hash: String,
    expires_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Session>> + Send + '_;

  /// Looks a session up by token hash. Expiry is not checked here; the
  /// caller decides what stale means.
  fn get_session_by_token_hash(
    &self,
    token_hash: String,
  ) -> impl Future<Output = Result<Option<Session>>> + Send + '_;

  /// Sets or clears the masquerade target of a session.
  fn set_session_masquerade(
    &self,
    session_id: i64,
    masquerade_user_id: Option<i64>,
  ) -> impl Future<Output = Result<Session>> + Send + '_;

  /// Deletes a session. Deleting a session that does not exist is not an
  /// error.
  fn delete_session(
    &self,
    session_id: i64,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Deletes every session that expired before `now`; returns how many
  /// rows went away.
  fn purge_expired_sessions(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64>> + Send + '_;

  // ── Persons ───────────────────────────────────────────────────────

  /// Persists a new person. Fails with [`crate::Error::DuplicateSlug`] if
  /// the slug collides with a live person.
  fn create_person(
    &self,
    input: NewPerson,
  ) -> impl Future<Output = Result<Person>> + Send + '_;

  fn get_person(
    &self,
    person_id: i64,
  ) -> impl Future<Output = Result<Option<Person>>> + Send + '_;

  fn get_person_by_slug(
    &self,
    slug: String,
  ) -> impl Future<Output = Result<Option<Person>>> + Send + '_;

  fn list_persons(
    &self,
    limit: i64,
    offset: i64,
  ) -> impl Future<Output = Result<Vec<Person>>> + Send + '_;

  /// Every live person owned by the given user.
  fn list_owned_persons(
    &self,
    user_id: i64,
  ) -> impl Future<Output = Result<Vec<Person>>> + Send + '_;

  fn update_person(
    &self,
    person_id: i64,
    patch: PersonPatch,
  ) -> impl Future<Output = Result<Person>> + Send + '_;

  /// Soft-deletes a person together with their memberships and contact
  /// info. Each group the person administers is checked against the
  /// last-admin guard first; any violation aborts the whole operation.
  fn delete_person(
    &self,
    person_id: i64,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  // ── Contact info ──────────────────────────────────────────────────

  fn add_contact_info(
    &self,
    input: NewContactInfo,
  ) -> impl Future<Output = Result<ContactInfo>> + Send + '_;

  fn get_contact_info(
    &self,
    contact_info_id: i64,
  ) -> impl Future<Output = Result<Option<ContactInfo>>> + Send + '_;

  fn list_contact_info(
    &self,
    person_id: i64,
  ) -> impl Future<Output = Result<Vec<ContactInfo>>> + Send + '_;

  fn delete_contact_info(
    &self,
    contact_info_id: i64,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  // ── Interests ─────────────────────────────────────────────────────

  /// Stores (or replaces) a person's interest vector.
  fn set_interest_vector(
    &self,
    person_id: i64,
    vector: Vec<f32>,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  fn get_interest_vector(
    &self,
    person_id: i64,
  ) -> impl Future<Output = Result<Option<Vec<f32>>>> + Send + '_;

  /// Ranks other persons by cosine similarity of interest vectors against
  /// the given person's, best first. Vectors of a different dimension than
  /// the anchor's score zero. Fails with
  /// [`crate::Error::NoInterestVector`] when the person has none.
  fn similar_persons(
    &self,
    person_id: i64,
    limit: i64,
  ) -> impl Future<Output = Result<Vec<SimilarPerson>>> + Send + '_;

  // ── Groups ────────────────────────────────────────────────────────

  /// Persists a new group, atomically creating an initial admin
  /// membership for `initial_admin_person_id` when one is given.
  fn create_group(
    &self,
    input: NewGroup,
    initial_admin_person_id: Option<i64>,
  ) -> impl Future<Output = Result<Group>> + Send + '_;

  fn get_group(
    &self,
    group_id: i64,
  ) -> impl Future<Output = Result<Option<Group>>> + Send + '_;

  fn get_group_by_slug(
    &self,
    slug: String,
  ) -> impl Future<Output = Result<Option<Group>>> + Send + '_;

  fn list_groups(
    &self,
    limit: i64,
    offset: i64,
  ) -> impl Future<Output = Result<Vec<Group>>> + Send + '_;

  /// Live subgroups of the given group.
  fn list_subgroups(
    &self,
    group_id: i64,
  ) -> impl Future<Output = Result<Vec<Group>>> + Send + '_;

  /// Applies a patch. Re-parenting runs a cycle check over the live
  /// hierarchy and fails with [`crate::Error::GroupCycle`] if the new
  /// parent is the group itself or one of its descendants.
  fn update_group(
    &self,
    group_id: i64,
    patch: GroupPatch,
  ) -> impl Future<Output = Result<Group>> + Send + '_;

  /// Soft-deletes a group and its memberships. Fails with
  /// [`crate::Error::GroupHasSubgroups`] while live subgroups remain.
  fn delete_group(
    &self,
    group_id: i64,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  // ── Memberships ───────────────────────────────────────────────────

  /// Persists a new membership. Fails with
  /// [`crate::Error::AlreadyMember`] if the person already holds a live
  /// membership in the group.
  fn create_membership(
    &self,
    input: NewMembership,
  ) -> impl Future<Output = Result<Membership>> + Send + '_;

  fn get_membership(
    &self,
    membership_id: i64,
  ) -> impl Future<Output = Result<Option<Membership>>> + Send + '_;

  fn list_group_memberships(
    &self,
    group_id: i64,
  ) -> impl Future<Output = Result<Vec<Membership>>> + Send + '_;

  fn list_person_memberships(
    &self,
    person_id: i64,
  ) -> impl Future<Output = Result<Vec<Membership>>> + Send + '_;

  /// Ids of every person holding an admin membership in the group.
  fn group_admin_person_ids(
    &self,
    group_id: i64,
  ) -> impl Future<Output = Result<Vec<i64>>> + Send + '_;

  /// Sets the admin flag of a membership. A true-to-false transition on
  /// the group's last admin fails with [`crate::Error::LastAdmin`]; the
  /// check and the write share one transaction.
  fn set_membership_admin(
    &self,
    membership_id: i64,
    is_admin: bool,
  ) -> impl Future<Output = Result<Membership>> + Send + '_;

  /// Soft-deletes a membership. Removing a group's last admin fails with
  /// [`crate::Error::LastAdmin`] unless the membership is also the
  /// group's only one.
  fn delete_membership(
    &self,
    membership_id: i64,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  // ── Claims ────────────────────────────────────────────────────────

  fn create_claim(
    &self,
    person_id: i64,
    token_hash: String,
    created_by_user_id: i64,
    expires_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Claim>> + Send + '_;

  fn get_claim_by_token_hash(
    &self,
    token_hash: String,
  ) -> impl Future<Output = Result<Option<Claim>>> + Send + '_;

  fn list_person_claims(
    &self,
    person_id: i64,
  ) -> impl Future<Output = Result<Vec<Claim>>> + Send + '_;

  /// Atomically validates and redeems a claim: checks expiry and
  /// single-use, marks it redeemed, and hands the person to `user_id`.
  /// Returns the updated person.
  fn redeem_claim(
    &self,
    claim_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Person>> + Send + '_;

  // ── Audit ─────────────────────────────────────────────────────────

  fn record_audit(
    &self,
    entry: NewAuditEntry,
  ) -> impl Future<Output = Result<AuditEntry>> + Send + '_;

  fn list_audit(
    &self,
    limit: i64,
    offset: i64,
  ) -> impl Future<Output = Result<Vec<AuditEntry>>> + Send + '_;
}
