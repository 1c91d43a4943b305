//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, Utc};
use grange_core::{
  Error,
  group::{NewGroup, NewMembership},
  identity::{NewUser, User},
  person::{ContactKind, NewContactInfo, NewPerson, PersonPatch},
  store::DirectoryStore,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn new_person(slug: &str) -> NewPerson {
  NewPerson {
    user_id:      None,
    slug:         slug.into(),
    display_name: slug.into(),
    given_name:   None,
    family_name:  None,
  }
}

fn new_group(slug: &str) -> NewGroup {
  NewGroup {
    slug:              slug.into(),
    name:              slug.into(),
    parent_group_id:   None,
    members_visible:   true,
    subgroups_allowed: true,
  }
}

async fn seed_user(s: &SqliteStore, email: &str) -> User {
  s.create_user(NewUser {
    email:           email.into(),
    password_hash:   "$argon2id$stub".into(),
    is_system_admin: false,
  })
  .await
  .unwrap()
}

// ─── Users and sessions ──────────────────────────────────────────────────────

#[tokio::test]
async fn create_user_and_fetch_by_email() {
  let s = store().await;

  let user = seed_user(&s, "alice@example.com").await;
  assert!(!user.is_system_admin);

  let by_id = s.get_user(user.user_id).await.unwrap().unwrap();
  assert_eq!(by_id.email, "alice@example.com");

  let by_email = s
    .get_user_by_email("alice@example.com".into())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(by_email.user_id, user.user_id);
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
  let s = store().await;
  seed_user(&s, "alice@example.com").await;

  let err = s
    .create_user(NewUser {
      email:           "alice@example.com".into(),
      password_hash:   "$argon2id$stub".into(),
      is_system_admin: false,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::DuplicateEmail(_)));
}

#[tokio::test]
async fn session_round_trip() {
  let s = store().await;
  let user = seed_user(&s, "alice@example.com").await;

  let session = s
    .create_session(user.user_id, "hash-1".into(), Utc::now() + Duration::days(30))
    .await
    .unwrap();

  let fetched = s
    .get_session_by_token_hash("hash-1".into())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(fetched.session_id, session.session_id);
  assert_eq!(fetched.user_id, user.user_id);
  assert!(fetched.masquerade_user_id.is_none());

  s.delete_session(session.session_id).await.unwrap();
  assert!(
    s.get_session_by_token_hash("hash-1".into())
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn purge_removes_only_expired_sessions() {
  let s = store().await;
  let user = seed_user(&s, "alice@example.com").await;

  s.create_session(user.user_id, "stale".into(), Utc::now() - Duration::hours(1))
    .await
    .unwrap();
  s.create_session(user.user_id, "fresh".into(), Utc::now() + Duration::hours(1))
    .await
    .unwrap();

  let purged = s.purge_expired_sessions(Utc::now()).await.unwrap();
  assert_eq!(purged, 1);

  assert!(s.get_session_by_token_hash("stale".into()).await.unwrap().is_none());
  assert!(s.get_session_by_token_hash("fresh".into()).await.unwrap().is_some());
}

#[tokio::test]
async fn masquerade_set_and_clear() {
  let s = store().await;
  let admin = seed_user(&s, "admin@example.com").await;
  let target = seed_user(&s, "target@example.com").await;

  let session = s
    .create_session(admin.user_id, "hash-1".into(), Utc::now() + Duration::days(1))
    .await
    .unwrap();

  let updated = s
    .set_session_masquerade(session.session_id, Some(target.user_id))
    .await
    .unwrap();
  assert_eq!(updated.masquerade_user_id, Some(target.user_id));

  let cleared = s
    .set_session_masquerade(session.session_id, None)
    .await
    .unwrap();
  assert!(cleared.masquerade_user_id.is_none());

  let err = s
    .set_session_masquerade(9999, Some(target.user_id))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SessionNotFound(9999)));
}

// ─── Persons ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_person_and_fetch_by_slug() {
  let s = store().await;

  let person = s.create_person(new_person("alice")).await.unwrap();
  assert_eq!(person.slug, "alice");

  let by_slug = s
    .get_person_by_slug("alice".into())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(by_slug.person_id, person.person_id);

  assert!(s.get_person(9999).await.unwrap().is_none());
}

#[tokio::test]
async fn person_slug_is_unique_among_live_rows() {
  let s = store().await;
  let person = s.create_person(new_person("alice")).await.unwrap();

  let err = s.create_person(new_person("alice")).await.unwrap_err();
  assert!(matches!(err, Error::DuplicateSlug(_)));

  // A deleted person's slug becomes reusable.
  s.delete_person(person.person_id).await.unwrap();
  s.create_person(new_person("alice")).await.unwrap();
}

#[tokio::test]
async fn update_person_applies_partial_patch() {
  let s = store().await;
  let person = s
    .create_person(NewPerson {
      user_id:      None,
      slug:         "alice".into(),
      display_name: "Alice Liddell".into(),
      given_name:   Some("Alice".into()),
      family_name:  Some("Liddell".into()),
    })
    .await
    .unwrap();

  let updated = s
    .update_person(person.person_id, PersonPatch {
      slug: Some("alice-l".into()),
      given_name: Some(None),
      ..Default::default()
    })
    .await
    .unwrap();

  assert_eq!(updated.slug, "alice-l");
  assert_eq!(updated.display_name, "Alice Liddell");
  assert!(updated.given_name.is_none());
  assert_eq!(updated.family_name.as_deref(), Some("Liddell"));
}

#[tokio::test]
async fn update_person_rejects_taken_slug() {
  let s = store().await;
  s.create_person(new_person("alice")).await.unwrap();
  let bob = s.create_person(new_person("bob")).await.unwrap();

  let err = s
    .update_person(bob.person_id, PersonPatch {
      slug: Some("alice".into()),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::DuplicateSlug(_)));
}

#[tokio::test]
async fn delete_person_cascades_to_memberships_and_contact_info() {
  let s = store().await;
  let admin = s.create_person(new_person("admin")).await.unwrap();
  let member = s.create_person(new_person("member")).await.unwrap();
  let group = s
    .create_group(new_group("sewing"), Some(admin.person_id))
    .await
    .unwrap();
  s.create_membership(NewMembership {
    person_id: member.person_id,
    group_id:  group.group_id,
    is_admin:  false,
  })
  .await
  .unwrap();
  s.add_contact_info(NewContactInfo {
    person_id: member.person_id,
    kind:      ContactKind::Email,
    value:     "member@example.com".into(),
    label:     None,
  })
  .await
  .unwrap();

  s.delete_person(member.person_id).await.unwrap();

  assert!(s.get_person(member.person_id).await.unwrap().is_none());
  assert!(s.list_contact_info(member.person_id).await.unwrap().is_empty());

  let remaining = s.list_group_memberships(group.group_id).await.unwrap();
  assert_eq!(remaining.len(), 1);
  assert_eq!(remaining[0].person_id, admin.person_id);
}

#[tokio::test]
async fn delete_person_blocked_while_they_are_a_last_admin() {
  let s = store().await;
  let admin = s.create_person(new_person("admin")).await.unwrap();
  let member = s.create_person(new_person("member")).await.unwrap();
  let group = s
    .create_group(new_group("sewing"), Some(admin.person_id))
    .await
    .unwrap();
  s.create_membership(NewMembership {
    person_id: member.person_id,
    group_id:  group.group_id,
    is_admin:  false,
  })
  .await
  .unwrap();

  let err = s.delete_person(admin.person_id).await.unwrap_err();
  assert!(matches!(err, Error::LastAdmin(id) if id == group.group_id));

  // Still present, nothing was cascaded.
  assert!(s.get_person(admin.person_id).await.unwrap().is_some());
  assert_eq!(s.list_group_memberships(group.group_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn delete_person_allowed_when_sole_member_of_their_group() {
  let s = store().await;
  let admin = s.create_person(new_person("admin")).await.unwrap();
  let group = s
    .create_group(new_group("sewing"), Some(admin.person_id))
    .await
    .unwrap();

  s.delete_person(admin.person_id).await.unwrap();

  assert!(s.get_person(admin.person_id).await.unwrap().is_none());
  // The group survives, emptied.
  assert!(s.get_group(group.group_id).await.unwrap().is_some());
  assert!(s.list_group_memberships(group.group_id).await.unwrap().is_empty());
}

// ─── Contact info ────────────────────────────────────────────────────────────

#[tokio::test]
async fn contact_info_round_trip() {
  let s = store().await;
  let person = s.create_person(new_person("alice")).await.unwrap();

  let info = s
    .add_contact_info(NewContactInfo {
      person_id: person.person_id,
      kind:      ContactKind::Phone,
      value:     "+1 555 0100".into(),
      label:     Some("mobile".into()),
    })
    .await
    .unwrap();

  let listed = s.list_contact_info(person.person_id).await.unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].kind, ContactKind::Phone);
  assert_eq!(listed[0].label.as_deref(), Some("mobile"));

  s.delete_contact_info(info.contact_info_id).await.unwrap();
  assert!(s.list_contact_info(person.person_id).await.unwrap().is_empty());

  let err = s.delete_contact_info(info.contact_info_id).await.unwrap_err();
  assert!(matches!(err, Error::ContactInfoNotFound(_)));
}

#[tokio::test]
async fn contact_info_requires_a_live_person() {
  let s = store().await;

  let err = s
    .add_contact_info(NewContactInfo {
      person_id: 9999,
      kind:      ContactKind::Email,
      value:     "ghost@example.com".into(),
      label:     None,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::PersonNotFound(9999)));
}

// ─── Interests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn interest_vector_set_and_get() {
  let s = store().await;
  let person = s.create_person(new_person("alice")).await.unwrap();

  assert!(s.get_interest_vector(person.person_id).await.unwrap().is_none());

  s.set_interest_vector(person.person_id, vec![0.5, 0.25])
    .await
    .unwrap();
  let v = s
    .get_interest_vector(person.person_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(v, vec![0.5, 0.25]);

  // Setting again replaces.
  s.set_interest_vector(person.person_id, vec![1.0])
    .await
    .unwrap();
  let v = s
    .get_interest_vector(person.person_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(v, vec![1.0]);
}

#[tokio::test]
async fn similar_persons_ranked_by_cosine_score() {
  let s = store().await;
  let alice = s.create_person(new_person("alice")).await.unwrap();
  let bob = s.create_person(new_person("bob")).await.unwrap();
  let carol = s.create_person(new_person("carol")).await.unwrap();

  s.set_interest_vector(alice.person_id, vec![1.0, 0.0]).await.unwrap();
  s.set_interest_vector(bob.person_id, vec![2.0, 0.0]).await.unwrap();
  s.set_interest_vector(carol.person_id, vec![0.0, 3.0]).await.unwrap();

  let hits = s.similar_persons(alice.person_id, 10).await.unwrap();
  assert_eq!(hits.len(), 2);
  assert_eq!(hits[0].person.person_id, bob.person_id);
  assert!((hits[0].score - 1.0).abs() < 1e-9);
  assert_eq!(hits[1].person.person_id, carol.person_id);
  assert!(hits[1].score.abs() < 1e-9);

  let top = s.similar_persons(alice.person_id, 1).await.unwrap();
  assert_eq!(top.len(), 1);
}

#[tokio::test]
async fn mismatched_dimension_vectors_score_zero() {
  let s = store().await;
  let alice = s.create_person(new_person("alice")).await.unwrap();
  let bob = s.create_person(new_person("bob")).await.unwrap();
  let carol = s.create_person(new_person("carol")).await.unwrap();

  s.set_interest_vector(alice.person_id, vec![1.0, 0.0]).await.unwrap();
  s.set_interest_vector(bob.person_id, vec![0.5, 0.0]).await.unwrap();
  s.set_interest_vector(carol.person_id, vec![9.0]).await.unwrap();

  // A one-dimensional vector is incomparable with the anchor's; it must
  // not beat a genuine same-direction match by truncation.
  let hits = s.similar_persons(alice.person_id, 10).await.unwrap();
  assert_eq!(hits.len(), 2);
  assert_eq!(hits[0].person.person_id, bob.person_id);
  assert!((hits[0].score - 1.0).abs() < 1e-9);
  assert_eq!(hits[1].person.person_id, carol.person_id);
  assert!(
    hits[1].score.abs() < 1e-9,
    "incomparable vector scored {}",
    hits[1].score
  );
}

#[tokio::test]
async fn similar_persons_requires_a_vector() {
  let s = store().await;
  let person = s.create_person(new_person("alice")).await.unwrap();

  let err = s.similar_persons(person.person_id, 10).await.unwrap_err();
  assert!(matches!(err, Error::NoInterestVector(_)));
}

// ─── Groups ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_group_with_initial_admin() {
  let s = store().await;
  let person = s.create_person(new_person("alice")).await.unwrap();

  let group = s
    .create_group(new_group("sewing"), Some(person.person_id))
    .await
    .unwrap();

  let memberships = s.list_group_memberships(group.group_id).await.unwrap();
  assert_eq!(memberships.len(), 1);
  assert_eq!(memberships[0].person_id, person.person_id);
  assert!(memberships[0].is_admin);

  let admins = s.group_admin_person_ids(group.group_id).await.unwrap();
  assert_eq!(admins, vec![person.person_id]);

  let by_slug = s.get_group_by_slug("sewing".into()).await.unwrap().unwrap();
  assert_eq!(by_slug.group_id, group.group_id);
}

#[tokio::test]
async fn group_slug_is_unique_among_live_rows() {
  let s = store().await;
  s.create_group(new_group("sewing"), None).await.unwrap();

  let err = s.create_group(new_group("sewing"), None).await.unwrap_err();
  assert!(matches!(err, Error::DuplicateSlug(_)));
}

#[tokio::test]
async fn reparenting_onto_a_descendant_is_rejected() {
  let s = store().await;
  let parent = s.create_group(new_group("parent"), None).await.unwrap();
  let child = s
    .create_group(
      NewGroup {
        parent_group_id: Some(parent.group_id),
        ..new_group("child")
      },
      None,
    )
    .await
    .unwrap();

  let err = s
    .update_group(parent.group_id, grange_core::group::GroupPatch {
      parent_group_id: Some(Some(child.group_id)),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::GroupCycle(_)));

  let err = s
    .update_group(parent.group_id, grange_core::group::GroupPatch {
      parent_group_id: Some(Some(parent.group_id)),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::GroupCycle(_)));

  // Clearing the parent is always fine.
  let cleared = s
    .update_group(child.group_id, grange_core::group::GroupPatch {
      parent_group_id: Some(None),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(cleared.parent_group_id.is_none());
}

#[tokio::test]
async fn delete_group_refuses_while_subgroups_remain() {
  let s = store().await;
  let person = s.create_person(new_person("alice")).await.unwrap();
  let parent = s
    .create_group(new_group("parent"), Some(person.person_id))
    .await
    .unwrap();
  let child = s
    .create_group(
      NewGroup {
        parent_group_id: Some(parent.group_id),
        ..new_group("child")
      },
      None,
    )
    .await
    .unwrap();

  let err = s.delete_group(parent.group_id).await.unwrap_err();
  assert!(matches!(err, Error::GroupHasSubgroups(_)));

  s.delete_group(child.group_id).await.unwrap();
  s.delete_group(parent.group_id).await.unwrap();

  assert!(s.get_group(parent.group_id).await.unwrap().is_none());
  // The admin membership went away with the group.
  assert!(
    s.list_person_memberships(person.person_id)
      .await
      .unwrap()
      .is_empty()
  );
}

// ─── Memberships ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_membership_is_rejected() {
  let s = store().await;
  let person = s.create_person(new_person("alice")).await.unwrap();
  let group = s.create_group(new_group("sewing"), None).await.unwrap();

  s.create_membership(NewMembership {
    person_id: person.person_id,
    group_id:  group.group_id,
    is_admin:  false,
  })
  .await
  .unwrap();

  let err = s
    .create_membership(NewMembership {
      person_id: person.person_id,
      group_id:  group.group_id,
      is_admin:  true,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::AlreadyMember { .. }));
}

#[tokio::test]
async fn demoting_the_last_admin_is_rejected() {
  let s = store().await;
  let admin = s.create_person(new_person("admin")).await.unwrap();
  let member = s.create_person(new_person("member")).await.unwrap();
  let group = s
    .create_group(new_group("sewing"), Some(admin.person_id))
    .await
    .unwrap();
  s.create_membership(NewMembership {
    person_id: member.person_id,
    group_id:  group.group_id,
    is_admin:  false,
  })
  .await
  .unwrap();

  let admin_membership = s
    .list_group_memberships(group.group_id)
    .await
    .unwrap()
    .into_iter()
    .find(|m| m.is_admin)
    .unwrap();

  let err = s
    .set_membership_admin(admin_membership.membership_id, false)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::LastAdmin(id) if id == group.group_id));

  // The flag is untouched.
  let refetched = s
    .get_membership(admin_membership.membership_id)
    .await
    .unwrap()
    .unwrap();
  assert!(refetched.is_admin);
}

#[tokio::test]
async fn demotion_passes_once_a_second_admin_exists() {
  let s = store().await;
  let admin = s.create_person(new_person("admin")).await.unwrap();
  let second = s.create_person(new_person("second")).await.unwrap();
  let group = s
    .create_group(new_group("sewing"), Some(admin.person_id))
    .await
    .unwrap();
  let second_membership = s
    .create_membership(NewMembership {
      person_id: second.person_id,
      group_id:  group.group_id,
      is_admin:  false,
    })
    .await
    .unwrap();

  // Promote the second member, then demote the original admin.
  s.set_membership_admin(second_membership.membership_id, true)
    .await
    .unwrap();

  let original = s
    .list_group_memberships(group.group_id)
    .await
    .unwrap()
    .into_iter()
    .find(|m| m.person_id == admin.person_id)
    .unwrap();
  let demoted = s
    .set_membership_admin(original.membership_id, false)
    .await
    .unwrap();
  assert!(!demoted.is_admin);

  let admins = s.group_admin_person_ids(group.group_id).await.unwrap();
  assert_eq!(admins, vec![second.person_id]);
}

#[tokio::test]
async fn removing_the_last_admin_of_a_populated_group_is_rejected() {
  let s = store().await;
  let admin = s.create_person(new_person("admin")).await.unwrap();
  let member = s.create_person(new_person("member")).await.unwrap();
  let group = s
    .create_group(new_group("sewing"), Some(admin.person_id))
    .await
    .unwrap();
  s.create_membership(NewMembership {
    person_id: member.person_id,
    group_id:  group.group_id,
    is_admin:  false,
  })
  .await
  .unwrap();

  let admin_membership = s
    .list_group_memberships(group.group_id)
    .await
    .unwrap()
    .into_iter()
    .find(|m| m.is_admin)
    .unwrap();

  let err = s
    .delete_membership(admin_membership.membership_id)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::LastAdmin(_)));
}

#[tokio::test]
async fn a_sole_member_admin_may_leave_their_group() {
  let s = store().await;
  let admin = s.create_person(new_person("admin")).await.unwrap();
  let group = s
    .create_group(new_group("sewing"), Some(admin.person_id))
    .await
    .unwrap();

  let membership = s
    .list_group_memberships(group.group_id)
    .await
    .unwrap()
    .remove(0);
  s.delete_membership(membership.membership_id).await.unwrap();

  assert!(s.list_group_memberships(group.group_id).await.unwrap().is_empty());
  assert!(s.get_membership(membership.membership_id).await.unwrap().is_none());
}

// ─── Claims ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn redeeming_a_claim_assigns_the_person_to_the_user() {
  let s = store().await;
  let issuer = seed_user(&s, "admin@example.com").await;
  let redeemer = seed_user(&s, "alice@example.com").await;
  let person = s.create_person(new_person("alice")).await.unwrap();
  assert!(person.user_id.is_none());

  let claim = s
    .create_claim(
      person.person_id,
      "claim-hash".into(),
      issuer.user_id,
      Utc::now() + Duration::days(14),
    )
    .await
    .unwrap();

  let claimed = s
    .redeem_claim(claim.claim_id, redeemer.user_id, Utc::now())
    .await
    .unwrap();
  assert_eq!(claimed.user_id, Some(redeemer.user_id));

  let stored = s
    .get_claim_by_token_hash("claim-hash".into())
    .await
    .unwrap()
    .unwrap();
  assert!(stored.redeemed_at.is_some());
  assert_eq!(stored.redeemed_by_user_id, Some(redeemer.user_id));

  let owned = s.list_owned_persons(redeemer.user_id).await.unwrap();
  assert_eq!(owned.len(), 1);
  assert_eq!(owned[0].person_id, person.person_id);
}

#[tokio::test]
async fn a_claim_redeems_only_once() {
  let s = store().await;
  let issuer = seed_user(&s, "admin@example.com").await;
  let redeemer = seed_user(&s, "alice@example.com").await;
  let person = s.create_person(new_person("alice")).await.unwrap();

  let claim = s
    .create_claim(
      person.person_id,
      "claim-hash".into(),
      issuer.user_id,
      Utc::now() + Duration::days(14),
    )
    .await
    .unwrap();
  s.redeem_claim(claim.claim_id, redeemer.user_id, Utc::now())
    .await
    .unwrap();

  let err = s
    .redeem_claim(claim.claim_id, redeemer.user_id, Utc::now())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ClaimAlreadyRedeemed(_)));
}

#[tokio::test]
async fn an_expired_claim_cannot_be_redeemed() {
  let s = store().await;
  let issuer = seed_user(&s, "admin@example.com").await;
  let redeemer = seed_user(&s, "alice@example.com").await;
  let person = s.create_person(new_person("alice")).await.unwrap();

  let claim = s
    .create_claim(
      person.person_id,
      "claim-hash".into(),
      issuer.user_id,
      Utc::now() - Duration::hours(1),
    )
    .await
    .unwrap();

  let err = s
    .redeem_claim(claim.claim_id, redeemer.user_id, Utc::now())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ClaimExpired(_)));

  // The person stays unclaimed.
  let person = s.get_person(person.person_id).await.unwrap().unwrap();
  assert!(person.user_id.is_none());
}

// ─── Audit ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn audit_entries_list_newest_first() {
  let s = store().await;
  let user = seed_user(&s, "admin@example.com").await;

  s.record_audit(grange_core::audit::NewAuditEntry::new(
    user.user_id,
    "group.create",
  ))
  .await
  .unwrap();
  s.record_audit(
    grange_core::audit::NewAuditEntry::new(user.user_id, "membership.delete")
      .entity(42)
      .detail(serde_json::json!({ "group_id": 7 })),
  )
  .await
  .unwrap();

  let entries = s.list_audit(10, 0).await.unwrap();
  assert_eq!(entries.len(), 2);
  assert_eq!(entries[0].action, "membership.delete");
  assert_eq!(entries[0].entity_id, Some(42));
  assert_eq!(
    entries[0].detail,
    Some(serde_json::json!({ "group_id": 7 }))
  );
  assert_eq!(entries[1].action, "group.create");
}
