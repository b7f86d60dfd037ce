//! Invite issuance and acceptance, including the best-effort steps that
//! follow a successful lookup.

use chrono::{Duration, Utc};

use sealvault::store::MemoryStore;
use sealvault::{
    DetachReason, MembershipLink, NewInvite, PayloadField, Pagination, VaultError,
};
use sealvault_testkit::{init_tracing, wrapped_for, FaultPoint, FaultyStore, TestFixture};

fn invite_input(org: &str) -> NewInvite {
    NewInvite {
        from_email: "admin@acme.test".to_string(),
        to_email: "bob@acme.test".to_string(),
        organization_id: org.to_string(),
        expires_at: Some(Utc::now() + Duration::days(7)),
        wrapped_key: wrapped_for("bob@acme.test"),
    }
}

#[tokio::test]
async fn presence_checks_run_in_order() {
    let fixture = TestFixture::new();
    let org = fixture.organization("Acme", "admin@acme.test").await;
    let org_id = org.organization.id.to_hex();

    let mut all_missing = invite_input("");
    all_missing.from_email.clear();
    all_missing.to_email.clear();
    all_missing.expires_at = None;
    let err = fixture.vault.send_invite(all_missing).await.unwrap_err();
    assert_eq!(err, VaultError::InvalidPayload(PayloadField::Sender));

    let mut no_org = invite_input(" ");
    no_org.to_email.clear();
    let err = fixture.vault.send_invite(no_org).await.unwrap_err();
    assert_eq!(err, VaultError::InvalidPayload(PayloadField::OrganizationId));

    let mut no_recipient = invite_input(&org_id);
    no_recipient.to_email.clear();
    no_recipient.expires_at = None;
    let err = fixture.vault.send_invite(no_recipient).await.unwrap_err();
    assert_eq!(err, VaultError::InvalidPayload(PayloadField::Recipient));

    let mut epoch = invite_input(&org_id);
    epoch.expires_at = chrono::DateTime::from_timestamp(0, 0);
    let err = fixture.vault.send_invite(epoch).await.unwrap_err();
    assert_eq!(err.code(), "invite/invalid-expiry");

    let mut bad_org = invite_input("not-an-id");
    bad_org.to_email = "Bob@Acme.test".to_string();
    let err = fixture.vault.send_invite(bad_org).await.unwrap_err();
    assert_eq!(err.code(), "data/invalid-id");
}

#[tokio::test]
async fn expired_invite_cannot_be_accepted() {
    let fixture = TestFixture::new();
    let org = fixture.organization("Acme", "admin@acme.test").await;
    fixture.user("bob@acme.test").await;

    let invite = fixture
        .invite(&org.organization.id, "bob@acme.test", Duration::seconds(-1))
        .await;
    let err = fixture
        .vault
        .accept_invite(&invite.id.to_hex())
        .await
        .unwrap_err();
    assert_eq!(err, VaultError::InviteNotFound);

    // Still listed for the organization, just not as active.
    let all = fixture
        .vault
        .list_invites_by_organization(&org.organization.id.to_hex(), Pagination::default(), false)
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    let active = fixture
        .vault
        .list_invites_by_organization(&org.organization.id.to_hex(), Pagination::default(), true)
        .await
        .unwrap();
    assert!(active.is_empty());
}

#[tokio::test]
async fn accept_attaches_membership_and_consumes_invite() {
    let fixture = TestFixture::new();
    let org = fixture.organization("Acme", "admin@acme.test").await;
    fixture.user("bob@acme.test").await;

    let invite = fixture
        .invite(&org.organization.id, "Bob@Acme.test", Duration::hours(1))
        .await;
    let accepted = fixture
        .vault
        .accept_invite(&invite.id.to_hex())
        .await
        .unwrap();
    assert_eq!(accepted.invite.id, invite.id);
    assert_eq!(accepted.membership, MembershipLink::Attached);

    let bob = fixture
        .vault
        .find_user_by_email("bob@acme.test")
        .await
        .unwrap();
    let membership = bob.membership(&org.organization.id).unwrap();
    assert!(!membership.is_admin);
    assert_eq!(membership.wrapped_org_key, invite.wrapped_key);

    let err = fixture
        .vault
        .accept_invite(&invite.id.to_hex())
        .await
        .unwrap_err();
    assert_eq!(err, VaultError::InviteNotFound);
}

#[tokio::test]
async fn accept_succeeds_when_membership_append_fails() {
    init_tracing();
    let fixture = TestFixture::with_store(FaultyStore::new(MemoryStore::new()));
    let org = fixture.organization("Acme", "admin@acme.test").await;
    fixture.user("bob@acme.test").await;
    let invite = fixture
        .invite(&org.organization.id, "bob@acme.test", Duration::hours(1))
        .await;

    fixture.store().fail(FaultPoint::PushMembership);
    let accepted = fixture
        .vault
        .accept_invite(&invite.id.to_hex())
        .await
        .unwrap();
    assert_eq!(
        accepted.membership,
        MembershipLink::Detached {
            reason: DetachReason::StoreFailure
        }
    );

    let bob = fixture
        .vault
        .find_user_by_email("bob@acme.test")
        .await
        .unwrap();
    assert!(!bob.is_member_of(&org.organization.id));
}

#[tokio::test]
async fn accept_for_unregistered_recipient_is_detached() {
    let fixture = TestFixture::new();
    let org = fixture.organization("Acme", "admin@acme.test").await;
    let invite = fixture
        .invite(&org.organization.id, "nobody@acme.test", Duration::hours(1))
        .await;

    let accepted = fixture
        .vault
        .accept_invite(&invite.id.to_hex())
        .await
        .unwrap();
    assert_eq!(
        accepted.membership,
        MembershipLink::Detached {
            reason: DetachReason::UserNotFound
        }
    );
    assert!(!accepted.membership.is_linked());
}

#[tokio::test]
async fn accept_succeeds_when_invite_deletion_fails() {
    init_tracing();
    let fixture = TestFixture::with_store(FaultyStore::new(MemoryStore::new()));
    let org = fixture.organization("Acme", "admin@acme.test").await;
    fixture.user("bob@acme.test").await;
    let invite = fixture
        .invite(&org.organization.id, "bob@acme.test", Duration::hours(1))
        .await;

    fixture.store().fail(FaultPoint::DeleteInvite);
    let accepted = fixture
        .vault
        .accept_invite(&invite.id.to_hex())
        .await
        .unwrap();
    assert_eq!(accepted.membership, MembershipLink::Attached);
    assert_eq!(fixture.store().injected(), 1);

    // The invite lingers; accepting again leaves a single membership.
    fixture.store().heal(FaultPoint::DeleteInvite);
    let again = fixture
        .vault
        .accept_invite(&invite.id.to_hex())
        .await
        .unwrap();
    assert_eq!(again.membership, MembershipLink::AlreadyPresent);

    let bob = fixture
        .vault
        .find_user_by_email("bob@acme.test")
        .await
        .unwrap();
    assert_eq!(bob.memberships.len(), 1);
}

#[tokio::test]
async fn listing_never_deletes() {
    let fixture = TestFixture::new();
    let org = fixture.organization("Acme", "admin@acme.test").await;
    let org_id = org.organization.id;
    for to in ["bob@acme.test", "carol@acme.test"] {
        fixture.invite(&org_id, to, Duration::hours(1)).await;
    }
    fixture
        .invite(&org_id, "bob@acme.test", Duration::hours(-1))
        .await;

    for _ in 0..2 {
        let listed = fixture
            .vault
            .list_invites_by_organization(&org_id.to_hex(), Pagination::default(), false)
            .await
            .unwrap();
        assert_eq!(listed.len(), 3);
    }

    let bobs = fixture
        .vault
        .list_invites_for_user("BOB@acme.test", Pagination::default(), false)
        .await
        .unwrap();
    assert_eq!(bobs.len(), 2);
    assert!(bobs[0].created_at >= bobs[1].created_at);

    let active = fixture
        .vault
        .list_invites_for_user("bob@acme.test", Pagination::default(), true)
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn revoked_invite_is_gone() {
    let fixture = TestFixture::new();
    let org = fixture.organization("Acme", "admin@acme.test").await;
    let invite = fixture
        .invite(&org.organization.id, "bob@acme.test", Duration::hours(1))
        .await;

    assert_eq!(fixture.vault.delete_invite(&invite.id.to_hex()).await.unwrap(), 1);
    assert_eq!(fixture.vault.delete_invite(&invite.id.to_hex()).await.unwrap(), 0);
    assert_eq!(
        fixture
            .vault
            .accept_invite(&invite.id.to_hex())
            .await
            .unwrap_err(),
        VaultError::InviteNotFound
    );
}
