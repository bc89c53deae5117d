//! Brute-force lockout behavior under the per-tenant policy
//! (max 5 consecutive failures, 15-minute lockout in these fixtures).

mod common;

use chrono::{Duration, Utc};
use common::{harness, seed_tenant, seed_user};
use identity_core::services::{IdentityStore, ServiceError};

#[tokio::test]
async fn five_failures_lock_even_against_the_correct_credential() {
    let h = harness();
    let tenant = seed_tenant(&h.store, true).await;
    let user = seed_user(&h.store, tenant.tenant_id, "ada@acme.test", "right-pw").await;

    for _ in 0..5 {
        let err = h
            .sessions
            .authenticate(tenant.tenant_id, "ada@acme.test", "wrong-pw", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials));
    }

    // Attempt 6 presents the right password but the account is locked.
    let err = h
        .sessions
        .authenticate(tenant.tenant_id, "ada@acme.test", "right-pw", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AccountLocked));

    let locked = h.store.find_user_by_id(user.user_id).await.unwrap().unwrap();
    assert_eq!(locked.failed_attempt_count, 5);
    assert!(locked.lockout_expiry_utc.unwrap() > Utc::now());
}

#[tokio::test]
async fn elapsed_lockout_allows_success_and_resets_the_counter() {
    let h = harness();
    let tenant = seed_tenant(&h.store, true).await;
    let user = seed_user(&h.store, tenant.tenant_id, "ada@acme.test", "right-pw").await;

    for _ in 0..5 {
        let _ = h
            .sessions
            .authenticate(tenant.tenant_id, "ada@acme.test", "wrong-pw", None, None)
            .await;
    }

    // Simulate the lockout window elapsing.
    h.store
        .set_lockout_expiry(user.user_id, Some(Utc::now() - Duration::seconds(1)))
        .await;

    let tokens = h
        .sessions
        .authenticate(tenant.tenant_id, "ada@acme.test", "right-pw", None, None)
        .await
        .unwrap();
    assert!(!tokens.access_token.is_empty());

    let reset = h.store.find_user_by_id(user.user_id).await.unwrap().unwrap();
    assert_eq!(reset.failed_attempt_count, 0);
    assert!(reset.lockout_expiry_utc.is_none());
    assert!(reset.last_auth_utc.is_some());
}

#[tokio::test]
async fn disabled_policy_never_locks() {
    let h = harness();
    let mut tenant = seed_tenant(&h.store, false).await;
    tenant.lockout_max_attempts = 2;
    h.store.insert_tenant(tenant.clone()).await;
    seed_user(&h.store, tenant.tenant_id, "ada@acme.test", "right-pw").await;

    for _ in 0..10 {
        let err = h
            .sessions
            .authenticate(tenant.tenant_id, "ada@acme.test", "wrong-pw", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials));
    }

    assert!(h
        .sessions
        .authenticate(tenant.tenant_id, "ada@acme.test", "right-pw", None, None)
        .await
        .is_ok());
}

#[tokio::test]
async fn success_resets_the_failure_streak() {
    let h = harness();
    let tenant = seed_tenant(&h.store, true).await;
    let user = seed_user(&h.store, tenant.tenant_id, "ada@acme.test", "right-pw").await;

    for _ in 0..3 {
        let _ = h
            .sessions
            .authenticate(tenant.tenant_id, "ada@acme.test", "wrong-pw", None, None)
            .await;
    }

    assert!(h
        .sessions
        .authenticate(tenant.tenant_id, "ada@acme.test", "right-pw", None, None)
        .await
        .is_ok());

    let reset = h.store.find_user_by_id(user.user_id).await.unwrap().unwrap();
    assert_eq!(reset.failed_attempt_count, 0);

    // The streak starts over: four more failures stay below the threshold.
    for _ in 0..4 {
        let err = h
            .sessions
            .authenticate(tenant.tenant_id, "ada@acme.test", "wrong-pw", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials));
    }

    // The fifth consecutive failure arms the lock.
    let _ = h
        .sessions
        .authenticate(tenant.tenant_id, "ada@acme.test", "wrong-pw", None, None)
        .await;
    let err = h
        .sessions
        .authenticate(tenant.tenant_id, "ada@acme.test", "right-pw", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AccountLocked));
}

#[tokio::test]
async fn unknown_principal_reports_invalid_credentials() {
    let h = harness();
    let tenant = seed_tenant(&h.store, true).await;

    let err = h
        .sessions
        .authenticate(tenant.tenant_id, "ghost@acme.test", "pw", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidCredentials));
}
