//! Effective-permission resolution and cache-invalidation behavior.

mod common;

use common::{harness, seed_permission, seed_role, seed_tenant, seed_user};
use std::collections::HashSet;

fn set_of(codes: &[&str]) -> HashSet<String> {
    codes.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn resolve_unions_role_and_direct_grants() {
    let h = harness();
    let tenant = seed_tenant(&h.store, false).await;
    let user = seed_user(&h.store, tenant.tenant_id, "ada@acme.test", "pw").await;

    let role_a = seed_role(&h.store, tenant.tenant_id, "Reader").await;
    let catalog_read = seed_permission(&h.store, tenant.tenant_id, "Catalog", "Read").await;
    let orders_write = seed_permission(&h.store, tenant.tenant_id, "Orders", "Write").await;

    h.store
        .grant_role_permission(role_a.role_id, catalog_read.perm_id)
        .await;
    h.store.assign_role(user.user_id, role_a.role_id).await;
    h.store
        .grant_user_permission(user.user_id, orders_write.perm_id)
        .await;

    let resolved = h
        .permissions
        .resolve(user.user_id, tenant.tenant_id, None)
        .await
        .unwrap();
    assert_eq!(resolved, set_of(&["Catalog.Read", "Orders.Write"]));

    // Removing the role and invalidating leaves only the direct grant.
    h.store
        .remove_role_assignment(user.user_id, role_a.role_id)
        .await;
    h.permissions
        .invalidate(user.user_id, tenant.tenant_id)
        .await
        .unwrap();

    let resolved = h
        .permissions
        .resolve(user.user_id, tenant.tenant_id, None)
        .await
        .unwrap();
    assert_eq!(resolved, set_of(&["Orders.Write"]));
}

#[tokio::test]
async fn resolve_deduplicates_overlapping_grants() {
    let h = harness();
    let tenant = seed_tenant(&h.store, false).await;
    let user = seed_user(&h.store, tenant.tenant_id, "ada@acme.test", "pw").await;

    let role = seed_role(&h.store, tenant.tenant_id, "Reader").await;
    let catalog_read = seed_permission(&h.store, tenant.tenant_id, "Catalog", "Read").await;

    // Same permission reachable through the role and as a direct grant.
    h.store
        .grant_role_permission(role.role_id, catalog_read.perm_id)
        .await;
    h.store.assign_role(user.user_id, role.role_id).await;
    h.store
        .grant_user_permission(user.user_id, catalog_read.perm_id)
        .await;

    let resolved = h
        .permissions
        .resolve(user.user_id, tenant.tenant_id, None)
        .await
        .unwrap();
    assert_eq!(resolved, set_of(&["Catalog.Read"]));
}

#[tokio::test]
async fn module_scoped_resolution_filters_the_set() {
    let h = harness();
    let tenant = seed_tenant(&h.store, false).await;
    let user = seed_user(&h.store, tenant.tenant_id, "ada@acme.test", "pw").await;

    for (module, action) in [("Catalog", "Read"), ("Catalog", "Write"), ("Orders", "Read")] {
        let perm = seed_permission(&h.store, tenant.tenant_id, module, action).await;
        h.store.grant_user_permission(user.user_id, perm.perm_id).await;
    }

    let catalog_only = h
        .permissions
        .resolve(user.user_id, tenant.tenant_id, Some("Catalog"))
        .await
        .unwrap();
    assert_eq!(catalog_only, set_of(&["Catalog.Read", "Catalog.Write"]));

    // The module filter applies to cached entries too.
    let orders_only = h
        .permissions
        .resolve(user.user_id, tenant.tenant_id, Some("Orders"))
        .await
        .unwrap();
    assert_eq!(orders_only, set_of(&["Orders.Read"]));
}

#[tokio::test]
async fn invalidate_then_resolve_is_never_stale() {
    let h = harness();
    let tenant = seed_tenant(&h.store, false).await;
    let user = seed_user(&h.store, tenant.tenant_id, "ada@acme.test", "pw").await;

    let catalog_read = seed_permission(&h.store, tenant.tenant_id, "Catalog", "Read").await;
    h.store
        .grant_user_permission(user.user_id, catalog_read.perm_id)
        .await;

    // Populate the cache.
    let before = h
        .permissions
        .resolve(user.user_id, tenant.tenant_id, None)
        .await
        .unwrap();
    assert_eq!(before, set_of(&["Catalog.Read"]));

    // Mutate the source of truth behind the cache's back.
    let orders_write = seed_permission(&h.store, tenant.tenant_id, "Orders", "Write").await;
    h.store
        .grant_user_permission(user.user_id, orders_write.perm_id)
        .await;

    // Without invalidation the memoized set is still served.
    let cached = h
        .permissions
        .resolve(user.user_id, tenant.tenant_id, None)
        .await
        .unwrap();
    assert_eq!(cached, set_of(&["Catalog.Read"]));

    // Invalidate-then-resolve always sees the post-mutation state.
    h.permissions
        .invalidate(user.user_id, tenant.tenant_id)
        .await
        .unwrap();
    let fresh = h
        .permissions
        .resolve(user.user_id, tenant.tenant_id, None)
        .await
        .unwrap();
    assert_eq!(fresh, set_of(&["Catalog.Read", "Orders.Write"]));
}

#[tokio::test]
async fn invalidate_is_idempotent() {
    let h = harness();
    let tenant = seed_tenant(&h.store, false).await;
    let user = seed_user(&h.store, tenant.tenant_id, "ada@acme.test", "pw").await;

    h.permissions
        .invalidate(user.user_id, tenant.tenant_id)
        .await
        .unwrap();
    h.permissions
        .invalidate(user.user_id, tenant.tenant_id)
        .await
        .unwrap();
}

#[tokio::test]
async fn cache_outage_falls_open_to_direct_computation() {
    let h = harness();
    let tenant = seed_tenant(&h.store, false).await;
    let user = seed_user(&h.store, tenant.tenant_id, "ada@acme.test", "pw").await;

    let catalog_read = seed_permission(&h.store, tenant.tenant_id, "Catalog", "Read").await;
    h.store
        .grant_user_permission(user.user_id, catalog_read.perm_id)
        .await;

    h.cache.set_failing(true);

    let resolved = h
        .permissions
        .resolve(user.user_id, tenant.tenant_id, None)
        .await
        .unwrap();
    assert_eq!(resolved, set_of(&["Catalog.Read"]));
}

#[tokio::test]
async fn invalidation_failure_does_not_block_the_mutation() {
    let h = harness();
    let tenant = seed_tenant(&h.store, false).await;
    let user = seed_user(&h.store, tenant.tenant_id, "ada@acme.test", "pw").await;

    h.cache.set_failing(true);

    assert!(h
        .permissions
        .invalidate(user.user_id, tenant.tenant_id)
        .await
        .is_ok());
}

#[tokio::test]
async fn role_permission_change_fans_out_to_all_holders() {
    let h = harness();
    let tenant = seed_tenant(&h.store, false).await;
    let ada = seed_user(&h.store, tenant.tenant_id, "ada@acme.test", "pw").await;
    let ben = seed_user(&h.store, tenant.tenant_id, "ben@acme.test", "pw").await;

    let role = seed_role(&h.store, tenant.tenant_id, "Reader").await;
    let catalog_read = seed_permission(&h.store, tenant.tenant_id, "Catalog", "Read").await;
    h.store
        .grant_role_permission(role.role_id, catalog_read.perm_id)
        .await;
    h.store.assign_role(ada.user_id, role.role_id).await;
    h.store.assign_role(ben.user_id, role.role_id).await;

    // Warm both cache entries.
    for user_id in [ada.user_id, ben.user_id] {
        let resolved = h
            .permissions
            .resolve(user_id, tenant.tenant_id, None)
            .await
            .unwrap();
        assert_eq!(resolved, set_of(&["Catalog.Read"]));
    }

    // The role loses its permission; fan-out invalidation reaches every
    // holder.
    h.store
        .revoke_role_permission(role.role_id, catalog_read.perm_id)
        .await;
    h.permissions.invalidate_role(role.role_id).await.unwrap();

    for user_id in [ada.user_id, ben.user_id] {
        let resolved = h
            .permissions
            .resolve(user_id, tenant.tenant_id, None)
            .await
            .unwrap();
        assert!(resolved.is_empty());
    }
}
