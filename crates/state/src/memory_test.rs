//! Tests for the in-memory reference store

use super::*;
use ripple_protocol::HealthStatus;

fn token_with_links() -> AclToken {
    AclToken::new("acc-1", "sec-1")
        .with_policy("pol-a")
        .with_role("role-b")
}

// ============================================================================
// Table and index tests
// ============================================================================

#[tokio::test]
async fn test_commit_advances_index() {
    let store = MemoryState::new();
    assert_eq!(store.index(), 0);

    let index = store.set_acl_token(token_with_links()).await.unwrap();
    assert_eq!(index, 1);

    let index = store
        .set_acl_policy(AclPolicy::new("pol-a", "policy-a"))
        .await
        .unwrap();
    assert_eq!(index, 2);
    assert_eq!(store.index(), 2);
}

#[tokio::test]
async fn test_set_and_delete_token() {
    let store = MemoryState::new();

    store.set_acl_token(token_with_links()).await.unwrap();
    assert!(store.acl_token("acc-1").is_some());

    store.delete_acl_token("acc-1").await.unwrap();
    assert!(store.acl_token("acc-1").is_none());

    // Deleting a missing token is a no-op and does not advance the index.
    let index = store.index();
    assert_eq!(store.delete_acl_token("acc-1").await.unwrap(), index);
}

#[tokio::test]
async fn test_service_registration() {
    let store = MemoryState::new();

    store
        .register_service(ServiceInstance::new("node1", "web").with_address("10.0.0.1", 80))
        .await
        .unwrap();
    store
        .register_service(ServiceInstance::new("node2", "web"))
        .await
        .unwrap();
    store
        .register_service(ServiceInstance::new("node1", "db"))
        .await
        .unwrap();

    assert_eq!(store.service_instances("web").len(), 2);
    assert_eq!(store.service_instances("db").len(), 1);

    store.deregister_service("node1", "web").await.unwrap();
    assert_eq!(store.service_instances("web").len(), 1);
}

#[tokio::test]
async fn test_register_updates_existing_instance() {
    let store = MemoryState::new();

    store
        .register_service(ServiceInstance::new("node1", "web"))
        .await
        .unwrap();
    store
        .register_service(ServiceInstance::new("node1", "web").with_status(HealthStatus::Critical))
        .await
        .unwrap();

    let instances = store.service_instances("web");
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].status, HealthStatus::Critical);
}

// ============================================================================
// View tests
// ============================================================================

#[tokio::test]
async fn test_view_is_point_in_time() {
    let store = MemoryState::new();
    store.set_acl_token(token_with_links()).await.unwrap();

    let view = store.view();
    store.delete_acl_token("acc-1").await.unwrap();

    // The view still sees the token that was live when it was taken.
    let tokens = view.tokens_linked_to_policy("pol-a").unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].secret_id, "sec-1");
}

#[tokio::test]
async fn test_view_relation_queries() {
    let store = MemoryState::new();
    store.set_acl_token(token_with_links()).await.unwrap();
    store
        .set_acl_token(AclToken::new("acc-2", "sec-2").with_policy("pol-c"))
        .await
        .unwrap();
    store
        .set_acl_role(AclRole::new("role-b", "ops").with_policy("pol-b"))
        .await
        .unwrap();

    let view = store.view();

    let direct = view.tokens_linked_to_policy("pol-a").unwrap();
    assert_eq!(direct.len(), 1);
    assert_eq!(direct[0].accessor_id, "acc-1");

    let roles = view.roles_linked_to_policy("pol-b").unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].id, "role-b");

    let via_role = view.tokens_linked_to_role("role-b").unwrap();
    assert_eq!(via_role.len(), 1);
    assert_eq!(via_role[0].accessor_id, "acc-1");

    assert!(view.tokens_linked_to_policy("pol-x").unwrap().is_empty());
    assert!(view.tokens_linked_to_role("role-x").unwrap().is_empty());
}

// ============================================================================
// Change production tests
// ============================================================================

#[test]
fn test_service_health_events_keyed_by_service() {
    let changes = vec![
        Change::Service {
            op: ChangeOp::Create,
            instance: ServiceInstance::new("node1", "web"),
        },
        Change::AclToken {
            op: ChangeOp::Create,
            token: AclToken::new("acc-1", "sec-1"),
        },
    ];

    let events = service_health_events(5, &changes);

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].topic, Topic::ServiceHealth);
    assert_eq!(events[0].key, "web");
    assert_eq!(events[0].index, 5);
}
