//! In-memory reference state store
//!
//! `MemoryState` is a small transactional store backing the end-to-end tests
//! and serving as the reference for embedding the publisher: typed ACL and
//! service tables behind a lock, a monotonic commit index, and a commit path
//! that applies changes and forwards them - together with a point-in-time
//! `StateView` - to a bound publisher.
//!
//! Production embedders replace this with their own store; the publisher only
//! ever sees the `StateView` trait and the registry callbacks.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use ripple_protocol::{AclPolicy, AclRole, AclToken, Change, ChangeOp, ServiceInstance};
use ripple_stream::{Event, EventBuffer, Payload, SubscribeRequest, Topic};

use crate::error::Result;
use crate::publisher::EventPublisher;
use crate::registry::TopicRegistry;
use crate::view::StateView;

#[derive(Debug, Clone, Default)]
struct Tables {
    /// ACL tokens by accessor ID.
    tokens: HashMap<String, AclToken>,
    /// ACL policies by ID.
    policies: HashMap<String, AclPolicy>,
    /// ACL roles by ID.
    roles: HashMap<String, AclRole>,
    /// Service instances by (node, instance ID).
    services: HashMap<(String, String), ServiceInstance>,
}

/// In-memory transactional store with publisher forwarding.
pub struct MemoryState {
    tables: RwLock<Tables>,
    /// Monotonic commit index. Only advanced while holding the table lock,
    /// so a view taken under the read lock is consistent at the index it
    /// reads.
    index: AtomicU64,
    publisher: RwLock<Option<Arc<EventPublisher>>>,
}

impl MemoryState {
    /// Create an empty store.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tables: RwLock::new(Tables::default()),
            index: AtomicU64::new(0),
            publisher: RwLock::new(None),
        })
    }

    /// Forward every commit to `publisher` from now on.
    pub fn bind_publisher(&self, publisher: Arc<EventPublisher>) {
        *self.publisher.write() = Some(publisher);
    }

    /// The topic registry for a publisher backed by this store: built-in ACL
    /// change processing plus the service-health snapshot and change
    /// processor bound to the store.
    pub fn registry(self: &Arc<Self>) -> TopicRegistry {
        let mut registry = TopicRegistry::with_defaults();

        let store = Arc::clone(self);
        registry.register_snapshot(
            Topic::ServiceHealth,
            Arc::new(move |req: &SubscribeRequest, buf: &EventBuffer| {
                store.service_health_snapshot(req, buf)
            }),
        );
        registry.register_change_processor(
            Topic::ServiceHealth,
            Arc::new(|_view: &dyn StateView, index: u64, changes: &[Change]| {
                Ok(service_health_events(index, changes))
            }),
        );

        registry
    }

    /// Current commit index.
    pub fn index(&self) -> u64 {
        self.index.load(Ordering::SeqCst)
    }

    /// A point-in-time read view of the store.
    pub fn view(&self) -> MemoryView {
        MemoryView {
            tables: self.tables.read().clone(),
        }
    }

    /// Look up a token by accessor ID.
    pub fn acl_token(&self, accessor_id: &str) -> Option<AclToken> {
        self.tables.read().tokens.get(accessor_id).cloned()
    }

    /// Instances of `service`, across all nodes.
    pub fn service_instances(&self, service: &str) -> Vec<ServiceInstance> {
        self.tables
            .read()
            .services
            .values()
            .filter(|instance| instance.service == service)
            .cloned()
            .collect()
    }

    /// Create or update an ACL token.
    pub async fn set_acl_token(&self, token: AclToken) -> Result<u64> {
        let op = if self.tables.read().tokens.contains_key(&token.accessor_id) {
            ChangeOp::Update
        } else {
            ChangeOp::Create
        };
        self.commit(vec![Change::AclToken { op, token }]).await
    }

    /// Delete an ACL token by accessor ID. A missing token is a no-op.
    pub async fn delete_acl_token(&self, accessor_id: &str) -> Result<u64> {
        let Some(token) = self.tables.read().tokens.get(accessor_id).cloned() else {
            return Ok(self.index());
        };
        self.commit(vec![Change::AclToken {
            op: ChangeOp::Delete,
            token,
        }])
        .await
    }

    /// Create or update an ACL policy.
    pub async fn set_acl_policy(&self, policy: AclPolicy) -> Result<u64> {
        let op = if self.tables.read().policies.contains_key(&policy.id) {
            ChangeOp::Update
        } else {
            ChangeOp::Create
        };
        self.commit(vec![Change::AclPolicy { op, policy }]).await
    }

    /// Delete an ACL policy by ID. A missing policy is a no-op.
    pub async fn delete_acl_policy(&self, policy_id: &str) -> Result<u64> {
        let Some(policy) = self.tables.read().policies.get(policy_id).cloned() else {
            return Ok(self.index());
        };
        self.commit(vec![Change::AclPolicy {
            op: ChangeOp::Delete,
            policy,
        }])
        .await
    }

    /// Create or update an ACL role.
    pub async fn set_acl_role(&self, role: AclRole) -> Result<u64> {
        let op = if self.tables.read().roles.contains_key(&role.id) {
            ChangeOp::Update
        } else {
            ChangeOp::Create
        };
        self.commit(vec![Change::AclRole { op, role }]).await
    }

    /// Delete an ACL role by ID. A missing role is a no-op.
    pub async fn delete_acl_role(&self, role_id: &str) -> Result<u64> {
        let Some(role) = self.tables.read().roles.get(role_id).cloned() else {
            return Ok(self.index());
        };
        self.commit(vec![Change::AclRole {
            op: ChangeOp::Delete,
            role,
        }])
        .await
    }

    /// Register or update a service instance.
    pub async fn register_service(&self, instance: ServiceInstance) -> Result<u64> {
        let key = (instance.node.clone(), instance.id.clone());
        let op = if self.tables.read().services.contains_key(&key) {
            ChangeOp::Update
        } else {
            ChangeOp::Create
        };
        self.commit(vec![Change::Service { op, instance }]).await
    }

    /// Deregister a service instance. A missing instance is a no-op.
    pub async fn deregister_service(&self, node: &str, id: &str) -> Result<u64> {
        let key = (node.to_string(), id.to_string());
        let Some(instance) = self.tables.read().services.get(&key).cloned() else {
            return Ok(self.index());
        };
        self.commit(vec![Change::Service {
            op: ChangeOp::Delete,
            instance,
        }])
        .await
    }

    /// Apply one commit: bump the index, mutate the tables, and forward the
    /// change set with a post-commit view to the bound publisher.
    async fn commit(&self, changes: Vec<Change>) -> Result<u64> {
        let (index, view) = {
            let mut tables = self.tables.write();
            for change in &changes {
                apply_change(&mut tables, change);
            }
            let index = self.index.fetch_add(1, Ordering::SeqCst) + 1;
            (
                index,
                MemoryView {
                    tables: tables.clone(),
                },
            )
        };

        let publisher = self.publisher.read().clone();
        if let Some(publisher) = publisher {
            publisher
                .publish_changes(Box::new(view), index, &changes)
                .await?;
        }

        Ok(index)
    }

    /// Snapshot function for the service-health topic: one event per
    /// instance matching the request's key filter, consistent at the current
    /// commit index.
    fn service_health_snapshot(
        &self,
        req: &SubscribeRequest,
        buf: &EventBuffer,
    ) -> ripple_stream::Result<u64> {
        let tables = self.tables.read();
        // The index only moves under the table lock, so this pairing is
        // consistent.
        let index = self.index();

        for instance in tables.services.values() {
            if !req.key.is_empty() && instance.service != req.key {
                continue;
            }
            buf.append(vec![Event {
                topic: Topic::ServiceHealth,
                key: instance.service.clone(),
                index,
                payload: Payload::ServiceHealth {
                    op: ChangeOp::Create,
                    instance: instance.clone(),
                },
            }]);
        }

        Ok(index)
    }
}

fn apply_change(tables: &mut Tables, change: &Change) {
    match change {
        Change::AclToken { op, token } => match op {
            ChangeOp::Delete => {
                tables.tokens.remove(&token.accessor_id);
            }
            _ => {
                tables
                    .tokens
                    .insert(token.accessor_id.clone(), token.clone());
            }
        },
        Change::AclPolicy { op, policy } => match op {
            ChangeOp::Delete => {
                tables.policies.remove(&policy.id);
            }
            _ => {
                tables.policies.insert(policy.id.clone(), policy.clone());
            }
        },
        Change::AclRole { op, role } => match op {
            ChangeOp::Delete => {
                tables.roles.remove(&role.id);
            }
            _ => {
                tables.roles.insert(role.id.clone(), role.clone());
            }
        },
        Change::Service { op, instance } => {
            let key = (instance.node.clone(), instance.id.clone());
            match op {
                ChangeOp::Delete => {
                    tables.services.remove(&key);
                }
                _ => {
                    tables.services.insert(key, instance.clone());
                }
            }
        }
    }
}

/// Change processor for the service-health topic.
fn service_health_events(index: u64, changes: &[Change]) -> Vec<Event> {
    changes
        .iter()
        .filter_map(|change| match change {
            Change::Service { op, instance } => Some(Event {
                topic: Topic::ServiceHealth,
                key: instance.service.clone(),
                index,
                payload: Payload::ServiceHealth {
                    op: *op,
                    instance: instance.clone(),
                },
            }),
            _ => None,
        })
        .collect()
}

/// A point-in-time view of a `MemoryState`.
///
/// Cloned table contents; remains valid and consistent however the store
/// moves on afterwards.
#[derive(Debug, Clone)]
pub struct MemoryView {
    tables: Tables,
}

impl StateView for MemoryView {
    fn tokens_linked_to_policy(&self, policy_id: &str) -> Result<Vec<AclToken>> {
        Ok(self
            .tables
            .tokens
            .values()
            .filter(|token| token.links_policy(policy_id))
            .cloned()
            .collect())
    }

    fn roles_linked_to_policy(&self, policy_id: &str) -> Result<Vec<AclRole>> {
        Ok(self
            .tables
            .roles
            .values()
            .filter(|role| role.links_policy(policy_id))
            .cloned()
            .collect())
    }

    fn tokens_linked_to_role(&self, role_id: &str) -> Result<Vec<AclToken>> {
        Ok(self
            .tables
            .tokens
            .values()
            .filter(|token| token.links_role(role_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
