//! ACL change-to-event mapping
//!
//! Produces one event per changed ACL row. These events are consumed by the
//! publisher's invalidation protocol and never delivered to subscribers; the
//! payload carries the full row so the worker can read the identifiers it
//! needs without another store lookup. Deleted rows arrive as their pre-delete
//! value, so a deleted token still closes the subscriptions it authenticated.

use ripple_protocol::Change;
use ripple_stream::{Event, Payload, Topic};

/// Map the ACL table changes in a commit to events, one per changed row.
pub fn acl_events_from_changes(index: u64, changes: &[Change]) -> Vec<Event> {
    let mut events = Vec::new();

    for change in changes {
        match change {
            Change::AclToken { token, .. } => events.push(Event {
                topic: Topic::AclTokens,
                key: String::new(),
                index,
                payload: Payload::AclToken(token.clone()),
            }),
            Change::AclPolicy { policy, .. } => events.push(Event {
                topic: Topic::AclPolicies,
                key: String::new(),
                index,
                payload: Payload::AclPolicy(policy.clone()),
            }),
            Change::AclRole { role, .. } => events.push(Event {
                topic: Topic::AclRoles,
                key: String::new(),
                index,
                payload: Payload::AclRole(role.clone()),
            }),
            Change::Service { .. } => {}
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_protocol::{AclPolicy, AclRole, AclToken, ChangeOp, ServiceInstance};

    #[test]
    fn test_one_event_per_acl_row() {
        let changes = vec![
            Change::AclToken {
                op: ChangeOp::Update,
                token: AclToken::new("acc-1", "sec-1"),
            },
            Change::Service {
                op: ChangeOp::Create,
                instance: ServiceInstance::new("node1", "web"),
            },
            Change::AclPolicy {
                op: ChangeOp::Create,
                policy: AclPolicy::new("pol-a", "policy-a"),
            },
            Change::AclRole {
                op: ChangeOp::Delete,
                role: AclRole::new("role-b", "ops"),
            },
        ];

        let events = acl_events_from_changes(9, &changes);

        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.index == 9 && e.topic.is_acl()));
        assert!(matches!(&events[0].payload, Payload::AclToken(t) if t.secret_id == "sec-1"));
        assert!(matches!(&events[1].payload, Payload::AclPolicy(p) if p.id == "pol-a"));
        assert!(matches!(&events[2].payload, Payload::AclRole(r) if r.id == "role-b"));
    }

    #[test]
    fn test_deleted_row_keeps_identifiers() {
        let changes = vec![Change::AclToken {
            op: ChangeOp::Delete,
            token: AclToken::new("acc-1", "sec-1"),
        }];

        let events = acl_events_from_changes(3, &changes);

        assert!(matches!(&events[0].payload, Payload::AclToken(t) if t.secret_id == "sec-1"));
    }
}
