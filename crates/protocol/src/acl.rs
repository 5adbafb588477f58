//! ACL entities
//!
//! Tokens authenticate subscribers. A token's effective permissions come from
//! the policies it links directly plus the policies of every role it links.
//! Roles do not nest: the relation graph is token → policy, token → role,
//! role → policy, and nothing deeper.
//!
//! These types carry no evaluation logic. The streaming layer only needs the
//! link structure to decide which subscriptions to invalidate when an entity
//! changes; rule enforcement happens in the surrounding system when a client
//! resubscribes.

use serde::{Deserialize, Serialize};

/// An ACL token as stored in the state store.
///
/// `secret_id` is the credential clients subscribe with; `accessor_id` is the
/// stable public identifier used for management operations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AclToken {
    /// Stable public identifier.
    pub accessor_id: String,
    /// The secret credential presented by subscribers.
    pub secret_id: String,
    /// Free-form description.
    pub description: String,
    /// IDs of policies linked directly to this token.
    pub policies: Vec<String>,
    /// IDs of roles linked to this token.
    pub roles: Vec<String>,
}

impl AclToken {
    /// Create a token with the given identifiers and no links.
    pub fn new(accessor_id: impl Into<String>, secret_id: impl Into<String>) -> Self {
        Self {
            accessor_id: accessor_id.into(),
            secret_id: secret_id.into(),
            ..Self::default()
        }
    }

    /// Add a direct policy link.
    pub fn with_policy(mut self, policy_id: impl Into<String>) -> Self {
        self.policies.push(policy_id.into());
        self
    }

    /// Add a role link.
    pub fn with_role(mut self, role_id: impl Into<String>) -> Self {
        self.roles.push(role_id.into());
        self
    }

    /// Check whether this token links the given policy directly.
    pub fn links_policy(&self, policy_id: &str) -> bool {
        self.policies.iter().any(|id| id == policy_id)
    }

    /// Check whether this token links the given role.
    pub fn links_role(&self, role_id: &str) -> bool {
        self.roles.iter().any(|id| id == role_id)
    }
}

/// An ACL policy: a named set of rules.
///
/// The rule text is opaque to the streaming layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AclPolicy {
    /// Unique policy ID.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Opaque rule text.
    pub rules: String,
}

impl AclPolicy {
    /// Create a policy with empty rules.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rules: String::new(),
        }
    }
}

/// An ACL role: a named bundle of policies that tokens can link as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AclRole {
    /// Unique role ID.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// IDs of policies this role grants.
    pub policies: Vec<String>,
}

impl AclRole {
    /// Create a role with no policies.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            policies: Vec::new(),
        }
    }

    /// Add a policy grant.
    pub fn with_policy(mut self, policy_id: impl Into<String>) -> Self {
        self.policies.push(policy_id.into());
        self
    }

    /// Check whether this role grants the given policy.
    pub fn links_policy(&self, policy_id: &str) -> bool {
        self.policies.iter().any(|id| id == policy_id)
    }
}
