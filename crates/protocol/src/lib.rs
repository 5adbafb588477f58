//! Ripple Protocol - shared domain data model
//!
//! This crate holds the plain data types exchanged between the state store
//! and the streaming layer:
//!
//! - ACL entities (`AclToken`, `AclPolicy`, `AclRole`)
//! - Service catalog entries (`ServiceInstance`, `HealthStatus`)
//! - Typed change records produced by a store commit (`Change`, `ChangeOp`)
//!
//! Everything here is inert data: no locking, no async, no behavior beyond
//! small accessors. The streaming machinery lives in `ripple-stream`, the
//! store-facing orchestration in `ripple-state`.

pub mod acl;
pub mod change;
pub mod health;

pub use acl::{AclPolicy, AclRole, AclToken};
pub use change::{Change, ChangeOp};
pub use health::{HealthStatus, ServiceInstance};
