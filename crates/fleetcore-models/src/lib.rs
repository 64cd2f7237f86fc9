//! Persisted entity types for the cluster lifecycle orchestrator.
//!
//! Every type here is a plain data container; none of them hold references to
//! one another (see [Design Notes on cyclic references][crate#cyclic] — ids are
//! stored, never back-pointers) and none of them talk to storage. They are the
//! shapes that flow through `fleetcore-store`, `fleetcore-locks` and
//! `fleetcore-oaction`.

mod action;
mod binding;
mod cluster;
mod credential;
mod event;
mod health;
mod lock;
mod node;
mod policy;
mod profile;
mod service;

pub use self::action::Action;
pub use self::action::ActionControl;
pub use self::action::ActionKind;
pub use self::action::ActionStatus;
pub use self::binding::ClusterPolicyBinding;
pub use self::cluster::Cluster;
pub use self::cluster::ClusterStatus;
pub use self::cluster::UNBOUNDED_MAX_SIZE;
pub use self::credential::Credential;
pub use self::event::EventLevel;
pub use self::event::StoredEvent;
pub use self::health::HealthCheck;
pub use self::lock::ClusterLock;
pub use self::lock::LockScope;
pub use self::lock::NodeLock;
pub use self::node::Node;
pub use self::node::NodeStatus;
pub use self::node::ORPHAN_INDEX;
pub use self::policy::Policy;
pub use self::profile::Profile;
pub use self::service::Service;

/// Opaque, driver/policy defined scratch data attached to most entities.
pub type DataMap = std::collections::HashMap<String, serde_json::Value>;

/// Generates a random id in the shape used throughout the engine.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
