//! Interface implemented by profile-type-specific resource drivers.
use anyhow::Result;
use fleetcore_context::Context;
use fleetcore_models::DataMap;
use fleetcore_models::Node;
use fleetcore_models::Profile;

/// Driver-reported health of a node, as observed by `check`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeHealth {
    Healthy,
    Warning(String),
    Error(String),
}

/// Which recovery strategy `NODE_RECOVER` should apply; chosen by the policy
/// layer and passed through unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoverOperation {
    Rebuild,
    Recreate,
    Evacuate,
}

/// Interface for profile-type-specific resource drivers.
///
/// Every call is synchronous from the engine's perspective: the driver
/// internally polls the backing infrastructure until it reaches the target
/// status (or the action's deadline expires) before returning.
#[async_trait::async_trait]
pub trait ResourceDriver: std::fmt::Debug + Send + Sync {
    /// Creates the resource backing `node` and returns its `physical_id`.
    async fn create(&self, context: &Context, node: &Node) -> Result<String>;

    /// Deletes the resource backing `node`.
    async fn delete(&self, context: &Context, node: &Node) -> Result<()>;

    /// Updates the resource to match `new_profile`.
    async fn update(&self, context: &Context, node: &Node, new_profile: &Profile) -> Result<()>;

    /// Fetches driver-reported attributes for a node.
    async fn get_details(&self, context: &Context, node: &Node) -> Result<DataMap>;

    /// Reports the driver's view of the node's health.
    async fn check(&self, context: &Context, node: &Node) -> Result<NodeHealth>;

    /// Recovers a node using the given strategy and policy-supplied
    /// parameters.
    async fn recover(&self, context: &Context, node: &Node, operation: RecoverOperation, params: &DataMap) -> Result<()>;
}
