use std::sync::Mutex;

use anyhow::Result;
use fleetcore_context::Context;
use fleetcore_models::Action;
use fleetcore_models::Cluster;
use fleetcore_models::ClusterPolicyBinding;
use fleetcore_models::DataMap;

use crate::PolicyHandler;

/// A policy handler stub for tests: records every call and can be configured
/// to veto the action it is run against.
#[derive(Debug, Default)]
pub struct PolicyFixture {
    state: Mutex<PolicyFixtureState>,
}

#[derive(Debug, Default)]
struct PolicyFixtureState {
    calls: Vec<String>,
    veto_reason: Option<String>,
    attach_result: Option<bool>,
}

impl PolicyFixture {
    pub fn new() -> Self {
        PolicyFixture::default()
    }

    /// Makes `pre_op`/`post_op` veto the action with `reason`.
    pub fn veto(&self, reason: impl Into<String>) {
        self.state.lock().expect("fixture mutex poisoned").veto_reason = Some(reason.into());
    }

    /// Makes `attach` return `false`.
    pub fn reject_attach(&self) {
        self.state.lock().expect("fixture mutex poisoned").attach_result = Some(false);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().expect("fixture mutex poisoned").calls.clone()
    }
}

#[async_trait::async_trait]
impl PolicyHandler for PolicyFixture {
    fn validate(&self, _spec: &DataMap) -> Result<()> {
        Ok(())
    }

    async fn attach(&self, _context: &Context, cluster: &Cluster, binding: &mut ClusterPolicyBinding) -> Result<bool> {
        let mut state = self.state.lock().expect("fixture mutex poisoned");
        state.calls.push(format!("attach:{}:{}", cluster.id, binding.policy_id));
        Ok(state.attach_result.unwrap_or(true))
    }

    async fn detach(&self, _context: &Context, cluster: &Cluster, binding: &mut ClusterPolicyBinding) -> Result<()> {
        self.state
            .lock()
            .expect("fixture mutex poisoned")
            .calls
            .push(format!("detach:{}:{}", cluster.id, binding.policy_id));
        Ok(())
    }

    async fn pre_op(&self, _context: &Context, cluster_id: &str, binding: &mut ClusterPolicyBinding, action: &mut Action) -> Result<()> {
        let mut state = self.state.lock().expect("fixture mutex poisoned");
        state.calls.push(format!("pre_op:{}:{}", cluster_id, action.id));
        if let Some(reason) = state.veto_reason.clone() {
            action.data.insert("status".to_string(), serde_json::Value::String("ERROR".to_string()));
            action.data.insert("reason".to_string(), serde_json::Value::String(reason));
        }
        binding.data.insert("pre_op".to_string(), serde_json::Value::Bool(true));
        Ok(())
    }

    async fn post_op(&self, _context: &Context, cluster_id: &str, binding: &mut ClusterPolicyBinding, action: &mut Action) -> Result<()> {
        let mut state = self.state.lock().expect("fixture mutex poisoned");
        state.calls.push(format!("post_op:{}:{}", cluster_id, action.id));
        binding.data.insert("post_op".to_string(), serde_json::Value::Bool(true));
        Ok(())
    }
}
