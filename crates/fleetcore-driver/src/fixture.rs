use std::sync::Mutex;

use anyhow::Result;
use fleetcore_context::Context;
use fleetcore_models::DataMap;
use fleetcore_models::Node;
use fleetcore_models::Profile;

use crate::NodeHealth;
use crate::RecoverOperation;
use crate::ResourceDriver;

/// A driver stub for tests: returns canned responses and records every call
/// it received so assertions can inspect them.
#[derive(Debug, Default)]
pub struct DriverFixture {
    state: Mutex<DriverFixtureState>,
}

#[derive(Debug, Default)]
struct DriverFixtureState {
    calls: Vec<String>,
    fail_create: bool,
    health: Option<NodeHealth>,
}

impl DriverFixture {
    pub fn new() -> Self {
        DriverFixture::default()
    }

    /// Makes every subsequent `create` call fail.
    pub fn fail_create(&self) {
        self.state.lock().expect("fixture mutex poisoned").fail_create = true;
    }

    /// Sets the health `check` will report.
    pub fn set_health(&self, health: NodeHealth) {
        self.state.lock().expect("fixture mutex poisoned").health = Some(health);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().expect("fixture mutex poisoned").calls.clone()
    }
}

#[async_trait::async_trait]
impl ResourceDriver for DriverFixture {
    async fn create(&self, _context: &Context, node: &Node) -> Result<String> {
        let mut state = self.state.lock().expect("fixture mutex poisoned");
        state.calls.push(format!("create:{}", node.id));
        if state.fail_create {
            anyhow::bail!("fixture driver configured to fail create");
        }
        Ok(format!("physical-{}", node.id))
    }

    async fn delete(&self, _context: &Context, node: &Node) -> Result<()> {
        self.state.lock().expect("fixture mutex poisoned").calls.push(format!("delete:{}", node.id));
        Ok(())
    }

    async fn update(&self, _context: &Context, node: &Node, new_profile: &Profile) -> Result<()> {
        self.state
            .lock()
            .expect("fixture mutex poisoned")
            .calls
            .push(format!("update:{}:{}", node.id, new_profile.id));
        Ok(())
    }

    async fn get_details(&self, _context: &Context, node: &Node) -> Result<DataMap> {
        self.state.lock().expect("fixture mutex poisoned").calls.push(format!("get_details:{}", node.id));
        Ok(DataMap::new())
    }

    async fn check(&self, _context: &Context, node: &Node) -> Result<NodeHealth> {
        let mut state = self.state.lock().expect("fixture mutex poisoned");
        state.calls.push(format!("check:{}", node.id));
        Ok(state.health.clone().unwrap_or(NodeHealth::Healthy))
    }

    async fn recover(&self, _context: &Context, node: &Node, operation: RecoverOperation, _params: &DataMap) -> Result<()> {
        self.state
            .lock()
            .expect("fixture mutex poisoned")
            .calls
            .push(format!("recover:{}:{:?}", node.id, operation));
        Ok(())
    }
}
