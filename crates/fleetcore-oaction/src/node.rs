//! `NODE_*` action bodies.
use fleetcore_context::Context;
use fleetcore_driver::NodeHealth;
use fleetcore_driver::RecoverOperation;
use fleetcore_models::Action;
use fleetcore_models::DataMap;
use fleetcore_models::NodeStatus;
use fleetcore_store::DeleteNode;
use fleetcore_store::GetProfile;
use time::OffsetDateTime;

use crate::engine::ActionEngine;
use crate::outcome::Outcome;

impl ActionEngine {
    pub(crate) async fn body_node_create(&self, context: &Context, action: &mut Action) -> anyhow::Result<Outcome> {
        let mut node = self.fetch_node(context, &action.target).await?;
        node.status = NodeStatus::Creating;
        self.store.persist(context, node.clone()).await?;

        let profile = self
            .store
            .query(context, GetProfile::from(node.profile_id.as_str()))
            .await?
            .ok_or_else(|| fleetcore_errors::NotFound::new("profile", node.profile_id.clone()))?;
        let driver = self.drivers.lookup(&profile.kind, &profile.version)?;

        match driver.driver.create(context, &node).await {
            Ok(physical_id) => {
                node.physical_id = physical_id;
                node.status = NodeStatus::Active;
                node.updated_at = Some(OffsetDateTime::now_utc());
                self.store.persist(context, node).await?;
                Ok(Outcome::Done)
            }
            Err(error) => {
                node.status = NodeStatus::Error;
                node.status_reason = error.to_string();
                self.store.persist(context, node).await?;
                Err(error)
            }
        }
    }

    pub(crate) async fn body_node_delete(&self, context: &Context, action: &mut Action) -> anyhow::Result<Outcome> {
        let mut node = self.fetch_node(context, &action.target).await?;
        node.status = NodeStatus::Deleting;
        self.store.persist(context, node.clone()).await?;

        let profile = self.store.query(context, GetProfile::from(node.profile_id.as_str())).await?;
        if let Some(profile) = profile {
            let driver = self.drivers.lookup(&profile.kind, &profile.version)?;
            driver.driver.delete(context, &node).await?;
        }

        self.store.delete(context, DeleteNode::from(node.id.as_str())).await?;
        Ok(Outcome::Done)
    }

    pub(crate) async fn body_node_update(&self, context: &Context, action: &mut Action) -> anyhow::Result<Outcome> {
        let mut node = self.fetch_node(context, &action.target).await?;
        let new_profile_id = action.inputs.get("profile_id").and_then(|v| v.as_str()).map(str::to_string).unwrap_or_else(|| node.profile_id.clone());
        let new_profile = self
            .store
            .query(context, GetProfile::from(new_profile_id.as_str()))
            .await?
            .ok_or_else(|| fleetcore_errors::NotFound::new("profile", new_profile_id.clone()))?;

        node.status = NodeStatus::Updating;
        self.store.persist(context, node.clone()).await?;

        let driver = self.drivers.lookup(&new_profile.kind, &new_profile.version)?;
        driver.driver.update(context, &node, &new_profile).await?;

        node.profile_id = new_profile_id;
        node.status = NodeStatus::Active;
        node.updated_at = Some(OffsetDateTime::now_utc());
        self.store.persist(context, node).await?;
        Ok(Outcome::Done)
    }

    pub(crate) async fn body_node_check(&self, context: &Context, action: &mut Action) -> anyhow::Result<Outcome> {
        let mut node = self.fetch_node(context, &action.target).await?;
        let profile = self
            .store
            .query(context, GetProfile::from(node.profile_id.as_str()))
            .await?
            .ok_or_else(|| fleetcore_errors::NotFound::new("profile", node.profile_id.clone()))?;
        let driver = self.drivers.lookup(&profile.kind, &profile.version)?;

        let health = driver.driver.check(context, &node).await?;
        node.status = match health {
            NodeHealth::Healthy => NodeStatus::Active,
            NodeHealth::Warning(reason) => {
                node.status_reason = reason;
                NodeStatus::Warning
            }
            NodeHealth::Error(reason) => {
                node.status_reason = reason;
                NodeStatus::Error
            }
        };
        node.updated_at = Some(OffsetDateTime::now_utc());
        self.store.persist(context, node).await?;
        Ok(Outcome::Done)
    }

    pub(crate) async fn body_node_recover(&self, context: &Context, action: &mut Action) -> anyhow::Result<Outcome> {
        let mut node = self.fetch_node(context, &action.target).await?;
        let profile = self
            .store
            .query(context, GetProfile::from(node.profile_id.as_str()))
            .await?
            .ok_or_else(|| fleetcore_errors::NotFound::new("profile", node.profile_id.clone()))?;
        let driver = self.drivers.lookup(&profile.kind, &profile.version)?;

        let operation = match action.data.get("recovery").and_then(|r| r.get("operation")).and_then(|v| v.as_str()) {
            Some("RECREATE") => RecoverOperation::Recreate,
            Some("EVACUATE") => RecoverOperation::Evacuate,
            _ => RecoverOperation::Rebuild,
        };
        let params: DataMap =
            action.data.get("recovery").and_then(|r| r.get("params")).and_then(|v| v.as_object()).map(|m| m.clone().into_iter().collect()).unwrap_or_default();

        node.status = NodeStatus::Recovering;
        self.store.persist(context, node.clone()).await?;

        driver.driver.recover(context, &node, operation, &params).await?;

        node.status = NodeStatus::Active;
        node.status_reason.clear();
        node.updated_at = Some(OffsetDateTime::now_utc());
        self.store.persist(context, node).await?;
        Ok(Outcome::Done)
    }
}
