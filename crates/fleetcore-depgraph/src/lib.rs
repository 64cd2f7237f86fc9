//! Dependency edges between actions and the status propagation they drive.
//!
//! Edges live on the [`fleetcore_models::Action`] rows themselves
//! (`depends_on`/`depended_by`); this crate only knows how to walk and
//! mutate them through the [`fleetcore_store::Store`]. Failure/cancel
//! fan-out uses an explicit work queue rather than recursion so a wide DAG
//! cannot blow the stack.
use std::collections::HashSet;
use std::collections::VecDeque;

use fleetcore_context::Context;
use fleetcore_errors::EngineError;
use fleetcore_errors::NotFound;
use fleetcore_models::Action;
use fleetcore_models::ActionStatus;
use fleetcore_store::GetAction;
use fleetcore_store::Store;
use time::OffsetDateTime;

const REASON_WAITING: &str = "waiting on dependency";
const REASON_READY: &str = "dependencies satisfied";

/// The two shapes `add_dependency` accepts: several parents gating one
/// child, or one parent gating several children. List-to-list is
/// deliberately not representable.
pub enum Dependents<'a> {
    ManyParentsOneChild { parents: &'a [String], child: &'a str },
    OneParentManyChildren { parent: &'a str, children: &'a [String] },
}

/// Walks and mutates the dependency edges stored on [`Action`] rows.
#[derive(Clone)]
pub struct DependencyGraph {
    store: Store,
}

impl DependencyGraph {
    pub fn new(store: Store) -> Self {
        DependencyGraph { store }
    }

    /// Adds one or more `parent -> child` edges and moves every affected
    /// child to `WAITING`.
    pub async fn add_dependency(&self, context: &Context, dependents: Dependents<'_>, now: OffsetDateTime) -> anyhow::Result<()> {
        let pairs: Vec<(String, String)> = match dependents {
            Dependents::ManyParentsOneChild { parents, child } => {
                parents.iter().map(|parent| (parent.clone(), child.to_string())).collect()
            }
            Dependents::OneParentManyChildren { parent, children } => {
                children.iter().map(|child| (parent.to_string(), child.clone())).collect()
            }
        };

        let mut children_touched: Vec<String> = Vec::new();
        for (parent_id, child_id) in &pairs {
            self.add_edge(context, parent_id, child_id).await?;
            if !children_touched.contains(child_id) {
                children_touched.push(child_id.clone());
            }
        }
        for child_id in children_touched {
            self.set_waiting(context, &child_id, now).await?;
        }
        Ok(())
    }

    async fn add_edge(&self, context: &Context, parent_id: &str, child_id: &str) -> anyhow::Result<()> {
        let mut parent = self.fetch(context, parent_id).await?;
        parent.depended_by.insert(child_id.to_string());
        self.store.persist(context, parent).await?;

        let mut child = self.fetch(context, child_id).await?;
        child.depends_on.insert(parent_id.to_string());
        self.store.persist(context, child).await?;
        Ok(())
    }

    async fn set_waiting(&self, context: &Context, action_id: &str, now: OffsetDateTime) -> anyhow::Result<()> {
        let mut action = self.fetch(context, action_id).await?;
        action.status = ActionStatus::Waiting;
        action.status_reason = REASON_WAITING.to_string();
        action.updated_at = now;
        self.store.persist(context, action).await?;
        Ok(())
    }

    /// Removes a `parent -> child` edge; when the child's `depends_on`
    /// becomes empty it transitions to `READY`. Idempotent.
    pub async fn del_dependency(&self, context: &Context, parent_id: &str, child_id: &str, now: OffsetDateTime) -> anyhow::Result<()> {
        let mut parent = self.fetch(context, parent_id).await?;
        parent.depended_by.remove(child_id);
        self.store.persist(context, parent).await?;

        let mut child = self.fetch(context, child_id).await?;
        child.depends_on.remove(parent_id);
        let became_ready = child.depends_on.is_empty();
        child.updated_at = now;
        if became_ready {
            child.status = ActionStatus::Ready;
            child.status_reason = REASON_READY.to_string();
        }
        self.store.persist(context, child).await?;
        Ok(())
    }

    /// Marks an action `SUCCEEDED` and releases its dependents, possibly
    /// making some of them `READY`.
    pub async fn mark_succeeded(&self, context: &Context, action_id: &str, now: OffsetDateTime) -> anyhow::Result<()> {
        let mut action = self.fetch(context, action_id).await?;
        action.status = ActionStatus::Succeeded;
        action.end_time = Some(now);
        action.updated_at = now;
        let dependents: Vec<String> = action.depended_by.iter().cloned().collect();
        self.store.persist(context, action).await?;

        for dependent in dependents {
            self.del_dependency(context, action_id, &dependent, now).await?;
        }
        Ok(())
    }

    /// Marks an action `FAILED` and fans the failure out to every
    /// transitive dependent, also marking them `FAILED`.
    pub async fn mark_failed(&self, context: &Context, action_id: &str, reason: &str, now: OffsetDateTime) -> anyhow::Result<()> {
        self.fail_closure(context, action_id, reason, ActionStatus::Failed, now).await
    }

    /// Marks an action `CANCELLED` and cascades the same way as
    /// [`DependencyGraph::mark_failed`].
    pub async fn mark_cancelled(&self, context: &Context, action_id: &str, reason: &str, now: OffsetDateTime) -> anyhow::Result<()> {
        self.fail_closure(context, action_id, reason, ActionStatus::Cancelled, now).await
    }

    async fn fail_closure(
        &self,
        context: &Context,
        action_id: &str,
        reason: &str,
        status: ActionStatus,
        now: OffsetDateTime,
    ) -> anyhow::Result<()> {
        let mut queue: VecDeque<(String, String)> = VecDeque::new();
        queue.push_back((action_id.to_string(), reason.to_string()));
        let mut seen: HashSet<String> = HashSet::new();

        while let Some((id, reason)) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let mut action = self.fetch(context, &id).await?;
            if action.status.is_terminal() {
                continue;
            }
            let dependents: Vec<String> = action.depended_by.iter().cloned().collect();
            action.status = status;
            action.status_reason = reason;
            action.end_time = Some(now);
            action.updated_at = now;
            self.store.persist(context, action).await?;

            slog::warn!(
                context.logger,
                "Action reached a terminal failure state, cascading to dependents";
                "action_id" => &id,
                "dependents" => dependents.len(),
            );
            for dependent in dependents {
                queue.push_back((dependent, "dependency failed".to_string()));
            }
        }
        Ok(())
    }

    async fn fetch(&self, context: &Context, action_id: &str) -> anyhow::Result<Action> {
        let action = self.store.query(context, GetAction::from(action_id)).await?;
        Ok(action.ok_or_else(|| EngineError::from(NotFound::new("action", action_id)))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetcore_models::ActionKind;
    use fleetcore_store::StoreFixture;

    fn ctx() -> Context {
        Context::fixture()
    }

    fn graph() -> (DependencyGraph, Store) {
        let store: Store = StoreFixture::default().into();
        (DependencyGraph::new(store.clone()), store)
    }

    async fn seed(store: &Store, context: &Context, id: &str) {
        let action = Action::new(id, "c1", ActionKind::NodeCreate, "proj", 60);
        store.persist(context, action).await.unwrap();
    }

    #[tokio::test]
    async fn fan_in_becomes_ready_only_after_last_parent() {
        let (graph, store) = graph();
        let context = ctx();
        for id in ["a", "b", "c", "d"] {
            seed(&store, &context, id).await;
        }
        let parents = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        graph
            .add_dependency(&context, Dependents::ManyParentsOneChild { parents: &parents, child: "d" }, OffsetDateTime::now_utc())
            .await
            .unwrap();

        graph.mark_succeeded(&context, "a", OffsetDateTime::now_utc()).await.unwrap();
        let d = store.query(&context, GetAction::from("d")).await.unwrap().unwrap();
        assert_eq!(d.status, ActionStatus::Waiting);

        graph.mark_succeeded(&context, "b", OffsetDateTime::now_utc()).await.unwrap();
        let d = store.query(&context, GetAction::from("d")).await.unwrap().unwrap();
        assert_eq!(d.status, ActionStatus::Waiting);

        graph.mark_succeeded(&context, "c", OffsetDateTime::now_utc()).await.unwrap();
        let d = store.query(&context, GetAction::from("d")).await.unwrap().unwrap();
        assert_eq!(d.status, ActionStatus::Ready);
    }

    #[tokio::test]
    async fn single_failed_parent_cancels_closure() {
        let (graph, store) = graph();
        let context = ctx();
        for id in ["a", "b", "c"] {
            seed(&store, &context, id).await;
        }
        let parents = vec!["a".to_string()];
        graph
            .add_dependency(&context, Dependents::ManyParentsOneChild { parents: &parents, child: "b" }, OffsetDateTime::now_utc())
            .await
            .unwrap();
        let parents = vec!["b".to_string()];
        graph
            .add_dependency(&context, Dependents::ManyParentsOneChild { parents: &parents, child: "c" }, OffsetDateTime::now_utc())
            .await
            .unwrap();

        graph.mark_failed(&context, "a", "boom", OffsetDateTime::now_utc()).await.unwrap();
        let b = store.query(&context, GetAction::from("b")).await.unwrap().unwrap();
        let c = store.query(&context, GetAction::from("c")).await.unwrap().unwrap();
        assert_eq!(b.status, ActionStatus::Failed);
        assert_eq!(c.status, ActionStatus::Failed);
    }

    #[tokio::test]
    async fn del_dependency_is_idempotent() {
        let (graph, store) = graph();
        let context = ctx();
        seed(&store, &context, "a").await;
        seed(&store, &context, "b").await;
        let parents = vec!["a".to_string()];
        graph
            .add_dependency(&context, Dependents::ManyParentsOneChild { parents: &parents, child: "b" }, OffsetDateTime::now_utc())
            .await
            .unwrap();
        graph.del_dependency(&context, "a", "b", OffsetDateTime::now_utc()).await.unwrap();
        graph.del_dependency(&context, "a", "b", OffsetDateTime::now_utc()).await.unwrap();
        let b = store.query(&context, GetAction::from("b")).await.unwrap().unwrap();
        assert_eq!(b.status, ActionStatus::Ready);
        assert!(b.depends_on.is_empty());
    }
}
