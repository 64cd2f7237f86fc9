use fleetcore_models::Node;
use fleetcore_models::NodeStatus;

/// Picks the nodes a `CLUSTER_SCALE_IN` will delete.
///
/// If the attached deletion policy already named `candidates`, those are
/// used verbatim (truncated/validated by the caller beforehand). Otherwise
/// the oldest active nodes are selected, matching the origin service's
/// default "oldest first" victim policy.
pub fn select_victims<'a>(nodes: &'a [Node], count: usize, candidates: Option<&[String]>) -> Vec<&'a Node> {
    if let Some(candidates) = candidates {
        return candidates.iter().filter_map(|id| nodes.iter().find(|n| &n.id == id)).take(count).collect();
    }

    let mut active: Vec<&Node> = nodes.iter().filter(|n| n.status == NodeStatus::Active && !n.is_deleted()).collect();
    active.sort_by_key(|n| n.created_at);
    active.into_iter().take(count).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_node(id: &str) -> Node {
        let mut node = Node::orphan(id, id, "p1");
        node.cluster_id = "c1".to_string();
        node.status = NodeStatus::Active;
        node
    }

    #[test]
    fn defaults_to_oldest_active_nodes() {
        let mut a = active_node("n1");
        let mut b = active_node("n2");
        let c = active_node("n3");
        a.created_at = time::OffsetDateTime::UNIX_EPOCH;
        b.created_at = time::OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(10);
        let nodes = vec![a, b, c];

        let victims = select_victims(&nodes, 2, None);
        let ids: Vec<&str> = victims.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["n1", "n2"]);
    }

    #[test]
    fn explicit_candidates_are_honored_in_order() {
        let nodes = vec![active_node("n1"), active_node("n2"), active_node("n3")];
        let candidates = vec!["n3".to_string(), "n1".to_string()];

        let victims = select_victims(&nodes, 2, Some(&candidates));
        let ids: Vec<&str> = victims.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["n3", "n1"]);
    }

    #[test]
    fn skips_non_active_nodes_in_default_selection() {
        let mut error_node = active_node("n1");
        error_node.status = NodeStatus::Error;
        let nodes = vec![error_node, active_node("n2")];

        let victims = select_victims(&nodes, 5, None);
        let ids: Vec<&str> = victims.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["n2"]);
    }
}
