//! Small helpers shared by the per-kind action bodies.
use fleetcore_models::Action;

/// True once the spawn phase has run and the engine is resuming after its
/// children completed.
pub(crate) fn is_spawned(action: &Action) -> bool {
    action.data.contains_key("spawned")
}

/// Ids of the children a spawn phase created, read back during the reap
/// phase. Empty if the action never spawned any (or hasn't yet).
pub(crate) fn spawned_children(action: &Action) -> Vec<String> {
    action
        .data
        .get("children")
        .and_then(|v| v.as_array())
        .map(|values| values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}
