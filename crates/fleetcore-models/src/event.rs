use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::DataMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

/// One structured record of a status transition, as persisted by the Store.
///
/// Shape matches the tuple the `EventSink` capability receives on emission;
/// the Store additionally assigns an `id` so rows can be pruned/purged.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: String,
    pub timestamp: OffsetDateTime,
    pub level: EventLevel,
    /// Id of the object the event is about (cluster id, node id, ...).
    pub oid: String,
    /// Kind of object, e.g. `"CLUSTER"`, `"NODE"`, `"ACTION"`.
    pub otype: String,
    pub oname: String,
    pub cluster_id: String,
    pub action: String,
    pub status: String,
    pub reason: String,
    pub project: String,
    pub meta: DataMap,
}
