use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::DataMap;

/// Version assumed by [`Profile::new`] when the caller doesn't pick one.
pub const DEFAULT_DRIVER_VERSION: &str = "v1";

/// Immutable template used by `NODE_CREATE` to produce a node.
///
/// Profiles are never mutated once created; only `name` may change.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    /// Names the driver plugin that understands `spec`, e.g. `os.nova.server`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Selects which registered version of the `kind` driver handles this
    /// profile; drivers are registered and looked up by `(kind, version)`.
    pub version: String,
    pub spec: DataMap,
    pub metadata: DataMap,
    pub project: String,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

impl Profile {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: impl Into<String>, project: impl Into<String>) -> Self {
        Profile {
            id: id.into(),
            name: name.into(),
            kind: kind.into(),
            version: DEFAULT_DRIVER_VERSION.to_string(),
            spec: DataMap::new(),
            metadata: DataMap::new(),
            project: project.into(),
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
        }
    }

    /// Overrides the driver version this profile resolves to.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}
