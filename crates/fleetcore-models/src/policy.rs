use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::DataMap;

/// Version assumed by [`Policy::new`] when the caller doesn't pick one.
pub const DEFAULT_POLICY_VERSION: &str = "v1";

/// Reusable decision module attached to clusters via
/// [`crate::ClusterPolicyBinding`]. Immutable once created except for `name`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
    /// Names the policy plugin implementation, e.g. `senlin.policy.deletion`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Selects which registered version of the `kind` handler evaluates this
    /// policy; handlers are registered and looked up by `(kind, version)`.
    pub version: String,
    pub spec: DataMap,
    pub data: DataMap,
    pub project: String,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

impl Policy {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: impl Into<String>, project: impl Into<String>) -> Self {
        Policy {
            id: id.into(),
            name: name.into(),
            kind: kind.into(),
            version: DEFAULT_POLICY_VERSION.to_string(),
            spec: DataMap::new(),
            data: DataMap::new(),
            project: project.into(),
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
        }
    }

    /// Overrides the handler version this policy resolves to.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}
