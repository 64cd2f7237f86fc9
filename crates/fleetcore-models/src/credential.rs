use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::DataMap;

/// Per-(user, project) secret, encrypted at rest.
///
/// Used only to impersonate the owning principal when an action runs without
/// an authenticated caller behind it (e.g. a scheduled recovery). The core
/// never interprets `cred`; it only stores and returns it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Credential {
    pub user: String,
    pub project: String,
    /// Base64-encoded, AES-CBC encrypted payload.
    pub cred: String,
    pub data: DataMap,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

impl Credential {
    pub fn new(user: impl Into<String>, project: impl Into<String>, cred: impl Into<String>) -> Self {
        Credential {
            user: user.into(),
            project: project.into(),
            cred: cred.into(),
            data: DataMap::new(),
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
        }
    }
}
