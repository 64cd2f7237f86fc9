use thiserror::Error;

/// No policy type registered under the requested `type` name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("policy type {policy_type} is not registered")]
pub struct PolicyNotFound {
    pub policy_type: String,
}

impl From<&str> for PolicyNotFound {
    fn from(policy_type: &str) -> Self {
        PolicyNotFound {
            policy_type: policy_type.to_string(),
        }
    }
}
