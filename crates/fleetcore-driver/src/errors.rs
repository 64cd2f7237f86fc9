//! Errors related to resource driver registration and lookup.

/// No driver is registered for the requested profile type.
#[derive(Debug, thiserror::Error)]
#[error("no resource driver registered for profile type '{profile_type}'")]
pub struct DriverNotFound {
    pub profile_type: String,
}

impl From<&str> for DriverNotFound {
    fn from(value: &str) -> Self {
        DriverNotFound {
            profile_type: value.to_string(),
        }
    }
}
