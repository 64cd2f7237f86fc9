//! Load configuration from a YAML file.
use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;

use crate::Conf;

/// Errors loading `fleetcore` process configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unable to decode configuration from the file at the given path.
    #[error("unable to decode configuration from file at '{0}'")]
    Decode(String),

    /// Unable to open the configuration file at the given path.
    #[error("unable to read configuration file at '{0}'")]
    Open(String),

    /// Configuration file not found at the given path.
    #[error("configuration file not found at '{0}'")]
    PathNotFound(String),
}

/// Load process configuration from the specified path.
pub fn load(path: &str) -> Result<Conf> {
    if !PathBuf::from(path).exists() {
        let error = Error::PathNotFound(path.to_string());
        let error = anyhow::anyhow!(error);
        return Err(error);
    }

    let file = File::open(path).with_context(|| Error::Open(path.into()))?;
    let conf = serde_yaml::from_reader(file).with_context(|| Error::Decode(path.into()))?;
    Ok(conf)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::load;
    use super::Error;

    #[test]
    fn missing_file_is_reported() {
        let error = load("/no/such/path/fleetcore.yaml").unwrap_err();
        let error = error.downcast_ref::<Error>().unwrap();
        assert!(matches!(error, Error::PathNotFound(_)));
    }

    #[test]
    fn defaults_apply_to_an_empty_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{}}").unwrap();
        let conf = load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(conf.runtime.shutdown_grace_sec, 30);
    }

    #[test]
    fn invalid_yaml_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "dispatcher:\n  concurrent_actions: \"not a number\"").unwrap();
        let error = load(file.path().to_str().unwrap()).unwrap_err();
        let error = error.downcast_ref::<Error>().unwrap();
        assert!(matches!(error, Error::Decode(_)));
    }
}
