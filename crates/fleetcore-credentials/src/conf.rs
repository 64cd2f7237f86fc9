use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

const DEFAULT_IV: &str = "SenlinBigSecret!";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialsConf {
    #[serde(default = "default_iv")]
    pub cipher_init_vector: String,
}

impl Default for CredentialsConf {
    fn default() -> Self {
        CredentialsConf {
            cipher_init_vector: default_iv(),
        }
    }
}

fn default_iv() -> String {
    DEFAULT_IV.to_string()
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cipher_init_vector must be exactly 16 bytes, got {0}")]
pub struct InvalidInitVector(pub usize);

impl CredentialsConf {
    /// Validates and extracts the 16-byte IV this configuration carries.
    pub fn iv_bytes(&self) -> Result<[u8; 16], InvalidInitVector> {
        let bytes = self.cipher_init_vector.as_bytes();
        if bytes.len() != 16 {
            return Err(InvalidInitVector(bytes.len()));
        }
        let mut iv = [0u8; 16];
        iv.copy_from_slice(bytes);
        Ok(iv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_iv_is_valid() {
        let conf = CredentialsConf::default();
        assert!(conf.iv_bytes().is_ok());
    }

    #[test]
    fn short_iv_is_rejected() {
        let conf = CredentialsConf {
            cipher_init_vector: "short".to_string(),
        };
        assert_eq!(conf.iv_bytes().unwrap_err(), InvalidInitVector(5));
    }
}
