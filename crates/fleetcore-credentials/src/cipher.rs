//! AES-128-CBC with space padding, matching the origin service's cipher:
//! pad the plaintext with ASCII spaces to the next 16-byte boundary rather
//! than PKCS#7, and strip trailing spaces back off on decrypt.
use aes::Aes128;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::BlockDecryptMut;
use cbc::cipher::BlockEncryptMut;
use cbc::cipher::KeyIvInit;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

type Encryptor = cbc::Encryptor<Aes128>;
type Decryptor = cbc::Decryptor<Aes128>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptError {
    #[error("encrypted content is not valid base64")]
    BadBase64,
    #[error("encrypted content is not a whole number of AES blocks")]
    BadBlockLength,
}

/// A 16-byte AES key paired with the deployment's 16-byte initialization
/// vector, ready to encrypt or decrypt one message.
pub struct Cipher {
    key: [u8; 16],
    iv: [u8; 16],
}

impl Cipher {
    /// Derives a per-(user, project) key from the deployment's IV-derived
    /// secret: `SHA256(iv || user || ':' || project)`, truncated to 16 bytes.
    ///
    /// The origin service took an externally-supplied key per call; this
    /// codebase has no such external key material, so identity-scoped keys
    /// are derived instead (see DESIGN.md).
    pub fn for_identity(iv: [u8; 16], user: &str, project: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(iv);
        hasher.update(user.as_bytes());
        hasher.update(b":");
        hasher.update(project.as_bytes());
        let digest = hasher.finalize();
        let mut key = [0u8; 16];
        key.copy_from_slice(&digest[..16]);
        Cipher { key, iv }
    }

    pub fn encrypt(&self, message: &str) -> String {
        let padded_len = if message.is_empty() { 16 } else { message.len().div_ceil(16) * 16 };
        let mut buf = message.as_bytes().to_vec();
        buf.resize(padded_len, b' ');
        let ciphertext = Encryptor::new(&self.key.into(), &self.iv.into()).encrypt_padded_vec_mut::<NoPadding>(&buf);
        STANDARD.encode(ciphertext)
    }

    pub fn decrypt(&self, content: &str) -> Result<String, DecryptError> {
        let raw = STANDARD.decode(content).map_err(|_| DecryptError::BadBase64)?;
        let plain = Decryptor::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<NoPadding>(&raw)
            .map_err(|_| DecryptError::BadBlockLength)?;
        let message = String::from_utf8(plain).unwrap_or_default();
        Ok(message.trim_end_matches(' ').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_short_message() {
        let cipher = Cipher::for_identity(*b"SenlinBigSecret!", "alice", "proj-a");
        let ciphertext = cipher.encrypt("s3cr3t");
        assert_eq!(cipher.decrypt(&ciphertext).unwrap(), "s3cr3t");
    }

    #[test]
    fn round_trips_exact_block_message() {
        let cipher = Cipher::for_identity(*b"SenlinBigSecret!", "alice", "proj-a");
        let message = "0123456789abcdef";
        let ciphertext = cipher.encrypt(message);
        assert_eq!(cipher.decrypt(&ciphertext).unwrap(), message);
    }

    #[test]
    fn different_identities_yield_different_keys() {
        let a = Cipher::for_identity(*b"SenlinBigSecret!", "alice", "proj-a");
        let b = Cipher::for_identity(*b"SenlinBigSecret!", "bob", "proj-a");
        assert_ne!(a.encrypt("same message"), b.encrypt("same message"));
    }

    #[test]
    fn malformed_base64_is_rejected() {
        let cipher = Cipher::for_identity(*b"SenlinBigSecret!", "alice", "proj-a");
        assert_eq!(cipher.decrypt("not base64!!").unwrap_err(), DecryptError::BadBase64);
    }
}
