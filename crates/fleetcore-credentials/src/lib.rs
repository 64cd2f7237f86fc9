//! Encryption for the [`fleetcore_models::Credential`] entity.
//!
//! The core never sees or logs a plaintext secret: [`CredentialVault`] is
//! the only place that holds the AES key, and it only ever hands a
//! plaintext string back to the caller that asked to decrypt one.
mod cipher;
mod conf;

pub use self::cipher::Cipher;
pub use self::cipher::DecryptError;
pub use self::conf::CredentialsConf;
pub use self::conf::InvalidInitVector;

use fleetcore_context::Context;
use fleetcore_models::Credential;
use fleetcore_store::GetCredential;
use fleetcore_store::Store;

/// Encrypts and stores, or fetches and decrypts, a principal's credential.
#[derive(Clone)]
pub struct CredentialVault {
    store: Store,
    iv: [u8; 16],
}

impl CredentialVault {
    pub fn new(store: Store, conf: &CredentialsConf) -> Result<Self, InvalidInitVector> {
        Ok(CredentialVault { store, iv: conf.iv_bytes()? })
    }

    /// Encrypts `secret` and persists it as the `(user, project)` credential,
    /// overwriting any credential already stored for that identity.
    pub async fn store(&self, context: &Context, user: &str, project: &str, secret: &str) -> anyhow::Result<()> {
        let cipher = cipher::Cipher::for_identity(self.iv, user, project);
        let encrypted = cipher.encrypt(secret);
        let mut credential = match self
            .store
            .query(
                context,
                GetCredential {
                    user: user.to_string(),
                    project: project.to_string(),
                },
            )
            .await?
        {
            Some(existing) => existing,
            None => Credential::new(user, project, String::new()),
        };
        credential.cred = encrypted;
        credential.updated_at = Some(time::OffsetDateTime::now_utc());
        self.store.persist(context, credential).await?;
        Ok(())
    }

    /// Fetches and decrypts the `(user, project)` credential, if one exists.
    pub async fn reveal(&self, context: &Context, user: &str, project: &str) -> anyhow::Result<Option<String>> {
        let credential = self
            .store
            .query(
                context,
                GetCredential {
                    user: user.to_string(),
                    project: project.to_string(),
                },
            )
            .await?;
        let Some(credential) = credential else {
            return Ok(None);
        };
        let cipher = cipher::Cipher::for_identity(self.iv, user, project);
        Ok(Some(cipher.decrypt(&credential.cred)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetcore_context::Context;

    #[tokio::test]
    async fn store_then_reveal_round_trips() {
        let store = Store::fixture();
        let context = Context::fixture();
        let vault = CredentialVault::new(store, &CredentialsConf::default()).unwrap();

        vault.store(&context, "alice", "proj-a", "hunter2").await.unwrap();
        let revealed = vault.reveal(&context, "alice", "proj-a").await.unwrap();
        assert_eq!(revealed, Some("hunter2".to_string()));
    }

    #[tokio::test]
    async fn reveal_missing_identity_is_none() {
        let store = Store::fixture();
        let context = Context::fixture();
        let vault = CredentialVault::new(store, &CredentialsConf::default()).unwrap();

        let revealed = vault.reveal(&context, "nobody", "proj-a").await.unwrap();
        assert_eq!(revealed, None);
    }

    #[tokio::test]
    async fn re_authentication_overwrites_stored_payload() {
        let store = Store::fixture();
        let context = Context::fixture();
        let vault = CredentialVault::new(store, &CredentialsConf::default()).unwrap();

        vault.store(&context, "alice", "proj-a", "first-secret").await.unwrap();
        vault.store(&context, "alice", "proj-a", "second-secret").await.unwrap();
        let revealed = vault.reveal(&context, "alice", "proj-a").await.unwrap();
        assert_eq!(revealed, Some("second-secret".to_string()));
    }
}
