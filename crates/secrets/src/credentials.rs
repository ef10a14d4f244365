/*
 * SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: LicenseRef-NvidiaProprietary
 *
 * NVIDIA CORPORATION, its affiliates and licensors retain all intellectual
 * property and proprietary rights in and to this material, related
 * documentation and any modifications thereto. Any use, reproduction,
 * disclosure or distribution of this material and related documentation
 * without an express license agreement from NVIDIA CORPORATION or
 * its affiliates is strictly prohibited.
 */

//! The credential model and the pluggable provider seam.
//!
//! This crate is the sole mutator of secret material. Other components hold
//! a `dyn CredentialProvider` and must not persist or log what they read
//! through it.

use std::collections::HashMap;
use std::str::FromStr;

use mac_address::MacAddress;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::SecretsError;

/// A credential for authenticating against a device endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Credentials {
    UsernamePassword { username: String, password: String },
}

impl Credentials {
    pub fn username_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::UsernamePassword {
            username: username.into(),
            password: password.into(),
        }
    }

    /// A credential is valid iff both the user and the secret are non-empty.
    pub fn is_valid(&self) -> bool {
        let Credentials::UsernamePassword { username, password } = self;
        !username.is_empty() && !password.is_empty()
    }

    pub fn username(&self) -> &str {
        let Credentials::UsernamePassword { username, .. } = self;
        username
    }

    pub fn password(&self) -> &str {
        let Credentials::UsernamePassword { password, .. } = self;
        password
    }
}

// Never derive Debug for a secret-bearing type; redact instead.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Credentials::UsernamePassword { username, .. } = self;
        f.debug_struct("Credentials")
            .field("username", username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Identifies where a credential is stored. Keys render to an opaque storage
/// path; the MAC address is always stored in its lowercase canonical form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CredentialKey {
    Pmc { mac_address: MacAddress },
}

impl CredentialKey {
    pub fn storage_path(&self) -> String {
        match self {
            CredentialKey::Pmc { mac_address } => {
                format!("pmc/{}", mac_address.to_string().to_lowercase())
            }
        }
    }
}

/// The stored representation: a KV secret with exactly two keys.
#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct StoredCredential {
    pub user: String,
    pub secret: String,
}

impl From<&Credentials> for StoredCredential {
    fn from(credentials: &Credentials) -> Self {
        StoredCredential {
            user: credentials.username().to_string(),
            secret: credentials.password().to_string(),
        }
    }
}

impl From<StoredCredential> for Credentials {
    fn from(stored: StoredCredential) -> Self {
        Credentials::UsernamePassword {
            username: stored.user,
            password: stored.secret,
        }
    }
}

#[async_trait::async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Stores a credential. Rejects invalid credentials; overwrites an
    /// existing secret under the same key.
    async fn set_credentials(
        &self,
        key: &CredentialKey,
        credentials: &Credentials,
    ) -> Result<(), SecretsError>;

    async fn get_credentials(&self, key: &CredentialKey) -> Result<Credentials, SecretsError>;

    /// Replaces an existing credential; fails with `NotFound` when no
    /// secret is stored under the key.
    async fn patch_credentials(
        &self,
        key: &CredentialKey,
        credentials: &Credentials,
    ) -> Result<(), SecretsError>;

    async fn delete_credentials(&self, key: &CredentialKey) -> Result<(), SecretsError>;

    /// The MAC addresses of every PMC a credential is stored for.
    async fn keys(&self) -> Result<Vec<MacAddress>, SecretsError>;
}

/// In-memory provider for tests and single-process deployments without a
/// Vault.
#[derive(Default)]
pub struct MemoryCredentialProvider {
    secrets: RwLock<HashMap<String, StoredCredential>>,
}

impl MemoryCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CredentialProvider for MemoryCredentialProvider {
    async fn set_credentials(
        &self,
        key: &CredentialKey,
        credentials: &Credentials,
    ) -> Result<(), SecretsError> {
        if !credentials.is_valid() {
            return Err(SecretsError::InvalidCredential);
        }
        self.secrets
            .write()
            .await
            .insert(key.storage_path(), credentials.into());
        Ok(())
    }

    async fn get_credentials(&self, key: &CredentialKey) -> Result<Credentials, SecretsError> {
        self.secrets
            .read()
            .await
            .get(&key.storage_path())
            .cloned()
            .map(Credentials::from)
            .ok_or_else(|| SecretsError::NotFound(key.storage_path()))
    }

    async fn patch_credentials(
        &self,
        key: &CredentialKey,
        credentials: &Credentials,
    ) -> Result<(), SecretsError> {
        if !credentials.is_valid() {
            return Err(SecretsError::InvalidCredential);
        }
        let mut secrets = self.secrets.write().await;
        let path = key.storage_path();
        if !secrets.contains_key(&path) {
            return Err(SecretsError::NotFound(path));
        }
        secrets.insert(path, credentials.into());
        Ok(())
    }

    async fn delete_credentials(&self, key: &CredentialKey) -> Result<(), SecretsError> {
        let path = key.storage_path();
        if self.secrets.write().await.remove(&path).is_none() {
            return Err(SecretsError::NotFound(path));
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<MacAddress>, SecretsError> {
        let secrets = self.secrets.read().await;
        let mut macs = Vec::with_capacity(secrets.len());
        for path in secrets.keys() {
            if let Some(mac) = path.strip_prefix("pmc/") {
                macs.push(
                    MacAddress::from_str(mac)
                        .map_err(|e| SecretsError::GenericError(eyre::eyre!(e)))?,
                );
            }
        }
        macs.sort_by_key(|m| m.bytes());
        Ok(macs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(mac: &str) -> CredentialKey {
        CredentialKey::Pmc {
            mac_address: mac.parse().unwrap(),
        }
    }

    #[test]
    fn test_storage_path_is_lowercase_canonical() {
        assert_eq!(key("0A:0B:0C:0D:0E:0F").storage_path(), "pmc/0a:0b:0c:0d:0e:0f");
    }

    #[test]
    fn test_debug_redacts_password() {
        let c = Credentials::username_password("root", "hunter2");
        let rendered = format!("{c:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("root"));
    }

    #[tokio::test]
    async fn test_round_trip() {
        let provider = MemoryCredentialProvider::new();
        let k = key("00:11:22:33:44:55");
        let c = Credentials::username_password("admin", "s3cret");

        provider.set_credentials(&k, &c).await.unwrap();
        assert_eq!(provider.get_credentials(&k).await.unwrap(), c);

        provider.delete_credentials(&k).await.unwrap();
        assert!(matches!(
            provider.get_credentials(&k).await,
            Err(SecretsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_put_rejects_invalid_credential() {
        let provider = MemoryCredentialProvider::new();
        let k = key("00:11:22:33:44:55");

        for c in [
            Credentials::username_password("", "s3cret"),
            Credentials::username_password("admin", ""),
        ] {
            assert!(matches!(
                provider.set_credentials(&k, &c).await,
                Err(SecretsError::InvalidCredential)
            ));
        }
    }

    #[tokio::test]
    async fn test_patch_requires_existing_secret() {
        let provider = MemoryCredentialProvider::new();
        let k = key("00:11:22:33:44:55");
        let c = Credentials::username_password("admin", "s3cret");

        assert!(matches!(
            provider.patch_credentials(&k, &c).await,
            Err(SecretsError::NotFound(_))
        ));

        provider.set_credentials(&k, &c).await.unwrap();
        let rotated = Credentials::username_password("admin", "n3w");
        provider.patch_credentials(&k, &rotated).await.unwrap();
        assert_eq!(provider.get_credentials(&k).await.unwrap(), rotated);
    }

    #[tokio::test]
    async fn test_keys_lists_stored_macs() {
        let provider = MemoryCredentialProvider::new();
        let c = Credentials::username_password("admin", "s3cret");
        provider.set_credentials(&key("00:11:22:33:44:55"), &c).await.unwrap();
        provider.set_credentials(&key("00:11:22:33:44:56"), &c).await.unwrap();

        let macs = provider.keys().await.unwrap();
        assert_eq!(
            macs,
            vec![
                "00:11:22:33:44:55".parse::<MacAddress>().unwrap(),
                "00:11:22:33:44:56".parse::<MacAddress>().unwrap(),
            ]
        );
    }
}
