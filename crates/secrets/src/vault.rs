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

//! Vault-backed credential provider.
//!
//! Secrets live in a KV v2 engine mounted at a fixed top-level prefix. The
//! mount is created on the first `start()` of a fresh Vault and skipped on
//! every later one, so `start()` is safe to call on every service boot.

use std::str::FromStr;

use eyre::WrapErr;
use mac_address::MacAddress;
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;

use crate::SecretsError;
use crate::credentials::{CredentialKey, CredentialProvider, Credentials, StoredCredential};

/// The default KV v2 mount point for Anvil secrets.
pub const DEFAULT_MOUNT: &str = "anvil";

#[derive(Clone, Debug)]
pub struct VaultConfig {
    /// Vault server URL, from `VAULT_ADDR`.
    pub address: String,
    /// Vault access token, from `VAULT_TOKEN`.
    pub token: String,
    /// Top-level KV v2 mount prefix.
    pub mount: String,
}

impl VaultConfig {
    pub fn new(address: impl Into<String>, token: impl Into<String>) -> Self {
        VaultConfig {
            address: address.into(),
            token: token.into(),
            mount: DEFAULT_MOUNT.to_string(),
        }
    }
}

pub struct VaultCredentialProvider {
    client: VaultClient,
    mount: String,
}

impl VaultCredentialProvider {
    pub fn new(config: &VaultConfig) -> Result<Self, SecretsError> {
        let settings = VaultClientSettingsBuilder::default()
            .address(&config.address)
            .token(&config.token)
            .build()
            .wrap_err("invalid vault client settings")?;
        let client = VaultClient::new(settings).wrap_err("unable to build vault client")?;
        Ok(VaultCredentialProvider {
            client,
            mount: config.mount.clone(),
        })
    }

    /// Ensures the KV v2 engine is mounted. Idempotent: an existing mount at
    /// the configured prefix is detected and left alone.
    pub async fn start(&self) -> Result<(), SecretsError> {
        let mounts = vaultrs::sys::mount::list(&self.client)
            .await
            .wrap_err("unable to list vault mounts")?;
        let mount_key = format!("{}/", self.mount);
        if mounts.contains_key(&mount_key) {
            tracing::debug!(mount = %self.mount, "vault secret engine already mounted");
            return Ok(());
        }

        tracing::info!(mount = %self.mount, "mounting vault kv-v2 secret engine");
        vaultrs::sys::mount::enable(&self.client, &self.mount, "kv-v2", None)
            .await
            .wrap_err("unable to mount vault kv-v2 engine")?;
        Ok(())
    }

    fn classify(key: &CredentialKey, err: ClientError) -> SecretsError {
        match err {
            ClientError::APIError { code: 404, .. } => {
                SecretsError::NotFound(key.storage_path())
            }
            other => SecretsError::GenericError(eyre::eyre!(other)),
        }
    }
}

#[async_trait::async_trait]
impl CredentialProvider for VaultCredentialProvider {
    async fn set_credentials(
        &self,
        key: &CredentialKey,
        credentials: &Credentials,
    ) -> Result<(), SecretsError> {
        if !credentials.is_valid() {
            return Err(SecretsError::InvalidCredential);
        }
        let stored = StoredCredential::from(credentials);
        vaultrs::kv2::set(&self.client, &self.mount, &key.storage_path(), &stored)
            .await
            .map_err(|e| Self::classify(key, e))?;
        Ok(())
    }

    async fn get_credentials(&self, key: &CredentialKey) -> Result<Credentials, SecretsError> {
        let stored: StoredCredential =
            vaultrs::kv2::read(&self.client, &self.mount, &key.storage_path())
                .await
                .map_err(|e| Self::classify(key, e))?;
        Ok(stored.into())
    }

    async fn patch_credentials(
        &self,
        key: &CredentialKey,
        credentials: &Credentials,
    ) -> Result<(), SecretsError> {
        if !credentials.is_valid() {
            return Err(SecretsError::InvalidCredential);
        }
        // Read first so that patching a never-stored key reports NotFound
        // instead of silently creating it.
        let _: StoredCredential =
            vaultrs::kv2::read(&self.client, &self.mount, &key.storage_path())
                .await
                .map_err(|e| Self::classify(key, e))?;
        let stored = StoredCredential::from(credentials);
        vaultrs::kv2::set(&self.client, &self.mount, &key.storage_path(), &stored)
            .await
            .map_err(|e| Self::classify(key, e))?;
        Ok(())
    }

    async fn delete_credentials(&self, key: &CredentialKey) -> Result<(), SecretsError> {
        vaultrs::kv2::delete_metadata(&self.client, &self.mount, &key.storage_path())
            .await
            .map_err(|e| Self::classify(key, e))?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<MacAddress>, SecretsError> {
        let entries = match vaultrs::kv2::list(&self.client, &self.mount, "pmc").await {
            Ok(entries) => entries,
            // An empty prefix lists as 404 on KV v2
            Err(ClientError::APIError { code: 404, .. }) => Vec::new(),
            Err(other) => return Err(SecretsError::GenericError(eyre::eyre!(other))),
        };

        let mut macs = Vec::with_capacity(entries.len());
        for entry in entries {
            match MacAddress::from_str(&entry) {
                Ok(mac) => macs.push(mac),
                Err(_) => {
                    tracing::warn!(%entry, "ignoring non-MAC key under pmc/ prefix");
                }
            }
        }
        macs.sort_by_key(|m| m.bytes());
        Ok(macs)
    }
}
