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
use std::fmt::Display;

pub use crate::vault::{VaultConfig, VaultCredentialProvider};

pub mod credentials;
pub mod vault;

#[derive(Debug)]
pub enum SecretsError {
    /// The credential has an empty username or secret.
    InvalidCredential,
    /// No secret is stored under the given key.
    NotFound(String),
    GenericError(eyre::Report),
}

impl Display for SecretsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretsError::InvalidCredential => {
                write!(f, "Credential must have a non-empty user and secret")
            }
            SecretsError::NotFound(key) => {
                write!(f, "No credential stored under {}", key)
            }
            SecretsError::GenericError(report) => {
                write!(f, "Secrets operation failed: {}", report)
            }
        }
    }
}

impl std::error::Error for SecretsError {}

impl From<eyre::Report> for SecretsError {
    fn from(value: eyre::Report) -> Self {
        SecretsError::GenericError(value)
    }
}
