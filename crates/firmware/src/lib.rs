/*
 * SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: LicenseRef-NvidiaProprietary
 *
 * NVIDIA CORPORATION, its affiliates and licensors retain all intellectual
 * property and proprietary rights in and to this material, related
 * documentation and any modifications thereto. Any use, reproduction,
 * disclosure or distribution of this material and related documentation
 * without an express license agreement from NVIDIA CORPORATION or
 * its affiliates is strictly prohibited.
 */

//! The vendor-partitioned firmware artifact repository and the per-vendor
//! upgrade rule engine.

pub mod repository;
pub mod rules;

pub use repository::Repository;
pub use rules::{UpgradeRule, rule_for, select_edge};

#[derive(thiserror::Error, Debug)]
pub enum FirmwareError {
    #[error("firmware repository root {0} is not a readable directory")]
    BadRoot(String),

    #[error("unable to open firmware artifact {path}: {source}")]
    OpenArtifact {
        path: String,
        source: std::io::Error,
    },

    #[error("I/O error scanning firmware repository: {0}")]
    Scan(#[from] std::io::Error),
}
