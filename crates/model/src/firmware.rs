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

//! Firmware versions, upgrade edges and the firmware update row model.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use mac_address::MacAddress;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::postgres::PgRow;

/// The component of a power shelf a firmware update targets.
///
/// Only the PMC itself is updatable today; PSU updates are reserved wire
/// surface. The column is free text so that new component kinds don't need
/// a schema change.
pub const PMC_COMPONENT: &str = "PMC";

/// A semantic PMC firmware version, canonically rendered as `r<maj>.<min>.<patch>`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FirmwareVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("firmware version string {0:?} is not of the form r<major>.<minor>.<patch>")]
pub struct FirmwareVersionParseError(pub String);

impl FromStr for FirmwareVersion {
    type Err = FirmwareVersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || FirmwareVersionParseError(s.to_string());
        let rest = s.strip_prefix('r').ok_or_else(err)?;
        let mut parts = rest.split('.');
        let mut next = || -> Result<u32, FirmwareVersionParseError> {
            let part = parts.next().ok_or_else(err)?;
            // Reject empty parts and anything non-numeric. `parse` alone
            // would admit a leading `+`.
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
            part.parse().map_err(|_| err())
        };
        let version = FirmwareVersion::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(version)
    }
}

impl Serialize for FirmwareVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FirmwareVersion {
    fn deserialize<D>(deserializer: D) -> Result<FirmwareVersion, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let str_value = String::deserialize(deserializer)?;
        FirmwareVersion::from_str(&str_value).map_err(|err| Error::custom(err.to_string()))
    }
}

/// A directed upgrade edge, derived from an artifact file whose name embeds
/// `…_r<a>.<b>.<c>_to_r<d>.<e>.<f>…`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FirmwareUpgrade {
    pub from: FirmwareVersion,
    pub to: FirmwareVersion,
    /// Absolute path of the artifact within the repository root.
    pub artifact_path: PathBuf,
}

/// The lifecycle state of a firmware update row.
///
/// Transitions are monotonic: `Queued → Verifying → Completed`, with
/// `Failed` reachable from any non-terminal state. `Completed` and `Failed`
/// are sticky.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FirmwareUpdateState {
    Queued,
    Verifying,
    Completed,
    Failed,
}

impl FirmwareUpdateState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether the state machine admits a transition from `self` to `next`.
    pub fn can_transition_to(self, next: FirmwareUpdateState) -> bool {
        use FirmwareUpdateState::*;
        match (self, next) {
            (Queued, Verifying) => true,
            (Verifying, Completed) => true,
            (Queued | Verifying, Failed) => true,
            _ => false,
        }
    }

    /// The stable text form stored in the `firmware_update.state` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Verifying => "verifying",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for FirmwareUpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone)]
#[error("unknown firmware update state {0:?}")]
pub struct FirmwareUpdateStateParseError(pub String);

impl FromStr for FirmwareUpdateState {
    type Err = FirmwareUpdateStateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "verifying" => Ok(Self::Verifying),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(FirmwareUpdateStateParseError(other.to_string())),
        }
    }
}

/// One firmware update per `(pmc_mac_address, component)`; re-queuing the
/// same key replaces the row.
#[derive(Clone, Debug, PartialEq)]
pub struct FirmwareUpdate {
    pub pmc_mac_address: MacAddress,
    pub component: String,
    pub version_from: FirmwareVersion,
    pub version_to: FirmwareVersion,
    pub state: FirmwareUpdateState,
    pub last_transition_time: DateTime<Utc>,
    pub job_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FirmwareUpdate {
    /// A fresh `Queued` row for an upgrade that is about to start.
    pub fn queued(
        pmc_mac_address: MacAddress,
        component: &str,
        version_from: FirmwareVersion,
        version_to: FirmwareVersion,
    ) -> Self {
        let now = Utc::now();
        FirmwareUpdate {
            pmc_mac_address,
            component: component.to_string(),
            version_from,
            version_to,
            state: FirmwareUpdateState::Queued,
            last_transition_time: now,
            job_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for FirmwareUpdate {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let parse_version = |column: &str| -> Result<FirmwareVersion, sqlx::Error> {
            let raw: String = row.try_get(column)?;
            raw.parse().map_err(|e| sqlx::Error::ColumnDecode {
                index: column.to_string(),
                source: Box::new(e),
            })
        };
        let raw_state: String = row.try_get("state")?;
        let state = raw_state
            .parse()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "state".to_string(),
                source: Box::new(e),
            })?;

        Ok(FirmwareUpdate {
            pmc_mac_address: row.try_get("pmc_mac_address")?,
            component: row.try_get("component")?,
            version_from: parse_version("version_from")?,
            version_to: parse_version("version_to")?,
            state,
            last_transition_time: row.try_get("last_transition_time")?,
            job_id: row.try_get("job_id")?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
