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

//! The expected-inventory rack model.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::postgres::PgRow;

use crate::component::Component;
use crate::ids::{NvlDomainId, RackId};

/// Rack ingestion lifecycle: `new → ingesting → ingested`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RackStatus {
    #[default]
    New,
    Ingesting,
    Ingested,
}

impl RackStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Ingesting => "ingesting",
            Self::Ingested => "ingested",
        }
    }
}

impl fmt::Display for RackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone)]
#[error("unknown rack status {0:?}")]
pub struct RackStatusParseError(pub String);

impl FromStr for RackStatus {
    type Err = RackStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "ingesting" => Ok(Self::Ingesting),
            "ingested" => Ok(Self::Ingested),
            other => Err(RackStatusParseError(other.to_string())),
        }
    }
}

/// A physical rack in the expected-inventory model.
///
/// `name` is unique, and `(manufacturer, serial_number)` is jointly unique
/// among undeleted rows. A soft-deleted rack keeps its row with `deleted_at`
/// set and is excluded from every read.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rack {
    pub id: RackId,
    pub name: String,
    pub manufacturer: String,
    pub serial_number: String,
    pub description: HashMap<String, String>,
    pub location: HashMap<String, String>,
    pub nvl_domain_id: Option<NvlDomainId>,
    pub status: RackStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ingested_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    /// Populated only when the caller asked for components.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
}

impl Rack {
    pub fn is_marked_as_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Computes the patched rack for an incoming update over the patchable
    /// field set (`name`, `description`, `location`).
    ///
    /// Incoming fields at their zero value are treated as "unset" and do not
    /// clear the current value. Maps are compared by deep equality and
    /// copied whole when different. Returns `None` iff nothing changed.
    pub fn build_patch(&self, incoming: &Rack) -> Option<Rack> {
        let mut patched = self.clone();
        let mut changed = false;

        if !incoming.name.is_empty() && incoming.name != self.name {
            patched.name = incoming.name.clone();
            changed = true;
        }
        if !incoming.description.is_empty() && incoming.description != self.description {
            patched.description = incoming.description.clone();
            changed = true;
        }
        if !incoming.location.is_empty() && incoming.location != self.location {
            patched.location = incoming.location.clone();
            changed = true;
        }

        changed.then_some(patched)
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for Rack {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let description: sqlx::types::Json<HashMap<String, String>> =
            row.try_get("description")?;
        let location: sqlx::types::Json<HashMap<String, String>> = row.try_get("location")?;
        let raw_status: String = row.try_get("status")?;
        let status = raw_status.parse().map_err(|e| sqlx::Error::ColumnDecode {
            index: "status".to_string(),
            source: Box::new(e),
        })?;

        Ok(Rack {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            manufacturer: row.try_get("manufacturer")?,
            serial_number: row.try_get("serial_number")?,
            description: description.0,
            location: location.0,
            nvl_domain_id: row.try_get("nvl_domain_id")?,
            status,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            ingested_at: row.try_get("ingested_at")?,
            deleted_at: row.try_get("deleted_at")?,
            components: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rack() -> Rack {
        Rack {
            id: RackId::new(),
            name: "R1".to_string(),
            manufacturer: "NVIDIA".to_string(),
            serial_number: "RACK-SN-001".to_string(),
            description: HashMap::from([("owner".to_string(), "a".to_string())]),
            location: HashMap::from([("hall".to_string(), "H2".to_string())]),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_patch_nil_law() {
        let r = rack();
        assert!(r.build_patch(&r.clone()).is_none());
    }

    #[test]
    fn test_build_patch_empty_incoming_is_noop() {
        let r = rack();
        assert!(r.build_patch(&Rack::default()).is_none());
    }

    // Empty incoming name must not clear the current name, while a changed
    // description map is copied whole.
    #[test]
    fn test_build_patch_zero_fields_are_unset() {
        let r = rack();
        let incoming = Rack {
            name: String::new(),
            description: HashMap::from([("owner".to_string(), "b".to_string())]),
            ..Default::default()
        };

        let patched = r.build_patch(&incoming).expect("description changed");
        assert_eq!(patched.name, "R1");
        assert_eq!(patched.description.get("owner").unwrap(), "b");
        assert_eq!(patched.location, r.location);
    }

    #[test]
    fn test_build_patch_applied_yields_incoming_on_patchable_subset() {
        let r = rack();
        let incoming = Rack {
            name: "R2".to_string(),
            description: HashMap::from([("owner".to_string(), "b".to_string())]),
            location: HashMap::from([("hall".to_string(), "H3".to_string())]),
            ..Default::default()
        };

        let patched = r.build_patch(&incoming).unwrap();
        assert_eq!(patched.name, incoming.name);
        assert_eq!(patched.description, incoming.description);
        assert_eq!(patched.location, incoming.location);
        // Non-patchable fields are untouched
        assert_eq!(patched.serial_number, r.serial_number);
        assert_eq!(patched.status, r.status);
    }
}
