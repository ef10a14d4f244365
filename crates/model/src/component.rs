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

//! Components populated into racks, and their BMC sub-entities.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use mac_address::MacAddress;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::postgres::PgRow;

use crate::ids::{ComponentId, RackId};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentType {
    #[default]
    Unknown,
    Compute,
    NvlSwitch,
    PowerShelf,
    TorSwitch,
    Ums,
    Cdu,
}

impl ComponentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Compute => "compute",
            Self::NvlSwitch => "nvlswitch",
            Self::PowerShelf => "powershelf",
            Self::TorSwitch => "torswitch",
            Self::Ums => "ums",
            Self::Cdu => "cdu",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone)]
#[error("unknown component type {0:?}")]
pub struct ComponentTypeParseError(pub String);

impl FromStr for ComponentType {
    type Err = ComponentTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(Self::Unknown),
            "compute" => Ok(Self::Compute),
            "nvlswitch" => Ok(Self::NvlSwitch),
            "powershelf" => Ok(Self::PowerShelf),
            "torswitch" => Ok(Self::TorSwitch),
            "ums" => Ok(Self::Ums),
            "cdu" => Ok(Self::Cdu),
            other => Err(ComponentTypeParseError(other.to_string())),
        }
    }
}

/// The last power state an external controller reported for a component.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    #[default]
    Unknown,
    On,
    Off,
}

impl PowerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone)]
#[error("unknown power state {0:?}")]
pub struct PowerStateParseError(pub String);

impl FromStr for PowerState {
    type Err = PowerStateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(Self::Unknown),
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            other => Err(PowerStateParseError(other.to_string())),
        }
    }
}

/// A baseboard management controller belonging to a component. Components
/// carry one or more of these; they are stored as a jsonb document on the
/// component row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bmc {
    pub mac_address: MacAddress,
    pub ip_address: Option<IpAddr>,
}

/// A device populated into a rack slot.
///
/// `(manufacturer, serial_number)` is jointly unique among undeleted rows.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub name: String,
    pub component_type: ComponentType,
    pub manufacturer: String,
    pub serial_number: String,
    pub model: String,
    pub description: HashMap<String, String>,
    pub firmware_version: String,
    pub rack_id: Option<RackId>,
    pub slot_id: Option<i32>,
    pub tray_index: Option<i32>,
    pub host_id: Option<String>,
    /// One-shot link to an external control plane's identifier, keyed by
    /// serial. Set once via the reconciler; never patched.
    pub external_id: Option<String>,
    pub power_state: PowerState,
    pub bmcs: Vec<Bmc>,
    pub ingested_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Component {
    pub fn is_marked_as_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Computes the patched component over the patchable field set
    /// (`description`, `firmware_version`, `rack_id`, `slot_id`,
    /// `tray_index`, `host_id`). Same unset semantics as
    /// [`crate::rack::Rack::build_patch`]: zero-valued incoming fields do not
    /// clear current values. Returns `None` iff nothing changed.
    pub fn build_patch(&self, incoming: &Component) -> Option<Component> {
        let mut patched = self.clone();
        let mut changed = false;

        if !incoming.description.is_empty() && incoming.description != self.description {
            patched.description = incoming.description.clone();
            changed = true;
        }
        if !incoming.firmware_version.is_empty()
            && incoming.firmware_version != self.firmware_version
        {
            patched.firmware_version = incoming.firmware_version.clone();
            changed = true;
        }
        if incoming.rack_id.is_some() && incoming.rack_id != self.rack_id {
            patched.rack_id = incoming.rack_id;
            changed = true;
        }
        if incoming.slot_id.is_some() && incoming.slot_id != self.slot_id {
            patched.slot_id = incoming.slot_id;
            changed = true;
        }
        if incoming.tray_index.is_some() && incoming.tray_index != self.tray_index {
            patched.tray_index = incoming.tray_index;
            changed = true;
        }
        if incoming.host_id.is_some() && incoming.host_id != self.host_id {
            patched.host_id = incoming.host_id.clone();
            changed = true;
        }

        changed.then_some(patched)
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for Component {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let description: sqlx::types::Json<HashMap<String, String>> =
            row.try_get("description")?;
        let bmcs: sqlx::types::Json<Vec<Bmc>> = row.try_get("bmcs")?;

        let component_type = row
            .try_get::<String, _>("component_type")?
            .parse()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "component_type".to_string(),
                source: Box::new(e),
            })?;
        let power_state = row
            .try_get::<String, _>("power_state")?
            .parse()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "power_state".to_string(),
                source: Box::new(e),
            })?;

        Ok(Component {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            component_type,
            manufacturer: row.try_get("manufacturer")?,
            serial_number: row.try_get("serial_number")?,
            model: row.try_get("model")?,
            description: description.0,
            firmware_version: row.try_get("firmware_version")?,
            rack_id: row.try_get("rack_id")?,
            slot_id: row.try_get("slot_id")?,
            tray_index: row.try_get("tray_index")?,
            host_id: row.try_get("host_id")?,
            external_id: row.try_get("external_id")?,
            power_state,
            bmcs: bmcs.0,
            ingested_at: row.try_get("ingested_at")?,
            deleted_at: row.try_get("deleted_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component() -> Component {
        Component {
            id: ComponentId::new(),
            name: "tray-3".to_string(),
            component_type: ComponentType::Compute,
            manufacturer: "NVIDIA".to_string(),
            serial_number: "C-SN-003".to_string(),
            model: "GB200".to_string(),
            firmware_version: "r1.0.0".to_string(),
            slot_id: Some(3),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_patch_nil_law() {
        let c = component();
        assert!(c.build_patch(&c.clone()).is_none());
        assert!(c.build_patch(&Component::default()).is_none());
    }

    #[test]
    fn test_build_patch_patchable_subset() {
        let c = component();
        let rack_id = RackId::new();
        let incoming = Component {
            firmware_version: "r1.1.0".to_string(),
            rack_id: Some(rack_id),
            tray_index: Some(7),
            ..Default::default()
        };

        let patched = c.build_patch(&incoming).unwrap();
        assert_eq!(patched.firmware_version, "r1.1.0");
        assert_eq!(patched.rack_id, Some(rack_id));
        assert_eq!(patched.tray_index, Some(7));
        // Unset incoming fields keep the current values
        assert_eq!(patched.slot_id, Some(3));
        assert_eq!(patched.name, c.name);
        // external_id is not patchable
        assert_eq!(patched.external_id, None);
    }
}
