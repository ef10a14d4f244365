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

//! Projections of the Redfish resources the PMC adapter reads.
//!
//! These deliberately model only the subset of fields the control plane
//! consumes; unknown fields are ignored on deserialization so that firmware
//! revisions can add properties freely.

use serde::{Deserialize, Serialize};

/// `Status` common property carried by most Redfish resources.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ResourceStatus {
    pub state: Option<String>,
    pub health: Option<String>,
}

/// A reference to another resource, e.g. a collection member.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(rename = "@odata.id", default)]
    pub odata_id: String,
}

/// A Redfish collection body; only the member links matter to us.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Collection {
    #[serde(rename = "Members")]
    pub members: Vec<ResourceRef>,
}

/// The chassis resource of a power shelf.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Chassis {
    pub id: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub part_number: Option<String>,
    pub power_state: Option<String>,
    pub status: ResourceStatus,
    #[serde(rename = "@odata.id")]
    pub odata_id: String,
}

/// The manager (the PMC itself). `firmware_version` is the source of truth
/// for the running PMC firmware.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Manager {
    pub id: Option<String>,
    pub firmware_version: Option<String>,
    pub model: Option<String>,
    pub status: ResourceStatus,
    #[serde(rename = "@odata.id")]
    pub odata_id: String,
}

/// One PSU as reported under `Chassis/<id>/Power`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct PowerSupply {
    pub name: Option<String>,
    pub serial_number: Option<String>,
    pub model: Option<String>,
    pub firmware_version: Option<String>,
    pub status: ResourceStatus,
}

/// The `Power` resource body carrying the PSU list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Power {
    pub power_supplies: Vec<PowerSupply>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chassis_ignores_unknown_fields() {
        let chassis: Chassis = serde_json::from_value(serde_json::json!({
            "@odata.id": "/redfish/v1/Chassis/1",
            "Id": "1",
            "SerialNumber": "PSHELF-1",
            "Model": "LiteOn-2kW",
            "PowerState": "On",
            "Status": { "State": "Enabled", "Health": "OK" },
            "Thermal": { "unmodeled": true },
        }))
        .unwrap();

        assert_eq!(chassis.serial_number.as_deref(), Some("PSHELF-1"));
        assert_eq!(chassis.power_state.as_deref(), Some("On"));
        assert_eq!(chassis.status.health.as_deref(), Some("OK"));
    }

    #[test]
    fn test_collection_members() {
        let collection: Collection = serde_json::from_value(serde_json::json!({
            "Members": [
                { "@odata.id": "/redfish/v1/Managers/PMC" },
            ],
            "Members@odata.count": 1,
        }))
        .unwrap();
        assert_eq!(collection.members.len(), 1);
        assert_eq!(collection.members[0].odata_id, "/redfish/v1/Managers/PMC");
    }
}
