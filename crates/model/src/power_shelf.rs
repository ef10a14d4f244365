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

use serde::{Deserialize, Serialize};

use crate::pmc::Pmc;
use crate::redfish::{Chassis, Manager, PowerSupply};

/// A point-in-time projection of a power shelf, assembled from the registry
/// entry and a lightweight Redfish read. Never persisted; the snapshot cache
/// republishes a fresh one every sweep.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerShelf {
    pub pmc: Option<Pmc>,
    pub chassis: Option<Chassis>,
    pub manager: Option<Manager>,
    pub power_supplies: Vec<PowerSupply>,
}

impl PowerShelf {
    /// The PMC firmware version as reported by the manager resource, if the
    /// last sweep managed to read it.
    pub fn firmware_version(&self) -> Option<&str> {
        self.manager.as_ref()?.firmware_version.as_deref()
    }
}
