/*
 * SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: LicenseRef-NvidiaProprietary
 *
 * NVIDIA CORPORATION, its affiliates and licensors retain all intellectual
 * property and proprietary rights in and to this material, related
 * documentation and any modifications thereto. Any use, reproduction,
 * disclosure or distribution of this material and related documentation
 * without an express license agreement from NVIDIA CORPORATION or
 * its affiliates is strictly prohibited.
 */

//! Inventory pages published from site agents to the cloud side.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kinds of site-local inventory the publisher pages through. Only
/// expected machines exist today; rack and component kinds slot in here.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InventoryKind {
    ExpectedMachine,
}

impl InventoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExpectedMachine => "expected-machine",
        }
    }
}

impl fmt::Display for InventoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone)]
#[error("unknown inventory kind {0:?}")]
pub struct InventoryKindParseError(pub String);

impl FromStr for InventoryKind {
    type Err = InventoryKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expected-machine" => Ok(Self::ExpectedMachine),
            other => Err(InventoryKindParseError(other.to_string())),
        }
    }
}

/// One discovered inventory item as reported by a site device controller.
/// The payload is an opaque JSON document in the controller's schema; the
/// cloud-side ingestor interprets it per kind.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: String,
    pub serial_number: String,
    pub kind: String,
    pub payload_json: String,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    #[default]
    Success,
    Failure,
}

impl PageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// One page of a publication run.
///
/// `current_page` is 1-indexed and strictly increasing within a run;
/// `total_pages` and `total_items` are fixed for the whole run, and the
/// union of `item_ids` over all pages equals the discovered ID set. A run
/// always produces at least one page, possibly empty, so that the cloud
/// side can observe failed or empty sweeps.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryPage {
    pub current_page: u32,
    pub total_pages: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub item_ids: Vec<String>,
    pub items: Vec<InventoryItem>,
    pub status: PageStatus,
    pub status_message: String,
}
