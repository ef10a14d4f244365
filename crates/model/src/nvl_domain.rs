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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::postgres::PgRow;

use crate::ids::NvlDomainId;

/// A logical grouping of racks sharing an NVLink topology.
///
/// Membership is carried on the rack side (`rack.nvl_domain_id`); the
/// relation is modeled as id-valued references with explicit lookup, never
/// as owning back-pointers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NvlDomain {
    pub id: NvlDomainId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for NvlDomain {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(NvlDomain {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
