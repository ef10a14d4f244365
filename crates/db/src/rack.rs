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

//! The `rack` table. Soft-deleted rows (`deleted_at IS NOT NULL`) are
//! excluded from every read; the uniqueness of `name` and of
//! `(manufacturer, serial_number)` is enforced by partial unique indexes
//! over the undeleted rows.

use model::ids::{NvlDomainId, RackId};
use model::rack::{Rack, RackStatus};
use sqlx::PgConnection;

use crate::{DatabaseError, DatabaseResult};

const SQL_VIOLATION_DUPLICATE_NAME: &str = "rack_name_key";
const SQL_VIOLATION_DUPLICATE_SERIAL: &str = "rack_manufacturer_serial_number_key";

/// Filters for [`list`]. `None` fields don't constrain the result.
#[derive(Clone, Debug, Default)]
pub struct RackFilter {
    pub name: Option<String>,
    pub nvl_domain_id: Option<NvlDomainId>,
}

#[derive(Clone, Copy, Debug)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            limit: 100,
            offset: 0,
        }
    }
}

pub async fn create(txn: &mut PgConnection, rack: &Rack) -> DatabaseResult<Rack> {
    if rack.serial_number.is_empty() {
        return Err(DatabaseError::MissingArgument("serial_number"));
    }
    if rack.name.is_empty() {
        return Err(DatabaseError::MissingArgument("name"));
    }

    let query = "INSERT INTO rack
            (id, name, manufacturer, serial_number, description, location, nvl_domain_id, status)
            VALUES ($1, $2, $3, $4, $5::jsonb, $6::jsonb, $7, $8) RETURNING *";

    sqlx::query_as(query)
        .bind(rack.id)
        .bind(&rack.name)
        .bind(&rack.manufacturer)
        .bind(&rack.serial_number)
        .bind(sqlx::types::Json(&rack.description))
        .bind(sqlx::types::Json(&rack.location))
        .bind(rack.nvl_domain_id)
        .bind(rack.status.as_str())
        .fetch_one(txn)
        .await
        .map_err(|err| {
            DatabaseError::classify_unique(
                query,
                err,
                &[
                    (SQL_VIOLATION_DUPLICATE_NAME, "Rack name"),
                    (SQL_VIOLATION_DUPLICATE_SERIAL, "Rack"),
                ],
                &format!("{}/{}", rack.manufacturer, rack.serial_number),
            )
        })
}

pub async fn find_by_id(txn: &mut PgConnection, rack_id: RackId) -> DatabaseResult<Rack> {
    let query = "SELECT * FROM rack WHERE id=$1 AND deleted_at IS NULL";
    sqlx::query_as(query)
        .bind(rack_id)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))?
        .ok_or_else(|| DatabaseError::NotFoundError {
            kind: "Rack",
            id: rack_id.to_string(),
        })
}

pub async fn find_by_name(txn: &mut PgConnection, name: &str) -> DatabaseResult<Rack> {
    let query = "SELECT * FROM rack WHERE name=$1 AND deleted_at IS NULL";
    sqlx::query_as(query)
        .bind(name)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))?
        .ok_or_else(|| DatabaseError::NotFoundError {
            kind: "Rack",
            id: name.to_string(),
        })
}

pub async fn find_by_serial(
    txn: &mut PgConnection,
    manufacturer: &str,
    serial_number: &str,
) -> DatabaseResult<Rack> {
    let query =
        "SELECT * FROM rack WHERE manufacturer=$1 AND serial_number=$2 AND deleted_at IS NULL";
    sqlx::query_as(query)
        .bind(manufacturer)
        .bind(serial_number)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))?
        .ok_or_else(|| DatabaseError::NotFoundError {
            kind: "Rack",
            id: format!("{manufacturer}/{serial_number}"),
        })
}

/// Lists undeleted racks matching the filter, newest first, and the total
/// count disregarding pagination.
pub async fn list(
    txn: &mut PgConnection,
    filter: &RackFilter,
    pagination: Pagination,
) -> DatabaseResult<(Vec<Rack>, u64)> {
    let query = "SELECT * FROM rack
            WHERE deleted_at IS NULL
                AND ($1::text IS NULL OR name = $1)
                AND ($2::uuid IS NULL OR nvl_domain_id = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4";
    let racks: Vec<Rack> = sqlx::query_as(query)
        .bind(&filter.name)
        .bind(filter.nvl_domain_id)
        .bind(pagination.limit)
        .bind(pagination.offset)
        .fetch_all(&mut *txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))?;

    let count_query = "SELECT COUNT(*) FROM rack
            WHERE deleted_at IS NULL
                AND ($1::text IS NULL OR name = $1)
                AND ($2::uuid IS NULL OR nvl_domain_id = $2)";
    let (total,): (i64,) = sqlx::query_as(count_query)
        .bind(&filter.name)
        .bind(filter.nvl_domain_id)
        .fetch_one(txn)
        .await
        .map_err(|err| DatabaseError::query(count_query, err))?;

    Ok((racks, total as u64))
}

/// Persists the patchable fields of an already-merged rack (the output of
/// `Rack::build_patch`).
pub async fn apply_patch(txn: &mut PgConnection, patched: &Rack) -> DatabaseResult<Rack> {
    let query = "UPDATE rack SET
                name=$2, description=$3::jsonb, location=$4::jsonb, updated_at=NOW()
            WHERE id=$1 AND deleted_at IS NULL RETURNING *";
    sqlx::query_as(query)
        .bind(patched.id)
        .bind(&patched.name)
        .bind(sqlx::types::Json(&patched.description))
        .bind(sqlx::types::Json(&patched.location))
        .fetch_optional(txn)
        .await
        .map_err(|err| {
            DatabaseError::classify_unique(
                query,
                err,
                &[(SQL_VIOLATION_DUPLICATE_NAME, "Rack name")],
                &patched.name,
            )
        })?
        .ok_or_else(|| DatabaseError::NotFoundError {
            kind: "Rack",
            id: patched.id.to_string(),
        })
}

/// Drives the `new → ingesting → ingested` lifecycle; `ingested_at` is
/// stamped on the final transition.
pub async fn set_status(
    txn: &mut PgConnection,
    rack_id: RackId,
    status: RackStatus,
) -> DatabaseResult<Rack> {
    let query = "UPDATE rack SET
                status=$2,
                ingested_at = CASE WHEN $2 = 'ingested' THEN NOW() ELSE ingested_at END,
                updated_at=NOW()
            WHERE id=$1 AND deleted_at IS NULL RETURNING *";
    sqlx::query_as(query)
        .bind(rack_id)
        .bind(status.as_str())
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))?
        .ok_or_else(|| DatabaseError::NotFoundError {
            kind: "Rack",
            id: rack_id.to_string(),
        })
}

pub async fn set_nvl_domain(
    txn: &mut PgConnection,
    rack_id: RackId,
    nvl_domain_id: Option<NvlDomainId>,
) -> DatabaseResult<Rack> {
    let query = "UPDATE rack SET nvl_domain_id=$2, updated_at=NOW()
            WHERE id=$1 AND deleted_at IS NULL RETURNING *";
    sqlx::query_as(query)
        .bind(rack_id)
        .bind(nvl_domain_id)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))?
        .ok_or_else(|| DatabaseError::NotFoundError {
            kind: "Rack",
            id: rack_id.to_string(),
        })
}

pub async fn list_by_nvl_domain(
    txn: &mut PgConnection,
    nvl_domain_id: NvlDomainId,
) -> DatabaseResult<Vec<Rack>> {
    let query =
        "SELECT * FROM rack WHERE nvl_domain_id=$1 AND deleted_at IS NULL ORDER BY name";
    sqlx::query_as(query)
        .bind(nvl_domain_id)
        .fetch_all(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))
}

pub async fn mark_as_deleted(rack: &Rack, txn: &mut PgConnection) -> DatabaseResult<Rack> {
    let query = "UPDATE rack SET updated_at=NOW(), deleted_at=NOW()
            WHERE id=$1 AND deleted_at IS NULL RETURNING *";
    sqlx::query_as(query)
        .bind(rack.id)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))?
        .ok_or_else(|| DatabaseError::NotFoundError {
            kind: "Rack",
            id: rack.id.to_string(),
        })
}
