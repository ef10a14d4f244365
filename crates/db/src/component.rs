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

//! The `component` table. Same soft-delete discipline as `rack`.
//!
//! The referenced rack must exist at insert time; cascading rules are
//! enforced by the reconciler, not the database.

use model::component::{Component, PowerState};
use model::ids::{ComponentId, RackId};
use sqlx::PgConnection;

use crate::{DatabaseError, DatabaseResult};

const SQL_VIOLATION_DUPLICATE_SERIAL: &str = "component_manufacturer_serial_number_key";

pub async fn create(txn: &mut PgConnection, component: &Component) -> DatabaseResult<Component> {
    if component.serial_number.is_empty() {
        return Err(DatabaseError::MissingArgument("serial_number"));
    }

    // The rack reference is validated here rather than by a foreign key so
    // that soft-deleted racks also reject new components.
    if let Some(rack_id) = component.rack_id {
        crate::rack::find_by_id(&mut *txn, rack_id).await?;
    }

    let query = "INSERT INTO component
            (id, name, component_type, manufacturer, serial_number, model, description,
             firmware_version, rack_id, slot_id, tray_index, host_id, external_id,
             power_state, bmcs)
            VALUES ($1, $2, $3, $4, $5, $6, $7::jsonb, $8, $9, $10, $11, $12, $13, $14, $15::jsonb)
            RETURNING *";

    sqlx::query_as(query)
        .bind(component.id)
        .bind(&component.name)
        .bind(component.component_type.as_str())
        .bind(&component.manufacturer)
        .bind(&component.serial_number)
        .bind(&component.model)
        .bind(sqlx::types::Json(&component.description))
        .bind(&component.firmware_version)
        .bind(component.rack_id)
        .bind(component.slot_id)
        .bind(component.tray_index)
        .bind(&component.host_id)
        .bind(&component.external_id)
        .bind(component.power_state.as_str())
        .bind(sqlx::types::Json(&component.bmcs))
        .fetch_one(txn)
        .await
        .map_err(|err| {
            DatabaseError::classify_unique(
                query,
                err,
                &[(SQL_VIOLATION_DUPLICATE_SERIAL, "Component")],
                &format!("{}/{}", component.manufacturer, component.serial_number),
            )
        })
}

pub async fn find_by_id(
    txn: &mut PgConnection,
    component_id: ComponentId,
) -> DatabaseResult<Component> {
    let query = "SELECT * FROM component WHERE id=$1 AND deleted_at IS NULL";
    sqlx::query_as(query)
        .bind(component_id)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))?
        .ok_or_else(|| DatabaseError::NotFoundError {
            kind: "Component",
            id: component_id.to_string(),
        })
}

pub async fn find_by_serial(
    txn: &mut PgConnection,
    manufacturer: &str,
    serial_number: &str,
) -> DatabaseResult<Component> {
    let query = "SELECT * FROM component
            WHERE manufacturer=$1 AND serial_number=$2 AND deleted_at IS NULL";
    sqlx::query_as(query)
        .bind(manufacturer)
        .bind(serial_number)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))?
        .ok_or_else(|| DatabaseError::NotFoundError {
            kind: "Component",
            id: format!("{manufacturer}/{serial_number}"),
        })
}

/// Components may carry serials that are only unique per manufacturer; the
/// external-ID link is keyed by bare serial, so ambiguity is an error.
pub async fn find_by_bare_serial(
    txn: &mut PgConnection,
    serial_number: &str,
) -> DatabaseResult<Component> {
    let query = "SELECT * FROM component WHERE serial_number=$1 AND deleted_at IS NULL";
    let mut components: Vec<Component> = sqlx::query_as(query)
        .bind(serial_number)
        .fetch_all(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))?;

    match components.len() {
        0 => Err(DatabaseError::NotFoundError {
            kind: "Component",
            id: serial_number.to_string(),
        }),
        1 => Ok(components.swap_remove(0)),
        _ => Err(DatabaseError::FailedPrecondition(format!(
            "serial number {serial_number} is ambiguous across manufacturers"
        ))),
    }
}

pub async fn find_by_external_id(
    txn: &mut PgConnection,
    external_id: &str,
) -> DatabaseResult<Component> {
    let query = "SELECT * FROM component WHERE external_id=$1 AND deleted_at IS NULL";
    sqlx::query_as(query)
        .bind(external_id)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))?
        .ok_or_else(|| DatabaseError::NotFoundError {
            kind: "Component",
            id: external_id.to_string(),
        })
}

pub async fn list_by_rack(
    txn: &mut PgConnection,
    rack_id: RackId,
) -> DatabaseResult<Vec<Component>> {
    let query =
        "SELECT * FROM component WHERE rack_id=$1 AND deleted_at IS NULL ORDER BY slot_id, name";
    sqlx::query_as(query)
        .bind(rack_id)
        .fetch_all(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))
}

/// Persists the patchable fields of an already-merged component (the output
/// of `Component::build_patch`).
pub async fn apply_patch(
    txn: &mut PgConnection,
    patched: &Component,
) -> DatabaseResult<Component> {
    if let Some(rack_id) = patched.rack_id {
        crate::rack::find_by_id(&mut *txn, rack_id).await?;
    }

    let query = "UPDATE component SET
                description=$2::jsonb, firmware_version=$3, rack_id=$4, slot_id=$5,
                tray_index=$6, host_id=$7, updated_at=NOW()
            WHERE id=$1 AND deleted_at IS NULL RETURNING *";
    sqlx::query_as(query)
        .bind(patched.id)
        .bind(sqlx::types::Json(&patched.description))
        .bind(&patched.firmware_version)
        .bind(patched.rack_id)
        .bind(patched.slot_id)
        .bind(patched.tray_index)
        .bind(&patched.host_id)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))?
        .ok_or_else(|| DatabaseError::NotFoundError {
            kind: "Component",
            id: patched.id.to_string(),
        })
}

/// One-shot link of a component to an external control plane, keyed by
/// serial. Re-linking an already-linked component is rejected.
pub async fn set_external_id_by_serial(
    txn: &mut PgConnection,
    serial_number: &str,
    external_id: &str,
) -> DatabaseResult<Component> {
    let current = find_by_bare_serial(&mut *txn, serial_number).await?;
    if let Some(existing) = &current.external_id {
        if existing != external_id {
            return Err(DatabaseError::FailedPrecondition(format!(
                "component {serial_number} is already linked to external ID {existing}"
            )));
        }
        return Ok(current);
    }

    let query = "UPDATE component SET external_id=$2, updated_at=NOW()
            WHERE id=$1 AND deleted_at IS NULL RETURNING *";
    sqlx::query_as(query)
        .bind(current.id)
        .bind(external_id)
        .fetch_one(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))
}

pub async fn set_power_state_by_external_id(
    txn: &mut PgConnection,
    external_id: &str,
    power_state: PowerState,
) -> DatabaseResult<Component> {
    let query = "UPDATE component SET power_state=$2, updated_at=NOW()
            WHERE external_id=$1 AND deleted_at IS NULL RETURNING *";
    sqlx::query_as(query)
        .bind(external_id)
        .bind(power_state.as_str())
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))?
        .ok_or_else(|| DatabaseError::NotFoundError {
            kind: "Component",
            id: external_id.to_string(),
        })
}

/// Idempotent ingestion upsert: refreshes the mutable columns of a row
/// matched by `(manufacturer, serial_number)` or inserts a fresh one, and
/// stamps `ingested_at`. Re-submitting the same inventory page is safe.
pub async fn upsert_ingested(
    txn: &mut PgConnection,
    component: &Component,
) -> DatabaseResult<Component> {
    match find_by_serial(&mut *txn, &component.manufacturer, &component.serial_number).await {
        Ok(existing) => {
            let query = "UPDATE component SET
                        name=$2, component_type=$3, model=$4, firmware_version=$5,
                        power_state=$6, bmcs=$7::jsonb, ingested_at=NOW(), updated_at=NOW()
                    WHERE id=$1 RETURNING *";
            sqlx::query_as(query)
                .bind(existing.id)
                .bind(&component.name)
                .bind(component.component_type.as_str())
                .bind(&component.model)
                .bind(&component.firmware_version)
                .bind(component.power_state.as_str())
                .bind(sqlx::types::Json(&component.bmcs))
                .fetch_one(txn)
                .await
                .map_err(|err| DatabaseError::query(query, err))
        }
        Err(err) if err.is_not_found() => {
            let created = create(&mut *txn, component).await?;
            let query = "UPDATE component SET ingested_at=NOW() WHERE id=$1 RETURNING *";
            sqlx::query_as(query)
                .bind(created.id)
                .fetch_one(txn)
                .await
                .map_err(|err| DatabaseError::query(query, err))
        }
        Err(err) => Err(err),
    }
}

pub async fn mark_as_deleted(
    component: &Component,
    txn: &mut PgConnection,
) -> DatabaseResult<Component> {
    let query = "UPDATE component SET updated_at=NOW(), deleted_at=NOW()
            WHERE id=$1 AND deleted_at IS NULL RETURNING *";
    sqlx::query_as(query)
        .bind(component.id)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))?
        .ok_or_else(|| DatabaseError::NotFoundError {
            kind: "Component",
            id: component.id.to_string(),
        })
}
