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

//! The `nvldomain` table. Rack membership lives on the rack side
//! (`rack.nvl_domain_id`).

use model::ids::{NvlDomainId, RackId};
use model::nvl_domain::NvlDomain;
use sqlx::PgConnection;

use crate::{DatabaseError, DatabaseResult};

const SQL_VIOLATION_DUPLICATE_NAME: &str = "nvldomain_name_key";

pub async fn create(txn: &mut PgConnection, name: &str) -> DatabaseResult<NvlDomain> {
    if name.is_empty() {
        return Err(DatabaseError::MissingArgument("name"));
    }

    let query = "INSERT INTO nvldomain (id, name) VALUES ($1, $2) RETURNING *";
    sqlx::query_as(query)
        .bind(NvlDomainId::new())
        .bind(name)
        .fetch_one(txn)
        .await
        .map_err(|err| {
            DatabaseError::classify_unique(
                query,
                err,
                &[(SQL_VIOLATION_DUPLICATE_NAME, "NVLDomain")],
                name,
            )
        })
}

pub async fn find_by_id(
    txn: &mut PgConnection,
    nvl_domain_id: NvlDomainId,
) -> DatabaseResult<NvlDomain> {
    let query = "SELECT * FROM nvldomain WHERE id=$1";
    sqlx::query_as(query)
        .bind(nvl_domain_id)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))?
        .ok_or_else(|| DatabaseError::NotFoundError {
            kind: "NVLDomain",
            id: nvl_domain_id.to_string(),
        })
}

pub async fn list(txn: &mut PgConnection) -> DatabaseResult<Vec<NvlDomain>> {
    let query = "SELECT * FROM nvldomain ORDER BY name";
    sqlx::query_as(query)
        .fetch_all(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))
}

/// Attaches the racks to the domain. Every rack must exist; a rack already
/// attached to a different domain is rejected so that membership moves are
/// always explicit detach-then-attach.
pub async fn attach_racks(
    txn: &mut PgConnection,
    nvl_domain_id: NvlDomainId,
    rack_ids: &[RackId],
) -> DatabaseResult<()> {
    find_by_id(&mut *txn, nvl_domain_id).await?;

    for rack_id in rack_ids {
        let rack = crate::rack::find_by_id(&mut *txn, *rack_id).await?;
        match rack.nvl_domain_id {
            Some(existing) if existing != nvl_domain_id => {
                return Err(DatabaseError::FailedPrecondition(format!(
                    "rack {rack_id} is already attached to NVL domain {existing}"
                )));
            }
            Some(_) => {} // already attached here, idempotent
            None => {
                crate::rack::set_nvl_domain(&mut *txn, *rack_id, Some(nvl_domain_id)).await?;
            }
        }
    }

    Ok(())
}

/// Detaches the racks from the domain; detaching a rack that isn't attached
/// to it is rejected.
pub async fn detach_racks(
    txn: &mut PgConnection,
    nvl_domain_id: NvlDomainId,
    rack_ids: &[RackId],
) -> DatabaseResult<()> {
    find_by_id(&mut *txn, nvl_domain_id).await?;

    for rack_id in rack_ids {
        let rack = crate::rack::find_by_id(&mut *txn, *rack_id).await?;
        if rack.nvl_domain_id != Some(nvl_domain_id) {
            return Err(DatabaseError::FailedPrecondition(format!(
                "rack {rack_id} is not attached to NVL domain {nvl_domain_id}"
            )));
        }
        crate::rack::set_nvl_domain(&mut *txn, *rack_id, None).await?;
    }

    Ok(())
}
