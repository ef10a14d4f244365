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

//! The `firmware_update` table: at most one row per `(pmc_mac_address,
//! component)`. All state transitions go through the composite primary key
//! so that a background sweep and a concurrent upsert serialize on the same
//! row lock.

use chrono::{DateTime, Utc};
use mac_address::MacAddress;
use model::firmware::{FirmwareUpdate, FirmwareUpdateState, FirmwareVersion};
use sqlx::PgConnection;

use crate::{DatabaseError, DatabaseResult};

/// Inserts a fresh `queued` row, replacing any previous row for the same
/// key. Replacing a non-terminal row is intentional: it lets an operator
/// re-aim a stuck update at a different target.
pub async fn upsert_queued(
    txn: &mut PgConnection,
    pmc_mac_address: MacAddress,
    component: &str,
    version_from: FirmwareVersion,
    version_to: FirmwareVersion,
) -> DatabaseResult<FirmwareUpdate> {
    let query = "INSERT INTO firmware_update
            (pmc_mac_address, component, version_from, version_to, state, last_transition_time)
            VALUES ($1::macaddr, $2, $3, $4, 'queued', NOW())
            ON CONFLICT (pmc_mac_address, component) DO UPDATE SET
                version_from = EXCLUDED.version_from,
                version_to = EXCLUDED.version_to,
                state = 'queued',
                last_transition_time = NOW(),
                job_id = NULL,
                error_message = NULL,
                updated_at = NOW()
            RETURNING *";

    sqlx::query_as(query)
        .bind(pmc_mac_address)
        .bind(component)
        .bind(version_from.to_string())
        .bind(version_to.to_string())
        .fetch_one(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))
}

pub async fn get(
    txn: &mut PgConnection,
    pmc_mac_address: MacAddress,
    component: &str,
) -> DatabaseResult<FirmwareUpdate> {
    let query = "SELECT * FROM firmware_update WHERE pmc_mac_address=$1 AND component=$2";
    sqlx::query_as(query)
        .bind(pmc_mac_address)
        .bind(component)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))?
        .ok_or_else(|| DatabaseError::NotFoundError {
            kind: "FirmwareUpdate",
            id: format!("{pmc_mac_address}/{component}"),
        })
}

/// Moves a row to `new_state` in one UPDATE guarded by the primary key.
///
/// The WHERE clause re-checks that the current state actually admits the
/// transition, so two racers cannot both move the same row; the loser sees
/// `FailedPrecondition`. `last_transition_time` advances only when the state
/// really changes, `updated_at` always does.
pub async fn transition(
    txn: &mut PgConnection,
    pmc_mac_address: MacAddress,
    component: &str,
    new_state: FirmwareUpdateState,
    job_id: Option<&str>,
    error_message: Option<&str>,
) -> DatabaseResult<FirmwareUpdate> {
    let admissible_sources: Vec<&str> = [
        FirmwareUpdateState::Queued,
        FirmwareUpdateState::Verifying,
        FirmwareUpdateState::Completed,
        FirmwareUpdateState::Failed,
    ]
    .into_iter()
    .filter(|from| from.can_transition_to(new_state))
    .map(|from| from.as_str())
    .collect();

    if admissible_sources.is_empty() {
        return Err(DatabaseError::FailedPrecondition(format!(
            "no state admits a transition to {new_state}"
        )));
    }

    let query = "UPDATE firmware_update SET
                state = $3,
                last_transition_time = CASE WHEN state <> $3 THEN NOW() ELSE last_transition_time END,
                job_id = COALESCE($4, job_id),
                error_message = $5,
                updated_at = NOW()
            WHERE pmc_mac_address = $1 AND component = $2 AND state = ANY($6)
            RETURNING *";

    let updated: Option<FirmwareUpdate> = sqlx::query_as(query)
        .bind(pmc_mac_address)
        .bind(component)
        .bind(new_state.as_str())
        .bind(job_id)
        .bind(error_message)
        .bind(&admissible_sources)
        .fetch_optional(&mut *txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))?;

    match updated {
        Some(row) => Ok(row),
        None => {
            // Distinguish a missing row from an inadmissible transition.
            let current = get(&mut *txn, pmc_mac_address, component).await?;
            Err(DatabaseError::FailedPrecondition(format!(
                "firmware update for {pmc_mac_address}/{component} is {} and cannot move to {new_state}",
                current.state
            )))
        }
    }
}

/// `verifying` rows whose last transition is older than the cutoff; the
/// supervisory sweep fails these.
pub async fn list_stale_verifying(
    txn: &mut PgConnection,
    cutoff: DateTime<Utc>,
) -> DatabaseResult<Vec<FirmwareUpdate>> {
    let query = "SELECT * FROM firmware_update
            WHERE state = 'verifying' AND last_transition_time < $1
            ORDER BY created_at DESC";
    sqlx::query_as(query)
        .bind(cutoff)
        .fetch_all(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))
}

pub async fn list_by_state(
    txn: &mut PgConnection,
    state: FirmwareUpdateState,
) -> DatabaseResult<Vec<FirmwareUpdate>> {
    let query = "SELECT * FROM firmware_update WHERE state = $1 ORDER BY created_at DESC";
    sqlx::query_as(query)
        .bind(state.as_str())
        .fetch_all(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))
}
