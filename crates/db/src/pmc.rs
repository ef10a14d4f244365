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

//! The `pmc` table: one row per registered Power Management Controller.
//! MAC (primary key) and IP are each unique; vendor and MAC are immutable
//! after registration.

use ipnetwork::IpNetwork;
use mac_address::MacAddress;
use model::pmc::Pmc;
use sqlx::PgConnection;

use crate::{DatabaseError, DatabaseResult};

const SQL_VIOLATION_DUPLICATE_MAC: &str = "pmc_pkey";
const SQL_VIOLATION_DUPLICATE_IP: &str = "pmc_ip_address_key";

pub async fn create(txn: &mut PgConnection, pmc: &Pmc) -> DatabaseResult<Pmc> {
    let query = "INSERT INTO pmc (mac_address, vendor, ip_address)
            VALUES ($1::macaddr, $2, $3::inet) RETURNING *";

    sqlx::query_as(query)
        .bind(pmc.mac_address)
        .bind(pmc.vendor.as_i32())
        .bind(IpNetwork::from(pmc.ip_address))
        .fetch_one(txn)
        .await
        .map_err(|err| {
            DatabaseError::classify_unique(
                query,
                err,
                &[
                    (SQL_VIOLATION_DUPLICATE_MAC, "PMC"),
                    (SQL_VIOLATION_DUPLICATE_IP, "PMC IP"),
                ],
                &pmc.mac_address.to_string(),
            )
        })
}

pub async fn find_by_mac(
    txn: &mut PgConnection,
    mac_address: MacAddress,
) -> DatabaseResult<Pmc> {
    let query = "SELECT * FROM pmc WHERE mac_address=$1";
    sqlx::query_as(query)
        .bind(mac_address)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))?
        .ok_or_else(|| DatabaseError::NotFoundError {
            kind: "PMC",
            id: mac_address.to_string(),
        })
}

pub async fn exists(txn: &mut PgConnection, mac_address: MacAddress) -> DatabaseResult<bool> {
    let query = "SELECT EXISTS(SELECT 1 FROM pmc WHERE mac_address=$1)";
    let (exists,): (bool,) = sqlx::query_as(query)
        .bind(mac_address)
        .fetch_one(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))?;
    Ok(exists)
}

pub async fn find_all(txn: &mut PgConnection) -> DatabaseResult<Vec<Pmc>> {
    let query = "SELECT * FROM pmc ORDER BY mac_address";
    sqlx::query_as(query)
        .fetch_all(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))
}

/// Only the IP is patchable; changing vendor or MAC requires re-registering.
pub async fn update_ip(
    txn: &mut PgConnection,
    mac_address: MacAddress,
    ip_address: std::net::IpAddr,
) -> DatabaseResult<Pmc> {
    let query = "UPDATE pmc SET ip_address=$2::inet WHERE mac_address=$1 RETURNING *";
    sqlx::query_as(query)
        .bind(mac_address)
        .bind(IpNetwork::from(ip_address))
        .fetch_optional(txn)
        .await
        .map_err(|err| {
            DatabaseError::classify_unique(
                query,
                err,
                &[(SQL_VIOLATION_DUPLICATE_IP, "PMC IP")],
                &ip_address.to_string(),
            )
        })?
        .ok_or_else(|| DatabaseError::NotFoundError {
            kind: "PMC",
            id: mac_address.to_string(),
        })
}

#[allow(dead_code)]
pub async fn final_delete(txn: &mut PgConnection, mac_address: MacAddress) -> DatabaseResult<()> {
    let query = "DELETE FROM pmc WHERE mac_address=$1";
    let result = sqlx::query(query)
        .bind(mac_address)
        .execute(txn)
        .await
        .map_err(|err| DatabaseError::query(query, err))?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFoundError {
            kind: "PMC",
            id: mac_address.to_string(),
        });
    }

    Ok(())
}
