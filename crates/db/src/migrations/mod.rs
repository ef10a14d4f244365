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

//! Ordered, hash-verified schema migrations.
//!
//! Migrations ship as `NNNN_name.up.sql` / `NNNN_name.down.sql` pairs where
//! the ID is a `YYYYMMDDHHMM` timestamp string. Applied migrations record an
//! MD5 hash of the up-file body in the `migrations` table; the hash is
//! re-verified on every run, and a mismatch aborts startup unless the file
//! body carries the literal sentinel phrase below. Rollback takes a
//! wall-clock timestamp and unwinds everything applied after it, newest
//! first.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// A changed migration file is accepted iff its body contains this phrase.
const ALLOW_HASH_CHANGE_SENTINEL: &str = "Allow hash changing";

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Timestamp ID, `YYYYMMDDHHMM`.
    pub id: &'static str,
    pub name: &'static str,
    pub up: &'static str,
    pub down: &'static str,
}

/// Every migration, oldest first. Both halves of each pair are embedded at
/// compile time, so a missing `.down.sql` fails the build rather than the
/// startup.
pub static MIGRATIONS: &[Migration] = &[
    Migration {
        id: "202403041130",
        name: "pmc",
        up: include_str!("202403041130_pmc.up.sql"),
        down: include_str!("202403041130_pmc.down.sql"),
    },
    Migration {
        id: "202403041140",
        name: "firmware_update",
        up: include_str!("202403041140_firmware_update.up.sql"),
        down: include_str!("202403041140_firmware_update.down.sql"),
    },
    Migration {
        id: "202406181300",
        name: "rack_inventory",
        up: include_str!("202406181300_rack_inventory.up.sql"),
        down: include_str!("202406181300_rack_inventory.down.sql"),
    },
];

#[derive(thiserror::Error, Debug)]
pub enum MigrationError {
    #[error("migration set is malformed: {0}")]
    Malformed(String),

    #[error(
        "applied migration {id} ({name}) hash mismatch: recorded {recorded}, file is {actual}. \
         The migration file changed after it was applied."
    )]
    HashMismatch {
        id: String,
        name: String,
        recorded: String,
        actual: String,
    },

    #[error("rollback found no embedded migration with id {0}")]
    UnknownApplied(String),

    #[error("database error during migration: {0}")]
    Database(#[from] sqlx::Error),
}

fn hash(body: &str) -> String {
    format!("{:x}", md5::compute(body.as_bytes()))
}

/// Validates the embedded migration set: 12-digit timestamp IDs, strictly
/// increasing, with non-empty bodies on both sides of every pair.
fn verify_set(migrations: &[Migration]) -> Result<(), MigrationError> {
    let mut previous: Option<&str> = None;
    for migration in migrations {
        if migration.id.len() != 12 || !migration.id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MigrationError::Malformed(format!(
                "migration id {} is not a YYYYMMDDHHMM timestamp",
                migration.id
            )));
        }
        if migration.up.trim().is_empty() || migration.down.trim().is_empty() {
            return Err(MigrationError::Malformed(format!(
                "migration {} ({}) is missing one half of its up/down pair",
                migration.id, migration.name
            )));
        }
        if let Some(prev) = previous {
            if migration.id <= prev {
                return Err(MigrationError::Malformed(format!(
                    "migration ids must be strictly increasing, {} follows {}",
                    migration.id, prev
                )));
            }
        }
        previous = Some(migration.id);
    }
    Ok(())
}

async fn ensure_migrations_table(pool: &PgPool) -> Result<(), MigrationError> {
    sqlx::raw_sql(
        "CREATE TABLE IF NOT EXISTS migrations (
            id text PRIMARY KEY,
            name text NOT NULL,
            hash text NOT NULL,
            applied_date timestamptz NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Applies every pending migration and re-verifies the hashes of the
/// already-applied ones. Re-running with unchanged files is a no-op.
#[tracing::instrument(skip(pool))]
pub async fn migrate(pool: &PgPool) -> Result<(), MigrationError> {
    verify_set(MIGRATIONS)?;
    ensure_migrations_table(pool).await?;

    for migration in MIGRATIONS {
        let recorded: Option<(String,)> =
            sqlx::query_as("SELECT hash FROM migrations WHERE id=$1")
                .bind(migration.id)
                .fetch_optional(pool)
                .await?;

        let actual = hash(migration.up);
        match recorded {
            Some((recorded,)) if recorded == actual => {}
            Some((recorded,)) => {
                if !migration.up.contains(ALLOW_HASH_CHANGE_SENTINEL) {
                    return Err(MigrationError::HashMismatch {
                        id: migration.id.to_string(),
                        name: migration.name.to_string(),
                        recorded,
                        actual,
                    });
                }
                tracing::warn!(
                    id = migration.id,
                    name = migration.name,
                    "migration body changed, refreshing recorded hash"
                );
                sqlx::query("UPDATE migrations SET hash=$2 WHERE id=$1")
                    .bind(migration.id)
                    .bind(&actual)
                    .execute(pool)
                    .await?;
            }
            None => {
                tracing::info!(id = migration.id, name = migration.name, "applying migration");
                let mut txn = pool.begin().await?;
                sqlx::raw_sql(migration.up).execute(&mut *txn).await?;
                sqlx::query("INSERT INTO migrations (id, name, hash) VALUES ($1, $2, $3)")
                    .bind(migration.id)
                    .bind(migration.name)
                    .bind(&actual)
                    .execute(&mut *txn)
                    .await?;
                txn.commit().await?;
            }
        }
    }

    Ok(())
}

/// Rolls back every migration applied after `t`, newest first.
#[tracing::instrument(skip(pool))]
pub async fn rollback(pool: &PgPool, t: DateTime<Utc>) -> Result<(), MigrationError> {
    verify_set(MIGRATIONS)?;
    ensure_migrations_table(pool).await?;

    let applied_after: Vec<(String,)> = sqlx::query_as(
        "SELECT id FROM migrations WHERE applied_date > $1 ORDER BY id DESC",
    )
    .bind(t)
    .fetch_all(pool)
    .await?;

    for (id,) in applied_after {
        let migration = MIGRATIONS
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| MigrationError::UnknownApplied(id.clone()))?;

        tracing::info!(id = migration.id, name = migration.name, "rolling back migration");
        let mut txn = pool.begin().await?;
        sqlx::raw_sql(migration.down).execute(&mut *txn).await?;
        sqlx::query("DELETE FROM migrations WHERE id=$1")
            .bind(migration.id)
            .execute(&mut *txn)
            .await?;
        txn.commit().await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_set_is_well_formed() {
        verify_set(MIGRATIONS).expect("the shipped migration set must verify");
    }

    #[test]
    fn test_verify_rejects_bad_ids() {
        let bad = [Migration {
            id: "20240304",
            name: "short",
            up: "SELECT 1",
            down: "SELECT 1",
        }];
        assert!(matches!(
            verify_set(&bad),
            Err(MigrationError::Malformed(_))
        ));
    }

    #[test]
    fn test_verify_rejects_missing_pair_half() {
        let bad = [Migration {
            id: "202403041130",
            name: "no-down",
            up: "CREATE TABLE t (id int)",
            down: "   ",
        }];
        assert!(matches!(
            verify_set(&bad),
            Err(MigrationError::Malformed(_))
        ));
    }

    #[test]
    fn test_verify_rejects_out_of_order_ids() {
        let bad = [
            Migration {
                id: "202403041140",
                name: "b",
                up: "SELECT 1",
                down: "SELECT 1",
            },
            Migration {
                id: "202403041130",
                name: "a",
                up: "SELECT 1",
                down: "SELECT 1",
            },
        ];
        assert!(matches!(
            verify_set(&bad),
            Err(MigrationError::Malformed(_))
        ));
    }

    #[test]
    fn test_hash_is_stable_md5_hex() {
        // The recorded hash format must never change: deployed fleets
        // compare against it.
        assert_eq!(hash("SELECT 1"), "b1698e52a0f16203489454196a0c6307");
        assert_eq!(hash(""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_sentinel_phrase() {
        assert!("-- Allow hash changing\nCREATE TABLE x (id int)"
            .contains(ALLOW_HASH_CHANGE_SENTINEL));
    }
}
