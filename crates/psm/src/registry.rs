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

//! The PMC registry: MAC → (IP, vendor), unique on both MAC and IP.
//!
//! The registry is the sole mutator of PMC rows. `Pmc` values handed out by
//! `get`/`all` are snapshots; writing them back requires `patch_ip`.

use std::collections::HashMap;
use std::net::IpAddr;

use db::{DatabaseError, DatabaseResult};
use mac_address::MacAddress;
use model::pmc::Pmc;
use sqlx::PgPool;
use tokio::sync::RwLock;

#[async_trait::async_trait]
pub trait PmcRegistry: Send + Sync {
    /// Registers a new PMC; fails with `AlreadyExists` when the MAC or IP is
    /// taken. Vendor and MAC are immutable afterwards.
    async fn register(&self, pmc: &Pmc) -> DatabaseResult<Pmc>;

    async fn get(&self, mac_address: MacAddress) -> DatabaseResult<Pmc>;

    async fn is_registered(&self, mac_address: MacAddress) -> DatabaseResult<bool>;

    async fn all(&self) -> DatabaseResult<Vec<Pmc>>;

    /// Only the IP is patchable; changing vendor or MAC requires
    /// re-registering.
    async fn patch_ip(&self, mac_address: MacAddress, ip_address: IpAddr) -> DatabaseResult<Pmc>;
}

/// Postgres-backed registry.
pub struct PgPmcRegistry {
    pool: PgPool,
}

impl PgPmcRegistry {
    pub fn new(pool: PgPool) -> Self {
        PgPmcRegistry { pool }
    }
}

#[async_trait::async_trait]
impl PmcRegistry for PgPmcRegistry {
    async fn register(&self, pmc: &Pmc) -> DatabaseResult<Pmc> {
        let mut txn = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::new("transaction begin", e))?;
        // Registration must be race-free against a concurrent register of
        // the same MAC or IP.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *txn)
            .await
            .map_err(|e| DatabaseError::new("set isolation level", e))?;

        let created = db::pmc::create(&mut txn, pmc).await?;
        txn.commit()
            .await
            .map_err(|e| DatabaseError::new("transaction commit", e))?;
        Ok(created)
    }

    async fn get(&self, mac_address: MacAddress) -> DatabaseResult<Pmc> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::acquire)?;
        db::pmc::find_by_mac(&mut conn, mac_address).await
    }

    async fn is_registered(&self, mac_address: MacAddress) -> DatabaseResult<bool> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::acquire)?;
        db::pmc::exists(&mut conn, mac_address).await
    }

    async fn all(&self) -> DatabaseResult<Vec<Pmc>> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::acquire)?;
        db::pmc::find_all(&mut conn).await
    }

    async fn patch_ip(&self, mac_address: MacAddress, ip_address: IpAddr) -> DatabaseResult<Pmc> {
        let mut txn = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::new("transaction begin", e))?;
        let patched = db::pmc::update_ip(&mut txn, mac_address, ip_address).await?;
        txn.commit()
            .await
            .map_err(|e| DatabaseError::new("transaction commit", e))?;
        Ok(patched)
    }
}

/// In-memory registry for tests and development, enforcing the same
/// uniqueness invariants as the SQL schema.
#[derive(Default)]
pub struct InMemoryPmcRegistry {
    pmcs: RwLock<HashMap<MacAddress, Pmc>>,
}

impl InMemoryPmcRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PmcRegistry for InMemoryPmcRegistry {
    async fn register(&self, pmc: &Pmc) -> DatabaseResult<Pmc> {
        let mut pmcs = self.pmcs.write().await;
        if pmcs.contains_key(&pmc.mac_address) {
            return Err(DatabaseError::AlreadyFoundError {
                kind: "PMC",
                id: pmc.mac_address.to_string(),
            });
        }
        if pmcs.values().any(|p| p.ip_address == pmc.ip_address) {
            return Err(DatabaseError::AlreadyFoundError {
                kind: "PMC IP",
                id: pmc.ip_address.to_string(),
            });
        }
        pmcs.insert(pmc.mac_address, *pmc);
        Ok(*pmc)
    }

    async fn get(&self, mac_address: MacAddress) -> DatabaseResult<Pmc> {
        self.pmcs
            .read()
            .await
            .get(&mac_address)
            .copied()
            .ok_or_else(|| DatabaseError::NotFoundError {
                kind: "PMC",
                id: mac_address.to_string(),
            })
    }

    async fn is_registered(&self, mac_address: MacAddress) -> DatabaseResult<bool> {
        Ok(self.pmcs.read().await.contains_key(&mac_address))
    }

    async fn all(&self) -> DatabaseResult<Vec<Pmc>> {
        let mut pmcs: Vec<Pmc> = self.pmcs.read().await.values().copied().collect();
        pmcs.sort_by_key(|p| p.mac_address.bytes());
        Ok(pmcs)
    }

    async fn patch_ip(&self, mac_address: MacAddress, ip_address: IpAddr) -> DatabaseResult<Pmc> {
        let mut pmcs = self.pmcs.write().await;
        if pmcs
            .values()
            .any(|p| p.ip_address == ip_address && p.mac_address != mac_address)
        {
            return Err(DatabaseError::AlreadyFoundError {
                kind: "PMC IP",
                id: ip_address.to_string(),
            });
        }
        let pmc = pmcs
            .get_mut(&mac_address)
            .ok_or_else(|| DatabaseError::NotFoundError {
                kind: "PMC",
                id: mac_address.to_string(),
            })?;
        pmc.ip_address = ip_address;
        Ok(*pmc)
    }
}

#[cfg(test)]
mod tests {
    use pmc_vendor::PmcVendor;

    use super::*;

    fn pmc(mac: &str, ip: &str) -> Pmc {
        Pmc {
            mac_address: mac.parse().unwrap(),
            ip_address: ip.parse().unwrap(),
            vendor: PmcVendor::Liteon,
        }
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let registry = InMemoryPmcRegistry::new();
        let p = pmc("00:11:22:33:44:55", "192.168.1.100");

        registry.register(&p).await.unwrap();
        let found = registry.get(p.mac_address).await.unwrap();
        assert_eq!(found, p);
        assert!(registry.is_registered(p.mac_address).await.unwrap());

        // Same MAC again is a duplicate
        let err = registry.register(&pmc("00:11:22:33:44:55", "192.168.1.101")).await;
        assert!(matches!(err, Err(DatabaseError::AlreadyFoundError { kind: "PMC", .. })));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_ip() {
        let registry = InMemoryPmcRegistry::new();
        registry
            .register(&pmc("00:11:22:33:44:55", "192.168.1.100"))
            .await
            .unwrap();

        let err = registry.register(&pmc("00:11:22:33:44:56", "192.168.1.100")).await;
        assert!(matches!(
            err,
            Err(DatabaseError::AlreadyFoundError { kind: "PMC IP", .. })
        ));

        // Distinct MAC and IP both register fine
        registry
            .register(&pmc("00:11:22:33:44:56", "192.168.1.101"))
            .await
            .unwrap();
        assert_eq!(registry.all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_patch_ip() {
        let registry = InMemoryPmcRegistry::new();
        let p = pmc("00:11:22:33:44:55", "192.168.1.100");
        registry.register(&p).await.unwrap();

        let patched = registry
            .patch_ip(p.mac_address, "192.168.1.200".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(patched.ip_address, "192.168.1.200".parse::<IpAddr>().unwrap());
        // Vendor and MAC are untouched
        assert_eq!(patched.vendor, PmcVendor::Liteon);
        assert_eq!(patched.mac_address, p.mac_address);

        // Patching onto another PMC's IP is rejected
        registry
            .register(&pmc("00:11:22:33:44:56", "192.168.1.101"))
            .await
            .unwrap();
        let err = registry
            .patch_ip(p.mac_address, "192.168.1.101".parse().unwrap())
            .await;
        assert!(matches!(err, Err(DatabaseError::AlreadyFoundError { .. })));
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let registry = InMemoryPmcRegistry::new();
        let err = registry.get("00:11:22:33:44:55".parse().unwrap()).await;
        assert!(matches!(err, Err(DatabaseError::NotFoundError { .. })));
    }
}
