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

//! The process-wide power shelf snapshot.
//!
//! One background task assembles a fresh `mac → PowerShelf` map each sweep
//! and publishes the map pointer atomically; readers always observe one
//! complete snapshot, never a partially-built one. This is the only
//! process-wide mutable state in the service.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anvil_secrets::credentials::{CredentialKey, CredentialProvider};
use arc_swap::ArcSwap;
use mac_address::MacAddress;
use model::pmc::Pmc;
use model::power_shelf::PowerShelf;
use tokio_util::sync::CancellationToken;

use crate::registry::PmcRegistry;
use crate::sessions::SessionFactory;

type Snapshot = HashMap<MacAddress, PowerShelf>;

/// Lock-free reads of the latest sweep.
pub struct SnapshotCache {
    map: ArcSwap<Snapshot>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        SnapshotCache {
            map: ArcSwap::from_pointee(Snapshot::new()),
        }
    }

    pub fn get(&self, mac_address: MacAddress) -> Option<PowerShelf> {
        self.map.load().get(&mac_address).cloned()
    }

    pub fn get_all(&self) -> Vec<PowerShelf> {
        let mut shelves: Vec<PowerShelf> = self.map.load().values().cloned().collect();
        shelves.sort_by_key(|s| s.pmc.map(|p| p.mac_address.bytes()));
        shelves
    }

    /// Publishes a complete snapshot. Only the sweeper writes.
    pub fn publish(&self, snapshot: Snapshot) {
        self.map.store(Arc::new(snapshot));
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

/// The periodic sweeper feeding the cache. Best-effort: a PMC that fails
/// its lightweight read just drops out of the snapshot until a later sweep
/// reaches it again.
pub struct SnapshotSweeper {
    registry: Arc<dyn PmcRegistry>,
    credentials: Arc<dyn CredentialProvider>,
    sessions: Arc<dyn SessionFactory>,
    cache: Arc<SnapshotCache>,
    period: Duration,
}

impl SnapshotSweeper {
    pub fn new(
        registry: Arc<dyn PmcRegistry>,
        credentials: Arc<dyn CredentialProvider>,
        sessions: Arc<dyn SessionFactory>,
        cache: Arc<SnapshotCache>,
        period: Duration,
    ) -> Self {
        SnapshotSweeper {
            registry,
            credentials,
            sessions,
            cache,
            period,
        }
    }

    /// One full sweep over every registered PMC.
    pub async fn sweep_once(&self) {
        let pmcs = match self.registry.all().await {
            Ok(pmcs) => pmcs,
            Err(err) => {
                tracing::warn!("snapshot sweep could not list PMCs: {err}");
                return;
            }
        };

        let mut snapshot = Snapshot::with_capacity(pmcs.len());
        for pmc in pmcs {
            match self.read_shelf(&pmc).await {
                Ok(shelf) => {
                    snapshot.insert(pmc.mac_address, shelf);
                }
                Err(err) => {
                    tracing::debug!(mac = %pmc.mac_address,
                        "dropping shelf from snapshot: {err}");
                }
            }
        }

        self.cache.publish(snapshot);
    }

    async fn read_shelf(&self, pmc: &Pmc) -> eyre::Result<PowerShelf> {
        let credentials = self
            .credentials
            .get_credentials(&CredentialKey::Pmc {
                mac_address: pmc.mac_address,
            })
            .await?;
        let session = self.sessions.open(pmc, &credentials).await?;

        let result = async {
            let chassis = session.query_chassis().await?;
            let manager = session.query_manager().await?;
            let power_supplies = session.list_power_supplies().await?;
            Ok::<_, redfish_client::RedfishError>(PowerShelf {
                pmc: Some(*pmc),
                chassis: Some(chassis),
                manager: Some(manager),
                power_supplies,
            })
        }
        .await;

        if let Err(err) = session.logout().await {
            tracing::debug!(mac = %pmc.mac_address, "failed to release snapshot session: {err}");
        }
        Ok(result?)
    }

    /// The sweep loop; runs until cancelled. The first sweep happens
    /// immediately so the cache has data as soon as the service is up.
    pub async fn run(self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("snapshot sweeper stopping");
                    return;
                }
                _ = interval.tick() => self.sweep_once().await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use anvil_secrets::credentials::{Credentials, MemoryCredentialProvider};
    use model::redfish::{Chassis, Manager, PowerSupply};
    use pmc_vendor::PmcVendor;
    use redfish_client::{PowerAction, RedfishError};

    use super::*;
    use crate::registry::InMemoryPmcRegistry;
    use crate::sessions::{PmcSession, UploadOutcome};

    /// Answers for the shelves in `healthy`, refuses everything else.
    struct SelectiveFactory {
        healthy: Vec<MacAddress>,
    }

    struct HealthySession;

    #[async_trait::async_trait]
    impl SessionFactory for SelectiveFactory {
        async fn open(
            &self,
            pmc: &Pmc,
            _credentials: &Credentials,
        ) -> Result<Box<dyn PmcSession>, RedfishError> {
            if self.healthy.contains(&pmc.mac_address) {
                Ok(Box::new(HealthySession))
            } else {
                Err(RedfishError::Unreachable("connection refused".to_string()))
            }
        }
    }

    #[async_trait::async_trait]
    impl PmcSession for HealthySession {
        async fn query_chassis(&self) -> Result<Chassis, RedfishError> {
            Ok(Chassis {
                serial_number: Some("PSHELF-1".to_string()),
                ..Default::default()
            })
        }

        async fn query_manager(&self) -> Result<Manager, RedfishError> {
            Ok(Manager {
                firmware_version: Some("r1.0.0".to_string()),
                ..Default::default()
            })
        }

        async fn list_power_supplies(&self) -> Result<Vec<PowerSupply>, RedfishError> {
            Ok(vec![PowerSupply::default(), PowerSupply::default()])
        }

        async fn power(&self, _action: PowerAction, _forced: bool) -> Result<(), RedfishError> {
            Ok(())
        }

        async fn upload_firmware(
            &self,
            _artifact: tokio::fs::File,
        ) -> Result<UploadOutcome, RedfishError> {
            Err(RedfishError::Other {
                status: 400,
                body: "not under test".to_string(),
            })
        }

        async fn logout(self: Box<Self>) -> Result<(), RedfishError> {
            Ok(())
        }
    }

    async fn registry_with(pmcs: &[(&str, &str)]) -> Arc<InMemoryPmcRegistry> {
        let registry = Arc::new(InMemoryPmcRegistry::new());
        for (mac, ip) in pmcs {
            registry
                .register(&Pmc {
                    mac_address: mac.parse().unwrap(),
                    ip_address: ip.parse().unwrap(),
                    vendor: PmcVendor::Liteon,
                })
                .await
                .unwrap();
        }
        registry
    }

    async fn credentials_for(registry: &InMemoryPmcRegistry) -> Arc<MemoryCredentialProvider> {
        let provider = Arc::new(MemoryCredentialProvider::new());
        for pmc in registry.all().await.unwrap() {
            provider
                .set_credentials(
                    &CredentialKey::Pmc {
                        mac_address: pmc.mac_address,
                    },
                    &Credentials::username_password("admin", "s3cret"),
                )
                .await
                .unwrap();
        }
        provider
    }

    #[tokio::test]
    async fn test_sweep_publishes_reachable_shelves_and_drops_failures() {
        let healthy_mac: MacAddress = "00:11:22:33:44:55".parse().unwrap();
        let dead_mac: MacAddress = "00:11:22:33:44:56".parse().unwrap();

        let registry = registry_with(&[
            ("00:11:22:33:44:55", "192.168.1.100"),
            ("00:11:22:33:44:56", "192.168.1.101"),
        ])
        .await;
        let credentials = credentials_for(&registry).await;
        let cache = Arc::new(SnapshotCache::new());

        let sweeper = SnapshotSweeper::new(
            registry,
            credentials,
            Arc::new(SelectiveFactory {
                healthy: vec![healthy_mac],
            }),
            cache.clone(),
            Duration::from_secs(30),
        );

        sweeper.sweep_once().await;

        let shelf = cache.get(healthy_mac).expect("healthy shelf in snapshot");
        assert_eq!(
            shelf.chassis.as_ref().unwrap().serial_number.as_deref(),
            Some("PSHELF-1")
        );
        assert_eq!(shelf.power_supplies.len(), 2);
        assert_eq!(shelf.firmware_version(), Some("r1.0.0"));

        // The unreachable shelf is absent, not an error.
        assert!(cache.get(dead_mac).is_none());
        assert_eq!(cache.get_all().len(), 1);
    }

    #[tokio::test]
    async fn test_later_sweep_replaces_snapshot_wholesale() {
        let mac: MacAddress = "00:11:22:33:44:55".parse().unwrap();
        let registry = registry_with(&[("00:11:22:33:44:55", "192.168.1.100")]).await;
        let credentials = credentials_for(&registry).await;
        let cache = Arc::new(SnapshotCache::new());

        let healthy = SnapshotSweeper::new(
            registry.clone(),
            credentials.clone(),
            Arc::new(SelectiveFactory {
                healthy: vec![mac],
            }),
            cache.clone(),
            Duration::from_secs(30),
        );
        healthy.sweep_once().await;
        assert!(cache.get(mac).is_some());

        // The device goes dark; the next sweep drops it.
        let dark = SnapshotSweeper::new(
            registry,
            credentials,
            Arc::new(SelectiveFactory {
                healthy: Vec::new(),
            }),
            cache.clone(),
            Duration::from_secs(30),
        );
        dark.sweep_once().await;
        assert!(cache.get(mac).is_none());
        assert!(cache.get_all().is_empty());
    }
}
