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

//! The firmware job manager.
//!
//! Tracks one `firmware_update` row per `(mac, component)` and drives the
//! `Queued → Verifying → Completed | Failed` machine. Re-queuing a key
//! replaces its row, which is how operators re-aim a stuck update; the row
//! store serializes every mutation on the composite primary key so the
//! supervisory sweep cannot race a concurrent upsert.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anvil_secrets::SecretsError;
use anvil_secrets::credentials::{CredentialKey, CredentialProvider};
use chrono::{DateTime, Utc};
use db::{DatabaseError, DatabaseResult};
use firmware::{FirmwareError, Repository, UpgradeRule, rule_for, select_edge};
use mac_address::MacAddress;
use model::firmware::{
    FirmwareUpdate, FirmwareUpdateState, FirmwareUpgrade, FirmwareVersion, PMC_COMPONENT,
};
use model::pmc::Pmc;
use pmc_vendor::PmcVendor;
use redfish_client::RedfishError;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::registry::PmcRegistry;
use crate::sessions::{PmcSession, SessionFactory};

/// Storage seam for firmware update rows. Both implementations serialize
/// mutations per `(mac, component)` key.
#[async_trait::async_trait]
pub trait FirmwareUpdateStore: Send + Sync {
    /// Replaces any existing row for the key with a fresh `queued` one.
    async fn upsert_queued(
        &self,
        mac_address: MacAddress,
        component: &str,
        version_from: FirmwareVersion,
        version_to: FirmwareVersion,
    ) -> DatabaseResult<FirmwareUpdate>;

    async fn get(&self, mac_address: MacAddress, component: &str)
    -> DatabaseResult<FirmwareUpdate>;

    /// Single guarded state transition. `job_id` keeps its old value when
    /// `None`; `error_message` is overwritten either way.
    async fn transition(
        &self,
        mac_address: MacAddress,
        component: &str,
        new_state: FirmwareUpdateState,
        job_id: Option<&str>,
        error_message: Option<&str>,
    ) -> DatabaseResult<FirmwareUpdate>;

    async fn list_stale_verifying(
        &self,
        cutoff: DateTime<Utc>,
    ) -> DatabaseResult<Vec<FirmwareUpdate>>;
}

pub struct PgFirmwareUpdateStore {
    pool: PgPool,
}

impl PgFirmwareUpdateStore {
    pub fn new(pool: PgPool) -> Self {
        PgFirmwareUpdateStore { pool }
    }
}

#[async_trait::async_trait]
impl FirmwareUpdateStore for PgFirmwareUpdateStore {
    async fn upsert_queued(
        &self,
        mac_address: MacAddress,
        component: &str,
        version_from: FirmwareVersion,
        version_to: FirmwareVersion,
    ) -> DatabaseResult<FirmwareUpdate> {
        let mut txn = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::new("transaction begin", e))?;
        let row = db::firmware_update::upsert_queued(
            &mut txn,
            mac_address,
            component,
            version_from,
            version_to,
        )
        .await?;
        txn.commit()
            .await
            .map_err(|e| DatabaseError::new("transaction commit", e))?;
        Ok(row)
    }

    async fn get(
        &self,
        mac_address: MacAddress,
        component: &str,
    ) -> DatabaseResult<FirmwareUpdate> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::acquire)?;
        db::firmware_update::get(&mut conn, mac_address, component).await
    }

    async fn transition(
        &self,
        mac_address: MacAddress,
        component: &str,
        new_state: FirmwareUpdateState,
        job_id: Option<&str>,
        error_message: Option<&str>,
    ) -> DatabaseResult<FirmwareUpdate> {
        let mut txn = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::new("transaction begin", e))?;
        let row = db::firmware_update::transition(
            &mut txn,
            mac_address,
            component,
            new_state,
            job_id,
            error_message,
        )
        .await?;
        txn.commit()
            .await
            .map_err(|e| DatabaseError::new("transaction commit", e))?;
        Ok(row)
    }

    async fn list_stale_verifying(
        &self,
        cutoff: DateTime<Utc>,
    ) -> DatabaseResult<Vec<FirmwareUpdate>> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::acquire)?;
        db::firmware_update::list_stale_verifying(&mut conn, cutoff).await
    }
}

/// In-memory store with the same semantics, for tests and development.
#[derive(Default)]
pub struct InMemoryFirmwareUpdateStore {
    rows: tokio::sync::Mutex<HashMap<(MacAddress, String), FirmwareUpdate>>,
}

impl InMemoryFirmwareUpdateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl FirmwareUpdateStore for InMemoryFirmwareUpdateStore {
    async fn upsert_queued(
        &self,
        mac_address: MacAddress,
        component: &str,
        version_from: FirmwareVersion,
        version_to: FirmwareVersion,
    ) -> DatabaseResult<FirmwareUpdate> {
        let mut rows = self.rows.lock().await;
        let key = (mac_address, component.to_string());
        let mut fresh = FirmwareUpdate::queued(mac_address, component, version_from, version_to);
        if let Some(existing) = rows.get(&key) {
            fresh.created_at = existing.created_at;
        }
        rows.insert(key, fresh.clone());
        Ok(fresh)
    }

    async fn get(
        &self,
        mac_address: MacAddress,
        component: &str,
    ) -> DatabaseResult<FirmwareUpdate> {
        self.rows
            .lock()
            .await
            .get(&(mac_address, component.to_string()))
            .cloned()
            .ok_or_else(|| DatabaseError::NotFoundError {
                kind: "FirmwareUpdate",
                id: format!("{mac_address}/{component}"),
            })
    }

    async fn transition(
        &self,
        mac_address: MacAddress,
        component: &str,
        new_state: FirmwareUpdateState,
        job_id: Option<&str>,
        error_message: Option<&str>,
    ) -> DatabaseResult<FirmwareUpdate> {
        let mut rows = self.rows.lock().await;
        let key = (mac_address, component.to_string());
        let row = rows
            .get_mut(&key)
            .ok_or_else(|| DatabaseError::NotFoundError {
                kind: "FirmwareUpdate",
                id: format!("{mac_address}/{component}"),
            })?;

        if !row.state.can_transition_to(new_state) {
            return Err(DatabaseError::FailedPrecondition(format!(
                "firmware update for {mac_address}/{component} is {} and cannot move to {new_state}",
                row.state
            )));
        }

        let now = Utc::now();
        if row.state != new_state {
            row.last_transition_time = now;
        }
        row.state = new_state;
        if let Some(job_id) = job_id {
            row.job_id = Some(job_id.to_string());
        }
        row.error_message = error_message.map(str::to_string);
        row.updated_at = now;
        Ok(row.clone())
    }

    async fn list_stale_verifying(
        &self,
        cutoff: DateTime<Utc>,
    ) -> DatabaseResult<Vec<FirmwareUpdate>> {
        Ok(self
            .rows
            .lock()
            .await
            .values()
            .filter(|row| {
                row.state == FirmwareUpdateState::Verifying && row.last_transition_time < cutoff
            })
            .cloned()
            .collect())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum UpgradeError {
    #[error("component {0} does not support firmware updates")]
    UnsupportedComponent(String),

    #[error("no upgrade rule is registered for vendor {0}")]
    UnsupportedVendor(PmcVendor),

    #[error("device reports firmware version {0:?} which is not parseable")]
    UnparseableVersion(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("credential error: {0}")]
    Secrets(#[from] SecretsError),

    #[error(transparent)]
    Redfish(#[from] RedfishError),

    #[error(transparent)]
    Firmware(#[from] FirmwareError),
}

impl From<UpgradeError> for tonic::Status {
    fn from(err: UpgradeError) -> Self {
        match err {
            UpgradeError::UnsupportedComponent(_) | UpgradeError::UnsupportedVendor(_) => {
                tonic::Status::unimplemented(err.to_string())
            }
            UpgradeError::UnparseableVersion(_) => tonic::Status::failed_precondition(err.to_string()),
            UpgradeError::Database(db) => db.into(),
            UpgradeError::Secrets(SecretsError::NotFound(key)) => {
                tonic::Status::unauthenticated(format!("no credential stored under {key}"))
            }
            UpgradeError::Secrets(other) => tonic::Status::internal(other.to_string()),
            UpgradeError::Redfish(RedfishError::Unauthorized(msg)) => {
                tonic::Status::unauthenticated(msg)
            }
            UpgradeError::Redfish(RedfishError::Unreachable(msg)) => {
                tonic::Status::unavailable(msg)
            }
            UpgradeError::Redfish(other) => tonic::Status::internal(other.to_string()),
            UpgradeError::Firmware(other) => tonic::Status::internal(other.to_string()),
        }
    }
}

pub struct FirmwareJobManager {
    registry: Arc<dyn PmcRegistry>,
    credentials: Arc<dyn CredentialProvider>,
    repository: Arc<Repository>,
    store: Arc<dyn FirmwareUpdateStore>,
    sessions: Arc<dyn SessionFactory>,
    dry_run: AtomicBool,
}

impl FirmwareJobManager {
    pub fn new(
        registry: Arc<dyn PmcRegistry>,
        credentials: Arc<dyn CredentialProvider>,
        repository: Arc<Repository>,
        store: Arc<dyn FirmwareUpdateStore>,
        sessions: Arc<dyn SessionFactory>,
    ) -> Self {
        FirmwareJobManager {
            registry,
            credentials,
            repository,
            store,
            sessions,
            dry_run: AtomicBool::new(false),
        }
    }

    /// When set, upgrades still write state rows but skip the artifact
    /// upload and record a synthetic success.
    pub fn set_dry_run(&self, dry_run: bool) {
        self.dry_run.store(dry_run, Ordering::SeqCst);
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run.load(Ordering::SeqCst)
    }

    async fn resolve(&self, mac_address: MacAddress) -> Result<(Pmc, Box<dyn PmcSession>), UpgradeError> {
        let pmc = self.registry.get(mac_address).await?;
        let credentials = self
            .credentials
            .get_credentials(&CredentialKey::Pmc { mac_address })
            .await?;
        let session = self.sessions.open(&pmc, &credentials).await?;
        Ok((pmc, session))
    }

    async fn current_version(session: &dyn PmcSession) -> Result<FirmwareVersion, UpgradeError> {
        let manager = session.query_manager().await?;
        let raw = manager.firmware_version.unwrap_or_default();
        raw.parse()
            .map_err(|_| UpgradeError::UnparseableVersion(raw))
    }

    /// The upgrade edges the device could take right now: every shipped
    /// edge the vendor rule admits from the running version. Empty when the
    /// running version is unknown to the repository.
    pub async fn list_available_firmware(
        &self,
        mac_address: MacAddress,
    ) -> Result<(FirmwareVersion, Vec<FirmwareUpgrade>), UpgradeError> {
        let (pmc, session) = self.resolve(mac_address).await?;
        let result = async {
            let current = Self::current_version(session.as_ref()).await?;
            let Some(rule) = rule_for(pmc.vendor) else {
                return Ok((current, Vec::new()));
            };
            if !self.repository.support_upgrade(pmc.vendor, current) {
                return Ok((current, Vec::new()));
            }
            let upgrades = self
                .repository
                .upgrades(pmc.vendor)
                .iter()
                .filter(|edge| rule.allowed(current, edge))
                .cloned()
                .collect();
            Ok((current, upgrades))
        }
        .await;
        Self::release(session).await;
        result
    }

    pub async fn can_update(
        &self,
        mac_address: MacAddress,
        component: &str,
        target: FirmwareVersion,
    ) -> Result<bool, UpgradeError> {
        if component != PMC_COMPONENT {
            return Ok(false);
        }
        let (pmc, session) = self.resolve(mac_address).await?;
        let result = async {
            let Some(rule) = rule_for(pmc.vendor) else {
                return Ok(false);
            };
            let current = Self::current_version(session.as_ref()).await?;
            let edges = self.repository.upgrades(pmc.vendor);
            Ok(select_edge(rule, edges, current, target).is_some())
        }
        .await;
        Self::release(session).await;
        result
    }

    pub async fn get_status(
        &self,
        mac_address: MacAddress,
        component: &str,
    ) -> DatabaseResult<FirmwareUpdate> {
        self.store.get(mac_address, component).await
    }

    /// Creates/replaces the update row for the key and drives the upload.
    ///
    /// Failures after the row exists are recorded on the row (`Failed` with
    /// an error message) and returned as `Ok(row)`; only failures before
    /// the device was consulted surface as `Err`.
    pub async fn upgrade(
        &self,
        mac_address: MacAddress,
        component: &str,
        target: FirmwareVersion,
    ) -> Result<FirmwareUpdate, UpgradeError> {
        if component != PMC_COMPONENT {
            return Err(UpgradeError::UnsupportedComponent(component.to_string()));
        }

        let (pmc, session) = self.resolve(mac_address).await?;
        let rule = match rule_for(pmc.vendor) {
            Some(rule) => rule,
            None => {
                Self::release(session).await;
                return Err(UpgradeError::UnsupportedVendor(pmc.vendor));
            }
        };

        let outcome = self
            .upgrade_with_session(&pmc, rule, session.as_ref(), mac_address, component, target)
            .await;
        Self::release(session).await;
        outcome
    }

    async fn upgrade_with_session(
        &self,
        pmc: &Pmc,
        rule: &dyn UpgradeRule,
        session: &dyn PmcSession,
        mac_address: MacAddress,
        component: &str,
        target: FirmwareVersion,
    ) -> Result<FirmwareUpdate, UpgradeError> {
        let current = Self::current_version(session).await?;

        self.store
            .upsert_queued(mac_address, component, current, target)
            .await?;

        if current == target {
            return Ok(self
                .fail(mac_address, component, "already at target")
                .await?);
        }

        let edges = self.repository.upgrades(pmc.vendor);
        let Some(edge) = select_edge(rule, edges, current, target) else {
            return Ok(self
                .fail(mac_address, component, "unsupported upgrade path")
                .await?);
        };

        self.store
            .transition(
                mac_address,
                component,
                FirmwareUpdateState::Verifying,
                None,
                None,
            )
            .await?;

        if self.dry_run() {
            tracing::info!(%mac_address, %current, %target, "dry-run: skipping firmware upload");
            return Ok(self
                .store
                .transition(
                    mac_address,
                    component,
                    FirmwareUpdateState::Completed,
                    None,
                    None,
                )
                .await?);
        }

        let artifact = match self.repository.open(edge).await {
            Ok(artifact) => artifact,
            Err(err) => {
                return Ok(self
                    .fail(
                        mac_address,
                        component,
                        &format!("unable to open artifact: {err}"),
                    )
                    .await?);
            }
        };

        match session.upload_firmware(artifact).await {
            Ok(outcome) => {
                tracing::info!(%mac_address, %current, %target,
                    status = outcome.status, job_id = ?outcome.job_id,
                    "firmware upload accepted");
                Ok(self
                    .store
                    .transition(
                        mac_address,
                        component,
                        FirmwareUpdateState::Completed,
                        outcome.job_id.as_deref(),
                        None,
                    )
                    .await?)
            }
            Err(RedfishError::DeviceBusy(msg)) => Ok(self
                .fail(
                    mac_address,
                    component,
                    &format!("device busy: {msg}; retry once the active job finishes"),
                )
                .await?),
            Err(err) => Ok(self.fail(mac_address, component, &err.to_string()).await?),
        }
    }

    async fn fail(
        &self,
        mac_address: MacAddress,
        component: &str,
        message: &str,
    ) -> DatabaseResult<FirmwareUpdate> {
        tracing::warn!(%mac_address, component, message, "firmware update failed");
        self.store
            .transition(
                mac_address,
                component,
                FirmwareUpdateState::Failed,
                None,
                Some(message),
            )
            .await
    }

    async fn release(session: Box<dyn PmcSession>) {
        if let Err(err) = session.logout().await {
            tracing::debug!("failed to release PMC session: {err}");
        }
    }

    /// One pass of the supervisory scan: fails every `verifying` row whose
    /// last transition is older than `stale_after`. Returns how many rows
    /// were flipped.
    pub async fn sweep_once(&self, stale_after: Duration) -> DatabaseResult<usize> {
        let stale_after =
            chrono::Duration::from_std(stale_after).unwrap_or(chrono::Duration::minutes(30));
        let cutoff = Utc::now() - stale_after;
        let stale = self.store.list_stale_verifying(cutoff).await?;

        let mut flipped = 0;
        for row in stale {
            match self
                .store
                .transition(
                    row.pmc_mac_address,
                    &row.component,
                    FirmwareUpdateState::Failed,
                    None,
                    Some("device did not complete verification in time"),
                )
                .await
            {
                Ok(_) => flipped += 1,
                // The row moved on between the scan and the transition;
                // somebody else won the race, which is fine.
                Err(DatabaseError::FailedPrecondition(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(flipped)
    }

    /// The supervisory loop; runs until cancelled.
    pub async fn run_supervisory_sweep(
        &self,
        scan_period: Duration,
        stale_after: Duration,
        cancel: CancellationToken,
    ) {
        let mut interval = tokio::time::interval(scan_period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("supervisory sweep stopping");
                    return;
                }
                _ = interval.tick() => {
                    match self.sweep_once(stale_after).await {
                        Ok(0) => {}
                        Ok(n) => tracing::info!(count = n, "timed out stale firmware updates"),
                        Err(err) => tracing::error!("supervisory sweep failed: {err}"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use anvil_secrets::credentials::{Credentials, MemoryCredentialProvider};
    use model::redfish::{Chassis, Manager, PowerSupply};
    use redfish_client::PowerAction;

    use super::*;
    use crate::registry::InMemoryPmcRegistry;
    use crate::sessions::UploadOutcome;

    const MAC: &str = "00:11:22:33:44:55";

    struct FakeDeviceState {
        version: String,
        upload_result: Option<RedfishError>,
        uploads: AtomicUsize,
    }

    struct FakeSessionFactory {
        device: Arc<FakeDeviceState>,
    }

    struct FakeSession {
        device: Arc<FakeDeviceState>,
    }

    #[async_trait::async_trait]
    impl SessionFactory for FakeSessionFactory {
        async fn open(
            &self,
            _pmc: &Pmc,
            _credentials: &Credentials,
        ) -> Result<Box<dyn PmcSession>, RedfishError> {
            Ok(Box::new(FakeSession {
                device: Arc::clone(&self.device),
            }))
        }
    }

    #[async_trait::async_trait]
    impl PmcSession for FakeSession {
        async fn query_chassis(&self) -> Result<Chassis, RedfishError> {
            Ok(Chassis::default())
        }

        async fn query_manager(&self) -> Result<Manager, RedfishError> {
            Ok(Manager {
                firmware_version: Some(self.device.version.clone()),
                ..Default::default()
            })
        }

        async fn list_power_supplies(&self) -> Result<Vec<PowerSupply>, RedfishError> {
            Ok(Vec::new())
        }

        async fn power(&self, _action: PowerAction, _forced: bool) -> Result<(), RedfishError> {
            Ok(())
        }

        async fn upload_firmware(
            &self,
            _artifact: tokio::fs::File,
        ) -> Result<UploadOutcome, RedfishError> {
            self.device.uploads.fetch_add(1, Ordering::SeqCst);
            match &self.device.upload_result {
                None => Ok(UploadOutcome {
                    status: 202,
                    job_id: Some("job-42".to_string()),
                }),
                Some(RedfishError::DeviceBusy(msg)) => {
                    Err(RedfishError::DeviceBusy(msg.clone()))
                }
                Some(RedfishError::Unreachable(msg)) => {
                    Err(RedfishError::Unreachable(msg.clone()))
                }
                Some(RedfishError::Unauthorized(msg)) => {
                    Err(RedfishError::Unauthorized(msg.clone()))
                }
                Some(RedfishError::Other { status, body }) => Err(RedfishError::Other {
                    status: *status,
                    body: body.clone(),
                }),
            }
        }

        async fn logout(self: Box<Self>) -> Result<(), RedfishError> {
            Ok(())
        }
    }

    struct Harness {
        manager: FirmwareJobManager,
        device: Arc<FakeDeviceState>,
        _artifacts: tempfile::TempDir,
    }

    async fn harness(device_version: &str, upload_result: Option<RedfishError>) -> Harness {
        let artifacts = tempfile::tempdir().unwrap();
        let liteon = artifacts.path().join("liteon");
        std::fs::create_dir(&liteon).unwrap();
        std::fs::write(liteon.join("pmc_r1.0.0_to_r1.1.0.bin"), b"fw-a").unwrap();
        std::fs::write(liteon.join("pmc_r1.1.0_to_r2.0.0.bin"), b"fw-b").unwrap();
        let repository = Arc::new(Repository::load(artifacts.path()).unwrap());

        let registry = Arc::new(InMemoryPmcRegistry::new());
        let pmc = Pmc {
            mac_address: MAC.parse().unwrap(),
            ip_address: "192.168.1.100".parse().unwrap(),
            vendor: PmcVendor::Liteon,
        };
        registry.register(&pmc).await.unwrap();

        let credentials = Arc::new(MemoryCredentialProvider::new());
        credentials
            .set_credentials(
                &CredentialKey::Pmc {
                    mac_address: pmc.mac_address,
                },
                &Credentials::username_password("admin", "s3cret"),
            )
            .await
            .unwrap();

        let device = Arc::new(FakeDeviceState {
            version: device_version.to_string(),
            upload_result,
            uploads: AtomicUsize::new(0),
        });

        let manager = FirmwareJobManager::new(
            registry,
            credentials,
            repository,
            Arc::new(InMemoryFirmwareUpdateStore::new()),
            Arc::new(FakeSessionFactory {
                device: Arc::clone(&device),
            }),
        );

        Harness {
            manager,
            device,
            _artifacts: artifacts,
        }
    }

    fn mac() -> MacAddress {
        MAC.parse().unwrap()
    }

    fn version(s: &str) -> FirmwareVersion {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_upgrade_happy_path() {
        let h = harness("r1.0.0", None).await;

        let row = h
            .manager
            .upgrade(mac(), PMC_COMPONENT, version("r1.1.0"))
            .await
            .unwrap();

        assert_eq!(row.state, FirmwareUpdateState::Completed);
        assert_eq!(row.version_from, version("r1.0.0"));
        assert_eq!(row.version_to, version("r1.1.0"));
        assert_eq!(row.job_id.as_deref(), Some("job-42"));
        assert_eq!(row.error_message, None);
        assert_eq!(h.device.uploads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dry_run_never_uploads_but_completes() {
        let h = harness("r1.0.0", None).await;
        h.manager.set_dry_run(true);

        let row = h
            .manager
            .upgrade(mac(), PMC_COMPONENT, version("r1.1.0"))
            .await
            .unwrap();

        assert_eq!(row.state, FirmwareUpdateState::Completed);
        assert_eq!(h.device.uploads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unsupported_path_fails_without_upload() {
        let h = harness("r1.0.0", None).await;

        // Direct-only: no shipped edge goes r1.0.0 → r2.0.0 in one hop.
        let row = h
            .manager
            .upgrade(mac(), PMC_COMPONENT, version("r2.0.0"))
            .await
            .unwrap();

        assert_eq!(row.state, FirmwareUpdateState::Failed);
        assert_eq!(row.error_message.as_deref(), Some("unsupported upgrade path"));
        assert_eq!(h.device.uploads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_target_equals_current_fails() {
        let h = harness("r1.1.0", None).await;

        let row = h
            .manager
            .upgrade(mac(), PMC_COMPONENT, version("r1.1.0"))
            .await
            .unwrap();

        assert_eq!(row.state, FirmwareUpdateState::Failed);
        assert_eq!(row.error_message.as_deref(), Some("already at target"));
        assert_eq!(h.device.uploads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_busy_device_fails_with_retry_hint() {
        let h = harness(
            "r1.0.0",
            Some(RedfishError::DeviceBusy("task 7 active".to_string())),
        )
        .await;

        let row = h
            .manager
            .upgrade(mac(), PMC_COMPONENT, version("r1.1.0"))
            .await
            .unwrap();

        assert_eq!(row.state, FirmwareUpdateState::Failed);
        let message = row.error_message.unwrap();
        assert!(message.contains("device busy"));
        assert!(message.contains("retry"));
    }

    #[tokio::test]
    async fn test_upgrade_rejects_psu_component() {
        let h = harness("r1.0.0", None).await;
        let err = h.manager.upgrade(mac(), "PSU0", version("r1.1.0")).await;
        assert!(matches!(err, Err(UpgradeError::UnsupportedComponent(_))));
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let h = harness("r1.0.0", None).await;

        // Two upgrades for the same key leave exactly one row carrying the
        // latest attempt.
        h.manager
            .upgrade(mac(), PMC_COMPONENT, version("r2.0.0"))
            .await
            .unwrap();
        let row = h
            .manager
            .upgrade(mac(), PMC_COMPONENT, version("r1.1.0"))
            .await
            .unwrap();

        assert_eq!(row.version_to, version("r1.1.0"));
        let status = h.manager.get_status(mac(), PMC_COMPONENT).await.unwrap();
        assert_eq!(status.state, FirmwareUpdateState::Completed);
        assert_eq!(status.version_to, version("r1.1.0"));
    }

    #[tokio::test]
    async fn test_terminal_rows_stay_terminal() {
        let h = harness("r1.0.0", None).await;
        h.manager
            .upgrade(mac(), PMC_COMPONENT, version("r1.1.0"))
            .await
            .unwrap();

        let store = InMemoryFirmwareUpdateStore::new();
        store
            .upsert_queued(mac(), PMC_COMPONENT, version("r1.0.0"), version("r1.1.0"))
            .await
            .unwrap();
        store
            .transition(mac(), PMC_COMPONENT, FirmwareUpdateState::Verifying, None, None)
            .await
            .unwrap();
        store
            .transition(mac(), PMC_COMPONENT, FirmwareUpdateState::Completed, None, None)
            .await
            .unwrap();

        let err = store
            .transition(mac(), PMC_COMPONENT, FirmwareUpdateState::Queued, None, None)
            .await;
        assert!(matches!(err, Err(DatabaseError::FailedPrecondition(_))));
    }

    #[tokio::test]
    async fn test_transition_advances_last_transition_time() {
        let store = InMemoryFirmwareUpdateStore::new();
        let row = store
            .upsert_queued(mac(), PMC_COMPONENT, version("r1.0.0"), version("r2.0.0"))
            .await
            .unwrap();
        let t0 = row.last_transition_time;

        tokio::time::sleep(Duration::from_millis(5)).await;
        let row = store
            .transition(mac(), PMC_COMPONENT, FirmwareUpdateState::Verifying, None, None)
            .await
            .unwrap();
        assert!(row.last_transition_time > t0);
        assert!(!row.is_terminal());

        tokio::time::sleep(Duration::from_millis(5)).await;
        let row = store
            .transition(mac(), PMC_COMPONENT, FirmwareUpdateState::Completed, None, None)
            .await
            .unwrap();
        assert!(row.is_terminal());
    }

    #[tokio::test]
    async fn test_list_available_firmware() {
        let h = harness("r1.0.0", None).await;
        let (current, upgrades) = h.manager.list_available_firmware(mac()).await.unwrap();
        assert_eq!(current, version("r1.0.0"));
        assert_eq!(upgrades.len(), 1);
        assert_eq!(upgrades[0].to, version("r1.1.0"));
    }

    #[tokio::test]
    async fn test_unknown_current_version_yields_empty_list() {
        let h = harness("r9.9.9", None).await;
        let (current, upgrades) = h.manager.list_available_firmware(mac()).await.unwrap();
        assert_eq!(current, version("r9.9.9"));
        assert!(upgrades.is_empty());

        assert!(
            !h.manager
                .can_update(mac(), PMC_COMPONENT, version("r1.1.0"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_can_update() {
        let h = harness("r1.0.0", None).await;
        assert!(
            h.manager
                .can_update(mac(), PMC_COMPONENT, version("r1.1.0"))
                .await
                .unwrap()
        );
        assert!(
            !h.manager
                .can_update(mac(), PMC_COMPONENT, version("r2.0.0"))
                .await
                .unwrap()
        );
        assert!(
            !h.manager
                .can_update(mac(), "PSU0", version("r1.1.0"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_get_status_missing_row_is_not_found() {
        let h = harness("r1.0.0", None).await;
        let err = h.manager.get_status(mac(), PMC_COMPONENT).await;
        assert!(matches!(err, Err(DatabaseError::NotFoundError { .. })));
    }

    #[tokio::test]
    async fn test_sweep_times_out_stale_verifying_rows() {
        let h = harness("r1.0.0", None).await;
        let store = InMemoryFirmwareUpdateStore::new();
        store
            .upsert_queued(mac(), PMC_COMPONENT, version("r1.0.0"), version("r1.1.0"))
            .await
            .unwrap();
        store
            .transition(mac(), PMC_COMPONENT, FirmwareUpdateState::Verifying, None, None)
            .await
            .unwrap();

        let manager = FirmwareJobManager::new(
            Arc::new(InMemoryPmcRegistry::new()),
            Arc::new(MemoryCredentialProvider::new()),
            Arc::new(Repository::load(h._artifacts.path()).unwrap()),
            Arc::new(store),
            Arc::new(FakeSessionFactory {
                device: Arc::clone(&h.device),
            }),
        );

        // A generous threshold leaves the fresh row alone.
        assert_eq!(manager.sweep_once(Duration::from_secs(3600)).await.unwrap(), 0);

        // With a zero threshold the row is stale and gets failed.
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(manager.sweep_once(Duration::ZERO).await.unwrap(), 1);

        let row = manager.get_status(mac(), PMC_COMPONENT).await.unwrap();
        assert_eq!(row.state, FirmwareUpdateState::Failed);
        assert!(
            row.error_message
                .unwrap()
                .contains("did not complete verification in time")
        );

        // A second sweep has nothing left to do.
        assert_eq!(manager.sweep_once(Duration::ZERO).await.unwrap(), 0);
    }
}
