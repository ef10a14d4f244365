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

//! The gRPC facade: thin translation between the wire schema and the
//! registry, job manager and snapshot cache. Batch operations return one
//! sub-status per input and never fail as a whole; credential material
//! never appears in a response or a log line.

use std::str::FromStr;
use std::sync::Arc;

use anvil_secrets::credentials::{CredentialKey, CredentialProvider, Credentials};
use firmware::Repository;
use mac_address::MacAddress;
use model::firmware::FirmwareVersion;
use model::pmc::Pmc;
use model::power_shelf::PowerShelf;
use pmc_vendor::PmcVendor;
use redfish_client::PowerAction;
use rpc::common::OperationStatus;
use rpc::psm::powershelf_manager_server::PowershelfManager;
use rpc::psm::{self};
use tonic::{Request, Response, Status};

use crate::job_manager::FirmwareJobManager;
use crate::registry::PmcRegistry;
use crate::sessions::SessionFactory;
use crate::snapshot::SnapshotCache;

pub struct Api {
    pub registry: Arc<dyn PmcRegistry>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub job_manager: Arc<FirmwareJobManager>,
    pub snapshot: Arc<SnapshotCache>,
    pub sessions: Arc<dyn SessionFactory>,
    pub repository: Arc<Repository>,
}

fn parse_mac(raw: &str) -> Result<MacAddress, Status> {
    MacAddress::from_str(raw)
        .map_err(|_| Status::invalid_argument(format!("MAC address {raw} is not valid")))
}

fn parse_version(raw: &str) -> Result<FirmwareVersion, Status> {
    FirmwareVersion::from_str(raw)
        .map_err(|_| Status::invalid_argument(format!("firmware version {raw} is not valid")))
}

fn wire_vendor(vendor: PmcVendor) -> psm::PmcVendor {
    match vendor {
        PmcVendor::Liteon => psm::PmcVendor::Liteon,
        PmcVendor::Delta => psm::PmcVendor::Delta,
        PmcVendor::Unknown => psm::PmcVendor::Unknown,
    }
}

fn shelf_to_wire(pmc: &Pmc, projection: Option<&PowerShelf>) -> psm::Powershelf {
    let chassis = projection.and_then(|p| p.chassis.as_ref());
    let manager = projection.and_then(|p| p.manager.as_ref());
    psm::Powershelf {
        mac_address: pmc.mac_address.to_string(),
        ip_address: pmc.ip_address.to_string(),
        vendor: wire_vendor(pmc.vendor).into(),
        chassis_serial_number: chassis
            .and_then(|c| c.serial_number.clone())
            .unwrap_or_default(),
        chassis_model: chassis.and_then(|c| c.model.clone()).unwrap_or_default(),
        chassis_power_state: chassis
            .and_then(|c| c.power_state.clone())
            .unwrap_or_default(),
        manager_firmware_version: manager
            .and_then(|m| m.firmware_version.clone())
            .unwrap_or_default(),
        power_supplies: projection
            .map(|p| {
                p.power_supplies
                    .iter()
                    .map(|psu| psm::PowerSupplyInfo {
                        name: psu.name.clone().unwrap_or_default(),
                        serial_number: psu.serial_number.clone().unwrap_or_default(),
                        model: psu.model.clone().unwrap_or_default(),
                        firmware_version: psu.firmware_version.clone().unwrap_or_default(),
                        state: psu.status.state.clone().unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn update_to_wire(row: &model::firmware::FirmwareUpdate) -> psm::FirmwareUpdateStatus {
    psm::FirmwareUpdateStatus {
        mac_address: row.pmc_mac_address.to_string(),
        component: row.component.clone(),
        version_from: row.version_from.to_string(),
        version_to: row.version_to.to_string(),
        state: row.state.to_string(),
        last_transition_time: row.last_transition_time.to_rfc3339(),
        job_id: row.job_id.clone(),
        error_message: row.error_message.clone(),
        created_at: row.created_at.to_rfc3339(),
        updated_at: row.updated_at.to_rfc3339(),
    }
}

impl Api {
    /// One registration; errors come back as a per-item status, never as
    /// an RPC failure.
    async fn register_one(
        &self,
        registration: &psm::PowershelfRegistration,
    ) -> Result<(), (OperationStatus, String)> {
        let invalid = |msg: String| (OperationStatus::InvalidArgument, msg);

        let mac_address = MacAddress::from_str(&registration.mac_address).map_err(|_| {
            invalid(format!(
                "MAC address {} is not valid",
                registration.mac_address
            ))
        })?;
        let ip_address: std::net::IpAddr = registration.ip_address.parse().map_err(|_| {
            invalid(format!(
                "IP address {} is not valid",
                registration.ip_address
            ))
        })?;
        let vendor = psm::PmcVendor::try_from(registration.vendor)
            .ok()
            .map(|v| match v {
                psm::PmcVendor::Liteon => PmcVendor::Liteon,
                psm::PmcVendor::Delta => PmcVendor::Delta,
                psm::PmcVendor::Unknown => PmcVendor::Unknown,
            })
            .filter(|v| v.supported())
            .ok_or_else(|| invalid(format!("vendor {} is not supported", registration.vendor)))?;

        let credentials = registration
            .credentials
            .as_ref()
            .map(|c| Credentials::username_password(&c.username, &c.password))
            .filter(Credentials::is_valid)
            .ok_or_else(|| invalid("credentials must carry a non-empty user and secret".into()))?;

        let registered = self
            .registry
            .is_registered(mac_address)
            .await
            .map_err(|e| (OperationStatus::InternalError, e.to_string()))?;

        let key = CredentialKey::Pmc { mac_address };
        if registered {
            if !registration.replace_credentials {
                return Err(invalid(format!("PMC already exists: {mac_address}")));
            }
            // Re-registering with replace_credentials only rotates the
            // stored secret; MAC and vendor stay immutable.
            self.credentials
                .set_credentials(&key, &credentials)
                .await
                .map_err(|e| (OperationStatus::InternalError, e.to_string()))?;
            return Ok(());
        }

        self.registry
            .register(&Pmc {
                mac_address,
                ip_address,
                vendor,
            })
            .await
            .map_err(|e| match e {
                db::DatabaseError::AlreadyFoundError { .. } => invalid(e.to_string()),
                other => (OperationStatus::InternalError, other.to_string()),
            })?;

        self.credentials
            .set_credentials(&key, &credentials)
            .await
            .map_err(|e| (OperationStatus::InternalError, e.to_string()))?;

        Ok(())
    }

    async fn power_one(
        &self,
        raw_mac: &str,
        action: PowerAction,
        forced: bool,
    ) -> Result<(), (OperationStatus, String)> {
        let mac_address = MacAddress::from_str(raw_mac)
            .map_err(|_| (
                OperationStatus::InvalidArgument,
                format!("MAC address {raw_mac} is not valid"),
            ))?;

        let internal = |msg: String| (OperationStatus::InternalError, msg);
        let pmc = self
            .registry
            .get(mac_address)
            .await
            .map_err(|e| internal(e.to_string()))?;
        let credentials = self
            .credentials
            .get_credentials(&CredentialKey::Pmc { mac_address })
            .await
            .map_err(|e| internal(e.to_string()))?;
        let session = self
            .sessions
            .open(&pmc, &credentials)
            .await
            .map_err(|e| internal(e.to_string()))?;

        let result = session
            .power(action, forced)
            .await
            .map_err(|e| internal(e.to_string()));
        if let Err(err) = session.logout().await {
            tracing::debug!(mac = %mac_address, "failed to release power session: {err}");
        }
        result
    }

    async fn power_batch(
        &self,
        request: psm::PowerRequest,
        action: PowerAction,
    ) -> Response<psm::PowerResponse> {
        let mut results = Vec::with_capacity(request.mac_addresses.len());
        for raw_mac in &request.mac_addresses {
            let result = self.power_one(raw_mac, action, request.forced).await;
            results.push(psm::PowerResult {
                mac_address: raw_mac.clone(),
                status: result
                    .as_ref()
                    .map(|_| OperationStatus::Success)
                    .unwrap_or_else(|(status, _)| *status)
                    .into(),
                error: result.err().map(|(_, msg)| msg),
            });
        }
        Response::new(psm::PowerResponse { results })
    }
}

#[tonic::async_trait]
impl PowershelfManager for Api {
    async fn register_powershelves(
        &self,
        request: Request<psm::RegisterPowershelvesRequest>,
    ) -> Result<Response<psm::RegisterPowershelvesResponse>, Status> {
        let request = request.into_inner();
        let mut results = Vec::with_capacity(request.powershelves.len());
        for registration in &request.powershelves {
            let result = self.register_one(registration).await;
            results.push(psm::RegistrationResult {
                mac_address: registration.mac_address.clone(),
                status: result
                    .as_ref()
                    .map(|_| OperationStatus::Success)
                    .unwrap_or_else(|(status, _)| *status)
                    .into(),
                error: result.err().map(|(_, msg)| msg),
            });
        }
        Ok(Response::new(psm::RegisterPowershelvesResponse { results }))
    }

    async fn get_powershelves(
        &self,
        request: Request<psm::GetPowershelvesRequest>,
    ) -> Result<Response<psm::GetPowershelvesResponse>, Status> {
        let request = request.into_inner();

        let pmcs = if request.mac_addresses.is_empty() {
            self.registry.all().await?
        } else {
            let mut pmcs = Vec::with_capacity(request.mac_addresses.len());
            for raw_mac in &request.mac_addresses {
                let mac_address = parse_mac(raw_mac)?;
                pmcs.push(self.registry.get(mac_address).await?);
            }
            pmcs
        };

        let powershelves = pmcs
            .iter()
            .map(|pmc| {
                let projection = self.snapshot.get(pmc.mac_address);
                shelf_to_wire(pmc, projection.as_ref())
            })
            .collect();

        Ok(Response::new(psm::GetPowershelvesResponse { powershelves }))
    }

    async fn list_available_firmware(
        &self,
        request: Request<psm::ListAvailableFirmwareRequest>,
    ) -> Result<Response<psm::ListAvailableFirmwareResponse>, Status> {
        let request = request.into_inner();
        let mac_address = parse_mac(&request.mac_address)?;

        let (current, upgrades) = self.job_manager.list_available_firmware(mac_address).await?;

        Ok(Response::new(psm::ListAvailableFirmwareResponse {
            current_version: current.to_string(),
            upgrades: upgrades
                .iter()
                .map(|edge| psm::FirmwareUpgradePath {
                    version_from: edge.from.to_string(),
                    version_to: edge.to.to_string(),
                })
                .collect(),
        }))
    }

    async fn update_firmware(
        &self,
        request: Request<psm::UpdateFirmwareRequest>,
    ) -> Result<Response<psm::UpdateFirmwareResponse>, Status> {
        let request = request.into_inner();
        let mac_address = parse_mac(&request.mac_address)?;
        let target = parse_version(&request.target_version)?;

        let row = self
            .job_manager
            .upgrade(mac_address, &request.component, target)
            .await?;

        Ok(Response::new(psm::UpdateFirmwareResponse {
            status: OperationStatus::Success.into(),
            error: row.error_message,
        }))
    }

    async fn get_firmware_update_status(
        &self,
        request: Request<psm::GetFirmwareUpdateStatusRequest>,
    ) -> Result<Response<psm::GetFirmwareUpdateStatusResponse>, Status> {
        let request = request.into_inner();
        let mac_address = parse_mac(&request.mac_address)?;

        let row = self
            .job_manager
            .get_status(mac_address, &request.component)
            .await?;

        Ok(Response::new(psm::GetFirmwareUpdateStatusResponse {
            update: Some(update_to_wire(&row)),
        }))
    }

    async fn power_on(
        &self,
        request: Request<psm::PowerRequest>,
    ) -> Result<Response<psm::PowerResponse>, Status> {
        Ok(self.power_batch(request.into_inner(), PowerAction::On).await)
    }

    async fn power_off(
        &self,
        request: Request<psm::PowerRequest>,
    ) -> Result<Response<psm::PowerResponse>, Status> {
        Ok(self
            .power_batch(request.into_inner(), PowerAction::Off)
            .await)
    }

    async fn set_dry_run(
        &self,
        request: Request<psm::SetDryRunRequest>,
    ) -> Result<Response<psm::SetDryRunResponse>, Status> {
        let request = request.into_inner();
        tracing::info!(dry_run = request.dry_run, "toggling firmware dry-run mode");
        self.job_manager.set_dry_run(request.dry_run);
        Ok(Response::new(psm::SetDryRunResponse {}))
    }

    async fn get_firmware_summary(
        &self,
        _request: Request<psm::GetFirmwareSummaryRequest>,
    ) -> Result<Response<psm::GetFirmwareSummaryResponse>, Status> {
        use std::fmt::Write as _;

        let mut summary = self.repository.summary();
        for vendor in [PmcVendor::Liteon, PmcVendor::Delta] {
            if let Some(rule) = firmware::rule_for(vendor) {
                let _ = writeln!(summary, "{vendor} rule: {}", rule.summary());
            }
        }
        Ok(Response::new(psm::GetFirmwareSummaryResponse { summary }))
    }
}

#[cfg(test)]
mod tests {
    use anvil_secrets::credentials::MemoryCredentialProvider;
    use model::redfish::{Chassis, Manager, PowerSupply};
    use redfish_client::RedfishError;

    use super::*;
    use crate::job_manager::InMemoryFirmwareUpdateStore;
    use crate::registry::InMemoryPmcRegistry;
    use crate::sessions::{PmcSession, UploadOutcome};

    struct StaticFactory;
    struct StaticSession;

    #[async_trait::async_trait]
    impl SessionFactory for StaticFactory {
        async fn open(
            &self,
            _pmc: &Pmc,
            _credentials: &Credentials,
        ) -> Result<Box<dyn PmcSession>, RedfishError> {
            Ok(Box::new(StaticSession))
        }
    }

    #[async_trait::async_trait]
    impl PmcSession for StaticSession {
        async fn query_chassis(&self) -> Result<Chassis, RedfishError> {
            Ok(Chassis::default())
        }

        async fn query_manager(&self) -> Result<Manager, RedfishError> {
            Ok(Manager {
                firmware_version: Some("r1.0.0".to_string()),
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
            Ok(UploadOutcome {
                status: 202,
                job_id: None,
            })
        }

        async fn logout(self: Box<Self>) -> Result<(), RedfishError> {
            Ok(())
        }
    }

    fn api() -> (Api, tempfile::TempDir) {
        let artifacts = tempfile::tempdir().unwrap();
        std::fs::create_dir(artifacts.path().join("liteon")).unwrap();
        let repository = Arc::new(Repository::load(artifacts.path()).unwrap());

        let registry: Arc<dyn PmcRegistry> = Arc::new(InMemoryPmcRegistry::new());
        let credentials: Arc<dyn CredentialProvider> = Arc::new(MemoryCredentialProvider::new());
        let sessions: Arc<dyn SessionFactory> = Arc::new(StaticFactory);
        let job_manager = Arc::new(FirmwareJobManager::new(
            registry.clone(),
            credentials.clone(),
            repository.clone(),
            Arc::new(InMemoryFirmwareUpdateStore::new()),
            sessions.clone(),
        ));

        (
            Api {
                registry,
                credentials,
                job_manager,
                snapshot: Arc::new(SnapshotCache::new()),
                sessions,
                repository,
            },
            artifacts,
        )
    }

    fn registration(mac: &str, ip: &str) -> psm::PowershelfRegistration {
        psm::PowershelfRegistration {
            mac_address: mac.to_string(),
            ip_address: ip.to_string(),
            vendor: psm::PmcVendor::Liteon.into(),
            credentials: Some(psm::PmcCredentials {
                username: "admin".to_string(),
                password: "s3cret".to_string(),
            }),
            replace_credentials: false,
        }
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let (api, _artifacts) = api();

        let response = api
            .register_powershelves(Request::new(psm::RegisterPowershelvesRequest {
                powershelves: vec![registration("00:11:22:33:44:55", "192.168.1.100")],
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].status, OperationStatus::Success as i32);
        assert_eq!(response.results[0].error, None);

        let shelves = api
            .get_powershelves(Request::new(psm::GetPowershelvesRequest {
                mac_addresses: vec!["00:11:22:33:44:55".to_string()],
            }))
            .await
            .unwrap()
            .into_inner()
            .powershelves;
        assert_eq!(shelves.len(), 1);
        assert_eq!(shelves[0].mac_address, "00:11:22:33:44:55");
        assert_eq!(shelves[0].ip_address, "192.168.1.100");
    }

    #[tokio::test]
    async fn test_register_duplicate_is_per_item_error() {
        let (api, _artifacts) = api();

        let response = api
            .register_powershelves(Request::new(psm::RegisterPowershelvesRequest {
                powershelves: vec![
                    registration("00:11:22:33:44:55", "192.168.1.100"),
                    registration("00:11:22:33:44:55", "192.168.1.101"),
                    registration("not-a-mac", "192.168.1.102"),
                ],
            }))
            .await
            .unwrap()
            .into_inner();

        // The batch itself succeeds; failures are per item.
        assert_eq!(response.results.len(), 3);
        assert_eq!(response.results[0].status, OperationStatus::Success as i32);
        assert_eq!(
            response.results[1].status,
            OperationStatus::InvalidArgument as i32
        );
        assert!(response.results[1].error.as_ref().unwrap().contains("already exists"));
        assert_eq!(
            response.results[2].status,
            OperationStatus::InvalidArgument as i32
        );
    }

    #[tokio::test]
    async fn test_register_requires_valid_credentials() {
        let (api, _artifacts) = api();
        let mut registration = registration("00:11:22:33:44:55", "192.168.1.100");
        registration.credentials = Some(psm::PmcCredentials {
            username: "admin".to_string(),
            password: String::new(),
        });

        let response = api
            .register_powershelves(Request::new(psm::RegisterPowershelvesRequest {
                powershelves: vec![registration],
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(
            response.results[0].status,
            OperationStatus::InvalidArgument as i32
        );
    }

    #[tokio::test]
    async fn test_replace_credentials_on_reregistration() {
        let (api, _artifacts) = api();
        let first = registration("00:11:22:33:44:55", "192.168.1.100");
        api.register_powershelves(Request::new(psm::RegisterPowershelvesRequest {
            powershelves: vec![first],
        }))
        .await
        .unwrap();

        let mut rotate = registration("00:11:22:33:44:55", "192.168.1.100");
        rotate.replace_credentials = true;
        rotate.credentials = Some(psm::PmcCredentials {
            username: "admin".to_string(),
            password: "rotated".to_string(),
        });

        let response = api
            .register_powershelves(Request::new(psm::RegisterPowershelvesRequest {
                powershelves: vec![rotate],
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.results[0].status, OperationStatus::Success as i32);

        let stored = api
            .credentials
            .get_credentials(&CredentialKey::Pmc {
                mac_address: "00:11:22:33:44:55".parse().unwrap(),
            })
            .await
            .unwrap();
        assert_eq!(stored.password(), "rotated");
    }

    #[tokio::test]
    async fn test_power_batch_reports_per_item_status() {
        let (api, _artifacts) = api();
        api.register_powershelves(Request::new(psm::RegisterPowershelvesRequest {
            powershelves: vec![registration("00:11:22:33:44:55", "192.168.1.100")],
        }))
        .await
        .unwrap();

        let response = api
            .power_on(Request::new(psm::PowerRequest {
                mac_addresses: vec![
                    "00:11:22:33:44:55".to_string(),
                    // Registered nowhere
                    "00:11:22:33:44:99".to_string(),
                ],
                forced: false,
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].status, OperationStatus::Success as i32);
        assert_eq!(
            response.results[1].status,
            OperationStatus::InternalError as i32
        );
    }

    #[tokio::test]
    async fn test_set_dry_run_toggles_manager() {
        let (api, _artifacts) = api();
        assert!(!api.job_manager.dry_run());
        api.set_dry_run(Request::new(psm::SetDryRunRequest { dry_run: true }))
            .await
            .unwrap();
        assert!(api.job_manager.dry_run());
    }

    #[tokio::test]
    async fn test_get_firmware_update_status_not_found() {
        let (api, _artifacts) = api();
        let err = api
            .get_firmware_update_status(Request::new(psm::GetFirmwareUpdateStatusRequest {
                mac_address: "00:11:22:33:44:55".to_string(),
                component: "PMC".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::NotFound);
    }
}
