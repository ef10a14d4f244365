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

//! The session seam between PSM and the Redfish adapter.
//!
//! The job manager and the snapshot sweeper talk to devices through these
//! traits so that tests can script a device instead of standing one up.

use anvil_secrets::credentials::Credentials;
use model::pmc::Pmc;
use model::redfish::{Chassis, Manager, PowerSupply};
use redfish_client::{PowerAction, RedfishClientConfig, RedfishError, RedfishSession};
use tokio_util::io::ReaderStream;

/// What a firmware push came back with. The device's job identifier (task
/// monitor) is lifted out of the raw response for the update row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadOutcome {
    pub status: u16,
    pub job_id: Option<String>,
}

#[async_trait::async_trait]
pub trait PmcSession: Send + Sync {
    async fn query_chassis(&self) -> Result<Chassis, RedfishError>;

    async fn query_manager(&self) -> Result<Manager, RedfishError>;

    async fn list_power_supplies(&self) -> Result<Vec<PowerSupply>, RedfishError>;

    async fn power(&self, action: PowerAction, forced: bool) -> Result<(), RedfishError>;

    async fn upload_firmware(
        &self,
        artifact: tokio::fs::File,
    ) -> Result<UploadOutcome, RedfishError>;

    /// Consumes the session; a logged-out handle cannot be reused.
    async fn logout(self: Box<Self>) -> Result<(), RedfishError>;
}

#[async_trait::async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(
        &self,
        pmc: &Pmc,
        credentials: &Credentials,
    ) -> Result<Box<dyn PmcSession>, RedfishError>;
}

/// The production factory: real Redfish sessions over HTTPS.
#[derive(Default)]
pub struct RedfishSessionFactory {
    config: RedfishClientConfig,
}

impl RedfishSessionFactory {
    pub fn new(config: RedfishClientConfig) -> Self {
        RedfishSessionFactory { config }
    }
}

struct LiveSession {
    inner: RedfishSession,
}

#[async_trait::async_trait]
impl SessionFactory for RedfishSessionFactory {
    async fn open(
        &self,
        pmc: &Pmc,
        credentials: &Credentials,
    ) -> Result<Box<dyn PmcSession>, RedfishError> {
        let session =
            RedfishSession::open(&pmc.redfish_endpoint(), credentials, &self.config).await?;
        Ok(Box::new(LiveSession { inner: session }))
    }
}

#[async_trait::async_trait]
impl PmcSession for LiveSession {
    async fn query_chassis(&self) -> Result<Chassis, RedfishError> {
        self.inner.query_chassis().await
    }

    async fn query_manager(&self) -> Result<Manager, RedfishError> {
        self.inner.query_manager().await
    }

    async fn list_power_supplies(&self) -> Result<Vec<PowerSupply>, RedfishError> {
        self.inner.list_power_supplies().await
    }

    async fn power(&self, action: PowerAction, forced: bool) -> Result<(), RedfishError> {
        self.inner.power(action, forced).await
    }

    async fn upload_firmware(
        &self,
        artifact: tokio::fs::File,
    ) -> Result<UploadOutcome, RedfishError> {
        let body = reqwest::Body::wrap_stream(ReaderStream::new(artifact));
        let response = self.inner.update_firmware(body).await?;

        let status = response.status().as_u16();
        // Devices report the spawned job either as a task monitor Location
        // header or as an Id field in the body; try both.
        let job_id = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let job_id = match job_id {
            Some(id) => Some(id),
            None => response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| body.get("Id").and_then(|id| id.as_str()).map(str::to_string)),
        };

        Ok(UploadOutcome { status, job_id })
    }

    async fn logout(self: Box<Self>) -> Result<(), RedfishError> {
        self.inner.logout().await
    }
}
