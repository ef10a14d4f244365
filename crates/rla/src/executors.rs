/*
 * SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: LicenseRef-NvidiaProprietary
 *
 * NVIDIA CORPORATION, its affiliates and licensors retain all intellectual
 * property and proprietary rights in and to this material, related
 * documentation and any modifications thereto. Any use, reproduction,
 * disclosure or distribution of this material and related documentation
 * without an express license agreement from NVIDIA CORPORATION or
 * its affiliates is strictly prohibited.
 */

//! Production dispatch of per-rack tasks.
//!
//! Power shelf components are driven through the powershelf manager; other
//! component kinds have no executor yet and are skipped with a log line.

use model::component::{Component, ComponentType};
use model::rack::Rack;
use rpc::common::OperationStatus;
use rpc::psm::powershelf_manager_client::PowershelfManagerClient;
use rpc::psm::{self};
use tonic::transport::Channel;

use crate::dispatch::{RackOperation, RackOperationDispatcher};

pub struct PsmRackOperationDispatcher {
    psm_endpoint: String,
}

impl PsmRackOperationDispatcher {
    pub fn new(psm_endpoint: impl Into<String>) -> Self {
        PsmRackOperationDispatcher {
            psm_endpoint: psm_endpoint.into(),
        }
    }

    fn shelf_macs(components: &[Component]) -> Vec<String> {
        components
            .iter()
            .filter(|c| c.component_type == ComponentType::PowerShelf)
            .flat_map(|c| c.bmcs.iter().map(|bmc| bmc.mac_address.to_string()))
            .collect()
    }

    async fn connect(&self) -> eyre::Result<PowershelfManagerClient<Channel>> {
        Ok(PowershelfManagerClient::connect(self.psm_endpoint.clone()).await?)
    }

    fn check_results(results: &[psm::PowerResult]) -> eyre::Result<()> {
        for result in results {
            if result.status != OperationStatus::Success as i32 {
                eyre::bail!(
                    "power operation failed for {}: {}",
                    result.mac_address,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        Ok(())
    }

    async fn power(
        &self,
        client: &mut PowershelfManagerClient<Channel>,
        macs: Vec<String>,
        on: bool,
        forced: bool,
    ) -> eyre::Result<()> {
        let request = psm::PowerRequest {
            mac_addresses: macs,
            forced,
        };
        let results = if on {
            client.power_on(request).await?.into_inner().results
        } else {
            client.power_off(request).await?.into_inner().results
        };
        Self::check_results(&results)
    }
}

#[async_trait::async_trait]
impl RackOperationDispatcher for PsmRackOperationDispatcher {
    async fn dispatch(
        &self,
        operation: &RackOperation,
        rack: &Rack,
        components: &[Component],
    ) -> eyre::Result<()> {
        let shelf_macs = Self::shelf_macs(components);
        let skipped = components
            .iter()
            .filter(|c| c.component_type != ComponentType::PowerShelf)
            .count();
        if skipped > 0 {
            tracing::info!(
                rack = %rack.name,
                skipped,
                "components without an executor in task scope, skipping"
            );
        }
        if shelf_macs.is_empty() {
            tracing::info!(rack = %rack.name, operation = operation.name(),
                "no power shelf components in scope, nothing to dispatch");
            return Ok(());
        }

        let mut client = self.connect().await?;
        match operation {
            RackOperation::PowerOn { forced } => {
                self.power(&mut client, shelf_macs, true, *forced).await
            }
            RackOperation::PowerOff { forced } => {
                self.power(&mut client, shelf_macs, false, *forced).await
            }
            RackOperation::PowerReset { forced } => {
                // The shelf manager exposes no reset; a reset is an off
                // followed by an on.
                self.power(&mut client, shelf_macs.clone(), false, *forced)
                    .await?;
                self.power(&mut client, shelf_macs, true, *forced).await
            }
            RackOperation::UpgradeFirmware {
                target_version,
                window,
            } => {
                if window.is_some() {
                    tracing::warn!(rack = %rack.name,
                        "schedule window accepted but not yet honored, upgrading now");
                }
                for mac_address in shelf_macs {
                    let response = client
                        .update_firmware(psm::UpdateFirmwareRequest {
                            mac_address: mac_address.clone(),
                            component: model::firmware::PMC_COMPONENT.to_string(),
                            target_version: target_version.to_string(),
                        })
                        .await?
                        .into_inner();
                    if let Some(error) = response.error {
                        eyre::bail!("firmware upgrade failed for {mac_address}: {error}");
                    }
                }
                Ok(())
            }
        }
    }
}
