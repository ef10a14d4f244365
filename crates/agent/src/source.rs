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

//! The seam to the site-local device controller.

use model::inventory::{InventoryItem, InventoryKind};
use rpc::site::site_inventory_client::SiteInventoryClient;
use rpc::site::{self};
use tonic::Code;

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    /// The controller predates the paged ID surface; callers fall back to
    /// the legacy full-list call.
    #[error("the device controller does not implement this call")]
    Unimplemented,

    #[error("device controller call failed: {0}")]
    Transport(String),
}

impl From<tonic::Status> for SourceError {
    fn from(status: tonic::Status) -> Self {
        if status.code() == Code::Unimplemented {
            SourceError::Unimplemented
        } else {
            SourceError::Transport(status.to_string())
        }
    }
}

#[async_trait::async_trait]
pub trait InventorySource: Send + Sync {
    async fn find_ids(&self, kind: InventoryKind) -> Result<Vec<String>, SourceError>;

    async fn find_by_ids(
        &self,
        kind: InventoryKind,
        ids: &[String],
    ) -> Result<Vec<InventoryItem>, SourceError>;

    /// Legacy full-list call, always implemented.
    async fn list_all(&self, kind: InventoryKind) -> Result<Vec<InventoryItem>, SourceError>;
}

fn item_from_wire(item: rpc::common::InventoryItem) -> InventoryItem {
    InventoryItem {
        id: item.id,
        serial_number: item.serial_number,
        kind: item.kind,
        payload_json: item.payload_json,
    }
}

/// The production source: the device controller's gRPC surface.
pub struct GrpcInventorySource {
    endpoint: String,
}

impl GrpcInventorySource {
    pub fn new(endpoint: impl Into<String>) -> Self {
        GrpcInventorySource {
            endpoint: endpoint.into(),
        }
    }

    async fn connect(
        &self,
    ) -> Result<SiteInventoryClient<tonic::transport::Channel>, SourceError> {
        SiteInventoryClient::connect(self.endpoint.clone())
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))
    }
}

#[async_trait::async_trait]
impl InventorySource for GrpcInventorySource {
    async fn find_ids(&self, kind: InventoryKind) -> Result<Vec<String>, SourceError> {
        let mut client = self.connect().await?;
        let response = client
            .find_ids(site::FindIdsRequest {
                kind: kind.to_string(),
            })
            .await?;
        Ok(response.into_inner().ids)
    }

    async fn find_by_ids(
        &self,
        kind: InventoryKind,
        ids: &[String],
    ) -> Result<Vec<InventoryItem>, SourceError> {
        let mut client = self.connect().await?;
        let response = client
            .find_by_ids(site::FindByIdsRequest {
                kind: kind.to_string(),
                ids: ids.to_vec(),
            })
            .await?;
        Ok(response
            .into_inner()
            .items
            .into_iter()
            .map(item_from_wire)
            .collect())
    }

    async fn list_all(&self, kind: InventoryKind) -> Result<Vec<InventoryItem>, SourceError> {
        let mut client = self.connect().await?;
        let response = client
            .list_inventory(site::ListInventoryRequest {
                kind: kind.to_string(),
            })
            .await?;
        Ok(response
            .into_inner()
            .items
            .into_iter()
            .map(item_from_wire)
            .collect())
    }
}
