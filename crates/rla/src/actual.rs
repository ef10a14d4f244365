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

//! Actual-inventory lookup: what the site's external controllers report
//! right now, as opposed to the expected model this service owns.

use model::component::Component;
use model::rack::Rack;
use rpc::site::site_inventory_client::SiteInventoryClient;
use rpc::site::{self};

use crate::ingest::component_from_item;

#[async_trait::async_trait]
pub trait ActualComponentSource: Send + Sync {
    /// The components an external controller reports for one rack.
    async fn components_for_rack(&self, rack: &Rack) -> eyre::Result<Vec<Component>>;
}

/// Queries the site agent's inventory surface and keeps the items whose
/// payload names the rack.
pub struct SiteInventoryActualSource {
    endpoint: String,
}

impl SiteInventoryActualSource {
    pub fn new(endpoint: impl Into<String>) -> Self {
        SiteInventoryActualSource {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait::async_trait]
impl ActualComponentSource for SiteInventoryActualSource {
    async fn components_for_rack(&self, rack: &Rack) -> eyre::Result<Vec<Component>> {
        let mut client = SiteInventoryClient::connect(self.endpoint.clone()).await?;
        let items = client
            .list_inventory(site::ListInventoryRequest {
                kind: model::inventory::InventoryKind::ExpectedMachine.to_string(),
            })
            .await?
            .into_inner()
            .items;

        let mut components = Vec::new();
        for item in &items {
            match component_from_item(item) {
                Ok((component, rack_name)) => {
                    if rack_name.as_deref() == Some(rack.name.as_str()) {
                        components.push(component);
                    }
                }
                Err(err) => {
                    tracing::warn!(item = %item.id, "skipping unparseable inventory item: {err}");
                }
            }
        }
        Ok(components)
    }
}
