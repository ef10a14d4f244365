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

//! Cloud-side page delivery over the rack-inventory service.

use model::inventory::InventoryPage;
use rpc::rla::rack_inventory_client::RackInventoryClient;
use rpc::{common, rla};

use crate::publisher::InventoryIngest;

pub struct RlaInventoryIngest {
    endpoint: String,
}

impl RlaInventoryIngest {
    pub fn new(endpoint: impl Into<String>) -> Self {
        RlaInventoryIngest {
            endpoint: endpoint.into(),
        }
    }
}

fn page_to_wire(page: &InventoryPage) -> common::InventoryPage {
    common::InventoryPage {
        current_page: page.current_page,
        total_pages: page.total_pages,
        page_size: page.page_size,
        total_items: page.total_items,
        item_ids: page.item_ids.clone(),
        items: page
            .items
            .iter()
            .map(|item| common::InventoryItem {
                id: item.id.clone(),
                serial_number: item.serial_number.clone(),
                kind: item.kind.clone(),
                payload_json: item.payload_json.clone(),
            })
            .collect(),
        status: page.status.as_str().to_string(),
        status_message: page.status_message.clone(),
    }
}

#[async_trait::async_trait]
impl InventoryIngest for RlaInventoryIngest {
    async fn submit_page(&self, page: &InventoryPage) -> eyre::Result<()> {
        let mut client = RackInventoryClient::connect(self.endpoint.clone()).await?;
        client
            .ingest_inventory_page(rla::IngestInventoryPageRequest {
                page: Some(page_to_wire(page)),
            })
            .await?;
        Ok(())
    }
}
