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

//! Cloud-side ingestion of inventory pages published by site agents.
//!
//! Ingestion is idempotent: a re-submitted page upserts the same component
//! rows again. Racks referenced by a page move through the
//! `new → ingesting → ingested` lifecycle as the run progresses.

use model::component::{Bmc, Component, ComponentType, PowerState};
use model::rack::RackStatus;
use rpc::common::InventoryItem;
use rpc::rla;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tonic::{Request, Response, Status};

use crate::api::Api;

/// The payload schema site device controllers report expected machines in.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExpectedMachinePayload {
    pub name: String,
    pub manufacturer: String,
    pub serial_number: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub firmware_version: String,
    #[serde(default)]
    pub rack_name: Option<String>,
    #[serde(default)]
    pub power_state: Option<String>,
    #[serde(default)]
    pub bmcs: Vec<BmcPayload>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BmcPayload {
    pub mac_address: String,
    #[serde(default)]
    pub ip_address: Option<String>,
}

/// Parses one inventory item into the component it describes (without rack
/// assignment, which needs a lookup).
pub fn component_from_item(item: &InventoryItem) -> Result<(Component, Option<String>), Status> {
    let payload: ExpectedMachinePayload = serde_json::from_str(&item.payload_json)
        .map_err(|e| Status::invalid_argument(format!("item {} payload: {e}", item.id)))?;
    if payload.serial_number.is_empty() {
        return Err(Status::invalid_argument(format!(
            "item {} carries no serial number",
            item.id
        )));
    }

    let mut bmcs = Vec::with_capacity(payload.bmcs.len());
    for bmc in &payload.bmcs {
        let mac_address = bmc.mac_address.parse().map_err(|_| {
            Status::invalid_argument(format!(
                "item {}: MAC address {} is not valid",
                item.id, bmc.mac_address
            ))
        })?;
        let ip_address = bmc
            .ip_address
            .as_deref()
            .filter(|raw| !raw.is_empty())
            .map(|raw| {
                raw.parse().map_err(|_| {
                    Status::invalid_argument(format!(
                        "item {}: IP address {raw} is not valid",
                        item.id
                    ))
                })
            })
            .transpose()?;
        bmcs.push(Bmc {
            mac_address,
            ip_address,
        });
    }

    let power_state = payload
        .power_state
        .as_deref()
        .map(|raw| raw.parse::<PowerState>())
        .transpose()
        .map_err(|e| Status::invalid_argument(format!("item {}: {e}", item.id)))?
        .unwrap_or_default();

    let component = Component {
        name: payload.name,
        component_type: ComponentType::Compute,
        manufacturer: payload.manufacturer,
        serial_number: payload.serial_number,
        model: payload.model,
        firmware_version: payload.firmware_version,
        power_state,
        bmcs,
        ..Default::default()
    };
    Ok((component, payload.rack_name))
}

/// Ingests one item; returns the rack name the item referenced, if any.
async fn ingest_item(
    txn: &mut PgConnection,
    item: &InventoryItem,
) -> Result<Option<String>, Status> {
    let (mut component, rack_name) = component_from_item(item)?;
    let rack_name = rack_name.filter(|name| !name.is_empty());

    if let Some(rack_name) = &rack_name {
        match db::rack::find_by_name(&mut *txn, rack_name).await {
            Ok(rack) => {
                component.rack_id = Some(rack.id);
                if rack.status == RackStatus::New {
                    db::rack::set_status(&mut *txn, rack.id, RackStatus::Ingesting).await?;
                }
            }
            Err(err) if err.is_not_found() => {
                tracing::warn!(item = %item.id, rack = %rack_name,
                    "inventory item references an unknown rack, ingesting unassigned");
            }
            Err(err) => return Err(err.into()),
        }
    }

    let upserted = db::component::upsert_ingested(&mut *txn, &component).await?;
    // A fresh item may assign the component to its rack for the first time.
    if upserted.rack_id.is_none() && component.rack_id.is_some() {
        let mut patched = upserted.clone();
        patched.rack_id = component.rack_id;
        db::component::apply_patch(&mut *txn, &patched).await?;
    }
    Ok(rack_name)
}

pub async fn ingest_inventory_page(
    api: &Api,
    request: Request<rla::IngestInventoryPageRequest>,
) -> Result<Response<rla::IngestInventoryPageResponse>, Status> {
    let request = request.into_inner();
    let page = request
        .page
        .ok_or_else(|| Status::invalid_argument("page is required"))?;

    tracing::info!(
        current_page = page.current_page,
        total_pages = page.total_pages,
        items = page.items.len(),
        status = %page.status,
        "ingesting inventory page"
    );

    if page.status == "failure" {
        tracing::warn!(message = %page.status_message, "site reported a failed sweep");
        return Ok(Response::new(rla::IngestInventoryPageResponse {}));
    }

    let mut txn = api
        .database_connection
        .begin()
        .await
        .map_err(|e| Status::internal(format!("Database error: {}", e)))?;

    let mut touched_racks = Vec::new();
    for item in &page.items {
        if let Some(rack_name) = ingest_item(&mut txn, item).await? {
            if !touched_racks.contains(&rack_name) {
                touched_racks.push(rack_name);
            }
        }
    }

    // The final page of a run completes ingestion for every rack the run
    // touched.
    if page.current_page == page.total_pages {
        for rack_name in &touched_racks {
            if let Ok(rack) = db::rack::find_by_name(&mut txn, rack_name).await {
                db::rack::set_status(&mut txn, rack.id, RackStatus::Ingested).await?;
            }
        }
    }

    txn.commit()
        .await
        .map_err(|e| Status::internal(format!("Failed to commit transaction: {}", e)))?;

    Ok(Response::new(rla::IngestInventoryPageResponse {}))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(payload: serde_json::Value) -> InventoryItem {
        InventoryItem {
            id: "machine-1".to_string(),
            serial_number: "C-SN-001".to_string(),
            kind: "expected-machine".to_string(),
            payload_json: payload.to_string(),
        }
    }

    #[test]
    fn test_component_from_item() {
        let (component, rack_name) = component_from_item(&item(serde_json::json!({
            "name": "tray-1",
            "manufacturer": "NVIDIA",
            "serial_number": "C-SN-001",
            "model": "GB200",
            "firmware_version": "r1.0.0",
            "rack_name": "R1",
            "power_state": "on",
            "bmcs": [{ "mac_address": "00:11:22:33:44:55", "ip_address": "10.0.0.9" }],
        })))
        .unwrap();

        assert_eq!(component.serial_number, "C-SN-001");
        assert_eq!(component.component_type, ComponentType::Compute);
        assert_eq!(component.power_state, PowerState::On);
        assert_eq!(component.bmcs.len(), 1);
        assert_eq!(rack_name.as_deref(), Some("R1"));
    }

    #[test]
    fn test_component_from_item_rejects_missing_serial() {
        let result = component_from_item(&item(serde_json::json!({
            "name": "tray-1",
            "manufacturer": "NVIDIA",
            "serial_number": "",
        })));
        assert!(result.is_err());
    }

    #[test]
    fn test_component_from_item_rejects_bad_payload() {
        let broken = InventoryItem {
            id: "machine-1".to_string(),
            serial_number: "C-SN-001".to_string(),
            kind: "expected-machine".to_string(),
            payload_json: "not json".to_string(),
        };
        let err = component_from_item(&broken).unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }
}
