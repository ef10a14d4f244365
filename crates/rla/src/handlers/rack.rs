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

use model::rack::{Rack, RackStatus};
use rpc::rla;
use sqlx::PgConnection;
use tonic::{Request, Response, Status};

use crate::api::Api;
use crate::conv;

async fn load_components(
    txn: &mut PgConnection,
    rack: &mut Rack,
    with_components: bool,
) -> Result<(), Status> {
    if with_components {
        rack.components = db::component::list_by_rack(txn, rack.id).await?;
    }
    Ok(())
}

pub async fn create_expected_rack(
    api: &Api,
    request: Request<rla::CreateExpectedRackRequest>,
) -> Result<Response<rla::CreateExpectedRackResponse>, Status> {
    let request = request.into_inner();
    let wire_rack = request
        .rack
        .ok_or_else(|| Status::invalid_argument("rack is required"))?;
    let rack = conv::rack_from_wire(&wire_rack)?;
    if rack.serial_number.is_empty() {
        return Err(Status::invalid_argument("rack serial_number is required"));
    }

    let mut txn = api
        .database_connection
        .begin()
        .await
        .map_err(|e| Status::internal(format!("Database error: {}", e)))?;
    let created = db::rack::create(&mut txn, &rack).await?;
    txn.commit()
        .await
        .map_err(|e| Status::internal(format!("Failed to commit transaction: {}", e)))?;

    Ok(Response::new(rla::CreateExpectedRackResponse {
        id: created.id.to_string(),
    }))
}

pub async fn get_rack_by_id(
    api: &Api,
    request: Request<rla::GetRackByIdRequest>,
) -> Result<Response<rla::RackResponse>, Status> {
    let request = request.into_inner();
    let rack_id = conv::rack_id_from_wire(&request.id)?;

    let mut txn = api
        .database_connection
        .begin()
        .await
        .map_err(|e| Status::internal(format!("Database error: {}", e)))?;
    let mut rack = db::rack::find_by_id(&mut txn, rack_id).await?;
    load_components(&mut txn, &mut rack, request.with_components).await?;
    txn.commit()
        .await
        .map_err(|e| Status::internal(format!("Failed to commit transaction: {}", e)))?;

    Ok(Response::new(rla::RackResponse {
        rack: Some(conv::rack_to_wire(&rack)),
    }))
}

pub async fn get_rack_by_serial(
    api: &Api,
    request: Request<rla::GetRackBySerialRequest>,
) -> Result<Response<rla::RackResponse>, Status> {
    let request = request.into_inner();
    if request.serial_number.is_empty() {
        return Err(Status::invalid_argument("serial_number is required"));
    }

    let mut txn = api
        .database_connection
        .begin()
        .await
        .map_err(|e| Status::internal(format!("Database error: {}", e)))?;
    let mut rack =
        db::rack::find_by_serial(&mut txn, &request.manufacturer, &request.serial_number).await?;
    load_components(&mut txn, &mut rack, request.with_components).await?;
    txn.commit()
        .await
        .map_err(|e| Status::internal(format!("Failed to commit transaction: {}", e)))?;

    Ok(Response::new(rla::RackResponse {
        rack: Some(conv::rack_to_wire(&rack)),
    }))
}

pub async fn list_racks(
    api: &Api,
    request: Request<rla::ListRacksRequest>,
) -> Result<Response<rla::ListRacksResponse>, Status> {
    let request = request.into_inner();

    let filter = db::rack::RackFilter {
        name: request.name.clone().filter(|n| !n.is_empty()),
        nvl_domain_id: request
            .nvl_domain_id
            .as_deref()
            .filter(|raw| !raw.is_empty())
            .map(conv::nvl_domain_id_from_wire)
            .transpose()?,
    };
    let pagination = db::rack::Pagination {
        limit: if request.limit == 0 {
            db::rack::Pagination::default().limit
        } else {
            i64::from(request.limit)
        },
        offset: i64::from(request.offset),
    };

    let mut txn = api
        .database_connection
        .begin()
        .await
        .map_err(|e| Status::internal(format!("Database error: {}", e)))?;
    let (mut racks, total) = db::rack::list(&mut txn, &filter, pagination).await?;
    for rack in &mut racks {
        load_components(&mut txn, rack, request.with_components).await?;
    }
    txn.commit()
        .await
        .map_err(|e| Status::internal(format!("Failed to commit transaction: {}", e)))?;

    Ok(Response::new(rla::ListRacksResponse {
        racks: racks.iter().map(conv::rack_to_wire).collect(),
        total,
    }))
}

pub async fn patch_rack(
    api: &Api,
    request: Request<rla::PatchRackRequest>,
) -> Result<Response<rla::RackResponse>, Status> {
    let request = request.into_inner();
    let wire_rack = request
        .rack
        .ok_or_else(|| Status::invalid_argument("rack is required"))?;
    if wire_rack.id.is_empty() {
        return Err(Status::invalid_argument("rack id is required for a patch"));
    }
    let incoming = conv::rack_from_wire(&wire_rack)?;

    let mut txn = api
        .database_connection
        .begin()
        .await
        .map_err(|e| Status::internal(format!("Database error: {}", e)))?;
    let current = db::rack::find_by_id(&mut txn, incoming.id).await?;

    // Diff-or-nothing: an incoming rack that changes no patchable field is
    // a no-op and does not touch updated_at.
    let rack = match current.build_patch(&incoming) {
        None => current,
        Some(patched) => db::rack::apply_patch(&mut txn, &patched).await?,
    };
    txn.commit()
        .await
        .map_err(|e| Status::internal(format!("Failed to commit transaction: {}", e)))?;

    Ok(Response::new(rla::RackResponse {
        rack: Some(conv::rack_to_wire(&rack)),
    }))
}

pub async fn delete_rack(
    api: &Api,
    request: Request<rla::DeleteRackRequest>,
) -> Result<Response<rla::DeleteRackResponse>, Status> {
    let request = request.into_inner();
    let rack_id = conv::rack_id_from_wire(&request.id)?;

    let mut txn = api
        .database_connection
        .begin()
        .await
        .map_err(|e| Status::internal(format!("Database error: {}", e)))?;
    let rack = db::rack::find_by_id(&mut txn, rack_id).await?;
    db::rack::mark_as_deleted(&rack, &mut txn).await?;
    txn.commit()
        .await
        .map_err(|e| Status::internal(format!("Failed to commit transaction: {}", e)))?;

    Ok(Response::new(rla::DeleteRackResponse {}))
}

async fn set_status(
    api: &Api,
    request: Request<rla::RackLifecycleRequest>,
    status: RackStatus,
) -> Result<Response<rla::RackResponse>, Status> {
    let request = request.into_inner();
    let rack_id = conv::rack_id_from_wire(&request.id)?;

    let mut txn = api
        .database_connection
        .begin()
        .await
        .map_err(|e| Status::internal(format!("Database error: {}", e)))?;
    let rack = db::rack::set_status(&mut txn, rack_id, status).await?;
    txn.commit()
        .await
        .map_err(|e| Status::internal(format!("Failed to commit transaction: {}", e)))?;

    Ok(Response::new(rla::RackResponse {
        rack: Some(conv::rack_to_wire(&rack)),
    }))
}

pub async fn mark_rack_ingesting(
    api: &Api,
    request: Request<rla::RackLifecycleRequest>,
) -> Result<Response<rla::RackResponse>, Status> {
    set_status(api, request, RackStatus::Ingesting).await
}

pub async fn mark_rack_ingested(
    api: &Api,
    request: Request<rla::RackLifecycleRequest>,
) -> Result<Response<rla::RackResponse>, Status> {
    set_status(api, request, RackStatus::Ingested).await
}
