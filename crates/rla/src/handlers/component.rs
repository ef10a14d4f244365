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

use rpc::rla;
use tonic::{Request, Response, Status};

use crate::api::Api;
use crate::conv;

pub async fn create_component(
    api: &Api,
    request: Request<rla::CreateComponentRequest>,
) -> Result<Response<rla::CreateComponentResponse>, Status> {
    let request = request.into_inner();
    let wire_component = request
        .component
        .ok_or_else(|| Status::invalid_argument("component is required"))?;
    let component = conv::component_from_wire(&wire_component)?;
    if component.serial_number.is_empty() {
        return Err(Status::invalid_argument(
            "component serial_number is required",
        ));
    }

    let mut txn = api
        .database_connection
        .begin()
        .await
        .map_err(|e| Status::internal(format!("Database error: {}", e)))?;
    let created = db::component::create(&mut txn, &component).await?;
    txn.commit()
        .await
        .map_err(|e| Status::internal(format!("Failed to commit transaction: {}", e)))?;

    Ok(Response::new(rla::CreateComponentResponse {
        id: created.id.to_string(),
    }))
}

pub async fn get_component_by_id(
    api: &Api,
    request: Request<rla::GetComponentByIdRequest>,
) -> Result<Response<rla::ComponentResponse>, Status> {
    let request = request.into_inner();
    let component_id = conv::component_id_from_wire(&request.id)?;

    let mut txn = api
        .database_connection
        .begin()
        .await
        .map_err(|e| Status::internal(format!("Database error: {}", e)))?;
    let component = db::component::find_by_id(&mut txn, component_id).await?;
    txn.commit()
        .await
        .map_err(|e| Status::internal(format!("Failed to commit transaction: {}", e)))?;

    Ok(Response::new(rla::ComponentResponse {
        component: Some(conv::component_to_wire(&component)),
    }))
}

pub async fn get_component_by_serial(
    api: &Api,
    request: Request<rla::GetComponentBySerialRequest>,
) -> Result<Response<rla::ComponentResponse>, Status> {
    let request = request.into_inner();
    if request.serial_number.is_empty() {
        return Err(Status::invalid_argument("serial_number is required"));
    }

    let mut txn = api
        .database_connection
        .begin()
        .await
        .map_err(|e| Status::internal(format!("Database error: {}", e)))?;
    let component =
        db::component::find_by_serial(&mut txn, &request.manufacturer, &request.serial_number)
            .await?;
    txn.commit()
        .await
        .map_err(|e| Status::internal(format!("Failed to commit transaction: {}", e)))?;

    Ok(Response::new(rla::ComponentResponse {
        component: Some(conv::component_to_wire(&component)),
    }))
}

pub async fn patch_component(
    api: &Api,
    request: Request<rla::PatchComponentRequest>,
) -> Result<Response<rla::ComponentResponse>, Status> {
    let request = request.into_inner();
    let wire_component = request
        .component
        .ok_or_else(|| Status::invalid_argument("component is required"))?;
    if wire_component.id.is_empty() {
        return Err(Status::invalid_argument(
            "component id is required for a patch",
        ));
    }
    let incoming = conv::component_from_wire(&wire_component)?;

    let mut txn = api
        .database_connection
        .begin()
        .await
        .map_err(|e| Status::internal(format!("Database error: {}", e)))?;
    let current = db::component::find_by_id(&mut txn, incoming.id).await?;

    let component = match current.build_patch(&incoming) {
        None => current,
        Some(patched) => db::component::apply_patch(&mut txn, &patched).await?,
    };
    txn.commit()
        .await
        .map_err(|e| Status::internal(format!("Failed to commit transaction: {}", e)))?;

    Ok(Response::new(rla::ComponentResponse {
        component: Some(conv::component_to_wire(&component)),
    }))
}

pub async fn set_component_external_id(
    api: &Api,
    request: Request<rla::SetComponentExternalIdRequest>,
) -> Result<Response<rla::ComponentResponse>, Status> {
    let request = request.into_inner();
    if request.serial_number.is_empty() {
        return Err(Status::invalid_argument("serial_number is required"));
    }
    if request.external_id.is_empty() {
        return Err(Status::invalid_argument("external_id is required"));
    }

    let mut txn = api
        .database_connection
        .begin()
        .await
        .map_err(|e| Status::internal(format!("Database error: {}", e)))?;
    let component = db::component::set_external_id_by_serial(
        &mut txn,
        &request.serial_number,
        &request.external_id,
    )
    .await?;
    txn.commit()
        .await
        .map_err(|e| Status::internal(format!("Failed to commit transaction: {}", e)))?;

    Ok(Response::new(rla::ComponentResponse {
        component: Some(conv::component_to_wire(&component)),
    }))
}

pub async fn set_component_power_state(
    api: &Api,
    request: Request<rla::SetComponentPowerStateRequest>,
) -> Result<Response<rla::ComponentResponse>, Status> {
    let request = request.into_inner();
    if request.external_id.is_empty() {
        return Err(Status::invalid_argument("external_id is required"));
    }
    let power_state = conv::power_state_from_wire(request.power_state)?;

    let mut txn = api
        .database_connection
        .begin()
        .await
        .map_err(|e| Status::internal(format!("Database error: {}", e)))?;
    let component =
        db::component::set_power_state_by_external_id(&mut txn, &request.external_id, power_state)
            .await?;
    txn.commit()
        .await
        .map_err(|e| Status::internal(format!("Failed to commit transaction: {}", e)))?;

    Ok(Response::new(rla::ComponentResponse {
        component: Some(conv::component_to_wire(&component)),
    }))
}
