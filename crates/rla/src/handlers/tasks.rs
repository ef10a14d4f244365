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

use std::str::FromStr;

use model::firmware::FirmwareVersion;
use model::ids::TaskId;
use rpc::rla;
use tonic::{Request, Response, Status};
use workflow::TaskState;

use crate::api::Api;
use crate::dispatch::{self, RackOperation};

async fn run_operation(
    api: &Api,
    targets: Option<rla::OperationTargetSpec>,
    operation: RackOperation,
) -> Result<Response<rla::TaskList>, Status> {
    let spec = targets.ok_or_else(|| Status::invalid_argument("targets are required"))?;

    let mut txn = api
        .database_connection
        .begin()
        .await
        .map_err(|e| Status::internal(format!("Database error: {}", e)))?;
    let scopes = dispatch::resolve_scope(&mut txn, &spec).await?;
    txn.commit()
        .await
        .map_err(|e| Status::internal(format!("Failed to commit transaction: {}", e)))?;

    let task_ids = dispatch::submit_tasks(
        api.engine.as_ref(),
        api.dispatcher.clone(),
        operation,
        scopes,
    )
    .await;

    Ok(Response::new(rla::TaskList {
        task_ids: task_ids.iter().map(|id| id.to_string()).collect(),
    }))
}

pub async fn upgrade_firmware(
    api: &Api,
    request: Request<rla::UpgradeFirmwareRequest>,
) -> Result<Response<rla::TaskList>, Status> {
    let request = request.into_inner();
    let target_version = FirmwareVersion::from_str(&request.target_version).map_err(|_| {
        Status::invalid_argument(format!(
            "firmware version {} is not valid",
            request.target_version
        ))
    })?;
    let window = dispatch::validate_schedule_window(
        request.start_time.as_deref(),
        request.end_time.as_deref(),
    )?;

    run_operation(
        api,
        request.targets,
        RackOperation::UpgradeFirmware {
            target_version,
            window,
        },
    )
    .await
}

pub async fn power_on_rack(
    api: &Api,
    request: Request<rla::PowerRackRequest>,
) -> Result<Response<rla::TaskList>, Status> {
    let request = request.into_inner();
    run_operation(
        api,
        request.targets,
        RackOperation::PowerOn {
            forced: request.forced,
        },
    )
    .await
}

pub async fn power_off_rack(
    api: &Api,
    request: Request<rla::PowerRackRequest>,
) -> Result<Response<rla::TaskList>, Status> {
    let request = request.into_inner();
    run_operation(
        api,
        request.targets,
        RackOperation::PowerOff {
            forced: request.forced,
        },
    )
    .await
}

pub async fn power_reset_rack(
    api: &Api,
    request: Request<rla::PowerRackRequest>,
) -> Result<Response<rla::TaskList>, Status> {
    let request = request.into_inner();
    run_operation(
        api,
        request.targets,
        RackOperation::PowerReset {
            forced: request.forced,
        },
    )
    .await
}

pub async fn get_task_status(
    api: &Api,
    request: Request<rla::GetTaskStatusRequest>,
) -> Result<Response<rla::TaskStatusResponse>, Status> {
    let request = request.into_inner();
    let task_id = TaskId::from_str(&request.task_id)
        .map_err(|_| Status::invalid_argument(format!("task ID {} is not valid", request.task_id)))?;

    let record = api
        .engine
        .task(task_id)
        .await
        .ok_or_else(|| Status::not_found(format!("Task not found: {task_id}")))?;

    let (state, error) = match record.state {
        TaskState::Running => ("running", None),
        TaskState::Completed => ("completed", None),
        TaskState::Failed(message) => ("failed", Some(message)),
    };

    Ok(Response::new(rla::TaskStatusResponse {
        task_id: record.task_id.to_string(),
        state: state.to_string(),
        error,
    }))
}
