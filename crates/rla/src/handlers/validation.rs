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

//! Expected-vs-actual component queries over an operation target scope.

use model::component::Component;
use model::validation::validate_components;
use rpc::rla;
use tonic::{Request, Response, Status};

use crate::api::Api;
use crate::conv;
use crate::dispatch::{self, RackScope};

async fn resolve(api: &Api, targets: Option<rla::OperationTargetSpec>) -> Result<Vec<RackScope>, Status> {
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
    Ok(scopes)
}

fn expected_components(scopes: &[RackScope]) -> Vec<Component> {
    scopes
        .iter()
        .flat_map(|scope| scope.components.iter().cloned())
        .collect()
}

async fn actual_components(api: &Api, scopes: &[RackScope]) -> Result<Vec<Component>, Status> {
    let mut components = Vec::new();
    for scope in scopes {
        let mut actual = api
            .actual
            .components_for_rack(&scope.rack)
            .await
            .map_err(|e| Status::unavailable(format!("unable to query site inventory: {e}")))?;
        if let Some(wanted) = scope.component_type {
            actual.retain(|c| c.component_type == wanted);
        }
        components.append(&mut actual);
    }
    Ok(components)
}

pub async fn get_expected_components(
    api: &Api,
    request: Request<rla::ComponentScopeRequest>,
) -> Result<Response<rla::ComponentList>, Status> {
    let scopes = resolve(api, request.into_inner().targets).await?;
    Ok(Response::new(rla::ComponentList {
        components: expected_components(&scopes)
            .iter()
            .map(conv::component_to_wire)
            .collect(),
    }))
}

pub async fn get_actual_components(
    api: &Api,
    request: Request<rla::ComponentScopeRequest>,
) -> Result<Response<rla::ComponentList>, Status> {
    let scopes = resolve(api, request.into_inner().targets).await?;
    let actual = actual_components(api, &scopes).await?;
    Ok(Response::new(rla::ComponentList {
        components: actual.iter().map(conv::component_to_wire).collect(),
    }))
}

pub async fn validate(
    api: &Api,
    request: Request<rla::ComponentScopeRequest>,
) -> Result<Response<rla::ValidateComponentsResponse>, Status> {
    let scopes = resolve(api, request.into_inner().targets).await?;
    let expected = expected_components(&scopes);
    let actual = actual_components(api, &scopes).await?;

    let report = validate_components(&expected, &actual);

    Ok(Response::new(rla::ValidateComponentsResponse {
        diffs: report
            .diffs
            .iter()
            .map(|diff| rla::ComponentDiff {
                serial_number: diff.serial_number.clone(),
                kind: diff.kind.as_str().to_string(),
                detail: diff.detail.clone(),
            })
            .collect(),
        only_in_expected: report.only_in_expected,
        only_in_actual: report.only_in_actual,
        drift: report.drift,
        matched: report.matched,
    }))
}
