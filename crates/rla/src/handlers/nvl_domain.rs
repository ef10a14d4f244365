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

use model::ids::RackId;
use rpc::rla;
use sqlx::PgConnection;
use tonic::{Request, Response, Status};

use crate::api::Api;
use crate::conv;

fn parse_rack_ids(raw: &[String]) -> Result<Vec<RackId>, Status> {
    raw.iter()
        .map(|id| conv::rack_id_from_wire(id).map_err(Status::from))
        .collect()
}

async fn domain_to_wire(
    txn: &mut PgConnection,
    domain: &model::nvl_domain::NvlDomain,
) -> Result<rla::NvlDomain, Status> {
    let racks = db::rack::list_by_nvl_domain(txn, domain.id).await?;
    Ok(rla::NvlDomain {
        id: domain.id.to_string(),
        name: domain.name.clone(),
        rack_ids: racks.iter().map(|r| r.id.to_string()).collect(),
    })
}

pub async fn create_nvl_domain(
    api: &Api,
    request: Request<rla::CreateNvlDomainRequest>,
) -> Result<Response<rla::NvlDomainResponse>, Status> {
    let request = request.into_inner();

    let mut txn = api
        .database_connection
        .begin()
        .await
        .map_err(|e| Status::internal(format!("Database error: {}", e)))?;
    let domain = db::nvl_domain::create(&mut txn, &request.name).await?;
    let wire = domain_to_wire(&mut txn, &domain).await?;
    txn.commit()
        .await
        .map_err(|e| Status::internal(format!("Failed to commit transaction: {}", e)))?;

    Ok(Response::new(rla::NvlDomainResponse {
        nvl_domain: Some(wire),
    }))
}

pub async fn attach_racks(
    api: &Api,
    request: Request<rla::NvlDomainMembershipRequest>,
) -> Result<Response<rla::NvlDomainMembershipResponse>, Status> {
    let request = request.into_inner();
    let nvl_domain_id = conv::nvl_domain_id_from_wire(&request.nvl_domain_id)?;
    let rack_ids = parse_rack_ids(&request.rack_ids)?;

    let mut txn = api
        .database_connection
        .begin()
        .await
        .map_err(|e| Status::internal(format!("Database error: {}", e)))?;
    db::nvl_domain::attach_racks(&mut txn, nvl_domain_id, &rack_ids).await?;
    txn.commit()
        .await
        .map_err(|e| Status::internal(format!("Failed to commit transaction: {}", e)))?;

    Ok(Response::new(rla::NvlDomainMembershipResponse {}))
}

pub async fn detach_racks(
    api: &Api,
    request: Request<rla::NvlDomainMembershipRequest>,
) -> Result<Response<rla::NvlDomainMembershipResponse>, Status> {
    let request = request.into_inner();
    let nvl_domain_id = conv::nvl_domain_id_from_wire(&request.nvl_domain_id)?;
    let rack_ids = parse_rack_ids(&request.rack_ids)?;

    let mut txn = api
        .database_connection
        .begin()
        .await
        .map_err(|e| Status::internal(format!("Database error: {}", e)))?;
    db::nvl_domain::detach_racks(&mut txn, nvl_domain_id, &rack_ids).await?;
    txn.commit()
        .await
        .map_err(|e| Status::internal(format!("Failed to commit transaction: {}", e)))?;

    Ok(Response::new(rla::NvlDomainMembershipResponse {}))
}

pub async fn list_nvl_domains(
    api: &Api,
    _request: Request<rla::ListNvlDomainsRequest>,
) -> Result<Response<rla::ListNvlDomainsResponse>, Status> {
    let mut txn = api
        .database_connection
        .begin()
        .await
        .map_err(|e| Status::internal(format!("Database error: {}", e)))?;
    let domains = db::nvl_domain::list(&mut txn).await?;
    let mut nvl_domains = Vec::with_capacity(domains.len());
    for domain in &domains {
        nvl_domains.push(domain_to_wire(&mut txn, domain).await?);
    }
    txn.commit()
        .await
        .map_err(|e| Status::internal(format!("Failed to commit transaction: {}", e)))?;

    Ok(Response::new(rla::ListNvlDomainsResponse { nvl_domains }))
}

pub async fn racks_for_nvl_domain(
    api: &Api,
    request: Request<rla::GetRacksForNvlDomainRequest>,
) -> Result<Response<rla::ListRacksResponse>, Status> {
    let request = request.into_inner();
    let nvl_domain_id = conv::nvl_domain_id_from_wire(&request.nvl_domain_id)?;

    let mut txn = api
        .database_connection
        .begin()
        .await
        .map_err(|e| Status::internal(format!("Database error: {}", e)))?;
    // Verify the domain exists so that an unknown ID is NotFound rather
    // than an empty list.
    db::nvl_domain::find_by_id(&mut txn, nvl_domain_id).await?;
    let racks = db::rack::list_by_nvl_domain(&mut txn, nvl_domain_id).await?;
    txn.commit()
        .await
        .map_err(|e| Status::internal(format!("Failed to commit transaction: {}", e)))?;

    let total = racks.len() as u64;
    Ok(Response::new(rla::ListRacksResponse {
        racks: racks.iter().map(conv::rack_to_wire).collect(),
        total,
    }))
}
