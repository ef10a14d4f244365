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

//!
//! The rack-inventory service (RLA) library.
//!
//! RLA owns the expected rack/component/NVL-domain model, ingests inventory
//! pages published from sites, and fans power/firmware/validation work out
//! as durable per-rack tasks.

pub mod actual;
pub mod api;
pub mod cfg;
pub mod conv;
pub mod dispatch;
pub mod executors;
pub mod handlers;
pub mod ingest;

use std::sync::Arc;

use eyre::WrapErr;
use rpc::rla::rack_inventory_server::RackInventoryServer;
use workflow::InProcessEngine;

use crate::actual::SiteInventoryActualSource;
use crate::api::Api;
use crate::cfg::RunOptions;
use crate::executors::PsmRackOperationDispatcher;

pub async fn run(options: RunOptions) -> eyre::Result<()> {
    let pool = options.database_pool().await?;
    db::migrations::migrate(&pool)
        .await
        .wrap_err("database migration failed")?;

    let api = Api {
        database_connection: pool,
        engine: Arc::new(InProcessEngine::new()),
        dispatcher: Arc::new(PsmRackOperationDispatcher::new(&options.psm_endpoint)),
        actual: Arc::new(SiteInventoryActualSource::new(&options.site_endpoint)),
    };

    tracing::info!(listen = %options.listen, "starting rack-inventory gRPC listener");
    let mut server = tonic::transport::Server::builder();
    if let Some(tls) = options.server_tls_config().await? {
        server = server
            .tls_config(tls)
            .wrap_err("invalid TLS listener configuration")?;
    }
    server
        .add_service(RackInventoryServer::new(api))
        .serve(options.listen)
        .await
        .wrap_err("gRPC listener failed")?;

    Ok(())
}
