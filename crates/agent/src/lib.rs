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

//!
//! The Anvil site agent library.
//!
//! The agent proxies the cloud control plane down to on-premise device
//! controllers. Its publisher pages through site-local inventory and
//! submits it to the cloud side as durable, idempotent page activities.

pub mod cfg;
pub mod ingest;
pub mod publisher;
pub mod source;

use std::sync::Arc;
use std::time::Duration;

use model::inventory::InventoryKind;
use tokio_util::sync::CancellationToken;
use workflow::InProcessEngine;

use crate::cfg::Options;
use crate::ingest::RlaInventoryIngest;
use crate::publisher::InventoryPublisher;
use crate::source::GrpcInventorySource;

pub async fn run(options: Options) -> eyre::Result<()> {
    let publisher = InventoryPublisher::new(
        Arc::new(GrpcInventorySource::new(&options.controller_endpoint)),
        Arc::new(RlaInventoryIngest::new(&options.rla_endpoint)),
        Arc::new(InProcessEngine::new()),
        options.site_page_size,
        options.cloud_page_size,
    );

    tracing::info!(
        controller = %options.controller_endpoint,
        rla = %options.rla_endpoint,
        interval = options.publish_interval_secs,
        "starting inventory publisher"
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            shutdown.cancel();
        }
    });

    publisher
        .run(
            InventoryKind::ExpectedMachine,
            Duration::from_secs(options.publish_interval_secs),
            cancel,
        )
        .await;

    Ok(())
}
