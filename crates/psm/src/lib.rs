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
//! The Powershelf Manager (PSM) service library.
//!
//! PSM owns PMC identity, credentials, Redfish sessions and the firmware
//! upgrade state machine. The binary in `main.rs` only parses options and
//! calls [`run`]; everything else lives here so integration tests can run a
//! full server in-process.

pub mod cfg;
pub mod handlers;
pub mod job_manager;
pub mod registry;
pub mod sessions;
pub mod snapshot;

use std::sync::Arc;
use std::time::Duration;

use anvil_secrets::credentials::CredentialProvider;
use anvil_secrets::{VaultConfig, VaultCredentialProvider};
use eyre::WrapErr;
use firmware::Repository;
use rpc::psm::powershelf_manager_server::PowershelfManagerServer;
use tokio_util::sync::CancellationToken;

use crate::cfg::RunOptions;
use crate::handlers::Api;
use crate::job_manager::{FirmwareJobManager, PgFirmwareUpdateStore};
use crate::registry::PgPmcRegistry;
use crate::sessions::RedfishSessionFactory;
use crate::snapshot::{SnapshotCache, SnapshotSweeper};

pub async fn run(options: RunOptions) -> eyre::Result<()> {
    let pool = options.database_pool().await?;
    db::migrations::migrate(&pool)
        .await
        .wrap_err("database migration failed")?;

    let credentials: Arc<dyn CredentialProvider> = match (&options.vault_addr, &options.vault_token)
    {
        (Some(addr), Some(token)) => {
            let provider = VaultCredentialProvider::new(&VaultConfig::new(addr, token))
                .wrap_err("unable to construct vault credential provider")?;
            provider
                .start()
                .await
                .wrap_err("unable to start vault credential provider")?;
            Arc::new(provider)
        }
        _ => {
            tracing::warn!(
                "VAULT_ADDR/VAULT_TOKEN not set, storing PMC credentials in process memory"
            );
            Arc::new(anvil_secrets::credentials::MemoryCredentialProvider::new())
        }
    };

    let repository = Arc::new(
        Repository::load(&options.firmware_root).wrap_err("unable to load firmware repository")?,
    );
    tracing::info!("firmware repository loaded:\n{}", repository.summary());

    let registry = Arc::new(PgPmcRegistry::new(pool.clone()));
    let sessions = Arc::new(RedfishSessionFactory::default());
    let store = Arc::new(PgFirmwareUpdateStore::new(pool.clone()));

    let job_manager = Arc::new(FirmwareJobManager::new(
        registry.clone(),
        credentials.clone(),
        repository.clone(),
        store,
        sessions.clone(),
    ));

    let cancel = CancellationToken::new();

    let sweep_manager = job_manager.clone();
    let sweep_cancel = cancel.clone();
    let verifying_timeout = Duration::from_secs(options.verifying_timeout_secs);
    tokio::spawn(async move {
        sweep_manager
            .run_supervisory_sweep(Duration::from_secs(60), verifying_timeout, sweep_cancel)
            .await;
    });

    let snapshot = Arc::new(SnapshotCache::new());
    let sweeper = SnapshotSweeper::new(
        registry.clone(),
        credentials.clone(),
        sessions.clone(),
        snapshot.clone(),
        Duration::from_secs(options.snapshot_interval_secs),
    );
    let snapshot_cancel = cancel.clone();
    tokio::spawn(async move {
        sweeper.run(snapshot_cancel).await;
    });

    let api = Api {
        registry,
        credentials,
        job_manager,
        snapshot,
        sessions,
        repository,
    };

    tracing::info!(listen = %options.listen, "starting powershelf-manager gRPC listener");
    let mut server = tonic::transport::Server::builder();
    if let Some(tls) = options.server_tls_config().await? {
        server = server
            .tls_config(tls)
            .wrap_err("invalid TLS listener configuration")?;
    }
    server
        .add_service(PowershelfManagerServer::new(api))
        .serve(options.listen)
        .await
        .wrap_err("gRPC listener failed")?;

    cancel.cancel();
    Ok(())
}
