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

//! Service configuration, environment-backed via clap.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eyre::WrapErr;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use tonic::transport::{Certificate, Identity, ServerTlsConfig};

#[derive(Parser, Debug)]
#[command(name = "powershelf-manager", about = "The Anvil powershelf manager")]
pub struct Options {
    /// -d for debug logging, -dd for trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    #[command(subcommand)]
    pub sub_cmd: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply pending database migrations and exit
    Migrate(DbOptions),
    /// Run the service
    Run(RunOptions),
}

impl Options {
    pub fn load() -> Options {
        Options::parse()
    }
}

#[derive(Parser, Debug, Clone)]
pub struct DbOptions {
    #[arg(long, env = "DB_HOST", default_value = "localhost")]
    pub db_host: String,

    #[arg(long, env = "DB_PORT", default_value_t = 5432)]
    pub db_port: u16,

    #[arg(long, env = "DB_NAME", default_value = "anvil")]
    pub db_name: String,

    #[arg(long, env = "DB_USER", default_value = "anvil")]
    pub db_user: String,

    #[arg(long, env = "DB_PASSWORD", default_value = "", hide_env_values = true)]
    pub db_password: String,

    /// When set, the database connection requires TLS against this CA.
    #[arg(long, env = "DB_CA_CERT_PATH")]
    pub db_ca_cert_path: Option<PathBuf>,
}

impl DbOptions {
    pub async fn pool(&self) -> eyre::Result<PgPool> {
        let mut connect_options = PgConnectOptions::new()
            .host(&self.db_host)
            .port(self.db_port)
            .database(&self.db_name)
            .username(&self.db_user)
            .password(&self.db_password);
        if let Some(ca_path) = &self.db_ca_cert_path {
            connect_options = connect_options
                .ssl_mode(PgSslMode::Require)
                .ssl_root_cert(ca_path);
        }
        PgPool::connect_with(connect_options)
            .await
            .wrap_err("unable to connect to database")
    }
}

#[derive(Parser, Debug)]
pub struct RunOptions {
    #[command(flatten)]
    pub db: DbOptions,

    #[arg(long, env = "VAULT_ADDR")]
    pub vault_addr: Option<String>,

    #[arg(long, env = "VAULT_TOKEN", hide_env_values = true)]
    pub vault_token: Option<String>,

    /// Directory with server.crt/server.key/ca.crt for mTLS. When the
    /// material is absent the listener stays plaintext.
    #[arg(long, env = "CERTDIR", default_value = "/etc/anvil/certs")]
    pub certdir: PathBuf,

    #[arg(long, default_value = "0.0.0.0:50061")]
    pub listen: SocketAddr,

    /// Root of the vendor-partitioned firmware artifact tree.
    #[arg(long, default_value = "/usr/share/anvil/firmware")]
    pub firmware_root: PathBuf,

    /// Snapshot cache sweep period, seconds.
    #[arg(long, default_value_t = 30)]
    pub snapshot_interval_secs: u64,

    /// How long a firmware update may sit in `verifying` before the
    /// supervisory sweep fails it, seconds.
    #[arg(long, default_value_t = 1800)]
    pub verifying_timeout_secs: u64,
}

impl RunOptions {
    pub async fn database_pool(&self) -> eyre::Result<PgPool> {
        self.db.pool().await
    }

    /// Loads the mTLS listener config from CERTDIR. Absence of the server
    /// identity disables TLS entirely; a present identity without ca.crt
    /// serves TLS without requiring client certs.
    pub async fn server_tls_config(&self) -> eyre::Result<Option<ServerTlsConfig>> {
        let cert_path = self.certdir.join("server.crt");
        let key_path = self.certdir.join("server.key");
        if !cert_path.exists() || !key_path.exists() {
            tracing::info!(certdir = %self.certdir.display(),
                "no server identity found, serving plaintext");
            return Ok(None);
        }

        let cert = tokio::fs::read(&cert_path)
            .await
            .wrap_err("unable to read server.crt")?;
        let key = tokio::fs::read(&key_path)
            .await
            .wrap_err("unable to read server.key")?;
        let mut tls = ServerTlsConfig::new().identity(Identity::from_pem(cert, key));

        let ca_path = self.certdir.join("ca.crt");
        if ca_path.exists() {
            let ca = tokio::fs::read(&ca_path)
                .await
                .wrap_err("unable to read ca.crt")?;
            tls = tls.client_ca_root(Certificate::from_pem(ca));
        }

        Ok(Some(tls))
    }
}
