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

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "anvil-agent", about = "The Anvil site agent")]
pub struct Options {
    /// -d for debug logging, -dd for trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub debug: u8,

    /// The site-local device controller's inventory surface.
    #[arg(long, default_value = "http://localhost:50070")]
    pub controller_endpoint: String,

    /// The cloud-side rack-inventory service.
    #[arg(long, default_value = "http://localhost:50062")]
    pub rla_endpoint: String,

    /// ID chunk size for controller lookups.
    #[arg(long, default_value_t = 50)]
    pub site_page_size: usize,

    /// Item count per cloud-submitted page.
    #[arg(long, default_value_t = 25)]
    pub cloud_page_size: usize,

    /// Seconds between publication runs.
    #[arg(long, default_value_t = 300)]
    pub publish_interval_secs: u64,
}

impl Options {
    pub fn load() -> Options {
        Options::parse()
    }
}
