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

//! Authenticated Redfish sessions against power shelf PMCs.
//!
//! The adapter speaks the small, stable resource subset a PMC exposes:
//! session service, chassis, manager, PSU power readings, chassis reset and
//! firmware push. It never retries and adds no timeout of its own; the
//! caller's context deadline governs every call. Sessions are per-request:
//! callers must `logout()` before returning.

pub mod session;

pub use session::{PowerAction, RedfishClientConfig, RedfishSession};

#[derive(thiserror::Error, Debug)]
pub enum RedfishError {
    /// The endpoint could not be reached at the transport level.
    #[error("PMC endpoint unreachable: {0}")]
    Unreachable(String),

    /// The PMC rejected our credentials.
    #[error("PMC rejected authentication: {0}")]
    Unauthorized(String),

    /// The device reports an active job and will not take another.
    #[error("PMC is busy: {0}")]
    DeviceBusy(String),

    /// Anything else the device said; surfaced raw for the caller.
    #[error("PMC returned HTTP {status}: {body}")]
    Other { status: u16, body: String },
}
