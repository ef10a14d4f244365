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
use std::backtrace::{Backtrace, BacktraceStatus};

use tonic::Status;

/// RpcDataConversionError enumerates errors that can occur when
/// converting from the RPC data format into the internal data model.
#[derive(Debug, thiserror::Error)]
pub enum RpcDataConversionError {
    #[error("MAC address {0} is not valid")]
    InvalidMacAddress(String),
    #[error("IP Address {0} is not valid")]
    InvalidIpAddress(String),
    #[error("Invalid UUID for field of type {0}: {1}")]
    InvalidUuid(&'static str, String),
    #[error("Firmware version string {0} is not valid")]
    InvalidFirmwareVersion(String),
    #[error("Vendor {0} is not supported")]
    UnsupportedVendor(String),
    #[error("Timestamp {0} is not valid")]
    InvalidTimestamp(String),
    #[error("Invalid enum value {1} for {0}")]
    InvalidEnumValue(&'static str, i32),
    #[error("Invalid value {1} for {0}")]
    InvalidValue(String, String),
    #[error("Argument is invalid: {0}")]
    InvalidArgument(String),
    #[error("Argument {0} is missing")]
    MissingArgument(&'static str),
}

impl From<RpcDataConversionError> for tonic::Status {
    fn from(from: RpcDataConversionError) -> Self {
        // If env RUST_BACKTRACE is set extract handler and err location
        // If it's not set `Backtrace::capture()` is very cheap to call
        let b = Backtrace::capture();
        let printed = if b.status() == BacktraceStatus::Captured {
            let b_str = b.to_string();
            let f = b_str
                .lines()
                .skip(1)
                .skip_while(|l| !l.contains("anvil"))
                .take(2)
                .collect::<Vec<&str>>();
            if f.len() == 2 {
                let handler = f[0].trim();
                let location = f[1].trim().replace("at ", "");
                tracing::error!("{from} location={location} handler='{handler}'");
                true
            } else {
                false
            }
        } else {
            false
        };

        if !printed {
            tracing::error!("{from}");
        }

        Status::invalid_argument(from.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_errors_map_to_invalid_argument() {
        let status = Status::from(RpcDataConversionError::InvalidMacAddress(
            "not-a-mac".to_string(),
        ));
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
        assert!(status.message().contains("not-a-mac"));
    }
}
