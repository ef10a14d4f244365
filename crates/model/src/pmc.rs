/*
 * SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: LicenseRef-NvidiaProprietary
 *
 * NVIDIA CORPORATION, its affiliates and licensors retain all intellectual
 * property and proprietary rights in and to this material, related
 * documentation and any modifications thereto. Any use, reproduction,
 * disclosure or distribution of this material and related documentation
 * without an express license agreement from NVIDIA CORPORATION or
 * its affiliates is strictly prohibited.
 */

use std::net::IpAddr;

use mac_address::MacAddress;
use pmc_vendor::PmcVendor;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::postgres::PgRow;

/// A registered Power Management Controller.
///
/// The MAC address is the stable identifier and, together with the vendor,
/// immutable after registration; only the IP address is patchable. The
/// credential for the PMC is owned by the secrets store and never travels
/// on this struct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pmc {
    pub mac_address: MacAddress,
    pub ip_address: IpAddr,
    pub vendor: PmcVendor,
}

impl Pmc {
    /// The HTTPS base URL of the PMC's Redfish service.
    pub fn redfish_endpoint(&self) -> String {
        match self.ip_address {
            IpAddr::V4(ip) => format!("https://{ip}"),
            IpAddr::V6(ip) => format!("https://[{ip}]"),
        }
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for Pmc {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let ip: ipnetwork::IpNetwork = row.try_get("ip_address")?;
        Ok(Pmc {
            mac_address: row.try_get("mac_address")?,
            ip_address: ip.ip(),
            vendor: PmcVendor::from_i32(row.try_get("vendor")?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redfish_endpoint_wraps_v6() {
        let pmc = Pmc {
            mac_address: "00:11:22:33:44:55".parse().unwrap(),
            ip_address: "192.168.1.100".parse().unwrap(),
            vendor: PmcVendor::Liteon,
        };
        assert_eq!(pmc.redfish_endpoint(), "https://192.168.1.100");

        let pmc = Pmc {
            ip_address: "fd00::17".parse().unwrap(),
            ..pmc
        };
        assert_eq!(pmc.redfish_endpoint(), "https://[fd00::17]");
    }
}
