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

//! PMC Manufacturer ID

use std::fmt;

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    PartialEq,
    Hash,
    clap::ValueEnum,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum PmcVendor {
    Liteon,
    Delta,
    #[serde(other)]
    #[default]
    Unknown,
}

impl fmt::Display for PmcVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = format!("{self:?}").to_lowercase();
        write!(f, "{s}")
    }
}

impl From<&str> for PmcVendor {
    fn from(s: &str) -> PmcVendor {
        match s.to_lowercase().as_str() {
            "liteon" => PmcVendor::Liteon,
            "delta" => PmcVendor::Delta,
            _ => PmcVendor::Unknown,
        }
    }
}

impl PmcVendor {
    /// to_pascalcase converts to StringLikeThis to match serialization
    pub fn to_pascalcase(self) -> String {
        match self {
            PmcVendor::Liteon => "Liteon",
            PmcVendor::Delta => "Delta",
            PmcVendor::Unknown => "Unknown",
        }
        .to_string()
    }

    /// The stable integer form stored in the `pmc.vendor` column.
    pub fn as_i32(self) -> i32 {
        match self {
            PmcVendor::Unknown => 0,
            PmcVendor::Liteon => 1,
            PmcVendor::Delta => 2,
        }
    }

    pub fn from_i32(v: i32) -> PmcVendor {
        match v {
            1 => PmcVendor::Liteon,
            2 => PmcVendor::Delta,
            _ => PmcVendor::Unknown,
        }
    }

    /// Whether the vendor is one we ship firmware and upgrade rules for.
    pub fn supported(self) -> bool {
        !self.is_unknown()
    }

    pub fn is_liteon(&self) -> bool {
        *self == Self::Liteon
    }

    pub fn is_delta(&self) -> bool {
        *self == Self::Delta
    }

    pub fn is_unknown(&self) -> bool {
        *self == Self::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_is_case_insensitive() {
        assert_eq!(PmcVendor::from("liteon"), PmcVendor::Liteon);
        assert_eq!(PmcVendor::from("LITEON"), PmcVendor::Liteon);
        assert_eq!(PmcVendor::from("LiteOn"), PmcVendor::Liteon);
        assert_eq!(PmcVendor::from("Delta"), PmcVendor::Delta);
        assert_eq!(PmcVendor::from("acme"), PmcVendor::Unknown);
        assert_eq!(PmcVendor::from(""), PmcVendor::Unknown);
    }

    #[test]
    fn test_i32_round_trip() {
        for vendor in [PmcVendor::Liteon, PmcVendor::Delta, PmcVendor::Unknown] {
            assert_eq!(PmcVendor::from_i32(vendor.as_i32()), vendor);
        }
        // Out-of-range values decode as Unknown rather than failing
        assert_eq!(PmcVendor::from_i32(99), PmcVendor::Unknown);
    }

    #[test]
    fn test_unknown_is_unsupported() {
        assert!(PmcVendor::Liteon.supported());
        assert!(PmcVendor::Delta.supported());
        assert!(!PmcVendor::Unknown.supported());
    }
}
