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

//! Per-vendor upgrade admission rules.
//!
//! A rule only answers whether one edge is admissible from one current
//! version; enumeration over the edge set stays with the caller. New vendors
//! plug in by implementing [`UpgradeRule`] and registering in [`rule_for`].

use model::firmware::{FirmwareUpgrade, FirmwareVersion};
use pmc_vendor::PmcVendor;

pub trait UpgradeRule: Send + Sync {
    /// Whether a device currently at `current` may take `edge`.
    fn allowed(&self, current: FirmwareVersion, edge: &FirmwareUpgrade) -> bool;

    /// One line describing the rule, for operator-facing summaries.
    fn summary(&self) -> String;
}

/// Upgrade permitted only when the device's current version equals the
/// edge's source version.
pub struct DirectOnly;

impl UpgradeRule for DirectOnly {
    fn allowed(&self, current: FirmwareVersion, edge: &FirmwareUpgrade) -> bool {
        current.cmp(&edge.from).is_eq()
    }

    fn summary(&self) -> String {
        "direct-only: the running version must equal the edge source".to_string()
    }
}

static DIRECT_ONLY: DirectOnly = DirectOnly;

/// The rule governing upgrades for a vendor; `None` for vendors we don't
/// ship firmware for.
pub fn rule_for(vendor: PmcVendor) -> Option<&'static dyn UpgradeRule> {
    match vendor {
        PmcVendor::Liteon | PmcVendor::Delta => Some(&DIRECT_ONLY),
        PmcVendor::Unknown => None,
    }
}

/// The first edge reaching `target` that the rule admits from `current`,
/// or `None` when no shipped edge applies.
pub fn select_edge<'a>(
    rule: &dyn UpgradeRule,
    edges: &'a [FirmwareUpgrade],
    current: FirmwareVersion,
    target: FirmwareVersion,
) -> Option<&'a FirmwareUpgrade> {
    edges
        .iter()
        .find(|edge| edge.to == target && rule.allowed(current, edge))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn edge(from: (u32, u32, u32), to: (u32, u32, u32)) -> FirmwareUpgrade {
        FirmwareUpgrade {
            from: FirmwareVersion::new(from.0, from.1, from.2),
            to: FirmwareVersion::new(to.0, to.1, to.2),
            artifact_path: PathBuf::from(format!(
                "pmc_r{}.{}.{}_to_r{}.{}.{}.bin",
                from.0, from.1, from.2, to.0, to.1, to.2
            )),
        }
    }

    #[test]
    fn test_direct_only_requires_exact_source() {
        let e = edge((1, 0, 0), (1, 1, 0));
        assert!(DirectOnly.allowed(FirmwareVersion::new(1, 0, 0), &e));
        assert!(!DirectOnly.allowed(FirmwareVersion::new(1, 0, 1), &e));
        assert!(!DirectOnly.allowed(FirmwareVersion::new(1, 1, 0), &e));
    }

    // Repo has r1.0.0→r1.1.0 and r1.1.0→r2.0.0. Under direct-only, a device
    // at r1.0.0 cannot reach r2.0.0 but can reach r1.1.0.
    #[test]
    fn test_select_edge_direct_only() {
        let edges = vec![edge((1, 0, 0), (1, 1, 0)), edge((1, 1, 0), (2, 0, 0))];
        let rule = rule_for(PmcVendor::Liteon).unwrap();

        let current = FirmwareVersion::new(1, 0, 0);
        assert!(select_edge(rule, &edges, current, FirmwareVersion::new(2, 0, 0)).is_none());

        let selected = select_edge(rule, &edges, current, FirmwareVersion::new(1, 1, 0))
            .expect("direct edge should be admitted");
        assert_eq!(selected, &edges[0]);
    }

    #[test]
    fn test_select_edge_returns_first_match_for_duplicate_targets() {
        // Two artifacts implement the same edge; selection is stable on the
        // first one.
        let edges = vec![edge((1, 0, 0), (1, 1, 0)), edge((1, 0, 0), (1, 1, 0))];
        let rule = rule_for(PmcVendor::Delta).unwrap();
        let selected = select_edge(
            rule,
            &edges,
            FirmwareVersion::new(1, 0, 0),
            FirmwareVersion::new(1, 1, 0),
        )
        .unwrap();
        assert!(std::ptr::eq(selected, &edges[0]));
    }

    #[test]
    fn test_unknown_vendor_has_no_rule() {
        assert!(rule_for(PmcVendor::Unknown).is_none());
    }
}
