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

//! Expected-vs-actual component validation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::component::Component;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffKind {
    /// Declared in the expected inventory, missing from the actual.
    OnlyInExpected,
    /// Reported by an external controller, not declared.
    OnlyInActual,
    /// Present on both sides but with diverging model or firmware.
    Drift,
}

impl DiffKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnlyInExpected => "only_in_expected",
            Self::OnlyInActual => "only_in_actual",
            Self::Drift => "drift",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentDiff {
    pub serial_number: String,
    pub kind: DiffKind,
    pub detail: String,
}

/// The outcome of one validation run over a component scope.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub diffs: Vec<ComponentDiff>,
    pub only_in_expected: u32,
    pub only_in_actual: u32,
    pub drift: u32,
    pub matched: u32,
}

/// Joins expected and actual component sets by serial number.
///
/// Components sharing a serial count as `matched` when model and firmware
/// agree, and as `drift` otherwise. Output ordering is deterministic
/// (sorted by serial) so that repeated runs produce identical reports.
pub fn validate_components(expected: &[Component], actual: &[Component]) -> ValidationReport {
    let expected_by_serial: BTreeMap<&str, &Component> = expected
        .iter()
        .map(|c| (c.serial_number.as_str(), c))
        .collect();
    let actual_by_serial: BTreeMap<&str, &Component> = actual
        .iter()
        .map(|c| (c.serial_number.as_str(), c))
        .collect();

    let mut report = ValidationReport::default();

    for (serial, exp) in &expected_by_serial {
        match actual_by_serial.get(serial) {
            None => {
                report.only_in_expected += 1;
                report.diffs.push(ComponentDiff {
                    serial_number: serial.to_string(),
                    kind: DiffKind::OnlyInExpected,
                    detail: format!("expected {} not reported by site", exp.component_type),
                });
            }
            Some(act) => {
                let mut drifts = Vec::new();
                if !exp.model.is_empty() && exp.model != act.model {
                    drifts.push(format!("model {:?} != {:?}", exp.model, act.model));
                }
                if !exp.firmware_version.is_empty()
                    && exp.firmware_version != act.firmware_version
                {
                    drifts.push(format!(
                        "firmware {:?} != {:?}",
                        exp.firmware_version, act.firmware_version
                    ));
                }
                if drifts.is_empty() {
                    report.matched += 1;
                } else {
                    report.drift += 1;
                    report.diffs.push(ComponentDiff {
                        serial_number: serial.to_string(),
                        kind: DiffKind::Drift,
                        detail: drifts.join(", "),
                    });
                }
            }
        }
    }

    for (serial, act) in &actual_by_serial {
        if !expected_by_serial.contains_key(serial) {
            report.only_in_actual += 1;
            report.diffs.push(ComponentDiff {
                serial_number: serial.to_string(),
                kind: DiffKind::OnlyInActual,
                detail: format!("unexpected {} reported by site", act.component_type),
            });
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentType;

    fn component(serial: &str, model: &str, firmware: &str) -> Component {
        Component {
            serial_number: serial.to_string(),
            model: model.to_string(),
            firmware_version: firmware.to_string(),
            component_type: ComponentType::Compute,
            ..Default::default()
        }
    }

    #[test]
    fn test_expected_c1_c2_vs_actual_c2_c3() {
        let expected = vec![
            component("C1", "GB200", "r1.0.0"),
            component("C2", "GB200", "r1.0.0"),
        ];
        let actual = vec![
            component("C2", "GB200", "r1.0.0"),
            component("C3", "GB200", "r1.0.0"),
        ];

        let report = validate_components(&expected, &actual);
        assert_eq!(report.only_in_expected, 1);
        assert_eq!(report.only_in_actual, 1);
        assert_eq!(report.matched, 1);
        assert_eq!(report.drift, 0);
        assert_eq!(report.diffs.len(), 2);
        assert_eq!(report.diffs[0].serial_number, "C1");
        assert_eq!(report.diffs[0].kind, DiffKind::OnlyInExpected);
        assert_eq!(report.diffs[1].serial_number, "C3");
        assert_eq!(report.diffs[1].kind, DiffKind::OnlyInActual);
    }

    #[test]
    fn test_firmware_divergence_counts_as_drift() {
        let expected = vec![component("C1", "GB200", "r1.1.0")];
        let actual = vec![component("C1", "GB200", "r1.0.0")];

        let report = validate_components(&expected, &actual);
        assert_eq!(report.drift, 1);
        assert_eq!(report.matched, 0);
        assert_eq!(report.diffs.len(), 1);
        assert!(report.diffs[0].detail.contains("firmware"));
    }

    #[test]
    fn test_empty_expected_fields_do_not_drift() {
        // An expected row without a declared firmware version matches any
        // actual firmware.
        let expected = vec![component("C1", "", "")];
        let actual = vec![component("C1", "GB200", "r1.0.0")];

        let report = validate_components(&expected, &actual);
        assert_eq!(report.matched, 1);
        assert_eq!(report.drift, 0);
    }

    #[test]
    fn test_empty_sets() {
        let report = validate_components(&[], &[]);
        assert_eq!(report, ValidationReport::default());
    }
}
