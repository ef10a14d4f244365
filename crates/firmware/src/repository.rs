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

//! Artifact repository: one subdirectory per vendor, artifact file names
//! carrying the upgrade edge they implement.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use model::firmware::{FirmwareUpgrade, FirmwareVersion};
use pmc_vendor::PmcVendor;
use regex::Regex;
use walkdir::WalkDir;

use crate::FirmwareError;

/// Matches `…_r<a>.<b>.<c>_to_r<d>.<e>.<f>…` anywhere in an artifact name.
static UPGRADE_EDGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"_r(\d+)\.(\d+)\.(\d+)_to_r(\d+)\.(\d+)\.(\d+)")
        .expect("upgrade edge regex must compile")
});

/// Parses the upgrade edge out of an artifact file name. Returns `None` for
/// names that don't carry a well-formed `_rA.B.C_to_rD.E.F` marker.
pub fn parse_artifact_name(name: &str) -> Option<(FirmwareVersion, FirmwareVersion)> {
    let caps = UPGRADE_EDGE_RE.captures(name)?;
    let part = |i: usize| caps.get(i).unwrap().as_str().parse::<u32>().ok();
    Some((
        FirmwareVersion::new(part(1)?, part(2)?, part(3)?),
        FirmwareVersion::new(part(4)?, part(5)?, part(6)?),
    ))
}

#[derive(Debug, Default)]
struct VendorGraph {
    edges: Vec<FirmwareUpgrade>,
    /// The set of source versions any edge starts from; membership decides
    /// `support_upgrade`.
    supported_sources: BTreeSet<FirmwareVersion>,
}

/// The loaded artifact store. Immutable after `load`; services construct it
/// once at startup and share it behind an `Arc`.
#[derive(Debug)]
pub struct Repository {
    root: PathBuf,
    vendors: HashMap<PmcVendor, VendorGraph>,
}

impl Repository {
    /// Scans `<root>/<vendor>/` for every supported vendor and builds the
    /// upgrade graph. Ill-formed artifact names are logged and skipped; a
    /// missing vendor directory simply yields no edges for that vendor.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self, FirmwareError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(FirmwareError::BadRoot(root.display().to_string()));
        }

        let mut vendors = HashMap::new();
        for vendor in [PmcVendor::Liteon, PmcVendor::Delta] {
            let vendor_dir = root.join(vendor.to_string());
            let graph = Self::scan_vendor_dir(vendor, &vendor_dir)?;
            vendors.insert(vendor, graph);
        }

        Ok(Repository { root, vendors })
    }

    fn scan_vendor_dir(vendor: PmcVendor, dir: &Path) -> Result<VendorGraph, FirmwareError> {
        let mut graph = VendorGraph::default();
        if !dir.is_dir() {
            return Ok(graph);
        }

        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| FirmwareError::Scan(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                tracing::warn!(vendor = %vendor, path = %entry.path().display(),
                    "skipping artifact with non-UTF8 name");
                continue;
            };
            match parse_artifact_name(name) {
                Some((from, to)) => {
                    graph.supported_sources.insert(from);
                    graph.edges.push(FirmwareUpgrade {
                        from,
                        to,
                        artifact_path: entry.path().to_path_buf(),
                    });
                }
                None => {
                    tracing::warn!(vendor = %vendor, artifact = name,
                        "artifact name does not encode an upgrade edge, skipping");
                }
            }
        }

        // Deterministic ordering so that "first matching edge" selection is
        // stable across loads.
        graph
            .edges
            .sort_by_key(|e| (e.from, e.to, e.artifact_path.clone()));
        Ok(graph)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every upgrade edge shipped for the vendor.
    pub fn upgrades(&self, vendor: PmcVendor) -> &[FirmwareUpgrade] {
        self.vendors
            .get(&vendor)
            .map(|g| g.edges.as_slice())
            .unwrap_or(&[])
    }

    /// Whether any shipped edge starts from `current`.
    pub fn support_upgrade(&self, vendor: PmcVendor, current: FirmwareVersion) -> bool {
        self.vendors
            .get(&vendor)
            .is_some_and(|g| g.supported_sources.contains(&current))
    }

    /// Opens an edge's artifact for streaming to a device.
    pub async fn open(&self, edge: &FirmwareUpgrade) -> Result<tokio::fs::File, FirmwareError> {
        tokio::fs::File::open(&edge.artifact_path)
            .await
            .map_err(|source| FirmwareError::OpenArtifact {
                path: edge.artifact_path.display().to_string(),
                source,
            })
    }

    /// One human-readable line per vendor, for the startup log.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let mut vendors: Vec<_> = self.vendors.iter().collect();
        vendors.sort_by_key(|(v, _)| v.to_string());
        for (vendor, graph) in vendors {
            let _ = writeln!(
                out,
                "{}: {} artifacts, {} upgrade sources",
                vendor,
                graph.edges.len(),
                graph.supported_sources.len()
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(major: u32, minor: u32, patch: u32) -> FirmwareVersion {
        FirmwareVersion::new(major, minor, patch)
    }

    #[test]
    fn test_parse_artifact_name() {
        let (from, to) =
            parse_artifact_name("pmc_fw_r1.0.0_to_r1.1.0.bin").expect("should parse");
        assert_eq!(from, version(1, 0, 0));
        assert_eq!(to, version(1, 1, 0));

        // Suffix and prefix content is free-form
        let (from, to) =
            parse_artifact_name("liteon-2kw_r10.2.33_to_r11.0.1-signed.fwpkg").unwrap();
        assert_eq!(from, version(10, 2, 33));
        assert_eq!(to, version(11, 0, 1));
    }

    #[test]
    fn test_parse_rejects_ill_formed_names() {
        for name in [
            "pmc_fw.bin",
            "pmc_r1.0_to_r1.1.0.bin",
            "pmc_r1.0.0_to_r2.0.bin",
            "r1.0.0_to_r1.1.0.bin", // no separator before the edge
        ] {
            assert!(parse_artifact_name(name).is_none(), "{name:?} should not parse");
        }
    }

    fn artifact_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let liteon = dir.path().join("liteon");
        std::fs::create_dir(&liteon).unwrap();
        std::fs::write(liteon.join("pmc_r1.0.0_to_r1.1.0.bin"), b"fw-a").unwrap();
        std::fs::write(liteon.join("pmc_r1.1.0_to_r2.0.0.bin"), b"fw-b").unwrap();
        std::fs::write(liteon.join("README.txt"), b"not an artifact").unwrap();
        dir
    }

    #[test]
    fn test_load_builds_graph_and_skips_ill_formed() {
        let dir = artifact_tree();
        let repo = Repository::load(dir.path()).unwrap();

        let edges = repo.upgrades(PmcVendor::Liteon);
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].from, version(1, 0, 0));
        assert_eq!(edges[1].to, version(2, 0, 0));

        assert!(repo.support_upgrade(PmcVendor::Liteon, version(1, 0, 0)));
        assert!(repo.support_upgrade(PmcVendor::Liteon, version(1, 1, 0)));
        // Targets are not sources
        assert!(!repo.support_upgrade(PmcVendor::Liteon, version(2, 0, 0)));
        // Missing vendor directory is empty, not an error
        assert!(repo.upgrades(PmcVendor::Delta).is_empty());
    }

    #[test]
    fn test_load_rejects_missing_root() {
        assert!(matches!(
            Repository::load("/definitely/not/a/dir"),
            Err(FirmwareError::BadRoot(_))
        ));
    }

    #[tokio::test]
    async fn test_open_streams_artifact_bytes() {
        use tokio::io::AsyncReadExt;

        let dir = artifact_tree();
        let repo = Repository::load(dir.path()).unwrap();
        let edge = &repo.upgrades(PmcVendor::Liteon)[0];

        let mut file = repo.open(edge).await.unwrap();
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).await.unwrap();
        assert_eq!(contents, b"fw-a");
    }

    #[test]
    fn test_summary_mentions_each_vendor() {
        let dir = artifact_tree();
        let repo = Repository::load(dir.path()).unwrap();
        let summary = repo.summary();
        assert!(summary.contains("liteon: 2 artifacts"));
        assert!(summary.contains("delta: 0 artifacts"));
    }
}
