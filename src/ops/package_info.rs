//! Consumer-facing package metadata.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::{Os, RecipeError, RecipeResult, Version, PACKAGE_NAME};
use crate::ops::package::{PackageLayout, PackagedFile};
use crate::util::fs::write_string;

/// What downstream builds need to consume the package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,

    /// Link libraries; always exactly one
    pub libs: Vec<String>,

    pub include_dirs: Vec<PathBuf>,
    pub lib_dirs: Vec<PathBuf>,
    pub bin_dirs: Vec<PathBuf>,

    /// Paths appended to each environment variable
    pub env: BTreeMap<String, Vec<PathBuf>>,

    /// Packaged files, empty when describing an existing package
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<PackagedFile>,
}

/// The library consumers link against on `os`.
pub fn link_library(os: &Os) -> Option<&'static str> {
    match os {
        Os::Linux => Some("dns_sd"),
        Os::Windows => Some("dnssd"),
        _ => None,
    }
}

impl PackageInfo {
    /// Describe the package at `package_dir`.
    ///
    /// Only the bin directory's existence is checked.
    pub fn emit(
        os: &Os,
        version: &Version,
        package_dir: &Path,
        files: Vec<PackagedFile>,
    ) -> RecipeResult<Self> {
        let lib = link_library(os)
            .ok_or_else(|| RecipeError::configuration(format!("no link library for {}", os)))?;

        let layout = PackageLayout::new(package_dir);
        let bin = layout.bin();
        if !bin.is_dir() {
            return Err(RecipeError::missing("bin directory", bin));
        }

        tracing::info!("Appending PATH environment variable: {}", bin.display());

        let mut env = BTreeMap::new();
        env.insert("PATH".to_string(), vec![bin.clone()]);

        Ok(PackageInfo {
            name: PACKAGE_NAME.to_string(),
            version: version.to_string(),
            libs: vec![lib.to_string()],
            include_dirs: vec![layout.include()],
            lib_dirs: vec![layout.lib()],
            bin_dirs: vec![bin],
            env,
            files,
        })
    }

    /// Paths this package appends to PATH.
    pub fn path_entries(&self) -> &[PathBuf] {
        self.env.get("PATH").map(Vec::as_slice).unwrap_or(&[])
    }

    /// Append the PATH contribution to an existing value.
    pub fn apply_to(&self, current: Option<&OsStr>) -> Result<OsString> {
        let mut paths: Vec<PathBuf> = current
            .map(|c| std::env::split_paths(c).collect())
            .unwrap_or_default();
        paths.extend(self.path_entries().iter().cloned());

        std::env::join_paths(paths).context("package bin path cannot be added to PATH")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize package info")
    }

    /// Write pretty JSON to `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut json = self.to_json()?;
        json.push('\n');
        write_string(path, &json)
    }
}
