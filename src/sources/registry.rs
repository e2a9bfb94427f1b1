//! Recipe registry file parsing.
//!
//! The registry is a TOML file (`recipe.toml` by default) mapping each known
//! upstream version to its source archive and its ordered patch list.
//!
//! # Format
//!
//! ```toml
//! [sources."878.200.35"]
//! url = "https://opensource.apple.com/tarballs/mDNSResponder/mDNSResponder-878.200.35.tar.gz"
//! sha256 = "e777b4d7dbf5eb1552cb80090ad1ede319067ab6e45e3990d68aabf6e8b3f5a0"
//!
//! [sources."1310.80.1"]
//! url = ["https://mirror-a/mDNSResponder-1310.80.1.tar.gz", "vendor/mDNSResponder-1310.80.1.tar.gz"]
//!
//! [sources."1310.80.1".support]
//! os = ["Linux"]
//! gcc = "5"
//!
//! [[patches."1310.80.1"]]
//! patch_file = "patches/0001-posix-makefile.patch"
//! base_path = "mDNSPosix"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::{Os, Version};
use crate::util::hash::validate_sha256;

/// A parsed registry file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeRegistry {
    /// Source archive per version
    #[serde(default)]
    pub sources: BTreeMap<String, SourceEntry>,

    /// Ordered patches per version
    #[serde(default)]
    pub patches: BTreeMap<String, Vec<PatchEntry>>,

    /// Directory relative locations resolve against
    #[serde(skip)]
    root: PathBuf,
}

/// Where to get the sources of one version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Archive location, or several mirrors tried in order
    pub url: Locations,

    /// SHA256 of the archive bytes
    #[serde(default)]
    pub sha256: Option<String>,

    /// Per-version override of the support matrix
    #[serde(default)]
    pub support: Option<SupportOverride>,
}

/// One location or an ordered list of mirrors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Locations {
    One(String),
    Many(Vec<String>),
}

impl Locations {
    pub fn as_slice(&self) -> &[String] {
        match self {
            Locations::One(url) => std::slice::from_ref(url),
            Locations::Many(urls) => urls,
        }
    }
}

/// Replaces parts of the default support matrix for a single version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupportOverride {
    /// Supported operating systems
    #[serde(default)]
    pub os: Option<Vec<String>>,

    /// Minimum gcc version
    #[serde(default)]
    pub gcc: Option<Version>,

    /// Minimum clang version
    #[serde(default)]
    pub clang: Option<Version>,
}

impl SupportOverride {
    /// The overridden OS list, parsed.
    pub fn os_list(&self) -> Option<Vec<Os>> {
        self.os
            .as_ref()
            .map(|names| names.iter().filter_map(|n| n.parse().ok()).collect())
    }
}

/// A patch to apply to the extracted sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchEntry {
    /// Patch file, relative to the registry directory
    pub patch_file: String,

    /// Directory the patch applies in, relative to the source root
    #[serde(default)]
    pub base_path: Option<String>,

    /// SHA256 of the patch file bytes
    #[serde(default)]
    pub sha256: Option<String>,

    /// Human-readable summary
    #[serde(default)]
    pub description: Option<String>,
}

/// A resolved archive location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Remote(Url),
    Local(PathBuf),
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceLocation::Remote(url) => write!(f, "{}", url),
            SourceLocation::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

impl RecipeRegistry {
    /// Load and parse a registry file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read registry file: {}", path.display()))?;

        Self::parse(&content, path)
    }

    /// Parse a registry from TOML content; `path` anchors relative locations.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let mut registry: RecipeRegistry = toml::from_str(content)
            .with_context(|| format!("failed to parse registry file: {}", path.display()))?;

        registry.root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        registry.validate()?;
        Ok(registry)
    }

    /// Validate registry contents.
    pub fn validate(&self) -> Result<()> {
        for (version, entry) in &self.sources {
            Version::parse(version)
                .with_context(|| format!("invalid version key `{}` in [sources]", version))?;

            if entry.url.as_slice().is_empty() {
                bail!("source for {} has no url", version);
            }
            if let Some(sha) = &entry.sha256 {
                validate_sha256(sha).with_context(|| format!("invalid sha256 for {}", version))?;
            }
        }

        for (version, patches) in &self.patches {
            let parsed = Version::parse(version)
                .with_context(|| format!("invalid version key `{}` in [patches]", version))?;
            if self.source(&parsed).is_none() {
                bail!("patches listed for {} which has no source entry", version);
            }
            for patch in patches {
                if let Some(sha) = &patch.sha256 {
                    validate_sha256(sha)
                        .with_context(|| format!("invalid sha256 for patch {}", patch.patch_file))?;
                }
            }
        }

        Ok(())
    }

    /// Directory relative paths resolve against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All known versions, newest first.
    pub fn versions(&self) -> Vec<Version> {
        let mut versions: Vec<Version> = self
            .sources
            .keys()
            .filter_map(|v| Version::parse(v).ok())
            .collect();
        versions.sort_by(|a, b| b.cmp(a));
        versions
    }

    /// Look up the source entry for a version.
    pub fn source(&self, version: &Version) -> Option<&SourceEntry> {
        self.sources
            .iter()
            .find(|(key, _)| Version::parse(key).is_ok_and(|k| &k == version))
            .map(|(_, entry)| entry)
    }

    /// Support override registered for a version, if any.
    pub fn support_for(&self, version: &Version) -> Option<&SupportOverride> {
        self.source(version).and_then(|e| e.support.as_ref())
    }

    /// Ordered patches for a version; empty when none are registered.
    pub fn patches_for(&self, version: &Version) -> &[PatchEntry] {
        self.patches
            .iter()
            .find(|(key, _)| Version::parse(key).is_ok_and(|k| &k == version))
            .map(|(_, patches)| patches.as_slice())
            .unwrap_or(&[])
    }

    /// Absolute path of a patch file.
    pub fn patch_path(&self, patch: &PatchEntry) -> PathBuf {
        self.root.join(&patch.patch_file)
    }

    /// Resolve every location of an entry, in mirror order.
    pub fn locations(&self, entry: &SourceEntry) -> Result<Vec<SourceLocation>> {
        entry
            .url
            .as_slice()
            .iter()
            .map(|raw| self.resolve_location(raw))
            .collect()
    }

    fn resolve_location(&self, raw: &str) -> Result<SourceLocation> {
        match Url::parse(raw) {
            Ok(url) if url.scheme() == "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| anyhow::anyhow!("invalid file URL: {}", raw))?;
                Ok(SourceLocation::Local(path))
            }
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(SourceLocation::Remote(url)),
            // Single-letter schemes are Windows drive letters (C:\...).
            Ok(url) if url.scheme().len() > 1 => {
                bail!("unsupported URL scheme `{}` in {}", url.scheme(), raw)
            }
            _ => {
                let path = Path::new(raw);
                if path.is_absolute() {
                    Ok(SourceLocation::Local(path.to_path_buf()))
                } else {
                    Ok(SourceLocation::Local(self.root.join(path)))
                }
            }
        }
    }
}
