//! Build context - sources, target settings and tool overrides.

use std::path::{Path, PathBuf};

use crate::core::PlatformTarget;
use crate::sources::SourceLayout;
use crate::util::config::ToolsConfig;

/// Everything a backend needs for one build.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Extracted and patched sources
    pub source: SourceLayout,

    /// Package root; must be absolute, the tools run from inside the source tree
    pub package_dir: PathBuf,

    /// Settings for this invocation
    pub target: PlatformTarget,

    /// External tool overrides
    pub tools: ToolsConfig,
}

impl BuildContext {
    pub fn new(
        source: SourceLayout,
        package_dir: impl Into<PathBuf>,
        target: PlatformTarget,
        tools: ToolsConfig,
    ) -> Self {
        BuildContext {
            source,
            package_dir: package_dir.into(),
            target,
            tools,
        }
    }

    pub fn package_dir(&self) -> &Path {
        &self.package_dir
    }

    /// A subdirectory of the package root.
    pub fn package_subdir(&self, name: &str) -> PathBuf {
        self.package_dir.join(name)
    }

    pub fn build_type(&self) -> &'static str {
        self.target.build_type.as_str()
    }
}
