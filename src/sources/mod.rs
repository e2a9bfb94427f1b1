//! Source archives: the registry, fetching and extraction.

pub mod archive;
pub mod fetch;
pub mod registry;

use std::path::{Path, PathBuf};

pub use fetch::SourceFetcher;
pub use registry::{PatchEntry, RecipeRegistry, SourceEntry, SourceLocation, SupportOverride};

/// The extracted source tree.
///
/// Always rooted at `<build root>/source_subfolder`, whatever the archive's
/// own top-level directory was called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLayout {
    root: PathBuf,
}

impl SourceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        SourceLayout { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A path inside the source tree.
    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// The POSIX build directory (`mDNSPosix`).
    pub fn posix_dir(&self) -> PathBuf {
        self.root.join("mDNSPosix")
    }
}
