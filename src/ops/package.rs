//! Assembling the package tree.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::builder::{BuildContext, RecipeBackend};
use crate::core::{RecipeError, RecipeResult};
use crate::util::fs::{copy_matching, has_no_files, list_files, normalize_path, recreate_dir};
use crate::util::hash::sha256_file;

/// The only subdirectories allowed in a finished package.
pub const CANONICAL_DIRS: &[&str] = &["bin", "include", "lib", "licenses"];

/// The canonical package tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageLayout {
    root: PathBuf,
}

impl PackageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        PackageLayout { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bin(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn include(&self) -> PathBuf {
        self.root.join("include")
    }

    pub fn lib(&self) -> PathBuf {
        self.root.join("lib")
    }

    pub fn licenses(&self) -> PathBuf {
        self.root.join("licenses")
    }

    /// Remove transient directories left by an install step.
    ///
    /// Empty non-canonical directories are dropped; anything else outside
    /// the canonical set is an error.
    pub fn finalize(&self) -> RecipeResult<()> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| {
            RecipeError::packaging(format!("failed to read {}: {}", self.root.display(), e))
        })?;

        let mut names: Vec<_> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        names.sort();

        for path in names {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if path.is_dir() && CANONICAL_DIRS.contains(&name.as_str()) {
                continue;
            }

            if path.is_dir() && has_no_files(&path) {
                tracing::debug!("Removing empty directory {}", path.display());
                std::fs::remove_dir_all(&path).map_err(|e| {
                    RecipeError::packaging(format!("failed to remove {}: {}", path.display(), e))
                })?;
                continue;
            }

            return Err(RecipeError::Packaging {
                message: format!(
                    "unexpected `{}` in package root; only {} are allowed",
                    name,
                    CANONICAL_DIRS.join(", ")
                ),
                path: Some(path),
            });
        }

        Ok(())
    }

    /// Every packaged file with its digest, sorted by path.
    pub fn manifest(&self) -> RecipeResult<Vec<PackagedFile>> {
        let files = list_files(&self.root).map_err(RecipeError::packaging_from)?;

        files
            .into_iter()
            .map(|relative| {
                let sha256 =
                    sha256_file(&self.root.join(&relative)).map_err(RecipeError::packaging_from)?;
                Ok(PackagedFile {
                    path: portable_path(&relative),
                    sha256,
                })
            })
            .collect()
    }
}

/// One file in the package, relative to the package root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagedFile {
    /// `/`-separated path
    pub path: String,
    pub sha256: String,
}

fn portable_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Build the package: license, backend install, cleanup, manifest.
pub fn package(backend: &dyn RecipeBackend, ctx: &BuildContext) -> RecipeResult<Vec<PackagedFile>> {
    let layout = PackageLayout::new(ctx.package_dir());
    tracing::info!("Packaging into {}", layout.root().display());

    let root = normalize_path(layout.root());
    let source = normalize_path(ctx.source.root());
    if source.starts_with(&root) || root.starts_with(&source) {
        return Err(RecipeError::configuration(format!(
            "package directory {} overlaps the source tree {}",
            root.display(),
            source.display()
        )));
    }

    recreate_dir(layout.root()).map_err(RecipeError::packaging_from)?;

    let copied = copy_matching("LICENSE", ctx.source.root(), &layout.licenses())
        .map_err(RecipeError::packaging_from)?;
    if copied.is_empty() {
        return Err(RecipeError::missing("LICENSE", ctx.source.join("LICENSE")));
    }

    backend.install(ctx)?;
    layout.finalize()?;

    let files = layout.manifest()?;
    tracing::debug!("Packaged {} files", files.len());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Arch, BuildType, Compiler, Os, PlatformTarget};
    use crate::sources::SourceLayout;
    use crate::util::config::ToolsConfig;
    use tempfile::TempDir;

    /// Writes a fixed set of files, standing in for a real install step.
    struct FakeInstall {
        files: &'static [&'static str],
    }

    impl RecipeBackend for FakeInstall {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn build(&self, _ctx: &BuildContext) -> RecipeResult<()> {
            Ok(())
        }

        fn install(&self, ctx: &BuildContext) -> RecipeResult<()> {
            for file in self.files {
                let path = ctx.package_dir().join(file);
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(path, file).unwrap();
            }
            std::fs::create_dir_all(ctx.package_dir().join("share/man")).unwrap();
            Ok(())
        }
    }

    fn context(tmp: &Path) -> BuildContext {
        let source = tmp.join("source_subfolder");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("LICENSE"), "Apache License 2.0").unwrap();
        let target = PlatformTarget::new(Os::Linux, Arch::X86_64, Compiler::Gcc, "9", BuildType::Release);
        BuildContext::new(SourceLayout::new(source), tmp.join("package"), target, ToolsConfig::default())
    }

    #[test]
    fn test_package_refuses_to_wipe_sources() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path());
        let backend = FakeInstall { files: &[] };

        for dir in [tmp.path().to_path_buf(), ctx.source.join("out")] {
            let overlapping = BuildContext::new(
                ctx.source.clone(),
                dir,
                ctx.target.clone(),
                ToolsConfig::default(),
            );
            let err = package(&backend, &overlapping).unwrap_err();
            assert_eq!(err.kind(), "configuration");
        }
        assert!(ctx.source.join("LICENSE").is_file());
    }

    #[test]
    fn test_package_copies_license_and_cleans_up() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path());
        // Stale output from an earlier run is discarded.
        std::fs::create_dir_all(ctx.package_dir().join("old")).unwrap();
        std::fs::write(ctx.package_dir().join("old/file"), "x").unwrap();

        let backend = FakeInstall {
            files: &["bin/mdnsd", "include/dns_sd.h", "lib/libdns_sd.so"],
        };
        let files = package(&backend, &ctx).unwrap();

        assert_eq!(
            std::fs::read_to_string(ctx.package_dir().join("licenses/LICENSE")).unwrap(),
            "Apache License 2.0"
        );
        assert!(!ctx.package_dir().join("share").exists());
        assert!(!ctx.package_dir().join("old").exists());

        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            ["bin/mdnsd", "include/dns_sd.h", "lib/libdns_sd.so", "licenses/LICENSE"]
        );
        assert_eq!(files[0].sha256, crate::util::hash::sha256_bytes(b"bin/mdnsd"));
    }

    #[test]
    fn test_non_canonical_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path());
        let backend = FakeInstall {
            files: &["bin/mdnsd", "etc/init.d/mdns"],
        };

        let err = package(&backend, &ctx).unwrap_err();
        assert_eq!(err.kind(), "packaging");
        assert!(err.to_string().contains("`etc`"));
    }

    #[test]
    fn test_missing_license() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(tmp.path());
        std::fs::remove_file(ctx.source.join("LICENSE")).unwrap();

        let err = package(&FakeInstall { files: &[] }, &ctx).unwrap_err();
        assert!(err.to_string().contains("LICENSE not found"));
    }

    #[test]
    fn test_layout_paths() {
        let layout = PackageLayout::new("/pkg");
        assert_eq!(layout.bin(), PathBuf::from("/pkg/bin"));
        assert_eq!(layout.include(), PathBuf::from("/pkg/include"));
        assert_eq!(layout.lib(), PathBuf::from("/pkg/lib"));
        assert_eq!(layout.licenses(), PathBuf::from("/pkg/licenses"));
    }
}
