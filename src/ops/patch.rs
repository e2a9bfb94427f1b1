//! Applying registry patches to the extracted sources.

use std::path::Path;

use crate::core::{RecipeError, RecipeResult};
use crate::sources::{PatchEntry, RecipeRegistry, SourceLayout};
use crate::util::hash::{digest_matches, sha256_file};
use crate::util::process::{resolve_tool, ProcessBuilder};

/// Applies an ordered patch list with `git apply`.
pub struct PatchApplier<'a> {
    registry: &'a RecipeRegistry,
    git: Option<&'a Path>,
}

impl<'a> PatchApplier<'a> {
    /// `git` overrides the git executable (`tools.git`).
    pub fn new(registry: &'a RecipeRegistry, git: Option<&'a Path>) -> Self {
        PatchApplier { registry, git }
    }

    /// Apply every patch in order, stopping at the first failure.
    ///
    /// Returns the number of patches applied.
    pub fn apply_all(&self, patches: &[PatchEntry], layout: &SourceLayout) -> RecipeResult<usize> {
        if patches.is_empty() {
            tracing::debug!("No patches registered for this version");
            return Ok(0);
        }

        let git = resolve_tool(self.git, "git")
            .map_err(|e| RecipeError::patch(&patches[0].patch_file, e.to_string()))?;

        for patch in patches {
            self.apply_one(&git, patch, layout)?;
        }

        Ok(patches.len())
    }

    fn apply_one(&self, git: &Path, patch: &PatchEntry, layout: &SourceLayout) -> RecipeResult<()> {
        let name = patch.patch_file.as_str();
        let patch_path = self.registry.patch_path(patch);

        if !patch_path.is_file() {
            return Err(RecipeError::patch(
                name,
                format!("patch file not found at {}", patch_path.display()),
            ));
        }

        if let Some(expected) = &patch.sha256 {
            let actual = sha256_file(&patch_path)
                .map_err(|e| RecipeError::patch(name, format!("{:#}", e)))?;
            if !digest_matches(&actual, expected) {
                return Err(RecipeError::patch(
                    name,
                    format!("hash mismatch: expected {}, got {}", expected, actual),
                ));
            }
        }

        let workdir = match &patch.base_path {
            Some(base) => layout.join(base),
            None => layout.root().to_path_buf(),
        };
        if !workdir.is_dir() {
            return Err(RecipeError::patch(
                name,
                format!("base path {} does not exist", workdir.display()),
            ));
        }

        match &patch.description {
            Some(description) => tracing::info!("Applying patch {}: {}", name, description),
            None => tracing::info!("Applying patch {}", name),
        }

        // First, verify the patch will apply cleanly
        run(git_apply(git, &workdir, &patch_path, true), name, "will not apply cleanly")?;
        run(git_apply(git, &workdir, &patch_path, false), name, "failed to apply")
    }
}

/// `git apply` treats the directory like a plain tree when no repository is
/// found, so discovery is capped at the working directory's parent.
fn git_apply(git: &Path, workdir: &Path, patch_path: &Path, check: bool) -> ProcessBuilder {
    let ceiling = workdir.parent().unwrap_or(workdir);

    let mut cmd = ProcessBuilder::new(git)
        .arg("apply")
        .cwd(workdir)
        .env("GIT_CEILING_DIRECTORIES", ceiling.to_string_lossy());
    if check {
        cmd = cmd.arg("--check");
    }
    cmd.arg(patch_path)
}

fn run(cmd: ProcessBuilder, name: &str, what: &str) -> RecipeResult<()> {
    let output = cmd
        .exec()
        .map_err(|e| RecipeError::patch(name, format!("{:#}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RecipeError::patch(
            name,
            format!("{}:\n{}", what, stderr.trim_end()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_registry;
    use tempfile::TempDir;

    const ADD_DEFINE: &str = "\
--- a/mDNSPosix/Makefile
+++ b/mDNSPosix/Makefile
@@ -1 +1,2 @@
 all:
+CFLAGS_OS += -DPATCHED
";

    const SECOND: &str = "\
--- a/mDNSPosix/Makefile
+++ b/mDNSPosix/Makefile
@@ -1,2 +1,3 @@
 all:
 CFLAGS_OS += -DPATCHED
+CFLAGS_OS += -DSECOND
";

    fn setup(patches: &[(&str, &str)], registry_toml: &str) -> (TempDir, RecipeRegistry, SourceLayout) {
        let tmp = TempDir::new().unwrap();
        let recipe_dir = tmp.path().join("recipe");
        std::fs::create_dir_all(recipe_dir.join("patches")).unwrap();
        for (name, body) in patches {
            std::fs::write(recipe_dir.join("patches").join(name), body).unwrap();
        }
        let registry = write_registry(&recipe_dir, registry_toml);

        let src = tmp.path().join("build/source_subfolder");
        std::fs::create_dir_all(src.join("mDNSPosix")).unwrap();
        std::fs::write(src.join("mDNSPosix/Makefile"), "all:\n").unwrap();

        (tmp, registry, SourceLayout::new(src))
    }

    fn have_git() -> bool {
        which::which("git").is_ok()
    }

    #[test]
    fn test_empty_patch_list_is_a_no_op() {
        let (_tmp, registry, layout) = setup(&[], "[sources.\"1.0\"]\nurl = \"a.tar.gz\"\n");
        let applied = PatchApplier::new(&registry, Some(Path::new("/no/such/git")))
            .apply_all(&[], &layout)
            .unwrap();
        assert_eq!(applied, 0);
    }

    #[test]
    fn test_applies_patches_in_order() {
        if !have_git() {
            return;
        }
        let (_tmp, registry, layout) = setup(
            &[("0001.patch", ADD_DEFINE), ("0002.patch", SECOND)],
            r#"
[sources."1.0"]
url = "a.tar.gz"

[[patches."1.0"]]
patch_file = "patches/0001.patch"

[[patches."1.0"]]
patch_file = "patches/0002.patch"
"#,
        );
        let version = crate::core::Version::parse("1.0").unwrap();

        let applied = PatchApplier::new(&registry, None)
            .apply_all(registry.patches_for(&version), &layout)
            .unwrap();

        assert_eq!(applied, 2);
        assert_eq!(
            std::fs::read_to_string(layout.posix_dir().join("Makefile")).unwrap(),
            "all:\nCFLAGS_OS += -DPATCHED\nCFLAGS_OS += -DSECOND\n"
        );
    }

    #[test]
    fn test_failing_patch_is_named_and_later_ones_skipped() {
        if !have_git() {
            return;
        }
        // Listed in the wrong order: the second hunk cannot apply first.
        let (_tmp, registry, layout) = setup(
            &[("0001.patch", ADD_DEFINE), ("0002.patch", SECOND)],
            r#"
[sources."1.0"]
url = "a.tar.gz"

[[patches."1.0"]]
patch_file = "patches/0002.patch"

[[patches."1.0"]]
patch_file = "patches/0001.patch"
"#,
        );
        let version = crate::core::Version::parse("1.0").unwrap();

        let err = PatchApplier::new(&registry, None)
            .apply_all(registry.patches_for(&version), &layout)
            .unwrap_err();

        assert_eq!(err.kind(), "patch");
        assert!(err.to_string().contains("patches/0002.patch"));
        assert_eq!(
            std::fs::read_to_string(layout.posix_dir().join("Makefile")).unwrap(),
            "all:\n"
        );
    }

    #[test]
    fn test_base_path_and_hash_check() {
        if !have_git() {
            return;
        }
        let body = "\
--- a/Makefile
+++ b/Makefile
@@ -1 +1,2 @@
 all:
+# posix
";
        let (_tmp, registry, layout) = setup(
            &[("base.patch", body)],
            &format!(
                r#"
[sources."1.0"]
url = "a.tar.gz"

[[patches."1.0"]]
patch_file = "patches/base.patch"
base_path = "mDNSPosix"
sha256 = "{}"
"#,
                "0".repeat(64)
            ),
        );
        let version = crate::core::Version::parse("1.0").unwrap();

        let err = PatchApplier::new(&registry, None)
            .apply_all(registry.patches_for(&version), &layout)
            .unwrap_err();
        assert!(err.to_string().contains("hash mismatch"));

        let mut patches = registry.patches_for(&version).to_vec();
        patches[0].sha256 = None;
        PatchApplier::new(&registry, None)
            .apply_all(&patches, &layout)
            .unwrap();
        assert!(std::fs::read_to_string(layout.posix_dir().join("Makefile"))
            .unwrap()
            .contains("# posix"));
    }

    #[test]
    fn test_missing_patch_file() {
        if !have_git() {
            return;
        }
        let (_tmp, registry, layout) = setup(
            &[],
            "[sources.\"1.0\"]\nurl = \"a.tar.gz\"\n[[patches.\"1.0\"]]\npatch_file = \"patches/gone.patch\"\n",
        );
        let version = crate::core::Version::parse("1.0").unwrap();

        let err = PatchApplier::new(&registry, None)
            .apply_all(registry.patches_for(&version), &layout)
            .unwrap_err();
        assert!(err.to_string().contains("patch file not found"));
    }
}
