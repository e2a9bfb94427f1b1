//! Tarball extraction.
//!
//! Upstream tarballs wrap everything in a single `mDNSResponder-<version>/`
//! directory. With `strip_root` that wrapper is removed so the sources land
//! directly in the destination.

use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use tar::{Archive, EntryType};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

fn open(data: &[u8]) -> Archive<Box<dyn Read + '_>> {
    let reader: Box<dyn Read + '_> = if data.starts_with(&GZIP_MAGIC) {
        Box::new(GzDecoder::new(Cursor::new(data)))
    } else {
        Box::new(Cursor::new(data))
    };
    Archive::new(reader)
}

/// Split an entry path into normal components, rejecting anything that could
/// escape the destination.
fn safe_components(path: &Path) -> Result<Vec<String>> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                bail!(
                    "archive entry escapes destination directory: {}",
                    path.display()
                );
            }
        }
    }
    Ok(parts)
}

/// Reject a symlink whose target leaves `dest`.
///
/// `relative` is the link's own path inside `dest`. `..` is only allowed
/// before the first directory name of the target.
fn check_link_target(relative: &Path, target: &Path) -> Result<()> {
    let mut depth = relative.components().count().saturating_sub(1);
    let mut descended = false;
    for component in target.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(_) => descended = true,
            Component::ParentDir if !descended && depth > 0 => depth -= 1,
            _ => bail!(
                "symlink escapes destination directory: {} -> {}",
                relative.display(),
                target.display()
            ),
        }
    }
    Ok(())
}

/// Fail if any existing component of `dest/relative` is a symlink, so no
/// entry is written through a link.
fn check_no_symlink(dest: &Path, relative: &Path) -> Result<()> {
    let mut current = dest.to_path_buf();
    for component in relative.components() {
        current.push(component);
        if let Ok(meta) = std::fs::symlink_metadata(&current) {
            if meta.file_type().is_symlink() {
                bail!(
                    "archive entry {} would be written through symlink {}",
                    relative.display(),
                    current.display()
                );
            }
        }
    }
    Ok(())
}

fn is_metadata(kind: EntryType) -> bool {
    matches!(
        kind,
        EntryType::XGlobalHeader | EntryType::XHeader | EntryType::GNULongName | EntryType::GNULongLink
    )
}

/// Find the single top-level directory every entry lives under.
pub fn common_root(data: &[u8]) -> Result<String> {
    let mut archive = open(data);
    let mut root: Option<String> = None;

    for entry in archive.entries().context("failed to read archive entries")? {
        let entry = entry.context("failed to read archive entry")?;
        let kind = entry.header().entry_type();
        if is_metadata(kind) {
            continue;
        }

        let path = entry.path().context("failed to get entry path")?;
        let parts = safe_components(&path)?;
        let Some(first) = parts.first() else {
            continue;
        };
        if parts.len() == 1 && !kind.is_dir() {
            bail!(
                "cannot strip root: `{}` sits at the top level of the archive",
                first
            );
        }

        match &root {
            None => root = Some(first.clone()),
            Some(existing) if existing == first => {}
            Some(existing) => bail!(
                "cannot strip root: archive has several top-level directories (`{}`, `{}`)",
                existing,
                first
            ),
        }
    }

    root.ok_or_else(|| anyhow::anyhow!("archive is empty"))
}

/// Extract a (optionally gzip-compressed) tarball into `dest`.
///
/// With `strip_root`, the archive must contain exactly one top-level
/// directory, which is removed from every extracted path.
pub fn extract_archive(data: &[u8], dest: &Path, strip_root: bool) -> Result<()> {
    let root = if strip_root {
        Some(common_root(data)?)
    } else {
        None
    };
    let skip = usize::from(root.is_some());

    std::fs::create_dir_all(dest)
        .with_context(|| format!("failed to create destination directory: {}", dest.display()))?;

    let relocate = |path: &Path| -> Result<Option<PathBuf>> {
        let parts = safe_components(path)?;
        if parts.len() <= skip {
            return Ok(None);
        }
        Ok(Some(parts[skip..].iter().collect()))
    };

    let mut archive = open(data);
    for entry in archive.entries().context("failed to read archive entries")? {
        let mut entry = entry.context("failed to read archive entry")?;
        let kind = entry.header().entry_type();
        if is_metadata(kind) {
            continue;
        }

        let entry_path = entry.path().context("failed to get entry path")?.into_owned();
        let Some(relative) = relocate(&entry_path)? else {
            continue;
        };
        check_no_symlink(dest, &relative)?;
        let output_path = dest.join(&relative);

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }

        match kind {
            EntryType::Directory => {
                std::fs::create_dir_all(&output_path).with_context(|| {
                    format!("failed to create directory: {}", output_path.display())
                })?;
            }
            EntryType::Symlink => {
                let target = entry
                    .link_name()
                    .context("failed to read symlink target")?
                    .map(|t| t.into_owned());
                let Some(target) = target else {
                    bail!("symlink without target: {}", entry_path.display());
                };
                check_link_target(&relative, &target)?;
                entry.unpack(&output_path).with_context(|| {
                    format!("failed to extract symlink: {}", output_path.display())
                })?;
            }
            EntryType::Regular | EntryType::Continuous => {
                entry.unpack(&output_path).with_context(|| {
                    format!("failed to extract file: {}", output_path.display())
                })?;
            }
            EntryType::Link => {
                // Hard link targets are archive paths and need the same relocation.
                let target = entry
                    .link_name()
                    .context("failed to read hard link target")?
                    .map(|t| t.into_owned());
                let relocated = target.as_deref().map(|t| relocate(t)).transpose()?;
                let Some(target) = relocated.flatten() else {
                    bail!("hard link without target: {}", entry_path.display());
                };
                std::fs::copy(dest.join(&target), &output_path).with_context(|| {
                    format!("failed to extract hard link: {}", output_path.display())
                })?;
            }
            _ => {
                tracing::debug!(
                    "Skipping unsupported entry type {:?}: {}",
                    kind,
                    entry_path.display()
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{tar_bytes, tar_gz_bytes, TarEntry};
    use tempfile::TempDir;

    fn wrapped() -> Vec<TarEntry> {
        vec![
            TarEntry::dir("mDNSResponder-878.200.35/"),
            TarEntry::file("mDNSResponder-878.200.35/LICENSE", "Apache License"),
            TarEntry::file("mDNSResponder-878.200.35/mDNSPosix/Makefile", "all:\n"),
        ]
    }

    #[test]
    fn test_strip_root_removes_wrapper_directory() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("source_subfolder");

        extract_archive(&tar_gz_bytes(&wrapped()), &dest, true).unwrap();

        assert_eq!(
            std::fs::read_to_string(dest.join("LICENSE")).unwrap(),
            "Apache License"
        );
        assert!(dest.join("mDNSPosix/Makefile").exists());
        assert!(!dest.join("mDNSResponder-878.200.35").exists());
    }

    #[test]
    fn test_plain_tar_without_stripping() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("out");

        extract_archive(&tar_bytes(&wrapped()), &dest, false).unwrap();
        assert!(dest.join("mDNSResponder-878.200.35/LICENSE").exists());
    }

    #[test]
    fn test_common_root_without_directory_entry() {
        let entries = vec![
            TarEntry::file("pkg-1.0/a.c", "a"),
            TarEntry::file("pkg-1.0/sub/b.c", "b"),
        ];
        assert_eq!(common_root(&tar_gz_bytes(&entries)).unwrap(), "pkg-1.0");
    }

    #[test]
    fn test_strip_root_requires_single_top_level_directory() {
        let entries = vec![
            TarEntry::file("one/a.c", "a"),
            TarEntry::file("two/b.c", "b"),
        ];
        let err = common_root(&tar_gz_bytes(&entries)).unwrap_err();
        assert!(err.to_string().contains("several top-level directories"));

        let entries = vec![TarEntry::file("README", "loose")];
        let err = common_root(&tar_gz_bytes(&entries)).unwrap_err();
        assert!(err.to_string().contains("top level"));
    }

    fn with_symlink(link: &str, target: &str, then: &[TarEntry]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(EntryType::Symlink);
        header.set_size(0);
        header.set_mode(0o777);
        header.set_link_name(target).unwrap();
        builder.append_data(&mut header, link, std::io::empty()).unwrap();
        for entry in then {
            let data = entry.contents.clone().unwrap_or_default();
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(EntryType::Regular);
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            builder
                .append_data(&mut header, &entry.path, data.as_slice())
                .unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_to_outside_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let outside = tmp.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        let dest = tmp.path().join("source_subfolder");

        let data = with_symlink(
            "pkg-1.0/evil",
            &outside.display().to_string(),
            &[TarEntry::file("pkg-1.0/evil/pwned.txt", "x")],
        );
        let err = extract_archive(&data, &dest, true).unwrap_err();

        assert!(err.to_string().contains("symlink escapes"));
        assert!(!outside.join("pwned.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_entry_is_never_written_through_symlink() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("source_subfolder");

        // The link itself stays inside; writing through it is still refused.
        let data = with_symlink(
            "pkg-1.0/alias",
            ".",
            &[TarEntry::file("pkg-1.0/alias/a.c", "a")],
        );
        let err = extract_archive(&data, &dest, true).unwrap_err();

        assert!(err.to_string().contains("written through symlink"));
        assert!(!dest.join("a.c").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_symlink_inside_destination_is_kept() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("source_subfolder");

        let data = with_symlink(
            "pkg-1.0/mDNSPosix/LICENSE",
            "../LICENSE",
            &[TarEntry::file("pkg-1.0/LICENSE", "Apache License")],
        );
        extract_archive(&data, &dest, true).unwrap();

        assert_eq!(
            std::fs::read_to_string(dest.join("mDNSPosix/LICENSE")).unwrap(),
            "Apache License"
        );
    }

    #[test]
    fn test_link_target_checks() {
        let link = Path::new("mDNSPosix/LICENSE");
        assert!(check_link_target(link, Path::new("../LICENSE")).is_ok());
        assert!(check_link_target(link, Path::new("Makefile")).is_ok());
        assert!(check_link_target(link, Path::new("../../etc/passwd")).is_err());
        assert!(check_link_target(link, Path::new("sub/../../x")).is_err());
        assert!(check_link_target(link, Path::new("/etc/passwd")).is_err());
    }

    #[test]
    fn test_rejects_escaping_paths() {
        assert!(safe_components(Path::new("pkg/../../etc/passwd")).is_err());
        assert!(safe_components(Path::new("/etc/passwd")).is_err());
        assert_eq!(
            safe_components(Path::new("./pkg/a.c")).unwrap(),
            vec!["pkg".to_string(), "a.c".to_string()]
        );
    }
}
