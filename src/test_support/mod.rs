//! Test utilities for unit tests.
//!
//! Builds source tarballs in memory, writes registries, and provides stub
//! shell scripts standing in for the external build tools.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Builder, EntryType, Header};

use crate::sources::RecipeRegistry;
use crate::util::{Config, GlobalContext};

/// One entry of an in-memory tarball.
#[derive(Debug, Clone)]
pub struct TarEntry {
    pub path: String,
    pub contents: Option<Vec<u8>>,
}

impl TarEntry {
    pub fn dir(path: impl Into<String>) -> Self {
        TarEntry {
            path: path.into(),
            contents: None,
        }
    }

    pub fn file(path: impl Into<String>, contents: impl AsRef<[u8]>) -> Self {
        TarEntry {
            path: path.into(),
            contents: Some(contents.as_ref().to_vec()),
        }
    }
}

/// An uncompressed tarball.
pub fn tar_bytes(entries: &[TarEntry]) -> Vec<u8> {
    let mut builder = Builder::new(Vec::new());

    for entry in entries {
        let mut header = Header::new_gnu();
        match &entry.contents {
            Some(data) => {
                header.set_entry_type(EntryType::Regular);
                header.set_mode(0o644);
                header.set_size(data.len() as u64);
                builder
                    .append_data(&mut header, &entry.path, data.as_slice())
                    .unwrap();
            }
            None => {
                header.set_entry_type(EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                builder
                    .append_data(&mut header, &entry.path, std::io::empty())
                    .unwrap();
            }
        }
    }

    builder.into_inner().unwrap()
}

/// A gzip-compressed tarball.
pub fn tar_gz_bytes(entries: &[TarEntry]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_bytes(entries)).unwrap();
    encoder.finish().unwrap()
}

/// An upstream-shaped tarball: everything under `mDNSResponder-<version>/`,
/// with a LICENSE and the POSIX makefile, plus `extra` inside the wrapper.
pub fn source_tarball(version: &str, extra: &[TarEntry]) -> Vec<u8> {
    let root = format!("mDNSResponder-{}", version);
    let mut entries = vec![
        TarEntry::dir(format!("{}/", root)),
        TarEntry::file(format!("{}/LICENSE", root), "Apache License 2.0\n"),
        TarEntry::file(format!("{}/mDNSPosix/Makefile", root), "all:\n"),
    ];
    entries.extend(extra.iter().map(|e| TarEntry {
        path: format!("{}/{}", root, e.path),
        contents: e.contents.clone(),
    }));
    tar_gz_bytes(&entries)
}

/// Write `recipe.toml` into `dir` and load it.
pub fn write_registry(dir: &Path, content: &str) -> RecipeRegistry {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join("recipe.toml");
    std::fs::write(&path, content).unwrap();
    RecipeRegistry::load(&path).unwrap()
}

/// A context rooted at `dir` with default config and a private cache.
pub fn test_context(dir: &Path) -> GlobalContext {
    GlobalContext::with_cwd(dir.to_path_buf())
        .with_config(Config::default())
        .with_cache_dir(dir.join("cache"))
}

/// Lay out a Windows source tree with prebuilt outputs for one configuration.
pub fn populate_windows_tree(root: &Path, platform: &str, build_type: &str) {
    let write = |relative: &str, contents: &str| {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    };

    write("LICENSE", "Apache License 2.0\n");
    write("mDNSResponder.sln", "Microsoft Visual Studio Solution File\n");
    write("mDNSWindows/DLL/dll.rc", "#include \"afxres.h\"\n");
    write("Clients/DNS-SD.VisualStudio/dns-sd.rc", "#include \"afxres.h\"\n");
    write("mDNSShared/dns_sd.h", "/* dns_sd.h */\n");

    for (dir, file) in [
        ("mDNSWindows/SystemService", "mDNSResponder.exe"),
        ("mDNSWindows/DLL", "dnssd.dll"),
        ("mDNSWindows/DLLStub", "dnssdStatic.lib"),
        ("Clients/DNS-SD.VisualStudio", "dns-sd.exe"),
    ] {
        write(&format!("{}/{}/{}/{}", dir, platform, build_type, file), file);
    }
}

/// Write an executable `/bin/sh` script.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A make stand-in that records each call as `<cwd>|<CFLAGS>|<args>` and,
/// when given `INSTBASE=`, installs a plausible Linux tree there.
///
/// Returns the script and its log file.
#[cfg(unix)]
pub fn stub_make(dir: &Path) -> (PathBuf, PathBuf) {
    let log = dir.join("make.log");
    let body = format!(
        r#"echo "$(pwd)|$CFLAGS|$*" >> '{log}'
base=""
for arg in "$@"; do
  case "$arg" in
    INSTBASE=*) base="${{arg#INSTBASE=}}" ;;
  esac
done
if [ -n "$base" ]; then
  mkdir -p "$base/sbin" "$base/bin" "$base/include" "$base/lib"
  echo daemon > "$base/sbin/mdnsd"
  echo client > "$base/bin/dns-sd"
  echo header > "$base/include/dns_sd.h"
  echo library > "$base/lib/libdns_sd.so"
fi
"#,
        log = log.display()
    );
    (write_script(dir, "make", &body), log)
}
