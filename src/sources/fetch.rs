//! Source fetching: resolve, download, verify, extract.

use std::io::{IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use url::Url;

use crate::core::{RecipeError, RecipeResult, Version, SOURCE_SUBFOLDER};
use crate::sources::archive::extract_archive;
use crate::sources::registry::{RecipeRegistry, SourceEntry, SourceLocation};
use crate::sources::SourceLayout;
use crate::util::fs::{ensure_dir, remove_dir_all_if_exists};
use crate::util::hash::{digest_matches, sha256_bytes, sha256_file};
use crate::util::GlobalContext;

/// Fetches the source archive for a version into the build root.
pub struct SourceFetcher<'a> {
    ctx: &'a GlobalContext,
    registry: &'a RecipeRegistry,
}

impl<'a> SourceFetcher<'a> {
    pub fn new(ctx: &'a GlobalContext, registry: &'a RecipeRegistry) -> Self {
        SourceFetcher { ctx, registry }
    }

    /// Fetch and extract the sources of `version` into
    /// `<build_root>/source_subfolder`, replacing anything already there.
    pub fn fetch(&self, version: &Version, build_root: &Path) -> RecipeResult<SourceLayout> {
        let entry = self.registry.source(version).ok_or_else(|| {
            let known = self
                .registry
                .versions()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>();
            let help = if known.is_empty() {
                "the registry lists no versions".to_string()
            } else {
                format!("known versions: {}", known.join(", "))
            };
            RecipeError::fetch(version, "version not found in registry").with_help(help)
        })?;

        match &entry.sha256 {
            Some(_) => {}
            None if self.ctx.config().fetch.require_checksum => {
                return Err(RecipeError::fetch(
                    version,
                    "registry entry has no sha256 and fetch.require_checksum is set",
                ));
            }
            None => tracing::warn!(
                "No sha256 registered for {}; the archive will not be verified",
                version
            ),
        }

        let data = self.load_archive(version, entry)?;

        let dest = build_root.join(SOURCE_SUBFOLDER);
        remove_dir_all_if_exists(&dest).map_err(|e| RecipeError::fetch_from(version, e))?;

        if let Err(e) = extract_archive(&data, &dest, true) {
            // Never leave a half-extracted tree behind.
            let _ = remove_dir_all_if_exists(&dest);
            return Err(RecipeError::fetch_from(
                version,
                e.context("failed to extract archive"),
            ));
        }

        tracing::info!("Extracted sources to {}", dest.display());
        Ok(SourceLayout::new(dest))
    }

    /// Try each mirror in order until one yields bytes with the right digest.
    fn load_archive(&self, version: &Version, entry: &SourceEntry) -> RecipeResult<Vec<u8>> {
        let locations = self
            .registry
            .locations(entry)
            .map_err(|e| RecipeError::fetch_from(version, e))?;
        let expected = entry.sha256.as_deref();

        let mut failures = Vec::new();
        for location in &locations {
            match self.read_location(location, expected) {
                Ok(data) => return Ok(data),
                Err(e) => {
                    tracing::warn!("Could not use {}: {:#}", location, e);
                    failures.push(format!("{}: {:#}", location, e));
                }
            }
        }

        Err(RecipeError::fetch(version, failures.join("\n")))
    }

    fn read_location(&self, location: &SourceLocation, expected: Option<&str>) -> Result<Vec<u8>> {
        let data = match location {
            SourceLocation::Local(path) => {
                tracing::info!("Reading source archive {}", path.display());
                std::fs::read(path)
                    .with_context(|| format!("failed to read archive {}", path.display()))?
            }
            SourceLocation::Remote(url) => return self.download_cached(url, expected),
        };

        verify(&data, expected)?;
        Ok(data)
    }

    fn download_cached(&self, url: &Url, expected: Option<&str>) -> Result<Vec<u8>> {
        let fetch_config = &self.ctx.config().fetch;
        let cache_path = expected
            .filter(|_| fetch_config.cache)
            .map(|sha| self.cache_path(url, sha));

        if let (Some(path), Some(sha)) = (&cache_path, expected) {
            if path.exists() {
                match sha256_file(path) {
                    Ok(actual) if digest_matches(&actual, sha) => {
                        tracing::info!("Using cached archive {}", path.display());
                        return std::fs::read(path)
                            .with_context(|| format!("failed to read {}", path.display()));
                    }
                    _ => {
                        tracing::debug!("Cached archive {} is stale, re-downloading", path.display());
                    }
                }
            }
        }

        if fetch_config.offline {
            bail!("offline mode is enabled and {} is not cached", url);
        }

        let data = self.download(url)?;
        verify(&data, expected)?;

        if let Some(path) = &cache_path {
            if let Err(e) = store(path, &data) {
                tracing::warn!("Failed to cache {}: {:#}", path.display(), e);
            }
        }

        Ok(data)
    }

    fn download(&self, url: &Url) -> Result<Vec<u8>> {
        tracing::info!("Downloading {}", url);

        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("mdns-recipe/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to create HTTP client")?;

        let mut response = client
            .get(url.as_str())
            .send()
            .with_context(|| format!("failed to download {}", url))?;

        if !response.status().is_success() {
            bail!("failed to download {}: HTTP {}", url, response.status());
        }

        let bar = match response.content_length() {
            Some(total) if !self.ctx.is_quiet() && std::io::stderr().is_terminal() => {
                let pb = ProgressBar::new(total);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes}")
                        .context("invalid progress template")?
                        .progress_chars("#>-"),
                );
                pb.set_message(file_name(url));
                pb
            }
            _ => ProgressBar::hidden(),
        };

        let mut data = Vec::new();
        let mut buffer = [0u8; 64 * 1024];
        loop {
            let n = response
                .read(&mut buffer)
                .with_context(|| format!("failed to read response body from {}", url))?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buffer[..n]);
            bar.inc(n as u64);
        }
        bar.finish_and_clear();

        Ok(data)
    }

    fn cache_path(&self, url: &Url, sha: &str) -> PathBuf {
        self.ctx
            .cache_dir()
            .join("downloads")
            .join(format!("{}-{}", &sha[..16], file_name(url)))
    }
}

fn verify(data: &[u8], expected: Option<&str>) -> Result<()> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let actual = sha256_bytes(data);
    if !digest_matches(&actual, expected) {
        bail!(
            "checksum mismatch:\n  expected: {}\n  actual:   {}",
            expected,
            actual
        );
    }
    tracing::debug!("Archive hash verified: {}", &actual[..16]);
    Ok(())
}

/// Write a downloaded archive to the cache atomically.
fn store(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("cache path has no parent: {}", path.display()))?;
    ensure_dir(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
    tmp.write_all(data)?;
    tmp.persist(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or("archive")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{source_tarball, test_context, write_registry};
    use tempfile::TempDir;

    #[test]
    fn test_fetch_extracts_into_source_subfolder() {
        let tmp = TempDir::new().unwrap();
        let archive = source_tarball("878.200.35", &[]);
        let sha = sha256_bytes(&archive);
        std::fs::write(tmp.path().join("src.tar.gz"), &archive).unwrap();
        let registry = write_registry(
            tmp.path(),
            &format!("[sources.\"878.200.35\"]\nurl = \"src.tar.gz\"\nsha256 = \"{sha}\"\n"),
        );

        let ctx = test_context(tmp.path());
        let build_root = tmp.path().join("build");
        let layout = SourceFetcher::new(&ctx, &registry)
            .fetch(&Version::parse("878.200.35").unwrap(), &build_root)
            .unwrap();

        assert_eq!(layout.root(), build_root.join("source_subfolder"));
        assert!(layout.root().join("LICENSE").exists());
        assert!(layout.posix_dir().join("Makefile").exists());
    }

    #[test]
    fn test_unknown_version_creates_nothing() {
        let tmp = TempDir::new().unwrap();
        let registry = write_registry(tmp.path(), "[sources.\"878.200.35\"]\nurl = \"a.tar.gz\"\n");
        let ctx = test_context(tmp.path());
        let build_root = tmp.path().join("build");

        let err = SourceFetcher::new(&ctx, &registry)
            .fetch(&Version::parse("1.2.3").unwrap(), &build_root)
            .unwrap_err();

        assert_eq!(err.kind(), "fetch");
        assert!(err.to_string().contains("version not found"));
        assert!(!build_root.exists());
    }

    #[test]
    fn test_checksum_mismatch_is_fatal() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("src.tar.gz"), source_tarball("1.0", &[])).unwrap();
        let registry = write_registry(
            tmp.path(),
            &format!(
                "[sources.\"1.0\"]\nurl = \"src.tar.gz\"\nsha256 = \"{}\"\n",
                "0".repeat(64)
            ),
        );
        let ctx = test_context(tmp.path());

        let err = SourceFetcher::new(&ctx, &registry)
            .fetch(&Version::parse("1.0").unwrap(), &tmp.path().join("build"))
            .unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
        assert!(!tmp.path().join("build/source_subfolder").exists());
    }

    #[test]
    fn test_falls_back_to_next_mirror() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("good.tar.gz"), source_tarball("1.0", &[])).unwrap();
        let registry = write_registry(
            tmp.path(),
            "[sources.\"1.0\"]\nurl = [\"missing.tar.gz\", \"good.tar.gz\"]\n",
        );
        let ctx = test_context(tmp.path());

        let layout = SourceFetcher::new(&ctx, &registry)
            .fetch(&Version::parse("1.0").unwrap(), &tmp.path().join("build"))
            .unwrap();
        assert!(layout.root().join("LICENSE").exists());
    }

    #[test]
    fn test_require_checksum() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("src.tar.gz"), source_tarball("1.0", &[])).unwrap();
        let registry = write_registry(tmp.path(), "[sources.\"1.0\"]\nurl = \"src.tar.gz\"\n");

        let mut config = crate::util::Config::default();
        config.fetch.require_checksum = true;
        let ctx = test_context(tmp.path()).with_config(config);

        let err = SourceFetcher::new(&ctx, &registry)
            .fetch(&Version::parse("1.0").unwrap(), &tmp.path().join("build"))
            .unwrap_err();
        assert!(err.to_string().contains("require_checksum"));
    }

    #[test]
    fn test_offline_uses_only_the_cache() {
        let tmp = TempDir::new().unwrap();
        let archive = source_tarball("1.0", &[]);
        let sha = sha256_bytes(&archive);
        let registry = write_registry(
            tmp.path(),
            &format!(
                "[sources.\"1.0\"]\nurl = \"https://example.invalid/mDNSResponder-1.0.tar.gz\"\nsha256 = \"{sha}\"\n"
            ),
        );

        let mut config = crate::util::Config::default();
        config.fetch.offline = true;
        let ctx = test_context(tmp.path()).with_config(config);
        let fetcher = SourceFetcher::new(&ctx, &registry);
        let version = Version::parse("1.0").unwrap();

        let err = fetcher.fetch(&version, &tmp.path().join("build")).unwrap_err();
        assert!(err.to_string().contains("offline"));

        let url = Url::parse("https://example.invalid/mDNSResponder-1.0.tar.gz").unwrap();
        store(&fetcher.cache_path(&url, &sha), &archive).unwrap();

        let layout = fetcher.fetch(&version, &tmp.path().join("build")).unwrap();
        assert!(layout.root().join("LICENSE").exists());
    }

    #[test]
    fn test_file_name() {
        let url = Url::parse("https://host/tarballs/mDNSResponder-878.200.35.tar.gz").unwrap();
        assert_eq!(file_name(&url), "mDNSResponder-878.200.35.tar.gz");
        assert_eq!(file_name(&Url::parse("https://host/").unwrap()), "archive");
    }
}
