//! Make backend for the POSIX tree (`mDNSPosix`).

use std::path::Path;

use crate::builder::backend::RecipeBackend;
use crate::builder::context::BuildContext;
use crate::core::{RecipeError, RecipeResult};
use crate::util::fs::{ensure_dir, remove_dir_all_if_exists, rename};
use crate::util::process::{resolve_tool, ProcessBuilder};

/// Always passed to make. The upstream makefiles are not safe to run in parallel.
const MAKE_ARGS: &[&str] = &["os=linux", "-j1"];

const BUILD_TARGETS: &[&str] = &["setup", "Daemon", "libdns_sd", "Clients"];

// Man pages and the NSS plugin are left out.
const INSTALL_TARGETS: &[&str] = &["setup", "InstalledDaemon", "InstalledLib", "InstalledClients"];

const MAKE_ENV: &[(&str, &str)] = &[("CFLAGS", "-std=gnu99")];

/// Directories created before `make install`; `sbin` is transient.
const INSTALL_DIRS: &[&str] = &["bin", "include", "lib", "sbin"];

/// Builds with make in `<source>/mDNSPosix`.
#[derive(Debug, Clone, Default)]
pub struct MakeBackend;

impl MakeBackend {
    pub fn new() -> Self {
        MakeBackend
    }

    fn make(&self, ctx: &BuildContext) -> RecipeResult<ProcessBuilder> {
        let make = resolve_tool(ctx.tools.make.as_deref(), "make")?;
        Ok(ProcessBuilder::new(make)
            .args(MAKE_ARGS)
            .envs(MAKE_ENV.iter().copied())
            .cwd(ctx.source.posix_dir()))
    }

    /// The compile invocation.
    pub fn build_command(&self, ctx: &BuildContext) -> RecipeResult<ProcessBuilder> {
        Ok(self.make(ctx)?.args(BUILD_TARGETS))
    }

    /// The install invocation, rooted at the package directory.
    pub fn install_command(&self, ctx: &BuildContext) -> RecipeResult<ProcessBuilder> {
        let pkg = ctx.package_dir();
        Ok(self
            .make(ctx)?
            .arg(format!("INSTBASE={}", pkg.display()))
            .arg(format!("STARTUPSCRIPTDIR={}", pkg.join("bin").display()))
            .arg("RUNLEVELSCRIPTSDIR=")
            .args(INSTALL_TARGETS))
    }

    fn require_posix_dir(&self, ctx: &BuildContext) -> RecipeResult<()> {
        let dir = ctx.source.posix_dir();
        if !dir.is_dir() {
            return Err(RecipeError::Build {
                command: "make".to_string(),
                code: None,
                log: format!("POSIX build directory not found: {}", dir.display()),
            });
        }
        Ok(())
    }
}

impl RecipeBackend for MakeBackend {
    fn name(&self) -> &'static str {
        "make"
    }

    fn build(&self, ctx: &BuildContext) -> RecipeResult<()> {
        self.require_posix_dir(ctx)?;
        self.build_command(ctx)?.exec_build()?;
        Ok(())
    }

    fn install(&self, ctx: &BuildContext) -> RecipeResult<()> {
        self.require_posix_dir(ctx)?;

        for dir in INSTALL_DIRS {
            ensure_dir(&ctx.package_subdir(dir)).map_err(RecipeError::packaging_from)?;
        }

        self.install_command(ctx)?.exec_build()?;

        merge_sbin(ctx.package_dir())
    }
}

/// Move the daemon from `sbin/` to `bin/` and drop `sbin/`.
fn merge_sbin(pkg: &Path) -> RecipeResult<()> {
    let daemon = pkg.join("sbin").join("mdnsd");
    if !daemon.is_file() {
        return Err(RecipeError::missing("mdnsd", daemon));
    }

    rename(&daemon, &pkg.join("bin").join("mdnsd")).map_err(RecipeError::packaging_from)?;
    remove_dir_all_if_exists(&pkg.join("sbin")).map_err(RecipeError::packaging_from)
}
