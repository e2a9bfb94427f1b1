//! CLI definitions using clap.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use mdns_recipe::core::{Arch, BuildType, Compiler, Os, PlatformTarget, Version};
use mdns_recipe::ops::RecipeOptions;

/// mdns-recipe - fetch, patch, build and package Apple's mDNSResponder
#[derive(Parser)]
#[command(name = "mdns-recipe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the whole pipeline: validate, fetch, patch, build, package
    Create(CreateArgs),

    /// Check whether a version can be built for the given settings
    Validate(ValidateArgs),

    /// Fetch and patch the sources without building
    Source(SourceArgs),

    /// Print package metadata for an existing package as JSON
    Info(InfoArgs),

    /// List the versions in the registry
    Versions(VersionsArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Target settings; unset values default to the host.
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Target operating system (Linux, Windows)
    #[arg(long)]
    pub os: Option<String>,

    /// Target architecture (x86, x86_64, ...)
    #[arg(long)]
    pub arch: Option<String>,

    /// Compiler family (gcc, clang, msvc)
    #[arg(long)]
    pub compiler: Option<String>,

    /// Compiler version, e.g. 11 or 9.4
    #[arg(long, default_value = "")]
    pub compiler_version: String,

    /// Build type (Debug, Release, RelWithDebInfo, MinSizeRel)
    #[arg(long)]
    pub build_type: Option<String>,
}

impl SettingsArgs {
    pub fn to_target(&self) -> Result<PlatformTarget> {
        let os = match &self.os {
            Some(s) => s.parse::<Os>()?,
            None => Os::host(),
        };
        let arch = match &self.arch {
            Some(s) => s.parse::<Arch>()?,
            None => Arch::host(),
        };
        let compiler = match &self.compiler {
            Some(s) => s.parse::<Compiler>()?,
            None => Compiler::default_for(&os),
        };
        let build_type = match &self.build_type {
            Some(s) => s.parse::<BuildType>().map_err(|e| anyhow!(e))?,
            None => BuildType::default(),
        };

        Ok(PlatformTarget::new(
            os,
            arch,
            compiler,
            self.compiler_version.clone(),
            build_type,
        ))
    }
}

#[derive(Args, Debug, Clone)]
pub struct PathArgs {
    /// Registry file listing sources and patches
    #[arg(long, env = "MDNS_RECIPE_REGISTRY", default_value = "recipe.toml")]
    pub registry: PathBuf,

    /// Build root; sources are extracted to <build-dir>/source_subfolder
    #[arg(long, default_value = "build")]
    pub build_dir: PathBuf,

    /// Package root (defaults to <build-dir>/package)
    #[arg(long)]
    pub package_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct CreateArgs {
    /// mDNSResponder version, e.g. 878.200.35
    #[arg(long = "version", value_name = "VERSION")]
    pub pkg_version: String,

    #[command(flatten)]
    pub paths: PathArgs,

    #[command(flatten)]
    pub settings: SettingsArgs,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// mDNSResponder version
    #[arg(long = "version", value_name = "VERSION")]
    pub pkg_version: String,

    /// Registry file, consulted for per-version overrides if present
    #[arg(long, env = "MDNS_RECIPE_REGISTRY", default_value = "recipe.toml")]
    pub registry: PathBuf,

    #[command(flatten)]
    pub settings: SettingsArgs,
}

#[derive(Args)]
pub struct SourceArgs {
    /// mDNSResponder version
    #[arg(long = "version", value_name = "VERSION")]
    pub pkg_version: String,

    /// Registry file listing sources and patches
    #[arg(long, env = "MDNS_RECIPE_REGISTRY", default_value = "recipe.toml")]
    pub registry: PathBuf,

    /// Build root
    #[arg(long, default_value = "build")]
    pub build_dir: PathBuf,

    #[command(flatten)]
    pub settings: SettingsArgs,
}

#[derive(Args)]
pub struct InfoArgs {
    /// mDNSResponder version
    #[arg(long = "version", value_name = "VERSION")]
    pub pkg_version: String,

    /// Build root
    #[arg(long, default_value = "build")]
    pub build_dir: PathBuf,

    /// Package root (defaults to <build-dir>/package)
    #[arg(long)]
    pub package_dir: Option<PathBuf>,

    #[command(flatten)]
    pub settings: SettingsArgs,
}

#[derive(Args)]
pub struct VersionsArgs {
    /// Registry file
    #[arg(long, env = "MDNS_RECIPE_REGISTRY", default_value = "recipe.toml")]
    pub registry: PathBuf,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Parse the version and settings into pipeline options.
pub fn recipe_options(version: &str, settings: &SettingsArgs) -> Result<RecipeOptions> {
    let version =
        Version::parse(version).with_context(|| format!("invalid version `{}`", version))?;
    Ok(RecipeOptions::new(version, settings.to_target()?))
}
