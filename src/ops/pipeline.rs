//! The recipe pipeline.
//!
//! Validate, fetch, patch, build, package, describe. Strictly sequential;
//! the first error stops the run and nothing is retried.

use std::path::{Path, PathBuf};

use crate::builder::{Backend, BuildContext, RecipeBackend};
use crate::core::{PlatformTarget, RecipeError, RecipeResult, Version, SOURCE_SUBFOLDER};
use crate::ops::package::package;
use crate::ops::package_info::PackageInfo;
use crate::ops::patch::PatchApplier;
use crate::ops::validate::validate;
use crate::sources::{RecipeRegistry, SourceFetcher, SourceLayout};
use crate::util::fs::normalize_path;
use crate::util::GlobalContext;

/// File the emitted metadata is written to, inside the build root.
pub const PACKAGE_INFO_FILE: &str = "package_info.json";

/// Inputs of one recipe run.
#[derive(Debug, Clone)]
pub struct RecipeOptions {
    pub version: Version,
    pub target: PlatformTarget,

    /// Registry file
    pub registry: PathBuf,

    /// Build root; sources land in `<build_dir>/source_subfolder`
    pub build_dir: PathBuf,

    /// Package root, `<build_dir>/package` when unset
    pub package_dir: Option<PathBuf>,
}

impl RecipeOptions {
    pub fn new(version: Version, target: PlatformTarget) -> Self {
        RecipeOptions {
            version,
            target,
            registry: PathBuf::from("recipe.toml"),
            build_dir: PathBuf::from("build"),
            package_dir: None,
        }
    }

    /// Absolute build root.
    pub fn build_root(&self, ctx: &GlobalContext) -> PathBuf {
        ctx.resolve(&self.build_dir)
    }

    /// Absolute package root.
    pub fn package_root(&self, ctx: &GlobalContext) -> PathBuf {
        match &self.package_dir {
            Some(dir) => ctx.resolve(dir),
            None => self.build_root(ctx).join("package"),
        }
    }
}

/// Result of a full run.
#[derive(Debug, Clone)]
pub struct CreateResult {
    pub info: PackageInfo,

    /// Where the metadata was written
    pub info_path: PathBuf,
}

/// Load the registry file, relative to the working directory.
pub fn load_registry(ctx: &GlobalContext, path: &Path) -> RecipeResult<RecipeRegistry> {
    let path = ctx.resolve(path);
    RecipeRegistry::load(&path)
        .map_err(|e| RecipeError::configuration(format!("{:#}", e)))
}

/// Run the validator only.
///
/// The registry is consulted for per-version overrides when it exists.
pub fn validate_only(ctx: &GlobalContext, opts: &RecipeOptions) -> RecipeResult<()> {
    let registry_path = ctx.resolve(&opts.registry);
    if registry_path.is_file() {
        let registry = load_registry(ctx, &registry_path)?;
        validate(&opts.target, &opts.version, registry.support_for(&opts.version))
    } else {
        validate(&opts.target, &opts.version, None)
    }
}

/// Validate, fetch and patch.
pub fn prepare_sources(ctx: &GlobalContext, opts: &RecipeOptions) -> RecipeResult<SourceLayout> {
    let registry = load_registry(ctx, &opts.registry)?;
    prepare_with(ctx, opts, &registry)
}

fn prepare_with(
    ctx: &GlobalContext,
    opts: &RecipeOptions,
    registry: &RecipeRegistry,
) -> RecipeResult<SourceLayout> {
    validate(&opts.target, &opts.version, registry.support_for(&opts.version))?;

    let layout = SourceFetcher::new(ctx, registry).fetch(&opts.version, &opts.build_root(ctx))?;

    let patches = registry.patches_for(&opts.version);
    let applied = PatchApplier::new(registry, ctx.config().tools.git.as_deref())
        .apply_all(patches, &layout)?;
    if applied > 0 {
        tracing::info!("Applied {} patches", applied);
    }

    Ok(layout)
}

/// Reject a package root that packaging would wipe together with the
/// working directory, the build root, the sources or the registry.
fn check_package_root(ctx: &GlobalContext, opts: &RecipeOptions) -> RecipeResult<()> {
    let package = normalize_path(&opts.package_root(ctx));
    let build = normalize_path(&opts.build_root(ctx));
    let source = build.join(SOURCE_SUBFOLDER);

    let protected = [
        ("working directory", normalize_path(ctx.cwd())),
        ("build root", build),
        ("source tree", source.clone()),
        ("registry", normalize_path(&ctx.resolve(&opts.registry))),
    ];
    for (what, path) in &protected {
        if path.starts_with(&package) {
            return Err(RecipeError::configuration(format!(
                "package directory {} would delete the {} at {}; pass a dedicated --package-dir",
                package.display(),
                what,
                path.display()
            )));
        }
    }

    if package.starts_with(&source) {
        return Err(RecipeError::configuration(format!(
            "package directory {} is inside the source tree {}",
            package.display(),
            source.display()
        )));
    }

    Ok(())
}

/// Run the whole pipeline and write `package_info.json`.
pub fn create(ctx: &GlobalContext, opts: &RecipeOptions) -> RecipeResult<CreateResult> {
    check_package_root(ctx, opts)?;
    let registry = load_registry(ctx, &opts.registry)?;
    let source = prepare_with(ctx, opts, &registry)?;

    let backend = Backend::for_target(&opts.target)?;
    let build_ctx = BuildContext::new(
        source,
        opts.package_root(ctx),
        opts.target.clone(),
        ctx.config().tools.clone(),
    );

    backend.build(&build_ctx)?;
    let files = package(&backend, &build_ctx)?;

    let info = PackageInfo::emit(&opts.target.os, &opts.version, build_ctx.package_dir(), files)?;

    let info_path = opts.build_root(ctx).join(PACKAGE_INFO_FILE);
    info.write(&info_path).map_err(RecipeError::packaging_from)?;
    tracing::info!("Wrote {}", info_path.display());

    Ok(CreateResult { info, info_path })
}

/// Describe an existing package without building.
pub fn describe(ctx: &GlobalContext, opts: &RecipeOptions) -> RecipeResult<PackageInfo> {
    PackageInfo::emit(&opts.target.os, &opts.version, &opts.package_root(ctx), Vec::new())
}
