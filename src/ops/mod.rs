//! High-level operations.
//!
//! This module contains the pipeline stages behind the CLI commands.

pub mod package;
pub mod package_info;
pub mod patch;
pub mod pipeline;
pub mod validate;

pub use package::{package, PackageLayout, PackagedFile, CANONICAL_DIRS};
pub use package_info::{link_library, PackageInfo};
pub use patch::PatchApplier;
pub use pipeline::{
    create, describe, load_registry, prepare_sources, validate_only, CreateResult, RecipeOptions,
    PACKAGE_INFO_FILE,
};
pub use validate::{validate, EffectiveRules, SupportMatrix};
