//! mdns-recipe - fetch, patch, build and package Apple's mDNSResponder
//!
//! This crate provides the recipe pipeline: platform validation, source
//! fetching, patching, the make and msbuild backends, packaging, and the
//! metadata consumers link against.

pub mod builder;
pub mod core;
pub mod ops;
pub mod sources;
pub mod util;

/// Test utilities for unit tests.
///
/// In-memory tarballs, registries and stub tool scripts.
#[cfg(test)]
pub mod test_support;

pub use core::{PlatformTarget, RecipeError, RecipeResult, Version};
pub use ops::{PackageInfo, RecipeOptions};
pub use util::context::GlobalContext;
