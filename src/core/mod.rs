//! Core data types: versions, platform settings and the error taxonomy.

pub mod errors;
pub mod platform;
pub mod version;

pub use errors::{RecipeError, RecipeResult};
pub use platform::{Arch, BuildType, Compiler, Os, PlatformTarget};
pub use version::{Version, VersionError};

/// Name of the packaged library.
pub const PACKAGE_NAME: &str = "mdnsresponder";

/// Directory under the build root that always holds extracted sources.
pub const SOURCE_SUBFOLDER: &str = "source_subfolder";
