//! Native build backends.
//!
//! This module drives the upstream build systems; nothing is compiled here.

pub mod backend;
pub mod context;
pub mod make;
pub mod msbuild;

pub use backend::{Backend, RecipeBackend};
pub use context::BuildContext;
pub use make::MakeBackend;
pub use msbuild::MsBuildBackend;
