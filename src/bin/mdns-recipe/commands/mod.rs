//! Command implementations

pub mod completions;
pub mod create;
pub mod info;
pub mod source;
pub mod validate;
pub mod versions;
