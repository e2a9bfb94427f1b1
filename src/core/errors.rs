//! Pipeline error taxonomy.
//!
//! Every stage reports failures through [`RecipeError`]. All variants are
//! fatal: the pipeline stops at the first one and nothing is retried.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Error raised by a recipe stage.
#[derive(Debug, Error, Diagnostic)]
pub enum RecipeError {
    /// Unsupported OS/compiler/version combination.
    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(mdns_recipe::configuration),
        help("Pick a different version or adjust --os/--compiler/--compiler-version")
    )]
    Configuration { message: String },

    /// The source archive is unknown, unreachable or corrupt.
    #[error("failed to fetch sources for {version}: {message}")]
    #[diagnostic(code(mdns_recipe::fetch))]
    Fetch {
        version: String,
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A patch did not apply.
    #[error("patch `{patch}` failed: {message}")]
    #[diagnostic(
        code(mdns_recipe::patch),
        help("The patch no longer matches the upstream sources for this version")
    )]
    Patch { patch: String, message: String },

    /// The external toolchain failed.
    #[error("`{command}` failed with {}\n{log}", exit_status(.code))]
    #[diagnostic(code(mdns_recipe::build))]
    Build {
        command: String,
        code: Option<i32>,
        log: String,
    },

    /// Expected build output is missing, or the package tree is malformed.
    #[error("packaging failed: {message}")]
    #[diagnostic(code(mdns_recipe::package))]
    Packaging {
        message: String,
        path: Option<PathBuf>,
    },
}

impl RecipeError {
    pub fn configuration(message: impl Into<String>) -> Self {
        RecipeError::Configuration {
            message: message.into(),
        }
    }

    pub fn fetch(version: impl ToString, message: impl Into<String>) -> Self {
        RecipeError::Fetch {
            version: version.to_string(),
            message: message.into(),
            help: None,
        }
    }

    /// Wrap a helper error, keeping its context chain in the message.
    pub fn fetch_from(version: impl ToString, err: anyhow::Error) -> Self {
        Self::fetch(version, format!("{:#}", err))
    }

    pub fn patch(patch: impl Into<String>, message: impl Into<String>) -> Self {
        RecipeError::Patch {
            patch: patch.into(),
            message: message.into(),
        }
    }

    pub fn packaging(message: impl Into<String>) -> Self {
        RecipeError::Packaging {
            message: message.into(),
            path: None,
        }
    }

    /// A required file or directory is missing from its expected location.
    pub fn missing(what: &str, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        RecipeError::Packaging {
            message: format!("{} not found at {}", what, path.display()),
            path: Some(path),
        }
    }

    pub fn packaging_from(err: anyhow::Error) -> Self {
        Self::packaging(format!("{:#}", err))
    }

    /// Attach a help line to a fetch error.
    pub fn with_help(self, text: impl Into<String>) -> Self {
        match self {
            RecipeError::Fetch {
                version, message, ..
            } => RecipeError::Fetch {
                version,
                message,
                help: Some(text.into()),
            },
            other => other,
        }
    }

    /// Short classification shown in front of tool output.
    pub fn kind(&self) -> &'static str {
        match self {
            RecipeError::Configuration { .. } => "configuration",
            RecipeError::Fetch { .. } => "fetch",
            RecipeError::Patch { .. } => "patch",
            RecipeError::Build { .. } => "build",
            RecipeError::Packaging { .. } => "packaging",
        }
    }
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "a signal".to_string(),
    }
}

/// Result alias for pipeline stages.
pub type RecipeResult<T> = std::result::Result<T, RecipeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = RecipeError::configuration("Only Linux and Windows are supported");
        assert_eq!(
            err.to_string(),
            "invalid configuration: Only Linux and Windows are supported"
        );
        assert_eq!(err.kind(), "configuration");

        let err = RecipeError::patch("0001-fix.patch", "does not apply");
        assert!(err.to_string().contains("`0001-fix.patch`"));
    }

    #[test]
    fn test_build_error_keeps_log_verbatim() {
        let err = RecipeError::Build {
            command: "make os=linux -j1".to_string(),
            code: Some(2),
            log: "mDNSPosix.c:42: error: boom\n".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("make os=linux -j1"));
        assert!(text.contains("failed with exit code 2\n"));
        assert!(text.ends_with("mDNSPosix.c:42: error: boom\n"));

        let err = RecipeError::Build {
            command: "make".to_string(),
            code: None,
            log: String::new(),
        };
        assert!(err.to_string().starts_with("`make` failed with a signal"));
    }

    #[test]
    fn test_fetch_help() {
        let err = RecipeError::fetch("1.0", "not in registry").with_help("run `versions`");
        assert_eq!(
            err.help().map(|h| h.to_string()),
            Some("run `versions`".to_string())
        );
    }
}
