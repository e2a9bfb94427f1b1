//! Build backend selection.
//!
//! There are exactly two backends: make for the POSIX tree and msbuild for
//! the Visual Studio solution. The target OS picks one once per invocation.

use crate::builder::context::BuildContext;
use crate::builder::make::MakeBackend;
use crate::builder::msbuild::MsBuildBackend;
use crate::core::{Os, PlatformTarget, RecipeError, RecipeResult};

/// Operations every build backend provides.
pub trait RecipeBackend {
    /// Backend identifier used in logs.
    fn name(&self) -> &'static str;

    /// Compile the sources in place.
    fn build(&self, ctx: &BuildContext) -> RecipeResult<()>;

    /// Install build outputs into the package root.
    ///
    /// The package root exists and is empty when this runs.
    fn install(&self, ctx: &BuildContext) -> RecipeResult<()>;
}

/// The backend chosen for a target.
#[derive(Debug, Clone)]
pub enum Backend {
    Posix(MakeBackend),
    Windows(MsBuildBackend),
}

impl Backend {
    /// Pick the backend for the target OS.
    pub fn for_target(target: &PlatformTarget) -> RecipeResult<Self> {
        match target.os {
            Os::Linux => Ok(Backend::Posix(MakeBackend::new())),
            Os::Windows => Ok(Backend::Windows(MsBuildBackend::new(&target.arch)?)),
            ref other => Err(RecipeError::configuration(format!(
                "no build backend for {}",
                other
            ))),
        }
    }

    fn inner(&self) -> &dyn RecipeBackend {
        match self {
            Backend::Posix(b) => b,
            Backend::Windows(b) => b,
        }
    }
}

impl RecipeBackend for Backend {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn build(&self, ctx: &BuildContext) -> RecipeResult<()> {
        let backend = self.inner();
        tracing::info!("Building with {}", backend.name());
        backend.build(ctx)
    }

    fn install(&self, ctx: &BuildContext) -> RecipeResult<()> {
        let backend = self.inner();
        tracing::info!("Installing with {}", backend.name());
        backend.install(ctx)
    }
}
