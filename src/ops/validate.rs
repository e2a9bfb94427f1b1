//! Platform/version validation.
//!
//! Runs before anything touches the filesystem or network. Tarballs from
//! 1096.0.2 onwards no longer ship `mDNSWindows`, and build with
//! `TCP_NOTSENT_LOWAT` and `__has_c_attribute`, which old gcc and clang
//! releases lack.

use crate::core::{Arch, Compiler, Os, PlatformTarget, RecipeError, RecipeResult, Version};
use crate::sources::SupportOverride;

/// The support rules applying to every version unless overridden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportMatrix {
    /// Operating systems the recipe can build for at all
    pub supported_os: Vec<Os>,

    /// First version whose tarball no longer builds on Windows and needs newer compilers
    pub layout_break: Version,

    /// Minimum gcc from `layout_break` onwards
    pub gcc_floor: Version,

    /// Minimum clang from `layout_break` onwards
    pub clang_floor: Version,
}

impl Default for SupportMatrix {
    fn default() -> Self {
        SupportMatrix {
            supported_os: vec![Os::Linux, Os::Windows],
            layout_break: Version::from_parts(&[1096, 0, 2]),
            gcc_floor: Version::from_parts(&[5]),
            clang_floor: Version::from_parts(&[6]),
        }
    }
}

/// Rules resolved for one specific version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveRules {
    pub os: Vec<Os>,
    pub gcc_floor: Option<Version>,
    pub clang_floor: Option<Version>,
}

impl SupportMatrix {
    /// Whether `version` is at or past the tarball layout change.
    pub fn is_post_break(&self, version: &Version) -> bool {
        version >= &self.layout_break
    }

    /// Resolve the rules for a version, applying a registry override.
    pub fn rules_for(&self, version: &Version, support: Option<&SupportOverride>) -> EffectiveRules {
        let post_break = self.is_post_break(version);

        let mut rules = EffectiveRules {
            os: self
                .supported_os
                .iter()
                .filter(|os| !(post_break && **os == Os::Windows))
                .cloned()
                .collect(),
            gcc_floor: post_break.then(|| self.gcc_floor.clone()),
            clang_floor: post_break.then(|| self.clang_floor.clone()),
        };

        if let Some(support) = support {
            if let Some(os) = support.os_list() {
                rules.os = os;
            }
            if support.gcc.is_some() {
                rules.gcc_floor = support.gcc.clone();
            }
            if support.clang.is_some() {
                rules.clang_floor = support.clang.clone();
            }
        }

        rules
    }

    /// Reject unsupported settings for `version`.
    pub fn validate(
        &self,
        target: &PlatformTarget,
        version: &Version,
        support: Option<&SupportOverride>,
    ) -> RecipeResult<()> {
        if !self.supported_os.contains(&target.os) {
            return Err(RecipeError::configuration(
                "Only Linux and Windows are supported for this package.",
            ));
        }

        let rules = self.rules_for(version, support);

        if !rules.os.contains(&target.os) {
            return Err(RecipeError::configuration(format!(
                "{} is not supported for version {}.",
                target.os, version
            )));
        }

        if target.os == Os::Windows && !matches!(target.arch, Arch::X86 | Arch::X86_64) {
            return Err(RecipeError::configuration(format!(
                "Architecture {} is not supported on Windows (only x86 and x86_64).",
                target.arch
            )));
        }

        let floor = match target.compiler {
            Compiler::Gcc => rules.gcc_floor.as_ref().map(|f| ("gcc", f)),
            Compiler::Clang => rules.clang_floor.as_ref().map(|f| ("Clang", f)),
            _ => None,
        };

        if let Some((name, floor)) = floor {
            let compiler_version = match target.compiler_version() {
                Some(Ok(v)) => v,
                Some(Err(e)) => {
                    return Err(RecipeError::configuration(format!(
                        "invalid compiler version: {}",
                        e
                    )))
                }
                None => {
                    return Err(RecipeError::configuration(format!(
                        "Version {} requires {} {} or higher; pass --compiler-version.",
                        version, name, floor
                    )))
                }
            };

            if compiler_version < *floor {
                return Err(RecipeError::configuration(format!(
                    "Only {} {} or higher is supported for this package.",
                    name, floor
                )));
            }
        }

        tracing::debug!("{} {} validated for {}", crate::core::PACKAGE_NAME, version, target);
        Ok(())
    }
}

/// Validate with the default support matrix.
pub fn validate(
    target: &PlatformTarget,
    version: &Version,
    support: Option<&SupportOverride>,
) -> RecipeResult<()> {
    SupportMatrix::default().validate(target, version, support)
}
