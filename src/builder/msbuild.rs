//! MSBuild backend for the Visual Studio solution.

use std::path::PathBuf;

use crate::builder::backend::RecipeBackend;
use crate::builder::context::BuildContext;
use crate::core::{Arch, RecipeError, RecipeResult};
use crate::util::fs::{copy_matching, rename, replace_in_file, write_string};
use crate::util::process::{resolve_tool, ProcessBuilder};

const SOLUTION: &str = "mDNSResponder.sln";

const TARGETS: &[&str] = &["mDNSResponder", "DLL", "DLLStub", "dns-sd"];

const DEFINITIONS: &[&str] = &["_WINSOCK_DEPRECATED_NO_WARNINGS"];

/// Resource scripts that include MFC's `afxres.h`, unavailable without MFC.
const RESOURCE_SCRIPTS: &[&str] = &[
    "mDNSWindows/DLL/dll.rc",
    "Clients/DNS-SD.VisualStudio/dns-sd.rc",
];

/// Property sheet carrying the preprocessor definitions, next to the solution.
pub const PROPS_FILE: &str = "mdns_recipe_build.props";

/// Where an installed file comes from and goes to.
struct InstallRule {
    file: &'static str,
    /// Directory relative to the source root
    from: &'static str,
    /// Whether outputs sit under `<from>/<platform>/<build type>`
    per_config: bool,
    to: &'static str,
}

const INSTALL_RULES: &[InstallRule] = &[
    InstallRule {
        file: "mDNSResponder.exe",
        from: "mDNSWindows/SystemService",
        per_config: true,
        to: "bin",
    },
    InstallRule {
        file: "dns_sd.h",
        from: "mDNSShared",
        per_config: false,
        to: "include",
    },
    InstallRule {
        file: "dnssd.dll",
        from: "mDNSWindows/DLL",
        per_config: true,
        to: "bin",
    },
    InstallRule {
        file: "dnssdStatic.lib",
        from: "mDNSWindows/DLLStub",
        per_config: true,
        to: "lib",
    },
    InstallRule {
        file: "dns-sd.exe",
        from: "Clients/DNS-SD.VisualStudio",
        per_config: true,
        to: "bin",
    },
];

/// Builds `mDNSResponder.sln` with msbuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsBuildBackend {
    platform: &'static str,
}

impl MsBuildBackend {
    /// Map the target arch to a solution platform.
    pub fn new(arch: &Arch) -> RecipeResult<Self> {
        let platform = match arch {
            Arch::X86 => "Win32",
            Arch::X86_64 => "x64",
            other => {
                return Err(RecipeError::configuration(format!(
                    "no Visual Studio platform for architecture {}",
                    other
                )))
            }
        };
        Ok(MsBuildBackend { platform })
    }

    pub fn platform(&self) -> &'static str {
        self.platform
    }

    /// Output directory of a project for the active platform and configuration.
    fn output_dir(&self, ctx: &BuildContext, project_dir: &str) -> PathBuf {
        ctx.source
            .join(project_dir)
            .join(self.platform)
            .join(ctx.build_type())
    }

    /// The msbuild invocation.
    pub fn build_command(&self, ctx: &BuildContext) -> RecipeResult<ProcessBuilder> {
        let msbuild = resolve_tool(ctx.tools.msbuild.as_deref(), "msbuild")?;
        let props = ctx.source.join(PROPS_FILE);

        Ok(ProcessBuilder::new(msbuild)
            .arg(SOLUTION)
            .arg(format!("/p:Configuration={}", ctx.build_type()))
            .arg(format!("/p:Platform={}", self.platform))
            .arg(format!("/t:{}", TARGETS.join(";")))
            .arg(format!("/p:ForceImportBeforeCppTargets={}", props.display()))
            .cwd(ctx.source.root()))
    }

    fn patch_resource_scripts(&self, ctx: &BuildContext) -> RecipeResult<()> {
        for script in RESOURCE_SCRIPTS {
            let path = ctx.source.join(script);
            replace_in_file(&path, "afxres.h", "winres.h").map_err(|e| RecipeError::Build {
                command: format!("rewrite {}", script),
                code: None,
                log: format!("{:#}", e),
            })?;
        }
        Ok(())
    }

    fn write_props(&self, ctx: &BuildContext) -> RecipeResult<()> {
        let path = ctx.source.join(PROPS_FILE);
        write_string(&path, &props_contents(DEFINITIONS)).map_err(|e| RecipeError::Build {
            command: format!("write {}", PROPS_FILE),
            code: None,
            log: format!("{:#}", e),
        })
    }
}

impl RecipeBackend for MsBuildBackend {
    fn name(&self) -> &'static str {
        "msbuild"
    }

    fn build(&self, ctx: &BuildContext) -> RecipeResult<()> {
        let solution = ctx.source.join(SOLUTION);
        if !solution.is_file() {
            return Err(RecipeError::Build {
                command: "msbuild".to_string(),
                code: None,
                log: format!("solution not found: {}", solution.display()),
            });
        }

        self.patch_resource_scripts(ctx)?;
        self.write_props(ctx)?;

        tracing::debug!("Building {} for {}|{}", SOLUTION, ctx.build_type(), self.platform);
        self.build_command(ctx)?.exec_build()?;
        Ok(())
    }

    fn install(&self, ctx: &BuildContext) -> RecipeResult<()> {
        for rule in INSTALL_RULES {
            let src = if rule.per_config {
                self.output_dir(ctx, rule.from)
            } else {
                ctx.source.join(rule.from)
            };
            let copied = copy_matching(rule.file, &src, &ctx.package_subdir(rule.to))
                .map_err(RecipeError::packaging_from)?;
            if copied.is_empty() {
                return Err(RecipeError::missing(rule.file, src.join(rule.file)));
            }
        }

        // Named like the Bonjour SDK import library.
        let lib = ctx.package_subdir("lib");
        rename(&lib.join("dnssdStatic.lib"), &lib.join("dnssd.lib"))
            .map_err(RecipeError::packaging_from)
    }
}

fn props_contents(definitions: &[&str]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <ItemDefinitionGroup>
    <ClCompile>
      <PreprocessorDefinitions>{};%(PreprocessorDefinitions)</PreprocessorDefinitions>
    </ClCompile>
  </ItemDefinitionGroup>
</Project>
"#,
        definitions.join(";")
    )
}
