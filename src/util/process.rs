//! Subprocess execution utilities.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result};

use crate::core::RecipeError;

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Set several environment variables.
    pub fn envs<'a>(mut self, vars: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        for (key, value) in vars {
            self.env.insert(key.to_string(), value.to_string());
        }
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Get the environment overrides.
    pub fn get_env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Get the working directory, if set.
    pub fn get_cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Execute the command and wait for completion.
    pub fn exec(&self) -> Result<Output> {
        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("running `{}`", self.display_command());

        cmd.output()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))
    }

    /// Execute and require success, classifying failure as a build error.
    ///
    /// The tool's stdout and stderr are forwarded verbatim in the error.
    pub fn exec_build(&self) -> Result<Output, RecipeError> {
        let output = self.exec().map_err(|e| RecipeError::Build {
            command: self.display_command(),
            code: None,
            log: format!("{:#}", e),
        })?;

        if !output.status.success() {
            let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
            log.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(RecipeError::Build {
                command: self.display_command(),
                code: output.status.code(),
                log,
            });
        }

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            tracing::debug!("{}", line);
        }

        Ok(output)
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Resolve a tool from an optional configured override, then PATH.
///
/// A configured value containing a path separator must exist as given; a bare
/// name is searched in PATH like the default.
pub fn resolve_tool(configured: Option<&Path>, default: &str) -> Result<PathBuf, RecipeError> {
    let wanted = configured.unwrap_or_else(|| Path::new(default));

    if wanted.components().count() > 1 || wanted.is_absolute() {
        if wanted.exists() {
            return Ok(wanted.to_path_buf());
        }
        return Err(RecipeError::Build {
            command: wanted.display().to_string(),
            code: None,
            log: format!("configured tool not found: {}", wanted.display()),
        });
    }

    let name = wanted.to_string_lossy();
    find_executable(&name).ok_or_else(|| RecipeError::Build {
        command: name.to_string(),
        code: None,
        log: format!(
            "`{}` not found in PATH\nInstall it or set its path under [tools] in the config file.",
            name
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("make").args(["os=linux", "-j1", "setup", "Daemon"]);

        assert_eq!(pb.display_command(), "make os=linux -j1 setup Daemon");
    }

    #[test]
    fn test_env_overrides_are_recorded() {
        let pb = ProcessBuilder::new("make")
            .env("CFLAGS", "-std=gnu99")
            .envs([("A", "1"), ("B", "2")]);

        assert_eq!(pb.get_env().get("CFLAGS").map(String::as_str), Some("-std=gnu99"));
        assert_eq!(pb.get_env().len(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_build_forwards_output_on_failure() {
        let err = ProcessBuilder::new("sh")
            .args(["-c", "echo compiling; echo 'fatal: boom' >&2; exit 3"])
            .exec_build()
            .unwrap_err();

        match err {
            RecipeError::Build { code, log, .. } => {
                assert_eq!(code, Some(3));
                assert!(log.contains("compiling"));
                assert!(log.contains("fatal: boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resolve_missing_configured_tool() {
        let err = resolve_tool(Some(Path::new("/definitely/not/here/make")), "make").unwrap_err();
        assert_eq!(err.kind(), "build");
    }
}
