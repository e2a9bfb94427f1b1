//! Build settings describing the target platform.
//!
//! A [`PlatformTarget`] is supplied by whoever invokes the recipe (the CLI
//! fills it from flags, defaulting to the host) and stays fixed for the whole
//! invocation.

use std::fmt;
use std::str::FromStr;

use crate::core::version::Version;

/// Target operating system.
///
/// Unknown names are preserved so that validation can reject them by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Os {
    Linux,
    Windows,
    Macos,
    FreeBsd,
    Other(String),
}

impl Os {
    /// The operating system this binary was compiled for.
    pub fn host() -> Self {
        std::env::consts::OS.parse().unwrap_or(Os::Linux)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Os::Linux => "Linux",
            Os::Windows => "Windows",
            Os::Macos => "Macos",
            Os::FreeBsd => "FreeBSD",
            Os::Other(name) => name,
        }
    }
}

impl FromStr for Os {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "linux" => Os::Linux,
            "windows" => Os::Windows,
            "macos" | "darwin" => Os::Macos,
            "freebsd" => Os::FreeBsd,
            _ => Os::Other(s.to_string()),
        })
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target CPU architecture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Arch {
    X86,
    X86_64,
    Armv7,
    Armv8,
    Other(String),
}

impl Arch {
    pub fn host() -> Self {
        std::env::consts::ARCH.parse().unwrap_or(Arch::X86_64)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Arch::X86 => "x86",
            Arch::X86_64 => "x86_64",
            Arch::Armv7 => "armv7",
            Arch::Armv8 => "armv8",
            Arch::Other(name) => name,
        }
    }
}

impl FromStr for Arch {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "x86" | "i386" | "i686" => Arch::X86,
            "x86_64" | "amd64" | "x64" => Arch::X86_64,
            "armv7" | "arm" => Arch::Armv7,
            "armv8" | "aarch64" | "arm64" => Arch::Armv8,
            _ => Arch::Other(s.to_string()),
        })
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compiler family.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Compiler {
    Gcc,
    Clang,
    AppleClang,
    Msvc,
    Other(String),
}

impl Compiler {
    /// Default compiler family for an operating system.
    pub fn default_for(os: &Os) -> Self {
        match os {
            Os::Windows => Compiler::Msvc,
            Os::Macos => Compiler::AppleClang,
            _ => Compiler::Gcc,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Compiler::Gcc => "gcc",
            Compiler::Clang => "clang",
            Compiler::AppleClang => "apple-clang",
            Compiler::Msvc => "msvc",
            Compiler::Other(name) => name,
        }
    }
}

impl FromStr for Compiler {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "gcc" => Compiler::Gcc,
            "clang" => Compiler::Clang,
            "apple-clang" | "apple_clang" => Compiler::AppleClang,
            "msvc" | "visual studio" | "cl" => Compiler::Msvc,
            _ => Compiler::Other(s.to_string()),
        })
    }
}

impl fmt::Display for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BuildType {
    Debug,
    #[default]
    Release,
    RelWithDebInfo,
    MinSizeRel,
}

impl BuildType {
    /// Name as used by the upstream Visual Studio configurations.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildType::Debug => "Debug",
            BuildType::Release => "Release",
            BuildType::RelWithDebInfo => "RelWithDebInfo",
            BuildType::MinSizeRel => "MinSizeRel",
        }
    }
}

impl FromStr for BuildType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(BuildType::Debug),
            "release" => Ok(BuildType::Release),
            "relwithdebinfo" => Ok(BuildType::RelWithDebInfo),
            "minsizerel" => Ok(BuildType::MinSizeRel),
            _ => Err(format!(
                "unknown build type `{}` (expected Debug, Release, RelWithDebInfo or MinSizeRel)",
                s
            )),
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The complete set of build settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformTarget {
    pub os: Os,
    pub arch: Arch,
    pub compiler: Compiler,
    /// Kept as written; parsed lazily so validation can report bad input.
    pub compiler_version: String,
    pub build_type: BuildType,
}

impl PlatformTarget {
    pub fn new(
        os: Os,
        arch: Arch,
        compiler: Compiler,
        compiler_version: impl Into<String>,
        build_type: BuildType,
    ) -> Self {
        PlatformTarget {
            os,
            arch,
            compiler,
            compiler_version: compiler_version.into(),
            build_type,
        }
    }

    /// Settings matching the host, with the host's usual compiler.
    pub fn host() -> Self {
        let os = Os::host();
        let compiler = Compiler::default_for(&os);
        PlatformTarget {
            os,
            arch: Arch::host(),
            compiler,
            compiler_version: String::new(),
            build_type: BuildType::default(),
        }
    }

    /// Parsed compiler version, `None` if it was left empty.
    pub fn compiler_version(&self) -> Option<Result<Version, crate::core::version::VersionError>> {
        if self.compiler_version.trim().is_empty() {
            None
        } else {
            Some(Version::parse(&self.compiler_version))
        }
    }
}

impl fmt::Display for PlatformTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}", self.os, self.arch, self.compiler)?;
        if !self.compiler_version.is_empty() {
            write!(f, " {}", self.compiler_version)?;
        }
        write!(f, " ({})", self.build_type)
    }
}
