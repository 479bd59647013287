//! Platform resolution for protoc release archives.
//!
//! Maps the host operating system and CPU architecture onto the token used in
//! protobuf release file names (`protoc-<version>-<token>.zip`).
//!
//! ## Supported Platforms
//!
//! | OS      | `x86_64`       | `x86`          | `aarch64`       |
//! |---------|----------------|----------------|-----------------|
//! | Linux   | `linux-x86_64` | `linux-x86_32` | `linux-aarch_64`|
//! | macOS   | `osx-x86_64`   | `osx-x86_32`   | `osx-aarch_64`  |
//! | Windows | `win64`        | `win32`        | unsupported     |

use anyhow::Result;
use std::fmt;

use crate::errors::LauncherError;

/// Operating system families with protoc releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    Linux,
    Windows,
    Macos,
}

impl OsFamily {
    /// Parses an OS name as reported by `std::env::consts::OS`.
    #[must_use]
    pub fn from_name(os: &str) -> Option<Self> {
        match os {
            "linux" => Some(Self::Linux),
            "windows" => Some(Self::Windows),
            "macos" => Some(Self::Macos),
            _ => None,
        }
    }

    /// Returns the OS fragment used in release file names.
    #[must_use]
    pub fn release_name(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Windows => "win",
            Self::Macos => "osx",
        }
    }
}

/// CPU architectures with protoc releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X86_64,
    X86_32,
    Aarch64,
}

impl Arch {
    /// Parses an architecture name as reported by `std::env::consts::ARCH`.
    #[must_use]
    pub fn from_name(arch: &str) -> Option<Self> {
        match arch {
            "x86_64" => Some(Self::X86_64),
            "x86" => Some(Self::X86_32),
            "aarch64" => Some(Self::Aarch64),
            _ => None,
        }
    }

    /// Returns the architecture fragment used in release file names.
    #[must_use]
    pub fn release_name(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::X86_32 => "x86_32",
            Self::Aarch64 => "aarch_64",
        }
    }
}

/// The OS and architecture names of a machine, as reported by the runtime.
///
/// Kept as raw strings so unsupported hosts can be described in errors and
/// simulated in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub os: String,
    pub arch: String,
}

impl Host {
    /// Returns the host this binary was compiled for.
    #[must_use]
    pub fn current() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    #[must_use]
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }
}

/// A supported OS/architecture pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    os: OsFamily,
    arch: Arch,
}

impl Platform {
    /// Resolves a host into a platform with a protoc release.
    ///
    /// # Errors
    ///
    /// Returns [`LauncherError::UnsupportedPlatform`] if the OS or architecture
    /// is unknown, or for ARM64 Windows which has no release.
    pub fn resolve(host: &Host) -> Result<Self> {
        let unsupported = || LauncherError::unsupported_platform(&host.os, &host.arch);

        let os = OsFamily::from_name(&host.os).ok_or_else(unsupported)?;
        let arch = Arch::from_name(&host.arch).ok_or_else(unsupported)?;

        if os == OsFamily::Windows && arch == Arch::Aarch64 {
            return Err(unsupported().into());
        }

        Ok(Self { os, arch })
    }

    /// Returns the token used in release archive names.
    #[must_use = "returns the token without side effects"]
    pub fn token(self) -> String {
        match (self.os, self.arch) {
            (OsFamily::Windows, Arch::X86_32) => "win32".to_string(),
            (OsFamily::Windows, _) => "win64".to_string(),
            (os, arch) => format!("{}-{}", os.release_name(), arch.release_name()),
        }
    }

    /// Returns the executable file extension for this platform.
    ///
    /// Returns `.exe` on Windows, empty string otherwise.
    #[must_use = "returns the extension string without side effects"]
    pub fn executable_extension(self) -> &'static str {
        match self.os {
            OsFamily::Windows => ".exe",
            OsFamily::Linux | OsFamily::Macos => "",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}
