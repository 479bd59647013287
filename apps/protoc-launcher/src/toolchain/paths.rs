//! Location resolution for the protoc launcher.
//!
//! All locations come from environment variables with built-in fallbacks.
//! Resolution is done through [`resolve_dir`] and [`LauncherPaths::from_lookup`],
//! which take their inputs as arguments so they can be exercised without
//! touching the process environment.
//!
//! ## Cache Layout
//!
//! ```text
//! <launcher dir>/protoc-cache/          # Install root (or PROTOC_LAUNCHER_CACHE)
//!   protoc-25.1-linux-x86_64/           # One directory per version and platform
//!     bin/protoc
//!     include/google/protobuf/...
//!     .protoc-launcher.json             # Cache record
//!   protoc-26.0-linux-x86_64/
//!     ...
//! ```

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::errors::LauncherError;

/// Environment variable overriding the install root.
pub const CACHE_DIR_ENV: &str = "PROTOC_LAUNCHER_CACHE";

/// Environment variable overriding the release download base URL.
pub const DOWNLOAD_URL_ENV: &str = "PROTOC_LAUNCHER_DOWNLOAD_URL";

/// Go's explicit binary install directory.
pub const GOBIN_ENV: &str = "GOBIN";

/// Go's workspace path list.
pub const GOPATH_ENV: &str = "GOPATH";

/// Default base URL of protobuf release downloads.
pub const DEFAULT_DOWNLOAD_URL: &str =
    "https://github.com/protocolbuffers/protobuf/releases/download";

/// Name of the install root created next to the launcher binary.
const CACHE_DIR_NAME: &str = "protoc-cache";

/// Picks the first usable directory from an ordered set of candidates.
///
/// An override that is present but empty counts as unset, matching how the
/// Go toolchain treats `GOBIN` and `GOPATH`.
#[must_use]
pub fn resolve_dir(
    env_override: Option<OsString>,
    toolchain_default: Option<PathBuf>,
    builtin_default: Option<PathBuf>,
) -> Option<PathBuf> {
    env_override
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or(toolchain_default)
        .or(builtin_default)
}

/// Resolved locations used by a launcher run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherPaths {
    /// Directory holding extracted protoc releases.
    pub cache_root: PathBuf,
    /// Directory where protoc plugins are installed.
    pub plugin_bin: PathBuf,
    /// Base URL that release archives are fetched from.
    pub download_url: String,
}

impl LauncherPaths {
    /// Resolves all locations from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the launcher's own path cannot be determined, or if
    /// no plugin directory can be derived.
    pub fn from_env() -> Result<Self> {
        let launcher_exe = std::env::current_exe()
            .map_err(|e| LauncherError::io_error("cannot determine launcher path", e))?;
        Self::from_lookup(|name| std::env::var_os(name), &launcher_exe, dirs::home_dir())
    }

    /// Resolves all locations from an arbitrary variable lookup.
    ///
    /// The install root resolves as:
    /// 1. `PROTOC_LAUNCHER_CACHE`
    /// 2. `protoc-cache` next to `launcher_exe`
    ///
    /// The plugin directory resolves as:
    /// 1. `GOBIN`
    /// 2. `bin` under the first `GOPATH` entry
    /// 3. `go/bin` under `home`
    ///
    /// # Errors
    ///
    /// Returns an error if no plugin directory can be derived or a relative
    /// path cannot be made absolute.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<OsString>,
        launcher_exe: &Path,
        home: Option<PathBuf>,
    ) -> Result<Self> {
        let cache_root = resolve_dir(
            lookup(CACHE_DIR_ENV),
            None,
            launcher_exe.parent().map(|dir| dir.join(CACHE_DIR_NAME)),
        )
        .with_context(|| {
            format!(
                "cannot place the protoc cache next to {}; set {CACHE_DIR_ENV}",
                launcher_exe.display()
            )
        })?;

        let gopath_bin = lookup(GOPATH_ENV)
            .and_then(|gopath| std::env::split_paths(&gopath).find(|p| !p.as_os_str().is_empty()))
            .map(|dir| dir.join("bin"));
        let home_bin = home.map(|dir| dir.join("go").join("bin"));
        let plugin_bin = resolve_dir(lookup(GOBIN_ENV), gopath_bin, home_bin).with_context(
            || format!("cannot locate the plugin directory; set {GOBIN_ENV} or {GOPATH_ENV}"),
        )?;

        let download_url = lookup(DOWNLOAD_URL_ENV)
            .filter(|value| !value.is_empty())
            .map_or_else(
                || DEFAULT_DOWNLOAD_URL.to_string(),
                |value| value.to_string_lossy().into_owned(),
            );

        Ok(Self {
            cache_root: absolute(&cache_root)?,
            plugin_bin: absolute(&plugin_bin)?,
            download_url,
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path)
        .map_err(|e| LauncherError::io_error(format!("invalid path {}", path.display()), e).into())
}
