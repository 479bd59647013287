//! Error types for the protoc launcher.
//!
//! Every failure the launcher can hit is terminal for the run. `LauncherError`
//! names each failure class so the top-level handler and the tests can tell
//! them apart via `anyhow::Error::downcast_ref`.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error used as an attached cause.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Consolidated error type for launcher operations.
#[derive(Debug, Error)]
pub enum LauncherError {
    /// Malformed invocation. Usage text has already been printed.
    #[error("invalid usage: {message}")]
    Usage {
        /// What was wrong with the invocation.
        message: String,
    },

    /// Host OS/architecture has no matching protoc release.
    #[error("unsupported platform: {os} on {arch}")]
    UnsupportedPlatform {
        /// Host operating system as reported by the runtime.
        os: String,
        /// Host CPU architecture as reported by the runtime.
        arch: String,
    },

    /// The release archive could not be fetched.
    #[error("download error: {message} ({url})")]
    Download {
        /// URL that was requested.
        url: String,
        /// Description of the failure.
        message: String,
        /// The underlying transport error, if any.
        #[source]
        source: Option<BoxedSource>,
    },

    /// The archive could not be unpacked into the cache.
    #[error("extraction error: {message}")]
    Extraction {
        /// Description of the failure.
        message: String,
        /// The underlying zip or filesystem error.
        #[source]
        source: BoxedSource,
    },

    /// The compiler could not be marked executable.
    #[error("cannot make {path} executable")]
    Permission {
        /// Path of the executable.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Filesystem bookkeeping outside of extraction failed.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O operation that failed.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A plugin install step failed.
    #[error("failed to install plugin {module}: {message}")]
    PluginInstall {
        /// Module identifier that was being installed.
        module: String,
        /// Description of the failure.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<BoxedSource>,
    },

    /// The compiler binary could not be started.
    #[error("failed to execute {path}")]
    ChildLaunch {
        /// Path of the compiler binary.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Compiler exited with a non-zero code.
    ///
    /// The code is propagated as the launcher's own exit code without printing
    /// anything further; the compiler already reported on its own streams.
    #[error("process exited with code {code}")]
    ProcessExitCode {
        /// The exit code from the compiler.
        code: i32,
    },
}

impl LauncherError {
    /// Creates a new `Usage` error.
    #[must_use]
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedPlatform` error.
    #[must_use]
    pub fn unsupported_platform(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self::UnsupportedPlatform {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Creates a `Download` error for a response other than HTTP 200.
    #[must_use]
    pub fn download_status(url: impl Into<String>, status: u16) -> Self {
        Self::Download {
            url: url.into(),
            message: format!("HTTP {status}"),
            source: None,
        }
    }

    /// Creates a `Download` error with a source error.
    #[must_use]
    pub fn download_with_source(
        url: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<BoxedSource>,
    ) -> Self {
        Self::Download {
            url: url.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates a new `Extraction` error.
    #[must_use]
    pub fn extraction(message: impl Into<String>, source: impl Into<BoxedSource>) -> Self {
        Self::Extraction {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Creates a new `Permission` error.
    #[must_use]
    pub fn permission(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Permission {
            path: path.into(),
            source,
        }
    }

    /// Creates a new `Io` error from an I/O error with context.
    #[must_use]
    pub fn io_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Creates a new `PluginInstall` error.
    #[must_use]
    pub fn plugin_install(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PluginInstall {
            module: module.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new `PluginInstall` error with a source error.
    #[must_use]
    pub fn plugin_install_with_source(
        module: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<BoxedSource>,
    ) -> Self {
        Self::PluginInstall {
            module: module.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates a new `ChildLaunch` error.
    #[must_use]
    pub fn child_launch(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ChildLaunch {
            path: path.into(),
            source,
        }
    }

    /// Creates a new `ProcessExitCode` error.
    #[must_use]
    pub const fn process_exit_code(code: i32) -> Self {
        Self::ProcessExitCode { code }
    }
}
