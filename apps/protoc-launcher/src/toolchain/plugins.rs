//! Provisioning of the protoc code generator plugins.
//!
//! The launcher always registers the same two Go plugins with protoc. Each is
//! looked up in the plugin bin directory and installed through a
//! [`PluginInstaller`] when missing.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::errors::LauncherError;

/// Module identifiers of the plugins registered with protoc, in flag order.
pub const REQUIRED_PLUGINS: [&str; 2] = [
    "google.golang.org/protobuf/cmd/protoc-gen-go@latest",
    "google.golang.org/grpc/cmd/protoc-gen-go-grpc@latest",
];

/// A plugin module and the executable it installs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSpec {
    /// Installable module identifier, e.g. `example.com/cmd/protoc-gen-x@latest`.
    pub module: String,
    /// Executable name without platform suffix, e.g. `protoc-gen-x`.
    pub executable: String,
}

impl PluginSpec {
    /// Derives the executable name from the last path segment of `module`,
    /// without any `@version` suffix.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        let module = module.into();
        let last_segment = module.rsplit('/').next().unwrap_or(&module);
        let executable = last_segment
            .split('@')
            .next()
            .unwrap_or(last_segment)
            .to_string();
        Self { module, executable }
    }

    /// The fixed plugin list.
    #[must_use]
    pub fn required() -> Vec<Self> {
        REQUIRED_PLUGINS.into_iter().map(Self::new).collect()
    }
}

/// Capability to install a plugin module.
pub trait PluginInstaller {
    /// Installs `module` so that its executable appears in the plugin bin dir.
    ///
    /// # Errors
    ///
    /// Returns [`LauncherError::PluginInstall`] if the install step fails.
    fn install(&self, module: &str) -> Result<()>;
}

/// Installs plugins with `go install`.
#[derive(Debug, Clone)]
pub struct GoInstaller {
    /// The `go` executable, `None` when it could not be found.
    program: Option<PathBuf>,
    bin_dir: PathBuf,
}

impl GoInstaller {
    /// Creates an installer running `program` that places binaries into
    /// `bin_dir` via `GOBIN`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, bin_dir: PathBuf) -> Self {
        Self {
            program: Some(program.into()),
            bin_dir,
        }
    }

    /// Creates an installer using the `go` found in `PATH`.
    ///
    /// A missing toolchain is only reported once a plugin needs installing.
    #[must_use]
    pub fn from_path(bin_dir: PathBuf) -> Self {
        match which::which("go") {
            Ok(go) => Self::new(go, bin_dir),
            Err(e) => {
                debug!("go not found in PATH: {e}");
                Self {
                    program: None,
                    bin_dir,
                }
            }
        }
    }
}

impl PluginInstaller for GoInstaller {
    fn install(&self, module: &str) -> Result<()> {
        let Some(go) = &self.program else {
            return Err(
                LauncherError::plugin_install(module, "go toolchain not found in PATH").into(),
            );
        };

        let status = Command::new(go)
            .arg("install")
            .arg(module)
            .env("GOBIN", &self.bin_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| {
                LauncherError::plugin_install_with_source(
                    module,
                    format!("failed to execute {}", go.display()),
                    e,
                )
            })?;

        if !status.success() {
            return Err(
                LauncherError::plugin_install(module, format!("go install failed ({status})"))
                    .into(),
            );
        }
        Ok(())
    }
}

/// Ensures a set of plugins is present in a bin directory.
#[derive(Debug)]
pub struct PluginProvisioner<I> {
    bin_dir: PathBuf,
    specs: Vec<PluginSpec>,
    installer: I,
    exe_suffix: &'static str,
}

impl<I: PluginInstaller> PluginProvisioner<I> {
    #[must_use]
    pub fn new(bin_dir: PathBuf, specs: Vec<PluginSpec>, installer: I) -> Self {
        Self {
            bin_dir,
            specs,
            installer,
            exe_suffix: std::env::consts::EXE_SUFFIX,
        }
    }

    /// Path the executable of `spec` is expected at.
    #[must_use]
    pub fn executable_path(&self, spec: &PluginSpec) -> PathBuf {
        self.bin_dir
            .join(format!("{}{}", spec.executable, self.exe_suffix))
    }

    /// Installs every missing plugin and returns all plugin paths in list order.
    ///
    /// A missing bin directory is not an error; every plugin is then installed.
    ///
    /// # Errors
    ///
    /// Returns the installer's error for the first plugin that fails to
    /// install. Plugins installed before it are kept.
    pub fn ensure(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            let path = self.executable_path(spec);
            if path.exists() {
                debug!("{} found at {}", spec.executable, path.display());
            } else {
                info!("Installing {}", spec.module);
                self.installer.install(&spec.module)?;
                if !path.exists() {
                    warn!(
                        "{} was installed but is not at {}",
                        spec.executable,
                        path.display()
                    );
                }
            }
            paths.push(path);
        }
        Ok(paths)
    }
}
