//! Launching protoc with the requested version and plugins.
//!
//! ## Execution Pipeline
//!
//! 1. **Locate** - Resolve the install root and plugin directory
//! 2. **Cache** - Ensure the requested protoc release is extracted
//! 3. **Plugins** - Ensure the Go code generator plugins are installed
//! 4. **Execute** - Run protoc with the passthrough arguments followed by one
//!    `--plugin=<path>` flag per plugin, on the launcher's own stdio
//!
//! The launcher exits with protoc's exit code.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Result;
use clap::Args;
use tracing::debug;

use crate::errors::LauncherError;
use crate::toolchain::{
    GoInstaller, Host, HttpFetcher, LauncherPaths, PluginProvisioner, PluginSpec, ProtocCache,
};

/// Arguments of a launcher invocation.
#[derive(Args, Debug)]
pub struct LaunchArgs {
    /// protoc release to run (e.g. "25.1").
    #[arg(long = "protoc_version", value_name = "VERSION")]
    pub protoc_version: String,

    /// Arguments passed verbatim to protoc, taken from argv after the version.
    #[arg(skip)]
    pub protoc_args: Vec<OsString>,
}

/// Executes a launcher run.
///
/// ## Exit Codes
///
/// - Returns `Ok(())` if protoc exits successfully
/// - Returns `Err(LauncherError::ProcessExitCode)` if protoc exits non-zero
/// - Returns other errors if the cache, plugins or process launch fail
///
/// # Errors
///
/// Returns an error if any step of the pipeline fails.
pub async fn execute(args: &LaunchArgs) -> Result<()> {
    let paths = LauncherPaths::from_env()?;
    debug!(
        cache = %paths.cache_root.display(),
        plugins = %paths.plugin_bin.display(),
        "Resolved launcher paths"
    );

    let cache = ProtocCache::new(
        paths.cache_root.clone(),
        paths.download_url.clone(),
        Host::current(),
        HttpFetcher::new()?,
    );
    let protoc = cache.ensure(&args.protoc_version).await?;

    let provisioner = PluginProvisioner::new(
        paths.plugin_bin.clone(),
        PluginSpec::required(),
        GoInstaller::from_path(paths.plugin_bin.clone()),
    );
    let plugins = provisioner.ensure()?;

    run_protoc(compiler_command(&protoc, &args.protoc_args, &plugins), &protoc)
}

/// Builds the protoc invocation.
///
/// Arguments are the passthrough arguments followed by one `--plugin=<path>`
/// flag per plugin, in the given order. Standard streams are inherited.
#[must_use]
pub fn compiler_command(protoc: &Path, args: &[OsString], plugins: &[PathBuf]) -> Command {
    let mut cmd = Command::new(protoc);
    cmd.args(args);
    for plugin in plugins {
        let mut flag = OsString::from("--plugin=");
        flag.push(plugin);
        cmd.arg(flag);
    }
    cmd.stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    cmd
}

/// Runs protoc to completion.
///
/// A process without an exit code (killed by a signal) is reported as 1.
fn run_protoc(mut cmd: Command, protoc: &Path) -> Result<()> {
    let status = cmd
        .status()
        .map_err(|e| LauncherError::child_launch(protoc, e))?;

    if !status.success() {
        let code = status.code().unwrap_or(1);
        return Err(LauncherError::process_exit_code(code).into());
    }
    Ok(())
}
