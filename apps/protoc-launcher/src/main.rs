#![warn(clippy::pedantic)]

//! # protoc launcher
//!
//! Runs a pinned version of the protobuf compiler. The requested release is
//! downloaded and cached on first use, the Go code generator plugins are
//! installed when missing, and protoc is invoked with the remaining arguments
//! plus one `--plugin=` flag per plugin.
//!
//! ## Usage
//!
//! ```bash
//! protoc-launcher --protoc_version 25.1 -I. --go_out=. --go-grpc_out=. api.proto
//! ```
//!
//! Every argument after the version is handed to protoc unchanged, and the
//! launcher exits with protoc's exit code.
//!
//! ## Environment Variables
//!
//! - `PROTOC_LAUNCHER_CACHE` - protoc cache directory (default: `protoc-cache`
//!   next to the launcher binary)
//! - `PROTOC_LAUNCHER_DOWNLOAD_URL` - release download base URL
//! - `GOBIN`, `GOPATH` - plugin install directory
//! - `PROTOC_LAUNCHER_LOG` - log filter (default: `protoc_launcher=info`)
//! - `PROTOC_LAUNCHER_LOG_JSON` - emit JSON log lines

mod errors;
mod launch;
mod logging;
mod toolchain;

use std::ffi::OsString;

use anyhow::Result;
use clap::Parser;
use errors::LauncherError;
use launch::LaunchArgs;

/// One-line usage text printed for malformed invocations.
const USAGE: &str = "Usage: protoc-launcher --protoc_version <VERSION> PROTOC_COMMANDS";

/// Version-pinning launcher for protoc.
///
/// Only parses the version flag; clap's own `--help` and `--version` flags
/// are disabled.
#[derive(Parser, Debug)]
#[command(
    name = "protoc-launcher",
    about = "Runs a pinned protoc release with the Go plugins registered",
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct Cli {
    #[command(flatten)]
    pub launch: LaunchArgs,
}

#[tokio::main]
async fn main() {
    logging::init();
    if let Err(e) = run().await {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

/// Handles an error and returns the appropriate exit code.
///
/// For `ProcessExitCode` errors, returns the embedded exit code without
/// printing an error message (protoc already printed its output).
/// For all other errors, prints the error and returns exit code 1.
fn handle_error(e: &anyhow::Error) -> i32 {
    if let Some(LauncherError::ProcessExitCode { code }) = e.downcast_ref::<LauncherError>() {
        return *code;
    }
    eprintln!("Error: {e:?}");
    1
}

async fn run() -> Result<()> {
    let cli = parse_cli(std::env::args_os())?;
    launch::execute(&cli.launch).await
}

/// Parses the command line, printing the usage line on failure.
///
/// Only the `--protoc_version <VERSION>` pair goes through clap. Everything
/// after it is handed to protoc as-is, including `--` and repeated launcher
/// flags.
fn parse_cli<I, T>(args: I) -> Result<Cli>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let mut head: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let passthrough = head.split_off(version_end(&head).min(head.len()));

    let mut cli = Cli::try_parse_from(head).map_err(|e| {
        let rendered = e.to_string();
        let reason = rendered
            .lines()
            .next()
            .unwrap_or_default()
            .trim_start_matches("error: ")
            .to_string();
        usage_error(&reason)
    })?;

    if passthrough.is_empty() {
        return Err(usage_error("no protoc arguments given"));
    }
    cli.launch.protoc_args = passthrough;
    Ok(cli)
}

/// Index just past the version value in `argv`.
///
/// Accepts both `--protoc_version 25.1` and `--protoc_version=25.1`.
fn version_end(argv: &[OsString]) -> usize {
    let inline = argv
        .get(1)
        .and_then(|a| a.to_str())
        .is_some_and(|a| a.starts_with("--protoc_version="));
    if inline { 2 } else { 3 }
}

fn usage_error(reason: &str) -> anyhow::Error {
    println!("{USAGE}");
    LauncherError::usage(reason).into()
}
