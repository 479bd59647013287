//! Toolchain management for the protoc launcher.
//!
//! ## Module Structure
//!
//! - [`platform`] - OS and architecture to release token mapping
//! - [`paths`] - Install root, plugin directory and download URL resolution
//! - [`download`] - HTTP retrieval of release archives
//! - [`archive`] - ZIP extraction and executable permissions
//! - [`cache`] - Version-keyed cache of extracted releases
//! - [`plugins`] - Plugin lookup and installation

pub mod archive;
pub mod cache;
pub mod download;
pub mod paths;
pub mod platform;
pub mod plugins;

pub use cache::ProtocCache;
pub use download::HttpFetcher;
pub use paths::LauncherPaths;
pub use platform::Host;
pub use plugins::{GoInstaller, PluginProvisioner, PluginSpec};
