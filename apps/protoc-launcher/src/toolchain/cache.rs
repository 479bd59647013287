//! Version-keyed cache of extracted protoc releases.
//!
//! Each release lives in its own directory under the install root, named after
//! the archive it came from, together with a small JSON record describing what
//! was installed. A directory only counts as installed when its record matches
//! the requested version and platform and the compiler binary is present.
//!
//! Installation goes through a staging directory inside the install root that
//! is renamed into place once extraction, permission fixing and the record
//! write all succeeded. A failed attempt therefore leaves nothing behind that a
//! later run could mistake for a usable install. Staging directories of runs
//! that were killed mid-install are swept when the next install starts.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::archive::{extract_zip, set_executable};
use super::download::{ArchiveFetcher, STATUS_OK};
use super::platform::{Host, Platform};
use crate::errors::LauncherError;

/// Record file written into every installed release directory.
const RECORD_FILE: &str = ".protoc-launcher.json";

/// Prefix of staging directories inside the install root.
const STAGING_PREFIX: &str = ".staging-";

/// Staging directories untouched for this long belong to interrupted runs.
const STALE_STAGING_AGE: Duration = Duration::from_secs(60 * 60);

/// A protoc release for one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDescriptor {
    pub version: String,
    pub platform: Platform,
}

impl ReleaseDescriptor {
    /// Creates a descriptor from a user-supplied version.
    ///
    /// A single leading `v` is accepted and dropped.
    ///
    /// # Errors
    ///
    /// Returns [`LauncherError::Usage`] if the version is empty or contains
    /// characters that are not valid in a release tag.
    pub fn new(version: &str, platform: Platform) -> Result<Self> {
        let version = version.strip_prefix('v').unwrap_or(version);
        let valid = !version.is_empty()
            && version
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+'));
        if !valid || version.starts_with('.') {
            return Err(LauncherError::usage(format!("invalid protoc version: {version:?}")).into());
        }
        Ok(Self {
            version: version.to_string(),
            platform,
        })
    }

    /// Release archive stem, e.g. `protoc-25.1-linux-x86_64`.
    #[must_use]
    pub fn stem(&self) -> String {
        format!("protoc-{}-{}", self.version, self.platform.token())
    }

    /// Release archive file name.
    #[must_use]
    pub fn archive_name(&self) -> String {
        format!("{}.zip", self.stem())
    }

    /// Download URL of the release archive below `base_url`.
    #[must_use]
    pub fn download_url(&self, base_url: &str) -> String {
        format!(
            "{}/v{}/{}",
            base_url.trim_end_matches('/'),
            self.version,
            self.archive_name()
        )
    }

    /// Path of the compiler binary relative to the extracted archive.
    #[must_use]
    pub fn executable_relative_path(&self) -> PathBuf {
        Path::new("bin").join(format!("protoc{}", self.platform.executable_extension()))
    }
}

/// Sidecar record identifying the release in an install directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub version: String,
    pub platform: String,
    pub archive: String,
    /// Unix timestamp (seconds) of the installation.
    pub installed_at: u64,
}

impl CacheRecord {
    fn for_release(release: &ReleaseDescriptor) -> Self {
        let installed_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        Self {
            version: release.version.clone(),
            platform: release.platform.token(),
            archive: release.archive_name(),
            installed_at,
        }
    }

    fn matches(&self, release: &ReleaseDescriptor) -> bool {
        self.version == release.version && self.platform == release.platform.token()
    }
}

/// Cache of protoc releases below an install root.
#[derive(Debug)]
pub struct ProtocCache<F> {
    root: PathBuf,
    download_url: String,
    host: Host,
    fetcher: F,
}

impl<F: ArchiveFetcher> ProtocCache<F> {
    #[must_use]
    pub fn new(root: PathBuf, download_url: impl Into<String>, host: Host, fetcher: F) -> Self {
        Self {
            root,
            download_url: download_url.into(),
            host,
            fetcher,
        }
    }

    /// Directory a release is installed into.
    #[must_use]
    pub fn install_dir(&self, release: &ReleaseDescriptor) -> PathBuf {
        self.root.join(release.stem())
    }

    /// Returns whether `release` is fully installed.
    #[must_use]
    pub fn is_installed(&self, release: &ReleaseDescriptor) -> bool {
        let dir = self.install_dir(release);
        let Some(record) = read_record(&dir) else {
            return false;
        };
        record.matches(release) && dir.join(release.executable_relative_path()).is_file()
    }

    /// Ensures protoc `version` is installed and returns the compiler path.
    ///
    /// # Process
    ///
    /// 1. Resolve the host platform (before any network access)
    /// 2. Return the cached binary if the release is installed
    /// 3. Download the release archive (HTTP 200 only)
    /// 4. Extract into a staging directory and mark the compiler executable
    /// 5. Write the cache record and move the staging directory into place
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The version is malformed or the platform unsupported
    /// - The download fails or answers with a status other than 200
    /// - The archive cannot be extracted
    /// - The archive has no compiler binary at `bin/protoc`
    pub async fn ensure(&self, version: &str) -> Result<PathBuf> {
        let platform = Platform::resolve(&self.host)?;
        let release = ReleaseDescriptor::new(version, platform)?;
        let install_dir = self.install_dir(&release);
        let executable = install_dir.join(release.executable_relative_path());

        if self.is_installed(&release) {
            debug!("protoc {} found at {}", release.version, executable.display());
            return Ok(executable);
        }

        let url = release.download_url(&self.download_url);
        info!("Downloading protoc {} for {platform} from {url}", release.version);
        let response = self.fetcher.get(&url).await?;
        if response.status != STATUS_OK {
            return Err(LauncherError::download_status(url, response.status).into());
        }

        std::fs::create_dir_all(&self.root).map_err(|e| {
            LauncherError::io_error(
                format!("failed to create cache directory: {}", self.root.display()),
                e,
            )
        })?;
        self.remove_stale_staging();
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.root)
            .map_err(|e| {
                LauncherError::io_error(
                    format!("failed to create staging directory in {}", self.root.display()),
                    e,
                )
            })?;

        let files = extract_zip(&response.body, staging.path())?;
        debug!("Extracted {files} files from {}", release.archive_name());
        set_executable(&staging.path().join(release.executable_relative_path()))?;
        write_record(staging.path(), &CacheRecord::for_release(&release))?;

        if install_dir.exists() {
            std::fs::remove_dir_all(&install_dir).map_err(|e| {
                LauncherError::io_error(
                    format!("failed to remove stale install: {}", install_dir.display()),
                    e,
                )
            })?;
        }
        std::fs::rename(staging.path(), &install_dir).map_err(|e| {
            LauncherError::io_error(
                format!(
                    "failed to move {} to {}",
                    staging.path().display(),
                    install_dir.display()
                ),
                e,
            )
        })?;

        info!("Installed protoc {} to {}", release.version, install_dir.display());
        Ok(executable)
    }
}

impl<F> ProtocCache<F> {
    /// Removes staging directories left behind by interrupted installs.
    ///
    /// Only directories older than [`STALE_STAGING_AGE`] are removed so an
    /// install running in parallel keeps its staging directory. Failures are
    /// logged and otherwise ignored.
    fn remove_stale_staging(&self) {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return;
        };
        let now = SystemTime::now();
        for entry in entries.filter_map(std::result::Result::ok) {
            if !entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
                continue;
            }
            let stale = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age >= STALE_STAGING_AGE);
            if !stale {
                continue;
            }
            let path = entry.path();
            debug!("Removing stale staging directory {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!("Failed to remove {}: {e}", path.display());
            }
        }
    }
}

fn read_record(dir: &Path) -> Option<CacheRecord> {
    let content = std::fs::read_to_string(dir.join(RECORD_FILE)).ok()?;
    serde_json::from_str(&content).ok()
}

fn write_record(dir: &Path, record: &CacheRecord) -> Result<()> {
    let path = dir.join(RECORD_FILE);
    let content = serde_json::to_string_pretty(record).context("Failed to serialize cache record")?;
    std::fs::write(&path, content)
        .map_err(|e| LauncherError::io_error(format!("failed to write {}", path.display()), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::download::FetchedArchive;
    use crate::toolchain::paths::DEFAULT_DOWNLOAD_URL;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::io::{Cursor, Write};

    /// Fetcher replaying canned responses and recording requested URLs.
    #[derive(Default)]
    struct ReplayFetcher {
        responses: RefCell<VecDeque<FetchedArchive>>,
        urls: RefCell<Vec<String>>,
        calls: Cell<usize>,
    }

    impl ReplayFetcher {
        fn with(responses: Vec<FetchedArchive>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                ..Self::default()
            }
        }
    }

    impl ArchiveFetcher for ReplayFetcher {
        async fn get(&self, url: &str) -> Result<FetchedArchive> {
            self.calls.set(self.calls.get() + 1);
            self.urls.borrow_mut().push(url.to_string());
            Ok(self
                .responses
                .borrow_mut()
                .pop_front()
                .expect("unexpected request"))
        }
    }

    fn ok(body: Vec<u8>) -> FetchedArchive {
        FetchedArchive { status: 200, body }
    }

    fn not_found() -> FetchedArchive {
        FetchedArchive {
            status: 404,
            body: Vec::new(),
        }
    }

    fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in entries {
            zip.start_file(*name, options).expect("Should start file");
            zip.write_all(data).expect("Should write");
        }
        zip.finish().expect("Should finish").into_inner()
    }

    fn protoc_zip() -> Vec<u8> {
        zip_with(&[("bin/protoc", b"#!/bin/sh\necho protoc\n")])
    }

    fn linux() -> Host {
        Host::new("linux", "x86_64")
    }

    fn cache(root: &Path, host: Host, fetcher: ReplayFetcher) -> ProtocCache<ReplayFetcher> {
        ProtocCache::new(root.to_path_buf(), "https://releases.test/download", host, fetcher)
    }

    fn entries(dir: &Path) -> Vec<String> {
        match std::fs::read_dir(dir) {
            Ok(read) => read
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    #[test]
    fn descriptor_builds_release_url() {
        let platform = Platform::resolve(&linux()).unwrap();
        let release = ReleaseDescriptor::new("25.1", platform).unwrap();
        assert_eq!(
            release.download_url(DEFAULT_DOWNLOAD_URL),
            "https://github.com/protocolbuffers/protobuf/releases/download/v25.1/protoc-25.1-linux-x86_64.zip"
        );
        assert_eq!(
            release.download_url("http://mirror.local/"),
            "http://mirror.local/v25.1/protoc-25.1-linux-x86_64.zip"
        );
    }

    #[test]
    fn descriptor_strips_leading_v() {
        let platform = Platform::resolve(&Host::new("windows", "x86")).unwrap();
        let release = ReleaseDescriptor::new("v3.20.3", platform).unwrap();
        assert_eq!(release.version, "3.20.3");
        assert_eq!(release.archive_name(), "protoc-3.20.3-win32.zip");
        assert_eq!(
            release.executable_relative_path(),
            Path::new("bin").join("protoc.exe")
        );
    }

    #[test]
    fn descriptor_rejects_path_like_versions() {
        let platform = Platform::resolve(&linux()).unwrap();
        for bad in ["", "v", "../25.1", "25.1/..", "25 1", ".."] {
            let err = ReleaseDescriptor::new(bad, platform).unwrap_err();
            assert!(
                matches!(
                    err.downcast_ref::<LauncherError>(),
                    Some(LauncherError::Usage { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
        assert!(ReleaseDescriptor::new("26.0-rc1", platform).is_ok());
    }

    #[tokio::test]
    async fn cache_hit_makes_no_request() {
        let temp = tempfile::tempdir().unwrap();
        let first = cache(temp.path(), linux(), ReplayFetcher::with(vec![ok(protoc_zip())]));
        let installed = first.ensure("25.1").await.expect("install should succeed");

        let second = cache(temp.path(), linux(), ReplayFetcher::default());
        let found = second.ensure("25.1").await.expect("cache hit");

        assert_eq!(found, installed);
        assert_eq!(second.fetcher.calls.get(), 0);
    }

    #[tokio::test]
    async fn miss_downloads_extracts_and_marks_executable() {
        let temp = tempfile::tempdir().unwrap();
        let cache = cache(temp.path(), linux(), ReplayFetcher::with(vec![ok(protoc_zip())]));

        let path = cache.ensure("25.1").await.expect("install should succeed");

        assert_eq!(
            path,
            temp.path()
                .join("protoc-25.1-linux-x86_64")
                .join("bin")
                .join("protoc")
        );
        assert_eq!(
            std::fs::read(&path).unwrap(),
            b"#!/bin/sh\necho protoc\n".to_vec()
        );
        assert_eq!(
            cache.fetcher.urls.borrow().as_slice(),
            ["https://releases.test/download/v25.1/protoc-25.1-linux-x86_64.zip"]
        );
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
        let record = read_record(&temp.path().join("protoc-25.1-linux-x86_64")).unwrap();
        assert_eq!(record.version, "25.1");
        assert_eq!(record.platform, "linux-x86_64");
        assert_eq!(record.archive, "protoc-25.1-linux-x86_64.zip");
    }

    #[tokio::test]
    async fn different_version_is_downloaded_not_reused() {
        let temp = tempfile::tempdir().unwrap();
        let cache = cache(
            temp.path(),
            linux(),
            ReplayFetcher::with(vec![ok(protoc_zip()), ok(protoc_zip())]),
        );

        let old = cache.ensure("24.0").await.unwrap();
        let new = cache.ensure("25.1").await.unwrap();

        assert_ne!(old, new);
        assert_eq!(cache.fetcher.calls.get(), 2);
        assert!(old.is_file());
        assert!(new.is_file());
    }

    #[tokio::test]
    async fn binary_without_record_is_reinstalled() {
        let temp = tempfile::tempdir().unwrap();
        let stale = temp.path().join("protoc-25.1-linux-x86_64").join("bin");
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("protoc"), b"partial").unwrap();
        let cache = cache(temp.path(), linux(), ReplayFetcher::with(vec![ok(protoc_zip())]));

        let path = cache.ensure("25.1").await.unwrap();

        assert_eq!(cache.fetcher.calls.get(), 1);
        assert_eq!(
            std::fs::read(path).unwrap(),
            b"#!/bin/sh\necho protoc\n".to_vec()
        );
    }

    #[tokio::test]
    async fn not_found_leaves_root_untouched_and_retry_succeeds() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("protoc-cache");
        let cache = cache(
            &root,
            linux(),
            ReplayFetcher::with(vec![not_found(), ok(protoc_zip())]),
        );

        let err = cache.ensure("25.1").await.unwrap_err();
        match err.downcast_ref::<LauncherError>() {
            Some(LauncherError::Download { url, message, .. }) => {
                assert!(url.ends_with("/v25.1/protoc-25.1-linux-x86_64.zip"));
                assert_eq!(message, "HTTP 404");
            }
            other => panic!("expected download error, got {other:?}"),
        }
        assert!(!root.exists());

        let path = cache.ensure("25.1").await.expect("retry should succeed");
        assert!(path.is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stale_staging_directories_are_removed_on_install() {
        let temp = tempfile::tempdir().unwrap();
        let stale = temp.path().join(".staging-interrupted");
        let fresh = temp.path().join(".staging-running");
        std::fs::create_dir_all(stale.join("bin")).unwrap();
        std::fs::write(stale.join("bin").join("protoc"), b"partial").unwrap();
        std::fs::create_dir_all(&fresh).unwrap();
        let two_hours_ago = SystemTime::now() - Duration::from_secs(2 * 60 * 60);
        std::fs::File::open(&stale)
            .unwrap()
            .set_modified(two_hours_ago)
            .unwrap();
        let cache = cache(temp.path(), linux(), ReplayFetcher::with(vec![ok(protoc_zip())]));

        cache.ensure("25.1").await.expect("install should succeed");

        assert!(!stale.exists());
        assert!(fresh.is_dir());
    }

    #[tokio::test]
    async fn unsupported_platform_fails_before_network() {
        let temp = tempfile::tempdir().unwrap();
        let cache = cache(
            temp.path(),
            Host::new("windows", "aarch64"),
            ReplayFetcher::default(),
        );

        let err = cache.ensure("25.1").await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<LauncherError>(),
            Some(LauncherError::UnsupportedPlatform { .. })
        ));
        assert_eq!(cache.fetcher.calls.get(), 0);
    }

    #[tokio::test]
    async fn archive_without_protoc_surfaces_permission_error() {
        let temp = tempfile::tempdir().unwrap();
        let body = zip_with(&[("include/google/protobuf/any.proto", b"syntax")]);
        let cache = cache(temp.path(), linux(), ReplayFetcher::with(vec![ok(body)]));

        let err = cache.ensure("25.1").await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<LauncherError>(),
            Some(LauncherError::Permission { .. })
        ));
        assert!(entries(temp.path()).is_empty(), "staging must be cleaned up");
    }

    #[tokio::test]
    async fn corrupt_archive_is_an_extraction_error() {
        let temp = tempfile::tempdir().unwrap();
        let cache = cache(
            temp.path(),
            linux(),
            ReplayFetcher::with(vec![ok(b"<html>rate limited</html>".to_vec())]),
        );

        let err = cache.ensure("25.1").await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<LauncherError>(),
            Some(LauncherError::Extraction { .. })
        ));
        assert!(!cache.is_installed(
            &ReleaseDescriptor::new("25.1", Platform::resolve(&linux()).unwrap()).unwrap()
        ));
    }
}
