//! Archive extraction for protoc releases.
//!
//! Release archives are unpacked verbatim: entry `bin/protoc` lands at
//! `<dest>/bin/protoc`. Unlike general purpose unpackers no common root folder
//! is stripped, since protoc archives have none.

use std::io::Cursor;
use std::path::Path;

use anyhow::Result;

use crate::errors::LauncherError;

/// Extracts an in-memory ZIP archive into `dest_dir`.
///
/// Entries are written in archive order. Directory entries are created (with
/// parents), file entries are created or truncated and filled with their
/// decompressed contents.
///
/// Returns the number of file entries written.
///
/// # Errors
///
/// Returns [`LauncherError::Extraction`] if the bytes are not a valid ZIP
/// archive, an entry would escape `dest_dir`, or a filesystem write fails.
pub fn extract_zip(bytes: &[u8], dest_dir: &Path) -> Result<usize> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| LauncherError::extraction("failed to read ZIP archive", e))?;

    std::fs::create_dir_all(dest_dir).map_err(|e| {
        LauncherError::extraction(
            format!("failed to create directory: {}", dest_dir.display()),
            e,
        )
    })?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| LauncherError::extraction(format!("failed to read entry {i}"), e))?;

        let Some(entry_path) = entry.enclosed_name() else {
            return Err(LauncherError::extraction(
                format!("refusing to extract entry {i}"),
                format!("path escapes the destination: {}", entry.name()),
            )
            .into());
        };

        let output_path = dest_dir.join(&entry_path);

        if entry.is_dir() {
            std::fs::create_dir_all(&output_path).map_err(|e| {
                LauncherError::extraction(
                    format!("failed to create directory: {}", output_path.display()),
                    e,
                )
            })?;
            continue;
        }

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LauncherError::extraction(
                    format!("failed to create directory: {}", parent.display()),
                    e,
                )
            })?;
        }

        let mut outfile = std::fs::File::create(&output_path).map_err(|e| {
            LauncherError::extraction(
                format!("failed to create file: {}", output_path.display()),
                e,
            )
        })?;

        std::io::copy(&mut entry, &mut outfile).map_err(|e| {
            LauncherError::extraction(format!("failed to extract: {}", output_path.display()), e)
        })?;
        written += 1;
    }

    Ok(written)
}

/// Marks a file as executable (`rwxr-xr-x`).
///
/// # Errors
///
/// Returns [`LauncherError::Permission`] if the file does not exist or its
/// permissions cannot be changed.
#[cfg(unix)]
pub fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)
        .map_err(|e| LauncherError::permission(path, e))?
        .permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).map_err(|e| LauncherError::permission(path, e))?;
    Ok(())
}

/// Checks that the file exists; Windows has no executable bit.
///
/// # Errors
///
/// Returns [`LauncherError::Permission`] if the file does not exist.
#[cfg(not(unix))]
pub fn set_executable(path: &Path) -> Result<()> {
    std::fs::metadata(path).map_err(|e| LauncherError::permission(path, e))?;
    Ok(())
}
