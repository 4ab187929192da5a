// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Filesystem side of deployment.
//!
//! Copy configuration files into service manager directories, and activate
//! nginx sites through the available/enabled symlink convention.

use mkdirp::mkdirp;
use std::{
    fs,
    os::unix::fs::symlink,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Outcome of site activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// New link created at the enabled path.
    Created,

    /// Something already occupied the enabled path, and was left alone.
    Kept,
}

/// Check for a regular file, following symlinks.
pub fn is_regular_file(path: impl AsRef<Path>) -> bool {
    path.as_ref().is_file()
}

/// Copy file into destination, overwriting whatever is there.
///
/// Creates the destination's parent directory if missing.
///
/// # Errors
///
/// - Return [`Error::CreateDir`] if the parent directory cannot be created.
/// - Return [`Error::Copy`] if the copy fails.
pub fn install_file(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<u64> {
    let (from, to) = (from.as_ref(), to.as_ref());
    ensure_parent(to)?;

    let bytes = fs::copy(from, to).map_err(|err| Error::Copy {
        source: err,
        from: from.to_path_buf(),
        to: to.to_path_buf(),
    })?;
    debug!("copied {bytes} bytes from {:?} to {:?}", from.display(), to.display());

    Ok(bytes)
}

/// Link target into place unless the link path is already occupied.
///
/// Any existing entry counts as occupied: a regular file, a link to anywhere,
/// or a dangling link. Occupied paths are never inspected or replaced.
///
/// # Errors
///
/// - Return [`Error::CreateDir`] if the parent directory cannot be created.
/// - Return [`Error::Symlink`] if the link cannot be created.
pub fn link_if_absent(target: impl AsRef<Path>, link: impl AsRef<Path>) -> Result<LinkOutcome> {
    let (target, link) = (target.as_ref(), link.as_ref());

    // INVARIANT: Never follow the link here, dangling links still occupy the path.
    if fs::symlink_metadata(link).is_ok() {
        debug!("{:?} already present", link.display());
        return Ok(LinkOutcome::Kept);
    }

    ensure_parent(link)?;
    symlink(target, link).map_err(|err| Error::Symlink {
        source: err,
        target: target.to_path_buf(),
        link: link.to_path_buf(),
    })?;
    debug!("linked {:?} -> {:?}", link.display(), target.display());

    Ok(LinkOutcome::Created)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        if let Some(created) = mkdirp(parent).map_err(|err| Error::CreateDir {
            source: err,
            path: parent.to_path_buf(),
        })? {
            debug!("created directory {:?}", created.display());
        }
    }

    Ok(())
}

/// Filesystem deployment error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Destination directory cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File cannot be copied into place.
    #[error("failed to copy {:?} to {:?}", from.display(), to.display())]
    Copy {
        #[source]
        source: std::io::Error,
        from: PathBuf,
        to: PathBuf,
    },

    /// Symbolic link cannot be created.
    #[error("failed to link {:?} to {:?}", link.display(), target.display())]
    Symlink {
        #[source]
        source: std::io::Error,
        target: PathBuf,
        link: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
