//! The record of a single temporary mount.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Information about an acquired temporary mount.
///
/// A session only exists once acquisition has completed, so every field is
/// always populated. It is handed out by [`crate::MountGuard::session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountSession {
    /// Device or image file that was mounted
    pub device: PathBuf,
    /// Whether the device was mounted through a loop device
    pub loop_mount: bool,
    /// Temporary directory the device is mounted on
    pub mount_point: PathBuf,
    /// `mount_point` with symlinks resolved
    pub resolved_path: PathBuf,
}

impl MountSession {
    pub(crate) fn new(
        device: PathBuf,
        loop_mount: bool,
        mount_point: PathBuf,
        resolved_path: PathBuf,
    ) -> Self {
        Self {
            device,
            loop_mount,
            mount_point,
            resolved_path,
        }
    }

    /// The path callers should work in.
    pub fn path(&self) -> &Path {
        &self.resolved_path
    }
}
