//! Error types for tempmount.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while acquiring or releasing a temporary mount.
///
/// Unmount failures are deliberately absent: they are logged during release
/// and never returned.
#[derive(Debug, Error)]
pub enum TempMountError {
    /// The mount was configured with an unusable value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The temporary mount point could not be created.
    #[error("failed to create temporary mount point: {0}")]
    DirectoryCreationFailed(#[source] std::io::Error),

    /// The mount command did not succeed.
    #[error("failed to mount {} on {}: {source}", .device.display(), .target.display())]
    MountFailed {
        /// Device that was being mounted.
        device: PathBuf,
        /// Directory it was being mounted on.
        target: PathBuf,
        /// Why the mount command failed.
        #[source]
        source: CommandError,
    },

    /// The mount point could not be canonicalized after mounting.
    #[error("failed to resolve mount point {}: {source}", .path.display())]
    PathResolutionFailed {
        /// The unresolved mount point.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The mount point could not be removed after unmounting.
    #[error("failed to remove mount point {}: {source}", .path.display())]
    DirectoryRemovalFailed {
        /// The directory left behind.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Failure of an external mount or unmount invocation.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program could not be started at all.
    #[error("could not run {program}: {source}")]
    Spawn {
        /// Program name.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully.
    #[error("{program} exited with {}: {}", describe_status(.status), .stderr.trim())]
    Exit {
        /// Program name.
        program: String,
        /// Exit code, `None` when terminated by a signal.
        status: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },
}

impl CommandError {
    /// Exit code of the failed program, if it exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CommandError::Exit { status, .. } => *status,
            CommandError::Spawn { .. } => None,
        }
    }
}

fn describe_status(status: &Option<i32>) -> String {
    match *status {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// Result type for tempmount operations.
pub type Result<T> = std::result::Result<T, TempMountError>;
