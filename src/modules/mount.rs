//! Scoped temporary mounts.
//!
//! A [`TempMount`] describes what to mount. Acquiring it creates a private
//! temporary directory and mounts the device there, producing a
//! [`MountGuard`]. Releasing the guard, explicitly or by dropping it, unmounts
//! the device and removes the directory, in that order.
//!
//! Unmount failures are logged and otherwise ignored so that they never hide
//! an error from the work done inside the mount. Failing to remove the
//! directory afterwards is reported.

use super::command::{MountCommand, SystemMount};
use super::constants::{DEFAULT_PREFIX, MOUNT_POINT_MODE};
use super::error::{Result, TempMountError};
use super::session::MountSession;
use log::{debug, error, info, warn};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Configuration for a temporary mount.
///
/// # Example
///
/// ```no_run
/// use tempmount::TempMount;
///
/// # fn main() -> anyhow::Result<()> {
/// let files = TempMount::new("disk.img")?
///     .loop_mount(true)
///     .scoped(|path| -> anyhow::Result<usize> {
///         Ok(std::fs::read_dir(path)?.count())
///     })?;
/// println!("{} entries", files);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TempMount<C: MountCommand = SystemMount> {
    device: PathBuf,
    loop_mount: bool,
    prefix: String,
    parent: Option<PathBuf>,
    command: C,
}

impl TempMount<SystemMount> {
    /// Creates a mount configuration for `device`.
    ///
    /// No I/O happens here.
    ///
    /// # Errors
    ///
    /// Returns [`TempMountError::InvalidArgument`] if `device` is empty.
    pub fn new(device: impl Into<PathBuf>) -> Result<Self> {
        let device = device.into();
        if device.as_os_str().is_empty() {
            return Err(TempMountError::InvalidArgument(
                "device path is empty".to_string(),
            ));
        }

        Ok(Self {
            device,
            loop_mount: false,
            prefix: DEFAULT_PREFIX.to_string(),
            parent: None,
            command: SystemMount::new(),
        })
    }
}

impl<C: MountCommand> TempMount<C> {
    /// Mount through a loop device, for disk images. Off by default.
    pub fn loop_mount(mut self, loop_mount: bool) -> Self {
        self.loop_mount = loop_mount;
        self
    }

    /// Name prefix for the temporary directory.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Create the temporary directory under `parent` instead of the system
    /// temporary directory.
    pub fn parent_dir(mut self, parent: impl Into<PathBuf>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Use `command` to mount and unmount instead of the system binaries.
    pub fn with_command<D: MountCommand>(self, command: D) -> TempMount<D> {
        TempMount {
            device: self.device,
            loop_mount: self.loop_mount,
            prefix: self.prefix,
            parent: self.parent,
            command,
        }
    }

    /// The device that will be mounted.
    pub fn device(&self) -> &Path {
        &self.device
    }

    /// Whether a loopback mount was requested.
    pub fn is_loop(&self) -> bool {
        self.loop_mount
    }

    /// Creates the temporary directory and mounts the device on it.
    ///
    /// If the mount fails the directory is removed again before the error is
    /// returned; nothing is unmounted since nothing was mounted.
    ///
    /// # Errors
    ///
    /// * [`TempMountError::InvalidArgument`] if the prefix contains a path separator
    /// * [`TempMountError::DirectoryCreationFailed`] if the directory cannot be created
    /// * [`TempMountError::MountFailed`] if the mount command fails
    /// * [`TempMountError::PathResolutionFailed`] if the mounted directory cannot be
    ///   canonicalized, in which case it is released first
    pub fn acquire(self) -> Result<MountGuard<C>> {
        let TempMount {
            device,
            loop_mount,
            prefix,
            parent,
            command,
        } = self;

        if prefix.contains(std::path::MAIN_SEPARATOR) || prefix.contains('\0') {
            return Err(TempMountError::InvalidArgument(format!(
                "invalid directory prefix: {:?}",
                prefix
            )));
        }

        let mount_point = create_mount_point(&prefix, parent.as_deref())?;
        debug!("Created mount point {}", mount_point.display());

        if let Err(source) = command.mount(&device, &mount_point, loop_mount) {
            discard_mount_point(&mount_point, "after failed mount");
            return Err(TempMountError::MountFailed {
                device,
                target: mount_point,
                source,
            });
        }

        info!(
            "Mounted {} on {}{}",
            device.display(),
            mount_point.display(),
            if loop_mount { " (loop)" } else { "" }
        );

        let session = MountSession::new(device, loop_mount, mount_point.clone(), mount_point);
        let mut guard = MountGuard {
            session,
            command,
            released: false,
        };

        match fs::canonicalize(&guard.session.mount_point) {
            Ok(resolved) => {
                guard.session.resolved_path = resolved;
                Ok(guard)
            }
            Err(source) => {
                let path = guard.session.mount_point.clone();
                if let Err(e) = guard.release() {
                    error!("{}", e);
                }
                Err(TempMountError::PathResolutionFailed { path, source })
            }
        }
    }

    /// Runs `f` with the device mounted, releasing the mount afterwards.
    ///
    /// `f` is given the resolved mount path. The mount is released on every
    /// way out of `f`, including panics. If `f` fails its error is returned
    /// as is; a release failure at that point is only logged. If `f`
    /// succeeds, a failure to remove the directory is returned instead of
    /// `f`'s value.
    ///
    /// # Errors
    ///
    /// Acquisition errors (in which case `f` never runs), `f`'s own error,
    /// or [`TempMountError::DirectoryRemovalFailed`].
    pub fn scoped<T, E, F>(self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Path) -> std::result::Result<T, E>,
        E: From<TempMountError>,
    {
        let guard = self.acquire()?;

        match f(guard.path()) {
            Ok(value) => {
                guard.release()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(release_err) = guard.release() {
                    error!("{}", release_err);
                }
                Err(err)
            }
        }
    }
}

fn create_mount_point(prefix: &str, parent: Option<&Path>) -> Result<PathBuf> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix);

    let dir = match parent {
        Some(parent) => builder.tempdir_in(parent),
        None => builder.tempdir(),
    }
    .map_err(TempMountError::DirectoryCreationFailed)?;

    // TempDir would remove the tree recursively on drop; a mounted filesystem
    // must never be emptied that way, so removal is done by hand.
    let path = dir.keep();

    if let Err(e) = fs::set_permissions(&path, fs::Permissions::from_mode(MOUNT_POINT_MODE)) {
        discard_mount_point(&path, "after failing to restrict its permissions");
        return Err(TempMountError::DirectoryCreationFailed(e));
    }
    Ok(path)
}

/// Removes a mount point that never got mounted, logging instead of failing.
fn discard_mount_point(path: &Path, context: &str) -> bool {
    match fs::remove_dir(path) {
        Ok(()) => true,
        Err(e) => {
            error!(
                "Failed to remove mount point {} {}: {}",
                path.display(),
                context,
                e
            );
            false
        }
    }
}

/// A mounted device on a temporary directory.
///
/// Dropping the guard releases the mount. Use [`MountGuard::release`] to
/// observe a failure to remove the directory.
#[derive(Debug)]
pub struct MountGuard<C: MountCommand = SystemMount> {
    session: MountSession,
    command: C,
    released: bool,
}

impl<C: MountCommand> MountGuard<C> {
    /// The resolved path of the mounted directory.
    pub fn path(&self) -> &Path {
        self.session.path()
    }

    /// The directory as created, before symlinks were resolved.
    pub fn mount_point(&self) -> &Path {
        &self.session.mount_point
    }

    /// Details of this mount.
    pub fn session(&self) -> &MountSession {
        &self.session
    }

    /// Unmounts the device and removes the directory.
    ///
    /// # Errors
    ///
    /// Returns [`TempMountError::DirectoryRemovalFailed`] if the directory could
    /// not be removed. Unmount failures are logged, never returned.
    pub fn release(mut self) -> Result<()> {
        self.release_mount()
    }

    fn release_mount(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let mount_point = &self.session.mount_point;
        debug!("Unmounting {}", mount_point.display());
        if let Err(e) = self.command.unmount(mount_point) {
            warn!("Failed to unmount {}: {}", mount_point.display(), e);
        }

        fs::remove_dir(mount_point).map_err(|source| TempMountError::DirectoryRemovalFailed {
            path: mount_point.clone(),
            source,
        })?;

        info!("Released mount point {}", mount_point.display());
        Ok(())
    }
}

impl<C: MountCommand> Drop for MountGuard<C> {
    fn drop(&mut self) {
        if let Err(e) = self.release_mount() {
            error!("Error releasing temporary mount: {}", e);
        }
    }
}
