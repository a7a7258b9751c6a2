//! Invocation of the operating system's mount and unmount facilities.
//!
//! [`MountCommand`] is the seam between the scoped mount logic and the
//! system. [`SystemMount`] shells out to `mount(8)` and `umount(8)`, which is
//! also what sets up loop devices for `-o loop`.

use super::constants::{LOOP_OPTION, MOUNT_BIN, UMOUNT_BIN};
use super::error::CommandError;
use log::debug;
use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Stdio};

/// Mounts and unmounts a device on a directory.
pub trait MountCommand {
    /// Attach `device` to `target`, as a loopback mount when `loop_mount` is set.
    ///
    /// Blocks until the operation finishes.
    fn mount(&self, device: &Path, target: &Path, loop_mount: bool) -> Result<(), CommandError>;

    /// Detach whatever is mounted on `target`.
    fn unmount(&self, target: &Path) -> Result<(), CommandError>;
}

impl<C: MountCommand + ?Sized> MountCommand for Box<C> {
    fn mount(&self, device: &Path, target: &Path, loop_mount: bool) -> Result<(), CommandError> {
        (**self).mount(device, target, loop_mount)
    }

    fn unmount(&self, target: &Path) -> Result<(), CommandError> {
        (**self).unmount(target)
    }
}

/// [`MountCommand`] backed by the system `mount` and `umount` binaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMount;

impl SystemMount {
    /// Creates the system-backed mount command.
    pub fn new() -> Self {
        Self
    }
}

impl MountCommand for SystemMount {
    fn mount(&self, device: &Path, target: &Path, loop_mount: bool) -> Result<(), CommandError> {
        run(MOUNT_BIN, mount_args(device, target, loop_mount))
    }

    fn unmount(&self, target: &Path) -> Result<(), CommandError> {
        run(UMOUNT_BIN, vec![target.as_os_str().to_os_string()])
    }
}

/// Arguments passed to `mount` for the given device and target.
pub fn mount_args(device: &Path, target: &Path, loop_mount: bool) -> Vec<OsString> {
    let mut args = Vec::with_capacity(4);
    if loop_mount {
        args.push(OsString::from("-o"));
        args.push(OsString::from(LOOP_OPTION));
    }
    args.push(device.as_os_str().to_os_string());
    args.push(target.as_os_str().to_os_string());
    args
}

fn run(program: &str, args: Vec<OsString>) -> Result<(), CommandError> {
    debug!("Running {} {:?}", program, args);

    let output = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if output.status.success() {
        Ok(())
    } else {
        Err(CommandError::Exit {
            program: program.to_string(),
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
