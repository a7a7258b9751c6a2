//! Fixed names and defaults used when mounting.

// External binaries
/// Program invoked to attach a device to the mount point.
pub const MOUNT_BIN: &str = "mount";
/// Program invoked to detach the device again.
pub const UMOUNT_BIN: &str = "umount";
/// Option passed with `-o` for loopback mounts.
pub const LOOP_OPTION: &str = "loop";

// Temporary directory
/// Name prefix of the allocated mount point.
pub const DEFAULT_PREFIX: &str = "tempmount.";
/// Mode of the mount point while it exists (owner only).
pub const MOUNT_POINT_MODE: u32 = 0o700;
