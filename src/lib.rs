#![doc(html_root_url = "https://docs.rs/tempmount/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! tempmount: mount a device on a temporary directory for the length of a scope
//!
//! Mounting a device somewhere temporary takes two steps (create a directory,
//! mount onto it) and undoing it takes two more (unmount, remove the
//! directory). Getting the undo wrong leaves devices mounted and temporary
//! directories behind, and for loopback mounts it leaks entries from a small
//! pool of loop devices.
//!
//! ## Features
//!
//! - Private (`0700`), uniquely named mount points
//! - Loopback mounts for disk images
//! - Release on every exit path: success, error, early return and panic
//! - Errors from the caller's work are never replaced by cleanup errors
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tempmount::TempMount;
//!
//! # fn main() -> anyhow::Result<()> {
//! TempMount::new("/dev/sdb1")?.scoped(|path| -> anyhow::Result<()> {
//!     println!("mounted at {}", path.display());
//!     Ok(())
//! })?;
//!
//! // Or keep the guard around and release it explicitly
//! let guard = TempMount::new("rootfs.img")?.loop_mount(true).acquire()?;
//! std::fs::copy(guard.path().join("etc/hostname"), "hostname")?;
//! guard.release()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Release order
//!
//! - The device is unmounted first. A failing unmount is logged, not returned.
//! - The directory is removed next, never recursively. A failing removal is
//!   returned as [`TempMountError::DirectoryRemovalFailed`].

pub mod modules;

pub use modules::command::{MountCommand, SystemMount};
pub use modules::error::{CommandError, TempMountError};
pub use modules::mount::{MountGuard, TempMount};
pub use modules::session::MountSession;
