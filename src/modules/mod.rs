//! Core tempmount modules.
//!
//! - `command`: Invocation of the system mount and unmount programs
//! - `constants`: Program names and default values
//! - `error`: Error types
//! - `mount`: Scoped acquisition and release of a temporary mount
//! - `session`: Details of an acquired mount

pub mod command;
pub mod constants;
pub mod error;
pub mod mount;
pub mod session;
