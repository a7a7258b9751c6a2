use anyhow::{Context, Result};
use clap::Parser;
use libc::{SIGINT, SIGTERM};
use log::{error, info, warn, LevelFilter};
use nix::sys::signal::{self, Signal};
use nix::unistd::{geteuid, Pid};
use std::env;
use std::ffi::OsString;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempmount::modules::constants::DEFAULT_PREFIX;
use tempmount::TempMount;

/// Exported to the command so scripts can find the mount.
const PATH_ENV: &str = "TEMPMOUNT_PATH";
const FALLBACK_SHELL: &str = "/bin/sh";
const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Exit status when interrupted before the command started (128 + SIGINT).
const INTERRUPTED_EXIT: i32 = 128 + SIGINT;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Mount through a loop device (for disk images)
    #[arg(short = 'l', long = "loop")]
    loop_mount: bool,

    /// Name prefix of the temporary directory
    #[arg(long, default_value = DEFAULT_PREFIX)]
    prefix: String,

    /// Create the temporary directory here instead of the system temp dir
    #[arg(long)]
    parent: Option<PathBuf>,

    /// Print the mount details as JSON before running the command
    #[arg(long)]
    json: bool,

    /// Device or image file to mount
    device: PathBuf,

    /// Command to run inside the mount (defaults to $SHELL)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<OsString>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger based on verbose flag
    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new().filter_level(log_level).init();

    if !geteuid().is_root() {
        warn!("Not running as root, mounting will probably fail");
    }

    // Keep running on SIGINT/SIGTERM so the mount is always released
    let interrupted = Arc::new(AtomicBool::new(false));
    for sig in [SIGINT, SIGTERM] {
        signal_hook::flag::register(sig, Arc::clone(&interrupted))?;
    }

    let mut mount = TempMount::new(&cli.device)?
        .loop_mount(cli.loop_mount)
        .prefix(cli.prefix.clone());
    if let Some(parent) = &cli.parent {
        mount = mount.parent_dir(parent);
    }

    let guard = mount.acquire()?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(guard.session())?);
    }

    let status = match run_command(&cli.command, guard.path(), &interrupted) {
        Ok(Some(status)) => status,
        Ok(None) => {
            info!("Interrupted before the command started, releasing mount");
            guard.release()?;
            std::process::exit(INTERRUPTED_EXIT);
        }
        Err(e) => {
            if let Err(release_err) = guard.release() {
                error!("{}", release_err);
            }
            return Err(e);
        }
    };

    guard.release()?;

    let code = exit_code(status);
    if code != 0 {
        info!("Command exited with {}", code);
    }
    std::process::exit(code);
}

/// Runs the command inside the mount. Returns `None` without starting it if
/// a signal already arrived.
fn run_command(
    command: &[OsString],
    cwd: &Path,
    interrupted: &AtomicBool,
) -> Result<Option<ExitStatus>> {
    if interrupted.load(Ordering::SeqCst) {
        return Ok(None);
    }

    let (program, args) = match command.split_first() {
        Some((program, args)) => (program.clone(), args),
        None => (default_shell(), &[][..]),
    };

    info!("Running {:?} in {}", program, cwd.display());
    let mut child = Command::new(&program)
        .args(args)
        .current_dir(cwd)
        .env(PATH_ENV, cwd)
        .spawn()
        .with_context(|| format!("failed to run {:?}", program))?;

    let mut forwarded = false;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if !forwarded && interrupted.load(Ordering::SeqCst) {
            info!("Received signal, stopping {:?}...", program);
            signal::kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM)?;
            forwarded = true;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn default_shell() -> OsString {
    env::var_os("SHELL")
        .filter(|shell| !shell.is_empty())
        .unwrap_or_else(|| OsString::from(FALLBACK_SHELL))
}

/// Shell convention: 128 + signal number for a killed child.
fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(sig)) => 128 + sig,
        (None, None) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_loop_mount_with_command() {
        let cli = Cli::try_parse_from([
            "tmpmnt", "--loop", "--json", "disk.img", "ls", "-la",
        ])
        .unwrap();

        assert!(cli.loop_mount);
        assert!(cli.json);
        assert_eq!(cli.device, PathBuf::from("disk.img"));
        assert_eq!(cli.command, vec![OsString::from("ls"), OsString::from("-la")]);
        assert_eq!(cli.prefix, DEFAULT_PREFIX);
        assert!(cli.parent.is_none());
    }

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["tmpmnt", "/dev/sdb1"]).unwrap();

        assert!(!cli.loop_mount);
        assert!(!cli.verbose);
        assert!(cli.command.is_empty());
    }

    #[test]
    fn test_device_is_required() {
        assert!(Cli::try_parse_from(["tmpmnt"]).is_err());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(ExitStatus::from_raw(0)), 0);
        assert_eq!(exit_code(ExitStatus::from_raw(3 << 8)), 3);
        assert_eq!(exit_code(ExitStatus::from_raw(SIGTERM)), 128 + SIGTERM);
    }

    #[test]
    fn test_command_runs_in_directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let interrupted = AtomicBool::new(false);
        let script = format!(
            "touch marker && test \"$TEMPMOUNT_PATH\" = '{}' && exit 4",
            dir.path().display()
        );
        let command = vec![OsString::from("sh"), OsString::from("-c"), OsString::from(script)];

        let status = run_command(&command, dir.path(), &interrupted)?.unwrap();
        assert_eq!(exit_code(status), 4);
        assert!(dir.path().join("marker").exists());
        Ok(())
    }

    #[test]
    fn test_signal_during_mount_skips_command() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let interrupted = AtomicBool::new(true);
        let command = vec![OsString::from("touch"), OsString::from("marker")];

        assert!(run_command(&command, dir.path(), &interrupted)?.is_none());
        assert!(!dir.path().join("marker").exists());
        assert_eq!(INTERRUPTED_EXIT, 130);
        Ok(())
    }
}
