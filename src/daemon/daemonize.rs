// SPDX-License-Identifier: Apache-2.0

use std::os::fd::RawFd;

use eucanetd::{write_file, ErrorKind, EucanetdConfig, EucanetdError};
use nix::fcntl::OFlag;
use nix::sys::stat::Mode;
use nix::unistd::{ForkResult, User};

/// Detach from the terminal when `background`, switch to the service user
/// and record our PID. Must run before any thread is spawned.
pub(crate) fn daemonize(
    config: &EucanetdConfig,
    background: bool,
) -> Result<(), EucanetdError> {
    if background {
        // SAFETY: no other thread exists yet.
        match unsafe { nix::unistd::fork() } {
            Ok(ForkResult::Parent { .. }) => std::process::exit(0),
            Ok(ForkResult::Child) => (),
            Err(e) => {
                return Err(EucanetdError::new(
                    ErrorKind::DaemonFailure,
                    format!("Failed to fork: {e}"),
                ));
            }
        }
        nix::unistd::setsid().map_err(|e| {
            EucanetdError::new(
                ErrorKind::DaemonFailure,
                format!("Could not establish a new session id: {e}"),
            )
        })?;
    }

    switch_user(&config.euca_user)?;

    let log_dir = config.paths.log_dir();
    if !log_dir.is_dir() {
        return Err(EucanetdError::new(
            ErrorKind::DaemonFailure,
            format!(
                "Cannot locate eucalyptus installation {}: make sure \
                 EUCALYPTUS env is set",
                log_dir.display()
            ),
        ));
    }

    let pid_file = config.paths.pid_file();
    write_file(
        &pid_file,
        format!("{}\n", nix::unistd::getpid()).as_bytes(),
        0o644,
    )
    .map_err(|e| {
        EucanetdError::new(
            ErrorKind::DaemonFailure,
            format!("Could not write PID file {}: {e}", pid_file.display()),
        )
    })?;

    if background {
        close_stdio()?;
    }
    Ok(())
}

fn switch_user(name: &str) -> Result<(), EucanetdError> {
    let user = match User::from_name(name) {
        Ok(Some(u)) => u,
        Ok(None) => {
            return Err(EucanetdError::new(
                ErrorKind::DaemonFailure,
                format!("Could not find UID of configured user '{name}'"),
            ));
        }
        Err(e) => {
            return Err(EucanetdError::new(
                ErrorKind::DaemonFailure,
                format!("Failed to look up user '{name}': {e}"),
            ));
        }
    };
    nix::unistd::setgid(user.gid)
        .and_then(|_| nix::unistd::setuid(user.uid))
        .map_err(|e| {
            EucanetdError::new(
                ErrorKind::PermissionDeny,
                format!(
                    "Could not switch daemon process to UID/GID {}/{}: {e}",
                    user.uid, user.gid
                ),
            )
        })
}

/// Point stdin, stdout and stderr at /dev/null.
fn close_stdio() -> Result<(), EucanetdError> {
    let null_fd: RawFd =
        nix::fcntl::open("/dev/null", OFlag::O_RDWR, Mode::empty()).map_err(
            |e| {
                EucanetdError::new(
                    ErrorKind::DaemonFailure,
                    format!("Failed to open /dev/null: {e}"),
                )
            },
        )?;
    for fd in [0, 1, 2] {
        nix::unistd::dup2(null_fd, fd).map_err(|e| {
            EucanetdError::new(
                ErrorKind::DaemonFailure,
                format!("Failed to redirect fd {fd}: {e}"),
            )
        })?;
    }
    if null_fd > 2 {
        nix::unistd::close(null_fd).ok();
    }
    Ok(())
}
