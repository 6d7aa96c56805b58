// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use signal_hook::consts::{SIGHUP, SIGTERM, SIGUSR1, SIGUSR2};

use crate::{ErrorKind, EucanetdError};

/// Signals forwarded to the network driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverSignal {
    Usr1,
    Usr2,
}

impl std::fmt::Display for DriverSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usr1 => write!(f, "SIGUSR1"),
            Self::Usr2 => write!(f, "SIGUSR2"),
        }
    }
}

/// Level triggered flags raised by signal delivery.
///
/// Signal handlers only store `true`, the control loop samples and clears
/// them at stage boundaries. The terminate flag is never cleared.
#[derive(Debug, Clone, Default)]
pub struct SignalFlags {
    term: Arc<AtomicBool>,
    reload: Arc<AtomicBool>,
    usr1: Arc<AtomicBool>,
    usr2: Arc<AtomicBool>,
}

impl SignalFlags {
    /// Register TERM, HUP, USR1 and USR2 handlers for this process.
    pub fn install() -> Result<Self, EucanetdError> {
        let flags = Self::default();
        for (signal, flag) in [
            (SIGTERM, &flags.term),
            (SIGHUP, &flags.reload),
            (SIGUSR1, &flags.usr1),
            (SIGUSR2, &flags.usr2),
        ] {
            signal_hook::flag::register(signal, Arc::clone(flag)).map_err(
                |e| {
                    EucanetdError::new(
                        ErrorKind::DaemonFailure,
                        format!("Failed to install handler for signal {signal}: {e}"),
                    )
                },
            )?;
        }
        Ok(flags)
    }

    pub fn term(&self) -> bool {
        self.term.load(Ordering::SeqCst)
    }

    pub fn raise_term(&self) {
        self.term.store(true, Ordering::SeqCst);
    }

    pub fn raise_reload(&self) {
        self.reload.store(true, Ordering::SeqCst);
    }

    pub fn raise(&self, signal: DriverSignal) {
        match signal {
            DriverSignal::Usr1 => self.usr1.store(true, Ordering::SeqCst),
            DriverSignal::Usr2 => self.usr2.store(true, Ordering::SeqCst),
        }
    }

    /// Read and clear the reload flag
    pub fn take_reload(&self) -> bool {
        self.reload.swap(false, Ordering::SeqCst)
    }

    /// Read and clear the USR1/USR2 flag
    pub fn take(&self, signal: DriverSignal) -> bool {
        match signal {
            DriverSignal::Usr1 => self.usr1.swap(false, Ordering::SeqCst),
            DriverSignal::Usr2 => self.usr2.swap(false, Ordering::SeqCst),
        }
    }
}
