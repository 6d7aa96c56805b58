// SPDX-License-Identifier: Apache-2.0

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use crate::{ErrorKind, EucanetdError};

pub const EUCANETD_LOCK_PORT: u16 = 63822;

/// Process wide lock held as an exclusive bind on a loopback UDP port.
///
/// The lock is released when dropped.
#[derive(Debug)]
pub struct SingletonLock {
    socket: UdpSocket,
}

impl SingletonLock {
    pub fn acquire() -> Result<Self, EucanetdError> {
        Self::acquire_on(SocketAddr::V4(SocketAddrV4::new(
            Ipv4Addr::LOCALHOST,
            EUCANETD_LOCK_PORT,
        )))
    }

    pub fn acquire_on(addr: SocketAddr) -> Result<Self, EucanetdError> {
        match UdpSocket::bind(addr) {
            Ok(socket) => {
                log::debug!("Acquired eucanetd lock on {addr}");
                Ok(Self { socket })
            }
            Err(e) => Err(EucanetdError::new(
                ErrorKind::AlreadyRunning,
                format!(
                    "another eucanetd might be running: failed to bind \
                     {addr}: {e}"
                ),
            )),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, EucanetdError> {
        Ok(self.socket.local_addr()?)
    }
}
