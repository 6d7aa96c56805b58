// SPDX-License-Identifier: Apache-2.0

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use crate::{ErrorKind, SingletonLock};

#[test]
fn test_second_lock_fails() {
    let first = SingletonLock::acquire_on(SocketAddr::V4(SocketAddrV4::new(
        Ipv4Addr::LOCALHOST,
        0,
    )))
    .unwrap();
    let addr = first.local_addr().unwrap();

    let err = SingletonLock::acquire_on(addr).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AlreadyRunning);
    assert!(err.msg().contains("another eucanetd might be running"));
}

#[test]
fn test_lock_released_on_drop() {
    let first = SingletonLock::acquire_on(SocketAddr::V4(SocketAddrV4::new(
        Ipv4Addr::LOCALHOST,
        0,
    )))
    .unwrap();
    let addr = first.local_addr().unwrap();
    drop(first);

    assert!(SingletonLock::acquire_on(addr).is_ok());
}
