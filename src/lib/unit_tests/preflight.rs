// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use super::mock::{
    gni_xml, DriverCall, MockDriver, MockProbe, TestEnv, CC_IP, CLC_IP, NODE_IP,
};
use crate::{
    run_preflight, ErrorKind, FlushMode, NetworkMode, PeerRole,
    PreflightOutcome, SignalFlags,
};

fn raise_term_after(signals: &SignalFlags, secs: u64) {
    let signals = signals.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(secs)).await;
        signals.raise_term();
    });
}

#[tokio::test(start_paused = true)]
async fn test_preflight_on_node_controller() {
    let env = TestEnv::new("v1", "EDGE");
    let driver = MockDriver::without_upgrade();
    let mut ctx = env.context();

    let outcome = run_preflight(&mut ctx, |mode, _| {
        assert_eq!(mode, NetworkMode::Edge);
        Ok(driver.clone())
    })
    .await
    .unwrap();

    assert!(matches!(outcome, PreflightOutcome::Ready(_)));
    assert_eq!(ctx.peer, PeerRole::NodeController);
    assert_eq!(ctx.config.network_mode, NetworkMode::Edge);
    assert_eq!(ctx.config.polling_frequency(), 3);
    assert_eq!(ctx.config.restart.bridge_dev, "br0");
    assert!(ctx.lni.is_some());
    assert_eq!(
        driver.calls(),
        vec![DriverCall::Init(PeerRole::NodeController)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_preflight_on_cluster_controller() {
    let mut env = TestEnv::new("v1", "MANAGED-NOVLAN");
    env.probe = MockProbe::with_ip(CC_IP);
    let mut ctx = env.context();

    let outcome = run_preflight(&mut ctx, |_, _| Ok(MockDriver::default()))
        .await
        .unwrap();

    assert!(matches!(outcome, PreflightOutcome::Ready(_)));
    assert_eq!(ctx.peer, PeerRole::ClusterController);
    assert_eq!(ctx.config.network_mode, NetworkMode::ManagedNoVlan);
}

#[tokio::test(start_paused = true)]
async fn test_preflight_overlay_skips_local_view() {
    let env = TestEnv::new("v1", "VPCMIDO");
    let mut ctx = env.context();

    let outcome = run_preflight(&mut ctx, |_, _| Ok(MockDriver::default()))
        .await
        .unwrap();

    assert!(matches!(outcome, PreflightOutcome::Ready(_)));
    assert_eq!(ctx.peer, PeerRole::OutOfBand);
    assert!(ctx.lni.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_preflight_overlay_on_enabled_clc_waits() {
    let mut env = TestEnv::new("v1", "VPCMIDO");
    env.probe = MockProbe::with_ip(CLC_IP);
    let driver = MockDriver::default();
    let mut ctx = env.context();
    raise_term_after(&env.signals, 5);

    let outcome = run_preflight(&mut ctx, |_, _| Ok(driver.clone()))
        .await
        .unwrap();

    assert!(matches!(outcome, PreflightOutcome::Terminated));
    assert!(driver.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_preflight_non_cluster_host_waits() {
    let mut env = TestEnv::new("v1", "EDGE");
    env.probe = MockProbe::with_ip("10.99.0.1");
    let driver = MockDriver::default();
    let mut ctx = env.context();
    raise_term_after(&env.signals, 120);

    let outcome = run_preflight(&mut ctx, |_, _| Ok(driver.clone()))
        .await
        .unwrap();

    assert!(matches!(outcome, PreflightOutcome::Terminated));
    assert_eq!(ctx.peer, PeerRole::Invalid);
    assert!(driver.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_preflight_rereads_desired_state_until_peer_listed() {
    let env = TestEnv::new("v1", "EDGE");
    let source = env.gni_source();
    std::fs::write(
        &source,
        gni_xml("v1", "EDGE").replace(NODE_IP, "10.111.5.23"),
    )
    .unwrap();
    let mut ctx = env.context();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        std::fs::write(source, gni_xml("v2", "EDGE")).unwrap();
    });
    raise_term_after(&env.signals, 120);

    let outcome = run_preflight(&mut ctx, |_, _| Ok(MockDriver::default()))
        .await
        .unwrap();

    assert!(matches!(outcome, PreflightOutcome::Ready(_)));
    assert_eq!(ctx.peer, PeerRole::NodeController);
    assert_eq!(ctx.buffers.current().version, "v2");
    assert!(!env.signals.term());
}

#[tokio::test(start_paused = true)]
async fn test_preflight_invalid_mode_waits() {
    let env = TestEnv::new("v1", "SYSTEM");
    let mut ctx = env.context();
    raise_term_after(&env.signals, 40);

    let outcome = run_preflight(&mut ctx, |_, _| Ok(MockDriver::default()))
        .await
        .unwrap();

    assert!(matches!(outcome, PreflightOutcome::Terminated));
    assert_eq!(ctx.config.network_mode, NetworkMode::Invalid);
}

#[tokio::test(start_paused = true)]
async fn test_preflight_waits_for_desired_state() {
    let env = TestEnv::new("v1", "EDGE");
    std::fs::remove_file(env.gni_source()).unwrap();
    let mut ctx = env.context();
    let source = env.gni_source();
    let signals = env.signals.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        std::fs::write(source, super::mock::gni_xml("v1", "EDGE")).unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        signals.raise_term();
    });

    let outcome = run_preflight(&mut ctx, |_, _| Ok(MockDriver::default()))
        .await
        .unwrap();

    assert!(matches!(outcome, PreflightOutcome::Ready(_)));
    assert!(!env.signals.term());
}

#[tokio::test(start_paused = true)]
async fn test_preflight_falls_back_to_state_dir_source() {
    let env = TestEnv::new("v1", "EDGE");
    std::fs::remove_file(env.gni_source()).unwrap();
    let state_source = env
        .config
        .paths
        .state_dir()
        .join("global_network_info.xml");
    std::fs::write(&state_source, super::mock::gni_xml("v7", "EDGE")).unwrap();
    let mut ctx = env.context();

    run_preflight(&mut ctx, |_, _| Ok(MockDriver::default()))
        .await
        .unwrap();

    assert_eq!(ctx.gni_file().map(|f| f.source()), Some(state_source.as_path()));
    assert_eq!(ctx.buffers.current().version, "v7");
}

#[tokio::test(start_paused = true)]
async fn test_preflight_terminated_before_start() {
    let env = TestEnv::new("v1", "EDGE");
    env.signals.raise_term();
    let mut ctx = env.context();

    let outcome = run_preflight(&mut ctx, |_, _| Ok(MockDriver::default()))
        .await
        .unwrap();

    assert!(matches!(outcome, PreflightOutcome::Terminated));
}

#[tokio::test(start_paused = true)]
async fn test_preflight_failure_in_flush_mode_is_fatal() {
    let mut env = TestEnv::new("v1", "EDGE");
    env.probe = MockProbe::with_ip("10.99.0.1");
    env.config.flush_mode = FlushMode::Dynamic;
    let mut ctx = env.context();

    let result =
        run_preflight(&mut ctx, |_, _| Ok(MockDriver::default())).await;

    assert_eq!(result.unwrap_err().kind(), ErrorKind::TransientInput);
}

#[tokio::test(start_paused = true)]
async fn test_preflight_flush_mode_incompatible_with_overlay() {
    let mut env = TestEnv::new("v1", "VPCMIDO");
    env.config.flush_mode = FlushMode::All;
    let mut ctx = env.context();

    let result =
        run_preflight(&mut ctx, |_, _| Ok(MockDriver::default())).await;

    assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidArgument);
}

#[tokio::test(start_paused = true)]
async fn test_preflight_driver_init_failure_is_fatal() {
    let env = TestEnv::new("v1", "EDGE");
    let mut driver = MockDriver::default();
    driver.fail_init = true;
    let mut ctx = env.context();

    let result = run_preflight(&mut ctx, |_, _| Ok(driver)).await;

    assert_eq!(result.unwrap_err().kind(), ErrorKind::DriverFailure);
}

#[tokio::test(start_paused = true)]
async fn test_preflight_local_view_failure_is_fatal() {
    let mut env = TestEnv::new("v1", "EDGE");
    env.probe.fail_from_query = Some(1);
    let mut ctx = env.context();

    let result =
        run_preflight(&mut ctx, |_, _| Ok(MockDriver::default())).await;

    assert_eq!(result.unwrap_err().kind(), ErrorKind::DriverFailure);
}

#[tokio::test(start_paused = true)]
async fn test_preflight_driver_selection_failure_is_fatal() {
    let env = TestEnv::new("v1", "EDGE");
    let mut ctx = env.context();

    let result = run_preflight(&mut ctx, |mode, _| {
        Err::<MockDriver, _>(crate::EucanetdError::new(
            ErrorKind::InvalidNetworkMode,
            format!("no driver for {mode}"),
        ))
    })
    .await;

    assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidNetworkMode);
}
