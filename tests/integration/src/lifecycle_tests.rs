//! Lifecycle Tests
//!
//! Registration, the shutdown gate, the stop signal, and revocation.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use comserver::{
    hresult, ActivationDispatcher, ActivationRequest, ClassObject, Clsid, GateState, Iid,
    InProcessRegistry, LifecycleState, RegistrationMode, SecurityParams, ServerConfig,
    ServerError, ServerLifecycleController, ShutdownOutcome,
};
use time_server::{time_service_dispatcher, ITIME_SERVICE_IID, TIME_SERVICE_CLSID};

use integration_tests::*;

fn echo_dispatcher() -> Arc<ActivationDispatcher> {
    let clsid = Clsid::generate();
    let iid = Iid::generate();
    let alive = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    Arc::new(ActivationDispatcher::from_fn(clsid, iid, move |_| {
        EchoObject::new(iid, alive.clone())
    }))
}

/// Test: LockServer(true) then LockServer(false) from zero opens the gate
#[test]
fn test_lock_unlock_releases_gate() {
    init_logging();
    let dispatcher = echo_dispatcher();
    let tracker = dispatcher.tracker().clone();
    assert_eq!(tracker.gate_state(), GateState::Blocked);

    let waiter = {
        let tracker = tracker.clone();
        thread::spawn(move || tracker.await_zero())
    };

    dispatcher.lock_server(true);
    assert_eq!(tracker.count(), 1);
    dispatcher.lock_server(false);
    assert_eq!(tracker.count(), 0);

    waiter.join().unwrap();
    assert_eq!(tracker.gate_state(), GateState::Released);
}

/// Test: two objects, released one at a time
#[test]
fn test_two_objects_release_in_turn() {
    init_logging();
    let dispatcher = echo_dispatcher();
    let contract = dispatcher.contract();

    let (first, second) = thread::scope(|s| {
        let a = s.spawn(|| dispatcher.create_instance(None, &contract).unwrap());
        let b = s.spawn(|| dispatcher.create_instance(None, &contract).unwrap());
        (a.join().unwrap(), b.join().unwrap())
    });
    assert_eq!(dispatcher.tracker().count(), 2);

    drop(first);
    assert_eq!(dispatcher.tracker().count(), 1);
    assert!(!dispatcher.tracker().await_zero_timeout(Duration::from_millis(20)));

    drop(second);
    assert_eq!(dispatcher.tracker().count(), 0);
    assert!(dispatcher.tracker().await_zero_timeout(Duration::from_millis(20)));
}

/// Test: a rejected registration stops the server before it serves
#[tokio::test]
async fn test_registration_failure() {
    init_logging();
    let registry = Arc::new(FaultyRegistry::new(true, false));
    let mut controller = ServerLifecycleController::new(
        registry.clone(),
        echo_dispatcher(),
        ServerConfig::default(),
    );

    let err = controller.start().unwrap_err();
    assert!(matches!(err, ServerError::RegistrationFailed(_)));
    assert_eq!(controller.state(), LifecycleState::Unregistered);
    assert!(!controller.is_registered());

    // Serving is refused outright instead of waiting on the gate
    let err = controller.run_until_idle().await.unwrap_err();
    assert!(matches!(err, ServerError::InvalidState { .. }));
    assert_eq!(controller.tracker().gate_state(), GateState::Blocked);
    assert_eq!(registry.revoke_attempts.load(Ordering::SeqCst), 0);
}

/// Test: revocation failure is reported but not fatal
#[tokio::test]
async fn test_revocation_failure_not_fatal() {
    init_logging();
    let registry = Arc::new(FaultyRegistry::new(false, true));
    let dispatcher = echo_dispatcher();
    let contract = dispatcher.contract();
    let mut controller = ServerLifecycleController::new(
        registry.clone(),
        dispatcher.clone(),
        ServerConfig::builder().no_maintenance().build(),
    );
    controller.start().unwrap();

    drop(dispatcher.create_instance(None, &contract).unwrap());

    let outcome = controller.run_until_idle().await.unwrap();
    assert_eq!(outcome, ShutdownOutcome::Drained);
    assert_eq!(controller.state(), LifecycleState::Revoked);
    assert_eq!(registry.revoke_attempts.load(Ordering::SeqCst), 1);
}

/// Test: single-use server drains after its client lets go
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_single_use_end_to_end() {
    init_logging();
    let registry = Arc::new(InProcessRegistry::new());
    let mut server = ServerLifecycleController::new(
        registry.clone(),
        Arc::new(time_service_dispatcher()),
        ServerConfig::builder()
            .maintenance_interval(Duration::from_millis(10))
            .build(),
    );
    server.start().unwrap();
    assert_eq!(server.state(), LifecycleState::Registered);

    let client = {
        let registry = registry.clone();
        thread::spawn(move || {
            let object = registry
                .activate(&ActivationRequest::new(TIME_SERVICE_CLSID, ITIME_SERVICE_IID))
                .unwrap();
            thread::sleep(Duration::from_millis(50));
            // A second client is too late for a single-use registration
            let late = registry.activate(&ActivationRequest::new(TIME_SERVICE_CLSID, ITIME_SERVICE_IID));
            drop(object);
            late.is_err()
        })
    };

    let outcome = server.run_until_idle().await.unwrap();
    assert_eq!(outcome, ShutdownOutcome::Drained);
    assert!(client.join().unwrap());
    assert_eq!(server.state(), LifecycleState::Revoked);
    assert_eq!(server.dispatcher().activations(), 1);
    assert_eq!(registry.registrations(), 0);
}

/// Test: multi-use server outlives idle periods and stops on signal
#[tokio::test]
async fn test_multi_use_stops_on_signal() {
    init_logging();
    let mut server = TestServer::multi_use();

    for _ in 0..3 {
        drop(server.activate().unwrap());
    }
    assert_eq!(server.count(), 0);
    assert!(server.registry.is_registered(&server.clsid));

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = stop_tx.send(());
    });

    let outcome = server
        .controller
        .run_until(async move {
            let _ = stop_rx.await;
        })
        .await
        .unwrap();
    assert_eq!(outcome, ShutdownOutcome::Stopped);
    assert!(!server.registry.is_registered(&server.clsid));
    assert_eq!(server.registry.registrations(), 0);
}

/// Test: single-use server with no clients honors the stop signal
#[tokio::test]
async fn test_single_use_without_clients_stops_on_signal() {
    init_logging();
    let mut server = TestServer::start(ServerConfig::builder().no_maintenance().build());

    let outcome = server
        .controller
        .serve(tokio::time::sleep(Duration::from_millis(20)))
        .await
        .unwrap();
    assert_eq!(outcome, ShutdownOutcome::Stopped);
    assert!(!server.controller.tracker().has_engaged());
}

/// Test: single-use server with no clients gives up after the idle timeout
#[tokio::test(start_paused = true)]
async fn test_single_use_idle_timeout() {
    init_logging();
    let mut server = TestServer::start(
        ServerConfig::builder()
            .mode(RegistrationMode::SingleUse)
            .idle_timeout(Duration::from_secs(60))
            .build(),
    );

    let outcome = server.controller.run_until_idle().await.unwrap();
    assert_eq!(outcome, ShutdownOutcome::IdleTimeout);
    assert_eq!(server.controller.state(), LifecycleState::Revoked);
}

/// Test: lifecycle operations out of order are refused
#[tokio::test]
async fn test_out_of_order_operations() {
    init_logging();
    let mut server = TestServer::start(ServerConfig::builder().no_maintenance().build());

    drop(server.activate().unwrap());
    server.controller.run_until_idle().await.unwrap();

    assert!(matches!(
        server.controller.start().unwrap_err(),
        ServerError::InvalidState { actual: LifecycleState::Revoked, .. }
    ));
    assert!(matches!(
        server.controller.run_until_idle().await.unwrap_err(),
        ServerError::InvalidState { .. }
    ));
}

/// Test: a constructor panic does not leave the single-use server pinned
#[tokio::test]
async fn test_single_use_drains_after_constructor_panic() {
    init_logging();
    let clsid = Clsid::generate();
    let iid = Iid::generate();
    let dispatcher = Arc::new(ActivationDispatcher::from_fn(clsid, iid, |_| -> EchoObject {
        panic!("constructor failure")
    }));
    let registry = Arc::new(InProcessRegistry::new());
    let mut controller = ServerLifecycleController::new(
        registry.clone(),
        dispatcher,
        ServerConfig::builder().no_maintenance().build(),
    );
    controller.start().unwrap();

    let (code, object) = registry.activate_status(&ActivationRequest::new(clsid, iid));
    assert_eq!(code, hresult::E_UNEXPECTED);
    assert!(object.is_none());
    assert_eq!(controller.tracker().count(), 0);

    let outcome = controller.run_until_idle().await.unwrap();
    assert_eq!(outcome, ShutdownOutcome::Drained);
    assert_eq!(registry.registrations(), 0);
}

/// Test: the security block reaches a delegating registry before registration
#[test]
fn test_security_forwarded_by_custom_registry() {
    init_logging();
    let registry = Arc::new(FaultyRegistry::new(false, false));
    let params = SecurityParams::default().capabilities(comserver::capabilities::SECURE_REFS);
    let mut controller = ServerLifecycleController::new(
        registry.clone(),
        echo_dispatcher(),
        ServerConfig::builder().security(params.clone()).build(),
    );

    controller.start().unwrap();
    assert_eq!(registry.inner.security(), Some(params));
    assert_eq!(registry.inner.registrations(), 1);
}
