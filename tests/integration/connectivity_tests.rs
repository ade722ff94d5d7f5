//! Integration tests for the connectivity manager: link recovery, broker
//! session lifecycle, inbound routing and maintenance telemetry.

use std::cell::Cell;
use std::rc::Rc;

use embedded_hal::digital::PinState;

use lockhub::app::ports::ReconnectStatus;
use lockhub::gpio::PinRole;
use lockhub::network::manager::{HANDSHAKE_TIMEOUT_MS, INBOUND_GRACE_MS, RETRY_DELAY_MS};
use lockhub::network::{ConnectionState, RestartReason};

use crate::mocks::{self, FixedManifest, MockBroker, MockTransport, Rig};

// ── Session setup ─────────────────────────────────────────────

#[test]
fn first_connect_announces_device_and_syncs() {
    let mut rig = Rig::new(&[], 0);
    let (mut manager, clock) = mocks::manager(
        mocks::settings(&mocks::config()),
        MockTransport::up(),
        MockBroker::accepting(),
    );

    clock.set(0);
    assert!(rig.step(&mut manager));
    assert_eq!(manager.state(), ConnectionState::ConnectedAndSynchronized);

    let broker = manager.broker();
    assert_eq!(broker.connects, 1);
    assert_eq!(broker.last_client_id, "lockhub-test");
    assert_eq!(broker.last_username, None);
    assert_eq!(broker.last_will_topic, mocks::topic("/maintenance/mqttConnectionState"));

    assert_eq!(broker.payloads(&mocks::topic("/maintenance/networkDevice")), vec!["Mock"]);
    assert_eq!(broker.payloads(&mocks::topic("/maintenance/reset")), vec!["0"]);
    assert_eq!(
        broker.payloads(&mocks::topic("/maintenance/mqttConnectionState")),
        vec!["online"]
    );
    assert_eq!(broker.payloads(&mocks::topic("/info/ip")), vec!["192.168.1.40"]);
    assert_eq!(
        broker.payloads(&mocks::topic("/maintenance/restartReason")),
        vec!["NotApplicable"]
    );
    assert_eq!(
        broker.payloads(&mocks::topic("/maintenance/restartReasonEsp")),
        vec!["Software reset"]
    );
    assert!(broker.subscriptions.contains(&mocks::topic("/maintenance/reset")));
}

#[test]
fn reconnect_does_not_repeat_first_connect_topics() {
    let mut rig = Rig::new(&[], 0);
    let (mut manager, clock) = mocks::manager(
        mocks::settings(&mocks::config()),
        MockTransport::up(),
        MockBroker::accepting(),
    );

    clock.set(0);
    rig.step(&mut manager);
    manager.broker_mut().session = false;
    clock.set(1_000);
    assert!(rig.step(&mut manager));

    let broker = manager.broker();
    assert_eq!(broker.connects, 2);
    assert_eq!(broker.payloads(&mocks::topic("/maintenance/reset")).len(), 1);
    assert_eq!(broker.payloads(&mocks::topic("/maintenance/networkDevice")).len(), 1);
    assert_eq!(
        broker.payloads(&mocks::topic("/maintenance/mqttConnectionState")),
        vec!["online", "online"]
    );
    // Subscriptions are replayed on every session.
    let resets = broker
        .subscriptions
        .iter()
        .filter(|t| **t == mocks::topic("/maintenance/reset"))
        .count();
    assert_eq!(resets, 2);
}

#[test]
fn credentials_are_sent_when_configured() {
    let mut cfg = mocks::config();
    cfg.broker_user = "gate".try_into().unwrap();
    cfg.broker_password = "secret".try_into().unwrap();
    let mut rig = Rig::new(&[], 0);
    let (mut manager, _clock) =
        mocks::manager(mocks::settings(&cfg), MockTransport::up(), MockBroker::accepting());

    rig.step(&mut manager);
    assert_eq!(manager.broker().last_username.as_deref(), Some("gate"));
}

#[test]
fn empty_broker_host_never_connects() {
    let mut cfg = mocks::config();
    cfg.broker_host.clear();
    let mut rig = Rig::new(&[], 0);
    let (mut manager, clock) =
        mocks::manager(mocks::settings(&cfg), MockTransport::up(), MockBroker::accepting());

    for t in [0, 5_000, 10_000] {
        clock.set(t);
        assert!(!rig.step(&mut manager));
    }
    assert_eq!(manager.broker().connects, 0);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[test]
fn handshake_timeout_abandons_attempt_and_backs_off() {
    let mut rig = Rig::new(&[], 0);
    let (mut manager, clock) = mocks::manager(
        mocks::settings(&mocks::config()),
        MockTransport::up(),
        MockBroker::silent(),
    );

    clock.set(0);
    assert!(!rig.step(&mut manager));

    assert!(clock_now(&clock) >= HANDSHAKE_TIMEOUT_MS);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(manager.broker().disconnects, 1);
    assert_eq!(manager.next_retry_ms(), clock_now(&clock) + RETRY_DELAY_MS);
    assert!(rig.keep_alives > 0, "watchdog fed while waiting");
    assert!(manager.transport().updates > 1, "transport serviced while waiting");

    // Retry is not attempted before the back-off elapses.
    clock.advance(RETRY_DELAY_MS - 1);
    rig.step(&mut manager);
    assert_eq!(manager.broker().connects, 1);
}

fn clock_now(clock: &mocks::ManualClock) -> u64 {
    use lockhub::app::ports::Clock;
    clock.now_ms()
}

// ── Link recovery ─────────────────────────────────────────────

#[test]
fn failed_reconnect_schedules_retry_in_the_future() {
    let mut rig = Rig::new(&[], 0);
    let (mut manager, clock) = mocks::manager(
        mocks::settings(&mocks::config()),
        MockTransport::down(&[ReconnectStatus::Failure, ReconnectStatus::Success]),
        MockBroker::accepting(),
    );

    clock.set(1_000);
    rig.step(&mut manager);
    assert_eq!(manager.transport().reconnect_attempts, 1);
    assert_eq!(manager.next_retry_ms(), 1_000 + RETRY_DELAY_MS);

    clock.set(3_000);
    rig.step(&mut manager);
    assert_eq!(manager.transport().reconnect_attempts, 1);

    clock.set(1_000 + RETRY_DELAY_MS);
    rig.step(&mut manager);
    assert_eq!(manager.transport().reconnect_attempts, 2);
    assert!(manager.transport().connected);

    clock.advance(10);
    assert!(rig.step(&mut manager));
}

#[test]
fn critical_failure_requests_fallback_restart_once() {
    let mut rig = Rig::new(&[], 0);
    let (mut manager, clock) = mocks::manager(
        mocks::settings(&mocks::config()),
        MockTransport::down(&[ReconnectStatus::CriticalFailure]),
        MockBroker::accepting(),
    );

    clock.set(0);
    rig.step(&mut manager);
    assert_eq!(rig.system.fallback, Some(true));
    assert_eq!(rig.system.restarts, vec![RestartReason::NetworkDeviceCriticalFailure]);
    assert!(manager.restart_pending());

    clock.set(20_000);
    rig.step(&mut manager);
    assert_eq!(manager.transport().reconnect_attempts, 1);
    assert_eq!(rig.system.restarts.len(), 1);
}

#[test]
fn restart_on_disconnect_waits_for_uptime_grace() {
    let mut cfg = mocks::config();
    cfg.restart_on_disconnect = true;
    let mut rig = Rig::new(&[], 0);
    let (mut manager, clock) =
        mocks::manager(mocks::settings(&cfg), MockTransport::down(&[]), MockBroker::accepting());

    clock.set(30_000);
    rig.step(&mut manager);
    assert!(rig.system.restarts.is_empty());

    clock.set(61_000);
    rig.step(&mut manager);
    assert_eq!(rig.system.restarts, vec![RestartReason::RestartOnDisconnectWatchdog]);
}

#[test]
fn network_timeout_restarts_after_configured_outage() {
    let mut cfg = mocks::config();
    cfg.network_timeout_secs = 120;
    let mut rig = Rig::new(&[], 0);
    let (mut manager, clock) =
        mocks::manager(mocks::settings(&cfg), MockTransport::down(&[]), MockBroker::accepting());

    clock.set(100_000);
    rig.step(&mut manager);
    assert!(rig.system.restarts.is_empty());

    clock.set(121_000);
    rig.step(&mut manager);
    assert_eq!(rig.system.restarts, vec![RestartReason::NetworkTimeoutWatchdog]);
}

#[test]
fn status_outputs_follow_link_and_session() {
    let mut rig = Rig::new(
        &[
            (25, PinRole::OutputHighNetworkConnected),
            (26, PinRole::OutputHighBrokerConnected),
        ],
        0,
    );
    let (mut manager, clock) = mocks::manager(
        mocks::settings(&mocks::config()),
        MockTransport::down(&[]),
        MockBroker::accepting(),
    );

    clock.set(0);
    rig.step(&mut manager);
    assert_eq!(rig.gpio.last_write(25), Some(PinState::Low));
    assert_eq!(rig.gpio.last_write(26), Some(PinState::Low));

    manager.transport_mut().connected = true;
    clock.set(6_000);
    rig.step(&mut manager);
    assert_eq!(rig.gpio.last_write(25), Some(PinState::High));
    assert_eq!(rig.gpio.last_write(26), Some(PinState::High));
}

// ── Inbound routing ───────────────────────────────────────────

#[test]
fn inbound_messages_inside_grace_are_dropped() {
    let mut rig = Rig::new(&[], 0);
    let (mut manager, clock) = mocks::manager(
        mocks::settings(&mocks::config()),
        MockTransport::up(),
        MockBroker::accepting(),
    );
    let reset = mocks::topic("/maintenance/reset");

    clock.set(0);
    rig.step(&mut manager);

    manager.broker_mut().deliver(&reset, "1");
    clock.set(INBOUND_GRACE_MS - 1);
    rig.step(&mut manager);
    assert!(rig.system.restarts.is_empty());
    assert!(!manager.restart_pending());

    manager.broker_mut().deliver(&reset, "1");
    clock.set(INBOUND_GRACE_MS + 500);
    rig.step(&mut manager);
    assert_eq!(rig.system.restarts, vec![RestartReason::RequestedViaBroker]);
    assert_eq!(rig.system.fallback, Some(false));
}

#[test]
fn reset_topic_ignores_other_payloads() {
    let mut rig = Rig::new(&[], 0);
    let (mut manager, clock) = mocks::manager(
        mocks::settings(&mocks::config()),
        MockTransport::up(),
        MockBroker::accepting(),
    );

    clock.set(0);
    rig.step(&mut manager);
    manager.broker_mut().deliver(&mocks::topic("/maintenance/reset"), "0");
    clock.set(5_000);
    rig.step(&mut manager);
    assert!(rig.system.restarts.is_empty());
}

#[test]
fn output_command_drives_the_pin() {
    let mut rig = Rig::new(&[(16, PinRole::GeneralOutput), (17, PinRole::GeneralInputPullUp)], 0);
    let (mut manager, clock) = mocks::manager(
        mocks::settings(&mocks::config()),
        MockTransport::up(),
        MockBroker::accepting(),
    );
    let out_topic = mocks::topic("/gpio/pin_16/state");

    clock.set(0);
    rig.step(&mut manager);
    assert!(manager.broker().subscriptions.contains(&out_topic));
    assert_eq!(manager.broker().payloads(&out_topic), vec!["0"]);
    assert_eq!(
        manager.broker().payloads(&mocks::topic("/gpio/pin_16/role")),
        vec!["output"]
    );
    assert_eq!(
        manager.broker().payloads(&mocks::topic("/gpio/pin_17/role")),
        vec!["input"]
    );

    manager.broker_mut().deliver(&out_topic, "1");
    clock.set(3_000);
    rig.step(&mut manager);
    assert_eq!(rig.gpio.last_write(16), Some(PinState::High));

    manager.broker_mut().deliver(&out_topic, "anything");
    clock.set(3_100);
    rig.step(&mut manager);
    assert_eq!(rig.gpio.last_write(16), Some(PinState::Low));

    // Commands for input pins are not acted on.
    let writes = rig.gpio.writes.len();
    manager.broker_mut().deliver(&mocks::topic("/gpio/pin_17/state"), "1");
    clock.set(3_200);
    rig.step(&mut manager);
    assert_eq!(rig.gpio.writes.len(), writes);
}

#[test]
fn registered_receiver_gets_its_topic() {
    struct Capture(Rc<Cell<u32>>);
    impl lockhub::app::ports::BrokerReceiver for Capture {
        fn on_message(&mut self, _topic: &str, payload: &[u8]) {
            if payload == b"go" {
                self.0.set(self.0.get() + 1);
            }
        }
    }

    let mut rig = Rig::new(&[], 0);
    let (mut manager, clock) = mocks::manager(
        mocks::settings(&mocks::config()),
        MockTransport::up(),
        MockBroker::accepting(),
    );
    let hits = Rc::new(Cell::new(0));
    manager.register_receiver("/lock/action", Box::new(Capture(hits.clone())));

    clock.set(0);
    rig.step(&mut manager);
    assert!(manager.broker().subscriptions.contains(&mocks::topic("/lock/action")));

    manager.broker_mut().deliver(&mocks::topic("/lock/action"), "go");
    manager.broker_mut().deliver(&mocks::topic("/lock/other"), "go");
    clock.set(5_000);
    rig.step(&mut manager);
    assert_eq!(hits.get(), 1);
}

// ── Maintenance ───────────────────────────────────────────────

#[test]
fn failed_maintenance_keeps_session_unsynchronized() {
    let mut rig = Rig::new(&[], 0);
    let mut broker = MockBroker::accepting();
    broker.fail_publishes = true;
    let (mut manager, clock) =
        mocks::manager(mocks::settings(&mocks::config()), MockTransport::up(), broker);

    clock.set(0);
    assert!(rig.step(&mut manager));
    assert_eq!(manager.state(), ConnectionState::Connected);

    manager.broker_mut().fail_publishes = false;
    clock.set(100);
    rig.step(&mut manager);
    assert_eq!(manager.state(), ConnectionState::ConnectedAndSynchronized);
}

#[test]
fn uptime_is_published_in_whole_minutes() {
    let mut rig = Rig::new(&[], 0);
    let (mut manager, clock) = mocks::manager(
        mocks::settings(&mocks::config()),
        MockTransport::up(),
        MockBroker::accepting(),
    );
    let uptime = mocks::topic("/maintenance/uptime");

    clock.set(0);
    rig.step(&mut manager);
    clock.set(31_000);
    rig.step(&mut manager);
    assert_eq!(manager.broker().payloads(&uptime), vec!["0"], "same minute");

    clock.set(62_000);
    rig.step(&mut manager);
    assert_eq!(manager.broker().payloads(&uptime), vec!["0", "1"]);
}

#[test]
fn signal_strength_is_published_when_it_changes() {
    let mut rig = Rig::new(&[], 0);
    let mut transport = MockTransport::up();
    transport.rssi = Some(-55);
    let (mut manager, clock) =
        mocks::manager(mocks::settings(&mocks::config()), transport, MockBroker::accepting());
    let rssi = mocks::topic("/maintenance/wifiRssi");

    clock.set(0);
    rig.step(&mut manager);
    clock.set(60_001);
    rig.step(&mut manager);
    assert_eq!(manager.broker().payloads(&rssi), vec!["-55"]);

    clock.set(120_002);
    rig.step(&mut manager);
    assert_eq!(manager.broker().payloads(&rssi).len(), 1, "unchanged value");

    manager.transport_mut().rssi = Some(-70);
    clock.set(180_003);
    rig.step(&mut manager);
    assert_eq!(manager.broker().payloads(&rssi), vec!["-55", "-70"]);
}

#[test]
fn debug_info_adds_free_heap() {
    let mut cfg = mocks::config();
    cfg.publish_debug_info = true;
    let mut rig = Rig::new(&[], 0);
    let (mut manager, clock) =
        mocks::manager(mocks::settings(&cfg), MockTransport::up(), MockBroker::accepting());

    clock.set(0);
    rig.step(&mut manager);
    assert_eq!(
        manager.broker().payloads(&mocks::topic("/maintenance/freeHeap")),
        vec!["123456"]
    );
}

#[test]
fn update_check_publishes_latest_version_daily() {
    let mut cfg = mocks::config();
    cfg.check_for_updates = true;
    let mut rig = Rig::new(&[], 0);
    let (mut manager, clock) =
        mocks::manager(mocks::settings(&cfg), MockTransport::up(), MockBroker::accepting());
    let fetches = Rc::new(Cell::new(0));
    manager.set_manifest_source(Box::new(FixedManifest {
        body: Some(
            r#"{"release":{"version":"99.0","fullversion":"99.0.1"},
                "beta":{"version":"99.1","fullversion":"99.1.0-beta"},
                "master":{"version":"99.1","fullversion":"99.1.0-master"}}"#
                .to_owned(),
        ),
        fetches: fetches.clone(),
    }));
    let latest = mocks::topic("/info/latestVersion");

    clock.set(0);
    rig.step(&mut manager);
    assert_eq!(manager.broker().payloads(&latest), vec!["99.0.1"]);

    clock.set(3_600_000);
    rig.step(&mut manager);
    assert_eq!(fetches.get(), 1);

    clock.set(86_400_001);
    rig.step(&mut manager);
    assert_eq!(fetches.get(), 2);
}

#[test]
fn update_check_skipped_when_disabled() {
    let mut rig = Rig::new(&[], 0);
    let (mut manager, clock) = mocks::manager(
        mocks::settings(&mocks::config()),
        MockTransport::up(),
        MockBroker::accepting(),
    );
    let fetches = Rc::new(Cell::new(0));
    manager.set_manifest_source(Box::new(FixedManifest {
        body: None,
        fetches: fetches.clone(),
    }));

    clock.set(0);
    rig.step(&mut manager);
    assert_eq!(fetches.get(), 0);
}

// ── Back-off law ──────────────────────────────────────────────

proptest::proptest! {
    /// Whatever the polling cadence, link attempts are never closer than
    /// the retry delay and the next retry always lies in the future.
    #[test]
    fn reconnect_attempts_respect_retry_delay(
        gaps in proptest::collection::vec(1u64..4_000, 1..60),
    ) {
        let mut rig = Rig::new(&[], 0);
        let (mut manager, clock) = mocks::manager(
            mocks::settings(&mocks::config()),
            MockTransport::down(&[]),
            MockBroker::accepting(),
        );

        let mut now = 0;
        let mut last_attempt: Option<u64> = None;
        for gap in gaps {
            now += gap;
            clock.set(now);
            let before = manager.transport().reconnect_attempts;
            rig.step(&mut manager);
            if manager.transport().reconnect_attempts > before {
                if let Some(prev) = last_attempt {
                    proptest::prop_assert!(now - prev >= RETRY_DELAY_MS);
                }
                last_attempt = Some(now);
                proptest::prop_assert_eq!(manager.next_retry_ms(), now + RETRY_DELAY_MS);
            }
            proptest::prop_assert!(manager.next_retry_ms() > now);
        }
    }
}
