//! Integration tests for the GPIO pipeline: stored roles → dispatcher →
//! tick-context sampler → pending table → main-loop consumers.

use embedded_hal::digital::PinState;

use lockhub::app::ports::{GpioPort, PinMode, ReconnectStatus};
use lockhub::gpio::pending::COMMIT_WINDOW_MS;
use lockhub::gpio::{GpioAction, GpioDispatcher, PinConfiguration, PinRole};
use lockhub::pins::{self, NetworkHardware};

use crate::mocks::{
    self, MockBroker, MockGpio, MockStorage, MockTransport, RecordingHandler, Rig,
};

fn sample_n(
    sampler: &mut lockhub::gpio::PinSampler,
    level: PinState,
    n: usize,
    fired: &mut Vec<(GpioAction, u8)>,
) {
    for _ in 0..n {
        sampler.tick_with(|_| level, |action, pin| fired.push((action, pin)));
    }
}

// ── Role store → dispatcher ───────────────────────────────────

#[test]
fn stored_roles_are_applied_to_the_pins() {
    let mut storage = MockStorage::default();
    let mut config = PinConfiguration::new();
    config.set(5, PinRole::InputLock);
    config.set(16, PinRole::GeneralOutput);
    config.set(17, PinRole::GeneralInputPullDown);
    config.save(&mut storage, NetworkHardware::Wifi).unwrap();

    let loaded = PinConfiguration::load(&storage, NetworkHardware::Wifi);
    assert_eq!(loaded, config);

    let mut gpio = MockGpio::default();
    let mut dispatcher = GpioDispatcher::new(NetworkHardware::Wifi);
    let inputs = dispatcher.configure(&loaded, &mut gpio);

    assert_eq!(inputs, 2);
    assert_eq!(gpio.modes.get(&5), Some(&PinMode::InputPullUp));
    assert_eq!(gpio.modes.get(&16), Some(&PinMode::Output));
    assert_eq!(gpio.modes.get(&17), Some(&PinMode::InputPullDown));
    assert_eq!(gpio.last_write(16), Some(PinState::Low), "outputs start low");
}

#[test]
fn ethernet_pins_become_transport_owned() {
    let hardware = NetworkHardware::W5500;
    let mut config = PinConfiguration::new();
    config.set(pins::W5500_CS, PinRole::InputLock);
    config.set(13, PinRole::InputUnlock);

    let mut gpio = MockGpio::default();
    let mut dispatcher = GpioDispatcher::new(hardware);
    let inputs = dispatcher.configure(&config, &mut gpio);

    assert_eq!(inputs, 1);
    assert_eq!(dispatcher.role(pins::W5500_CS), PinRole::TransportOwned);
    assert!(!gpio.modes.contains_key(&pins::W5500_CS));
    assert_eq!(dispatcher.role(13), PinRole::InputUnlock);
}

#[test]
fn missing_blob_loads_empty_configuration() {
    let storage = MockStorage::default();
    assert!(PinConfiguration::load(&storage, NetworkHardware::Wifi).is_empty());
}

// ── Debounce ──────────────────────────────────────────────────

#[test]
fn held_press_fires_exactly_once() {
    let mut config = PinConfiguration::new();
    config.set(5, PinRole::InputLock);
    let mut gpio = MockGpio::default();
    let mut dispatcher = GpioDispatcher::new(NetworkHardware::Wifi);
    dispatcher.configure(&config, &mut gpio);

    let mut sampler = dispatcher.sampler();
    let mut fired = Vec::new();
    sample_n(&mut sampler, PinState::High, 8, &mut fired);
    sample_n(&mut sampler, PinState::Low, 8, &mut fired);
    sample_n(&mut sampler, PinState::Low, 20, &mut fired);

    assert_eq!(fired, vec![(GpioAction::Lock, 5)]);
}

#[test]
fn pulled_up_general_input_fires_on_eighth_low_sample() {
    let mut config = PinConfiguration::new();
    config.set(5, PinRole::GeneralInputPullUp);
    let mut gpio = MockGpio::default();
    let mut dispatcher = GpioDispatcher::new(NetworkHardware::Wifi);
    dispatcher.configure(&config, &mut gpio);

    let mut sampler = dispatcher.sampler();
    let mut fired = Vec::new();
    sample_n(&mut sampler, PinState::High, 8, &mut fired);
    assert!(fired.is_empty());

    sample_n(&mut sampler, PinState::Low, 7, &mut fired);
    assert!(fired.is_empty(), "seven low samples are not unanimous yet");

    sample_n(&mut sampler, PinState::Low, 1, &mut fired);
    assert_eq!(fired, vec![(GpioAction::GeneralInput, 5)]);
}

#[test]
fn lock_input_ignores_release() {
    let mut config = PinConfiguration::new();
    config.set(5, PinRole::InputUnlatch);
    let mut gpio = MockGpio::default();
    let mut dispatcher = GpioDispatcher::new(NetworkHardware::Wifi);
    dispatcher.configure(&config, &mut gpio);

    let mut sampler = dispatcher.sampler();
    let mut fired = Vec::new();
    sample_n(&mut sampler, PinState::Low, 8, &mut fired);
    sample_n(&mut sampler, PinState::High, 8, &mut fired);

    assert_eq!(fired, vec![(GpioAction::Unlatch, 5)]);
}

#[test]
fn general_input_reports_both_edges() {
    let mut config = PinConfiguration::new();
    config.set(17, PinRole::GeneralInputPullUp);
    let mut gpio = MockGpio::default();
    let mut dispatcher = GpioDispatcher::new(NetworkHardware::Wifi);
    dispatcher.configure(&config, &mut gpio);

    let mut sampler = dispatcher.sampler();
    let mut fired = Vec::new();
    sample_n(&mut sampler, PinState::Low, 8, &mut fired);
    sample_n(&mut sampler, PinState::High, 8, &mut fired);

    assert_eq!(
        fired,
        vec![(GpioAction::GeneralInput, 17), (GpioAction::GeneralInput, 17)]
    );
}

#[test]
fn bouncing_contact_never_fires() {
    let mut config = PinConfiguration::new();
    config.set(5, PinRole::InputLock);
    let mut gpio = MockGpio::default();
    let mut dispatcher = GpioDispatcher::new(NetworkHardware::Wifi);
    dispatcher.configure(&config, &mut gpio);

    let mut sampler = dispatcher.sampler();
    let mut fired = Vec::new();
    for i in 0..64 {
        let level = if i % 3 == 0 { PinState::High } else { PinState::Low };
        sample_n(&mut sampler, level, 1, &mut fired);
    }
    assert!(fired.is_empty());
}

#[test]
fn role_change_discards_history() {
    let mut config = PinConfiguration::new();
    config.set(5, PinRole::InputLock);
    let mut gpio = MockGpio::default();
    let mut dispatcher = GpioDispatcher::new(NetworkHardware::Wifi);
    dispatcher.configure(&config, &mut gpio);

    let mut sampler = dispatcher.sampler();
    let mut fired = Vec::new();
    sample_n(&mut sampler, PinState::Low, 7, &mut fired);
    assert!(dispatcher.set_role(5, PinRole::InputUnlock, &mut gpio));
    sample_n(&mut sampler, PinState::Low, 1, &mut fired);
    assert!(fired.is_empty(), "partial window must not carry over");

    sample_n(&mut sampler, PinState::Low, 7, &mut fired);
    assert_eq!(fired, vec![(GpioAction::Unlock, 5)]);
}

#[test]
fn repeated_output_write_is_idempotent_and_never_debounced() {
    let mut config = PinConfiguration::new();
    config.set(16, PinRole::GeneralOutput);
    config.set(17, PinRole::GeneralInputPullUp);
    let mut gpio = MockGpio::default();
    let mut dispatcher = GpioDispatcher::new(NetworkHardware::Wifi);
    dispatcher.configure(&config, &mut gpio);
    gpio.writes.clear();

    // Pin 17 is wired back to output 16.
    let mut sampler = dispatcher.sampler();
    let mut fired = Vec::new();

    assert!(dispatcher.write(&mut gpio, 16, PinState::High));
    let after_first = gpio.read(16);
    for tick in 0..16u32 {
        sampler.tick(1_000 + tick * 100, |pin| gpio.read(if pin == 17 { 16 } else { pin }));
    }

    assert!(dispatcher.write(&mut gpio, 16, PinState::High));
    assert_eq!(gpio.read(16), after_first);
    for _ in 0..16 {
        sampler.tick_with(
            |pin| gpio.read(if pin == 17 { 16 } else { pin }),
            |action, pin| fired.push((action, pin)),
        );
    }

    assert_eq!(gpio.writes, vec![(16, PinState::High), (16, PinState::High)]);
    assert!(fired.is_empty());
    assert!(dispatcher.take_due(u32::MAX / 2, |_| true).is_empty());
}

// ── Pending handoff ───────────────────────────────────────────

#[test]
fn pending_action_waits_for_commit_window() {
    let mut config = PinConfiguration::new();
    config.set(5, PinRole::InputLock);
    let mut gpio = MockGpio::default();
    let mut dispatcher = GpioDispatcher::new(NetworkHardware::Wifi);
    dispatcher.configure(&config, &mut gpio);

    let mut sampler = dispatcher.sampler();
    for tick in 0..8u32 {
        sampler.tick(1_000 + tick * 100, |_| PinState::Low);
    }
    // Committed on the eighth tick, stamped 1700.
    assert!(dispatcher.shared().pending().is_pending(5));
    assert!(dispatcher.take_due(1_700 + COMMIT_WINDOW_MS - 1, |_| true).is_empty());

    let due = dispatcher.take_due(1_700 + COMMIT_WINDOW_MS, |_| true);
    assert_eq!(due.as_slice(), &[(5, GpioAction::Lock)]);
    assert!(!dispatcher.shared().pending().is_pending(5));
}

#[test]
fn lock_actions_reach_handlers_while_offline() {
    let mut rig = Rig::new(&[(5, PinRole::InputLock)], 0);
    let (mut manager, clock) = mocks::manager(
        mocks::settings(&mocks::config()),
        MockTransport::down(&[]),
        MockBroker::accepting(),
    );
    let handler = RecordingHandler::default();
    manager.add_gpio_handler(Box::new(handler.clone()));

    rig.dispatcher
        .shared()
        .pending()
        .record(5, GpioAction::Lock, 100);

    clock.set(200);
    rig.step(&mut manager);
    assert!(handler.actions.borrow().is_empty(), "inside commit window");

    clock.set(400);
    rig.step(&mut manager);
    assert_eq!(handler.actions.borrow().as_slice(), &[(GpioAction::Lock, 5)]);
    assert!(manager.broker().published.is_empty());
}

#[test]
fn general_input_waits_for_a_session() {
    let mut rig = Rig::new(&[(17, PinRole::GeneralInputPullUp)], 0);
    let (mut manager, clock) = mocks::manager(
        mocks::settings(&mocks::config()),
        MockTransport::down(&[ReconnectStatus::Failure]),
        MockBroker::accepting(),
    );
    let state_topic = mocks::topic("/gpio/pin_17/state");

    rig.gpio.set_level(17, PinState::Low);
    rig.dispatcher
        .shared()
        .pending()
        .record(17, GpioAction::GeneralInput, 100);

    clock.set(1_000);
    rig.step(&mut manager);
    assert!(rig.dispatcher.shared().pending().is_pending(17));

    manager.transport_mut().connected = true;
    clock.set(6_000);
    rig.step(&mut manager);
    // First session iteration only syncs; the input goes out on the next.
    clock.set(6_100);
    rig.step(&mut manager);

    // Layout publication on connect, then the debounced change.
    assert_eq!(manager.broker().payloads(&state_topic), vec!["0", "0"]);
    assert!(manager.broker().last(&state_topic).unwrap().retain);
    assert!(!rig.dispatcher.shared().pending().is_pending(17));
}
