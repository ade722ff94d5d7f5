//! Mock adapters for integration tests.
//!
//! Each mock records the calls made through its port so tests can assert
//! on the full history without a radio, a broker or real pins.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::rc::Rc;

use embedded_hal::digital::PinState;

use lockhub::app::ports::{
    BrokerClient, BrokerError, BrokerSettings, Clock, GpioActionHandler, GpioPort, InboundMessage,
    ManifestSource, NetworkTransport, PinMode, ReconnectStatus, StorageError, StoragePort,
    SystemPort,
};
use lockhub::config::GatewayConfig;
use lockhub::error::GpioError;
use lockhub::gpio::{GpioAction, GpioDispatcher, PinConfiguration, PinRole};
use lockhub::network::{ConnectivityManager, LoopContext, ManagerSettings, RestartReason};
use lockhub::pins::NetworkHardware;
use lockhub::presence::PresenceRegistry;

// ── Clock ─────────────────────────────────────────────────────

/// Manually advanced clock; `sleep_ms` moves time forward.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn sleep_ms(&self, ms: u32) {
        self.advance(u64::from(ms));
    }
}

// ── Transport ─────────────────────────────────────────────────

pub struct MockTransport {
    pub connected: bool,
    /// Results handed out by `attempt_reconnect`; `Failure` once drained.
    pub reconnect_results: VecDeque<ReconnectStatus>,
    pub reconnect_attempts: u32,
    pub updates: u32,
    pub rssi: Option<i8>,
    pub address: Option<Ipv4Addr>,
}

impl MockTransport {
    pub fn up() -> Self {
        Self {
            connected: true,
            reconnect_results: VecDeque::new(),
            reconnect_attempts: 0,
            updates: 0,
            rssi: None,
            address: Some(Ipv4Addr::new(192, 168, 1, 40)),
        }
    }

    pub fn down(results: &[ReconnectStatus]) -> Self {
        Self {
            connected: false,
            reconnect_results: results.iter().copied().collect(),
            ..Self::up()
        }
    }
}

impl NetworkTransport for MockTransport {
    fn device_name(&self) -> &str {
        "Mock"
    }

    fn update(&mut self) {
        self.updates += 1;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn attempt_reconnect(&mut self) -> ReconnectStatus {
        self.reconnect_attempts += 1;
        let result = self
            .reconnect_results
            .pop_front()
            .unwrap_or(ReconnectStatus::Failure);
        if result == ReconnectStatus::Success {
            self.connected = true;
        }
        result
    }

    fn signal_strength(&self) -> Option<i8> {
        self.rssi
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        self.address
    }
}

// ── Broker ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

pub struct MockBroker {
    /// Acknowledge the handshake as soon as `connect` is called.
    pub accept: bool,
    pub fail_publishes: bool,
    pub session: bool,
    pub connects: u32,
    pub disconnects: u32,
    pub last_client_id: String,
    pub last_username: Option<String>,
    pub last_will_topic: String,
    pub published: Vec<Published>,
    pub subscriptions: Vec<String>,
    pub inbound: VecDeque<InboundMessage>,
}

impl MockBroker {
    pub fn accepting() -> Self {
        Self {
            accept: true,
            fail_publishes: false,
            session: false,
            connects: 0,
            disconnects: 0,
            last_client_id: String::new(),
            last_username: None,
            last_will_topic: String::new(),
            published: Vec::new(),
            subscriptions: Vec::new(),
            inbound: VecDeque::new(),
        }
    }

    pub fn silent() -> Self {
        Self {
            accept: false,
            ..Self::accepting()
        }
    }

    pub fn deliver(&mut self, topic: &str, payload: &str) {
        if let Some(msg) = InboundMessage::new(topic, payload.as_bytes()) {
            self.inbound.push_back(msg);
        }
    }

    /// Payloads published to `topic`, oldest first.
    pub fn payloads(&self, topic: &str) -> Vec<&str> {
        self.published
            .iter()
            .filter(|p| p.topic == topic)
            .map(|p| p.payload.as_str())
            .collect()
    }

    pub fn last(&self, topic: &str) -> Option<&Published> {
        self.published.iter().rev().find(|p| p.topic == topic)
    }
}

impl BrokerClient for MockBroker {
    fn connect(&mut self, settings: &BrokerSettings<'_>) -> Result<(), BrokerError> {
        self.connects += 1;
        self.last_client_id = settings.client_id.to_owned();
        self.last_username = settings.username.map(str::to_owned);
        self.last_will_topic = settings.last_will.topic.to_owned();
        self.session = self.accept;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
        self.session = false;
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), BrokerError> {
        if !self.session {
            return Err(BrokerError::NotConnected);
        }
        if self.fail_publishes {
            return Err(BrokerError::PublishFailed);
        }
        self.published.push(Published {
            topic: topic.to_owned(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            retain,
        });
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        if !self.session {
            return Err(BrokerError::NotConnected);
        }
        self.subscriptions.push(topic.to_owned());
        Ok(())
    }

    fn poll_message(&mut self) -> Option<InboundMessage> {
        self.inbound.pop_front()
    }
}

// ── GPIO ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockGpio {
    pub levels: HashMap<u8, PinState>,
    pub modes: HashMap<u8, PinMode>,
    pub writes: Vec<(u8, PinState)>,
}

impl MockGpio {
    pub fn set_level(&mut self, pin: u8, level: PinState) {
        self.levels.insert(pin, level);
    }

    pub fn last_write(&self, pin: u8) -> Option<PinState> {
        self.writes
            .iter()
            .rev()
            .find(|(p, _)| *p == pin)
            .map(|(_, level)| *level)
    }
}

impl GpioPort for MockGpio {
    fn configure(&mut self, pin: u8, mode: PinMode) -> Result<(), GpioError> {
        self.modes.insert(pin, mode);
        let idle = if mode == PinMode::InputPullDown {
            PinState::Low
        } else {
            PinState::High
        };
        self.levels.entry(pin).or_insert(idle);
        Ok(())
    }

    fn read(&self, pin: u8) -> PinState {
        self.levels.get(&pin).copied().unwrap_or(PinState::Low)
    }

    fn write(&mut self, pin: u8, level: PinState) {
        self.levels.insert(pin, level);
        self.writes.push((pin, level));
    }
}

/// Collects lock-protocol actions.
#[derive(Clone, Default)]
pub struct RecordingHandler {
    pub actions: Rc<RefCell<Vec<(GpioAction, u8)>>>,
}

impl GpioActionHandler for RecordingHandler {
    fn on_gpio_action(&mut self, action: GpioAction, pin: u8) {
        self.actions.borrow_mut().push((action, pin));
    }
}

// ── System ────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockSystem {
    pub fallback: Option<bool>,
    pub restarts: Vec<RestartReason>,
}

impl SystemPort for MockSystem {
    fn set_transport_fallback(&mut self, enabled: bool) {
        self.fallback = Some(enabled);
    }

    fn restart(&mut self, reason: RestartReason) {
        self.restarts.push(reason);
    }

    fn free_heap(&self) -> u32 {
        123_456
    }

    fn reset_reason(&self) -> &'static str {
        "Software reset"
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockStorage {
    pub entries: HashMap<(String, String), Vec<u8>>,
    pub writes: u32,
}

impl StoragePort for MockStorage {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let data = self
            .entries
            .get(&(namespace.to_owned(), key.to_owned()))
            .ok_or(StorageError::NotFound)?;
        if data.len() > buf.len() {
            return Err(StorageError::IoError);
        }
        buf[..data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.writes += 1;
        self.entries
            .insert((namespace.to_owned(), key.to_owned()), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.entries.remove(&(namespace.to_owned(), key.to_owned()));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.entries
            .contains_key(&(namespace.to_owned(), key.to_owned()))
    }
}

// ── Manifest ──────────────────────────────────────────────────

pub struct FixedManifest {
    pub body: Option<String>,
    pub fetches: Rc<Cell<u32>>,
}

impl ManifestSource for FixedManifest {
    fn fetch(&mut self) -> Option<String> {
        self.fetches.set(self.fetches.get() + 1);
        self.body.clone()
    }
}

// ── Builders ──────────────────────────────────────────────────

pub const ROOT: &str = "hub";

pub fn config() -> GatewayConfig {
    let mut cfg = GatewayConfig::default();
    cfg.hostname = "lockhub-test".try_into().unwrap();
    cfg.broker_host = "broker.local".try_into().unwrap();
    cfg.root_path = ROOT.try_into().unwrap();
    cfg
}

pub fn settings(cfg: &GatewayConfig) -> ManagerSettings {
    ManagerSettings::from_config(cfg, RestartReason::NotApplicable)
}

pub type TestManager = ConnectivityManager<MockTransport, MockBroker, ManualClock>;

pub fn manager(
    settings: ManagerSettings,
    transport: MockTransport,
    broker: MockBroker,
) -> (TestManager, ManualClock) {
    let clock = ManualClock::default();
    let manager = ConnectivityManager::new(settings, transport, broker, clock.clone());
    (manager, clock)
}

/// `<root><suffix>` for assertions.
pub fn topic(suffix: &str) -> String {
    format!("{}{}", ROOT, suffix)
}

/// Everything `LoopContext` borrows, owned in one place.
pub struct Rig {
    pub dispatcher: GpioDispatcher,
    pub gpio: MockGpio,
    pub presence: PresenceRegistry,
    pub system: MockSystem,
    pub keep_alives: u32,
}

impl Rig {
    pub fn new(pins: &[(u8, PinRole)], presence_timeout_ms: i64) -> Self {
        let mut config = PinConfiguration::new();
        for &(pin, role) in pins {
            config.set(pin, role);
        }
        let mut gpio = MockGpio::default();
        let mut dispatcher = GpioDispatcher::new(NetworkHardware::Wifi);
        dispatcher.configure(&config, &mut gpio);
        Self {
            dispatcher,
            gpio,
            presence: PresenceRegistry::new(presence_timeout_ms),
            system: MockSystem::default(),
            keep_alives: 0,
        }
    }

    /// One main-loop iteration.
    pub fn step(&mut self, manager: &mut TestManager) -> bool {
        let mut pumps = 0;
        let mut keep_alive = || pumps += 1;
        let mut ctx = LoopContext {
            dispatcher: &self.dispatcher,
            gpio: &mut self.gpio,
            presence: &self.presence,
            system: &mut self.system,
            keep_alive: &mut keep_alive,
        };
        let up = manager.update(&mut ctx);
        self.keep_alives += pumps;
        up
    }
}
