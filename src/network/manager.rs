//! Connectivity manager.
//!
//! Keeps one broker session alive on top of whichever network transport
//! was selected at boot, routes inbound commands and publishes GPIO,
//! presence and maintenance telemetry. Advanced once per main-loop
//! iteration by [`ConnectivityManager::update`]; the only blocking step is
//! the bounded broker handshake.
//!
//! ```text
//!   Disconnected ──link up, retry due──▶ Connecting ──ack──▶ Connected
//!        ▲                                    │                  │ first maintenance cycle
//!        └─── link down / handshake timeout ──┘                  ▼
//!                                                    ConnectedAndSynchronized
//! ```

use core::fmt::Write as _;

use embedded_hal::digital::PinState;
use heapless::String;
use log::{debug, error, info, warn};

use super::retained::RestartReason;
use super::topics::{self, Topic};
use super::update_check::{ReleaseManifest, UPDATE_CHECK_INTERVAL_MS};
use crate::app::ports::{
    BrokerClient, BrokerReceiver, BrokerSettings, Clock, GpioActionHandler, GpioPort,
    InboundMessage, LastWill, ManifestSource, NetworkTransport, ReconnectStatus, SystemPort,
};
use crate::config::GatewayConfig;
use crate::gpio::{GpioAction, GpioDispatcher, PinRole};
use crate::presence::PresenceRegistry;
use crate::presence::registry::{DISABLED_SNAPSHOT, SNAPSHOT_LEN};

/// Delay before the next attempt after any connect failure.
pub const RETRY_DELAY_MS: u64 = 5_000;
/// Ceiling on the blocking broker handshake.
pub const HANDSHAKE_TIMEOUT_MS: u64 = 60_000;
/// Poll period while waiting for the handshake.
pub const HANDSHAKE_POLL_MS: u32 = 50;
/// Inbound messages arriving this soon after connect are dropped
/// (retained replays of our own topics).
pub const INBOUND_GRACE_MS: u64 = 2_000;
/// Uptime before the disconnect watchdogs may restart the device.
pub const WATCHDOG_GRACE_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    ConnectedAndSynchronized,
}

impl ConnectionState {
    pub fn has_session(self) -> bool {
        matches!(self, Self::Connected | Self::ConnectedAndSynchronized)
    }
}

/// Values the manager reads once at construction.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub root: String<64>,
    pub client_id: String<32>,
    pub broker_host: String<64>,
    pub broker_port: u16,
    pub broker_user: String<32>,
    pub broker_password: String<64>,
    pub presence_interval_ms: u64,
    pub maintenance_interval_ms: u64,
    /// 0 disables signal strength publication.
    pub rssi_interval_ms: u64,
    pub restart_on_disconnect: bool,
    /// <= 0 disables the network timeout watchdog.
    pub network_timeout_secs: i32,
    pub publish_debug_info: bool,
    pub check_for_updates: bool,
    pub firmware_version: &'static str,
    pub firmware_build: &'static str,
    /// Reason recorded by the previous boot, published once.
    pub previous_restart_reason: RestartReason,
}

impl ManagerSettings {
    pub fn from_config(config: &GatewayConfig, previous_restart_reason: RestartReason) -> Self {
        Self {
            root: config.root_path.clone(),
            client_id: config.hostname.clone(),
            broker_host: config.broker_host.clone(),
            broker_port: config.broker_port,
            broker_user: config.broker_user.clone(),
            broker_password: config.broker_password.clone(),
            presence_interval_ms: u64::from(config.presence_publish_interval_secs) * 1000,
            maintenance_interval_ms: u64::from(config.maintenance_interval_secs) * 1000,
            rssi_interval_ms: u64::from(config.rssi_publish_interval_secs) * 1000,
            restart_on_disconnect: config.restart_on_disconnect,
            network_timeout_secs: config.network_timeout_secs,
            publish_debug_info: config.publish_debug_info,
            check_for_updates: config.check_for_updates,
            firmware_version: env!("CARGO_PKG_VERSION"),
            firmware_build: option_env!("LOCKHUB_BUILD").unwrap_or("local"),
            previous_restart_reason,
        }
    }
}

/// Collaborators the manager borrows for one iteration.
pub struct LoopContext<'a, G: GpioPort, S: SystemPort> {
    pub dispatcher: &'a GpioDispatcher,
    pub gpio: &'a mut G,
    pub presence: &'a PresenceRegistry,
    pub system: &'a mut S,
    /// Pumped repeatedly during the broker handshake.
    pub keep_alive: &'a mut dyn FnMut(),
}

struct Receiver {
    topic: Topic,
    handler: Box<dyn BrokerReceiver>,
}

pub struct ConnectivityManager<N, B, C>
where
    N: NetworkTransport,
    B: BrokerClient,
    C: Clock,
{
    settings: ManagerSettings,
    transport: N,
    broker: B,
    clock: C,

    state: ConnectionState,
    next_retry_ms: u64,
    restart_pending: bool,
    first_connect: bool,
    connected_at_ms: Option<u64>,
    last_connected_ms: u64,

    last_maintenance_ms: Option<u64>,
    boot_info_published: bool,
    published_uptime_min: Option<u64>,
    last_rssi_ms: u64,
    last_rssi: Option<i8>,
    last_presence_ms: Option<u64>,
    presence_disabled_reported: bool,
    last_update_check_ms: Option<u64>,

    link_indicator: Option<bool>,
    session_indicator: Option<bool>,

    subscriptions: Vec<Topic>,
    receivers: Vec<Receiver>,
    gpio_handlers: Vec<Box<dyn GpioActionHandler>>,
    manifest: Option<Box<dyn ManifestSource>>,
    snapshot: String<SNAPSHOT_LEN>,
}

impl<N, B, C> ConnectivityManager<N, B, C>
where
    N: NetworkTransport,
    B: BrokerClient,
    C: Clock,
{
    pub fn new(settings: ManagerSettings, transport: N, broker: B, clock: C) -> Self {
        if settings.broker_host.is_empty() {
            warn!("MQTT: no broker configured");
        } else {
            info!(
                "MQTT: broker {}:{}, root '{}'",
                settings.broker_host, settings.broker_port, settings.root
            );
        }
        info!("Network: device {}", transport.device_name());

        Self {
            settings,
            transport,
            broker,
            clock,
            state: ConnectionState::Disconnected,
            next_retry_ms: 0,
            restart_pending: false,
            first_connect: true,
            connected_at_ms: None,
            last_connected_ms: 0,
            last_maintenance_ms: None,
            boot_info_published: false,
            published_uptime_min: None,
            last_rssi_ms: 0,
            last_rssi: None,
            last_presence_ms: None,
            presence_disabled_reported: false,
            last_update_check_ms: None,
            link_indicator: None,
            session_indicator: None,
            subscriptions: Vec::new(),
            receivers: Vec::new(),
            gpio_handlers: Vec::new(),
            manifest: None,
            snapshot: String::new(),
        }
    }

    // ── Registration ──────────────────────────────────────────

    /// Subscribe `<root><suffix>` now (if a session exists) and after every
    /// reconnect.
    pub fn subscribe(&mut self, suffix: &str) {
        let Some(topic) = topics::build(&self.settings.root, suffix) else {
            warn!("MQTT: topic too long: {}{}", self.settings.root, suffix);
            return;
        };
        self.add_subscription(topic);
    }

    /// Route messages on `<root><suffix>` to `handler`.
    pub fn register_receiver(&mut self, suffix: &str, handler: Box<dyn BrokerReceiver>) {
        let Some(topic) = topics::build(&self.settings.root, suffix) else {
            warn!("MQTT: topic too long: {}{}", self.settings.root, suffix);
            return;
        };
        self.receivers.push(Receiver {
            topic: topic.clone(),
            handler,
        });
        self.add_subscription(topic);
    }

    /// Consumer of debounced lock-protocol inputs.
    pub fn add_gpio_handler(&mut self, handler: Box<dyn GpioActionHandler>) {
        self.gpio_handlers.push(handler);
    }

    pub fn set_manifest_source(&mut self, source: Box<dyn ManifestSource>) {
        self.manifest = Some(source);
    }

    fn add_subscription(&mut self, topic: Topic) {
        if self.subscriptions.contains(&topic) {
            return;
        }
        if self.state.has_session() {
            if let Err(e) = self.broker.subscribe(&topic) {
                warn!("MQTT: subscribe to {} failed: {}", topic, e);
            }
        }
        self.subscriptions.push(topic);
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn next_retry_ms(&self) -> u64 {
        self.next_retry_ms
    }

    /// A restart was requested; the manager stays idle from then on.
    pub fn restart_pending(&self) -> bool {
        self.restart_pending
    }

    pub fn transport(&self) -> &N {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut N {
        &mut self.transport
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn broker_mut(&mut self) -> &mut B {
        &mut self.broker
    }

    // ── Main loop step ────────────────────────────────────────

    /// Advance the state machine once. Returns `true` while a broker
    /// session is up at the end of the iteration.
    pub fn update<G: GpioPort, S: SystemPort>(&mut self, ctx: &mut LoopContext<'_, G, S>) -> bool {
        if self.restart_pending {
            return false;
        }

        let now = self.clock.now_ms();
        self.transport.update();
        self.dispatch_lock_actions(ctx.dispatcher, now);

        if !self.transport.is_connected() {
            self.drop_session("link down");
            self.drive_indicators(ctx, false, false);
            self.handle_link_down(ctx, now);
            return false;
        }

        if !self.broker.is_connected() {
            self.drop_session("session lost");
            self.drive_indicators(ctx, true, false);
            if !self.connect(ctx) {
                let now = self.clock.now_ms();
                self.check_network_timeout(ctx, now);
                return false;
            }
        }
        self.drive_indicators(ctx, true, true);

        let now = self.clock.now_ms();
        self.last_connected_ms = now;

        self.route_inbound(ctx);
        if self.restart_pending {
            return false;
        }

        if self.state == ConnectionState::Connected {
            self.run_maintenance(ctx, now);
        } else {
            self.publish_gpio_inputs(ctx, now);
            self.publish_presence(ctx, now);
            self.publish_rssi(now);
            if self.maintenance_due(now) {
                self.run_maintenance(ctx, now);
            }
        }
        self.check_for_update(now);

        self.state.has_session()
    }

    fn drop_session(&mut self, why: &str) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        warn!("MQTT: {}, session closed", why);
        self.broker.disconnect();
        self.state = ConnectionState::Disconnected;
        self.connected_at_ms = None;
    }

    // ── Link handling ─────────────────────────────────────────

    fn handle_link_down<G: GpioPort, S: SystemPort>(
        &mut self,
        ctx: &mut LoopContext<'_, G, S>,
        now: u64,
    ) {
        if self.settings.restart_on_disconnect && now > WATCHDOG_GRACE_MS {
            error!("Network: link down, restart-on-disconnect is set");
            self.request_restart(&mut *ctx.system, RestartReason::RestartOnDisconnectWatchdog);
            return;
        }
        if self.check_network_timeout(ctx, now) {
            return;
        }
        if now < self.next_retry_ms {
            return;
        }

        match self.transport.attempt_reconnect() {
            ReconnectStatus::Success => {
                info!("Network: {} link up", self.transport.device_name());
            }
            ReconnectStatus::Failure => {
                self.next_retry_ms = self.clock.now_ms() + RETRY_DELAY_MS;
                warn!(
                    "Network: {} reconnect failed, retry in {} ms",
                    self.transport.device_name(),
                    RETRY_DELAY_MS
                );
            }
            ReconnectStatus::CriticalFailure => {
                error!(
                    "Network: {} hardware failure, restarting on fallback transport",
                    self.transport.device_name()
                );
                ctx.system.set_transport_fallback(true);
                self.request_restart(&mut *ctx.system, RestartReason::NetworkDeviceCriticalFailure);
            }
        }
    }

    /// Restart when no session existed for the configured timeout.
    fn check_network_timeout<G: GpioPort, S: SystemPort>(
        &mut self,
        ctx: &mut LoopContext<'_, G, S>,
        now: u64,
    ) -> bool {
        let Ok(secs) = u64::try_from(self.settings.network_timeout_secs) else {
            return false;
        };
        if secs == 0 || now <= WATCHDOG_GRACE_MS {
            return false;
        }
        if now.saturating_sub(self.last_connected_ms) <= secs * 1000 {
            return false;
        }
        error!("Network: no session for {} s, restarting", secs);
        self.request_restart(&mut *ctx.system, RestartReason::NetworkTimeoutWatchdog);
        true
    }

    fn request_restart(&mut self, system: &mut impl SystemPort, reason: RestartReason) {
        self.restart_pending = true;
        self.drop_session("restarting");
        system.restart(reason);
    }

    fn drive_indicators<G: GpioPort, S: SystemPort>(
        &mut self,
        ctx: &mut LoopContext<'_, G, S>,
        link: bool,
        session: bool,
    ) {
        if self.link_indicator != Some(link) {
            self.link_indicator = Some(link);
            ctx.dispatcher
                .write_role(&mut *ctx.gpio, PinRole::OutputHighNetworkConnected, pin_level(link));
        }
        if self.session_indicator != Some(session) {
            self.session_indicator = Some(session);
            ctx.dispatcher
                .write_role(&mut *ctx.gpio, PinRole::OutputHighBrokerConnected, pin_level(session));
        }
    }

    // ── Broker session ────────────────────────────────────────

    fn connect<G: GpioPort, S: SystemPort>(&mut self, ctx: &mut LoopContext<'_, G, S>) -> bool {
        let now = self.clock.now_ms();
        if now < self.next_retry_ms {
            return false;
        }
        if self.settings.broker_host.is_empty() {
            warn!("MQTT: broker not configured, not connecting");
            self.next_retry_ms = now + RETRY_DELAY_MS;
            return false;
        }
        let Some(will_topic) = topics::build(&self.settings.root, topics::CONNECTION_STATE) else {
            error!("MQTT: root path too long");
            self.next_retry_ms = now + RETRY_DELAY_MS;
            return false;
        };

        let credentials = !self.settings.broker_user.is_empty();
        if credentials {
            info!(
                "MQTT: connecting to {}:{} as {}",
                self.settings.broker_host, self.settings.broker_port, self.settings.broker_user
            );
        } else {
            info!(
                "MQTT: connecting to {}:{} without credentials",
                self.settings.broker_host, self.settings.broker_port
            );
        }

        let settings = BrokerSettings {
            host: &self.settings.broker_host,
            port: self.settings.broker_port,
            client_id: &self.settings.client_id,
            username: credentials.then_some(self.settings.broker_user.as_str()),
            password: credentials.then_some(self.settings.broker_password.as_str()),
            last_will: LastWill {
                topic: &will_topic,
                payload: topics::OFFLINE,
                retain: true,
            },
        };

        self.state = ConnectionState::Connecting;
        if let Err(e) = self.broker.connect(&settings) {
            warn!("MQTT: {}", e);
            self.fail_connect();
            return false;
        }

        let deadline = self.clock.now_ms() + HANDSHAKE_TIMEOUT_MS;
        while !self.broker.is_connected() && self.clock.now_ms() < deadline {
            self.clock.sleep_ms(HANDSHAKE_POLL_MS);
            self.transport.update();
            (ctx.keep_alive)();
        }

        if !self.broker.is_connected() {
            warn!("MQTT: handshake timed out");
            self.broker.disconnect();
            self.fail_connect();
            return false;
        }

        self.on_connected(ctx);
        true
    }

    fn fail_connect(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.next_retry_ms = self.clock.now_ms() + RETRY_DELAY_MS;
        debug!("MQTT: next attempt at {} ms", self.next_retry_ms);
    }

    fn on_connected<G: GpioPort, S: SystemPort>(&mut self, ctx: &mut LoopContext<'_, G, S>) {
        let now = self.clock.now_ms();
        info!("MQTT: connected");
        self.connected_at_ms = Some(now);
        self.last_connected_ms = now;
        self.presence_disabled_reported = false;

        let first = self.first_connect;
        if first {
            self.first_connect = false;
            let mut device: String<32> = String::new();
            let _ = device.push_str(self.transport.device_name());
            self.publish(topics::NETWORK_DEVICE, &device, true);
            self.publish(topics::RESET, "0", true);
            self.subscribe(topics::RESET);
        }

        self.publish_gpio_layout(ctx, first);

        for topic in &self.subscriptions {
            if let Err(e) = self.broker.subscribe(topic) {
                warn!("MQTT: subscribe to {} failed: {}", topic, e);
            }
        }
        self.state = ConnectionState::Connected;

        self.publish(topics::CONNECTION_STATE, topics::ONLINE, true);
        if let Some(ip) = self.transport.local_address() {
            let mut text: String<16> = String::new();
            if write!(text, "{}", ip).is_ok() {
                self.publish(topics::INFO_IP, &text, true);
            }
        }
    }

    /// Role topics for every general pin, current input levels, and the
    /// output command subscriptions.
    fn publish_gpio_layout<G: GpioPort, S: SystemPort>(
        &mut self,
        ctx: &mut LoopContext<'_, G, S>,
        first: bool,
    ) {
        let root = self.settings.root.clone();
        for entry in ctx.dispatcher.entries() {
            match entry.role {
                PinRole::GeneralInputPullDown | PinRole::GeneralInputPullUp => {
                    self.publish_gpio(&root, entry.pin, topics::GPIO_ROLE, "input", true);
                    let state = level_text(ctx.gpio.read(entry.pin));
                    self.publish_gpio(&root, entry.pin, topics::GPIO_STATE, state, true);
                }
                PinRole::GeneralOutput => {
                    self.publish_gpio(&root, entry.pin, topics::GPIO_ROLE, "output", true);
                    if first {
                        self.publish_gpio(&root, entry.pin, topics::GPIO_STATE, "0", true);
                    }
                    if let Some(topic) = topics::gpio(&root, entry.pin, topics::GPIO_STATE) {
                        self.add_subscription(topic);
                    }
                }
                _ => {}
            }
        }
    }

    // ── Inbound routing ───────────────────────────────────────

    fn route_inbound<G: GpioPort, S: SystemPort>(&mut self, ctx: &mut LoopContext<'_, G, S>) {
        while let Some(msg) = self.broker.poll_message() {
            let Some(connected_at) = self.connected_at_ms else {
                continue;
            };
            if self.clock.now_ms().saturating_sub(connected_at) < INBOUND_GRACE_MS {
                debug!("MQTT: ignoring {} during connect grace", msg.topic);
                continue;
            }
            self.route(&msg, ctx);
            if self.restart_pending {
                return;
            }
        }
    }

    fn route<G: GpioPort, S: SystemPort>(
        &mut self,
        msg: &InboundMessage,
        ctx: &mut LoopContext<'_, G, S>,
    ) {
        let topic = msg.topic.as_str();
        let payload = msg.payload_str();

        if let Some(pin) = topics::parse_gpio_state(&self.settings.root, topic) {
            if ctx.dispatcher.role(pin) == PinRole::GeneralOutput {
                let level = if payload == "1" {
                    PinState::High
                } else {
                    PinState::Low
                };
                ctx.dispatcher.write(&mut *ctx.gpio, pin, level);
                info!("GPIO {} (Output) --> {}", pin, level_text(level));
            }
        }

        if topic.strip_prefix(self.settings.root.as_str()) == Some(topics::RESET) && payload == "1"
        {
            info!("MQTT: restart requested via broker");
            ctx.system.set_transport_fallback(false);
            self.request_restart(&mut *ctx.system, RestartReason::RequestedViaBroker);
            return;
        }

        for receiver in self.receivers.iter_mut().filter(|r| r.topic == topic) {
            receiver.handler.on_message(topic, &msg.payload);
        }
    }

    // ── GPIO ──────────────────────────────────────────────────

    /// Lock-protocol actions go to their handlers whether or not a
    /// session exists.
    fn dispatch_lock_actions(&mut self, dispatcher: &GpioDispatcher, now: u64) {
        let due = dispatcher.take_due(now as u32, GpioAction::is_lock_action);
        for (pin, action) in due {
            debug!("GPIO: pin {} -> {:?}", pin, action);
            for handler in &mut self.gpio_handlers {
                handler.on_gpio_action(action, pin);
            }
        }
    }

    fn publish_gpio_inputs<G: GpioPort, S: SystemPort>(
        &mut self,
        ctx: &mut LoopContext<'_, G, S>,
        now: u64,
    ) {
        let due = ctx
            .dispatcher
            .take_due(now as u32, |a| a == GpioAction::GeneralInput);
        if due.is_empty() {
            return;
        }
        let root = self.settings.root.clone();
        for (pin, _) in due {
            let state = level_text(ctx.gpio.read(pin));
            self.publish_gpio(&root, pin, topics::GPIO_STATE, state, true);
            info!("GPIO {} (Input) --> {}", pin, state);
        }
    }

    fn publish_gpio(&mut self, root: &str, pin: u8, leaf: &str, payload: &str, retain: bool) {
        match topics::gpio(root, pin, leaf) {
            Some(topic) => {
                self.publish_to(&topic, payload.as_bytes(), retain);
            }
            None => warn!("MQTT: topic too long for pin {}", pin),
        }
    }

    // ── Periodic telemetry ────────────────────────────────────

    fn publish_presence<G: GpioPort, S: SystemPort>(
        &mut self,
        ctx: &mut LoopContext<'_, G, S>,
        now: u64,
    ) {
        if !ctx.presence.is_enabled() {
            if !self.presence_disabled_reported {
                self.presence_disabled_reported = true;
                self.publish(topics::PRESENCE_DEVICES, DISABLED_SNAPSHOT, false);
            }
            return;
        }
        let due = self
            .last_presence_ms
            .is_none_or(|last| now.saturating_sub(last) >= self.settings.presence_interval_ms);
        if !due {
            return;
        }
        self.last_presence_ms = Some(now);

        ctx.presence
            .snapshot_into(ctx.presence.timeout_ms(), now, &mut self.snapshot);
        let Some(topic) = topics::build(&self.settings.root, topics::PRESENCE_DEVICES) else {
            return;
        };
        if let Err(e) = self.broker.publish(&topic, self.snapshot.as_bytes(), false) {
            warn!("Presence: publish failed: {}", e);
        }
    }

    fn publish_rssi(&mut self, now: u64) {
        let Some(rssi) = self.transport.signal_strength() else {
            return;
        };
        let interval = self.settings.rssi_interval_ms;
        if interval == 0 || now.saturating_sub(self.last_rssi_ms) <= interval {
            return;
        }
        self.last_rssi_ms = now;
        if self.last_rssi == Some(rssi) {
            return;
        }
        if self.publish(topics::WIFI_RSSI, &number(rssi), true) {
            self.last_rssi = Some(rssi);
        }
    }

    fn maintenance_due(&self, now: u64) -> bool {
        self.last_maintenance_ms
            .is_none_or(|last| now.saturating_sub(last) > self.settings.maintenance_interval_ms)
    }

    fn run_maintenance<G: GpioPort, S: SystemPort>(
        &mut self,
        ctx: &mut LoopContext<'_, G, S>,
        now: u64,
    ) {
        self.last_maintenance_ms = Some(now);
        let mut ok = true;

        let uptime_min = now / 60_000;
        if self.published_uptime_min.is_none_or(|last| uptime_min > last) {
            if self.publish(topics::UPTIME, &number(uptime_min), true) {
                self.published_uptime_min = Some(uptime_min);
            } else {
                ok = false;
            }
        }

        if !self.boot_info_published {
            let reason = self.settings.previous_restart_reason.as_str();
            let esp_reason = ctx.system.reset_reason();
            let version = self.settings.firmware_version;
            let build = self.settings.firmware_build;
            let published = self.publish(topics::RESTART_REASON, reason, true)
                & self.publish(topics::RESTART_REASON_ESP, esp_reason, true)
                & self.publish(topics::INFO_VERSION, version, true)
                & self.publish(topics::INFO_BUILD, build, true);
            self.boot_info_published = published;
            ok &= published;
        }

        if self.settings.publish_debug_info {
            ok &= self.publish(topics::FREE_HEAP, &number(ctx.system.free_heap()), true);
        }

        if ok && self.state == ConnectionState::Connected {
            info!("MQTT: synchronized");
            self.state = ConnectionState::ConnectedAndSynchronized;
        }
    }

    fn check_for_update(&mut self, now: u64) {
        if !self.settings.check_for_updates {
            return;
        }
        let Some(source) = self.manifest.as_mut() else {
            return;
        };
        let due = self
            .last_update_check_ms
            .is_none_or(|last| now.saturating_sub(last) > UPDATE_CHECK_INTERVAL_MS);
        if !due {
            return;
        }
        self.last_update_check_ms = Some(now);

        let Some(body) = source.fetch() else {
            warn!("Update: manifest fetch failed");
            return;
        };
        let Some(manifest) = ReleaseManifest::parse(&body) else {
            return;
        };
        let latest = manifest.latest_for(self.settings.firmware_version).to_owned();
        info!("Update: latest version {}", latest);
        self.publish(topics::INFO_LATEST_VERSION, &latest, true);
    }

    // ── Publishing ────────────────────────────────────────────

    /// Publish `<root><suffix>`; failures are logged and reported.
    pub fn publish(&mut self, suffix: &str, payload: &str, retain: bool) -> bool {
        let Some(topic) = topics::build(&self.settings.root, suffix) else {
            warn!("MQTT: topic too long: {}{}", self.settings.root, suffix);
            return false;
        };
        self.publish_to(&topic, payload.as_bytes(), retain)
    }

    fn publish_to(&mut self, topic: &str, payload: &[u8], retain: bool) -> bool {
        match self.broker.publish(topic, payload, retain) {
            Ok(()) => true,
            Err(e) => {
                warn!("MQTT: publish to {} failed: {}", topic, e);
                false
            }
        }
    }
}

fn pin_level(high: bool) -> PinState {
    if high { PinState::High } else { PinState::Low }
}

fn level_text(state: PinState) -> &'static str {
    match state {
        PinState::High => "1",
        PinState::Low => "0",
    }
}

fn number(value: impl core::fmt::Display) -> String<24> {
    let mut text = String::new();
    let _ = write!(text, "{}", value);
    text
}
