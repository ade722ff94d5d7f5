//! Broker client adapter.
//!
//! Implements [`BrokerClient`] on top of the ESP-MQTT component. The
//! client's event callback runs in the MQTT task: it only flips the
//! session flag and copies inbound messages into a bounded queue, which
//! the main loop drains through [`BrokerClient::poll_message`].
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::mqtt::client::EspMqttClient`
//!   created with a callback. The client is rebuilt on every `connect` so
//!   a changed last will or credential set always takes effect.
//! - **all other targets**: an in-memory broker that records publishes and
//!   subscriptions, with hooks to accept the handshake and inject messages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use heapless::Deque;
use log::{info, warn};

use crate::app::ports::{BrokerClient, BrokerError, BrokerSettings, InboundMessage};

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{
    EspMqttClient, EventPayload, LwtConfiguration, MqttClientConfiguration, QoS,
};

/// Inbound messages buffered between two main-loop iterations.
pub const INBOUND_QUEUE_DEPTH: usize = 8;

// ───────────────────────────────────────────────────────────────
// Shared session state (MQTT task ↔ main loop)
// ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct Session {
    connected: AtomicBool,
    inbound: Mutex<Deque<InboundMessage, INBOUND_QUEUE_DEPTH>>,
}

impl Session {
    /// Queue a delivered message. The oldest entry is dropped when full.
    fn push(&self, topic: &str, payload: &[u8]) {
        let Some(msg) = InboundMessage::new(topic, payload) else {
            warn!("MQTT: dropping oversized message on '{}'", topic);
            return;
        };
        let Ok(mut queue) = self.inbound.lock() else {
            return;
        };
        if queue.is_full() {
            let _ = queue.pop_front();
            warn!("MQTT: inbound queue full, oldest message dropped");
        }
        let _ = queue.push_back(msg);
    }

    fn pop(&self) -> Option<InboundMessage> {
        self.inbound.lock().ok()?.pop_front()
    }

    fn clear(&self) {
        self.connected.store(false, Ordering::Release);
        if let Ok(mut queue) = self.inbound.lock() {
            queue.clear();
        }
    }
}

// ───────────────────────────────────────────────────────────────
// MQTT client
// ───────────────────────────────────────────────────────────────

pub struct MqttClient {
    session: Arc<Session>,

    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,

    #[cfg(not(target_os = "espidf"))]
    sim: SimBroker,
}

/// Everything the simulated broker saw.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct SimBroker {
    pub connect_requests: u32,
    pub last_client_id: std::string::String,
    pub last_will_topic: std::string::String,
    pub published: Vec<(std::string::String, std::string::String, bool)>,
    pub subscriptions: Vec<std::string::String>,
    accept_handshake: bool,
}

impl Default for MqttClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MqttClient {
    pub fn new() -> Self {
        Self {
            session: Arc::new(Session::default()),
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(not(target_os = "espidf"))]
            sim: SimBroker {
                accept_handshake: true,
                ..SimBroker::default()
            },
        }
    }

    /// Simulation: whether the next `connect` completes its handshake.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_accept_handshake(&mut self, accept: bool) {
        self.sim.accept_handshake = accept;
    }

    /// Simulation: the broker closes the session.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_drop_session(&mut self) {
        self.session.connected.store(false, Ordering::Release);
    }

    /// Simulation: the broker delivers a message.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_deliver(&self, topic: &str, payload: &[u8]) {
        self.session.push(topic, payload);
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim(&self) -> &SimBroker {
        &self.sim
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self, settings: &BrokerSettings<'_>) -> Result<(), BrokerError> {
        // Dropping the old client stops its task before the new one starts.
        self.client = None;

        let url = format!("mqtt://{}:{}", settings.host, settings.port);
        let conf = MqttClientConfiguration {
            client_id: Some(settings.client_id),
            username: settings.username,
            password: settings.password,
            lwt: Some(LwtConfiguration {
                topic: settings.last_will.topic,
                payload: settings.last_will.payload.as_bytes(),
                qos: QoS::AtLeastOnce,
                retain: settings.last_will.retain,
            }),
            ..Default::default()
        };

        let session = self.session.clone();
        let client = EspMqttClient::new_cb(&url, &conf, move |event| match event.payload() {
            EventPayload::Connected(_) => session.connected.store(true, Ordering::Release),
            EventPayload::Disconnected => session.connected.store(false, Ordering::Release),
            EventPayload::Received {
                topic: Some(topic),
                data,
                ..
            } => session.push(topic, data),
            EventPayload::Error(e) => log::debug!("MQTT: client event error: {:?}", e),
            _ => {}
        })
        .map_err(|e| {
            warn!("MQTT: client init for {} failed: {}", url, e);
            BrokerError::ClientInit
        })?;

        self.client = Some(client);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self, settings: &BrokerSettings<'_>) -> Result<(), BrokerError> {
        self.sim.connect_requests += 1;
        self.sim.last_client_id = settings.client_id.into();
        self.sim.last_will_topic = settings.last_will.topic.into();
        self.session
            .connected
            .store(self.sim.accept_handshake, Ordering::Release);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), BrokerError> {
        let client = self.client.as_mut().ok_or(BrokerError::NotConnected)?;
        client
            .enqueue(topic, QoS::AtLeastOnce, retain, payload)
            .map(|_| ())
            .map_err(|_| BrokerError::PublishFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), BrokerError> {
        let payload = core::str::from_utf8(payload).map_err(|_| BrokerError::PublishFailed)?;
        self.sim.published.push((topic.into(), payload.into(), retain));
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        let client = self.client.as_mut().ok_or(BrokerError::NotConnected)?;
        client
            .subscribe(topic, QoS::AtMostOnce)
            .map(|_| ())
            .map_err(|_| BrokerError::SubscribeFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        self.sim.subscriptions.push(topic.into());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        self.client = None;
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {}
}

impl BrokerClient for MqttClient {
    fn connect(&mut self, settings: &BrokerSettings<'_>) -> Result<(), BrokerError> {
        self.session.clear();
        info!(
            "MQTT: connecting to {}:{} as '{}'",
            settings.host, settings.port, settings.client_id
        );
        self.platform_connect(settings)
    }

    fn is_connected(&self) -> bool {
        self.session.connected.load(Ordering::Acquire)
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        self.session.clear();
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::NotConnected);
        }
        self.platform_publish(topic, payload, retain)
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::NotConnected);
        }
        self.platform_subscribe(topic)
    }

    fn poll_message(&mut self) -> Option<InboundMessage> {
        self.session.pop()
    }
}
