//! LockHub Firmware: Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  WifiTransport / EthernetTransport   MqttClient   NvsAdapter   │
//! │  (NetworkTransport)                  (Broker)     (Config+NVS) │
//! │  EspGpio   SystemAdapter<RtcMemory>  BleScanner   SystemClock  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  ConnectivityManager · GpioDispatcher · Presence       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  esp_timer 100 ms tick ──▶ PinSampler ──▶ pending actions      │
//! │  Bluedroid GAP scan    ──▶ PresenceRegistry                    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;

use anyhow::{Context, Result};
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::wifi::EspWifi;
use log::{error, info, warn};

use lockhub::adapters::ble_scan::BleScanner;
use lockhub::adapters::device_id;
use lockhub::adapters::ethernet::{self, EthResources, EthernetTransport};
#[cfg(not(any(esp32s3, esp32c3)))]
use lockhub::adapters::ethernet::RmiiPins;
use lockhub::adapters::manifest::HttpManifestSource;
use lockhub::adapters::mqtt::MqttClient;
use lockhub::adapters::nvs::{self, NvsAdapter};
use lockhub::adapters::rtc::RtcMemory;
use lockhub::adapters::system::SystemAdapter;
use lockhub::adapters::time::SystemClock;
use lockhub::adapters::wifi::WifiTransport;
use lockhub::app::ports::{ConfigPort, NetworkTransport, StoragePort};
use lockhub::config::GatewayConfig;
use lockhub::drivers::hw_init::EspGpio;
use lockhub::drivers::hw_timer;
use lockhub::drivers::watchdog::Watchdog;
use lockhub::error::Error;
use lockhub::gpio::{GpioDispatcher, PinConfiguration};
use lockhub::network::{ConnectivityManager, LoopContext, ManagerSettings, retained};
use lockhub::pins::NetworkHardware;
use lockhub::presence::PresenceRegistry;

/// Release manifest location, baked in at build time. No update checks
/// without it.
const MANIFEST_URL: Option<&str> = option_env!("LOCKHUB_MANIFEST_URL");

/// Main-loop yield between iterations.
const LOOP_DELAY_MS: u32 = 10;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  LockHub v{}                         ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take().context("peripherals already taken")?;
    let sysloop = EspSystemEventLoop::take()?;

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            NvsAdapter::default()
        }
    };
    let config = load_config(&nvs);

    // ── 3. Retained boot state → network hardware ─────────────
    let mut rtc = RtcMemory::new();
    let boot = retained::consume_boot_state(&mut rtc);
    let hardware = if boot.use_fallback {
        warn!(
            "Boot: {} failed last boot, falling back to Wi-Fi",
            config.network_hardware.name()
        );
        NetworkHardware::Wifi
    } else {
        config.network_hardware
    };
    info!("Boot: network hardware {}", hardware.name());

    // ── 4. GPIO roles + sampling tick ─────────────────────────
    let pin_config = PinConfiguration::load(&nvs, hardware);
    if !pin_config.is_empty() {
        info!("GPIO configuration:\n{}", pin_config.configuration_text("\n"));
    }
    let mut gpio = EspGpio::new();
    let mut dispatcher = GpioDispatcher::new(hardware);
    let inputs = dispatcher.configure(&pin_config, &mut gpio);
    if inputs > 0 && !hw_timer::start_gpio_tick(dispatcher.sampler()) {
        error!("GPIO: sampling timer unavailable, inputs will not fire");
    }

    // ── 5. Presence registry + BLE scan ───────────────────────
    let presence = Arc::new(PresenceRegistry::new(config.presence_timeout_ms()));
    let mut scanner = BleScanner::new(presence.clone());
    scanner.start();

    // ── 6. Network transport ──────────────────────────────────
    let transport: Box<dyn NetworkTransport> = if hardware.is_ethernet() {
        let resources = EthResources {
            spi: peripherals.spi2,
            #[cfg(not(any(esp32s3, esp32c3)))]
            mac: peripherals.mac,
            #[cfg(not(any(esp32s3, esp32c3)))]
            rmii: RmiiPins::take(peripherals.pins),
        };
        let link = ethernet::create_link(hardware, resources, sysloop.clone());
        Box::new(EthernetTransport::new(hardware, link))
    } else {
        let wifi = EspWifi::new(peripherals.modem, sysloop.clone(), None)?;
        let wifi = WifiTransport::new(wifi, &config.wifi_ssid, &config.wifi_password)
            .map_err(Error::from)
            .context("Wi-Fi station setup")?;
        Box::new(wifi)
    };

    // ── 7. Connectivity manager ───────────────────────────────
    let mut system = SystemAdapter::new(rtc);
    let settings = ManagerSettings::from_config(&config, boot.previous_reason);
    let mut manager = ConnectivityManager::new(settings, transport, MqttClient::new(), SystemClock::new());
    match MANIFEST_URL {
        Some(url) if config.check_for_updates => {
            manager.set_manifest_source(Box::new(HttpManifestSource::new(url)));
        }
        None if config.check_for_updates => warn!("Update: no manifest URL built in, check disabled"),
        _ => {}
    }

    let watchdog = Watchdog::default();
    info!("Boot: entering main loop");

    // ── 8. Main loop ──────────────────────────────────────────
    loop {
        watchdog.keep_alive();
        let mut keep_alive = || watchdog.keep_alive();
        let mut ctx = LoopContext {
            dispatcher: &dispatcher,
            gpio: &mut gpio,
            presence: &presence,
            system: &mut system,
            keep_alive: &mut keep_alive,
        };
        manager.update(&mut ctx);
        FreeRtos::delay_ms(LOOP_DELAY_MS);
    }
}

/// Stored configuration, normalised. The first boot derives the hostname
/// from the MAC and persists the result.
fn load_config(store: &NvsAdapter) -> GatewayConfig {
    let first_boot = !store.exists(nvs::CONFIG_NAMESPACE, nvs::CONFIG_KEY);
    let mut config = match store.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            GatewayConfig::default()
        }
    };

    let mut dirty = config.normalize();
    if first_boot {
        config.hostname = device_id::default_hostname(&device_id::read_mac());
        dirty = true;
    }
    if dirty {
        if let Err(e) = store.save(&config) {
            warn!("NVS: could not persist normalised config: {}", e);
        }
    }
    info!("Config: hostname '{}', root '{}'", config.hostname, config.root_path);
    config
}
