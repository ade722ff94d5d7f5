//! BLE passive presence scanner.
//!
//! Runs a continuous Bluedroid GAP scan and feeds every advertising report
//! into the [`PresenceRegistry`]. The GAP callback is a C function pointer
//! that cannot capture state, so the registry is parked in a process-wide
//! slot when scanning starts.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: BLE-only controller, Bluedroid, GAP scan
//!   with `BLE_SCAN_DUPLICATE_DISABLE` so repeated sightings refresh the
//!   last-seen time.
//! - **all other targets**: [`BleScanner::inject`] stands in for the radio.

use std::sync::{Arc, OnceLock};

use log::{info, warn};

use crate::presence::{Advertisement, BeaconAddress, PresenceRegistry};

/// Scan interval / window in 0.625 ms units (50 ms / 30 ms).
pub const SCAN_INTERVAL: u16 = 0x50;
pub const SCAN_WINDOW: u16 = 0x30;

static SCAN_SINK: OnceLock<Arc<PresenceRegistry>> = OnceLock::new();

/// Decode one report and record it. Shared by the GAP callback and the
/// host simulation.
fn deliver(registry: &PresenceRegistry, address: [u8; 6], rssi: i8, data: &[u8], now_ms: u64) {
    let adv = Advertisement::from_raw(BeaconAddress::from_bytes(address), Some(rssi), data);
    registry.on_advertisement(&adv, now_ms);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    /// Controller or host stack refused to start.
    Failed,
}

pub struct BleScanner {
    registry: Arc<PresenceRegistry>,
    state: ScanState,
}

impl BleScanner {
    pub fn new(registry: Arc<PresenceRegistry>) -> Self {
        Self {
            registry,
            state: ScanState::Idle,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Start scanning. A disabled registry never powers the radio up.
    pub fn start(&mut self) {
        if self.state == ScanState::Scanning {
            return;
        }
        if !self.registry.is_enabled() {
            info!("BLE: presence disabled, scanner not started");
            return;
        }
        if SCAN_SINK.set(self.registry.clone()).is_err() {
            warn!("BLE: scan sink already installed");
        }
        self.state = if self.platform_start() {
            ScanState::Scanning
        } else {
            ScanState::Failed
        };
    }

    /// Simulation: one advertising report from the radio.
    #[cfg(not(target_os = "espidf"))]
    pub fn inject(&self, address: [u8; 6], rssi: i8, data: &[u8], now_ms: u64) {
        if self.state == ScanState::Scanning {
            deliver(&self.registry, address, rssi, data, now_ms);
        }
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self) -> bool {
        use esp_idf_svc::sys::*;

        // SAFETY: one-time stack bring-up from the main task.
        unsafe {
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            let steps: [(&str, esp_err_t); 4] = [
                ("bt_controller_init", esp_bt_controller_init(&mut bt_cfg)),
                (
                    "bt_controller_enable",
                    esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE),
                ),
                ("bluedroid_init", esp_bluedroid_init()),
                ("bluedroid_enable", esp_bluedroid_enable()),
            ];
            for (name, ret) in steps {
                if ret != ESP_OK {
                    log::error!("BLE: {} failed ({})", name, ret);
                    return false;
                }
            }

            esp_ble_gap_register_callback(Some(gap_event_handler));

            let mut params = esp_ble_scan_params_t {
                scan_type: esp_ble_scan_type_t_BLE_SCAN_TYPE_PASSIVE,
                own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
                scan_filter_policy: esp_ble_scan_filter_t_BLE_SCAN_FILTER_ALLOW_ALL,
                scan_interval: SCAN_INTERVAL,
                scan_window: SCAN_WINDOW,
                scan_duplicate: esp_ble_scan_duplicate_t_BLE_SCAN_DUPLICATE_DISABLE,
            };
            let ret = esp_ble_gap_set_scan_params(&mut params);
            if ret != ESP_OK {
                log::error!("BLE: set_scan_params failed ({})", ret);
                return false;
            }
        }
        info!("BLE(espidf): passive scan configured");
        true
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self) -> bool {
        info!("BLE(sim): scanning");
        true
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn gap_event_handler(
    event: esp_idf_svc::sys::esp_gap_ble_cb_event_t,
    param: *mut esp_idf_svc::sys::esp_ble_gap_cb_param_t,
) {
    use esp_idf_svc::sys::*;
    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_PARAM_SET_COMPLETE_EVT => {
            // Duration 0 scans until stopped.
            let ret = unsafe { esp_ble_gap_start_scanning(0) };
            if ret != ESP_OK {
                log::error!("BLE GAP: start_scanning failed ({})", ret);
            }
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_START_COMPLETE_EVT => {
            log::info!("BLE GAP: scanning");
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_RESULT_EVT => {
            // SAFETY: the stack guarantees `param` is valid for this event.
            let result = unsafe { &(*param).scan_rst };
            if result.search_evt != esp_gap_search_evt_t_ESP_GAP_SEARCH_INQ_RES_EVT {
                return;
            }
            let Some(registry) = SCAN_SINK.get() else {
                return;
            };
            let len = (result.adv_data_len as usize + result.scan_rsp_len as usize)
                .min(result.ble_adv.len());
            deliver(
                registry,
                result.bda,
                result.rssi as i8,
                &result.ble_adv[..len],
                super::time::millis(),
            );
        }
        _ => {}
    }
}
