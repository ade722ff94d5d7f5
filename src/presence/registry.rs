//! Freshness-windowed registry of observed beacons.
//!
//! Written from the radio scan callback, read from the main loop. A single
//! `Mutex` serialises both; the critical sections hold only map operations.
//! Stale records are filtered when a snapshot is built, never deleted on
//! read. The table is capped: inserting a new address into a full table
//! evicts the least recently seen record.

use core::fmt::Write as _;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use heapless::String;
use log::info;

use super::advert::{Advertisement, BeaconAddress, MAX_NAME_LEN, SensorPayload};

/// Marker published when no beacon is fresh.
pub const EMPTY_SNAPSHOT: &str = ";;";
/// Marker published when presence detection is turned off.
pub const DISABLED_SNAPSHOT: &str = "disabled";

/// Default number of tracked beacons.
pub const DEFAULT_CAPACITY: usize = 128;

/// Longest serialised record:
/// `addr(17);name(36);rssi(4);temp(7);hum(6);volt(6);level(3)\n`
pub const MAX_RECORD_LEN: usize = 17 + 1 + MAX_NAME_LEN + 1 + 4 + 1 + 7 + 1 + 6 + 1 + 6 + 1 + 3 + 1;

/// Snapshot buffer size used by the connectivity manager.
pub const SNAPSHOT_LEN: usize = 2048;

const NO_NAME: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconRecord {
    pub address: BeaconAddress,
    pub name: String<MAX_NAME_LEN>,
    pub last_seen_ms: u64,
    pub rssi: Option<i8>,
    pub sensor: Option<SensorPayload>,
}

impl BeaconRecord {
    fn new(address: BeaconAddress, now_ms: u64) -> Self {
        Self {
            address,
            name: String::try_from(NO_NAME).unwrap_or_default(),
            last_seen_ms: now_ms,
            rssi: None,
            sensor: None,
        }
    }

    /// Merge a sighting; absent fields keep their stored values.
    fn apply(&mut self, adv: &Advertisement, now_ms: u64) {
        self.last_seen_ms = now_ms;
        if let Some(name) = &adv.name {
            if !name.is_empty() {
                self.name = name.clone();
            }
        }
        if adv.rssi.is_some() {
            self.rssi = adv.rssi;
        }
        if adv.sensor.is_some() {
            self.sensor = adv.sensor;
        }
    }

    fn write_line(&self, out: &mut impl core::fmt::Write) -> core::fmt::Result {
        write!(out, "{};{};", self.address, self.name)?;
        if let Some(rssi) = self.rssi {
            write!(out, "{}", rssi)?;
        }
        if let Some(sensor) = &self.sensor {
            sensor.write_fields(out)?;
        }
        out.write_char('\n')
    }
}

pub struct PresenceRegistry {
    timeout_ms: i64,
    capacity: usize,
    devices: Mutex<HashMap<u64, BeaconRecord>>,
}

impl PresenceRegistry {
    /// `timeout_ms <= 0` disables the registry.
    pub fn new(timeout_ms: i64) -> Self {
        Self::with_capacity(timeout_ms, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(timeout_ms: i64, capacity: usize) -> Self {
        if timeout_ms > 0 {
            info!("Presence: timeout {} ms, tracking up to {} beacons", timeout_ms, capacity);
        } else {
            info!("Presence: disabled");
        }
        Self {
            timeout_ms,
            capacity: capacity.max(1),
            devices: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.timeout_ms > 0
    }

    pub fn timeout_ms(&self) -> i64 {
        self.timeout_ms
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, BeaconRecord>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a sighting. Called from the scan callback context.
    pub fn on_advertisement(&self, adv: &Advertisement, now_ms: u64) {
        if !self.is_enabled() {
            return;
        }
        let key = adv.address.as_u64();
        let mut devices = self.lock();

        if let Some(record) = devices.get_mut(&key) {
            record.apply(adv, now_ms);
            return;
        }

        if devices.len() >= self.capacity {
            let oldest = devices
                .values()
                .min_by_key(|r| r.last_seen_ms)
                .map(|r| r.address.as_u64());
            if let Some(oldest) = oldest {
                devices.remove(&oldest);
            }
        }

        let mut record = BeaconRecord::new(adv.address, now_ms);
        record.apply(adv, now_ms);
        devices.insert(key, record);
    }

    /// Copy of one record, fresh or not.
    pub fn get(&self, address: BeaconAddress) -> Option<BeaconRecord> {
        self.lock().get(&address.as_u64()).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialise records seen less than `timeout_ms` before `now_ms` into
    /// `out` (cleared first), one per line, most recently seen first.
    ///
    /// Stops before a record that might not fit. Writes
    /// [`EMPTY_SNAPSHOT`] when nothing is fresh and [`DISABLED_SNAPSHOT`]
    /// when the registry is disabled. `N` must hold at least one
    /// worst-case record.
    pub fn snapshot_into<const N: usize>(&self, timeout_ms: i64, now_ms: u64, out: &mut String<N>) {
        const { assert!(N >= MAX_RECORD_LEN, "snapshot buffer smaller than one record") };
        out.clear();
        if !self.is_enabled() {
            let _ = out.push_str(DISABLED_SNAPSHOT);
            return;
        }

        {
            let devices = self.lock();
            let mut fresh: std::vec::Vec<&BeaconRecord> = devices
                .values()
                .filter(|r| (now_ms.saturating_sub(r.last_seen_ms) as i64) < timeout_ms)
                .collect();
            fresh.sort_unstable_by(|a, b| {
                b.last_seen_ms
                    .cmp(&a.last_seen_ms)
                    .then(a.address.cmp(&b.address))
            });

            for record in fresh {
                if N - out.len() < MAX_RECORD_LEN {
                    break;
                }
                let mark = out.len();
                if record.write_line(out).is_err() {
                    out.truncate(mark);
                    break;
                }
            }
        }

        if out.is_empty() {
            let _ = out.push_str(EMPTY_SNAPSHOT);
        } else if out.ends_with('\n') {
            out.pop();
        }
    }

    /// Convenience wrapper around [`snapshot_into`](Self::snapshot_into).
    pub fn snapshot(&self, timeout_ms: i64, now_ms: u64) -> String<SNAPSHOT_LEN> {
        let mut out = String::new();
        self.snapshot_into(timeout_ms, now_ms, &mut out);
        out
    }
}
