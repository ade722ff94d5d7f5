//! Advertisement decoding: addresses, names, iBeacon frames and
//! environmental sensor service data.
//!
//! ## Recognised AD structures
//!
//! | Type   | Meaning                   | Used for                       |
//! |--------|---------------------------|--------------------------------|
//! | `0x08` | Shortened local name      | display name                   |
//! | `0x09` | Complete local name       | display name (preferred)       |
//! | `0xFF` | Manufacturer specific     | iBeacon proximity UUID as name |
//! | `0x16` | Service data, 16-bit UUID | `0x181A` sensor payload        |

use core::fmt;
use core::fmt::Write as _;
use core::str::FromStr;

use heapless::String;

/// Longest display name kept per beacon, in bytes.
pub const MAX_NAME_LEN: usize = 36;

const AD_SHORT_NAME: u8 = 0x08;
const AD_COMPLETE_NAME: u8 = 0x09;
const AD_SERVICE_DATA_16: u8 = 0x16;
const AD_MANUFACTURER: u8 = 0xFF;

const APPLE_COMPANY_ID: [u8; 2] = [0x4C, 0x00];
const IBEACON_LEN: usize = 25;
const ENV_SENSING_UUID: [u8; 2] = [0x1A, 0x18];

// ── Address ───────────────────────────────────────────────────

/// 48-bit radio address packed into the low bytes of a `u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BeaconAddress(u64);

impl BeaconAddress {
    /// From the six address bytes, most significant first.
    pub fn from_bytes(bytes: [u8; 6]) -> Self {
        let mut raw = [0u8; 8];
        raw[2..].copy_from_slice(&bytes);
        Self(u64::from_be_bytes(raw))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn to_bytes(self) -> [u8; 6] {
        let raw = self.0.to_be_bytes();
        let mut out = [0u8; 6];
        out.copy_from_slice(&raw[2..]);
        out
    }
}

impl fmt::Display for BeaconAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.to_bytes();
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidAddress;

impl FromStr for BeaconAddress {
    type Err = InvalidAddress;

    /// Accepts `aa:bb:cc:dd:ee:ff` in either case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for byte in &mut bytes {
            let part = parts.next().ok_or(InvalidAddress)?;
            if part.len() != 2 {
                return Err(InvalidAddress);
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| InvalidAddress)?;
        }
        if parts.next().is_some() {
            return Err(InvalidAddress);
        }
        Ok(Self::from_bytes(bytes))
    }
}

// ── Sensor payload ────────────────────────────────────────────

/// Environmental reading carried in `0x181A` service data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorPayload {
    /// Hundredths of a degree Celsius.
    pub temperature_centi: i16,
    /// Hundredths of a percent relative humidity.
    pub humidity_centi: u16,
    pub battery_mv: u16,
    /// Battery level in percent.
    pub battery_level: u8,
}

impl SensorPayload {
    /// Write `;temperature;humidity;voltage;level` with two decimals for the
    /// first two fields and volts with three decimals.
    pub fn write_fields(&self, out: &mut impl fmt::Write) -> fmt::Result {
        let t = i32::from(self.temperature_centi);
        let sign = if t < 0 { "-" } else { "" };
        let t = t.unsigned_abs();
        write!(out, ";{}{}.{:02}", sign, t / 100, t % 100)?;
        write!(
            out,
            ";{}.{:02}",
            self.humidity_centi / 100,
            self.humidity_centi % 100
        )?;
        write!(out, ";{}.{:03}", self.battery_mv / 1000, self.battery_mv % 1000)?;
        write!(out, ";{}", self.battery_level)
    }
}

/// Decode the data following the `0x181A` UUID.
///
/// - 15 bytes: custom format (little-endian, 0.01 units)
/// - 13 bytes: ATC1441 format (big-endian, 0.1 °C and whole-percent humidity)
pub fn parse_env_sensor(data: &[u8]) -> Option<SensorPayload> {
    match data.len() {
        15 => {
            let temp = i16::from_le_bytes([data[6], data[7]]);
            let hum = u16::from_le_bytes([data[8], data[9]]);
            let mv = u16::from_le_bytes([data[10], data[11]]);
            Some(SensorPayload {
                temperature_centi: temp,
                humidity_centi: hum,
                battery_mv: mv,
                battery_level: data[12].min(100),
            })
        }
        13 => {
            let temp_deci = i16::from_be_bytes([data[6], data[7]]);
            let mv = u16::from_be_bytes([data[10], data[11]]);
            Some(SensorPayload {
                temperature_centi: temp_deci.saturating_mul(10),
                humidity_centi: u16::from(data[8].min(100)) * 100,
                battery_mv: mv,
                battery_level: data[9].min(100),
            })
        }
        _ => None,
    }
}

// ── Advertisement ─────────────────────────────────────────────

/// One sighting as handed to the presence registry. Absent fields leave the
/// stored values untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub address: BeaconAddress,
    pub name: Option<String<MAX_NAME_LEN>>,
    pub rssi: Option<i8>,
    pub sensor: Option<SensorPayload>,
}

impl Advertisement {
    pub fn new(address: BeaconAddress) -> Self {
        Self {
            address,
            name: None,
            rssi: None,
            sensor: None,
        }
    }

    pub fn with_rssi(mut self, rssi: i8) -> Self {
        self.rssi = Some(rssi);
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(bounded_name(name));
        self
    }

    pub fn with_sensor(mut self, sensor: SensorPayload) -> Self {
        self.sensor = Some(sensor);
        self
    }

    /// Build from raw advertising / scan-response bytes.
    pub fn from_raw(address: BeaconAddress, rssi: Option<i8>, data: &[u8]) -> Self {
        let fields = parse_ad_structures(data);
        Self {
            address,
            name: fields.name,
            rssi,
            sensor: fields.sensor,
        }
    }
}

/// Name truncated to [`MAX_NAME_LEN`] bytes on a character boundary.
///
/// `;` and control characters become `_` so a received name can never
/// split a snapshot line or add a field.
pub fn bounded_name(name: &str) -> String<MAX_NAME_LEN> {
    let mut out = String::new();
    for c in name.chars() {
        let c = if c == ';' || c.is_control() { '_' } else { c };
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Fields extracted from an AD payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdFields {
    pub name: Option<String<MAX_NAME_LEN>>,
    pub sensor: Option<SensorPayload>,
}

/// Walk the length-type-value AD structures. Truncated or zero-length
/// structures end the walk; nothing here can panic on hostile input.
pub fn parse_ad_structures(data: &[u8]) -> AdFields {
    let mut fields = AdFields::default();
    let mut short_name = None;
    let mut beacon_name = None;
    let mut rest = data;

    while let Some((&len, tail)) = rest.split_first() {
        let len = len as usize;
        if len == 0 || len > tail.len() {
            break;
        }
        let (structure, next) = tail.split_at(len);
        rest = next;
        let Some((&ad_type, value)) = structure.split_first() else {
            break;
        };

        match ad_type {
            AD_COMPLETE_NAME => {
                if let Ok(s) = core::str::from_utf8(value) {
                    fields.name = Some(bounded_name(s));
                }
            }
            AD_SHORT_NAME => {
                if let Ok(s) = core::str::from_utf8(value) {
                    short_name = Some(bounded_name(s));
                }
            }
            AD_MANUFACTURER => {
                if let Some(uuid) = ibeacon_uuid(value) {
                    beacon_name = Some(uuid);
                }
            }
            AD_SERVICE_DATA_16 => {
                if value.len() > 2 && value[..2] == ENV_SENSING_UUID {
                    fields.sensor = parse_env_sensor(&value[2..]).or(fields.sensor);
                }
            }
            _ => {}
        }
    }

    if fields.name.is_none() {
        fields.name = short_name.or(beacon_name);
    }
    fields
}

/// Proximity UUID of an iBeacon manufacturer record, formatted
/// `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`.
pub fn ibeacon_uuid(manufacturer_data: &[u8]) -> Option<String<MAX_NAME_LEN>> {
    if manufacturer_data.len() != IBEACON_LEN || manufacturer_data[..2] != APPLE_COMPANY_ID {
        return None;
    }
    // [0..2] company, [2] type 0x02, [3] length 0x15, [4..20] UUID
    if manufacturer_data[2] != 0x02 || manufacturer_data[3] != 0x15 {
        return None;
    }
    let uuid = &manufacturer_data[4..20];
    let mut out = String::new();
    for (i, b) in uuid.iter().enumerate() {
        if matches!(i, 4 | 6 | 8 | 10) {
            out.push('-').ok()?;
        }
        write!(out, "{:02x}", b).ok()?;
    }
    Some(out)
}
