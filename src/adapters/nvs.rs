//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] (gateway configuration as a postcard blob) and
//! [`StoragePort`] (raw namespaced blobs, used for the pin configuration).
//!
//! - **`target_os = "espidf"`**: ESP-IDF `nvs_*` API on the default
//!   partition. Each write is committed, which makes it atomic.
//! - **`not(target_os = "espidf")`**: an in-memory map keyed by
//!   `namespace::key`.

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::GatewayConfig;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

pub const CONFIG_NAMESPACE: &str = "lockhub";
pub const CONFIG_KEY: &str = "gwcfg";

/// NVS keys and namespaces are limited to 15 characters.
const NVS_NAME_LEN: usize = 15;
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

/// Adapter over an uninitialised partition: every access fails and
/// configuration falls back to defaults.
impl Default for NvsAdapter {
    fn default() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        }
    }
}

impl NvsAdapter {
    /// Initialise NVS flash.
    ///
    /// A partition that is full or was written by a newer IDF version is
    /// erased and re-initialised.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS use.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NVS: initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NVS: simulation backend");

        Ok(Self::default())
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// NUL-terminated copy of an NVS name, truncated to the IDF limit.
    #[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
    fn c_name(name: &str) -> [u8; NVS_NAME_LEN + 1] {
        let mut buf = [0u8; NVS_NAME_LEN + 1];
        let len = name.len().min(NVS_NAME_LEN);
        buf[..len].copy_from_slice(&name.as_bytes()[..len]);
        buf
    }

    /// Open a namespace, run `f` with the handle, close it again.
    #[cfg(target_os = "espidf")]
    fn with_handle<T>(
        namespace: &str,
        write: bool,
        f: impl FnOnce(nvs_handle_t) -> Result<T, i32>,
    ) -> Result<T, i32> {
        let ns = Self::c_name(namespace);
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        unsafe { nvs_close(handle) };
        result
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(namespace: &str, key: &str) -> Result<Vec<u8>, i32> {
        let key = Self::c_name(key);
        Self::with_handle(namespace, false, |handle| {
            let mut size: usize = 0;
            let ret = unsafe {
                nvs_get_blob(handle, key.as_ptr() as *const _, core::ptr::null_mut(), &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH);
            }
            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(handle, key.as_ptr() as *const _, buf.as_mut_ptr() as *mut _, &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            buf.truncate(size);
            Ok(buf)
        })
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(namespace: &str, key: &str, data: &[u8]) -> Result<(), i32> {
        let key = Self::c_name(key);
        Self::with_handle(namespace, true, |handle| {
            let ret = unsafe {
                nvs_set_blob(handle, key.as_ptr() as *const _, data.as_ptr() as *const _, data.len())
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            match unsafe { nvs_commit(handle) } {
                ESP_OK => Ok(()),
                e => Err(e),
            }
        })
    }
}

fn validate_config(cfg: &GatewayConfig) -> Result<(), ConfigError> {
    if cfg.hostname.is_empty() {
        return Err(ConfigError::ValidationFailed("hostname must not be empty"));
    }
    if !cfg
        .hostname
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-')
    {
        return Err(ConfigError::ValidationFailed(
            "hostname may only contain letters, digits and '-'",
        ));
    }
    if cfg.root_path.is_empty() {
        return Err(ConfigError::ValidationFailed("root_path must not be empty"));
    }
    if cfg.root_path.ends_with('/') || cfg.root_path.contains(['#', '+']) {
        return Err(ConfigError::ValidationFailed(
            "root_path must not end in '/' or contain wildcards",
        ));
    }
    if cfg.broker_port == 0 {
        return Err(ConfigError::ValidationFailed("broker_port must be 1–65535"));
    }
    if cfg.network_timeout_secs == 0 || cfg.network_timeout_secs < -1 {
        return Err(ConfigError::ValidationFailed(
            "network_timeout_secs must be -1 or positive",
        ));
    }
    if cfg.presence_publish_interval_secs == 0 {
        return Err(ConfigError::ValidationFailed(
            "presence_publish_interval_secs must be positive",
        ));
    }
    if !(5..=3600).contains(&cfg.maintenance_interval_secs) {
        return Err(ConfigError::ValidationFailed(
            "maintenance_interval_secs must be 5–3600",
        ));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<GatewayConfig, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        let stored = self
            .store
            .borrow()
            .get(&Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY))
            .cloned();

        #[cfg(target_os = "espidf")]
        let stored = match Self::read_blob(CONFIG_NAMESPACE, CONFIG_KEY) {
            Ok(bytes) => Some(bytes),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => None,
            Err(e) => {
                warn!("NVS: config read error {}, using defaults", e);
                None
            }
        };

        let Some(bytes) = stored else {
            info!("NVS: no stored config, using defaults");
            return Ok(GatewayConfig::default());
        };
        let cfg: GatewayConfig = postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
        info!("NVS: loaded config ({} bytes)", bytes.len());
        Ok(cfg)
    }

    fn save(&self, config: &GatewayConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;

        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .insert(Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY), bytes);
            info!("NVS: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        match Self::write_blob(CONFIG_NAMESPACE, CONFIG_KEY, &bytes) {
            Ok(()) => {
                info!("NVS: config saved ({} bytes)", bytes.len());
                Ok(())
            }
            Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE => Err(ConfigError::StorageFull),
            Err(e) => {
                warn!("NVS: config write error {}", e);
                Err(ConfigError::IoError)
            }
        }
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let store = self.store.borrow();
            let data = store
                .get(&Self::composite_key(namespace, key))
                .ok_or(StorageError::NotFound)?;
            let len = data.len().min(buf.len());
            buf[..len].copy_from_slice(&data[..len]);
            Ok(len)
        }

        #[cfg(target_os = "espidf")]
        match Self::read_blob(namespace, key) {
            Ok(data) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok(len)
            }
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
            Err(_) => Err(StorageError::IoError),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .insert(Self::composite_key(namespace, key), data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        Self::write_blob(namespace, key, data).map_err(|e| {
            if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                StorageError::Full
            } else {
                StorageError::IoError
            }
        })
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .remove(&Self::composite_key(namespace, key));
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::c_name(key);
            Self::with_handle(namespace, true, |handle| {
                let ret = unsafe { nvs_erase_key(handle, key.as_ptr() as *const _) };
                if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                    return Err(ret);
                }
                match unsafe { nvs_commit(handle) } {
                    ESP_OK => Ok(()),
                    e => Err(e),
                }
            })
            .map_err(|_| StorageError::IoError)
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow()
                .contains_key(&Self::composite_key(namespace, key))
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::c_name(key);
            Self::with_handle(namespace, false, |handle| {
                let ret = unsafe {
                    nvs_find_key(handle, key.as_ptr() as *const _, core::ptr::null_mut())
                };
                Ok(ret == ESP_OK)
            })
            .unwrap_or(false)
        }
    }
}
