//! Release manifest fetch over HTTPS.
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::http::client::EspHttpConnection`
//!   with the built-in certificate bundle. A fresh connection is opened per
//!   fetch; the check runs once a day.
//! - **all other targets**: returns a body set by the caller.

use log::warn;

use crate::app::ports::ManifestSource;

/// Largest manifest accepted, in bytes.
pub const MAX_MANIFEST_LEN: usize = 4096;

pub struct HttpManifestSource {
    url: String,
    #[cfg(not(target_os = "espidf"))]
    sim_body: Option<String>,
}

impl HttpManifestSource {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.into(),
            #[cfg(not(target_os = "espidf"))]
            sim_body: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Simulation: body served by the next fetches (`None` = unreachable).
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_serve(&mut self, body: Option<&str>) {
        self.sim_body = body.map(Into::into);
    }

    #[cfg(target_os = "espidf")]
    fn get(&self) -> Result<String, esp_idf_svc::sys::EspError> {
        use esp_idf_svc::http::Method;
        use esp_idf_svc::http::client::{Configuration, EspHttpConnection};

        let config = Configuration {
            timeout: Some(core::time::Duration::from_secs(10)),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let mut conn = EspHttpConnection::new(&config)?;
        conn.initiate_request(Method::Get, &self.url, &[])?;
        conn.initiate_response()?;

        let status = conn.status();
        if status != 200 && status != 301 {
            warn!("Update: manifest request returned HTTP {}", status);
            return Ok(String::new());
        }

        let mut body = Vec::with_capacity(1024);
        let mut chunk = [0u8; 512];
        loop {
            let n = conn.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            if body.len() + n > MAX_MANIFEST_LEN {
                warn!("Update: manifest exceeds {} bytes", MAX_MANIFEST_LEN);
                return Ok(String::new());
            }
            body.extend_from_slice(&chunk[..n]);
        }
        Ok(String::from_utf8(body).unwrap_or_default())
    }
}

impl ManifestSource for HttpManifestSource {
    #[cfg(target_os = "espidf")]
    fn fetch(&mut self) -> Option<String> {
        match self.get() {
            Ok(body) if !body.is_empty() => Some(body),
            Ok(_) => None,
            Err(e) => {
                warn!("Update: manifest fetch from {} failed: {}", self.url, e);
                None
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn fetch(&mut self) -> Option<String> {
        if self.sim_body.is_none() {
            warn!("Update(sim): {} unreachable", self.url);
        }
        self.sim_body.clone()
    }
}
