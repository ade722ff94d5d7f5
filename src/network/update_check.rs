//! Daily "is there a newer firmware" check.
//!
//! The manifest is a small JSON document with one entry per channel:
//!
//! ```json
//! { "release": { "version": "1.2", "fullversion": "1.2.0" },
//!   "beta":    { "version": "1.3", "fullversion": "1.3.0-beta" },
//!   "master":  { "version": "1.3", "fullversion": "1.3.0-master" } }
//! ```
//!
//! Only the advertised version string is published; downloading and
//! flashing firmware happens elsewhere.

use log::warn;
use serde::Deserialize;

/// Minimum spacing between two manifest fetches.
pub const UPDATE_CHECK_INTERVAL_MS: u64 = 86_400_000;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChannelInfo {
    #[serde(default)]
    pub version: std::string::String,
    #[serde(default)]
    pub fullversion: std::string::String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReleaseManifest {
    #[serde(default)]
    pub release: ChannelInfo,
    #[serde(default)]
    pub beta: ChannelInfo,
    #[serde(default)]
    pub master: ChannelInfo,
}

impl ReleaseManifest {
    pub fn parse(json: &str) -> Option<Self> {
        match serde_json::from_str(json) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!("Update: manifest unreadable: {}", e);
                None
            }
        }
    }

    /// Version the running firmware should be compared against.
    ///
    /// A release at least as new as `current` always wins; otherwise a
    /// pre-release build follows its own channel.
    pub fn latest_for(&self, current: &str) -> &str {
        if leading_number(&self.release.version) >= leading_number(current) {
            return &self.release.fullversion;
        }
        if contains_after_start(current, "beta") {
            &self.beta.fullversion
        } else if contains_after_start(current, "master") {
            &self.master.fullversion
        } else {
            &self.release.fullversion
        }
    }
}

/// Leading `digits[.digits]` of `s` as a float; 0 when there is none.
fn leading_number(s: &str) -> f64 {
    let s = s.trim_start();
    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in s.char_indices() {
        if c.is_ascii_digit() {
            end = i + 1;
        } else if c == '.' && !seen_dot {
            seen_dot = true;
        } else {
            break;
        }
    }
    s[..end].parse().unwrap_or(0.0)
}

fn contains_after_start(haystack: &str, needle: &str) -> bool {
    haystack.find(needle).is_some_and(|i| i > 0)
}
