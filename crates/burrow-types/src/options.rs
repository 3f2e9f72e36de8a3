//! Typed client options.
//!
//! Options are an explicitly enumerated, typed set rather than a free-form
//! string map: unknown keys and badly typed values are rejected at
//! set-time, and the whole struct can be populated from a TOML rc file.

use serde::Deserialize;

use crate::error::{BurrowError, Result};

/// All runtime-tunable client options.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ClientOptions {
    /// Prefer IPv6 addresses when resolving hosts. When false, only IPv4
    /// candidates are tried.
    pub ipv6: bool,
    /// Enforced-encryption mode: every fetch is upgraded to TLS.
    pub tls_only: bool,
    /// Fallback text encoding label, tried after UTF-8 and the detector.
    pub encoding: String,
    /// Number of lookup entries shown per blank-line page.
    pub page_size: usize,
    /// TCP connect timeout in seconds.
    pub connect_timeout: u64,
    /// Socket read timeout in seconds.
    pub read_timeout: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            ipv6: true,
            tls_only: false,
            encoding: "iso-8859-1".to_string(),
            page_size: 10,
            connect_timeout: 10,
            read_timeout: 15,
        }
    }
}

/// The full option key list, for `set` validation and help output.
pub const OPTION_KEYS: &[&str] = &[
    "ipv6",
    "tls_only",
    "encoding",
    "page_size",
    "connect_timeout",
    "read_timeout",
];

impl ClientOptions {
    /// Parse options from a TOML document. Unknown keys are a hard error.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| BurrowError::Config(e.to_string()))
    }

    /// Set one option from string input, validating key and value type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let result = self.apply(key, value);
        if let Err(e) = &result {
            log::debug!("rejected option set {key}={value:?}: {e}");
        }
        result
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "ipv6" => self.ipv6 = parse_bool(key, value)?,
            "tls_only" => self.tls_only = parse_bool(key, value)?,
            "encoding" => {
                if value.is_empty() {
                    return Err(BurrowError::Config("encoding must not be empty".into()));
                }
                self.encoding = value.to_string();
            },
            "page_size" => {
                let n = parse_int(key, value)?;
                if n == 0 {
                    return Err(BurrowError::Config("page_size must be positive".into()));
                }
                self.page_size = n as usize;
            },
            "connect_timeout" => self.connect_timeout = parse_int(key, value)?,
            "read_timeout" => self.read_timeout = parse_int(key, value)?,
            unknown => {
                return Err(BurrowError::Config(format!("unknown option: {unknown}")));
            },
        }
        Ok(())
    }

    /// Read one option as a display string.
    pub fn get(&self, key: &str) -> Result<String> {
        let value = match key {
            "ipv6" => self.ipv6.to_string(),
            "tls_only" => self.tls_only.to_string(),
            "encoding" => self.encoding.clone(),
            "page_size" => self.page_size.to_string(),
            "connect_timeout" => self.connect_timeout.to_string(),
            "read_timeout" => self.read_timeout.to_string(),
            unknown => {
                return Err(BurrowError::Config(format!("unknown option: {unknown}")));
            },
        };
        Ok(value)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => Err(BurrowError::Config(format!(
            "option {key} expects a boolean, got {other:?}"
        ))),
    }
}

fn parse_int(key: &str, value: &str) -> Result<u64> {
    value.parse().map_err(|_| {
        BurrowError::Config(format!("option {key} expects an integer, got {value:?}"))
    })
}
