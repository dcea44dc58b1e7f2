//! Collector endpoint settings.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Collector path for single-event GET requests.
pub const GET_PATH: &str = "/i";
/// Default collector path for POST requests.
pub const DEFAULT_POST_PATH: &str = "/com.snowplowanalytics.snowplow/tp2";
/// Default per-request network timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP method used to deliver events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

impl FromStr for HttpMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "post" => Ok(HttpMethod::Post),
            other => Err(ConfigError::Invalid(format!("unknown HTTP method: {other}"))),
        }
    }
}

/// Scheme assumed when the endpoint does not name one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    #[default]
    Https,
}

/// Where and how requests are sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Collector host, with or without scheme.
    pub endpoint: String,
    pub method: HttpMethod,
    pub protocol: Protocol,
    /// Replaces the vendor POST path when set.
    pub custom_post_path: Option<String>,
    /// Extra headers added to every request.
    pub request_headers: BTreeMap<String, String>,
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            method: HttpMethod::Post,
            protocol: Protocol::Https,
            custom_post_path: None,
            request_headers: BTreeMap::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl NetworkConfig {
    /// Config for `endpoint` with every other field at its default.
    pub fn new(endpoint: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            ..Default::default()
        }
    }

    /// Full URL requests are sent to.
    pub fn collector_url(&self) -> ConfigResult<Url> {
        let trimmed = self.endpoint.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::Invalid("collector endpoint is empty".into()));
        }

        let mut base = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            let scheme = match self.protocol {
                Protocol::Http => "http",
                Protocol::Https => "https",
            };
            format!("{scheme}://{trimmed}")
        };
        while base.ends_with('/') {
            base.pop();
        }

        let path = match self.method {
            HttpMethod::Get => GET_PATH.to_string(),
            HttpMethod::Post => match &self.custom_post_path {
                Some(custom) if custom.starts_with('/') => custom.clone(),
                Some(custom) => format!("/{custom}"),
                None => DEFAULT_POST_PATH.to_string(),
            },
        };

        Ok(Url::parse(&format!("{base}{path}"))?)
    }
}
