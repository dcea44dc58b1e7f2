//! Emitter delivery configuration.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default maximum number of events pulled from the store per tick.
pub const DEFAULT_EMIT_RANGE: usize = 150;
/// Default number of concurrent request slots.
pub const DEFAULT_THREAD_POOL_SIZE: usize = 15;
/// Default byte limit for a GET request.
pub const DEFAULT_BYTE_LIMIT_GET: usize = 40_000;
/// Default byte limit for a POST request.
pub const DEFAULT_BYTE_LIMIT_POST: usize = 40_000;

/// How many events may share a single POST request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferOption {
    /// One event per request.
    #[default]
    Single,
    /// Up to 10 events per request.
    DefaultGroup,
    /// Up to 25 events per request.
    LargeGroup,
}

impl BufferOption {
    /// Maximum number of events in one request.
    pub fn group_size(self) -> usize {
        match self {
            BufferOption::Single => 1,
            BufferOption::DefaultGroup => 10,
            BufferOption::LargeGroup => 25,
        }
    }
}

/// Snapshot of the settings that drive one delivery tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    pub buffer_option: BufferOption,
    pub emit_range: usize,
    pub thread_pool_size: usize,
    pub byte_limit_get: usize,
    pub byte_limit_post: usize,
    /// Status code -> retry? Takes precedence over the default policy for
    /// every non-2xx code.
    pub custom_retry_for_status_codes: BTreeMap<u16, bool>,
    /// Ask the collector not to record client IP and network user id.
    pub server_anonymisation: bool,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            buffer_option: BufferOption::Single,
            emit_range: DEFAULT_EMIT_RANGE,
            thread_pool_size: DEFAULT_THREAD_POOL_SIZE,
            byte_limit_get: DEFAULT_BYTE_LIMIT_GET,
            byte_limit_post: DEFAULT_BYTE_LIMIT_POST,
            custom_retry_for_status_codes: BTreeMap::new(),
            server_anonymisation: false,
        }
    }
}

impl EmitterConfig {
    /// Reject values that would stall delivery.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.emit_range == 0 {
            return Err(ConfigError::Invalid("emit_range must be at least 1".into()));
        }
        if self.thread_pool_size == 0 {
            return Err(ConfigError::Invalid(
                "thread_pool_size must be at least 1".into(),
            ));
        }
        if self.byte_limit_get == 0 || self.byte_limit_post == 0 {
            return Err(ConfigError::Invalid("byte limits must be non-zero".into()));
        }
        Ok(())
    }
}

/// Partial override of an [`EmitterConfig`]. Unset fields leave the base
/// value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_option: Option<BufferOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emit_range: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_pool_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_limit_get: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_limit_post: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_retry_for_status_codes: Option<BTreeMap<u16, bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_anonymisation: Option<bool>,
}

impl EmitterConfigUpdate {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fold the set fields over `base`.
    pub fn apply(&self, base: &EmitterConfig) -> EmitterConfig {
        EmitterConfig {
            buffer_option: self.buffer_option.unwrap_or(base.buffer_option),
            emit_range: self.emit_range.unwrap_or(base.emit_range),
            thread_pool_size: self.thread_pool_size.unwrap_or(base.thread_pool_size),
            byte_limit_get: self.byte_limit_get.unwrap_or(base.byte_limit_get),
            byte_limit_post: self.byte_limit_post.unwrap_or(base.byte_limit_post),
            custom_retry_for_status_codes: self
                .custom_retry_for_status_codes
                .clone()
                .unwrap_or_else(|| base.custom_retry_for_status_codes.clone()),
            server_anonymisation: self
                .server_anonymisation
                .unwrap_or(base.server_anonymisation),
        }
    }

    /// Combine two updates; fields set in `other` win.
    pub fn merge(self, other: EmitterConfigUpdate) -> EmitterConfigUpdate {
        EmitterConfigUpdate {
            buffer_option: other.buffer_option.or(self.buffer_option),
            emit_range: other.emit_range.or(self.emit_range),
            thread_pool_size: other.thread_pool_size.or(self.thread_pool_size),
            byte_limit_get: other.byte_limit_get.or(self.byte_limit_get),
            byte_limit_post: other.byte_limit_post.or(self.byte_limit_post),
            custom_retry_for_status_codes: other
                .custom_retry_for_status_codes
                .or(self.custom_retry_for_status_codes),
            server_anonymisation: other.server_anonymisation.or(self.server_anonymisation),
        }
    }
}
