/*!
 * Runtime Configuration
 *
 * Sizing for the closure table, payload bound, and guest memory
 */

use super::limits::{
    DEFAULT_GUEST_MEMORY, DEFAULT_TABLE_CAPACITY, MAX_TABLE_CAPACITY, MAX_USER_DATA,
    RESTRICTED_GUEST_MEMORY, RESTRICTED_TABLE_CAPACITY, RESTRICTED_USER_DATA,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

/// Environment variable overriding [`RuntimeConfig::table_capacity`]
pub const ENV_TABLE_CAPACITY: &str = "CLOSURE_TABLE_CAPACITY";
/// Environment variable overriding [`RuntimeConfig::max_user_data`]
pub const ENV_MAX_USER_DATA: &str = "CLOSURE_MAX_USER_DATA";
/// Environment variable overriding [`RuntimeConfig::memory_size`]
pub const ENV_GUEST_MEMORY: &str = "CLOSURE_GUEST_MEMORY";

/// Closure runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RuntimeConfig {
    /// Maximum number of simultaneously live closures
    pub table_capacity: usize,
    /// Maximum user payload copied per signature
    pub max_user_data: usize,
    /// Guest linear memory size in bytes
    pub memory_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            table_capacity: DEFAULT_TABLE_CAPACITY,
            max_user_data: MAX_USER_DATA,
            memory_size: DEFAULT_GUEST_MEMORY,
        }
    }
}

impl RuntimeConfig {
    /// Configuration for untrusted guests and tests
    pub const fn minimal() -> Self {
        Self {
            table_capacity: RESTRICTED_TABLE_CAPACITY,
            max_user_data: RESTRICTED_USER_DATA,
            memory_size: RESTRICTED_GUEST_MEMORY,
        }
    }

    /// Defaults overridden by `CLOSURE_*` environment variables
    ///
    /// Unparsable values are logged and ignored.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            table_capacity: env_or(ENV_TABLE_CAPACITY, defaults.table_capacity),
            max_user_data: env_or(ENV_MAX_USER_DATA, defaults.max_user_data),
            memory_size: env_or(ENV_GUEST_MEMORY, defaults.memory_size),
        }
        .normalized()
    }

    pub fn with_table_capacity(mut self, capacity: usize) -> Self {
        self.table_capacity = capacity;
        self.normalized()
    }

    pub fn with_max_user_data(mut self, bytes: usize) -> Self {
        self.max_user_data = bytes;
        self
    }

    pub fn with_memory_size(mut self, bytes: usize) -> Self {
        self.memory_size = bytes;
        self
    }

    fn normalized(mut self) -> Self {
        if self.table_capacity > MAX_TABLE_CAPACITY {
            warn!(
                requested = self.table_capacity,
                max = MAX_TABLE_CAPACITY,
                "Table capacity clamped"
            );
            self.table_capacity = MAX_TABLE_CAPACITY;
        }
        self
    }
}

fn env_or<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, "Ignoring unparsable configuration value");
                default
            }
        },
        Err(_) => default,
    }
}
