//! Registry configuration

use chrono::Duration;
use escrowkit_types::AccountId;
use serde::{Deserialize, Serialize};

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Account that owns this registry instance
    #[serde(default = "default_owner")]
    pub owner: AccountId,

    /// Reject deadlines further than this many seconds in the future
    #[serde(default)]
    pub max_deadline_horizon_secs: Option<u64>,

    /// Capacity of the broadcast channel for live event subscribers
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_owner() -> AccountId {
    AccountId::new("owner")
}

fn default_event_buffer() -> usize {
    1024
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            max_deadline_horizon_secs: None,
            event_buffer: default_event_buffer(),
        }
    }
}

impl RegistryConfig {
    /// Create config from environment variables
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Self {
        Self {
            owner: std::env::var("ESCROW_OWNER")
                .ok()
                .filter(|s| !s.is_empty())
                .map(AccountId::new)
                .unwrap_or_else(default_owner),
            max_deadline_horizon_secs: std::env::var("ESCROW_MAX_DEADLINE_HORIZON_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
            event_buffer: std::env::var("ESCROW_EVENT_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or_else(default_event_buffer),
        }
    }

    pub fn with_owner(mut self, owner: impl Into<AccountId>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn with_max_deadline_horizon(mut self, secs: u64) -> Self {
        self.max_deadline_horizon_secs = Some(secs);
        self
    }

    /// Maximum allowed distance between now and a new deadline
    pub fn max_deadline_horizon(&self) -> Option<Duration> {
        self.max_deadline_horizon_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(Duration::try_seconds)
    }
}
