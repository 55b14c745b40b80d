//! Consumer group configuration
//!
//! `GroupConfig` carries every option the group recognizes; unknown options
//! are unrepresentable. Defaults match the classic client behavior and are
//! exported as constants so applications can reference them directly.

use std::time::Duration;

/// Default maximum fetch size in bytes (1 MiB)
pub const DEFAULT_MAX_BYTES: u32 = 1024 * 1024;

/// Default maximum fetch wait in milliseconds
pub const DEFAULT_MAX_WAIT_MS: u64 = 100;

/// Default minimum fetch size in bytes
pub const DEFAULT_MIN_BYTES: u32 = 0;

/// Default cap on claim attempts (see [`GroupConfig::claim_timeout`])
pub const DEFAULT_CLAIM_TIMEOUT: Duration = Duration::from_secs(30);

/// Default idle sleep between `fetch_loop` iterations
pub const DEFAULT_LOOP_DELAY: Duration = Duration::from_secs(1);

/// Default broker socket timeout in milliseconds
pub const DEFAULT_SOCKET_TIMEOUT_MS: u64 = 10_000;

/// Configuration for a [`ConsumerGroup`](crate::ConsumerGroup).
///
/// Construct with [`GroupConfig::builder`] or use [`Default`]:
///
/// ```
/// use shepherd::GroupConfig;
///
/// let config = GroupConfig::builder()
///     .max_bytes(512 * 1024)
///     .trail(true)
///     .build();
/// assert!(config.register);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupConfig {
    /// Maximum fetch size in bytes, passed through to partition streams.
    pub max_bytes: u32,

    /// Maximum time in milliseconds the broker may hold a fetch open.
    pub max_wait_ms: u64,

    /// Minimum fetch size in bytes.
    pub min_bytes: u32,

    /// Cap on claim attempts. Accepted for compatibility with the classic
    /// client options and not enforced: contended claims retry through
    /// owner-node watches without a deadline.
    pub claim_timeout: Duration,

    /// Idle sleep between `fetch_loop` iterations when nothing was claimed
    /// or no messages arrived.
    pub loop_delay: Duration,

    /// Broker socket timeout in milliseconds.
    pub socket_timeout_ms: u64,

    /// Join the member set and run the initial rebalance during
    /// construction. When `false` the caller must invoke
    /// [`register`](crate::ConsumerGroup::register) explicitly.
    pub register: bool,

    /// Start consuming from the partition tail when no offset is stored,
    /// instead of the head.
    pub trail: bool,

    /// Override for the generated member id. Mainly useful for tests and
    /// diagnostics; ids must stay unique across the group.
    pub member_id: Option<String>,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            max_wait_ms: DEFAULT_MAX_WAIT_MS,
            min_bytes: DEFAULT_MIN_BYTES,
            claim_timeout: DEFAULT_CLAIM_TIMEOUT,
            loop_delay: DEFAULT_LOOP_DELAY,
            socket_timeout_ms: DEFAULT_SOCKET_TIMEOUT_MS,
            register: true,
            trail: false,
            member_id: None,
        }
    }
}

impl GroupConfig {
    /// Create a builder seeded with defaults.
    pub fn builder() -> GroupConfigBuilder {
        GroupConfigBuilder::default()
    }
}

/// Builder for [`GroupConfig`]
#[derive(Debug, Clone, Default)]
pub struct GroupConfigBuilder {
    config: GroupConfig,
}

impl GroupConfigBuilder {
    /// Set the maximum fetch size in bytes (default: 1 MiB).
    pub fn max_bytes(mut self, max_bytes: u32) -> Self {
        self.config.max_bytes = max_bytes;
        self
    }

    /// Set the maximum fetch wait in milliseconds (default: 100).
    pub fn max_wait_ms(mut self, max_wait_ms: u64) -> Self {
        self.config.max_wait_ms = max_wait_ms;
        self
    }

    /// Set the minimum fetch size in bytes (default: 0).
    pub fn min_bytes(mut self, min_bytes: u32) -> Self {
        self.config.min_bytes = min_bytes;
        self
    }

    /// Set the claim-attempt cap (default: 30s, not enforced).
    pub fn claim_timeout(mut self, claim_timeout: Duration) -> Self {
        self.config.claim_timeout = claim_timeout;
        self
    }

    /// Set the `fetch_loop` idle sleep (default: 1s).
    pub fn loop_delay(mut self, loop_delay: Duration) -> Self {
        self.config.loop_delay = loop_delay;
        self
    }

    /// Set the broker socket timeout in milliseconds (default: 10 000).
    pub fn socket_timeout_ms(mut self, socket_timeout_ms: u64) -> Self {
        self.config.socket_timeout_ms = socket_timeout_ms;
        self
    }

    /// Skip registration and the initial rebalance during construction.
    pub fn register(mut self, register: bool) -> Self {
        self.config.register = register;
        self
    }

    /// Start from the tail when no offset is stored (default: head).
    pub fn trail(mut self, trail: bool) -> Self {
        self.config.trail = trail;
        self
    }

    /// Override the generated member id.
    pub fn member_id(mut self, member_id: impl Into<String>) -> Self {
        self.config.member_id = Some(member_id.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> GroupConfig {
        self.config
    }
}

/// Per-call options for `checkout`, `fetch` and `fetch_loop`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Auto-commit the advanced offset after a committed callback
    /// (default: `true`). When `false`, no commit happens regardless of the
    /// callback verdict.
    pub commit: bool,

    /// Override the configured `loop_delay` for this `fetch_loop` call.
    pub loop_delay: Option<Duration>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            commit: true,
            loop_delay: None,
        }
    }
}

impl FetchOptions {
    /// Options with auto-commit disabled.
    pub fn no_commit() -> Self {
        Self {
            commit: false,
            ..Self::default()
        }
    }
}
