use crate::defaults::{
    DEFAULT_COMMAND_BUFFER, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_SESSIONS, DEFAULT_REAP_INTERVAL,
    DEFAULT_SNAPSHOT_BUFFER, DEFAULT_TICK_PERIOD,
};
use flowsim_core::defaults::DEFAULT_TICK_SECONDS;
use std::time::Duration;

/// Runtime parameters of a single session engine.
///
/// ```
/// # use flowsim::EngineConfig;
/// # use std::time::Duration;
/// let config = EngineConfig::default()
///     .with_tick_period(Duration::from_millis(250))
///     .with_idle_timeout(Duration::from_secs(60));
///
/// assert_eq!(config.tick_period, Duration::from_millis(250));
/// // simulated time per tick is independent of the wall clock period
/// assert_eq!(config.tick_duration, 1.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Wall clock period of the tick loop.
    pub tick_period: Duration,
    /// Simulated seconds covered by one tick.
    pub tick_duration: f64,
    /// Per subscriber snapshot buffer. Slow subscribers lose the oldest.
    pub snapshot_buffer: usize,
    /// Depth of the command mailbox.
    pub command_buffer: usize,
    /// Stop the session after this long without commands and subscribers.
    pub idle_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_period: DEFAULT_TICK_PERIOD,
            tick_duration: DEFAULT_TICK_SECONDS,
            snapshot_buffer: DEFAULT_SNAPSHOT_BUFFER,
            command_buffer: DEFAULT_COMMAND_BUFFER,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_tick_period(mut self, tick_period: Duration) -> Self {
        self.tick_period = tick_period;
        self
    }

    #[must_use]
    pub fn with_tick_duration(mut self, tick_duration: f64) -> Self {
        self.tick_duration = tick_duration;
        self
    }

    #[must_use]
    pub fn with_snapshot_buffer(mut self, snapshot_buffer: usize) -> Self {
        self.snapshot_buffer = snapshot_buffer;
        self
    }

    #[must_use]
    pub fn with_command_buffer(mut self, command_buffer: usize) -> Self {
        self.command_buffer = command_buffer;
        self
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Channels need a capacity of at least one and the tick period must
    /// not be zero for `tokio::time::interval`.
    pub(crate) fn sanitized(mut self) -> Self {
        self.snapshot_buffer = self.snapshot_buffer.max(1);
        self.command_buffer = self.command_buffer.max(1);
        if self.tick_period.is_zero() {
            self.tick_period = DEFAULT_TICK_PERIOD;
        }
        self
    }
}

/// Parameters of a [`SessionRegistry`].
///
/// [`SessionRegistry`]: crate::SessionRegistry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistryConfig {
    pub engine: EngineConfig,
    /// Session creation fails once this many sessions are live.
    pub max_sessions: usize,
    /// Period of the sweep removing sessions that stopped by themselves.
    pub reap_interval: Duration,
    /// Seed of the session id generator. `None` seeds from the clock.
    pub id_seed: Option<u64>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            max_sessions: DEFAULT_MAX_SESSIONS,
            reap_interval: DEFAULT_REAP_INTERVAL,
            id_seed: None,
        }
    }
}

impl RegistryConfig {
    #[must_use]
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    #[must_use]
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    #[must_use]
    pub fn with_reap_interval(mut self, reap_interval: Duration) -> Self {
        self.reap_interval = reap_interval;
        self
    }

    #[must_use]
    pub fn with_id_seed(mut self, seed: u64) -> Self {
        self.id_seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.max_sessions, 1_024);
        assert_eq!(config.reap_interval, Duration::from_secs(30));
        assert_eq!(config.engine.tick_period, Duration::from_secs(1));
        assert_eq!(config.engine.idle_timeout, Duration::from_secs(300));
        assert_eq!(config.id_seed, None);
    }

    #[test]
    fn sanitized_never_yields_empty_channels() {
        let config = EngineConfig::default()
            .with_snapshot_buffer(0)
            .with_command_buffer(0)
            .with_tick_period(Duration::ZERO)
            .sanitized();
        assert_eq!(config.snapshot_buffer, 1);
        assert_eq!(config.command_buffer, 1);
        assert_eq!(config.tick_period, DEFAULT_TICK_PERIOD);
    }
}
