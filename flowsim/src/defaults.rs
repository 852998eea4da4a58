use std::time::Duration;

/// Wall clock period between two ticks of a session.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(1);

/// Snapshots buffered per subscriber before the oldest are dropped.
pub const DEFAULT_SNAPSHOT_BUFFER: usize = 64;

/// Commands queued in a session mailbox before senders wait.
pub const DEFAULT_COMMAND_BUFFER: usize = 256;

/// A session without commands nor subscribers for this long stops itself.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Maximum number of live sessions in a registry.
pub const DEFAULT_MAX_SESSIONS: usize = 1_024;

/// Period of the registry sweep removing sessions that stopped by
/// themselves.
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(30);
