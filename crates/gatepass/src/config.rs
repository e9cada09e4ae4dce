//! Configuration for the gate subsystem.

/// Default credential TTL: 5 minutes.
pub const DEFAULT_TTL_MS: i64 = 5 * 60 * 1000;

/// Default reaper interval: 30 seconds.
pub const DEFAULT_REAPER_INTERVAL_MS: u64 = 30_000;

/// Tunables for issuance and the expiry sweep.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Credential validity window in milliseconds.
    pub ttl_ms: i64,
    /// How often the reaper sweeps stale pending credentials.
    pub reaper_interval_ms: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_TTL_MS,
            reaper_interval_ms: DEFAULT_REAPER_INTERVAL_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GateConfig::default();
        assert_eq!(config.ttl_ms, 300_000);
        assert_eq!(config.reaper_interval_ms, 30_000);
    }
}
