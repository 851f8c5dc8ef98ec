use crate::domain::payment::DEFAULT_PLATFORM_FEE_BPS;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

pub const DEFAULT_FEED_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_DANGER_THRESHOLD: Decimal = dec!(75);

/// Tunables of the enforcement engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Upper bound on fetching and draining one user's transaction feed.
    pub feed_timeout: Duration,
    /// Platform share of a routed penalty, in basis points.
    pub platform_fee_bps: u32,
    /// Percentage of the limit from which an active contract shows as in danger.
    pub danger_threshold: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            feed_timeout: DEFAULT_FEED_TIMEOUT,
            platform_fee_bps: DEFAULT_PLATFORM_FEE_BPS,
            danger_threshold: DEFAULT_DANGER_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.danger_threshold, dec!(75));
        assert_eq!(config.platform_fee_bps, 1_000);
        assert_eq!(config.feed_timeout, Duration::from_secs(30));
    }
}
