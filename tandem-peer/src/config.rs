use std::time::Duration;

/// Timing and retry policy of a [`crate::PeerSession`].
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// How long ICE may stay in `checking` before it counts as a failure.
    pub checking_timeout: Duration,
    /// How long `disconnected` may last before it counts as a failure.
    pub disconnected_grace: Duration,
    pub max_reconnect_attempts: u32,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    /// Quiet period after the last track announcement of a stream.
    pub track_debounce: Duration,
    /// Delay before looking for a new partner after the current one left.
    /// `None` leaves the controller in `Ended`.
    pub auto_requeue_delay: Option<Duration>,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            checking_timeout: Duration::from_secs(10),
            disconnected_grace: Duration::from_secs(3),
            max_reconnect_attempts: 5,
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(10),
            track_debounce: Duration::from_secs(1),
            auto_requeue_delay: Some(Duration::from_secs(1)),
        }
    }
}

impl PeerConfig {
    /// Backoff before retry number `attempt` (1-based): `base * 2^(attempt - 1)`,
    /// capped at `reconnect_max_delay`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.reconnect_base_delay
            .saturating_mul(factor)
            .min(self.reconnect_max_delay)
    }
}
