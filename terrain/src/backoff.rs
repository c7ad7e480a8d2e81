//! Exponential backoff with jitter between provider retries.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Fraction of a delay which may be added as jitter.
const JITTER_RATIO: f64 = 0.2;

/// Delay schedule which doubles after every failure, up to a cap.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    /// `base` is the first delay, floored at 1 ms; `max` caps every
    /// later one and is never below `base`.
    pub fn new(base: Duration, max: Duration) -> Self {
        let base = base.max(Duration::from_millis(1));
        let max = max.max(base);
        Self {
            base,
            max,
            current: base,
        }
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }

    /// Returns the delay to wait after a failure, and doubles the
    /// next one.
    pub fn fail(&mut self) -> Duration {
        let delay = add_jitter(self.current, JITTER_RATIO);
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }
}

fn add_jitter(delay: Duration, ratio: f64) -> Duration {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let jitter_ms_max = (delay.as_millis() as f64 * ratio) as u64;
    if jitter_ms_max == 0 {
        return delay;
    }
    let now_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()))
        .unwrap_or(0);
    delay + Duration::from_millis(now_nanos % (jitter_ms_max + 1))
}
