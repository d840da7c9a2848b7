use std::sync::Mutex;

use chrono::{Duration, Utc};
use config::MAX_TTL_SECS;
use domain::Timestamp;

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// 把配置中的时长转换为 chrono 时长，超过 [`MAX_TTL_SECS`] 的部分被截断
pub fn ttl_duration(ttl: std::time::Duration) -> Duration {
    let bounded = ttl.min(std::time::Duration::from_secs(MAX_TTL_SECS));
    Duration::from_std(bounded).unwrap_or_else(|_| Duration::seconds(MAX_TTL_SECS as i64))
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// 手动推进的时钟，用于测试过期逻辑
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_conversion_is_bounded() {
        assert_eq!(
            ttl_duration(std::time::Duration::from_secs(300)),
            Duration::minutes(5)
        );
        assert_eq!(
            ttl_duration(std::time::Duration::from_secs(u64::MAX)),
            Duration::seconds(MAX_TTL_SECS as i64)
        );
    }

    #[test]
    fn manual_clock_only_moves_when_advanced() {
        let clock = ManualClock::default();
        let start = clock.now();
        assert_eq!(clock.now(), start);

        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now() - start, Duration::seconds(90));
    }
}
