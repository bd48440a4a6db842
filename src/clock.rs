//! 시계 추상화 (테스트에서 시간을 직접 움직이기 위함)

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    /// 경과 시간 계산용 단조 시각
    fn now(&self) -> Instant;
    /// 토큰 만료 계산용 Unix 초
    fn unix_now(&self) -> i64;
}

/// 실제 시스템 시계
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// 수동으로 진행시키는 시계
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    base_unix: i64,
    offset_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(base_unix: i64) -> Self {
        Self {
            base: Instant::now(),
            base_unix,
            offset_ms: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    fn offset(&self) -> Duration {
        Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.offset()
    }

    fn unix_now(&self) -> i64 {
        self.base_unix + self.offset().as_secs() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_both_timelines() {
        let clock = ManualClock::new(1_000);
        let start = clock.now();
        clock.advance(Duration::from_millis(2_500));
        assert_eq!(clock.now() - start, Duration::from_millis(2_500));
        assert_eq!(clock.unix_now(), 1_002);
    }
}
