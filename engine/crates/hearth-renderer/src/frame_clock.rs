use std::time::{Duration, SystemTime};

use crate::error::RenderResult;

/// 从启动时刻开始计时的墙上时钟，驱动立方体的旋转
pub struct FrameClock {
    start: SystemTime,
}
// new & init
impl FrameClock {
    pub fn new() -> Self {
        Self::starting_at(SystemTime::now())
    }

    pub fn starting_at(start: SystemTime) -> Self {
        Self { start }
    }
}
impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
// getters
impl FrameClock {
    /// 系统时钟被回拨到启动时刻之前时返回错误
    pub fn elapsed(&self) -> RenderResult<Duration> {
        self.elapsed_at(SystemTime::now())
    }

    pub fn elapsed_at(&self, now: SystemTime) -> RenderResult<Duration> {
        Ok(now.duration_since(self.start)?)
    }

    #[inline]
    pub fn elapsed_secs(&self) -> RenderResult<f32> {
        Ok(self.elapsed()?.as_secs_f32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;

    #[test]
    fn test_elapsed() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let clock = FrameClock::starting_at(start);
        assert_eq!(clock.elapsed_at(start + Duration::from_millis(1500)).unwrap(), Duration::from_millis(1500));
    }

    #[test]
    fn test_clock_going_backwards_is_an_error() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let clock = FrameClock::starting_at(start);
        let err = clock.elapsed_at(start - Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, RenderError::Clock(_)));
        assert_eq!(err.exit_code(), -1);
    }
}
