use hearth_gfx::error::GfxError;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Gfx(#[from] GfxError),

    #[error("system clock error: {0}")]
    Clock(#[from] std::time::SystemTimeError),
}

impl RenderError {
    /// 进程退出码：GPU 相关的错误为 1，系统时钟错误为 -1
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Gfx(_) => 1,
            Self::Clock(_) => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(RenderError::from(GfxError::NoAdapter).exit_code(), 1);

        let later = SystemTime::UNIX_EPOCH + Duration::from_secs(10);
        let clock_err = SystemTime::UNIX_EPOCH.duration_since(later).unwrap_err();
        assert_eq!(RenderError::from(clock_err).exit_code(), -1);
    }
}
