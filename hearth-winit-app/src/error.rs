use hearth_gfx::error::GfxError;
use hearth_renderer::error::RenderError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("cannot find any monitor")]
    MonitorNotFound,

    #[error("failed to create window: {0}")]
    WindowCreation(#[from] winit::error::OsError),

    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl From<GfxError> for AppError {
    fn from(err: GfxError) -> Self {
        Self::Render(RenderError::Gfx(err))
    }
}

impl From<raw_window_handle::HandleError> for AppError {
    fn from(err: raw_window_handle::HandleError) -> Self {
        Self::from(GfxError::from(err))
    }
}

impl AppError {
    /// 进程退出码：GPU 相关的错误为 1，窗口系统与系统时钟的错误为 -1
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MonitorNotFound | Self::WindowCreation(_) | Self::EventLoop(_) => -1,
            Self::Render(err) => err.exit_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(AppError::MonitorNotFound.exit_code(), -1);
        assert_eq!(AppError::from(GfxError::NoGraphicsQueue).exit_code(), 1);
        assert_eq!(AppError::from(GfxError::driver("vkCreateDevice", ash::vk::Result::ERROR_DEVICE_LOST)).exit_code(), 1);

        let clock_err = SystemTime::UNIX_EPOCH.duration_since(SystemTime::UNIX_EPOCH + Duration::from_secs(1)).unwrap_err();
        assert_eq!(AppError::from(RenderError::from(clock_err)).exit_code(), -1);
    }

    #[test]
    fn test_gfx_error_message_is_kept() {
        let err = AppError::from(GfxError::NoAdapter);
        assert_eq!(err.to_string(), GfxError::NoAdapter.to_string());
    }
}
