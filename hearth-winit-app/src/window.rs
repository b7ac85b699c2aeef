use std::ffi::CStr;

use ash::vk;
use hearth_gfx::foundation::platform::{GfxPlatform, GfxWindow};
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, RawDisplayHandle, WindowHandle,
};
use winit::window::Window;

/// demo 的主窗口
pub struct MainWindow {
    window: Window,
}

impl MainWindow {
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    #[inline]
    pub fn window(&self) -> &Window {
        &self.window
    }
}

impl GfxWindow for MainWindow {
    fn framebuffer_size(&self) -> vk::Extent2D {
        let size = self.window.inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }
}

impl HasDisplayHandle for MainWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.window.display_handle()
    }
}

impl HasWindowHandle for MainWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.window.window_handle()
    }
}

/// 通过 ash-window 查询窗口系统需要的 instance extensions
pub struct WinitPlatform {
    display: RawDisplayHandle,
}

impl WinitPlatform {
    pub fn new(display: RawDisplayHandle) -> Self {
        Self { display }
    }
}

impl GfxPlatform for WinitPlatform {
    fn required_instance_extensions(&self) -> Option<Vec<&'static CStr>> {
        match ash_window::enumerate_required_extensions(self.display) {
            // ash-window 返回的是静态字符串
            Ok(names) => Some(names.iter().map(|name| unsafe { CStr::from_ptr(*name) }).collect()),
            Err(e) => {
                log::error!("window system does not support vulkan: {:?}", e);
                None
            }
        }
    }
}
