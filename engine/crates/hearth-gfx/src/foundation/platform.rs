use std::ffi::CStr;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// 窗口系统对 GPU API 的支持情况
pub trait GfxPlatform {
    /// 窗口系统需要的 instance extensions
    ///
    /// 返回 None 表示该窗口系统不支持 vulkan
    fn required_instance_extensions(&self) -> Option<Vec<&'static CStr>>;
}

/// swapchain 所绑定的窗口
pub trait GfxWindow: HasDisplayHandle + HasWindowHandle {
    /// 窗口 framebuffer 的物理像素尺寸
    fn framebuffer_size(&self) -> vk::Extent2D;
}
