use ash::vk;

pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

pub const PREFERRED_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::MAILBOX;

/// 优先使用 `B8G8R8A8_SRGB` + `SRGB_NONLINEAR`，否则使用列表中的第一个
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|format| {
            format.format == PREFERRED_SURFACE_FORMAT.format
                && format.color_space == PREFERRED_SURFACE_FORMAT.color_space
        })
        .or_else(|| formats.first())
        .copied()
}

/// 优先使用 MAILBOX，否则使用列表中的第一个
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> Option<vk::PresentModeKHR> {
    modes.iter().find(|mode| **mode == PREFERRED_PRESENT_MODE).or_else(|| modes.first()).copied()
}

/// 确定 window 的 extent 尺寸
///
/// 如果 surface_capabilities.current_extent 包含特殊值 0xFFFFFFFF，则表示可以自己设置交换链的 extent
pub fn choose_extent(
    surface_capabilities: &vk::SurfaceCapabilitiesKHR,
    window_physical_extent: vk::Extent2D,
) -> vk::Extent2D {
    let surface_extent = surface_capabilities.current_extent;
    if surface_extent.width == 0xFFFFFFFF || surface_extent.height == 0xFFFFFFFF {
        let width = window_physical_extent
            .width
            .clamp(surface_capabilities.min_image_extent.width, surface_capabilities.max_image_extent.width);
        let height = window_physical_extent
            .height
            .clamp(surface_capabilities.min_image_extent.height, surface_capabilities.max_image_extent.height);
        vk::Extent2D { width, height }
    } else {
        surface_extent
    }
}

/// swapchain 请求的 image 数量
///
/// 不低于 `requested` 和 surface 的最小值；max_image_count == 0 表示不限制 image 数量
pub fn choose_image_count(surface_capabilities: &vk::SurfaceCapabilitiesKHR, requested: u32) -> u32 {
    let count = u32::max(requested, surface_capabilities.min_image_count);
    if surface_capabilities.max_image_count == 0 {
        count
    } else {
        u32::min(count, surface_capabilities.max_image_count)
    }
}
