use ash::vk;

use crate::driver::GfxDriver;
use crate::error::{GfxError, GfxResult, VkCheck};

/// surface 在某个 adapter 上支持的能力
#[derive(Debug, Clone)]
pub struct GfxSurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl GfxSurfaceSupport {
    pub fn query(driver: &dyn GfxDriver, adapter: vk::PhysicalDevice, surface: vk::SurfaceKHR) -> GfxResult<Self> {
        let capabilities = Self::query_capabilities(driver, adapter, surface)?;

        let formats = driver.surface_formats(adapter, surface).vk_check("vkGetPhysicalDeviceSurfaceFormatsKHR")?;
        if formats.is_empty() {
            return Err(GfxError::EmptySurfaceQuery("surface formats"));
        }

        let present_modes =
            driver.surface_present_modes(adapter, surface).vk_check("vkGetPhysicalDeviceSurfacePresentModesKHR")?;
        if present_modes.is_empty() {
            return Err(GfxError::EmptySurfaceQuery("present modes"));
        }

        log::debug!("surface formats: {:?}", formats);
        log::debug!("surface present modes: {:?}", present_modes);

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// 实时获取 surface capabilities
    #[inline]
    pub fn query_capabilities(
        driver: &dyn GfxDriver,
        adapter: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> GfxResult<vk::SurfaceCapabilitiesKHR> {
        driver.surface_capabilities(adapter, surface).vk_check("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")
    }
}
