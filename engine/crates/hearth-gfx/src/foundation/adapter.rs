use std::ffi::CStr;

use ash::vk;

use crate::driver::GfxDriver;
use crate::error::{GfxError, GfxResult, VkCheck};

/// 选中的 physical device 以及其基本信息
#[derive(Debug, Clone)]
pub struct GfxAdapter {
    pub handle: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
}

impl GfxAdapter {
    #[inline]
    pub fn device_type(&self) -> vk::PhysicalDeviceType {
        self.properties.device_type
    }

    pub fn name(&self) -> String {
        self.properties.device_name_as_c_str().map(CStr::to_string_lossy).unwrap_or_default().into_owned()
    }
}

/// adapter 类型的优先级，数值越小越优先
#[inline]
pub fn adapter_priority(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 0,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        vk::PhysicalDeviceType::CPU => 3,
        _ => 4,
    }
}

/// 按照 discrete > integrated > virtual > cpu > other 的顺序选择 adapter
///
/// 同一优先级取列表中靠前的；遇到 discrete 立即停止搜索。
///
/// return: 选中的 adapter 在列表中的 index
pub fn select_adapter_index(device_types: &[vk::PhysicalDeviceType]) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (index, device_type) in device_types.iter().enumerate() {
        let priority = adapter_priority(*device_type);
        if best.is_none_or(|(_, best_priority)| priority < best_priority) {
            best = Some((index, priority));
        }
        if priority == 0 {
            break;
        }
    }
    best.map(|(index, _)| index)
}

/// 第一个支持 graphics 的 queue family
pub fn find_graphics_queue_family(families: &[vk::QueueFamilyProperties]) -> Option<u32> {
    families
        .iter()
        .position(|family| family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|index| index as u32)
}

/// 枚举 instance 可见的所有 adapter，并按优先级选择一个
pub fn pick_adapter(driver: &dyn GfxDriver, instance: vk::Instance) -> GfxResult<GfxAdapter> {
    let handles = driver.enumerate_adapters(instance).vk_check("vkEnumeratePhysicalDevices")?;
    let adapters = handles
        .into_iter()
        .map(|handle| {
            let properties = driver.adapter_properties(handle).vk_check("vkGetPhysicalDeviceProperties")?;
            Ok(GfxAdapter { handle, properties })
        })
        .collect::<GfxResult<Vec<_>>>()?;

    for adapter in &adapters {
        log::debug!("found adapter: {} ({:?})", adapter.name(), adapter.device_type());
    }

    let device_types = adapters.iter().map(GfxAdapter::device_type).collect::<Vec<_>>();
    let index = select_adapter_index(&device_types).ok_or(GfxError::NoAdapter)?;
    let adapter = adapters[index].clone();

    let api_version = adapter.properties.api_version;
    log::info!(
        "selected adapter: {}, type: {:?}, api version: {}.{}.{}",
        adapter.name(),
        adapter.device_type(),
        vk::api_version_major(api_version),
        vk::api_version_minor(api_version),
        vk::api_version_patch(api_version),
    );
    if log::log_enabled!(log::Level::Debug) {
        let extensions =
            driver.device_extension_names(adapter.handle).vk_check("vkEnumerateDeviceExtensionProperties")?;
        log::debug!("device extensions:\n{:#?}", extensions);
    }

    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake_driver::{FakeDriver, FakeDriverConfig};
    use crate::driver::InstanceDesc;

    const DISCRETE: vk::PhysicalDeviceType = vk::PhysicalDeviceType::DISCRETE_GPU;
    const INTEGRATED: vk::PhysicalDeviceType = vk::PhysicalDeviceType::INTEGRATED_GPU;
    const VIRTUAL: vk::PhysicalDeviceType = vk::PhysicalDeviceType::VIRTUAL_GPU;
    const CPU: vk::PhysicalDeviceType = vk::PhysicalDeviceType::CPU;
    const OTHER: vk::PhysicalDeviceType = vk::PhysicalDeviceType::OTHER;

    #[test]
    fn test_discrete_wins_in_either_order() {
        assert_eq!(select_adapter_index(&[DISCRETE, INTEGRATED]), Some(0));
        assert_eq!(select_adapter_index(&[INTEGRATED, DISCRETE]), Some(1));
    }

    #[test]
    fn test_preference_order() {
        assert_eq!(select_adapter_index(&[OTHER, CPU, VIRTUAL]), Some(2));
        assert_eq!(select_adapter_index(&[OTHER, CPU]), Some(1));
        assert_eq!(select_adapter_index(&[CPU, INTEGRATED, VIRTUAL]), Some(1));
        assert_eq!(select_adapter_index(&[OTHER]), Some(0));
        assert_eq!(select_adapter_index(&[]), None);
    }

    #[test]
    fn test_first_of_equal_priority() {
        assert_eq!(select_adapter_index(&[INTEGRATED, INTEGRATED]), Some(0));
        assert_eq!(select_adapter_index(&[CPU, DISCRETE, DISCRETE]), Some(1));
    }

    #[test]
    fn test_graphics_queue_family() {
        let family = |queue_flags, queue_count| vk::QueueFamilyProperties {
            queue_flags,
            queue_count,
            ..Default::default()
        };

        let families = [
            family(vk::QueueFlags::TRANSFER, 1),
            family(vk::QueueFlags::GRAPHICS, 0),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::GRAPHICS, 2),
            family(vk::QueueFlags::GRAPHICS, 1),
        ];
        assert_eq!(find_graphics_queue_family(&families), Some(2));
        assert_eq!(find_graphics_queue_family(&families[..2]), None);
        assert_eq!(find_graphics_queue_family(&[]), None);
    }

    #[test]
    fn test_pick_adapter_with_fake_driver() {
        let driver = FakeDriver::new(FakeDriverConfig {
            adapters: vec![CPU, INTEGRATED, DISCRETE, INTEGRATED],
            ..Default::default()
        });
        let instance = driver
            .create_instance(&InstanceDesc {
                app_name: c"test",
                engine_name: c"test",
                api_version: vk::API_VERSION_1_3,
                layers: &[],
                extensions: &[],
                debug_messenger: false,
            })
            .unwrap();

        let adapter = pick_adapter(&driver, instance).unwrap();
        assert_eq!(adapter.device_type(), DISCRETE);

        driver.update_config(|config| config.adapters.clear());
        assert!(matches!(pick_adapter(&driver, instance), Err(GfxError::NoAdapter)));

        driver.destroy_instance(instance);
    }
}
