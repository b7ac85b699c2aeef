use std::ffi::CStr;

use ash::vk;
use ash::vk::Handle;

use crate::commands::command::GfxCommand;
use crate::driver::{DeviceDesc, GfxDriver, InstanceDesc, SubmitDesc};
use crate::error::{GfxError, GfxResult, VkCheck};
use crate::foundation::adapter::{GfxAdapter, find_graphics_queue_family, pick_adapter};
use crate::foundation::platform::GfxPlatform;
use crate::teardown::TeardownStack;

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// 最低支持的 vulkan 版本
pub const MIN_API_VERSION: u32 = vk::API_VERSION_1_3;

#[derive(Debug, Clone, Copy)]
pub struct GfxContextDesc {
    pub app_name: &'static CStr,
    pub engine_name: &'static CStr,
    /// 是否开启 VK_LAYER_KHRONOS_validation
    pub enable_validation: bool,
    /// 是否将 validation 信息转发到 log，需要 VK_EXT_debug_utils
    pub enable_debug_messenger: bool,
}

impl Default for GfxContextDesc {
    fn default() -> Self {
        Self {
            app_name: c"Hearth Cube",
            engine_name: c"Hearth",
            enable_validation: true,
            enable_debug_messenger: true,
        }
    }
}

/// instance、adapter、device、queue 以及一个可复用的 command buffer
///
/// 整个进程只有一个，需要在所有其他 GPU 对象销毁之后调用 [`GfxContext::destroy`]
pub struct GfxContext {
    instance: vk::Instance,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,

    adapter: GfxAdapter,
    memory_properties: vk::PhysicalDeviceMemoryProperties,

    queue_family_index: u32,
    device: vk::Device,
    queue: vk::Queue,

    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
}

// new & init
impl GfxContext {
    /// 任何一步失败，都会按逆序销毁之前已经创建的对象
    pub fn new(driver: &dyn GfxDriver, platform: &dyn GfxPlatform, desc: &GfxContextDesc) -> GfxResult<Self> {
        let mut teardown = TeardownStack::new();
        match Self::init(driver, platform, desc, &mut teardown) {
            Ok(context) => {
                teardown.disarm();
                Ok(context)
            }
            Err(err) => {
                log::error!("failed to create gfx context: {}", err);
                teardown.unwind(driver);
                Err(err)
            }
        }
    }

    fn init(
        driver: &dyn GfxDriver,
        platform: &dyn GfxPlatform,
        desc: &GfxContextDesc,
        teardown: &mut TeardownStack,
    ) -> GfxResult<Self> {
        let platform_extensions = platform
            .required_instance_extensions()
            .ok_or_else(|| GfxError::UnsupportedPlatform("the window system does not support vulkan".to_string()))?;

        let instance_version = driver.instance_version().vk_check("vkEnumerateInstanceVersion")?;
        if instance_version < MIN_API_VERSION {
            return Err(GfxError::UnsupportedPlatform(format!(
                "vulkan {}.{} is required, the driver reports {}.{}",
                vk::api_version_major(MIN_API_VERSION),
                vk::api_version_minor(MIN_API_VERSION),
                vk::api_version_major(instance_version),
                vk::api_version_minor(instance_version),
            )));
        }

        let instance = Self::create_instance(driver, desc, platform_extensions)?;
        teardown.push("instance", move |driver| driver.destroy_instance(instance));

        let debug_messenger = if desc.enable_debug_messenger {
            let messenger = driver.create_debug_messenger(instance).vk_check("vkCreateDebugUtilsMessengerEXT")?;
            teardown.push("debug messenger", move |driver| driver.destroy_debug_messenger(messenger));
            Some(messenger)
        } else {
            None
        };

        let adapter = pick_adapter(driver, instance)?;
        let queue_families =
            driver.queue_family_properties(adapter.handle).vk_check("vkGetPhysicalDeviceQueueFamilyProperties")?;
        let queue_family_index = find_graphics_queue_family(&queue_families).ok_or(GfxError::NoGraphicsQueue)?;
        log::info!("graphics queue family: {}", queue_family_index);
        let memory_properties =
            driver.memory_properties(adapter.handle).vk_check("vkGetPhysicalDeviceMemoryProperties")?;

        let device_extensions = [ash::khr::swapchain::NAME];
        let device = driver
            .create_device(
                adapter.handle,
                &DeviceDesc {
                    queue_family_index,
                    extensions: &device_extensions,
                },
            )
            .vk_check("vkCreateDevice")?;
        teardown.push("device", move |driver| driver.destroy_device(device));
        let queue = driver.device_queue(queue_family_index, 0).vk_check("vkGetDeviceQueue")?;

        let command_pool = driver
            .create_command_pool(queue_family_index, vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .vk_check("vkCreateCommandPool")?;
        teardown.push("command pool", move |driver| driver.destroy_command_pool(command_pool));

        let command_buffers = driver.allocate_command_buffers(command_pool, 1).vk_check("vkAllocateCommandBuffers")?;
        teardown.push("command buffer", {
            let command_buffers = command_buffers.clone();
            move |driver| driver.free_command_buffers(command_pool, &command_buffers)
        });
        let command_buffer = command_buffers[0];

        Ok(Self {
            instance,
            debug_messenger,
            adapter,
            memory_properties,
            queue_family_index,
            device,
            queue,
            command_pool,
            command_buffer,
        })
    }

    fn create_instance(
        driver: &dyn GfxDriver,
        desc: &GfxContextDesc,
        platform_extensions: Vec<&'static CStr>,
    ) -> GfxResult<vk::Instance> {
        let mut extensions = platform_extensions;
        if desc.enable_debug_messenger {
            extensions.push(ash::ext::debug_utils::NAME);
        }
        let layers = if desc.enable_validation { vec![VALIDATION_LAYER] } else { vec![] };

        log::info!("instance extensions: {:?}", extensions);
        log::info!("instance layers: {:?}", layers);

        driver
            .create_instance(&InstanceDesc {
                app_name: desc.app_name,
                engine_name: desc.engine_name,
                api_version: MIN_API_VERSION,
                layers: &layers,
                extensions: &extensions,
                debug_messenger: desc.enable_debug_messenger,
            })
            .vk_check("vkCreateInstance")
    }
}

// getters
impl GfxContext {
    #[inline]
    pub fn instance(&self) -> vk::Instance {
        self.instance
    }

    #[inline]
    pub fn adapter(&self) -> &GfxAdapter {
        &self.adapter
    }

    #[inline]
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    #[inline]
    pub fn device(&self) -> vk::Device {
        self.device
    }

    #[inline]
    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    #[inline]
    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    #[inline]
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }
}

// tools
impl GfxContext {
    /// 使用 context 的 command buffer 录制并提交一组命令，等待 queue 执行完成
    pub fn one_time_exec(&self, driver: &dyn GfxDriver, commands: &[GfxCommand]) -> GfxResult<()> {
        driver.reset_command_buffer(self.command_buffer).vk_check("vkResetCommandBuffer")?;
        driver
            .record_commands(self.command_buffer, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, commands)
            .vk_check("vkEndCommandBuffer")?;
        driver
            .queue_submit(
                self.queue,
                &SubmitDesc {
                    command_buffer: self.command_buffer,
                    wait: None,
                    signal: None,
                    fence: vk::Fence::null(),
                },
            )
            .vk_check("vkQueueSubmit")?;
        driver.queue_wait_idle(self.queue).vk_check("vkQueueWaitIdle")
    }

    /// 等待 device 上所有的工作完成
    #[inline]
    pub fn wait_idle(&self, driver: &dyn GfxDriver) -> GfxResult<()> {
        driver.device_wait_idle().vk_check("vkDeviceWaitIdle")
    }
}

// destroy
impl GfxContext {
    pub fn destroy(mut self, driver: &dyn GfxDriver) {
        driver.free_command_buffers(self.command_pool, &[self.command_buffer]);
        driver.destroy_command_pool(self.command_pool);
        driver.destroy_device(self.device);
        if let Some(messenger) = self.debug_messenger.take() {
            driver.destroy_debug_messenger(messenger);
        }
        driver.destroy_instance(self.instance);

        self.device = vk::Device::null();
        self.instance = vk::Instance::null();
        log::info!("gfx context destroyed");
    }
}
impl Drop for GfxContext {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            assert!(self.device.is_null() && self.instance.is_null(), "GfxContext must be destroyed explicitly");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake_driver::{DriverEvent, FakeDriver, FakeDriverConfig, FakePlatform, ObjectKind};

    const PLATFORM: FakePlatform = FakePlatform { vulkan_supported: true };

    fn new_context(driver: &FakeDriver) -> GfxResult<GfxContext> {
        GfxContext::new(driver, &PLATFORM, &GfxContextDesc::default())
    }

    #[test]
    fn test_create_and_destroy() {
        let driver = FakeDriver::new(FakeDriverConfig::default());
        let context = new_context(&driver).unwrap();

        assert_eq!(context.adapter().device_type(), vk::PhysicalDeviceType::DISCRETE_GPU);
        assert_eq!(context.queue_family_index(), 1);
        assert_eq!(driver.instance_layers(), vec!["VK_LAYER_KHRONOS_validation"]);
        assert!(driver.instance_extensions().iter().any(|ext| ext == "VK_EXT_debug_utils"));
        assert!(driver.instance_extensions().iter().any(|ext| ext == "VK_KHR_surface"));
        assert_eq!(driver.device_extensions(), vec!["VK_KHR_swapchain"]);
        assert_eq!(driver.live_count(ObjectKind::CommandBuffer), 1);

        context.destroy(&driver);
        assert!(driver.live_objects().is_empty());
    }

    #[test]
    fn test_destroy_order_is_reverse_of_creation() {
        let driver = FakeDriver::new(FakeDriverConfig::default());
        new_context(&driver).unwrap().destroy(&driver);

        let mut created = driver.created();
        created.reverse();
        assert_eq!(driver.destroyed(), created);
    }

    #[test]
    fn test_unsupported_platform() {
        let driver = FakeDriver::new(FakeDriverConfig::default());
        let result = GfxContext::new(&driver, &FakePlatform { vulkan_supported: false }, &GfxContextDesc::default());
        assert!(matches!(result, Err(GfxError::UnsupportedPlatform(_))));
        assert!(driver.created().is_empty());
    }

    #[test]
    fn test_old_api_version() {
        let driver = FakeDriver::new(FakeDriverConfig {
            instance_version: vk::API_VERSION_1_2,
            ..Default::default()
        });
        assert!(matches!(new_context(&driver), Err(GfxError::UnsupportedPlatform(_))));
        assert!(driver.created().is_empty());
    }

    #[test]
    fn test_no_graphics_queue_rolls_back_instance() {
        let driver = FakeDriver::new(FakeDriverConfig {
            queue_families: vec![vk::QueueFlags::COMPUTE, vk::QueueFlags::TRANSFER],
            ..Default::default()
        });
        assert!(matches!(new_context(&driver), Err(GfxError::NoGraphicsQueue)));
        assert!(driver.live_objects().is_empty());
        assert_eq!(
            driver.destroyed().iter().map(|(kind, _)| *kind).collect::<Vec<_>>(),
            vec![ObjectKind::DebugMessenger, ObjectKind::Instance]
        );
    }

    #[test]
    fn test_no_adapter() {
        let driver = FakeDriver::new(FakeDriverConfig {
            adapters: vec![],
            ..Default::default()
        });
        assert!(matches!(new_context(&driver), Err(GfxError::NoAdapter)));
        assert!(driver.live_objects().is_empty());
    }

    /// 在第 k 个对象创建失败时，恰好销毁前 k - 1 个对象，且顺序相反
    #[test]
    fn test_rollback_at_every_step() {
        let total = {
            let driver = FakeDriver::new(FakeDriverConfig::default());
            new_context(&driver).unwrap().destroy(&driver);
            driver.create_count()
        };
        assert_eq!(total, 5);

        for k in 0..total {
            let driver = FakeDriver::new(FakeDriverConfig::default());
            driver.fail_nth_create(k);

            let err = new_context(&driver).err().expect("creation should fail");
            assert!(matches!(err, GfxError::Driver { result: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY, .. }));

            let created = driver.created();
            assert_eq!(created.len(), k);
            let mut expected = created.clone();
            expected.reverse();
            assert_eq!(driver.destroyed(), expected);
            assert!(driver.live_objects().is_empty());
        }
    }

    #[test]
    fn test_one_time_exec_waits_for_queue() {
        let driver = FakeDriver::new(FakeDriverConfig::default());
        let context = new_context(&driver).unwrap();

        let commands = vec![GfxCommand::Draw { vertex_count: 3 }];
        context.one_time_exec(&driver, &commands).unwrap();

        let recorded = driver.recorded_commands();
        assert_eq!(recorded, vec![(context.command_buffer(), commands)]);
        assert_eq!(driver.events().last(), Some(&DriverEvent::Call("queue_wait_idle")));

        context.destroy(&driver);
    }

    #[test]
    fn test_submit_failure_is_reported() {
        let driver = FakeDriver::new(FakeDriverConfig::default());
        let context = new_context(&driver).unwrap();

        driver.fail_call("queue_submit", vk::Result::ERROR_DEVICE_LOST);
        let err = context.one_time_exec(&driver, &[]).unwrap_err();
        assert!(matches!(err, GfxError::Driver { call: "vkQueueSubmit", result: vk::Result::ERROR_DEVICE_LOST, .. }));

        context.destroy(&driver);
    }
}
