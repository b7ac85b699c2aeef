//! GPU driver 的调用边界
//!
//! 上层的所有 vulkan 调用都经过 [`GfxDriver`]。真实实现为 [`ash_driver::AshDriver`]，
//! 测试中使用 `FakeDriver` 记录每一次对象的创建与销毁

use std::ffi::CStr;

use ash::prelude::VkResult;
use ash::vk;

use crate::commands::command::GfxCommand;
use crate::foundation::platform::GfxWindow;

pub mod ash_driver;
pub mod debug_messenger;
#[cfg(any(test, feature = "fake-driver"))]
pub mod fake_driver;

pub struct InstanceDesc<'a> {
    pub app_name: &'a CStr,
    pub engine_name: &'a CStr,
    pub api_version: u32,
    pub layers: &'a [&'a CStr],
    pub extensions: &'a [&'a CStr],
    /// 在 instance 创建和销毁期间也输出 validation 信息
    pub debug_messenger: bool,
}

pub struct DeviceDesc<'a> {
    pub queue_family_index: u32,
    pub extensions: &'a [&'a CStr],
}

#[derive(Debug, Clone, Copy)]
pub struct SwapchainDesc {
    pub surface: vk::SurfaceKHR,
    pub min_image_count: u32,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub present_mode: vk::PresentModeKHR,
    /// 可以为 null
    pub old_swapchain: vk::SwapchainKHR,
}

/// 单个 color attachment、单个 subpass 的 render pass
#[derive(Debug, Clone, Copy)]
pub struct RenderPassDesc {
    pub color_attachment: vk::AttachmentDescription,
    pub color_layout: vk::ImageLayout,
    pub dependency: vk::SubpassDependency,
}

#[derive(Debug, Clone, Copy)]
pub struct FramebufferDesc {
    pub render_pass: vk::RenderPass,
    pub attachment: vk::ImageView,
    pub extent: vk::Extent2D,
}

#[derive(Debug, Clone, Copy)]
pub struct DescriptorBindingDesc {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub count: u32,
    pub stages: vk::ShaderStageFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineViewport {
    /// viewport 和 scissor 固化在 pipeline 中
    Static(vk::Extent2D),
    /// 每帧录制时设置
    Dynamic,
}

#[derive(Debug, Clone)]
pub struct GraphicsPipelineDesc {
    pub vertex_module: vk::ShaderModule,
    pub fragment_module: vk::ShaderModule,
    pub entry_point: &'static CStr,
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    pub topology: vk::PrimitiveTopology,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub samples: vk::SampleCountFlags,
    pub color_blend: vk::PipelineColorBlendAttachmentState,
    pub viewport: PipelineViewport,
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct SubmitDesc {
    pub command_buffer: vk::CommandBuffer,
    pub wait: Option<(vk::Semaphore, vk::PipelineStageFlags)>,
    pub signal: Option<vk::Semaphore>,
    /// 可以为 null
    pub fence: vk::Fence,
}

#[derive(Debug, Clone, Copy)]
pub struct PresentDesc {
    pub swapchain: vk::SwapchainKHR,
    pub image_index: u32,
    pub wait: vk::Semaphore,
}

/// 对 vulkan 的最小封装
///
/// 所有方法都是 `&self`：实现内部持有 instance 和 device 的函数表，
/// 同一时刻只有一个 instance 和一个 device
pub trait GfxDriver {
    // instance
    fn instance_version(&self) -> VkResult<u32>;
    fn create_instance(&self, desc: &InstanceDesc<'_>) -> VkResult<vk::Instance>;
    fn destroy_instance(&self, instance: vk::Instance);
    fn create_debug_messenger(&self, instance: vk::Instance) -> VkResult<vk::DebugUtilsMessengerEXT>;
    fn destroy_debug_messenger(&self, messenger: vk::DebugUtilsMessengerEXT);

    // physical device
    fn enumerate_adapters(&self, instance: vk::Instance) -> VkResult<Vec<vk::PhysicalDevice>>;
    fn adapter_properties(&self, adapter: vk::PhysicalDevice) -> VkResult<vk::PhysicalDeviceProperties>;
    fn queue_family_properties(&self, adapter: vk::PhysicalDevice) -> VkResult<Vec<vk::QueueFamilyProperties>>;
    fn memory_properties(&self, adapter: vk::PhysicalDevice) -> VkResult<vk::PhysicalDeviceMemoryProperties>;
    fn device_extension_names(&self, adapter: vk::PhysicalDevice) -> VkResult<Vec<String>>;

    // device & queue
    fn create_device(&self, adapter: vk::PhysicalDevice, desc: &DeviceDesc<'_>) -> VkResult<vk::Device>;
    fn destroy_device(&self, device: vk::Device);
    fn device_queue(&self, queue_family_index: u32, queue_index: u32) -> VkResult<vk::Queue>;
    fn device_wait_idle(&self) -> VkResult<()>;
    fn queue_wait_idle(&self, queue: vk::Queue) -> VkResult<()>;

    // surface
    fn create_surface(&self, instance: vk::Instance, window: &dyn GfxWindow) -> VkResult<vk::SurfaceKHR>;
    fn destroy_surface(&self, surface: vk::SurfaceKHR);
    fn surface_capabilities(
        &self,
        adapter: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR>;
    fn surface_formats(&self, adapter: vk::PhysicalDevice, surface: vk::SurfaceKHR)
    -> VkResult<Vec<vk::SurfaceFormatKHR>>;
    fn surface_present_modes(
        &self,
        adapter: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>>;

    // swapchain
    fn create_swapchain(&self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR>;
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;
    /// return: (image index, is suboptimal)
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)>;
    /// return: is suboptimal
    fn queue_present(&self, queue: vk::Queue, desc: &PresentDesc) -> VkResult<bool>;

    // image view & render pass & framebuffer
    fn create_image_view(&self, image: vk::Image, format: vk::Format) -> VkResult<vk::ImageView>;
    fn destroy_image_view(&self, view: vk::ImageView);
    fn create_render_pass(&self, desc: &RenderPassDesc) -> VkResult<vk::RenderPass>;
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);
    fn create_framebuffer(&self, desc: &FramebufferDesc) -> VkResult<vk::Framebuffer>;
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    // pipeline
    fn create_shader_module(&self, code: &[u32]) -> VkResult<vk::ShaderModule>;
    fn destroy_shader_module(&self, module: vk::ShaderModule);
    fn create_descriptor_set_layout(&self, bindings: &[DescriptorBindingDesc]) -> VkResult<vk::DescriptorSetLayout>;
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);
    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> VkResult<vk::PipelineLayout>;
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);
    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> VkResult<vk::Pipeline>;
    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    // descriptor
    fn create_descriptor_pool(&self, max_sets: u32, uniform_buffer_count: u32) -> VkResult<vk::DescriptorPool>;
    /// pool 中分配的 descriptor set 随 pool 一起释放
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);
    fn allocate_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        layouts: &[vk::DescriptorSetLayout],
    ) -> VkResult<Vec<vk::DescriptorSet>>;
    /// vkUpdateDescriptorSets 没有返回值，只能依赖 validation layer 检查
    fn write_uniform_buffer_descriptor(
        &self,
        set: vk::DescriptorSet,
        binding: u32,
        buffer: vk::Buffer,
        range: vk::DeviceSize,
    );

    // command
    fn create_command_pool(
        &self,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> VkResult<vk::CommandPool>;
    fn destroy_command_pool(&self, pool: vk::CommandPool);
    fn allocate_command_buffers(&self, pool: vk::CommandPool, count: u32) -> VkResult<Vec<vk::CommandBuffer>>;
    fn free_command_buffers(&self, pool: vk::CommandPool, command_buffers: &[vk::CommandBuffer]);
    fn reset_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()>;
    /// begin -> commands -> end
    fn record_commands(
        &self,
        command_buffer: vk::CommandBuffer,
        usage: vk::CommandBufferUsageFlags,
        commands: &[GfxCommand],
    ) -> VkResult<()>;
    fn queue_submit(&self, queue: vk::Queue, desc: &SubmitDesc) -> VkResult<()>;

    // sync
    fn create_semaphore(&self) -> VkResult<vk::Semaphore>;
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);
    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence>;
    fn destroy_fence(&self, fence: vk::Fence);
    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> VkResult<()>;
    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()>;

    // memory
    fn create_buffer(&self, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> VkResult<vk::Buffer>;
    fn destroy_buffer(&self, buffer: vk::Buffer);
    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> VkResult<vk::MemoryRequirements>;
    fn allocate_memory(&self, size: vk::DeviceSize, memory_type_index: u32) -> VkResult<vk::DeviceMemory>;
    fn free_memory(&self, memory: vk::DeviceMemory);
    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory) -> VkResult<()>;
    /// 映射整块 memory
    fn map_memory(&self, memory: vk::DeviceMemory) -> VkResult<*mut u8>;
    fn unmap_memory(&self, memory: vk::DeviceMemory);
}
