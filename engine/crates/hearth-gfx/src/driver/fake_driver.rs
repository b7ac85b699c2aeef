//! 不依赖 GPU 的 driver 实现，用于测试资源生命周期与帧调度
//!
//! - 所有句柄都是递增的整数，每一次创建和销毁都会记录为 [`DriverEvent`]
//! - 提交到队列的工作立即完成：提交时携带的 fence 会立刻变为 signaled
//! - 等待一个未 signaled 的 fence 会返回 `TIMEOUT`，而不是阻塞
//! - 可以让第 n 次创建调用失败，或者让指定名字的调用失败
//! - acquire / present 的结果可以预先编排

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::ffi::CStr;

use ash::prelude::VkResult;
use ash::vk;
use ash::vk::Handle;

use crate::commands::command::GfxCommand;
use crate::driver::{
    DescriptorBindingDesc, DeviceDesc, FramebufferDesc, GfxDriver, GraphicsPipelineDesc, InstanceDesc, PresentDesc,
    RenderPassDesc, SubmitDesc, SwapchainDesc,
};
use crate::foundation::platform::{GfxPlatform, GfxWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Instance,
    DebugMessenger,
    Device,
    Surface,
    Swapchain,
    ImageView,
    RenderPass,
    Framebuffer,
    ShaderModule,
    DescriptorSetLayout,
    PipelineLayout,
    Pipeline,
    DescriptorPool,
    CommandPool,
    CommandBuffer,
    Semaphore,
    Fence,
    Buffer,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverEvent {
    Created(ObjectKind, u64),
    Destroyed(ObjectKind, u64),
    Call(&'static str),
}

/// fake driver 所模拟的硬件与 surface
#[derive(Debug, Clone)]
pub struct FakeDriverConfig {
    pub instance_version: u32,
    pub adapters: Vec<vk::PhysicalDeviceType>,
    pub queue_families: Vec<vk::QueueFlags>,
    pub surface_formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
    pub min_image_count: u32,
    pub current_extent: vk::Extent2D,
}

impl Default for FakeDriverConfig {
    fn default() -> Self {
        Self {
            instance_version: vk::API_VERSION_1_3,
            adapters: vec![vk::PhysicalDeviceType::INTEGRATED_GPU, vk::PhysicalDeviceType::DISCRETE_GPU],
            queue_families: vec![
                vk::QueueFlags::TRANSFER,
                vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            ],
            surface_formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            min_image_count: 3,
            current_extent: vk::Extent2D {
                width: 1000,
                height: 1000,
            },
        }
    }
}

const ADAPTER_BASE: u64 = 0x1000;
const QUEUE_BASE: u64 = 0x2000;

/// host 内存类型的 index，fake driver 只模拟两种 memory type
const DEVICE_LOCAL_TYPE: u32 = 0;
const HOST_VISIBLE_TYPE: u32 = 1;

pub struct FakeDriver {
    config: RefCell<FakeDriverConfig>,
    next_raw: Cell<u64>,
    events: RefCell<Vec<DriverEvent>>,
    live: RefCell<HashSet<(ObjectKind, u64)>>,

    create_calls: Cell<usize>,
    fail_create_at: Cell<Option<usize>>,
    failing_calls: RefCell<HashMap<&'static str, vk::Result>>,

    acquire_script: RefCell<VecDeque<vk::Result>>,
    present_script: RefCell<VecDeque<vk::Result>>,
    next_image: Cell<u32>,

    fences: RefCell<HashMap<u64, bool>>,
    swapchain_images: RefCell<HashMap<u64, Vec<vk::Image>>>,
    memories: RefCell<HashMap<u64, Vec<u8>>>,
    buffer_sizes: RefCell<HashMap<u64, vk::DeviceSize>>,
    recorded: RefCell<Vec<(vk::CommandBuffer, Vec<GfxCommand>)>>,
    swapchain_descs: RefCell<Vec<SwapchainDesc>>,
    render_pass_descs: RefCell<Vec<RenderPassDesc>>,
    pipeline_descs: RefCell<Vec<GraphicsPipelineDesc>>,
    submits: RefCell<Vec<SubmitDesc>>,
    presents: RefCell<Vec<PresentDesc>>,
    instance_layers: RefCell<Vec<String>>,
    instance_extensions: RefCell<Vec<String>>,
    device_extensions: RefCell<Vec<String>>,
}

// 构造与配置
impl FakeDriver {
    pub fn new(config: FakeDriverConfig) -> Self {
        Self {
            config: RefCell::new(config),
            next_raw: Cell::new(1),
            events: RefCell::new(Vec::new()),
            live: RefCell::new(HashSet::new()),
            create_calls: Cell::new(0),
            fail_create_at: Cell::new(None),
            failing_calls: RefCell::new(HashMap::new()),
            acquire_script: RefCell::new(VecDeque::new()),
            present_script: RefCell::new(VecDeque::new()),
            next_image: Cell::new(0),
            fences: RefCell::new(HashMap::new()),
            swapchain_images: RefCell::new(HashMap::new()),
            memories: RefCell::new(HashMap::new()),
            buffer_sizes: RefCell::new(HashMap::new()),
            recorded: RefCell::new(Vec::new()),
            swapchain_descs: RefCell::new(Vec::new()),
            render_pass_descs: RefCell::new(Vec::new()),
            pipeline_descs: RefCell::new(Vec::new()),
            submits: RefCell::new(Vec::new()),
            presents: RefCell::new(Vec::new()),
            instance_layers: RefCell::new(Vec::new()),
            instance_extensions: RefCell::new(Vec::new()),
            device_extensions: RefCell::new(Vec::new()),
        }
    }

    /// 第 `index` 次（从 0 开始计数）创建调用返回 `ERROR_OUT_OF_DEVICE_MEMORY`
    pub fn fail_nth_create(&self, index: usize) {
        self.fail_create_at.set(Some(index));
    }

    /// 之后所有名为 `call` 的调用都返回 `result`
    pub fn fail_call(&self, call: &'static str, result: vk::Result) {
        self.failing_calls.borrow_mut().insert(call, result);
    }

    pub fn clear_failures(&self) {
        self.fail_create_at.set(None);
        self.failing_calls.borrow_mut().clear();
    }

    /// 依次作为之后 acquire 的结果；`SUBOPTIMAL_KHR` 表示成功但 suboptimal
    pub fn script_acquire(&self, results: impl IntoIterator<Item = vk::Result>) {
        self.acquire_script.borrow_mut().extend(results);
    }

    /// 依次作为之后 present 的结果；`SUBOPTIMAL_KHR` 表示成功但 suboptimal
    pub fn script_present(&self, results: impl IntoIterator<Item = vk::Result>) {
        self.present_script.borrow_mut().extend(results);
    }

    pub fn update_config(&self, f: impl FnOnce(&mut FakeDriverConfig)) {
        f(&mut self.config.borrow_mut());
    }
}

// 查询记录
impl FakeDriver {
    pub fn events(&self) -> Vec<DriverEvent> {
        self.events.borrow().clone()
    }

    pub fn event_count(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn create_count(&self) -> usize {
        self.create_calls.get()
    }

    /// 按创建顺序排列的对象
    pub fn created(&self) -> Vec<(ObjectKind, u64)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                DriverEvent::Created(kind, raw) => Some((*kind, *raw)),
                _ => None,
            })
            .collect()
    }

    /// 按销毁顺序排列的对象
    pub fn destroyed(&self) -> Vec<(ObjectKind, u64)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                DriverEvent::Destroyed(kind, raw) => Some((*kind, *raw)),
                _ => None,
            })
            .collect()
    }

    pub fn live_objects(&self) -> Vec<(ObjectKind, u64)> {
        let mut live = self.live.borrow().iter().copied().collect::<Vec<_>>();
        live.sort_by_key(|(_, raw)| *raw);
        live
    }

    pub fn live_count(&self, kind: ObjectKind) -> usize {
        self.live.borrow().iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn calls(&self, name: &str) -> usize {
        self.events.borrow().iter().filter(|event| matches!(event, DriverEvent::Call(call) if *call == name)).count()
    }

    pub fn fence_signaled(&self, fence: vk::Fence) -> bool {
        self.fences.borrow().get(&fence.as_raw()).copied().unwrap_or(false)
    }

    pub fn recorded_commands(&self) -> Vec<(vk::CommandBuffer, Vec<GfxCommand>)> {
        self.recorded.borrow().clone()
    }

    pub fn swapchain_descs(&self) -> Vec<SwapchainDesc> {
        self.swapchain_descs.borrow().clone()
    }

    pub fn render_pass_descs(&self) -> Vec<RenderPassDesc> {
        self.render_pass_descs.borrow().clone()
    }

    pub fn pipeline_descs(&self) -> Vec<GraphicsPipelineDesc> {
        self.pipeline_descs.borrow().clone()
    }

    pub fn submits(&self) -> Vec<SubmitDesc> {
        self.submits.borrow().clone()
    }

    pub fn presents(&self) -> Vec<PresentDesc> {
        self.presents.borrow().clone()
    }

    pub fn instance_layers(&self) -> Vec<String> {
        self.instance_layers.borrow().clone()
    }

    pub fn instance_extensions(&self) -> Vec<String> {
        self.instance_extensions.borrow().clone()
    }

    pub fn device_extensions(&self) -> Vec<String> {
        self.device_extensions.borrow().clone()
    }

    /// 读取一块 memory 的内容
    pub fn memory_contents(&self, memory: vk::DeviceMemory) -> Vec<u8> {
        self.memories.borrow().get(&memory.as_raw()).cloned().unwrap_or_default()
    }
}

// tools
impl FakeDriver {
    fn next_handle<H: Handle>(&self) -> H {
        let raw = self.next_raw.get();
        self.next_raw.set(raw + 1);
        H::from_raw(raw)
    }

    fn create<H: Handle + Copy>(&self, kind: ObjectKind) -> VkResult<H> {
        let index = self.create_calls.get();
        self.create_calls.set(index + 1);
        if self.fail_create_at.get() == Some(index) {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }

        let handle: H = self.next_handle();
        let raw = handle.as_raw();
        self.events.borrow_mut().push(DriverEvent::Created(kind, raw));
        self.live.borrow_mut().insert((kind, raw));
        Ok(handle)
    }

    fn destroy<H: Handle>(&self, kind: ObjectKind, handle: H) {
        let raw = handle.as_raw();
        // 销毁 null 句柄是合法的空操作
        if raw == 0 {
            return;
        }
        let removed = self.live.borrow_mut().remove(&(kind, raw));
        assert!(removed, "destroying {kind:?} {raw:#x} which is not alive (double free or unknown handle)");
        self.events.borrow_mut().push(DriverEvent::Destroyed(kind, raw));
    }

    fn call(&self, name: &'static str) -> VkResult<()> {
        self.events.borrow_mut().push(DriverEvent::Call(name));
        match self.failing_calls.borrow().get(name) {
            Some(result) => Err(*result),
            None => Ok(()),
        }
    }

    fn assert_alive<H: Handle + Copy>(&self, kind: ObjectKind, handle: H) {
        assert!(self.live.borrow().contains(&(kind, handle.as_raw())), "{kind:?} {:#x} is not alive", handle.as_raw());
    }

    fn names(names: &[&CStr]) -> Vec<String> {
        names.iter().map(|name| name.to_string_lossy().into_owned()).collect()
    }
}

impl GfxDriver for FakeDriver {
    fn instance_version(&self) -> VkResult<u32> {
        self.call("enumerate_instance_version")?;
        Ok(self.config.borrow().instance_version)
    }

    fn create_instance(&self, desc: &InstanceDesc<'_>) -> VkResult<vk::Instance> {
        let instance = self.create(ObjectKind::Instance)?;
        *self.instance_layers.borrow_mut() = Self::names(desc.layers);
        *self.instance_extensions.borrow_mut() = Self::names(desc.extensions);
        Ok(instance)
    }

    fn destroy_instance(&self, instance: vk::Instance) {
        assert_eq!(self.live_count(ObjectKind::Device), 0, "instance destroyed while the device is alive");
        self.destroy(ObjectKind::Instance, instance);
    }

    fn create_debug_messenger(&self, instance: vk::Instance) -> VkResult<vk::DebugUtilsMessengerEXT> {
        self.assert_alive(ObjectKind::Instance, instance);
        self.create(ObjectKind::DebugMessenger)
    }

    fn destroy_debug_messenger(&self, messenger: vk::DebugUtilsMessengerEXT) {
        self.destroy(ObjectKind::DebugMessenger, messenger);
    }

    fn enumerate_adapters(&self, instance: vk::Instance) -> VkResult<Vec<vk::PhysicalDevice>> {
        self.assert_alive(ObjectKind::Instance, instance);
        self.call("enumerate_physical_devices")?;
        let count = self.config.borrow().adapters.len() as u64;
        Ok((0..count).map(|i| vk::PhysicalDevice::from_raw(ADAPTER_BASE + i)).collect())
    }

    fn adapter_properties(&self, adapter: vk::PhysicalDevice) -> VkResult<vk::PhysicalDeviceProperties> {
        let index = (adapter.as_raw() - ADAPTER_BASE) as usize;
        let device_type = self.config.borrow().adapters[index];
        Ok(vk::PhysicalDeviceProperties {
            device_type,
            api_version: vk::API_VERSION_1_3,
            device_id: index as u32,
            ..Default::default()
        })
    }

    fn queue_family_properties(&self, _adapter: vk::PhysicalDevice) -> VkResult<Vec<vk::QueueFamilyProperties>> {
        Ok(self
            .config
            .borrow()
            .queue_families
            .iter()
            .map(|flags| vk::QueueFamilyProperties {
                queue_flags: *flags,
                queue_count: 1,
                ..Default::default()
            })
            .collect())
    }

    fn memory_properties(&self, _adapter: vk::PhysicalDevice) -> VkResult<vk::PhysicalDeviceMemoryProperties> {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 2,
            memory_heap_count: 1,
            ..Default::default()
        };
        props.memory_types[DEVICE_LOCAL_TYPE as usize] = vk::MemoryType {
            property_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            heap_index: 0,
        };
        props.memory_types[HOST_VISIBLE_TYPE as usize] = vk::MemoryType {
            property_flags: vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            heap_index: 0,
        };
        Ok(props)
    }

    fn device_extension_names(&self, _adapter: vk::PhysicalDevice) -> VkResult<Vec<String>> {
        Ok(vec!["VK_KHR_swapchain".to_string()])
    }

    fn create_device(&self, _adapter: vk::PhysicalDevice, desc: &DeviceDesc<'_>) -> VkResult<vk::Device> {
        let device = self.create(ObjectKind::Device)?;
        *self.device_extensions.borrow_mut() = Self::names(desc.extensions);
        Ok(device)
    }

    fn destroy_device(&self, device: vk::Device) {
        let leaked = self
            .live
            .borrow()
            .iter()
            .filter(|(kind, _)| {
                !matches!(
                    kind,
                    ObjectKind::Instance | ObjectKind::DebugMessenger | ObjectKind::Surface | ObjectKind::Device
                )
            })
            .count();
        assert_eq!(leaked, 0, "device destroyed while {leaked} device objects are alive");
        self.destroy(ObjectKind::Device, device);
    }

    fn device_queue(&self, queue_family_index: u32, queue_index: u32) -> VkResult<vk::Queue> {
        Ok(vk::Queue::from_raw(QUEUE_BASE + ((queue_family_index as u64) << 8) + queue_index as u64))
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        self.call("device_wait_idle")
    }

    fn queue_wait_idle(&self, _queue: vk::Queue) -> VkResult<()> {
        self.call("queue_wait_idle")
    }

    fn create_surface(&self, instance: vk::Instance, _window: &dyn GfxWindow) -> VkResult<vk::SurfaceKHR> {
        self.assert_alive(ObjectKind::Instance, instance);
        self.create(ObjectKind::Surface)
    }

    fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        self.destroy(ObjectKind::Surface, surface);
    }

    fn surface_capabilities(
        &self,
        _adapter: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        self.assert_alive(ObjectKind::Surface, surface);
        self.call("get_surface_capabilities")?;
        let config = self.config.borrow();
        Ok(vk::SurfaceCapabilitiesKHR {
            min_image_count: config.min_image_count,
            max_image_count: 8,
            current_extent: config.current_extent,
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            max_image_array_layers: 1,
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            ..Default::default()
        })
    }

    fn surface_formats(
        &self,
        _adapter: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(self.config.borrow().surface_formats.clone())
    }

    fn surface_present_modes(
        &self,
        _adapter: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        Ok(self.config.borrow().present_modes.clone())
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        self.assert_alive(ObjectKind::Surface, desc.surface);
        if desc.old_swapchain != vk::SwapchainKHR::null() {
            self.assert_alive(ObjectKind::Swapchain, desc.old_swapchain);
        }
        let swapchain: vk::SwapchainKHR = self.create(ObjectKind::Swapchain)?;
        let images = (0..desc.min_image_count).map(|_| self.next_handle()).collect();
        self.swapchain_images.borrow_mut().insert(swapchain.as_raw(), images);
        self.swapchain_descs.borrow_mut().push(*desc);
        self.next_image.set(0);
        Ok(swapchain)
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        self.destroy(ObjectKind::Swapchain, swapchain);
        self.swapchain_images.borrow_mut().remove(&swapchain.as_raw());
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        self.call("get_swapchain_images")?;
        self.swapchain_images.borrow().get(&swapchain.as_raw()).cloned().ok_or(vk::Result::ERROR_SURFACE_LOST_KHR)
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        _timeout: u64,
        _signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        self.call("acquire_next_image")?;
        let suboptimal = match self.acquire_script.borrow_mut().pop_front() {
            None | Some(vk::Result::SUCCESS) => false,
            Some(vk::Result::SUBOPTIMAL_KHR) => true,
            Some(err) => return Err(err),
        };
        let count = self.swapchain_images.borrow().get(&swapchain.as_raw()).map_or(0, Vec::len) as u32;
        if count == 0 {
            return Err(vk::Result::ERROR_SURFACE_LOST_KHR);
        }
        let image_index = self.next_image.get() % count;
        self.next_image.set(image_index + 1);
        Ok((image_index, suboptimal))
    }

    fn queue_present(&self, _queue: vk::Queue, desc: &PresentDesc) -> VkResult<bool> {
        self.call("queue_present")?;
        self.presents.borrow_mut().push(*desc);
        match self.present_script.borrow_mut().pop_front() {
            None | Some(vk::Result::SUCCESS) => Ok(false),
            Some(vk::Result::SUBOPTIMAL_KHR) => Ok(true),
            Some(err) => Err(err),
        }
    }

    fn create_image_view(&self, _image: vk::Image, _format: vk::Format) -> VkResult<vk::ImageView> {
        self.create(ObjectKind::ImageView)
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.destroy(ObjectKind::ImageView, view);
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> VkResult<vk::RenderPass> {
        let render_pass = self.create(ObjectKind::RenderPass)?;
        self.render_pass_descs.borrow_mut().push(*desc);
        Ok(render_pass)
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.destroy(ObjectKind::RenderPass, render_pass);
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> VkResult<vk::Framebuffer> {
        self.assert_alive(ObjectKind::RenderPass, desc.render_pass);
        self.assert_alive(ObjectKind::ImageView, desc.attachment);
        self.create(ObjectKind::Framebuffer)
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.destroy(ObjectKind::Framebuffer, framebuffer);
    }

    fn create_shader_module(&self, code: &[u32]) -> VkResult<vk::ShaderModule> {
        assert!(!code.is_empty());
        self.create(ObjectKind::ShaderModule)
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.destroy(ObjectKind::ShaderModule, module);
    }

    fn create_descriptor_set_layout(&self, _bindings: &[DescriptorBindingDesc]) -> VkResult<vk::DescriptorSetLayout> {
        self.create(ObjectKind::DescriptorSetLayout)
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.destroy(ObjectKind::DescriptorSetLayout, layout);
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
        _push_constant_ranges: &[vk::PushConstantRange],
    ) -> VkResult<vk::PipelineLayout> {
        for layout in set_layouts {
            self.assert_alive(ObjectKind::DescriptorSetLayout, *layout);
        }
        self.create(ObjectKind::PipelineLayout)
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.destroy(ObjectKind::PipelineLayout, layout);
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> VkResult<vk::Pipeline> {
        self.assert_alive(ObjectKind::ShaderModule, desc.vertex_module);
        self.assert_alive(ObjectKind::ShaderModule, desc.fragment_module);
        self.assert_alive(ObjectKind::PipelineLayout, desc.layout);
        self.assert_alive(ObjectKind::RenderPass, desc.render_pass);
        let pipeline = self.create(ObjectKind::Pipeline)?;
        self.pipeline_descs.borrow_mut().push(desc.clone());
        Ok(pipeline)
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.destroy(ObjectKind::Pipeline, pipeline);
    }

    fn create_descriptor_pool(&self, _max_sets: u32, _uniform_buffer_count: u32) -> VkResult<vk::DescriptorPool> {
        self.create(ObjectKind::DescriptorPool)
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.destroy(ObjectKind::DescriptorPool, pool);
    }

    fn allocate_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        layouts: &[vk::DescriptorSetLayout],
    ) -> VkResult<Vec<vk::DescriptorSet>> {
        self.assert_alive(ObjectKind::DescriptorPool, pool);
        self.call("allocate_descriptor_sets")?;
        Ok(layouts.iter().map(|_| self.next_handle()).collect())
    }

    fn write_uniform_buffer_descriptor(
        &self,
        _set: vk::DescriptorSet,
        _binding: u32,
        buffer: vk::Buffer,
        _range: vk::DeviceSize,
    ) {
        self.assert_alive(ObjectKind::Buffer, buffer);
        self.events.borrow_mut().push(DriverEvent::Call("update_descriptor_sets"));
    }

    fn create_command_pool(
        &self,
        _queue_family_index: u32,
        _flags: vk::CommandPoolCreateFlags,
    ) -> VkResult<vk::CommandPool> {
        self.create(ObjectKind::CommandPool)
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        self.destroy(ObjectKind::CommandPool, pool);
    }

    fn allocate_command_buffers(&self, pool: vk::CommandPool, count: u32) -> VkResult<Vec<vk::CommandBuffer>> {
        self.assert_alive(ObjectKind::CommandPool, pool);
        let mut command_buffers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            match self.create(ObjectKind::CommandBuffer) {
                Ok(command_buffer) => command_buffers.push(command_buffer),
                Err(err) => {
                    // vkAllocateCommandBuffers 失败时不会留下任何 command buffer
                    for command_buffer in command_buffers.into_iter().rev() {
                        self.destroy(ObjectKind::CommandBuffer, command_buffer);
                    }
                    return Err(err);
                }
            }
        }
        Ok(command_buffers)
    }

    fn free_command_buffers(&self, pool: vk::CommandPool, command_buffers: &[vk::CommandBuffer]) {
        self.assert_alive(ObjectKind::CommandPool, pool);
        for command_buffer in command_buffers.iter().rev() {
            self.destroy(ObjectKind::CommandBuffer, *command_buffer);
        }
    }

    fn reset_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        self.assert_alive(ObjectKind::CommandBuffer, command_buffer);
        self.call("reset_command_buffer")
    }

    fn record_commands(
        &self,
        command_buffer: vk::CommandBuffer,
        _usage: vk::CommandBufferUsageFlags,
        commands: &[GfxCommand],
    ) -> VkResult<()> {
        self.assert_alive(ObjectKind::CommandBuffer, command_buffer);
        self.call("record_commands")?;
        self.recorded.borrow_mut().push((command_buffer, commands.to_vec()));
        Ok(())
    }

    fn queue_submit(&self, _queue: vk::Queue, desc: &SubmitDesc) -> VkResult<()> {
        self.assert_alive(ObjectKind::CommandBuffer, desc.command_buffer);
        self.call("queue_submit")?;
        if desc.fence != vk::Fence::null() {
            let mut fences = self.fences.borrow_mut();
            let signaled = fences.get_mut(&desc.fence.as_raw()).expect("submit with unknown fence");
            assert!(!*signaled, "submit with a fence that is still signaled");
            // GPU 立即完成
            *signaled = true;
        }
        self.submits.borrow_mut().push(*desc);
        Ok(())
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        self.create(ObjectKind::Semaphore)
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.destroy(ObjectKind::Semaphore, semaphore);
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let fence: vk::Fence = self.create(ObjectKind::Fence)?;
        self.fences.borrow_mut().insert(fence.as_raw(), signaled);
        Ok(fence)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        self.destroy(ObjectKind::Fence, fence);
        self.fences.borrow_mut().remove(&fence.as_raw());
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout: u64) -> VkResult<()> {
        self.call("wait_for_fence")?;
        if self.fence_signaled(fence) { Ok(()) } else { Err(vk::Result::TIMEOUT) }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        self.call("reset_fence")?;
        self.fences.borrow_mut().insert(fence.as_raw(), false);
        Ok(())
    }

    fn create_buffer(&self, size: vk::DeviceSize, _usage: vk::BufferUsageFlags) -> VkResult<vk::Buffer> {
        let buffer: vk::Buffer = self.create(ObjectKind::Buffer)?;
        self.buffer_sizes.borrow_mut().insert(buffer.as_raw(), size);
        Ok(buffer)
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        self.destroy(ObjectKind::Buffer, buffer);
        self.buffer_sizes.borrow_mut().remove(&buffer.as_raw());
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> VkResult<vk::MemoryRequirements> {
        let size = self.buffer_sizes.borrow().get(&buffer.as_raw()).copied().unwrap_or(0);
        Ok(vk::MemoryRequirements {
            size: size.div_ceil(256) * 256,
            alignment: 256,
            memory_type_bits: (1 << DEVICE_LOCAL_TYPE) | (1 << HOST_VISIBLE_TYPE),
        })
    }

    fn allocate_memory(&self, size: vk::DeviceSize, _memory_type_index: u32) -> VkResult<vk::DeviceMemory> {
        let memory: vk::DeviceMemory = self.create(ObjectKind::Memory)?;
        self.memories.borrow_mut().insert(memory.as_raw(), vec![0; size as usize]);
        Ok(memory)
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        self.destroy(ObjectKind::Memory, memory);
        self.memories.borrow_mut().remove(&memory.as_raw());
    }

    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory) -> VkResult<()> {
        self.assert_alive(ObjectKind::Buffer, buffer);
        self.assert_alive(ObjectKind::Memory, memory);
        self.call("bind_buffer_memory")
    }

    fn map_memory(&self, memory: vk::DeviceMemory) -> VkResult<*mut u8> {
        self.call("map_memory")?;
        let mut memories = self.memories.borrow_mut();
        let bytes = memories.get_mut(&memory.as_raw()).ok_or(vk::Result::ERROR_MEMORY_MAP_FAILED)?;
        Ok(bytes.as_mut_ptr())
    }

    fn unmap_memory(&self, memory: vk::DeviceMemory) {
        self.assert_alive(ObjectKind::Memory, memory);
        self.events.borrow_mut().push(DriverEvent::Call("unmap_memory"));
    }
}

/// 测试用的窗口系统，支持 vulkan 并要求 surface 相关的 extension
pub struct FakePlatform {
    pub vulkan_supported: bool,
}

impl GfxPlatform for FakePlatform {
    fn required_instance_extensions(&self) -> Option<Vec<&'static CStr>> {
        self.vulkan_supported.then(|| vec![ash::khr::surface::NAME, c"VK_KHR_xlib_surface"])
    }
}

/// 测试用的窗口，framebuffer 尺寸可以随时修改
pub struct FakeWindow {
    pub size: Cell<vk::Extent2D>,
}

impl FakeWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Cell::new(vk::Extent2D { width, height }),
        }
    }
}

impl GfxWindow for FakeWindow {
    fn framebuffer_size(&self) -> vk::Extent2D {
        self.size.get()
    }
}

impl raw_window_handle::HasDisplayHandle for FakeWindow {
    fn display_handle(&self) -> Result<raw_window_handle::DisplayHandle<'_>, raw_window_handle::HandleError> {
        Ok(raw_window_handle::DisplayHandle::web())
    }
}

impl raw_window_handle::HasWindowHandle for FakeWindow {
    fn window_handle(&self) -> Result<raw_window_handle::WindowHandle<'_>, raw_window_handle::HandleError> {
        // FakeDriver 不会解析窗口句柄
        Err(raw_window_handle::HandleError::NotSupported)
    }
}
