use std::cell::{Ref, RefCell};

use ash::prelude::VkResult;
use ash::vk;
use itertools::Itertools;

use crate::commands::command::GfxCommand;
use crate::driver::debug_messenger::debug_utils_messenger_ci;
use crate::driver::{
    DescriptorBindingDesc, DeviceDesc, FramebufferDesc, GfxDriver, GraphicsPipelineDesc, InstanceDesc,
    PipelineViewport, PresentDesc, RenderPassDesc, SubmitDesc, SwapchainDesc,
};
use crate::error::{GfxError, GfxResult};
use crate::foundation::platform::GfxWindow;

struct InstanceFns {
    handle: ash::Instance,
    surface: ash::khr::surface::Instance,
    debug_utils: Option<ash::ext::debug_utils::Instance>,
}

struct DeviceFns {
    handle: ash::Device,
    swapchain: ash::khr::swapchain::Device,
}

/// 基于 ash 的 vulkan driver
///
/// 运行时加载 vulkan loader；instance 和 device 的函数表在创建后保存在内部，
/// 销毁后对应的调用会返回 `ERROR_INITIALIZATION_FAILED`
pub struct AshDriver {
    entry: ash::Entry,
    instance: RefCell<Option<InstanceFns>>,
    device: RefCell<Option<DeviceFns>>,
}

// 构造
impl AshDriver {
    pub fn new() -> GfxResult<Self> {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GfxError::UnsupportedPlatform(format!("failed to load the vulkan loader: {e}")))?;
        Ok(Self {
            entry,
            instance: RefCell::new(None),
            device: RefCell::new(None),
        })
    }
}

impl Drop for AshDriver {
    fn drop(&mut self) {
        if self.device.get_mut().is_some() || self.instance.get_mut().is_some() {
            log::warn!("AshDriver dropped while the vulkan device or instance is still alive");
        }
    }
}

// tools
impl AshDriver {
    fn instance_fns(&self) -> VkResult<Ref<'_, InstanceFns>> {
        Ref::filter_map(self.instance.borrow(), Option::as_ref).map_err(|_| vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn device_fns(&self) -> VkResult<Ref<'_, DeviceFns>> {
        Ref::filter_map(self.device.borrow(), Option::as_ref).map_err(|_| vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    /// 销毁类的调用没有返回值，device 不存在时只能记录下来
    fn with_device(&self, what: &str, f: impl FnOnce(&DeviceFns)) {
        match self.device_fns() {
            Ok(device) => f(&device),
            Err(_) => log::error!("no vulkan device alive, cannot destroy {}", what),
        }
    }

    fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
        vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent,
        }
    }

    fn record_command(device: &ash::Device, command_buffer: vk::CommandBuffer, command: &GfxCommand) {
        unsafe {
            match command {
                GfxCommand::BeginRenderPass {
                    render_pass,
                    framebuffer,
                    extent,
                    clear_color,
                } => {
                    let clear_values = [vk::ClearValue {
                        color: vk::ClearColorValue { float32: *clear_color },
                    }];
                    let begin_info = vk::RenderPassBeginInfo::default()
                        .render_pass(*render_pass)
                        .framebuffer(*framebuffer)
                        .render_area(Self::full_scissor(*extent))
                        .clear_values(&clear_values);
                    device.cmd_begin_render_pass(command_buffer, &begin_info, vk::SubpassContents::INLINE);
                }
                GfxCommand::EndRenderPass => device.cmd_end_render_pass(command_buffer),
                GfxCommand::BindPipeline(pipeline) => {
                    device.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, *pipeline)
                }
                GfxCommand::SetViewport(extent) => {
                    device.cmd_set_viewport(command_buffer, 0, &[Self::full_viewport(*extent)])
                }
                GfxCommand::SetScissor(extent) => {
                    device.cmd_set_scissor(command_buffer, 0, &[Self::full_scissor(*extent)])
                }
                GfxCommand::BindVertexBuffer(buffer) => {
                    device.cmd_bind_vertex_buffers(command_buffer, 0, std::slice::from_ref(buffer), &[0])
                }
                GfxCommand::BindDescriptorSet { layout, set } => device.cmd_bind_descriptor_sets(
                    command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    *layout,
                    0,
                    std::slice::from_ref(set),
                    &[],
                ),
                GfxCommand::PushConstants { layout, stages, data } => {
                    device.cmd_push_constants(command_buffer, *layout, *stages, 0, data)
                }
                GfxCommand::Draw { vertex_count } => device.cmd_draw(command_buffer, *vertex_count, 1, 0, 0),
                GfxCommand::CopyBuffer { src, dst, size } => {
                    let region = vk::BufferCopy {
                        src_offset: 0,
                        dst_offset: 0,
                        size: *size,
                    };
                    device.cmd_copy_buffer(command_buffer, *src, *dst, &[region])
                }
            }
        }
    }
}

impl GfxDriver for AshDriver {
    fn instance_version(&self) -> VkResult<u32> {
        // None 表示只支持 1.0
        let version = unsafe { self.entry.try_enumerate_instance_version()? };
        Ok(version.unwrap_or(vk::API_VERSION_1_0))
    }

    fn create_instance(&self, desc: &InstanceDesc<'_>) -> VkResult<vk::Instance> {
        if self.instance.borrow().is_some() {
            log::error!("a vulkan instance already exists");
            return Err(vk::Result::ERROR_TOO_MANY_OBJECTS);
        }

        let layer_names = desc.layers.iter().map(|layer| layer.as_ptr()).collect_vec();
        let extension_names = desc.extensions.iter().map(|ext| ext.as_ptr()).collect_vec();
        log::info!("instance layers: {:?}", desc.layers);
        log::info!("instance extensions: {:?}", desc.extensions);

        let app_info = vk::ApplicationInfo::default()
            .application_name(desc.app_name)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(desc.engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(desc.api_version);

        let mut debug_utils_messenger_ci = debug_utils_messenger_ci();
        let mut create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extension_names);
        if desc.debug_messenger {
            create_info = create_info.push_next(&mut debug_utils_messenger_ci);
        }

        let instance = unsafe { self.entry.create_instance(&create_info, None)? };
        let surface = ash::khr::surface::Instance::new(&self.entry, &instance);
        let debug_utils = desc.debug_messenger.then(|| ash::ext::debug_utils::Instance::new(&self.entry, &instance));

        let handle = instance.handle();
        *self.instance.borrow_mut() = Some(InstanceFns {
            handle: instance,
            surface,
            debug_utils,
        });
        Ok(handle)
    }

    fn destroy_instance(&self, instance: vk::Instance) {
        let Some(fns) = self.instance.borrow_mut().take() else {
            log::error!("no vulkan instance alive");
            return;
        };
        debug_assert_eq!(fns.handle.handle(), instance);
        log::info!("destroying instance");
        unsafe { fns.handle.destroy_instance(None) };
    }

    fn create_debug_messenger(&self, _instance: vk::Instance) -> VkResult<vk::DebugUtilsMessengerEXT> {
        let fns = self.instance_fns()?;
        let loader = fns.debug_utils.as_ref().ok_or(vk::Result::ERROR_EXTENSION_NOT_PRESENT)?;
        unsafe { loader.create_debug_utils_messenger(&debug_utils_messenger_ci(), None) }
    }

    fn destroy_debug_messenger(&self, messenger: vk::DebugUtilsMessengerEXT) {
        let Ok(fns) = self.instance_fns() else {
            log::error!("no vulkan instance alive, cannot destroy debug messenger");
            return;
        };
        if let Some(loader) = fns.debug_utils.as_ref() {
            unsafe { loader.destroy_debug_utils_messenger(messenger, None) };
        }
    }

    fn enumerate_adapters(&self, _instance: vk::Instance) -> VkResult<Vec<vk::PhysicalDevice>> {
        let fns = self.instance_fns()?;
        unsafe { fns.handle.enumerate_physical_devices() }
    }

    fn adapter_properties(&self, adapter: vk::PhysicalDevice) -> VkResult<vk::PhysicalDeviceProperties> {
        let fns = self.instance_fns()?;
        Ok(unsafe { fns.handle.get_physical_device_properties(adapter) })
    }

    fn queue_family_properties(&self, adapter: vk::PhysicalDevice) -> VkResult<Vec<vk::QueueFamilyProperties>> {
        let fns = self.instance_fns()?;
        Ok(unsafe { fns.handle.get_physical_device_queue_family_properties(adapter) })
    }

    fn memory_properties(&self, adapter: vk::PhysicalDevice) -> VkResult<vk::PhysicalDeviceMemoryProperties> {
        let fns = self.instance_fns()?;
        Ok(unsafe { fns.handle.get_physical_device_memory_properties(adapter) })
    }

    fn device_extension_names(&self, adapter: vk::PhysicalDevice) -> VkResult<Vec<String>> {
        let fns = self.instance_fns()?;
        let exts = unsafe { fns.handle.enumerate_device_extension_properties(adapter)? };
        Ok(exts
            .iter()
            .filter_map(|ext| ext.extension_name_as_c_str().ok())
            .map(|name| name.to_string_lossy().into_owned())
            .collect())
    }

    fn create_device(&self, adapter: vk::PhysicalDevice, desc: &DeviceDesc<'_>) -> VkResult<vk::Device> {
        if self.device.borrow().is_some() {
            log::error!("a vulkan device already exists");
            return Err(vk::Result::ERROR_TOO_MANY_OBJECTS);
        }
        let fns = self.instance_fns()?;

        let queue_priorities = [1.0_f32];
        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(desc.queue_family_index)
            .queue_priorities(&queue_priorities)];
        let extension_names = desc.extensions.iter().map(|ext| ext.as_ptr()).collect_vec();
        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names);

        let device = unsafe { fns.handle.create_device(adapter, &create_info, None)? };
        let swapchain = ash::khr::swapchain::Device::new(&fns.handle, &device);

        let handle = device.handle();
        *self.device.borrow_mut() = Some(DeviceFns {
            handle: device,
            swapchain,
        });
        Ok(handle)
    }

    fn destroy_device(&self, device: vk::Device) {
        let Some(fns) = self.device.borrow_mut().take() else {
            log::error!("no vulkan device alive");
            return;
        };
        debug_assert_eq!(fns.handle.handle(), device);
        log::info!("destroying device");
        unsafe { fns.handle.destroy_device(None) };
    }

    fn device_queue(&self, queue_family_index: u32, queue_index: u32) -> VkResult<vk::Queue> {
        let device = self.device_fns()?;
        Ok(unsafe { device.handle.get_device_queue(queue_family_index, queue_index) })
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        let device = self.device_fns()?;
        unsafe { device.handle.device_wait_idle() }
    }

    fn queue_wait_idle(&self, queue: vk::Queue) -> VkResult<()> {
        let device = self.device_fns()?;
        unsafe { device.handle.queue_wait_idle(queue) }
    }

    fn create_surface(&self, instance: vk::Instance, window: &dyn GfxWindow) -> VkResult<vk::SurfaceKHR> {
        let fns = self.instance_fns()?;
        debug_assert_eq!(fns.handle.handle(), instance);

        let handles = window
            .display_handle()
            .and_then(|display| Ok((display.as_raw(), window.window_handle()?.as_raw())));
        let (raw_display_handle, raw_window_handle) = handles.map_err(|e| {
            log::error!("window handle unavailable: {}", e);
            vk::Result::ERROR_INITIALIZATION_FAILED
        })?;

        unsafe { ash_window::create_surface(&self.entry, &fns.handle, raw_display_handle, raw_window_handle, None) }
    }

    fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        let Ok(fns) = self.instance_fns() else {
            log::error!("no vulkan instance alive, cannot destroy surface");
            return;
        };
        unsafe { fns.surface.destroy_surface(surface, None) };
    }

    fn surface_capabilities(
        &self,
        adapter: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        let fns = self.instance_fns()?;
        unsafe { fns.surface.get_physical_device_surface_capabilities(adapter, surface) }
    }

    fn surface_formats(
        &self,
        adapter: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        let fns = self.instance_fns()?;
        unsafe { fns.surface.get_physical_device_surface_formats(adapter, surface) }
    }

    fn surface_present_modes(
        &self,
        adapter: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        let fns = self.instance_fns()?;
        unsafe { fns.surface.get_physical_device_surface_present_modes(adapter, surface) }
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        let device = self.device_fns()?;
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(desc.surface)
            .min_image_count(desc.min_image_count)
            .image_format(desc.format.format)
            .image_color_space(desc.format.color_space)
            .image_extent(desc.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(desc.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(desc.present_mode)
            .clipped(true)
            .old_swapchain(desc.old_swapchain);
        unsafe { device.swapchain.create_swapchain(&create_info, None) }
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        self.with_device("swapchain", |device| unsafe { device.swapchain.destroy_swapchain(swapchain, None) });
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        let device = self.device_fns()?;
        unsafe { device.swapchain.get_swapchain_images(swapchain) }
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        let device = self.device_fns()?;
        unsafe { device.swapchain.acquire_next_image(swapchain, timeout, signal, vk::Fence::null()) }
    }

    fn queue_present(&self, queue: vk::Queue, desc: &PresentDesc) -> VkResult<bool> {
        let device = self.device_fns()?;
        let wait_semaphores = [desc.wait];
        let swapchains = [desc.swapchain];
        let image_indices = [desc.image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        unsafe { device.swapchain.queue_present(queue, &present_info) }
    }

    fn create_image_view(&self, image: vk::Image, format: vk::Format) -> VkResult<vk::ImageView> {
        let device = self.device_fns()?;
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        unsafe { device.handle.create_image_view(&create_info, None) }
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.with_device("image view", |device| unsafe { device.handle.destroy_image_view(view, None) });
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> VkResult<vk::RenderPass> {
        let device = self.device_fns()?;
        let attachments = [desc.color_attachment];
        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: desc.color_layout,
        }];
        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)];
        let dependencies = [desc.dependency];
        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);
        unsafe { device.handle.create_render_pass(&create_info, None) }
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.with_device("render pass", |device| unsafe { device.handle.destroy_render_pass(render_pass, None) });
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> VkResult<vk::Framebuffer> {
        let device = self.device_fns()?;
        let attachments = [desc.attachment];
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(desc.render_pass)
            .attachments(&attachments)
            .width(desc.extent.width)
            .height(desc.extent.height)
            .layers(1);
        unsafe { device.handle.create_framebuffer(&create_info, None) }
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.with_device("framebuffer", |device| unsafe { device.handle.destroy_framebuffer(framebuffer, None) });
    }

    fn create_shader_module(&self, code: &[u32]) -> VkResult<vk::ShaderModule> {
        let device = self.device_fns()?;
        let create_info = vk::ShaderModuleCreateInfo::default().code(code);
        unsafe { device.handle.create_shader_module(&create_info, None) }
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.with_device("shader module", |device| unsafe { device.handle.destroy_shader_module(module, None) });
    }

    fn create_descriptor_set_layout(&self, bindings: &[DescriptorBindingDesc]) -> VkResult<vk::DescriptorSetLayout> {
        let device = self.device_fns()?;
        let bindings = bindings
            .iter()
            .map(|binding| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(binding.binding)
                    .descriptor_type(binding.descriptor_type)
                    .descriptor_count(binding.count)
                    .stage_flags(binding.stages)
            })
            .collect_vec();
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        unsafe { device.handle.create_descriptor_set_layout(&create_info, None) }
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.with_device("descriptor set layout", |device| unsafe {
            device.handle.destroy_descriptor_set_layout(layout, None)
        });
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> VkResult<vk::PipelineLayout> {
        let device = self.device_fns()?;
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_constant_ranges);
        unsafe { device.handle.create_pipeline_layout(&create_info, None) }
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.with_device("pipeline layout", |device| unsafe { device.handle.destroy_pipeline_layout(layout, None) });
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> VkResult<vk::Pipeline> {
        let device = self.device_fns()?;

        let stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(desc.vertex_module)
                .name(desc.entry_point),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(desc.fragment_module)
                .name(desc.entry_point),
        ];

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&desc.vertex_bindings)
            .vertex_attribute_descriptions(&desc.vertex_attributes);
        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(desc.topology)
            .primitive_restart_enable(false);

        // 动态 viewport 时只需要声明数量
        let (viewports, scissors, dynamic_states) = match desc.viewport {
            PipelineViewport::Static(extent) => {
                (vec![Self::full_viewport(extent)], vec![Self::full_scissor(extent)], vec![])
            }
            PipelineViewport::Dynamic => (vec![], vec![], vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]),
        };
        let viewport_state = match desc.viewport {
            PipelineViewport::Static(_) => {
                vk::PipelineViewportStateCreateInfo::default().viewports(&viewports).scissors(&scissors)
            }
            PipelineViewport::Dynamic => {
                vk::PipelineViewportStateCreateInfo::default().viewport_count(1).scissor_count(1)
            }
        };
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(desc.cull_mode)
            .front_face(desc.front_face)
            .depth_bias_enable(false)
            .line_width(1.0);
        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(desc.samples)
            .sample_shading_enable(false)
            .min_sample_shading(1.0);

        let color_blend_attachments = [desc.color_blend];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(desc.layout)
            .render_pass(desc.render_pass)
            .subpass(desc.subpass);

        let pipelines = unsafe {
            device.handle.create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&create_info), None)
        }
        .map_err(|(_, result)| result)?;
        pipelines.into_iter().next().ok_or(vk::Result::ERROR_UNKNOWN)
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.with_device("pipeline", |device| unsafe { device.handle.destroy_pipeline(pipeline, None) });
    }

    fn create_descriptor_pool(&self, max_sets: u32, uniform_buffer_count: u32) -> VkResult<vk::DescriptorPool> {
        let device = self.device_fns()?;
        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: uniform_buffer_count,
        }];
        let create_info = vk::DescriptorPoolCreateInfo::default().max_sets(max_sets).pool_sizes(&pool_sizes);
        unsafe { device.handle.create_descriptor_pool(&create_info, None) }
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.with_device("descriptor pool", |device| unsafe { device.handle.destroy_descriptor_pool(pool, None) });
    }

    fn allocate_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        layouts: &[vk::DescriptorSetLayout],
    ) -> VkResult<Vec<vk::DescriptorSet>> {
        let device = self.device_fns()?;
        let allocate_info = vk::DescriptorSetAllocateInfo::default().descriptor_pool(pool).set_layouts(layouts);
        unsafe { device.handle.allocate_descriptor_sets(&allocate_info) }
    }

    fn write_uniform_buffer_descriptor(
        &self,
        set: vk::DescriptorSet,
        binding: u32,
        buffer: vk::Buffer,
        range: vk::DeviceSize,
    ) {
        self.with_device("descriptor write", |device| {
            let buffer_infos = [vk::DescriptorBufferInfo {
                buffer,
                offset: 0,
                range,
            }];
            let write = vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(binding)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&buffer_infos);
            unsafe { device.handle.update_descriptor_sets(std::slice::from_ref(&write), &[]) };
        });
    }

    fn create_command_pool(
        &self,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> VkResult<vk::CommandPool> {
        let device = self.device_fns()?;
        let create_info = vk::CommandPoolCreateInfo::default().queue_family_index(queue_family_index).flags(flags);
        unsafe { device.handle.create_command_pool(&create_info, None) }
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        self.with_device("command pool", |device| unsafe { device.handle.destroy_command_pool(pool, None) });
    }

    fn allocate_command_buffers(&self, pool: vk::CommandPool, count: u32) -> VkResult<Vec<vk::CommandBuffer>> {
        let device = self.device_fns()?;
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);
        unsafe { device.handle.allocate_command_buffers(&allocate_info) }
    }

    fn free_command_buffers(&self, pool: vk::CommandPool, command_buffers: &[vk::CommandBuffer]) {
        self.with_device("command buffers", |device| unsafe {
            device.handle.free_command_buffers(pool, command_buffers)
        });
    }

    fn reset_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        let device = self.device_fns()?;
        unsafe { device.handle.reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty()) }
    }

    fn record_commands(
        &self,
        command_buffer: vk::CommandBuffer,
        usage: vk::CommandBufferUsageFlags,
        commands: &[GfxCommand],
    ) -> VkResult<()> {
        let device = self.device_fns()?;
        unsafe {
            device.handle.begin_command_buffer(command_buffer, &vk::CommandBufferBeginInfo::default().flags(usage))?;
        }
        for command in commands {
            log::trace!("record {} into {:?}", command.name(), command_buffer);
            Self::record_command(&device.handle, command_buffer, command);
        }
        unsafe { device.handle.end_command_buffer(command_buffer) }
    }

    fn queue_submit(&self, queue: vk::Queue, desc: &SubmitDesc) -> VkResult<()> {
        let device = self.device_fns()?;
        let (wait_semaphores, wait_stages): (Vec<_>, Vec<_>) = desc.wait.into_iter().unzip();
        let signal_semaphores = desc.signal.into_iter().collect_vec();
        let command_buffers = [desc.command_buffer];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);
        unsafe { device.handle.queue_submit(queue, std::slice::from_ref(&submit_info), desc.fence) }
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        let device = self.device_fns()?;
        unsafe { device.handle.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.with_device("semaphore", |device| unsafe { device.handle.destroy_semaphore(semaphore, None) });
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let device = self.device_fns()?;
        let flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        unsafe { device.handle.create_fence(&vk::FenceCreateInfo::default().flags(flags), None) }
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        self.with_device("fence", |device| unsafe { device.handle.destroy_fence(fence, None) });
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> VkResult<()> {
        let device = self.device_fns()?;
        unsafe { device.handle.wait_for_fences(std::slice::from_ref(&fence), true, timeout) }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        let device = self.device_fns()?;
        unsafe { device.handle.reset_fences(std::slice::from_ref(&fence)) }
    }

    fn create_buffer(&self, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> VkResult<vk::Buffer> {
        let device = self.device_fns()?;
        let create_info =
            vk::BufferCreateInfo::default().size(size).usage(usage).sharing_mode(vk::SharingMode::EXCLUSIVE);
        unsafe { device.handle.create_buffer(&create_info, None) }
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        self.with_device("buffer", |device| unsafe { device.handle.destroy_buffer(buffer, None) });
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> VkResult<vk::MemoryRequirements> {
        let device = self.device_fns()?;
        Ok(unsafe { device.handle.get_buffer_memory_requirements(buffer) })
    }

    fn allocate_memory(&self, size: vk::DeviceSize, memory_type_index: u32) -> VkResult<vk::DeviceMemory> {
        let device = self.device_fns()?;
        let allocate_info =
            vk::MemoryAllocateInfo::default().allocation_size(size).memory_type_index(memory_type_index);
        unsafe { device.handle.allocate_memory(&allocate_info, None) }
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        self.with_device("device memory", |device| unsafe { device.handle.free_memory(memory, None) });
    }

    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory) -> VkResult<()> {
        let device = self.device_fns()?;
        unsafe { device.handle.bind_buffer_memory(buffer, memory, 0) }
    }

    fn map_memory(&self, memory: vk::DeviceMemory) -> VkResult<*mut u8> {
        let device = self.device_fns()?;
        let ptr = unsafe { device.handle.map_memory(memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())? };
        Ok(ptr.cast())
    }

    fn unmap_memory(&self, memory: vk::DeviceMemory) {
        self.with_device("memory mapping", |device| unsafe { device.handle.unmap_memory(memory) });
    }
}
