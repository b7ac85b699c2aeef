use ash::vk;

use crate::driver::{DescriptorBindingDesc, GfxDriver, GraphicsPipelineDesc, PipelineViewport};
use crate::error::{GfxResult, VkCheck};
use crate::pipelines::shader::{GfxShaderModule, ShaderBytecode};
use crate::teardown::TeardownStack;

/// 一个 4x4 f32 矩阵
pub const PUSH_CONSTANT_SIZE: u32 = 64;

pub const SHADER_ENTRY_POINT: &std::ffi::CStr = c"main";

/// 交错存放的顶点属性：binding 0 上的 position 与 color
#[derive(Debug, Clone)]
pub struct GfxVertexLayout {
    pub stride: u32,
    pub attributes: Vec<(vk::Format, u32)>,
}

impl GfxVertexLayout {
    pub fn bindings(&self) -> Vec<vk::VertexInputBindingDescription> {
        vec![vk::VertexInputBindingDescription {
            binding: 0,
            stride: self.stride,
            input_rate: vk::VertexInputRate::VERTEX,
        }]
    }

    /// location 与 attributes 的顺序一致
    pub fn attribute_descriptions(&self) -> Vec<vk::VertexInputAttributeDescription> {
        self.attributes
            .iter()
            .enumerate()
            .map(|(location, (format, offset))| vk::VertexInputAttributeDescription {
                location: location as u32,
                binding: 0,
                format: *format,
                offset: *offset,
            })
            .collect()
    }
}

/// pipeline layout 中声明的资源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GfxPipelineLayoutDesc {
    /// set 0, binding 0 上的 uniform buffer，vertex stage 可见
    pub uniform_buffer: bool,
    /// vertex stage 的 64 字节 push constant
    pub push_constants: bool,
}

pub struct GfxPipelineDesc<'a> {
    pub vertex_shader: &'a ShaderBytecode,
    pub fragment_shader: &'a ShaderBytecode,
    pub vertex_layout: &'a GfxVertexLayout,
    pub layout: GfxPipelineLayoutDesc,
    pub viewport: PipelineViewport,
    pub render_pass: vk::RenderPass,
}

/// 两个 shader module、pipeline layout 以及 graphics pipeline
pub struct GfxPipelineState {
    vertex_module: GfxShaderModule,
    fragment_module: GfxShaderModule,
    descriptor_set_layout: Option<vk::DescriptorSetLayout>,
    layout: vk::PipelineLayout,
    push_constant_range: Option<vk::PushConstantRange>,
    pipeline: vk::Pipeline,
}

// new & init
impl GfxPipelineState {
    /// 创建顺序：vertex module -> fragment module -> descriptor set layout -> pipeline layout -> pipeline
    pub fn new(driver: &dyn GfxDriver, desc: &GfxPipelineDesc<'_>) -> GfxResult<Self> {
        let mut teardown = TeardownStack::new();
        match Self::init(driver, desc, &mut teardown) {
            Ok(state) => {
                teardown.disarm();
                Ok(state)
            }
            Err(err) => {
                log::error!("failed to build graphics pipeline: {}", err);
                teardown.unwind(driver);
                Err(err)
            }
        }
    }

    fn init(driver: &dyn GfxDriver, desc: &GfxPipelineDesc<'_>, teardown: &mut TeardownStack) -> GfxResult<Self> {
        let vertex_module = GfxShaderModule::new(driver, desc.vertex_shader)?;
        let vertex_handle = vertex_module.handle();
        teardown.push("vertex shader module", move |driver| driver.destroy_shader_module(vertex_handle));

        let fragment_module = GfxShaderModule::new(driver, desc.fragment_shader)?;
        let fragment_handle = fragment_module.handle();
        teardown.push("fragment shader module", move |driver| driver.destroy_shader_module(fragment_handle));

        let descriptor_set_layout = if desc.layout.uniform_buffer {
            let bindings = [DescriptorBindingDesc {
                binding: 0,
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                count: 1,
                stages: vk::ShaderStageFlags::VERTEX,
            }];
            let set_layout = driver.create_descriptor_set_layout(&bindings).vk_check("vkCreateDescriptorSetLayout")?;
            teardown.push("descriptor set layout", move |driver| driver.destroy_descriptor_set_layout(set_layout));
            Some(set_layout)
        } else {
            None
        };

        let push_constant_range = desc.layout.push_constants.then_some(vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX,
            offset: 0,
            size: PUSH_CONSTANT_SIZE,
        });

        let set_layouts = descriptor_set_layout.into_iter().collect::<Vec<_>>();
        let push_ranges = push_constant_range.into_iter().collect::<Vec<_>>();
        let layout = driver.create_pipeline_layout(&set_layouts, &push_ranges).vk_check("vkCreatePipelineLayout")?;
        teardown.push("pipeline layout", move |driver| driver.destroy_pipeline_layout(layout));

        let pipeline = driver
            .create_graphics_pipeline(&Self::fixed_function_desc(
                desc,
                vertex_module.handle(),
                fragment_module.handle(),
                layout,
            ))
            .vk_check("vkCreateGraphicsPipelines")?;

        log::info!("graphics pipeline created, layout: {:?}, viewport: {:?}", desc.layout, desc.viewport);

        Ok(Self {
            vertex_module,
            fragment_module,
            descriptor_set_layout,
            layout,
            push_constant_range,
            pipeline,
        })
    }

    /// triangle list，剔除背面，顺时针为正面，单采样，不做混合
    fn fixed_function_desc(
        desc: &GfxPipelineDesc<'_>,
        vertex_module: vk::ShaderModule,
        fragment_module: vk::ShaderModule,
        layout: vk::PipelineLayout,
    ) -> GraphicsPipelineDesc {
        GraphicsPipelineDesc {
            vertex_module,
            fragment_module,
            entry_point: SHADER_ENTRY_POINT,
            vertex_bindings: desc.vertex_layout.bindings(),
            vertex_attributes: desc.vertex_layout.attribute_descriptions(),
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::CLOCKWISE,
            samples: vk::SampleCountFlags::TYPE_1,
            color_blend: vk::PipelineColorBlendAttachmentState {
                blend_enable: vk::FALSE,
                color_write_mask: vk::ColorComponentFlags::RGBA,
                ..Default::default()
            },
            viewport: desc.viewport,
            layout,
            render_pass: desc.render_pass,
            subpass: 0,
        }
    }
}

// update
impl GfxPipelineState {
    /// 复用 shader module 与 layout，只重建 pipeline 本身
    ///
    /// viewport 固化在 pipeline 中时，swapchain 的 extent 变化之后需要调用；调用前需要确保 device 已经 idle
    pub fn rebuild_pipeline(&mut self, driver: &dyn GfxDriver, desc: &GfxPipelineDesc<'_>) -> GfxResult<()> {
        let pipeline = driver
            .create_graphics_pipeline(&Self::fixed_function_desc(
                desc,
                self.vertex_module.handle(),
                self.fragment_module.handle(),
                self.layout,
            ))
            .vk_check("vkCreateGraphicsPipelines")?;
        driver.destroy_pipeline(self.pipeline);
        self.pipeline = pipeline;

        log::info!("graphics pipeline rebuilt, viewport: {:?}", desc.viewport);
        Ok(())
    }
}

// getters
impl GfxPipelineState {
    #[inline]
    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline
    }

    #[inline]
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    #[inline]
    pub fn descriptor_set_layout(&self) -> Option<vk::DescriptorSetLayout> {
        self.descriptor_set_layout
    }

    #[inline]
    pub fn push_constant_range(&self) -> Option<vk::PushConstantRange> {
        self.push_constant_range
    }
}

// destroy
impl GfxPipelineState {
    pub fn destroy(self, driver: &dyn GfxDriver) {
        driver.destroy_pipeline(self.pipeline);
        driver.destroy_pipeline_layout(self.layout);
        if let Some(set_layout) = self.descriptor_set_layout {
            driver.destroy_descriptor_set_layout(set_layout);
        }
        self.fragment_module.destroy(driver);
        self.vertex_module.destroy(driver);
    }
}
