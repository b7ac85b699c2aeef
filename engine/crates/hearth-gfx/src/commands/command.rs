use ash::vk;

/// 录制到 command buffer 中的一条命令
///
/// 录制过程以命令列表的形式交给 driver，便于在测试中检查录制结果
#[derive(Debug, Clone, PartialEq)]
pub enum GfxCommand {
    BeginRenderPass {
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    },
    EndRenderPass,
    BindPipeline(vk::Pipeline),
    /// 覆盖整个 extent 的 viewport，depth 范围 [0, 1]
    SetViewport(vk::Extent2D),
    SetScissor(vk::Extent2D),
    BindVertexBuffer(vk::Buffer),
    BindDescriptorSet {
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    },
    PushConstants {
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        data: Vec<u8>,
    },
    Draw {
        vertex_count: u32,
    },
    CopyBuffer {
        src: vk::Buffer,
        dst: vk::Buffer,
        size: vk::DeviceSize,
    },
}

impl GfxCommand {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::BeginRenderPass { .. } => "begin_render_pass",
            Self::EndRenderPass => "end_render_pass",
            Self::BindPipeline(_) => "bind_pipeline",
            Self::SetViewport(_) => "set_viewport",
            Self::SetScissor(_) => "set_scissor",
            Self::BindVertexBuffer(_) => "bind_vertex_buffer",
            Self::BindDescriptorSet { .. } => "bind_descriptor_set",
            Self::PushConstants { .. } => "push_constants",
            Self::Draw { .. } => "draw",
            Self::CopyBuffer { .. } => "copy_buffer",
        }
    }
}
