use std::ffi::CStr;

use ash::vk;
use hearth_gfx::driver::PipelineViewport;
use hearth_gfx::pipelines::graphics_pipeline::GfxPipelineLayoutDesc;
use hearth_gfx::swapchain::selection::{PREFERRED_PRESENT_MODE, PREFERRED_SURFACE_FORMAT};

/// 渲染器默认配置
pub struct DefaultRendererSettings;
impl DefaultRendererSettings {
    pub const APP_NAME: &'static CStr = c"Hearth Cube";
    pub const ENGINE_NAME: &'static CStr = c"Hearth";

    pub const WINDOW_WIDTH: u32 = 1000;
    pub const WINDOW_HEIGHT: u32 = 1000;
    pub const WINDOW_TITLE: &'static str = "Hello Window";

    /// 线性空间的颜色，写入 sRGB 的 swapchain image 时会被自动转换
    pub const CLEAR_COLOR: [f32; 4] = [0.02, 0.02, 0.03, 1.0];

    pub const FRAGMENT_SHADER: &'static str = "frag.spv";

    /// `VK_LAYER_KHRONOS_validation` 以及 debug messenger，release 构建同样开启
    pub const ENABLE_VALIDATION: bool = true;

    pub const DEFAULT_SURFACE_FORMAT: vk::SurfaceFormatKHR = PREFERRED_SURFACE_FORMAT;
    pub const DEFAULT_PRESENT_MODE: vk::PresentModeKHR = PREFERRED_PRESENT_MODE;

    /// 等待 fence 以及 acquire image 的超时时间，相当于无限等待
    pub const FENCE_TIMEOUT: u64 = u64::MAX;
}

/// 变换矩阵以何种方式传给 vertex shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformSource {
    /// 不使用变换，顶点直接位于 clip space
    Static,
    /// 每次 draw 前推送完整的 MVP 矩阵
    #[default]
    PushConstant,
    /// view 与 projection 位于每个 frame slot 的 uniform buffer 中，model 通过 push constant 推送
    UniformBuffer,
}

impl TransformSource {
    /// `shaders/` 目录下对应的 vertex shader 文件名
    pub fn vertex_shader(self) -> &'static str {
        match self {
            Self::Static => "vert_static.spv",
            Self::PushConstant => "vert.spv",
            Self::UniformBuffer => "vert_ubo.spv",
        }
    }

    pub fn pipeline_layout(self) -> GfxPipelineLayoutDesc {
        match self {
            Self::Static => GfxPipelineLayoutDesc {
                uniform_buffer: false,
                push_constants: false,
            },
            Self::PushConstant => GfxPipelineLayoutDesc {
                uniform_buffer: false,
                push_constants: true,
            },
            Self::UniformBuffer => GfxPipelineLayoutDesc {
                uniform_buffer: true,
                push_constants: true,
            },
        }
    }
}

/// viewport 与 scissor 的设置方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewportMode {
    /// 固化在 pipeline 中，swapchain 尺寸变化时需要重建 pipeline
    Static,
    /// 每帧录制时设置
    #[default]
    Dynamic,
}

impl ViewportMode {
    pub fn pipeline_viewport(self, extent: vk::Extent2D) -> PipelineViewport {
        match self {
            Self::Static => PipelineViewport::Static(extent),
            Self::Dynamic => PipelineViewport::Dynamic,
        }
    }
}

/// 选择渲染循环的变体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderLoopConfig {
    pub transform: TransformSource,
    pub viewport: ViewportMode,
}
