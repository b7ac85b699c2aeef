use ash::vk;
use hearth_gfx::commands::command::GfxCommand;
use hearth_gfx::driver::GfxDriver;
use hearth_gfx::error::GfxResult;
use hearth_gfx::foundation::context::{GfxContext, GfxContextDesc};
use hearth_gfx::foundation::platform::{GfxPlatform, GfxWindow};
use hearth_gfx::pipelines::graphics_pipeline::{GfxPipelineDesc, GfxPipelineState, GfxVertexLayout};
use hearth_gfx::pipelines::shader::ShaderBytecode;
use hearth_gfx::resources::buffer::GfxBufferDesc;
use hearth_gfx::resources::registry::{GfxBufferHandle, GfxResourceRegistry};
use hearth_gfx::swapchain::render_swapchain::GfxSwapchain;

use crate::error::RenderResult;
use crate::frame_clock::FrameClock;
use crate::present::frame_scheduler::{FrameScheduler, FrameTargets, TickOutcome};
use crate::present::uniforms::FrameUniforms;
use crate::scene::vertex::{CubeMesh, PosColorVertex};
use crate::settings::{DefaultRendererSettings, RenderLoopConfig, ViewportMode};

pub struct RendererDesc {
    pub config: RenderLoopConfig,
    pub vertex_shader: ShaderBytecode,
    pub fragment_shader: ShaderBytecode,
    pub enable_validation: bool,
}

/// 在 context 与 swapchain 之上创建的、和帧相关的资源
struct FrameResources {
    registry: GfxResourceRegistry,
    vertex_buffer: GfxBufferHandle,
    pipeline: GfxPipelineState,
    uniforms: Option<FrameUniforms>,
    scheduler: FrameScheduler,
}

/// 旋转立方体的渲染器
///
/// 持有所有 GPU 对象；driver 与窗口由调用者持有，每次调用时传入
pub struct Renderer {
    config: RenderLoopConfig,

    context: GfxContext,
    swapchain: GfxSwapchain,
    registry: GfxResourceRegistry,
    vertex_buffer: GfxBufferHandle,
    pipeline: GfxPipelineState,
    uniforms: Option<FrameUniforms>,
    scheduler: FrameScheduler,

    vertex_layout: GfxVertexLayout,
    vertex_shader: ShaderBytecode,
    fragment_shader: ShaderBytecode,
    /// 固化在 pipeline 中的 viewport 尺寸
    pipeline_extent: vk::Extent2D,

    clock: FrameClock,
}

// new & init
impl Renderer {
    /// 创建顺序：context -> swapchain -> 顶点数据 -> pipeline -> uniforms -> frame scheduler
    ///
    /// 任何一步失败，都会销毁之前已经创建的组件
    pub fn new(
        driver: &dyn GfxDriver,
        platform: &dyn GfxPlatform,
        window: &dyn GfxWindow,
        desc: RendererDesc,
    ) -> RenderResult<Self> {
        let context_desc = GfxContextDesc {
            app_name: DefaultRendererSettings::APP_NAME,
            engine_name: DefaultRendererSettings::ENGINE_NAME,
            enable_validation: desc.enable_validation,
            enable_debug_messenger: desc.enable_validation,
        };
        let context = GfxContext::new(driver, platform, &context_desc)?;

        let swapchain = match GfxSwapchain::new(driver, &context, window) {
            Ok(swapchain) => swapchain,
            Err(err) => {
                context.destroy(driver);
                return Err(err.into());
            }
        };

        let vertex_layout = PosColorVertex::vertex_layout();
        let resources = match Self::create_frame_resources(driver, &context, &swapchain, &vertex_layout, &desc) {
            Ok(resources) => resources,
            Err(err) => {
                log::error!("failed to create frame resources: {}", err);
                swapchain.destroy(driver);
                context.destroy(driver);
                return Err(err.into());
            }
        };

        log::info!(
            "renderer created: {:?}, surface format: {:?}, present mode: {:?}",
            desc.config,
            swapchain.surface_format(),
            swapchain.present_mode()
        );

        let pipeline_extent = swapchain.extent();
        Ok(Self {
            config: desc.config,
            context,
            swapchain,
            registry: resources.registry,
            vertex_buffer: resources.vertex_buffer,
            pipeline: resources.pipeline,
            uniforms: resources.uniforms,
            scheduler: resources.scheduler,
            vertex_layout,
            vertex_shader: desc.vertex_shader,
            fragment_shader: desc.fragment_shader,
            pipeline_extent,
            clock: FrameClock::new(),
        })
    }

    /// 失败时按照与 [`Renderer::destroy`] 相同的顺序销毁已经创建的资源
    fn create_frame_resources(
        driver: &dyn GfxDriver,
        context: &GfxContext,
        swapchain: &GfxSwapchain,
        vertex_layout: &GfxVertexLayout,
        desc: &RendererDesc,
    ) -> GfxResult<FrameResources> {
        let mut registry = GfxResourceRegistry::new();
        let vertex_buffer = match Self::upload_vertices(driver, context, &mut registry) {
            Ok(vertex_buffer) => vertex_buffer,
            Err(err) => {
                registry.destroy_all(driver);
                return Err(err);
            }
        };

        let pipeline_desc = GfxPipelineDesc {
            vertex_shader: &desc.vertex_shader,
            fragment_shader: &desc.fragment_shader,
            vertex_layout,
            layout: desc.config.transform.pipeline_layout(),
            viewport: desc.config.viewport.pipeline_viewport(swapchain.extent()),
            render_pass: swapchain.render_pass(),
        };
        let pipeline = match GfxPipelineState::new(driver, &pipeline_desc) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                registry.destroy_all(driver);
                return Err(err);
            }
        };

        let uniforms = pipeline
            .descriptor_set_layout()
            .map(|set_layout| FrameUniforms::new(driver, context, &mut registry, set_layout, swapchain.image_count()))
            .transpose();
        let uniforms = match uniforms {
            Ok(uniforms) => uniforms,
            Err(err) => {
                registry.destroy_all(driver);
                pipeline.destroy(driver);
                return Err(err);
            }
        };

        let scheduler = match FrameScheduler::new(driver, context, swapchain, desc.config) {
            Ok(scheduler) => scheduler,
            Err(err) => {
                if let Some(uniforms) = uniforms {
                    uniforms.destroy(driver);
                }
                registry.destroy_all(driver);
                pipeline.destroy(driver);
                return Err(err);
            }
        };

        Ok(FrameResources {
            registry,
            vertex_buffer,
            pipeline,
            uniforms,
            scheduler,
        })
    }

    /// 通过 staging buffer 将立方体的顶点拷贝到 device local 的 vertex buffer 中
    ///
    /// staging buffer 同样归 registry 所有，直到退出时才销毁
    fn upload_vertices(
        driver: &dyn GfxDriver,
        context: &GfxContext,
        registry: &mut GfxResourceRegistry,
    ) -> GfxResult<GfxBufferHandle> {
        let vertices = CubeMesh::vertices();
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        let size = bytes.len() as vk::DeviceSize;

        let staging = registry.create_buffer(
            driver,
            context,
            &GfxBufferDesc::host_visible("cube staging", size, vk::BufferUsageFlags::TRANSFER_SRC),
        )?;
        registry.write(staging, 0, bytes)?;

        let vertex_buffer = registry.create_buffer(
            driver,
            context,
            &GfxBufferDesc::device_local(
                "cube vertices",
                size,
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            ),
        )?;

        context.one_time_exec(
            driver,
            &[GfxCommand::CopyBuffer {
                src: registry.buffer_handle(staging),
                dst: registry.buffer_handle(vertex_buffer),
                size,
            }],
        )?;
        log::info!("uploaded {} cube vertices ({} bytes)", vertices.len(), size);

        Ok(vertex_buffer)
    }
}

// getters
impl Renderer {
    #[inline]
    pub fn config(&self) -> RenderLoopConfig {
        self.config
    }

    #[inline]
    pub fn context(&self) -> &GfxContext {
        &self.context
    }

    #[inline]
    pub fn swapchain(&self) -> &GfxSwapchain {
        &self.swapchain
    }

    #[inline]
    pub fn pipeline(&self) -> &GfxPipelineState {
        &self.pipeline
    }

    #[inline]
    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    #[inline]
    pub fn registry(&self) -> &GfxResourceRegistry {
        &self.registry
    }

    #[inline]
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.registry.buffer_handle(self.vertex_buffer)
    }
}

// update
impl Renderer {
    /// 窗口尺寸变化，在下一帧开始时重建 swapchain
    #[inline]
    pub fn notify_resized(&mut self) {
        self.scheduler.request_recreate();
    }

    pub fn render_frame(&mut self, driver: &dyn GfxDriver, window: &dyn GfxWindow) -> RenderResult<TickOutcome> {
        let elapsed_secs = self.clock.elapsed_secs()?;

        let vertex_buffer = self.registry.buffer_handle(self.vertex_buffer);
        let targets = FrameTargets {
            context: &self.context,
            window,
            swapchain: &mut self.swapchain,
            pipeline: &self.pipeline,
            registry: &mut self.registry,
            uniforms: self.uniforms.as_mut(),
            vertex_buffer,
            vertex_count: CubeMesh::VERTEX_COUNT,
        };
        let outcome = self.scheduler.tick(driver, targets, elapsed_secs)?;

        if outcome == TickOutcome::SwapchainRebuilt {
            self.sync_pipeline_viewport(driver)?;
        }
        Ok(outcome)
    }

    /// swapchain 重建之后 device 已经 idle，可以直接替换 pipeline
    fn sync_pipeline_viewport(&mut self, driver: &dyn GfxDriver) -> RenderResult<()> {
        let extent = self.swapchain.extent();
        if self.config.viewport != ViewportMode::Static || extent == self.pipeline_extent {
            return Ok(());
        }

        self.pipeline.rebuild_pipeline(
            driver,
            &GfxPipelineDesc {
                vertex_shader: &self.vertex_shader,
                fragment_shader: &self.fragment_shader,
                vertex_layout: &self.vertex_layout,
                layout: self.config.transform.pipeline_layout(),
                viewport: self.config.viewport.pipeline_viewport(extent),
                render_pass: self.swapchain.render_pass(),
            },
        )?;
        self.pipeline_extent = extent;
        Ok(())
    }
}

// destroy
impl Renderer {
    /// 销毁顺序：同步对象 -> uniforms -> buffers -> pipeline -> swapchain -> context
    pub fn destroy(self, driver: &dyn GfxDriver) {
        if let Err(err) = self.context.wait_idle(driver) {
            log::error!("failed to wait device idle before destroy: {}", err);
        }

        self.scheduler.destroy(driver);
        if let Some(uniforms) = self.uniforms {
            uniforms.destroy(driver);
        }
        self.registry.destroy_all(driver);
        self.pipeline.destroy(driver);
        self.swapchain.destroy(driver);
        self.context.destroy(driver);
        log::info!("renderer destroyed");
    }
}
