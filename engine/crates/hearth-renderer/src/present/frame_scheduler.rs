use ash::vk;
use hearth_gfx::commands::command::GfxCommand;
use hearth_gfx::commands::frame_sync::GfxFrameSyncSets;
use hearth_gfx::driver::{GfxDriver, SubmitDesc};
use hearth_gfx::error::{GfxResult, VkCheck};
use hearth_gfx::foundation::context::GfxContext;
use hearth_gfx::foundation::platform::GfxWindow;
use hearth_gfx::pipelines::graphics_pipeline::GfxPipelineState;
use hearth_gfx::resources::registry::GfxResourceRegistry;
use hearth_gfx::swapchain::render_swapchain::{AcquiredImage, GfxSwapchain};

use crate::present::uniforms::FrameUniforms;
use crate::scene::transform::{CubeTransform, mat4_bytes};
use crate::settings::{DefaultRendererSettings, RenderLoopConfig, TransformSource, ViewportMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// 一帧被提交并呈现
    Presented { image_index: u32 },
    /// swapchain 在这次 tick 中被重建，没有呈现任何内容
    SwapchainRebuilt,
    /// 窗口的 framebuffer 面积为 0，下一次 tick 再尝试重建
    Skipped,
}

/// 一次 tick 需要访问的外部对象
pub struct FrameTargets<'a> {
    pub context: &'a GfxContext,
    pub window: &'a dyn GfxWindow,
    pub swapchain: &'a mut GfxSwapchain,
    pub pipeline: &'a GfxPipelineState,
    pub registry: &'a mut GfxResourceRegistry,
    /// 仅在 [`TransformSource::UniformBuffer`] 时存在
    pub uniforms: Option<&'a mut FrameUniforms>,
    pub vertex_buffer: vk::Buffer,
    pub vertex_count: u32,
}

/// 驱动 acquire -> record -> submit -> present 的循环
///
/// 每个 swapchain image 对应一个 frame slot，`current_frame` 在 slot 之间轮转：
/// - slot 的 fence 覆盖它自己的 command buffer，每次 tick 只等待一次 fence
/// - fence 只在 acquire 成功之后才 reset，因此重建之后重新开始的 tick 不会等待一个不会被提交的 fence
/// - render finished semaphore 按 image index 选取
pub struct FrameScheduler {
    config: RenderLoopConfig,
    sync_sets: GfxFrameSyncSets,

    current_frame: usize,
    /// suboptimal 或者窗口尺寸变化时置位，在下一次 tick 开始时重建
    recreate_requested: bool,

    /// 已经呈现的帧数
    frame_id: u64,
}

// new & init
impl FrameScheduler {
    /// frame slot 的数量与 swapchain image 的数量一致
    pub fn new(
        driver: &dyn GfxDriver,
        context: &GfxContext,
        swapchain: &GfxSwapchain,
        config: RenderLoopConfig,
    ) -> GfxResult<Self> {
        let sync_sets = GfxFrameSyncSets::new(driver, context, swapchain.image_count())?;
        Ok(Self {
            config,
            sync_sets,
            current_frame: 0,
            recreate_requested: false,
            frame_id: 0,
        })
    }
}

// getters
impl FrameScheduler {
    #[inline]
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    #[inline]
    pub fn frame_slot_count(&self) -> usize {
        self.sync_sets.len()
    }

    #[inline]
    pub fn sync_sets(&self) -> &GfxFrameSyncSets {
        &self.sync_sets
    }

    #[inline]
    pub fn config(&self) -> RenderLoopConfig {
        self.config
    }

    #[inline]
    pub fn is_recreate_requested(&self) -> bool {
        self.recreate_requested
    }
}

// update
impl FrameScheduler {
    /// 在下一次 tick 开始时重建 swapchain
    #[inline]
    pub fn request_recreate(&mut self) {
        self.recreate_requested = true;
    }

    pub fn tick(
        &mut self,
        driver: &dyn GfxDriver,
        mut targets: FrameTargets<'_>,
        elapsed_secs: f32,
    ) -> GfxResult<TickOutcome> {
        if targets.swapchain.is_stale() || self.recreate_requested {
            return self.rebuild(driver, &mut targets);
        }

        let frame = *self.sync_sets.get(self.current_frame);
        driver
            .wait_for_fence(frame.in_flight, DefaultRendererSettings::FENCE_TIMEOUT)
            .vk_check("vkWaitForFences")?;

        let image_index = match targets.swapchain.acquire_next_image(
            driver,
            DefaultRendererSettings::FENCE_TIMEOUT,
            frame.image_acquired,
        )? {
            AcquiredImage::Ready { image_index, suboptimal } => {
                // suboptimal 的 image 依然可以呈现
                self.recreate_requested |= suboptimal;
                image_index
            }
            AcquiredImage::OutOfDate => return self.rebuild(driver, &mut targets),
        };

        driver.reset_fence(frame.in_flight).vk_check("vkResetFences")?;
        driver.reset_command_buffer(frame.command_buffer).vk_check("vkResetCommandBuffer")?;

        let commands = self.build_commands(&targets, image_index, elapsed_secs)?;
        driver
            .record_commands(frame.command_buffer, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, &commands)
            .vk_check("vkEndCommandBuffer")?;

        let render_finished = self.sync_sets.get(image_index as usize).render_finished;
        let queue = targets.context.queue();
        driver
            .queue_submit(
                queue,
                &SubmitDesc {
                    command_buffer: frame.command_buffer,
                    wait: Some((frame.image_acquired, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)),
                    signal: Some(render_finished),
                    fence: frame.in_flight,
                },
            )
            .vk_check("vkQueueSubmit")?;

        let need_recreate = targets.swapchain.present_image(driver, queue, image_index, render_finished)?;
        if need_recreate {
            // current_frame 保持不变，重建之后从同一个 slot 重新开始
            return self.rebuild(driver, &mut targets);
        }

        self.current_frame = (self.current_frame + 1) % self.sync_sets.len();
        self.frame_id += 1;
        Ok(TickOutcome::Presented { image_index })
    }

    fn build_commands(
        &self,
        targets: &FrameTargets<'_>,
        image_index: u32,
        elapsed_secs: f32,
    ) -> GfxResult<Vec<GfxCommand>> {
        let swapchain = &*targets.swapchain;
        let extent = swapchain.extent();
        let layout = targets.pipeline.layout();

        let mut commands = vec![
            GfxCommand::BeginRenderPass {
                render_pass: swapchain.render_pass(),
                framebuffer: swapchain.framebuffers()[image_index as usize],
                extent,
                clear_color: DefaultRendererSettings::CLEAR_COLOR,
            },
            GfxCommand::BindPipeline(targets.pipeline.pipeline()),
        ];
        if self.config.viewport == ViewportMode::Dynamic {
            commands.push(GfxCommand::SetViewport(extent));
            commands.push(GfxCommand::SetScissor(extent));
        }
        commands.push(GfxCommand::BindVertexBuffer(targets.vertex_buffer));

        let transform = CubeTransform::at(elapsed_secs, extent);
        match self.config.transform {
            TransformSource::Static => {}
            TransformSource::PushConstant => commands.push(GfxCommand::PushConstants {
                layout,
                stages: vk::ShaderStageFlags::VERTEX,
                data: mat4_bytes(&transform.mvp()),
            }),
            TransformSource::UniformBuffer => {
                // slot 的 fence 已经 signaled，GPU 不再读取这个 slot 的 uniform buffer
                if let Some(uniforms) = targets.uniforms.as_deref() {
                    uniforms.write(targets.registry, self.current_frame, &transform.view_proj_uniform())?;
                    commands.push(GfxCommand::BindDescriptorSet {
                        layout,
                        set: uniforms.descriptor_set(self.current_frame),
                    });
                }
                commands.push(GfxCommand::PushConstants {
                    layout,
                    stages: vk::ShaderStageFlags::VERTEX,
                    data: mat4_bytes(&transform.model),
                });
            }
        }

        commands.push(GfxCommand::Draw {
            vertex_count: targets.vertex_count,
        });
        commands.push(GfxCommand::EndRenderPass);
        Ok(commands)
    }

    /// 重建 swapchain；image 数量变化时同时重建 frame slot
    ///
    /// 重建失败且 swapchain 处于 stale 状态时跳过这一帧，下一次 tick 再次重建
    fn rebuild(&mut self, driver: &dyn GfxDriver, targets: &mut FrameTargets<'_>) -> GfxResult<TickOutcome> {
        match targets.swapchain.recreate(driver, targets.context, targets.window) {
            Ok(()) => {}
            Err(err) if err.is_transient() => {
                log::debug!("skip frame: {}", err);
                return Ok(TickOutcome::Skipped);
            }
            Err(err) if targets.swapchain.is_stale() => {
                log::warn!("failed to recreate swapchain, retry next frame: {}", err);
                return Ok(TickOutcome::Skipped);
            }
            Err(err) => return Err(err),
        }
        self.recreate_requested = false;

        // recreate 已经等待 device idle，旧的同步对象不再被使用
        let image_count = targets.swapchain.image_count();
        if image_count != self.sync_sets.len() {
            log::info!("swapchain image count changed: {} -> {}", self.sync_sets.len(), image_count);
            let sync_sets = GfxFrameSyncSets::new(driver, targets.context, image_count)?;
            std::mem::replace(&mut self.sync_sets, sync_sets).destroy(driver);
            self.current_frame %= image_count;
        }
        if let Some(uniforms) = targets.uniforms.as_deref_mut() {
            uniforms.ensure_slots(driver, targets.context, targets.registry, image_count)?;
        }

        Ok(TickOutcome::SwapchainRebuilt)
    }
}

// destroy
impl FrameScheduler {
    /// 调用前需要确保 device 已经 idle
    pub fn destroy(self, driver: &dyn GfxDriver) {
        self.sync_sets.destroy(driver);
    }
}

#[cfg(test)]
mod tests {
    use hearth_gfx::driver::fake_driver::{FakeDriver, FakeDriverConfig, FakePlatform, FakeWindow, ObjectKind};
    use hearth_gfx::error::GfxError;
    use hearth_gfx::foundation::context::GfxContextDesc;
    use hearth_gfx::pipelines::graphics_pipeline::GfxPipelineDesc;
    use hearth_gfx::pipelines::shader::ShaderBytecode;
    use hearth_gfx::resources::buffer::GfxBufferDesc;
    use hearth_gfx::resources::registry::GfxBufferHandle;

    use super::*;
    use crate::scene::vertex::{CubeMesh, PosColorVertex};

    /// 渲染一帧所需的全部对象
    struct Harness {
        driver: FakeDriver,
        window: FakeWindow,
        context: GfxContext,
        swapchain: GfxSwapchain,
        pipeline: GfxPipelineState,
        registry: GfxResourceRegistry,
        vertex_buffer: GfxBufferHandle,
        uniforms: Option<FrameUniforms>,
        scheduler: FrameScheduler,
    }

    impl Harness {
        fn new(config: RenderLoopConfig, driver_config: FakeDriverConfig) -> Self {
            let driver = FakeDriver::new(driver_config);
            let window = FakeWindow::new(1000, 1000);
            let context =
                GfxContext::new(&driver, &FakePlatform { vulkan_supported: true }, &GfxContextDesc::default()).unwrap();
            let swapchain = GfxSwapchain::new(&driver, &context, &window).unwrap();

            let spv = [0x03, 0x02, 0x23, 0x07, 0, 0, 0, 0];
            let vertex_shader = ShaderBytecode::from_spv_bytes("vertex", &spv).unwrap();
            let fragment_shader = ShaderBytecode::from_spv_bytes("fragment", &spv).unwrap();
            let pipeline = GfxPipelineState::new(
                &driver,
                &GfxPipelineDesc {
                    vertex_shader: &vertex_shader,
                    fragment_shader: &fragment_shader,
                    vertex_layout: &PosColorVertex::vertex_layout(),
                    layout: config.transform.pipeline_layout(),
                    viewport: config.viewport.pipeline_viewport(swapchain.extent()),
                    render_pass: swapchain.render_pass(),
                },
            )
            .unwrap();

            let mut registry = GfxResourceRegistry::new();
            let vertex_buffer = registry
                .create_buffer(
                    &driver,
                    &context,
                    &GfxBufferDesc::host_visible("cube vertices", 36 * 24, vk::BufferUsageFlags::VERTEX_BUFFER),
                )
                .unwrap();
            let uniforms = pipeline.descriptor_set_layout().map(|set_layout| {
                FrameUniforms::new(&driver, &context, &mut registry, set_layout, swapchain.image_count()).unwrap()
            });

            let scheduler = FrameScheduler::new(&driver, &context, &swapchain, config).unwrap();
            Self {
                driver,
                window,
                context,
                swapchain,
                pipeline,
                registry,
                vertex_buffer,
                uniforms,
                scheduler,
            }
        }

        fn with_defaults() -> Self {
            Self::new(RenderLoopConfig::default(), FakeDriverConfig::default())
        }

        fn tick(&mut self) -> GfxResult<TickOutcome> {
            let vertex_buffer = self.registry.buffer_handle(self.vertex_buffer);
            let targets = FrameTargets {
                context: &self.context,
                window: &self.window,
                swapchain: &mut self.swapchain,
                pipeline: &self.pipeline,
                registry: &mut self.registry,
                uniforms: self.uniforms.as_mut(),
                vertex_buffer,
                vertex_count: CubeMesh::VERTEX_COUNT,
            };
            self.scheduler.tick(&self.driver, targets, 0.5)
        }

        fn last_commands(&self) -> Vec<GfxCommand> {
            self.driver.recorded_commands().pop().unwrap().1
        }

        fn destroy(self) {
            self.context.wait_idle(&self.driver).unwrap();
            self.scheduler.destroy(&self.driver);
            if let Some(uniforms) = self.uniforms {
                uniforms.destroy(&self.driver);
            }
            self.registry.destroy_all(&self.driver);
            self.pipeline.destroy(&self.driver);
            self.swapchain.destroy(&self.driver);
            self.context.destroy(&self.driver);
            assert!(self.driver.live_objects().is_empty(), "leaked: {:?}", self.driver.live_objects());
        }
    }

    #[test]
    fn test_sync_sets_match_min_image_count() {
        for min_image_count in [2, 3, 5] {
            let h = Harness::new(
                RenderLoopConfig::default(),
                FakeDriverConfig {
                    min_image_count,
                    ..Default::default()
                },
            );
            assert_eq!(h.swapchain.image_count(), min_image_count as usize);
            assert_eq!(h.scheduler.frame_slot_count(), min_image_count as usize);
            assert!(h.scheduler.sync_sets().iter().all(|set| h.driver.fence_signaled(set.in_flight)));
            h.destroy();
        }
    }

    #[test]
    fn test_current_frame_round_robin() {
        let mut h = Harness::with_defaults();

        let mut frames = Vec::new();
        for _ in 0..7 {
            frames.push(h.scheduler.current_frame());
            assert!(matches!(h.tick().unwrap(), TickOutcome::Presented { .. }));
        }
        assert_eq!(frames, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(h.scheduler.frame_id(), 7);

        // 每次 tick 只等待一次 fence
        assert_eq!(h.driver.calls("wait_for_fence"), 7);
        assert_eq!(h.driver.calls("reset_fence"), 7);
        assert_eq!(h.driver.presents().len(), 7);
        h.destroy();
    }

    #[test]
    fn test_submit_and_present_handshake() {
        let mut h = Harness::with_defaults();
        let TickOutcome::Presented { image_index } = h.tick().unwrap() else {
            panic!("first tick should present");
        };

        let slot = *h.scheduler.sync_sets().get(0);
        let render_finished = h.scheduler.sync_sets().get(image_index as usize).render_finished;

        let submit = h.driver.submits().pop().unwrap();
        assert_eq!(submit.command_buffer, slot.command_buffer);
        assert_eq!(submit.wait, Some((slot.image_acquired, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)));
        assert_eq!(submit.signal, Some(render_finished));
        assert_eq!(submit.fence, slot.in_flight);

        let present = h.driver.presents().pop().unwrap();
        assert_eq!(present.swapchain, h.swapchain.handle());
        assert_eq!(present.image_index, image_index);
        assert_eq!(present.wait, render_finished);
        h.destroy();
    }

    #[test]
    fn test_recorded_commands_push_constant_variant() {
        let mut h = Harness::with_defaults();
        h.tick().unwrap();

        let extent = h.swapchain.extent();
        let commands = h.last_commands();
        assert_eq!(
            commands[0],
            GfxCommand::BeginRenderPass {
                render_pass: h.swapchain.render_pass(),
                framebuffer: h.swapchain.framebuffers()[0],
                extent,
                clear_color: DefaultRendererSettings::CLEAR_COLOR,
            }
        );
        assert_eq!(commands[1], GfxCommand::BindPipeline(h.pipeline.pipeline()));
        assert_eq!(commands[2], GfxCommand::SetViewport(extent));
        assert_eq!(commands[3], GfxCommand::SetScissor(extent));
        assert_eq!(commands[4], GfxCommand::BindVertexBuffer(h.registry.buffer_handle(h.vertex_buffer)));
        let GfxCommand::PushConstants { layout, stages, data } = &commands[5] else {
            panic!("expected push constants, got {:?}", commands[5]);
        };
        assert_eq!(*layout, h.pipeline.layout());
        assert_eq!(*stages, vk::ShaderStageFlags::VERTEX);
        assert_eq!(data.as_slice(), bytemuck::bytes_of(&CubeTransform::at(0.5, extent).mvp()));
        assert_eq!(commands[6], GfxCommand::Draw { vertex_count: 36 });
        assert_eq!(commands[7], GfxCommand::EndRenderPass);
        h.destroy();
    }

    #[test]
    fn test_static_variant_records_no_transform() {
        let config = RenderLoopConfig {
            transform: TransformSource::Static,
            viewport: ViewportMode::Static,
        };
        let mut h = Harness::new(config, FakeDriverConfig::default());
        h.tick().unwrap();

        let commands = h.last_commands();
        assert_eq!(commands.len(), 5);
        assert!(!commands.iter().any(|c| matches!(c, GfxCommand::SetViewport(_) | GfxCommand::PushConstants { .. })));
        h.destroy();
    }

    #[test]
    fn test_uniform_buffer_variant_writes_slot_uniform() {
        let config = RenderLoopConfig {
            transform: TransformSource::UniformBuffer,
            viewport: ViewportMode::Dynamic,
        };
        let mut h = Harness::new(config, FakeDriverConfig::default());
        h.tick().unwrap();
        h.tick().unwrap();

        // 第二次 tick 使用 slot 1
        let uniforms = h.uniforms.as_ref().unwrap();
        let commands = h.last_commands();
        assert!(commands.contains(&GfxCommand::BindDescriptorSet {
            layout: h.pipeline.layout(),
            set: uniforms.descriptor_set(1),
        }));
        let extent = h.swapchain.extent();
        assert!(commands.contains(&GfxCommand::PushConstants {
            layout: h.pipeline.layout(),
            stages: vk::ShaderStageFlags::VERTEX,
            data: mat4_bytes(&CubeTransform::at(0.5, extent).model),
        }));

        let memory = h.registry.get(uniforms.buffer(1)).memory();
        let expected = CubeTransform::at(0.5, extent).view_proj_uniform();
        assert_eq!(&h.driver.memory_contents(memory)[..128], bytemuck::bytes_of(&expected));
        h.destroy();
    }

    #[test]
    fn test_out_of_date_on_fifth_tick() {
        let mut h = Harness::with_defaults();
        h.driver.script_acquire([
            vk::Result::SUCCESS,
            vk::Result::SUCCESS,
            vk::Result::SUCCESS,
            vk::Result::SUCCESS,
            vk::Result::ERROR_OUT_OF_DATE_KHR,
        ]);
        for _ in 0..4 {
            assert!(matches!(h.tick().unwrap(), TickOutcome::Presented { .. }));
        }
        assert_eq!(h.scheduler.current_frame(), 1);

        let old_swapchain = h.swapchain.handle();
        let device = h.context.device();
        let images_queried = h.driver.calls("get_swapchain_images");
        let resets = h.driver.calls("reset_fence");

        assert_eq!(h.tick().unwrap(), TickOutcome::SwapchainRebuilt);
        assert_eq!(h.scheduler.current_frame(), 1);
        assert_ne!(h.swapchain.handle(), old_swapchain);
        assert_eq!(h.context.device(), device);
        // image 数量重新读取
        assert_eq!(h.driver.calls("get_swapchain_images"), images_queried + 1);
        assert_eq!(h.scheduler.frame_slot_count(), 3);
        // acquire 失败时不 reset fence
        assert_eq!(h.driver.calls("reset_fence"), resets);
        assert!(h.driver.fence_signaled(h.scheduler.sync_sets().get(1).in_flight));

        let waits = h.driver.calls("wait_for_fence");
        assert_eq!(h.tick().unwrap(), TickOutcome::Presented { image_index: 0 });
        assert_eq!(h.driver.calls("wait_for_fence"), waits + 1);
        assert_eq!(h.driver.submits().pop().unwrap().fence, h.scheduler.sync_sets().get(1).in_flight);
        assert_eq!(h.scheduler.current_frame(), 2);
        h.destroy();
    }

    #[test]
    fn test_present_out_of_date_rebuilds_without_advancing() {
        let mut h = Harness::with_defaults();
        h.driver.script_present([vk::Result::SUCCESS, vk::Result::ERROR_OUT_OF_DATE_KHR]);

        h.tick().unwrap();
        assert_eq!(h.tick().unwrap(), TickOutcome::SwapchainRebuilt);
        assert_eq!(h.scheduler.current_frame(), 1);
        assert_eq!(h.scheduler.frame_id(), 1);

        // slot 1 的 fence 已经随提交 signal
        assert!(matches!(h.tick().unwrap(), TickOutcome::Presented { .. }));
        assert_eq!(h.scheduler.current_frame(), 2);
        h.destroy();
    }

    #[test]
    fn test_suboptimal_acquire_presents_then_rebuilds() {
        let mut h = Harness::with_defaults();
        h.driver.script_acquire([vk::Result::SUBOPTIMAL_KHR]);

        assert!(matches!(h.tick().unwrap(), TickOutcome::Presented { .. }));
        assert!(h.scheduler.is_recreate_requested());
        assert_eq!(h.tick().unwrap(), TickOutcome::SwapchainRebuilt);
        assert!(!h.scheduler.is_recreate_requested());
        assert!(matches!(h.tick().unwrap(), TickOutcome::Presented { .. }));
        h.destroy();
    }

    #[test]
    fn test_resize_keeps_device_queue_and_surface() {
        let mut h = Harness::with_defaults();
        h.tick().unwrap();

        let (device, queue, surface) = (h.context.device(), h.context.queue(), h.swapchain.surface());
        h.window.size.set(vk::Extent2D {
            width: 640,
            height: 480,
        });
        h.driver.update_config(|config| {
            config.current_extent = vk::Extent2D {
                width: 640,
                height: 480,
            }
        });
        h.scheduler.request_recreate();

        assert_eq!(h.tick().unwrap(), TickOutcome::SwapchainRebuilt);
        assert_eq!(h.swapchain.extent().width, 640);
        assert_eq!((h.context.device(), h.context.queue(), h.swapchain.surface()), (device, queue, surface));
        assert_eq!(h.driver.live_count(ObjectKind::Device), 1);
        assert_eq!(h.driver.live_count(ObjectKind::Surface), 1);
        assert_eq!(h.driver.live_count(ObjectKind::Swapchain), 1);

        h.tick().unwrap();
        let GfxCommand::BeginRenderPass { extent, .. } = h.last_commands()[0] else {
            panic!("expected begin render pass");
        };
        assert_eq!(extent.height, 480);
        h.destroy();
    }

    #[test]
    fn test_image_count_change_rebuilds_sync_sets() {
        let config = RenderLoopConfig {
            transform: TransformSource::UniformBuffer,
            viewport: ViewportMode::Dynamic,
        };
        let mut h = Harness::new(config, FakeDriverConfig::default());
        for _ in 0..2 {
            h.tick().unwrap();
        }
        let old_fence = h.scheduler.sync_sets().get(0).in_flight;

        h.driver.update_config(|config| config.min_image_count = 4);
        h.scheduler.request_recreate();
        assert_eq!(h.tick().unwrap(), TickOutcome::SwapchainRebuilt);

        assert_eq!(h.swapchain.image_count(), 4);
        assert_eq!(h.scheduler.frame_slot_count(), 4);
        assert_eq!(h.uniforms.as_ref().unwrap().slot_count(), 4);
        assert_eq!(h.driver.live_count(ObjectKind::Semaphore), 8);
        assert_eq!(h.driver.live_count(ObjectKind::Fence), 4);
        assert!(h.driver.destroyed().contains(&(ObjectKind::Fence, ash::vk::Handle::as_raw(old_fence))));
        assert!(h.scheduler.sync_sets().iter().all(|set| h.driver.fence_signaled(set.in_flight)));
        assert_eq!(h.scheduler.current_frame(), 2);

        for _ in 0..4 {
            assert!(matches!(h.tick().unwrap(), TickOutcome::Presented { .. }));
        }
        assert_eq!(h.scheduler.current_frame(), 2);
        h.destroy();
    }

    #[test]
    fn test_zero_extent_skips_until_restored() {
        let mut h = Harness::with_defaults();
        h.tick().unwrap();

        h.driver.update_config(|config| config.current_extent = vk::Extent2D::default());
        h.scheduler.request_recreate();
        let acquires = h.driver.calls("acquire_next_image");

        assert_eq!(h.tick().unwrap(), TickOutcome::Skipped);
        assert!(h.swapchain.is_stale());
        assert_eq!(h.swapchain.image_count(), 0);
        assert_eq!(h.tick().unwrap(), TickOutcome::Skipped);
        assert_eq!(h.driver.calls("acquire_next_image"), acquires);

        h.driver.update_config(|config| {
            config.current_extent = vk::Extent2D {
                width: 1000,
                height: 1000,
            }
        });
        assert_eq!(h.tick().unwrap(), TickOutcome::SwapchainRebuilt);
        assert!(!h.swapchain.is_stale());
        assert!(matches!(h.tick().unwrap(), TickOutcome::Presented { .. }));
        h.destroy();
    }

    #[test]
    fn test_failed_recreate_is_retried_next_tick() {
        let mut h = Harness::with_defaults();
        h.tick().unwrap();

        h.scheduler.request_recreate();
        h.driver.fail_call("get_swapchain_images", vk::Result::ERROR_OUT_OF_DATE_KHR);
        assert_eq!(h.tick().unwrap(), TickOutcome::Skipped);
        assert!(h.swapchain.is_stale());
        assert_eq!(h.driver.live_count(ObjectKind::Device), 1);
        assert_eq!(h.driver.live_count(ObjectKind::Surface), 1);

        // 失败仍然存在时继续跳过
        assert_eq!(h.tick().unwrap(), TickOutcome::Skipped);

        h.driver.clear_failures();
        assert_eq!(h.tick().unwrap(), TickOutcome::SwapchainRebuilt);
        assert!(!h.swapchain.is_stale());
        assert!(matches!(h.tick().unwrap(), TickOutcome::Presented { .. }));
        assert_eq!(h.scheduler.frame_id(), 2);
        h.destroy();
    }

    #[test]
    fn test_device_wait_failure_during_recreate_is_fatal() {
        let mut h = Harness::with_defaults();
        h.tick().unwrap();

        h.scheduler.request_recreate();
        h.driver.fail_call("device_wait_idle", vk::Result::ERROR_DEVICE_LOST);
        assert!(matches!(h.tick(), Err(GfxError::Driver { result: vk::Result::ERROR_DEVICE_LOST, .. })));
        assert!(!h.swapchain.is_stale());

        h.driver.clear_failures();
        h.destroy();
    }

    #[test]
    fn test_submit_failure_is_reported() {
        let mut h = Harness::with_defaults();
        h.driver.fail_call("queue_submit", vk::Result::ERROR_DEVICE_LOST);

        match h.tick() {
            Err(GfxError::Driver { call, result, .. }) => {
                assert_eq!(call, "vkQueueSubmit");
                assert_eq!(result, vk::Result::ERROR_DEVICE_LOST);
            }
            other => panic!("unexpected tick result {other:?}"),
        }

        h.driver.clear_failures();
        h.destroy();
    }
}
