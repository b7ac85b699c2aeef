use ash::vk;
use ash::vk::Handle;

use crate::driver::{FramebufferDesc, GfxDriver, PresentDesc, SwapchainDesc};
use crate::error::{GfxError, GfxResult, VkCheck};
use crate::foundation::context::GfxContext;
use crate::foundation::platform::GfxWindow;
use crate::swapchain::render_target::GfxRenderTarget;
use crate::swapchain::selection::{choose_extent, choose_image_count, choose_present_mode, choose_surface_format};
use crate::swapchain::surface::GfxSurfaceSupport;
use crate::teardown::TeardownStack;

/// acquire 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquiredImage {
    Ready { image_index: u32, suboptimal: bool },
    /// surface 已经失效，需要重建 swapchain
    OutOfDate,
}

/// swapchain 以及与每个 image 一一对应的 view 和 framebuffer
///
/// images、views、framebuffers 三个列表的长度始终相同。
/// 重建失败后处于 stale 状态，三个列表均为空，直到下一次重建成功
pub struct GfxSwapchain {
    surface: vk::SurfaceKHR,
    handle: vk::SwapchainKHR,

    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    framebuffers: Vec<vk::Framebuffer>,
    render_target: Option<GfxRenderTarget>,

    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
    /// 创建时向 driver 请求的 image 数量，重建时沿用
    requested_image_count: u32,

    stale: bool,
}

// new & init
impl GfxSwapchain {
    /// 创建顺序：surface -> swapchain -> image views -> render pass -> framebuffers
    ///
    /// 任何一步失败，都会按逆序销毁之前已经创建的对象
    pub fn new(driver: &dyn GfxDriver, context: &GfxContext, window: &dyn GfxWindow) -> GfxResult<Self> {
        let mut teardown = TeardownStack::new();
        match Self::init(driver, context, window, &mut teardown) {
            Ok(swapchain) => {
                teardown.disarm();
                Ok(swapchain)
            }
            Err(err) => {
                log::error!("failed to create swapchain: {}", err);
                teardown.unwind(driver);
                Err(err)
            }
        }
    }

    fn init(
        driver: &dyn GfxDriver,
        context: &GfxContext,
        window: &dyn GfxWindow,
        teardown: &mut TeardownStack,
    ) -> GfxResult<Self> {
        let surface = driver.create_surface(context.instance(), window).vk_check("vkCreateSurfaceKHR")?;
        teardown.push("surface", move |driver| driver.destroy_surface(surface));

        let support = GfxSurfaceSupport::query(driver, context.adapter().handle, surface)?;
        let surface_format =
            choose_surface_format(&support.formats).ok_or(GfxError::EmptySurfaceQuery("surface formats"))?;
        let present_mode =
            choose_present_mode(&support.present_modes).ok_or(GfxError::EmptySurfaceQuery("present modes"))?;
        let extent = Self::calculate_extent(&support.capabilities, window)?;
        let requested_image_count = choose_image_count(&support.capabilities, support.capabilities.min_image_count);

        let handle = Self::create_swapchain(
            driver,
            &SwapchainDesc {
                surface,
                min_image_count: requested_image_count,
                format: surface_format,
                extent,
                pre_transform: support.capabilities.current_transform,
                present_mode,
                old_swapchain: vk::SwapchainKHR::null(),
            },
        )?;
        teardown.push("swapchain", move |driver| driver.destroy_swapchain(handle));

        let images = driver.swapchain_images(handle).vk_check("vkGetSwapchainImagesKHR")?;

        let image_views = Self::create_image_views(driver, &images, surface_format.format)?;
        teardown.push("image views", {
            let image_views = image_views.clone();
            move |driver| image_views.iter().rev().for_each(|view| driver.destroy_image_view(*view))
        });

        let render_target = GfxRenderTarget::new(driver, surface_format.format)?;
        let render_pass = render_target.render_pass();
        teardown.push("render pass", move |driver| driver.destroy_render_pass(render_pass));

        let framebuffers = Self::create_framebuffers(driver, render_pass, &image_views, extent)?;
        teardown.push("framebuffers", {
            let framebuffers = framebuffers.clone();
            move |driver| framebuffers.iter().rev().for_each(|fb| driver.destroy_framebuffer(*fb))
        });

        log::info!(
            "swapchain created: {} images, format: {:?}, present mode: {:?}, extent: {}x{}",
            images.len(),
            surface_format,
            present_mode,
            extent.width,
            extent.height
        );

        Ok(Self {
            surface,
            handle,
            images,
            image_views,
            framebuffers,
            render_target: Some(render_target),
            surface_format,
            present_mode,
            extent,
            requested_image_count,
            stale: false,
        })
    }

    fn calculate_extent(capabilities: &vk::SurfaceCapabilitiesKHR, window: &dyn GfxWindow) -> GfxResult<vk::Extent2D> {
        let window_physical_extent = window.framebuffer_size();
        let extent = choose_extent(capabilities, window_physical_extent);
        log::debug!(
            "surface current extent: {}x{}, min extent: {}x{}, max extent: {}x{}, window physical extent: {}x{}",
            capabilities.current_extent.width,
            capabilities.current_extent.height,
            capabilities.min_image_extent.width,
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.width,
            capabilities.max_image_extent.height,
            window_physical_extent.width,
            window_physical_extent.height,
        );
        if extent.width == 0 || extent.height == 0 {
            return Err(GfxError::ZeroExtent);
        }
        Ok(extent)
    }

    fn create_swapchain(driver: &dyn GfxDriver, desc: &SwapchainDesc) -> GfxResult<vk::SwapchainKHR> {
        driver.create_swapchain(desc).vk_check("vkCreateSwapchainKHR")
    }

    /// 为每个 image 创建 view；中途失败时销毁已经创建的 view
    fn create_image_views(
        driver: &dyn GfxDriver,
        images: &[vk::Image],
        format: vk::Format,
    ) -> GfxResult<Vec<vk::ImageView>> {
        let mut views = Vec::with_capacity(images.len());
        for image in images {
            match driver.create_image_view(*image, format).vk_check("vkCreateImageView") {
                Ok(view) => views.push(view),
                Err(err) => {
                    views.iter().rev().for_each(|view| driver.destroy_image_view(*view));
                    return Err(err);
                }
            }
        }
        Ok(views)
    }

    /// 为每个 view 创建 framebuffer；中途失败时销毁已经创建的 framebuffer
    fn create_framebuffers(
        driver: &dyn GfxDriver,
        render_pass: vk::RenderPass,
        image_views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> GfxResult<Vec<vk::Framebuffer>> {
        let mut framebuffers = Vec::with_capacity(image_views.len());
        for view in image_views {
            let desc = FramebufferDesc {
                render_pass,
                attachment: *view,
                extent,
            };
            match driver.create_framebuffer(&desc).vk_check("vkCreateFramebuffer") {
                Ok(framebuffer) => framebuffers.push(framebuffer),
                Err(err) => {
                    framebuffers.iter().rev().for_each(|fb| driver.destroy_framebuffer(*fb));
                    return Err(err);
                }
            }
        }
        Ok(framebuffers)
    }
}

// getters
impl GfxSwapchain {
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    #[inline]
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    #[inline]
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    #[inline]
    pub fn framebuffers(&self) -> &[vk::Framebuffer] {
        &self.framebuffers
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_target.as_ref().map_or(vk::RenderPass::null(), GfxRenderTarget::render_pass)
    }

    #[inline]
    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.surface_format
    }

    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// 上一次重建失败，需要在使用前重建
    #[inline]
    pub fn is_stale(&self) -> bool {
        self.stale
    }
}

// update
impl GfxSwapchain {
    /// timeout: nano seconds
    pub fn acquire_next_image(
        &self,
        driver: &dyn GfxDriver,
        timeout: u64,
        signal: vk::Semaphore,
    ) -> GfxResult<AcquiredImage> {
        match driver.acquire_next_image(self.handle, timeout, signal) {
            Ok((image_index, suboptimal)) => {
                if suboptimal {
                    log::warn!("swapchain acquire image index {} is not optimal", image_index);
                }
                Ok(AcquiredImage::Ready { image_index, suboptimal })
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("swapchain is out of date when acquire next image");
                Ok(AcquiredImage::OutOfDate)
            }
            Err(e) => Err(GfxError::driver("vkAcquireNextImageKHR", e)),
        }
    }

    /// return: need recreate
    pub fn present_image(
        &self,
        driver: &dyn GfxDriver,
        queue: vk::Queue,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> GfxResult<bool> {
        let desc = PresentDesc {
            swapchain: self.handle,
            image_index,
            wait,
        };
        match driver.queue_present(queue, &desc) {
            Ok(suboptimal) => {
                if suboptimal {
                    log::warn!("swapchain present image index {} is not optimal", image_index);
                }
                Ok(suboptimal)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("swapchain is out of date when present image");
                Ok(true)
            }
            Err(e) => Err(GfxError::driver("vkQueuePresentKHR", e)),
        }
    }

    /// 在原地重建 swapchain
    ///
    /// surface、render pass 以及 device 保持不变。新的 swapchain 创建成功之后才会销毁旧的 swapchain。
    /// 失败时 swapchain 处于 stale 状态，可以再次调用重建
    pub fn recreate(&mut self, driver: &dyn GfxDriver, context: &GfxContext, window: &dyn GfxWindow) -> GfxResult<()> {
        context.wait_idle(driver)?;

        self.destroy_image_targets(driver);
        self.stale = true;

        let capabilities = GfxSurfaceSupport::query_capabilities(driver, context.adapter().handle, self.surface)?;
        let extent = Self::calculate_extent(&capabilities, window)?;
        let image_count = choose_image_count(&capabilities, self.requested_image_count);

        let new_handle = Self::create_swapchain(
            driver,
            &SwapchainDesc {
                surface: self.surface,
                min_image_count: image_count,
                format: self.surface_format,
                extent,
                pre_transform: capabilities.current_transform,
                present_mode: self.present_mode,
                old_swapchain: self.handle,
            },
        )?;
        driver.destroy_swapchain(self.handle);
        self.handle = new_handle;
        self.requested_image_count = image_count;
        self.extent = extent;

        let images = driver.swapchain_images(self.handle).vk_check("vkGetSwapchainImagesKHR")?;
        let image_views = Self::create_image_views(driver, &images, self.surface_format.format)?;
        let framebuffers = match Self::create_framebuffers(driver, self.render_pass(), &image_views, extent) {
            Ok(framebuffers) => framebuffers,
            Err(err) => {
                image_views.iter().rev().for_each(|view| driver.destroy_image_view(*view));
                return Err(err);
            }
        };

        self.images = images;
        self.image_views = image_views;
        self.framebuffers = framebuffers;
        self.stale = false;

        log::info!(
            "swapchain recreated: {} images, extent: {}x{}",
            self.images.len(),
            extent.width,
            extent.height
        );
        Ok(())
    }
}

// destroy
impl GfxSwapchain {
    fn destroy_image_targets(&mut self, driver: &dyn GfxDriver) {
        for framebuffer in self.framebuffers.drain(..).rev() {
            driver.destroy_framebuffer(framebuffer);
        }
        for view in self.image_views.drain(..).rev() {
            driver.destroy_image_view(view);
        }
        self.images.clear();
    }

    /// 销毁顺序：framebuffers -> render pass -> image views -> swapchain -> surface
    pub fn destroy(mut self, driver: &dyn GfxDriver) {
        for framebuffer in self.framebuffers.drain(..).rev() {
            driver.destroy_framebuffer(framebuffer);
        }
        if let Some(render_target) = self.render_target.take() {
            render_target.destroy(driver);
        }
        for view in self.image_views.drain(..).rev() {
            driver.destroy_image_view(view);
        }
        self.images.clear();

        driver.destroy_swapchain(self.handle);
        self.handle = vk::SwapchainKHR::null();
        driver.destroy_surface(self.surface);
        self.surface = vk::SurfaceKHR::null();
    }
}
impl Drop for GfxSwapchain {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            assert!(self.handle.is_null() && self.surface.is_null(), "GfxSwapchain must be destroyed explicitly");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake_driver::{DriverEvent, FakeDriver, FakeDriverConfig, FakePlatform, FakeWindow, ObjectKind};
    use crate::foundation::context::GfxContextDesc;

    fn setup(config: FakeDriverConfig) -> (FakeDriver, GfxContext, FakeWindow) {
        let driver = FakeDriver::new(config);
        let context =
            GfxContext::new(&driver, &FakePlatform { vulkan_supported: true }, &GfxContextDesc::default()).unwrap();
        (driver, context, FakeWindow::new(1000, 1000))
    }

    fn kinds(objects: &[(ObjectKind, u64)]) -> Vec<ObjectKind> {
        objects.iter().map(|(kind, _)| *kind).collect()
    }

    #[test]
    fn test_create_negotiates_surface() {
        let (driver, context, window) = setup(FakeDriverConfig::default());
        let swapchain = GfxSwapchain::new(&driver, &context, &window).unwrap();

        assert_eq!(swapchain.surface_format().format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(swapchain.present_mode(), vk::PresentModeKHR::MAILBOX);
        assert_eq!(swapchain.image_count(), 3);
        assert_eq!(swapchain.image_views().len(), 3);
        assert_eq!(swapchain.framebuffers().len(), 3);
        assert_eq!(driver.swapchain_descs()[0].min_image_count, 3);
        assert_eq!(driver.render_pass_descs().len(), 1);

        swapchain.destroy(&driver);
        context.destroy(&driver);
        assert!(driver.live_objects().is_empty());
    }

    #[test]
    fn test_destroy_order_is_reverse_of_creation() {
        let (driver, context, window) = setup(FakeDriverConfig::default());
        let base = driver.created().len();

        let swapchain = GfxSwapchain::new(&driver, &context, &window).unwrap();
        let mut created = driver.created()[base..].to_vec();
        assert_eq!(
            kinds(&created),
            vec![
                ObjectKind::Surface,
                ObjectKind::Swapchain,
                ObjectKind::ImageView,
                ObjectKind::ImageView,
                ObjectKind::ImageView,
                ObjectKind::RenderPass,
                ObjectKind::Framebuffer,
                ObjectKind::Framebuffer,
                ObjectKind::Framebuffer,
            ]
        );

        swapchain.destroy(&driver);
        created.reverse();
        assert_eq!(driver.destroyed(), created);

        context.destroy(&driver);
    }

    #[test]
    fn test_rollback_at_every_step() {
        let (driver, context, window) = setup(FakeDriverConfig::default());
        let base = driver.create_count();
        GfxSwapchain::new(&driver, &context, &window).unwrap().destroy(&driver);
        let total = driver.create_count() - base;
        assert_eq!(total, 9);
        context.destroy(&driver);

        for k in 0..total {
            let (driver, context, window) = setup(FakeDriverConfig::default());
            let context_objects = driver.live_objects();
            let base_created = driver.created().len();
            driver.fail_nth_create(driver.create_count() + k);

            assert!(GfxSwapchain::new(&driver, &context, &window).is_err());

            let mut created = driver.created()[base_created..].to_vec();
            assert_eq!(created.len(), k);
            created.reverse();
            assert_eq!(driver.destroyed(), created);
            assert_eq!(driver.live_objects(), context_objects);

            context.destroy(&driver);
        }
    }

    #[test]
    fn test_zero_extent_on_create() {
        let (driver, context, _) = setup(FakeDriverConfig {
            current_extent: vk::Extent2D {
                width: 0xFFFFFFFF,
                height: 0xFFFFFFFF,
            },
            ..Default::default()
        });
        let window = FakeWindow::new(0, 0);
        // surface 的 min extent 为 1x1，会被 clamp
        let swapchain = GfxSwapchain::new(&driver, &context, &window).unwrap();
        assert_eq!(swapchain.extent(), vk::Extent2D { width: 1, height: 1 });
        swapchain.destroy(&driver);

        driver.update_config(|config| config.current_extent = vk::Extent2D { width: 0, height: 0 });
        assert!(matches!(GfxSwapchain::new(&driver, &context, &window), Err(GfxError::ZeroExtent)));

        context.destroy(&driver);
        assert!(driver.live_objects().is_empty());
    }

    #[test]
    fn test_recreate_keeps_device_queue_and_surface() {
        let (driver, context, window) = setup(FakeDriverConfig::default());
        let mut swapchain = GfxSwapchain::new(&driver, &context, &window).unwrap();
        let old_handle = swapchain.handle();
        let old_views = swapchain.image_views().to_vec();
        let old_framebuffers = swapchain.framebuffers().to_vec();
        let render_pass = swapchain.render_pass();
        let events_before = driver.event_count();

        driver.update_config(|config| config.current_extent = vk::Extent2D { width: 640, height: 480 });
        swapchain.recreate(&driver, &context, &window).unwrap();

        let events = driver.events()[events_before..].to_vec();
        assert_eq!(events.first(), Some(&DriverEvent::Call("device_wait_idle")));

        let destroyed = events
            .iter()
            .filter_map(|event| match event {
                DriverEvent::Destroyed(kind, raw) => Some((*kind, *raw)),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert!(destroyed.iter().all(|(kind, _)| matches!(
            kind,
            ObjectKind::Framebuffer | ObjectKind::ImageView | ObjectKind::Swapchain
        )));
        for fb in &old_framebuffers {
            assert!(destroyed.contains(&(ObjectKind::Framebuffer, fb.as_raw())));
        }
        for view in &old_views {
            assert!(destroyed.contains(&(ObjectKind::ImageView, view.as_raw())));
        }

        // 旧的 swapchain 在新的 swapchain 创建之后才销毁
        let new_created = events
            .iter()
            .position(|event| matches!(event, DriverEvent::Created(ObjectKind::Swapchain, _)))
            .unwrap();
        let old_destroyed = events
            .iter()
            .position(|event| *event == DriverEvent::Destroyed(ObjectKind::Swapchain, old_handle.as_raw()))
            .unwrap();
        assert!(new_created < old_destroyed);
        assert_eq!(driver.swapchain_descs()[1].old_swapchain, old_handle);

        assert_ne!(swapchain.handle(), old_handle);
        assert_eq!(swapchain.render_pass(), render_pass);
        assert_eq!(swapchain.extent(), vk::Extent2D { width: 640, height: 480 });
        assert_eq!(swapchain.image_count(), 3);
        assert_eq!(swapchain.framebuffers().len(), 3);
        assert!(!swapchain.is_stale());
        assert_eq!(driver.live_count(ObjectKind::Device), 1);
        assert_eq!(driver.live_count(ObjectKind::Surface), 1);

        swapchain.destroy(&driver);
        context.destroy(&driver);
        assert!(driver.live_objects().is_empty());
    }

    #[test]
    fn test_recreate_keeps_requested_image_count() {
        let (driver, context, window) = setup(FakeDriverConfig::default());
        let mut swapchain = GfxSwapchain::new(&driver, &context, &window).unwrap();

        // surface 的最小值变小，仍然沿用创建时的数量
        driver.update_config(|config| config.min_image_count = 2);
        swapchain.recreate(&driver, &context, &window).unwrap();
        assert_eq!(swapchain.image_count(), 3);

        // surface 的最小值变大，跟随 surface
        driver.update_config(|config| config.min_image_count = 4);
        swapchain.recreate(&driver, &context, &window).unwrap();
        assert_eq!(swapchain.image_count(), 4);
        assert_eq!(swapchain.image_views().len(), 4);
        assert_eq!(swapchain.framebuffers().len(), 4);

        swapchain.destroy(&driver);
        context.destroy(&driver);
    }

    #[test]
    fn test_failed_recreate_is_stale_and_retryable() {
        let (driver, context, window) = setup(FakeDriverConfig::default());
        let mut swapchain = GfxSwapchain::new(&driver, &context, &window).unwrap();

        driver.update_config(|config| config.current_extent = vk::Extent2D { width: 0, height: 0 });
        let err = swapchain.recreate(&driver, &context, &window).unwrap_err();
        assert!(err.is_transient());
        assert!(swapchain.is_stale());
        assert_eq!(swapchain.image_count(), 0);
        assert!(swapchain.image_views().is_empty());
        assert!(swapchain.framebuffers().is_empty());

        driver.update_config(|config| config.current_extent = vk::Extent2D { width: 800, height: 600 });
        driver.fail_call("get_swapchain_images", vk::Result::ERROR_SURFACE_LOST_KHR);
        assert!(swapchain.recreate(&driver, &context, &window).is_err());
        assert!(swapchain.is_stale());

        driver.clear_failures();
        swapchain.recreate(&driver, &context, &window).unwrap();
        assert!(!swapchain.is_stale());
        assert_eq!(swapchain.image_count(), 3);
        assert_eq!(driver.live_count(ObjectKind::Swapchain), 1);

        swapchain.destroy(&driver);
        context.destroy(&driver);
        assert!(driver.live_objects().is_empty());
    }

    #[test]
    fn test_acquire_and_present_report_out_of_date() {
        let (driver, context, window) = setup(FakeDriverConfig::default());
        let swapchain = GfxSwapchain::new(&driver, &context, &window).unwrap();
        let semaphore = driver.create_semaphore().unwrap();

        driver.script_acquire([vk::Result::SUCCESS, vk::Result::SUBOPTIMAL_KHR, vk::Result::ERROR_OUT_OF_DATE_KHR]);
        assert_eq!(
            swapchain.acquire_next_image(&driver, u64::MAX, semaphore).unwrap(),
            AcquiredImage::Ready {
                image_index: 0,
                suboptimal: false
            }
        );
        assert_eq!(
            swapchain.acquire_next_image(&driver, u64::MAX, semaphore).unwrap(),
            AcquiredImage::Ready {
                image_index: 1,
                suboptimal: true
            }
        );
        assert_eq!(swapchain.acquire_next_image(&driver, u64::MAX, semaphore).unwrap(), AcquiredImage::OutOfDate);

        driver.script_present([vk::Result::SUCCESS, vk::Result::ERROR_OUT_OF_DATE_KHR, vk::Result::ERROR_DEVICE_LOST]);
        assert!(!swapchain.present_image(&driver, context.queue(), 0, semaphore).unwrap());
        assert!(swapchain.present_image(&driver, context.queue(), 0, semaphore).unwrap());
        assert!(matches!(
            swapchain.present_image(&driver, context.queue(), 0, semaphore),
            Err(GfxError::Driver { call: "vkQueuePresentKHR", .. })
        ));

        driver.destroy_semaphore(semaphore);
        swapchain.destroy(&driver);
        context.destroy(&driver);
    }
}
