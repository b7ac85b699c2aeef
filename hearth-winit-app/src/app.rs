use hearth_gfx::driver::ash_driver::AshDriver;
use hearth_renderer::present::frame_scheduler::TickOutcome;
use hearth_renderer::renderer::{Renderer, RendererDesc};
use hearth_renderer::settings::{DefaultRendererSettings, RenderLoopConfig};
use raw_window_handle::HasDisplayHandle;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Window, WindowId};

use crate::error::AppError;
use crate::shader_files::load_cube_shaders;
use crate::window::{MainWindow, WinitPlatform};

pub struct WinitApp {
    config: RenderLoopConfig,

    driver: AshDriver,
    platform: WinitPlatform,

    /// renderer 必须在 window 之前销毁
    renderer: Option<Renderer>,
    window: Option<MainWindow>,

    /// 事件循环中出现的致命错误，退出后返回给 main
    error: Option<AppError>,
}
// 总的 main 函数
impl WinitApp {
    /// 整个程序的入口：事件循环结束后销毁所有 GPU 资源
    pub fn run(config: RenderLoopConfig) -> Result<(), AppError> {
        let event_loop = EventLoop::new()?;
        let platform = WinitPlatform::new(event_loop.display_handle()?.as_raw());
        let driver = AshDriver::new()?;

        let mut app = Self {
            config,
            driver,
            platform,
            renderer: None,
            window: None,
            error: None,
        };

        let loop_result = event_loop.run_app(&mut app);
        log::info!("end run.");

        let error = app.destroy();
        loop_result?;
        match error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
// new & init
impl WinitApp {
    /// 在 window 创建之后调用，初始化 Renderer
    fn init_after_window(&mut self, event_loop: &ActiveEventLoop) -> Result<(), AppError> {
        // 没有显示器时无法创建窗口
        if event_loop.primary_monitor().or_else(|| event_loop.available_monitors().next()).is_none() {
            return Err(AppError::MonitorNotFound);
        }

        let window = MainWindow::new(Self::create_window(event_loop)?);
        let (vertex_shader, fragment_shader) = load_cube_shaders(self.config.transform)?;

        let renderer = {
            let _span = tracy_client::span!("Renderer::new");
            Renderer::new(
                &self.driver,
                &self.platform,
                &window,
                RendererDesc {
                    config: self.config,
                    vertex_shader,
                    fragment_shader,
                    enable_validation: DefaultRendererSettings::ENABLE_VALIDATION,
                },
            )?
        };

        self.renderer = Some(renderer);
        self.window = Some(window);
        Ok(())
    }

    fn create_window(event_loop: &ActiveEventLoop) -> Result<Window, AppError> {
        let window_attr = Window::default_attributes()
            .with_title(DefaultRendererSettings::WINDOW_TITLE)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                DefaultRendererSettings::WINDOW_WIDTH,
                DefaultRendererSettings::WINDOW_HEIGHT,
            ));

        Ok(event_loop.create_window(window_attr)?)
    }
}
// update
impl WinitApp {
    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(renderer), Some(window)) = (self.renderer.as_mut(), self.window.as_ref()) else {
            return;
        };

        let outcome = {
            let _span = tracy_client::span!("render_frame");
            renderer.render_frame(&self.driver, window)
        };
        match outcome {
            Ok(TickOutcome::Presented { .. }) => tracy_client::frame_mark(),
            Ok(TickOutcome::SwapchainRebuilt) => log::debug!("swapchain rebuilt"),
            Ok(TickOutcome::Skipped) => {}
            Err(err) => self.fail(event_loop, err.into()),
        }
    }

    /// 记录第一个致命错误并结束事件循环
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: AppError) {
        log::error!("{}", err);
        self.error.get_or_insert(err);
        event_loop.exit();
    }
}
// destroy
impl WinitApp {
    fn destroy(mut self) -> Option<AppError> {
        if let Some(renderer) = self.renderer.take() {
            renderer.destroy(&self.driver);
        }
        self.window = None;
        self.error.take()
    }
}
// 各种 winit 的事件处理
impl ApplicationHandler for WinitApp {
    // 建议在这里创建 window 和 Renderer
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        log::info!("winit event: resumed");
        if self.window.is_some() || self.error.is_some() {
            return;
        }

        if let Err(err) = self.init_after_window(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Right,
                ..
            } => {
                log::info!("right mouse button pressed, exit.");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                log::debug!("window resized: {}x{}", size.width, size.height);
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.notify_resized();
                }
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.window().request_redraw();
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        log::warn!("winit event: suspended");
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        log::info!("loop exiting");
    }
}
