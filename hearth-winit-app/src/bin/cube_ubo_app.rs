use hearth_crate_tools::init_log::{init_log, panic_handler};
use hearth_renderer::settings::{RenderLoopConfig, TransformSource, ViewportMode};
use hearth_winit_app::app::WinitApp;

/// view 和 projection 通过 uniform buffer 传递，viewport 写死在 pipeline 中
fn main() {
    std::panic::set_hook(Box::new(panic_handler));
    init_log();
    tracy_client::Client::start();
    tracy_client::set_thread_name!("RenderThread");

    let config = RenderLoopConfig {
        transform: TransformSource::UniformBuffer,
        viewport: ViewportMode::Static,
    };
    if let Err(err) = WinitApp::run(config) {
        log::error!("fatal: {}", err);
        std::process::exit(err.exit_code());
    }
}
