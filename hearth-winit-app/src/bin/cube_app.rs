use hearth_crate_tools::init_log::{init_log, panic_handler};
use hearth_renderer::settings::RenderLoopConfig;
use hearth_winit_app::app::WinitApp;

fn main() {
    std::panic::set_hook(Box::new(panic_handler));
    init_log();
    tracy_client::Client::start();
    tracy_client::set_thread_name!("RenderThread");

    if let Err(err) = WinitApp::run(RenderLoopConfig::default()) {
        log::error!("fatal: {}", err);
        std::process::exit(err.exit_code());
    }
}
