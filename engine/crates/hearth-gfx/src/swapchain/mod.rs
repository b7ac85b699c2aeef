pub mod render_swapchain;
pub mod render_target;
pub mod selection;
pub mod surface;
