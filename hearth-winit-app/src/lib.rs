//! 基于 winit 的 demo 程序：创建窗口，驱动 [`hearth_renderer::renderer::Renderer`]
//! 完成旋转立方体的渲染

pub mod app;
pub mod error;
pub mod shader_files;
pub mod window;
