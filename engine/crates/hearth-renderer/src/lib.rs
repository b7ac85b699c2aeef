//! Hearth 的渲染层
//!
//! 在 `hearth-gfx` 之上组织一个完整的呈现循环：
//! - [`present::frame_scheduler`]：acquire -> record -> submit -> present 的帧调度
//! - [`present::uniforms`]：每个 frame slot 一份的 uniform buffer 与 descriptor set
//! - [`scene`]：立方体的顶点数据与变换矩阵
//! - [`renderer::Renderer`]：把上述组件按顺序创建、驱动与销毁

pub mod error;
pub mod frame_clock;
pub mod present;
pub mod renderer;
pub mod scene;
pub mod settings;
