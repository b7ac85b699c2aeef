//! Vulkan 的最小封装
//!
//! - [`driver`]：所有 vulkan 调用的边界，真实实现基于 ash，测试中使用 fake driver
//! - [`foundation`]：instance、adapter、device、queue
//! - [`swapchain`]：surface、swapchain 以及每个 image 对应的 view 和 framebuffer
//! - [`pipelines`]：shader module 与 graphics pipeline
//! - [`commands`]：命令录制与每帧的同步对象
//! - [`resources`]：buffer 与资源注册表
//!
//! 所有的多步创建过程都通过 [`teardown::TeardownStack`] 在失败时按逆序回滚

pub mod commands;
pub mod driver;
pub mod error;
pub mod foundation;
pub mod pipelines;
pub mod resources;
pub mod swapchain;
pub mod teardown;
