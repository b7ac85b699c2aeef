use std::panic::Location;
use std::path::PathBuf;

use ash::prelude::VkResult;
use ash::vk;

pub type GfxResult<T> = Result<T, GfxError>;

#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("{call} failed at {location}: {description} ({result:?})")]
    Driver {
        call: &'static str,
        result: vk::Result,
        description: &'static str,
        location: &'static Location<'static>,
    },

    #[error("the driver reports no gpu adapter")]
    NoAdapter,

    #[error("the selected adapter has no queue family with graphics capability")]
    NoGraphicsQueue,

    #[error("the surface reports no {0}")]
    EmptySurfaceQuery(&'static str),

    #[error("no memory type matches type bits {type_bits:#b} with properties {flags:?}")]
    NoMemoryType { type_bits: u32, flags: vk::MemoryPropertyFlags },

    #[error("resource registry is full ({capacity} buffers)")]
    RegistryFull { capacity: usize },

    #[error("invalid write to buffer {name}: {reason}")]
    InvalidBufferWrite { name: &'static str, reason: String },

    #[error("invalid {stage} shader bytecode: {reason}")]
    InvalidShader { stage: &'static str, reason: String },

    #[error("failed to read shader {}: {source}", path.display())]
    ShaderIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("window framebuffer has zero area")]
    ZeroExtent,

    #[error("window handle unavailable: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),
}

impl GfxError {
    #[track_caller]
    pub fn driver(call: &'static str, result: vk::Result) -> Self {
        Self::Driver {
            call,
            result,
            description: describe_vk_result(result),
            location: Location::caller(),
        }
    }

    /// 窗口最小化等情况下 swapchain 暂时无法重建，下一帧重试即可
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ZeroExtent)
    }
}

/// 将 driver 返回的状态码转换为 [`GfxError::Driver`]，并记录调用位置
pub trait VkCheck<T> {
    fn vk_check(self, call: &'static str) -> GfxResult<T>;
}

impl<T> VkCheck<T> for VkResult<T> {
    #[track_caller]
    #[inline]
    fn vk_check(self, call: &'static str) -> GfxResult<T> {
        let location = Location::caller();
        self.map_err(|result| GfxError::Driver {
            call,
            result,
            description: describe_vk_result(result),
            location,
        })
    }
}

/// driver 错误码的可读描述
pub fn describe_vk_result(result: vk::Result) -> &'static str {
    match result {
        vk::Result::SUCCESS => "command successfully completed",
        vk::Result::NOT_READY => "a fence or query has not yet completed",
        vk::Result::TIMEOUT => "a wait operation has not completed in the specified time",
        vk::Result::EVENT_SET => "an event is signaled",
        vk::Result::EVENT_RESET => "an event is unsignaled",
        vk::Result::INCOMPLETE => "a return array was too small for the result",
        vk::Result::SUBOPTIMAL_KHR => "the swapchain no longer matches the surface properties exactly",
        vk::Result::ERROR_OUT_OF_HOST_MEMORY => "a host memory allocation has failed",
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => "a device memory allocation has failed",
        vk::Result::ERROR_INITIALIZATION_FAILED => {
            "initialization of an object could not be completed for implementation-specific reasons"
        }
        vk::Result::ERROR_DEVICE_LOST => "the logical or physical device has been lost",
        vk::Result::ERROR_MEMORY_MAP_FAILED => "mapping of a memory object has failed",
        vk::Result::ERROR_LAYER_NOT_PRESENT => "a requested layer is not present or could not be loaded",
        vk::Result::ERROR_EXTENSION_NOT_PRESENT => "a requested extension is not supported",
        vk::Result::ERROR_FEATURE_NOT_PRESENT => "a requested feature is not supported",
        vk::Result::ERROR_INCOMPATIBLE_DRIVER => {
            "the requested version of vulkan is not supported by the driver or is otherwise incompatible"
        }
        vk::Result::ERROR_TOO_MANY_OBJECTS => "too many objects of the type have already been created",
        vk::Result::ERROR_FORMAT_NOT_SUPPORTED => "a requested format is not supported on this device",
        vk::Result::ERROR_FRAGMENTED_POOL => "a pool allocation has failed due to fragmentation of the pool's memory",
        vk::Result::ERROR_OUT_OF_POOL_MEMORY => "a pool memory allocation has failed",
        vk::Result::ERROR_SURFACE_LOST_KHR => "a surface is no longer available",
        vk::Result::ERROR_NATIVE_WINDOW_IN_USE_KHR => {
            "the requested window is already in use by vulkan or another api in a manner which prevents it from being used again"
        }
        vk::Result::ERROR_OUT_OF_DATE_KHR => {
            "a surface has changed in such a way that it is no longer compatible with the swapchain"
        }
        vk::Result::ERROR_INCOMPATIBLE_DISPLAY_KHR => {
            "the display used by a swapchain does not use the same presentable image layout"
        }
        vk::Result::ERROR_VALIDATION_FAILED_EXT => "a command failed because invalid usage was detected",
        vk::Result::ERROR_UNKNOWN => "an unknown error has occurred",
        _ => "unrecognized driver status",
    }
}
