use ash::vk;

use crate::driver::GfxDriver;
use crate::error::{GfxError, GfxResult};
use crate::foundation::context::GfxContext;
use crate::resources::buffer::{GfxBuffer, GfxBufferDesc};

/// [`GfxResourceRegistry`] 中 buffer 的索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GfxBufferHandle(usize);

/// 持有所有 buffer，在进程退出前统一销毁
///
/// 只能追加，不支持单独销毁某个 buffer；最多 [`GfxResourceRegistry::CAPACITY`] 个
pub struct GfxResourceRegistry {
    buffers: Vec<GfxBuffer>,

    destroyed: bool,
}
impl Default for GfxResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
// new & init
impl GfxResourceRegistry {
    pub const CAPACITY: usize = 64;

    pub fn new() -> Self {
        Self {
            buffers: Vec::with_capacity(Self::CAPACITY),
            destroyed: false,
        }
    }
}
// Subsystem API
impl GfxResourceRegistry {
    /// 容量已满时不会调用 driver
    pub fn create_buffer(
        &mut self,
        driver: &dyn GfxDriver,
        context: &GfxContext,
        desc: &GfxBufferDesc,
    ) -> GfxResult<GfxBufferHandle> {
        if self.buffers.len() >= Self::CAPACITY {
            return Err(GfxError::RegistryFull {
                capacity: Self::CAPACITY,
            });
        }

        let buffer = GfxBuffer::new(driver, context.memory_properties(), desc)?;
        self.buffers.push(buffer);
        Ok(GfxBufferHandle(self.buffers.len() - 1))
    }

    #[inline]
    pub fn get(&self, handle: GfxBufferHandle) -> &GfxBuffer {
        &self.buffers[handle.0]
    }

    #[inline]
    pub fn buffer_handle(&self, handle: GfxBufferHandle) -> vk::Buffer {
        self.get(handle).handle()
    }

    /// 拷贝到一个持久映射的 buffer 中，越界时返回错误
    #[inline]
    pub fn write(&self, handle: GfxBufferHandle, offset: vk::DeviceSize, bytes: &[u8]) -> GfxResult<()> {
        self.get(handle).write(offset, bytes)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
// destroy
impl GfxResourceRegistry {
    /// 按创建的逆序销毁所有 buffer；调用前需要确保 device 已经 idle
    pub fn destroy_all(mut self, driver: &dyn GfxDriver) {
        while let Some(buffer) = self.buffers.pop() {
            log::debug!("destroy buffer {}", buffer.name());
            buffer.destroy(driver);
        }
        self.destroyed = true;
    }
}
impl Drop for GfxResourceRegistry {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            assert!(self.destroyed || self.buffers.is_empty(), "GfxResourceRegistry must be destroyed explicitly");
        }
    }
}
