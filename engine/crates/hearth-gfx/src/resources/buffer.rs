use ash::vk;

use crate::driver::GfxDriver;
use crate::error::{GfxError, GfxResult, VkCheck};
use crate::resources::memory::find_memory_type;
use crate::teardown::TeardownStack;

#[derive(Debug, Clone, Copy)]
pub struct GfxBufferDesc {
    pub name: &'static str,
    pub size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
    pub memory_flags: vk::MemoryPropertyFlags,
    /// 创建后立即映射，直到销毁前一直保持映射
    pub mapped: bool,
}

impl GfxBufferDesc {
    /// host visible + coherent，持久映射
    pub fn host_visible(name: &'static str, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> Self {
        Self {
            name,
            size,
            usage,
            memory_flags: vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            mapped: true,
        }
    }

    pub fn device_local(name: &'static str, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> Self {
        Self {
            name,
            size,
            usage,
            memory_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            mapped: false,
        }
    }
}

/// buffer 以及它独占的一块 memory
pub struct GfxBuffer {
    handle: vk::Buffer,
    memory: vk::DeviceMemory,

    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,

    /// 在初始化阶段写死
    map_ptr: Option<*mut u8>,

    name: &'static str,
}

// init & destroy
impl GfxBuffer {
    /// create buffer -> allocate memory -> bind -> (map)
    pub fn new(
        driver: &dyn GfxDriver,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        desc: &GfxBufferDesc,
    ) -> GfxResult<Self> {
        let mut teardown = TeardownStack::new();
        match Self::init(driver, memory_properties, desc, &mut teardown) {
            Ok(buffer) => {
                teardown.disarm();
                Ok(buffer)
            }
            Err(err) => {
                log::error!("failed to create buffer {}: {}", desc.name, err);
                teardown.unwind(driver);
                Err(err)
            }
        }
    }

    fn init(
        driver: &dyn GfxDriver,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        desc: &GfxBufferDesc,
        teardown: &mut TeardownStack,
    ) -> GfxResult<Self> {
        let handle = driver.create_buffer(desc.size, desc.usage).vk_check("vkCreateBuffer")?;
        teardown.push("buffer", move |driver| driver.destroy_buffer(handle));

        let requirements = driver.buffer_memory_requirements(handle).vk_check("vkGetBufferMemoryRequirements")?;
        let memory_type = find_memory_type(memory_properties, requirements.memory_type_bits, desc.memory_flags)?;

        let memory = driver.allocate_memory(requirements.size, memory_type).vk_check("vkAllocateMemory")?;
        teardown.push("buffer memory", move |driver| driver.free_memory(memory));

        driver.bind_buffer_memory(handle, memory).vk_check("vkBindBufferMemory")?;

        let map_ptr = if desc.mapped { Some(driver.map_memory(memory).vk_check("vkMapMemory")?) } else { None };

        log::debug!(
            "buffer {} created: {} bytes, usage: {:?}, memory type: {}",
            desc.name,
            desc.size,
            desc.usage,
            memory_type
        );

        Ok(Self {
            handle,
            memory,
            size: desc.size,
            usage: desc.usage,
            map_ptr,
            name: desc.name,
        })
    }

    pub fn destroy(self, driver: &dyn GfxDriver) {
        if self.map_ptr.is_some() {
            driver.unmap_memory(self.memory);
        }
        driver.destroy_buffer(self.handle);
        driver.free_memory(self.memory);
    }
}

// getters
impl GfxBuffer {
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    pub fn memory(&self) -> vk::DeviceMemory {
        self.memory
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn usage(&self) -> vk::BufferUsageFlags {
        self.usage
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn is_mapped(&self) -> bool {
        self.map_ptr.is_some()
    }
}

// write
impl GfxBuffer {
    /// 将 `bytes` 拷贝到映射的内存中 `offset` 处
    pub fn write(&self, offset: vk::DeviceSize, bytes: &[u8]) -> GfxResult<()> {
        let Some(map_ptr) = self.map_ptr else {
            return Err(GfxError::InvalidBufferWrite {
                name: self.name,
                reason: "buffer is not mapped".to_string(),
            });
        };
        let end = offset.checked_add(bytes.len() as vk::DeviceSize);
        if end.is_none_or(|end| end > self.size) {
            return Err(GfxError::InvalidBufferWrite {
                name: self.name,
                reason: format!("{} bytes at offset {} exceed buffer size {}", bytes.len(), offset, self.size),
            });
        }

        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), map_ptr.add(offset as usize), bytes.len());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ash::vk::Handle;

    use super::*;
    use crate::driver::fake_driver::{FakeDriver, FakeDriverConfig, ObjectKind};

    #[test]
    fn test_host_visible_buffer_is_mapped_and_writable() {
        let driver = FakeDriver::new(FakeDriverConfig::default());
        let props = driver.memory_properties(vk::PhysicalDevice::null()).unwrap();

        let desc = GfxBufferDesc::host_visible("uniform", 16, vk::BufferUsageFlags::UNIFORM_BUFFER);
        let buffer = GfxBuffer::new(&driver, &props, &desc).unwrap();
        assert!(buffer.is_mapped());

        buffer.write(4, &[1, 2, 3, 4]).unwrap();
        let contents = driver.memory_contents(buffer.memory());
        assert_eq!(&contents[..8], &[0, 0, 0, 0, 1, 2, 3, 4]);

        assert!(matches!(buffer.write(13, &[0; 4]), Err(GfxError::InvalidBufferWrite { .. })));
        assert!(matches!(buffer.write(u64::MAX, &[0; 4]), Err(GfxError::InvalidBufferWrite { .. })));

        buffer.destroy(&driver);
        assert!(driver.live_objects().is_empty());
    }

    #[test]
    fn test_device_local_buffer_is_not_writable() {
        let driver = FakeDriver::new(FakeDriverConfig::default());
        let props = driver.memory_properties(vk::PhysicalDevice::null()).unwrap();

        let desc = GfxBufferDesc::device_local("vertex", 16, vk::BufferUsageFlags::VERTEX_BUFFER);
        let buffer = GfxBuffer::new(&driver, &props, &desc).unwrap();
        assert!(!buffer.is_mapped());
        assert!(matches!(buffer.write(0, &[1]), Err(GfxError::InvalidBufferWrite { name: "vertex", .. })));

        buffer.destroy(&driver);
    }

    #[test]
    fn test_bind_and_map_failures_roll_back() {
        for call in ["bind_buffer_memory", "map_memory"] {
            let driver = FakeDriver::new(FakeDriverConfig::default());
            let props = driver.memory_properties(vk::PhysicalDevice::null()).unwrap();
            driver.fail_call(call, vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);

            let desc = GfxBufferDesc::host_visible("staging", 64, vk::BufferUsageFlags::TRANSFER_SRC);
            assert!(GfxBuffer::new(&driver, &props, &desc).is_err());
            assert_eq!(driver.live_count(ObjectKind::Buffer), 0);
            assert_eq!(driver.live_count(ObjectKind::Memory), 0);
        }
    }

    #[test]
    fn test_no_matching_memory_type() {
        let driver = FakeDriver::new(FakeDriverConfig::default());
        let props = driver.memory_properties(vk::PhysicalDevice::null()).unwrap();

        let desc = GfxBufferDesc {
            memory_flags: vk::MemoryPropertyFlags::LAZILY_ALLOCATED,
            ..GfxBufferDesc::device_local("lazy", 16, vk::BufferUsageFlags::VERTEX_BUFFER)
        };
        assert!(matches!(GfxBuffer::new(&driver, &props, &desc), Err(GfxError::NoMemoryType { .. })));
        assert!(driver.live_objects().is_empty());
    }
}
