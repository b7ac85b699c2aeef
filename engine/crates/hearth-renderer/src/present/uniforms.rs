use ash::vk;
use ash::vk::Handle;
use hearth_gfx::driver::GfxDriver;
use hearth_gfx::error::{GfxResult, VkCheck};
use hearth_gfx::foundation::context::GfxContext;
use hearth_gfx::resources::buffer::GfxBufferDesc;
use hearth_gfx::resources::registry::{GfxBufferHandle, GfxResourceRegistry};

use crate::scene::transform::ViewProjUniform;

/// 每个 frame slot 一个持久映射的 uniform buffer，以及指向它的 descriptor set
///
/// buffer 归 [`GfxResourceRegistry`] 所有；这里只持有 descriptor pool
pub struct FrameUniforms {
    /// 属于 pipeline，这里不负责销毁
    set_layout: vk::DescriptorSetLayout,
    descriptor_pool: vk::DescriptorPool,

    sets: Vec<vk::DescriptorSet>,
    buffers: Vec<GfxBufferHandle>,
}

// new & init
impl FrameUniforms {
    const UNIFORM_SIZE: vk::DeviceSize = size_of::<ViewProjUniform>() as vk::DeviceSize;

    pub fn new(
        driver: &dyn GfxDriver,
        context: &GfxContext,
        registry: &mut GfxResourceRegistry,
        set_layout: vk::DescriptorSetLayout,
        slot_count: usize,
    ) -> GfxResult<Self> {
        let mut uniforms = Self {
            set_layout,
            descriptor_pool: vk::DescriptorPool::null(),
            sets: Vec::new(),
            buffers: Vec::new(),
        };
        if let Err(err) = uniforms.ensure_slots(driver, context, registry, slot_count) {
            log::error!("failed to create frame uniforms: {}", err);
            uniforms.destroy(driver);
            return Err(err);
        }
        Ok(uniforms)
    }
}

// update
impl FrameUniforms {
    /// 保证至少有 `slot_count` 个 slot；slot 数量只增不减
    ///
    /// 增加 slot 时会重建 descriptor pool，调用前需要确保 device 已经 idle
    pub fn ensure_slots(
        &mut self,
        driver: &dyn GfxDriver,
        context: &GfxContext,
        registry: &mut GfxResourceRegistry,
        slot_count: usize,
    ) -> GfxResult<()> {
        if slot_count <= self.sets.len() {
            return Ok(());
        }

        // 新增的 buffer 已经交给 registry，失败时随 registry 一起销毁
        while self.buffers.len() < slot_count {
            let desc =
                GfxBufferDesc::host_visible("frame uniform", Self::UNIFORM_SIZE, vk::BufferUsageFlags::UNIFORM_BUFFER);
            self.buffers.push(registry.create_buffer(driver, context, &desc)?);
        }

        // descriptor set 不能单独释放，整个 pool 按新的数量重建
        let pool = driver
            .create_descriptor_pool(slot_count as u32, slot_count as u32)
            .vk_check("vkCreateDescriptorPool")?;
        let layouts = vec![self.set_layout; slot_count];
        let sets = match driver.allocate_descriptor_sets(pool, &layouts).vk_check("vkAllocateDescriptorSets") {
            Ok(sets) => sets,
            Err(err) => {
                driver.destroy_descriptor_pool(pool);
                return Err(err);
            }
        };
        for (set, buffer) in sets.iter().zip(&self.buffers) {
            driver.write_uniform_buffer_descriptor(*set, 0, registry.buffer_handle(*buffer), Self::UNIFORM_SIZE);
        }

        if !self.descriptor_pool.is_null() {
            driver.destroy_descriptor_pool(self.descriptor_pool);
        }
        self.descriptor_pool = pool;
        self.sets = sets;

        log::info!("frame uniforms: {} slots", slot_count);
        Ok(())
    }

    /// 写入 slot 对应的 uniform buffer；调用前需要确保该 slot 的 fence 已经 signaled
    #[inline]
    pub fn write(&self, registry: &GfxResourceRegistry, slot: usize, uniform: &ViewProjUniform) -> GfxResult<()> {
        registry.write(self.buffers[slot], 0, bytemuck::bytes_of(uniform))
    }
}

// getters
impl FrameUniforms {
    #[inline]
    pub fn descriptor_set(&self, slot: usize) -> vk::DescriptorSet {
        self.sets[slot]
    }

    #[inline]
    pub fn buffer(&self, slot: usize) -> GfxBufferHandle {
        self.buffers[slot]
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.sets.len()
    }
}

// destroy
impl FrameUniforms {
    /// descriptor set 随 pool 一起释放
    pub fn destroy(mut self, driver: &dyn GfxDriver) {
        if !self.descriptor_pool.is_null() {
            driver.destroy_descriptor_pool(self.descriptor_pool);
        }
        self.descriptor_pool = vk::DescriptorPool::null();
        self.sets.clear();
    }
}
impl Drop for FrameUniforms {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            assert!(self.descriptor_pool.is_null(), "FrameUniforms must be destroyed explicitly");
        }
    }
}
