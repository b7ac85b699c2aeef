use ash::vk;

use crate::driver::GfxDriver;
use crate::error::{GfxResult, VkCheck};
use crate::foundation::context::GfxContext;
use crate::teardown::TeardownStack;

/// 一个 frame slot 的同步对象以及它专用的 command buffer
#[derive(Debug, Clone, Copy)]
pub struct FrameSyncSet {
    /// acquire 完成后 signal
    pub image_acquired: vk::Semaphore,
    /// 渲染完成后 signal，present 等待它
    pub render_finished: vk::Semaphore,
    /// command buffer 在 GPU 上执行完成后 signal；创建时即为 signaled
    pub in_flight: vk::Fence,
    pub command_buffer: vk::CommandBuffer,
}

/// 每个 swapchain image 对应一组 [`FrameSyncSet`]
pub struct GfxFrameSyncSets {
    sets: Vec<FrameSyncSet>,
    command_pool: vk::CommandPool,
}

impl GfxFrameSyncSets {
    /// 创建 `count` 组同步对象，command buffer 从 context 的 command pool 中分配
    pub fn new(driver: &dyn GfxDriver, context: &GfxContext, count: usize) -> GfxResult<Self> {
        let command_pool = context.command_pool();
        let mut teardown = TeardownStack::new();
        match Self::init(driver, command_pool, count, &mut teardown) {
            Ok(sets) => {
                teardown.disarm();
                log::info!("created {} frame sync sets", sets.len());
                Ok(Self { sets, command_pool })
            }
            Err(err) => {
                log::error!("failed to create frame sync sets: {}", err);
                teardown.unwind(driver);
                Err(err)
            }
        }
    }

    fn init(
        driver: &dyn GfxDriver,
        command_pool: vk::CommandPool,
        count: usize,
        teardown: &mut TeardownStack,
    ) -> GfxResult<Vec<FrameSyncSet>> {
        let command_buffers =
            driver.allocate_command_buffers(command_pool, count as u32).vk_check("vkAllocateCommandBuffers")?;
        teardown.push("frame command buffers", {
            let command_buffers = command_buffers.clone();
            move |driver| driver.free_command_buffers(command_pool, &command_buffers)
        });

        let mut sets = Vec::with_capacity(count);
        for command_buffer in command_buffers {
            let image_acquired = driver.create_semaphore().vk_check("vkCreateSemaphore")?;
            teardown.push("image acquired semaphore", move |driver| driver.destroy_semaphore(image_acquired));

            let render_finished = driver.create_semaphore().vk_check("vkCreateSemaphore")?;
            teardown.push("render finished semaphore", move |driver| driver.destroy_semaphore(render_finished));

            // 第一帧不需要等待
            let in_flight = driver.create_fence(true).vk_check("vkCreateFence")?;
            teardown.push("in flight fence", move |driver| driver.destroy_fence(in_flight));

            sets.push(FrameSyncSet {
                image_acquired,
                render_finished,
                in_flight,
                command_buffer,
            });
        }
        Ok(sets)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> &FrameSyncSet {
        &self.sets[index]
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &FrameSyncSet> {
        self.sets.iter()
    }

    /// 调用前需要确保 device 已经 idle
    pub fn destroy(self, driver: &dyn GfxDriver) {
        for set in self.sets.iter().rev() {
            driver.destroy_fence(set.in_flight);
            driver.destroy_semaphore(set.render_finished);
            driver.destroy_semaphore(set.image_acquired);
        }
        let command_buffers = self.sets.iter().map(|set| set.command_buffer).collect::<Vec<_>>();
        driver.free_command_buffers(self.command_pool, &command_buffers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake_driver::{FakeDriver, FakeDriverConfig, FakePlatform, ObjectKind};
    use crate::foundation::context::GfxContextDesc;

    fn context(driver: &FakeDriver) -> GfxContext {
        GfxContext::new(driver, &FakePlatform { vulkan_supported: true }, &GfxContextDesc::default()).unwrap()
    }

    #[test]
    fn test_fences_start_signaled() {
        let driver = FakeDriver::new(FakeDriverConfig::default());
        let context = context(&driver);

        let sets = GfxFrameSyncSets::new(&driver, &context, 3).unwrap();
        assert_eq!(sets.len(), 3);
        assert!(sets.iter().all(|set| driver.fence_signaled(set.in_flight)));
        assert_eq!(driver.live_count(ObjectKind::Semaphore), 6);
        // context 自己的 command buffer + 每个 slot 一个
        assert_eq!(driver.live_count(ObjectKind::CommandBuffer), 4);

        sets.destroy(&driver);
        context.destroy(&driver);
        assert!(driver.live_objects().is_empty());
    }

    #[test]
    fn test_rollback_at_every_step() {
        // 3 个 command buffer + 3 组 (2 semaphore + 1 fence)
        let total = 12;
        for k in 0..total {
            let driver = FakeDriver::new(FakeDriverConfig::default());
            let context = context(&driver);
            let base = driver.created().len();
            driver.fail_nth_create(driver.create_count() + k);

            assert!(GfxFrameSyncSets::new(&driver, &context, 3).is_err());

            // 同一批分配的 command buffer 中途失败时，已分配的也会被释放
            let mut created = driver.created()[base..].to_vec();
            assert_eq!(created.len(), k);
            created.reverse();
            assert_eq!(driver.destroyed(), created);

            context.destroy(&driver);
            assert!(driver.live_objects().is_empty());
        }
    }
}
