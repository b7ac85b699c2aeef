use ash::vk;

use crate::driver::{GfxDriver, RenderPassDesc};
use crate::error::{GfxResult, VkCheck};

/// 只有一个 color attachment 的 render pass
///
/// - load: clear，store: store
/// - 初始 layout 为 UNDEFINED，结束后转换为 PRESENT_SRC_KHR
/// - external -> subpass 0 的依赖：color attachment 的写入需要等待之前的 color attachment output 完成
pub fn color_render_pass_desc(format: vk::Format) -> RenderPassDesc {
    RenderPassDesc {
        color_attachment: vk::AttachmentDescription {
            format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            ..Default::default()
        },
        color_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        dependency: vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            src_access_mask: vk::AccessFlags::empty(),
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            ..Default::default()
        },
    }
}

/// 绘制到 swapchain image 上所使用的 render pass
#[derive(Debug)]
pub struct GfxRenderTarget {
    render_pass: vk::RenderPass,
    format: vk::Format,
}

impl GfxRenderTarget {
    pub fn new(driver: &dyn GfxDriver, format: vk::Format) -> GfxResult<Self> {
        let render_pass = driver.create_render_pass(&color_render_pass_desc(format)).vk_check("vkCreateRenderPass")?;
        Ok(Self { render_pass, format })
    }

    #[inline]
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn destroy(self, driver: &dyn GfxDriver) {
        driver.destroy_render_pass(self.render_pass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_render_pass_desc() {
        let desc = color_render_pass_desc(vk::Format::B8G8R8A8_SRGB);

        let attachment = desc.color_attachment;
        assert_eq!(attachment.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(attachment.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(attachment.initial_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(attachment.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);

        let dependency = desc.dependency;
        assert_eq!(dependency.src_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(dependency.dst_subpass, 0);
        assert_eq!(dependency.src_stage_mask, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(dependency.dst_access_mask, vk::AccessFlags::COLOR_ATTACHMENT_WRITE);
    }
}
