use ash::vk;

use crate::driver::GfxDriver;
use crate::error::{GfxError, GfxResult, VkCheck};

/// 预编译好的 SPIR-V
///
/// 只检查长度，不检查 magic number 和版本
#[derive(Debug, Clone)]
pub struct ShaderBytecode {
    stage: &'static str,
    words: Vec<u32>,
}

impl ShaderBytecode {
    /// 字节数必须是 4 的倍数且不为空
    pub fn from_spv_bytes(stage: &'static str, bytes: &[u8]) -> GfxResult<Self> {
        if bytes.is_empty() {
            return Err(GfxError::InvalidShader {
                stage,
                reason: "bytecode is empty".to_string(),
            });
        }
        if bytes.len() % 4 != 0 {
            return Err(GfxError::InvalidShader {
                stage,
                reason: format!("bytecode size {} is not a multiple of 4", bytes.len()),
            });
        }

        // SPIR-V 文件是小端序的 32 位 word
        let words = bytes
            .chunks_exact(4)
            .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
            .collect();
        Ok(Self { stage, words })
    }

    #[inline]
    pub fn stage(&self) -> &'static str {
        self.stage
    }

    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    #[inline]
    pub fn byte_size(&self) -> usize {
        self.words.len() * 4
    }
}

pub struct GfxShaderModule {
    handle: vk::ShaderModule,
}

impl GfxShaderModule {
    pub fn new(driver: &dyn GfxDriver, bytecode: &ShaderBytecode) -> GfxResult<Self> {
        let handle = driver.create_shader_module(bytecode.words()).vk_check("vkCreateShaderModule")?;
        log::debug!("{} shader module created, {} bytes", bytecode.stage(), bytecode.byte_size());
        Ok(Self { handle })
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }

    #[inline]
    pub fn destroy(self, driver: &dyn GfxDriver) {
        driver.destroy_shader_module(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_and_unaligned() {
        assert!(matches!(
            ShaderBytecode::from_spv_bytes("vertex", &[]),
            Err(GfxError::InvalidShader { stage: "vertex", .. })
        ));
        assert!(matches!(
            ShaderBytecode::from_spv_bytes("fragment", &[1, 2, 3, 4, 5]),
            Err(GfxError::InvalidShader { stage: "fragment", .. })
        ));
    }

    #[test]
    fn test_words_without_magic_check() {
        let bytes = [0x03, 0x02, 0x23, 0x07, 0xAA, 0xBB, 0xCC, 0xDD];
        let bytecode = ShaderBytecode::from_spv_bytes("vertex", &bytes).unwrap();
        assert_eq!(bytecode.words(), &[0x0723_0203, 0xDDCC_BBAA]);
        assert_eq!(bytecode.byte_size(), 8);

        // 没有 magic number 也可以
        let bytecode = ShaderBytecode::from_spv_bytes("fragment", &[0u8; 12]).unwrap();
        assert_eq!(bytecode.words().len(), 3);
    }
}
