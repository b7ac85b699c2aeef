use std::path::Path;

use hearth_crate_tools::resource::HearthPath;
use hearth_gfx::error::{GfxError, GfxResult};
use hearth_gfx::pipelines::shader::ShaderBytecode;
use hearth_renderer::settings::{DefaultRendererSettings, TransformSource};

/// 读取一个 SPIR-V 文件；文件不存在或者无法读取时返回 [`GfxError::ShaderIo`]
pub fn load_shader(path: &Path, stage: &'static str) -> GfxResult<ShaderBytecode> {
    let bytes = std::fs::read(path).map_err(|source| GfxError::ShaderIo {
        path: path.to_path_buf(),
        source,
    })?;
    let shader = ShaderBytecode::from_spv_bytes(stage, &bytes)?;
    log::info!("loaded {} shader {} ({} bytes)", stage, path.display(), shader.byte_size());
    Ok(shader)
}

/// 按照变换的传递方式，从 `shaders/` 目录中读取 vertex 与 fragment shader
pub fn load_cube_shaders(transform: TransformSource) -> GfxResult<(ShaderBytecode, ShaderBytecode)> {
    let vertex = load_shader(&HearthPath::shader_path(transform.vertex_shader()), "vertex")?;
    let fragment = load_shader(&HearthPath::shader_path(DefaultRendererSettings::FRAGMENT_SHADER), "fragment")?;
    Ok((vertex, fragment))
}
