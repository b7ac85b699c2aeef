use std::path::{Path, PathBuf};

/// 运行时资源路径
///
/// 资源都相对于进程的工作目录查找：在仓库根目录下运行 demo 时，`shaders/` 就在当前目录
pub struct HearthPath;
impl HearthPath {
    /// 获取 `shaders/` 目录下的 SPIR-V 文件路径
    pub fn shader_path(filename: &str) -> PathBuf {
        Path::new("shaders").join(filename)
    }
}
