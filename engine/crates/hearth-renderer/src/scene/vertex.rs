use ash::vk;
use hearth_gfx::pipelines::graphics_pipeline::GfxVertexLayout;

/// position 与 color 交错存放
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PosColorVertex {
    pub pos: [f32; 3],
    pub color: [f32; 3],
}

impl PosColorVertex {
    pub fn vertex_layout() -> GfxVertexLayout {
        GfxVertexLayout {
            stride: size_of::<Self>() as u32,
            attributes: vec![
                (vk::Format::R32G32B32_SFLOAT, std::mem::offset_of!(Self, pos) as u32),
                (vk::Format::R32G32B32_SFLOAT, std::mem::offset_of!(Self, color) as u32),
            ],
        }
    }
}

/// 边长为 1，以原点为中心的立方体，每个面一种颜色
pub struct CubeMesh;
impl CubeMesh {
    pub const VERTEX_COUNT: u32 = 36;

    /// 每个面两个三角形；从立方体外面看过去，三角形为顺时针
    ///
    /// projection 翻转了 y 轴，因此在 framebuffer 中依然是顺时针，与 pipeline 的 front face 一致
    pub fn vertices() -> Vec<PosColorVertex> {
        // 每个面：(四个角，从外面看为逆时针, 颜色)
        let faces: [([[f32; 3]; 4], [f32; 3]); 6] = [
            // +x
            ([[0.5, -0.5, 0.5], [0.5, -0.5, -0.5], [0.5, 0.5, -0.5], [0.5, 0.5, 0.5]], [0.9, 0.2, 0.2]),
            // -x
            ([[-0.5, -0.5, -0.5], [-0.5, -0.5, 0.5], [-0.5, 0.5, 0.5], [-0.5, 0.5, -0.5]], [0.2, 0.9, 0.9]),
            // +y
            ([[-0.5, 0.5, 0.5], [0.5, 0.5, 0.5], [0.5, 0.5, -0.5], [-0.5, 0.5, -0.5]], [0.2, 0.9, 0.2]),
            // -y
            ([[-0.5, -0.5, -0.5], [0.5, -0.5, -0.5], [0.5, -0.5, 0.5], [-0.5, -0.5, 0.5]], [0.9, 0.2, 0.9]),
            // +z
            ([[-0.5, -0.5, 0.5], [0.5, -0.5, 0.5], [0.5, 0.5, 0.5], [-0.5, 0.5, 0.5]], [0.2, 0.2, 0.9]),
            // -z
            ([[0.5, -0.5, -0.5], [-0.5, -0.5, -0.5], [-0.5, 0.5, -0.5], [0.5, 0.5, -0.5]], [0.9, 0.9, 0.2]),
        ];

        faces
            .iter()
            .flat_map(|(corners, color)| {
                // 逆时针的 (0, 1, 2) (0, 2, 3) 反转为顺时针
                [0, 2, 1, 0, 3, 2].map(|i| PosColorVertex {
                    pos: corners[i],
                    color: *color,
                })
            })
            .collect()
    }
}
