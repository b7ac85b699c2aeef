use ash::vk;
use glam::{Mat4, Vec3};

/// 立方体的 model / view / projection 矩阵
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubeTransform {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
}

/// uniform buffer 中的数据布局，与 `vert_ubo.vert` 中的 block 一致
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ViewProjUniform {
    pub view: Mat4,
    pub projection: Mat4,
}

impl CubeTransform {
    const EYE: Vec3 = Vec3::new(1.6, 1.2, 1.6);
    const FOV_Y_DEGREES: f32 = 45.0;
    const Z_NEAR: f32 = 0.1;
    const Z_FAR: f32 = 10.0;

    /// 每秒绕 y 轴旋转的弧度
    const Y_RADIANS_PER_SECOND: f32 = std::f32::consts::FRAC_PI_2;
    const X_RADIANS_PER_SECOND: f32 = std::f32::consts::FRAC_PI_8;

    /// `elapsed_secs` 时刻的变换，相机的宽高比来自 swapchain 的 extent
    pub fn at(elapsed_secs: f32, extent: vk::Extent2D) -> Self {
        let model = Mat4::from_rotation_y(elapsed_secs * Self::Y_RADIANS_PER_SECOND)
            * Mat4::from_rotation_x(elapsed_secs * Self::X_RADIANS_PER_SECOND);
        let view = Mat4::look_at_rh(Self::EYE, Vec3::ZERO, Vec3::Y);

        Self {
            model,
            view,
            projection: Self::projection(extent),
        }
    }

    /// 右手系的透视投影，深度范围 [0, 1]
    ///
    /// vulkan 的 clip space 中 y 轴朝下，这里翻转 y 轴
    pub fn projection(extent: vk::Extent2D) -> Mat4 {
        let aspect = extent.width as f32 / extent.height.max(1) as f32;
        let mut projection =
            Mat4::perspective_rh(Self::FOV_Y_DEGREES.to_radians(), aspect, Self::Z_NEAR, Self::Z_FAR);
        projection.y_axis.y *= -1.0;
        projection
    }

    #[inline]
    pub fn mvp(&self) -> Mat4 {
        self.projection * self.view * self.model
    }

    #[inline]
    pub fn view_proj_uniform(&self) -> ViewProjUniform {
        ViewProjUniform {
            view: self.view,
            projection: self.projection,
        }
    }
}

/// 以列主序排列的 64 字节，可以直接作为 push constant
#[inline]
pub fn mat4_bytes(matrix: &Mat4) -> Vec<u8> {
    bytemuck::bytes_of(matrix).to_vec()
}
