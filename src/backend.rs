//! The capability surface the renderer needs from a GPU.
//!
//! The renderer never touches a concrete graphics API. It allocates and
//! releases resources through opaque handles, binds values to named kernel
//! slots, dispatches the kernel over a work-group grid and presents the
//! accumulation image. [`crate::gpu::GpuBackend`] implements this on wgpu.

use glam::{Mat4, Vec2, Vec4};

use crate::{error::RenderError, scene::Sphere};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Input slots of the ray-tracing kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Output,
    Skybox,
    Spheres,
    CameraToWorld,
    CameraInverseProjection,
    /// Light forward vector in `xyz`, intensity in `w`.
    Light,
    MaxBounces,
    Time,
    Animate,
    Sample,
    PixelOffset,
    /// Blend into the output instead of overwriting it.
    Accumulate,
    BlendWeight,
}

impl Slot {
    pub fn name(&self) -> &'static str {
        match self {
            Slot::Output => "result",
            Slot::Skybox => "skybox_texture",
            Slot::Spheres => "spheres",
            Slot::CameraToWorld => "camera_to_world",
            Slot::CameraInverseProjection => "camera_inverse_projection",
            Slot::Light => "directional_light",
            Slot::MaxBounces => "max_bounces",
            Slot::Time => "time",
            Slot::Animate => "animate",
            Slot::Sample => "sample",
            Slot::PixelOffset => "pixel_offset",
            Slot::Accumulate => "accumulate",
            Slot::BlendWeight => "blend_weight",
        }
    }

    /// The [`BindingValue::kind`] this slot accepts.
    pub fn kind(&self) -> &'static str {
        match self {
            Slot::Output => "image",
            Slot::Skybox => "texture",
            Slot::Spheres => "buffer",
            Slot::CameraToWorld | Slot::CameraInverseProjection => "mat4",
            Slot::Light => "vec4",
            Slot::PixelOffset => "vec2",
            Slot::MaxBounces | Slot::Sample => "u32",
            Slot::Time | Slot::BlendWeight => "f32",
            Slot::Animate | Slot::Accumulate => "bool",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BindingValue {
    Image(ImageHandle),
    Texture(TextureHandle),
    Buffer(BufferHandle),
    Mat4(Mat4),
    Vec4(Vec4),
    Vec2(Vec2),
    U32(u32),
    F32(f32),
    Bool(bool),
}

impl BindingValue {
    pub fn kind(&self) -> &'static str {
        match self {
            BindingValue::Image(_) => "image",
            BindingValue::Texture(_) => "texture",
            BindingValue::Buffer(_) => "buffer",
            BindingValue::Mat4(_) => "mat4",
            BindingValue::Vec4(_) => "vec4",
            BindingValue::Vec2(_) => "vec2",
            BindingValue::U32(_) => "u32",
            BindingValue::F32(_) => "f32",
            BindingValue::Bool(_) => "bool",
        }
    }
}

pub trait ComputeBackend {
    /// Allocates a `width`x`height` image of linear RGBA32F texels the kernel
    /// can write at random.
    fn create_image(&mut self, width: u32, height: u32) -> Result<ImageHandle, RenderError>;

    fn release_image(&mut self, image: ImageHandle);

    fn create_scene_buffer(&mut self, spheres: &[Sphere]) -> Result<BufferHandle, RenderError>;

    fn release_scene_buffer(&mut self, buffer: BufferHandle);

    fn bind(&mut self, slot: Slot, value: BindingValue) -> Result<(), RenderError>;

    /// Runs the kernel over `groups_x * groups_y * groups_z` work-groups.
    fn dispatch(&mut self, groups_x: u32, groups_y: u32, groups_z: u32)
        -> Result<(), RenderError>;

    /// Shows the current contents of `image`. Must observe every write of the
    /// preceding dispatch.
    fn present(&mut self, image: ImageHandle) -> Result<(), RenderError>;
}
