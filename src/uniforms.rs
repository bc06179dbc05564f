use glam::{Mat4, Vec2, Vec4};

use crate::{
    accumulation::AccumulationPolicy,
    backend::{BindingValue, BufferHandle, ComputeBackend, ImageHandle, Slot, TextureHandle},
    camera::CameraState,
    config::DirectionalLight,
    error::{ConfigError, RenderError},
    scene::SceneBuffer,
};

/// Frame-global kernel parameters that do not come from the camera, light or
/// scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParameters {
    pub max_bounces: u32,
    /// Seconds since the host started.
    pub time: f32,
    pub animate: bool,
    pub pixel_offset: Vec2,
    /// Samples already accumulated in the output.
    pub sample: u32,
    pub policy: AccumulationPolicy,
}

/// Everything the binder reads for one frame. Light and scene are optional
/// here so that a missing one surfaces as a [`ConfigError`].
pub struct FrameInputs<'a> {
    pub output: ImageHandle,
    pub skybox: Option<TextureHandle>,
    pub camera: &'a CameraState,
    pub light: Option<&'a DirectionalLight>,
    pub scene: Option<&'a SceneBuffer>,
    pub parameters: FrameParameters,
}

/// The full, validated set of kernel inputs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParameters {
    pub output: ImageHandle,
    pub skybox: TextureHandle,
    pub spheres: BufferHandle,
    pub camera_to_world: Mat4,
    pub camera_inverse_projection: Mat4,
    pub light: Vec4,
    pub max_bounces: u32,
    pub time: f32,
    pub animate: bool,
    pub sample: u32,
    pub pixel_offset: Vec2,
    pub policy: AccumulationPolicy,
}

impl BoundParameters {
    pub fn bindings(&self) -> [(Slot, BindingValue); 13] {
        let (accumulate, blend_weight) = match self.policy {
            AccumulationPolicy::Overwrite => (false, 1.0),
            AccumulationPolicy::Blend { weight } => (true, weight),
        };

        [
            (Slot::Output, BindingValue::Image(self.output)),
            (Slot::Skybox, BindingValue::Texture(self.skybox)),
            (Slot::Spheres, BindingValue::Buffer(self.spheres)),
            (Slot::CameraToWorld, BindingValue::Mat4(self.camera_to_world)),
            (
                Slot::CameraInverseProjection,
                BindingValue::Mat4(self.camera_inverse_projection),
            ),
            (Slot::Light, BindingValue::Vec4(self.light)),
            (Slot::MaxBounces, BindingValue::U32(self.max_bounces)),
            (Slot::Time, BindingValue::F32(self.time)),
            (Slot::Animate, BindingValue::Bool(self.animate)),
            (Slot::Sample, BindingValue::U32(self.sample)),
            (Slot::PixelOffset, BindingValue::Vec2(self.pixel_offset)),
            (Slot::Accumulate, BindingValue::Bool(accumulate)),
            (Slot::BlendWeight, BindingValue::F32(blend_weight)),
        ]
    }

    pub fn apply<B: ComputeBackend>(&self, backend: &mut B) -> Result<(), RenderError> {
        for (slot, value) in self.bindings() {
            backend.bind(slot, value)?;
        }
        Ok(())
    }
}

pub struct FrameUniformBinder;

impl FrameUniformBinder {
    pub fn bind(inputs: &FrameInputs<'_>) -> Result<BoundParameters, ConfigError> {
        let light = inputs.light.ok_or(ConfigError::MissingLight)?;
        let scene = inputs.scene.ok_or(ConfigError::MissingScene)?;
        let skybox = inputs.skybox.ok_or(ConfigError::MissingSkybox)?;
        let parameters = &inputs.parameters;

        Ok(BoundParameters {
            output: inputs.output,
            skybox,
            spheres: scene.handle(),
            camera_to_world: inputs.camera.camera_to_world,
            camera_inverse_projection: inputs.camera.inverse_projection,
            light: light.forward().extend(light.intensity),
            max_bounces: parameters.max_bounces,
            time: parameters.time,
            animate: parameters.animate,
            sample: parameters.sample,
            pixel_offset: parameters.pixel_offset,
            policy: parameters.policy,
        })
    }
}

/// Kernel uniform block. Mirrors `Frame` in `ray_tracing.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    pub camera_to_world: Mat4,
    pub camera_inverse_projection: Mat4,
    pub light: Vec4,
    pub pixel_offset: Vec2,
    pub size: [u32; 2],
    pub max_bounces: u32,
    pub sample: u32,
    pub time: f32,
    pub animate: u32,
    pub sphere_count: u32,
    pub accumulate: u32,
    pub blend_weight: f32,
    pub _padding: u32,
}

impl Default for FrameUniforms {
    fn default() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}
