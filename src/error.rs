use thiserror::Error;

use crate::backend::Slot;

/// Setup-time problems. These never show up once the render loop is running.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("no directional light configured")]
    MissingLight,
    #[error("no scene buffer available for binding")]
    MissingScene,
    #[error("no skybox texture configured")]
    MissingSkybox,
    #[error("invalid sphere radius range [{min}, {max}]")]
    InvalidRadiusRange { min: f32, max: f32 },
    #[error("placement radius must be positive, got {0}")]
    InvalidPlacementRadius(f32),
    #[error("max bounce count must be at least 1")]
    InvalidMaxBounces,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to initialise the GPU: {0}")]
    Setup(String),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to allocate {width}x{height} accumulation target: {reason}")]
    TargetAllocation {
        width: u32,
        height: u32,
        reason: String,
    },
    #[error("failed to upload scene buffer: {0}")]
    SceneUpload(String),
    #[error("slot `{}` expects a {expected} value", .slot.name())]
    BindingMismatch { slot: Slot, expected: &'static str },
    #[error("slot `{}` was not bound before dispatch", .0.name())]
    Unbound(Slot),
    #[error("compute dispatch failed: {0}")]
    Dispatch(String),
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("failed to load skybox: {0}")]
    SkyboxLoad(#[from] image::ImageError),
}
