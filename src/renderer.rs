//! Frame driver for the progressive ray tracer.
//!
//! ```text
//! Uninitialized --first frame--> Stale --dispatch--> Ready
//!                                  ^                   |
//!                                  +-- camera moved, --+
//!                                      resized or
//!                                      scene regenerated
//! ```
//!
//! Every frame dispatches the kernel exactly once. A `Stale` frame starts the
//! accumulation over (sample 0 overwrites the target); a `Ready` frame blends
//! one more sample into it.

use glam::{Mat4, Vec2};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    accumulation::AccumulationTarget,
    backend::{ComputeBackend, TextureHandle},
    camera::CameraState,
    config::RenderConfig,
    error::{ConfigError, RenderError},
    scene::{SceneBuffer, SceneBuilder},
    tiles::TileGrid,
    uniforms::{FrameInputs, FrameParameters, FrameUniformBinder},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Uninitialized,
    Ready,
    Stale,
}

/// Per-frame input sampled by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInput {
    pub camera: CameraState,
    pub viewport: (u32, u32),
    /// Seconds since the host started.
    pub time: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// Samples held by the target after this frame.
    pub sample: u32,
    pub reallocated: bool,
    pub invalidated: bool,
    pub groups: (u32, u32, u32),
}

pub struct Renderer {
    config: RenderConfig,
    skybox: Option<TextureHandle>,
    scene: Option<SceneBuffer>,
    scene_seed: u64,
    seeds: StdRng,
    jitter: StdRng,
    target: AccumulationTarget,
    state: RenderState,
    last_camera: Option<(Mat4, Mat4)>,
    regenerate: bool,
}

impl Renderer {
    pub fn new(config: RenderConfig, skybox: Option<TextureHandle>) -> Result<Self, ConfigError> {
        config.validate()?;
        if skybox.is_none() {
            return Err(ConfigError::MissingSkybox);
        }

        let seed = config.scene.seed;

        Ok(Self {
            config,
            skybox,
            scene: None,
            scene_seed: seed,
            seeds: StdRng::seed_from_u64(seed),
            jitter: StdRng::seed_from_u64(seed.wrapping_add(1)),
            target: AccumulationTarget::new(),
            state: RenderState::Uninitialized,
            last_camera: None,
            regenerate: false,
        })
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn scene(&self) -> Option<&SceneBuffer> {
        self.scene.as_ref()
    }

    pub fn target(&self) -> &AccumulationTarget {
        &self.target
    }

    pub fn sample_count(&self) -> u32 {
        self.target.sample_count()
    }

    /// Asks for a fresh scene; it is rebuilt at the start of the next frame.
    pub fn request_regenerate(&mut self) {
        self.regenerate = true;
    }

    pub fn set_animate(&mut self, animate: bool) {
        if self.config.animate != animate {
            self.config.animate = animate;
            self.mark_stale();
        }
    }

    /// Builds and uploads the scene. Called implicitly by the first
    /// [`Self::on_frame`].
    pub fn on_activate<B: ComputeBackend>(&mut self, backend: &mut B) -> Result<(), RenderError> {
        if self.regenerate {
            self.regenerate = false;
            self.scene_seed = self.seeds.gen();
            self.release_scene(backend);
        }
        if self.scene.is_none() {
            self.build_scene(backend)?;
        }
        self.state = RenderState::Stale;
        Ok(())
    }

    /// Releases the scene buffer and the accumulation target.
    pub fn on_deactivate<B: ComputeBackend>(&mut self, backend: &mut B) {
        self.release_scene(backend);
        self.target.release(backend);
        self.last_camera = None;
        self.state = RenderState::Uninitialized;
    }

    pub fn on_frame<B: ComputeBackend>(
        &mut self,
        backend: &mut B,
        input: &FrameInput,
    ) -> Result<FrameReport, RenderError> {
        if self.state == RenderState::Uninitialized {
            self.on_activate(backend)?;
        }

        if self.regenerate {
            self.regenerate = false;
            self.scene_seed = self.seeds.gen();
            self.release_scene(backend);
            self.build_scene(backend)?;
            self.mark_stale();
        }

        let matrices = (input.camera.camera_to_world, input.camera.inverse_projection);
        if input.camera.changed || self.last_camera.is_some_and(|last| last != matrices) {
            self.mark_stale();
        }
        self.last_camera = Some(matrices);

        let (width, height) = input.viewport;
        let reallocated = self.target.ensure(backend, width, height)?;
        if reallocated {
            self.mark_stale();
        }

        let invalidated = self.state == RenderState::Stale;
        if invalidated && !reallocated {
            self.target.invalidate();
        }

        let output = self
            .target
            .image()
            .ok_or_else(|| RenderError::TargetAllocation {
                width,
                height,
                reason: "no image after allocation".to_owned(),
            })?;

        let parameters = FrameParameters {
            max_bounces: self.config.max_bounces,
            time: input.time,
            animate: self.config.animate,
            pixel_offset: Vec2::new(self.jitter.gen(), self.jitter.gen()),
            sample: self.target.sample_count(),
            policy: self.target.policy(),
        };

        let bound = FrameUniformBinder::bind(&FrameInputs {
            output,
            skybox: self.skybox,
            camera: &input.camera,
            light: self.config.light.as_ref(),
            scene: self.scene.as_ref(),
            parameters,
        })?;
        bound.apply(backend)?;

        let (groups_x, groups_y, groups_z) = TileGrid::new(width, height).groups();
        backend.dispatch(groups_x, groups_y, groups_z)?;
        backend.present(output)?;

        self.target.bump();
        self.state = RenderState::Ready;

        Ok(FrameReport {
            sample: self.target.sample_count(),
            reallocated,
            invalidated,
            groups: (groups_x, groups_y, groups_z),
        })
    }

    fn build_scene<B: ComputeBackend>(&mut self, backend: &mut B) -> Result<(), RenderError> {
        let spheres = SceneBuilder::new(&self.config.scene)?
            .build_with(&mut StdRng::seed_from_u64(self.scene_seed));

        tracing::debug!("built scene; seed={} spheres={}", self.scene_seed, spheres.len());

        self.scene = Some(SceneBuffer::upload(backend, spheres)?);
        Ok(())
    }

    fn release_scene<B: ComputeBackend>(&mut self, backend: &mut B) {
        if let Some(scene) = self.scene.take() {
            scene.release(backend);
        }
    }

    fn mark_stale(&mut self) {
        if self.state == RenderState::Ready {
            self.state = RenderState::Stale;
        }
    }
}
