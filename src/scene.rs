use std::f32::consts::TAU;

use bytemuck::Zeroable;
use glam::Vec3;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    backend::{BufferHandle, ComputeBackend},
    config::SceneConfig,
    error::{ConfigError, RenderError},
    util::color,
};

/// Reflectance used for the specular term of non-metallic spheres.
pub const DIELECTRIC_SPECULAR: Vec3 = Vec3::splat(0.04);

/// A sphere as the kernel sees it.
///
/// Field order follows WGSL storage layout rules (a `vec3<f32>` is 16 byte
/// aligned), so each `Vec3` is followed by a scalar.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Sphere {
    pub position: Vec3,
    pub radius: f32,
    /// Diffuse color, zero for metallic spheres.
    pub albedo: Vec3,
    /// Phase of the bobbing animation in `[0, 1)`.
    pub y_offset: f32,
    pub specular: Vec3,
    pub movement_speed: f32,
}

impl Sphere {
    pub fn is_metallic(&self) -> bool {
        self.albedo == Vec3::ZERO
    }

    pub fn intersects(&self, other: &Sphere) -> bool {
        let min_distance = self.radius + other.radius;
        self.position.distance_squared(other.position) < min_distance * min_distance
    }
}

/// Rejection-sampling placement of non-overlapping spheres resting on the
/// ground plane.
pub struct SceneBuilder<'a> {
    config: &'a SceneConfig,
}

impl<'a> SceneBuilder<'a> {
    /// Fails when the radius range or placement radius cannot produce a
    /// sphere.
    pub fn new(config: &'a SceneConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Builds a scene from the configured seed.
    pub fn build(&self) -> Vec<Sphere> {
        self.build_with(&mut StdRng::seed_from_u64(self.config.seed))
    }

    /// Builds a scene drawing every random value from `rng`.
    ///
    /// Each slot gets exactly one candidate; a candidate that touches an
    /// already accepted sphere is dropped, so the result may hold fewer than
    /// `max_count` spheres.
    pub fn build_with(&self, rng: &mut impl Rng) -> Vec<Sphere> {
        let (min_radius, max_radius) = self.config.radius_range;
        let mut spheres: Vec<Sphere> = Vec::with_capacity(self.config.max_count as usize);

        for _ in 0..self.config.max_count {
            let radius = rng.gen_range(min_radius..=max_radius);
            let (x, z) = sample_disk(rng, self.config.placement_radius);

            let candidate = Sphere {
                position: Vec3::new(x, radius, z),
                radius,
                ..Sphere::zeroed()
            };

            if spheres.iter().any(|other| other.intersects(&candidate)) {
                continue;
            }

            let y_offset = rng.gen::<f32>();
            let movement_speed = rng.gen_range(-1.0f32..2.0);
            let metallic = rng.gen_bool(0.5);
            let color = color::hue_to_rgb(rng.gen());

            let (albedo, specular) = if metallic {
                (Vec3::ZERO, color)
            } else {
                (color, DIELECTRIC_SPECULAR)
            };

            spheres.push(Sphere {
                albedo,
                specular,
                y_offset,
                movement_speed,
                ..candidate
            });
        }

        if spheres.len() < self.config.max_count as usize {
            tracing::debug!(
                "placed {} of {} spheres, remaining candidates overlapped",
                spheres.len(),
                self.config.max_count
            );
        }

        spheres
    }
}

/// Uniform-area point inside a disk of the given radius.
fn sample_disk(rng: &mut impl Rng, radius: f32) -> (f32, f32) {
    let r = radius * rng.gen::<f32>().sqrt();
    let theta = rng.gen::<f32>() * TAU;
    (r * theta.cos(), r * theta.sin())
}

/// The spheres of the active scene together with their GPU-side copy.
#[derive(Debug)]
pub struct SceneBuffer {
    handle: BufferHandle,
    spheres: Vec<Sphere>,
}

impl SceneBuffer {
    pub fn upload<B: ComputeBackend>(
        backend: &mut B,
        spheres: Vec<Sphere>,
    ) -> Result<Self, RenderError> {
        let handle = backend.create_scene_buffer(&spheres)?;
        tracing::info!("uploaded scene with {} spheres", spheres.len());
        Ok(Self { handle, spheres })
    }

    pub fn release<B: ComputeBackend>(self, backend: &mut B) {
        backend.release_scene_buffer(self.handle);
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn spheres(&self) -> &[Sphere] {
        &self.spheres
    }

    pub fn len(&self) -> usize {
        self.spheres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spheres.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_count: u32, radius_range: (f32, f32), placement_radius: f32) -> SceneConfig {
        SceneConfig {
            max_count,
            radius_range,
            placement_radius,
            seed: 1234,
        }
    }

    fn assert_no_overlap(spheres: &[Sphere]) {
        for (i, a) in spheres.iter().enumerate() {
            for b in &spheres[i + 1..] {
                let distance = a.position.distance(b.position);
                assert!(
                    distance >= a.radius + b.radius - 1e-4,
                    "{a:?} overlaps {b:?}"
                );
            }
        }
    }

    #[test]
    fn single_sphere_rests_on_ground() {
        let config = config(1, (1.0, 1.0), 100.0);
        let spheres = SceneBuilder::new(&config).unwrap().build();

        assert_eq!(1, spheres.len());
        assert_eq!(1.0, spheres[0].radius);
        assert_eq!(1.0, spheres[0].position.y);
    }

    #[test]
    fn crowded_scene_drops_candidates() {
        let config = config(50, (3.0, 8.0), 10.0);
        let spheres = SceneBuilder::new(&config).unwrap().build();

        assert!(spheres.len() < 50);
        assert!(!spheres.is_empty());
        assert_no_overlap(&spheres);
    }

    #[test]
    fn default_scene_has_no_overlap() {
        let config = SceneConfig::default();
        let spheres = SceneBuilder::new(&config).unwrap().build();

        assert_no_overlap(&spheres);

        for sphere in &spheres {
            assert!((3.0..=8.0).contains(&sphere.radius));
            assert_eq!(sphere.radius, sphere.position.y);
            assert!(sphere.position.x.hypot(sphere.position.z) <= 100.0 + 1e-3);
            assert!((0.0..1.0).contains(&sphere.y_offset));
            assert!((-1.0..2.0).contains(&sphere.movement_speed));
        }
    }

    #[test]
    fn same_seed_same_scene() {
        let config = SceneConfig::default();
        let a = SceneBuilder::new(&config).unwrap().build();
        let b = SceneBuilder::new(&config).unwrap().build();
        assert_eq!(a, b);

        let other = SceneConfig {
            seed: 4321,
            ..SceneConfig::default()
        };
        assert_ne!(a, SceneBuilder::new(&other).unwrap().build());
    }

    #[test]
    fn materials() {
        let config = SceneConfig::default();
        let spheres = SceneBuilder::new(&config).unwrap().build();

        let metallic = spheres.iter().filter(|s| s.is_metallic()).count();
        assert!(metallic > 0);
        assert!(metallic < spheres.len());

        for sphere in &spheres {
            if sphere.is_metallic() {
                assert_eq!(1.0, sphere.specular.max_element());
            } else {
                assert_eq!(DIELECTRIC_SPECULAR, sphere.specular);
                assert_eq!(1.0, sphere.albedo.max_element());
            }
        }
    }

    #[test]
    fn zero_count_is_empty() {
        let config = config(0, (1.0, 2.0), 10.0);
        assert!(SceneBuilder::new(&config).unwrap().build().is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let inverted = config(10, (5.0, 2.0), 100.0);
        assert_eq!(
            Some(ConfigError::InvalidRadiusRange { min: 5.0, max: 2.0 }),
            SceneBuilder::new(&inverted).err()
        );

        let flat = config(10, (1.0, 2.0), 0.0);
        assert_eq!(
            Some(ConfigError::InvalidPlacementRadius(0.0)),
            SceneBuilder::new(&flat).err()
        );
    }

    #[test]
    fn disk_samples_are_uniform_by_area() {
        let mut rng = StdRng::seed_from_u64(7);
        let radius = 10.0;
        let draws = 100_000;

        let mut inner = 0;
        for _ in 0..draws {
            let (x, z) = sample_disk(&mut rng, radius);
            let distance = x.hypot(z);
            assert!(distance <= radius + 1e-4, "({x}, {z}) outside the disk");
            if distance < radius / 2.0 {
                inner += 1;
            }
        }

        // A disk of half the radius covers a quarter of the area.
        let fraction = inner as f32 / draws as f32;
        assert!((0.23..0.27).contains(&fraction), "inner fraction {fraction}");
    }

    #[test]
    fn gpu_layout() {
        assert_eq!(48, std::mem::size_of::<Sphere>());
        assert_eq!(16, std::mem::offset_of!(Sphere, albedo));
        assert_eq!(32, std::mem::offset_of!(Sphere, specular));
    }
}
