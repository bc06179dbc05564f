use glam::Vec3;

use crate::error::ConfigError;

/// Placement parameters for [`crate::scene::SceneBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    pub max_count: u32,
    /// Inclusive `(min, max)` range sphere radii are drawn from.
    pub radius_range: (f32, f32),
    /// Radius of the ground disk sphere centers are placed in.
    pub placement_radius: f32,
    pub seed: u64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            max_count: 100,
            radius_range: (3.0, 8.0),
            placement_radius: 100.0,
            seed: 0x5eed,
        }
    }
}

impl SceneConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = self.radius_range;
        if !(min > 0.0 && min <= max && max.is_finite()) {
            return Err(ConfigError::InvalidRadiusRange { min, max });
        }
        if !(self.placement_radius > 0.0 && self.placement_radius.is_finite()) {
            return Err(ConfigError::InvalidPlacementRadius(self.placement_radius));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    forward: Vec3,
    pub intensity: f32,
}

impl DirectionalLight {
    pub fn new(forward: Vec3, intensity: f32) -> Self {
        Self {
            forward: forward.normalize_or_zero(),
            intensity,
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self::new(Vec3::new(-0.4, -1.0, 0.3), 1.2)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub scene: SceneConfig,
    pub max_bounces: u32,
    pub animate: bool,
    pub light: Option<DirectionalLight>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            scene: SceneConfig::default(),
            max_bounces: 8,
            animate: false,
            light: Some(DirectionalLight::default()),
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scene.validate()?;
        if self.max_bounces == 0 {
            return Err(ConfigError::InvalidMaxBounces);
        }
        if self.light.is_none() {
            return Err(ConfigError::MissingLight);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(Ok(()), RenderConfig::default().validate());
    }

    #[test]
    fn rejects_bad_scene_parameters() {
        let mut scene = SceneConfig {
            radius_range: (5.0, 2.0),
            ..Default::default()
        };
        assert_eq!(
            Err(ConfigError::InvalidRadiusRange { min: 5.0, max: 2.0 }),
            scene.validate()
        );

        scene.radius_range = (1.0, 2.0);
        scene.placement_radius = 0.0;
        assert_eq!(
            Err(ConfigError::InvalidPlacementRadius(0.0)),
            scene.validate()
        );

        scene.placement_radius = -3.0;
        assert_eq!(
            Err(ConfigError::InvalidPlacementRadius(-3.0)),
            scene.validate()
        );
    }

    #[test]
    fn rejects_missing_light_and_zero_bounces() {
        let config = RenderConfig {
            light: None,
            ..Default::default()
        };
        assert_eq!(Err(ConfigError::MissingLight), config.validate());

        let config = RenderConfig {
            max_bounces: 0,
            ..Default::default()
        };
        assert_eq!(Err(ConfigError::InvalidMaxBounces), config.validate());
    }
}
