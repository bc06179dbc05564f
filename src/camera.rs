use glam::{Mat4, Quat, Vec3};
use winit::event::{ElementState, KeyboardInput, VirtualKeyCode, WindowEvent};

use crate::util::math::degree_to_radian;

/// What the renderer reads from the camera each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub camera_to_world: Mat4,
    pub inverse_projection: Mat4,
    /// Whether the camera moved (or its projection changed) since the
    /// previous snapshot.
    pub changed: bool,
}

impl CameraState {
    pub fn new(camera_to_world: Mat4, inverse_projection: Mat4) -> Self {
        Self {
            camera_to_world,
            inverse_projection,
            changed: false,
        }
    }

    /// Same matrices, with the change flag set.
    pub fn moved(self) -> Self {
        Self {
            changed: true,
            ..self
        }
    }
}

pub struct Camera {
    pub eye: glam::Vec3,
    pub target: glam::Vec3,
    pub up: glam::Vec3,
    pub aspect: f32,
    pub fov_y: f32,
    pub z_near: f32,
    pub z_far: f32,
    changed: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 40.0, -160.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            aspect: 16.0 / 9.0,
            fov_y: degree_to_radian(60.0),
            z_near: 0.1,
            z_far: 1000.0,
            changed: true,
        }
    }
}

impl Camera {
    pub fn camera_to_world_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up).inverse()
    }

    pub fn inverse_projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.z_near, self.z_far).inverse()
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let aspect = width as f32 / height as f32;
        if aspect != self.aspect {
            self.aspect = aspect;
            self.changed = true;
        }
    }

    pub fn translate(&mut self, offset: Vec3) {
        if offset != Vec3::ZERO {
            self.eye += offset;
            self.target += offset;
            self.changed = true;
        }
    }

    /// Rotates the eye around the target, `yaw` about the up axis and `pitch`
    /// about the camera's right axis.
    pub fn orbit(&mut self, yaw: f32, pitch: f32) {
        let arm = self.eye - self.target;
        let right = arm.cross(self.up).normalize_or_zero();
        let rotation = Quat::from_axis_angle(self.up, yaw) * Quat::from_axis_angle(right, pitch);
        let arm = rotation * arm;

        // Keep away from the poles, where `look_at` degenerates.
        if arm.normalize_or_zero().dot(self.up).abs() < 0.99 {
            self.eye = self.target + arm;
            self.changed = true;
        }
    }

    /// Snapshot for the renderer; clears the change flag.
    pub fn snapshot(&mut self) -> CameraState {
        let state = CameraState {
            camera_to_world: self.camera_to_world_matrix(),
            inverse_projection: self.inverse_projection_matrix(),
            changed: self.changed,
        };
        self.changed = false;
        state
    }
}

pub struct CameraController {
    pub speed: f32,
    pub rotation_speed: f32,
}

impl CameraController {
    pub fn new(speed: f32) -> Self {
        Self {
            speed,
            rotation_speed: degree_to_radian(3.0),
        }
    }

    pub fn process_events(&self, camera: &mut Camera, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput {
                input:
                    KeyboardInput {
                        state,
                        virtual_keycode: Some(keycode),
                        ..
                    },
                ..
            } if *state == ElementState::Pressed => {
                let forward = (camera.target - camera.eye).normalize_or_zero();
                let right = forward.cross(camera.up).normalize_or_zero();

                match keycode {
                    VirtualKeyCode::W => camera.translate(forward * self.speed),
                    VirtualKeyCode::S => camera.translate(-forward * self.speed),
                    VirtualKeyCode::D => camera.translate(right * self.speed),
                    VirtualKeyCode::A => camera.translate(-right * self.speed),
                    VirtualKeyCode::E => camera.translate(camera.up * self.speed),
                    VirtualKeyCode::Q => camera.translate(-camera.up * self.speed),
                    VirtualKeyCode::Left => camera.orbit(self.rotation_speed, 0.0),
                    VirtualKeyCode::Right => camera.orbit(-self.rotation_speed, 0.0),
                    VirtualKeyCode::Up => camera.orbit(0.0, self.rotation_speed),
                    VirtualKeyCode::Down => camera.orbit(0.0, -self.rotation_speed),
                    _ => return false,
                }

                tracing::trace!("camera eye={:?} target={:?}", camera.eye, camera.target);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_consumes_change() {
        let mut camera = Camera::default();

        assert!(camera.snapshot().changed);
        assert!(!camera.snapshot().changed);

        camera.translate(Vec3::X);
        assert!(camera.snapshot().changed);
        assert!(!camera.snapshot().changed);
    }

    #[test]
    fn noop_mutations_do_not_flag_change() {
        let mut camera = Camera::default();
        camera.snapshot();

        camera.translate(Vec3::ZERO);
        camera.set_aspect(0, 100);
        let aspect = camera.aspect;
        camera.set_aspect((aspect * 900.0) as u32, 900);

        assert!(!camera.snapshot().changed);
    }

    #[test]
    fn camera_to_world_places_eye() {
        let camera = Camera::default();
        let origin = camera.camera_to_world_matrix().transform_point3(Vec3::ZERO);
        assert!(origin.abs_diff_eq(camera.eye, 1e-3));
    }

    #[test]
    fn orbit_keeps_distance() {
        let mut camera = Camera::default();
        let distance = camera.eye.distance(camera.target);

        camera.orbit(0.3, 0.1);
        assert!((camera.eye.distance(camera.target) - distance).abs() < 1e-2);
    }
}
