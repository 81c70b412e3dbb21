use glam::{Mat4, Vec3};
use serde::Deserialize;

use crate::input::InputState;

const MIN_FOV: f32 = 1.0;
const MAX_FOV: f32 = 45.0;
const PITCH_LIMIT: f32 = 89.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraDirection {
    Forward,
    Backward,
    Left,
    Right,
}

/// Starting pose and tuning for the fly camera. Angles are in degrees.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub position: Vec3,
    pub up: Vec3,
    pub speed: f32,
    pub sensitivity: f32,
    pub fov: f32,
    pub yaw: f32,
    pub pitch: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 10.0),
            up: Vec3::Y,
            speed: 5.0,
            sensitivity: 0.1,
            fov: 45.0,
            yaw: -90.0,
            pitch: 0.0,
        }
    }
}

/// First-person fly camera: WASD to move, mouse to look, wheel to zoom.
#[derive(Debug, Clone)]
pub struct FpsCamera {
    position: Vec3,
    front: Vec3,
    right: Vec3,
    world_up: Vec3,
    speed: f32,
    sensitivity: f32,
    fov: f32,
    yaw: f32,
    pitch: f32,
}

impl FpsCamera {
    pub fn new(settings: &CameraSettings) -> Self {
        let mut camera = Self {
            position: settings.position,
            front: Vec3::NEG_Z,
            right: Vec3::X,
            world_up: settings.up.normalize_or_zero(),
            speed: settings.speed,
            sensitivity: settings.sensitivity,
            fov: settings.fov.clamp(MIN_FOV, MAX_FOV),
            yaw: settings.yaw,
            pitch: settings.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
        };
        if camera.world_up == Vec3::ZERO {
            camera.world_up = Vec3::Y;
        }
        camera.update_vectors();
        camera
    }

    pub fn move_in(&mut self, direction: CameraDirection, dt: f32) {
        let step = self.speed * dt;
        match direction {
            CameraDirection::Forward => self.position += self.front * step,
            CameraDirection::Backward => self.position -= self.front * step,
            CameraDirection::Left => self.position -= self.right * step,
            CameraDirection::Right => self.position += self.right * step,
        }
    }

    /// Mouse look; `dy` is positive when the cursor moves up.
    pub fn look(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.sensitivity;
        self.pitch = (self.pitch + dy * self.sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.update_vectors();
    }

    pub fn zoom(&mut self, scroll: f32) {
        self.fov = (self.fov - scroll).clamp(MIN_FOV, MAX_FOV);
    }

    /// Consumes this frame's accumulated input.
    pub fn apply_input(&mut self, input: &mut InputState, dt: f32) {
        for direction in input.held_directions() {
            self.move_in(direction, dt);
        }
        let (dx, dy) = input.take_look_delta();
        if dx != 0.0 || dy != 0.0 {
            self.look(dx, dy);
        }
        let scroll = input.take_scroll();
        if scroll != 0.0 {
            self.zoom(scroll);
        }
    }

    fn update_vectors(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front =
            Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize();
        self.right = self.front.cross(self.world_up).normalize_or_zero();
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.world_up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), aspect, Z_NEAR, Z_FAR)
    }
}
