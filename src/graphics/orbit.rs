use glam::Vec3;
use std::f32::consts::{FRAC_PI_2, TAU};

use super::Camera;
use crate::config::CameraConfig;

// Stay just short of the poles so the up vector never lines up with the view
const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.01;
const ZOOM_PER_NOTCH: f32 = 0.95;

// Rotation eases out over several frames; `update` runs once per frame
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitControls {
    target: Vec3,
    yaw: f32,
    pitch: f32,
    distance: f32,
    yaw_delta: f32,
    pitch_delta: f32,
    damping: f32,
    rotate_speed: f32,
    min_distance: f32,
    max_distance: f32,
}

impl OrbitControls {
    pub fn new(camera: &Camera, config: &CameraConfig) -> Self {
        let offset = camera.eye - camera.target;
        let distance = offset.length().max(f32::EPSILON);
        let pitch = (offset.y / distance).clamp(-1.0, 1.0).asin();

        Self {
            target: camera.target,
            yaw: offset.x.atan2(offset.z),
            pitch: pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            distance: distance.clamp(config.min_distance, config.max_distance),
            yaw_delta: 0.0,
            pitch_delta: 0.0,
            damping: config.damping,
            rotate_speed: config.rotate_speed,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
        }
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    // A drag across the full viewport height is one full turn
    pub fn drag(&mut self, dx: f32, dy: f32, height: f32) {
        let per_pixel = TAU * self.rotate_speed / height.max(1.0);
        self.yaw_delta -= dx * per_pixel;
        self.pitch_delta += dy * per_pixel;
    }

    pub fn zoom(&mut self, notches: f32) {
        self.distance = (self.distance * ZOOM_PER_NOTCH.powf(notches))
            .clamp(self.min_distance, self.max_distance);
    }

    pub fn update(&mut self) {
        self.yaw = (self.yaw + self.yaw_delta * self.damping).rem_euclid(TAU);
        self.pitch = (self.pitch + self.pitch_delta * self.damping).clamp(-PITCH_LIMIT, PITCH_LIMIT);

        let keep = 1.0 - self.damping;
        self.yaw_delta *= keep;
        self.pitch_delta *= keep;
    }

    pub fn eye(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        self.target + self.distance * Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw)
    }

    pub fn apply(&self, camera: &mut Camera) {
        camera.eye = self.eye();
        camera.target = self.target;
    }
}
