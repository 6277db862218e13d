use glam::{Mat4, Vec3};

use super::Vertex;
use crate::effects::hsl_to_rgb;
use crate::frame_driver::SceneState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fovy_degrees: f32,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Camera {
    pub fn new(aspect: f32) -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 100.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fovy_degrees: 75.0,
            aspect,
            znear: 0.1,
            zfar: 1000.0,
        }
    }

    pub fn view_proj(&self) -> Mat4 {
        let view = Mat4::look_at_rh(self.eye, self.target, self.up);
        let proj = Mat4::perspective_rh(
            self.fovy_degrees.to_radians(),
            self.aspect.max(1e-3),
            self.znear,
            self.zfar,
        );
        proj * view
    }

    pub fn billboard_axes(&self) -> (Vec3, Vec3) {
        let forward = (self.target - self.eye).normalize_or_zero();
        let right = forward.cross(self.up).normalize_or_zero();
        let up = right.cross(forward);
        (right, up)
    }
}

pub const BOX_VERTICES: usize = 36;
pub const QUAD_VERTICES: usize = 6;

const BAR_HALF_EXTENTS: Vec3 = Vec3::new(1.0, 1.0, 0.5);

// (corner signs, counter-clockwise seen from outside, shade)
const BOX_FACES: [([[f32; 3]; 4], f32); 6] = [
    ([[-1.0, -1.0, 1.0], [1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [-1.0, 1.0, 1.0]], 1.0),
    ([[1.0, -1.0, -1.0], [-1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [1.0, 1.0, -1.0]], 0.55),
    ([[1.0, -1.0, 1.0], [1.0, -1.0, -1.0], [1.0, 1.0, -1.0], [1.0, 1.0, 1.0]], 0.75),
    ([[-1.0, -1.0, -1.0], [-1.0, -1.0, 1.0], [-1.0, 1.0, 1.0], [-1.0, 1.0, -1.0]], 0.75),
    ([[-1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, -1.0], [-1.0, 1.0, -1.0]], 0.9),
    ([[-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [1.0, -1.0, 1.0], [-1.0, -1.0, 1.0]], 0.45),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeshLayout {
    pub bar_vertices: u32,
    pub particle_vertices: u32,
}

// Opaque bars first, then translucent particles
pub fn build_scene_mesh(scene: &SceneState, camera: &Camera, out: &mut Vec<Vertex>) -> MeshLayout {
    out.clear();

    for bar in scene.bars.bars() {
        let rgb = hsl_to_rgb(bar.hue(), 1.0, 0.5);
        let half = BAR_HALF_EXTENTS * Vec3::new(1.0, bar.height(), 1.0);
        push_box(out, bar.position(), half, rgb);
    }
    let bar_vertices = out.len() as u32;

    let (right, up) = camera.billboard_axes();
    for cluster in scene.bursts.clusters() {
        for particle in cluster.particles() {
            let half = particle.size * 0.5;
            let color = [
                particle.color[0],
                particle.color[1],
                particle.color[2],
                particle.opacity,
            ];
            push_quad(out, particle.position, right * half, up * half, color);
        }
    }

    MeshLayout {
        bar_vertices,
        particle_vertices: out.len() as u32 - bar_vertices,
    }
}

fn push_box(out: &mut Vec<Vertex>, center: Vec3, half: Vec3, rgb: [f32; 3]) {
    for (corners, shade) in BOX_FACES.iter() {
        let color = [rgb[0] * shade, rgb[1] * shade, rgb[2] * shade, 1.0];
        let point = |i: usize| {
            let c = Vec3::from(corners[i]);
            Vertex {
                position: (center + c * half).to_array(),
                color,
            }
        };
        out.extend_from_slice(&[point(0), point(1), point(2), point(0), point(2), point(3)]);
    }
}

fn push_quad(out: &mut Vec<Vertex>, center: Vec3, right: Vec3, up: Vec3, color: [f32; 4]) {
    let corner = |offset: Vec3| Vertex {
        position: (center + offset).to_array(),
        color,
    };
    let a = corner(-right - up);
    let b = corner(right - up);
    let c = corner(right + up);
    let d = corner(up - right);
    out.extend_from_slice(&[a, b, c, a, c, d]);
}
