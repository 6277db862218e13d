pub mod bar_field;
pub mod color;
pub mod particle_burst;

pub use bar_field::{Bar, BarField};
pub use color::{hsl_to_rgb, wrap_hue};
pub use particle_burst::{Particle, ParticleBursts, ParticleCluster};
