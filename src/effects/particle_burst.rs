use glam::Vec3;
use log::trace;
use rand::Rng;

use super::color::hsl_to_rgb;
use crate::config::ParticleConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    pub color: [f32; 3],
    pub size: f32,
    pub opacity: f32,
}

/// Particles spawned together from one origin; retired together once fully faded.
#[derive(Debug, Clone)]
pub struct ParticleCluster {
    created_at: f64,
    origin: Vec3,
    particles: Vec<Particle>,
    age: u32,
}

impl ParticleCluster {
    pub fn created_at(&self) -> f64 {
        self.created_at
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Number of `advance` calls this cluster has been through.
    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn is_spent(&self) -> bool {
        self.particles.iter().all(|p| p.opacity == 0.0)
    }
}

/// Active set of beat-triggered particle clusters.
///
/// Motion and fading use fixed per-frame steps, so the effect runs faster on
/// faster displays.
#[derive(Debug, Clone)]
pub struct ParticleBursts {
    clusters: Vec<ParticleCluster>,
    config: ParticleConfig,
    fade_steps: u32,
    spawned: u64,
}

impl ParticleBursts {
    pub fn new(config: &ParticleConfig) -> Self {
        Self {
            clusters: Vec::new(),
            fade_steps: Self::fade_steps(config.initial_opacity, config.decay),
            config: config.clone(),
            spawned: 0,
        }
    }

    /// Advances until `initial` decays to zero at `decay` per step.
    ///
    /// Computed once instead of subtracting `decay` repeatedly, which drifts
    /// in f32 and can add or drop a frame.
    fn fade_steps(initial: f32, decay: f32) -> u32 {
        if decay <= 0.0 {
            return u32::MAX;
        }
        let steps = (initial as f64 / decay as f64 - 1e-6).ceil();
        steps.clamp(1.0, u32::MAX as f64) as u32
    }

    fn opacity_at(&self, age: u32) -> f32 {
        if age >= self.fade_steps {
            return 0.0;
        }
        let remaining = self.config.initial_opacity as f64 - self.config.decay as f64 * age as f64;
        remaining.max(0.0) as f32
    }

    /// Returns how many old clusters the cap pushed out to make room.
    pub fn spawn<R: Rng>(&mut self, origin: Vec3, now: f64, rng: &mut R) -> usize {
        let range = self.config.velocity_range;
        let component = |rng: &mut R| {
            if range > 0.0 {
                rng.random_range(-range..range)
            } else {
                0.0
            }
        };

        let particles = (0..self.config.per_cluster)
            .map(|_| {
                let velocity = Vec3::new(component(rng), component(rng), component(rng));
                let hue: f32 = rng.random();
                Particle {
                    position: origin,
                    velocity,
                    color: hsl_to_rgb(hue, 1.0, 0.5),
                    size: self.config.size,
                    opacity: self.config.initial_opacity,
                }
            })
            .collect();

        let mut evicted = 0;
        if let Some(cap) = self.config.max_clusters {
            if self.clusters.len() >= cap {
                evicted = self.clusters.len() + 1 - cap;
                self.clusters.drain(..evicted);
                trace!("cluster cap {} reached, retired {} oldest", cap, evicted);
            }
        }

        self.clusters.push(ParticleCluster {
            created_at: now,
            origin,
            particles,
            age: 0,
        });
        self.spawned += 1;
        evicted
    }

    /// One fixed step for every cluster; returns how many clusters retired.
    pub fn advance(&mut self) -> usize {
        let step = self.config.step_scale;
        for i in 0..self.clusters.len() {
            let age = self.clusters[i].age.saturating_add(1);
            let opacity = self.opacity_at(age);
            let cluster = &mut self.clusters[i];
            cluster.age = age;
            for particle in &mut cluster.particles {
                particle.position += particle.velocity * step;
                particle.opacity = opacity.min(particle.opacity);
            }
        }

        let before = self.clusters.len();
        self.clusters.retain(|cluster| !cluster.is_spent());
        before - self.clusters.len()
    }

    pub fn clusters(&self) -> &[ParticleCluster] {
        &self.clusters
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Total clusters spawned since creation, retired ones included.
    pub fn spawned(&self) -> u64 {
        self.spawned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn bursts() -> ParticleBursts {
        ParticleBursts::new(&ParticleConfig::default())
    }

    #[test]
    fn test_spawn_initial_state() {
        let mut bursts = bursts();
        let mut rng = StdRng::seed_from_u64(1);
        let origin = Vec3::new(-6.0, 0.0, 0.0);
        bursts.spawn(origin, 2.5, &mut rng);

        assert_eq!(bursts.len(), 1);
        let cluster = &bursts.clusters()[0];
        assert_eq!(cluster.created_at(), 2.5);
        assert_eq!(cluster.origin(), origin);
        assert_eq!(cluster.particles().len(), 2);
        for p in cluster.particles() {
            assert_eq!(p.position, origin);
            assert_eq!(p.opacity, 1.0);
            assert_eq!(p.size, 2.0);
            assert!(p.velocity.abs().max_element() <= 5.0);
            assert!(p.color.iter().all(|c| (0.0..=1.0).contains(c)));
        }
    }

    #[test]
    fn test_advance_moves_by_fixed_step() {
        let mut bursts = bursts();
        let mut rng = StdRng::seed_from_u64(2);
        bursts.spawn(Vec3::ZERO, 0.0, &mut rng);
        let velocity = bursts.clusters()[0].particles()[0].velocity;

        bursts.advance();
        let particle = &bursts.clusters()[0].particles()[0];
        assert!((particle.position - velocity * 0.1).length() < 1e-6);
        assert!((particle.opacity - 0.999).abs() < 1e-6);
    }

    #[test]
    fn test_retires_after_exactly_one_thousand_advances() {
        let mut bursts = bursts();
        let mut rng = StdRng::seed_from_u64(3);
        bursts.spawn(Vec3::ZERO, 0.0, &mut rng);

        for step in 1..1000 {
            assert_eq!(bursts.advance(), 0, "retired early at step {}", step);
            assert_eq!(bursts.len(), 1);
        }
        assert_eq!(bursts.advance(), 1);
        assert!(bursts.is_empty());
    }

    #[test]
    fn test_opacity_never_increases_and_retires_only_when_zero() {
        let config = ParticleConfig {
            decay: 0.037,
            per_cluster: 5,
            ..ParticleConfig::default()
        };
        let mut bursts = ParticleBursts::new(&config);
        let mut rng = StdRng::seed_from_u64(4);
        bursts.spawn(Vec3::ZERO, 0.0, &mut rng);

        let mut previous = vec![1.0f32; 5];
        loop {
            let snapshot: Vec<f32> = bursts.clusters()[0]
                .particles()
                .iter()
                .map(|p| p.opacity)
                .collect();
            bursts.advance();
            match bursts.clusters().first() {
                Some(cluster) => {
                    assert!(!cluster.is_spent());
                    for (p, before) in cluster.particles().iter().zip(&snapshot) {
                        assert!(p.opacity <= *before);
                        assert!(p.opacity >= 0.0);
                    }
                    previous = cluster.particles().iter().map(|p| p.opacity).collect();
                }
                None => break,
            }
        }
        // Last live frame had a small positive opacity
        assert!(previous.iter().all(|&o| o > 0.0 && o < 0.037 + 1e-6));
    }

    #[test]
    fn test_clusters_retire_independently() {
        let mut bursts = bursts();
        let mut rng = StdRng::seed_from_u64(5);
        bursts.spawn(Vec3::ZERO, 0.0, &mut rng);
        for _ in 0..500 {
            bursts.advance();
        }
        bursts.spawn(Vec3::X, 1.0, &mut rng);
        for _ in 0..500 {
            bursts.advance();
        }
        assert_eq!(bursts.len(), 1);
        assert_eq!(bursts.clusters()[0].created_at(), 1.0);
        assert_eq!(bursts.clusters()[0].age(), 500);
        assert_eq!(bursts.spawned(), 2);
    }

    #[test]
    fn test_same_seed_same_particles() {
        let mut a = bursts();
        let mut b = bursts();
        a.spawn(Vec3::ZERO, 0.0, &mut StdRng::seed_from_u64(9));
        b.spawn(Vec3::ZERO, 0.0, &mut StdRng::seed_from_u64(9));
        assert_eq!(a.clusters()[0].particles(), b.clusters()[0].particles());
    }

    #[test]
    fn test_cap_retires_oldest_first() {
        let config = ParticleConfig {
            max_clusters: Some(3),
            ..ParticleConfig::default()
        };
        let mut bursts = ParticleBursts::new(&config);
        let mut rng = StdRng::seed_from_u64(6);
        let evicted: Vec<usize> = (0..5)
            .map(|i| bursts.spawn(Vec3::ZERO, i as f64, &mut rng))
            .collect();
        assert_eq!(evicted, vec![0, 0, 0, 1, 1]);
        let created: Vec<f64> = bursts.clusters().iter().map(|c| c.created_at()).collect();
        assert_eq!(created, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_zero_velocity_range_is_allowed() {
        let config = ParticleConfig {
            velocity_range: 0.0,
            ..ParticleConfig::default()
        };
        let mut bursts = ParticleBursts::new(&config);
        bursts.spawn(Vec3::Y, 0.0, &mut StdRng::seed_from_u64(7));
        bursts.advance();
        assert_eq!(bursts.clusters()[0].particles()[0].position, Vec3::Y);
    }
}
