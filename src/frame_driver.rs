use anyhow::Result;
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::audio::{BeatDetector, SpectrumFrame, SpectrumSource};
use crate::config::VisualizerConfig;
use crate::effects::{BarField, ParticleBursts};
use crate::error::ConfigError;

/// Audio the frame driver can pull from: a spectrum plus "is it playing".
pub trait AudioInput: SpectrumSource {
    fn is_playing(&self) -> bool;
}

/// Receives the numeric scene once per frame. Drawing is entirely its business.
pub trait RenderTarget {
    fn render(&mut self, scene: &SceneState) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveMode {
    Reactive,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub mode: DriveMode,
    pub beat: bool,
    pub spawned: usize,
    pub retired: usize,
    pub active_clusters: usize,
}

/// Everything the renderer needs, owned by the driver and mutated only in `tick`.
#[derive(Debug, Clone)]
pub struct SceneState {
    pub bars: BarField,
    pub bursts: ParticleBursts,
    elapsed: f64,
    beat_count: u64,
}

impl SceneState {
    fn new(config: &VisualizerConfig) -> Self {
        Self {
            bars: BarField::new(&config.bars),
            bursts: ParticleBursts::new(&config.particles),
            elapsed: 0.0,
            beat_count: 0,
        }
    }

    /// Timestamp passed to the most recent tick, in seconds.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn beat_count(&self) -> u64 {
        self.beat_count
    }
}

/// Per-frame sequencing: spectrum, beat detection, bar mapping, particle
/// fan-out on beats, particle advance.
pub struct FrameDriver {
    scene: SceneState,
    detector: BeatDetector,
    spectrum: SpectrumFrame,
    rng: StdRng,
}

impl FrameDriver {
    pub fn new(config: &VisualizerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            scene: SceneState::new(config),
            detector: BeatDetector::new(&config.beat),
            spectrum: SpectrumFrame::new(config.spectrum.bins),
            rng,
        })
    }

    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    pub fn detector(&self) -> &BeatDetector {
        &self.detector
    }

    /// Advance the scene to `now` (seconds on one monotonic clock).
    pub fn tick<A: AudioInput + ?Sized>(&mut self, audio: &mut A, now: f64) -> FrameReport {
        self.scene.elapsed = now;

        let mut beat = false;
        let mut spawned = 0;
        let mut evicted = 0;
        let mode = if audio.is_playing() {
            audio.read_spectrum(&mut self.spectrum);
            self.scene.bars.apply_spectrum(&self.spectrum);

            beat = self.detector.update(&self.spectrum, now);
            if beat {
                for bar in self.scene.bars.bars() {
                    evicted += self.scene.bursts.spawn(bar.position(), now, &mut self.rng);
                }
                spawned = self.scene.bars.len();
                self.scene.beat_count += 1;
                debug!(
                    "beat #{} at {:.3}s, {} clusters active",
                    self.scene.beat_count,
                    now,
                    self.scene.bursts.len()
                );
            }
            DriveMode::Reactive
        } else {
            self.scene.bars.apply_idle(now);
            DriveMode::Idle
        };

        // Clusters pushed out by the cap count as retired this frame
        let retired = evicted + self.scene.bursts.advance();
        if retired > 0 {
            trace!("retired {} clusters", retired);
        }

        FrameReport {
            mode,
            beat,
            spawned,
            retired,
            active_clusters: self.scene.bursts.len(),
        }
    }

    /// `tick`, then hand the updated scene to `target`.
    pub fn frame<A, R>(&mut self, audio: &mut A, target: &mut R, now: f64) -> Result<FrameReport>
    where
        A: AudioInput + ?Sized,
        R: RenderTarget + ?Sized,
    {
        let report = self.tick(audio, now);
        target.render(&self.scene)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::playback::tests::{controller, test_track};
    use crate::config::ParticleConfig;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct ScriptedAudio {
        playing: bool,
        frames: VecDeque<Vec<f32>>,
        fallback: Vec<f32>,
    }

    impl ScriptedAudio {
        fn playing(fallback: f32) -> Self {
            Self {
                playing: true,
                frames: VecDeque::new(),
                fallback: vec![fallback; 64],
            }
        }

        fn silent_host() -> Self {
            Self {
                playing: false,
                ..Self::playing(0.0)
            }
        }
    }

    impl SpectrumSource for ScriptedAudio {
        fn read_spectrum(&mut self, frame: &mut SpectrumFrame) {
            let bins = self.frames.pop_front().unwrap_or_else(|| self.fallback.clone());
            *frame = SpectrumFrame::from(bins);
        }
    }

    impl AudioInput for ScriptedAudio {
        fn is_playing(&self) -> bool {
            self.playing
        }
    }

    #[derive(Default)]
    struct RecordingTarget {
        frames: usize,
        last_cluster_ages: Vec<u32>,
    }

    impl RenderTarget for RecordingTarget {
        fn render(&mut self, scene: &SceneState) -> Result<()> {
            self.frames += 1;
            self.last_cluster_ages = scene.bursts.clusters().iter().map(|c| c.age()).collect();
            Ok(())
        }
    }

    fn driver() -> FrameDriver {
        let config = VisualizerConfig {
            seed: Some(17),
            ..VisualizerConfig::default()
        };
        FrameDriver::new(&config).unwrap()
    }

    /// Fifteen quiet frames, then one frame with 100x the energy.
    fn drive_to_beat(driver: &mut FrameDriver, audio: &mut ScriptedAudio) -> FrameReport {
        let mut now = 1.0;
        for _ in 0..15 {
            driver.tick(audio, now);
            now += 1.0 / 60.0;
        }
        audio.frames.push_back(vec![10.0; 64]);
        driver.tick(audio, now)
    }

    #[test]
    fn test_rejects_spectrum_shorter_than_bars() {
        let mut config = VisualizerConfig::default();
        config.bars.count = 80;
        assert!(matches!(
            FrameDriver::new(&config),
            Err(ConfigError::SpectrumTooShort { bins: 64, bars: 80 })
        ));
    }

    #[test]
    fn test_idle_when_not_playing() {
        let mut driver = driver();
        let mut audio = ScriptedAudio::silent_host();
        let report = driver.tick(&mut audio, 4.2);

        assert_eq!(report.mode, DriveMode::Idle);
        assert!(!report.beat);
        assert!(driver.detector().history().is_empty());
        for bar in driver.scene().bars.bars() {
            let (height, hue) = driver.scene().bars.idle_state(bar.index(), 4.2);
            assert_eq!(bar.height(), height);
            assert_eq!(bar.hue(), hue);
        }
    }

    #[test]
    fn test_silence_for_twenty_frames() {
        let mut driver = driver();
        let mut audio = ScriptedAudio::playing(0.0);
        for frame in 0..20 {
            let report = driver.tick(&mut audio, 1.0 + frame as f64 / 60.0);
            assert_eq!(report.mode, DriveMode::Reactive);
            assert!(!report.beat);
        }
        assert!(driver.scene().bars.bars().iter().all(|b| b.height() == 28.0));
        assert!(driver.scene().bursts.is_empty());
    }

    #[test]
    fn test_beat_fans_out_one_cluster_per_bar() {
        let mut driver = driver();
        let mut audio = ScriptedAudio::playing(1.0);
        let report = drive_to_beat(&mut driver, &mut audio);

        assert!(report.beat);
        assert_eq!(report.spawned, 64);
        assert_eq!(report.active_clusters, 64);
        assert_eq!(driver.scene().beat_count(), 1);

        let bars = driver.scene().bars.bars();
        for (cluster, bar) in driver.scene().bursts.clusters().iter().zip(bars) {
            assert_eq!(cluster.origin(), bar.position());
            assert_eq!(cluster.age(), 1);
        }
    }

    #[test]
    fn test_refractory_frame_spawns_nothing() {
        let mut driver = driver();
        let mut audio = ScriptedAudio::playing(1.0);
        let first = drive_to_beat(&mut driver, &mut audio);
        let now = driver.scene().elapsed();

        audio.frames.push_back(vec![10.0; 64]);
        let second = driver.tick(&mut audio, now + 0.05);
        assert!(first.beat);
        assert!(!second.beat);
        assert_eq!(second.spawned, 0);
        assert_eq!(driver.scene().bursts.len(), 64);
    }

    #[test]
    fn test_particles_keep_fading_after_playback_stops() {
        let mut driver = driver();
        let mut audio = ScriptedAudio::playing(1.0);
        drive_to_beat(&mut driver, &mut audio);

        audio.playing = false;
        let mut now = 2.0;
        let mut last = FrameReport {
            mode: DriveMode::Idle,
            beat: false,
            spawned: 0,
            retired: 0,
            active_clusters: 64,
        };
        for _ in 0..999 {
            now += 1.0 / 60.0;
            last = driver.tick(&mut audio, now);
        }
        assert_eq!(last.mode, DriveMode::Idle);
        assert_eq!(last.retired, 64);
        assert!(driver.scene().bursts.is_empty());
    }

    #[test]
    fn test_capped_clusters_count_as_retired() {
        let config = VisualizerConfig {
            seed: Some(17),
            particles: ParticleConfig {
                max_clusters: Some(100),
                ..ParticleConfig::default()
            },
            ..VisualizerConfig::default()
        };
        let mut driver = FrameDriver::new(&config).unwrap();
        let mut audio = ScriptedAudio::playing(1.0);
        let first = drive_to_beat(&mut driver, &mut audio);
        assert_eq!(first.retired, 0);

        let now = driver.scene().elapsed();
        audio.frames.push_back(vec![10.0; 64]);
        let second = driver.tick(&mut audio, now + 0.3);
        assert!(second.beat);
        assert_eq!(second.spawned, 64);
        assert_eq!(second.retired, 28);
        assert_eq!(second.active_clusters, 100);
    }

    #[test]
    fn test_frame_renders_advanced_scene() {
        let mut driver = driver();
        let mut audio = ScriptedAudio::playing(1.0);
        drive_to_beat(&mut driver, &mut audio);

        let mut target = RecordingTarget::default();
        driver.frame(&mut audio, &mut target, 3.0).unwrap();
        assert_eq!(target.frames, 1);
        assert_eq!(target.last_cluster_ages, vec![2; 64]);
    }

    #[test]
    fn test_same_seed_same_scene() {
        let mut a = driver();
        let mut b = driver();
        drive_to_beat(&mut a, &mut ScriptedAudio::playing(1.0));
        drive_to_beat(&mut b, &mut ScriptedAudio::playing(1.0));

        for (x, y) in a.scene().bursts.clusters().iter().zip(b.scene().bursts.clusters()) {
            assert_eq!(x.particles(), y.particles());
        }
    }

    #[test]
    fn test_follows_playback_controller_state() {
        let mut driver = driver();
        let (mut playback, counters) = controller();

        assert_eq!(driver.tick(&mut playback, 0.5).mode, DriveMode::Idle);

        playback.load_decoded(test_track(2.0));
        counters.position.set(Duration::from_millis(250));
        assert_eq!(driver.tick(&mut playback, 0.6).mode, DriveMode::Reactive);

        playback.stop();
        assert_eq!(driver.tick(&mut playback, 0.7).mode, DriveMode::Idle);

        playback.start().unwrap();
        counters.finished.set(true);
        playback.poll();
        assert_eq!(driver.tick(&mut playback, 0.8).mode, DriveMode::Idle);
    }
}
