use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};

use beatfield::audio::{decode_track, track_title, DecodedTrack, FftAnalyser, SpectrumFrame, SpectrumSource};
use beatfield::{AudioInput, FrameDriver, RenderTarget, SceneState, VisualizerConfig};

#[derive(Parser)]
#[command(name = "beat-trace")]
#[command(about = "Run the visualizer pipeline offline and report beats as JSON")]
struct Args {
    /// Audio file to trace (MP3, WAV, M4A, OGG, etc.)
    #[arg()]
    input_file: PathBuf,

    /// Output JSON report
    #[arg(short, long, default_value = "beat_trace.json")]
    output: PathBuf,

    /// Simulated display refresh rate
    #[arg(long, default_value = "60")]
    fps: f64,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for particle randomness (fixed so reports are reproducible)
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Include per-frame bar heights in the report
    #[arg(long)]
    frames: bool,
}

/// Decoded track played back against a virtual clock instead of a sound card.
struct OfflineAudio {
    track: DecodedTrack,
    analyser: FftAnalyser,
    playhead: usize,
}

impl OfflineAudio {
    fn new(track: DecodedTrack, config: &VisualizerConfig) -> Self {
        Self {
            track,
            analyser: FftAnalyser::new(&config.spectrum),
            playhead: 0,
        }
    }

    fn seek(&mut self, seconds: f64) {
        self.playhead = (seconds * self.track.sample_rate as f64) as usize;
    }
}

impl SpectrumSource for OfflineAudio {
    fn read_spectrum(&mut self, frame: &mut SpectrumFrame) {
        if self.is_playing() {
            self.analyser.analyse(&self.track.mono, self.playhead, frame);
        } else {
            self.analyser.silence(frame);
        }
    }
}

impl AudioInput for OfflineAudio {
    fn is_playing(&self) -> bool {
        self.playhead < self.track.mono.len()
    }
}

#[derive(Debug, Serialize)]
struct FrameTrace {
    frame: usize,
    timestamp: f64,
    heights: Vec<f32>,
    active_clusters: usize,
}

/// Render target that only takes notes.
struct TraceTarget {
    record_heights: bool,
    frame: usize,
    frames: Vec<FrameTrace>,
}

impl RenderTarget for TraceTarget {
    fn render(&mut self, scene: &SceneState) -> Result<()> {
        if self.record_heights {
            self.frames.push(FrameTrace {
                frame: self.frame,
                timestamp: scene.elapsed(),
                heights: scene.bars.bars().iter().map(|b| b.height()).collect(),
                active_clusters: scene.bursts.len(),
            });
        }
        self.frame += 1;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct FileInfo {
    path: String,
    title: String,
    sample_rate: u32,
    channels: u16,
    duration_seconds: f64,
}

#[derive(Debug, Serialize)]
struct BeatEvent {
    frame: usize,
    timestamp: f64,
}

#[derive(Debug, Serialize)]
struct TraceReport {
    file_info: FileInfo,
    frame_rate: f64,
    total_frames: usize,
    total_beats: usize,
    beats: Vec<BeatEvent>,
    peak_active_clusters: usize,
    clusters_spawned: u64,
    config: VisualizerConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    frames: Option<Vec<FrameTrace>>,
}

fn trace(audio: &mut OfflineAudio, config: &VisualizerConfig, fps: f64, record_heights: bool) -> Result<TraceReport> {
    let mut driver = FrameDriver::new(config)?;
    let mut target = TraceTarget {
        record_heights,
        frame: 0,
        frames: Vec::new(),
    };

    let duration = audio.track.duration().as_secs_f64();
    let total_frames = (duration * fps).ceil() as usize;
    let mut beats = Vec::new();
    let mut peak_active_clusters = 0;

    for frame in 0..total_frames {
        let now = frame as f64 / fps;
        audio.seek(now);
        let report = driver.frame(audio, &mut target, now)?;

        if report.beat {
            beats.push(BeatEvent { frame, timestamp: now });
        }
        peak_active_clusters = peak_active_clusters.max(report.active_clusters);

        if frame > 0 && frame % 1000 == 0 {
            info!("Traced {} frames ({:.1}s of {:.1}s)", frame, now, duration);
        }
    }

    Ok(TraceReport {
        file_info: FileInfo {
            path: String::new(),
            title: audio.track.title.clone(),
            sample_rate: audio.track.sample_rate,
            channels: audio.track.channels,
            duration_seconds: duration,
        },
        frame_rate: fps,
        total_frames,
        total_beats: beats.len(),
        beats,
        peak_active_clusters,
        clusters_spawned: driver.scene().bursts.spawned(),
        config: config.clone(),
        frames: record_heights.then_some(target.frames),
    })
}

fn load_config(path: Option<&Path>, seed: u64) -> Result<VisualizerConfig> {
    let mut config = match path {
        Some(path) => VisualizerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => VisualizerConfig::default(),
    };
    config.seed = Some(seed);
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if !args.fps.is_finite() || args.fps <= 0.0 {
        anyhow::bail!("--fps must be positive, got {}", args.fps);
    }

    info!("Beat trace");
    info!("Input file: {}", args.input_file.display());
    info!("Output file: {}", args.output.display());

    let config = load_config(args.config.as_deref(), args.seed)?;

    let bytes = std::fs::read(&args.input_file)
        .with_context(|| format!("Cannot read {}", args.input_file.display()))?;
    let track = decode_track(&track_title(&args.input_file), bytes)?;
    info!(
        "Decoded {} samples at {}Hz ({:.2}s)",
        track.mono.len(),
        track.sample_rate,
        track.duration().as_secs_f64()
    );

    let mut audio = OfflineAudio::new(track, &config);
    let mut report = trace(&mut audio, &config, args.fps, args.frames)?;
    report.file_info.path = args.input_file.display().to_string();

    info!("Total frames: {}", report.total_frames);
    info!("Beats detected: {}", report.total_beats);
    info!("Peak active clusters: {}", report.peak_active_clusters);

    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&args.output, json)
        .with_context(|| format!("Cannot write {}", args.output.display()))?;
    info!("Report saved to {}", args.output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Quiet hum with a loud click every half second.
    fn clicks(seconds: f64, sample_rate: u32) -> DecodedTrack {
        let total = (seconds * sample_rate as f64) as usize;
        let period = sample_rate as usize / 2;
        let samples = (0..total)
            .map(|n| {
                let hum = 0.01 * (n as f32 * 0.05).sin();
                if n % period < 256 && n >= period {
                    hum + 0.9 * if n % 2 == 0 { 1.0 } else { -1.0 }
                } else {
                    hum
                }
            })
            .collect();
        DecodedTrack::from_interleaved("clicks.wav", sample_rate, 1, samples)
    }

    fn config() -> VisualizerConfig {
        load_config(None, 7).unwrap()
    }

    #[test]
    fn test_offline_audio_stops_at_track_end() {
        let config = config();
        let mut audio = OfflineAudio::new(clicks(1.0, 8000), &config);
        assert!(audio.is_playing());
        audio.seek(1.0);
        assert!(!audio.is_playing());

        let mut frame = SpectrumFrame::default();
        audio.read_spectrum(&mut frame);
        assert!(frame.bins().iter().all(|&b| b == config.spectrum.min_decibels));
    }

    #[test]
    fn test_trace_counts_frames_and_respects_interval() {
        let config = config();
        let mut audio = OfflineAudio::new(clicks(3.0, 8000), &config);
        let report = trace(&mut audio, &config, 60.0, true).unwrap();

        assert_eq!(report.total_frames, 180);
        assert_eq!(report.frames.as_ref().map(Vec::len), Some(180));
        assert_eq!(report.clusters_spawned as usize, report.total_beats * 64);
        for pair in report.beats.windows(2) {
            assert!(pair[1].timestamp - pair[0].timestamp >= config.beat.interval);
        }
    }

    #[test]
    fn test_report_omits_frames_unless_requested() {
        let config = config();
        let mut audio = OfflineAudio::new(clicks(0.5, 8000), &config);
        let report = trace(&mut audio, &config, 30.0, false).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("frames").is_none());
        assert_eq!(json["total_frames"], 15);
    }
}
