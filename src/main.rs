use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use rfd::FileDialog;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowBuilder},
};

use beatfield::audio::{PlaybackController, PlaybackEvent, RodioBackend, Toggle};
use beatfield::graphics::GraphicsEngine;
use beatfield::ui::{UiAction, UiModel, UserInterface};
use beatfield::{FrameDriver, RenderTarget, SceneState, VisualizerConfig};

#[derive(Parser)]
#[command(name = "beatfield")]
#[command(about = "Audio-reactive bar field with beat-triggered particle bursts")]
struct Args {
    /// Audio file to load on startup
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for particle randomness
    #[arg(long)]
    seed: Option<u64>,

    /// Number of bars (must not exceed the spectrum bin count)
    #[arg(long)]
    bars: Option<usize>,
}

fn load_config(args: &Args) -> Result<VisualizerConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let config = VisualizerConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            info!("Loaded config from {}", path.display());
            config
        }
        None => VisualizerConfig::default(),
    };

    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(bars) = args.bars {
        config.bars.count = bars;
    }

    config.validate()?;
    Ok(config)
}

fn pick_audio_file() -> Option<PathBuf> {
    FileDialog::new()
        .add_filter("Audio", &["mp3", "wav", "ogg", "flac", "m4a", "aac"])
        .set_title("Select an audio file")
        .pick_file()
}

// Wheel notches, with trackpad pixels scaled to roughly match
fn scroll_notches(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y,
        MouseScrollDelta::PixelDelta(position) => position.y as f32 / 50.0,
    }
}

/// The window as the frame driver sees it: scene pass plus overlay.
struct WindowTarget<'a> {
    engine: &'a mut GraphicsEngine,
    ui: &'a mut UserInterface,
    window: &'a Window,
    model: &'a mut UiModel,
}

impl RenderTarget for WindowTarget<'_> {
    fn render(&mut self, scene: &SceneState) -> Result<()> {
        self.model.active_clusters = scene.bursts.len();
        self.model.beat_count = scene.beat_count();

        let ui = &mut *self.ui;
        let window = self.window;
        let model = &*self.model;
        self.engine.render(scene, |encoder, view, device, queue| {
            ui.render(encoder, view, device, queue, window, model)
        })
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = load_config(&args)?;
    info!("Starting Beatfield ({} bars)", config.bars.count);

    let event_loop = EventLoop::new()?;
    let window = Arc::new(WindowBuilder::new()
        .with_title("Beatfield")
        .with_inner_size(winit::dpi::LogicalSize::new(1200, 800))
        .build(&event_loop)?);

    let mut graphics_engine =
        pollster::block_on(GraphicsEngine::new(Arc::clone(&window), &config.camera))?;
    let mut ui = UserInterface::new(&window, &graphics_engine);
    let mut playback = PlaybackController::new(RodioBackend::new()?, &config);
    let mut driver = FrameDriver::new(&config)?;

    let mut model = UiModel {
        title: playback.title().to_string(),
        state: playback.state(),
        decoding: false,
        status: None,
        active_clusters: 0,
        beat_count: 0,
    };

    if let Some(path) = args.file {
        apply_action(UiAction::Load(path), &mut playback, &mut model);
    }

    info!("Visualizer initialized successfully");

    let clock = Instant::now();
    let mut orbiting = false;
    let mut cursor: Option<PhysicalPosition<f64>> = None;
    let window_clone = Arc::clone(&window);
    event_loop.run(move |event, elwt| {
        match event {
            Event::WindowEvent { event, .. } => {
                let consumed = ui.handle_event(&event, &window_clone);

                match event {
                    WindowEvent::CloseRequested => {
                        info!("Close requested");
                        elwt.exit();
                    }
                    WindowEvent::KeyboardInput { event, .. }
                        if !consumed
                            && !ui.wants_keyboard()
                            && event.state == ElementState::Pressed
                            && !event.repeat =>
                    {
                        match event.physical_key {
                            PhysicalKey::Code(KeyCode::Escape) => {
                                info!("Escape pressed");
                                elwt.exit();
                            }
                            PhysicalKey::Code(KeyCode::Space) => {
                                apply_action(UiAction::TogglePlayback, &mut playback, &mut model);
                            }
                            PhysicalKey::Code(KeyCode::Delete) => {
                                apply_action(UiAction::Delete, &mut playback, &mut model);
                            }
                            _ => {}
                        }
                    }
                    WindowEvent::MouseInput {
                        state,
                        button: MouseButton::Left,
                        ..
                    } => {
                        orbiting = state == ElementState::Pressed && !consumed;
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        if let Some(last) = cursor.replace(position) {
                            if orbiting {
                                let height = window_clone.inner_size().height as f32;
                                graphics_engine.controls_mut().drag(
                                    (position.x - last.x) as f32,
                                    (position.y - last.y) as f32,
                                    height,
                                );
                            }
                        }
                    }
                    WindowEvent::CursorLeft { .. } => {
                        cursor = None;
                    }
                    WindowEvent::MouseWheel { delta, .. } if !consumed => {
                        graphics_engine.controls_mut().zoom(scroll_notches(delta));
                    }
                    WindowEvent::DroppedFile(path) => {
                        apply_action(UiAction::Load(path), &mut playback, &mut model);
                    }
                    WindowEvent::Resized(physical_size) => {
                        graphics_engine.resize(physical_size);
                    }
                    WindowEvent::RedrawRequested => {
                        playback.poll();
                        for event in playback.drain_events() {
                            apply_event(&event, &mut model);
                        }
                        model.title = playback.title().to_string();
                        model.state = playback.state();
                        model.decoding = playback.is_decoding();

                        let mut target = WindowTarget {
                            engine: &mut graphics_engine,
                            ui: &mut ui,
                            window: &window_clone,
                            model: &mut model,
                        };
                        let now = clock.elapsed().as_secs_f64();
                        if let Err(e) = driver.frame(&mut playback, &mut target, now) {
                            error!("Render error: {:#}", e);
                        }

                        for action in ui.take_actions() {
                            apply_action(action, &mut playback, &mut model);
                        }
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => {
                window_clone.request_redraw();
            }
            _ => {}
        }
    })?;

    Ok(())
}

fn apply_action(action: UiAction, playback: &mut PlaybackController<RodioBackend>, model: &mut UiModel) {
    match action {
        UiAction::TogglePlayback => match playback.toggle() {
            Ok(Toggle::NoTrack) if playback.is_decoding() => {}
            Ok(Toggle::NoTrack) => {
                if let Some(path) = pick_audio_file() {
                    playback.load_file(path);
                }
                model.status = None;
            }
            Ok(_) => model.status = None,
            Err(e) => {
                warn!("Playback error: {}", e);
                model.status = Some(e.to_string());
            }
        },
        UiAction::Delete => {
            playback.delete();
            model.status = None;
        }
        UiAction::ChooseFile => {
            if let Some(path) = pick_audio_file() {
                playback.load_file(path);
                model.status = None;
            }
        }
        UiAction::Load(path) => {
            playback.load_file(path);
            model.status = None;
        }
    }
    model.title = playback.title().to_string();
    model.state = playback.state();
    model.decoding = playback.is_decoding();
}

fn apply_event(event: &PlaybackEvent, model: &mut UiModel) {
    match event {
        PlaybackEvent::DecodeFailed { title, reason } => {
            model.status = Some(format!("Could not decode {}: {}", title, reason));
        }
        PlaybackEvent::StartFailed { reason } => {
            model.status = Some(format!("Could not start playback: {}", reason));
        }
        PlaybackEvent::Loaded { .. } | PlaybackEvent::Disposed => {
            model.status = None;
        }
        PlaybackEvent::Started | PlaybackEvent::Stopped | PlaybackEvent::Ended => {}
    }
}
