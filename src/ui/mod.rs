use anyhow::Result;
use egui_wgpu::Renderer;
use egui_winit::State;
use std::path::PathBuf;
use wgpu::{CommandEncoder, Device, Queue, TextureView};
use winit::{event::WindowEvent, window::Window};

use crate::audio::PlaybackState;
use crate::graphics::GraphicsEngine;

/// Requests raised by the overlay, applied by the host after the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    TogglePlayback,
    Delete,
    ChooseFile,
    Load(PathBuf),
}

/// What the overlay shows this frame.
#[derive(Debug, Clone)]
pub struct UiModel {
    pub title: String,
    pub state: PlaybackState,
    /// A new track is being decoded; any current one keeps playing meanwhile
    pub decoding: bool,
    pub status: Option<String>,
    pub active_clusters: usize,
    pub beat_count: u64,
}

impl UiModel {
    /// Label of the single play/stop control.
    pub fn toggle_label(&self) -> &'static str {
        match self.state {
            PlaybackState::Playing => "Stop",
            _ => "Play",
        }
    }

    /// Play stays clickable without a track so the host can ask for a file.
    pub fn can_toggle(&self) -> bool {
        self.state != PlaybackState::Decoding
    }

    pub fn can_delete(&self) -> bool {
        matches!(
            self.state,
            PlaybackState::Ready | PlaybackState::Playing | PlaybackState::Stopped
        )
    }
}

pub struct UserInterface {
    context: egui::Context,
    state: State,
    renderer: Renderer,
    show_controls: bool,
    actions: Vec<UiAction>,
}

impl UserInterface {
    pub fn new(window: &Window, graphics_engine: &GraphicsEngine) -> Self {
        let context = egui::Context::default();

        let egui_state = State::new(
            context.clone(),
            egui::ViewportId::ROOT,
            window,
            None,
            None,
        );

        let renderer = Renderer::new(
            &graphics_engine.device,
            graphics_engine.config.format,
            None,
            1,
        );

        Self {
            context,
            state: egui_state,
            renderer,
            show_controls: true,
            actions: Vec::new(),
        }
    }

    /// Returns true when egui consumed the event.
    pub fn handle_event(&mut self, event: &WindowEvent, window: &Window) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    pub fn wants_keyboard(&self) -> bool {
        self.context.wants_keyboard_input()
    }

    pub fn take_actions(&mut self) -> Vec<UiAction> {
        std::mem::take(&mut self.actions)
    }

    pub fn render(
        &mut self,
        encoder: &mut CommandEncoder,
        target: &TextureView,
        device: &Device,
        queue: &Queue,
        window: &Window,
        model: &UiModel,
    ) -> Result<()> {
        let raw_input = self.state.take_egui_input(window);

        let show_controls = &mut self.show_controls;
        let actions = &mut self.actions;

        let full_output = self.context.run(raw_input, |ctx| {
            Self::ui_content(ctx, model, show_controls, actions);
        });

        self.state.handle_platform_output(window, full_output.platform_output);

        let tris = self.context.tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, image_delta);
        }

        let size = window.inner_size();
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [size.width.max(1), size.height.max(1)],
            pixels_per_point: full_output.pixels_per_point,
        };

        let callback_buffers = self.renderer.update_buffers(device, queue, encoder, &tris, &screen_descriptor);
        if !callback_buffers.is_empty() {
            queue.submit(callback_buffers);
        }

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            self.renderer.render(&mut render_pass, &tris, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.renderer.free_texture(id);
        }

        Ok(())
    }

    fn ui_content(
        ctx: &egui::Context,
        model: &UiModel,
        show_controls: &mut bool,
        actions: &mut Vec<UiAction>,
    ) {
        if *show_controls {
            egui::Window::new("Beatfield")
                .default_pos([10.0, 10.0])
                .default_size([320.0, 160.0])
                .show(ctx, |ui| {
                    ui.heading(&model.title);
                    if model.decoding {
                        ui.label("Decoding…");
                    }
                    if let Some(status) = &model.status {
                        ui.colored_label(egui::Color32::LIGHT_RED, status);
                    }

                    ui.separator();

                    ui.horizontal(|ui| {
                        let toggle = ui.add_enabled(model.can_toggle(), egui::Button::new(model.toggle_label()));
                        if toggle.clicked() {
                            actions.push(UiAction::TogglePlayback);
                        }
                        let delete = ui.add_enabled(model.can_delete(), egui::Button::new("Delete"));
                        if delete.clicked() {
                            actions.push(UiAction::Delete);
                        }
                        if ui.button("Choose file…").clicked() {
                            actions.push(UiAction::ChooseFile);
                        }
                    });

                    ui.separator();

                    ui.label(format!(
                        "Beats: {}   Bursts: {}",
                        model.beat_count, model.active_clusters
                    ));
                    ui.label("Drop a file to load · Drag to orbit · Space play/stop · F1 hide · Esc exit");
                });
        }

        if ctx.input(|i| i.key_pressed(egui::Key::F1)) {
            *show_controls = !*show_controls;
        }
    }
}
