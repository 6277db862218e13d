use anyhow::Result;
use log::warn;
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::window::Window;

use super::{
    build_scene_mesh, Camera, DepthTexture, OrbitControls, PipelineOptions, ShaderManager, Vertex,
    VertexBuffer,
};
use crate::config::CameraConfig;
use crate::frame_driver::SceneState;

const BAR_PIPELINE: &str = "bars";
const PARTICLE_PIPELINE: &str = "particles";

pub struct GraphicsEngine {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,

    pub shader_manager: ShaderManager,
    depth: DepthTexture,
    camera: Camera,
    controls: OrbitControls,

    pub uniform_buffer: wgpu::Buffer,
    pub uniform_bind_group: wgpu::BindGroup,

    pub vertex_buffer: VertexBuffer,
    scratch: Vec<Vertex>,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Uniforms {
    pub view_proj: [[f32; 4]; 4],
}

impl Uniforms {
    fn from_camera(camera: &Camera) -> Self {
        Self {
            view_proj: camera.view_proj().to_cols_array_2d(),
        }
    }
}

fn aspect_of(size: winit::dpi::PhysicalSize<u32>) -> f32 {
    size.width.max(1) as f32 / size.height.max(1) as f32
}

impl GraphicsEngine {
    pub async fn new(window: Arc<Window>, camera_config: &CameraConfig) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("Failed to find an appropriate adapter"))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    label: None,
                },
                None,
            )
            .await?;

        // HSL colours are already display-space values, as is egui's output.
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("Surface reports no supported formats"))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &config);
        let depth = DepthTexture::new(&device, &config);

        let uniform_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("uniform_bind_group_layout"),
        });

        let camera = Camera::new(aspect_of(size));
        let controls = OrbitControls::new(&camera, camera_config);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: bytemuck::cast_slice(&[Uniforms::from_camera(&camera)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("uniform_bind_group"),
        });

        let mut shader_manager = ShaderManager::new();
        shader_manager.load_shader(&device, "scene", include_str!("../../shaders/scene.wgsl"))?;
        shader_manager.create_pipeline(
            &device,
            BAR_PIPELINE,
            "scene",
            surface_format,
            &uniform_bind_group_layout,
            PipelineOptions::OPAQUE,
        )?;
        shader_manager.create_pipeline(
            &device,
            PARTICLE_PIPELINE,
            "scene",
            surface_format,
            &uniform_bind_group_layout,
            PipelineOptions::TRANSLUCENT,
        )?;

        let vertex_buffer = VertexBuffer::new(&device, 4096);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            shader_manager,
            depth,
            camera,
            controls,
            uniform_buffer,
            uniform_bind_group,
            vertex_buffer,
            scratch: Vec::new(),
        })
    }

    pub fn controls_mut(&mut self) -> &mut OrbitControls {
        &mut self.controls
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.depth = DepthTexture::new(&self.device, &self.config);
            self.camera.aspect = aspect_of(new_size);
        }
    }

    // `overlay` records into the scene's encoder before the frame is presented
    pub fn render<F>(&mut self, scene: &SceneState, overlay: F) -> Result<()>
    where
        F: FnOnce(&mut wgpu::CommandEncoder, &wgpu::TextureView, &wgpu::Device, &wgpu::Queue) -> Result<()>,
    {
        self.controls.update();
        self.controls.apply(&mut self.camera);

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("Surface timed out, skipping frame");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        self.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::cast_slice(&[Uniforms::from_camera(&self.camera)]),
        );

        let layout = build_scene_mesh(scene, &self.camera, &mut self.scratch);
        self.vertex_buffer.update(&self.device, &self.queue, &self.scratch);

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.buffer.slice(..));

            let bars_end = layout.bar_vertices;
            let particles_end = bars_end + layout.particle_vertices;

            if let Some(pipeline) = self.shader_manager.get_pipeline(BAR_PIPELINE) {
                if bars_end > 0 {
                    render_pass.set_pipeline(pipeline);
                    render_pass.draw(0..bars_end, 0..1);
                }
            }
            if let Some(pipeline) = self.shader_manager.get_pipeline(PARTICLE_PIPELINE) {
                if particles_end > bars_end {
                    render_pass.set_pipeline(pipeline);
                    render_pass.draw(bars_end..particles_end, 0..1);
                }
            }
        }

        overlay(&mut encoder, &view, &self.device, &self.queue)?;

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
