use anyhow::Result;
use std::collections::HashMap;
use wgpu::{Device, RenderPipeline, ShaderModule};

use super::texture::DEPTH_FORMAT;

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub blend: Option<wgpu::BlendState>,
    pub depth_write: bool,
    pub cull_mode: Option<wgpu::Face>,
}

impl PipelineOptions {
    pub const OPAQUE: Self = Self {
        blend: Some(wgpu::BlendState::REPLACE),
        depth_write: true,
        cull_mode: Some(wgpu::Face::Back),
    };

    // Depth-tested but not depth-written so overlapping sprites all blend
    pub const TRANSLUCENT: Self = Self {
        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
        depth_write: false,
        cull_mode: None,
    };
}

pub struct ShaderManager {
    shaders: HashMap<String, ShaderModule>,
    pipelines: HashMap<String, RenderPipeline>,
}

impl ShaderManager {
    pub fn new() -> Self {
        Self {
            shaders: HashMap::new(),
            pipelines: HashMap::new(),
        }
    }

    pub fn load_shader(&mut self, device: &Device, name: &str, source: &str) -> Result<()> {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        self.shaders.insert(name.to_string(), shader);
        Ok(())
    }

    pub fn create_pipeline(
        &mut self,
        device: &Device,
        name: &str,
        shader_name: &str,
        format: wgpu::TextureFormat,
        bind_group_layout: &wgpu::BindGroupLayout,
        options: PipelineOptions,
    ) -> Result<()> {
        let shader = self.shaders.get(shader_name)
            .ok_or_else(|| anyhow::anyhow!("Shader '{}' not found", shader_name))?;

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{} Pipeline Layout", name)),
            bind_group_layouts: &[bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{} Pipeline", name)),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: "vs_main",
                buffers: &[crate::graphics::Vertex::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: options.blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: options.cull_mode,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: options.depth_write,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        self.pipelines.insert(name.to_string(), pipeline);
        Ok(())
    }

    pub fn get_pipeline(&self, name: &str) -> Option<&RenderPipeline> {
        self.pipelines.get(name)
    }
}
