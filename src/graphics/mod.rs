pub mod engine;
pub mod mesh;
pub mod orbit;
pub mod shader;
pub mod texture;
pub mod vertex;

pub use engine::GraphicsEngine;
pub use mesh::{build_scene_mesh, Camera, MeshLayout};
pub use orbit::OrbitControls;
pub use shader::{PipelineOptions, ShaderManager};
pub use texture::{DepthTexture, DEPTH_FORMAT};
pub use vertex::{Vertex, VertexBuffer};
