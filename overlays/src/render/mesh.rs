use std::rc::Rc;

use bytemuck::{Pod, Zeroable};

use super::material::{BindContext, Material};
use crate::sort::LightmapPage;

/// Vertex layout streamed to the draw backend.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct OverlayVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [u8; 4],
    pub tex0: [f32; 2],
    pub tex1: [f32; 2],
    pub tex2: [f32; 2],
}

/// Triangle-fan geometry for one batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverlayMesh {
    pub vertices: Vec<OverlayVertex>,
    pub indices: Vec<u16>,
}

impl OverlayMesh {
    /// Raw vertex bytes, ready for a buffer upload.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Accumulates polygons into an [`OverlayMesh`].
pub struct MeshBuilder {
    mesh: OverlayMesh,
}

impl MeshBuilder {
    /// Builder with room for `vertex_count` vertices and `index_count` indices.
    pub fn with_capacity(vertex_count: usize, index_count: usize) -> Self {
        Self {
            mesh: OverlayMesh {
                vertices: Vec::with_capacity(vertex_count),
                indices: Vec::with_capacity(index_count),
            },
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.mesh.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mesh.vertices.is_empty()
    }

    /// Append one convex polygon and its fan indices.
    pub fn push_fan(&mut self, vertices: impl IntoIterator<Item = OverlayVertex>) {
        let first = self.mesh.vertices.len();
        self.mesh.vertices.extend(vertices);
        let count = self.mesh.vertices.len() - first;
        assert!(
            self.mesh.vertices.len() <= usize::from(u16::MAX),
            "overlay batch exceeds 16-bit vertex indices"
        );

        let first = first as u16;
        for i in 1..count.saturating_sub(1) as u16 {
            self.mesh
                .indices
                .extend_from_slice(&[first, first + i, first + i + 1]);
        }
    }

    pub fn finish(self) -> OverlayMesh {
        self.mesh
    }
}

/// Everything the backend needs to bind before drawing a batch.
#[derive(Clone, Debug)]
pub struct DrawState {
    pub material: Rc<Material>,
    pub lightmap_page: LightmapPage,
    pub bind_context: Option<Rc<dyn BindContext>>,
    pub wireframe: bool,
}

/// External material/draw API.
pub trait DrawBackend {
    /// Bind the material, lightmap page and proxy context for the next draws.
    fn bind(&mut self, state: &DrawState);

    /// Draw a triangle-fan mesh with the currently bound state.
    fn draw_mesh(&mut self, mesh: &OverlayMesh);
}
