#![allow(dead_code)]

use std::collections::HashMap;
use std::rc::Rc;

use overlays::{
    BindContext, DisplacementSurface, DrawBackend, DrawState, GridDisplacement, LightmapPage,
    Material, OverlayMesh, Plane, SurfaceGeometry, SurfaceHandle, Vec2, Vec3, WorldGeometry,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct TestSurface {
    vertices: Vec<Vec3>,
    plane: Plane,
    lightmap_page: LightmapPage,
    lightmap_offset: f32,
}

/// In-memory level: a list of convex surfaces, some of them displaced.
#[derive(Default)]
pub struct TestWorld {
    materials: HashMap<i16, Rc<Material>>,
    surfaces: Vec<TestSurface>,
    displacements: HashMap<SurfaceHandle, GridDisplacement>,
}

impl TestWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_material(&mut self, tex_info: i16, material: Material) -> Rc<Material> {
        let material = Rc::new(material);
        self.materials.insert(tex_info, Rc::clone(&material));
        material
    }

    pub fn remove_material(&mut self, tex_info: i16) {
        self.materials.remove(&tex_info);
    }

    pub fn add_surface(&mut self, vertices: Vec<Vec3>, lightmap_page: LightmapPage) -> SurfaceHandle {
        let plane = Plane::from_points(vertices[0], vertices[1], vertices[2])
            .expect("test surface must not be degenerate");
        let handle = SurfaceHandle(self.surfaces.len() as u32);
        self.surfaces.push(TestSurface {
            vertices,
            plane,
            lightmap_page,
            lightmap_offset: 0.25 * lightmap_page as f32,
        });
        handle
    }

    pub fn add_displacement(&mut self, disp: GridDisplacement, lightmap_page: LightmapPage) -> SurfaceHandle {
        let handle = self.add_surface(disp.corners().to_vec(), lightmap_page);
        self.displacements.insert(handle, disp);
        handle
    }
}

impl WorldGeometry for TestWorld {
    fn material_for_tex_info(&self, tex_info: i16) -> Option<Rc<Material>> {
        self.materials.get(&tex_info).cloned()
    }

    fn surface(&self, surface: SurfaceHandle) -> Option<SurfaceGeometry<'_>> {
        let s = self.surfaces.get(surface.0 as usize)?;
        Some(SurfaceGeometry {
            vertices: &s.vertices,
            plane: s.plane,
            lightmap_page: s.lightmap_page,
            lightmap_offset: s.lightmap_offset,
        })
    }

    fn displacement(&self, surface: SurfaceHandle) -> Option<&dyn DisplacementSurface> {
        self.displacements
            .get(&surface)
            .map(|d| d as &dyn DisplacementSurface)
    }

    fn lightmap_coord(&self, _surface: SurfaceHandle, pos: Vec3) -> Vec2 {
        pos.truncate() / 16.0
    }
}

/// Axis-aligned square in the `z` plane, counter-clockwise seen from +Z.
pub fn square(min: f32, max: f32, z: f32) -> Vec<Vec3> {
    vec![
        Vec3::new(min, min, z),
        Vec3::new(max, min, z),
        Vec3::new(max, max, z),
        Vec3::new(min, max, z),
    ]
}

#[derive(Debug)]
pub struct TestContext(pub u32);

impl BindContext for TestContext {}

#[derive(Debug, Clone)]
pub enum Call {
    Bind(DrawState),
    Draw(OverlayMesh),
}

/// Draw backend that records every call.
#[derive(Default)]
pub struct RecordingBackend {
    pub calls: Vec<Call>,
}

impl RecordingBackend {
    pub fn binds(&self) -> Vec<&DrawState> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Bind(state) => Some(state),
                Call::Draw(_) => None,
            })
            .collect()
    }

    pub fn meshes(&self) -> Vec<&OverlayMesh> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Draw(mesh) => Some(mesh),
                Call::Bind(_) => None,
            })
            .collect()
    }
}

impl DrawBackend for RecordingBackend {
    fn bind(&mut self, state: &DrawState) {
        self.calls.push(Call::Bind(state.clone()));
    }

    fn draw_mesh(&mut self, mesh: &OverlayMesh) {
        self.calls.push(Call::Draw(mesh.clone()));
    }
}
