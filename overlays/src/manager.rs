//! Owner of every overlay, its fragments and the per-frame render state.

use std::rc::Rc;

use crate::config::OverlayConfig;
use crate::disp_clip::clip_to_displacement;
use crate::error::{BuildFault, LoadError};
use crate::math::Vec3;
use crate::overlay::{Overlay, OverlayDesc, OverlayId};
use crate::pool::{Fragment, FragmentHandle, FragmentPool, FragmentVertex};
use crate::records::load_descs;
use crate::render::{self, BatchStats, BindContext, DrawBackend, Material, RenderQueue};
use crate::sort::{LightmapPage, SortRegistry};
use crate::surface_clip::clip_to_surface;
use crate::world::{SurfaceHandle, WorldGeometry};

/// Counts describing the current overlay state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OverlayStats {
    pub overlays: usize,
    pub invalid_overlays: usize,
    pub fragments: usize,
    pub vertices: usize,
    pub sort_ids: usize,
}

#[derive(Default)]
pub struct OverlayManager {
    overlays: Vec<Overlay>,
    pool: FragmentPool,
    sorts: SortRegistry,
    queue: RenderQueue,
}

impl OverlayManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every overlay with the ones in the given lumps and build their fragments.
    ///
    /// Any malformed record fails the whole load and leaves the manager untouched.
    pub fn load(
        &mut self,
        overlay_lump: &[u8],
        fade_lump: Option<&[u8]>,
        world: &dyn WorldGeometry,
    ) -> Result<usize, LoadError> {
        let overlays = load_descs(overlay_lump, fade_lump)?
            .into_iter()
            .enumerate()
            .map(|(i, desc)| Overlay::from_desc(OverlayId(i as u32), desc))
            .collect::<Result<Vec<_>, _>>()?;

        self.purge();
        self.overlays = overlays;
        let fragments = self.build_all(world);
        log::info!(
            "loaded {} overlays ({} invalid), {} fragments",
            self.overlays.len(),
            self.overlays.iter().filter(|o| !o.valid).count(),
            fragments
        );
        Ok(self.overlays.len())
    }

    /// Add one overlay without building it. Call [`Self::rebuild_overlay`] next.
    pub fn add_overlay(&mut self, desc: OverlayDesc) -> Result<OverlayId, LoadError> {
        let id = OverlayId(self.overlays.len() as u32);
        self.overlays.push(Overlay::from_desc(id, desc)?);
        Ok(id)
    }

    /// Throw away every fragment and clip all overlays again. Returns the fragment count.
    pub fn build_all(&mut self, world: &dyn WorldGeometry) -> usize {
        self.clear_queues();
        self.pool.purge();
        for overlay in &self.overlays {
            build_overlay(overlay, &mut self.pool, &self.sorts, world);
        }
        self.pool.len()
    }

    /// Rebuild a single overlay's fragments. Returns how many it now has.
    pub fn rebuild_overlay(&mut self, id: OverlayId, world: &dyn WorldGeometry) -> usize {
        self.remove_overlay_fragments(id);
        match self.overlays.get(id.0 as usize) {
            Some(overlay) => build_overlay(overlay, &mut self.pool, &self.sorts, world),
            None => 0,
        }
    }

    /// Free every fragment belonging to `id`.
    pub fn remove_overlay_fragments(&mut self, id: OverlayId) {
        self.clear_queues();
        let handles: Vec<FragmentHandle> = self.pool.overlay_chain(id).collect();
        for handle in handles {
            self.pool.free(handle);
        }
    }

    /// Re-acquire every fragment's sort id after the material list changed.
    pub fn resort(&mut self, world: &dyn WorldGeometry) {
        self.clear_queues();
        for overlay in &self.overlays {
            let material = world.material_for_tex_info(overlay.tex_info);
            let handles: Vec<FragmentHandle> = self.pool.overlay_chain(overlay.id).collect();
            for handle in handles {
                let Some(fragment) = self.pool.get_mut(handle) else {
                    continue;
                };
                let page = world
                    .surface(fragment.surface)
                    .map_or(0, |surface| surface.lightmap_page);
                // Acquire before the old ref drops so a shared id is never freed in between.
                fragment.sort = material
                    .as_ref()
                    .map(|material| self.sorts.acquire(material, page));
            }
        }
        log::debug!("resorted overlays into {} sort ids", self.sorts.len());
    }

    /// Drop every overlay and fragment.
    pub fn purge(&mut self) {
        self.clear_queues();
        self.pool.purge();
        self.overlays.clear();
    }

    pub fn begin_frame(&mut self) {
        self.queue.begin_frame(&mut self.sorts.table_mut(), &mut self.pool);
    }

    /// Queue the fragments on a visible surface. Returns how many were queued.
    pub fn add_surface_to_render_list(
        &mut self,
        group: usize,
        surface: SurfaceHandle,
        view_origin: Vec3,
        config: &OverlayConfig,
    ) -> usize {
        self.queue.add_surface(
            group,
            surface,
            &mut self.pool,
            &self.overlays,
            view_origin,
            config,
            &mut self.sorts.table_mut(),
        )
    }

    /// Submit one group's queued fragments.
    pub fn draw_group(
        &self,
        group: usize,
        config: &OverlayConfig,
        backend: &mut dyn DrawBackend,
    ) -> BatchStats {
        render::draw_group(
            group,
            &self.queue,
            &self.sorts.table(),
            &self.pool,
            &self.overlays,
            config,
            backend,
        )
    }

    /// Release this frame's queues so sort ids are free to change.
    pub fn end_frame(&mut self) {
        self.clear_queues();
    }

    pub fn set_bind_context(&mut self, id: OverlayId, context: Option<Rc<dyn BindContext>>) {
        if let Some(overlay) = self.overlays.get_mut(id.0 as usize) {
            overlay.bind_context = context;
        }
    }

    pub fn surface_fragments(&self, surface: SurfaceHandle) -> impl Iterator<Item = &Fragment> {
        self.pool
            .surface_chain(surface)
            .filter_map(|handle| self.pool.get(handle))
    }

    pub fn overlay_fragments(&self, id: OverlayId) -> impl Iterator<Item = &Fragment> {
        self.pool
            .overlay_chain(id)
            .filter_map(|handle| self.pool.get(handle))
    }

    pub fn overlay(&self, id: OverlayId) -> Option<&Overlay> {
        self.overlays.get(id.0 as usize)
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn pool(&self) -> &FragmentPool {
        &self.pool
    }

    pub fn sorts(&self) -> &SortRegistry {
        &self.sorts
    }

    pub fn queue(&self) -> &RenderQueue {
        &self.queue
    }

    pub fn stats(&self) -> OverlayStats {
        OverlayStats {
            overlays: self.overlays.len(),
            invalid_overlays: self.overlays.iter().filter(|o| !o.valid).count(),
            fragments: self.pool.len(),
            vertices: self.pool.iter().map(|(_, f)| f.vertex_count()).sum(),
            sort_ids: self.sorts.len(),
        }
    }

    fn clear_queues(&mut self) {
        self.queue.clear(&mut self.sorts.table_mut(), &mut self.pool);
    }
}

impl Drop for OverlayManager {
    fn drop(&mut self) {
        self.clear_queues();
    }
}

/// Clip one overlay against each of its surfaces and store the results.
fn build_overlay(
    overlay: &Overlay,
    pool: &mut FragmentPool,
    sorts: &SortRegistry,
    world: &dyn WorldGeometry,
) -> usize {
    if !overlay.valid {
        return 0;
    }
    let Some(material) = world.material_for_tex_info(overlay.tex_info) else {
        log::warn!(
            "overlay {} has no material for texinfo {}",
            overlay.source_id,
            overlay.tex_info
        );
        return 0;
    };

    let mut built = 0;
    for &surface in &overlay.surfaces {
        match clip_surface(overlay, surface, world) {
            Ok(Some(clipped)) => {
                for verts in clipped.pieces.iter().filter(|v| v.len() >= 3) {
                    store_fragment(
                        pool,
                        overlay,
                        surface,
                        verts,
                        sorts,
                        &material,
                        clipped.lightmap_page,
                        clipped.lightmap_offset,
                    );
                    built += 1;
                }
            }
            Ok(None) => {}
            Err(fault) => log::warn!(
                "overlay {} at {:?}: skipping surface {}: {}",
                overlay.source_id,
                overlay.origin(),
                surface.0,
                fault
            ),
        }
    }
    built
}

struct Clipped {
    pieces: Vec<Vec<FragmentVertex>>,
    lightmap_page: LightmapPage,
    lightmap_offset: f32,
}

fn clip_surface(
    overlay: &Overlay,
    surface: SurfaceHandle,
    world: &dyn WorldGeometry,
) -> Result<Option<Clipped>, BuildFault> {
    let geometry = world.surface(surface);
    let (lightmap_page, lightmap_offset) =
        geometry.map_or((0, 0.0), |g| (g.lightmap_page, g.lightmap_offset));

    let pieces = if let Some(disp) = world.displacement(surface) {
        clip_to_displacement(overlay, disp)?
    } else if let Some(geometry) = geometry {
        clip_to_surface(overlay, &geometry, |pos| world.lightmap_coord(surface, pos))?
            .into_iter()
            .collect()
    } else {
        log::warn!(
            "overlay {} references unknown surface {}",
            overlay.source_id,
            surface.0
        );
        return Ok(None);
    };

    Ok(Some(Clipped {
        pieces,
        lightmap_page,
        lightmap_offset,
    }))
}

#[allow(clippy::too_many_arguments)]
fn store_fragment(
    pool: &mut FragmentPool,
    overlay: &Overlay,
    surface: SurfaceHandle,
    verts: &[FragmentVertex],
    sorts: &SortRegistry,
    material: &Rc<Material>,
    lightmap_page: LightmapPage,
    lightmap_offset: f32,
) -> FragmentHandle {
    let handle = pool.allocate(overlay.id, surface, verts.len());
    if let Some(fragment) = pool.get_mut(handle) {
        fragment.verts.copy_from_slice(verts);
        fragment.sort = Some(sorts.acquire(material, lightmap_page));
        fragment.lightmap_offset = lightmap_offset;
    }
    pool.link_surface(handle);
    pool.link_overlay(handle);
    handle
}
