use crate::config::OverlayConfig;
use crate::math::Vec3;
use crate::overlay::{fade_alpha, Overlay};
use crate::pool::{Fragment, FragmentHandle, FragmentPool};
use crate::sort::{SortId, SortTable, MAX_SORT_GROUPS};
use crate::world::SurfaceHandle;

/// Hard ceiling on vertices or indices queued for one sort id in one group.
pub const MAX_BATCH_ELEMENTS: u32 = u16::MAX as u32;

/// Per-frame render lists, one active sort-id list per group.
///
/// Each group's list is singly linked through the sort entries' queue slots,
/// and each sort id's fragments are linked through `Fragment::render_next`.
/// Everything here is rebuilt from scratch every frame.
#[derive(Debug, Default)]
pub struct RenderQueue {
    heads: [Option<SortId>; MAX_SORT_GROUPS],
    frame: u64,
}

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current frame id.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn head(&self, group: usize) -> Option<SortId> {
        check_group(group);
        self.heads[group]
    }

    /// Active sort ids of a group, most recently activated first.
    pub fn active_sort_ids(&self, group: usize, table: &SortTable) -> Vec<SortId> {
        check_group(group);
        let mut ids = Vec::new();
        let mut cursor = self.heads[group];
        while let Some(id) = cursor {
            ids.push(id);
            cursor = table.get(id).and_then(|entry| entry.queue(group).next_sort);
        }
        ids
    }

    /// Empty one group's list and zero the counters of every sort id on it.
    ///
    /// Dequeued fragments lose their frame tag, so they can be queued again
    /// within the same frame.
    pub fn clear_group(&mut self, group: usize, table: &mut SortTable, pool: &mut FragmentPool) {
        check_group(group);
        let mut cursor = self.heads[group].take();
        while let Some(id) = cursor {
            let Some(entry) = table.get_mut(id) else {
                break;
            };
            let slot = std::mem::take(&mut entry.queue[group]);
            release_fragments(slot.first_fragment, pool);
            cursor = slot.next_sort;
        }
    }

    pub fn clear(&mut self, table: &mut SortTable, pool: &mut FragmentPool) {
        for group in 0..MAX_SORT_GROUPS {
            self.clear_group(group, table, pool);
        }
    }

    /// Start a new frame: clear every group and advance the frame id.
    pub fn begin_frame(&mut self, table: &mut SortTable, pool: &mut FragmentPool) {
        self.clear(table, pool);
        self.frame += 1;
    }

    /// Queue the fragments on `surface` into `group`.
    ///
    /// Fragments already queued this frame, with fewer than three vertices, or
    /// fully faded out are skipped. Returns the number queued.
    #[allow(clippy::too_many_arguments)]
    pub fn add_surface(
        &mut self,
        group: usize,
        surface: SurfaceHandle,
        pool: &mut FragmentPool,
        overlays: &[Overlay],
        view_origin: Vec3,
        config: &OverlayConfig,
        table: &mut SortTable,
    ) -> usize {
        check_group(group);
        let handles: Vec<_> = pool.surface_chain(surface).collect();
        let mut queued = 0;

        for handle in handles {
            let Some(fragment) = pool.get_mut(handle) else {
                continue;
            };
            if fragment.frame_tag == Some(self.frame) || fragment.vertex_count() < 3 {
                continue;
            }
            let Some(sort_id) = fragment.sort.as_ref().map(|s| s.id()) else {
                continue;
            };
            let overlay = overlays.get(fragment.overlay.0 as usize);
            if !apply_fade(fragment, overlay, view_origin, config) {
                continue;
            }
            let Some(entry) = table.get_mut(sort_id) else {
                continue;
            };

            let slot = &mut entry.queue[group];
            if slot.first_fragment.is_none() {
                slot.next_sort = self.heads[group];
                self.heads[group] = Some(sort_id);
            }
            fragment.frame_tag = Some(self.frame);
            fragment.render_next = slot.first_fragment;
            slot.first_fragment = Some(handle);

            slot.vertex_count += fragment.vertex_count() as u32;
            slot.index_count += fragment.index_count() as u32;
            assert!(
                slot.vertex_count <= MAX_BATCH_ELEMENTS && slot.index_count <= MAX_BATCH_ELEMENTS,
                "overlay sort id {} overflowed its batch ({} vertices, {} indices)",
                sort_id.0,
                slot.vertex_count,
                slot.index_count
            );
            queued += 1;
        }

        log::trace!(
            "queued {} overlay fragments from surface {} into group {}",
            queued,
            surface.0,
            group
        );
        queued
    }
}

fn check_group(group: usize) {
    assert!(
        group < MAX_SORT_GROUPS,
        "overlay render group {group} out of range (max {})",
        MAX_SORT_GROUPS - 1
    );
}

fn release_fragments(mut cursor: Option<FragmentHandle>, pool: &mut FragmentPool) {
    while let Some(handle) = cursor {
        let Some(fragment) = pool.get_mut(handle) else {
            break;
        };
        cursor = fragment.render_next.take();
        fragment.frame_tag = None;
    }
}

/// Write this frame's fade alpha into a fragment's vertices.
///
/// Returns false when every vertex ends up fully transparent.
pub fn apply_fade(
    fragment: &mut Fragment,
    overlay: Option<&Overlay>,
    view_origin: Vec3,
    config: &OverlayConfig,
) -> bool {
    if config.global_fade_enabled {
        let mut visible = false;
        for v in &mut fragment.verts {
            v.alpha = fade_alpha(
                v.pos.distance(view_origin),
                config.fade_min_distance,
                config.fade_max_distance,
            );
            visible |= v.alpha > 0.0;
        }
        return visible;
    }

    let alpha = match overlay.and_then(|o| o.fade.map(|fade| (fade, o.origin()))) {
        Some((fade, origin)) => fade.alpha(origin.distance_squared(view_origin)),
        None => 1.0,
    };
    for v in &mut fragment.verts {
        v.alpha = alpha;
    }
    alpha > 0.0
}
