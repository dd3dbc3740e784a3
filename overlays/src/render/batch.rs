use std::rc::Rc;

use super::material::BindContext;
use super::mesh::{DrawBackend, DrawState, MeshBuilder, OverlayVertex};
use super::queue::RenderQueue;
use crate::config::OverlayConfig;
use crate::overlay::{Overlay, RENDER_ORDER_COUNT};
use crate::pool::{Fragment, FragmentPool, FragmentVertex};
use crate::sort::{SortEntry, SortTable};

/// What one call to [`draw_group`] submitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub batches: usize,
    pub fragments: usize,
    pub vertices: usize,
    pub indices: usize,
}

struct Batch {
    context: Option<Rc<dyn BindContext>>,
    builder: MeshBuilder,
}

/// Submit every queued fragment of `group` to the backend.
///
/// Render-order buckets are flushed in ascending order across all sort ids.
/// Within one sort id and bucket, consecutive fragments sharing a bind
/// context go out as a single triangle-fan mesh.
pub fn draw_group(
    group: usize,
    queue: &RenderQueue,
    table: &SortTable,
    pool: &FragmentPool,
    overlays: &[Overlay],
    config: &OverlayConfig,
    backend: &mut dyn DrawBackend,
) -> BatchStats {
    let active = queue.active_sort_ids(group, table);
    let mut stats = BatchStats::default();

    for order in 0..RENDER_ORDER_COUNT {
        let mut later_buckets = false;

        for &sort_id in &active {
            let Some(entry) = table.get(sort_id) else {
                continue;
            };
            let slot = entry.queue(group);
            let mut batch: Option<Batch> = None;
            let mut cursor = slot.first_fragment;

            while let Some(handle) = cursor {
                let Some(fragment) = pool.get(handle) else {
                    break;
                };
                cursor = fragment.render_next;

                let overlay = overlays.get(fragment.overlay.0 as usize);
                let fragment_order = overlay.map_or(0, |o| o.render_order);
                if fragment_order != order {
                    later_buckets |= fragment_order > order;
                    continue;
                }

                let context = overlay.and_then(|o| o.bind_context.clone());
                let reuse = batch
                    .as_ref()
                    .is_some_and(|b| same_context(&b.context, &context));
                if !reuse {
                    flush(batch.take(), backend, &mut stats);
                    backend.bind(&DrawState {
                        material: Rc::clone(&entry.material),
                        lightmap_page: entry.lightmap_page,
                        bind_context: context.clone(),
                        wireframe: config.wireframe_only,
                    });
                    batch = Some(Batch {
                        context,
                        builder: MeshBuilder::with_capacity(
                            slot.vertex_count as usize,
                            slot.index_count as usize,
                        ),
                    });
                }

                if let Some(batch) = batch.as_mut() {
                    batch
                        .builder
                        .push_fan(fragment_vertices(fragment, entry, config.wireframe_only));
                    stats.fragments += 1;
                }
            }
            flush(batch, backend, &mut stats);
        }

        if !later_buckets {
            break;
        }
    }

    log::trace!(
        "group {}: {} overlay batches, {} fragments",
        group,
        stats.batches,
        stats.fragments
    );
    stats
}

fn flush(batch: Option<Batch>, backend: &mut dyn DrawBackend, stats: &mut BatchStats) {
    let Some(batch) = batch else {
        return;
    };
    if batch.builder.is_empty() {
        return;
    }
    let mesh = batch.builder.finish();
    stats.batches += 1;
    stats.vertices += mesh.vertices.len();
    stats.indices += mesh.indices.len();
    backend.draw_mesh(&mesh);
}

fn same_context(a: &Option<Rc<dyn BindContext>>, b: &Option<Rc<dyn BindContext>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

fn fragment_vertices<'a>(
    fragment: &'a Fragment,
    entry: &'a SortEntry,
    wireframe: bool,
) -> impl Iterator<Item = OverlayVertex> + 'a {
    let lightmapped = entry.material.needs_lightmap;
    fragment
        .verts
        .iter()
        .map(move |v| to_vertex(v, fragment.lightmap_offset, lightmapped, wireframe))
}

fn to_vertex(v: &FragmentVertex, lightmap_offset: f32, lightmapped: bool, wireframe: bool) -> OverlayVertex {
    let alpha = if wireframe {
        255
    } else {
        (v.alpha.clamp(0.0, 1.0) * 255.0).round() as u8
    };
    let (tex1, tex2) = if lightmapped {
        (v.lightmap.to_array(), [lightmap_offset, 0.0])
    } else {
        (v.tex[1].to_array(), [0.0, 0.0])
    };
    OverlayVertex {
        position: v.pos.to_array(),
        normal: v.normal.to_array(),
        color: [255, 255, 255, alpha],
        tex0: v.tex[0].to_array(),
        tex1,
        tex2,
    }
}
