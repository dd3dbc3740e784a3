//! Fragment storage.
//!
//! Fragments live in a `Vec`-backed arena and are addressed by stable
//! [`FragmentHandle`]s; freed slots go on a free list. Each fragment sits on
//! two independent chains at once: the chain of every fragment on its surface
//! and the chain of every fragment belonging to its overlay. Both are
//! doubly linked through handles stored on the fragment itself.

use std::collections::HashMap;

use crate::math::{Vec2, Vec3};
use crate::overlay::OverlayId;
use crate::sort::SortRef;
use crate::world::SurfaceHandle;

/// Stable index of a fragment in the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragmentHandle(u32);

impl FragmentHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One vertex of a clipped fragment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FragmentVertex {
    pub pos: Vec3,
    pub normal: Vec3,
    /// Base texture coordinate and normalized position within the overlay quad.
    pub tex: [Vec2; 2],
    pub lightmap: Vec2,
    /// Fade alpha, rewritten every frame by the render queue builder.
    pub alpha: f32,
}

impl Default for FragmentVertex {
    fn default() -> Self {
        Self {
            pos: Vec3::ZERO,
            normal: Vec3::Z,
            tex: [Vec2::ZERO; 2],
            lightmap: Vec2::ZERO,
            alpha: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Link {
    next: Option<FragmentHandle>,
    prev: Option<FragmentHandle>,
}

/// Clipped piece of one overlay on one surface.
#[derive(Debug)]
pub struct Fragment {
    pub overlay: OverlayId,
    pub surface: SurfaceHandle,
    pub verts: Vec<FragmentVertex>,
    pub sort: Option<SortRef>,
    pub lightmap_offset: f32,
    pub(crate) render_next: Option<FragmentHandle>,
    pub(crate) frame_tag: Option<u64>,
    surface_link: Link,
    overlay_link: Link,
}

impl Fragment {
    fn new(overlay: OverlayId, surface: SurfaceHandle, vertex_count: usize) -> Self {
        Self {
            overlay,
            surface,
            verts: vec![FragmentVertex::default(); vertex_count],
            sort: None,
            lightmap_offset: 0.0,
            render_next: None,
            frame_tag: None,
            surface_link: Link::default(),
            overlay_link: Link::default(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.verts.len()
    }

    /// Indices needed to draw the fragment as a triangle fan.
    pub fn index_count(&self) -> usize {
        3 * self.verts.len().saturating_sub(2)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Chain {
    Surface,
    Overlay,
}

/// Arena of fragments with surface and overlay chains.
#[derive(Default)]
pub struct FragmentPool {
    slots: Vec<Option<Fragment>>,
    free: Vec<u32>,
    surface_heads: HashMap<SurfaceHandle, FragmentHandle>,
    overlay_heads: HashMap<OverlayId, FragmentHandle>,
    live: usize,
}

impl FragmentPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an unlinked fragment with `vertex_count` default vertices.
    pub fn allocate(
        &mut self,
        overlay: OverlayId,
        surface: SurfaceHandle,
        vertex_count: usize,
    ) -> FragmentHandle {
        self.insert(Fragment::new(overlay, surface, vertex_count))
    }

    /// Duplicate a fragment's geometry and sort reference into a new, unlinked fragment.
    pub fn copy(&mut self, source: FragmentHandle) -> Option<FragmentHandle> {
        let src = self.get(source)?;
        let fragment = Fragment {
            verts: src.verts.clone(),
            sort: src.sort.clone(),
            lightmap_offset: src.lightmap_offset,
            ..Fragment::new(src.overlay, src.surface, 0)
        };
        Some(self.insert(fragment))
    }

    /// Unlink a fragment from both chains and release its slot.
    pub fn free(&mut self, handle: FragmentHandle) {
        if self.get(handle).is_none() {
            return;
        }
        self.unlink(handle, Chain::Surface);
        self.unlink(handle, Chain::Overlay);
        self.slots[handle.index()] = None;
        self.free.push(handle.0);
        self.live -= 1;
    }

    /// Drop every fragment at once.
    pub fn purge(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.surface_heads.clear();
        self.overlay_heads.clear();
        self.live = 0;
    }

    pub fn get(&self, handle: FragmentHandle) -> Option<&Fragment> {
        self.slots.get(handle.index())?.as_ref()
    }

    pub fn get_mut(&mut self, handle: FragmentHandle) -> Option<&mut Fragment> {
        self.slots.get_mut(handle.index())?.as_mut()
    }

    /// Number of live fragments.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Every live fragment, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (FragmentHandle, &Fragment)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|f| (FragmentHandle(i as u32), f)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Fragment> {
        self.slots.iter_mut().flatten()
    }

    /// Push a fragment onto the head of its surface's chain.
    pub fn link_surface(&mut self, handle: FragmentHandle) {
        self.link_head(handle, Chain::Surface);
    }

    /// Push a fragment onto the head of its overlay's chain.
    pub fn link_overlay(&mut self, handle: FragmentHandle) {
        self.link_head(handle, Chain::Overlay);
    }

    pub fn surface_head(&self, surface: SurfaceHandle) -> Option<FragmentHandle> {
        self.surface_heads.get(&surface).copied()
    }

    pub fn overlay_head(&self, overlay: OverlayId) -> Option<FragmentHandle> {
        self.overlay_heads.get(&overlay).copied()
    }

    /// Fragments on `surface`, most recently linked first.
    pub fn surface_chain(&self, surface: SurfaceHandle) -> ChainIter<'_> {
        ChainIter {
            pool: self,
            cursor: self.surface_head(surface),
            chain: Chain::Surface,
        }
    }

    /// Fragments of `overlay`, most recently linked first.
    pub fn overlay_chain(&self, overlay: OverlayId) -> ChainIter<'_> {
        ChainIter {
            pool: self,
            cursor: self.overlay_head(overlay),
            chain: Chain::Overlay,
        }
    }

    fn insert(&mut self, fragment: Fragment) -> FragmentHandle {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Some(fragment);
            FragmentHandle(index)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Some(fragment));
            FragmentHandle(index)
        }
    }

    fn link_of(&mut self, handle: FragmentHandle, chain: Chain) -> Option<&mut Link> {
        let fragment = self.get_mut(handle)?;
        Some(match chain {
            Chain::Surface => &mut fragment.surface_link,
            Chain::Overlay => &mut fragment.overlay_link,
        })
    }

    fn chain_key(&self, handle: FragmentHandle) -> Option<(SurfaceHandle, OverlayId)> {
        self.get(handle).map(|f| (f.surface, f.overlay))
    }

    fn head(&self, handle: FragmentHandle, chain: Chain) -> Option<FragmentHandle> {
        let (surface, overlay) = self.chain_key(handle)?;
        match chain {
            Chain::Surface => self.surface_head(surface),
            Chain::Overlay => self.overlay_head(overlay),
        }
    }

    fn set_head(&mut self, handle: FragmentHandle, chain: Chain, head: Option<FragmentHandle>) {
        let Some((surface, overlay)) = self.chain_key(handle) else {
            return;
        };
        match (chain, head) {
            (Chain::Surface, Some(h)) => {
                self.surface_heads.insert(surface, h);
            }
            (Chain::Surface, None) => {
                self.surface_heads.remove(&surface);
            }
            (Chain::Overlay, Some(h)) => {
                self.overlay_heads.insert(overlay, h);
            }
            (Chain::Overlay, None) => {
                self.overlay_heads.remove(&overlay);
            }
        }
    }

    fn is_linked(&self, handle: FragmentHandle, chain: Chain) -> bool {
        let Some(fragment) = self.get(handle) else {
            return false;
        };
        let link = match chain {
            Chain::Surface => fragment.surface_link,
            Chain::Overlay => fragment.overlay_link,
        };
        link.prev.is_some() || self.head(handle, chain) == Some(handle)
    }

    fn link_head(&mut self, handle: FragmentHandle, chain: Chain) {
        if self.get(handle).is_none() || self.is_linked(handle, chain) {
            return;
        }
        let old_head = self.head(handle, chain);
        if let Some(link) = self.link_of(handle, chain) {
            *link = Link {
                next: old_head,
                prev: None,
            };
        }
        if let Some(old) = old_head {
            if let Some(link) = self.link_of(old, chain) {
                link.prev = Some(handle);
            }
        }
        self.set_head(handle, chain, Some(handle));
    }

    fn unlink(&mut self, handle: FragmentHandle, chain: Chain) {
        if !self.is_linked(handle, chain) {
            return;
        }
        let Some(link) = self.link_of(handle, chain).map(std::mem::take) else {
            return;
        };

        match link.prev {
            Some(prev) => {
                if let Some(prev_link) = self.link_of(prev, chain) {
                    prev_link.next = link.next;
                }
            }
            None => self.set_head(handle, chain, link.next),
        }
        if let Some(next) = link.next {
            if let Some(next_link) = self.link_of(next, chain) {
                next_link.prev = link.prev;
            }
        }
    }
}

/// Walks one chain from its head.
pub struct ChainIter<'a> {
    pool: &'a FragmentPool,
    cursor: Option<FragmentHandle>,
    chain: Chain,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = FragmentHandle;

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.cursor?;
        let fragment = self.pool.get(handle)?;
        self.cursor = match self.chain {
            Chain::Surface => fragment.surface_link.next,
            Chain::Overlay => fragment.overlay_link.next,
        };
        Some(handle)
    }
}
