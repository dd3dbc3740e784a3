//! Sort registry: one compact id per distinct `(material, lightmap page)` pair.
//!
//! Fragments hold a [`SortRef`]. Cloning the ref adds a reference, dropping it
//! removes one, and the entry (with its material reference) goes away when the
//! last ref is dropped.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::pool::FragmentHandle;
use crate::render::{Material, MaterialId};

/// Lightmap page a surface samples from.
pub type LightmapPage = i32;

/// Number of independent render groups a surface can be queued in.
pub const MAX_SORT_GROUPS: usize = 4;

/// Compact id for one `(material, lightmap page)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SortId(pub u16);

impl SortId {
    fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// Per-group render bookkeeping, reset every frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueSlot {
    /// Head of this sort id's fragment render list.
    pub first_fragment: Option<FragmentHandle>,
    /// Next sort id in the group's active list.
    pub next_sort: Option<SortId>,
    pub vertex_count: u32,
    pub index_count: u32,
}

pub struct SortEntry {
    pub material: Rc<Material>,
    pub lightmap_page: LightmapPage,
    ref_count: u32,
    pub(crate) queue: [QueueSlot; MAX_SORT_GROUPS],
}

impl SortEntry {
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    pub fn queue(&self, group: usize) -> &QueueSlot {
        &self.queue[group]
    }

    fn in_flight(&self) -> bool {
        self.queue.iter().any(|slot| slot.vertex_count != 0)
    }
}

#[derive(Default)]
pub struct SortTable {
    entries: Vec<Option<SortEntry>>,
    free: Vec<u16>,
    lookup: HashMap<(MaterialId, LightmapPage), SortId>,
}

impl SortTable {
    pub fn get(&self, id: SortId) -> Option<&SortEntry> {
        self.entries.get(id.index())?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: SortId) -> Option<&mut SortEntry> {
        self.entries.get_mut(id.index())?.as_mut()
    }

    /// Number of live sort ids.
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = SortId> + '_ {
        self.lookup.values().copied()
    }

    fn acquire(&mut self, material: &Rc<Material>, lightmap_page: LightmapPage) -> SortId {
        let key = (material.id, lightmap_page);
        if let Some(&id) = self.lookup.get(&key) {
            if let Some(entry) = self.get_mut(id) {
                entry.ref_count += 1;
            }
            return id;
        }

        let entry = SortEntry {
            material: Rc::clone(material),
            lightmap_page,
            ref_count: 1,
            queue: [QueueSlot::default(); MAX_SORT_GROUPS],
        };
        let id = match self.free.pop() {
            Some(index) => {
                self.entries[usize::from(index)] = Some(entry);
                SortId(index)
            }
            None => {
                assert!(
                    self.entries.len() < usize::from(u16::MAX),
                    "sort id space exhausted"
                );
                let index = self.entries.len() as u16;
                self.entries.push(Some(entry));
                SortId(index)
            }
        };
        self.lookup.insert(key, id);
        log::debug!(
            "sort id {} -> material '{}' page {}",
            id.0,
            material.name,
            lightmap_page
        );
        id
    }

    fn add_ref(&mut self, id: SortId) {
        if let Some(entry) = self.get_mut(id) {
            entry.ref_count += 1;
        }
    }

    fn release(&mut self, id: SortId) {
        let Some(entry) = self.get_mut(id) else {
            return;
        };
        entry.ref_count -= 1;
        if entry.ref_count > 0 {
            return;
        }
        debug_assert!(
            !entry.in_flight(),
            "sort id {} released while queued for rendering",
            id.0
        );

        let key = (entry.material.id, entry.lightmap_page);
        self.lookup.remove(&key);
        self.entries[id.index()] = None;
        self.free.push(id.0);
    }
}

/// Shared handle to the sort table.
#[derive(Clone, Default)]
pub struct SortRegistry {
    table: Rc<RefCell<SortTable>>,
}

impl SortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference the sort id for `(material, lightmap_page)`, creating it if needed.
    pub fn acquire(&self, material: &Rc<Material>, lightmap_page: LightmapPage) -> SortRef {
        let id = self.table.borrow_mut().acquire(material, lightmap_page);
        SortRef {
            id,
            table: Rc::clone(&self.table),
        }
    }

    /// Number of live sort ids.
    pub fn len(&self) -> usize {
        self.table.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.borrow().is_empty()
    }

    pub fn ref_count(&self, id: SortId) -> u32 {
        self.table.borrow().get(id).map_or(0, SortEntry::ref_count)
    }

    pub fn material(&self, id: SortId) -> Option<Rc<Material>> {
        self.table.borrow().get(id).map(|entry| Rc::clone(&entry.material))
    }

    pub fn lightmap_page(&self, id: SortId) -> Option<LightmapPage> {
        self.table.borrow().get(id).map(|entry| entry.lightmap_page)
    }

    pub fn table(&self) -> Ref<'_, SortTable> {
        self.table.borrow()
    }

    pub(crate) fn table_mut(&self) -> RefMut<'_, SortTable> {
        self.table.borrow_mut()
    }
}

/// Counted reference to a sort id. Dropping the last one frees the id.
pub struct SortRef {
    id: SortId,
    table: Rc<RefCell<SortTable>>,
}

impl SortRef {
    pub fn id(&self) -> SortId {
        self.id
    }
}

impl Clone for SortRef {
    fn clone(&self) -> Self {
        self.table.borrow_mut().add_ref(self.id);
        Self {
            id: self.id,
            table: Rc::clone(&self.table),
        }
    }
}

impl Drop for SortRef {
    fn drop(&mut self) {
        self.table.borrow_mut().release(self.id);
    }
}

impl fmt::Debug for SortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SortRef").field(&self.id).finish()
    }
}
