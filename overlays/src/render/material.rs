use std::fmt;

/// Identifier of a material in the external material system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

/// Material as the overlay system needs to know it.
///
/// Shared as `Rc<Material>`; every clone held by the sort registry is one
/// outstanding reference on the material.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    /// Whether batches drawn with this material carry lightmap coordinates.
    pub needs_lightmap: bool,
}

impl Material {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id: MaterialId(id),
            name: name.into(),
            needs_lightmap: true,
        }
    }

    /// Mark the material as unlit.
    #[must_use]
    pub fn unlit(mut self) -> Self {
        self.needs_lightmap = false;
        self
    }
}

/// Opaque per-overlay state handed to the draw backend when binding a material.
///
/// The overlay system never looks inside; it only compares contexts by identity
/// to decide where one batch ends and the next begins.
pub trait BindContext: fmt::Debug {}
