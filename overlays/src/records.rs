//! On-disk overlay records.
//!
//! The overlay lump is a packed array of [`RawOverlay`]; the optional fade lump
//! is a parallel array of [`RawOverlayFade`], one per overlay.

use bytemuck::{Pod, Zeroable};

use crate::basis::unpack_u_axis;
use crate::error::LoadError;
use crate::math::Vec3;
use crate::overlay::{FadeRange, OverlayDesc};
use crate::world::SurfaceHandle;

/// Most surfaces a single overlay record can reference.
pub const MAX_OVERLAY_FACES: usize = 64;

/// Set in [`RawOverlay::flags`] when the v axis is negated.
pub const FLAG_FLIP: u16 = 0x1;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct RawOverlay {
    pub id: i32,
    pub tex_info: i16,
    pub face_count: u16,
    pub render_order: u16,
    pub flags: u16,
    pub faces: [i32; MAX_OVERLAY_FACES],
    pub u: [f32; 2],
    pub v: [f32; 2],
    /// Quad corners; the `z` of the first three carries the packed u axis.
    pub uv_points: [[f32; 3]; 4],
    pub origin: [f32; 3],
    pub basis_normal: [f32; 3],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct RawOverlayFade {
    pub fade_dist_min_sq: f32,
    pub fade_dist_max_sq: f32,
}

fn parse_lump<T: Pod>(lump: &'static str, bytes: &[u8]) -> Result<Vec<T>, LoadError> {
    let stride = std::mem::size_of::<T>();
    if bytes.len() % stride != 0 {
        return Err(LoadError::LumpSize {
            lump,
            len: bytes.len(),
            stride,
        });
    }
    Ok(bytes
        .chunks_exact(stride)
        .map(bytemuck::pod_read_unaligned)
        .collect())
}

pub fn parse_overlay_lump(bytes: &[u8]) -> Result<Vec<RawOverlay>, LoadError> {
    parse_lump("overlay", bytes)
}

pub fn parse_fade_lump(bytes: &[u8]) -> Result<Vec<RawOverlayFade>, LoadError> {
    parse_lump("overlay fade", bytes)
}

/// Parse both lumps into overlay descriptions.
///
/// A missing or empty fade lump leaves every overlay on global fade only.
pub fn load_descs(
    overlay_lump: &[u8],
    fade_lump: Option<&[u8]>,
) -> Result<Vec<OverlayDesc>, LoadError> {
    let raws = parse_overlay_lump(overlay_lump)?;
    let fades = match fade_lump {
        Some(bytes) if !bytes.is_empty() => parse_fade_lump(bytes)?,
        _ => Vec::new(),
    };
    if !fades.is_empty() && fades.len() != raws.len() {
        return Err(LoadError::FadeCount {
            overlays: raws.len(),
            fades: fades.len(),
        });
    }

    raws.iter()
        .enumerate()
        .map(|(i, raw)| to_desc(raw, fades.get(i)))
        .collect()
}

/// Convert one record, unpacking the u axis from the quad points.
pub fn to_desc(raw: &RawOverlay, fade: Option<&RawOverlayFade>) -> Result<OverlayDesc, LoadError> {
    let face_count = usize::from(raw.face_count);
    if face_count > MAX_OVERLAY_FACES {
        return Err(LoadError::FaceCount {
            overlay: raw.id,
            count: raw.face_count,
            max: MAX_OVERLAY_FACES as u16,
        });
    }

    let mut points = raw.uv_points.map(Vec3::from_array);
    let u_axis = unpack_u_axis(&mut points);

    let surfaces = raw.faces[..face_count]
        .iter()
        .filter_map(|&face| match u32::try_from(face) {
            Ok(index) => Some(SurfaceHandle(index)),
            Err(_) => {
                log::warn!("overlay {} references bad face {}", raw.id, face);
                None
            }
        })
        .collect();

    // A negative minimum means the overlay only uses the global fade.
    let fade = fade
        .filter(|f| f.fade_dist_min_sq >= 0.0)
        .map(|f| FadeRange {
            min_sq: f.fade_dist_min_sq,
            max_sq: f.fade_dist_max_sq,
        });

    Ok(OverlayDesc {
        source_id: raw.id,
        tex_info: raw.tex_info,
        render_order: raw.render_order,
        origin: Vec3::from_array(raw.origin),
        normal: Vec3::from_array(raw.basis_normal),
        u_axis,
        flip: raw.flags & FLAG_FLIP != 0,
        uv_points: points.map(|p| p.truncate()),
        u_range: (raw.u[0], raw.u[1]),
        v_range: (raw.v[0], raw.v[1]),
        surfaces,
        fade,
    })
}

impl RawOverlay {
    /// Record for `desc`, packing the u axis the way the lump stores it.
    pub fn from_desc(desc: &OverlayDesc) -> Self {
        let mut raw = Self::zeroed();
        raw.id = desc.source_id;
        raw.tex_info = desc.tex_info;
        raw.render_order = desc.render_order;
        raw.flags = if desc.flip { FLAG_FLIP } else { 0 };

        let faces = desc.surfaces.len().min(MAX_OVERLAY_FACES);
        raw.face_count = faces as u16;
        for (slot, surface) in raw.faces.iter_mut().zip(&desc.surfaces) {
            *slot = surface.0 as i32;
        }

        raw.u = [desc.u_range.0, desc.u_range.1];
        raw.v = [desc.v_range.0, desc.v_range.1];
        let axis = desc.u_axis.to_array();
        for (i, point) in desc.uv_points.iter().enumerate() {
            let z = axis.get(i).copied().unwrap_or(0.0);
            raw.uv_points[i] = [point.x, point.y, z];
        }
        raw.origin = desc.origin.to_array();
        raw.basis_normal = desc.normal.to_array();
        raw
    }
}

impl From<FadeRange> for RawOverlayFade {
    fn from(fade: FadeRange) -> Self {
        Self {
            fade_dist_min_sq: fade.min_sq,
            fade_dist_max_sq: fade.max_sq,
        }
    }
}

impl RawOverlayFade {
    /// Fade record meaning "no per-overlay fade".
    pub const NONE: Self = Self {
        fade_dist_min_sq: -1.0,
        fade_dist_max_sq: 0.0,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_desc() -> OverlayDesc {
        OverlayDesc {
            source_id: 7,
            tex_info: 3,
            render_order: 2,
            origin: Vec3::new(1.0, 2.0, 3.0),
            normal: Vec3::Z,
            u_axis: Vec3::new(0.0, 1.0, 0.0),
            flip: true,
            u_range: (0.0, 0.5),
            v_range: (0.25, 1.0),
            surfaces: vec![SurfaceHandle(4), SurfaceHandle(9)],
            ..OverlayDesc::default()
        }
    }

    #[test]
    fn record_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<RawOverlay>(), 356);
        assert_eq!(std::mem::size_of::<RawOverlayFade>(), 8);
    }

    #[test]
    fn descriptions_survive_the_lump_format() {
        let desc = sample_desc();
        let raw = RawOverlay::from_desc(&desc);
        let loaded = load_descs(bytemuck::bytes_of(&raw), None).unwrap();
        assert_eq!(loaded, vec![desc]);
    }

    #[test]
    fn u_axis_is_unpacked_and_zeroed() {
        let raw = RawOverlay::from_desc(&sample_desc());
        assert_eq!(raw.uv_points[1][2], 1.0);
        let desc = to_desc(&raw, None).unwrap();
        assert_eq!(desc.u_axis, Vec3::Y);
    }

    #[test]
    fn unaligned_lump_bytes_are_accepted() {
        let raw = RawOverlay::from_desc(&sample_desc());
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(bytemuck::bytes_of(&raw));
        let records = parse_overlay_lump(&bytes[1..]).unwrap();
        assert_eq!(records[0].id, 7);
    }

    #[test]
    fn truncated_lump_is_fatal() {
        let raw = RawOverlay::from_desc(&sample_desc());
        let bytes = bytemuck::bytes_of(&raw);
        assert_eq!(
            parse_overlay_lump(&bytes[..bytes.len() - 1]).unwrap_err(),
            LoadError::LumpSize {
                lump: "overlay",
                len: 355,
                stride: 356
            }
        );
    }

    #[test]
    fn too_many_faces_is_fatal() {
        let mut raw = RawOverlay::from_desc(&sample_desc());
        raw.face_count = 65;
        assert!(matches!(
            to_desc(&raw, None),
            Err(LoadError::FaceCount { overlay: 7, count: 65, max: 64 })
        ));
    }

    #[test]
    fn fade_lump_must_match_overlay_count() {
        let raw = RawOverlay::from_desc(&sample_desc());
        let fades = [RawOverlayFade::NONE; 2];
        assert_eq!(
            load_descs(bytemuck::bytes_of(&raw), Some(bytemuck::cast_slice(&fades))).unwrap_err(),
            LoadError::FadeCount {
                overlays: 1,
                fades: 2
            }
        );
    }

    #[test]
    fn negative_fade_minimum_means_global_only() {
        let raw = RawOverlay::from_desc(&sample_desc());
        assert_eq!(to_desc(&raw, Some(&RawOverlayFade::NONE)).unwrap().fade, None);

        let fade = FadeRange {
            min_sq: 100.0,
            max_sq: 400.0,
        };
        let desc = to_desc(&raw, Some(&fade.into())).unwrap();
        assert_eq!(desc.fade, Some(fade));
    }
}
