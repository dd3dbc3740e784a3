mod helpers;

use std::rc::Rc;

use helpers::{init_logging, square, TestWorld};
use overlays::math::fan_area;
use overlays::records::{RawOverlay, RawOverlayFade};
use overlays::{
    FadeRange, GridDisplacement, LoadError, Material, OverlayDesc, OverlayId, OverlayManager,
    SurfaceHandle, Vec2, Vec3,
};

fn scaled_quad(half: f32) -> [Vec2; 4] {
    [
        Vec2::new(-half, -half),
        Vec2::new(half, -half),
        Vec2::new(half, half),
        Vec2::new(-half, half),
    ]
}

fn desc_on(surfaces: Vec<SurfaceHandle>) -> OverlayDesc {
    OverlayDesc {
        tex_info: 1,
        surfaces,
        ..OverlayDesc::default()
    }
}

#[test]
fn overlay_on_a_floor_gives_one_lifted_fragment() {
    init_logging();
    let mut world = TestWorld::new();
    let material = world.add_material(1, Material::new(10, "decals/scorch"));
    let floor = world.add_surface(square(-4.0, 4.0, 0.0), 0);

    let mut manager = OverlayManager::new();
    let id = manager.add_overlay(desc_on(vec![floor])).unwrap();
    assert_eq!(manager.rebuild_overlay(id, &world), 1);

    let fragments: Vec<_> = manager.surface_fragments(floor).collect();
    assert_eq!(fragments.len(), 1);
    let fragment = fragments[0];
    assert_eq!(fragment.overlay, id);
    assert_eq!(fragment.vertex_count(), 4);
    for v in &fragment.verts {
        assert!((v.pos.z - 0.1).abs() < 1e-5);
        assert!((v.normal - Vec3::Z).length() < 1e-5);
        assert!(v.tex[1].cmpge(Vec2::ZERO).all() && v.tex[1].cmple(Vec2::ONE).all());
    }

    // Test, world and one registry entry.
    assert_eq!(Rc::strong_count(&material), 3);
    let stats = manager.stats();
    assert_eq!(stats.fragments, 1);
    assert_eq!(stats.vertices, 4);
    assert_eq!(stats.sort_ids, 1);
}

#[test]
fn overlay_across_two_surfaces_is_split_between_them() {
    let mut world = TestWorld::new();
    world.add_material(1, Material::new(10, "decals/sign"));
    let left = world.add_surface(
        vec![
            Vec3::new(-4.0, -4.0, 0.0),
            Vec3::new(0.0, -4.0, 0.0),
            Vec3::new(0.0, 4.0, 0.0),
            Vec3::new(-4.0, 4.0, 0.0),
        ],
        0,
    );
    let right = world.add_surface(
        vec![
            Vec3::new(0.0, -4.0, 0.0),
            Vec3::new(4.0, -4.0, 0.0),
            Vec3::new(4.0, 4.0, 0.0),
            Vec3::new(0.0, 4.0, 0.0),
        ],
        0,
    );

    let mut manager = OverlayManager::new();
    let id = manager
        .add_overlay(OverlayDesc {
            uv_points: scaled_quad(1.0),
            ..desc_on(vec![left, right])
        })
        .unwrap();
    assert_eq!(manager.rebuild_overlay(id, &world), 2);

    let on_left: Vec<_> = manager.surface_fragments(left).collect();
    let on_right: Vec<_> = manager.surface_fragments(right).collect();
    assert_eq!(on_left.len(), 1);
    assert_eq!(on_right.len(), 1);
    assert!(on_left[0].verts.iter().all(|v| v.pos.x <= 1e-4));
    assert!(on_right[0].verts.iter().all(|v| v.pos.x >= -1e-4));

    let area: f32 = manager
        .overlay_fragments(id)
        .map(|f| fan_area(&f.verts.iter().map(|v| v.pos).collect::<Vec<_>>()))
        .sum();
    assert!((area - 4.0).abs() < 1e-3);

    // Same material and page on both sides.
    let sort = on_left[0].sort.as_ref().unwrap().id();
    assert_eq!(on_right[0].sort.as_ref().unwrap().id(), sort);
    assert_eq!(manager.sorts().ref_count(sort), 2);
}

#[test]
fn collapsed_quad_is_skipped_without_stopping_the_build() {
    init_logging();
    let mut world = TestWorld::new();
    world.add_material(1, Material::new(10, "decals/sign"));
    let left = world.add_surface(
        vec![
            Vec3::new(-4.0, -4.0, 0.0),
            Vec3::new(0.0, -4.0, 0.0),
            Vec3::new(0.0, 4.0, 0.0),
            Vec3::new(-4.0, 4.0, 0.0),
        ],
        0,
    );
    let right = world.add_surface(
        vec![
            Vec3::new(0.0, -4.0, 0.0),
            Vec3::new(4.0, -4.0, 0.0),
            Vec3::new(4.0, 4.0, 0.0),
            Vec3::new(0.0, 4.0, 0.0),
        ],
        0,
    );

    let mut manager = OverlayManager::new();
    let collapsed = manager
        .add_overlay(OverlayDesc {
            uv_points: [Vec2::ZERO; 4],
            ..desc_on(vec![left, right])
        })
        .unwrap();
    let good = manager
        .add_overlay(OverlayDesc {
            uv_points: scaled_quad(1.0),
            ..desc_on(vec![left, right])
        })
        .unwrap();
    assert!(manager.overlay(collapsed).unwrap().valid);

    assert_eq!(manager.build_all(&world), 2);
    assert_eq!(manager.overlay_fragments(collapsed).count(), 0);
    assert_eq!(manager.overlay_fragments(good).count(), 2);
    assert_eq!(manager.rebuild_overlay(collapsed, &world), 0);
    assert_eq!(manager.stats().fragments, 2);
}

#[test]
fn overlay_projects_onto_a_sloped_surface() {
    let mut world = TestWorld::new();
    world.add_material(1, Material::new(10, "decals/sign"));
    // Ramp rising along x, below an overlay that projects straight down.
    let ramp = world.add_surface(
        vec![
            Vec3::new(-4.0, -4.0, -4.0),
            Vec3::new(4.0, -4.0, 4.0),
            Vec3::new(4.0, 4.0, 4.0),
            Vec3::new(-4.0, 4.0, -4.0),
        ],
        0,
    );

    let mut manager = OverlayManager::new();
    let id = manager
        .add_overlay(OverlayDesc {
            origin: Vec3::new(0.0, 0.0, 10.0),
            ..desc_on(vec![ramp])
        })
        .unwrap();
    assert_eq!(manager.rebuild_overlay(id, &world), 1);

    let fragment = manager.overlay_fragments(id).next().unwrap();
    let up = Vec3::new(-1.0, 0.0, 1.0).normalize();
    for v in &fragment.verts {
        let on_ramp = v.pos - up * 0.1;
        assert!((on_ramp.z - on_ramp.x).abs() < 1e-4);
        assert!((v.normal - up).length() < 1e-4);
    }
}

#[test]
fn overlay_missing_its_surface_builds_nothing() {
    let mut world = TestWorld::new();
    world.add_material(1, Material::new(10, "decals/sign"));
    let far = world.add_surface(square(10.0, 20.0, 0.0), 0);

    let mut manager = OverlayManager::new();
    let id = manager.add_overlay(desc_on(vec![far, SurfaceHandle(99)])).unwrap();
    assert_eq!(manager.rebuild_overlay(id, &world), 0);
    assert_eq!(manager.stats().sort_ids, 0);
}

#[test]
fn degenerate_normal_marks_the_overlay_invalid() {
    init_logging();
    let mut world = TestWorld::new();
    world.add_material(1, Material::new(10, "decals/sign"));
    let floor = world.add_surface(square(-4.0, 4.0, 0.0), 0);

    let mut manager = OverlayManager::new();
    let id = manager
        .add_overlay(OverlayDesc {
            normal: Vec3::ZERO,
            ..desc_on(vec![floor])
        })
        .unwrap();
    assert_eq!(manager.rebuild_overlay(id, &world), 0);
    assert!(!manager.overlay(id).unwrap().valid);

    let stats = manager.stats();
    assert_eq!(stats.overlays, 1);
    assert_eq!(stats.invalid_overlays, 1);
    assert_eq!(stats.fragments, 0);
}

#[test]
fn non_convex_quad_is_rejected() {
    let mut manager = OverlayManager::new();
    let err = manager
        .add_overlay(OverlayDesc {
            source_id: 4,
            uv_points: [
                Vec2::ZERO,
                Vec2::new(2.0, 0.0),
                Vec2::new(0.5, 0.5),
                Vec2::new(0.0, 2.0),
            ],
            ..OverlayDesc::default()
        })
        .unwrap_err();
    assert_eq!(err, LoadError::NonConvexQuad { overlay: 4 });
}

fn flat_displacement(side: usize) -> GridDisplacement {
    GridDisplacement::new(
        side,
        [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(4.0, 0.0, 0.0),
            Vec3::new(4.0, 4.0, 0.0),
            Vec3::new(0.0, 4.0, 0.0),
        ],
        [Vec2::ZERO, Vec2::X, Vec2::ONE, Vec2::Y],
    )
}

#[test]
fn covering_a_displacement_gives_one_quad_per_cell() {
    let mut world = TestWorld::new();
    world.add_material(1, Material::new(10, "decals/moss"));
    let disp = world.add_displacement(flat_displacement(4), 0);

    let mut manager = OverlayManager::new();
    let id = manager
        .add_overlay(OverlayDesc {
            origin: Vec3::new(2.0, 2.0, 5.0),
            uv_points: scaled_quad(3.0),
            ..desc_on(vec![disp])
        })
        .unwrap();
    assert_eq!(manager.rebuild_overlay(id, &world), 16);

    let fragments: Vec<_> = manager.surface_fragments(disp).collect();
    assert_eq!(fragments.len(), 16);
    assert!(fragments.iter().all(|f| f.vertex_count() == 4));

    let area: f32 = fragments
        .iter()
        .map(|f| fan_area(&f.verts.iter().map(|v| v.pos).collect::<Vec<_>>()))
        .sum();
    assert!((area - 16.0).abs() < 1e-2);

    for v in fragments.iter().flat_map(|f| &f.verts) {
        assert!((v.pos.z - 0.1).abs() < 1e-4);
        assert!(v.normal.dot(Vec3::Z) > 0.99);
        // Lightmap spans the unit square across the 4x4 patch.
        assert!((v.lightmap - v.pos.truncate() / 4.0).length() < 1e-4);
    }
}

#[test]
fn displaced_fragments_follow_the_heights() {
    let mut world = TestWorld::new();
    world.add_material(1, Material::new(10, "decals/moss"));
    let mut grid = flat_displacement(4);
    grid.set_height(2, 2, 1.0);
    let disp = world.add_displacement(grid, 0);

    let mut manager = OverlayManager::new();
    let id = manager
        .add_overlay(OverlayDesc {
            origin: Vec3::new(2.0, 2.0, 5.0),
            uv_points: scaled_quad(1.5),
            ..desc_on(vec![disp])
        })
        .unwrap();
    let built = manager.rebuild_overlay(id, &world);
    assert!(built > 4);

    let peak = manager
        .overlay_fragments(id)
        .flat_map(|f| f.verts.iter())
        .find(|v| (v.pos.truncate() - Vec2::new(2.0, 2.0)).length() < 1e-3)
        .expect("a fragment vertex sits on the raised grid vertex");
    assert!((peak.pos.z - 1.1).abs() < 1e-3);
    for fragment in manager.overlay_fragments(id) {
        assert!(fragment.vertex_count() >= 3);
        assert!(fragment.verts.iter().all(|v| v.normal.z > 0.0));
    }
}

#[test]
fn load_reads_both_lumps() {
    init_logging();
    let mut world = TestWorld::new();
    world.add_material(1, Material::new(10, "decals/sign"));
    let floor = world.add_surface(square(-4.0, 4.0, 0.0), 0);

    let descs = [
        desc_on(vec![floor]),
        OverlayDesc {
            source_id: 1,
            origin: Vec3::new(2.0, 2.0, 0.0),
            u_axis: Vec3::Y,
            ..desc_on(vec![floor])
        },
    ];
    let raws: Vec<RawOverlay> = descs.iter().map(RawOverlay::from_desc).collect();
    let fades = [
        RawOverlayFade::NONE,
        RawOverlayFade::from(FadeRange {
            min_sq: 100.0,
            max_sq: 200.0,
        }),
    ];

    let mut manager = OverlayManager::new();
    let loaded = manager
        .load(
            bytemuck::cast_slice(&raws),
            Some(bytemuck::cast_slice(&fades)),
            &world,
        )
        .unwrap();
    assert_eq!(loaded, 2);
    assert_eq!(manager.stats().fragments, 2);

    let second = manager.overlay(OverlayId(1)).unwrap();
    assert!((second.basis.u - Vec3::Y).length() < 1e-5);
    assert_eq!(
        second.fade,
        Some(FadeRange {
            min_sq: 100.0,
            max_sq: 200.0
        })
    );
    assert_eq!(manager.overlay(OverlayId(0)).unwrap().fade, None);
}

#[test]
fn bad_render_order_aborts_the_load_and_keeps_the_old_overlays() {
    let mut world = TestWorld::new();
    world.add_material(1, Material::new(10, "decals/sign"));
    let floor = world.add_surface(square(-4.0, 4.0, 0.0), 0);

    let mut manager = OverlayManager::new();
    let good = [RawOverlay::from_desc(&desc_on(vec![floor]))];
    manager.load(bytemuck::cast_slice(&good), None, &world).unwrap();

    let bad = [RawOverlay::from_desc(&OverlayDesc {
        source_id: 3,
        render_order: 7,
        ..desc_on(vec![floor])
    })];
    let err = manager.load(bytemuck::cast_slice(&bad), None, &world).unwrap_err();
    assert_eq!(
        err,
        LoadError::RenderOrder {
            overlay: 3,
            value: 7,
            max: 3
        }
    );
    assert_eq!(manager.stats().overlays, 1);
    assert_eq!(manager.stats().fragments, 1);
}

#[test]
fn resort_moves_fragments_to_the_new_material() {
    let mut world = TestWorld::new();
    let old = world.add_material(1, Material::new(10, "decals/old"));
    let floor = world.add_surface(square(-4.0, 4.0, 0.0), 0);

    let mut manager = OverlayManager::new();
    let id = manager.add_overlay(desc_on(vec![floor])).unwrap();
    manager.rebuild_overlay(id, &world);
    assert_eq!(Rc::strong_count(&old), 3);

    let new = world.add_material(1, Material::new(11, "decals/new"));
    manager.resort(&world);

    let fragment = manager.overlay_fragments(id).next().unwrap();
    let sort = fragment.sort.as_ref().unwrap().id();
    assert_eq!(manager.sorts().material(sort).unwrap().name, "decals/new");
    assert_eq!(manager.sorts().len(), 1);
    // Only the test still holds the old material.
    assert_eq!(Rc::strong_count(&old), 1);
    assert_eq!(Rc::strong_count(&new), 3);
}

#[test]
fn resort_without_a_material_leaves_fragments_unsorted() {
    let mut world = TestWorld::new();
    let material = world.add_material(1, Material::new(10, "decals/sign"));
    let floor = world.add_surface(square(-4.0, 4.0, 0.0), 0);

    let mut manager = OverlayManager::new();
    let id = manager.add_overlay(desc_on(vec![floor])).unwrap();
    manager.rebuild_overlay(id, &world);

    world.remove_material(1);
    manager.resort(&world);
    assert!(manager.overlay_fragments(id).all(|f| f.sort.is_none()));
    assert!(manager.sorts().is_empty());
    assert_eq!(Rc::strong_count(&material), 1);
}

#[test]
fn purge_releases_everything() {
    let mut world = TestWorld::new();
    let material = world.add_material(1, Material::new(10, "decals/sign"));
    let floor = world.add_surface(square(-4.0, 4.0, 0.0), 0);

    let mut manager = OverlayManager::new();
    for _ in 0..3 {
        let id = manager.add_overlay(desc_on(vec![floor])).unwrap();
        manager.rebuild_overlay(id, &world);
    }
    assert_eq!(manager.surface_fragments(floor).count(), 3);

    manager.purge();
    assert_eq!(manager.stats(), Default::default());
    assert_eq!(Rc::strong_count(&material), 2);
}
