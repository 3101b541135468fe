use std::collections::HashSet;

use brep_tess::geom::{
    BrepError, BrepModel, EdgeId, FaceId, Line2, LoopId, LoopKind, ParamAxis, PlaneSurface, Point3, Surface,
    TorusSurface, TrimKind, UvDomain, UvPoint, Vec3, box_shell, cylinder_with_seam, pillow,
};
use brep_tess::tess::{
    BackendError, BridgeContext, CdtInput, CdtOutput, CdtTolerance, EmittedTriangle, LoopPoints, PatchLocals,
    PointId, SeamContext, SkipReason, TessError, TrimSamplePoint, TriangulationBackend, VertexRef, seam,
};
use brep_tess::{TessEngine, TessSettings};

fn shared_ids(triangles: &[EmittedTriangle]) -> HashSet<PointId> {
    triangles
        .iter()
        .flat_map(|t| t.vertices.iter().filter_map(|v| v.shared()))
        .collect()
}

fn sample(u: f64, v: f64, id: u32) -> TrimSamplePoint {
    TrimSamplePoint {
        t: 0.0,
        e: None,
        uv: UvPoint::new(u, v),
        vertex: VertexRef::Shared(PointId(id)),
        tangent: None,
        normal: None,
    }
}

// ============================================================================
// Worked scenarios
// ============================================================================

#[test]
fn cylinder_loop_near_the_seam_unwraps_to_a_small_negative_u() {
    let settings = TessSettings::default().with_abs(0.1).with_rel(0.01).with_min_dist(0.01);
    let model = cylinder_with_seam(1.0, 2.0).unwrap();
    let face = model.face_ids().find(|&f| model.face(f).surface.is_u_closed()).unwrap();
    let surface = model.face(face).surface.as_ref();

    let period = surface.period(ParamAxis::U).unwrap();
    let eps = 0.02;
    let lp = LoopPoints::new(
        LoopId(0),
        LoopKind::Outer,
        vec![
            sample(eps, 0.2, 0),
            sample(period - eps, 0.2, 1),
            sample(period - eps, 0.8, 2),
            sample(eps, 0.8, 3),
            sample(eps, 0.2, 0),
        ],
    );

    let ctx = SeamContext::from_surface(surface, settings.seam_tolerance);
    let mut locals = PatchLocals::new(settings.same_point_tolerance);
    let mut bridges = BridgeContext {
        surface,
        tolerance: CdtTolerance::for_surface(&settings, 2.0),
        max_depth: settings.max_subdivision_depth,
        locals: &mut locals,
    };
    let loops = seam::normalize(vec![lp], &ctx, &mut bridges).unwrap();

    let points = &loops[0].points;
    assert!((points[1].uv.u + eps).abs() < 1e-12, "u = {}", points[1].uv.u);
    assert!(points.windows(2).all(|w| (w[1].uv.u - w[0].uv.u).abs() < 0.5 * period));
    assert_eq!(points[1].vertex, VertexRef::Shared(PointId(1)));
    assert!(locals.is_empty());
}

#[test]
fn singular_trim_on_a_doubly_periodic_patch_samples_one_vertex() {
    let mut model = BrepModel::new();
    let surface = TorusSurface::from_center_xaxis_normal(Point3::ORIGIN, Vec3::X, Vec3::Z, 2.0, 0.5).unwrap();
    let pole = model.add_vertex(Point3::new(1.5, 0.0, 0.0));
    let face = model.add_face(surface, false);
    let lp = model.add_loop(face, LoopKind::Outer);
    model.add_trim(
        lp,
        TrimKind::Singular { vertex: pole },
        Line2::new(UvPoint::new(0.0, 0.5), UvPoint::new(1.0, 0.5)),
    );

    let engine = TessEngine::new(&model, TessSettings::default()).unwrap();
    let points = engine.sample_loop(lp).points;

    assert_eq!(points.len(), 11);
    assert!(points.iter().all(|p| p.vertex == VertexRef::Shared(PointId(pole.0))));
    for (i, p) in points.iter().enumerate() {
        assert!((p.uv.u - i as f64 / 10.0).abs() < 1e-12);
        assert!(p.e.is_none());
    }
    assert_eq!(engine.arena().get(PointId(pole.0)), Some(Point3::new(1.5, 0.0, 0.0)));
    assert_eq!(engine.arena().len(), 1);
}

#[test]
fn pillow_patches_meet_on_identical_edge_points() {
    // Straight edges are split on length alone: the 1.2 long polyline edge
    // ends up with 5 interior samples.
    let settings = TessSettings::default().with_rel(0.0).with_max_edge_length(Some(0.35));
    let model = pillow().unwrap();
    let engine = TessEngine::new(&model, settings).unwrap();

    let edge = EdgeId(0);
    let samples = engine.edge_samples(edge);
    assert_eq!(samples.len(), 7);
    let expected_e = [0.0, 0.25, 0.5, 0.75, 1.0, 1.5, 2.0];
    for (e, want) in samples.e_values.iter().zip(expected_e) {
        assert!((e - want).abs() < 1e-12);
    }

    let faces: Vec<FaceId> = model.face_ids().collect();
    let top = engine.triangulate_patch(faces[0]).unwrap();
    let bottom = engine.triangulate_patch(faces[1]).unwrap();

    let top_ids = shared_ids(&top.triangles);
    let bottom_ids = shared_ids(&bottom.triangles);
    for id in &samples.points {
        assert!(top_ids.contains(id), "top patch misses {id}");
        assert!(bottom_ids.contains(id), "bottom patch misses {id}");
    }

    // Positions are read from the arena, never recomputed per patch.
    for t in top.triangles.iter().chain(&bottom.triangles) {
        for (v, p) in t.vertices.iter().zip(t.positions) {
            if let Some(id) = v.shared() {
                let stored = engine.arena().get(id).unwrap();
                assert_eq!(stored.to_array().map(f64::to_bits), p.to_array().map(f64::to_bits));
            }
        }
    }

    let [t0, t1] = samples.trims;
    let forward: Vec<VertexRef> = samples.for_trim(t0).iter().map(|s| s.vertex).collect();
    let mut backward: Vec<VertexRef> = samples.for_trim(t1).iter().map(|s| s.vertex).collect();
    backward.reverse();
    assert_eq!(forward, backward);
}

// ============================================================================
// Edge cache properties
// ============================================================================

#[test]
fn repeated_edge_requests_return_the_cached_samples() {
    let model = box_shell(Vec3::new(1.0, 1.0, 1.0)).unwrap();
    let settings = TessSettings::default().with_max_edge_length(Some(0.3));
    let engine = TessEngine::new(&model, settings).unwrap();

    let first = engine.edge_samples(EdgeId(3));
    let arena_len = engine.arena().len();
    let second = engine.edge_samples(EdgeId(3));

    assert!(std::ptr::eq(first, second));
    assert_eq!(first.points, second.points);
    assert_eq!(engine.arena().len(), arena_len);
    assert_eq!(engine.cache_stats().misses, 1);
    assert_eq!(engine.cache_stats().hits, 1);
}

#[test]
fn edge_samples_do_not_depend_on_which_patch_asks_first() {
    let model = box_shell(Vec3::new(1.0, 2.0, 0.5)).unwrap();
    let settings = TessSettings::default().with_max_edge_length(Some(0.3));
    let forward = TessEngine::new(&model, settings.clone()).unwrap();
    let backward = TessEngine::new(&model, settings).unwrap();

    let faces: Vec<FaceId> = model.face_ids().collect();
    for &f in &faces {
        for &l in &model.face(f).loops {
            forward.sample_loop(l);
        }
    }
    for &f in faces.iter().rev() {
        for &l in &model.face(f).loops {
            backward.sample_loop(l);
        }
    }

    for edge in model.edge_ids() {
        let a = forward.edge_samples(edge);
        let b = backward.edge_samples(edge);
        assert_eq!(a.e_values, b.e_values);
        let pa: Vec<Point3> = a.points.iter().map(|&id| forward.arena().get(id).unwrap()).collect();
        let pb: Vec<Point3> = b.points.iter().map(|&id| backward.arena().get(id).unwrap()).collect();
        assert_eq!(pa, pb);

        let [t0, t1] = a.trims;
        let mut other: Vec<VertexRef> = a.for_trim(t1).iter().map(|s| s.vertex).collect();
        other.reverse();
        let own: Vec<VertexRef> = a.for_trim(t0).iter().map(|s| s.vertex).collect();
        assert_eq!(own, other);
    }
}

// ============================================================================
// Seam normalization
// ============================================================================

#[test]
fn normalization_is_identity_on_planar_patches() {
    let model = pillow().unwrap();
    let engine = TessEngine::new(&model, TessSettings::default()).unwrap();

    for face in model.face_ids() {
        let surface = model.face(face).surface.as_ref();
        let loops: Vec<LoopPoints> = model.face(face).loops.iter().map(|&l| engine.sample_loop(l)).collect();
        let ctx = SeamContext::from_surface(surface, 1e-9);
        assert!(!ctx.is_periodic());

        let mut locals = PatchLocals::new(1e-6);
        let mut bridges = BridgeContext {
            surface,
            tolerance: CdtTolerance::for_surface(engine.settings(), 1.0),
            max_depth: 24,
            locals: &mut locals,
        };
        let normalized = seam::normalize(loops.clone(), &ctx, &mut bridges).unwrap();
        assert_eq!(normalized, loops);
    }
}

#[test]
fn open_loop_with_odd_seam_crossings_is_unresolved() {
    let model = cylinder_with_seam(1.0, 2.0).unwrap();
    let face = model.face_ids().find(|&f| model.face(f).surface.is_u_closed()).unwrap();
    let surface = model.face(face).surface.as_ref();

    let raw = [0.1, 0.4, 0.7];
    let points: Vec<TrimSamplePoint> = (0..10)
        .map(|i| sample(raw[i % 3], i as f64 * 0.1, i as u32))
        .collect();
    let lp = LoopPoints::new(LoopId(0), LoopKind::Outer, points);

    let ctx = SeamContext::from_surface(surface, 1e-9);
    let mut locals = PatchLocals::new(1e-6);
    let mut bridges = BridgeContext {
        surface,
        tolerance: CdtTolerance::for_surface(&TessSettings::default(), 2.0),
        max_depth: 24,
        locals: &mut locals,
    };
    let err = seam::normalize(vec![lp], &ctx, &mut bridges).unwrap_err();
    assert!(matches!(err, SkipReason::UnresolvedLoop(_)), "{err}");
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn edge_with_three_trims_is_fatal() {
    let mut model = box_shell(Vec3::new(1.0, 1.0, 1.0)).unwrap();
    let extra = model.add_face(PlaneSurface::new(Point3::ORIGIN, Vec3::X, Vec3::Y), false);
    let lp = model.add_loop(extra, LoopKind::Outer);
    model.add_trim(
        lp,
        TrimKind::Boundary {
            edge: EdgeId(0),
            reversed: false,
        },
        Line2::new(UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0)),
    );

    match TessEngine::new(&model, TessSettings::default()) {
        Err(TessError::Model(BrepError::NonManifoldEdge { edge, trim_count })) => {
            assert_eq!(edge, EdgeId(0));
            assert_eq!(trim_count, 3);
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("non-manifold model accepted"),
    }
}

#[test]
fn collapsed_surface_is_skipped() {
    let mut model = BrepModel::new();
    let v = model.add_vertex(Point3::ORIGIN);
    let face = model.add_face(
        PlaneSurface::new(Point3::ORIGIN, Vec3::ZERO, Vec3::ZERO).with_domain(UvDomain::unit()),
        false,
    );
    let lp = model.add_loop(face, LoopKind::Outer);
    model.add_trim(
        lp,
        TrimKind::Singular { vertex: v },
        Line2::new(UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0)),
    );

    let engine = TessEngine::new(&model, TessSettings::default()).unwrap();
    let skip = engine.triangulate_patch(face).unwrap_err();
    assert_eq!(skip.face, face);
    assert!(matches!(skip.reason, SkipReason::DegenerateSurface(_)));

    let (mesh, report) = engine.tessellate_mesh();
    assert_eq!(mesh.triangle_count(), 0);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.diagnostics.skipped_patch_count, 1);
    assert!(!report.is_complete());
}

#[derive(Debug)]
struct RejectEverything;

impl TriangulationBackend for RejectEverything {
    fn triangulate(&self, _input: &CdtInput) -> Result<CdtOutput, BackendError> {
        Err(BackendError::ZeroArea)
    }
}

#[test]
fn backend_failure_skips_patches_but_keeps_going() {
    let model = box_shell(Vec3::new(1.0, 1.0, 1.0)).unwrap();
    let engine = TessEngine::new(&model, TessSettings::default())
        .unwrap()
        .with_backend(RejectEverything);

    let (mesh, report) = engine.tessellate_mesh();
    assert_eq!(mesh.triangle_count(), 0);
    assert_eq!(report.skipped.len(), model.faces.len());
    assert!(report.skipped.iter().all(|s| s.reason == SkipReason::TriangulationBackendFailure(BackendError::ZeroArea)));
    assert_eq!(report.diagnostics.warnings.len(), model.faces.len());
}

#[test]
fn settings_from_xml_drive_the_engine() {
    let settings = TessSettings::from_xml_str(r#"<tess rel="0" max_edge_length="0.25"/>"#).unwrap();
    let model = box_shell(Vec3::new(1.0, 1.0, 1.0)).unwrap();
    let engine = TessEngine::new(&model, settings).unwrap();
    assert_eq!(engine.edge_samples(EdgeId(0)).len(), 5);

    let bad = TessSettings::default().with_min_dist(-1.0);
    assert!(matches!(TessEngine::new(&model, bad), Err(TessError::Settings(_))));
}
