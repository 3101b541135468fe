use crate::geom::{
    BrepError, BrepModel, EdgeId, Line2, Line3, LoopKind, PlaneSurface, Point3, TrimKind, UvPoint, Vec3, box_shell,
    VertexId, cylinder_bridged, cylinder_with_seam, pillow, sphere_shell, torus_shell,
};

/// One unit-square face whose four edges are each used once.
fn open_square() -> (BrepModel, [EdgeId; 4]) {
    let mut model = BrepModel::new();
    let corners = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
    ];
    let uvs = [
        UvPoint::new(0.0, 0.0),
        UvPoint::new(1.0, 0.0),
        UvPoint::new(1.0, 1.0),
        UvPoint::new(0.0, 1.0),
    ];
    let vertices: Vec<_> = corners.iter().map(|p| model.add_vertex(*p)).collect();
    let face = model.add_face(PlaneSurface::new(Point3::ORIGIN, Vec3::X, Vec3::Y), false);
    let lp = model.add_loop(face, LoopKind::Outer);

    let mut edges = [EdgeId(0); 4];
    for k in 0..4 {
        let j = (k + 1) % 4;
        edges[k] = model.add_edge(Line3::new(corners[k], corners[j]), vertices[k], vertices[j]);
        model.add_trim(
            lp,
            TrimKind::Boundary {
                edge: edges[k],
                reversed: false,
            },
            Line2::new(uvs[k], uvs[j]),
        );
    }
    (model, edges)
}

#[test]
fn primitives_validate() {
    let models = [
        ("box", box_shell(Vec3::new(1.0, 2.0, 3.0))),
        ("cylinder", cylinder_with_seam(1.0, 2.0)),
        ("cylinder_bridged", cylinder_bridged(1.0, 2.0, 0.25)),
        ("torus", torus_shell(2.0, 0.5)),
        ("sphere", sphere_shell(1.0)),
        ("pillow", pillow()),
    ];
    for (name, model) in models {
        let model = model.unwrap_or_else(|e| panic!("{name}: {e}"));
        model.validate().unwrap_or_else(|e| panic!("{name}: {e}"));
    }
}

#[test]
fn primitives_reject_bad_dimensions() {
    assert!(box_shell(Vec3::new(1.0, 0.0, 1.0)).is_err());
    assert!(cylinder_with_seam(1.0, -1.0).is_err());
    assert!(cylinder_bridged(1.0, 1.0, f64::INFINITY).is_err());
    assert!(torus_shell(1.0, 2.0).is_err());
}

#[test]
fn box_shell_has_closed_topology() {
    let model = box_shell(Vec3::new(1.0, 1.0, 1.0)).unwrap();
    assert_eq!(model.vertices.len(), 8);
    assert_eq!(model.edges.len(), 12);
    assert_eq!(model.faces.len(), 6);
    assert!(model.edges.iter().all(|e| e.trims.len() == 2));
}

#[test]
fn open_edge_is_non_manifold() {
    let (model, edges) = open_square();
    let err = model.validate().unwrap_err();
    assert_eq!(
        err,
        BrepError::NonManifoldEdge {
            edge: edges[0],
            trim_count: 1
        }
    );
    assert!(err.to_string().contains("e0"));
}

#[test]
fn empty_loop_is_rejected() {
    let mut model = pillow().unwrap();
    let face = model.face_ids().next().unwrap();
    let lp = model.add_loop(face, LoopKind::Inner);
    assert_eq!(model.validate(), Err(BrepError::EmptyLoop(lp)));
}

#[test]
fn second_outer_loop_is_rejected() {
    let mut model = pillow().unwrap();
    let face = model.face_ids().nth(1).unwrap();
    let lp = model.add_loop(face, LoopKind::Outer);
    let centre = UvPoint::new(0.5, 0.5);
    model.add_trim(lp, TrimKind::Singular { vertex: VertexId(0) }, Line2::new(centre, centre));
    assert_eq!(
        model.validate(),
        Err(BrepError::OuterLoopCount {
            face,
            outer_count: 2
        })
    );
}

#[test]
fn outer_loop_is_listed_first() {
    let mut model = BrepModel::new();
    let face = model.add_face(PlaneSurface::new(Point3::ORIGIN, Vec3::X, Vec3::Y), false);
    let inner = model.add_loop(face, LoopKind::Inner);
    let outer = model.add_loop(face, LoopKind::Outer);
    assert_eq!(model.face(face).loops, vec![outer, inner]);
}

#[test]
fn trims_register_with_their_edge() {
    let model = pillow().unwrap();
    for id in model.edge_ids() {
        let edge = model.edge(id);
        let faces: Vec<_> = edge.trims.iter().map(|t| model.trim(*t).face).collect();
        assert_eq!(faces.len(), 2);
        assert_ne!(faces[0], faces[1]);
        for t in &edge.trims {
            assert_eq!(model.trim(*t).edge().map(|(e, _)| e), Some(id));
        }
    }
}
