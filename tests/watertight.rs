use std::f64::consts::PI;

use brep_tess::geom::{
    BrepModel, GeomMesh, Vec3, box_shell, cylinder_bridged, cylinder_with_seam, pillow, sphere_shell, torus_shell,
};
use brep_tess::tess::EmittedTriangle;
use brep_tess::{TessEngine, TessReport, TessSettings};

fn tessellate(model: &BrepModel, settings: TessSettings) -> (GeomMesh, TessReport) {
    let engine = TessEngine::new(model, settings).expect("valid model");
    engine.tessellate_mesh()
}

fn assert_closed(name: &str, mesh: &GeomMesh, report: &TessReport) {
    assert!(report.is_complete(), "{name}: skipped {:?}", report.skipped);
    assert!(mesh.triangle_count() > 0, "{name}: empty mesh");
    mesh.validate().unwrap_or_else(|e| panic!("{name}: {e}"));
    assert_eq!(report.diagnostics.open_edge_count, 0, "{name}: {}", report.diagnostics.summary());
    assert_eq!(report.diagnostics.non_manifold_edge_count, 0, "{name}: {}", report.diagnostics.summary());
    assert!(report.diagnostics.is_watertight());
}

#[test]
fn box_is_watertight() {
    let model = box_shell(Vec3::new(1.0, 2.0, 3.0)).unwrap();
    let (mesh, report) = tessellate(&model, TessSettings::default());
    assert_closed("box", &mesh, &report);
    assert!((mesh.signed_volume() - 6.0).abs() < 1e-9);
}

#[test]
fn seamed_cylinder_is_watertight() {
    let model = cylinder_with_seam(1.0, 2.0).unwrap();
    let (mesh, report) = tessellate(&model, TessSettings::default());
    assert_closed("cylinder", &mesh, &report);

    let exact = PI * 2.0;
    let volume = mesh.signed_volume();
    assert!(volume > 0.9 * exact && volume < exact, "volume {volume}");
}

#[test]
fn bridged_cylinder_is_watertight() {
    for phase in [0.0, 0.25] {
        let model = cylinder_bridged(1.0, 2.0, phase).unwrap();
        let (mesh, report) = tessellate(&model, TessSettings::default());
        let name = format!("cylinder_bridged(phase={phase})");
        assert_closed(&name, &mesh, &report);

        let volume = mesh.signed_volume();
        assert!(volume > 0.9 * PI * 2.0 && volume < PI * 2.0, "{name}: volume {volume}");
    }
}

#[test]
fn torus_is_watertight() {
    let model = torus_shell(2.0, 0.5).unwrap();
    let (mesh, report) = tessellate(&model, TessSettings::default());
    assert_closed("torus", &mesh, &report);

    let exact = 2.0 * PI * PI * 2.0 * 0.25;
    let volume = mesh.signed_volume();
    assert!(volume > 0.9 * exact && volume < 1.01 * exact, "volume {volume}");
}

#[test]
fn thin_torus_keeps_its_tube_under_a_coarse_tolerance() {
    // Tube diameter equals the absolute tolerance.
    let model = torus_shell(10.0, 0.05).unwrap();
    let settings = TessSettings::default().with_abs(0.1).with_rel(0.01).with_min_dist(0.01);
    let (mesh, report) = tessellate(&model, settings);
    assert_closed("thin torus", &mesh, &report);

    let exact = 2.0 * PI * PI * 10.0 * 0.05 * 0.05;
    let volume = mesh.signed_volume();
    assert!(volume > 0.5 * exact && volume < exact, "volume {volume}, exact {exact}");
}

#[test]
fn sphere_is_watertight_across_tolerances() {
    let cases = [
        ("default", TessSettings::default()),
        (
            "fine",
            TessSettings::default().with_abs(0.01).with_rel(0.001).with_norm(0.1).with_min_dist(0.001),
        ),
        ("angular", TessSettings::default().with_rel(0.0).with_norm(0.3)),
        ("edge length", TessSettings::default().with_max_edge_length(Some(0.2))),
    ];

    let model = sphere_shell(1.0).unwrap();
    let exact = 4.0 / 3.0 * PI;
    for (name, settings) in cases {
        let (mesh, report) = tessellate(&model, settings);
        let name = format!("sphere ({name})");
        assert_closed(&name, &mesh, &report);

        let volume = mesh.signed_volume();
        assert!(volume > 0.8 * exact && volume < 1.001 * exact, "{name}: volume {volume}");
    }
}

#[test]
fn capped_sphere_interior_still_covers_the_surface() {
    let radius = 10.0;
    let model = sphere_shell(radius).unwrap();
    let settings = TessSettings::default()
        .with_max_edge_length(Some(0.5))
        .with_max_interior_points(3000);
    let (mesh, report) = tessellate(&model, settings);
    assert_closed("capped sphere", &mesh, &report);

    assert_eq!(report.diagnostics.capped_patch_count, 1);
    assert!(report.diagnostics.warnings.iter().any(|w| w.contains("max_interior_points")));

    let exact = 4.0 * PI * radius * radius;
    let area = mesh.surface_area();
    assert!((area - exact).abs() < 0.03 * exact, "area {area}, exact {exact}");
}

#[test]
fn pillow_is_watertight_with_zero_volume() {
    let model = pillow().unwrap();
    let (mesh, report) = tessellate(&model, TessSettings::default());
    assert_closed("pillow", &mesh, &report);
    assert!(mesh.signed_volume().abs() < 1e-12);
}

#[test]
fn no_triangle_below_the_area_threshold() {
    let settings = TessSettings::default().with_min_triangle_area(1e-6);
    let model = torus_shell(2.0, 0.5).unwrap();
    let engine = TessEngine::new(&model, settings).unwrap();

    let mut triangles: Vec<EmittedTriangle> = Vec::new();
    let report = engine.tessellate(&mut triangles);

    assert!(report.is_complete());
    assert!(!triangles.is_empty());
    assert!(triangles.iter().all(|t| t.area() >= 1e-6));
}

#[test]
fn emitted_normals_point_out_of_the_solid() {
    let model = box_shell(Vec3::new(1.0, 1.0, 1.0)).unwrap();
    let engine = TessEngine::new(&model, TessSettings::default()).unwrap();
    let mut triangles: Vec<EmittedTriangle> = Vec::new();
    engine.tessellate(&mut triangles);

    for t in &triangles {
        let [a, b, c] = t.positions;
        let facet = b.sub_point(a).cross(c.sub_point(a));
        assert!(facet.dot(t.normals[0]) > 0.0);

        let centroid = Vec3::new((a.x + b.x + c.x) / 3.0, (a.y + b.y + c.y) / 3.0, (a.z + b.z + c.z) / 3.0);
        let from_centre = centroid.add(Vec3::new(-0.5, -0.5, -0.5));
        assert!(from_centre.dot(t.normals[0]) > 0.0);
    }
}
