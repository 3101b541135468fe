//! Small closed shells used by the CLI scenarios and the test-suite.
//!
//! Every builder returns a validated-by-construction [`BrepModel`]: each edge is
//! used by exactly two trims and every face has one outer loop.

use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

use super::brep::{BrepModel, EdgeId, LoopKind, TrimKind, VertexId};
use super::core::{Point3, Vec3};
use super::curve::{Arc3, Line3, Polyline3};
use super::surface::{CylinderSurface, PlaneSurface, SphereSurface, TorusSurface};
use super::trim::{Arc2, Line2, Polyline2, UvDomain, UvPoint};

/// Axis-aligned box with one corner at the origin.
///
/// Each side is a unit-domain plane whose normal points outward.
pub fn box_shell(size: Vec3) -> Result<BrepModel, String> {
    if !size.is_finite() || size.x <= 0.0 || size.y <= 0.0 || size.z <= 0.0 {
        return Err("box size must be finite and > 0".to_string());
    }

    let mut model = BrepModel::new();
    let corners = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(size.x, 0.0, 0.0),
        Point3::new(size.x, size.y, 0.0),
        Point3::new(0.0, size.y, 0.0),
        Point3::new(0.0, 0.0, size.z),
        Point3::new(size.x, 0.0, size.z),
        Point3::new(size.x, size.y, size.z),
        Point3::new(0.0, size.y, size.z),
    ];
    let vertices: Vec<VertexId> = corners.iter().map(|p| model.add_vertex(*p)).collect();

    // Counter-clockwise seen from outside.
    let quads: [[usize; 4]; 6] = [
        [0, 3, 2, 1],
        [4, 5, 6, 7],
        [0, 1, 5, 4],
        [3, 7, 6, 2],
        [0, 4, 7, 3],
        [1, 2, 6, 5],
    ];
    let quad_uv = [
        UvPoint::new(0.0, 0.0),
        UvPoint::new(1.0, 0.0),
        UvPoint::new(1.0, 1.0),
        UvPoint::new(0.0, 1.0),
    ];

    let mut edges: HashMap<(usize, usize), EdgeId> = HashMap::new();
    for quad in quads {
        let a = corners[quad[0]];
        let b = corners[quad[1]];
        let d = corners[quad[3]];
        let face = model.add_face(PlaneSurface::new(a, b.sub_point(a), d.sub_point(a)), false);
        let lp = model.add_loop(face, LoopKind::Outer);

        for k in 0..4 {
            let (i, j) = (quad[k], quad[(k + 1) % 4]);
            let kind = if let Some(&edge) = edges.get(&(j, i)) {
                TrimKind::Boundary { edge, reversed: true }
            } else {
                let edge = model.add_edge(Line3::new(corners[i], corners[j]), vertices[i], vertices[j]);
                edges.insert((i, j), edge);
                TrimKind::Boundary { edge, reversed: false }
            };
            model.add_trim(lp, kind, Line2::new(quad_uv[k], quad_uv[(k + 1) % 4]));
        }
    }

    Ok(model)
}

struct CylinderParts {
    model: BrepModel,
    lateral: CylinderSurface,
    bottom: EdgeId,
    top: EdgeId,
    v_bottom: VertexId,
    v_top: VertexId,
}

/// Lateral surface, the two rim circles and their planar caps.
///
/// Rims start at angle `2π·phase`; the lateral face is left without loops.
fn cylinder_parts(radius: f64, height: f64, phase: f64) -> Result<CylinderParts, String> {
    if !height.is_finite() || height <= 0.0 {
        return Err("cylinder height must be finite and > 0".to_string());
    }
    let lateral = CylinderSurface::from_base_axis_xaxis(Point3::ORIGIN, Vec3::new(0.0, 0.0, height), Vec3::X, radius)?;

    let mut model = BrepModel::new();
    let start_angle = TAU * phase;
    let (sin0, cos0) = start_angle.sin_cos();
    let v_bottom = model.add_vertex(Point3::new(radius * cos0, radius * sin0, 0.0));
    let v_top = model.add_vertex(Point3::new(radius * cos0, radius * sin0, height));

    let bottom_arc = Arc3::from_center_xaxis_normal(Point3::ORIGIN, Vec3::X, Vec3::Z, radius, start_angle, TAU)?;
    let top_arc = Arc3::from_center_xaxis_normal(
        Point3::new(0.0, 0.0, height),
        Vec3::X,
        Vec3::Z,
        radius,
        start_angle,
        TAU,
    )?;
    let bottom = model.add_edge(bottom_arc, v_bottom, v_bottom);
    let top = model.add_edge(top_arc, v_top, v_top);

    let cap_domain = UvDomain::new(-radius, radius, -radius, radius);

    // Bottom cap: u along Y, v along X so the normal points down.
    let bottom_cap = model.add_face(
        PlaneSurface::new(Point3::ORIGIN, Vec3::Y, Vec3::X).with_domain(cap_domain),
        false,
    );
    let lp = model.add_loop(bottom_cap, LoopKind::Outer);
    model.add_trim(
        lp,
        TrimKind::Boundary {
            edge: bottom,
            reversed: true,
        },
        Arc2::new(UvPoint::new(0.0, 0.0), radius, FRAC_PI_2 - start_angle, TAU),
    );

    let top_cap = model.add_face(
        PlaneSurface::new(Point3::new(0.0, 0.0, height), Vec3::X, Vec3::Y).with_domain(cap_domain),
        false,
    );
    let lp = model.add_loop(top_cap, LoopKind::Outer);
    model.add_trim(
        lp,
        TrimKind::Boundary {
            edge: top,
            reversed: false,
        },
        Arc2::new(UvPoint::new(0.0, 0.0), radius, start_angle, TAU),
    );

    Ok(CylinderParts {
        model,
        lateral,
        bottom,
        top,
        v_bottom,
        v_top,
    })
}

/// Capped cylinder whose lateral face is cut open along a seam edge at angle 0.
///
/// The lateral outer loop runs along the bottom rim, up the seam at `u = 1`,
/// back along the top rim and down the seam at `u = 0`.
pub fn cylinder_with_seam(radius: f64, height: f64) -> Result<BrepModel, String> {
    let CylinderParts {
        mut model,
        lateral,
        bottom,
        top,
        v_bottom,
        v_top,
    } = cylinder_parts(radius, height, 0.0)?;

    let seam = model.add_edge(
        Line3::new(model.vertex(v_bottom).point, model.vertex(v_top).point),
        v_bottom,
        v_top,
    );

    let face = model.add_face(lateral, false);
    let lp = model.add_loop(face, LoopKind::Outer);
    let uv = UvPoint::new;
    model.add_trim(
        lp,
        TrimKind::Boundary {
            edge: bottom,
            reversed: false,
        },
        Line2::new(uv(0.0, 0.0), uv(1.0, 0.0)),
    );
    model.add_trim(
        lp,
        TrimKind::Boundary {
            edge: seam,
            reversed: false,
        },
        Line2::new(uv(1.0, 0.0), uv(1.0, 1.0)),
    );
    model.add_trim(
        lp,
        TrimKind::Boundary {
            edge: top,
            reversed: true,
        },
        Line2::new(uv(1.0, 1.0), uv(0.0, 1.0)),
    );
    model.add_trim(
        lp,
        TrimKind::Boundary {
            edge: seam,
            reversed: true,
        },
        Line2::new(uv(0.0, 1.0), uv(0.0, 0.0)),
    );

    Ok(model)
}

/// Capped cylinder whose lateral face has one loop per rim and no seam edge.
///
/// The rims start at angle `2π·phase`; a phase outside `{0, 1}` makes both rim
/// loops straddle the `u` seam.
pub fn cylinder_bridged(radius: f64, height: f64, phase: f64) -> Result<BrepModel, String> {
    if !phase.is_finite() {
        return Err("cylinder phase must be finite".to_string());
    }
    let CylinderParts {
        mut model,
        lateral,
        bottom,
        top,
        ..
    } = cylinder_parts(radius, height, phase)?;

    let face = model.add_face(lateral, false);
    let uv = UvPoint::new;

    let lp = model.add_loop(face, LoopKind::Outer);
    model.add_trim(
        lp,
        TrimKind::Boundary {
            edge: bottom,
            reversed: false,
        },
        Line2::new(uv(phase, 0.0), uv(phase + 1.0, 0.0)),
    );

    let lp = model.add_loop(face, LoopKind::Inner);
    model.add_trim(
        lp,
        TrimKind::Boundary {
            edge: top,
            reversed: true,
        },
        Line2::new(uv(phase + 1.0, 1.0), uv(phase, 1.0)),
    );

    Ok(model)
}

/// Torus around Z cut open along one `u` circle and one `v` circle.
pub fn torus_shell(major_radius: f64, minor_radius: f64) -> Result<BrepModel, String> {
    let surface = TorusSurface::from_center_xaxis_normal(Point3::ORIGIN, Vec3::X, Vec3::Z, major_radius, minor_radius)?;

    let mut model = BrepModel::new();
    let v = model.add_vertex(Point3::new(major_radius + minor_radius, 0.0, 0.0));

    let u_circle = Arc3::from_center_xaxis_normal(Point3::ORIGIN, Vec3::X, Vec3::Z, major_radius + minor_radius, 0.0, TAU)?;
    // Tube circle in the XZ plane; its y axis is +Z.
    let v_circle = Arc3::from_center_xaxis_normal(
        Point3::new(major_radius, 0.0, 0.0),
        Vec3::X,
        Vec3::new(0.0, -1.0, 0.0),
        minor_radius,
        0.0,
        TAU,
    )?;
    let eu = model.add_edge(u_circle, v, v);
    let ev = model.add_edge(v_circle, v, v);

    let face = model.add_face(surface, false);
    let lp = model.add_loop(face, LoopKind::Outer);
    let uv = UvPoint::new;
    let trims = [
        (eu, false, uv(0.0, 0.0), uv(1.0, 0.0)),
        (ev, false, uv(1.0, 0.0), uv(1.0, 1.0)),
        (eu, true, uv(1.0, 1.0), uv(0.0, 1.0)),
        (ev, true, uv(0.0, 1.0), uv(0.0, 0.0)),
    ];
    for (edge, reversed, a, b) in trims {
        model.add_trim(lp, TrimKind::Boundary { edge, reversed }, Line2::new(a, b));
    }

    Ok(model)
}

/// Sphere cut along the meridian at angle 0, with singular trims at both poles.
pub fn sphere_shell(radius: f64) -> Result<BrepModel, String> {
    let surface = SphereSurface::from_center_xaxis_normal(Point3::ORIGIN, Vec3::X, Vec3::Z, radius)?;

    let mut model = BrepModel::new();
    let south = model.add_vertex(Point3::new(0.0, 0.0, -radius));
    let north = model.add_vertex(Point3::new(0.0, 0.0, radius));

    let meridian = Arc3::from_center_xaxis_normal(
        Point3::ORIGIN,
        Vec3::X,
        Vec3::new(0.0, -1.0, 0.0),
        radius,
        -FRAC_PI_2,
        PI,
    )?;
    let seam = model.add_edge(meridian, south, north);

    let face = model.add_face(surface, false);
    let lp = model.add_loop(face, LoopKind::Outer);
    let uv = UvPoint::new;
    model.add_trim(
        lp,
        TrimKind::Singular { vertex: south },
        Line2::new(uv(0.0, 0.0), uv(1.0, 0.0)),
    );
    model.add_trim(
        lp,
        TrimKind::Boundary {
            edge: seam,
            reversed: false,
        },
        Line2::new(uv(1.0, 0.0), uv(1.0, 1.0)),
    );
    model.add_trim(
        lp,
        TrimKind::Singular { vertex: north },
        Line2::new(uv(1.0, 1.0), uv(0.0, 1.0)),
    );
    model.add_trim(
        lp,
        TrimKind::Boundary {
            edge: seam,
            reversed: true,
        },
        Line2::new(uv(0.0, 1.0), uv(0.0, 0.0)),
    );

    Ok(model)
}

/// Two coincident planar patches glued along their whole boundary.
///
/// The first patch faces +Z with `u = x`, `v = y`; the second faces -Z with
/// `u = y`, `v = x`. The edge along the X axis is a three-point polyline on
/// the parameter domain `[0, 2]` so that its parameter is not proportional to
/// arc length.
pub fn pillow() -> Result<BrepModel, String> {
    let mut model = BrepModel::new();
    let p = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.2, 0.0, 0.0),
        Point3::new(1.2, 1.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
    ];
    let v: Vec<VertexId> = p.iter().map(|pt| model.add_vertex(*pt)).collect();

    let e0 = model.add_edge(
        Polyline3::new(vec![p[0], Point3::new(0.8, 0.0, 0.0), p[1]], (0.0, 2.0))?,
        v[0],
        v[1],
    );
    let e1 = model.add_edge(Line3::new(p[1], p[2]), v[1], v[2]);
    let e2 = model.add_edge(Line3::new(p[2], p[3]), v[2], v[3]);
    let e3 = model.add_edge(Line3::new(p[3], p[0]), v[3], v[0]);

    let uv = UvPoint::new;
    let boundary = |edge, reversed| TrimKind::Boundary { edge, reversed };

    let top = model.add_face(
        PlaneSurface::new(Point3::ORIGIN, Vec3::X, Vec3::Y).with_domain(UvDomain::new(0.0, 1.2, 0.0, 1.0)),
        false,
    );
    let lp = model.add_loop(top, LoopKind::Outer);
    model.add_trim(
        lp,
        boundary(e0, false),
        Polyline2::new(vec![uv(0.0, 0.0), uv(0.8, 0.0), uv(1.2, 0.0)], (0.0, 2.0))?,
    );
    model.add_trim(lp, boundary(e1, false), Line2::new(uv(1.2, 0.0), uv(1.2, 1.0)));
    model.add_trim(lp, boundary(e2, false), Line2::new(uv(1.2, 1.0), uv(0.0, 1.0)));
    model.add_trim(lp, boundary(e3, false), Line2::new(uv(0.0, 1.0), uv(0.0, 0.0)));

    let bottom = model.add_face(
        PlaneSurface::new(Point3::ORIGIN, Vec3::Y, Vec3::X).with_domain(UvDomain::new(0.0, 1.0, 0.0, 1.2)),
        false,
    );
    let lp = model.add_loop(bottom, LoopKind::Outer);
    model.add_trim(lp, boundary(e3, true), Line2::new(uv(0.0, 0.0), uv(1.0, 0.0)));
    model.add_trim(lp, boundary(e2, true), Line2::new(uv(1.0, 0.0), uv(1.0, 1.2)));
    model.add_trim(lp, boundary(e1, true), Line2::new(uv(1.0, 1.2), uv(0.0, 1.2)));
    model.add_trim(
        lp,
        boundary(e0, true),
        Polyline2::new(vec![uv(0.0, 1.2), uv(0.0, 0.8), uv(0.0, 0.0)], (0.0, 2.0))?,
    );

    Ok(model)
}
