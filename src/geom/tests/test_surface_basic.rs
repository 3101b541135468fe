use crate::geom::{
    CylinderSurface, ParamAxis, PlaneSurface, Point3, SphereSurface, Surface, Tolerance, TorusSurface, UvDomain, Vec3,
};

#[test]
fn plane_maps_domain_corners_to_its_axes() {
    let plane = PlaneSurface::new(Point3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 3.0, 0.0));
    let tol = Tolerance::new(1e-12);

    assert!(tol.approx_eq_point3(plane.point_at(0.0, 0.0), Point3::new(1.0, 0.0, 0.0)));
    assert!(tol.approx_eq_point3(plane.point_at(1.0, 1.0), Point3::new(3.0, 3.0, 0.0)));
    assert_eq!(plane.normal_at(0.3, 0.7), Some(Vec3::Z));
    assert_eq!(plane.period(ParamAxis::U), None);
    assert_eq!(plane.period(ParamAxis::V), None);
}

#[test]
fn plane_with_domain_reports_it() {
    let plane =
        PlaneSurface::new(Point3::ORIGIN, Vec3::X, Vec3::Y).with_domain(UvDomain::new(0.0, 1.2, -1.0, 1.0));
    assert_eq!(plane.domain(), UvDomain::new(0.0, 1.2, -1.0, 1.0));
    assert!(Tolerance::DEFAULT.approx_eq_point3(plane.point_at(1.2, -1.0), Point3::new(1.2, -1.0, 0.0)));
}

#[test]
fn cylinder_is_periodic_in_u_only() {
    let cyl = CylinderSurface::from_base_axis_xaxis(Point3::ORIGIN, Vec3::new(0.0, 0.0, 2.0), Vec3::X, 1.0).unwrap();
    let tol = Tolerance::new(1e-12);

    assert_eq!(cyl.period(ParamAxis::U), Some(1.0));
    assert_eq!(cyl.period(ParamAxis::V), None);
    assert!(tol.approx_eq_point3(cyl.point_at(0.0, 0.5), cyl.point_at(1.0, 0.5)));
    assert!(tol.approx_eq_point3(cyl.point_at(-0.25, 0.0), cyl.point_at(0.75, 0.0)));
    assert!(tol.approx_eq_point3(cyl.point_at(0.25, 1.0), Point3::new(0.0, 1.0, 2.0)));

    let n = cyl.normal_at(0.0, 0.3).unwrap();
    assert!((n.dot(Vec3::X) - 1.0).abs() < 1e-12);
}

#[test]
fn cylinder_normal_agrees_with_parameter_orientation() {
    let cyl = CylinderSurface::from_base_axis_xaxis(Point3::ORIGIN, Vec3::Z, Vec3::X, 1.0).unwrap();
    let (du, dv) = cyl.partial_derivatives_at(0.1, 0.5);
    let n = cyl.normal_at(0.1, 0.5).unwrap();
    assert!(du.cross(dv).dot(n) > 0.0);
}

#[test]
fn torus_is_doubly_periodic() {
    let torus = TorusSurface::from_center_xaxis_normal(Point3::ORIGIN, Vec3::X, Vec3::Z, 2.0, 0.5).unwrap();
    let tol = Tolerance::new(1e-12);

    assert_eq!(torus.period(ParamAxis::U), Some(1.0));
    assert_eq!(torus.period(ParamAxis::V), Some(1.0));
    assert!(tol.approx_eq_point3(torus.point_at(0.0, 0.0), Point3::new(2.5, 0.0, 0.0)));
    assert!(tol.approx_eq_point3(torus.point_at(0.0, 0.5), Point3::new(1.5, 0.0, 0.0)));
    assert!(tol.approx_eq_point3(torus.point_at(1.0, 1.0), torus.point_at(0.0, 0.0)));
}

#[test]
fn invalid_surfaces_are_rejected() {
    assert!(CylinderSurface::from_base_axis_xaxis(Point3::ORIGIN, Vec3::Z, Vec3::X, 0.0).is_err());
    assert!(CylinderSurface::from_base_axis_xaxis(Point3::ORIGIN, Vec3::ZERO, Vec3::X, 1.0).is_err());
    assert!(SphereSurface::from_center_xaxis_normal(Point3::ORIGIN, Vec3::X, Vec3::Z, f64::NAN).is_err());
    assert!(TorusSurface::from_center_xaxis_normal(Point3::ORIGIN, Vec3::X, Vec3::Z, 1.0, 1.0).is_err());
}

#[test]
fn sphere_poles_collapse_every_longitude() {
    let sphere = SphereSurface::from_center_xaxis_normal(Point3::ORIGIN, Vec3::X, Vec3::Z, 1.5).unwrap();
    let tol = Tolerance::new(1e-12);
    for i in 0..8 {
        let u = f64::from(i) / 8.0;
        assert!(tol.approx_eq_point3(sphere.point_at(u, 0.0), Point3::new(0.0, 0.0, -1.5)));
        assert!(tol.approx_eq_point3(sphere.point_at(u, 1.0), Point3::new(0.0, 0.0, 1.5)));
    }
}
