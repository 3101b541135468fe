use crate::geom::{
    Arc2, Curve2, ParamAxis, Tolerance, UvDomain, UvPoint, distance_to_segment, orient2d, point_in_polygon,
    signed_area,
};

fn unit_square() -> Vec<UvPoint> {
    vec![
        UvPoint::new(0.0, 0.0),
        UvPoint::new(1.0, 0.0),
        UvPoint::new(1.0, 1.0),
        UvPoint::new(0.0, 1.0),
    ]
}

#[test]
fn signed_area_follows_winding() {
    let mut square = unit_square();
    assert!((signed_area(&square) - 1.0).abs() < 1e-12);
    square.reverse();
    assert!((signed_area(&square) + 1.0).abs() < 1e-12);
    assert_eq!(signed_area(&square[..2]), 0.0);
}

#[test]
fn orient2d_sign() {
    let a = UvPoint::new(0.0, 0.0);
    let b = UvPoint::new(1.0, 0.0);
    assert!(orient2d(a, b, UvPoint::new(0.5, 1.0)) > 0.0);
    assert!(orient2d(a, b, UvPoint::new(0.5, -1.0)) < 0.0);
    assert_eq!(orient2d(a, b, UvPoint::new(3.0, 0.0)), 0.0);
}

#[test]
fn point_in_polygon_basic() {
    let square = unit_square();
    assert!(point_in_polygon(UvPoint::new(0.5, 0.5), &square));
    assert!(!point_in_polygon(UvPoint::new(1.5, 0.5), &square));
    assert!(!point_in_polygon(UvPoint::new(0.5, -0.1), &square));
    assert!(!point_in_polygon(UvPoint::new(0.5, 0.5), &square[..2]));
}

#[test]
fn distance_to_segment_clamps_to_endpoints() {
    let a = UvPoint::new(0.0, 0.0);
    let b = UvPoint::new(1.0, 0.0);
    assert!((distance_to_segment(UvPoint::new(0.5, 0.25), a, b) - 0.25).abs() < 1e-12);
    assert!((distance_to_segment(UvPoint::new(2.0, 0.0), a, b) - 1.0).abs() < 1e-12);
    assert!((distance_to_segment(UvPoint::new(0.0, 2.0), a, a) - 2.0).abs() < 1e-12);
}

#[test]
fn domain_helpers() {
    let d = UvDomain::from_points(&[UvPoint::new(0.2, -1.0), UvPoint::new(-0.4, 3.0)]).expect("domain");
    assert_eq!(d, UvDomain::new(-0.4, 0.2, -1.0, 3.0));
    assert!((d.span(ParamAxis::U) - 0.6).abs() < 1e-12);
    assert_eq!(d.span(ParamAxis::V), 4.0);
    assert!((d.mid(ParamAxis::U) + 0.1).abs() < 1e-12);
    assert!(d.contains(UvPoint::new(0.0, 0.0), Tolerance::DEFAULT));
    assert!(!d.contains(UvPoint::new(0.5, 0.0), Tolerance::DEFAULT));
    assert!(d.is_valid());

    assert!(UvDomain::from_points(&[]).is_none());

    let grown = UvDomain::unit().expand_point(UvPoint::new(2.0, 0.5));
    assert_eq!(grown, UvDomain::new(0.0, 2.0, 0.0, 1.0));
    assert!(grown.intersects(&UvDomain::new(1.5, 3.0, 0.9, 2.0)));
    assert!(!grown.intersects(&UvDomain::new(2.5, 3.0, 0.0, 1.0)));
}

#[test]
fn uv_point_axis_access() {
    let p = UvPoint::new(0.25, 0.75);
    assert_eq!(p.coord(ParamAxis::U), 0.25);
    assert_eq!(p.coord(ParamAxis::V), 0.75);
    assert_eq!(p.with_coord(ParamAxis::U, -0.5), UvPoint::new(-0.5, 0.75));
    assert_eq!(ParamAxis::U.other(), ParamAxis::V);
    assert_eq!(p.translated(1.0, 0.0), UvPoint::new(1.25, 0.75));
}

#[test]
fn arc_pcurve_endpoints() {
    let arc = Arc2::new(UvPoint::new(0.5, 0.5), 0.25, 0.0, std::f64::consts::PI);
    assert!(arc.start().distance(UvPoint::new(0.75, 0.5)) < 1e-12);
    assert!(arc.end().distance(UvPoint::new(0.25, 0.5)) < 1e-12);
    assert!(arc.point_at(0.5).distance(UvPoint::new(0.5, 0.75)) < 1e-12);
}
