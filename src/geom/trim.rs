//! Parameter-space primitives for trimming.
//!
//! This module provides the 2D side of a trimmed patch: points and rectangles in
//! a surface's (u, v) domain, the [`Curve2`] trait for trim pcurves, and the
//! polygon predicates the seam normalizer and triangulator build on.
//!
//! # Main Types
//! - [`UvPoint`]: A point in UV parameter space
//! - [`UvDomain`]: An axis-aligned rectangle in UV parameter space
//! - [`ParamAxis`]: Selects the u or v coordinate generically
//! - [`Line2`], [`Arc2`], [`Polyline2`]: Trim pcurves

use super::core::Tolerance;

// ============================================================================
// Parameter axes
// ============================================================================

/// One of the two parameter directions of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamAxis {
    U,
    V,
}

impl ParamAxis {
    pub const BOTH: [Self; 2] = [Self::U, Self::V];

    /// The other parameter direction.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::U => Self::V,
            Self::V => Self::U,
        }
    }
}

// ============================================================================
// UvPoint
// ============================================================================

/// A point in UV parameter space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvPoint {
    /// U parameter value.
    pub u: f64,
    /// V parameter value.
    pub v: f64,
}

impl UvPoint {
    /// Create a new UV point.
    #[must_use]
    pub const fn new(u: f64, v: f64) -> Self {
        Self { u, v }
    }

    /// Check if both coordinates are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.u.is_finite() && self.v.is_finite()
    }

    /// Coordinate along `axis`.
    #[must_use]
    pub const fn coord(&self, axis: ParamAxis) -> f64 {
        match axis {
            ParamAxis::U => self.u,
            ParamAxis::V => self.v,
        }
    }

    /// Copy of this point with the coordinate along `axis` replaced.
    #[must_use]
    pub const fn with_coord(self, axis: ParamAxis, value: f64) -> Self {
        match axis {
            ParamAxis::U => Self::new(value, self.v),
            ParamAxis::V => Self::new(self.u, value),
        }
    }

    /// Copy of this point translated by (du, dv).
    #[must_use]
    pub fn translated(self, du: f64, dv: f64) -> Self {
        Self::new(self.u + du, self.v + dv)
    }

    /// Compute squared distance to another point.
    #[must_use]
    pub fn distance_squared(&self, other: UvPoint) -> f64 {
        let du = self.u - other.u;
        let dv = self.v - other.v;
        du * du + dv * dv
    }

    /// Compute distance to another point.
    #[must_use]
    pub fn distance(&self, other: UvPoint) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Symmetric midpoint of two points.
    #[must_use]
    pub fn midpoint(self, other: UvPoint) -> Self {
        Self::new((self.u + other.u) * 0.5, (self.v + other.v) * 0.5)
    }

    #[must_use]
    pub fn lerp(self, other: UvPoint, t: f64) -> Self {
        Self::new(
            self.u + (other.u - self.u) * t,
            self.v + (other.v - self.v) * t,
        )
    }

    /// Exact (bitwise) equality, used to drop repeated samples.
    #[must_use]
    pub fn same_as(&self, other: UvPoint) -> bool {
        self.u.to_bits() == other.u.to_bits() && self.v.to_bits() == other.v.to_bits()
    }
}

// ============================================================================
// UV Domain
// ============================================================================

/// A rectangular domain in UV parameter space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvDomain {
    /// Minimum U value.
    pub u_min: f64,
    /// Maximum U value.
    pub u_max: f64,
    /// Minimum V value.
    pub v_min: f64,
    /// Maximum V value.
    pub v_max: f64,
}

impl UvDomain {
    /// Create a new UV domain.
    #[must_use]
    pub const fn new(u_min: f64, u_max: f64, v_min: f64, v_max: f64) -> Self {
        Self {
            u_min,
            u_max,
            v_min,
            v_max,
        }
    }

    /// The unit square `[0, 1] x [0, 1]`.
    #[must_use]
    pub const fn unit() -> Self {
        Self::new(0.0, 1.0, 0.0, 1.0)
    }

    /// Smallest domain containing every point, or `None` for an empty slice.
    #[must_use]
    pub fn from_points(points: &[UvPoint]) -> Option<Self> {
        let mut iter = points.iter().copied();
        let first = iter.next()?;
        let seed = Self::new(first.u, first.u, first.v, first.v);
        Some(iter.fold(seed, Self::expand_point))
    }

    #[must_use]
    pub fn expand_point(self, p: UvPoint) -> Self {
        Self::new(
            self.u_min.min(p.u),
            self.u_max.max(p.u),
            self.v_min.min(p.v),
            self.v_max.max(p.v),
        )
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self::new(
            self.u_min.min(other.u_min),
            self.u_max.max(other.u_max),
            self.v_min.min(other.v_min),
            self.v_max.max(other.v_max),
        )
    }

    /// Grow the rectangle by `amount` on every side.
    #[must_use]
    pub fn expand_by(self, amount: f64) -> Self {
        Self::new(
            self.u_min - amount,
            self.u_max + amount,
            self.v_min - amount,
            self.v_max + amount,
        )
    }

    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.u_min <= other.u_max
            && self.u_max >= other.u_min
            && self.v_min <= other.v_max
            && self.v_max >= other.v_min
    }

    /// Check if a point lies inside the domain (inclusive, with tolerance).
    #[must_use]
    pub fn contains(&self, point: UvPoint, tol: Tolerance) -> bool {
        point.u >= self.u_min - tol.eps
            && point.u <= self.u_max + tol.eps
            && point.v >= self.v_min - tol.eps
            && point.v <= self.v_max + tol.eps
    }

    /// Get the U span.
    #[must_use]
    pub fn u_span(&self) -> f64 {
        self.u_max - self.u_min
    }

    /// Get the V span.
    #[must_use]
    pub fn v_span(&self) -> f64 {
        self.v_max - self.v_min
    }

    #[must_use]
    pub const fn min(&self, axis: ParamAxis) -> f64 {
        match axis {
            ParamAxis::U => self.u_min,
            ParamAxis::V => self.v_min,
        }
    }

    #[must_use]
    pub const fn max(&self, axis: ParamAxis) -> f64 {
        match axis {
            ParamAxis::U => self.u_max,
            ParamAxis::V => self.v_max,
        }
    }

    #[must_use]
    pub fn span(&self, axis: ParamAxis) -> f64 {
        self.max(axis) - self.min(axis)
    }

    #[must_use]
    pub fn mid(&self, axis: ParamAxis) -> f64 {
        (self.min(axis) + self.max(axis)) * 0.5
    }

    #[must_use]
    pub fn center(&self) -> UvPoint {
        UvPoint::new(self.mid(ParamAxis::U), self.mid(ParamAxis::V))
    }

    /// Diagonal length in parameter space.
    #[must_use]
    pub fn diagonal(&self) -> f64 {
        self.u_span().hypot(self.v_span())
    }

    /// Check that the bounds are finite and ordered.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.u_min.is_finite()
            && self.u_max.is_finite()
            && self.v_min.is_finite()
            && self.v_max.is_finite()
            && self.u_min <= self.u_max
            && self.v_min <= self.v_max
    }
}

impl Default for UvDomain {
    fn default() -> Self {
        Self::unit()
    }
}

// ============================================================================
// Trim pcurves
// ============================================================================

/// A parametric curve in a surface's UV domain.
pub trait Curve2: Send + Sync + std::fmt::Debug {
    fn point_at(&self, t: f64) -> UvPoint;

    #[must_use]
    fn domain(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    #[must_use]
    fn start(&self) -> UvPoint {
        self.point_at(self.domain().0)
    }

    #[must_use]
    fn end(&self) -> UvPoint {
        self.point_at(self.domain().1)
    }
}

/// Maps `t` from `domain` onto `[0, 1]`.
fn normalized_param(t: f64, domain: (f64, f64)) -> f64 {
    let (t0, t1) = domain;
    if t1 == t0 { 0.0 } else { (t - t0) / (t1 - t0) }
}

/// Straight pcurve, linear in its parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line2 {
    pub start: UvPoint,
    pub end: UvPoint,
    pub domain: (f64, f64),
}

impl Line2 {
    #[must_use]
    pub const fn new(start: UvPoint, end: UvPoint) -> Self {
        Self {
            start,
            end,
            domain: (0.0, 1.0),
        }
    }

    #[must_use]
    pub const fn with_domain(mut self, t0: f64, t1: f64) -> Self {
        self.domain = (t0, t1);
        self
    }
}

impl Curve2 for Line2 {
    fn point_at(&self, t: f64) -> UvPoint {
        let s = normalized_param(t, self.domain);
        if s == 1.0 {
            return self.end;
        }
        self.start.lerp(self.end, s)
    }

    fn domain(&self) -> (f64, f64) {
        self.domain
    }
}

/// Circular arc in parameter space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arc2 {
    pub center: UvPoint,
    pub radius: f64,
    pub start_angle: f64,
    pub sweep_angle: f64,
    pub domain: (f64, f64),
}

impl Arc2 {
    #[must_use]
    pub const fn new(center: UvPoint, radius: f64, start_angle: f64, sweep_angle: f64) -> Self {
        Self {
            center,
            radius,
            start_angle,
            sweep_angle,
            domain: (0.0, 1.0),
        }
    }

    #[must_use]
    pub const fn with_domain(mut self, t0: f64, t1: f64) -> Self {
        self.domain = (t0, t1);
        self
    }
}

impl Curve2 for Arc2 {
    fn point_at(&self, t: f64) -> UvPoint {
        let angle = self.start_angle + self.sweep_angle * normalized_param(t, self.domain);
        UvPoint::new(
            self.center.u + self.radius * angle.cos(),
            self.center.v + self.radius * angle.sin(),
        )
    }

    fn domain(&self) -> (f64, f64) {
        self.domain
    }
}

/// Piecewise-linear pcurve; vertex `i` sits at `t0 + i * (t1 - t0) / (n - 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline2 {
    points: Vec<UvPoint>,
    domain: (f64, f64),
}

impl Polyline2 {
    pub fn new(points: Vec<UvPoint>, domain: (f64, f64)) -> Result<Self, String> {
        if points.len() < 2 {
            return Err("polyline pcurve requires at least 2 points".to_string());
        }
        if points.iter().any(|p| !p.is_finite()) {
            return Err("polyline pcurve points must be finite".to_string());
        }
        if domain.0.is_nan() || domain.1.is_nan() || domain.0 >= domain.1 {
            return Err("polyline pcurve domain must be increasing".to_string());
        }
        Ok(Self { points, domain })
    }

    #[must_use]
    pub fn points(&self) -> &[UvPoint] {
        &self.points
    }
}

impl Curve2 for Polyline2 {
    fn point_at(&self, t: f64) -> UvPoint {
        let segments = self.points.len() - 1;
        let s = normalized_param(t, self.domain).clamp(0.0, 1.0) * segments as f64;
        let index = (s.floor() as usize).min(segments - 1);
        let local = s - index as f64;
        if local == 1.0 {
            return self.points[index + 1];
        }
        self.points[index].lerp(self.points[index + 1], local)
    }

    fn domain(&self) -> (f64, f64) {
        self.domain
    }
}

// ============================================================================
// Polygon predicates
// ============================================================================

/// Twice the signed area of triangle (a, b, c); positive when counter-clockwise.
#[must_use]
pub fn orient2d(a: UvPoint, b: UvPoint, c: UvPoint) -> f64 {
    (b.u - a.u) * (c.v - a.v) - (b.v - a.v) * (c.u - a.u)
}

/// Signed area of an implicitly closed polygon.
#[must_use]
pub fn signed_area(points: &[UvPoint]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let mut area = 0.0;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        area += a.u * b.v - b.u * a.v;
    }
    0.5 * area
}

/// Crossing-number containment test against an implicitly closed polygon.
///
/// Boundary points may land on either side.
#[must_use]
pub fn point_in_polygon(p: UvPoint, polygon: &[UvPoint]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[j];
        if (a.v > p.v) != (b.v > p.v) {
            let x = a.u + (p.v - a.v) / (b.v - a.v) * (b.u - a.u);
            if p.u < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Distance from `p` to the closed segment `[a, b]`.
#[must_use]
pub fn distance_to_segment(p: UvPoint, a: UvPoint, b: UvPoint) -> f64 {
    let ab_u = b.u - a.u;
    let ab_v = b.v - a.v;
    let len2 = ab_u * ab_u + ab_v * ab_v;
    if !len2.is_finite() || len2 <= 0.0 {
        return p.distance(a);
    }
    let t = (((p.u - a.u) * ab_u + (p.v - a.v) * ab_v) / len2).clamp(0.0, 1.0);
    p.distance(UvPoint::new(a.u + t * ab_u, a.v + t * ab_v))
}

/// Proper intersection test between two segments.
///
/// Touching at shared endpoints is not an intersection; collinear overlap is.
#[must_use]
pub fn segments_cross(a: UvPoint, b: UvPoint, c: UvPoint, d: UvPoint, tol: Tolerance) -> bool {
    let o1 = orient2d(a, b, c);
    let o2 = orient2d(a, b, d);
    let o3 = orient2d(c, d, a);
    let o4 = orient2d(c, d, b);

    let proper = ((o1 > tol.eps && o2 < -tol.eps) || (o1 < -tol.eps && o2 > tol.eps))
        && ((o3 > tol.eps && o4 < -tol.eps) || (o3 < -tol.eps && o4 > tol.eps));
    if proper {
        return true;
    }

    let collinear = o1.abs() <= tol.eps && o2.abs() <= tol.eps;
    if !collinear {
        return false;
    }

    // Collinear: overlapping interiors count, a single shared endpoint does not.
    let (axis_a, axis_b, axis_c, axis_d) = if (b.u - a.u).abs() >= (b.v - a.v).abs() {
        (a.u, b.u, c.u, d.u)
    } else {
        (a.v, b.v, c.v, d.v)
    };
    let (lo1, hi1) = (axis_a.min(axis_b), axis_a.max(axis_b));
    let (lo2, hi2) = (axis_c.min(axis_d), axis_c.max(axis_d));
    hi1.min(hi2) - lo1.max(lo2) > tol.eps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polyline_pcurve_hits_its_vertices() {
        let pl = Polyline2::new(
            vec![UvPoint::new(0.0, 0.0), UvPoint::new(0.8, 0.0), UvPoint::new(1.2, 0.0)],
            (0.0, 2.0),
        )
        .unwrap();
        assert_eq!(pl.point_at(0.0), UvPoint::new(0.0, 0.0));
        assert_eq!(pl.point_at(1.0), UvPoint::new(0.8, 0.0));
        assert_eq!(pl.point_at(2.0), UvPoint::new(1.2, 0.0));
        assert!((pl.point_at(1.5).u - 1.0).abs() < 1e-12);
    }

    #[test]
    fn line_pcurve_lands_exactly_on_its_end() {
        let line = Line2::new(UvPoint::new(0.3, 0.0), UvPoint::new(1.3, 0.0)).with_domain(2.0, 5.0);
        assert_eq!(line.start(), UvPoint::new(0.3, 0.0));
        assert_eq!(line.end(), UvPoint::new(1.3, 0.0));
    }

    #[test]
    fn crossing_segments_detected_but_shared_endpoints_are_not() {
        let tol = Tolerance::new(1e-12);
        let a = UvPoint::new(0.0, 0.0);
        let b = UvPoint::new(1.0, 1.0);
        let c = UvPoint::new(0.0, 1.0);
        let d = UvPoint::new(1.0, 0.0);
        assert!(segments_cross(a, b, c, d, tol));
        assert!(!segments_cross(a, b, b, UvPoint::new(2.0, 0.0), tol));
        assert!(segments_cross(
            a,
            UvPoint::new(2.0, 0.0),
            UvPoint::new(1.0, 0.0),
            UvPoint::new(3.0, 0.0),
            tol
        ));
    }
}
