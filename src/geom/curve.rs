use super::core::{Point3, Tolerance, Vec3};

/// A parametric 3D curve, used as the geometry of a model edge.
pub trait Curve3: Send + Sync + std::fmt::Debug {
    fn point_at(&self, t: f64) -> Point3;

    #[must_use]
    fn domain(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    #[must_use]
    fn is_closed(&self) -> bool {
        false
    }

    #[must_use]
    fn derivative_at(&self, t: f64) -> Vec3 {
        let (a, b) = self.domain();
        let span = b - a;
        if !span.is_finite() || span == 0.0 {
            return Vec3::ZERO;
        }

        let h = Tolerance::DERIVATIVE.relative_to(span);
        if !h.is_finite() || h == 0.0 {
            return Vec3::ZERO;
        }

        let t0 = (t - h).max(a);
        let t1 = (t + h).min(b);
        if t1 == t0 {
            return Vec3::ZERO;
        }

        let p0 = self.point_at(t0);
        let p1 = self.point_at(t1);
        p1.sub_point(p0).mul_scalar(1.0 / (t1 - t0))
    }

    /// Unit tangent, or `None` where the derivative vanishes.
    #[must_use]
    fn tangent_at(&self, t: f64) -> Option<Vec3> {
        self.derivative_at(t).normalized()
    }
}

fn orthogonal_unit_vector(reference: Vec3) -> Vec3 {
    let candidate = if reference.x.abs() < reference.y.abs() {
        Vec3::new(0.0, -reference.z, reference.y)
    } else {
        Vec3::new(-reference.z, 0.0, reference.x)
    };

    candidate.normalized().unwrap_or(Vec3::X)
}

/// Right-handed frame whose z is `normal` and whose x is `x_axis` projected off it.
pub(crate) fn frame_axes_from_xaxis_normal(x_axis: Vec3, normal: Vec3) -> (Vec3, Vec3, Vec3) {
    let z = normal.normalized().unwrap_or(Vec3::Z);
    let projected = x_axis.sub(z.mul_scalar(x_axis.dot(z)));
    let x = projected
        .normalized()
        .unwrap_or_else(|| orthogonal_unit_vector(z));
    let y = z.cross(x).normalized().unwrap_or(Vec3::Y);
    (x, y, z)
}

fn normalized_param(t: f64, domain: (f64, f64)) -> f64 {
    let (t0, t1) = domain;
    if t1 == t0 { 0.0 } else { (t - t0) / (t1 - t0) }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line3 {
    pub start: Point3,
    pub end: Point3,
    pub domain: (f64, f64),
}

impl Line3 {
    #[must_use]
    pub const fn new(start: Point3, end: Point3) -> Self {
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

    #[must_use]
    pub const fn direction(self) -> Vec3 {
        self.end.sub_point(self.start)
    }
}

impl Curve3 for Line3 {
    fn point_at(&self, t: f64) -> Point3 {
        let s = normalized_param(t, self.domain);
        if s == 1.0 {
            return self.end;
        }
        self.start.lerp(self.end, s)
    }

    fn domain(&self) -> (f64, f64) {
        self.domain
    }

    fn derivative_at(&self, _t: f64) -> Vec3 {
        let (t0, t1) = self.domain;
        if t1 == t0 {
            return Vec3::ZERO;
        }
        self.direction().mul_scalar(1.0 / (t1 - t0))
    }
}

/// Circular arc; a sweep of a full turn makes it a closed edge curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arc3 {
    pub center: Point3,
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub radius: f64,
    pub start_angle: f64,
    pub sweep_angle: f64,
    pub domain: (f64, f64),
}

impl Arc3 {
    pub fn from_center_xaxis_normal(
        center: Point3,
        x_axis: Vec3,
        normal: Vec3,
        radius: f64,
        start_angle: f64,
        sweep_angle: f64,
    ) -> Result<Self, String> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err("arc radius must be finite and > 0".to_string());
        }
        if !sweep_angle.is_finite() || sweep_angle == 0.0 {
            return Err("arc sweep must be finite and non-zero".to_string());
        }
        let (x_axis, y_axis, _) = frame_axes_from_xaxis_normal(x_axis, normal);
        Ok(Self {
            center,
            x_axis,
            y_axis,
            radius,
            start_angle,
            sweep_angle,
            domain: (0.0, 1.0),
        })
    }

    #[must_use]
    pub const fn with_domain(mut self, t0: f64, t1: f64) -> Self {
        self.domain = (t0, t1);
        self
    }

    fn angle_at(&self, t: f64) -> f64 {
        self.start_angle + self.sweep_angle * normalized_param(t, self.domain).clamp(0.0, 1.0)
    }
}

impl Curve3 for Arc3 {
    fn point_at(&self, t: f64) -> Point3 {
        let angle = self.angle_at(t);
        self.center
            .add_vec(self.x_axis.mul_scalar(self.radius * angle.cos()))
            .add_vec(self.y_axis.mul_scalar(self.radius * angle.sin()))
    }

    fn domain(&self) -> (f64, f64) {
        self.domain
    }

    fn derivative_at(&self, t: f64) -> Vec3 {
        let (t0, t1) = self.domain;
        if t1 == t0 {
            return Vec3::ZERO;
        }
        let angle = self.angle_at(t);
        let dtheta_dt = self.sweep_angle / (t1 - t0);
        let dx = self.x_axis.mul_scalar(-self.radius * angle.sin());
        let dy = self.y_axis.mul_scalar(self.radius * angle.cos());
        dx.add(dy).mul_scalar(dtheta_dt)
    }

    fn is_closed(&self) -> bool {
        const FULL_CIRCLE_TOLERANCE: f64 = 1e-9;
        (self.sweep_angle.abs() - std::f64::consts::TAU).abs() < FULL_CIRCLE_TOLERANCE
    }
}

/// Piecewise-linear curve; vertex `i` sits at `t0 + i * (t1 - t0) / (n - 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline3 {
    points: Vec<Point3>,
    domain: (f64, f64),
}

impl Polyline3 {
    pub fn new(points: Vec<Point3>, domain: (f64, f64)) -> Result<Self, String> {
        if points.len() < 2 {
            return Err("polyline requires at least 2 points".to_string());
        }
        if points.iter().any(|p| !p.is_finite()) {
            return Err("polyline points must be finite".to_string());
        }
        if domain.0.is_nan() || domain.1.is_nan() || domain.0 >= domain.1 {
            return Err("polyline domain must be increasing".to_string());
        }
        Ok(Self { points, domain })
    }

    #[must_use]
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    fn locate(&self, t: f64) -> (usize, f64) {
        let segments = self.points.len() - 1;
        let s = normalized_param(t, self.domain).clamp(0.0, 1.0) * segments as f64;
        let index = (s.floor() as usize).min(segments - 1);
        (index, s - index as f64)
    }
}

impl Curve3 for Polyline3 {
    fn point_at(&self, t: f64) -> Point3 {
        let (index, local) = self.locate(t);
        if local == 1.0 {
            return self.points[index + 1];
        }
        self.points[index].lerp(self.points[index + 1], local)
    }

    fn domain(&self) -> (f64, f64) {
        self.domain
    }

    fn derivative_at(&self, t: f64) -> Vec3 {
        let (index, _) = self.locate(t);
        let segments = (self.points.len() - 1) as f64;
        let scale = segments / (self.domain.1 - self.domain.0);
        self.points[index + 1]
            .sub_point(self.points[index])
            .mul_scalar(scale)
    }

    fn is_closed(&self) -> bool {
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];
        first == last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_arc_is_closed_and_returns_to_start() {
        let arc = Arc3::from_center_xaxis_normal(
            Point3::ORIGIN,
            Vec3::X,
            Vec3::Z,
            2.0,
            0.0,
            std::f64::consts::TAU,
        )
        .unwrap();
        assert!(arc.is_closed());
        let start = arc.point_at(0.0);
        let end = arc.point_at(1.0);
        assert!(start.distance_to(end) < 1e-12);
        assert!((arc.point_at(0.25).y - 2.0).abs() < 1e-12);
    }

    #[test]
    fn polyline_derivative_is_piecewise_constant() {
        let pl = Polyline3::new(
            vec![Point3::ORIGIN, Point3::new(0.8, 0.0, 0.0), Point3::new(1.2, 0.0, 0.0)],
            (0.0, 2.0),
        )
        .unwrap();
        assert!((pl.derivative_at(0.5).x - 0.8).abs() < 1e-12);
        assert!((pl.derivative_at(1.5).x - 0.4).abs() < 1e-12);
        assert_eq!(pl.point_at(2.0), Point3::new(1.2, 0.0, 0.0));
        assert!(!pl.is_closed());
    }

    #[test]
    fn invalid_arc_is_rejected() {
        assert!(Arc3::from_center_xaxis_normal(Point3::ORIGIN, Vec3::X, Vec3::Z, 0.0, 0.0, 1.0).is_err());
    }
}
