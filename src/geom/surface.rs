use super::core::{Point3, Tolerance, Vec3};
use super::curve::frame_axes_from_xaxis_normal;
use super::trim::{ParamAxis, UvDomain};

pub(crate) fn wrap_param(value: f64, start: f64, end: f64) -> f64 {
    let span = end - start;
    if !span.is_finite() || span == 0.0 {
        return start;
    }
    let mut t = (value - start) % span;
    if t < 0.0 {
        t += span;
    }
    start + t
}

/// An evaluable parametric surface.
///
/// A closed axis is periodic: parameters outside the domain wrap around, and
/// the two domain boundaries on that axis map to the same physical seam.
pub trait Surface: Send + Sync + std::fmt::Debug {
    fn point_at(&self, u: f64, v: f64) -> Point3;

    #[must_use]
    fn domain_u(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    #[must_use]
    fn domain_v(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    #[must_use]
    fn is_u_closed(&self) -> bool {
        false
    }

    #[must_use]
    fn is_v_closed(&self) -> bool {
        false
    }

    #[must_use]
    fn domain(&self) -> UvDomain {
        let (u0, u1) = self.domain_u();
        let (v0, v1) = self.domain_v();
        UvDomain::new(u0, u1, v0, v1)
    }

    #[must_use]
    fn is_closed(&self, axis: ParamAxis) -> bool {
        match axis {
            ParamAxis::U => self.is_u_closed(),
            ParamAxis::V => self.is_v_closed(),
        }
    }

    /// Period along `axis`, or `None` when the axis is open.
    #[must_use]
    fn period(&self, axis: ParamAxis) -> Option<f64> {
        self.is_closed(axis).then(|| self.domain().span(axis))
    }

    #[must_use]
    fn partial_derivatives_at(&self, u: f64, v: f64) -> (Vec3, Vec3) {
        let (u0, u1) = self.domain_u();
        let (v0, v1) = self.domain_v();

        let u_span = u1 - u0;
        let v_span = v1 - v0;

        let mut du = Vec3::ZERO;
        let mut dv = Vec3::ZERO;

        if u_span.is_finite() && u_span != 0.0 {
            let h = Tolerance::DERIVATIVE.relative_to(u_span);
            let ua = if self.is_u_closed() { u - h } else { (u - h).max(u0) };
            let ub = if self.is_u_closed() { u + h } else { (u + h).min(u1) };

            if ua != ub {
                let pa = self.point_at(ua, v);
                let pb = self.point_at(ub, v);
                du = pb.sub_point(pa).mul_scalar(1.0 / (ub - ua));
            }
        }

        if v_span.is_finite() && v_span != 0.0 {
            let h = Tolerance::DERIVATIVE.relative_to(v_span);
            let va = if self.is_v_closed() { v - h } else { (v - h).max(v0) };
            let vb = if self.is_v_closed() { v + h } else { (v + h).min(v1) };

            if va != vb {
                let pa = self.point_at(u, va);
                let pb = self.point_at(u, vb);
                dv = pb.sub_point(pa).mul_scalar(1.0 / (vb - va));
            }
        }

        (du, dv)
    }

    /// Unit normal `du x dv`, or `None` at a singular point.
    #[must_use]
    fn normal_at(&self, u: f64, v: f64) -> Option<Vec3> {
        let (du, dv) = self.partial_derivatives_at(u, v);
        du.cross(dv).normalized()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneSurface {
    pub origin: Point3,
    pub u_axis: Vec3,
    pub v_axis: Vec3,
    pub domain: UvDomain,
}

impl PlaneSurface {
    #[must_use]
    pub const fn new(origin: Point3, u_axis: Vec3, v_axis: Vec3) -> Self {
        Self {
            origin,
            u_axis,
            v_axis,
            domain: UvDomain::unit(),
        }
    }

    #[must_use]
    pub const fn with_domain(mut self, domain: UvDomain) -> Self {
        self.domain = domain;
        self
    }
}

impl Surface for PlaneSurface {
    fn point_at(&self, u: f64, v: f64) -> Point3 {
        self.origin
            .add_vec(self.u_axis.mul_scalar(u))
            .add_vec(self.v_axis.mul_scalar(v))
    }

    fn domain_u(&self) -> (f64, f64) {
        (self.domain.u_min, self.domain.u_max)
    }

    fn domain_v(&self) -> (f64, f64) {
        (self.domain.v_min, self.domain.v_max)
    }

    fn normal_at(&self, _u: f64, _v: f64) -> Option<Vec3> {
        self.u_axis.cross(self.v_axis).normalized()
    }
}

/// Cylinder around `axis`; `u` in `[0, 1]` is the angle, `v` runs along `axis`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CylinderSurface {
    pub base: Point3,
    pub axis: Vec3,
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub radius: f64,
}

impl CylinderSurface {
    pub fn from_base_axis_xaxis(
        base: Point3,
        axis: Vec3,
        x_axis: Vec3,
        radius: f64,
    ) -> Result<Self, String> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err("cylinder radius must be finite and > 0".to_string());
        }

        let axis_dir = axis
            .normalized()
            .ok_or_else(|| "cylinder axis must be non-zero".to_string())?;
        let (x_axis, y_axis, _) = frame_axes_from_xaxis_normal(x_axis, axis_dir);

        Ok(Self {
            base,
            axis,
            x_axis,
            y_axis,
            radius,
        })
    }

    fn radial(&self, u: f64) -> Vec3 {
        let angle = std::f64::consts::TAU * wrap_param(u, 0.0, 1.0);
        self.x_axis
            .mul_scalar(angle.cos())
            .add(self.y_axis.mul_scalar(angle.sin()))
    }
}

impl Surface for CylinderSurface {
    fn point_at(&self, u: f64, v: f64) -> Point3 {
        self.base
            .add_vec(self.axis.mul_scalar(v))
            .add_vec(self.radial(u).mul_scalar(self.radius))
    }

    fn is_u_closed(&self) -> bool {
        true
    }

    fn normal_at(&self, u: f64, _v: f64) -> Option<Vec3> {
        self.radial(u).normalized()
    }
}

/// Sphere; `u` in `[0, 1]` is longitude, `v` in `[0, 1]` runs pole to pole.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereSurface {
    pub center: Point3,
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub z_axis: Vec3,
    pub radius: f64,
}

impl SphereSurface {
    pub fn from_center_xaxis_normal(
        center: Point3,
        x_axis: Vec3,
        normal: Vec3,
        radius: f64,
    ) -> Result<Self, String> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err("sphere radius must be finite and > 0".to_string());
        }

        let (x_axis, y_axis, z_axis) = frame_axes_from_xaxis_normal(x_axis, normal);
        Ok(Self {
            center,
            x_axis,
            y_axis,
            z_axis,
            radius,
        })
    }

    fn direction(&self, u: f64, v: f64) -> Vec3 {
        let theta = std::f64::consts::TAU * wrap_param(u, 0.0, 1.0);
        let phi = std::f64::consts::PI * (v.clamp(0.0, 1.0) - 0.5);
        let cos_phi = phi.cos();

        self.x_axis
            .mul_scalar(cos_phi * theta.cos())
            .add(self.y_axis.mul_scalar(cos_phi * theta.sin()))
            .add(self.z_axis.mul_scalar(phi.sin()))
    }
}

impl Surface for SphereSurface {
    fn point_at(&self, u: f64, v: f64) -> Point3 {
        self.center.add_vec(self.direction(u, v).mul_scalar(self.radius))
    }

    fn is_u_closed(&self) -> bool {
        true
    }

    fn normal_at(&self, u: f64, v: f64) -> Option<Vec3> {
        self.direction(u, v).normalized()
    }
}

/// Torus; `u` runs around the main axis, `v` around the tube.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TorusSurface {
    pub center: Point3,
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub z_axis: Vec3,
    pub major_radius: f64,
    pub minor_radius: f64,
}

impl TorusSurface {
    pub fn from_center_xaxis_normal(
        center: Point3,
        x_axis: Vec3,
        normal: Vec3,
        major_radius: f64,
        minor_radius: f64,
    ) -> Result<Self, String> {
        if !major_radius.is_finite() || major_radius <= 0.0 {
            return Err("torus major radius must be finite and > 0".to_string());
        }
        if !minor_radius.is_finite() || minor_radius <= 0.0 {
            return Err("torus minor radius must be finite and > 0".to_string());
        }
        if minor_radius >= major_radius {
            return Err("torus minor radius must be smaller than the major radius".to_string());
        }

        let (x_axis, y_axis, z_axis) = frame_axes_from_xaxis_normal(x_axis, normal);
        Ok(Self {
            center,
            x_axis,
            y_axis,
            z_axis,
            major_radius,
            minor_radius,
        })
    }

    fn frame(&self, u: f64, v: f64) -> (Vec3, Vec3) {
        let theta = std::f64::consts::TAU * wrap_param(u, 0.0, 1.0);
        let phi = std::f64::consts::TAU * wrap_param(v, 0.0, 1.0);
        let radial = self
            .x_axis
            .mul_scalar(theta.cos())
            .add(self.y_axis.mul_scalar(theta.sin()));
        let tube_normal = radial
            .mul_scalar(phi.cos())
            .add(self.z_axis.mul_scalar(phi.sin()));
        (radial, tube_normal)
    }
}

impl Surface for TorusSurface {
    fn point_at(&self, u: f64, v: f64) -> Point3 {
        let (radial, tube_normal) = self.frame(u, v);
        self.center
            .add_vec(radial.mul_scalar(self.major_radius))
            .add_vec(tube_normal.mul_scalar(self.minor_radius))
    }

    fn is_u_closed(&self) -> bool {
        true
    }

    fn is_v_closed(&self) -> bool {
        true
    }

    fn normal_at(&self, u: f64, v: f64) -> Option<Vec3> {
        self.frame(u, v).1.normalized()
    }
}
