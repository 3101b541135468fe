use std::collections::HashMap;

use crate::geom::{Point3, Surface, UvPoint, Vec3};

use super::arena::VertexRef;
use super::loop_points::TrimSamplePoint;
use super::tolerance::CdtTolerance;

/// Points owned by a single patch: seam bridges, domain-boundary corners and
/// interior samples.
///
/// Bridge and corner points are welded on their 3D position, quantized to the
/// same-point tolerance, so the two sides of a seam bridge resolve to one
/// handle. Interior samples are pushed without welding.
#[derive(Debug, Clone)]
pub struct PatchLocals {
    points: Vec<Point3>,
    cells: HashMap<(i64, i64, i64), Vec<u32>>,
    cell_size: f64,
    welded: usize,
}

impl PatchLocals {
    #[must_use]
    pub fn new(same_point_tolerance: f64) -> Self {
        Self {
            points: Vec::new(),
            cells: HashMap::new(),
            cell_size: same_point_tolerance,
            welded: 0,
        }
    }

    fn key(&self, p: Point3) -> (i64, i64, i64) {
        let q = |c: f64| (c / self.cell_size).floor() as i64;
        (q(p.x), q(p.y), q(p.z))
    }

    /// Handle of a point within the same-point tolerance of `p`, adding `p` if none exists.
    pub fn weld(&mut self, p: Point3) -> VertexRef {
        let (kx, ky, kz) = self.key(p);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(bucket) = self.cells.get(&(kx + dx, ky + dy, kz + dz)) else {
                        continue;
                    };
                    if let Some(&id) = bucket
                        .iter()
                        .find(|&&id| self.points[id as usize].distance_to(p) <= self.cell_size)
                    {
                        self.welded += 1;
                        return VertexRef::Local(id);
                    }
                }
            }
        }

        let id = self.append(p);
        self.cells.entry((kx, ky, kz)).or_default().push(id);
        VertexRef::Local(id)
    }

    /// Adds `p` without looking for an existing point.
    pub fn push(&mut self, p: Point3) -> VertexRef {
        VertexRef::Local(self.append(p))
    }

    fn append(&mut self, p: Point3) -> u32 {
        let id = u32::try_from(self.points.len()).unwrap_or(u32::MAX);
        self.points.push(p);
        id
    }

    #[must_use]
    pub fn get(&self, id: u32) -> Option<Point3> {
        self.points.get(id as usize).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn same_point_tolerance(&self) -> f64 {
        self.cell_size
    }

    /// Number of weld requests answered by an existing point.
    #[must_use]
    pub fn welded_count(&self) -> usize {
        self.welded
    }
}

#[derive(Debug, Clone, Copy)]
struct BridgeNode {
    s: f64,
    uv: UvPoint,
    point: Point3,
    normal: Option<Vec3>,
}

impl BridgeNode {
    fn eval(surface: &dyn Surface, s: f64, uv: UvPoint) -> Self {
        Self {
            s,
            uv,
            point: surface.point_at(uv.u, uv.v),
            normal: surface.normal_at(uv.u, uv.v),
        }
    }
}

/// Samples the straight parameter-space segment between two loop samples.
///
/// Returns only the new interior samples, ordered from `from` to `to`. The
/// subdivision is symmetric: sampling `to -> from` yields the same points in
/// reverse order.
pub(crate) fn sample_bridge(
    surface: &dyn Surface,
    tol: &CdtTolerance,
    max_depth: u32,
    locals: &mut PatchLocals,
    from: UvPoint,
    to: UvPoint,
) -> Vec<TrimSamplePoint> {
    let a = BridgeNode::eval(surface, 0.0, from);
    let b = BridgeNode::eval(surface, 1.0, to);

    let mut nodes = Vec::new();
    let mut stack = vec![(a, b, 0u32)];
    while let Some((a, b, depth)) = stack.pop() {
        match split_bridge(surface, tol, max_depth, &a, &b, depth) {
            Some(mid) => {
                stack.push((mid, b, depth + 1));
                stack.push((a, mid, depth + 1));
            }
            None if b.s < 1.0 => nodes.push(b),
            None => {}
        }
    }

    nodes
        .into_iter()
        .map(|node| TrimSamplePoint {
            t: node.s,
            e: None,
            uv: node.uv,
            vertex: locals.weld(node.point),
            tangent: None,
            normal: node.normal,
        })
        .collect()
}

fn split_bridge(
    surface: &dyn Surface,
    tol: &CdtTolerance,
    max_depth: u32,
    a: &BridgeNode,
    b: &BridgeNode,
    depth: u32,
) -> Option<BridgeNode> {
    if depth >= max_depth {
        return None;
    }

    let chord = a.point.distance_to(b.point);
    if chord < tol.min_dist {
        return None;
    }

    let mid = BridgeNode::eval(surface, 0.5 * (a.s + b.s), a.uv.midpoint(b.uv));
    if chord > tol.max_dist {
        return Some(mid);
    }

    // Order the chord ends so the deviation does not depend on the direction.
    let (p, q) = if (a.point.x, a.point.y, a.point.z) <= (b.point.x, b.point.y, b.point.z) {
        (a.point, b.point)
    } else {
        (b.point, a.point)
    };
    let deviation = mid.point.distance_to_line(p, q);
    if deviation > tol.within_dist {
        return Some(mid);
    }

    let normal_dot = a.normal.zip(b.normal).map(|(na, nb)| na.dot(nb));
    if deviation > tol.min_dist && tol.bends(normal_dot) {
        return Some(mid);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{CylinderSurface, Vec3};

    #[test]
    fn test_weld_merges_points_within_tolerance() {
        let mut locals = PatchLocals::new(1e-6);
        let a = locals.weld(Point3::new(1.0, 0.0, 0.0));
        let b = locals.weld(Point3::new(1.0 + 4e-7, 0.0, 0.0));
        let c = locals.weld(Point3::new(1.0, 1.0, 0.0));
        let d = locals.push(Point3::new(1.0, 0.0, 0.0));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(locals.len(), 3);
        assert_eq!(locals.welded_count(), 1);
    }

    #[test]
    fn test_seam_bridges_on_both_sides_share_handles() {
        let surface =
            CylinderSurface::from_base_axis_xaxis(Point3::ORIGIN, Vec3::new(0.0, 0.0, 1.0), Vec3::X, 1.0).unwrap();
        let tol = CdtTolerance {
            min_dist: 0.001,
            max_dist: 0.3,
            within_dist: 0.01,
            cos_within_ang: 0.0,
        };
        let mut locals = PatchLocals::new(1e-6);

        let up = sample_bridge(&surface, &tol, 24, &mut locals, UvPoint::new(1.0, 0.0), UvPoint::new(1.0, 1.0));
        let down = sample_bridge(&surface, &tol, 24, &mut locals, UvPoint::new(0.0, 1.0), UvPoint::new(0.0, 0.0));

        assert_eq!(up.len(), 3);
        let up_refs: Vec<VertexRef> = up.iter().map(|s| s.vertex).collect();
        let mut down_refs: Vec<VertexRef> = down.iter().map(|s| s.vertex).collect();
        down_refs.reverse();
        assert_eq!(up_refs, down_refs);
        assert!(up.windows(2).all(|w| w[0].uv.v < w[1].uv.v));
    }
}
