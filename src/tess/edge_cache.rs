//! Adaptive sampling of model edges, computed once and shared by both trims.
//!
//! Every edge owns one [`OnceLock`] slot. The first patch that needs an edge
//! samples it, publishes the new points to the [`PointArena`] in one batch and
//! fills the slot; every later request (from the same patch or the adjacent
//! one, on any thread) reads the slot without locking. Both trims of the edge
//! therefore see the same [`PointId`]s, which is what makes the emitted mesh
//! watertight without any distance-based welding.
//!
//! The sampler bisects the edge parameter interval with an explicit work
//! stack. Each trim parameter is bisected in lockstep, so every sample carries
//! the edge parameter `e` and one trim parameter per trim.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::geom::{BBox, BrepModel, EdgeId, ParamAxis, Point3, TrimId, UvPoint, Vec3};

use super::arena::{PointArena, PointId, VertexRef};
use super::loop_points::TrimSamplePoint;
use super::seam::SeamContext;
use super::settings::TessSettings;
use super::tolerance::CdtTolerance;

/// Parameters at which the edge extent is measured for the tolerance digest.
const EXTENT_SAMPLES: usize = 9;
/// Bisection steps used to locate a seam crossing.
const SEAM_BISECTION_STEPS: usize = 64;

/// Cached samples of one edge.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSamples {
    pub edge: EdgeId,
    /// The two trims of the edge, in the order the model lists them.
    pub trims: [TrimId; 2],
    /// Per trim, ordered by ascending trim parameter.
    per_trim: [Vec<TrimSamplePoint>; 2],
    /// Edge parameters of the samples, ascending.
    pub e_values: Vec<f64>,
    /// Arena ids of the samples, in edge-parameter order.
    pub points: Vec<PointId>,
    /// Thresholds the edge was sampled with.
    pub tolerance: CdtTolerance,
}

impl EdgeSamples {
    /// Samples as seen by `trim`, or an empty slice if `trim` does not use this edge.
    #[must_use]
    pub fn for_trim(&self, trim: TrimId) -> &[TrimSamplePoint] {
        if trim == self.trims[0] {
            &self.per_trim[0]
        } else if trim == self.trims[1] {
            &self.per_trim[1]
        } else {
            &[]
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Hit and miss counters of an [`EdgeSampleCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeCacheStats {
    pub hits: usize,
    pub misses: usize,
}

#[derive(Debug)]
pub struct EdgeSampleCache {
    slots: Vec<OnceLock<EdgeSamples>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl EdgeSampleCache {
    #[must_use]
    pub fn new(edge_count: usize) -> Self {
        Self {
            slots: (0..edge_count).map(|_| OnceLock::new()).collect(),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Samples of `edge`, computing and publishing them on first use.
    ///
    /// # Panics
    /// If `edge` is not an edge of the model the cache was created for.
    pub fn get_or_sample(
        &self,
        model: &BrepModel,
        settings: &TessSettings,
        arena: &PointArena,
        edge: EdgeId,
    ) -> &EdgeSamples {
        let mut computed = false;
        let samples = self.slots[edge.index()].get_or_init(|| {
            computed = true;
            sample_edge(model, settings, arena, edge)
        });
        if computed {
            self.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        samples
    }

    /// Samples of `edge` if some patch already requested them.
    #[must_use]
    pub fn get(&self, edge: EdgeId) -> Option<&EdgeSamples> {
        self.slots.get(edge.index()).and_then(OnceLock::get)
    }

    #[must_use]
    pub fn stats(&self) -> EdgeCacheStats {
        EdgeCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct EdgeNode {
    e: f64,
    /// Trim parameters, one per trim of the edge.
    t: [f64; 2],
    point: Point3,
    tangent: Option<Vec3>,
    /// Surface normals seen through each trim.
    normals: [Option<Vec3>; 2],
}

/// The edge and its two trims, resolved once per sampling run.
struct EdgeContext<'m> {
    model: &'m BrepModel,
    edge: EdgeId,
    trims: [TrimId; 2],
    reversed: [bool; 2],
    /// Trim parameters at the edge start and the edge end.
    t_ends: [(f64, f64); 2],
}

impl<'m> EdgeContext<'m> {
    fn new(model: &'m BrepModel, edge: EdgeId) -> Self {
        let data = model.edge(edge);
        let trims = [data.trims[0], data.trims[1]];
        let mut reversed = [false; 2];
        let mut t_ends = [(0.0, 0.0); 2];
        for k in 0..2 {
            let trim = model.trim(trims[k]);
            let (t0, t1) = trim.pcurve.domain();
            reversed[k] = trim.edge().is_some_and(|(_, r)| r);
            t_ends[k] = if reversed[k] { (t1, t0) } else { (t0, t1) };
        }
        Self {
            model,
            edge,
            trims,
            reversed,
            t_ends,
        }
    }

    fn uv(&self, k: usize, t: f64) -> UvPoint {
        self.model.trim(self.trims[k]).pcurve.point_at(t)
    }

    fn normal(&self, k: usize, t: f64) -> Option<Vec3> {
        let uv = self.uv(k, t);
        let face = self.model.trim(self.trims[k]).face;
        self.model.face(face).surface.normal_at(uv.u, uv.v)
    }

    fn node(&self, e: f64, t: [f64; 2], point: Option<Point3>) -> EdgeNode {
        let curve = &self.model.edge(self.edge).curve;
        EdgeNode {
            e,
            t,
            point: point.unwrap_or_else(|| curve.point_at(e)),
            tangent: curve.tangent_at(e),
            normals: [self.normal(0, t[0]), self.normal(1, t[1])],
        }
    }

    fn midpoint(&self, a: &EdgeNode, b: &EdgeNode) -> EdgeNode {
        self.node(
            0.5 * (a.e + b.e),
            [0.5 * (a.t[0] + b.t[0]), 0.5 * (a.t[1] + b.t[1])],
            None,
        )
    }

    /// Bounding-box diagonal of the curve, measured at evenly spaced parameters.
    fn extent(&self) -> f64 {
        let curve = &self.model.edge(self.edge).curve;
        let (e0, e1) = curve.domain();
        let points: Vec<Point3> = (0..EXTENT_SAMPLES)
            .map(|i| curve.point_at(e0 + (e1 - e0) * i as f64 / (EXTENT_SAMPLES - 1) as f64))
            .collect();
        BBox::from_points(&points).map_or(0.0, BBox::diagonal)
    }
}

fn sample_edge(model: &BrepModel, settings: &TessSettings, arena: &PointArena, edge: EdgeId) -> EdgeSamples {
    let ctx = EdgeContext::new(model, edge);
    let data = model.edge(edge);
    let tol = CdtTolerance::for_edge(settings, ctx.extent());

    let (e0, e1) = data.curve.domain();
    let start = ctx.node(
        e0,
        [ctx.t_ends[0].0, ctx.t_ends[1].0],
        Some(model.vertex(data.start).point),
    );
    let end = ctx.node(
        e1,
        [ctx.t_ends[0].1, ctx.t_ends[1].1],
        Some(model.vertex(data.end).point),
    );

    let mut stack: Vec<(EdgeNode, EdgeNode, u32)> = Vec::new();
    if data.is_closed() {
        let mid = ctx.midpoint(&start, &end);
        stack.push((mid, end, 1));
        stack.push((start, mid, 1));
    } else {
        stack.push((start, end, 0));
    }

    let mut nodes = vec![start];
    while let Some((a, b, depth)) = stack.pop() {
        match split_edge_interval(&ctx, &tol, settings, &a, &b, depth) {
            Some(mid) => {
                stack.push((mid, b, depth + 1));
                stack.push((a, mid, depth + 1));
            }
            None => nodes.push(b),
        }
    }

    let nodes = insert_seam_crossings(&ctx, settings, nodes);
    let last = nodes.len() - 1;

    let interior: Vec<Point3> = nodes[1..last].iter().map(|n| n.point).collect();
    let mut ids = Vec::with_capacity(nodes.len());
    ids.push(PointId(data.start.0));
    ids.extend(arena.publish(&interior));
    ids.push(PointId(data.end.0));

    let per_trim = [0, 1].map(|k| {
        let mut samples: Vec<TrimSamplePoint> = nodes
            .iter()
            .zip(&ids)
            .map(|(node, id)| TrimSamplePoint {
                t: node.t[k],
                e: Some(node.e),
                uv: ctx.uv(k, node.t[k]),
                vertex: VertexRef::Shared(*id),
                tangent: node.tangent.map(|v| if ctx.reversed[k] { v.neg() } else { v }),
                normal: node.normals[k],
            })
            .collect();
        if ctx.reversed[k] {
            samples.reverse();
        }
        samples
    });

    log::debug!(
        "sampled edge {edge}: {} points (min {:.3e}, max {:.3e}, within {:.3e})",
        ids.len(),
        tol.min_dist,
        tol.max_dist,
        tol.within_dist
    );

    EdgeSamples {
        edge,
        trims: ctx.trims,
        per_trim,
        e_values: nodes.iter().map(|n| n.e).collect(),
        points: ids,
        tolerance: tol,
    }
}

/// Returns the midpoint node when the interval `[a, b]` must be split.
fn split_edge_interval(
    ctx: &EdgeContext<'_>,
    tol: &CdtTolerance,
    settings: &TessSettings,
    a: &EdgeNode,
    b: &EdgeNode,
    depth: u32,
) -> Option<EdgeNode> {
    if depth >= settings.max_subdivision_depth {
        log::debug!("edge {} reached the subdivision depth limit at e={}", ctx.edge, a.e);
        return None;
    }

    let chord = a.point.distance_to(b.point);
    if chord < tol.min_dist {
        return None;
    }

    let mid = ctx.midpoint(a, b);
    if chord > tol.max_dist {
        return Some(mid);
    }

    let deviation = mid.point.distance_to_line(a.point, b.point);
    if deviation > tol.within_dist {
        return Some(mid);
    }

    if deviation > tol.min_dist {
        let tangent_dot = a.tangent.zip(b.tangent).map(|(ta, tb)| ta.dot(tb));
        let normal_bends = (0..2).any(|k| {
            let dot = a.normals[k].zip(b.normals[k]).map(|(na, nb)| na.dot(nb));
            tol.bends(dot)
        });
        if tol.bends(tangent_dot) || normal_bends {
            return Some(mid);
        }
    }

    None
}

/// Adds a sample wherever a trim on a periodic surface passes from one period
/// cell to the next between two samples that are both off the seam.
fn insert_seam_crossings(ctx: &EdgeContext<'_>, settings: &TessSettings, nodes: Vec<EdgeNode>) -> Vec<EdgeNode> {
    let mut nodes = nodes;
    for k in 0..2 {
        let face = ctx.model.trim(ctx.trims[k]).face;
        let seam = SeamContext::from_surface(ctx.model.face(face).surface.as_ref(), settings.seam_tolerance);
        if !seam.is_periodic() {
            continue;
        }

        let mut out: Vec<EdgeNode> = Vec::with_capacity(nodes.len() + 2);
        for pair in nodes.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            out.push(a);
            for (axis, _) in seam.periodic_axes() {
                if let Some(crossing) = locate_crossing(ctx, &seam, k, axis, &a, &b) {
                    out.push(crossing);
                    break;
                }
            }
        }
        if let Some(last) = nodes.last() {
            out.push(*last);
        }
        nodes = out;
    }
    nodes
}

fn locate_crossing(
    ctx: &EdgeContext<'_>,
    seam: &SeamContext,
    k: usize,
    axis: ParamAxis,
    a: &EdgeNode,
    b: &EdgeNode,
) -> Option<EdgeNode> {
    let ca = ctx.uv(k, a.t[k]).coord(axis);
    let cb = ctx.uv(k, b.t[k]).coord(axis);
    if seam.on_seam(axis, ca) || seam.on_seam(axis, cb) {
        return None;
    }
    let (cell_a, cell_b) = (seam.cell(axis, ca), seam.cell(axis, cb));
    if cell_a == cell_b {
        return None;
    }

    let seam_value = seam.seam_line(axis, cell_a.max(cell_b))?;
    let half_tol = 0.5 * seam.tolerance();
    let (mut lo, mut hi) = (*a, *b);
    let mut mid = ctx.midpoint(&lo, &hi);
    for _ in 0..SEAM_BISECTION_STEPS {
        let c = ctx.uv(k, mid.t[k]).coord(axis);
        if (c - seam_value).abs() <= half_tol {
            break;
        }
        if seam.cell(axis, c) == cell_a {
            lo = mid;
        } else {
            hi = mid;
        }
        mid = ctx.midpoint(&lo, &hi);
    }
    Some(mid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Vec3, box_shell, cylinder_bridged, torus_shell};

    fn setup(model: &BrepModel) -> (PointArena, EdgeSampleCache) {
        (PointArena::seeded(model), EdgeSampleCache::new(model.edges.len()))
    }

    #[test]
    fn test_straight_edge_without_length_limit_keeps_only_endpoints() {
        let model = box_shell(Vec3::new(1.0, 1.0, 1.0)).unwrap();
        let (arena, cache) = setup(&model);
        let settings = TessSettings::default();

        let samples = cache.get_or_sample(&model, &settings, &arena, EdgeId(0));
        let edge = model.edge(EdgeId(0));
        assert_eq!(samples.points, vec![PointId(edge.start.0), PointId(edge.end.0)]);
        assert_eq!(arena.len(), model.vertices.len());
    }

    #[test]
    fn test_second_request_is_a_hit_and_allocates_nothing() {
        let model = box_shell(Vec3::new(1.0, 1.0, 1.0)).unwrap();
        let (arena, cache) = setup(&model);
        let settings = TessSettings::default().with_max_edge_length(Some(0.3));

        let first = cache.get_or_sample(&model, &settings, &arena, EdgeId(1)).clone();
        let arena_len = arena.len();
        let second = cache.get_or_sample(&model, &settings, &arena, EdgeId(1));

        assert_eq!(&first, second);
        assert_eq!(arena.len(), arena_len);
        assert_eq!(cache.stats(), EdgeCacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_trims_see_mirrored_sequences() {
        let model = box_shell(Vec3::new(2.0, 1.0, 1.0)).unwrap();
        let (arena, cache) = setup(&model);
        let settings = TessSettings::default().with_max_edge_length(Some(0.3));

        let samples = cache.get_or_sample(&model, &settings, &arena, EdgeId(0));
        let a: Vec<VertexRef> = samples.for_trim(samples.trims[0]).iter().map(|s| s.vertex).collect();
        let mut b: Vec<VertexRef> = samples.for_trim(samples.trims[1]).iter().map(|s| s.vertex).collect();
        b.reverse();
        assert_eq!(a.len(), samples.len());
        assert_eq!(a, b);
        assert!(samples.e_values.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_seam_crossing_sample_is_inserted() {
        let model = cylinder_bridged(1.0, 1.0, 0.25).unwrap();
        let (arena, cache) = setup(&model);
        let settings = TessSettings::default();

        let lateral_trim = (0..model.trims.len() as u32)
            .map(TrimId)
            .find(|&t| model.face(model.trim(t).face).surface.is_u_closed())
            .unwrap();
        let (edge, _) = model.trim(lateral_trim).edge().unwrap();
        let samples = cache.get_or_sample(&model, &settings, &arena, edge);

        let on_seam = samples
            .for_trim(lateral_trim)
            .iter()
            .filter(|s| (s.uv.u - 1.0).abs() < 1e-9)
            .count();
        assert_eq!(on_seam, 1);
    }

    #[test]
    fn test_concurrent_first_requests_sample_once() {
        const THREADS: usize = 8;
        let model = box_shell(Vec3::new(2.0, 1.0, 1.0)).unwrap();
        let (arena, cache) = setup(&model);
        let settings = TessSettings::default().with_max_edge_length(Some(0.3));

        let results: Vec<EdgeSamples> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| scope.spawn(|| cache.get_or_sample(&model, &settings, &arena, EdgeId(0)).clone()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(cache.stats(), EdgeCacheStats { hits: THREADS - 1, misses: 1 });
        assert!(results.windows(2).all(|w| w[0].points == w[1].points));

        let interior = results[0].len() - 2;
        assert!(interior > 0);
        assert_eq!(arena.len(), model.vertices.len() + interior);
    }

    #[test]
    fn test_small_closed_edge_keeps_more_than_two_chords() {
        // Tube circles of diameter 0.1 under an absolute tolerance of 0.1.
        let model = torus_shell(10.0, 0.05).unwrap();
        let (arena, cache) = setup(&model);
        let settings = TessSettings::default().with_abs(0.1).with_rel(0.01).with_min_dist(0.01);

        for e in (0..model.edges.len() as u32).map(EdgeId) {
            let samples = cache.get_or_sample(&model, &settings, &arena, e);
            assert!(model.edge(e).is_closed());
            assert!(samples.len() >= 5, "edge {e} kept {} samples", samples.len());
        }
    }
}
