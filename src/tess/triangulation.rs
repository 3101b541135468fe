use std::collections::{HashMap, HashSet};
use std::fmt::Debug;

use thiserror::Error;

use crate::geom::{Tolerance, UvBvh, UvDomain, UvPoint, orient2d, segments_cross, signed_area};

use super::arena::VertexRef;
use super::loop_points::LoopPoints;

/// Reasons a backend can refuse a polygon.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("polygon has non-finite uv coordinates")]
    NonFinite,
    #[error("outer loop has {0} distinct points, at least 3 are required")]
    TooFewPoints(usize),
    #[error("outer loop is not simple: segments {0} and {1} cross")]
    SelfIntersecting(usize, usize),
    #[error("outer loop encloses no area")]
    ZeroArea,
    #[error("no visible bridge from hole {0} to the outer loop")]
    HoleBridge(usize),
    #[error("ear clipping stalled with {0} vertices left")]
    NoEar(usize),
}

/// Constrained triangulation input, in parameter space.
///
/// `outer` is counter-clockwise, every hole clockwise; none repeats its first
/// index. `steiner` lists extra points strictly inside the region.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CdtInput {
    pub points: Vec<UvPoint>,
    pub outer: Vec<u32>,
    pub holes: Vec<Vec<u32>>,
    pub steiner: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CdtOutput {
    /// Counter-clockwise triangles indexing `CdtInput::points`.
    pub triangles: Vec<[u32; 3]>,
    pub flips: usize,
    /// Steiner points that fell on a vertex or a constrained edge.
    pub skipped_steiner: usize,
}

/// A pluggable constrained triangulator.
pub trait TriangulationBackend: Send + Sync + Debug {
    /// Triangulates the region bounded by `input.outer` minus its holes.
    ///
    /// # Errors
    /// Returns a [`BackendError`] when the polygon cannot be triangulated.
    fn triangulate(&self, input: &CdtInput) -> Result<CdtOutput, BackendError>;
}

/// Triangulation input together with the vertex handle of every point.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchPolygon {
    pub input: CdtInput,
    pub handles: Vec<VertexRef>,
}

/// Flattens normalized loops and interior samples into a [`PatchPolygon`].
///
/// The closing repeat and consecutive duplicates are dropped, the outer ring
/// is checked for self-intersection and every ring is oriented (outer CCW,
/// holes CW).
pub(crate) fn assemble(loops: &[LoopPoints], steiner: &[(UvPoint, VertexRef)]) -> Result<PatchPolygon, BackendError> {
    let all: Vec<UvPoint> = loops.iter().flat_map(|lp| lp.points.iter().map(|p| p.uv)).collect();
    if all.iter().chain(steiner.iter().map(|(uv, _)| uv)).any(|p| !p.u.is_finite() || !p.v.is_finite()) {
        return Err(BackendError::NonFinite);
    }
    let diag = UvDomain::from_points(&all).map_or(1.0, |d| d.diagonal()).max(f64::MIN_POSITIVE);
    let dup_eps = 1e-12 * diag;

    let mut points = Vec::new();
    let mut handles = Vec::new();
    let mut outer = Vec::new();
    let mut holes = Vec::new();

    for (k, lp) in loops.iter().enumerate() {
        let mut ring: Vec<(UvPoint, VertexRef)> = Vec::with_capacity(lp.points.len());
        for sample in &lp.points {
            match ring.last() {
                Some((last, _)) if last.distance(sample.uv) <= dup_eps => {}
                _ => ring.push((sample.uv, sample.vertex)),
            }
        }
        while ring.len() > 1 && ring[0].0.distance(ring[ring.len() - 1].0) <= dup_eps {
            ring.pop();
        }

        let is_outer = k == 0;
        if ring.len() < 3 {
            if is_outer {
                return Err(BackendError::TooFewPoints(ring.len()));
            }
            log::debug!("dropping hole loop {} with {} distinct points", lp.loop_id, ring.len());
            continue;
        }

        let uvs: Vec<UvPoint> = ring.iter().map(|(uv, _)| *uv).collect();
        let area = signed_area(&uvs);
        if is_outer {
            check_simple(&uvs, Tolerance::new(1e-14 * diag * diag))?;
            if area.abs() <= 1e-24 * diag * diag {
                return Err(BackendError::ZeroArea);
            }
        }
        if (is_outer && area < 0.0) || (!is_outer && area > 0.0) {
            ring.reverse();
        }

        let mut indices = Vec::with_capacity(ring.len());
        for (uv, handle) in ring {
            indices.push(index_of(points.len()));
            points.push(uv);
            handles.push(handle);
        }
        if is_outer {
            outer = indices;
        } else {
            holes.push(indices);
        }
    }

    let mut steiner_ids = Vec::with_capacity(steiner.len());
    for &(uv, handle) in steiner {
        steiner_ids.push(index_of(points.len()));
        points.push(uv);
        handles.push(handle);
    }

    Ok(PatchPolygon {
        input: CdtInput {
            points,
            outer,
            holes,
            steiner: steiner_ids,
        },
        handles,
    })
}

fn index_of(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

fn check_simple(ring: &[UvPoint], tol: Tolerance) -> Result<(), BackendError> {
    let n = ring.len();
    let mut closed = ring.to_vec();
    closed.push(ring[0]);
    let Some(bvh) = UvBvh::over_segments(&closed) else {
        return Ok(());
    };

    for i in 0..n {
        let (a, b) = (closed[i], closed[i + 1]);
        let query = UvDomain::new(a.u.min(b.u), a.u.max(b.u), a.v.min(b.v), a.v.max(b.v));
        let mut hit = None;
        bvh.query_bbox(query, |j| {
            let adjacent = j == i || j == (i + 1) % n || i == (j + 1) % n;
            if j < i || adjacent {
                return true;
            }
            if segments_cross(a, b, closed[j], closed[j + 1], tol) {
                hit = Some(j);
                return false;
            }
            true
        });
        if let Some(j) = hit {
            return Err(BackendError::SelfIntersecting(i, j));
        }
    }
    Ok(())
}

// ============================================================================
// Ear clipping
// ============================================================================

/// Ear clipping with hole bridging, followed by Lawson edge flips and
/// incremental Steiner insertion.
///
/// Ring edges are constraints and are never flipped. Collinear ring points
/// are kept so that every boundary sample stays a triangle vertex.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstrainedEarClip;

#[derive(Debug, Clone, Copy)]
struct Node {
    idx: u32,
    point: UvPoint,
    prev: usize,
    next: usize,
}

#[derive(Debug, Clone, Copy)]
struct Eps {
    len: f64,
    area: f64,
    circle: f64,
}

impl Eps {
    fn for_points(points: &[UvPoint]) -> Self {
        let diag = UvDomain::from_points(points).map_or(1.0, |d| d.diagonal()).max(f64::MIN_POSITIVE);
        Self {
            len: 1e-12 * diag,
            area: 1e-12 * diag * diag,
            circle: 1e-12 * diag.powi(4),
        }
    }

    fn tolerance(self) -> Tolerance {
        Tolerance::new(self.len)
    }
}

impl TriangulationBackend for ConstrainedEarClip {
    fn triangulate(&self, input: &CdtInput) -> Result<CdtOutput, BackendError> {
        if input.points.iter().any(|p| !p.u.is_finite() || !p.v.is_finite()) {
            return Err(BackendError::NonFinite);
        }
        if input.outer.len() < 3 {
            return Err(BackendError::TooFewPoints(input.outer.len()));
        }

        let eps = Eps::for_points(&input.points);
        let mut nodes = Vec::with_capacity(input.points.len() + 2 * input.holes.len());
        let outer_start = build_ring_nodes(&mut nodes, &input.outer, &input.points);

        let mut hole_starts: Vec<(usize, usize)> = input
            .holes
            .iter()
            .enumerate()
            .filter(|(_, ring)| ring.len() >= 3)
            .map(|(k, ring)| {
                let start = build_ring_nodes(&mut nodes, ring, &input.points);
                (k, leftmost_node(start, &nodes))
            })
            .collect();
        hole_starts.sort_by(|a, b| {
            let pa = nodes[a.1].point;
            let pb = nodes[b.1].point;
            pa.u.total_cmp(&pb.u).then(pa.v.total_cmp(&pb.v))
        });

        for (k, hole) in hole_starts {
            let bridge = find_hole_bridge(hole, outer_start, &nodes, eps.tolerance()).ok_or(BackendError::HoleBridge(k))?;
            split_polygon(bridge, hole, &mut nodes);
        }

        let triangles = earclip_polygon(outer_start, &mut nodes, eps)?;

        let mut mesh = TriMesh::new(triangles, input, eps);
        let mut flips = 0;
        let mut skipped_steiner = 0;
        if mesh.is_manifold() {
            flips += mesh.legalize_all(&input.points);
            for &s in &input.steiner {
                match mesh.insert_steiner(s, &input.points) {
                    Some(n) => flips += n,
                    None => skipped_steiner += 1,
                }
            }
        } else {
            log::debug!("ear clipping produced overlapping edges, skipping refinement");
            skipped_steiner = input.steiner.len();
        }

        Ok(CdtOutput {
            triangles: mesh.tris,
            flips,
            skipped_steiner,
        })
    }
}

fn build_ring_nodes(nodes: &mut Vec<Node>, ring: &[u32], points: &[UvPoint]) -> usize {
    let start = nodes.len();
    let len = ring.len();
    for (i, &idx) in ring.iter().enumerate() {
        nodes.push(Node {
            idx,
            point: points[idx as usize],
            prev: start + (i + len - 1) % len,
            next: start + (i + 1) % len,
        });
    }
    start
}

fn ring_len(start: usize, nodes: &[Node]) -> usize {
    let mut count = 0usize;
    let mut cur = start;
    loop {
        count += 1;
        cur = nodes[cur].next;
        if cur == start || count > nodes.len().saturating_add(1) {
            break;
        }
    }
    count
}

fn leftmost_node(start: usize, nodes: &[Node]) -> usize {
    let mut left = start;
    let mut cur = nodes[start].next;
    while cur != start {
        let a = nodes[cur].point;
        let b = nodes[left].point;
        if a.u < b.u || (a.u == b.u && a.v < b.v) {
            left = cur;
        }
        cur = nodes[cur].next;
    }
    left
}

fn find_hole_bridge(hole: usize, outer_start: usize, nodes: &[Node], tol: Tolerance) -> Option<usize> {
    let hole_p = nodes[hole].point;
    let mut best_x = f64::NEG_INFINITY;
    let mut best_edge = None;

    let mut p = outer_start;
    loop {
        let q = nodes[p].next;
        let a = nodes[p].point;
        let b = nodes[q].point;

        if (a.v > hole_p.v) != (b.v > hole_p.v) {
            let t = (hole_p.v - a.v) / (b.v - a.v);
            let x = a.u + t * (b.u - a.u);
            if x <= hole_p.u + tol.eps && x > best_x {
                best_x = x;
                best_edge = Some((p, q));
            }
        }

        p = q;
        if p == outer_start {
            break;
        }
    }

    if let Some((e0, e1)) = best_edge {
        let candidates = if nodes[e0].point.u < nodes[e1].point.u { [e1, e0] } else { [e0, e1] };
        for cand in candidates {
            if is_visible(hole_p, nodes[cand].point, cand, outer_start, nodes, tol) {
                return Some(cand);
            }
        }
    }

    let mut best = None;
    let mut best_dist = f64::INFINITY;
    let mut v = outer_start;
    loop {
        let p = nodes[v].point;
        if p.u <= hole_p.u + tol.eps && is_visible(hole_p, p, v, outer_start, nodes, tol) {
            let d = p.distance(hole_p);
            if d < best_dist {
                best_dist = d;
                best = Some(v);
            }
        }

        v = nodes[v].next;
        if v == outer_start {
            break;
        }
    }

    best
}

/// Joins the ring of `b` into the ring of `a` through a doubled diagonal `a-b`.
fn split_polygon(a: usize, b: usize, nodes: &mut Vec<Node>) {
    let a_next = nodes[a].next;
    let b_prev = nodes[b].prev;

    let a2 = nodes.len();
    nodes.push(Node { prev: 0, next: 0, ..nodes[a] });
    let b2 = nodes.len();
    nodes.push(Node { prev: 0, next: 0, ..nodes[b] });

    nodes[a].next = b;
    nodes[b].prev = a;

    nodes[b_prev].next = b2;
    nodes[b2].prev = b_prev;

    nodes[b2].next = a2;
    nodes[a2].prev = b2;

    nodes[a2].next = a_next;
    nodes[a_next].prev = a2;
}

fn earclip_polygon(start: usize, nodes: &mut [Node], eps: Eps) -> Result<Vec<[u32; 3]>, BackendError> {
    let mut area = signed_area_ring(start, nodes);
    if area <= eps.area {
        return Err(BackendError::ZeroArea);
    }

    let mut start = start;
    let mut remaining = ring_len(start, nodes);
    let mut triangles = Vec::with_capacity(remaining.saturating_sub(2));
    let mut ear = start;
    let mut stop = start;

    while remaining > 3 {
        let prev = nodes[ear].prev;
        let next = nodes[ear].next;
        let ear_area = 0.5 * orient2d(nodes[prev].point, nodes[ear].point, nodes[next].point);

        // The rest of the ring must keep some area, otherwise its flat
        // vertices would end up without a triangle.
        if area - ear_area > eps.area && is_ear(prev, ear, next, nodes, eps) {
            triangles.push([nodes[prev].idx, nodes[ear].idx, nodes[next].idx]);
            area -= ear_area;
            if ear == start {
                start = next;
            }
            remove_node(ear, nodes);
            remaining -= 1;
            ear = next;
            stop = next;
            continue;
        }

        ear = next;
        if ear == stop {
            return Err(BackendError::NoEar(remaining));
        }
    }

    let prev = nodes[start].prev;
    let next = nodes[start].next;
    if orient2d(nodes[prev].point, nodes[start].point, nodes[next].point) > eps.area {
        triangles.push([nodes[prev].idx, nodes[start].idx, nodes[next].idx]);
    }

    Ok(triangles)
}

fn is_ear(prev: usize, ear: usize, next: usize, nodes: &[Node], eps: Eps) -> bool {
    let a = nodes[prev].point;
    let b = nodes[ear].point;
    let c = nodes[next].point;

    if orient2d(a, b, c) <= 0.0 || distance_point_to_line_2d(a, b, c) <= eps.len {
        return false;
    }

    let mut p = nodes[next].next;
    let mut guard = 0usize;
    while p != prev {
        guard += 1;
        if guard > nodes.len().saturating_add(1) {
            break;
        }
        let pt = nodes[p].point;
        // Bridge duplicates sit on a triangle corner without blocking it.
        let at_corner = pt.distance(a) <= eps.len || pt.distance(b) <= eps.len || pt.distance(c) <= eps.len;
        if !at_corner && point_in_triangle(a, b, c, pt, eps.area) {
            let cross = orient2d(nodes[nodes[p].prev].point, pt, nodes[nodes[p].next].point);
            if cross <= eps.area {
                return false;
            }
        }
        p = nodes[p].next;
    }

    true
}

fn signed_area_ring(start: usize, nodes: &[Node]) -> f64 {
    let mut area = 0.0;
    let mut p = start;
    loop {
        let q = nodes[p].next;
        let a = nodes[p].point;
        let b = nodes[q].point;
        area += a.u * b.v - b.u * a.v;
        p = q;
        if p == start {
            break;
        }
    }
    0.5 * area
}

fn remove_node(node: usize, nodes: &mut [Node]) {
    let prev = nodes[node].prev;
    let next = nodes[node].next;
    nodes[prev].next = next;
    nodes[next].prev = prev;
}

fn point_in_triangle(a: UvPoint, b: UvPoint, c: UvPoint, p: UvPoint, eps: f64) -> bool {
    orient2d(a, b, p) >= -eps && orient2d(b, c, p) >= -eps && orient2d(c, a, p) >= -eps
}

fn is_visible(a: UvPoint, b: UvPoint, b_node: usize, ring_start: usize, nodes: &[Node], tol: Tolerance) -> bool {
    let mut e = ring_start;
    loop {
        let n = nodes[e].next;
        if e != b_node && n != b_node && segments_intersect(a, b, nodes[e].point, nodes[n].point, tol) {
            return false;
        }

        e = n;
        if e == ring_start {
            break;
        }
    }
    true
}

fn segments_intersect(a: UvPoint, b: UvPoint, c: UvPoint, d: UvPoint, tol: Tolerance) -> bool {
    let o1 = orient2d(a, b, c);
    let o2 = orient2d(a, b, d);
    let o3 = orient2d(c, d, a);
    let o4 = orient2d(c, d, b);

    if o1.abs() <= tol.eps && on_segment(a, c, b, tol) {
        return true;
    }
    if o2.abs() <= tol.eps && on_segment(a, d, b, tol) {
        return true;
    }
    if o3.abs() <= tol.eps && on_segment(c, a, d, tol) {
        return true;
    }
    if o4.abs() <= tol.eps && on_segment(c, b, d, tol) {
        return true;
    }

    let ab = (o1 > tol.eps && o2 < -tol.eps) || (o1 < -tol.eps && o2 > tol.eps);
    let cd = (o3 > tol.eps && o4 < -tol.eps) || (o3 < -tol.eps && o4 > tol.eps);
    ab && cd
}

fn on_segment(a: UvPoint, p: UvPoint, b: UvPoint, tol: Tolerance) -> bool {
    p.u >= a.u.min(b.u) - tol.eps
        && p.u <= a.u.max(b.u) + tol.eps
        && p.v >= a.v.min(b.v) - tol.eps
        && p.v <= a.v.max(b.v) + tol.eps
}

fn distance_point_to_line_2d(a: UvPoint, p: UvPoint, b: UvPoint) -> f64 {
    let len = a.distance(b);
    if !len.is_finite() || len <= 0.0 {
        return p.distance(a);
    }
    orient2d(a, b, p).abs() / len
}

// ============================================================================
// Delaunay refinement
// ============================================================================

/// Triangle soup with directed-edge adjacency, used for flips and insertion.
struct TriMesh {
    tris: Vec<[u32; 3]>,
    edges: HashMap<(u32, u32), usize>,
    constrained: HashSet<(u32, u32)>,
    manifold: bool,
    eps: Eps,
}

fn undirected(a: u32, b: u32) -> (u32, u32) {
    if a < b { (a, b) } else { (b, a) }
}

fn in_circle(a: UvPoint, b: UvPoint, c: UvPoint, d: UvPoint) -> f64 {
    let (adx, ady) = (a.u - d.u, a.v - d.v);
    let (bdx, bdy) = (b.u - d.u, b.v - d.v);
    let (cdx, cdy) = (c.u - d.u, c.v - d.v);
    (adx * adx + ady * ady) * (bdx * cdy - cdx * bdy)
        + (bdx * bdx + bdy * bdy) * (cdx * ady - adx * cdy)
        + (cdx * cdx + cdy * cdy) * (adx * bdy - bdx * ady)
}

impl TriMesh {
    fn new(tris: Vec<[u32; 3]>, input: &CdtInput, eps: Eps) -> Self {
        let mut constrained = HashSet::new();
        for ring in std::iter::once(&input.outer).chain(input.holes.iter()) {
            for (i, &a) in ring.iter().enumerate() {
                constrained.insert(undirected(a, ring[(i + 1) % ring.len()]));
            }
        }

        let mut mesh = Self {
            tris: Vec::with_capacity(tris.len()),
            edges: HashMap::new(),
            constrained,
            manifold: true,
            eps,
        };
        for tri in tris {
            let t = mesh.push(tri);
            let [a, b, c] = mesh.tris[t];
            if [(a, b), (b, c), (c, a)].iter().any(|e| mesh.edges.get(e) != Some(&t)) {
                mesh.manifold = false;
            }
        }
        mesh
    }

    fn is_manifold(&self) -> bool {
        self.manifold
    }

    fn push(&mut self, tri: [u32; 3]) -> usize {
        let t = self.tris.len();
        self.tris.push(tri);
        self.link(t);
        t
    }

    fn link(&mut self, t: usize) {
        let [a, b, c] = self.tris[t];
        for e in [(a, b), (b, c), (c, a)] {
            self.edges.insert(e, t);
        }
    }

    fn set(&mut self, t: usize, tri: [u32; 3]) {
        let [a, b, c] = self.tris[t];
        for e in [(a, b), (b, c), (c, a)] {
            if self.edges.get(&e) == Some(&t) {
                self.edges.remove(&e);
            }
        }
        self.tris[t] = tri;
        self.link(t);
    }

    fn apex(&self, t: usize, a: u32, b: u32) -> u32 {
        let tri = self.tris[t];
        tri.into_iter().find(|&v| v != a && v != b).unwrap_or(tri[0])
    }

    /// Flips `a-b` when it is not locally Delaunay; returns the new apex on success.
    fn try_flip(&mut self, a: u32, b: u32, points: &[UvPoint]) -> Option<u32> {
        if self.constrained.contains(&undirected(a, b)) {
            return None;
        }
        let t1 = *self.edges.get(&(a, b))?;
        let t2 = *self.edges.get(&(b, a))?;
        let c = self.apex(t1, a, b);
        let d = self.apex(t2, b, a);
        let (pa, pb, pc, pd) = (points[a as usize], points[b as usize], points[c as usize], points[d as usize]);

        if in_circle(pa, pb, pc, pd) <= self.eps.circle {
            return None;
        }
        if orient2d(pa, pd, pc) <= self.eps.area || orient2d(pd, pb, pc) <= self.eps.area {
            return None;
        }

        self.set(t1, [a, d, c]);
        self.set(t2, [d, b, c]);
        Some(d)
    }

    fn legalize(&mut self, mut stack: Vec<(u32, u32)>, points: &[UvPoint]) -> usize {
        let mut flips = 0;
        let guard = 64 * self.tris.len().max(16);
        while let Some((a, b)) = stack.pop() {
            if flips > guard {
                log::debug!("edge flipping did not settle after {flips} flips");
                break;
            }
            let Some(&t) = self.edges.get(&(a, b)) else {
                continue;
            };
            let c = self.apex(t, a, b);
            if let Some(d) = self.try_flip(a, b, points) {
                flips += 1;
                stack.extend([(a, d), (d, b), (b, c), (c, a)]);
            }
        }
        flips
    }

    fn legalize_all(&mut self, points: &[UvPoint]) -> usize {
        let mut edges: Vec<(u32, u32)> = self.edges.keys().copied().filter(|&(a, b)| a < b).collect();
        edges.sort_unstable();
        self.legalize(edges, points)
    }

    /// Inserts point `s`, splitting the triangle or the edge it falls on.
    ///
    /// Returns the number of flips spent restoring the Delaunay property, or
    /// `None` when the point lies on a vertex, on a constrained edge or
    /// outside every triangle.
    fn insert_steiner(&mut self, s: u32, points: &[UvPoint]) -> Option<usize> {
        let p = points[s as usize];
        let eps = self.eps.area;

        for t in 0..self.tris.len() {
            let [a, b, c] = self.tris[t];
            let o = [
                orient2d(points[a as usize], points[b as usize], p),
                orient2d(points[b as usize], points[c as usize], p),
                orient2d(points[c as usize], points[a as usize], p),
            ];
            if o.iter().any(|&x| x < -eps) {
                continue;
            }

            let on_edge: Vec<usize> = (0..3).filter(|&k| o[k].abs() <= eps).collect();
            return match on_edge.as_slice() {
                [] => {
                    self.set(t, [a, b, s]);
                    self.push([b, c, s]);
                    self.push([c, a, s]);
                    Some(self.legalize(vec![(a, b), (b, c), (c, a)], points))
                }
                [k] => {
                    let tri = [a, b, c];
                    let (x, y, z) = (tri[*k], tri[(*k + 1) % 3], tri[(*k + 2) % 3]);
                    if self.constrained.contains(&undirected(x, y)) {
                        return None;
                    }
                    let t2 = *self.edges.get(&(y, x))?;
                    let w = self.apex(t2, y, x);
                    self.set(t, [x, s, z]);
                    self.push([s, y, z]);
                    self.set(t2, [y, s, w]);
                    self.push([s, x, w]);
                    Some(self.legalize(vec![(y, z), (z, x), (x, w), (w, y)], points))
                }
                _ => None,
            };
        }
        None
    }
}
