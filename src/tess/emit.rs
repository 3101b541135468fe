use std::collections::HashMap;

use crate::geom::{FaceId, Point3, Surface, UvPoint, Vec3};

use super::arena::{PointArena, VertexRef};
use super::bridge::PatchLocals;
use super::triangulation::PatchPolygon;

/// One output triangle, wound so its normal points out of the face.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedTriangle {
    pub face: FaceId,
    pub vertices: [VertexRef; 3],
    pub positions: [Point3; 3],
    pub normals: [Vec3; 3],
}

impl EmittedTriangle {
    /// Area of the triangle in 3D.
    #[must_use]
    pub fn area(&self) -> f64 {
        let [a, b, c] = self.positions;
        0.5 * b.sub_point(a).cross(c.sub_point(a)).length()
    }
}

/// Receiver of emitted triangles.
pub trait MeshConsumer {
    fn consume(&mut self, triangle: &EmittedTriangle);
}

impl MeshConsumer for Vec<EmittedTriangle> {
    fn consume(&mut self, triangle: &EmittedTriangle) {
        self.push(triangle.clone());
    }
}

/// Maps backend triangles of one patch back to 3D.
pub(crate) struct PatchEmitter<'a> {
    pub face: FaceId,
    pub surface: &'a dyn Surface,
    pub reversed: bool,
    pub arena: &'a PointArena,
    pub locals: &'a PatchLocals,
    pub min_triangle_area: f64,
}

impl PatchEmitter<'_> {
    fn position(&self, vertex: VertexRef) -> Option<Point3> {
        match vertex {
            VertexRef::Shared(id) => self.arena.get(id),
            VertexRef::Local(id) => self.locals.get(id),
        }
    }

    /// Emits `triangles` (indices into `polygon`); returns the kept triangles
    /// and the number of degenerate ones dropped.
    ///
    /// Triangles around a collapsed vertex are rebuilt first, see [`refan_collapsed`].
    pub(crate) fn emit(&self, polygon: &PatchPolygon, triangles: &[[u32; 3]]) -> (Vec<EmittedTriangle>, usize) {
        let (triangles, mut degenerate) = refan_collapsed(&polygon.handles, triangles);
        let mut out = Vec::with_capacity(triangles.len());

        for tri in &triangles {
            match self.emit_one(polygon, *tri) {
                Some(t) => out.push(t),
                None => degenerate += 1,
            }
        }

        (out, degenerate)
    }

    fn emit_one(&self, polygon: &PatchPolygon, tri: [u32; 3]) -> Option<EmittedTriangle> {
        let vertices = tri.map(|i| polygon.handles[i as usize]);
        if vertices[0] == vertices[1] || vertices[1] == vertices[2] || vertices[0] == vertices[2] {
            return None;
        }

        let [a, b, c] = vertices;
        let (Some(pa), Some(pb), Some(pc)) = (self.position(a), self.position(b), self.position(c)) else {
            log::debug!("face {}: triangle references an unknown vertex", self.face);
            return None;
        };

        let cross = pb.sub_point(pa).cross(pc.sub_point(pa));
        if 0.5 * cross.length() < self.min_triangle_area {
            return None;
        }
        let facet = cross.normalized().unwrap_or(Vec3::Z);

        let uvs: [UvPoint; 3] = tri.map(|i| polygon.input.points[i as usize]);
        let mut normals = uvs.map(|uv| self.surface.normal_at(uv.u, uv.v).unwrap_or(facet));
        let mut vertices = vertices;
        let mut positions = [pa, pb, pc];

        if self.reversed {
            vertices.swap(1, 2);
            positions.swap(1, 2);
            normals.swap(1, 2);
            normals = normals.map(Vec3::neg);
        }

        Some(EmittedTriangle {
            face: self.face,
            vertices,
            positions,
            normals,
        })
    }
}

// ============================================================================
// Collapsed vertices
// ============================================================================

/// Rebuilds the triangles around every vertex that several polygon corners
/// map to, such as the pole reached by a singular trim.
///
/// Triangles holding the vertex twice are dropped. The remaining ones each
/// contribute their opposite edge to the link of the vertex; the link is
/// walked, loops in it are erased and filled on their own, and the vertex is
/// fanned once over what is left. Every link edge keeps exactly one triangle
/// and the vertex ends up with a single fan, so its edges stay manifold.
///
/// Returns the new triangle list and the number of triangles dropped.
pub(crate) fn refan_collapsed(handles: &[VertexRef], triangles: &[[u32; 3]]) -> (Vec<[u32; 3]>, usize) {
    let handle = |i: u32| handles[i as usize];
    let mut collapsed: Vec<VertexRef> = triangles
        .iter()
        .filter_map(|&tri| {
            let [a, b, c] = tri.map(handle);
            if a == b || a == c {
                Some(a)
            } else if b == c {
                Some(b)
            } else {
                None
            }
        })
        .collect();
    collapsed.sort_unstable();
    collapsed.dedup();

    let mut tris = triangles.to_vec();
    let mut dropped = 0usize;
    for vertex in collapsed {
        let Some(centre) = handles.iter().position(|&h| h == vertex) else {
            continue;
        };

        let mut kept = Vec::with_capacity(tris.len());
        let mut link: Vec<(u32, u32)> = Vec::new();
        for tri in tris {
            let hs = tri.map(handle);
            match hs.iter().filter(|&&h| h == vertex).count() {
                0 => kept.push(tri),
                1 => {
                    let k = hs.iter().position(|&h| h == vertex).unwrap_or(0);
                    let (a, b) = (tri[(k + 1) % 3], tri[(k + 2) % 3]);
                    if handle(a) == handle(b) {
                        dropped += 1;
                    } else {
                        link.push((a, b));
                    }
                }
                _ => dropped += 1,
            }
        }

        kept.extend(LinkWalk::new(handles, &link).fan(centre as u32));
        tris = kept;
    }
    (tris, dropped)
}

/// Directed link edges of one collapsed vertex, walked by handle.
struct LinkWalk<'a> {
    handles: &'a [VertexRef],
    link: &'a [(u32, u32)],
    outgoing: HashMap<VertexRef, Vec<usize>>,
    used: Vec<bool>,
    /// Every handle has as many incoming as outgoing link edges.
    cyclic: bool,
    /// First edge of the main walk: one leaving a handle with more outgoing
    /// than incoming edges, if the link is an open chain.
    start: usize,
    out: Vec<[u32; 3]>,
}

impl<'a> LinkWalk<'a> {
    fn new(handles: &'a [VertexRef], link: &'a [(u32, u32)]) -> Self {
        let mut outgoing: HashMap<VertexRef, Vec<usize>> = HashMap::new();
        let mut balance: HashMap<VertexRef, i64> = HashMap::new();
        for (e, &(a, b)) in link.iter().enumerate() {
            let (ha, hb) = (handles[a as usize], handles[b as usize]);
            outgoing.entry(ha).or_default().push(e);
            *balance.entry(ha).or_default() += 1;
            *balance.entry(hb).or_default() -= 1;
        }
        // Popped from the back; keep link order.
        for edges in outgoing.values_mut() {
            edges.reverse();
        }
        let start = link
            .iter()
            .position(|&(a, _)| balance.get(&handles[a as usize]).is_some_and(|&b| b > 0))
            .unwrap_or(0);
        Self {
            handles,
            link,
            outgoing,
            used: vec![false; link.len()],
            cyclic: balance.values().all(|&b| b == 0),
            start,
            out: Vec::new(),
        }
    }

    fn key(&self, i: u32) -> VertexRef {
        self.handles[i as usize]
    }

    fn next_edge(&mut self, from: u32) -> Option<usize> {
        let key = self.key(from);
        let edges = self.outgoing.get_mut(&key)?;
        while let Some(e) = edges.pop() {
            if !self.used[e] {
                return Some(e);
            }
        }
        None
    }

    /// Fills a closed walk `c0 -> c1 -> ... -> c0` without the collapsed vertex.
    fn fill(&mut self, cycle: &[u32]) {
        for k in 1..cycle.len().saturating_sub(1) {
            self.out.push([cycle[0], cycle[k], cycle[k + 1]]);
        }
    }

    /// Walks from `start`, erasing loops as they close. Returns the simple
    /// chain left over and whether it closed back onto its first vertex.
    fn walk(&mut self, start: usize) -> (Vec<u32>, bool) {
        let mut chain = vec![self.link[start].0];
        let mut edge = Some(start);
        while let Some(e) = edge {
            self.used[e] = true;
            let b = self.link[e].1;
            let key = self.key(b);
            match chain.iter().position(|&c| self.key(c) == key) {
                Some(0) if self.cyclic => return (chain, true),
                Some(pos) => {
                    let pocket = chain.split_off(pos + 1);
                    let mut cycle = vec![chain[pos]];
                    cycle.extend(pocket);
                    self.fill(&cycle);
                }
                None => chain.push(b),
            }
            edge = chain.last().and_then(|&top| self.next_edge(top));
        }
        (chain, false)
    }

    fn fan(mut self, centre: u32) -> Vec<[u32; 3]> {
        if self.link.is_empty() {
            return self.out;
        }

        let (chain, closed) = self.walk(self.start);
        self.fan_chain(centre, &chain, closed);

        while let Some(e) = self.used.iter().position(|&u| !u) {
            let (chain, closed) = self.walk(e);
            if closed {
                self.fill(&chain);
            } else {
                self.fan_chain(centre, &chain, false);
            }
        }
        self.out
    }

    fn fan_chain(&mut self, centre: u32, chain: &[u32], closed: bool) {
        // A closed chain of two is a folded pair; both sides cancel.
        if closed && chain.len() < 3 {
            return;
        }
        for w in chain.windows(2) {
            self.out.push([centre, w[0], w[1]]);
        }
        if let (true, Some(&last), Some(&first)) = (closed, chain.last(), chain.first()) {
            self.out.push([centre, last, first]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::PlaneSurface;
    use crate::tess::arena::PointId;
    use crate::tess::triangulation::CdtInput;

    fn setup() -> (PointArena, PatchPolygon, PlaneSurface) {
        let arena = PointArena::default();
        arena.publish(&[Point3::ORIGIN, Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)]);
        let polygon = PatchPolygon {
            input: CdtInput {
                points: vec![UvPoint::new(0.0, 0.0), UvPoint::new(1.0, 0.0), UvPoint::new(0.0, 1.0)],
                outer: vec![0, 1, 2],
                ..CdtInput::default()
            },
            handles: vec![
                VertexRef::Shared(PointId(0)),
                VertexRef::Shared(PointId(1)),
                VertexRef::Shared(PointId(2)),
            ],
        };
        (arena, polygon, PlaneSurface::new(Point3::ORIGIN, Vec3::X, Vec3::Y))
    }

    #[test]
    fn test_reversed_face_flips_winding_and_normals() {
        let (arena, polygon, surface) = setup();
        let locals = PatchLocals::new(1e-6);
        let mut emitter = PatchEmitter {
            face: FaceId(0),
            surface: &surface,
            reversed: false,
            arena: &arena,
            locals: &locals,
            min_triangle_area: 1e-12,
        };

        let (forward, dropped) = emitter.emit(&polygon, &[[0, 1, 2]]);
        assert_eq!(dropped, 0);
        assert_eq!(forward[0].normals[0], Vec3::Z);

        emitter.reversed = true;
        let (backward, _) = emitter.emit(&polygon, &[[0, 1, 2]]);
        let t = &backward[0];
        assert_eq!(t.vertices[1], VertexRef::Shared(PointId(2)));
        assert_eq!(t.normals[0], Vec3::Z.neg());
        let geometric = t.positions[1].sub_point(t.positions[0]).cross(t.positions[2].sub_point(t.positions[0]));
        assert!(geometric.dot(t.normals[0]) > 0.0);
    }

    #[test]
    fn test_tiny_and_repeated_triangles_are_dropped() {
        let (arena, mut polygon, surface) = setup();
        let locals = PatchLocals::new(1e-6);
        let emitter = PatchEmitter {
            face: FaceId(0),
            surface: &surface,
            reversed: false,
            arena: &arena,
            locals: &locals,
            min_triangle_area: 0.6,
        };
        let (kept, dropped) = emitter.emit(&polygon, &[[0, 1, 2]]);
        assert!(kept.is_empty());
        assert_eq!(dropped, 1);

        polygon.handles[2] = VertexRef::Shared(PointId(0));
        let emitter = PatchEmitter { min_triangle_area: 0.0, ..emitter };
        let (kept, dropped) = emitter.emit(&polygon, &[[0, 1, 2]]);
        assert!(kept.is_empty());
        assert_eq!(dropped, 1);
    }

    fn pole_handles() -> Vec<VertexRef> {
        // 0..3: three copies of the pole; 3..8: A B C D E.
        [9, 9, 9, 1, 2, 3, 4, 5].map(|i| VertexRef::Shared(PointId(i))).to_vec()
    }

    #[test]
    fn test_pole_fan_is_rebuilt_over_a_simple_cycle() {
        let handles = pole_handles();
        let triangles = [
            [0, 1, 3], // two pole copies
            [0, 3, 4], // pole A B
            [1, 4, 6], // pole B D
            [2, 6, 4], // pole D B, folds back onto B
            [4, 5, 0], // pole B C
            [1, 5, 3], // pole C A
            [3, 4, 7], // untouched
        ];

        let (tris, dropped) = refan_collapsed(&handles, &triangles);

        assert_eq!(dropped, 1);
        assert_eq!(tris, vec![[3, 4, 7], [0, 3, 4], [0, 4, 5], [0, 5, 3]]);
    }

    #[test]
    fn test_open_pole_fan_keeps_its_chain_and_fills_loops() {
        let handles = pole_handles();
        let triangles = [[0, 3, 4], [1, 4, 6], [2, 6, 4], [1, 4, 5]];

        let (tris, dropped) = refan_collapsed(&handles, &triangles);

        assert_eq!(dropped, 0);
        assert_eq!(tris, vec![[0, 3, 4], [0, 4, 5]]);
    }

    #[test]
    fn test_refan_leaves_distinct_handles_alone() {
        let handles = pole_handles();
        let triangles = [[3, 4, 5], [3, 5, 6]];
        let (tris, dropped) = refan_collapsed(&handles, &triangles);
        assert_eq!(dropped, 0);
        assert_eq!(tris, triangles.to_vec());
    }

    #[test]
    fn test_every_pole_edge_is_shared_by_two_triangles_after_refan() {
        let handles = pole_handles();
        let triangles = [[0, 3, 4], [1, 4, 6], [2, 6, 4], [0, 4, 5], [1, 5, 3]];
        let (tris, _) = refan_collapsed(&handles, &triangles);

        let pole = handles[0];
        let mut uses: HashMap<VertexRef, usize> = HashMap::new();
        for tri in &tris {
            let hs = tri.map(|i| handles[i as usize]);
            assert_eq!(hs.iter().filter(|&&h| h == pole).count(), 1);
            for h in hs.into_iter().filter(|&h| h != pole) {
                *uses.entry(h).or_default() += 1;
            }
        }
        assert!(uses.values().all(|&n| n == 2), "{uses:?}");
    }
}
