use std::collections::HashMap;

use super::brep::FaceId;
use super::diagnostics::GeomMeshDiagnostics;
use super::metrics::{GeomMetrics, TimingBucket};
use super::{Point3, Vec3};
use crate::tess::{EmittedTriangle, MeshConsumer, PointId, VertexRef};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeomMesh {
    pub positions: Vec<[f64; 3]>,
    pub indices: Vec<u32>,
    pub normals: Option<Vec<[f64; 3]>>,
}

impl GeomMesh {
    /// Create a new mesh with positions and indices only.
    #[must_use]
    pub fn new(positions: Vec<[f64; 3]>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            indices,
            normals: None,
        }
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Returns true if any vertex position contains NaN or Inf values.
    #[must_use]
    pub fn has_invalid_vertices(&self) -> bool {
        self.positions
            .iter()
            .any(|p| !p[0].is_finite() || !p[1].is_finite() || !p[2].is_finite())
    }

    /// Returns true if all vertex indices are within bounds.
    #[must_use]
    pub fn has_valid_indices(&self) -> bool {
        let n = self.positions.len() as u32;
        self.indices.iter().all(|&i| i < n)
    }

    /// Returns true if indices represent a triangle list.
    #[must_use]
    pub fn has_triangle_indices(&self) -> bool {
        self.indices.len() % 3 == 0
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.has_triangle_indices() {
            return Err("mesh indices are not a triangle list (len % 3 != 0)".to_string());
        }
        if self.has_invalid_vertices() {
            return Err("mesh has invalid vertex coordinates (NaN/Inf)".to_string());
        }
        if !self.has_valid_indices() {
            return Err("mesh has out-of-bounds vertex indices".to_string());
        }
        if self
            .normals
            .as_ref()
            .is_some_and(|normals| normals.len() != self.positions.len())
        {
            return Err("mesh normal buffer does not match vertex count".to_string());
        }
        Ok(())
    }

    /// Signed enclosed volume; positive for a closed mesh wound outward.
    #[must_use]
    pub fn signed_volume(&self) -> f64 {
        signed_volume(&self.positions, &self.indices)
    }

    #[must_use]
    pub fn surface_area(&self) -> f64 {
        self.indices
            .chunks_exact(3)
            .filter_map(|tri| {
                let corner = |i: u32| self.positions.get(i as usize).map(|p| Vec3::new(p[0], p[1], p[2]));
                let (a, b, c) = (corner(tri[0])?, corner(tri[1])?, corner(tri[2])?);
                Some(0.5 * b.sub(a).cross(c.sub(a)).length())
            })
            .sum()
    }
}

/// Counts edges with one adjacent triangle and edges with more than two.
pub(crate) fn count_edge_topology(indices: &[u32]) -> (usize, usize) {
    let mut edge_counts: HashMap<(u32, u32), u32> = HashMap::new();

    for tri in indices.chunks_exact(3) {
        let i0 = tri[0];
        let i1 = tri[1];
        let i2 = tri[2];

        if i0 == i1 || i1 == i2 || i0 == i2 {
            continue;
        }

        let edges = [(i0, i1), (i1, i2), (i2, i0)];
        for (ea, eb) in edges {
            let (lo, hi) = if ea <= eb { (ea, eb) } else { (eb, ea) };
            *edge_counts.entry((lo, hi)).or_insert(0) += 1;
        }
    }

    let mut open_edge_count = 0usize;
    let mut non_manifold_edge_count = 0usize;
    for (_edge, count) in edge_counts {
        if count == 1 {
            open_edge_count += 1;
        } else if count > 2 {
            non_manifold_edge_count += 1;
        }
    }

    (open_edge_count, non_manifold_edge_count)
}

fn signed_volume(positions: &[[f64; 3]], indices: &[u32]) -> f64 {
    let mut volume = 0.0;
    for tri in indices.chunks_exact(3) {
        let (Some(a), Some(b), Some(c)) = (
            positions.get(tri[0] as usize),
            positions.get(tri[1] as usize),
            positions.get(tri[2] as usize),
        ) else {
            continue;
        };

        let av = Vec3::new(a[0], a[1], a[2]);
        let bv = Vec3::new(b[0], b[1], b[2]);
        let cv = Vec3::new(c[0], c[1], c[2]);
        volume += av.dot(bv.cross(cv));
    }

    volume / 6.0
}

/// Mesh consumer that assembles emitted triangles into an indexed [`GeomMesh`].
///
/// Shared vertices are merged by their arena id, so two patches meeting at an
/// edge reference the same mesh vertex without any distance test. Patch-local
/// vertices are merged within their face only. Vertex normals are the
/// normalized sum of the normals each triangle supplies for that vertex.
#[derive(Debug, Default)]
pub struct MeshBuilder {
    positions: Vec<[f64; 3]>,
    normal_sums: Vec<Vec3>,
    indices: Vec<u32>,
    shared: HashMap<PointId, u32>,
    local: HashMap<(FaceId, u32), u32>,
    faces_seen: Vec<FaceId>,
}

impl MeshBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn vertex_index(&mut self, face: FaceId, vertex: VertexRef, position: Point3) -> u32 {
        let next = self.positions.len() as u32;
        let index = match vertex {
            VertexRef::Shared(id) => *self.shared.entry(id).or_insert(next),
            VertexRef::Local(local) => *self.local.entry((face, local)).or_insert(next),
        };
        if index == next {
            self.positions.push(position.to_array());
            self.normal_sums.push(Vec3::ZERO);
        }
        index
    }

    /// Mesh vertex index assigned to arena point `id`, if any triangle used it.
    #[must_use]
    pub fn shared_vertex_index(&self, id: PointId) -> Option<u32> {
        self.shared.get(&id).copied()
    }

    /// Faces that contributed at least one triangle, in first-seen order.
    #[must_use]
    pub fn faces(&self) -> &[FaceId] {
        &self.faces_seen
    }

    /// Finishes the mesh and computes its topology diagnostics.
    #[must_use]
    pub fn finish(self) -> (GeomMesh, GeomMeshDiagnostics) {
        let mut metrics = GeomMetrics::default();
        metrics.begin();

        let normals: Vec<[f64; 3]> = self
            .normal_sums
            .iter()
            .map(|n| n.normalized().unwrap_or(Vec3::Z).to_array())
            .collect();

        let mesh = GeomMesh {
            positions: self.positions,
            indices: self.indices,
            normals: Some(normals),
        };

        let (open_edge_count, non_manifold_edge_count) =
            metrics.time(TimingBucket::Diagnostics, || count_edge_topology(&mesh.indices));

        let mut diagnostics = GeomMeshDiagnostics {
            vertex_count: mesh.vertex_count(),
            triangle_count: mesh.triangle_count(),
            open_edge_count,
            non_manifold_edge_count,
            timing: metrics.end(),
            ..Default::default()
        };
        if open_edge_count > 0 {
            diagnostics.add_warning("mesh has open edges");
        }
        if non_manifold_edge_count > 0 {
            diagnostics.add_warning("mesh has non-manifold edges");
        }

        (mesh, diagnostics)
    }
}

impl MeshConsumer for MeshBuilder {
    fn consume(&mut self, triangle: &EmittedTriangle) {
        if self.faces_seen.last() != Some(&triangle.face) && !self.faces_seen.contains(&triangle.face) {
            self.faces_seen.push(triangle.face);
        }

        for k in 0..3 {
            let index = self.vertex_index(triangle.face, triangle.vertices[k], triangle.positions[k]);
            let sum = &mut self.normal_sums[index as usize];
            *sum = sum.add(triangle.normals[k]);
            self.indices.push(index);
        }
    }
}
