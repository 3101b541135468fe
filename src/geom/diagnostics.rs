//! Mesh diagnostics for the tessellator.
//!
//! Diagnostics are collected while triangles are emitted and once more when
//! the final mesh is assembled. They are used for:
//!
//! - Validating the output (watertight, manifold, no degenerates)
//! - Debugging patches that were skipped or poorly sampled
//! - Profiling (timing buckets)
//!
//! # Example
//!
//! ```ignore
//! use brep_tess::{TessEngine, TessSettings};
//! use brep_tess::geom::MeshBuilder;
//!
//! let engine = TessEngine::new(&model, TessSettings::default())?;
//! let mut builder = MeshBuilder::new();
//! let report = engine.tessellate(&mut builder)?;
//! let (mesh, diagnostics) = builder.finish();
//!
//! if !diagnostics.is_watertight() {
//!     println!("{} open edges", diagnostics.open_edge_count);
//! }
//! ```

use std::fmt;

/// Diagnostics for a tessellated model.
///
/// # Topology Metrics
///
/// - `open_edge_count`: Edges with only one adjacent triangle
/// - `non_manifold_edge_count`: Edges with more than two adjacent triangles
///
/// # Sampling and Triangulation
///
/// - `degenerate_triangle_count`: Triangles dropped below the area epsilon or with repeated vertices
/// - `welded_vertex_count`: Bridge points merged with an existing point of the same patch
/// - `flipped_edge_count`: Diagonals swapped while restoring the Delaunay condition
/// - `skipped_steiner_count`: Interior points the triangulator could not place
/// - `skipped_patch_count`: Patches dropped with a diagnostic
/// - `capped_patch_count`: Patches whose interior sampling hit the point cap
///
/// # Performance
///
/// - `timing`: Optional timing breakdown by pipeline stage
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GeomMeshDiagnostics {
    /// Total number of vertices in the final mesh.
    pub vertex_count: usize,

    /// Total number of triangles in the final mesh.
    pub triangle_count: usize,

    /// Number of bridge or domain-boundary points that resolved to an
    /// already-known point of the same patch.
    pub welded_vertex_count: usize,

    /// Number of diagonal flips performed by the triangulation backend.
    pub flipped_edge_count: usize,

    /// Number of triangles dropped at emission.
    ///
    /// A triangle is dropped when two of its corners are the same vertex or
    /// when its 3D area is below `min_triangle_area`.
    pub degenerate_triangle_count: usize,

    /// Number of open (boundary) edges in the mesh.
    ///
    /// A closed model tessellated without skips has zero open edges.
    pub open_edge_count: usize,

    /// Number of non-manifold edges in the mesh.
    pub non_manifold_edge_count: usize,

    /// Interior points that did not land strictly inside a triangle and were
    /// left out of the triangulation.
    pub skipped_steiner_count: usize,

    /// Number of patches skipped with a diagnostic.
    ///
    /// Each skip also appears in `warnings` with its face id and reason.
    pub skipped_patch_count: usize,

    /// Number of patches whose interior sampling stopped at
    /// `max_interior_points` before reaching the requested density.
    pub capped_patch_count: usize,

    /// Edge-sample cache lookups served from an already-sampled edge.
    pub edge_cache_hits: usize,

    /// Edge-sample cache lookups that sampled the edge.
    pub edge_cache_misses: usize,

    /// Optional timing breakdown by pipeline stage.
    ///
    /// Only populated when the `mesh_engine_metrics` feature is enabled
    /// and the target is not WASM.
    pub timing: Option<super::metrics::GeomTimingReport>,

    /// Human-readable warnings, e.g. `"f3 skipped: unresolved loop"`.
    pub warnings: Vec<String>,
}

impl GeomMeshDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the mesh has no open edges.
    #[must_use]
    pub fn is_watertight(&self) -> bool {
        self.open_edge_count == 0
    }

    /// Returns `true` if no edge has more than two adjacent triangles.
    #[must_use]
    pub fn is_manifold(&self) -> bool {
        self.non_manifold_edge_count == 0
    }

    #[must_use]
    pub fn is_valid_solid(&self) -> bool {
        self.is_watertight() && self.is_manifold()
    }

    /// Returns `true` if nothing was dropped, skipped or found broken.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.open_edge_count == 0
            && self.non_manifold_edge_count == 0
            && self.degenerate_triangle_count == 0
            && self.skipped_patch_count == 0
            && self.capped_patch_count == 0
            && self.skipped_steiner_count == 0
            && self.warnings.is_empty()
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Returns the total number of topology issues (open + non-manifold edges).
    #[must_use]
    pub fn topology_issue_count(&self) -> usize {
        self.open_edge_count + self.non_manifold_edge_count
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Merges another diagnostics struct into this one.
    ///
    /// Counts are summed and warnings appended. Timing reports are merged
    /// bucket by bucket when both sides carry one.
    pub fn merge(&mut self, other: &GeomMeshDiagnostics) {
        self.vertex_count += other.vertex_count;
        self.triangle_count += other.triangle_count;
        self.welded_vertex_count += other.welded_vertex_count;
        self.flipped_edge_count += other.flipped_edge_count;
        self.degenerate_triangle_count += other.degenerate_triangle_count;
        self.open_edge_count += other.open_edge_count;
        self.non_manifold_edge_count += other.non_manifold_edge_count;
        self.skipped_steiner_count += other.skipped_steiner_count;
        self.skipped_patch_count += other.skipped_patch_count;
        self.capped_patch_count += other.capped_patch_count;
        self.edge_cache_hits += other.edge_cache_hits;
        self.edge_cache_misses += other.edge_cache_misses;
        self.warnings.extend(other.warnings.iter().cloned());

        match (&mut self.timing, &other.timing) {
            (Some(mine), Some(theirs)) => mine.merge(theirs),
            (None, Some(theirs)) => self.timing = Some(theirs.clone()),
            _ => {}
        }
    }

    /// Returns a short summary string suitable for logging.
    ///
    /// Format: `"V:{vertices} T:{triangles} [issues...]"`
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("V:{} T:{}", self.vertex_count, self.triangle_count)];

        if self.welded_vertex_count > 0 {
            parts.push(format!("welded:{}", self.welded_vertex_count));
        }
        if self.flipped_edge_count > 0 {
            parts.push(format!("flips:{}", self.flipped_edge_count));
        }
        if self.degenerate_triangle_count > 0 {
            parts.push(format!("degenerate:{}", self.degenerate_triangle_count));
        }
        if self.open_edge_count > 0 {
            parts.push(format!("open:{}", self.open_edge_count));
        }
        if self.non_manifold_edge_count > 0 {
            parts.push(format!("non-manifold:{}", self.non_manifold_edge_count));
        }
        if self.skipped_steiner_count > 0 {
            parts.push(format!("steiner-skipped:{}", self.skipped_steiner_count));
        }
        if self.skipped_patch_count > 0 {
            parts.push(format!("patches-skipped:{}", self.skipped_patch_count));
        }
        if self.capped_patch_count > 0 {
            parts.push(format!("patches-capped:{}", self.capped_patch_count));
        }

        parts.join(" ")
    }
}

impl fmt::Display for GeomMeshDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mesh Diagnostics:")?;
        writeln!(f, "  Vertices: {}", self.vertex_count)?;
        writeln!(f, "  Triangles: {}", self.triangle_count)?;
        writeln!(
            f,
            "  Edge cache: {} hits, {} misses",
            self.edge_cache_hits, self.edge_cache_misses
        )?;

        if self.welded_vertex_count > 0 || self.flipped_edge_count > 0 || self.degenerate_triangle_count > 0 {
            writeln!(f, "  Repairs:")?;
            if self.welded_vertex_count > 0 {
                writeln!(f, "    - Welded bridge vertices: {}", self.welded_vertex_count)?;
            }
            if self.flipped_edge_count > 0 {
                writeln!(f, "    - Flipped diagonals: {}", self.flipped_edge_count)?;
            }
            if self.degenerate_triangle_count > 0 {
                writeln!(f, "    - Degenerate triangles removed: {}", self.degenerate_triangle_count)?;
            }
        }

        if self.open_edge_count > 0 || self.non_manifold_edge_count > 0 {
            writeln!(f, "  Topology issues:")?;
            if self.open_edge_count > 0 {
                writeln!(f, "    - Open edges: {}", self.open_edge_count)?;
            }
            if self.non_manifold_edge_count > 0 {
                writeln!(f, "    - Non-manifold edges: {}", self.non_manifold_edge_count)?;
            }
        }

        if self.skipped_patch_count > 0 || self.skipped_steiner_count > 0 {
            writeln!(f, "  Skipped:")?;
            if self.skipped_patch_count > 0 {
                writeln!(f, "    - Patches: {}", self.skipped_patch_count)?;
            }
            if self.skipped_steiner_count > 0 {
                writeln!(f, "    - Interior points: {}", self.skipped_steiner_count)?;
            }
        }

        if self.capped_patch_count > 0 {
            writeln!(f, "  Interior point cap reached on {} patches", self.capped_patch_count)?;
        }

        if !self.warnings.is_empty() {
            writeln!(f, "  Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "    - {}", warning)?;
            }
        }

        if let Some(ref timing) = self.timing {
            writeln!(f, "  Timing: {} ms total", timing.total_ms())?;
        }

        let status = if self.is_clean() {
            "CLEAN"
        } else if self.is_valid_solid() {
            "VALID (with repairs)"
        } else {
            "ISSUES DETECTED"
        };
        writeln!(f, "  Status: {}", status)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_clean() {
        let diag = GeomMeshDiagnostics::default();
        assert!(diag.is_clean());
        assert!(diag.is_watertight());
        assert!(diag.is_manifold());
        assert!(diag.is_valid_solid());
        assert!(!diag.has_warnings());
    }

    #[test]
    fn test_open_edges_not_watertight() {
        let diag = GeomMeshDiagnostics {
            open_edge_count: 3,
            ..Default::default()
        };
        assert!(!diag.is_watertight());
        assert!(diag.is_manifold());
        assert!(!diag.is_valid_solid());
        assert!(!diag.is_clean());
    }

    #[test]
    fn test_skipped_patch_is_not_clean_but_can_be_solid() {
        let diag = GeomMeshDiagnostics {
            skipped_patch_count: 1,
            ..Default::default()
        };
        assert!(!diag.is_clean());
        assert!(diag.is_valid_solid());
    }

    #[test]
    fn test_merge() {
        let mut diag1 = GeomMeshDiagnostics {
            vertex_count: 100,
            triangle_count: 50,
            edge_cache_hits: 4,
            warnings: vec!["first warning".to_string()],
            ..Default::default()
        };

        let diag2 = GeomMeshDiagnostics {
            vertex_count: 200,
            triangle_count: 100,
            edge_cache_hits: 6,
            skipped_patch_count: 1,
            warnings: vec!["second warning".to_string()],
            ..Default::default()
        };

        diag1.merge(&diag2);

        assert_eq!(diag1.vertex_count, 300);
        assert_eq!(diag1.triangle_count, 150);
        assert_eq!(diag1.edge_cache_hits, 10);
        assert_eq!(diag1.skipped_patch_count, 1);
        assert_eq!(diag1.warnings.len(), 2);
    }

    #[test]
    fn test_summary() {
        let diag = GeomMeshDiagnostics {
            vertex_count: 100,
            triangle_count: 50,
            welded_vertex_count: 5,
            open_edge_count: 2,
            ..Default::default()
        };

        let summary = diag.summary();
        assert!(summary.contains("V:100"));
        assert!(summary.contains("T:50"));
        assert!(summary.contains("welded:5"));
        assert!(summary.contains("open:2"));
    }

    #[test]
    fn test_display() {
        let diag = GeomMeshDiagnostics {
            vertex_count: 100,
            triangle_count: 50,
            open_edge_count: 2,
            warnings: vec!["test warning".to_string()],
            ..Default::default()
        };

        let output = format!("{}", diag);
        assert!(output.contains("Vertices: 100"));
        assert!(output.contains("Triangles: 50"));
        assert!(output.contains("Open edges: 2"));
        assert!(output.contains("test warning"));
        assert!(output.contains("ISSUES DETECTED"));
    }
}
