//! Patch-by-patch tessellation driver.
//!
//! A [`TessEngine`] owns the point arena and the edge-sample cache for one
//! model. Each patch runs the same pipeline:
//!
//! 1. sample its loops from the shared edge samples,
//! 2. normalize the loops across seams (periodic patches only),
//! 3. sample the interior,
//! 4. triangulate the polygon with the interior points as Steiner points,
//! 5. map the triangles back to 3D.
//!
//! Patches only share the cache and the arena, so they can run in any order
//! and, with the `parallel` feature, on rayon's pool. Results are always
//! handed to the consumer in face order.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::geom::{
    BBox, BrepModel, EdgeId, FaceId, GeomMesh, GeomMeshDiagnostics, GeomMetrics, LoopId, MeshBuilder, ParamAxis,
    Point3, TimingBucket, UvPoint,
};

use super::arena::{PointArena, VertexRef};
use super::bridge::PatchLocals;
use super::edge_cache::{EdgeCacheStats, EdgeSampleCache, EdgeSamples};
use super::emit::{EmittedTriangle, MeshConsumer, PatchEmitter};
use super::error::{PatchSkip, SkipReason, TessError};
use super::interior::sample_interior;
use super::loop_points::{LoopPoints, sample_loop};
use super::seam::{self, BridgeContext, SeamContext};
use super::settings::TessSettings;
use super::tolerance::CdtTolerance;
use super::triangulation::{BackendError, ConstrainedEarClip, TriangulationBackend, assemble};

/// Grid used to measure the 3D extent of a surface.
const EXTENT_SAMPLES: usize = 5;

/// Triangles of one patch, ready to be handed to a consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchMesh {
    pub face: FaceId,
    pub triangles: Vec<EmittedTriangle>,
    /// Per-patch counters: welds, flips, dropped triangles and skipped Steiner points.
    pub diagnostics: GeomMeshDiagnostics,
}

/// Outcome of [`TessEngine::tessellate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TessReport {
    /// Patches that produced no triangles, in face order.
    pub skipped: Vec<PatchSkip>,
    pub diagnostics: GeomMeshDiagnostics,
}

impl TessReport {
    /// True when every patch was triangulated.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

pub struct TessEngine<'m> {
    model: &'m BrepModel,
    settings: TessSettings,
    arena: PointArena,
    cache: EdgeSampleCache,
    backend: Box<dyn TriangulationBackend>,
}

impl<'m> TessEngine<'m> {
    /// Validates `settings` and `model` and prepares an empty edge cache.
    ///
    /// # Errors
    /// [`TessError::Settings`] for unusable settings, [`TessError::Model`]
    /// when the model breaks a topological precondition such as an edge
    /// without exactly two trims.
    pub fn new(model: &'m BrepModel, settings: TessSettings) -> Result<Self, TessError> {
        settings.validate()?;
        model.validate()?;

        Ok(Self {
            model,
            settings,
            arena: PointArena::seeded(model),
            cache: EdgeSampleCache::new(model.edges.len()),
            backend: Box::new(ConstrainedEarClip),
        })
    }

    /// Replaces the triangulation backend.
    #[must_use]
    pub fn with_backend(mut self, backend: impl TriangulationBackend + 'static) -> Self {
        self.backend = Box::new(backend);
        self
    }

    #[must_use]
    pub fn settings(&self) -> &TessSettings {
        &self.settings
    }

    #[must_use]
    pub fn model(&self) -> &'m BrepModel {
        self.model
    }

    #[must_use]
    pub fn arena(&self) -> &PointArena {
        &self.arena
    }

    /// Cached samples of `edge`, sampling it on first use.
    pub fn edge_samples(&self, edge: EdgeId) -> &EdgeSamples {
        self.cache.get_or_sample(self.model, &self.settings, &self.arena, edge)
    }

    /// Samples of every trim of `loop_id`, in loop order.
    pub fn sample_loop(&self, loop_id: LoopId) -> LoopPoints {
        sample_loop(self.model, loop_id, |edge| self.edge_samples(edge))
    }

    #[must_use]
    pub fn cache_stats(&self) -> EdgeCacheStats {
        self.cache.stats()
    }

    fn position(&self, vertex: VertexRef) -> Option<Point3> {
        vertex.shared().and_then(|id| self.arena.get(id))
    }

    /// Triangulates a single patch.
    ///
    /// # Errors
    /// A [`PatchSkip`] when the surface is degenerate, the loops cannot be
    /// normalized or the backend rejects the polygon.
    pub fn triangulate_patch(&self, face_id: FaceId) -> Result<PatchMesh, PatchSkip> {
        let skip = |reason: SkipReason| PatchSkip::new(face_id, reason);
        let face = self.model.face(face_id);
        let surface = face.surface.as_ref();
        let mut metrics = GeomMetrics::default();
        metrics.begin();

        let domain = surface.domain();
        let min_span = self.settings.seam_tolerance;
        if ParamAxis::BOTH.iter().any(|&axis| !(domain.span(axis) > min_span)) {
            return Err(skip(SkipReason::DegenerateSurface(format!(
                "parameter domain {} x {}",
                domain.u_span(),
                domain.v_span()
            ))));
        }

        let grid: Vec<Point3> = (0..EXTENT_SAMPLES * EXTENT_SAMPLES)
            .map(|k| {
                let s = (k % EXTENT_SAMPLES) as f64 / (EXTENT_SAMPLES - 1) as f64;
                let t = (k / EXTENT_SAMPLES) as f64 / (EXTENT_SAMPLES - 1) as f64;
                let uv = UvPoint::new(domain.u_min + s * domain.u_span(), domain.v_min + t * domain.v_span());
                surface.point_at(uv.u, uv.v)
            })
            .collect();
        let surface_extent = BBox::from_points(&grid).map_or(0.0, BBox::diagonal);
        if !(surface_extent > self.settings.same_point_tolerance) {
            return Err(skip(SkipReason::DegenerateSurface(format!("3D extent {surface_extent}"))));
        }

        let loops: Vec<LoopPoints> =
            metrics.time(TimingBucket::EdgeSampling, || face.loops.iter().map(|&l| self.sample_loop(l)).collect());

        let outer_points: Vec<Point3> = loops
            .first()
            .map(|lp| lp.points.iter().filter_map(|p| self.position(p.vertex)).collect())
            .unwrap_or_default();
        let outer_extent = BBox::from_points(&outer_points).map_or(0.0, BBox::diagonal);
        let extent = if outer_extent > self.settings.same_point_tolerance { outer_extent } else { surface_extent };
        // The interior is never coarser than the finest boundary edge.
        let edge_floor = face
            .loops
            .iter()
            .flat_map(|&l| self.model.loop_(l).trims.iter())
            .filter_map(|&t| self.model.trim(t).edge())
            .filter_map(|(edge, _)| self.cache.get(edge))
            .map(|samples| samples.tolerance.min_dist)
            .fold(f64::INFINITY, f64::min);
        let tolerance = CdtTolerance::for_surface(&self.settings, extent).with_min_dist_cap(edge_floor);

        let seam_ctx = SeamContext::from_surface(surface, self.settings.seam_tolerance);
        let mut locals = PatchLocals::new(self.settings.same_point_tolerance);
        let loops = metrics
            .time(TimingBucket::SeamNormalization, || {
                let mut bridges = BridgeContext {
                    surface,
                    tolerance,
                    max_depth: self.settings.max_subdivision_depth,
                    locals: &mut locals,
                };
                seam::normalize(loops, &seam_ctx, &mut bridges)
            })
            .map_err(skip)?;

        let interior = metrics.time(TimingBucket::InteriorSampling, || {
            sample_interior(surface, tolerance, &self.settings, &seam_ctx, &loops)
        });
        let steiner: Vec<(UvPoint, VertexRef)> =
            interior.points.iter().map(|p| (p.uv, locals.push(p.point))).collect();

        let (polygon, output) = metrics
            .time(TimingBucket::Triangulation, || {
                let polygon = assemble(&loops, &steiner)?;
                let output = self.backend.triangulate(&polygon.input)?;
                Ok::<_, BackendError>((polygon, output))
            })
            .map_err(|e| skip(SkipReason::from(e)))?;

        let emitter = PatchEmitter {
            face: face_id,
            surface,
            reversed: face.reversed,
            arena: &self.arena,
            locals: &locals,
            min_triangle_area: self.settings.min_triangle_area,
        };
        let (triangles, degenerate) =
            metrics.time(TimingBucket::Emission, || emitter.emit(&polygon, &output.triangles));

        log::debug!(
            "face {face_id}: {} loops, {} interior points, {} triangles ({} dropped)",
            loops.len(),
            interior.points.len(),
            triangles.len(),
            degenerate
        );

        let mut diagnostics = GeomMeshDiagnostics {
            triangle_count: triangles.len(),
            welded_vertex_count: locals.welded_count(),
            flipped_edge_count: output.flips,
            degenerate_triangle_count: degenerate,
            skipped_steiner_count: output.skipped_steiner,
            timing: metrics.end(),
            ..GeomMeshDiagnostics::default()
        };
        if interior.capped {
            let warning = format!(
                "face {face_id}: interior sampling stopped at max_interior_points ({})",
                self.settings.max_interior_points
            );
            log::warn!("{warning}");
            diagnostics.capped_patch_count = 1;
            diagnostics.add_warning(warning);
        }

        Ok(PatchMesh {
            face: face_id,
            triangles,
            diagnostics,
        })
    }

    #[cfg(feature = "parallel")]
    fn patch_results(&self, faces: Vec<FaceId>) -> Vec<Result<PatchMesh, PatchSkip>> {
        faces.into_par_iter().map(|f| self.triangulate_patch(f)).collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn patch_results(&self, faces: Vec<FaceId>) -> Vec<Result<PatchMesh, PatchSkip>> {
        faces.into_iter().map(|f| self.triangulate_patch(f)).collect()
    }

    /// Triangulates every patch and hands the triangles to `consumer` in face order.
    ///
    /// Skipped patches are logged and listed in the report.
    pub fn tessellate<C: MeshConsumer + ?Sized>(&self, consumer: &mut C) -> TessReport {
        let faces: Vec<FaceId> = self.model.face_ids().collect();
        let mut report = TessReport::default();

        for result in self.patch_results(faces) {
            match result {
                Ok(patch) => {
                    for triangle in &patch.triangles {
                        consumer.consume(triangle);
                    }
                    report.diagnostics.merge(&patch.diagnostics);
                }
                Err(skip) => {
                    log::warn!("{skip}");
                    report.diagnostics.skipped_patch_count += 1;
                    report.diagnostics.add_warning(skip.to_string());
                    report.skipped.push(skip);
                }
            }
        }

        let stats = self.cache.stats();
        report.diagnostics.edge_cache_hits = stats.hits;
        report.diagnostics.edge_cache_misses = stats.misses;
        report
    }

    /// Tessellates into an indexed mesh.
    ///
    /// The report's diagnostics carry the mesh topology counts on top of the
    /// per-patch counters.
    pub fn tessellate_mesh(&self) -> (GeomMesh, TessReport) {
        let mut builder = MeshBuilder::new();
        let mut report = self.tessellate(&mut builder);
        let (mesh, topology) = builder.finish();

        let diagnostics = &mut report.diagnostics;
        diagnostics.vertex_count = topology.vertex_count;
        diagnostics.triangle_count = topology.triangle_count;
        diagnostics.open_edge_count = topology.open_edge_count;
        diagnostics.non_manifold_edge_count = topology.non_manifold_edge_count;
        diagnostics.warnings.extend(topology.warnings);
        match (&mut diagnostics.timing, &topology.timing) {
            (Some(mine), Some(theirs)) => mine.merge(theirs),
            (None, Some(theirs)) => diagnostics.timing = Some(theirs.clone()),
            _ => {}
        }

        (mesh, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Vec3, box_shell, cylinder_with_seam};

    #[test]
    fn test_box_patches_share_edge_points() {
        let model = box_shell(Vec3::new(1.0, 1.0, 1.0)).unwrap();
        let engine = TessEngine::new(&model, TessSettings::default()).unwrap();
        let mut triangles: Vec<EmittedTriangle> = Vec::new();
        let report = engine.tessellate(&mut triangles);

        assert!(report.is_complete());
        assert_eq!(report.diagnostics.skipped_patch_count, 0);
        assert_eq!(engine.cache_stats().misses, model.edges.len());
        assert_eq!(engine.cache_stats().hits, model.edges.len());

        let faces: Vec<FaceId> = triangles.iter().map(|t| t.face).collect();
        let mut sorted = faces.clone();
        sorted.sort();
        assert_eq!(faces, sorted);
    }

    #[test]
    fn test_seamed_cylinder_patch_is_triangulated() {
        let model = cylinder_with_seam(1.0, 2.0).unwrap();
        let engine = TessEngine::new(&model, TessSettings::default()).unwrap();
        let lateral = model
            .face_ids()
            .find(|&f| model.face(f).surface.is_u_closed())
            .unwrap();

        let patch = engine.triangulate_patch(lateral).unwrap();
        assert!(!patch.triangles.is_empty());
        assert!(patch.triangles.iter().all(|t| t.area() >= engine.settings().min_triangle_area));
    }
}
