use crate::geom::{BrepModel, EdgeId, LoopId, LoopKind, TrimKind, UvPoint, Vec3};

use super::arena::{PointId, VertexRef};
use super::edge_cache::EdgeSamples;

/// Synthetic steps used to sample a singular trim.
const SINGULAR_STEPS: usize = 10;

/// One sample of a trim: its parameters, its position in the patch domain and
/// the handle of its 3D point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimSamplePoint {
    /// Trim (pcurve) parameter.
    pub t: f64,
    /// Edge parameter; `None` for singular-trim and bridge samples.
    pub e: Option<f64>,
    pub uv: UvPoint,
    pub vertex: VertexRef,
    /// 3D tangent in the trim direction.
    pub tangent: Option<Vec3>,
    /// Surface normal at `uv`.
    pub normal: Option<Vec3>,
}

/// Ordered samples of one loop of a patch.
///
/// A loop that is closed in parameter space repeats its first sample as its
/// last one.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopPoints {
    pub loop_id: LoopId,
    pub kind: LoopKind,
    pub points: Vec<TrimSamplePoint>,
}

impl LoopPoints {
    #[must_use]
    pub fn new(loop_id: LoopId, kind: LoopKind, points: Vec<TrimSamplePoint>) -> Self {
        Self { loop_id, kind, points }
    }

    #[must_use]
    pub fn uvs(&self) -> Vec<UvPoint> {
        self.points.iter().map(|p| p.uv).collect()
    }

    /// First and last samples coincide in parameter space (within `tol` per coordinate).
    #[must_use]
    pub fn is_closed_2d(&self, tol: f64) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) if self.points.len() > 1 => {
                (first.uv.u - last.uv.u).abs() <= tol && (first.uv.v - last.uv.v).abs() <= tol
            }
            _ => false,
        }
    }

    /// First and last samples reference the same 3D point.
    #[must_use]
    pub fn is_closed_3d(&self) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => first.vertex == last.vertex,
            _ => false,
        }
    }
}

/// Concatenates the samples of every trim of `loop_id`.
///
/// `edge_samples` resolves the cached samples of an edge. Consecutive trims
/// share their junction sample, so each trim contributes all of its samples
/// but the last, except the final trim which closes the loop.
pub(crate) fn sample_loop<'a>(
    model: &BrepModel,
    loop_id: LoopId,
    mut edge_samples: impl FnMut(EdgeId) -> &'a EdgeSamples,
) -> LoopPoints {
    let lp = model.loop_(loop_id);
    let surface = &model.face(lp.face).surface;
    let mut points = Vec::new();

    for (k, &trim_id) in lp.trims.iter().enumerate() {
        let trim = model.trim(trim_id);
        let last_trim = k + 1 == lp.trims.len();

        match trim.kind {
            TrimKind::Singular { vertex } => {
                let (t0, t1) = trim.pcurve.domain();
                let step = (t1 - t0) / SINGULAR_STEPS as f64;
                let count = if last_trim { SINGULAR_STEPS + 1 } else { SINGULAR_STEPS };
                for i in 0..count {
                    let t = if i == SINGULAR_STEPS { t1 } else { t0 + i as f64 * step };
                    let uv = trim.pcurve.point_at(t);
                    points.push(TrimSamplePoint {
                        t,
                        e: None,
                        uv,
                        vertex: VertexRef::Shared(PointId(vertex.0)),
                        tangent: None,
                        normal: surface.normal_at(uv.u, uv.v),
                    });
                }
            }
            TrimKind::Boundary { edge, .. } => {
                let samples = edge_samples(edge).for_trim(trim_id);
                let take = if last_trim { samples.len() } else { samples.len().saturating_sub(1) };
                points.extend_from_slice(&samples[..take]);
            }
        }
    }

    LoopPoints::new(loop_id, lp.kind, points)
}
