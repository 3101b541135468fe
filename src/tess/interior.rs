use std::collections::{HashSet, VecDeque};

use crate::geom::{
    LoopKind, ParamAxis, Point3, Surface, UvBvh, UvDomain, UvPoint, distance_to_segment, point_in_polygon,
};

use super::loop_points::LoopPoints;
use super::seam::SeamContext;
use super::settings::TessSettings;
use super::tolerance::CdtTolerance;

/// Largest number of cells a single aspect-ratio pre-split may create.
const MAX_ASPECT_SPLIT: usize = 64;

/// An interior sample: its parameter position and the surface point there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteriorPoint {
    pub uv: UvPoint,
    pub point: Point3,
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    rect: UvDomain,
    depth: u32,
}

struct Sampler<'a> {
    surface: &'a dyn Surface,
    tol: CdtTolerance,
    settings: &'a TessSettings,
    candidates: Vec<InteriorPoint>,
    seen: HashSet<(i64, i64)>,
    quantum: f64,
    capped: bool,
}

/// Interior samples of one patch.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct InteriorSamples {
    pub points: Vec<InteriorPoint>,
    /// Sampling stopped at `max_interior_points` with cells left to refine.
    pub capped: bool,
}

impl Sampler<'_> {
    fn eval(&self, u: f64, v: f64) -> Point3 {
        self.surface.point_at(u, v)
    }

    fn full(&self) -> bool {
        self.candidates.len() >= self.settings.max_interior_points
    }

    fn emit(&mut self, u: f64, v: f64) {
        if self.full() {
            self.capped = true;
            return;
        }
        let key = ((u / self.quantum).round() as i64, (v / self.quantum).round() as i64);
        if self.seen.insert(key) {
            let point = self.eval(u, v);
            self.candidates.push(InteriorPoint {
                uv: UvPoint::new(u, v),
                point,
            });
        }
    }

    fn emit_five(&mut self, r: &UvDomain) {
        let (um, vm) = (r.mid(ParamAxis::U), r.mid(ParamAxis::V));
        self.emit(um, r.v_min);
        self.emit(r.u_max, vm);
        self.emit(um, r.v_max);
        self.emit(r.u_min, vm);
        self.emit(um, vm);
    }

    /// Refines cells level by level, so a point cap thins the sampling
    /// evenly over the patch instead of starving the last seeds.
    fn run(&mut self, seeds: Vec<UvDomain>) {
        let mut queue: VecDeque<Cell> = seeds.into_iter().map(|rect| Cell { rect, depth: 0 }).collect();

        while let Some(Cell { rect: r, depth }) = queue.pop_front() {
            if self.full() {
                self.capped = true;
                break;
            }
            if depth >= self.settings.max_subdivision_depth {
                continue;
            }

            let p00 = self.eval(r.u_min, r.v_min);
            let p10 = self.eval(r.u_max, r.v_min);
            let p01 = self.eval(r.u_min, r.v_max);
            let p11 = self.eval(r.u_max, r.v_max);
            // Mid row and column too: at a pole both corners of a side coincide.
            let (um, vm) = (0.5 * (r.u_min + r.u_max), 0.5 * (r.v_min + r.v_max));
            let mid_u = self.eval(r.u_min, vm).distance_to(self.eval(r.u_max, vm));
            let mid_v = self.eval(um, r.v_min).distance_to(self.eval(um, r.v_max));
            let udist = p00.distance_to(p10).max(p01.distance_to(p11)).max(mid_u);
            let vdist = p00.distance_to(p01).max(p10.distance_to(p11)).max(mid_v);
            if udist < self.tol.min_dist || vdist < self.tol.min_dist {
                continue;
            }

            let next = depth + 1;
            let quarters = [
                UvDomain::new(r.u_min, um, r.v_min, vm),
                UvDomain::new(um, r.u_max, r.v_min, vm),
                UvDomain::new(r.u_min, um, vm, r.v_max),
                UvDomain::new(um, r.u_max, vm, r.v_max),
            ];
            let push_all = |queue: &mut VecDeque<Cell>, rects: &[UvDomain]| {
                queue.extend(rects.iter().map(|&rect| Cell { rect, depth: next }));
            };

            if udist > 2.0 * vdist || vdist > 2.0 * udist {
                let along_u = udist > vdist;
                let ratio = if along_u { udist / vdist } else { vdist / udist };
                let n = (ratio.floor() as usize).clamp(2, MAX_ASPECT_SPLIT);
                let mut rects = Vec::with_capacity(n);
                for i in 0..n {
                    let a = i as f64 / n as f64;
                    let b = (i + 1) as f64 / n as f64;
                    if along_u {
                        let (ua, ub) = (r.u_min + a * r.u_span(), r.u_min + b * r.u_span());
                        if i > 0 {
                            self.emit(ua, r.v_min);
                            self.emit(ua, r.v_max);
                        }
                        rects.push(UvDomain::new(ua, if i + 1 == n { r.u_max } else { ub }, r.v_min, r.v_max));
                    } else {
                        let (va, vb) = (r.v_min + a * r.v_span(), r.v_min + b * r.v_span());
                        if i > 0 {
                            self.emit(r.u_min, va);
                            self.emit(r.u_max, va);
                        }
                        rects.push(UvDomain::new(r.u_min, r.u_max, va, if i + 1 == n { r.v_max } else { vb }));
                    }
                }
                push_all(&mut queue, &rects);
                continue;
            }

            if udist > self.tol.max_dist || vdist > self.tol.max_dist {
                self.emit_five(&r);
                push_all(&mut queue, &quarters);
                continue;
            }

            let centre = self.eval(um, vm);
            let dist = centre
                .distance_to_line(p00, p11)
                .max(centre.distance_to_line(p10, p01));
            if dist < self.tol.min_dist {
                continue;
            }

            let n00 = self.surface.normal_at(r.u_min, r.v_min);
            let n10 = self.surface.normal_at(r.u_max, r.v_min);
            let n01 = self.surface.normal_at(r.u_min, r.v_max);
            let u_bends = self.tol.bends(n00.zip(n10).map(|(a, b)| a.dot(b)));
            let v_bends = self.tol.bends(n00.zip(n01).map(|(a, b)| a.dot(b)));

            match (u_bends, v_bends) {
                (true, true) => {
                    self.emit_five(&r);
                    push_all(&mut queue, &quarters);
                }
                (true, false) => {
                    self.emit(um, r.v_min);
                    self.emit(um, r.v_max);
                    push_all(
                        &mut queue,
                        &[
                            UvDomain::new(r.u_min, um, r.v_min, r.v_max),
                            UvDomain::new(um, r.u_max, r.v_min, r.v_max),
                        ],
                    );
                }
                (false, true) => {
                    self.emit(r.u_min, vm);
                    self.emit(r.u_max, vm);
                    push_all(
                        &mut queue,
                        &[
                            UvDomain::new(r.u_min, r.u_max, r.v_min, vm),
                            UvDomain::new(r.u_min, r.u_max, vm, r.v_max),
                        ],
                    );
                }
                (false, false) => {
                    self.emit_five(&r);
                    if dist > self.tol.within_dist {
                        push_all(&mut queue, &quarters);
                    }
                }
            }
        }
    }
}

/// Adaptive interior samples of a patch, filtered against its loops.
///
/// `loops` must be normalized (closed, seam-free, holes inside the outer
/// loop). Samples outside the outer loop, inside a hole, or closer than the
/// interior clearance to any loop segment are dropped.
pub(crate) fn sample_interior(
    surface: &dyn Surface,
    tol: CdtTolerance,
    settings: &TessSettings,
    seam: &SeamContext,
    loops: &[LoopPoints],
) -> InteriorSamples {
    let all_uvs: Vec<UvPoint> = loops.iter().flat_map(|l| l.points.iter().map(|p| p.uv)).collect();
    let Some(bounds) = UvDomain::from_points(&all_uvs) else {
        return InteriorSamples::default();
    };

    let mut seeds = vec![bounds];
    for (axis, _) in seam.periodic_axes() {
        let mid = bounds.mid(axis);
        seeds = seeds
            .into_iter()
            .flat_map(|r| {
                let (lo, hi) = match axis {
                    ParamAxis::U => (
                        UvDomain::new(r.u_min, mid, r.v_min, r.v_max),
                        UvDomain::new(mid, r.u_max, r.v_min, r.v_max),
                    ),
                    ParamAxis::V => (
                        UvDomain::new(r.u_min, r.u_max, r.v_min, mid),
                        UvDomain::new(r.u_min, r.u_max, mid, r.v_max),
                    ),
                };
                [lo, hi]
            })
            .collect();
    }

    let mut sampler = Sampler {
        surface,
        tol,
        settings,
        candidates: Vec::new(),
        seen: HashSet::new(),
        quantum: (1e-9 * bounds.diagonal()).max(f64::MIN_POSITIVE),
        capped: false,
    };
    sampler.run(seeds);

    InteriorSamples {
        points: filter_candidates(sampler.candidates, loops, settings.interior_clearance * bounds.diagonal()),
        capped: sampler.capped,
    }
}

fn filter_candidates(candidates: Vec<InteriorPoint>, loops: &[LoopPoints], clearance: f64) -> Vec<InteriorPoint> {
    let outer: Vec<UvPoint> = loops
        .iter()
        .find(|l| l.kind == LoopKind::Outer)
        .map(LoopPoints::uvs)
        .unwrap_or_default();
    let holes: Vec<Vec<UvPoint>> = loops
        .iter()
        .filter(|l| l.kind == LoopKind::Inner)
        .map(LoopPoints::uvs)
        .collect();

    let segments: Vec<(UvPoint, UvPoint)> = loops
        .iter()
        .flat_map(|l| l.points.windows(2).map(|w| (w[0].uv, w[1].uv)))
        .collect();
    let boxes: Vec<UvDomain> = segments
        .iter()
        .map(|(a, b)| UvDomain::new(a.u.min(b.u), a.u.max(b.u), a.v.min(b.v), a.v.max(b.v)))
        .collect();
    let bvh = UvBvh::build(&boxes);

    candidates
        .into_iter()
        .filter(|c| point_in_polygon(c.uv, &outer))
        .filter(|c| !holes.iter().any(|h| point_in_polygon(c.uv, h)))
        .filter(|c| {
            bvh.as_ref().is_none_or(|bvh| {
                bvh.nearest(c.uv, clearance, |i| {
                    let (a, b) = segments[i];
                    Some(distance_to_segment(c.uv, a, b))
                })
                .is_none()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{LoopId, PlaneSurface, Vec3};
    use crate::tess::arena::{PointId, VertexRef};
    use crate::tess::loop_points::TrimSamplePoint;

    fn square_loop(kind: LoopKind, lo: f64, hi: f64) -> LoopPoints {
        let corners = [(lo, lo), (hi, lo), (hi, hi), (lo, hi), (lo, lo)];
        let points = corners
            .iter()
            .enumerate()
            .map(|(i, &(u, v))| TrimSamplePoint {
                t: 0.0,
                e: None,
                uv: UvPoint::new(u, v),
                vertex: VertexRef::Shared(PointId((i % 4) as u32)),
                tangent: None,
                normal: None,
            })
            .collect();
        LoopPoints::new(LoopId(0), kind, points)
    }

    fn plane() -> PlaneSurface {
        PlaneSurface::new(Point3::ORIGIN, Vec3::X, Vec3::Y)
    }

    #[test]
    fn test_planar_square_gets_a_regular_interior_grid() {
        let settings = TessSettings::default();
        let tol = CdtTolerance::for_surface(&settings, 2f64.sqrt());
        let seam = SeamContext::new(UvDomain::unit(), None, None, 1e-9);
        let loops = [square_loop(LoopKind::Outer, 0.0, 1.0)];

        let samples = sample_interior(&plane(), tol, &settings, &seam, &loops);
        let points = samples.points;

        assert!(!samples.capped);
        assert_eq!(points.len(), 49);
        assert!(points.iter().all(|p| p.uv.u > 0.0 && p.uv.u < 1.0 && p.uv.v > 0.0 && p.uv.v < 1.0));
    }

    #[test]
    fn test_hole_interior_is_excluded() {
        let settings = TessSettings::default();
        let tol = CdtTolerance::for_surface(&settings, 2f64.sqrt());
        let seam = SeamContext::new(UvDomain::unit(), None, None, 1e-9);
        let loops = [
            square_loop(LoopKind::Outer, 0.0, 1.0),
            square_loop(LoopKind::Inner, 0.3, 0.7),
        ];

        let points = sample_interior(&plane(), tol, &settings, &seam, &loops).points;

        assert!(!points.is_empty());
        assert!(
            points
                .iter()
                .all(|p| !(p.uv.u > 0.29 && p.uv.u < 0.71 && p.uv.v > 0.29 && p.uv.v < 0.71))
        );
    }

    #[test]
    fn test_point_cap_is_honoured() {
        let settings = TessSettings::default().with_max_interior_points(5);
        let tol = CdtTolerance::for_surface(&settings, 2f64.sqrt());
        let seam = SeamContext::new(UvDomain::unit(), None, None, 1e-9);
        let loops = [square_loop(LoopKind::Outer, 0.0, 1.0)];

        let samples = sample_interior(&plane(), tol, &settings, &seam, &loops);
        assert!(samples.capped);
        assert!(samples.points.len() <= 5);
    }

    #[test]
    fn test_capped_sampling_covers_every_quadrant() {
        let settings = TessSettings::default()
            .with_max_edge_length(Some(0.001))
            .with_max_interior_points(400);
        let tol = CdtTolerance::for_surface(&settings, 2f64.sqrt());
        let seam = SeamContext::new(UvDomain::unit(), None, None, 1e-9);
        let loops = [square_loop(LoopKind::Outer, 0.0, 1.0)];

        let samples = sample_interior(&plane(), tol, &settings, &seam, &loops);
        assert!(samples.capped);

        for (lo_u, lo_v) in [(0.0, 0.0), (0.5, 0.0), (0.0, 0.5), (0.5, 0.5)] {
            let count = samples
                .points
                .iter()
                .filter(|p| p.uv.u >= lo_u && p.uv.u < lo_u + 0.5 && p.uv.v >= lo_v && p.uv.v < lo_v + 0.5)
                .count();
            assert!(count >= 40, "quadrant ({lo_u}, {lo_v}) has {count} points");
        }
    }
}
