//! Seam and periodic-domain normalization of loop samples.
//!
//! On a surface that is closed along `u` and/or `v`, a loop can leave the
//! domain rectangle through one side and come back through the other, or be
//! split by the seam into two open chains. The passes below turn such input
//! into closed, seam-free polygons inside one period cell:
//!
//! 1. [`snap_to_seam`] puts near-seam coordinates exactly on the seam.
//! 2. [`unwrap_loop`] removes jumps of more than half a period.
//! 3. [`count_crossings`] counts period-cell changes.
//! 4. [`correct_straddle`] re-cuts a loop that crosses the seam once.
//! 5. [`bridge_open_loops`] stitches seam-to-seam chains into closed loops.
//! 6. [`reembed_holes`] moves holes into the cell of the outer loop.
//!
//! Every pass returns new loops and leaves its input untouched.
//! [`normalize`] chains them; it is the identity on non-periodic patches.

use crate::geom::{LoopKind, ParamAxis, Surface, UvDomain, UvPoint, point_in_polygon};

use super::bridge::{PatchLocals, sample_bridge};
use super::error::SkipReason;
use super::loop_points::{LoopPoints, TrimSamplePoint};
use super::tolerance::CdtTolerance;

/// Which end of a periodic axis a seam point lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeamSide {
    Low,
    High,
}

/// Period layout of a patch domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeamContext {
    domain: UvDomain,
    periods: [Option<f64>; 2],
    tolerance: f64,
}

impl SeamContext {
    #[must_use]
    pub fn new(domain: UvDomain, u_period: Option<f64>, v_period: Option<f64>, tolerance: f64) -> Self {
        Self {
            domain,
            periods: [u_period, v_period],
            tolerance,
        }
    }

    #[must_use]
    pub fn from_surface(surface: &dyn Surface, tolerance: f64) -> Self {
        Self::new(
            surface.domain(),
            surface.period(ParamAxis::U),
            surface.period(ParamAxis::V),
            tolerance,
        )
    }

    #[must_use]
    pub fn is_periodic(&self) -> bool {
        self.periods.iter().any(Option::is_some)
    }

    #[must_use]
    pub fn period(&self, axis: ParamAxis) -> Option<f64> {
        match axis {
            ParamAxis::U => self.periods[0],
            ParamAxis::V => self.periods[1],
        }
    }

    pub fn periodic_axes(&self) -> impl Iterator<Item = (ParamAxis, f64)> + '_ {
        ParamAxis::BOTH
            .into_iter()
            .filter_map(|axis| self.period(axis).map(|p| (axis, p)))
    }

    #[must_use]
    pub fn domain(&self) -> UvDomain {
        self.domain
    }

    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Index of the period cell containing coordinate `c`; always 0 on an open axis.
    #[must_use]
    pub fn cell(&self, axis: ParamAxis, c: f64) -> i64 {
        match self.period(axis) {
            Some(p) => ((c - self.domain.min(axis)) / p).floor() as i64,
            None => 0,
        }
    }

    /// Coordinate of the `k`-th seam line along `axis`.
    #[must_use]
    pub fn seam_line(&self, axis: ParamAxis, k: i64) -> Option<f64> {
        self.period(axis).map(|p| self.domain.min(axis) + k as f64 * p)
    }

    fn nearest_seam(&self, axis: ParamAxis, c: f64) -> Option<f64> {
        let p = self.period(axis)?;
        let k = ((c - self.domain.min(axis)) / p).round();
        Some(self.domain.min(axis) + k * p)
    }

    /// True when `c` lies within tolerance of any seam line along `axis`.
    #[must_use]
    pub fn on_seam(&self, axis: ParamAxis, c: f64) -> bool {
        self.nearest_seam(axis, c)
            .is_some_and(|s| (c - s).abs() <= self.tolerance)
    }

    fn on_any_seam(&self, p: UvPoint) -> bool {
        ParamAxis::BOTH.into_iter().any(|axis| self.on_seam(axis, p.coord(axis)))
    }

    /// Seam of the canonical cell that `p` lies on, `u` seams first.
    #[must_use]
    pub fn seam_location(&self, p: UvPoint) -> Option<(ParamAxis, SeamSide)> {
        self.periodic_axes().find_map(|(axis, _)| {
            let c = p.coord(axis);
            if (c - self.domain.min(axis)).abs() <= self.tolerance {
                Some((axis, SeamSide::Low))
            } else if (c - self.domain.max(axis)).abs() <= self.tolerance {
                Some((axis, SeamSide::High))
            } else {
                None
            }
        })
    }
}

/// Everything the bridging pass needs to create new samples.
pub struct BridgeContext<'a> {
    pub surface: &'a dyn Surface,
    pub tolerance: CdtTolerance,
    pub max_depth: u32,
    pub locals: &'a mut PatchLocals,
}

impl BridgeContext<'_> {
    fn bridge(&mut self, from: UvPoint, to: UvPoint) -> Vec<TrimSamplePoint> {
        sample_bridge(self.surface, &self.tolerance, self.max_depth, self.locals, from, to)
    }

    fn corner(&mut self, uv: UvPoint) -> TrimSamplePoint {
        let point = self.surface.point_at(uv.u, uv.v);
        TrimSamplePoint {
            t: 0.0,
            e: None,
            uv,
            vertex: self.locals.weld(point),
            tangent: None,
            normal: self.surface.normal_at(uv.u, uv.v),
        }
    }
}

fn unresolved(reason: impl Into<String>) -> SkipReason {
    SkipReason::UnresolvedLoop(reason.into())
}

fn map_uv(lp: &LoopPoints, f: impl Fn(UvPoint) -> UvPoint) -> LoopPoints {
    let points = lp
        .points
        .iter()
        .map(|p| TrimSamplePoint { uv: f(p.uv), ..*p })
        .collect();
    LoopPoints::new(lp.loop_id, lp.kind, points)
}

/// Sets every coordinate within tolerance of a seam line exactly onto it.
#[must_use]
pub fn snap_to_seam(lp: &LoopPoints, ctx: &SeamContext) -> LoopPoints {
    map_uv(lp, |mut uv| {
        for (axis, _) in ctx.periodic_axes() {
            let c = uv.coord(axis);
            if let Some(seam) = ctx.nearest_seam(axis, c) {
                if (c - seam).abs() <= ctx.tolerance {
                    uv = uv.with_coord(axis, seam);
                }
            }
        }
        uv
    })
}

/// Shifts points by whole periods so that consecutive points never differ by
/// more than half a period along a periodic axis.
#[must_use]
pub fn unwrap_loop(lp: &LoopPoints, ctx: &SeamContext) -> LoopPoints {
    let mut points = lp.points.clone();
    for i in 1..points.len() {
        let prev = points[i - 1].uv;
        let mut uv = points[i].uv;
        for (axis, period) in ctx.periodic_axes() {
            let mut c = uv.coord(axis);
            let reference = prev.coord(axis);
            while c - reference > 0.5 * period {
                c -= period;
            }
            while c - reference < -0.5 * period {
                c += period;
            }
            uv = uv.with_coord(axis, c);
        }
        points[i].uv = uv;
    }
    LoopPoints::new(lp.loop_id, lp.kind, points)
}

/// Number of period-cell changes between consecutive off-seam points, per axis (`[u, v]`).
#[must_use]
pub fn count_crossings(lp: &LoopPoints, ctx: &SeamContext) -> [usize; 2] {
    let mut counts = [0usize; 2];
    for (slot, axis) in ParamAxis::BOTH.into_iter().enumerate() {
        if ctx.period(axis).is_none() {
            continue;
        }
        let mut prev_cell = None;
        for p in &lp.points {
            let c = p.uv.coord(axis);
            if ctx.on_seam(axis, c) {
                continue;
            }
            let cell = ctx.cell(axis, c);
            if prev_cell.is_some_and(|prev| prev != cell) {
                counts[slot] += 1;
            }
            prev_cell = Some(cell);
        }
    }
    counts
}

/// Re-cuts a loop that crosses the seam along `axis` exactly once.
///
/// The loop is split at its seam sample, each half is shifted into the
/// canonical cell and the halves are swapped, so the result starts and ends
/// on the seam.
pub fn correct_straddle(lp: &LoopPoints, ctx: &SeamContext, axis: ParamAxis) -> Result<LoopPoints, SkipReason> {
    let Some(period) = ctx.period(axis) else {
        return Ok(lp.clone());
    };

    let coord = |i: usize| lp.points[i].uv.coord(axis);
    let mut prev: Option<(usize, i64)> = None;
    let mut crossing = None;
    for i in 0..lp.points.len() {
        if ctx.on_seam(axis, coord(i)) {
            continue;
        }
        let cell = ctx.cell(axis, coord(i));
        if let Some((j, prev_cell)) = prev {
            if prev_cell != cell {
                crossing = Some((j, i, prev_cell, cell));
                break;
            }
        }
        prev = Some((i, cell));
    }

    let Some((before, after, c0, c1)) = crossing else {
        return Err(unresolved(format!("loop {} has no seam crossing to correct", lp.loop_id)));
    };
    let Some(k) = (before + 1..after).find(|&i| ctx.on_seam(axis, coord(i))) else {
        return Err(unresolved(format!(
            "loop {} crosses the seam without a seam sample",
            lp.loop_id
        )));
    };

    let shift = |p: &TrimSamplePoint, cell: i64| {
        let mut q = *p;
        q.uv = q.uv.with_coord(axis, q.uv.coord(axis) - cell as f64 * period);
        q
    };
    let first_half: Vec<TrimSamplePoint> = lp.points[..=k].iter().map(|p| shift(p, c0)).collect();
    let second_half: Vec<TrimSamplePoint> = lp.points[k..].iter().map(|p| shift(p, c1)).collect();

    let mut points = Vec::with_capacity(lp.points.len());
    points.extend_from_slice(&second_half[..second_half.len() - 1]);
    points.extend(first_half);

    Ok(LoopPoints::new(lp.loop_id, lp.kind, points))
}

fn meet_in_3d(surface: &dyn Surface, a: UvPoint, b: UvPoint, same_point: f64) -> bool {
    surface.point_at(a.u, a.v).distance_to(surface.point_at(b.u, b.v)) <= same_point
}

fn is_bridge_candidate(lp: &LoopPoints, ctx: &SeamContext, surface: &dyn Surface, same_point: f64) -> bool {
    let Some((first, last)) = ends(lp) else {
        return false;
    };
    if lp.is_closed_2d(ctx.tolerance)
        || ctx.seam_location(first.uv).is_none()
        || ctx.seam_location(last.uv).is_none()
    {
        return false;
    }
    if lp.is_closed_3d() || meet_in_3d(surface, first.uv, last.uv, same_point) {
        return true;
    }
    log::warn!("loop {} runs seam to seam but its ends do not meet in 3D", lp.loop_id);
    false
}

fn ends(lp: &LoopPoints) -> Option<(TrimSamplePoint, TrimSamplePoint)> {
    Some((*lp.points.first()?, *lp.points.last()?))
}

/// Closes open seam-to-seam loops.
///
/// A candidate is stitched to a later candidate that begins on the seam
/// where it ends and ends on the seam where it begins. Among several such
/// partners the one with the shortest 3D gap at both joints wins, ties going
/// to the earlier loop. A candidate without a partner is closed along the
/// domain boundary.
pub fn bridge_open_loops(
    loops: Vec<LoopPoints>,
    ctx: &SeamContext,
    bridges: &mut BridgeContext<'_>,
) -> Result<Vec<LoopPoints>, SkipReason> {
    let surface = bridges.surface;
    let same_point = bridges.locals.same_point_tolerance();
    let candidate: Vec<bool> = loops
        .iter()
        .map(|lp| is_bridge_candidate(lp, ctx, surface, same_point))
        .collect();
    let mut pending: Vec<Option<LoopPoints>> = loops.into_iter().map(Some).collect();
    let mut out = Vec::with_capacity(pending.len());

    for i in 0..pending.len() {
        let Some(lp) = pending[i].take() else {
            continue;
        };
        let ends_of_candidate = if candidate[i] { ends(&lp) } else { None };
        let Some((begin, end)) = ends_of_candidate else {
            out.push(lp);
            continue;
        };
        let begin_loc = ctx.seam_location(begin.uv);
        let end_loc = ctx.seam_location(end.uv);

        let partner = (i + 1..pending.len())
            .filter(|&j| candidate[j])
            .filter_map(|j| {
                let (ob, oe) = ends(pending[j].as_ref()?)?;
                let fits = ctx.seam_location(ob.uv) == end_loc && ctx.seam_location(oe.uv) == begin_loc;
                fits.then(|| {
                    let at = |uv: UvPoint| surface.point_at(uv.u, uv.v);
                    let gap = at(end.uv).distance_to(at(ob.uv)) + at(oe.uv).distance_to(at(begin.uv));
                    (j, gap)
                })
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(j, _)| j);

        let merged = match partner.and_then(|j| pending[j].take()) {
            Some(other) => stitch(&lp, &other, bridges)?,
            None => close_along_boundary(&lp, ctx, bridges)?,
        };
        out.push(merged);
    }

    Ok(out)
}

fn stitch(lp: &LoopPoints, other: &LoopPoints, bridges: &mut BridgeContext<'_>) -> Result<LoopPoints, SkipReason> {
    let (Some((begin, end)), Some((other_begin, other_end))) = (ends(lp), ends(other)) else {
        return Err(unresolved("cannot stitch an empty loop"));
    };

    let mut points = lp.points.clone();
    points.extend(bridges.bridge(end.uv, other_begin.uv));
    points.extend_from_slice(&other.points);
    points.extend(bridges.bridge(other_end.uv, begin.uv));
    points.push(begin);

    let kind = if lp.kind == LoopKind::Outer || other.kind == LoopKind::Outer {
        LoopKind::Outer
    } else {
        LoopKind::Inner
    };
    log::debug!("stitched loops {} and {} across the seam", lp.loop_id, other.loop_id);
    Ok(LoopPoints::new(lp.loop_id, kind, points))
}

fn close_along_boundary(
    lp: &LoopPoints,
    ctx: &SeamContext,
    bridges: &mut BridgeContext<'_>,
) -> Result<LoopPoints, SkipReason> {
    let Some((begin, end)) = ends(lp) else {
        return Err(unresolved("cannot close an empty loop"));
    };
    let Some((axis, side)) = ctx.seam_location(end.uv) else {
        return Err(unresolved(format!("loop {} does not end on a seam", lp.loop_id)));
    };

    let d = ctx.domain();
    let corner = UvPoint::new;
    let corners = match (axis, side) {
        (ParamAxis::U, SeamSide::High) => [corner(d.u_max, d.v_max), corner(d.u_min, d.v_max)],
        (ParamAxis::U, SeamSide::Low) => [corner(d.u_min, d.v_min), corner(d.u_max, d.v_min)],
        (ParamAxis::V, SeamSide::High) => [corner(d.u_max, d.v_max), corner(d.u_max, d.v_min)],
        (ParamAxis::V, SeamSide::Low) => [corner(d.u_min, d.v_min), corner(d.u_min, d.v_max)],
    };

    let mut points = lp.points.clone();
    let mut from = end.uv;
    for uv in corners {
        points.extend(bridges.bridge(from, uv));
        points.push(bridges.corner(uv));
        from = uv;
    }
    points.extend(bridges.bridge(from, begin.uv));
    points.push(begin);

    log::debug!("closed loop {} along the domain boundary", lp.loop_id);
    Ok(LoopPoints::new(lp.loop_id, lp.kind, points))
}

fn first_off_seam(lp: &LoopPoints, ctx: &SeamContext) -> Option<UvPoint> {
    lp.points
        .iter()
        .map(|p| p.uv)
        .find(|uv| !ctx.on_any_seam(*uv))
        .or_else(|| lp.points.first().map(|p| p.uv))
}

/// Translates holes by whole periods until they lie inside the outer loop.
///
/// The outer loop is first moved into the canonical cell. Translations are
/// tried along `u`, then `v`, then both.
pub fn reembed_holes(loops: Vec<LoopPoints>, ctx: &SeamContext) -> Result<Vec<LoopPoints>, SkipReason> {
    let Some(outer_index) = loops.iter().position(|l| l.kind == LoopKind::Outer) else {
        return Err(unresolved("patch has no outer loop"));
    };

    let mut loops = loops;
    if let Some(probe) = first_off_seam(&loops[outer_index], ctx) {
        let du = ctx.period(ParamAxis::U).map_or(0.0, |p| ctx.cell(ParamAxis::U, probe.u) as f64 * p);
        let dv = ctx.period(ParamAxis::V).map_or(0.0, |p| ctx.cell(ParamAxis::V, probe.v) as f64 * p);
        if du != 0.0 || dv != 0.0 {
            loops[outer_index] = map_uv(&loops[outer_index], |uv| uv.translated(-du, -dv));
        }
    }

    let outer_uvs = loops[outer_index].uvs();
    let pu = ctx.period(ParamAxis::U).unwrap_or(0.0);
    let pv = ctx.period(ParamAxis::V).unwrap_or(0.0);
    let mut shifts = vec![(0.0, 0.0)];
    if pu > 0.0 {
        shifts.extend([(pu, 0.0), (-pu, 0.0)]);
    }
    if pv > 0.0 {
        shifts.extend([(0.0, pv), (0.0, -pv)]);
    }
    if pu > 0.0 && pv > 0.0 {
        shifts.extend([(pu, pv), (pu, -pv), (-pu, pv), (-pu, -pv)]);
    }

    loops
        .into_iter()
        .enumerate()
        .map(|(i, lp)| {
            if i == outer_index || lp.kind == LoopKind::Outer {
                return Ok(lp);
            }
            let Some(probe) = first_off_seam(&lp, ctx) else {
                return Ok(lp);
            };
            let shift = shifts
                .iter()
                .find(|(du, dv)| point_in_polygon(probe.translated(*du, *dv), &outer_uvs))
                .copied();
            match shift {
                Some((du, dv)) if du == 0.0 && dv == 0.0 => Ok(lp),
                Some((du, dv)) => Ok(map_uv(&lp, |uv| uv.translated(du, dv))),
                None => Err(unresolved(format!("hole {} lies outside the outer loop", lp.loop_id))),
            }
        })
        .collect()
}

/// Runs every seam pass on the loops of one patch.
///
/// Returns the input unchanged when the patch has no periodic axis.
pub fn normalize(
    loops: Vec<LoopPoints>,
    ctx: &SeamContext,
    bridges: &mut BridgeContext<'_>,
) -> Result<Vec<LoopPoints>, SkipReason> {
    if !ctx.is_periodic() {
        return Ok(loops);
    }

    let mut unwrapped = Vec::with_capacity(loops.len());
    for lp in &loops {
        let lp = unwrap_loop(&snap_to_seam(lp, ctx), ctx);
        let counts = count_crossings(&lp, ctx);
        let open = !lp.is_closed_2d(ctx.tolerance);
        let lp = match counts {
            [1, 0] if open => correct_straddle(&lp, ctx, ParamAxis::U)?,
            [0, 1] if open => correct_straddle(&lp, ctx, ParamAxis::V)?,
            [u, v] if open && (u % 2 == 1 || v % 2 == 1) => {
                return Err(unresolved(format!(
                    "loop {} crosses the seam {u}/{v} times",
                    lp.loop_id
                )));
            }
            _ => lp,
        };
        unwrapped.push(lp);
    }

    let bridged = bridge_open_loops(unwrapped, ctx, bridges)?;
    if let Some(open) = bridged.iter().find(|lp| !lp.is_closed_2d(ctx.tolerance)) {
        return Err(unresolved(format!("loop {} is still open after bridging", open.loop_id)));
    }

    reembed_holes(bridged, ctx)
}
