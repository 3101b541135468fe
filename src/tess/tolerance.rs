use std::f64::consts::FRAC_PI_2;

use super::settings::TessSettings;

/// Smallest number of chords an edge can be cut into by `min_dist` alone.
const MIN_EDGE_FRACTION: f64 = 8.0;

/// Subdivision thresholds derived from [`TessSettings`] and the extent being sampled.
///
/// The same record drives edge bisection, bridge sampling and interior
/// sampling; only the way it is derived differs between curves and surfaces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CdtTolerance {
    /// Chords shorter than this are never split.
    pub min_dist: f64,
    /// Chords longer than this are always split.
    pub max_dist: f64,
    /// Split when the midpoint deviates from the chord by more than this.
    pub within_dist: f64,
    /// Cosine of the largest accepted angle between neighbouring tangents or normals.
    pub cos_within_ang: f64,
}

impl CdtTolerance {
    /// Tolerance for an edge whose samples span a bounding box of diagonal `dist`.
    ///
    /// Depends only on the settings and the edge itself, so both patches
    /// sharing the edge derive the same value. `min_dist` never exceeds an
    /// eighth of `dist`, so a closed edge smaller than the absolute tolerance
    /// still keeps more than its two initial halves.
    #[must_use]
    pub fn for_edge(settings: &TessSettings, dist: f64) -> Self {
        let mut min_dist = settings.abs.max(settings.min_dist);
        if dist > 0.0 {
            min_dist = min_dist.min(dist / MIN_EDGE_FRACTION);
        }
        let mut max_dist = settings.max_edge_length.unwrap_or(f64::INFINITY);

        let within_dist = if settings.rel > 0.0 {
            max_dist = max_dist.max(10.0 * settings.rel * dist);
            (settings.rel * dist).max(min_dist)
        } else if settings.abs > 0.0 {
            min_dist
        } else {
            0.01 * dist
        };

        Self {
            min_dist,
            max_dist,
            within_dist,
            cos_within_ang: cos_limit(settings.norm),
        }
    }

    /// Tolerance for the interior of a patch whose outer loop spans `dist` in 3D.
    #[must_use]
    pub fn for_surface(settings: &TessSettings, dist: f64) -> Self {
        let min_dist = settings.abs.max(settings.min_dist);
        let max_dist = settings.max_edge_length.unwrap_or(dist / 10.0);

        let within_dist = if settings.rel > 0.0 {
            (settings.rel * dist).max(min_dist)
        } else if settings.abs > 0.0 && settings.norm <= 0.0 {
            min_dist
        } else if settings.norm > 0.0 {
            dist
        } else {
            0.01 * dist
        };

        Self {
            min_dist,
            max_dist,
            within_dist,
            cos_within_ang: cos_limit(settings.norm),
        }
    }

    /// Lowers `min_dist` (and `within_dist` with it) to `cap`.
    ///
    /// Used to keep a patch interior at least as fine as its finest boundary edge.
    #[must_use]
    pub fn with_min_dist_cap(mut self, cap: f64) -> Self {
        if cap < self.min_dist {
            if self.within_dist <= self.min_dist {
                self.within_dist = cap;
            }
            self.min_dist = cap;
        }
        self
    }

    /// True when `dot` (of two unit vectors) is past the angle limit.
    ///
    /// A missing vector never triggers a split.
    #[must_use]
    pub(crate) fn bends(&self, dot: Option<f64>) -> bool {
        dot.is_some_and(|d| d < self.cos_within_ang)
    }
}

fn cos_limit(norm: f64) -> f64 {
    if norm > 0.0 { norm.cos() } else { FRAC_PI_2.cos() }
}
