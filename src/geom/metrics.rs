//! Opt-in timing hooks for the tessellation pipeline.
//!
//! Timing is only collected when the `mesh_engine_metrics` feature is enabled
//! and the target is not WASM (`std::time::Instant` is unavailable there).
//! Otherwise every call compiles down to invoking the closure.
//!
//! # Usage
//!
//! ```ignore
//! use brep_tess::geom::{GeomMetrics, TimingBucket};
//!
//! let mut metrics = GeomMetrics::default();
//! metrics.begin();
//!
//! let loops = metrics.time(TimingBucket::SeamNormalization, || normalize(loops));
//!
//! if let Some(report) = metrics.end() {
//!     println!("seam: {} ns", report.seam_normalization_ns);
//! }
//! ```
//!
//! Patches are tessellated independently (possibly on worker threads), so each
//! patch owns a `GeomMetrics` and the per-patch reports are folded together
//! with [`GeomTimingReport::merge`].

/// Pipeline stages timed by [`GeomMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingBucket {
    /// Edge sampling, including cache lookups that have to wait on a sampler.
    EdgeSampling,
    /// Seam snapping, unwrapping, straddle correction and bridging.
    SeamNormalization,
    /// Interior point sampling and filtering.
    InteriorSampling,
    /// Constrained triangulation of a patch.
    Triangulation,
    /// Mapping triangles back to 3D and handing them to the consumer.
    Emission,
    /// Topology checks on the assembled mesh.
    Diagnostics,
}

/// Cumulative nanoseconds per [`TimingBucket`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GeomTimingReport {
    pub edge_sampling_ns: u64,
    pub seam_normalization_ns: u64,
    pub interior_sampling_ns: u64,
    pub triangulation_ns: u64,
    pub emission_ns: u64,
    pub diagnostics_ns: u64,
}

impl GeomTimingReport {
    /// Returns the total time across all buckets in nanoseconds.
    #[must_use]
    pub fn total_ns(&self) -> u64 {
        self.edge_sampling_ns
            .saturating_add(self.seam_normalization_ns)
            .saturating_add(self.interior_sampling_ns)
            .saturating_add(self.triangulation_ns)
            .saturating_add(self.emission_ns)
            .saturating_add(self.diagnostics_ns)
    }

    /// Returns the total time in milliseconds (for display purposes).
    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.total_ns() as f64 / 1_000_000.0
    }

    /// Adds every bucket of `other` into `self`.
    pub fn merge(&mut self, other: &GeomTimingReport) {
        self.edge_sampling_ns = self.edge_sampling_ns.saturating_add(other.edge_sampling_ns);
        self.seam_normalization_ns = self
            .seam_normalization_ns
            .saturating_add(other.seam_normalization_ns);
        self.interior_sampling_ns = self
            .interior_sampling_ns
            .saturating_add(other.interior_sampling_ns);
        self.triangulation_ns = self.triangulation_ns.saturating_add(other.triangulation_ns);
        self.emission_ns = self.emission_ns.saturating_add(other.emission_ns);
        self.diagnostics_ns = self.diagnostics_ns.saturating_add(other.diagnostics_ns);
    }
}

/// Accumulator for timing pipeline stages.
///
/// Call [`begin`](Self::begin) to reset, wrap work in [`time`](Self::time) and
/// collect the report with [`end`](Self::end). With metrics disabled every
/// method is a no-op and `end` returns `None`.
#[derive(Debug, Default)]
pub struct GeomMetrics {
    #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
    report: GeomTimingReport,
}

impl GeomMetrics {
    /// Resets all timing counters to zero.
    pub fn begin(&mut self) {
        #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
        {
            self.report = GeomTimingReport::default();
        }
    }

    /// Returns the accumulated timing report, or `None` if metrics are disabled.
    #[must_use]
    pub fn end(&self) -> Option<GeomTimingReport> {
        #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
        {
            Some(self.report.clone())
        }
        #[cfg(not(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32"))))]
        {
            None
        }
    }

    /// Times the execution of `f` and accumulates the elapsed time in `bucket`.
    pub fn time<R>(&mut self, bucket: TimingBucket, f: impl FnOnce() -> R) -> R {
        #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
        {
            let start = std::time::Instant::now();
            let result = f();
            let elapsed = start.elapsed();
            // Cap at u64::MAX to prevent overflow
            let nanos_u64 = elapsed.as_nanos().min(u128::from(u64::MAX)) as u64;
            self.add_to_bucket(bucket, nanos_u64);
            result
        }

        #[cfg(not(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32"))))]
        {
            let _ = bucket;
            f()
        }
    }

    #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
    fn add_to_bucket(&mut self, bucket: TimingBucket, nanos: u64) {
        let slot = match bucket {
            TimingBucket::EdgeSampling => &mut self.report.edge_sampling_ns,
            TimingBucket::SeamNormalization => &mut self.report.seam_normalization_ns,
            TimingBucket::InteriorSampling => &mut self.report.interior_sampling_ns,
            TimingBucket::Triangulation => &mut self.report.triangulation_ns,
            TimingBucket::Emission => &mut self.report.emission_ns,
            TimingBucket::Diagnostics => &mut self.report.diagnostics_ns,
        };
        *slot = slot.saturating_add(nanos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_report_total() {
        let report = GeomTimingReport {
            edge_sampling_ns: 1000,
            triangulation_ns: 2000,
            emission_ns: 3000,
            ..Default::default()
        };
        assert_eq!(report.total_ns(), 6000);
        assert!((report.total_ms() - 0.006).abs() < 1e-9);
    }

    #[test]
    fn test_timing_report_merge_saturates() {
        let mut a = GeomTimingReport {
            seam_normalization_ns: u64::MAX - 1,
            interior_sampling_ns: 5,
            ..Default::default()
        };
        let b = GeomTimingReport {
            seam_normalization_ns: 10,
            interior_sampling_ns: 7,
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.seam_normalization_ns, u64::MAX);
        assert_eq!(a.interior_sampling_ns, 12);
    }

    #[test]
    fn test_time_returns_closure_result() {
        let mut metrics = GeomMetrics::default();
        metrics.begin();
        let result = metrics.time(TimingBucket::Triangulation, || 42);
        assert_eq!(result, 42);
        let _ = metrics.end();
    }
}
