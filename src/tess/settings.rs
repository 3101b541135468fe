//! Tessellation settings.
//!
//! [`TessSettings`] carries the tolerance record that drives every adaptive
//! sampler in the engine. It can be built in code with the `with_*` setters or
//! read from the attributes of a single XML element:
//!
//! ```xml
//! <tess abs="0.1" rel="0.01" norm="0" min_dist="0.01" max_edge_length="0.25"/>
//! ```
//!
//! Missing attributes keep their default values.

use quick_xml::de::from_str;
use serde::Deserialize;

use super::error::SettingsError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TessSettings {
    /// Absolute chord deviation; `0` disables the absolute criterion.
    #[serde(rename = "@abs")]
    pub abs: f64,
    /// Chord deviation relative to the sampled extent; `0` disables it.
    #[serde(rename = "@rel")]
    pub rel: f64,
    /// Maximum angle (radians) between neighbouring tangents or normals; `0` disables it.
    #[serde(rename = "@norm")]
    pub norm: f64,
    /// Intervals shorter than this are never split.
    #[serde(rename = "@min_dist")]
    pub min_dist: f64,
    /// Upper bound on the length of a sampled segment.
    #[serde(rename = "@max_edge_length")]
    pub max_edge_length: Option<f64>,
    /// Quantization step used to weld patch-local points in 3D.
    #[serde(rename = "@same_point_tolerance")]
    pub same_point_tolerance: f64,
    /// Emitted triangles with a smaller 3D area are dropped.
    #[serde(rename = "@min_triangle_area")]
    pub min_triangle_area: f64,
    /// Interior samples closer to a boundary segment than this fraction of the
    /// uv diagonal are discarded.
    #[serde(rename = "@interior_clearance")]
    pub interior_clearance: f64,
    /// Parameter distance under which a coordinate is snapped onto a seam.
    #[serde(rename = "@seam_tolerance")]
    pub seam_tolerance: f64,
    #[serde(rename = "@max_subdivision_depth")]
    pub max_subdivision_depth: u32,
    #[serde(rename = "@max_interior_points")]
    pub max_interior_points: usize,
}

impl Default for TessSettings {
    fn default() -> Self {
        Self {
            abs: 0.0,
            rel: 0.01,
            norm: 0.0,
            min_dist: 0.0005,
            max_edge_length: None,
            same_point_tolerance: 1e-6,
            min_triangle_area: 1e-12,
            interior_clearance: 0.01,
            seam_tolerance: 1e-9,
            max_subdivision_depth: 24,
            max_interior_points: 20_000,
        }
    }
}

impl TessSettings {
    /// Reads settings from the attributes of a single XML element.
    pub fn from_xml_str(input: &str) -> Result<Self, SettingsError> {
        let settings: Self = from_str(input)?;
        settings.validate()?;
        Ok(settings)
    }

    #[must_use]
    pub fn with_abs(mut self, abs: f64) -> Self {
        self.abs = abs;
        self
    }

    #[must_use]
    pub fn with_rel(mut self, rel: f64) -> Self {
        self.rel = rel;
        self
    }

    #[must_use]
    pub fn with_norm(mut self, norm: f64) -> Self {
        self.norm = norm;
        self
    }

    #[must_use]
    pub fn with_min_dist(mut self, min_dist: f64) -> Self {
        self.min_dist = min_dist;
        self
    }

    #[must_use]
    pub fn with_max_edge_length(mut self, max_edge_length: Option<f64>) -> Self {
        self.max_edge_length = max_edge_length;
        self
    }

    #[must_use]
    pub fn with_min_triangle_area(mut self, min_triangle_area: f64) -> Self {
        self.min_triangle_area = min_triangle_area;
        self
    }

    #[must_use]
    pub fn with_max_interior_points(mut self, max_interior_points: usize) -> Self {
        self.max_interior_points = max_interior_points;
        self
    }

    /// Rejects negative, non-finite or otherwise unusable values.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let non_negative = [
            ("abs", self.abs),
            ("rel", self.rel),
            ("norm", self.norm),
            ("min_dist", self.min_dist),
            ("min_triangle_area", self.min_triangle_area),
            ("interior_clearance", self.interior_clearance),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(name, format!("must be finite and >= 0, got {value}")));
            }
        }

        let positive = [
            ("same_point_tolerance", self.same_point_tolerance),
            ("seam_tolerance", self.seam_tolerance),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(name, format!("must be finite and > 0, got {value}")));
            }
        }

        if let Some(max) = self.max_edge_length {
            if !max.is_finite() || max <= 0.0 {
                return Err(invalid("max_edge_length", format!("must be finite and > 0, got {max}")));
            }
        }
        if self.norm >= std::f64::consts::PI {
            return Err(invalid("norm", format!("must be below pi, got {}", self.norm)));
        }
        if self.max_subdivision_depth == 0 || self.max_subdivision_depth > 64 {
            return Err(invalid(
                "max_subdivision_depth",
                format!("must be in 1..=64, got {}", self.max_subdivision_depth),
            ));
        }

        Ok(())
    }
}

fn invalid(name: &'static str, reason: String) -> SettingsError {
    SettingsError::Invalid { name, reason }
}
