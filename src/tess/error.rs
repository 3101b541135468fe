use thiserror::Error;

use crate::geom::{BrepError, FaceId};

use super::triangulation::BackendError;

/// Fatal errors: the engine refuses the model or the configuration.
#[derive(Debug, Error)]
pub enum TessError {
    /// The model failed validation (a non-manifold edge, a face without an outer loop, ...).
    #[error("invalid model: {0}")]
    Model(#[from] BrepError),
    /// The tessellation settings are unusable.
    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),
}

/// Errors raised while loading or checking [`TessSettings`](super::TessSettings).
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The XML settings document could not be deserialized.
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::DeError),
    /// A field holds a value outside its accepted range.
    #[error("setting `{name}` {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Why a single patch produced no triangles.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkipReason {
    /// The parameter or 3D extent of the patch is below tolerance.
    #[error("degenerate surface: {0}")]
    DegenerateSurface(String),
    /// Seam normalization could not produce closed, consistently embedded loops.
    #[error("unresolved loop: {0}")]
    UnresolvedLoop(String),
    /// The triangulation input was rejected.
    #[error("triangulation failed: {0}")]
    TriangulationBackendFailure(#[from] BackendError),
}

/// A skipped patch and the reason it was skipped.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("patch {face} skipped: {reason}")]
pub struct PatchSkip {
    pub face: FaceId,
    pub reason: SkipReason,
}

impl PatchSkip {
    #[must_use]
    pub fn new(face: FaceId, reason: SkipReason) -> Self {
        Self { face, reason }
    }
}
