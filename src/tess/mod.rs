//! Watertight triangulation of trimmed patches.
//!
//! Edge samples are computed once per edge and shared by both adjacent
//! patches through [`PointId`] handles, so neighbouring patches meet on
//! identical vertices without any welding pass.

pub mod arena;
pub mod bridge;
pub mod edge_cache;
pub mod emit;
pub mod engine;
pub mod error;
pub mod interior;
pub mod loop_points;
pub mod seam;
pub mod settings;
pub mod tolerance;
pub mod triangulation;

pub use arena::{PointArena, PointId, VertexRef};
pub use bridge::PatchLocals;
pub use edge_cache::{EdgeCacheStats, EdgeSampleCache, EdgeSamples};
pub use emit::{EmittedTriangle, MeshConsumer};
pub use engine::{PatchMesh, TessEngine, TessReport};
pub use error::{PatchSkip, SettingsError, SkipReason, TessError};
pub use interior::InteriorPoint;
pub use loop_points::{LoopPoints, TrimSamplePoint};
pub use seam::{BridgeContext, SeamContext, SeamSide};
pub use settings::TessSettings;
pub use tolerance::CdtTolerance;
pub use triangulation::{BackendError, CdtInput, CdtOutput, ConstrainedEarClip, PatchPolygon, TriangulationBackend};
