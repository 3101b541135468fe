mod brep;
mod bvh;
mod core;
mod curve;
mod diagnostics;
mod metrics;
mod mesh;
mod primitives;
mod surface;
mod trim;

pub use brep::{
    BrepEdge, BrepError, BrepFace, BrepLoop, BrepModel, BrepTrim, BrepVertex, EdgeId, FaceId,
    LoopId, LoopKind, TrimId, TrimKind, VertexId,
};
pub(crate) use bvh::UvBvh;
pub use core::{BBox, Point3, Tolerance, Vec3};
pub use curve::{Arc3, Curve3, Line3, Polyline3};
pub use diagnostics::GeomMeshDiagnostics;
pub use metrics::{GeomMetrics, GeomTimingReport, TimingBucket};
pub use mesh::{GeomMesh, MeshBuilder};
pub use primitives::{box_shell, cylinder_bridged, cylinder_with_seam, pillow, sphere_shell, torus_shell};
pub use surface::{CylinderSurface, PlaneSurface, SphereSurface, Surface, TorusSurface};
pub use trim::{
    Arc2, Curve2, Line2, ParamAxis, Polyline2, UvDomain, UvPoint, distance_to_segment, orient2d,
    point_in_polygon, segments_cross, signed_area,
};

#[cfg(test)]
mod tests;
