//! Boundary-representation model consumed by the tessellator.
//!
//! A [`BrepModel`] owns vertices, edges, trims, loops and faces in flat
//! vectors addressed by typed ids. The builder methods keep the cross
//! references consistent (an edge knows its trims, a loop knows its trims in
//! order); [`BrepModel::validate`] checks the topological preconditions the
//! tessellator relies on.

use std::fmt;

use thiserror::Error;

use super::core::Point3;
use super::curve::Curve3;
use super::surface::Surface;
use super::trim::Curve2;

macro_rules! brep_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            #[must_use]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

brep_id!(
    /// Index of a model vertex.
    VertexId,
    "v"
);
brep_id!(
    /// Index of a model edge.
    EdgeId,
    "e"
);
brep_id!(
    /// Index of a trim.
    TrimId,
    "t"
);
brep_id!(
    /// Index of a loop.
    LoopId,
    "l"
);
brep_id!(
    /// Index of a face (patch).
    FaceId,
    "f"
);

/// Errors raised by model validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrepError {
    /// An edge is not used by exactly two trims.
    #[error("edge {edge} is referenced by {trim_count} trims (expected 2)")]
    NonManifoldEdge { edge: EdgeId, trim_count: usize },
    /// A loop has no trims.
    #[error("loop {0} has no trims")]
    EmptyLoop(LoopId),
    /// A face has no outer loop, or more than one.
    #[error("face {face} has {outer_count} outer loops (expected 1)")]
    OuterLoopCount { face: FaceId, outer_count: usize },
    /// An id points past the end of its table.
    #[error("dangling reference: {0}")]
    DanglingReference(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrepVertex {
    pub point: Point3,
}

#[derive(Debug)]
pub struct BrepEdge {
    pub curve: Box<dyn Curve3>,
    pub start: VertexId,
    pub end: VertexId,
    /// Trims using this edge, in insertion order.
    pub trims: Vec<TrimId>,
}

impl BrepEdge {
    /// True when the edge starts and ends at the same vertex.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.start == self.end || self.curve.is_closed()
    }
}

/// What a trim bounds against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimKind {
    /// The trim follows `edge`, opposite to the edge direction when `reversed`.
    Boundary { edge: EdgeId, reversed: bool },
    /// The trim collapses to a single vertex (a pole).
    Singular { vertex: VertexId },
}

#[derive(Debug)]
pub struct BrepTrim {
    pub face: FaceId,
    pub loop_id: LoopId,
    pub kind: TrimKind,
    pub pcurve: Box<dyn Curve2>,
}

impl BrepTrim {
    #[must_use]
    pub fn edge(&self) -> Option<(EdgeId, bool)> {
        match self.kind {
            TrimKind::Boundary { edge, reversed } => Some((edge, reversed)),
            TrimKind::Singular { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    Outer,
    Inner,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrepLoop {
    pub face: FaceId,
    pub kind: LoopKind,
    pub trims: Vec<TrimId>,
}

#[derive(Debug)]
pub struct BrepFace {
    pub surface: Box<dyn Surface>,
    pub loops: Vec<LoopId>,
    /// Outward normal is opposite to the surface normal.
    pub reversed: bool,
}

#[derive(Debug, Default)]
pub struct BrepModel {
    pub vertices: Vec<BrepVertex>,
    pub edges: Vec<BrepEdge>,
    pub trims: Vec<BrepTrim>,
    pub loops: Vec<BrepLoop>,
    pub faces: Vec<BrepFace>,
}

fn next_id(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

impl BrepModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, point: Point3) -> VertexId {
        let id = VertexId(next_id(self.vertices.len()));
        self.vertices.push(BrepVertex { point });
        id
    }

    pub fn add_edge(&mut self, curve: impl Curve3 + 'static, start: VertexId, end: VertexId) -> EdgeId {
        let id = EdgeId(next_id(self.edges.len()));
        self.edges.push(BrepEdge {
            curve: Box::new(curve),
            start,
            end,
            trims: Vec::new(),
        });
        id
    }

    pub fn add_face(&mut self, surface: impl Surface + 'static, reversed: bool) -> FaceId {
        let id = FaceId(next_id(self.faces.len()));
        self.faces.push(BrepFace {
            surface: Box::new(surface),
            loops: Vec::new(),
            reversed,
        });
        id
    }

    /// Adds an empty loop to `face`. Outer loops are kept first in the face's loop list.
    pub fn add_loop(&mut self, face: FaceId, kind: LoopKind) -> LoopId {
        let id = LoopId(next_id(self.loops.len()));
        self.loops.push(BrepLoop {
            face,
            kind,
            trims: Vec::new(),
        });
        if let Some(f) = self.faces.get_mut(face.index()) {
            match kind {
                LoopKind::Outer => f.loops.insert(0, id),
                LoopKind::Inner => f.loops.push(id),
            }
        }
        id
    }

    /// Appends a trim to `loop_id`, registering it with its edge.
    pub fn add_trim(&mut self, loop_id: LoopId, kind: TrimKind, pcurve: impl Curve2 + 'static) -> TrimId {
        let id = TrimId(next_id(self.trims.len()));
        let face = self
            .loops
            .get(loop_id.index())
            .map_or(FaceId(u32::MAX), |l| l.face);
        self.trims.push(BrepTrim {
            face,
            loop_id,
            kind,
            pcurve: Box::new(pcurve),
        });
        if let Some(l) = self.loops.get_mut(loop_id.index()) {
            l.trims.push(id);
        }
        if let TrimKind::Boundary { edge, .. } = kind {
            if let Some(e) = self.edges.get_mut(edge.index()) {
                e.trims.push(id);
            }
        }
        id
    }

    #[must_use]
    pub fn vertex(&self, id: VertexId) -> &BrepVertex {
        &self.vertices[id.index()]
    }

    #[must_use]
    pub fn edge(&self, id: EdgeId) -> &BrepEdge {
        &self.edges[id.index()]
    }

    #[must_use]
    pub fn trim(&self, id: TrimId) -> &BrepTrim {
        &self.trims[id.index()]
    }

    #[must_use]
    pub fn loop_(&self, id: LoopId) -> &BrepLoop {
        &self.loops[id.index()]
    }

    #[must_use]
    pub fn face(&self, id: FaceId) -> &BrepFace {
        &self.faces[id.index()]
    }

    pub fn face_ids(&self) -> impl Iterator<Item = FaceId> + '_ {
        (0..self.faces.len()).map(|i| FaceId(next_id(i)))
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        (0..self.edges.len()).map(|i| EdgeId(next_id(i)))
    }

    /// Checks the preconditions of tessellation.
    ///
    /// Reference integrity is checked first, then every edge must be shared by
    /// exactly two trims, every loop must be non-empty and every face must have
    /// exactly one outer loop.
    pub fn validate(&self) -> Result<(), BrepError> {
        for (i, edge) in self.edges.iter().enumerate() {
            if edge.start.index() >= self.vertices.len() || edge.end.index() >= self.vertices.len() {
                return Err(BrepError::DanglingReference(format!("edge e{i} vertex")));
            }
        }
        for (i, trim) in self.trims.iter().enumerate() {
            if trim.loop_id.index() >= self.loops.len() || trim.face.index() >= self.faces.len() {
                return Err(BrepError::DanglingReference(format!("trim t{i} loop/face")));
            }
            match trim.kind {
                TrimKind::Boundary { edge, .. } if edge.index() >= self.edges.len() => {
                    return Err(BrepError::DanglingReference(format!("trim t{i} edge")));
                }
                TrimKind::Singular { vertex } if vertex.index() >= self.vertices.len() => {
                    return Err(BrepError::DanglingReference(format!("trim t{i} vertex")));
                }
                _ => {}
            }
        }

        for id in self.edge_ids() {
            let trim_count = self.edge(id).trims.len();
            if trim_count != 2 {
                return Err(BrepError::NonManifoldEdge { edge: id, trim_count });
            }
        }

        for (i, lp) in self.loops.iter().enumerate() {
            if lp.trims.is_empty() {
                return Err(BrepError::EmptyLoop(LoopId(next_id(i))));
            }
        }

        for face_id in self.face_ids() {
            let outer_count = self
                .face(face_id)
                .loops
                .iter()
                .filter(|l| self.loop_(**l).kind == LoopKind::Outer)
                .count();
            if outer_count != 1 {
                return Err(BrepError::OuterLoopCount {
                    face: face_id,
                    outer_count,
                });
            }
        }

        Ok(())
    }
}
