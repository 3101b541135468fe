use std::fmt;
use std::sync::{PoisonError, RwLock};

use crate::geom::{BrepModel, Point3};

/// Index of a point in the model-wide [`PointArena`].
///
/// Ids below the model's vertex count are the model vertices themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointId(pub u32);

impl PointId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Handle of a triangulation vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VertexRef {
    /// A point shared between patches: a model vertex or an edge sample.
    Shared(PointId),
    /// A point owned by one patch: a bridge, domain-boundary or interior sample.
    Local(u32),
}

impl VertexRef {
    #[must_use]
    pub const fn shared(self) -> Option<PointId> {
        match self {
            Self::Shared(id) => Some(id),
            Self::Local(_) => None,
        }
    }
}

/// Append-only store of shared 3D points.
///
/// Writers publish a whole batch under one short write lock, so the ids of a
/// batch are contiguous. Published points never move or change.
#[derive(Debug, Default)]
pub struct PointArena {
    points: RwLock<Vec<Point3>>,
}

impl PointArena {
    /// Arena holding every model vertex, `PointId(i)` being vertex `i`.
    #[must_use]
    pub fn seeded(model: &BrepModel) -> Self {
        Self {
            points: RwLock::new(model.vertices.iter().map(|v| v.point).collect()),
        }
    }

    /// Position of `id`, or `None` if it was never published.
    #[must_use]
    pub fn get(&self, id: PointId) -> Option<Point3> {
        let points = self.points.read().unwrap_or_else(PoisonError::into_inner);
        points.get(id.index()).copied()
    }

    /// Appends `batch` and returns the ids assigned to it, in order.
    pub fn publish(&self, batch: &[Point3]) -> Vec<PointId> {
        if batch.is_empty() {
            return Vec::new();
        }
        let mut points = self.points.write().unwrap_or_else(PoisonError::into_inner);
        let first = points.len();
        points.extend_from_slice(batch);
        (first..first + batch.len())
            .map(|i| PointId(u32::try_from(i).unwrap_or(u32::MAX)))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every published point, indexed by `PointId`.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Point3> {
        self.points.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_assigns_contiguous_ids_after_seed() {
        let mut model = BrepModel::new();
        model.add_vertex(Point3::new(1.0, 2.0, 3.0));
        let arena = PointArena::seeded(&model);

        assert_eq!(arena.get(PointId(0)), Some(Point3::new(1.0, 2.0, 3.0)));

        let ids = arena.publish(&[Point3::ORIGIN, Point3::new(0.0, 1.0, 0.0)]);
        assert_eq!(ids, vec![PointId(1), PointId(2)]);
        assert_eq!(arena.len(), 3);
        assert_eq!(arena.get(PointId(2)), Some(Point3::new(0.0, 1.0, 0.0)));
        assert_eq!(arena.get(PointId(3)), None);
        assert!(arena.publish(&[]).is_empty());
    }
}
