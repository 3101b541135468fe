use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::trim::{ParamAxis, UvDomain, UvPoint};

#[derive(Debug, Clone, Copy)]
struct BvhNode {
    bbox: UvDomain,
    left: u32,
    right: u32,
    start: u32,
    count: u32,
}

impl BvhNode {
    const fn leaf(bbox: UvDomain, start: u32, count: u32) -> Self {
        Self {
            bbox,
            left: u32::MAX,
            right: u32::MAX,
            start,
            count,
        }
    }

    const fn inner(bbox: UvDomain, left: u32, right: u32) -> Self {
        Self {
            bbox,
            left,
            right,
            start: 0,
            count: 0,
        }
    }

    const fn is_leaf(self) -> bool {
        self.count != 0
    }
}

/// Bounding volume hierarchy over rectangles in parameter space.
///
/// Primitives are identified by their index in the slice passed to
/// [`UvBvh::build`]; typically one rectangle per boundary segment.
#[derive(Debug, Clone)]
pub(crate) struct UvBvh {
    nodes: Vec<BvhNode>,
    prim_indices: Vec<u32>,
}

impl UvBvh {
    const DEFAULT_LEAF_SIZE: usize = 8;

    #[must_use]
    pub(crate) fn build(bboxes: &[UvDomain]) -> Option<Self> {
        Self::build_with_leaf_size(bboxes, Self::DEFAULT_LEAF_SIZE)
    }

    #[must_use]
    pub(crate) fn build_with_leaf_size(bboxes: &[UvDomain], leaf_size: usize) -> Option<Self> {
        if bboxes.is_empty() {
            return None;
        }

        let leaf_size = leaf_size.clamp(1, 256);
        let prim_indices: Vec<u32> = (0..(bboxes.len() as u32)).collect();
        let nodes = Vec::with_capacity(bboxes.len().saturating_mul(2));

        let mut bvh = Self { nodes, prim_indices };
        bvh.build_node(bboxes, 0, bboxes.len(), leaf_size);
        Some(bvh)
    }

    /// Builds a hierarchy over the segments of a closed polyline chain.
    ///
    /// Segment `i` joins `points[i]` and `points[i + 1]`.
    #[must_use]
    pub(crate) fn over_segments(points: &[UvPoint]) -> Option<Self> {
        let boxes: Vec<UvDomain> = points
            .windows(2)
            .filter_map(UvDomain::from_points)
            .collect();
        Self::build(&boxes)
    }

    fn build_node(&mut self, bboxes: &[UvDomain], start: usize, end: usize, leaf_size: usize) -> u32 {
        let node_index = self.nodes.len() as u32;
        let seed_bbox = bboxes[self.prim_indices[start] as usize];
        self.nodes.push(BvhNode::leaf(seed_bbox, 0, 0));

        let bbox = self.range_bbox(bboxes, start, end);
        let count = end - start;

        if count <= leaf_size {
            self.nodes[node_index as usize] = BvhNode::leaf(bbox, start as u32, count as u32);
            return node_index;
        }

        let axis = self.choose_split_axis(bboxes, start, end);
        let mid = start + count / 2;
        self.prim_indices[start..end].select_nth_unstable_by(mid - start, |a, b| {
            let ca = bboxes[*a as usize].mid(axis);
            let cb = bboxes[*b as usize].mid(axis);
            ca.total_cmp(&cb)
        });

        let left = self.build_node(bboxes, start, mid, leaf_size);
        let right = self.build_node(bboxes, mid, end, leaf_size);
        self.nodes[node_index as usize] = BvhNode::inner(bbox, left, right);
        node_index
    }

    fn range_bbox(&self, bboxes: &[UvDomain], start: usize, end: usize) -> UvDomain {
        let mut bbox = bboxes[self.prim_indices[start] as usize];
        for &idx in &self.prim_indices[(start + 1)..end] {
            bbox = bbox.union(bboxes[idx as usize]);
        }
        bbox
    }

    fn choose_split_axis(&self, bboxes: &[UvDomain], start: usize, end: usize) -> ParamAxis {
        let first = bboxes[self.prim_indices[start] as usize].center();
        let mut extent = UvDomain::new(first.u, first.u, first.v, first.v);

        for &idx in &self.prim_indices[(start + 1)..end] {
            extent = extent.expand_point(bboxes[idx as usize].center());
        }

        if extent.u_span() >= extent.v_span() {
            ParamAxis::U
        } else {
            ParamAxis::V
        }
    }

    /// Visits every primitive whose node boxes overlap `query`; stop by returning `false`.
    pub(crate) fn query_bbox<F>(&self, query: UvDomain, mut visit: F)
    where
        F: FnMut(usize) -> bool,
    {
        if self.nodes.is_empty() {
            return;
        }

        let mut stack = Vec::new();
        stack.push(0u32);

        while let Some(node_idx) = stack.pop() {
            let node = self.nodes[node_idx as usize];
            if !node.bbox.intersects(&query) {
                continue;
            }

            if node.is_leaf() {
                let start = node.start as usize;
                let end = start + node.count as usize;
                for &prim in &self.prim_indices[start..end] {
                    if !visit(prim as usize) {
                        return;
                    }
                }
                continue;
            }

            stack.push(node.left);
            stack.push(node.right);
        }
    }

    /// Closest primitive to `point` under `distance_to_prim`, searched best-first.
    ///
    /// Only primitives closer than `max_dist` are considered.
    pub(crate) fn nearest<F>(&self, point: UvPoint, max_dist: f64, mut distance_to_prim: F) -> Option<(usize, f64)>
    where
        F: FnMut(usize) -> Option<f64>,
    {
        if self.nodes.is_empty() {
            return None;
        }

        let mut best_dist = max_dist;
        let mut best_prim: Option<usize> = None;

        let mut heap = BinaryHeap::new();
        heap.push(HeapEntry {
            dist: bbox_distance_to_point(self.nodes[0].bbox, point),
            node: 0u32,
        });

        while let Some(entry) = heap.pop() {
            if entry.dist > best_dist {
                break;
            }

            let node = self.nodes[entry.node as usize];
            if node.is_leaf() {
                let start = node.start as usize;
                let end = start + node.count as usize;
                for &prim in &self.prim_indices[start..end] {
                    let prim_idx = prim as usize;
                    let Some(d) = distance_to_prim(prim_idx) else {
                        continue;
                    };
                    if d.is_finite() && d < best_dist {
                        best_dist = d;
                        best_prim = Some(prim_idx);
                    }
                }
                continue;
            }

            for child in [node.left, node.right] {
                let dist = bbox_distance_to_point(self.nodes[child as usize].bbox, point);
                if dist <= best_dist {
                    heap.push(HeapEntry { dist, node: child });
                }
            }
        }

        best_prim.map(|idx| (idx, best_dist))
    }
}

fn bbox_distance_to_point(bbox: UvDomain, point: UvPoint) -> f64 {
    let du = if point.u < bbox.u_min {
        bbox.u_min - point.u
    } else if point.u > bbox.u_max {
        point.u - bbox.u_max
    } else {
        0.0
    };
    let dv = if point.v < bbox.v_min {
        bbox.v_min - point.v
    } else if point.v > bbox.v_max {
        point.v - bbox.v_max
    } else {
        0.0
    };
    du.hypot(dv)
}

#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    dist: f64,
    node: u32,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.dist == other.dist && self.node == other.node
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering so BinaryHeap acts as a min-heap on dist.
        other
            .dist
            .total_cmp(&self.dist)
            .then_with(|| self.node.cmp(&other.node))
    }
}
