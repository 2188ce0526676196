//! Static k-d tree for nearest-first queries under the weighted metric.
//!
//! Built once over a fixed point set and read-only afterwards. Queries are
//! lazy: [`SpatialIndex::query_all_ordered_by_distance`] yields indices
//! nearest-first and only expands the tree as far as the caller consumes.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;

use crate::metric::{weighted_distance_squared, AXIS_WEIGHTS};
use crate::types::FeatureVector;

/// Maximum number of points stored in a leaf bucket.
const LEAF_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy)]
enum NodeKind {
    Leaf { start: usize, end: usize },
    Branch { left: usize, right: usize },
}

#[derive(Debug, Clone, Copy)]
struct KdNode {
    min: [f64; 3],
    max: [f64; 3],
    kind: NodeKind,
}

impl KdNode {
    /// Weighted squared distance from `p` to the closest point of this box.
    fn lower_bound(&self, p: &FeatureVector) -> f64 {
        (0..FeatureVector::DIMENSIONS)
            .map(|axis| {
                let v = p.axis(axis);
                let gap = if v < self.min[axis] {
                    self.min[axis] - v
                } else if v > self.max[axis] {
                    v - self.max[axis]
                } else {
                    0.0
                };
                AXIS_WEIGHTS[axis] * gap * gap
            })
            .sum()
    }
}

/// Nearest-neighbour index over a borrowed point slice.
pub struct SpatialIndex<'a> {
    points: &'a [FeatureVector],
    nodes: Vec<KdNode>,
    order: Vec<usize>,
    root: Option<usize>,
}

impl<'a> SpatialIndex<'a> {
    pub fn build(points: &'a [FeatureVector]) -> Self {
        let mut index = Self {
            points,
            nodes: Vec::with_capacity(2 * points.len() / LEAF_CAPACITY + 1),
            order: (0..points.len()).collect(),
            root: None,
        };
        if !points.is_empty() {
            index.root = Some(index.build_node(0, points.len()));
        }
        index
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Median split on the widest axis. Depth is logarithmic in the input.
    fn build_node(&mut self, start: usize, end: usize) -> usize {
        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];
        for &i in &self.order[start..end] {
            for axis in 0..FeatureVector::DIMENSIONS {
                let v = self.points[i].axis(axis);
                min[axis] = min[axis].min(v);
                max[axis] = max[axis].max(v);
            }
        }

        let count = end - start;
        if count <= LEAF_CAPACITY {
            self.nodes.push(KdNode {
                min,
                max,
                kind: NodeKind::Leaf { start, end },
            });
            return self.nodes.len() - 1;
        }

        let axis = (0..FeatureVector::DIMENSIONS)
            .max_by(|&a, &b| {
                let wa = (max[a] - min[a]) * AXIS_WEIGHTS[a].sqrt();
                let wb = (max[b] - min[b]) * AXIS_WEIGHTS[b].sqrt();
                wa.total_cmp(&wb)
            })
            .unwrap_or(0);

        let points = self.points;
        let half = count / 2;
        self.order[start..end].select_nth_unstable_by(half, |&a, &b| {
            points[a]
                .axis(axis)
                .total_cmp(&points[b].axis(axis))
                .then(a.cmp(&b))
        });

        let left = self.build_node(start, start + half);
        let right = self.build_node(start + half, end);
        self.nodes.push(KdNode {
            min,
            max,
            kind: NodeKind::Branch { left, right },
        });
        self.nodes.len() - 1
    }

    /// Every indexed point, nearest to `query` first.
    ///
    /// Equal distances come out in ascending index order.
    pub fn query_all_ordered_by_distance(&self, query: FeatureVector) -> NearestIter<'_, 'a> {
        let mut heap = BinaryHeap::new();
        if let Some(root) = self.root {
            let bound = self.nodes[root].lower_bound(&query);
            heap.push(Reverse((OrderedFloat(bound), Entry::Node(root))));
        }
        NearestIter {
            index: self,
            query,
            heap,
        }
    }
}

/// Heap entry. At equal keys nodes sort before points, so a point is only
/// emitted once every subtree that could hold an equally near point is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Entry {
    Node(usize),
    Point(usize),
}

/// Lazy best-first traversal returned by
/// [`SpatialIndex::query_all_ordered_by_distance`].
pub struct NearestIter<'i, 'a> {
    index: &'i SpatialIndex<'a>,
    query: FeatureVector,
    heap: BinaryHeap<Reverse<(OrderedFloat<f64>, Entry)>>,
}

impl Iterator for NearestIter<'_, '_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while let Some(Reverse((_, entry))) = self.heap.pop() {
            match entry {
                Entry::Point(i) => return Some(i),
                Entry::Node(n) => match self.index.nodes[n].kind {
                    NodeKind::Leaf { start, end } => {
                        for &i in &self.index.order[start..end] {
                            let d = weighted_distance_squared(&self.query, &self.index.points[i]);
                            self.heap.push(Reverse((OrderedFloat(d), Entry::Point(i))));
                        }
                    }
                    NodeKind::Branch { left, right } => {
                        for child in [left, right] {
                            let bound = self.index.nodes[child].lower_bound(&self.query);
                            self.heap.push(Reverse((OrderedFloat(bound), Entry::Node(child))));
                        }
                    }
                },
            }
        }
        None
    }
}
