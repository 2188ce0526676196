//! Divisive (top-down) bisection of one group into a binary cluster tree.
//!
//! Each split seeds two sides with the group's closest pair, assigns every
//! other point to the nearer seed, then runs a few 2-means rounds so the
//! sides follow the group's actual shape rather than the seeds' position.
//! Nodes live in an arena and the tree is built from an explicit worklist,
//! so depth is bounded only by memory.

use crate::closest_pair::closest_pair;
use crate::metric::weighted_distance;
use crate::types::FeatureVector;

/// Upper bound on 2-means reassignment rounds per split.
pub const MAX_REFINEMENT_ROUNDS: usize = 16;

/// Index of a node inside its [`ClusterTree`] arena.
pub type NodeId = usize;

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// Hands out leaf labels `C1`, `C2`, ... for one clustering request.
#[derive(Debug, Clone)]
pub struct LabelCounter {
    next: usize,
}

impl Default for LabelCounter {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl LabelCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_label(&mut self) -> String {
        let label = format!("C{}", self.next);
        self.next += 1;
        label
    }

    /// Number of labels issued so far.
    pub fn issued(&self) -> usize {
        self.next - 1
    }
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// One node of the cluster tree.
///
/// `members` are indices into the point slice the tree was built from. An
/// internal node holds the disjoint union of its two children's members.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterNode {
    pub members: Vec<usize>,
    pub children: Option<[NodeId; 2]>,
    pub parent: Option<NodeId>,
    pub depth: usize,
    pub label: Option<String>,
}

impl ClusterNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// Arena-backed binary cluster tree. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterTree {
    nodes: Vec<ClusterNode>,
    root: NodeId,
}

impl ClusterTree {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &ClusterNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in pre-order, left child before right.
    pub fn pre_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some([left, right]) = self.nodes[id].children {
                stack.push(right);
                stack.push(left);
            }
        }
        order
    }

    /// Leaf ids from left to right.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.pre_order()
            .into_iter()
            .filter(|&id| self.nodes[id].is_leaf())
            .collect()
    }

    /// Depth of the deepest node (a lone root has depth 0).
    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Bisect `points` into a cluster tree.
///
/// A node becomes a leaf when it has fewer than `min_leaf_size` members or
/// when no split leaves both sides with at least `min_leaf_size` members
/// (an empty side included). Leaves are labelled from `labels` in
/// left-to-right order.
///
/// With `min_leaf_size = 1`, a run of identical points is peeled off one
/// point per split, so the tree is a chain and the cost is quadratic in the
/// run length. Any `min_leaf_size >= 2` stops such a run at a single leaf.
pub fn build_tree(
    points: &[FeatureVector],
    min_leaf_size: usize,
    labels: &mut LabelCounter,
) -> ClusterTree {
    let min_side = min_leaf_size.max(1);
    let mut nodes = vec![ClusterNode {
        members: (0..points.len()).collect(),
        children: None,
        parent: None,
        depth: 0,
        label: None,
    }];
    let mut stack: Vec<NodeId> = vec![0];

    while let Some(id) = stack.pop() {
        let split = if nodes[id].size() < min_leaf_size {
            None
        } else {
            split_by_closest_pair(points, &nodes[id].members, min_side)
        };

        let Some((first, second)) = split else {
            nodes[id].label = Some(labels.next_label());
            continue;
        };

        let depth = nodes[id].depth + 1;
        let left = nodes.len();
        let right = left + 1;
        for members in [first, second] {
            nodes.push(ClusterNode {
                members,
                children: None,
                parent: Some(id),
                depth,
                label: None,
            });
        }
        nodes[id].children = Some([left, right]);
        stack.push(right);
        stack.push(left);
    }

    let tree = ClusterTree { nodes, root: 0 };
    tracing::debug!(
        points = points.len(),
        nodes = tree.len(),
        depth = tree.max_depth(),
        "Built cluster tree"
    );
    tree
}

/// Split `members` into two sides seeded by their closest pair.
///
/// Returns `None` when the set cannot be split into two sides of at least
/// `min_side` members each. Both sides keep the input order of `members`.
pub fn split_by_closest_pair(
    points: &[FeatureVector],
    members: &[usize],
    min_side: usize,
) -> Option<(Vec<usize>, Vec<usize>)> {
    if members.len() < 2 {
        return None;
    }

    let local: Vec<FeatureVector> = members.iter().map(|&i| points[i]).collect();
    let pair = closest_pair(&local)?;
    if pair.a == pair.b {
        return None;
    }

    // `true` marks the second side. Ties go to the first side.
    let seed_a = local[pair.a];
    let seed_b = local[pair.b];
    let mut second: Vec<bool> = local
        .iter()
        .enumerate()
        .map(|(i, p)| {
            if i == pair.a {
                false
            } else if i == pair.b {
                true
            } else {
                weighted_distance(p, &seed_b) < weighted_distance(p, &seed_a)
            }
        })
        .collect();

    for _ in 0..MAX_REFINEMENT_ROUNDS {
        let (Some(c1), Some(c2)) = (mean_of(&local, &second, false), mean_of(&local, &second, true))
        else {
            break;
        };
        let next: Vec<bool> = local
            .iter()
            .map(|p| weighted_distance(p, &c2) < weighted_distance(p, &c1))
            .collect();
        let moved = next.iter().zip(&second).any(|(a, b)| a != b);
        let second_count = next.iter().filter(|&&s| s).count();
        if !moved || second_count == 0 || second_count == next.len() {
            break;
        }
        second = next;
    }

    let (first_side, second_side): (Vec<(usize, bool)>, Vec<(usize, bool)>) = members
        .iter()
        .copied()
        .zip(second)
        .partition(|&(_, s)| !s);
    let first_side: Vec<usize> = first_side.into_iter().map(|(m, _)| m).collect();
    let second_side: Vec<usize> = second_side.into_iter().map(|(m, _)| m).collect();

    if first_side.len() < min_side || second_side.len() < min_side {
        return None;
    }
    Some((first_side, second_side))
}

/// Component-wise mean of the points on one side, `None` if the side is empty.
fn mean_of(points: &[FeatureVector], second: &[bool], side: bool) -> Option<FeatureVector> {
    let mut sum = [0.0; 3];
    let mut count = 0usize;
    for (p, _) in points.iter().zip(second).filter(|&(_, &s)| s == side) {
        for (acc, v) in sum.iter_mut().zip(p.0) {
            *acc += v;
        }
        count += 1;
    }
    if count == 0 {
        return None;
    }
    let n = count as f64;
    Some(FeatureVector([sum[0] / n, sum[1] / n, sum[2] / n]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv(lat: f64, lon: f64, t: f64) -> FeatureVector {
        FeatureVector::new(lat, lon, t)
    }

    fn two_tight_clusters() -> Vec<FeatureVector> {
        vec![
            fv(0.0, 0.0, 0.0),
            fv(0.1, 0.0, 0.0),
            fv(0.0, 0.25, 0.0),
            fv(100.0, 100.0, 0.0),
            fv(100.2, 100.0, 0.0),
            fv(100.0, 100.4, 0.0),
        ]
    }

    fn sorted(mut v: Vec<usize>) -> Vec<usize> {
        v.sort();
        v
    }

    fn assert_tree_invariants(tree: &ClusterTree, n: usize) {
        let root = tree.node(tree.root());
        assert_eq!(sorted(root.members.clone()), (0..n).collect::<Vec<_>>());
        for id in tree.pre_order() {
            let node = tree.node(id);
            match node.children {
                None => assert!(node.label.is_some(), "leaf {id} must be labelled"),
                Some([l, r]) => {
                    assert!(node.label.is_none());
                    let (left, right) = (tree.node(l), tree.node(r));
                    assert_eq!(left.parent, Some(id));
                    assert_eq!(right.parent, Some(id));
                    assert_eq!(left.depth, node.depth + 1);
                    let mut union = left.members.clone();
                    union.extend(&right.members);
                    assert_eq!(sorted(union), sorted(node.members.clone()));
                    assert!(left.members.iter().all(|m| !right.members.contains(m)));
                }
            }
        }
        let leaf_total: usize = tree.leaves().iter().map(|&l| tree.node(l).size()).sum();
        assert_eq!(leaf_total, n);
    }

    // -- Labels --------------------------------------------------------------

    #[test]
    fn labels_count_up_from_one() {
        let mut labels = LabelCounter::new();
        assert_eq!(labels.next_label(), "C1");
        assert_eq!(labels.next_label(), "C2");
        assert_eq!(labels.issued(), 2);
    }

    // -- Splitting -----------------------------------------------------------

    #[test]
    fn split_separates_tight_clusters() {
        let points = two_tight_clusters();
        let members: Vec<usize> = (0..6).collect();
        let (a, b) = split_by_closest_pair(&points, &members, 1).unwrap();
        assert_eq!(a, vec![0, 1, 2]);
        assert_eq!(b, vec![3, 4, 5]);
    }

    #[test]
    fn split_of_single_point_is_refused() {
        let points = vec![fv(1.0, 1.0, 1.0)];
        assert!(split_by_closest_pair(&points, &[0], 1).is_none());
    }

    #[test]
    fn split_of_identical_points_leaves_one_side_tiny() {
        let points = vec![fv(2.0, 2.0, 2.0); 6];
        let members: Vec<usize> = (0..6).collect();
        let (a, b) = split_by_closest_pair(&points, &members, 1).unwrap();
        assert_eq!(a.len() + b.len(), 6);
        assert_eq!(b.len(), 1);
        assert!(split_by_closest_pair(&points, &members, 2).is_none());
    }

    // -- Tree building -------------------------------------------------------

    #[test]
    fn min_size_four_keeps_tight_clusters_together() {
        let points = two_tight_clusters();
        let mut labels = LabelCounter::new();
        let tree = build_tree(&points, 4, &mut labels);

        assert_eq!(tree.len(), 1);
        let root = tree.node(tree.root());
        assert!(root.is_leaf());
        assert_eq!(root.size(), 6);
        assert_eq!(root.label.as_deref(), Some("C1"));
    }

    #[test]
    fn min_size_two_splits_along_tight_clusters() {
        let points = two_tight_clusters();
        let mut labels = LabelCounter::new();
        let tree = build_tree(&points, 2, &mut labels);

        let leaves = tree.leaves();
        assert_eq!(leaves.len(), 2);
        assert_eq!(tree.node(leaves[0]).members, vec![0, 1, 2]);
        assert_eq!(tree.node(leaves[1]).members, vec![3, 4, 5]);
        assert_eq!(tree.node(leaves[0]).label.as_deref(), Some("C1"));
        assert_eq!(tree.node(leaves[1]).label.as_deref(), Some("C2"));
        assert_tree_invariants(&tree, 6);
    }

    #[test]
    fn group_smaller_than_min_size_is_a_leaf() {
        let points = vec![fv(0.0, 0.0, 0.0), fv(50.0, 50.0, 50.0)];
        let mut labels = LabelCounter::new();
        let tree = build_tree(&points, 10, &mut labels);
        assert_eq!(tree.leaves(), vec![tree.root()]);
        assert_eq!(tree.node(tree.root()).size(), 2);
    }

    #[test]
    fn min_size_one_reaches_singletons() {
        let points: Vec<FeatureVector> = (0..9).map(|i| fv(i as f64 * 3.0, 0.0, 0.0)).collect();
        let mut labels = LabelCounter::new();
        let tree = build_tree(&points, 1, &mut labels);
        assert_tree_invariants(&tree, 9);
        assert_eq!(tree.leaves().len(), 9);
        assert_eq!(labels.issued(), 9);
        // A full binary tree with 9 leaves has 8 internal nodes.
        assert_eq!(tree.len(), 17);
    }

    #[test]
    fn every_leaf_meets_min_size_when_root_does() {
        let points: Vec<FeatureVector> = (0..60)
            .map(|i| fv((i * 7 % 13) as f64, (i * 5 % 11) as f64, (i % 4) as f64))
            .collect();
        let mut labels = LabelCounter::new();
        let tree = build_tree(&points, 5, &mut labels);
        assert_tree_invariants(&tree, 60);
        for leaf in tree.leaves() {
            assert!(tree.node(leaf).size() >= 5);
        }
    }

    #[test]
    fn labels_continue_across_trees() {
        let points = two_tight_clusters();
        let mut labels = LabelCounter::new();
        build_tree(&points, 2, &mut labels);
        let second = build_tree(&points, 2, &mut labels);
        let leaves = second.leaves();
        assert_eq!(second.node(leaves[0]).label.as_deref(), Some("C3"));
    }

    #[test]
    fn degenerate_chain_does_not_overflow_the_stack() {
        let points = vec![fv(1.0, 1.0, 1.0); 1500];
        let mut labels = LabelCounter::new();
        let tree = build_tree(&points, 1, &mut labels);
        assert_eq!(tree.leaves().len(), 1500);
        assert_eq!(tree.max_depth(), 1499);
    }

    #[test]
    fn identical_points_stay_one_leaf_at_min_size_two() {
        let points = vec![fv(1.0, 1.0, 1.0); 1500];
        let mut labels = LabelCounter::new();
        let tree = build_tree(&points, 2, &mut labels);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.node(tree.root()).size(), 1500);
    }
}
