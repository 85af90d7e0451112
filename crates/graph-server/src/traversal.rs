//! Weighted reachability over a [`GraphTopology`].
//!
//! A single Dijkstra-style routine serves both the point-to-point and the
//! radius queries. The only axis of variation is the [`StopPredicate`]
//! evaluated after every visit.

use std::collections::{BTreeSet, HashMap};

use crate::topology::{GraphTopology, Weight};

/// Distance assigned to nodes the traversal never reached.
pub const UNREACHABLE: Weight = Weight::MAX;

/// Accumulated distance per node id, borrowed from the traversed graph.
pub type DistanceMap<'g> = HashMap<&'g str, Weight>;

/// Decides whether a traversal keeps going after visiting a node.
///
/// Called with the node that was just visited and the full distance map as
/// it stands after relaxing that node's outgoing edges.
pub trait StopPredicate {
    fn should_continue(&mut self, visited: &str, distances: &DistanceMap<'_>) -> bool;
}

impl<F> StopPredicate for F
where
    F: FnMut(&str, &DistanceMap<'_>) -> bool,
{
    fn should_continue(&mut self, visited: &str, distances: &DistanceMap<'_>) -> bool {
        self(visited, distances)
    }
}

/// Stops as soon as `target` has been visited.
#[derive(Debug, Clone, Copy)]
pub struct UntilVisited<'a>(pub &'a str);

impl StopPredicate for UntilVisited<'_> {
    fn should_continue(&mut self, visited: &str, _distances: &DistanceMap<'_>) -> bool {
        visited != self.0
    }
}

/// Stops once the last visited node sits at `threshold` or beyond.
///
/// Nodes are visited in non-decreasing distance order, so everything still
/// unvisited at that point is at least as far away.
#[derive(Debug, Clone, Copy)]
pub struct WithinWeight(pub Weight);

impl StopPredicate for WithinWeight {
    fn should_continue(&mut self, visited: &str, distances: &DistanceMap<'_>) -> bool {
        distances
            .get(visited)
            .is_some_and(|&distance| distance < self.0)
    }
}

/// Scratch state of one single-source traversal.
///
/// Node selection is a linear scan over the unvisited set, O(V²) overall.
pub struct WeightedTraversal<'g> {
    graph: &'g GraphTopology,
    source: Option<&'g str>,
    distances: DistanceMap<'g>,
    unvisited: BTreeSet<&'g str>,
}

impl<'g> WeightedTraversal<'g> {
    pub fn new(graph: &'g GraphTopology, source: &str) -> Self {
        let mut distances: DistanceMap<'g> = graph
            .node_ids()
            .map(|id| (id, UNREACHABLE))
            .collect();
        let unvisited: BTreeSet<&'g str> = graph.node_ids().collect();

        let source = graph.node(source);
        if let Some(source) = source {
            distances.insert(source, 0);
        }

        Self {
            graph,
            source,
            distances,
            unvisited,
        }
    }

    /// Runs the traversal to completion or until `predicate` says stop.
    ///
    /// An unknown source yields a map where every node is [`UNREACHABLE`].
    pub fn run<P: StopPredicate>(mut self, mut predicate: P) -> DistanceMap<'g> {
        let Some(source) = self.source else {
            return self.distances;
        };

        self.visit(source);
        while let Some(next) = self.closest_unvisited() {
            self.visit(next);
            if !predicate.should_continue(next, &self.distances) {
                break;
            }
        }

        self.distances
    }

    fn distance(&self, node: &str) -> Weight {
        self.distances.get(node).copied().unwrap_or(UNREACHABLE)
    }

    fn closest_unvisited(&self) -> Option<&'g str> {
        self.unvisited
            .iter()
            .copied()
            .map(|node| (node, self.distance(node)))
            .filter(|&(_, distance)| distance < UNREACHABLE)
            .min_by_key(|&(_, distance)| distance)
            .map(|(node, _)| node)
    }

    fn visit(&mut self, node: &'g str) {
        let base = self.distance(node);
        self.unvisited.remove(node);

        let graph = self.graph;
        for (target, weight) in graph.neighbors(node) {
            // Skips visited nodes as well as edges still pointing at removed nodes.
            if !self.unvisited.contains(target) {
                continue;
            }
            let candidate = base.saturating_add(weight);
            if candidate < self.distance(target) {
                self.distances.insert(target, candidate);
            }
        }
    }
}
