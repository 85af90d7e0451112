use crate::error::{GraphlineError, GraphlineResult};
use crate::topology::{Edge, GraphTopology, Weight};
use crate::traversal::{UntilVisited, WeightedTraversal, WithinWeight};
use parking_lot::RwLock;

/// The shared graph behind every session.
///
/// One reader/writer lock guards the whole topology. Mutations and
/// `shortest_path` take it exclusively; `find_within_weight` and the
/// inspection helpers share it.
#[derive(Debug, Default)]
pub struct GraphStore {
    topology: RwLock<GraphTopology>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&self, id: &str) -> GraphlineResult<()> {
        let mut graph = self.topology.write();
        if !graph.add_node(id) {
            return Err(GraphlineError::AlreadyExists(id.to_string()));
        }
        tracing::debug!(node = id, "node added");
        Ok(())
    }

    /// Adds the directed edge `from -> to`. Re-adding an existing pair
    /// replaces its weight.
    pub fn add_edge(&self, from: &str, to: &str, weight: Weight) -> GraphlineResult<()> {
        let mut graph = self.topology.write();
        ensure_nodes(&graph, &[from, to])?;
        if let Some(previous) = graph.add_edge(from, to, weight) {
            tracing::debug!(from, to, previous, weight, "edge re-weighted");
        } else {
            tracing::debug!(from, to, weight, "edge added");
        }
        Ok(())
    }

    /// Removes the node and its outgoing edges. Edges other nodes hold
    /// towards it stay in place; traversals skip them.
    pub fn remove_node(&self, id: &str) -> GraphlineResult<()> {
        let mut graph = self.topology.write();
        if !graph.remove_node(id) {
            return Err(GraphlineError::NodeNotFound(id.to_string()));
        }
        tracing::debug!(node = id, "node removed");
        Ok(())
    }

    /// Succeeds whenever both endpoints exist, whether or not an edge
    /// between them was present.
    pub fn remove_edge(&self, from: &str, to: &str) -> GraphlineResult<()> {
        let mut graph = self.topology.write();
        ensure_nodes(&graph, &[from, to])?;
        let removed = graph.remove_edge(from, to);
        tracing::debug!(from, to, removed = removed.is_some(), "edge removal");
        Ok(())
    }

    /// Shortest weighted distance from `from` to `to`.
    ///
    /// Returns [`crate::traversal::UNREACHABLE`] when no path exists. Runs
    /// under the exclusive lock, serialized with every other graph call.
    pub fn shortest_path(&self, from: &str, to: &str) -> GraphlineResult<Weight> {
        let graph = self.topology.write();
        ensure_nodes(&graph, &[from, to])?;
        if from == to {
            return Ok(0);
        }

        let distances = WeightedTraversal::new(&graph, from).run(UntilVisited(to));
        Ok(distances
            .get(to)
            .copied()
            .unwrap_or(crate::traversal::UNREACHABLE))
    }

    /// Nodes other than `source` whose distance from it is strictly below
    /// `threshold`, in lexicographic order.
    pub fn find_within_weight(&self, source: &str, threshold: Weight) -> GraphlineResult<Vec<String>> {
        let graph = self.topology.read();
        ensure_nodes(&graph, &[source])?;

        let distances = WeightedTraversal::new(&graph, source).run(WithinWeight(threshold));
        let mut nodes: Vec<String> = distances
            .into_iter()
            .filter(|&(node, distance)| distance < threshold && node != source)
            .map(|(node, _)| node.to_string())
            .collect();
        nodes.sort();
        Ok(nodes)
    }

    pub fn node_count(&self) -> usize {
        self.topology.read().num_nodes()
    }

    pub fn edge_count(&self) -> usize {
        self.topology.read().num_edges()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.topology.read().contains(id)
    }

    /// All node ids, sorted.
    pub fn nodes(&self) -> Vec<String> {
        let graph = self.topology.read();
        let mut nodes: Vec<String> = graph.node_ids().map(str::to_string).collect();
        nodes.sort();
        nodes
    }

    pub fn edges_from(&self, id: &str) -> Vec<Edge> {
        self.topology.read().edges_from(id)
    }
}

fn ensure_nodes(graph: &GraphTopology, ids: &[&str]) -> GraphlineResult<()> {
    match ids.iter().find(|id| !graph.contains(id)) {
        Some(missing) => Err(GraphlineError::NodeNotFound(missing.to_string())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traversal::UNREACHABLE;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn store_with(nodes: &[&str], edges: &[(&str, &str, Weight)]) -> GraphStore {
        let store = GraphStore::new();
        for node in nodes {
            store.add_node(node).unwrap();
        }
        for &(from, to, weight) in edges {
            store.add_edge(from, to, weight).unwrap();
        }
        store
    }

    #[test]
    fn test_add_node() {
        let store = GraphStore::new();
        store.add_node("A").unwrap();

        let err = store.add_node("A").unwrap_err();
        assert!(matches!(err, GraphlineError::AlreadyExists(id) if id == "A"));
        assert_eq!(store.node_count(), 1);
    }

    #[test]
    fn test_add_edge_requires_both_nodes() {
        let store = store_with(&["A", "B"], &[]);
        store.add_edge("A", "B", 5).unwrap();

        let err = store.add_edge("A", "C", 5).unwrap_err();
        assert!(matches!(err, GraphlineError::NodeNotFound(id) if id == "C"));
        let err = store.add_edge("X", "B", 5).unwrap_err();
        assert!(matches!(err, GraphlineError::NodeNotFound(id) if id == "X"));
        assert_eq!(store.edge_count(), 1);
    }

    #[test]
    fn test_add_edge_is_idempotent_and_latest_weight_wins() {
        let store = store_with(&["A", "B"], &[("A", "B", 5), ("A", "B", 5)]);
        assert_eq!(store.edge_count(), 1);

        store.add_edge("A", "B", 2).unwrap();
        assert_eq!(store.edge_count(), 1);
        assert_eq!(store.shortest_path("A", "B").unwrap(), 2);
    }

    #[test]
    fn test_remove_node() {
        let store = store_with(&["A"], &[]);
        store.remove_node("A").unwrap();
        assert!(!store.contains_node("A"));

        let err = store.remove_node("B").unwrap_err();
        assert!(matches!(err, GraphlineError::NodeNotFound(_)));
    }

    #[test]
    fn test_remove_node_leaves_inbound_edges() {
        let store = store_with(&["A", "B", "C"], &[("A", "B", 1), ("B", "C", 1)]);
        store.remove_node("B").unwrap();

        let edges = store.edges_from("A");
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].to, "B");
        assert!(store.edges_from("B").is_empty());
        // The dangling edge is never followed.
        assert_eq!(store.shortest_path("A", "C").unwrap(), UNREACHABLE);
        assert!(store.find_within_weight("A", 100).unwrap().is_empty());
    }

    #[test]
    fn test_readding_removed_node_revives_dangling_edge() {
        let store = store_with(&["A", "B"], &[("A", "B", 4)]);
        store.remove_node("B").unwrap();
        store.add_node("B").unwrap();

        assert_eq!(store.shortest_path("A", "B").unwrap(), 4);
    }

    #[test]
    fn test_remove_edge() {
        let store = store_with(&["A", "B"], &[("A", "B", 5)]);
        store.remove_edge("A", "B").unwrap();
        assert_eq!(store.edge_count(), 0);
        assert_eq!(store.shortest_path("A", "B").unwrap(), UNREACHABLE);

        // Nothing left to remove still reports success.
        store.remove_edge("A", "B").unwrap();

        let err = store.remove_edge("A", "C").unwrap_err();
        assert!(matches!(err, GraphlineError::NodeNotFound(_)));
    }

    #[test]
    fn test_shortest_path() {
        let store = store_with(&["A", "B"], &[("A", "B", 5)]);
        assert_eq!(store.shortest_path("A", "B").unwrap(), 5);
        assert_eq!(store.shortest_path("A", "A").unwrap(), 0);

        let err = store.shortest_path("C", "D").unwrap_err();
        assert!(matches!(err, GraphlineError::NodeNotFound(_)));
    }

    #[test]
    fn test_shortest_path_prefers_cheaper_detour() {
        let store = store_with(
            &["A", "B", "C", "D"],
            &[("A", "D", 10), ("A", "B", 2), ("B", "C", 2), ("C", "D", 2)],
        );
        assert_eq!(store.shortest_path("A", "D").unwrap(), 6);
        assert_eq!(store.shortest_path("D", "A").unwrap(), UNREACHABLE);
    }

    #[test]
    fn test_shortest_path_to_self_without_edges() {
        let store = store_with(&["lonely"], &[]);
        assert_eq!(store.shortest_path("lonely", "lonely").unwrap(), 0);
    }

    #[test]
    fn test_find_within_weight() {
        let store = store_with(&["A", "B", "C"], &[("A", "B", 3), ("B", "C", 3)]);
        assert_eq!(store.find_within_weight("A", 10).unwrap(), vec!["B", "C"]);
        assert!(store.find_within_weight("A", 3).unwrap().is_empty());
        assert_eq!(store.find_within_weight("A", 4).unwrap(), vec!["B"]);

        let err = store.find_within_weight("Z", 10).unwrap_err();
        assert!(matches!(err, GraphlineError::NodeNotFound(_)));
    }

    #[test]
    fn test_find_within_weight_excludes_source_and_sorts() {
        let store = store_with(
            &["S", "zeta", "alpha", "mid"],
            &[("S", "zeta", 1), ("S", "alpha", 2), ("S", "mid", 1), ("mid", "S", 1)],
        );
        let found = store.find_within_weight("S", 5).unwrap();
        assert_eq!(found, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_nodes_tracks_adds_and_removes() {
        let store = GraphStore::new();
        let mut expected = BTreeSet::new();
        for (i, id) in ["n3", "n1", "n2", "n1", "n4"].iter().enumerate() {
            if store.add_node(id).is_ok() {
                expected.insert(id.to_string());
            }
            if i % 2 == 1 && store.remove_node("n3").is_ok() {
                expected.remove("n3");
            }
        }
        assert_eq!(store.nodes(), expected.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_concurrent_radius_queries_agree() {
        let store = Arc::new(store_with(
            &["A", "B", "C", "D"],
            &[("A", "B", 1), ("B", "C", 1), ("C", "D", 1), ("A", "D", 9)],
        ));

        let results: Vec<Vec<String>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let store = Arc::clone(&store);
                    scope.spawn(move || store.find_within_weight("A", 3).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for result in results {
            assert_eq!(result, vec!["B", "C"]);
        }
    }

    #[test]
    fn test_concurrent_mutations_and_queries() {
        let store = Arc::new(store_with(&["hub"], &[]));

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    for i in 0..25 {
                        let id = format!("w{worker}-{i}");
                        store.add_node(&id).unwrap();
                        store.add_edge("hub", &id, 1).unwrap();
                        let near = store.find_within_weight("hub", 2).unwrap();
                        assert!(near.contains(&id));
                        assert!(near.windows(2).all(|w| w[0] < w[1]));
                    }
                });
            }
        });

        assert_eq!(store.node_count(), 101);
        assert_eq!(store.edge_count(), 100);
    }
}
