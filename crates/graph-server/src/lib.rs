pub mod topology {
    use std::collections::{HashMap, HashSet};

    /// Edge weights and accumulated distances.
    pub type Weight = i32;

    /// A directed, weighted edge between two client-named nodes.
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    pub struct Edge {
        pub from: String,
        pub to: String,
        pub weight: Weight,
    }

    /// A Dynamic Graph Topology represented as an Adjacency List.
    ///
    /// Outgoing edges are keyed by their target, so an ordered pair of nodes
    /// carries at most one edge and re-adding it replaces the weight.
    #[derive(Debug, Clone, Default)]
    pub struct GraphTopology {
        nodes: HashSet<String>,
        /// Adjacency list: source -> target -> weight
        adj: HashMap<String, HashMap<String, Weight>>,
    }

    impl GraphTopology {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn num_nodes(&self) -> usize {
            self.nodes.len()
        }

        pub fn num_edges(&self) -> usize {
            self.adj.values().map(|targets| targets.len()).sum()
        }

        pub fn contains(&self, id: &str) -> bool {
            self.nodes.contains(id)
        }

        /// The stored id equal to `id`, borrowed from the graph.
        pub fn node(&self, id: &str) -> Option<&str> {
            self.nodes.get(id).map(String::as_str)
        }

        pub fn node_ids(&self) -> impl Iterator<Item = &str> + '_ {
            self.nodes.iter().map(String::as_str)
        }

        /// Outgoing `(target, weight)` pairs of `id`. Targets may name nodes
        /// that have since been removed.
        pub fn neighbors(&self, id: &str) -> impl Iterator<Item = (&str, Weight)> + '_ {
            self.adj
                .get(id)
                .into_iter()
                .flatten()
                .map(|(target, &weight)| (target.as_str(), weight))
        }

        /// Returns `false` if the node was already present.
        pub fn add_node(&mut self, id: &str) -> bool {
            if self.nodes.contains(id) {
                return false;
            }
            self.nodes.insert(id.to_string())
        }

        /// Inserts or re-weights the edge `from -> to`, returning the previous
        /// weight. Endpoint existence is the caller's concern.
        pub fn add_edge(&mut self, from: &str, to: &str, weight: Weight) -> Option<Weight> {
            self.adj
                .entry(from.to_string())
                .or_default()
                .insert(to.to_string(), weight)
        }

        /// Removes the node and its outgoing edges. Edges from other nodes
        /// that target it are left in place.
        pub fn remove_node(&mut self, id: &str) -> bool {
            if !self.nodes.remove(id) {
                return false;
            }
            self.adj.remove(id);
            true
        }

        pub fn remove_edge(&mut self, from: &str, to: &str) -> Option<Weight> {
            let targets = self.adj.get_mut(from)?;
            let removed = targets.remove(to);
            if targets.is_empty() {
                self.adj.remove(from);
            }
            removed
        }

        pub fn edges_from(&self, id: &str) -> Vec<Edge> {
            let mut edges: Vec<Edge> = self
                .neighbors(id)
                .map(|(to, weight)| Edge {
                    from: id.to_string(),
                    to: to.to_string(),
                    weight,
                })
                .collect();
            edges.sort_by(|a, b| a.to.cmp(&b.to));
            edges
        }
    }
}

/// Fixed lines of the text protocol.
pub mod replies {
    pub const NODE_ADDED: &str = "NODE ADDED";
    pub const NODE_REMOVED: &str = "NODE REMOVED";
    pub const EDGE_ADDED: &str = "EDGE ADDED";
    pub const EDGE_REMOVED: &str = "EDGE REMOVED";
    pub const NODE_ALREADY_EXISTS: &str = "ERROR: NODE ALREADY EXISTS";
    pub const NODE_NOT_FOUND: &str = "ERROR: NODE NOT FOUND";
    pub const NOT_UNDERSTOOD: &str = "SORRY, I DID NOT UNDERSTAND THAT";

    pub fn greeting(session_id: impl std::fmt::Display) -> String {
        format!("HI, I AM {session_id}")
    }

    pub fn named(name: &str) -> String {
        format!("HI {name}")
    }

    pub fn farewell(name: &str, elapsed_ms: u128) -> String {
        format!("BYE {name}, WE SPOKE FOR {elapsed_ms} MS")
    }
}

pub mod command;
pub mod config;
pub mod error;
pub mod handler;
pub mod logging;
pub mod registry;
pub mod server;
pub mod session;
pub mod store;
pub mod traversal;
