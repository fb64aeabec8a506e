// src/dag/graph.rs

use indexmap::IndexMap;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::DagError;

/// Internal node structure: payload plus adjacency information.
#[derive(Debug, Clone)]
struct DagNode<P> {
    data: P,
    /// Direct predecessors: fragments that must complete before this one.
    preds: Vec<String>,
    /// Direct successors, filled in by [`Dag::check`].
    succs: Vec<String>,
}

/// In-memory DAG of fragments, keyed by fragment id.
///
/// Nodes keep their insertion order, which is the order the ready iterator
/// scans candidates in, so a fixed construction order gives reproducible
/// dispatch on re-runs.
///
/// The graph is mutated only while it is being built; [`Dag::check`] must
/// run once before scheduling and verifies that all predecessor references
/// resolve and that the graph is acyclic.
#[derive(Debug, Clone)]
pub struct Dag<P> {
    nodes: IndexMap<String, DagNode<P>>,
}

impl<P> Default for Dag<P> {
    fn default() -> Self {
        Self {
            nodes: IndexMap::new(),
        }
    }
}

impl<P> Dag<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fragment with its payload and direct predecessors.
    ///
    /// Predecessors may refer to fragments added later; dangling references
    /// are reported by [`Dag::check`].
    pub fn add_node(
        &mut self,
        uid: impl Into<String>,
        data: P,
        preds: &[&str],
    ) -> Result<(), DagError> {
        let uid = uid.into();
        if self.nodes.contains_key(&uid) {
            return Err(DagError::DuplicateId(uid));
        }
        self.nodes.insert(
            uid,
            DagNode {
                data,
                preds: preds.iter().map(|p| p.to_string()).collect(),
                succs: Vec::new(),
            },
        );
        Ok(())
    }

    /// Validate the graph and resolve successor links.
    ///
    /// Checks that every predecessor reference points at a known fragment
    /// and that the graph has no cycle (via a topological sort).
    pub fn check(&mut self) -> Result<(), DagError> {
        for node in self.nodes.values_mut() {
            node.succs.clear();
        }

        // Collect edges first, then mutate, to avoid borrowing conflicts.
        let mut edges: Vec<(String, String)> = Vec::new();
        for (uid, node) in self.nodes.iter() {
            for pred in node.preds.iter() {
                if !self.nodes.contains_key(pred) {
                    return Err(DagError::UnknownPredecessor {
                        node: uid.clone(),
                        pred: pred.clone(),
                    });
                }
                edges.push((pred.clone(), uid.clone()));
            }
        }
        for (pred, uid) in edges {
            if let Some(node) = self.nodes.get_mut(&pred) {
                node.succs.push(uid);
            }
        }

        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for uid in self.nodes.keys() {
            graph.add_node(uid.as_str());
        }
        for (uid, node) in self.nodes.iter() {
            for pred in node.preds.iter() {
                graph.add_edge(pred.as_str(), uid.as_str(), ());
            }
        }
        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(DagError::Cycle(cycle.node_id().to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.nodes.contains_key(uid)
    }

    pub fn payload(&self, uid: &str) -> Option<&P> {
        self.nodes.get(uid).map(|n| &n.data)
    }

    /// Key and payload references with the graph's own lifetime, as needed
    /// by the ready iterator.
    pub(crate) fn entry(&self, uid: &str) -> Option<(&str, &P)> {
        self.nodes
            .get_key_value(uid)
            .map(|(k, n)| (k.as_str(), &n.data))
    }

    /// Direct predecessors of a fragment.
    pub fn predecessors(&self, uid: &str) -> &[String] {
        self.nodes.get(uid).map(|n| n.preds.as_slice()).unwrap_or(&[])
    }

    /// Direct successors of a fragment. Only populated after [`Dag::check`].
    pub fn successors(&self, uid: &str) -> &[String] {
        self.nodes.get(uid).map(|n| n.succs.as_slice()).unwrap_or(&[])
    }

    /// Fragment ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    /// (id, payload) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &P)> {
        self.nodes.iter().map(|(k, n)| (k.as_str(), &n.data))
    }

    /// Render the graph as Graphviz DOT, for debugging.
    pub fn as_dot(&self) -> String {
        let mut out = String::from("digraph dag {\n");
        for uid in self.nodes.keys() {
            out.push_str(&format!("  \"{uid}\";\n"));
        }
        for (uid, node) in self.nodes.iter() {
            for pred in node.preds.iter() {
                out.push_str(&format!("  \"{pred}\" -> \"{uid}\";\n"));
            }
        }
        out.push_str("}\n");
        out
    }
}
