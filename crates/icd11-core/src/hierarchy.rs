use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::layout::{spring_layout, LayoutConfig};
use crate::{CodeRecord, Position};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub code: String,
    pub title: String,
}

/// Directed parent → child link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub parent: String,
    pub child: String,
}

/// Parent/child view over a set of records, with a 2D layout. Built fresh
/// for every request and never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchyGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    layout: BTreeMap<String, Position>,
}

impl HierarchyGraph {
    /// Build the graph over exactly `records`.
    ///
    /// One node per distinct code, in first-seen order; a repeated code keeps
    /// the last title. An edge is added only when the parent code is itself
    /// a node of this set, so a filtered set can lose edges to parents that
    /// were filtered out. Dangling parents are not an error.
    pub fn build(records: &[CodeRecord], config: &LayoutConfig) -> Self {
        let mut graph: DiGraph<GraphNode, ()> = DiGraph::new();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();

        for record in records {
            match index.get(record.code.as_str()) {
                Some(&idx) => graph[idx].title = record.title.clone(),
                None => {
                    let idx = graph.add_node(GraphNode {
                        code: record.code.clone(),
                        title: record.title.clone(),
                    });
                    index.insert(record.code.as_str(), idx);
                }
            }
        }

        for record in records {
            let Some(parent) = record.parent_code.as_deref() else {
                continue;
            };
            if let (Some(&from), Some(&to)) = (index.get(parent), index.get(record.code.as_str())) {
                if from != to {
                    graph.update_edge(from, to, ());
                }
            }
        }

        let positions = spring_layout(&graph, config);

        let edges = graph
            .edge_references()
            .map(|e| GraphEdge {
                parent: graph[e.source()].code.clone(),
                child: graph[e.target()].code.clone(),
            })
            .collect();
        let layout = graph
            .node_indices()
            .zip(positions)
            .map(|(idx, pos)| (graph[idx].code.clone(), pos))
            .collect();
        let (nodes, _) = graph.into_nodes_edges();
        let nodes: Vec<GraphNode> = nodes.into_iter().map(|n| n.weight).collect();

        let built = Self {
            nodes,
            edges,
            layout,
        };
        debug!(
            nodes = built.node_count(),
            edges = built.edge_count(),
            "hierarchy graph built"
        );
        built
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn layout(&self) -> &BTreeMap<String, Position> {
        &self.layout
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn position(&self, code: &str) -> Option<Position> {
        self.layout.get(code).copied()
    }

    /// Codes with no parent inside this graph, in node order.
    pub fn roots(&self) -> Vec<&str> {
        let children: HashSet<&str> = self.edges.iter().map(|e| e.child.as_str()).collect();
        self.nodes
            .iter()
            .map(|n| n.code.as_str())
            .filter(|code| !children.contains(code))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(records: &[CodeRecord]) -> HierarchyGraph {
        HierarchyGraph::build(records, &LayoutConfig::default())
    }

    fn edge(parent: &str, child: &str) -> GraphEdge {
        GraphEdge {
            parent: parent.into(),
            child: child.into(),
        }
    }

    #[test]
    fn empty_input_gives_empty_graph() {
        let graph = build(&[]);
        assert!(graph.is_empty());
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.layout().is_empty());
    }

    #[test]
    fn parent_and_child_make_one_edge() {
        let graph = build(&[CodeRecord::new("1A00", "X"), CodeRecord::new("1A00.1", "Y")]);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edges(), [edge("1A00", "1A00.1")]);
        assert_eq!(graph.nodes()[1].title, "Y");
        assert_eq!(graph.roots(), ["1A00"]);
    }

    #[test]
    fn parent_outside_the_set_drops_the_edge() {
        let graph = build(&[CodeRecord::new("1A00.1", "Y")]);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.position("1A00.1"), Some(Position::default()));
    }

    #[test]
    fn dangling_parent_is_tolerated() {
        let graph = build(&[
            CodeRecord::new("1A00", "Cholera"),
            CodeRecord::new("9Z99.1", "Orphan"),
        ]);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.roots(), ["1A00", "9Z99.1"]);
    }

    #[test]
    fn builds_multi_level_tree_regardless_of_order() {
        let graph = build(&[
            CodeRecord::new("A.B.C", "leaf"),
            CodeRecord::new("A", "root"),
            CodeRecord::new("A.B", "mid"),
            CodeRecord::new("A.D", "sibling"),
        ]);
        assert_eq!(
            graph.edges(),
            [edge("A.B", "A.B.C"), edge("A", "A.B"), edge("A", "A.D")]
        );
        assert_eq!(graph.roots(), ["A"]);
        assert_eq!(graph.layout().len(), 4);
    }

    #[test]
    fn repeated_code_is_one_node_with_last_title() {
        let graph = build(&[
            CodeRecord::new("1A00", "Old"),
            CodeRecord::new("1A00.1", "Child"),
            CodeRecord::new("1A00", "New"),
            CodeRecord::new("1A00.1", "Child again"),
        ]);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.nodes()[0].title, "New");
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn layout_is_reproducible() {
        let records = [
            CodeRecord::new("1A00", "Cholera"),
            CodeRecord::new("1A00.0", "Classical"),
            CodeRecord::new("1A00.1", "El Tor"),
            CodeRecord::new("1A07", "Typhoid"),
        ];
        let first = build(&records);
        let second = build(&records);
        assert_eq!(first.layout(), second.layout());
        assert_eq!(first, second);
    }
}
