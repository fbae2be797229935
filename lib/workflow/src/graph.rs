//! Workflow graph implementation using petgraph.
//!
//! Workflows are directed graphs where:
//! - Nodes are workflow steps (trigger, message, delay, ...)
//! - Edges connect a node to its successor, optionally labeled with a branch
//!   handle when the source node branches
//!
//! The graph structure is stored as JSONB in the database for flexible
//! schema evolution.

use crate::edge::Edge;
use crate::error::GraphError;
use crate::node::{Node, NodeId, NodeKind};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A workflow graph using petgraph's directed graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowGraph {
    /// The underlying directed graph.
    #[serde(with = "graph_serde")]
    graph: DiGraph<Node, Edge>,
    /// Map from NodeId to petgraph's NodeIndex for O(1) lookup.
    #[serde(skip)]
    node_index_map: HashMap<NodeId, NodeIndex>,
}

impl WorkflowGraph {
    /// Creates a new empty workflow graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_index_map: HashMap::new(),
        }
    }

    /// Adds a node to the graph.
    ///
    /// Returns the node ID.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let node_id = node.id;
        let index = self.graph.add_node(node);
        self.node_index_map.insert(node_id, index);
        node_id
    }

    /// Removes a node from the graph.
    ///
    /// Also removes all edges connected to this node.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let index = self.node_index_map.remove(&node_id)?;
        let removed = self.graph.remove_node(index);
        // petgraph swaps the last node into the removed slot
        self.rebuild_index_map();
        removed
    }

    /// Returns a reference to a node by its ID.
    #[must_use]
    pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        let index = self.node_index_map.get(&node_id)?;
        self.graph.node_weight(*index)
    }

    /// Adds an edge between two nodes.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Source or target node doesn't exist
    /// - The source branches and the handle is missing, duplicated, or not
    ///   one the source can produce
    /// - The source does not branch and carries a handle or already has an
    ///   outgoing edge
    pub fn add_edge(
        &mut self,
        source_id: NodeId,
        target_id: NodeId,
        edge: Edge,
    ) -> Result<(), GraphError> {
        let source_index = *self
            .node_index_map
            .get(&source_id)
            .ok_or(GraphError::NodeNotFound { node_id: source_id })?;

        if !self.node_index_map.contains_key(&target_id) {
            return Err(GraphError::NodeNotFound { node_id: target_id });
        }

        let source_node = self
            .graph
            .node_weight(source_index)
            .ok_or(GraphError::NodeNotFound { node_id: source_id })?;

        if let Some(produced) = source_node.config.produced_handles() {
            let Some(handle) = edge.handle.as_deref() else {
                return Err(GraphError::MissingHandle { node_id: source_id });
            };
            if !produced.iter().any(|h| h == handle) {
                return Err(GraphError::HandleNotProduced {
                    node_id: source_id,
                    handle: handle.to_string(),
                });
            }
            let duplicate = self
                .graph
                .edges_directed(source_index, Direction::Outgoing)
                .any(|e| e.weight().matches(handle));
            if duplicate {
                return Err(GraphError::DuplicateHandle {
                    node_id: source_id,
                    handle: handle.to_string(),
                });
            }
        } else {
            if let Some(handle) = &edge.handle {
                return Err(GraphError::UnexpectedHandle {
                    node_id: source_id,
                    handle: handle.clone(),
                });
            }
            let outgoing = self
                .graph
                .edges_directed(source_index, Direction::Outgoing)
                .count();
            if outgoing > 0 {
                return Err(GraphError::TooManyOutgoingEdges { node_id: source_id });
            }
        }

        let target_index = self.node_index_map[&target_id];
        self.graph.add_edge(source_index, target_index, edge);
        Ok(())
    }

    /// Returns all nodes in the graph.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Returns the number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns the successors of a node together with the connecting edges.
    pub fn successors(&self, node_id: NodeId) -> Vec<(&Node, &Edge)> {
        let Some(&index) = self.node_index_map.get(&node_id) else {
            return Vec::new();
        };

        self.graph
            .edges_directed(index, Direction::Outgoing)
            .filter_map(|edge| {
                let target = self.graph.node_weight(edge.target())?;
                Some((target, edge.weight()))
            })
            .collect()
    }

    /// Returns the single successor of a non-branching node, if any.
    #[must_use]
    pub fn successor(&self, node_id: NodeId) -> Option<NodeId> {
        let Some(&index) = self.node_index_map.get(&node_id) else {
            return None;
        };

        self.graph
            .edges_directed(index, Direction::Outgoing)
            .next()
            .and_then(|edge| self.graph.node_weight(edge.target()))
            .map(|node| node.id)
    }

    /// Returns the successor reached through the edge with the given handle.
    #[must_use]
    pub fn successor_via_handle(&self, node_id: NodeId, handle: &str) -> Option<NodeId> {
        let Some(&index) = self.node_index_map.get(&node_id) else {
            return None;
        };

        self.graph
            .edges_directed(index, Direction::Outgoing)
            .find(|edge| edge.weight().matches(handle))
            .and_then(|edge| self.graph.node_weight(edge.target()))
            .map(|node| node.id)
    }

    /// Returns the workflow's trigger node, if present.
    #[must_use]
    pub fn trigger_node(&self) -> Option<&Node> {
        self.nodes().find(|node| node.kind() == NodeKind::Trigger)
    }

    /// Validates the workflow graph.
    ///
    /// Checks:
    /// - Exactly one trigger node exists
    /// - Non-branching nodes have at most one outgoing edge, none labeled
    /// - Branching nodes' outgoing edges carry distinct handles the node can
    ///   produce
    /// - No cycles
    ///
    /// # Errors
    ///
    /// Returns an error describing the validation failure.
    pub fn validate(&self) -> Result<(), GraphError> {
        let trigger_count = self
            .nodes()
            .filter(|node| node.kind() == NodeKind::Trigger)
            .count();
        match trigger_count {
            0 => return Err(GraphError::MissingTriggerNode),
            1 => {}
            count => return Err(GraphError::MultipleTriggerNodes { count }),
        }

        for node in self.nodes() {
            let outgoing = self.successors(node.id);

            if let Some(produced) = node.config.produced_handles() {
                let mut seen: HashSet<&str> = HashSet::new();
                for (_, edge) in &outgoing {
                    let Some(handle) = edge.handle.as_deref() else {
                        return Err(GraphError::MissingHandle { node_id: node.id });
                    };
                    if !produced.iter().any(|h| h == handle) {
                        return Err(GraphError::HandleNotProduced {
                            node_id: node.id,
                            handle: handle.to_string(),
                        });
                    }
                    if !seen.insert(handle) {
                        return Err(GraphError::DuplicateHandle {
                            node_id: node.id,
                            handle: handle.to_string(),
                        });
                    }
                }
            } else {
                if outgoing.len() > 1 {
                    return Err(GraphError::TooManyOutgoingEdges { node_id: node.id });
                }
                if let Some((_, edge)) = outgoing.first()
                    && let Some(handle) = &edge.handle
                {
                    return Err(GraphError::UnexpectedHandle {
                        node_id: node.id,
                        handle: handle.clone(),
                    });
                }
            }
        }

        if petgraph::algo::is_cyclic_directed(&self.graph) {
            return Err(GraphError::CycleDetected);
        }

        Ok(())
    }

    /// Rebuilds the node index map after deserialization.
    pub fn rebuild_index_map(&mut self) {
        self.node_index_map.clear();
        for index in self.graph.node_indices() {
            if let Some(node) = self.graph.node_weight(index) {
                self.node_index_map.insert(node.id, index);
            }
        }
    }
}

impl Default for WorkflowGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Custom serde for petgraph DiGraph.
mod graph_serde {
    use super::*;
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeStruct;

    pub fn serialize<S>(graph: &DiGraph<Node, Edge>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let nodes: Vec<_> = graph.node_weights().cloned().collect();
        let edges: Vec<_> = graph
            .edge_references()
            .map(|e| {
                let source_id = graph.node_weight(e.source()).map(|n| n.id);
                let target_id = graph.node_weight(e.target()).map(|n| n.id);
                (source_id, target_id, e.weight().clone())
            })
            .collect();

        let mut state = serializer.serialize_struct("Graph", 2)?;
        state.serialize_field("nodes", &nodes)?;
        state.serialize_field("edges", &edges)?;
        state.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DiGraph<Node, Edge>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        type EdgeTuple = (Option<NodeId>, Option<NodeId>, Edge);

        struct GraphVisitor;

        impl<'de> Visitor<'de> for GraphVisitor {
            type Value = DiGraph<Node, Edge>;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a workflow graph with nodes and edges")
            }

            fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut nodes: Option<Vec<Node>> = None;
                let mut edges: Option<Vec<EdgeTuple>> = None;

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "nodes" => nodes = Some(map.next_value()?),
                        "edges" => edges = Some(map.next_value()?),
                        _ => {
                            let _ = map.next_value::<serde::de::IgnoredAny>()?;
                        }
                    }
                }

                let nodes = nodes.unwrap_or_default();
                let edges = edges.unwrap_or_default();

                let mut graph = DiGraph::new();
                let mut id_to_index = HashMap::new();

                for node in nodes {
                    let id = node.id;
                    let index = graph.add_node(node);
                    id_to_index.insert(id, index);
                }

                for (source_id, target_id, edge) in edges {
                    let (Some(source), Some(target)) = (source_id, target_id) else {
                        continue;
                    };
                    let (Some(&source_idx), Some(&target_idx)) =
                        (id_to_index.get(&source), id_to_index.get(&target))
                    else {
                        continue;
                    };
                    graph.add_edge(source_idx, target_idx, edge);
                }

                Ok(graph)
            }
        }

        deserializer.deserialize_struct("Graph", &["nodes", "edges"], GraphVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ConditionOperator;
    use crate::edge::{HANDLE_FALSE, HANDLE_TRUE};
    use crate::node::{
        ConditionNodeConfig, MessageNodeConfig, NodeConfig, TriggerEventType, TriggerFilters,
        TriggerNodeConfig,
    };
    use serde_json::json;

    fn trigger_node(name: &str) -> Node {
        Node::new(
            name,
            NodeConfig::Trigger(TriggerNodeConfig {
                event_type: TriggerEventType::ContactAdded,
                filters: TriggerFilters::default(),
            }),
        )
    }

    fn message_node(name: &str) -> Node {
        Node::new(
            name,
            NodeConfig::Message(MessageNodeConfig::Text {
                body: "hi".to_string(),
            }),
        )
    }

    fn condition_node(name: &str) -> Node {
        Node::new(
            name,
            NodeConfig::Condition(ConditionNodeConfig {
                field: "plan".to_string(),
                operator: ConditionOperator::Equals,
                value: json!("pro"),
            }),
        )
    }

    #[test]
    fn add_and_get_node() {
        let mut graph = WorkflowGraph::new();
        let node = trigger_node("Entry");
        let node_id = node.id;
        graph.add_node(node);

        let retrieved = graph.get_node(node_id);
        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap().name, "Entry");
    }

    #[test]
    fn add_edge_rejects_unknown_node() {
        let mut graph = WorkflowGraph::new();
        let trigger = trigger_node("Entry");
        let trigger_id = graph.add_node(trigger);

        let result = graph.add_edge(trigger_id, NodeId::new(), Edge::plain());
        assert!(matches!(result, Err(GraphError::NodeNotFound { .. })));
    }

    #[test]
    fn non_branching_node_rejects_second_edge() {
        let mut graph = WorkflowGraph::new();
        let trigger_id = graph.add_node(trigger_node("Entry"));
        let first_id = graph.add_node(message_node("First"));
        let second_id = graph.add_node(message_node("Second"));

        graph.add_edge(trigger_id, first_id, Edge::plain()).unwrap();
        let result = graph.add_edge(trigger_id, second_id, Edge::plain());
        assert!(matches!(
            result,
            Err(GraphError::TooManyOutgoingEdges { .. })
        ));
    }

    #[test]
    fn branching_node_requires_producible_handle() {
        let mut graph = WorkflowGraph::new();
        let condition_id = graph.add_node(condition_node("Check"));
        let target_id = graph.add_node(message_node("Target"));

        let unlabeled = graph.add_edge(condition_id, target_id, Edge::plain());
        assert!(matches!(unlabeled, Err(GraphError::MissingHandle { .. })));

        let stray = graph.add_edge(condition_id, target_id, Edge::with_handle("maybe"));
        assert!(matches!(stray, Err(GraphError::HandleNotProduced { .. })));

        let ok = graph.add_edge(condition_id, target_id, Edge::with_handle(HANDLE_TRUE));
        assert!(ok.is_ok());

        let duplicate = graph.add_edge(condition_id, target_id, Edge::with_handle(HANDLE_TRUE));
        assert!(matches!(duplicate, Err(GraphError::DuplicateHandle { .. })));
    }

    #[test]
    fn successor_via_handle_selects_matching_edge() {
        let mut graph = WorkflowGraph::new();
        let condition_id = graph.add_node(condition_node("Check"));
        let yes_id = graph.add_node(message_node("Yes"));
        let no_id = graph.add_node(message_node("No"));

        graph
            .add_edge(condition_id, yes_id, Edge::with_handle(HANDLE_TRUE))
            .unwrap();
        graph
            .add_edge(condition_id, no_id, Edge::with_handle(HANDLE_FALSE))
            .unwrap();

        assert_eq!(graph.successor_via_handle(condition_id, "true"), Some(yes_id));
        assert_eq!(graph.successor_via_handle(condition_id, "false"), Some(no_id));
        assert_eq!(graph.successor_via_handle(condition_id, "other"), None);
    }

    #[test]
    fn validate_requires_exactly_one_trigger() {
        let mut graph = WorkflowGraph::new();
        graph.add_node(message_node("Orphan"));
        assert!(matches!(
            graph.validate(),
            Err(GraphError::MissingTriggerNode)
        ));

        let mut graph = WorkflowGraph::new();
        graph.add_node(trigger_node("One"));
        graph.add_node(trigger_node("Two"));
        assert!(matches!(
            graph.validate(),
            Err(GraphError::MultipleTriggerNodes { count: 2 })
        ));
    }

    #[test]
    fn validate_detects_cycle() {
        let mut graph = WorkflowGraph::new();
        let trigger_id = graph.add_node(trigger_node("Entry"));
        let a_id = graph.add_node(condition_node("A"));
        let b_id = graph.add_node(message_node("B"));

        graph.add_edge(trigger_id, a_id, Edge::plain()).unwrap();
        graph
            .add_edge(a_id, b_id, Edge::with_handle(HANDLE_TRUE))
            .unwrap();
        graph.add_edge(b_id, a_id, Edge::plain()).unwrap();

        assert!(matches!(graph.validate(), Err(GraphError::CycleDetected)));
    }

    #[test]
    fn trigger_node_lookup() {
        let mut graph = WorkflowGraph::new();
        let trigger_id = graph.add_node(trigger_node("Entry"));
        graph.add_node(message_node("Step"));

        assert_eq!(graph.trigger_node().map(|n| n.id), Some(trigger_id));
    }

    #[test]
    fn graph_serde_roundtrip() {
        let mut graph = WorkflowGraph::new();
        let trigger_id = graph.add_node(trigger_node("Entry"));
        let message_id = graph.add_node(message_node("Step"));
        graph
            .add_edge(trigger_id, message_id, Edge::plain())
            .unwrap();

        let json = serde_json::to_string(&graph).expect("serialize");
        let mut parsed: WorkflowGraph = serde_json::from_str(&json).expect("deserialize");
        parsed.rebuild_index_map();

        assert_eq!(parsed.node_count(), 2);
        assert_eq!(parsed.edge_count(), 1);
        assert_eq!(parsed.successor(trigger_id), Some(message_id));
    }
}
