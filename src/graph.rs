//! The temporal network multigraph.
//!
//! Nodes are timepoints; directed edges carry the labeled-value payloads the
//! propagation engine reads and tightens. One `Edge` per ordered
//! (source, target) pair holds every payload kind at once — the ordinary
//! labeled values, the upper-case value map, and the optional lower-case
//! value — so "at most one edge per pair per payload kind" holds by
//! construction.
//!
//! Node lifecycle: nodes are created by the reader (or the engine's Z
//! repair) and never destroyed. Edge lifecycle: created by the reader or
//! synthesized by the engine as `Derived`; removed only when their payload
//! empties.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use xxhash_rust::xxh3::Xxh3Builder;

use crate::alabel::ALabelAlphabet;
use crate::error::TnError;
use crate::label::Label;
use crate::labeled_values::LabeledValueMap;
use crate::upper_values::{LowerCaseValue, UpperCaseValueMap};

/// Name of the distinguished zero timepoint.
pub const ZERO_NODE_NAME: &str = "Z";

/// Handle to a node. Valid for the lifetime of the graph that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

/// Handle to an edge. May refer to a removed edge, in which case lookups
/// return `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A timepoint.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    /// Scenario under which the timepoint exists.
    pub label: Label,
    /// The proposition this node observes, if it is an observation node.
    pub observed: Option<char>,
    /// Editor coordinates. Ignored by the engine.
    pub x: f64,
    pub y: f64,
    /// Labeled node potential. Carried for file round-trips.
    pub potential: LabeledValueMap,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Node {
        Node {
            name: name.into(),
            label: Label::empty(),
            observed: None,
            x: 0.0,
            y: 0.0,
            potential: LabeledValueMap::new(),
        }
    }

    pub fn with_label(mut self, label: Label) -> Node {
        self.label = label;
        self
    }

    /// Mark this node as the observer of `proposition`.
    pub fn observing(mut self, proposition: char) -> Node {
        self.observed = Some(proposition);
        self
    }

    pub fn is_observer(&self) -> bool {
        self.observed.is_some()
    }
}

/// Provenance/type of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Requirement,
    Contingent,
    Derived,
    Internal,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Requirement => "requirement",
            EdgeKind::Contingent => "contingent",
            EdgeKind::Derived => "derived",
            EdgeKind::Internal => "internal",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<EdgeKind, TnError> {
        match s {
            "requirement" => Ok(EdgeKind::Requirement),
            "contingent" => Ok(EdgeKind::Contingent),
            "derived" => Ok(EdgeKind::Derived),
            "internal" => Ok(EdgeKind::Internal),
            other => Err(TnError::GraphmlParse(format!("unknown edge type: {other}"))),
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directed constraint edge with all payload kinds.
#[derive(Debug, Clone)]
pub struct Edge {
    pub name: String,
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
    /// Ordinary (conditional) labeled values. The classic STN weight is the
    /// value under the empty label.
    pub values: LabeledValueMap,
    /// Upper-case values for contingent reasoning.
    pub upper: UpperCaseValueMap,
    /// The single lower-case value of a contingent activation edge.
    pub lower: Option<LowerCaseValue>,
}

impl Edge {
    pub fn new(name: impl Into<String>, source: NodeId, target: NodeId, kind: EdgeKind) -> Edge {
        Edge {
            name: name.into(),
            source,
            target,
            kind,
            values: LabeledValueMap::new(),
            upper: UpperCaseValueMap::new(),
            lower: None,
        }
    }

    /// Whether no payload of any kind remains.
    pub fn is_payload_empty(&self) -> bool {
        self.values.is_empty() && self.upper.is_empty() && self.lower.is_none()
    }

    /// The unconditional weight, if any.
    pub fn stn_value(&self) -> Option<i32> {
        self.values.get(&Label::empty())
    }
}

/// Directed multigraph of timepoints.
pub struct TNGraph {
    nodes: Vec<Node>,
    node_index: HashMap<String, NodeId, Xxh3Builder>,
    edges: Vec<Option<Edge>>,
    pair_index: HashMap<(NodeId, NodeId), EdgeId, Xxh3Builder>,
    out_edges: Vec<Vec<EdgeId>>,
    in_edges: Vec<Vec<EdgeId>>,
    /// Observed proposition → observer node. Maintained eagerly on node
    /// insertion (the structural-change cache of the contract).
    observers: BTreeMap<char, NodeId>,
    alphabet: ALabelAlphabet,
}

impl Default for TNGraph {
    fn default() -> Self {
        TNGraph::new()
    }
}

impl TNGraph {
    pub fn new() -> TNGraph {
        TNGraph {
            nodes: Vec::new(),
            node_index: HashMap::with_hasher(Xxh3Builder::new()),
            edges: Vec::new(),
            pair_index: HashMap::with_hasher(Xxh3Builder::new()),
            out_edges: Vec::new(),
            in_edges: Vec::new(),
            observers: BTreeMap::new(),
            alphabet: ALabelAlphabet::new(),
        }
    }

    // ── Nodes ─────────────────────────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn add_node(&mut self, node: Node) -> Result<NodeId, TnError> {
        if self.node_index.contains_key(&node.name) {
            return Err(TnError::DuplicateNode(node.name));
        }
        if let Some(p) = node.observed
            && let Some(prev) = self.observers.get(&p)
        {
            return Err(TnError::IllDefined(format!(
                "proposition '{p}' observed by both '{}' and '{}'",
                self.nodes[prev.index()].name, node.name
            )));
        }
        let id = NodeId(self.nodes.len() as u32);
        self.node_index.insert(node.name.clone(), id);
        if let Some(p) = node.observed {
            self.observers.insert(p, id);
        }
        self.nodes.push(node);
        self.out_edges.push(Vec::new());
        self.in_edges.push(Vec::new());
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.node_index.get(name).copied()
    }

    pub fn node_name(&self, id: NodeId) -> &str {
        &self.nodes[id.index()].name
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    /// The zero timepoint, if present.
    pub fn z(&self) -> Option<NodeId> {
        self.node_id(ZERO_NODE_NAME)
    }

    /// The zero timepoint, created at the origin when absent.
    pub fn ensure_z(&mut self) -> NodeId {
        match self.z() {
            Some(z) => z,
            None => self
                .add_node(Node::new(ZERO_NODE_NAME))
                .unwrap_or(NodeId(0)),
        }
    }

    // ── Observers ─────────────────────────────────────────────────────────

    /// The node observing `proposition`, if any.
    pub fn observer(&self, proposition: char) -> Option<NodeId> {
        self.observers.get(&proposition).copied()
    }

    /// All observed propositions with their observers, in alphabet order.
    pub fn observers(&self) -> &BTreeMap<char, NodeId> {
        &self.observers
    }

    /// Edges from observation nodes to the zero timepoint, in observer
    /// order. Derived from the eagerly maintained observers map, so it is
    /// always current without explicit invalidation.
    pub fn observation_edges_to_z(&self) -> Vec<EdgeId> {
        let Some(z) = self.z() else {
            return Vec::new();
        };
        self.observers
            .values()
            .filter_map(|obs| self.find_edge(*obs, z))
            .collect()
    }

    /// Propositions observed by *other* observation nodes whose own label
    /// mentions the proposition this node observes — i.e. observations that
    /// can only happen in scenarios where this node's proposition has been
    /// decided.
    pub fn children_of(&self, id: NodeId) -> Vec<char> {
        let Some(p) = self.node(id).observed else {
            return Vec::new();
        };
        self.observers
            .iter()
            .filter(|(_, obs)| **obs != id)
            .filter(|(_, obs)| self.node(**obs).label.contains_proposition(p))
            .map(|(q, _)| *q)
            .collect()
    }

    // ── Edges ─────────────────────────────────────────────────────────────

    pub fn edge_count(&self) -> usize {
        self.edges.iter().filter(|e| e.is_some()).count()
    }

    pub fn add_edge(&mut self, edge: Edge) -> Result<EdgeId, TnError> {
        let pair = (edge.source, edge.target);
        if self.pair_index.contains_key(&pair) {
            return Err(TnError::DuplicateEdge(
                self.node_name(edge.source).to_string(),
                self.node_name(edge.target).to_string(),
            ));
        }
        let id = EdgeId(self.edges.len() as u32);
        self.pair_index.insert(pair, id);
        self.out_edges[edge.source.index()].push(id);
        self.in_edges[edge.target.index()].push(id);
        self.edges.push(Some(edge));
        Ok(id)
    }

    /// The edge between an ordered node pair, creating a `Derived` edge on
    /// demand. Used by the engine to land new constraints.
    pub fn ensure_edge(&mut self, source: NodeId, target: NodeId) -> EdgeId {
        if let Some(id) = self.find_edge(source, target) {
            return id;
        }
        let name = format!("{}_{}", self.node_name(source), self.node_name(target));
        let edge = Edge::new(name, source, target, EdgeKind::Derived);
        // The pair was just checked absent, so insertion cannot collide.
        self.add_edge(edge).unwrap_or(EdgeId(0))
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    pub fn find_edge(&self, source: NodeId, target: NodeId) -> Option<EdgeId> {
        self.pair_index.get(&(source, target)).copied()
    }

    /// Remove an edge entirely (tombstoning its id).
    pub fn remove_edge(&mut self, id: EdgeId) -> Option<Edge> {
        let edge = self.edges.get_mut(id.0 as usize)?.take()?;
        self.pair_index.remove(&(edge.source, edge.target));
        self.out_edges[edge.source.index()].retain(|e| *e != id);
        self.in_edges[edge.target.index()].retain(|e| *e != id);
        Some(edge)
    }

    pub fn out_edges(&self, node: NodeId) -> &[EdgeId] {
        &self.out_edges[node.index()]
    }

    pub fn in_edges(&self, node: NodeId) -> &[EdgeId] {
        &self.in_edges[node.index()]
    }

    /// Live edge ids in insertion order.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|_| EdgeId(i as u32)))
    }

    /// Live edge ids sorted by (source name, target name): the stable
    /// processing order the worklist requires for reproducible runs.
    pub fn edges_in_stable_order(&self) -> Vec<EdgeId> {
        let mut ids: Vec<EdgeId> = self.edge_ids().collect();
        ids.sort_by(|a, b| {
            let ea = self.edges[a.0 as usize].as_ref();
            let eb = self.edges[b.0 as usize].as_ref();
            match (ea, eb) {
                (Some(x), Some(y)) => (self.node_name(x.source), self.node_name(x.target))
                    .cmp(&(self.node_name(y.source), self.node_name(y.target))),
                _ => std::cmp::Ordering::Equal,
            }
        });
        ids
    }

    // ── Alphabet ──────────────────────────────────────────────────────────

    pub fn alphabet(&self) -> &ALabelAlphabet {
        &self.alphabet
    }

    pub fn alphabet_mut(&mut self) -> &mut ALabelAlphabet {
        &mut self.alphabet
    }
}

impl fmt::Debug for TNGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TNGraph ({} nodes, {} edges)", self.node_count(), self.edge_count())?;
        for (_, n) in self.nodes() {
            writeln!(
                f,
                "  node {} label={} obs={:?}",
                n.name, n.label, n.observed
            )?;
        }
        for id in self.edges_in_stable_order() {
            if let Some(e) = self.edge(id) {
                writeln!(
                    f,
                    "  edge {}: {} -> {} [{}] {}",
                    e.name,
                    self.node_name(e.source),
                    self.node_name(e.target),
                    e.kind,
                    e.values
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l(s: &str) -> Label {
        s.parse().unwrap()
    }

    #[test]
    fn test_add_and_lookup_nodes() {
        let mut g = TNGraph::new();
        let z = g.add_node(Node::new("Z")).unwrap();
        let x = g.add_node(Node::new("X").with_label(l("p"))).unwrap();
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.node_id("Z"), Some(z));
        assert_eq!(g.node_id("X"), Some(x));
        assert_eq!(g.node_id("Y"), None);
        assert_eq!(g.node(x).label, l("p"));
        assert!(g.add_node(Node::new("Z")).is_err());
    }

    #[test]
    fn test_ensure_z() {
        let mut g = TNGraph::new();
        let z = g.ensure_z();
        assert_eq!(g.node_name(z), ZERO_NODE_NAME);
        assert_eq!(g.ensure_z(), z);
        assert_eq!(g.node_count(), 1);
    }

    #[test]
    fn test_observers() {
        let mut g = TNGraph::new();
        let p = g.add_node(Node::new("P?").observing('p')).unwrap();
        g.add_node(Node::new("X")).unwrap();
        assert_eq!(g.observer('p'), Some(p));
        assert_eq!(g.observer('q'), None);
        // A second observer of the same proposition is ill-defined.
        assert!(g.add_node(Node::new("P2?").observing('p')).is_err());
    }

    #[test]
    fn test_observation_edges_to_z() {
        let mut g = TNGraph::new();
        let z = g.add_node(Node::new("Z")).unwrap();
        let p = g.add_node(Node::new("P?").observing('p')).unwrap();
        let q = g.add_node(Node::new("Q?").observing('q')).unwrap();
        assert!(g.observation_edges_to_z().is_empty());
        let ep = g.add_edge(Edge::new("PZ", p, z, EdgeKind::Requirement)).unwrap();
        let eq = g.add_edge(Edge::new("QZ", q, z, EdgeKind::Requirement)).unwrap();
        assert_eq!(g.observation_edges_to_z(), vec![ep, eq]);
    }

    #[test]
    fn test_children_of() {
        let mut g = TNGraph::new();
        let p = g.add_node(Node::new("P?").observing('p')).unwrap();
        // Q? exists only when p is true: it is a child of P?.
        let q = g
            .add_node(Node::new("Q?").with_label(l("p")).observing('q'))
            .unwrap();
        let r = g.add_node(Node::new("R?").observing('r')).unwrap();
        assert_eq!(g.children_of(p), vec!['q']);
        assert_eq!(g.children_of(q), Vec::<char>::new());
        assert_eq!(g.children_of(r), Vec::<char>::new());
    }

    #[test]
    fn test_edges() {
        let mut g = TNGraph::new();
        let z = g.add_node(Node::new("Z")).unwrap();
        let x = g.add_node(Node::new("X")).unwrap();
        let e = g
            .add_edge(Edge::new("ZX", z, x, EdgeKind::Requirement))
            .unwrap();
        assert_eq!(g.find_edge(z, x), Some(e));
        assert_eq!(g.find_edge(x, z), None);
        assert_eq!(g.out_edges(z), &[e]);
        assert_eq!(g.in_edges(x), &[e]);
        assert!(g.add_edge(Edge::new("dup", z, x, EdgeKind::Derived)).is_err());
    }

    #[test]
    fn test_remove_edge() {
        let mut g = TNGraph::new();
        let z = g.add_node(Node::new("Z")).unwrap();
        let x = g.add_node(Node::new("X")).unwrap();
        let e = g
            .add_edge(Edge::new("ZX", z, x, EdgeKind::Requirement))
            .unwrap();
        assert!(g.remove_edge(e).is_some());
        assert_eq!(g.edge(e).map(|_| ()), None);
        assert_eq!(g.find_edge(z, x), None);
        assert_eq!(g.edge_count(), 0);
        assert!(g.remove_edge(e).is_none());
        // The pair is free again.
        assert!(g.add_edge(Edge::new("ZX2", z, x, EdgeKind::Derived)).is_ok());
    }

    #[test]
    fn test_ensure_edge_creates_derived() {
        let mut g = TNGraph::new();
        let z = g.add_node(Node::new("Z")).unwrap();
        let x = g.add_node(Node::new("X")).unwrap();
        let e = g.ensure_edge(z, x);
        assert_eq!(g.edge(e).map(|e| e.kind), Some(EdgeKind::Derived));
        assert_eq!(g.ensure_edge(z, x), e);
    }

    #[test]
    fn test_stable_order_is_by_names() {
        let mut g = TNGraph::new();
        let b = g.add_node(Node::new("B")).unwrap();
        let a = g.add_node(Node::new("A")).unwrap();
        let c = g.add_node(Node::new("C")).unwrap();
        let e1 = g.add_edge(Edge::new("e1", c, a, EdgeKind::Requirement)).unwrap();
        let e2 = g.add_edge(Edge::new("e2", a, b, EdgeKind::Requirement)).unwrap();
        let e3 = g.add_edge(Edge::new("e3", a, c, EdgeKind::Requirement)).unwrap();
        assert_eq!(g.edges_in_stable_order(), vec![e2, e3, e1]);
    }

    #[test]
    fn test_edge_kind_roundtrip() {
        for k in [
            EdgeKind::Requirement,
            EdgeKind::Contingent,
            EdgeKind::Derived,
            EdgeKind::Internal,
        ] {
            assert_eq!(EdgeKind::from_str(k.as_str()).unwrap(), k);
        }
        assert!(EdgeKind::from_str("bogus").is_err());
    }

    #[test]
    fn test_payload_empty() {
        let mut g = TNGraph::new();
        let z = g.add_node(Node::new("Z")).unwrap();
        let x = g.add_node(Node::new("X")).unwrap();
        let e = g.add_edge(Edge::new("ZX", z, x, EdgeKind::Requirement)).unwrap();
        assert!(g.edge(e).unwrap().is_payload_empty());
        g.edge_mut(e).unwrap().values.put(Label::empty(), 10);
        assert!(!g.edge(e).unwrap().is_payload_empty());
        assert_eq!(g.edge(e).unwrap().stn_value(), Some(10));
    }
}
