//! GraphML reading and writing.
//!
//! The file format is GraphML (XML) with a fixed key schema: nodes carry
//! `x`, `y`, `Obs`, `Label`, `Potential`; edges carry `Type`, `Value`,
//! `LabeledValues`, `LowerCaseLabeledValues`, `UpperCaseLabeledValues`,
//! and the single STNU case value `LabeledValue` (`LC(Name):int` or
//! `UC(Name):int`). The glyphs `∞` and `⊡` round-trip verbatim.
//!
//! Reading is a single event-stream pass that buffers node and edge specs
//! and builds the graph once the document ends, so the element order inside
//! the file does not matter. Writing emits nodes and edges in name order,
//! which makes output deterministic.

use std::fs;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::alabel::ALabel;
use crate::arith::{format_weight, parse_weight};
use crate::error::TnError;
use crate::graph::{Edge, EdgeKind, Node, TNGraph};
use crate::label::Label;
use crate::labeled_values::LabeledValueMap;
use crate::upper_values::{LowerCaseValue, UpperCaseValueMap};

// ── Reader ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct NodeSpec {
    id: String,
    x: f64,
    y: f64,
    obs: Option<char>,
    label: Option<String>,
    potential: Option<String>,
}

#[derive(Default)]
struct EdgeSpec {
    id: String,
    source: String,
    target: String,
    kind: Option<String>,
    value: Option<String>,
    labeled_values: Option<String>,
    lower_case: Option<String>,
    upper_case: Option<String>,
    single_case: Option<String>,
}

enum Current {
    None,
    Node(NodeSpec),
    Edge(EdgeSpec),
}

/// Parse a GraphML document into a graph.
pub fn read_graphml(xml: &str) -> Result<TNGraph, TnError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut nodes: Vec<NodeSpec> = Vec::new();
    let mut edges: Vec<EdgeSpec> = Vec::new();
    let mut current = Current::None;
    let mut current_key: Option<String> = None;
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => match e.name().as_ref() {
                b"node" => current = Current::Node(node_attrs(&e)),
                b"edge" => current = Current::Edge(edge_attrs(&e)),
                b"data" => {
                    current_key = attr_value(&e, b"key");
                    text.clear();
                }
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"node" => nodes.push(node_attrs(&e)),
                b"edge" => edges.push(edge_attrs(&e)),
                b"data" => {
                    if let Some(key) = attr_value(&e, b"key") {
                        assign_data(&mut current, &key, "");
                    }
                }
                _ => {}
            },
            Event::Text(e) => {
                text.push_str(&unescape_basic(&String::from_utf8_lossy(e.as_ref())));
            }
            Event::End(e) => match e.name().as_ref() {
                b"data" => {
                    if let Some(key) = current_key.take() {
                        assign_data(&mut current, &key, text.trim());
                    }
                    text.clear();
                }
                b"node" => {
                    if let Current::Node(spec) = std::mem::replace(&mut current, Current::None) {
                        nodes.push(spec);
                    }
                }
                b"edge" => {
                    if let Current::Edge(spec) = std::mem::replace(&mut current, Current::None) {
                        edges.push(spec);
                    }
                }
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    build_graph(nodes, edges)
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find_map(|a| (a.key.as_ref() == key).then(|| String::from_utf8_lossy(&a.value).into_owned()))
}

fn node_attrs(e: &BytesStart<'_>) -> NodeSpec {
    NodeSpec {
        id: attr_value(e, b"id").unwrap_or_default(),
        ..NodeSpec::default()
    }
}

fn edge_attrs(e: &BytesStart<'_>) -> EdgeSpec {
    EdgeSpec {
        id: attr_value(e, b"id").unwrap_or_default(),
        source: attr_value(e, b"source").unwrap_or_default(),
        target: attr_value(e, b"target").unwrap_or_default(),
        ..EdgeSpec::default()
    }
}

/// Read a GraphML file from disk.
pub fn read_graphml_file(path: &Path) -> Result<TNGraph, TnError> {
    let xml = fs::read_to_string(path)?;
    read_graphml(&xml)
}

fn assign_data(current: &mut Current, key: &str, value: &str) {
    match current {
        Current::Node(spec) => match key {
            "x" => spec.x = value.parse().unwrap_or(0.0),
            "y" => spec.y = value.parse().unwrap_or(0.0),
            "Obs" => spec.obs = value.chars().next(),
            "Label" => spec.label = Some(value.to_string()),
            "Potential" => spec.potential = Some(value.to_string()),
            _ => {}
        },
        Current::Edge(spec) => match key {
            "Type" => spec.kind = Some(value.to_string()),
            "Value" => spec.value = Some(value.to_string()),
            "LabeledValues" => spec.labeled_values = Some(value.to_string()),
            "LowerCaseLabeledValues" => spec.lower_case = Some(value.to_string()),
            "UpperCaseLabeledValues" => spec.upper_case = Some(value.to_string()),
            "LabeledValue" => spec.single_case = Some(value.to_string()),
            _ => {}
        },
        Current::None => {}
    }
}

fn build_graph(nodes: Vec<NodeSpec>, edges: Vec<EdgeSpec>) -> Result<TNGraph, TnError> {
    let mut graph = TNGraph::new();

    for spec in nodes {
        if spec.id.is_empty() {
            return Err(TnError::GraphmlParse("node without id".to_string()));
        }
        let mut node = Node::new(spec.id);
        node.x = spec.x;
        node.y = spec.y;
        if let Some(p) = spec.obs {
            node = node.observing(p);
        }
        if let Some(l) = spec.label {
            node.label = l.parse()?;
        }
        if let Some(p) = spec.potential {
            node.potential = p.parse()?;
        }
        graph.add_node(node)?;
    }

    for spec in edges {
        let source = graph
            .node_id(&spec.source)
            .ok_or_else(|| TnError::NodeNotFound(spec.source.clone()))?;
        let target = graph
            .node_id(&spec.target)
            .ok_or_else(|| TnError::NodeNotFound(spec.target.clone()))?;
        let name = if spec.id.is_empty() {
            format!("{}_{}", spec.source, spec.target)
        } else {
            spec.id.clone()
        };
        let kind = match &spec.kind {
            Some(k) => EdgeKind::from_str(k)?,
            None => EdgeKind::Requirement,
        };
        let mut edge = Edge::new(name, source, target, kind);

        if let Some(v) = &spec.value {
            edge.values.put(Label::empty(), parse_weight(v)?);
        }
        if let Some(lv) = &spec.labeled_values {
            let parsed: LabeledValueMap = lv.parse()?;
            edge.values.put_all(&parsed);
        }
        if let Some(uc) = &spec.upper_case {
            edge.upper = UpperCaseValueMap::parse(graph.alphabet_mut(), uc)?;
        }
        if let Some(lc) = &spec.lower_case {
            edge.lower = LowerCaseValue::parse(graph.alphabet_mut(), lc)?;
        }
        if let Some(sc) = &spec.single_case {
            apply_single_case(&mut graph, &mut edge, sc)?;
        }
        graph.add_edge(edge)?;
    }

    Ok(graph)
}

/// Apply a `LC(Name):int` / `UC(Name):int` single case value.
fn apply_single_case(graph: &mut TNGraph, edge: &mut Edge, s: &str) -> Result<(), TnError> {
    let t = s.trim();
    let (upper, rest) = if let Some(r) = t.strip_prefix("LC(") {
        (false, r)
    } else if let Some(r) = t.strip_prefix("UC(") {
        (true, r)
    } else {
        return Err(TnError::GraphmlParse(format!("malformed case value '{s}'")));
    };
    let (name, value_part) = rest
        .split_once("):")
        .ok_or_else(|| TnError::GraphmlParse(format!("malformed case value '{s}'")))?;
    let value = parse_weight(value_part)?;
    let case = ALabel::from_name(graph.alphabet_mut(), name.trim())?;
    if upper {
        edge.upper.put(case, Label::empty(), value)?;
    } else {
        edge.lower = Some(LowerCaseValue::new(case, Label::empty(), value));
    }
    Ok(())
}

// ── Writer ─────────────────────────────────────────────────────────────────

const NODE_KEYS: [(&str, &str); 5] = [
    ("x", "double"),
    ("y", "double"),
    ("Obs", "string"),
    ("Label", "string"),
    ("Potential", "string"),
];

const EDGE_KEYS: [(&str, &str); 6] = [
    ("Type", "string"),
    ("Value", "int"),
    ("LabeledValues", "string"),
    ("LowerCaseLabeledValues", "string"),
    ("UpperCaseLabeledValues", "string"),
    ("LabeledValue", "string"),
];

/// Render a graph as a GraphML document.
pub fn write_graphml(graph: &TNGraph) -> Result<String, TnError> {
    let mut w = quick_xml::Writer::new_with_indent(Vec::new(), b' ', 2);
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("graphml");
    root.push_attribute(("xmlns", "http://graphml.graphdrawing.org/xmlns"));
    w.write_event(Event::Start(root))?;

    for (name, ty) in NODE_KEYS {
        let mut key = BytesStart::new("key");
        key.push_attribute(("id", name));
        key.push_attribute(("for", "node"));
        key.push_attribute(("attr.name", name));
        key.push_attribute(("attr.type", ty));
        w.write_event(Event::Empty(key))?;
    }
    for (name, ty) in EDGE_KEYS {
        let mut key = BytesStart::new("key");
        key.push_attribute(("id", name));
        key.push_attribute(("for", "edge"));
        key.push_attribute(("attr.name", name));
        key.push_attribute(("attr.type", ty));
        w.write_event(Event::Empty(key))?;
    }

    let mut g = BytesStart::new("graph");
    g.push_attribute(("edgedefault", "directed"));
    w.write_event(Event::Start(g))?;

    let mut node_ids: Vec<_> = graph.nodes().map(|(id, _)| id).collect();
    node_ids.sort_by(|a, b| graph.node_name(*a).cmp(graph.node_name(*b)));
    for id in node_ids {
        let node = graph.node(id);
        let mut el = BytesStart::new("node");
        el.push_attribute(("id", node.name.as_str()));
        w.write_event(Event::Start(el))?;
        write_data(&mut w, "x", &node.x.to_string())?;
        write_data(&mut w, "y", &node.y.to_string())?;
        write_data(&mut w, "Label", &node.label.to_string())?;
        if let Some(p) = node.observed {
            write_data(&mut w, "Obs", &p.to_string())?;
        }
        if !node.potential.is_empty() {
            write_data(&mut w, "Potential", &node.potential.to_string())?;
        }
        w.write_event(Event::End(BytesEnd::new("node")))?;
    }

    for id in graph.edges_in_stable_order() {
        let Some(edge) = graph.edge(id) else { continue };
        let mut el = BytesStart::new("edge");
        el.push_attribute(("id", edge.name.as_str()));
        el.push_attribute(("source", graph.node_name(edge.source)));
        el.push_attribute(("target", graph.node_name(edge.target)));
        w.write_event(Event::Start(el))?;
        write_data(&mut w, "Type", edge.kind.as_str())?;
        if let Some(v) = edge.stn_value()
            && edge.values.len() == 1
        {
            write_data(&mut w, "Value", &format_weight(v))?;
        }
        if !edge.values.is_empty() {
            write_data(&mut w, "LabeledValues", &edge.values.to_string())?;
        }
        if !edge.upper.is_empty() {
            write_data(
                &mut w,
                "UpperCaseLabeledValues",
                &edge.upper.format(graph.alphabet()),
            )?;
        }
        if let Some(lc) = edge.lower {
            write_data(
                &mut w,
                "LowerCaseLabeledValues",
                &lc.format(graph.alphabet()),
            )?;
        }
        w.write_event(Event::End(BytesEnd::new("edge")))?;
    }

    w.write_event(Event::End(BytesEnd::new("graph")))?;
    w.write_event(Event::End(BytesEnd::new("graphml")))?;

    let bytes = w.into_inner();
    String::from_utf8(bytes)
        .map_err(|e| TnError::GraphmlParse(format!("generated non-utf8 output: {e}")))
}

/// Write a graph to a GraphML file.
pub fn write_graphml_file(graph: &TNGraph, path: &Path) -> Result<(), TnError> {
    let xml = write_graphml(graph)?;
    fs::write(path, xml)?;
    Ok(())
}

fn write_data<W: std::io::Write>(
    w: &mut quick_xml::Writer<W>,
    key: &str,
    value: &str,
) -> Result<(), TnError> {
    let mut el = BytesStart::new("data");
    el.push_attribute(("key", key));
    w.write_event(Event::Start(el))?;
    w.write_event(Event::Text(BytesText::new(value)))?;
    w.write_event(Event::End(BytesEnd::new("data")))?;
    Ok(())
}

/// Undo the three entities the writer can produce inside text content.
fn unescape_basic(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns">
  <key id="Obs" for="node" attr.name="Obs" attr.type="string"/>
  <graph edgedefault="directed">
    <node id="Z">
      <data key="x">0.0</data>
      <data key="y">0.0</data>
      <data key="Label">⊡</data>
    </node>
    <node id="P">
      <data key="Obs">p</data>
      <data key="Label">⊡</data>
    </node>
    <node id="X">
      <data key="Label">⊡</data>
    </node>
    <edge id="e1" source="Z" target="X">
      <data key="Type">requirement</data>
      <data key="LabeledValues">{(10, ⊡) }</data>
    </edge>
    <edge id="e2" source="X" target="Z">
      <data key="Type">requirement</data>
      <data key="LabeledValues">{(-5, p) (-8, ¬p) }</data>
    </edge>
  </graph>
</graphml>"#;

    #[test]
    fn test_read_sample() {
        let g = read_graphml(SAMPLE).unwrap();
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 2);
        let p = g.node_id("P").unwrap();
        assert_eq!(g.observer('p'), Some(p));
        let x = g.node_id("X").unwrap();
        let z = g.node_id("Z").unwrap();
        let e = g.find_edge(x, z).unwrap();
        let edge = g.edge(e).unwrap();
        assert_eq!(edge.values.get(&"p".parse().unwrap()), Some(-5));
        assert_eq!(edge.values.get(&"¬p".parse().unwrap()), Some(-8));
    }

    #[test]
    fn test_roundtrip_semantic_identity() {
        let g = read_graphml(SAMPLE).unwrap();
        let xml = write_graphml(&g).unwrap();
        let g2 = read_graphml(&xml).unwrap();
        assert_eq!(g.node_count(), g2.node_count());
        assert_eq!(g.edge_count(), g2.edge_count());
        for (id, n) in g.nodes() {
            let id2 = g2.node_id(&n.name).unwrap();
            assert_eq!(g2.node(id2).label, n.label);
            assert_eq!(g2.node(id2).observed, n.observed);
            let _ = id;
        }
        let x = g2.node_id("X").unwrap();
        let z = g2.node_id("Z").unwrap();
        let e = g2.find_edge(x, z).unwrap();
        assert_eq!(g2.edge(e).unwrap().values.get(&"¬p".parse().unwrap()), Some(-8));
    }

    #[test]
    fn test_stn_value_key() {
        let xml = r#"<graphml><graph>
          <node id="Z"><data key="Label">⊡</data></node>
          <node id="X"><data key="Label">⊡</data></node>
          <edge id="e" source="Z" target="X"><data key="Value">10</data></edge>
        </graph></graphml>"#;
        let g = read_graphml(xml).unwrap();
        let e = g
            .find_edge(g.node_id("Z").unwrap(), g.node_id("X").unwrap())
            .unwrap();
        assert_eq!(g.edge(e).unwrap().stn_value(), Some(10));
        // Written form exposes both Value and LabeledValues for a pure
        // unconditional weight.
        let out = write_graphml(&g).unwrap();
        assert!(out.contains("<data key=\"Value\">10</data>"));
    }

    #[test]
    fn test_single_case_values() {
        let xml = r#"<graphml><graph>
          <node id="A"><data key="Label">⊡</data></node>
          <node id="C"><data key="Label">⊡</data></node>
          <edge id="lc" source="A" target="C">
            <data key="Type">contingent</data>
            <data key="LabeledValue">LC(C):5</data>
          </edge>
          <edge id="uc" source="C" target="A">
            <data key="Type">contingent</data>
            <data key="LabeledValue">UC(C):-10</data>
          </edge>
        </graph></graphml>"#;
        let g = read_graphml(xml).unwrap();
        let a = g.node_id("A").unwrap();
        let c = g.node_id("C").unwrap();
        let lc = g.edge(g.find_edge(a, c).unwrap()).unwrap().lower.unwrap();
        assert_eq!(lc.value, 5);
        let uc_edge = g.edge(g.find_edge(c, a).unwrap()).unwrap();
        assert_eq!(uc_edge.upper.min_value(), Some(-10));
    }

    #[test]
    fn test_unknown_edge_endpoint_fails() {
        let xml = r#"<graphml><graph>
          <node id="A"><data key="Label">⊡</data></node>
          <edge id="e" source="A" target="B"/>
        </graph></graphml>"#;
        assert!(matches!(
            read_graphml(xml),
            Err(TnError::NodeNotFound(n)) if n == "B"
        ));
    }

    #[test]
    fn test_infinity_roundtrip() {
        let xml = r#"<graphml><graph>
          <node id="Z"><data key="Label">⊡</data></node>
          <node id="X"><data key="Label">⊡</data></node>
          <edge id="e" source="Z" target="X"><data key="LabeledValues">{(∞, ⊡) }</data></edge>
        </graph></graphml>"#;
        let g = read_graphml(xml).unwrap();
        let out = write_graphml(&g).unwrap();
        assert!(out.contains("∞"));
        let g2 = read_graphml(&out).unwrap();
        let e = g2
            .find_edge(g2.node_id("Z").unwrap(), g2.node_id("X").unwrap())
            .unwrap();
        assert_eq!(
            g2.edge(e).unwrap().stn_value(),
            Some(crate::arith::POS_INFINITY)
        );
    }
}
