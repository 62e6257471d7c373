//! Stage A: walk an input [`Element`] tree and build the internal
//! [`LayoutGraph`].
//!
//! Attributes are read exactly once here and converted into typed slots;
//! nothing downstream looks at attribute strings again.

use crate::element::Element;
use crate::ir::{
    ClusterId, DEFAULT_CLUSTER_LABEL_HEIGHT, DEFAULT_CLUSTER_PADDING, DEFAULT_NODE_WIDTH,
    Direction, EdgeStyle, LayoutEdge, LayoutGraph, LayoutSubgraph, NodeShape,
};
use crate::layout::LayoutError;
use crate::layout::text::fitted_node_width;

const TAG_GRAPH: &str = "graph";
const TAG_NODE: &str = "node";
const TAG_EDGE: &str = "edge";
const TAG_SUBGRAPH: &str = "subgraph";

/// Builds a [`LayoutGraph`] from `root`. `font_size` drives label-based
/// node widening when no explicit width is given.
pub fn extract_graph(root: Option<&Element>, font_size: f32) -> Result<LayoutGraph, LayoutError> {
    let Some(root) = root else {
        tracing::error!("layout called without a root element");
        return Err(LayoutError::InvalidInput);
    };
    if root.tag != TAG_GRAPH {
        tracing::error!(tag = %root.tag, "unexpected root element");
        return Err(LayoutError::UnexpectedRoot(root.tag.clone()));
    }

    let mut graph = LayoutGraph::new();
    graph.is_directed = root
        .attr_bool("directed")
        .or_else(|| root.attr_str("type").map(|t| t != "undirected"))
        .unwrap_or(true);
    graph.kind = root.attr_str("type").unwrap_or_else(|| {
        if graph.is_directed { "directed" } else { "undirected" }.to_string()
    });

    let mut sizing = Vec::new();
    collect_nodes(root, &mut graph, None, &mut sizing);
    sync_members(&mut graph);
    for (node_id, explicit_width) in sizing {
        let node = graph.node_mut(node_id);
        if !explicit_width {
            node.width = fitted_node_width(&node.label, font_size, DEFAULT_NODE_WIDTH);
        }
    }
    collect_edges(root, &mut graph);

    for (idx, cluster) in graph.clusters.iter().enumerate() {
        if cluster.members.is_empty() {
            tracing::debug!(cluster = %cluster.id, index = idx, "empty subgraph");
        }
    }
    tracing::debug!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        clusters = graph.clusters.len(),
        "extracted graph"
    );
    Ok(graph)
}

type Sizing = Vec<(crate::ir::NodeId, bool)>;

/// Pass 1: nodes and clusters at every depth.
fn collect_nodes(
    parent_el: &Element,
    graph: &mut LayoutGraph,
    parent: Option<ClusterId>,
    sizing: &mut Sizing,
) {
    for child in &parent_el.children {
        match child.tag.as_str() {
            TAG_NODE => read_node(child, graph, parent, sizing),
            TAG_SUBGRAPH => {
                let cluster = read_cluster_header(child, graph, parent);
                collect_nodes(child, graph, Some(cluster), sizing);
            }
            TAG_EDGE => {}
            other => {
                tracing::debug!(tag = other, "ignoring unknown element");
            }
        }
    }
}

/// Rebuilds every cluster's transitive member list from the final node
/// placement, so a node moved by a later declaration leaves its old
/// cluster.
fn sync_members(graph: &mut LayoutGraph) {
    for cluster in &mut graph.clusters {
        cluster.members.clear();
    }
    for node in &graph.nodes {
        for cluster in &node.clusters {
            graph.clusters[cluster.0].members.push(node.id.clone());
        }
    }
}

fn read_node(
    el: &Element,
    graph: &mut LayoutGraph,
    parent: Option<ClusterId>,
    sizing: &mut Sizing,
) {
    let id = match el.attr_str("id") {
        Some(id) => id,
        None => {
            tracing::warn!("node without id");
            String::new()
        }
    };
    let (handle, created) = graph.ensure_node(&id);

    // Cluster path: parents first, then `parent` itself.
    let mut path = Vec::new();
    let mut cursor = parent;
    while let Some(cluster) = cursor {
        path.push(cluster);
        cursor = graph.clusters[cluster.0].parent;
    }
    path.reverse();

    let node = graph.node_mut(handle);
    if let Some(label) = el.attr_str("label") {
        node.label = label;
    }
    if let Some(shape) = el.attr_str("shape") {
        node.shape = match NodeShape::from_token(&shape) {
            Some(shape) => shape,
            None => {
                tracing::warn!(node = %id, shape = %shape, "unknown shape, using box");
                NodeShape::Box
            }
        };
    }
    if let Some(fill) = el.attr_str("fill") {
        node.fill = Some(fill);
    }
    if let Some(stroke) = el.attr_str("stroke") {
        node.stroke = Some(stroke);
    }
    let width = el.attr_f32("width").filter(|w| w.is_finite() && *w > 0.0);
    if let Some(width) = width {
        node.width = width;
    }
    if let Some(height) = el.attr_f32("height").filter(|h| h.is_finite() && *h > 0.0) {
        node.height = height;
    }
    // A re-declaration inside a deeper subgraph moves the node there.
    if path.len() >= node.clusters.len() {
        node.clusters = path;
    }

    if created {
        sizing.push((handle, width.is_some()));
    } else if width.is_some()
        && let Some(slot) = sizing.iter_mut().find(|(h, _)| *h == handle)
    {
        slot.1 = true;
    }
}

fn read_cluster_header(el: &Element, graph: &mut LayoutGraph, parent: Option<ClusterId>) -> ClusterId {
    let id = el
        .attr_str("id")
        .unwrap_or_else(|| format!("subgraph{}", graph.clusters.len()));
    let label = el.attr_str("label").unwrap_or_else(|| id.clone());
    let direction = el.attr_str("direction").and_then(|token| {
        let parsed = Direction::from_token(&token);
        if parsed.is_none() {
            tracing::warn!(subgraph = %id, direction = %token, "unknown subgraph direction");
        }
        parsed
    });
    graph.add_cluster(LayoutSubgraph {
        id,
        label,
        direction,
        members: Vec::new(),
        children: Vec::new(),
        parent,
        padding: el
            .attr_f32("padding")
            .filter(|p| p.is_finite() && *p >= 0.0)
            .unwrap_or(DEFAULT_CLUSTER_PADDING),
        label_height: el
            .attr_f32("label-height")
            .filter(|h| h.is_finite() && *h >= 0.0)
            .unwrap_or(DEFAULT_CLUSTER_LABEL_HEIGHT),
        fill: el.attr_str("fill"),
        stroke: el.attr_str("stroke"),
    })
}

/// Pass 2: edges at every depth, linked through the id index.
fn collect_edges(parent_el: &Element, graph: &mut LayoutGraph) {
    for child in &parent_el.children {
        match child.tag.as_str() {
            TAG_EDGE => read_edge(child, graph),
            TAG_SUBGRAPH => collect_edges(child, graph),
            _ => {}
        }
    }
}

fn read_edge(el: &Element, graph: &mut LayoutGraph) {
    let from_id = el.attr_str("from").unwrap_or_default();
    let to_id = el.attr_str("to").unwrap_or_default();
    let (Some(from), Some(to)) = (graph.node_id(&from_id), graph.node_id(&to_id)) else {
        tracing::warn!(from = %from_id, to = %to_id, "dropping edge with missing endpoint");
        return;
    };
    let style = match el.attr_str("style") {
        Some(token) => EdgeStyle::from_token(&token).unwrap_or_else(|| {
            tracing::warn!(style = %token, "unknown edge style, using solid");
            EdgeStyle::Solid
        }),
        None => EdgeStyle::Solid,
    };
    let directed = graph.is_directed;
    graph.add_edge(LayoutEdge {
        from_id,
        to_id,
        from,
        to,
        label: el.attr_str("label").filter(|l| !l.is_empty()),
        style,
        arrow_start: el.attr_bool("arrow-start").unwrap_or(false),
        arrow_end: el.attr_bool("arrow-end").unwrap_or(directed),
        directed,
        is_back_edge: false,
        waypoints: Vec::new(),
        points: Vec::new(),
        is_bezier: false,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::NodeId;

    fn parse(xml: &str) -> LayoutGraph {
        let root = Element::parse_xml(xml).unwrap();
        extract_graph(Some(&root), 14.0).unwrap()
    }

    #[test]
    fn null_root_is_invalid_input() {
        assert_eq!(extract_graph(None, 14.0).unwrap_err(), LayoutError::InvalidInput);
    }

    #[test]
    fn wrong_root_tag_is_rejected() {
        let root = Element::new("svg");
        assert!(matches!(
            extract_graph(Some(&root), 14.0),
            Err(LayoutError::UnexpectedRoot(_))
        ));
    }

    #[test]
    fn empty_graph_extracts_cleanly() {
        let graph = parse("<graph/>");
        assert!(graph.nodes.is_empty());
        assert!(graph.edges.is_empty());
        assert!(graph.is_directed);
    }

    #[test]
    fn node_defaults_apply() {
        let graph = parse(r#"<graph><node id="A"/><node id="B" label="Beta" shape="diamond" width="60" height="30"/></graph>"#);
        let a = graph.node(NodeId(0));
        assert_eq!(a.label, "A");
        assert_eq!(a.shape, NodeShape::Box);
        assert_eq!((a.width, a.height), (80.0, 40.0));
        let b = graph.node(NodeId(1));
        assert_eq!(b.label, "Beta");
        assert_eq!(b.shape, NodeShape::Diamond);
        assert_eq!((b.width, b.height), (60.0, 30.0));
    }

    #[test]
    fn unknown_shape_falls_back_to_box() {
        let graph = parse(r#"<graph><node id="A" shape="blob"/></graph>"#);
        assert_eq!(graph.node(NodeId(0)).shape, NodeShape::Box);
    }

    #[test]
    fn long_labels_widen_unsized_nodes() {
        let graph = parse(r#"<graph><node id="A" label="a label that is much longer than eighty pixels"/></graph>"#);
        assert!(graph.node(NodeId(0)).width > 80.0);
    }

    #[test]
    fn dangling_edges_are_dropped() {
        let graph = parse(r#"<graph><node id="A"/><edge from="A" to="Z"/><edge from="A" to="A"/></graph>"#);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.node(NodeId(0)).out_edges.len(), 1);
    }

    #[test]
    fn edges_link_nodes_declared_later_and_in_subgraphs() {
        let graph = parse(
            r#"<graph>
                <edge from="A" to="B" label="go" style="dotted" arrow-start="true"/>
                <node id="A"/>
                <subgraph id="s"><node id="B"/></subgraph>
            </graph>"#,
        );
        assert_eq!(graph.edges.len(), 1);
        let edge = &graph.edges[0];
        assert_eq!(edge.label.as_deref(), Some("go"));
        assert_eq!(edge.style, EdgeStyle::Dotted);
        assert!(edge.arrow_start);
        assert!(edge.arrow_end);
        assert!(edge.directed);
    }

    #[test]
    fn undirected_graph_defaults_arrow_end_off() {
        let graph = parse(r#"<graph directed="false"><node id="A"/><node id="B"/><edge from="A" to="B"/></graph>"#);
        assert!(!graph.is_directed);
        assert!(!graph.edges[0].arrow_end);
        assert!(!graph.edges[0].directed);
    }

    #[test]
    fn type_attribute_controls_directedness() {
        let graph = parse(r#"<graph type="undirected"><node id="A"/></graph>"#);
        assert!(!graph.is_directed);
        assert_eq!(graph.kind, "undirected");
    }

    #[test]
    fn nested_subgraphs_collect_transitive_members() {
        let graph = parse(
            r#"<graph>
                <subgraph id="outer" label="Outer">
                    <subgraph id="inner" direction="LR">
                        <node id="A"/><node id="B"/>
                    </subgraph>
                    <node id="C"/>
                </subgraph>
                <node id="D"/>
            </graph>"#,
        );
        assert_eq!(graph.clusters.len(), 2);
        let outer = &graph.clusters[0];
        let inner = &graph.clusters[1];
        assert_eq!(outer.label, "Outer");
        assert_eq!(outer.members, vec!["A", "B", "C"]);
        assert_eq!(outer.children, vec![ClusterId(1)]);
        assert_eq!(inner.members, vec!["A", "B"]);
        assert_eq!(inner.parent, Some(ClusterId(0)));
        assert_eq!(inner.direction, Some(Direction::LeftRight));
        assert_eq!(inner.padding, 15.0);
        assert_eq!(inner.label_height, 20.0);
        let a = graph.node_id("A").unwrap();
        assert_eq!(graph.node(a).clusters, vec![ClusterId(0), ClusterId(1)]);
        assert_eq!(graph.roots, vec![ClusterId(0)]);
    }

    #[test]
    fn redeclared_node_merges_attributes() {
        let graph = parse(
            r#"<graph>
                <node id="A" label="Alpha" width="100"/>
                <subgraph id="s"><node id="A" shape="circle"/></subgraph>
            </graph>"#,
        );
        assert_eq!(graph.nodes.len(), 1);
        let a = graph.node(NodeId(0));
        assert_eq!(a.label, "Alpha");
        assert_eq!(a.shape, NodeShape::Circle);
        assert_eq!(a.width, 100.0);
        assert_eq!(a.clusters, vec![ClusterId(0)]);
        assert_eq!(graph.clusters[0].members, vec!["A"]);
    }

    #[test]
    fn moved_node_leaves_its_first_subgraph() {
        let graph = parse(
            r#"<graph>
                <subgraph id="s1"><node id="A"/><node id="B"/></subgraph>
                <subgraph id="s2"><node id="A"/></subgraph>
            </graph>"#,
        );
        let a = graph.node(graph.node_id("A").unwrap());
        assert_eq!(a.clusters, vec![ClusterId(1)]);
        assert_eq!(graph.clusters[0].members, vec!["B"]);
        assert_eq!(graph.clusters[1].members, vec!["A"]);
        for node in &graph.nodes {
            for cluster in &graph.clusters {
                let listed = cluster.members.contains(&node.id);
                let placed = node.clusters.iter().any(|c| graph.clusters[c.0].id == cluster.id);
                assert_eq!(listed, placed, "{} in {}", node.id, cluster.id);
            }
        }
    }

    #[test]
    fn non_finite_sizes_are_ignored() {
        let graph = parse(r#"<graph><node id="A" width="inf" height="NaN"/><subgraph id="s" padding="inf"><node id="B"/></subgraph></graph>"#);
        let a = graph.node(NodeId(0));
        assert_eq!((a.width, a.height), (80.0, 40.0));
        assert_eq!(graph.clusters[0].padding, DEFAULT_CLUSTER_PADDING);
    }
}
