mod error;
pub mod geometry;
pub(crate) mod ordering;
mod position;
pub(crate) mod ranking;
pub mod routing;
mod subgraphs;
pub mod text;
pub(crate) mod types;
pub use error::LayoutError;
pub use types::*;

use crate::config::LayoutOptions;
use crate::element::Element;
use crate::extract::extract_graph;
use crate::ir::LayoutGraph;

/// Runs the layered pipeline on a `<graph>` element tree: extraction,
/// ranking, ordering, coordinates, routing and cluster framing.
pub fn compute_layout(root: Option<&Element>, options: &LayoutOptions) -> Result<GraphLayout, LayoutError> {
    if !options.algorithm_is_supported() {
        tracing::error!(algorithm = %options.algorithm, "unknown layout algorithm");
        return Err(LayoutError::UnknownAlgorithm(options.algorithm.clone()));
    }
    let mut graph = extract_graph(root, options.font_size)?;
    ranking::assign_ranks(&mut graph);
    ordering::order_layers(&mut graph, options);
    position::assign_coordinates(&mut graph, options);
    routing::route_edges(&mut graph, options);
    let frames = subgraphs::bound_clusters(&graph);

    let mut layout = snapshot(&graph, frames, options);
    normalize_layout(&mut layout);
    Ok(layout)
}

fn snapshot(graph: &LayoutGraph, subgraphs: Vec<SubgraphPosition>, options: &LayoutOptions) -> GraphLayout {
    let nodes = graph
        .nodes
        .iter()
        .map(|node| NodePosition {
            id: node.id.clone(),
            label: node.label.clone(),
            shape: node.shape,
            fill: node.fill.clone(),
            stroke: node.stroke.clone(),
            x: node.x,
            y: node.y,
            width: node.width,
            height: node.height,
            rank: node.rank,
            order: node.order,
        })
        .collect();
    let edges = graph
        .edges
        .iter()
        .map(|edge| EdgePath {
            from_id: edge.from_id.clone(),
            to_id: edge.to_id.clone(),
            label: edge.label.clone(),
            points: edge.points.clone(),
            is_bezier: edge.is_bezier,
            directed: edge.directed,
            arrow_start: edge.arrow_start,
            arrow_end: edge.arrow_end,
            style: edge.style,
            is_back_edge: edge.is_back_edge,
        })
        .collect();
    GraphLayout {
        nodes,
        edges,
        subgraphs,
        width: 0.0,
        height: 0.0,
        algorithm: options.algorithm.trim().to_ascii_lowercase(),
        direction: options.direction,
        node_sep: options.node_sep,
        rank_sep: options.rank_sep,
        edge_sep: options.edge_sep,
        is_directed: graph.is_directed,
        kind: graph.kind.clone(),
    }
}

/// Shifts everything so the drawing's top-left corner is the origin and
/// records the overall size.
fn normalize_layout(layout: &mut GraphLayout) {
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    let mut include = |x0: f32, y0: f32, x1: f32, y1: f32| {
        min_x = min_x.min(x0);
        min_y = min_y.min(y0);
        max_x = max_x.max(x1);
        max_y = max_y.max(y1);
    };
    for node in &layout.nodes {
        let b = node.bbox();
        include(b.left(), b.top(), b.right(), b.bottom());
    }
    for sub in &layout.subgraphs {
        include(sub.x, sub.y, sub.x + sub.width, sub.y + sub.height);
    }
    // Back-edge lanes and curve controls can sit outside every node.
    for edge in &layout.edges {
        for p in &edge.points {
            include(p.x, p.y, p.x, p.y);
        }
    }
    if min_x > max_x || min_y > max_y {
        layout.width = 0.0;
        layout.height = 0.0;
        return;
    }

    for node in &mut layout.nodes {
        node.x -= min_x;
        node.y -= min_y;
    }
    for sub in &mut layout.subgraphs {
        sub.x -= min_x;
        sub.y -= min_y;
    }
    for edge in &mut layout.edges {
        for p in &mut edge.points {
            p.x -= min_x;
            p.y -= min_y;
        }
    }
    layout.width = max_x - min_x;
    layout.height = max_y - min_y;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Direction, NodeShape, Point};

    fn layout(xml: &str, options: &LayoutOptions) -> GraphLayout {
        let root = Element::parse_xml(xml).unwrap();
        compute_layout(Some(&root), options).unwrap()
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let options = LayoutOptions {
            algorithm: "force".into(),
            ..LayoutOptions::default()
        };
        let root = Element::new("graph");
        assert_eq!(
            compute_layout(Some(&root), &options),
            Err(LayoutError::UnknownAlgorithm("force".into()))
        );
    }

    #[test]
    fn missing_root_is_invalid_input() {
        assert_eq!(
            compute_layout(None, &LayoutOptions::default()),
            Err(LayoutError::InvalidInput)
        );
    }

    #[test]
    fn empty_graph_has_zero_size() {
        let result = layout("<graph/>", &LayoutOptions::default());
        assert!(result.is_empty());
        assert_eq!((result.width, result.height), (0.0, 0.0));
    }

    #[test]
    fn single_diamond_fills_the_layout() {
        let result = layout(
            r#"<graph directed="true"><node id="A" shape="diamond" width="60" height="40"/></graph>"#,
            &LayoutOptions::default(),
        );
        assert_eq!((result.width, result.height), (60.0, 40.0));
        let a = &result.nodes[0];
        assert_eq!(a.shape, NodeShape::Diamond);
        assert_eq!((a.x, a.y), (30.0, 20.0));
    }

    #[test]
    fn two_node_edge_runs_between_facing_sides() {
        let result = layout(
            r#"<graph><node id="A"/><node id="B"/><edge from="A" to="B"/></graph>"#,
            &LayoutOptions::default(),
        );
        let (a, b) = (result.node("A").unwrap(), result.node("B").unwrap());
        assert_eq!((a.rank, b.rank), (0, 1));
        assert_eq!((a.x, a.y), (40.0, 20.0));
        assert_eq!((b.x, b.y), (40.0, 140.0));
        let points = &result.edges[0].points;
        assert_eq!(points.len(), 2);
        assert!(points[0].distance(Point::new(40.0, 40.0)) < 0.01);
        assert!(points[1].distance(Point::new(40.0, 120.0)) < 0.01);
        assert_eq!(result.height, 160.0);
    }

    #[test]
    fn rerouting_is_stable() {
        let root = Element::parse_xml(
            r#"<graph><node id="A" shape="diamond"/><node id="B" shape="circle"/><node id="C"/>
               <edge from="A" to="B"/><edge from="A" to="C"/><edge from="C" to="A"/></graph>"#,
        )
        .unwrap();
        let options = LayoutOptions::default();
        let mut graph = extract_graph(Some(&root), options.font_size).unwrap();
        ranking::assign_ranks(&mut graph);
        ordering::order_layers(&mut graph, &options);
        position::assign_coordinates(&mut graph, &options);
        routing::route_edges(&mut graph, &options);
        let first: Vec<Vec<Point>> = graph.edges.iter().map(|e| e.points.clone()).collect();
        routing::route_edges(&mut graph, &options);
        for (edge, before) in graph.edges.iter().zip(&first) {
            assert_eq!(edge.points.len(), before.len());
            for (a, b) in edge.points.iter().zip(before) {
                assert!(a.distance(*b) < 0.01);
            }
        }
    }

    #[test]
    fn splines_produce_bezier_points() {
        let options = LayoutOptions {
            use_splines: true,
            ..LayoutOptions::default()
        };
        let result = layout(
            r#"<graph><node id="A"/><node id="B"/><node id="C"/>
               <edge from="A" to="B"/><edge from="A" to="C"/></graph>"#,
            &options,
        );
        for edge in &result.edges {
            assert!(edge.is_bezier);
            assert_eq!((edge.points.len() - 1) % 3, 0);
        }
    }

    #[test]
    fn echoes_options() {
        let options = LayoutOptions {
            algorithm: "Dot".into(),
            direction: Direction::RightLeft,
            ..LayoutOptions::default()
        };
        let result = layout(r#"<graph type="undirected"><node id="A"/></graph>"#, &options);
        assert_eq!(result.algorithm, "dot");
        assert_eq!(result.direction, Direction::RightLeft);
        assert_eq!(result.node_sep, 60.0);
        assert!(!result.is_directed);
    }

    #[test]
    fn layout_is_deterministic() {
        let xml = r#"<graph>
            <subgraph id="g"><node id="A"/><node id="B" shape="circle"/></subgraph>
            <node id="C" shape="hexagon"/><node id="D"/>
            <edge from="A" to="C"/><edge from="B" to="C"/><edge from="C" to="D"/>
            <edge from="D" to="A"/><edge from="A" to="D"/>
        </graph>"#;
        let first = layout(xml, &LayoutOptions::default());
        let second = layout(xml, &LayoutOptions::default());
        assert_eq!(first, second);
    }
}
