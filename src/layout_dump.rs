use crate::layout::GraphLayout;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Flattened view of a layout for regression diffs. Points are `[x, y]`
/// pairs so the JSON stays compact.
#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub algorithm: String,
    pub direction: String,
    pub width: f32,
    pub height: f32,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
    pub subgraphs: Vec<SubgraphDump>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: String,
    pub shape: String,
    pub rank: usize,
    pub order: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Serialize)]
pub struct EdgeDump {
    pub from: String,
    pub to: String,
    pub back_edge: bool,
    pub bezier: bool,
    pub points: Vec<[f32; 2]>,
}

#[derive(Debug, Serialize)]
pub struct SubgraphDump {
    pub id: String,
    pub depth: usize,
    pub members: Vec<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl LayoutDump {
    pub fn from_layout(layout: &GraphLayout) -> Self {
        let nodes = layout
            .nodes
            .iter()
            .map(|node| NodeDump {
                id: node.id.clone(),
                shape: node.shape.as_token().to_string(),
                rank: node.rank,
                order: node.order,
                x: node.x,
                y: node.y,
                width: node.width,
                height: node.height,
            })
            .collect();
        let edges = layout
            .edges
            .iter()
            .map(|edge| EdgeDump {
                from: edge.from_id.clone(),
                to: edge.to_id.clone(),
                back_edge: edge.is_back_edge,
                bezier: edge.is_bezier,
                points: edge.points.iter().map(|p| [p.x, p.y]).collect(),
            })
            .collect();
        let subgraphs = layout
            .subgraphs
            .iter()
            .map(|sub| SubgraphDump {
                id: sub.id.clone(),
                depth: sub.depth,
                members: sub.members.clone(),
                x: sub.x,
                y: sub.y,
                width: sub.width,
                height: sub.height,
            })
            .collect();
        Self {
            algorithm: layout.algorithm.clone(),
            direction: layout.direction.as_token().to_string(),
            width: layout.width,
            height: layout.height,
            nodes,
            edges,
            subgraphs,
        }
    }
}

pub fn to_json(layout: &GraphLayout) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&LayoutDump::from_layout(layout))
}

pub fn write_layout_dump(path: &Path, layout: &GraphLayout) -> anyhow::Result<()> {
    let dump = LayoutDump::from_layout(layout);
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &dump)?;
    tracing::debug!(path = %path.display(), nodes = dump.nodes.len(), "wrote layout dump");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutOptions;
    use crate::element::Element;
    use crate::layout::compute_layout;

    #[test]
    fn dump_lists_ranks_and_points() {
        let root = Element::parse_xml(
            r#"<graph><node id="A" shape="circle"/><node id="B"/><edge from="A" to="B"/></graph>"#,
        )
        .unwrap();
        let layout = compute_layout(Some(&root), &LayoutOptions::default()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&to_json(&layout).unwrap()).unwrap();
        assert_eq!(json["algorithm"], "dagre");
        assert_eq!(json["direction"], "TB");
        assert_eq!(json["nodes"][0]["shape"], "circle");
        assert_eq!(json["nodes"][1]["rank"], 1);
        assert_eq!(json["edges"][0]["points"].as_array().unwrap().len(), 2);
        assert_eq!(json["edges"][0]["back_edge"], false);
    }
}
