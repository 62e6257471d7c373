use serde::Serialize;

use crate::ir::{Direction, EdgeStyle, NodeShape, Point};

use super::geometry::{NodeBox, Outline, outline};

/// Immutable per-node snapshot. `x`/`y` are the center.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodePosition {
    pub id: String,
    pub label: String,
    pub shape: NodeShape,
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub rank: usize,
    pub order: usize,
}

impl NodePosition {
    pub fn bbox(&self) -> NodeBox {
        NodeBox::new(self.x, self.y, self.width, self.height)
    }

    pub fn outline(&self) -> Outline {
        outline(self.shape, &self.bbox())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgePath {
    pub from_id: String,
    pub to_id: String,
    pub label: Option<String>,
    /// Polyline vertices, or `[P0, C1, C2, P1, ...]` when `is_bezier`.
    pub points: Vec<Point>,
    pub is_bezier: bool,
    pub directed: bool,
    pub arrow_start: bool,
    pub arrow_end: bool,
    pub style: EdgeStyle,
    pub is_back_edge: bool,
}

impl EdgePath {
    /// Point halfway along the drawn path, by arc length over the
    /// vertices (control points included for curves).
    pub fn midpoint(&self) -> Option<Point> {
        let total: f32 = self.points.windows(2).map(|w| w[0].distance(w[1])).sum();
        let mut remaining = total / 2.0;
        for pair in self.points.windows(2) {
            let len = pair[0].distance(pair[1]);
            if len >= remaining && len > 0.0 {
                let t = remaining / len;
                return Some(Point::new(
                    pair[0].x + (pair[1].x - pair[0].x) * t,
                    pair[0].y + (pair[1].y - pair[0].y) * t,
                ));
            }
            remaining -= len;
        }
        self.points.first().copied()
    }
}

/// Cluster frame; `x`/`y` are the top-left corner and the label band is
/// the top `label_height` pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubgraphPosition {
    pub id: String,
    pub label: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub label_height: f32,
    pub padding: f32,
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub depth: usize,
    pub direction: Option<Direction>,
    pub members: Vec<String>,
}

/// Result of a layout call, in content-local coordinates (top-left at 0,0).
///
/// Canvas padding is not part of these coordinates. The SVG renderer adds
/// it with a `translate(padding, padding)` group, so a lone 80x40 node sits
/// at (40, 20) here and at (60, 40) on a canvas padded by 20.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphLayout {
    pub nodes: Vec<NodePosition>,
    pub edges: Vec<EdgePath>,
    pub subgraphs: Vec<SubgraphPosition>,
    pub width: f32,
    pub height: f32,
    pub algorithm: String,
    pub direction: Direction,
    pub node_sep: f32,
    pub rank_sep: f32,
    pub edge_sep: f32,
    pub is_directed: bool,
    pub kind: String,
}

impl GraphLayout {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&NodePosition> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn subgraph(&self, id: &str) -> Option<&SubgraphPosition> {
        self.subgraphs.iter().find(|s| s.id == id)
    }
}
