use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "TB", alias = "TD")]
    TopDown,
    #[serde(rename = "LR")]
    LeftRight,
    #[serde(rename = "BT")]
    BottomTop,
    #[serde(rename = "RL")]
    RightLeft,
}

impl Direction {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "TD" | "TB" => Some(Self::TopDown),
            "LR" => Some(Self::LeftRight),
            "BT" => Some(Self::BottomTop),
            "RL" => Some(Self::RightLeft),
            _ => None,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Self::TopDown => "TB",
            Self::LeftRight => "LR",
            Self::BottomTop => "BT",
            Self::RightLeft => "RL",
        }
    }

    /// Ranks grow along the x axis.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::LeftRight | Self::RightLeft)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeShape {
    #[default]
    Box,
    Circle,
    Ellipse,
    Diamond,
    Stadium,
    Hexagon,
    Triangle,
    Cylinder,
    Trapezoid,
    InvTrapezoid,
    Subroutine,
    DoubleCircle,
    Asymmetric,
}

impl NodeShape {
    pub fn from_token(token: &str) -> Option<Self> {
        let shape = match token.trim().to_ascii_lowercase().as_str() {
            "box" | "rect" | "rectangle" | "square" => Self::Box,
            "circle" => Self::Circle,
            "ellipse" | "oval" => Self::Ellipse,
            "diamond" | "rhombus" | "decision" => Self::Diamond,
            "stadium" | "rounded" | "pill" => Self::Stadium,
            "hexagon" => Self::Hexagon,
            "triangle" => Self::Triangle,
            "cylinder" | "database" | "db" => Self::Cylinder,
            "trapezoid" => Self::Trapezoid,
            "inv_trapezoid" | "inv-trapezoid" | "trapezoid-alt" => Self::InvTrapezoid,
            "subroutine" => Self::Subroutine,
            "double_circle" | "double-circle" | "doublecircle" => Self::DoubleCircle,
            "asymmetric" | "flag" => Self::Asymmetric,
            _ => return None,
        };
        Some(shape)
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Self::Box => "box",
            Self::Circle => "circle",
            Self::Ellipse => "ellipse",
            Self::Diamond => "diamond",
            Self::Stadium => "stadium",
            Self::Hexagon => "hexagon",
            Self::Triangle => "triangle",
            Self::Cylinder => "cylinder",
            Self::Trapezoid => "trapezoid",
            Self::InvTrapezoid => "inv_trapezoid",
            Self::Subroutine => "subroutine",
            Self::DoubleCircle => "double_circle",
            Self::Asymmetric => "asymmetric",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStyle {
    #[default]
    Solid,
    Dotted,
    Thick,
}

impl EdgeStyle {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "solid" | "normal" => Some(Self::Solid),
            "dotted" | "dashed" => Some(Self::Dotted),
            "thick" | "bold" => Some(Self::Thick),
            _ => None,
        }
    }
}

/// Index of a node in [`LayoutGraph::nodes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Index of an edge in [`LayoutGraph::edges`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub usize);

/// Index of a cluster in [`LayoutGraph::clusters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub id: String,
    pub label: String,
    pub shape: NodeShape,
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub width: f32,
    pub height: f32,
    /// Center.
    pub x: f32,
    pub y: f32,
    pub rank: usize,
    pub order: usize,
    pub in_edges: Vec<EdgeId>,
    pub out_edges: Vec<EdgeId>,
    /// Enclosing clusters, outermost first.
    pub clusters: Vec<ClusterId>,
}

impl LayoutNode {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            label: id.to_string(),
            shape: NodeShape::Box,
            fill: None,
            stroke: None,
            width: DEFAULT_NODE_WIDTH,
            height: DEFAULT_NODE_HEIGHT,
            x: 0.0,
            y: 0.0,
            rank: 0,
            order: 0,
            in_edges: Vec::new(),
            out_edges: Vec::new(),
            clusters: Vec::new(),
        }
    }
}

pub const DEFAULT_NODE_WIDTH: f32 = 80.0;
pub const DEFAULT_NODE_HEIGHT: f32 = 40.0;
pub const DEFAULT_CLUSTER_PADDING: f32 = 15.0;
pub const DEFAULT_CLUSTER_LABEL_HEIGHT: f32 = 20.0;

#[derive(Debug, Clone)]
pub struct LayoutEdge {
    pub from_id: String,
    pub to_id: String,
    pub from: NodeId,
    pub to: NodeId,
    pub label: Option<String>,
    pub style: EdgeStyle,
    pub arrow_start: bool,
    pub arrow_end: bool,
    pub directed: bool,
    pub is_back_edge: bool,
    /// Intermediate control points in source-to-target order: waypoint
    /// centers for long edges, lane corners for back-edges.
    pub waypoints: Vec<Point>,
    pub points: Vec<Point>,
    pub is_bezier: bool,
}

#[derive(Debug, Clone)]
pub struct LayoutSubgraph {
    pub id: String,
    pub label: String,
    pub direction: Option<Direction>,
    /// Transitive members in node creation order, rebuilt from each
    /// node's final cluster path.
    pub members: Vec<String>,
    pub children: Vec<ClusterId>,
    pub parent: Option<ClusterId>,
    pub padding: f32,
    pub label_height: f32,
    pub fill: Option<String>,
    pub stroke: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    pub fn empty() -> Self {
        Self {
            min_x: f32::MAX,
            min_y: f32::MAX,
            max_x: f32::MIN,
            max_y: f32::MIN,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn include_point(&mut self, x: f32, y: f32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn include_box(&mut self, cx: f32, cy: f32, width: f32, height: f32) {
        self.include_point(cx - width / 2.0, cy - height / 2.0);
        self.include_point(cx + width / 2.0, cy + height / 2.0);
    }

    pub fn width(&self) -> f32 {
        if self.is_empty() { 0.0 } else { self.max_x - self.min_x }
    }

    pub fn height(&self) -> f32 {
        if self.is_empty() { 0.0 } else { self.max_y - self.min_y }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LayoutGraph {
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<LayoutEdge>,
    /// Vertex ids per rank, filled by ranking/ordering. Vertices below
    /// `nodes.len()` are real nodes, the rest index `dummies`.
    pub layers: Vec<Vec<usize>>,
    /// Left-to-right sequence of each rank with cluster frame edges in
    /// place, filled once ordering is final.
    pub slots: Vec<Vec<Slot>>,
    pub dummies: Vec<Dummy>,
    /// Flat cluster arena; `roots` lists top-level clusters.
    pub clusters: Vec<LayoutSubgraph>,
    pub roots: Vec<ClusterId>,
    pub is_directed: bool,
    pub kind: String,
    pub bounds: Bounds,
    index: HashMap<String, NodeId>,
}

/// One entry of a rank's final sequence. Every cluster whose rank span
/// covers the row appears as `Open .. Close`, empty when it has no vertex
/// on that row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Vertex(usize),
    Open(ClusterId),
    Close(ClusterId),
}

/// An invisible rank-bound vertex carrying a long edge through one rank.
#[derive(Debug, Clone)]
pub struct Dummy {
    pub edge: EdgeId,
    pub rank: usize,
    pub order: usize,
    pub x: f32,
    pub y: f32,
    pub clusters: Vec<ClusterId>,
}

impl LayoutGraph {
    pub fn new() -> Self {
        Self {
            is_directed: true,
            kind: "directed".to_string(),
            bounds: Bounds::empty(),
            ..Default::default()
        }
    }

    pub fn node_id(&self, id: &str) -> Option<NodeId> {
        self.index.get(id).copied()
    }

    pub fn node(&self, id: NodeId) -> &LayoutNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut LayoutNode {
        &mut self.nodes[id.0]
    }

    /// Returns the existing node with `id` or appends a fresh one.
    pub fn ensure_node(&mut self, id: &str) -> (NodeId, bool) {
        if let Some(existing) = self.index.get(id) {
            return (*existing, false);
        }
        let handle = NodeId(self.nodes.len());
        self.nodes.push(LayoutNode::new(id));
        self.index.insert(id.to_string(), handle);
        (handle, true)
    }

    pub fn add_edge(&mut self, mut edge: LayoutEdge) -> EdgeId {
        let handle = EdgeId(self.edges.len());
        edge.waypoints.clear();
        edge.points.clear();
        self.nodes[edge.from.0].out_edges.push(handle);
        self.nodes[edge.to.0].in_edges.push(handle);
        self.edges.push(edge);
        handle
    }

    pub fn add_cluster(&mut self, cluster: LayoutSubgraph) -> ClusterId {
        let handle = ClusterId(self.clusters.len());
        match cluster.parent {
            Some(parent) => self.clusters[parent.0].children.push(handle),
            None => self.roots.push(handle),
        }
        self.clusters.push(cluster);
        handle
    }

    pub fn vertex_count(&self) -> usize {
        self.nodes.len() + self.dummies.len()
    }

    pub fn is_dummy(&self, vertex: usize) -> bool {
        vertex >= self.nodes.len()
    }

    pub fn vertex_rank(&self, vertex: usize) -> usize {
        if self.is_dummy(vertex) {
            self.dummies[vertex - self.nodes.len()].rank
        } else {
            self.nodes[vertex].rank
        }
    }

    pub fn vertex_order(&self, vertex: usize) -> usize {
        if self.is_dummy(vertex) {
            self.dummies[vertex - self.nodes.len()].order
        } else {
            self.nodes[vertex].order
        }
    }

    pub fn set_vertex_order(&mut self, vertex: usize, order: usize) {
        let n = self.nodes.len();
        if vertex >= n {
            self.dummies[vertex - n].order = order;
        } else {
            self.nodes[vertex].order = order;
        }
    }

    pub fn vertex_position(&self, vertex: usize) -> Point {
        let n = self.nodes.len();
        if vertex >= n {
            let d = &self.dummies[vertex - n];
            Point::new(d.x, d.y)
        } else {
            Point::new(self.nodes[vertex].x, self.nodes[vertex].y)
        }
    }

    pub fn set_vertex_position(&mut self, vertex: usize, x: f32, y: f32) {
        let n = self.nodes.len();
        if vertex >= n {
            let d = &mut self.dummies[vertex - n];
            d.x = x;
            d.y = y;
        } else {
            self.nodes[vertex].x = x;
            self.nodes[vertex].y = y;
        }
    }

    pub fn vertex_clusters(&self, vertex: usize) -> &[ClusterId] {
        let n = self.nodes.len();
        if vertex >= n {
            &self.dummies[vertex - n].clusters
        } else {
            &self.nodes[vertex].clusters
        }
    }

    /// Pre-order walk over the cluster forest.
    pub fn clusters_preorder(&self) -> Vec<(ClusterId, usize)> {
        let mut out = Vec::with_capacity(self.clusters.len());
        let mut stack: Vec<(ClusterId, usize)> =
            self.roots.iter().rev().map(|id| (*id, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            out.push((id, depth));
            for child in self.clusters[id.0].children.iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_aliases_map_once() {
        assert_eq!(NodeShape::from_token("rect"), Some(NodeShape::Box));
        assert_eq!(NodeShape::from_token("Rounded"), Some(NodeShape::Stadium));
        assert_eq!(NodeShape::from_token("inv-trapezoid"), Some(NodeShape::InvTrapezoid));
        assert_eq!(NodeShape::from_token("blob"), None);
    }

    #[test]
    fn direction_tokens_round_trip() {
        for token in ["TB", "LR", "BT", "RL"] {
            let direction = Direction::from_token(token).unwrap();
            assert_eq!(direction.as_token(), token);
        }
        assert_eq!(Direction::from_token("td"), Some(Direction::TopDown));
        assert!(Direction::LeftRight.is_horizontal());
        assert!(!Direction::BottomTop.is_horizontal());
    }

    #[test]
    fn ensure_node_reuses_existing_handle() {
        let mut graph = LayoutGraph::new();
        let (a, created) = graph.ensure_node("A");
        assert!(created);
        let (again, created) = graph.ensure_node("A");
        assert!(!created);
        assert_eq!(a, again);
        assert_eq!(graph.node(a).label, "A");
        assert_eq!(graph.node(a).width, DEFAULT_NODE_WIDTH);
    }

    #[test]
    fn clusters_preorder_visits_parents_first() {
        let mut graph = LayoutGraph::new();
        let cluster = |id: &str, parent| LayoutSubgraph {
            id: id.to_string(),
            label: id.to_string(),
            direction: None,
            members: Vec::new(),
            children: Vec::new(),
            parent,
            padding: DEFAULT_CLUSTER_PADDING,
            label_height: DEFAULT_CLUSTER_LABEL_HEIGHT,
            fill: None,
            stroke: None,
        };
        let outer = graph.add_cluster(cluster("outer", None));
        let inner = graph.add_cluster(cluster("inner", Some(outer)));
        let other = graph.add_cluster(cluster("other", None));
        assert_eq!(
            graph.clusters_preorder(),
            vec![(outer, 0), (inner, 1), (other, 0)]
        );
    }
}
