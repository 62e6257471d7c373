use std::collections::VecDeque;

use crate::config::LayoutOptions;
use crate::ir::{Bounds, ClusterId, Direction, LayoutGraph, Point, Slot};

use super::ordering::{Adjacency, build_adjacency, cluster_spans, edge_chains};

// ── Alignment ───────────────────────────────────────────────────────
/// Minimum down/up sweep pairs pulling vertices toward their neighbours.
/// Deeper graphs get one pair per rank.
const ALIGN_SWEEPS: usize = 2;

// ── Back-edge lanes ─────────────────────────────────────────────────
/// Share of `rank_sep` a back-edge drops below / rises above its rows.
const BACK_EDGE_GAP_RATIO: f32 = 0.5;
/// Self-loops stay closer to their node.
const SELF_LOOP_GAP_RATIO: f32 = 0.25;
const SELF_LOOP_LANE_RATIO: f32 = 1.0 / 3.0;

/// Canonical frame: order grows along x, rank along y. Extents are
/// swapped for horizontal directions so the oriented drawing has the
/// requested spacing.
struct Frame<'a> {
    graph: &'a LayoutGraph,
    horizontal: bool,
}

impl Frame<'_> {
    fn order_extent(&self, vertex: usize) -> f32 {
        if self.graph.is_dummy(vertex) {
            return 0.0;
        }
        let node = &self.graph.nodes[vertex];
        if self.horizontal { node.height } else { node.width }
    }

    fn rank_extent(&self, vertex: usize) -> f32 {
        if self.graph.is_dummy(vertex) {
            return 0.0;
        }
        let node = &self.graph.nodes[vertex];
        if self.horizontal { node.width } else { node.height }
    }

    /// Minimum distance between the facing sides of two neighbours.
    fn gap(&self, a: usize, b: usize, options: &LayoutOptions) -> f32 {
        match (self.graph.is_dummy(a), self.graph.is_dummy(b)) {
            (false, false) => options.node_sep,
            (true, true) => options.edge_sep,
            _ => options.node_sep / 2.0,
        }
    }

    /// Center-to-center separation of neighbours `a` then `b`.
    fn separation(&self, a: usize, b: usize, options: &LayoutOptions) -> f32 {
        self.order_extent(a) / 2.0 + self.gap(a, b, options) + self.order_extent(b) / 2.0
    }

    /// Room between a cluster's left frame edge and its first content.
    /// Horizontal drawings put the label band on this side.
    fn leading(&self, cluster: ClusterId) -> f32 {
        let c = &self.graph.clusters[cluster.0];
        if self.horizontal { c.padding + c.label_height } else { c.padding }
    }

    /// Minimum distance from `left` to `right` when they are neighbours in
    /// a rank's slot sequence. Vertices are measured at their centers,
    /// frame edges at the edge itself.
    fn slot_distance(&self, left: Slot, right: Slot, options: &LayoutOptions) -> f32 {
        let frame_gap = options.node_sep / 2.0;
        let half = |vertex: usize| self.order_extent(vertex) / 2.0;
        match (left, right) {
            (Slot::Vertex(a), Slot::Vertex(b)) => self.separation(a, b, options),
            (Slot::Vertex(a), Slot::Open(_)) => half(a) + frame_gap,
            (Slot::Vertex(a), Slot::Close(c)) => half(a) + self.graph.clusters[c.0].padding,
            (Slot::Open(c), Slot::Vertex(b)) => self.leading(c) + half(b),
            (Slot::Open(c), Slot::Open(_)) => self.leading(c),
            (Slot::Open(_), Slot::Close(_)) => 0.0,
            (Slot::Close(_), Slot::Vertex(b)) => frame_gap + half(b),
            (Slot::Close(_), Slot::Open(_)) => frame_gap,
            (Slot::Close(_), Slot::Close(c)) => self.graph.clusters[c.0].padding,
        }
    }
}

/// Row geometry along the rank axis in the canonical frame.
#[derive(Debug, Clone, Copy)]
struct Row {
    center: f32,
    half: f32,
}

impl Row {
    fn top(&self) -> f32 {
        self.center - self.half
    }

    fn bottom(&self) -> f32 {
        self.center + self.half
    }
}

/// Places every node and waypoint, lays out back-edge lanes and applies
/// the requested direction.
pub(super) fn assign_coordinates(graph: &mut LayoutGraph, options: &LayoutOptions) {
    if graph.nodes.is_empty() {
        graph.bounds = Bounds::empty();
        return;
    }
    let horizontal = options.direction.is_horizontal();
    let adjacency = build_adjacency(graph);

    let rows = rank_rows(graph, options);
    let xs = order_axis(graph, options, horizontal, &adjacency);
    for (rank, layer) in graph.layers.clone().iter().enumerate() {
        for vertex in layer {
            graph.set_vertex_position(*vertex, xs[*vertex], rows[rank].center);
        }
    }

    let chains = edge_chains(graph);
    for (edge, chain) in graph.edges.iter_mut().zip(&chains) {
        edge.waypoints.clear();
        if chain.len() > 2 {
            for vertex in &chain[1..chain.len() - 1] {
                let dummy = &graph.dummies[*vertex - graph.nodes.len()];
                edge.waypoints.push(Point::new(dummy.x, dummy.y));
            }
        }
    }
    back_edge_lanes(graph, options, horizontal, &rows);
    orient(graph, options.direction);

    let mut bounds = Bounds::empty();
    for node in &graph.nodes {
        bounds.include_box(node.x, node.y, node.width, node.height);
    }
    for edge in &graph.edges {
        for p in &edge.waypoints {
            bounds.include_point(p.x, p.y);
        }
    }
    graph.bounds = bounds;
    tracing::debug!(
        width = bounds.width(),
        height = bounds.height(),
        direction = options.direction.as_token(),
        "assigned coordinates"
    );
}

/// Cumulative row centers: each row sits `rank_sep` past the far side of
/// the previous one, using the largest extent found in each rank. Rows
/// where cluster frames end or begin are pushed further apart by the
/// frames' padding and, on the side the label lands, their label band.
fn rank_rows(graph: &LayoutGraph, options: &LayoutOptions) -> Vec<Row> {
    let frame = Frame {
        graph,
        horizontal: options.direction.is_horizontal(),
    };
    let (opening, closing) = frame_bands(graph, options.direction);
    let mut rows: Vec<Row> = Vec::with_capacity(graph.layers.len());
    for (rank, layer) in graph.layers.iter().enumerate() {
        let half = layer
            .iter()
            .map(|v| frame.rank_extent(*v) / 2.0)
            .fold(0.0f32, f32::max);
        let center = match rows.last() {
            Some(prev) => prev.bottom() + closing[rank - 1] + options.rank_sep + opening[rank] + half,
            None => half,
        };
        rows.push(Row { center, half });
    }
    rows
}

/// Rank-axis room taken by cluster frames: `opening[r]` above row `r` for
/// frames starting there, `closing[r]` below it for frames ending there.
/// Nested frames sharing a row stack up.
fn frame_bands(graph: &LayoutGraph, direction: Direction) -> (Vec<f32>, Vec<f32>) {
    let ranks = graph.layers.len();
    let mut opening = vec![0.0f32; ranks];
    let mut closing = vec![0.0f32; ranks];
    let spans = cluster_spans(graph);
    let label_on_top = direction == Direction::TopDown;
    let label_on_bottom = direction == Direction::BottomTop;
    for (idx, span) in spans.iter().enumerate() {
        let Some((start, end)) = *span else {
            continue;
        };
        let (mut top, mut bottom) = (0.0f32, 0.0f32);
        let mut cursor = Some(ClusterId(idx));
        while let Some(cluster) = cursor {
            let c = &graph.clusters[cluster.0];
            if let Some((lo, hi)) = spans[cluster.0] {
                if lo == start {
                    top += c.padding + if label_on_top { c.label_height } else { 0.0 };
                }
                if hi == end {
                    bottom += c.padding + if label_on_bottom { c.label_height } else { 0.0 };
                }
            }
            cursor = c.parent;
        }
        opening[start] = opening[start].max(top);
        closing[end] = closing[end].max(bottom);
    }
    (opening, closing)
}

/// Difference constraints on the order axis. Variables are the vertices
/// followed by a left and a right frame edge per cluster; an entry
/// `(other, d)` in `after[v]` means `x[other] >= x[v] + d`.
struct OrderConstraints {
    after: Vec<Vec<(usize, f32)>>,
    before: Vec<Vec<(usize, f32)>>,
    topo: Vec<usize>,
    vertices: usize,
}

impl OrderConstraints {
    fn build(frame: &Frame<'_>, options: &LayoutOptions) -> Self {
        let graph = frame.graph;
        let vertices = graph.vertex_count();
        let count = vertices + 2 * graph.clusters.len();
        let var = |slot: Slot| match slot {
            Slot::Vertex(v) => v,
            Slot::Open(c) => vertices + 2 * c.0,
            Slot::Close(c) => vertices + 2 * c.0 + 1,
        };
        let mut after = vec![Vec::new(); count];
        let mut before = vec![Vec::new(); count];
        let mut indegree = vec![0usize; count];
        let unblocked: Vec<Vec<Slot>>;
        let rows = if graph.slots.len() == graph.layers.len() {
            &graph.slots
        } else {
            unblocked = graph
                .layers
                .iter()
                .map(|layer| layer.iter().map(|v| Slot::Vertex(*v)).collect())
                .collect();
            &unblocked
        };
        for row in rows {
            for pair in row.windows(2) {
                let (a, b) = (var(pair[0]), var(pair[1]));
                let d = frame.slot_distance(pair[0], pair[1], options);
                after[a].push((b, d));
                before[b].push((a, d));
                indegree[b] += 1;
            }
        }

        let mut queue: VecDeque<usize> = (0..count).filter(|v| indegree[*v] == 0).collect();
        let mut topo = Vec::with_capacity(count);
        while let Some(v) = queue.pop_front() {
            topo.push(v);
            for (next, _) in &after[v] {
                indegree[*next] -= 1;
                if indegree[*next] == 0 {
                    queue.push_back(*next);
                }
            }
        }
        if topo.len() < count {
            tracing::debug!(unplaced = count - topo.len(), "order constraints are cyclic");
            let mut seen = vec![false; count];
            for v in &topo {
                seen[*v] = true;
            }
            topo.extend((0..count).filter(|v| !seen[*v]));
        }
        Self {
            after,
            before,
            topo,
            vertices,
        }
    }

    /// Lowest placement with every variable at or past `desired`.
    fn push_right(&self, desired: &[f32]) -> Vec<f32> {
        let mut xs = desired.to_vec();
        for &v in &self.topo {
            for &(prev, d) in &self.before[v] {
                xs[v] = xs[v].max(xs[prev] + d);
            }
        }
        xs
    }

    /// Highest placement with every variable at or before `desired`.
    fn push_left(&self, desired: &[f32]) -> Vec<f32> {
        let mut xs = desired.to_vec();
        for &v in self.topo.iter().rev() {
            for &(next, d) in &self.after[v] {
                xs[v] = xs[v].min(xs[next] - d);
            }
        }
        xs
    }
}

/// Order-axis centers for all vertices. Starts left-packed, then pulls
/// every vertex toward the mean position of its neighbours while keeping
/// the slot constraints, averaging the left- and right-packed feasible
/// placements each pass.
fn order_axis(
    graph: &LayoutGraph,
    options: &LayoutOptions,
    horizontal: bool,
    adjacency: &Adjacency,
) -> Vec<f32> {
    let frame = Frame { graph, horizontal };
    let constraints = OrderConstraints::build(&frame, options);
    let vertices = constraints.vertices;
    let count = constraints.topo.len();

    let mut desired = vec![f32::NEG_INFINITY; count];
    for (vertex, slot) in desired.iter_mut().enumerate().take(vertices) {
        *slot = frame.order_extent(vertex) / 2.0;
    }
    let mut xs = constraints.push_right(&desired);

    let passes = ALIGN_SWEEPS.max(graph.layers.len());
    for _ in 0..passes {
        for neighbours in [&adjacency.up, &adjacency.down] {
            for (vertex, slot) in desired.iter_mut().enumerate().take(vertices) {
                let list = &neighbours[vertex];
                *slot = if list.is_empty() {
                    xs[vertex]
                } else {
                    list.iter().map(|n| xs[*n]).sum::<f32>() / list.len() as f32
                };
            }
            desired[vertices..].fill(f32::NEG_INFINITY);
            let forward = constraints.push_right(&desired);
            desired[vertices..].fill(f32::INFINITY);
            let backward = constraints.push_left(&desired);
            for vertex in 0..vertices {
                xs[vertex] = (forward[vertex] + backward[vertex]) / 2.0;
            }
        }
    }
    xs.truncate(vertices);
    xs
}

/// Lane waypoints for back-edges and self-loops, in the canonical frame.
/// Back-edges leave through the gap below the source row, run outside
/// every vertex of the spanned ranks on the max-order side, and enter the
/// target from the gap above its row.
fn back_edge_lanes(graph: &mut LayoutGraph, options: &LayoutOptions, horizontal: bool, rows: &[Row]) {
    let frame = Frame {
        graph: &*graph,
        horizontal,
    };
    let far_side = |rank: usize| -> f32 {
        graph.layers[rank]
            .iter()
            .map(|v| {
                let p = graph.vertex_position(*v);
                let frames: f32 = graph
                    .vertex_clusters(*v)
                    .iter()
                    .map(|c| graph.clusters[c.0].padding)
                    .sum();
                p.x + frame.order_extent(*v) / 2.0 + frames
            })
            .fold(f32::MIN, f32::max)
    };

    let mut lanes: Vec<(usize, Vec<Point>)> = Vec::new();
    let mut lane_index = 0usize;
    let mut loops_per_node = vec![0usize; graph.nodes.len()];
    let max_offset = (options.rank_sep * BACK_EDGE_GAP_RATIO - options.edge_sep).max(0.0);
    for (idx, edge) in graph.edges.iter().enumerate() {
        if !edge.is_back_edge {
            continue;
        }
        let source = &graph.nodes[edge.from.0];
        let target = &graph.nodes[edge.to.0];
        let (src_row, tgt_row) = (rows[source.rank], rows[target.rank]);
        if edge.from == edge.to {
            let k = loops_per_node[edge.from.0];
            loops_per_node[edge.from.0] += 1;
            let step = k as f32 * options.edge_sep;
            let drop = options.rank_sep * SELF_LOOP_GAP_RATIO + step.min(max_offset);
            let lane = source.x
                + frame.order_extent(edge.from.0) / 2.0
                + options.node_sep * SELF_LOOP_LANE_RATIO
                + step;
            let (below, above) = (src_row.bottom() + drop, src_row.top() - drop);
            lanes.push((
                idx,
                vec![
                    Point::new(source.x, below),
                    Point::new(lane, below),
                    Point::new(lane, above),
                    Point::new(source.x, above),
                ],
            ));
            continue;
        }
        let k = lane_index;
        lane_index += 1;
        let step = k as f32 * options.edge_sep;
        let offset = options.rank_sep * BACK_EDGE_GAP_RATIO + step.min(max_offset);
        let below = src_row.bottom() + offset;
        let above = tgt_row.top() - offset;
        let outside = (target.rank..=source.rank)
            .map(|rank| far_side(rank))
            .fold(f32::MIN, f32::max);
        let lane = outside + options.node_sep / 2.0 + step;
        lanes.push((
            idx,
            vec![
                Point::new(source.x, below),
                Point::new(lane, below),
                Point::new(lane, above),
                Point::new(target.x, above),
            ],
        ));
    }
    let count = lanes.len();
    for (idx, waypoints) in lanes {
        graph.edges[idx].waypoints = waypoints;
    }
    if count > 0 {
        tracing::debug!(lanes = count, "routed back-edge lanes");
    }
}

/// Maps canonical coordinates into the requested direction.
pub(super) fn orient_point(p: Point, direction: Direction) -> Point {
    match direction {
        Direction::TopDown => p,
        Direction::BottomTop => Point::new(p.x, -p.y),
        Direction::LeftRight => Point::new(p.y, p.x),
        Direction::RightLeft => Point::new(-p.y, p.x),
    }
}

fn orient(graph: &mut LayoutGraph, direction: Direction) {
    if direction == Direction::TopDown {
        return;
    }
    for vertex in 0..graph.vertex_count() {
        let p = orient_point(graph.vertex_position(vertex), direction);
        graph.set_vertex_position(vertex, p.x, p.y);
    }
    for edge in &mut graph.edges {
        for p in &mut edge.waypoints {
            *p = orient_point(*p, direction);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;
    use crate::extract::extract_graph;
    use crate::layout::ordering::order_layers;
    use crate::layout::ranking::assign_ranks;

    fn placed(xml: &str, options: &LayoutOptions) -> LayoutGraph {
        let root = Element::parse_xml(xml).unwrap();
        let mut graph = extract_graph(Some(&root), options.font_size).unwrap();
        assign_ranks(&mut graph);
        order_layers(&mut graph, options);
        assign_coordinates(&mut graph, options);
        graph
    }

    const CHAIN: &str = r#"<graph><node id="A"/><node id="B"/><edge from="A" to="B"/></graph>"#;

    #[test]
    fn two_rank_chain_uses_rank_sep() {
        let graph = placed(CHAIN, &LayoutOptions::default());
        let (a, b) = (&graph.nodes[0], &graph.nodes[1]);
        assert_eq!((a.x, a.y), (40.0, 20.0));
        assert_eq!((b.x, b.y), (40.0, 140.0));
    }

    #[test]
    fn same_rank_nodes_use_node_sep() {
        let graph = placed(
            r#"<graph><node id="A"/><node id="B" width="120"/></graph>"#,
            &LayoutOptions::default(),
        );
        let (a, b) = (&graph.nodes[0], &graph.nodes[1]);
        assert_eq!(a.y, b.y);
        let gap = (b.x - b.width / 2.0) - (a.x + a.width / 2.0);
        assert!((gap - 60.0).abs() < 1e-3, "gap {gap}");
    }

    #[test]
    fn directions_orient_the_rank_axis() {
        for (direction, check) in [
            (Direction::TopDown, (|a: Point, b: Point| b.y > a.y) as fn(Point, Point) -> bool),
            (Direction::BottomTop, |a, b| b.y < a.y),
            (Direction::LeftRight, |a, b| b.x > a.x),
            (Direction::RightLeft, |a, b| b.x < a.x),
        ] {
            let options = LayoutOptions {
                direction,
                ..LayoutOptions::default()
            };
            let graph = placed(CHAIN, &options);
            let a = Point::new(graph.nodes[0].x, graph.nodes[0].y);
            let b = Point::new(graph.nodes[1].x, graph.nodes[1].y);
            assert!(check(a, b), "{direction:?}: {a:?} {b:?}");
        }
    }

    #[test]
    fn frame_rows_reserve_padding_and_label() {
        let graph = placed(
            r#"<graph><node id="A"/><subgraph id="s"><node id="B"/></subgraph><edge from="A" to="B"/></graph>"#,
            &LayoutOptions::default(),
        );
        // Row gap grows by the frame's padding (15) and label band (20).
        assert_eq!(graph.nodes[1].y - graph.nodes[0].y, 20.0 + 80.0 + 35.0 + 20.0);
    }

    #[test]
    fn outsider_on_a_spanned_rank_clears_the_frame_edge() {
        let graph = placed(
            r#"<graph>
                <subgraph id="s"><node id="A"/><node id="B"/></subgraph>
                <node id="X"/>
                <edge from="A" to="X"/><edge from="X" to="B"/>
            </graph>"#,
            &LayoutOptions::default(),
        );
        let (a, b, x) = (&graph.nodes[0], &graph.nodes[1], &graph.nodes[2]);
        let pad = graph.clusters[0].padding;
        let left = (a.x - a.width / 2.0).min(b.x - b.width / 2.0) - pad;
        let right = (a.x + a.width / 2.0).max(b.x + b.width / 2.0) + pad;
        assert!(x.x + x.width / 2.0 < left || x.x - x.width / 2.0 > right, "{left} {right} {}", x.x);
    }

    #[test]
    fn horizontal_layout_spaces_by_width() {
        let options = LayoutOptions {
            direction: Direction::LeftRight,
            ..LayoutOptions::default()
        };
        let graph = placed(CHAIN, &options);
        let gap = graph.nodes[1].x - graph.nodes[0].x;
        assert!((gap - (80.0 + 80.0)).abs() < 1e-3, "gap {gap}");
    }

    #[test]
    fn long_edge_waypoints_follow_dummies() {
        let graph = placed(
            r#"<graph><node id="A"/><node id="B"/><node id="C"/>
               <edge from="A" to="B"/><edge from="B" to="C"/><edge from="A" to="C"/></graph>"#,
            &LayoutOptions::default(),
        );
        let long = &graph.edges[2];
        assert_eq!(long.waypoints.len(), 1);
        assert_eq!(long.waypoints[0].y, graph.nodes[1].y);
        assert!(long.waypoints[0].x != graph.nodes[1].x);
    }

    #[test]
    fn back_edge_lane_runs_outside() {
        let graph = placed(
            r#"<graph><node id="A"/><node id="B"/><node id="C"/>
               <edge from="A" to="B"/><edge from="B" to="C"/><edge from="C" to="A"/></graph>"#,
            &LayoutOptions::default(),
        );
        let back = &graph.edges[2];
        assert!(back.is_back_edge);
        assert_eq!(back.waypoints.len(), 4);
        let right = graph
            .nodes
            .iter()
            .map(|n| n.x + n.width / 2.0)
            .fold(f32::MIN, f32::max);
        assert!(back.waypoints[1].x > right);
        assert!(back.waypoints[0].y > graph.nodes[2].y + 20.0);
        assert!(back.waypoints[3].y < graph.nodes[0].y - 20.0);
    }

    #[test]
    fn self_loop_gets_a_lane() {
        let graph = placed(
            r#"<graph><node id="A"/><edge from="A" to="A"/></graph>"#,
            &LayoutOptions::default(),
        );
        let edge = &graph.edges[0];
        assert_eq!(edge.waypoints.len(), 4);
        assert!(edge.waypoints[1].x > graph.nodes[0].x + 40.0);
    }

    #[test]
    fn orient_point_maps_axes() {
        let p = Point::new(3.0, 7.0);
        assert_eq!(orient_point(p, Direction::TopDown), p);
        assert_eq!(orient_point(p, Direction::BottomTop), Point::new(3.0, -7.0));
        assert_eq!(orient_point(p, Direction::LeftRight), Point::new(7.0, 3.0));
        assert_eq!(orient_point(p, Direction::RightLeft), Point::new(-7.0, 3.0));
    }
}
