use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::ir::LayoutGraph;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Marks back-edges, assigns longest-path ranks and seeds `graph.layers`
/// with every node in insertion order. Returns the number of layers.
pub(super) fn assign_ranks(graph: &mut LayoutGraph) -> usize {
    mark_back_edges(graph);
    compute_ranks(graph);

    let layer_count = graph.nodes.iter().map(|n| n.rank + 1).max().unwrap_or(0);
    graph.layers = vec![Vec::new(); layer_count];
    for (idx, node) in graph.nodes.iter_mut().enumerate() {
        node.order = graph.layers[node.rank].len();
        graph.layers[node.rank].push(idx);
    }
    tracing::debug!(
        layers = layer_count,
        back_edges = graph.edges.iter().filter(|e| e.is_back_edge).count(),
        "assigned ranks"
    );
    layer_count
}

/// Iterative DFS from each unvisited node in insertion order. An edge into
/// a node still on the stack closes a cycle and becomes a back-edge;
/// self-loops always do.
fn mark_back_edges(graph: &mut LayoutGraph) {
    let n = graph.nodes.len();
    let mut mark = vec![Mark::Unvisited; n];
    for edge in &mut graph.edges {
        edge.is_back_edge = edge.from == edge.to;
    }

    // (node, index of next out-edge to inspect)
    let mut stack: Vec<(usize, usize)> = Vec::new();
    for start in 0..n {
        if mark[start] != Mark::Unvisited {
            continue;
        }
        mark[start] = Mark::OnStack;
        stack.push((start, 0));
        while let Some(frame) = stack.last_mut() {
            let (node, cursor) = *frame;
            let Some(&edge_id) = graph.nodes[node].out_edges.get(cursor) else {
                mark[node] = Mark::Done;
                stack.pop();
                continue;
            };
            frame.1 += 1;
            let edge = &mut graph.edges[edge_id.0];
            if edge.is_back_edge {
                continue;
            }
            let next = edge.to.0;
            match mark[next] {
                Mark::OnStack => edge.is_back_edge = true,
                Mark::Unvisited => {
                    mark[next] = Mark::OnStack;
                    stack.push((next, 0));
                }
                Mark::Done => {}
            }
        }
    }
}

/// Kahn's algorithm over non-back edges; ready nodes are released in
/// insertion order so equal inputs always produce equal ranks.
fn compute_ranks(graph: &mut LayoutGraph) {
    let n = graph.nodes.len();
    let mut indeg = vec![0usize; n];
    for edge in graph.edges.iter().filter(|e| !e.is_back_edge) {
        indeg[edge.to.0] += 1;
    }
    for node in &mut graph.nodes {
        node.rank = 0;
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|idx| indeg[*idx] == 0)
        .map(Reverse)
        .collect();
    let mut processed = 0usize;
    while let Some(Reverse(node)) = ready.pop() {
        processed += 1;
        let rank = graph.nodes[node].rank;
        for pos in 0..graph.nodes[node].out_edges.len() {
            let edge = &graph.edges[graph.nodes[node].out_edges[pos].0];
            if edge.is_back_edge {
                continue;
            }
            let next = edge.to.0;
            let target = &mut graph.nodes[next];
            target.rank = target.rank.max(rank + 1);
            indeg[next] -= 1;
            if indeg[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }
    if processed < n {
        // Unreachable once back-edges are marked; leave ranks as computed.
        tracing::warn!(remaining = n - processed, "rank assignment left nodes unprocessed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;
    use crate::extract::extract_graph;

    fn graph(edges: &[(&str, &str)], nodes: &[&str]) -> LayoutGraph {
        let mut root = Element::new("graph");
        for id in nodes {
            root.push(Element::new("node").attr("id", *id));
        }
        for (from, to) in edges {
            root.push(Element::new("edge").attr("from", *from).attr("to", *to));
        }
        extract_graph(Some(&root), 14.0).unwrap()
    }

    fn ranks(graph: &LayoutGraph) -> Vec<usize> {
        graph.nodes.iter().map(|n| n.rank).collect()
    }

    #[test]
    fn empty_graph_has_no_layers() {
        let mut g = graph(&[], &[]);
        assert_eq!(assign_ranks(&mut g), 0);
        assert!(g.layers.is_empty());
    }

    #[test]
    fn isolated_nodes_share_rank_zero() {
        let mut g = graph(&[], &["A", "B", "C"]);
        assert_eq!(assign_ranks(&mut g), 1);
        assert_eq!(g.layers, vec![vec![0, 1, 2]]);
        assert_eq!(g.nodes.iter().map(|n| n.order).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn longest_path_wins() {
        let mut g = graph(&[("A", "B"), ("B", "C"), ("A", "C")], &["A", "B", "C"]);
        assign_ranks(&mut g);
        assert_eq!(ranks(&g), vec![0, 1, 2]);
    }

    #[test]
    fn three_cycle_marks_closing_edge() {
        let mut g = graph(&[("A", "B"), ("B", "C"), ("C", "A")], &["A", "B", "C"]);
        assign_ranks(&mut g);
        assert_eq!(ranks(&g), vec![0, 1, 2]);
        let back: Vec<bool> = g.edges.iter().map(|e| e.is_back_edge).collect();
        assert_eq!(back, vec![false, false, true]);
    }

    #[test]
    fn self_loops_are_back_edges() {
        let mut g = graph(&[("A", "A"), ("A", "B")], &["A", "B"]);
        assign_ranks(&mut g);
        assert!(g.edges[0].is_back_edge);
        assert!(!g.edges[1].is_back_edge);
        assert_eq!(ranks(&g), vec![0, 1]);
    }

    #[test]
    fn non_back_edges_point_downstream() {
        let mut g = graph(
            &[("A", "B"), ("B", "C"), ("C", "B"), ("C", "D"), ("D", "A"), ("E", "D")],
            &["A", "B", "C", "D", "E"],
        );
        assign_ranks(&mut g);
        for edge in g.edges.iter().filter(|e| !e.is_back_edge) {
            assert!(g.node(edge.from).rank < g.node(edge.to).rank);
        }
    }
}
