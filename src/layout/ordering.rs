use std::cmp::Ordering;

use crate::config::LayoutOptions;
use crate::ir::{ClusterId, Dummy, EdgeId, LayoutGraph, Slot};

/// Vertex neighbourhoods between adjacent ranks, including waypoints.
pub(super) struct Adjacency {
    /// Neighbours one rank above, with multiplicity.
    pub up: Vec<Vec<usize>>,
    /// Neighbours one rank below, with multiplicity.
    pub down: Vec<Vec<usize>>,
}

/// Vertex chain of every edge: source, waypoints, target. Back-edges get
/// an empty chain since they take no part in ordering.
pub(super) fn edge_chains(graph: &LayoutGraph) -> Vec<Vec<usize>> {
    let n = graph.nodes.len();
    let mut chains: Vec<Vec<usize>> = graph
        .edges
        .iter()
        .map(|edge| {
            if edge.is_back_edge {
                Vec::new()
            } else {
                vec![edge.from.0]
            }
        })
        .collect();
    for (idx, dummy) in graph.dummies.iter().enumerate() {
        chains[dummy.edge.0].push(n + idx);
    }
    for (chain, edge) in chains.iter_mut().zip(&graph.edges) {
        if !chain.is_empty() {
            chain.push(edge.to.0);
        }
    }
    chains
}

pub(super) fn build_adjacency(graph: &LayoutGraph) -> Adjacency {
    let count = graph.vertex_count();
    let mut up = vec![Vec::new(); count];
    let mut down = vec![Vec::new(); count];
    for chain in edge_chains(graph) {
        for pair in chain.windows(2) {
            down[pair[0]].push(pair[1]);
            up[pair[1]].push(pair[0]);
        }
    }
    Adjacency { up, down }
}

/// Splits every non-back edge spanning more than one rank with one
/// waypoint per intervening rank. Returns the number of waypoints added.
pub(super) fn insert_waypoints(graph: &mut LayoutGraph) -> usize {
    graph.dummies.clear();
    let n = graph.nodes.len();
    for layer in &mut graph.layers {
        layer.retain(|v| *v < n);
    }
    for (idx, edge) in graph.edges.iter().enumerate() {
        if edge.is_back_edge {
            continue;
        }
        let from = &graph.nodes[edge.from.0];
        let to = &graph.nodes[edge.to.0];
        if to.rank <= from.rank + 1 {
            continue;
        }
        let shared: Vec<ClusterId> = from
            .clusters
            .iter()
            .zip(&to.clusters)
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| *a)
            .collect();
        for rank in from.rank + 1..to.rank {
            let vertex = n + graph.dummies.len();
            graph.dummies.push(Dummy {
                edge: EdgeId(idx),
                rank,
                order: graph.layers[rank].len(),
                x: 0.0,
                y: 0.0,
                clusters: shared.clone(),
            });
            graph.layers[rank].push(vertex);
        }
    }
    graph.dummies.len()
}

/// Crossing reduction by alternating barycenter sweeps. Keeps the best
/// ordering seen and returns its crossing count.
pub(super) fn order_layers(graph: &mut LayoutGraph, options: &LayoutOptions) -> usize {
    let waypoints = insert_waypoints(graph);
    let adjacency = build_adjacency(graph);

    let mut pos = vec![0usize; graph.vertex_count()];
    refresh_positions(&graph.layers, &mut pos);
    {
        let initial = |v: usize| pos[v] as f32;
        let clusters = graph_clusters(&graph.nodes, &graph.dummies);
        for layer in graph.layers.iter_mut() {
            group_layer(layer, &initial, clusters);
        }
    }
    refresh_positions(&graph.layers, &mut pos);

    let mut best_layers = graph.layers.clone();
    let mut best = total_crossings(&graph.layers, &adjacency, &pos);
    let mut stable_sweeps = 0usize;
    let mut sweeps = 0usize;
    let mut converged = best == 0 || graph.layers.len() < 2;

    while !converged && sweeps < options.max_iterations {
        let downward = sweeps % 2 == 0;
        let changed = sweep(graph, &adjacency, &mut pos, downward);
        sweeps += 1;

        let crossings = total_crossings(&graph.layers, &adjacency, &pos);
        if crossings < best {
            best = crossings;
            best_layers = graph.layers.clone();
        }
        stable_sweeps = if changed { 0 } else { stable_sweeps + 1 };
        // A full down+up pass without movement.
        converged = best == 0 || stable_sweeps >= 2;
    }
    if !converged {
        tracing::debug!(
            max_iterations = options.max_iterations,
            crossings = best,
            "crossing reduction hit iteration limit, keeping best ordering"
        );
    }

    graph.layers = best_layers;
    refresh_positions(&graph.layers, &mut pos);
    if !graph.clusters.is_empty() {
        block_clusters(graph, &pos);
        refresh_positions(&graph.layers, &mut pos);
        best = total_crossings(&graph.layers, &adjacency, &pos);
    } else {
        graph.slots = graph
            .layers
            .iter()
            .map(|layer| layer.iter().map(|v| Slot::Vertex(*v)).collect())
            .collect();
    }
    debug_assert!(
        graph
            .layers
            .iter()
            .enumerate()
            .all(|(rank, layer)| layer.iter().all(|v| graph.vertex_rank(*v) == rank))
    );
    for vertex in 0..graph.vertex_count() {
        graph.set_vertex_order(vertex, pos[vertex]);
    }
    tracing::debug!(waypoints, sweeps, crossings = best, "ordered layers");
    best
}

/// First and last rank holding a vertex of each cluster, nested members
/// included. `None` for clusters with no vertex at all.
pub(super) fn cluster_spans(graph: &LayoutGraph) -> Vec<Option<(usize, usize)>> {
    let mut spans: Vec<Option<(usize, usize)>> = vec![None; graph.clusters.len()];
    for vertex in 0..graph.vertex_count() {
        let rank = graph.vertex_rank(vertex);
        for cluster in graph.vertex_clusters(vertex) {
            let span = &mut spans[cluster.0];
            *span = Some(match *span {
                Some((lo, hi)) => (lo.min(rank), hi.max(rank)),
                None => (rank, rank),
            });
        }
    }
    spans
}

/// Turns the per-rank cluster runs into blocks that line up across ranks.
/// Sibling clusters keep one left-to-right order on every rank, and each
/// cluster holds a block on every rank of its span, empty where it has no
/// vertex. Vertices outside a cluster therefore never sit between its
/// frame edges. Fills `graph.slots` and rewrites `graph.layers` to match.
pub(super) fn block_clusters(graph: &mut LayoutGraph, pos: &[usize]) {
    let spans = cluster_spans(graph);
    let mut sums = vec![(0.0f32, 0usize); graph.clusters.len()];
    for vertex in 0..graph.vertex_count() {
        for cluster in graph.vertex_clusters(vertex) {
            sums[cluster.0].0 += pos[vertex] as f32;
            sums[cluster.0].1 += 1;
        }
    }
    let keys: Vec<f32> = sums
        .iter()
        .map(|(sum, count)| if *count == 0 { 0.0 } else { sum / *count as f32 })
        .collect();

    let blocker = Blocker {
        graph: &*graph,
        spans: &spans,
        keys: &keys,
        pos,
    };
    let slots: Vec<Vec<Slot>> = graph
        .layers
        .iter()
        .enumerate()
        .map(|(rank, layer)| {
            let mut row = Vec::with_capacity(layer.len());
            blocker.emit(rank, None, 0, layer, &mut row);
            row
        })
        .collect();

    for (layer, row) in graph.layers.iter_mut().zip(&slots) {
        layer.clear();
        layer.extend(row.iter().filter_map(|slot| match slot {
            Slot::Vertex(vertex) => Some(*vertex),
            Slot::Open(_) | Slot::Close(_) => None,
        }));
    }
    graph.slots = slots;
}

struct Blocker<'a> {
    graph: &'a LayoutGraph,
    spans: &'a [Option<(usize, usize)>],
    /// Mean order of every vertex inside each cluster, over all ranks.
    keys: &'a [f32],
    pos: &'a [usize],
}

impl Blocker<'_> {
    /// Emits the part of `rank` that belongs to `scope` (`None` is the
    /// whole graph). `items` are the scope's vertices in current order and
    /// `depth` indexes their cluster paths at the scope's children.
    fn emit(&self, rank: usize, scope: Option<ClusterId>, depth: usize, items: &[usize], out: &mut Vec<Slot>) {
        let children = match scope {
            Some(cluster) => &self.graph.clusters[cluster.0].children,
            None => &self.graph.roots,
        };
        let cluster_at = |vertex: usize| self.graph.vertex_clusters(vertex).get(depth).copied();

        // (global key, cluster, members on this rank, local key)
        let mut blocks: Vec<(f32, ClusterId, Vec<usize>, f32)> = children
            .iter()
            .filter(|c| self.spans[c.0].is_some_and(|(lo, hi)| lo <= rank && rank <= hi))
            .map(|c| {
                let members: Vec<usize> = items.iter().copied().filter(|v| cluster_at(*v) == Some(*c)).collect();
                let global = self.keys[c.0];
                let local = if members.is_empty() {
                    global
                } else {
                    members.iter().map(|v| self.pos[*v] as f32).sum::<f32>() / members.len() as f32
                };
                (global, *c, members, local)
            })
            .collect();
        blocks.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal).then(a.1.cmp(&b.1)));

        let mut free = items.iter().copied().filter(|v| cluster_at(*v).is_none()).peekable();
        for (_, cluster, members, local) in blocks {
            while let Some(vertex) = free.next_if(|v| (self.pos[*v] as f32) < local) {
                out.push(Slot::Vertex(vertex));
            }
            out.push(Slot::Open(cluster));
            self.emit(rank, Some(cluster), depth + 1, &members, out);
            out.push(Slot::Close(cluster));
        }
        out.extend(free.map(Slot::Vertex));
    }
}

fn refresh_positions(layers: &[Vec<usize>], pos: &mut [usize]) {
    for layer in layers {
        for (order, vertex) in layer.iter().enumerate() {
            pos[*vertex] = order;
        }
    }
}

/// One sweep over all ranks. Returns whether any rank changed order.
fn sweep(graph: &mut LayoutGraph, adjacency: &Adjacency, pos: &mut [usize], downward: bool) -> bool {
    let ranks: Vec<usize> = if downward {
        (1..graph.layers.len()).collect()
    } else {
        (0..graph.layers.len().saturating_sub(1)).rev().collect()
    };
    let neighbours = if downward { &adjacency.up } else { &adjacency.down };
    let mut changed = false;

    for rank in ranks {
        let mut layer = std::mem::take(&mut graph.layers[rank]);
        if layer.len() > 1 {
            let before = layer.clone();
            let bary = |v: usize| barycenter(&neighbours[v], pos).unwrap_or(pos[v] as f32);
            layer.sort_by(|a, b| {
                bary(*a)
                    .partial_cmp(&bary(*b))
                    .unwrap_or(Ordering::Equal)
                    .then(pos[*a].cmp(&pos[*b]))
            });
            group_layer(&mut layer, &bary, graph_clusters(&graph.nodes, &graph.dummies));
            if layer != before {
                changed = true;
                for (order, vertex) in layer.iter().enumerate() {
                    pos[*vertex] = order;
                }
            }
        }
        graph.layers[rank] = layer;
    }
    changed
}

fn barycenter(neighbours: &[usize], pos: &[usize]) -> Option<f32> {
    if neighbours.is_empty() {
        return None;
    }
    let sum: usize = neighbours.iter().map(|v| pos[*v]).sum();
    Some(sum as f32 / neighbours.len() as f32)
}

/// Cluster path lookup for any vertex.
fn graph_clusters<'a>(
    nodes: &'a [crate::ir::LayoutNode],
    dummies: &'a [Dummy],
) -> impl Fn(usize) -> &'a [ClusterId] + Copy {
    move |vertex| {
        if vertex >= nodes.len() {
            &dummies[vertex - nodes.len()].clusters
        } else {
            &nodes[vertex].clusters
        }
    }
}

/// Regroups an already sorted layer so members of each cluster are
/// contiguous, recursively for nested clusters. Groups are placed by the
/// mean key of their members; singletons keep their own key.
fn group_layer<'a>(
    layer: &mut Vec<usize>,
    key: &dyn Fn(usize) -> f32,
    clusters: impl Fn(usize) -> &'a [ClusterId] + Copy,
) {
    let grouped = group_at_depth(layer, 0, key, clusters);
    *layer = grouped;
}

fn group_at_depth<'a>(
    items: &[usize],
    depth: usize,
    key: &dyn Fn(usize) -> f32,
    clusters: impl Fn(usize) -> &'a [ClusterId] + Copy,
) -> Vec<usize> {
    if items.len() <= 1 {
        return items.to_vec();
    }
    // (cluster at this depth, members in current order)
    let mut units: Vec<(Option<ClusterId>, Vec<usize>)> = Vec::new();
    for &vertex in items {
        match clusters(vertex).get(depth).copied() {
            Some(cluster) => match units.iter_mut().find(|(c, _)| *c == Some(cluster)) {
                Some((_, members)) => members.push(vertex),
                None => units.push((Some(cluster), vec![vertex])),
            },
            None => units.push((None, vec![vertex])),
        }
    }
    if units.iter().all(|(cluster, _)| cluster.is_none()) {
        return items.to_vec();
    }

    let mut keyed: Vec<(f32, usize, Vec<usize>)> = units
        .into_iter()
        .enumerate()
        .map(|(idx, (cluster, members))| {
            let mean = members.iter().map(|v| key(*v)).sum::<f32>() / members.len() as f32;
            let members = if cluster.is_some() {
                group_at_depth(&members, depth + 1, key, clusters)
            } else {
                members
            };
            (mean, idx, members)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal).then(a.1.cmp(&b.1)));
    keyed.into_iter().flat_map(|(_, _, members)| members).collect()
}

pub(super) fn total_crossings(layers: &[Vec<usize>], adjacency: &Adjacency, pos: &[usize]) -> usize {
    let mut total = 0;
    for rank in 1..layers.len() {
        let pairs: Vec<(usize, usize)> = layers[rank]
            .iter()
            .flat_map(|lower| adjacency.up[*lower].iter().map(move |upper| (*upper, *lower)))
            .map(|(upper, lower)| (pos[upper], pos[lower]))
            .collect();
        total += count_layer_crossings(pairs, layers[rank].len());
    }
    total
}

/// Counts inversions among `(upper, lower)` segment positions with a
/// Fenwick tree over the lower layer.
fn count_layer_crossings(mut pairs: Vec<(usize, usize)>, lower_len: usize) -> usize {
    pairs.sort_unstable();
    let mut tree = vec![0usize; lower_len + 1];
    let mut crossings = 0;
    for (seen, (_, lower)) in pairs.into_iter().enumerate() {
        let mut at_or_below = 0;
        let mut i = lower + 1;
        while i > 0 {
            at_or_below += tree[i];
            i &= i - 1;
        }
        crossings += seen - at_or_below;
        let mut i = lower + 1;
        while i <= lower_len {
            tree[i] += 1;
            i += i & i.wrapping_neg();
        }
    }
    crossings
}
