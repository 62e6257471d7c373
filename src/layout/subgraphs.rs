use crate::ir::{Bounds, LayoutGraph};

use super::types::SubgraphPosition;

/// Frames every non-empty cluster around its members and nested clusters,
/// bottom-up. Output is in pre-order so parents draw beneath children.
pub(super) fn bound_clusters(graph: &LayoutGraph) -> Vec<SubgraphPosition> {
    let order = graph.clusters_preorder();
    let mut frames: Vec<Option<Bounds>> = vec![None; graph.clusters.len()];

    // Reverse pre-order visits children before their parents.
    for (cluster_id, _) in order.iter().rev() {
        let cluster = &graph.clusters[cluster_id.0];
        let pad = cluster.padding;
        let mut bounds = Bounds::empty();
        for member in &cluster.members {
            if let Some(id) = graph.node_id(member) {
                let node = graph.node(id);
                bounds.include_box(node.x, node.y, node.width + pad * 2.0, node.height + pad * 2.0);
            }
        }
        for child in &cluster.children {
            if let Some(inner) = frames[child.0] {
                bounds.include_point(inner.min_x - pad, inner.min_y - pad);
                bounds.include_point(inner.max_x + pad, inner.max_y + pad);
            }
        }
        if bounds.is_empty() {
            tracing::debug!(subgraph = %cluster.id, "skipping empty subgraph");
            continue;
        }
        bounds.min_y -= cluster.label_height;
        frames[cluster_id.0] = Some(bounds);
    }

    order
        .into_iter()
        .filter_map(|(cluster_id, depth)| {
            let bounds = frames[cluster_id.0]?;
            let cluster = &graph.clusters[cluster_id.0];
            Some(SubgraphPosition {
                id: cluster.id.clone(),
                label: cluster.label.clone(),
                x: bounds.min_x,
                y: bounds.min_y,
                width: bounds.width(),
                height: bounds.height(),
                label_height: cluster.label_height,
                padding: cluster.padding,
                fill: cluster.fill.clone(),
                stroke: cluster.stroke.clone(),
                depth,
                direction: cluster.direction,
                members: cluster.members.clone(),
            })
        })
        .collect()
}
