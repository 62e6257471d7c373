use crate::config::LayoutOptions;
use crate::ir::{Direction, LayoutGraph, NodeShape, Point};

use super::geometry::{NodeBox, Outline, outline};

// ── Post-processing tolerances ──────────────────────────────────────
/// Coordinates this close count as shared, both when deciding whether a
/// segment is axis-aligned and when removing collinear points.
pub const AXIS_TOLERANCE: f32 = 0.01;
/// Interior points must sit at least this far inside a shape to be
/// dropped; points on the outline are kept.
const INTERIOR_MARGIN: f32 = 0.5;

/// Axis a routed edge travels first when leaving a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Vertical,
    Horizontal,
}

impl Axis {
    pub fn primary(direction: Direction) -> Self {
        if direction.is_horizontal() {
            Axis::Horizontal
        } else {
            Axis::Vertical
        }
    }
}

/// Turns every diagonal segment into an L-shape that moves along `axis`
/// first. When the L corner would land inside one of `avoid`, a Z-shape
/// bending halfway along the primary axis is used instead.
pub fn snap_orthogonal(points: &[Point], axis: Axis, avoid: &[NodeBox]) -> Vec<Point> {
    let Some(first) = points.first() else {
        return Vec::new();
    };
    let mut out = vec![*first];
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let diagonal = (a.x - b.x).abs() > AXIS_TOLERANCE && (a.y - b.y).abs() > AXIS_TOLERANCE;
        if diagonal {
            let corner = match axis {
                Axis::Vertical => Point::new(a.x, b.y),
                Axis::Horizontal => Point::new(b.x, a.y),
            };
            if avoid.iter().any(|bbox| bbox.contains(corner, 0.0)) {
                match axis {
                    Axis::Vertical => {
                        let mid = (a.y + b.y) / 2.0;
                        out.push(Point::new(a.x, mid));
                        out.push(Point::new(b.x, mid));
                    }
                    Axis::Horizontal => {
                        let mid = (a.x + b.x) / 2.0;
                        out.push(Point::new(mid, a.y));
                        out.push(Point::new(mid, b.y));
                    }
                }
            } else {
                out.push(corner);
            }
        }
        out.push(b);
    }
    out
}

/// Boundary point of `shape` (drawn in `bbox`) on the ray from `from`
/// through `toward`. Falls back to `from` when the ray is degenerate.
pub fn clip_to_shape(shape: NodeShape, bbox: &NodeBox, from: Point, toward: Point) -> Point {
    outline(shape, bbox).ray_exit(from, toward).unwrap_or(from)
}

/// Replaces the first and last points with boundary projections taken
/// from each node's center toward the adjacent polyline point. Running it
/// twice gives the same result.
pub fn clip_endpoints(
    points: &mut [Point],
    source: (NodeShape, &NodeBox),
    target: (NodeShape, &NodeBox),
) {
    let n = points.len();
    if n < 2 {
        return;
    }
    let (src_shape, src_box) = source;
    let (tgt_shape, tgt_box) = target;
    points[0] = clip_to_shape(src_shape, src_box, src_box.center(), points[1]);
    points[n - 1] = clip_to_shape(tgt_shape, tgt_box, tgt_box.center(), points[n - 2]);
}

/// Drops the middle of any three consecutive points sharing an x or a y
/// (within `tolerance`), and repeated points, until nothing changes.
/// Endpoints are always kept.
pub fn remove_collinear(points: &[Point], tolerance: f32) -> Vec<Point> {
    let mut current = points.to_vec();
    loop {
        if current.len() <= 2 {
            return current;
        }
        let mut out: Vec<Point> = Vec::with_capacity(current.len());
        out.push(current[0]);
        for idx in 1..current.len() - 1 {
            let prev = out[out.len() - 1];
            let curr = current[idx];
            let next = current[idx + 1];
            let repeated = (curr.x - prev.x).abs() <= tolerance && (curr.y - prev.y).abs() <= tolerance;
            let shared_x = (prev.x - curr.x).abs() <= tolerance && (curr.x - next.x).abs() <= tolerance;
            let shared_y = (prev.y - curr.y).abs() <= tolerance && (curr.y - next.y).abs() <= tolerance;
            if repeated || shared_x || shared_y {
                continue;
            }
            out.push(curr);
        }
        out.push(current[current.len() - 1]);
        if out.len() == current.len() {
            return out;
        }
        current = out;
    }
}

/// Catmull-Rom tangents turned into cubic Bezier segments, laid out as
/// `[P0, C1, C2, P1, C1, C2, P2, ...]`.
pub fn to_cubic_bezier(points: &[Point]) -> Vec<Point> {
    if points.len() < 2 {
        return points.to_vec();
    }
    let n = points.len();
    let at = |i: isize| -> Point { points[i.clamp(0, n as isize - 1) as usize] };
    let mut out = Vec::with_capacity(1 + 3 * (n - 1));
    out.push(points[0]);
    for i in 0..n - 1 {
        let i = i as isize;
        let (p0, p1, p2, p3) = (at(i - 1), at(i), at(i + 1), at(i + 2));
        out.push(Point::new(p1.x + (p2.x - p0.x) / 6.0, p1.y + (p2.y - p0.y) / 6.0));
        out.push(Point::new(p2.x - (p3.x - p1.x) / 6.0, p2.y - (p3.y - p1.y) / 6.0));
        out.push(p2);
    }
    out
}

/// Builds the final point list of every edge from node centers and the
/// waypoints laid out by coordinate assignment.
pub(super) fn route_edges(graph: &mut LayoutGraph, options: &LayoutOptions) {
    let axis = Axis::primary(options.direction);
    let mut bends = 0usize;
    for idx in 0..graph.edges.len() {
        let edge = &graph.edges[idx];
        let source = graph.node(edge.from);
        let target = graph.node(edge.to);
        let src_box = NodeBox::new(source.x, source.y, source.width, source.height);
        let tgt_box = NodeBox::new(target.x, target.y, target.width, target.height);
        let (src_shape, tgt_shape) = (source.shape, target.shape);

        let mut points = Vec::with_capacity(edge.waypoints.len() + 2);
        points.push(src_box.center());
        points.extend(edge.waypoints.iter().copied());
        points.push(tgt_box.center());

        let avoid = [src_box, tgt_box];
        if !options.use_splines {
            points = snap_orthogonal(&points, axis, &avoid);
        }
        let src_outline = outline(src_shape, &src_box);
        let tgt_outline = outline(tgt_shape, &tgt_box);
        points = drop_interior(&points, &src_outline, &tgt_outline);
        clip_endpoints(&mut points, (src_shape, &src_box), (tgt_shape, &tgt_box));
        if !options.use_splines {
            // Dropped interior corners can leave a clipped endpoint off-axis.
            points = snap_orthogonal(&points, axis, &avoid);
        }
        points = remove_collinear(&points, AXIS_TOLERANCE);
        bends += points.len().saturating_sub(2);

        let edge = &mut graph.edges[idx];
        if options.use_splines {
            edge.points = to_cubic_bezier(&points);
            edge.is_bezier = true;
        } else {
            edge.points = points;
            edge.is_bezier = false;
        }
    }
    tracing::debug!(edges = graph.edges.len(), bends, splines = options.use_splines, "routed edges");
}

fn drop_interior(points: &[Point], source: &Outline, target: &Outline) -> Vec<Point> {
    let n = points.len();
    points
        .iter()
        .enumerate()
        .filter(|(idx, p)| {
            *idx == 0
                || *idx == n - 1
                || !(source.contains(**p, INTERIOR_MARGIN) || target.contains(**p, INTERIOR_MARGIN))
        })
        .map(|(_, p)| *p)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: &[(f32, f32)]) -> Vec<Point> {
        raw.iter().map(|(x, y)| Point::new(*x, *y)).collect()
    }

    #[test]
    fn snap_makes_vertical_first_l_shape() {
        let snapped = snap_orthogonal(&pts(&[(0.0, 0.0), (100.0, 100.0)]), Axis::Vertical, &[]);
        assert_eq!(snapped, pts(&[(0.0, 0.0), (0.0, 100.0), (100.0, 100.0)]));
        let snapped = snap_orthogonal(&pts(&[(0.0, 0.0), (100.0, 100.0)]), Axis::Horizontal, &[]);
        assert_eq!(snapped, pts(&[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0)]));
    }

    #[test]
    fn snap_uses_z_shape_when_corner_hits_endpoint() {
        let target = NodeBox::new(20.0, 100.0, 80.0, 40.0);
        let snapped = snap_orthogonal(&pts(&[(0.0, 0.0), (20.0, 100.0)]), Axis::Vertical, &[target]);
        assert_eq!(
            snapped,
            pts(&[(0.0, 0.0), (0.0, 50.0), (20.0, 50.0), (20.0, 100.0)])
        );
    }

    #[test]
    fn snap_is_idempotent() {
        let once = snap_orthogonal(&pts(&[(0.0, 0.0), (40.0, 90.0), (-30.0, 200.0)]), Axis::Vertical, &[]);
        let twice = snap_orthogonal(&once, Axis::Vertical, &[]);
        assert_eq!(once, twice);
    }

    #[test]
    fn collinear_removal_merges_runs() {
        let cleaned = remove_collinear(
            &pts(&[(0.0, 0.0), (0.0, 10.0), (0.2, 20.0), (0.0, 30.0), (50.0, 30.0), (50.0, 30.3)]),
            0.5,
        );
        assert_eq!(cleaned, pts(&[(0.0, 0.0), (0.0, 30.0), (50.0, 30.3)]));
        assert_eq!(remove_collinear(&cleaned, 0.5), cleaned);
    }

    #[test]
    fn collinear_removal_keeps_short_paths() {
        let two = pts(&[(0.0, 0.0), (0.0, 0.0)]);
        assert_eq!(remove_collinear(&two, AXIS_TOLERANCE), two);
    }

    #[test]
    fn half_pixel_jog_survives_cleanup() {
        // Waypoint half a pixel off the source column.
        let a = NodeBox::new(80.0, 275.0, 80.0, 40.0);
        let b = NodeBox::new(79.5, 428.0, 80.0, 40.0);
        let snapped = snap_orthogonal(&[a.center(), Point::new(79.5, 350.0), b.center()], Axis::Vertical, &[a, b]);
        let mut points = snapped.clone();
        clip_endpoints(&mut points, (NodeShape::Box, &a), (NodeShape::Box, &b));
        let cleaned = remove_collinear(&points, AXIS_TOLERANCE);
        for pair in cleaned.windows(2) {
            let dx = (pair[0].x - pair[1].x).abs();
            let dy = (pair[0].y - pair[1].y).abs();
            assert!(dx <= AXIS_TOLERANCE || dy <= AXIS_TOLERANCE, "{cleaned:?}");
        }
        assert_eq!(snap_orthogonal(&cleaned, Axis::Vertical, &[]), cleaned);
    }

    #[test]
    fn clip_endpoints_projects_to_boundaries() {
        let a = NodeBox::new(40.0, 20.0, 80.0, 40.0);
        let b = NodeBox::new(40.0, 140.0, 80.0, 40.0);
        let mut points = vec![a.center(), b.center()];
        clip_endpoints(&mut points, (NodeShape::Box, &a), (NodeShape::Box, &b));
        assert!(points[0].distance(Point::new(40.0, 40.0)) < 0.01);
        assert!(points[1].distance(Point::new(40.0, 120.0)) < 0.01);
        let again = points.clone();
        clip_endpoints(&mut points, (NodeShape::Box, &a), (NodeShape::Box, &b));
        assert!(points[0].distance(again[0]) < 0.01);
        assert!(points[1].distance(again[1]) < 0.01);
    }

    #[test]
    fn clip_circle_at_radius() {
        let c = NodeBox::new(0.0, 0.0, 40.0, 40.0);
        let hit = clip_to_shape(NodeShape::Circle, &c, c.center(), Point::new(-100.0, 0.0));
        assert!((hit.x + 20.0).abs() < 1e-3 && hit.y.abs() < 1e-3);
    }

    #[test]
    fn bezier_passes_through_vertices() {
        let polyline = pts(&[(0.0, 0.0), (0.0, 50.0), (50.0, 100.0)]);
        let curve = to_cubic_bezier(&polyline);
        assert_eq!(curve.len(), 7);
        assert_eq!(curve[0], polyline[0]);
        assert_eq!(curve[3], polyline[1]);
        assert_eq!(curve[6], polyline[2]);
        // First tangent follows the first segment.
        assert_eq!(curve[1].x, 0.0);
    }

    #[test]
    fn interior_points_are_dropped() {
        let a = outline(NodeShape::Box, &NodeBox::new(0.0, 0.0, 40.0, 40.0));
        let b = outline(NodeShape::Box, &NodeBox::new(0.0, 100.0, 40.0, 40.0));
        let kept = drop_interior(&pts(&[(0.0, 0.0), (5.0, 5.0), (0.0, 50.0), (0.0, 100.0)]), &a, &b);
        assert_eq!(kept, pts(&[(0.0, 0.0), (0.0, 50.0), (0.0, 100.0)]));
    }
}
