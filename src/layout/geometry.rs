use crate::ir::{NodeShape, Point};

// ── Shape proportions ───────────────────────────────────────────────
/// Hexagon corners sit at this share of the width from each side.
pub const HEXAGON_INSET_RATIO: f32 = 0.25;
/// Trapezoid narrow edge inset, per side.
pub const TRAPEZOID_INSET_RATIO: f32 = 0.15;
/// Asymmetric (flag) notch depth on the left edge.
pub const ASYMMETRIC_NOTCH_RATIO: f32 = 0.15;
/// Cylinder cap ellipse height as a share of the total height.
pub const CYLINDER_CAP_RATIO: f32 = 0.15;
/// Subroutine inner rule inset.
pub const SUBROUTINE_INSET_RATIO: f32 = 0.10;
/// Double circle inner radius relative to the outer one.
pub const DOUBLE_CIRCLE_INNER_RATIO: f32 = 0.8;

const EPS: f32 = 1e-4;

/// Axis-aligned box given by its center and size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeBox {
    pub cx: f32,
    pub cy: f32,
    pub width: f32,
    pub height: f32,
}

impl NodeBox {
    pub fn new(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self { cx, cy, width, height }
    }

    pub fn center(&self) -> Point {
        Point::new(self.cx, self.cy)
    }

    pub fn left(&self) -> f32 {
        self.cx - self.width / 2.0
    }

    pub fn top(&self) -> f32 {
        self.cy - self.height / 2.0
    }

    pub fn right(&self) -> f32 {
        self.cx + self.width / 2.0
    }

    pub fn bottom(&self) -> f32 {
        self.cy + self.height / 2.0
    }

    /// Strict containment, `margin` pixels inside the edges.
    pub fn contains(&self, p: Point, margin: f32) -> bool {
        p.x > self.left() + margin
            && p.x < self.right() - margin
            && p.y > self.top() + margin
            && p.y < self.bottom() - margin
    }
}

/// Closed outline of a node shape, used for clipping and hit tests.
#[derive(Debug, Clone, PartialEq)]
pub enum Outline {
    Polygon(Vec<Point>),
    Ellipse { center: Point, rx: f32, ry: f32 },
    /// Convex union of parts that all contain the box center.
    Union(Vec<Outline>),
}

/// Polygon vertices for the shapes drawn as polygons, top-left origin
/// taken from `bbox`. Curved shapes return `None`.
pub fn shape_polygon_points(shape: NodeShape, bbox: &NodeBox) -> Option<Vec<Point>> {
    let x = bbox.left();
    let y = bbox.top();
    let w = bbox.width;
    let h = bbox.height;
    let (cx, cy) = (bbox.cx, bbox.cy);
    let points = match shape {
        NodeShape::Box | NodeShape::Subroutine => {
            vec![(x, y), (x + w, y), (x + w, y + h), (x, y + h)]
        }
        NodeShape::Diamond => vec![(cx, y), (x + w, cy), (cx, y + h), (x, cy)],
        NodeShape::Hexagon => {
            let x1 = x + w * HEXAGON_INSET_RATIO;
            let x2 = x + w * (1.0 - HEXAGON_INSET_RATIO);
            vec![(x1, y), (x2, y), (x + w, cy), (x2, y + h), (x1, y + h), (x, cy)]
        }
        NodeShape::Triangle => vec![(cx, y), (x + w, y + h), (x, y + h)],
        NodeShape::Trapezoid => {
            let inset = w * TRAPEZOID_INSET_RATIO;
            vec![(x + inset, y), (x + w - inset, y), (x + w, y + h), (x, y + h)]
        }
        NodeShape::InvTrapezoid => {
            let inset = w * TRAPEZOID_INSET_RATIO;
            vec![(x, y), (x + w, y), (x + w - inset, y + h), (x + inset, y + h)]
        }
        NodeShape::Asymmetric => {
            let notch = w * ASYMMETRIC_NOTCH_RATIO;
            vec![(x, y), (x + w, y), (x + w, y + h), (x, y + h), (x + notch, cy)]
        }
        _ => return None,
    };
    Some(points.into_iter().map(|(px, py)| Point::new(px, py)).collect())
}

pub fn outline(shape: NodeShape, bbox: &NodeBox) -> Outline {
    if let Some(points) = shape_polygon_points(shape, bbox) {
        return Outline::Polygon(points);
    }
    let center = bbox.center();
    let (w, h) = (bbox.width, bbox.height);
    match shape {
        NodeShape::Circle | NodeShape::DoubleCircle => {
            let r = w.min(h) / 2.0;
            Outline::Ellipse { center, rx: r, ry: r }
        }
        NodeShape::Ellipse => Outline::Ellipse {
            center,
            rx: w / 2.0,
            ry: h / 2.0,
        },
        NodeShape::Stadium => {
            // Caps sit on the short dimension.
            if w >= h {
                let r = h / 2.0;
                let core = rect_points(bbox.left() + r, bbox.top(), bbox.right() - r, bbox.bottom());
                Outline::Union(vec![
                    Outline::Polygon(core),
                    Outline::Ellipse { center: Point::new(bbox.left() + r, bbox.cy), rx: r, ry: r },
                    Outline::Ellipse { center: Point::new(bbox.right() - r, bbox.cy), rx: r, ry: r },
                ])
            } else {
                let r = w / 2.0;
                let core = rect_points(bbox.left(), bbox.top() + r, bbox.right(), bbox.bottom() - r);
                Outline::Union(vec![
                    Outline::Polygon(core),
                    Outline::Ellipse { center: Point::new(bbox.cx, bbox.top() + r), rx: r, ry: r },
                    Outline::Ellipse { center: Point::new(bbox.cx, bbox.bottom() - r), rx: r, ry: r },
                ])
            }
        }
        NodeShape::Cylinder => {
            let ry = h * CYLINDER_CAP_RATIO;
            let rx = w / 2.0;
            let body = rect_points(bbox.left(), bbox.top() + ry, bbox.right(), bbox.bottom() - ry);
            Outline::Union(vec![
                Outline::Polygon(body),
                Outline::Ellipse { center: Point::new(bbox.cx, bbox.top() + ry), rx, ry },
                Outline::Ellipse { center: Point::new(bbox.cx, bbox.bottom() - ry), rx, ry },
            ])
        }
        _ => Outline::Polygon(rect_points(bbox.left(), bbox.top(), bbox.right(), bbox.bottom())),
    }
}

fn rect_points(x0: f32, y0: f32, x1: f32, y1: f32) -> Vec<Point> {
    vec![
        Point::new(x0, y0),
        Point::new(x1, y0),
        Point::new(x1, y1),
        Point::new(x0, y1),
    ]
}

impl Outline {
    /// Distance along `dir` from `origin` to where the ray leaves the
    /// outline.
    fn exit_t(&self, origin: Point, dir: Point) -> Option<f32> {
        match self {
            Outline::Polygon(poly) => ray_polygon_t(origin, dir, poly),
            Outline::Ellipse { center, rx, ry } => ray_ellipse_t(origin, dir, *center, *rx, *ry),
            Outline::Union(parts) => parts
                .iter()
                .filter_map(|part| part.exit_t(origin, dir))
                .fold(None, |best: Option<f32>, t| Some(best.map_or(t, |b| b.max(t)))),
        }
    }

    /// Boundary point hit by the ray from `origin` through `toward`.
    pub fn ray_exit(&self, origin: Point, toward: Point) -> Option<Point> {
        let dir = Point::new(toward.x - origin.x, toward.y - origin.y);
        if dir.x.abs() < EPS && dir.y.abs() < EPS {
            return None;
        }
        let t = self.exit_t(origin, dir)?;
        Some(Point::new(origin.x + dir.x * t, origin.y + dir.y * t))
    }

    /// True when `p` lies strictly inside, at least `margin` pixels
    /// from the boundary along the axes.
    pub fn contains(&self, p: Point, margin: f32) -> bool {
        match self {
            Outline::Polygon(poly) => {
                point_in_polygon(p, poly)
                    && [(margin, 0.0), (-margin, 0.0), (0.0, margin), (0.0, -margin)]
                        .iter()
                        .all(|(dx, dy)| point_in_polygon(Point::new(p.x + dx, p.y + dy), poly))
            }
            Outline::Ellipse { center, rx, ry } => {
                let (rx, ry) = (rx - margin, ry - margin);
                if rx <= 0.0 || ry <= 0.0 {
                    return false;
                }
                let nx = (p.x - center.x) / rx;
                let ny = (p.y - center.y) / ry;
                nx * nx + ny * ny < 1.0
            }
            Outline::Union(parts) => parts.iter().any(|part| part.contains(p, margin)),
        }
    }

    /// Distance from `p` to the nearest boundary segment or arc sample.
    pub fn boundary_distance(&self, p: Point) -> f32 {
        match self {
            Outline::Polygon(poly) => (0..poly.len())
                .map(|i| segment_distance(p, poly[i], poly[(i + 1) % poly.len()]))
                .fold(f32::MAX, f32::min),
            Outline::Ellipse { center, rx, ry } => {
                // Closed form on the ray through p is exact for circles and
                // a close bound for ellipses.
                let dir = Point::new(p.x - center.x, p.y - center.y);
                if dir.x.abs() < EPS && dir.y.abs() < EPS {
                    return rx.min(*ry);
                }
                match ray_ellipse_t(*center, dir, *center, *rx, *ry) {
                    Some(t) => p.distance(Point::new(center.x + dir.x * t, center.y + dir.y * t)),
                    None => f32::MAX,
                }
            }
            Outline::Union(parts) => {
                if self.contains(p, 0.0) {
                    // On the union boundary the point is on some part's
                    // boundary and inside no other part.
                    parts
                        .iter()
                        .filter(|part| !part.contains(p, 0.5))
                        .map(|part| part.boundary_distance(p))
                        .fold(f32::MAX, f32::min)
                } else {
                    parts
                        .iter()
                        .map(|part| part.boundary_distance(p))
                        .fold(f32::MAX, f32::min)
                }
            }
        }
    }
}

/// Smallest non-negative ray parameter hitting a polygon edge.
pub fn ray_polygon_t(origin: Point, dir: Point, poly: &[Point]) -> Option<f32> {
    if poly.len() < 2 {
        return None;
    }
    let mut best_t: Option<f32> = None;
    for i in 0..poly.len() {
        let a = poly[i];
        let b = poly[(i + 1) % poly.len()];
        let sx = b.x - a.x;
        let sy = b.y - a.y;
        let qx = a.x - origin.x;
        let qy = a.y - origin.y;
        let denom = dir.x * sy - dir.y * sx;
        if denom.abs() < 1e-6 {
            continue;
        }
        let t = (qx * sy - qy * sx) / denom;
        let u = (qx * dir.y - qy * dir.x) / denom;
        if t >= 0.0 && (-EPS..=1.0 + EPS).contains(&u) {
            match best_t {
                Some(best) if t >= best => {}
                _ => best_t = Some(t),
            }
        }
    }
    best_t
}

/// Largest non-negative root of the ray/ellipse equation, i.e. where a ray
/// starting inside (or passing through) the ellipse leaves it.
pub fn ray_ellipse_t(origin: Point, dir: Point, center: Point, rx: f32, ry: f32) -> Option<f32> {
    if rx <= 0.0 || ry <= 0.0 {
        return None;
    }
    let ox = origin.x - center.x;
    let oy = origin.y - center.y;
    let a = (dir.x * dir.x) / (rx * rx) + (dir.y * dir.y) / (ry * ry);
    let b = 2.0 * ((ox * dir.x) / (rx * rx) + (oy * dir.y) / (ry * ry));
    let c = (ox * ox) / (rx * rx) + (oy * oy) / (ry * ry) - 1.0;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 || a.abs() < 1e-9 {
        return None;
    }
    let t = (-b + disc.sqrt()) / (2.0 * a);
    (t >= 0.0).then_some(t)
}

/// Even-odd crossing test.
pub fn point_in_polygon(p: Point, poly: &[Point]) -> bool {
    let mut inside = false;
    let mut j = poly.len().wrapping_sub(1);
    for i in 0..poly.len() {
        let (a, b) = (poly[i], poly[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

pub fn segment_distance(p: Point, a: Point, b: Point) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq < 1e-12 {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    p.distance(Point::new(a.x + dx * t, a.y + dy * t))
}
