use crate::config::{RenderConfig, SvgOptions};
use crate::element::{Element, fmt_num};
use crate::ir::{EdgeStyle, NodeShape, Point};
use crate::layout::geometry::{
    CYLINDER_CAP_RATIO, DOUBLE_CIRCLE_INNER_RATIO, NodeBox, SUBROUTINE_INSET_RATIO,
    shape_polygon_points,
};
use crate::layout::text::{estimate_label_width, label_origin};
use crate::layout::{EdgePath, GraphLayout, NodePosition, SubgraphPosition};
use crate::theme::Palette;
use anyhow::Result;
use std::fmt;
use std::path::Path;

const SVG_NS: &str = "http://www.w3.org/2000/svg";

// ── Arrowheads ──────────────────────────────────────────────────────
pub const ARROW_LENGTH: f32 = 10.0;
/// Half of the triangle base.
pub const ARROW_HALF_BASE: f32 = 5.0;

// ── Frames and labels ───────────────────────────────────────────────
const CLUSTER_CORNER_RADIUS: f32 = 8.0;
const CLUSTER_LABEL_INSET: f32 = 8.0;
const EDGE_LABEL_PAD_X: f32 = 4.0;
const EDGE_LABEL_PAD_Y: f32 = 2.0;
const GRID_STEP: f32 = 20.0;
const DOTTED_DASH: &str = "5,5";

// ── Colors used when no theme is set ────────────────────────────────
const FALLBACK_FILL: &str = "lightblue";
const FALLBACK_STROKE: &str = "black";
const FALLBACK_TEXT: &str = "black";
const FALLBACK_TEXT_SECONDARY: &str = "#444444";
const FALLBACK_GROUP_FILL: &str = "#f7f7f7";
const FALLBACK_GROUP_HEADER: &str = "#ebebeb";
const FALLBACK_GROUP_STROKE: &str = "#999999";
const FALLBACK_BACKGROUND: &str = "white";
const FALLBACK_GRID: &str = "#eeeeee";

/// One command of an SVG path `d` attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    CubicTo(Point, Point, Point),
    ArcTo {
        rx: f32,
        ry: f32,
        large_arc: bool,
        sweep: bool,
        to: Point,
    },
    Close,
}

/// Typed path builder; `Display` renders the `d` attribute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathData {
    commands: Vec<PathCommand>,
}

impl PathData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(mut self, p: Point) -> Self {
        self.commands.push(PathCommand::MoveTo(p));
        self
    }

    pub fn line_to(mut self, p: Point) -> Self {
        self.commands.push(PathCommand::LineTo(p));
        self
    }

    pub fn cubic_to(mut self, c1: Point, c2: Point, to: Point) -> Self {
        self.commands.push(PathCommand::CubicTo(c1, c2, to));
        self
    }

    pub fn arc_to(mut self, rx: f32, ry: f32, large_arc: bool, sweep: bool, to: Point) -> Self {
        self.commands.push(PathCommand::ArcTo {
            rx,
            ry,
            large_arc,
            sweep,
            to,
        });
        self
    }

    pub fn close(mut self) -> Self {
        self.commands.push(PathCommand::Close);
        self
    }

    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// `M`/`L` for polylines, `M`/`C` for Bezier point lists.
    pub fn from_edge(edge: &EdgePath) -> Self {
        let Some(first) = edge.points.first() else {
            return Self::new();
        };
        let mut path = Self::new().move_to(*first);
        if edge.is_bezier {
            for seg in edge.points[1..].chunks_exact(3) {
                path = path.cubic_to(seg[0], seg[1], seg[2]);
            }
        } else {
            for p in &edge.points[1..] {
                path = path.line_to(*p);
            }
        }
        path
    }
}

fn pt(p: Point) -> String {
    format!("{},{}", fmt_num(p.x as f64), fmt_num(p.y as f64))
}

impl fmt::Display for PathData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, cmd) in self.commands.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            match cmd {
                PathCommand::MoveTo(p) => write!(f, "M {}", pt(*p))?,
                PathCommand::LineTo(p) => write!(f, "L {}", pt(*p))?,
                PathCommand::CubicTo(c1, c2, p) => write!(f, "C {} {} {}", pt(*c1), pt(*c2), pt(*p))?,
                PathCommand::ArcTo {
                    rx,
                    ry,
                    large_arc,
                    sweep,
                    to,
                } => write!(
                    f,
                    "A {} {} 0 {} {} {}",
                    fmt_num(*rx as f64),
                    fmt_num(*ry as f64),
                    u8::from(*large_arc),
                    u8::from(*sweep),
                    pt(*to)
                )?,
                PathCommand::Close => f.write_str("Z")?,
            }
        }
        Ok(())
    }
}

/// Colors resolved once per render.
struct Colors {
    background: Option<String>,
    node_fill: String,
    node_stroke: String,
    text: String,
    text_secondary: String,
    line: String,
    arrow: String,
    group_fill: String,
    group_header: String,
    group_stroke: String,
    label_background: String,
    grid: String,
}

impl Colors {
    fn resolve(options: &SvgOptions) -> Self {
        let Some(p) = options.theme.as_ref().map(Palette::derive) else {
            return Self {
                background: None,
                node_fill: or_fallback(&options.default_fill, FALLBACK_FILL),
                node_stroke: or_fallback(&options.default_stroke, FALLBACK_STROKE),
                text: FALLBACK_TEXT.to_string(),
                text_secondary: FALLBACK_TEXT_SECONDARY.to_string(),
                line: FALLBACK_STROKE.to_string(),
                arrow: FALLBACK_STROKE.to_string(),
                group_fill: FALLBACK_GROUP_FILL.to_string(),
                group_header: FALLBACK_GROUP_HEADER.to_string(),
                group_stroke: FALLBACK_GROUP_STROKE.to_string(),
                label_background: FALLBACK_BACKGROUND.to_string(),
                grid: FALLBACK_GRID.to_string(),
            };
        };
        Self {
            node_fill: or_fallback(&options.default_fill, &p.node_fill),
            node_stroke: or_fallback(&options.default_stroke, &p.node_stroke),
            group_stroke: p.node_stroke.clone(),
            group_fill: p.surface.clone(),
            grid: p.surface.clone(),
            label_background: p.bg.clone(),
            background: Some(p.bg),
            text: p.text,
            text_secondary: p.text_secondary,
            line: p.line,
            arrow: p.arrow,
            group_header: p.group_header,
        }
    }
}

fn or_fallback(explicit: &Option<String>, fallback: &str) -> String {
    explicit.clone().unwrap_or_else(|| fallback.to_string())
}

/// Builds the SVG element tree for `layout`. Nothing is clipped here; edge
/// endpoints already sit on node outlines.
pub fn render_svg(layout: &GraphLayout, options: &SvgOptions) -> Element {
    let colors = Colors::resolve(options);
    let pad = options.canvas_padding;
    let width = layout.width + pad * 2.0;
    let height = layout.height + pad * 2.0;

    let mut svg = Element::new("svg")
        .attr("xmlns", SVG_NS)
        .attr("width", width)
        .attr("height", height)
        .attr("viewBox", format!("0 0 {} {}", fmt_num(width as f64), fmt_num(height as f64)));

    if layout.is_empty() {
        let fill = colors.background.as_deref().unwrap_or(FALLBACK_BACKGROUND);
        svg.push(background_rect(width, height, fill));
        return svg;
    }

    svg.push(Element::new("defs").child(arrow_marker(&colors.arrow)));
    if let Some(bg) = &colors.background {
        svg.push(background_rect(width, height, bg));
    }
    if options.include_grid {
        svg.push(grid(width, height, &colors.grid));
    }

    let mut content = Element::new("g").attr(
        "transform",
        format!("translate({},{})", fmt_num(pad as f64), fmt_num(pad as f64)),
    );
    if !layout.subgraphs.is_empty() {
        let mut group = Element::new("g").attr("class", "subgraphs");
        for sub in &layout.subgraphs {
            group.push(subgraph_element(sub, options, &colors));
        }
        content.push(group);
    }
    if !layout.edges.is_empty() {
        let mut group = Element::new("g").attr("class", "edges");
        for edge in &layout.edges {
            group.push(edge_element(edge, options, &colors));
        }
        content.push(group);
    }
    let mut nodes = Element::new("g").attr("class", "nodes");
    for node in &layout.nodes {
        nodes.push(node_element(node, options, &colors));
    }
    content.push(nodes);
    svg.push(content);
    svg
}

fn background_rect(width: f32, height: f32, fill: &str) -> Element {
    Element::new("rect")
        .attr("x", 0.0f32)
        .attr("y", 0.0f32)
        .attr("width", width)
        .attr("height", height)
        .attr("fill", fill)
}

/// Reusable marker for consumers that prefer `marker-end`; the drawing
/// itself uses explicit polygons.
fn arrow_marker(fill: &str) -> Element {
    let d = PathData::new()
        .move_to(Point::new(0.0, 0.0))
        .line_to(Point::new(ARROW_LENGTH, ARROW_HALF_BASE))
        .line_to(Point::new(0.0, ARROW_HALF_BASE * 2.0))
        .close();
    Element::new("marker")
        .attr("id", "arrow")
        .attr("viewBox", "0 0 10 10")
        .attr("refX", ARROW_LENGTH)
        .attr("refY", ARROW_HALF_BASE)
        .attr("markerWidth", 6.0f32)
        .attr("markerHeight", 6.0f32)
        .attr("orient", "auto-start-reverse")
        .child(Element::new("path").attr("d", d.to_string()).attr("fill", fill))
}

fn grid(width: f32, height: f32, stroke: &str) -> Element {
    let mut group = Element::new("g")
        .attr("class", "grid")
        .attr("stroke", stroke)
        .attr("stroke-width", 0.5f32);
    let mut x = 0.0f32;
    while x <= width {
        group.push(line(x, 0.0, x, height));
        x += GRID_STEP;
    }
    let mut y = 0.0f32;
    while y <= height {
        group.push(line(0.0, y, width, y));
        y += GRID_STEP;
    }
    group
}

fn line(x1: f32, y1: f32, x2: f32, y2: f32) -> Element {
    Element::new("line")
        .attr("x1", x1)
        .attr("y1", y1)
        .attr("x2", x2)
        .attr("y2", y2)
}

fn text_element(label: &str, x: f32, y: f32, fill: &str, options: &SvgOptions) -> Element {
    Element::new("text")
        .attr("x", x)
        .attr("y", y)
        .attr("font-family", options.font_family.as_str())
        .attr("font-size", options.font_size)
        .attr("fill", fill)
        .with_text(label)
}

fn subgraph_element(sub: &SubgraphPosition, options: &SvgOptions, colors: &Colors) -> Element {
    let fill = sub.fill.as_deref().unwrap_or(&colors.group_fill);
    let stroke = sub.stroke.as_deref().unwrap_or(&colors.group_stroke);
    let frame = Element::new("rect")
        .attr("x", sub.x)
        .attr("y", sub.y)
        .attr("width", sub.width)
        .attr("height", sub.height)
        .attr("rx", CLUSTER_CORNER_RADIUS)
        .attr("ry", CLUSTER_CORNER_RADIUS)
        .attr("fill", fill)
        .attr("stroke", stroke)
        .attr("stroke-width", options.default_stroke_width / 2.0);
    let header = Element::new("rect")
        .attr("x", sub.x)
        .attr("y", sub.y)
        .attr("width", sub.width)
        .attr("height", sub.label_height)
        .attr("rx", CLUSTER_CORNER_RADIUS)
        .attr("ry", CLUSTER_CORNER_RADIUS)
        .attr("fill", colors.group_header.as_str());
    let (_, baseline) = label_origin(&sub.label, 0.0, sub.y + sub.label_height / 2.0, options.font_size);
    let label = text_element(
        &sub.label,
        sub.x + CLUSTER_LABEL_INSET,
        baseline,
        &colors.text_secondary,
        options,
    );
    Element::new("g")
        .attr("class", "subgraph")
        .attr("id", sub.id.as_str())
        .child(frame)
        .child(header)
        .child(label)
}

fn edge_element(edge: &EdgePath, options: &SvgOptions, colors: &Colors) -> Element {
    let stroke_width = match edge.style {
        EdgeStyle::Thick => options.default_stroke_width * 2.0,
        _ => options.default_stroke_width,
    };
    let mut path = Element::new("path")
        .attr("d", PathData::from_edge(edge).to_string())
        .attr("fill", "none")
        .attr("stroke", colors.line.as_str())
        .attr("stroke-width", stroke_width);
    if edge.style == EdgeStyle::Dotted {
        path.set_attr("stroke-dasharray", DOTTED_DASH);
    }

    let mut group = Element::new("g")
        .attr("class", "edge")
        .attr("data-from", edge.from_id.as_str())
        .attr("data-to", edge.to_id.as_str())
        .child(path);
    if edge.arrow_end
        && let Some(head) = arrowhead(&edge.points, true)
    {
        group.push(arrow_polygon(&head, &colors.arrow));
    }
    if edge.arrow_start
        && let Some(head) = arrowhead(&edge.points, false)
    {
        group.push(arrow_polygon(&head, &colors.arrow));
    }
    if let Some(label) = edge.label.as_deref()
        && let Some(mid) = edge.midpoint()
    {
        let w = estimate_label_width(label, options.font_size) + EDGE_LABEL_PAD_X * 2.0;
        let h = options.font_size + EDGE_LABEL_PAD_Y * 2.0;
        group.push(
            Element::new("rect")
                .attr("class", "edge-label")
                .attr("x", mid.x - w / 2.0)
                .attr("y", mid.y - h / 2.0)
                .attr("width", w)
                .attr("height", h)
                .attr("fill", colors.label_background.as_str()),
        );
        let (x, y) = label_origin(label, mid.x, mid.y, options.font_size);
        group.push(text_element(label, x, y, &colors.text, options));
    }
    group
}

/// Triangle at the last (`at_end`) or first point, pointing along the
/// final segment. Degenerate segments are skipped until a direction is
/// found.
pub fn arrowhead(points: &[Point], at_end: bool) -> Option<[Point; 3]> {
    let ordered: Vec<Point> = if at_end {
        points.iter().rev().copied().collect()
    } else {
        points.to_vec()
    };
    let (tip, rest) = ordered.split_first()?;
    let from = rest.iter().find(|p| p.distance(*tip) > 1e-3)?;
    let len = from.distance(*tip);
    let (ux, uy) = ((tip.x - from.x) / len, (tip.y - from.y) / len);
    let base = Point::new(tip.x - ux * ARROW_LENGTH, tip.y - uy * ARROW_LENGTH);
    let (px, py) = (-uy * ARROW_HALF_BASE, ux * ARROW_HALF_BASE);
    Some([
        *tip,
        Point::new(base.x + px, base.y + py),
        Point::new(base.x - px, base.y - py),
    ])
}

fn points_attr(points: &[Point]) -> String {
    points.iter().map(|p| pt(*p)).collect::<Vec<_>>().join(" ")
}

fn arrow_polygon(head: &[Point; 3], fill: &str) -> Element {
    Element::new("polygon")
        .attr("class", "arrowhead")
        .attr("points", points_attr(head))
        .attr("fill", fill)
}

fn node_element(node: &NodePosition, options: &SvgOptions, colors: &Colors) -> Element {
    let fill = node.fill.as_deref().unwrap_or(&colors.node_fill);
    let stroke = node.stroke.as_deref().unwrap_or(&colors.node_stroke);
    let mut shape = shape_element(node);
    shape.set_attr("fill", fill);
    shape.set_attr("stroke", stroke);
    shape.set_attr("stroke-width", options.default_stroke_width);
    let (x, y) = label_origin(&node.label, node.x, node.y, options.font_size);
    Element::new("g")
        .attr("class", "node")
        .attr("id", node.id.as_str())
        .child(shape)
        .child(text_element(&node.label, x, y, &colors.text, options))
}

/// The outline element for one node. Composite shapes come back as a `<g>`
/// whose paint attributes are inherited by the parts.
fn shape_element(node: &NodePosition) -> Element {
    let bbox = node.bbox();
    let (x, y, w, h) = (bbox.left(), bbox.top(), bbox.width, bbox.height);
    match node.shape {
        NodeShape::Box => rect(&bbox, 0.0),
        NodeShape::Stadium => rect(&bbox, w.min(h) / 2.0),
        NodeShape::Circle => circle(node.x, node.y, w.min(h) / 2.0),
        NodeShape::Ellipse => Element::new("ellipse")
            .attr("cx", node.x)
            .attr("cy", node.y)
            .attr("rx", w / 2.0)
            .attr("ry", h / 2.0),
        NodeShape::DoubleCircle => {
            let r = w.min(h) / 2.0;
            Element::new("g")
                .attr("class", "double-circle")
                .child(circle(node.x, node.y, r))
                .child(circle(node.x, node.y, r * DOUBLE_CIRCLE_INNER_RATIO))
        }
        NodeShape::Subroutine => {
            let inset = w * SUBROUTINE_INSET_RATIO;
            Element::new("g")
                .attr("class", "subroutine")
                .child(rect(&bbox, 0.0))
                .child(line(x + inset, y, x + inset, y + h))
                .child(line(x + w - inset, y, x + w - inset, y + h))
        }
        NodeShape::Cylinder => {
            let rx = w / 2.0;
            let ry = h * CYLINDER_CAP_RATIO;
            let body = PathData::new()
                .move_to(Point::new(x, y + ry))
                .line_to(Point::new(x, y + h - ry))
                .arc_to(rx, ry, false, false, Point::new(x + w, y + h - ry))
                .line_to(Point::new(x + w, y + ry))
                .arc_to(rx, ry, false, false, Point::new(x, y + ry))
                .close();
            Element::new("g")
                .attr("class", "cylinder")
                .child(Element::new("path").attr("d", body.to_string()))
                .child(
                    Element::new("ellipse")
                        .attr("cx", node.x)
                        .attr("cy", y + ry)
                        .attr("rx", rx)
                        .attr("ry", ry),
                )
        }
        _ => match shape_polygon_points(node.shape, &bbox) {
            Some(points) => Element::new("polygon").attr("points", points_attr(&points)),
            None => rect(&bbox, 0.0),
        },
    }
}

fn rect(bbox: &NodeBox, radius: f32) -> Element {
    let mut el = Element::new("rect")
        .attr("x", bbox.left())
        .attr("y", bbox.top())
        .attr("width", bbox.width)
        .attr("height", bbox.height);
    if radius > 0.0 {
        el.set_attr("rx", radius);
        el.set_attr("ry", radius);
    }
    el
}

fn circle(cx: f32, cy: f32, r: f32) -> Element {
    Element::new("circle").attr("cx", cx).attr("cy", cy).attr("r", r)
}

/// Serializes an element tree as an SVG document.
pub fn to_svg_string(svg: &Element) -> String {
    svg.to_xml()
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
            tracing::debug!(path = %path.display(), bytes = svg.len(), "wrote svg");
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig, font_family: &str) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = font_family.to_string();

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let native = tree.size();
    let scale = render_cfg.scale_for(native.width(), native.height());
    let width = (native.width() * scale).ceil().max(1.0) as u32;
    let height = (native.height() * scale).ceil().max(1.0) as u32;
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::from_scale(scale, scale), &mut pixmap_mut);
    pixmap.save_png(output)?;
    tracing::debug!(path = %output.display(), width, height, scale, "wrote png");
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(_svg: &str, _output: &Path, _render_cfg: &RenderConfig, _font_family: &str) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}
