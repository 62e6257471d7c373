use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use dagsvg::config::{LayoutOptions, SvgOptions};
use dagsvg::element::Element;
use dagsvg::ir::Direction;
use dagsvg::layout::compute_layout;
use dagsvg::render::{render_svg, to_svg_string};
use dagsvg::theme::Theme;
use std::hint::black_box;

const SHAPES: [&str; 6] = ["box", "diamond", "circle", "hexagon", "stadium", "cylinder"];

/// A chain of `nodes` plus `extra_edges` skip edges and a few feedback
/// edges, which exercises waypoints and back-edge lanes.
fn dense_graph_xml(nodes: usize, extra_edges: usize) -> String {
    let mut out = String::from("<graph directed=\"true\">");
    for i in 0..nodes {
        out.push_str(&format!("<node id=\"N{i}\" label=\"Node {i}\" shape=\"{}\"/>", SHAPES[i % SHAPES.len()]));
    }
    for i in 0..nodes.saturating_sub(1) {
        out.push_str(&format!("<edge from=\"N{i}\" to=\"N{}\"/>", i + 1));
    }
    let mut count = 0usize;
    'outer: for i in 0..nodes {
        for j in (i + 2)..nodes {
            if count >= extra_edges {
                break 'outer;
            }
            out.push_str(&format!("<edge from=\"N{i}\" to=\"N{j}\"/>"));
            count += 1;
        }
    }
    for i in (nodes / 2..nodes).step_by(7) {
        out.push_str(&format!("<edge from=\"N{i}\" to=\"N{}\"/>", i / 3));
    }
    out.push_str("</graph>");
    out
}

/// `groups` clusters of `per_group` nodes wired to the next cluster.
fn clustered_graph_xml(groups: usize, per_group: usize) -> String {
    let mut out = String::from("<graph>");
    for g in 0..groups {
        out.push_str(&format!("<subgraph id=\"G{g}\" label=\"Group {g}\">"));
        for n in 0..per_group {
            out.push_str(&format!("<node id=\"G{g}N{n}\"/>"));
        }
        out.push_str("</subgraph>");
    }
    for g in 0..groups {
        for n in 0..per_group.saturating_sub(1) {
            out.push_str(&format!("<edge from=\"G{g}N{n}\" to=\"G{g}N{}\"/>", n + 1));
        }
        if g + 1 < groups {
            out.push_str(&format!("<edge from=\"G{g}N0\" to=\"G{}N{}\"/>", g + 1, per_group / 2));
        }
    }
    out.push_str("</graph>");
    out
}

fn fixtures() -> Vec<(&'static str, Element)> {
    [
        ("chain_10", dense_graph_xml(10, 0)),
        ("dense_30", dense_graph_xml(30, 40)),
        ("dense_100", dense_graph_xml(100, 150)),
        ("clusters_8x6", clustered_graph_xml(8, 6)),
    ]
    .into_iter()
    .map(|(name, xml)| (name, Element::parse_xml(&xml).expect("fixture parses")))
    .collect()
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    let xml = dense_graph_xml(100, 150);
    group.bench_function("dense_100", |b| {
        b.iter(|| {
            let root = Element::parse_xml(black_box(&xml)).expect("parse failed");
            black_box(root.children.len());
        });
    });
    group.finish();
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let options = LayoutOptions::default();
    for (name, root) in fixtures() {
        group.bench_with_input(BenchmarkId::from_parameter(name), &root, |b, root| {
            b.iter(|| {
                let layout = compute_layout(Some(black_box(root)), &options).expect("layout failed");
                black_box(layout.nodes.len());
            });
        });
    }
    group.finish();
}

fn bench_layout_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout_modes");
    let root = Element::parse_xml(&dense_graph_xml(30, 40)).expect("fixture parses");
    for (label, direction, use_splines) in [
        ("tb_polyline", Direction::TopDown, false),
        ("lr_polyline", Direction::LeftRight, false),
        ("tb_splines", Direction::TopDown, true),
    ] {
        let options = LayoutOptions {
            direction,
            use_splines,
            ..LayoutOptions::default()
        };
        group.bench_function(label, |b| {
            b.iter(|| {
                let layout = compute_layout(Some(black_box(&root)), &options).expect("layout failed");
                black_box(layout.edges.len());
            });
        });
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    let svg_options = SvgOptions {
        theme: Some(Theme::named("tokyo-night")),
        ..SvgOptions::default()
    };
    for (name, root) in fixtures() {
        let layout = compute_layout(Some(&root), &LayoutOptions::default()).expect("layout failed");
        group.bench_with_input(BenchmarkId::from_parameter(name), &layout, |b, layout| {
            b.iter(|| {
                let svg = to_svg_string(&render_svg(black_box(layout), &svg_options));
                black_box(svg.len());
            });
        });
    }
    group.finish();
}

fn bench_end_to_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("end_to_end");
    let xml = clustered_graph_xml(8, 6);
    let options = LayoutOptions::default();
    let svg_options = SvgOptions::default();
    group.bench_function("clusters_8x6", |b| {
        b.iter(|| {
            let root = Element::parse_xml(black_box(&xml)).expect("parse failed");
            let layout = compute_layout(Some(&root), &options).expect("layout failed");
            let svg = to_svg_string(&render_svg(&layout, &svg_options));
            black_box(svg.len());
        });
    });
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_parse, bench_layout, bench_layout_modes, bench_render, bench_end_to_end
);
criterion_main!(benches);
