use crate::config::{Config, load_config};
use crate::element::Element;
use crate::ir::Direction;
use crate::layout::compute_layout;
use crate::layout_dump::write_layout_dump;
use crate::render::{render_svg, to_svg_string, write_output_png, write_output_svg};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dagsvg", version, about = "Layered graph layout to SVG")]
pub struct Args {
    /// Graph description (.xml or .json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file (svg/png). Defaults to stdout for SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config file (.json or .json5)
    #[arg(short = 'c', long = "config", alias = "configFile")]
    pub config: Option<PathBuf>,

    /// PNG width in pixels (scaled to fit)
    #[arg(short = 'w', long = "width")]
    pub width: Option<f32>,

    /// PNG height in pixels (scaled to fit)
    #[arg(short = 'H', long = "height")]
    pub height: Option<f32>,

    /// Named color theme, e.g. tokyo-night
    #[arg(short = 't', long = "theme")]
    pub theme: Option<String>,

    /// Layout direction: TB, LR, BT or RL
    #[arg(short = 'd', long = "direction")]
    pub direction: Option<String>,

    /// Draw edges as cubic splines
    #[arg(long = "splines")]
    pub splines: bool,

    /// Draw a background grid
    #[arg(long = "grid")]
    pub grid: bool,

    /// Also write the computed layout as JSON
    #[arg(long = "dump-layout")]
    pub dump_layout: Option<PathBuf>,

    /// Log pipeline details to stderr
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = load_config(args.config.as_deref())
        .with_context(|| format!("failed to load config {:?}", args.config))?;
    apply_overrides(&mut config, &args)?;

    let (input, is_json) = read_input(args.input.as_deref())?;
    let root = parse_graph(&input, is_json)?;
    let layout = compute_layout(Some(&root), &config.layout)?;
    tracing::debug!(
        nodes = layout.nodes.len(),
        edges = layout.edges.len(),
        width = layout.width,
        height = layout.height,
        "layout complete"
    );
    if let Some(path) = args.dump_layout.as_deref() {
        write_layout_dump(path, &layout)?;
    }

    let svg = to_svg_string(&render_svg(&layout, &config.svg));
    match args.output_format {
        OutputFormat::Svg => write_output_svg(&svg, args.output.as_deref())?,
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            write_output_png(&svg, &output, &config.render, &config.svg.font_family)?;
        }
    }
    Ok(())
}

/// `RUST_LOG` wins; otherwise warnings only, or debug with `--verbose`.
fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn apply_overrides(config: &mut Config, args: &Args) -> Result<()> {
    if let Some(name) = args.theme.as_deref() {
        config.set_theme(name);
    }
    if let Some(token) = args.direction.as_deref() {
        config.layout.direction = Direction::from_token(token)
            .ok_or_else(|| anyhow::anyhow!("unknown direction {token:?} (expected TB, LR, BT or RL)"))?;
    }
    if args.splines {
        config.layout.use_splines = true;
    }
    if args.grid {
        config.svg.include_grid = true;
    }
    if args.width.is_some() {
        config.render.width = args.width;
    }
    if args.height.is_some() {
        config.render.height = args.height;
    }
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<(String, bool)> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        return Ok((content, is_json));
    }

    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    let is_json = buf.trim_start().starts_with('{');
    Ok((buf, is_json))
}

fn parse_graph(input: &str, is_json: bool) -> Result<Element> {
    let root = if is_json {
        Element::from_json(input)?
    } else {
        Element::parse_xml(input)?
    };
    Ok(root)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}
