use crate::ir::Direction;
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Accepted spellings of the layered (Sugiyama) algorithm.
pub const ALGORITHM_ALIASES: [&str; 4] = ["dagre", "dot", "hierarchical", "layered"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutOptions {
    pub algorithm: String,
    pub direction: Direction,
    pub node_sep: f32,
    pub rank_sep: f32,
    pub edge_sep: f32,
    pub use_splines: bool,
    pub max_iterations: usize,
    /// Font size used to estimate label widths when sizing nodes.
    pub font_size: f32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            algorithm: "dagre".to_string(),
            direction: Direction::TopDown,
            node_sep: 60.0,
            rank_sep: 80.0,
            edge_sep: 10.0,
            use_splines: false,
            max_iterations: 100,
            font_size: 14.0,
        }
    }
}

impl LayoutOptions {
    pub fn algorithm_is_supported(&self) -> bool {
        let name = self.algorithm.trim().to_ascii_lowercase();
        ALGORITHM_ALIASES.contains(&name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SvgOptions {
    pub canvas_padding: f32,
    pub default_fill: Option<String>,
    pub default_stroke: Option<String>,
    pub default_stroke_width: f32,
    pub font_family: String,
    pub font_size: f32,
    pub include_grid: bool,
    pub theme: Option<Theme>,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self {
            canvas_padding: 20.0,
            default_fill: None,
            default_stroke: None,
            default_stroke_width: 2.0,
            font_family: "Arial".to_string(),
            font_size: 14.0,
            include_grid: false,
            theme: None,
        }
    }
}

/// Raster output size. Unset sides follow the SVG's own size; with both
/// set the image is scaled to fit inside the box, keeping its aspect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: Option<f32>,
    pub height: Option<f32>,
}

impl RenderConfig {
    /// Uniform scale applied to a drawing of `width` x `height`.
    pub fn scale_for(&self, width: f32, height: f32) -> f32 {
        let sx = self.width.filter(|w| *w > 0.0 && width > 0.0).map(|w| w / width);
        let sy = self.height.filter(|h| *h > 0.0 && height > 0.0).map(|h| h / height);
        match (sx, sy) {
            (Some(sx), Some(sy)) => sx.min(sy),
            (Some(s), None) | (None, Some(s)) => s,
            (None, None) => 1.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub layout: LayoutOptions,
    pub svg: SvgOptions,
    pub render: RenderConfig,
}

impl Config {
    /// Applies a named theme. Unknown names fall back to the default theme.
    pub fn set_theme(&mut self, name: &str) {
        self.svg.theme = Some(Theme::named(name));
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ThemeColorsFile {
    bg: Option<String>,
    fg: Option<String>,
    line: Option<String>,
    accent: Option<String>,
    muted: Option<String>,
    surface: Option<String>,
    border: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_colors: Option<ThemeColorsFile>,
    layout: Option<LayoutOptions>,
    svg: Option<SvgOptions>,
    render: Option<RenderConfig>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    let is_json5 = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json5"))
        .unwrap_or(false);
    parse_config(&contents, is_json5)
}

pub fn parse_config(contents: &str, is_json5: bool) -> anyhow::Result<Config> {
    let parsed: ConfigFile = if is_json5 {
        json5::from_str(contents)?
    } else {
        serde_json::from_str(contents)?
    };

    let mut config = Config::default();
    if let Some(layout) = parsed.layout {
        config.layout = layout;
    }
    if let Some(svg) = parsed.svg {
        config.svg = svg;
    }
    if let Some(render) = parsed.render {
        config.render = render;
    }
    if let Some(name) = parsed.theme.as_deref() {
        config.set_theme(name);
    }
    if let Some(colors) = parsed.theme_colors {
        let mut theme = config.svg.theme.take().unwrap_or_default();
        if parsed.theme.is_none() {
            theme.name = "custom".to_string();
        }
        if let Some(v) = colors.bg {
            theme.bg = v;
        }
        if let Some(v) = colors.fg {
            theme.fg = v;
        }
        if colors.line.is_some() {
            theme.line = colors.line;
        }
        if colors.accent.is_some() {
            theme.accent = colors.accent;
        }
        if colors.muted.is_some() {
            theme.muted = colors.muted;
        }
        if colors.surface.is_some() {
            theme.surface = colors.surface;
        }
        if colors.border.is_some() {
            theme.border = colors.border;
        }
        config.svg.theme = Some(theme);
    }
    Ok(config)
}
