use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static HEX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#?([0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").unwrap());

/// Share of the foreground color (percent) in each derived slot.
pub const MIX_TEXT_SECONDARY: f32 = 60.0;
pub const MIX_TEXT_MUTED: f32 = 40.0;
pub const MIX_LINE: f32 = 30.0;
pub const MIX_ARROW: f32 = 50.0;
pub const MIX_NODE_FILL: f32 = 3.0;
pub const MIX_NODE_STROKE: f32 = 20.0;
pub const MIX_GROUP_HEADER: f32 = 5.0;
pub const MIX_SURFACE: f32 = 8.0;

pub const DEFAULT_THEME_NAME: &str = "zinc-light";
const DEFAULT_BG: &str = "#ffffff";
const DEFAULT_FG: &str = "#27272a";

/// Named (bg, fg) foundation pairs.
static NAMED_THEMES: &[(&str, &str, &str)] = &[
    ("zinc-light", "#ffffff", "#27272a"),
    ("zinc-dark", "#18181b", "#fafafa"),
    ("tokyo-night", "#1a1b26", "#a9b1d6"),
    ("tokyo-night-storm", "#24283b", "#a9b1d6"),
    ("tokyo-night-light", "#d5d6db", "#343b58"),
    ("catppuccin-mocha", "#1e1e2e", "#cdd6f4"),
    ("catppuccin-latte", "#eff1f5", "#4c4f69"),
    ("nord", "#2e3440", "#d8dee9"),
    ("nord-light", "#eceff4", "#2e3440"),
    ("dracula", "#282a36", "#f8f8f2"),
    ("github-light", "#ffffff", "#1f2328"),
    ("github-dark", "#0d1117", "#e6edf3"),
    ("solarized-light", "#fdf6e3", "#657b83"),
    ("solarized-dark", "#002b36", "#839496"),
    ("one-dark", "#282c34", "#abb2bf"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

pub fn parse_hex_color(input: &str) -> Option<Rgb> {
    let caps = HEX_RE.captures(input.trim())?;
    let digits = caps.get(1)?.as_str();
    let expanded: String = if digits.len() == 3 {
        digits.chars().flat_map(|c| [c, c]).collect()
    } else {
        digits.to_string()
    };
    let channel = |idx: usize| u8::from_str_radix(&expanded[idx..idx + 2], 16).ok();
    Some(Rgb {
        r: channel(0)?,
        g: channel(2)?,
        b: channel(4)?,
    })
}

/// Per-channel linear interpolation: `pct` percent of `fg` over `bg`.
pub fn mix(fg: Rgb, bg: Rgb, pct: f32) -> Rgb {
    let t = (pct / 100.0).clamp(0.0, 1.0);
    let lerp = |f: u8, b: u8| -> u8 {
        let value = b as f32 + (f as f32 - b as f32) * t;
        value.round().clamp(0.0, 255.0) as u8
    };
    Rgb {
        r: lerp(fg.r, bg.r),
        g: lerp(fg.g, bg.g),
        b: lerp(fg.b, bg.b),
    }
}

/// Foundation colors plus optional explicit overrides for derived slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub name: String,
    pub bg: String,
    pub fg: String,
    pub line: Option<String>,
    pub accent: Option<String>,
    pub muted: Option<String>,
    pub surface: Option<String>,
    pub border: Option<String>,
}

impl Default for Theme {
    fn default() -> Self {
        Self::from_colors(DEFAULT_THEME_NAME, DEFAULT_BG, DEFAULT_FG)
    }
}

impl Theme {
    pub fn from_colors(name: &str, bg: &str, fg: &str) -> Self {
        Self {
            name: name.to_string(),
            bg: bg.to_string(),
            fg: fg.to_string(),
            line: None,
            accent: None,
            muted: None,
            surface: None,
            border: None,
        }
    }

    /// Looks a theme up by name. Unknown names fall back to the default
    /// light theme.
    pub fn named(name: &str) -> Self {
        match Self::lookup(name) {
            Some(theme) => theme,
            None => {
                tracing::warn!(theme = name, fallback = DEFAULT_THEME_NAME, "unknown theme");
                Self::default()
            }
        }
    }

    pub fn lookup(name: &str) -> Option<Self> {
        let key = name.trim().to_ascii_lowercase();
        NAMED_THEMES
            .iter()
            .find(|(theme, _, _)| *theme == key)
            .map(|(theme, bg, fg)| Self::from_colors(theme, bg, fg))
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        NAMED_THEMES.iter().map(|(name, _, _)| *name)
    }
}

/// Colors derived from a [`Theme`]; computed once per render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Palette {
    pub bg: String,
    pub fg: String,
    pub text: String,
    pub text_secondary: String,
    pub text_muted: String,
    pub line: String,
    pub arrow: String,
    pub node_fill: String,
    pub node_stroke: String,
    pub group_header: String,
    pub surface: String,
}

impl Palette {
    pub fn derive(theme: &Theme) -> Self {
        let default_bg = parse_hex_color(DEFAULT_BG).unwrap_or(Rgb { r: 255, g: 255, b: 255 });
        let default_fg = parse_hex_color(DEFAULT_FG).unwrap_or(Rgb { r: 39, g: 39, b: 42 });
        let bg = foundation(&theme.bg, "bg", default_bg);
        let fg = foundation(&theme.fg, "fg", default_fg);
        let derived = |pct: f32| mix(fg, bg, pct).to_hex();
        let explicit = |slot: &Option<String>, name: &str| -> Option<String> {
            let value = slot.as_deref()?;
            match parse_hex_color(value) {
                Some(rgb) => Some(rgb.to_hex()),
                None => {
                    tracing::warn!(slot = name, value, "ignoring malformed theme color");
                    None
                }
            }
        };

        let line = explicit(&theme.line, "line").unwrap_or_else(|| derived(MIX_LINE));
        let arrow = explicit(&theme.accent, "accent").unwrap_or_else(|| derived(MIX_ARROW));
        let text_muted =
            explicit(&theme.muted, "muted").unwrap_or_else(|| derived(MIX_TEXT_MUTED));
        let surface = explicit(&theme.surface, "surface").unwrap_or_else(|| derived(MIX_SURFACE));
        let node_stroke =
            explicit(&theme.border, "border").unwrap_or_else(|| derived(MIX_NODE_STROKE));

        Self {
            bg: bg.to_hex(),
            fg: fg.to_hex(),
            text: fg.to_hex(),
            text_secondary: derived(MIX_TEXT_SECONDARY),
            text_muted,
            line,
            arrow,
            node_fill: derived(MIX_NODE_FILL),
            node_stroke,
            group_header: derived(MIX_GROUP_HEADER),
            surface,
        }
    }
}

fn foundation(value: &str, slot: &str, fallback: Rgb) -> Rgb {
    match parse_hex_color(value) {
        Some(rgb) => rgb,
        None => {
            tracing::warn!(slot, value, "malformed foundation color, using default");
            fallback
        }
    }
}
