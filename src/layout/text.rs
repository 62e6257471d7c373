/// Average glyph advance as a fraction of the font size.
pub const CHAR_WIDTH_FACTOR: f32 = 0.55;
/// Baseline offset that visually centers a single line on a point.
pub const BASELINE_FACTOR: f32 = 0.35;
/// Horizontal inset between a label and its node outline.
pub const LABEL_INSET: f32 = 16.0;

pub fn char_count(text: &str) -> usize {
    text.chars().count()
}

pub fn estimate_label_width(text: &str, font_size: f32) -> f32 {
    char_count(text) as f32 * font_size * CHAR_WIDTH_FACTOR
}

/// Node width that fits `text` with the label inset on both sides.
pub fn fitted_node_width(text: &str, font_size: f32, min_width: f32) -> f32 {
    let needed = estimate_label_width(text, font_size) + LABEL_INSET * 2.0;
    min_width.max(needed.ceil())
}

/// Top-left anchor of a label centered on `(cx, cy)` without relying on
/// `text-anchor`.
pub fn label_origin(text: &str, cx: f32, cy: f32, font_size: f32) -> (f32, f32) {
    let x = cx - estimate_label_width(text, font_size) / 2.0;
    let y = cy + BASELINE_FACTOR * font_size;
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_scales_with_font_size() {
        let w14 = estimate_label_width("Hello", 14.0);
        let w28 = estimate_label_width("Hello", 28.0);
        assert!((w28 - w14 * 2.0).abs() < 0.01);
        assert!((w14 - 5.0 * 14.0 * 0.55).abs() < 0.01);
    }

    #[test]
    fn counts_chars_not_bytes() {
        assert_eq!(char_count("héllo"), 5);
        assert_eq!(char_count("\u{4e2d}\u{6587}"), 2);
    }

    #[test]
    fn short_labels_keep_minimum_width() {
        assert_eq!(fitted_node_width("A", 14.0, 80.0), 80.0);
        assert!(fitted_node_width("a considerably longer label", 14.0, 80.0) > 80.0);
    }

    #[test]
    fn label_origin_matches_manual_centering() {
        let (x, y) = label_origin("AB", 100.0, 50.0, 14.0);
        assert!((x - (100.0 - 0.55 * 14.0 * 2.0 / 2.0)).abs() < 1e-4);
        assert!((y - (50.0 + 0.35 * 14.0)).abs() < 1e-4);
    }
}
