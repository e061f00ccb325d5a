//! Styled text layout, measurement, and rasterization.
//!
//! Glyphs are laid out with kerned advances and rasterized through `ab_glyph`
//! coverage callbacks. Stroked text is approximated by repainting the glyph
//! coverage at eight ring offsets in the stroke color beneath the fill pass,
//! which reads like a round-joined outline at the stroke widths this editor
//! uses.

use std::{
    collections::HashMap,
    f32::consts::FRAC_PI_4,
    sync::{Mutex, OnceLock},
};

use ab_glyph::{Font, FontArc, GlyphId, ScaleFont, point};

use crate::surface::{Color, Surface};

/// Fixed iteration budget for the auto-fit bisection. Behavior-visible: the
/// chosen size stabilizes only after exactly this many halvings.
pub const AUTO_FIT_STEPS: u32 = 8;
/// Smallest font size the auto-fit search will consider.
pub const AUTO_FIT_MIN_SIZE: f32 = 8.0;
/// Size the auto-fit search starts probing from.
pub const AUTO_FIT_START_SIZE: f32 = 50.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// Resolved style for one draw call.
#[derive(Clone, Debug)]
pub struct TextStyle {
    pub font_size: f32,
    pub fill: Color,
    pub stroke: Color,
    pub stroke_width: f32,
    pub align: TextAlign,
    /// Multiplier on the font's natural line height.
    pub line_height: f32,
}

/// Resolves family names to loaded fonts, backed by the system font database.
pub struct FontCatalog {
    db: fontdb::Database,
    resolved: Mutex<HashMap<String, Option<FontArc>>>,
}

impl FontCatalog {
    /// Catalog over the host's installed fonts.
    pub fn system() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        Self {
            db,
            resolved: Mutex::new(HashMap::new()),
        }
    }

    /// Empty catalog; families must be registered explicitly.
    pub fn empty() -> Self {
        Self {
            db: fontdb::Database::new(),
            resolved: Mutex::new(HashMap::new()),
        }
    }

    /// Process-wide system catalog, loaded once.
    pub fn shared() -> &'static FontCatalog {
        static SHARED: OnceLock<FontCatalog> = OnceLock::new();
        SHARED.get_or_init(FontCatalog::system)
    }

    /// Register font bytes under their own family name.
    pub fn register(&mut self, bytes: Vec<u8>) {
        self.db.load_font_data(bytes);
        self.resolved.lock().expect("font cache lock").clear();
    }

    /// Resolve a family name (or generic like `sans-serif`) to a font.
    pub fn resolve(&self, family: &str) -> Option<FontArc> {
        if let Some(hit) = self
            .resolved
            .lock()
            .expect("font cache lock")
            .get(family)
        {
            return hit.clone();
        }
        let named;
        let families: &[fontdb::Family] = match family {
            "sans-serif" => &[fontdb::Family::SansSerif],
            "serif" => &[fontdb::Family::Serif],
            "monospace" => &[fontdb::Family::Monospace],
            "cursive" => &[fontdb::Family::Cursive],
            other => {
                named = [fontdb::Family::Name(other), fontdb::Family::SansSerif];
                &named
            }
        };
        let query = fontdb::Query {
            families,
            weight: fontdb::Weight::NORMAL,
            stretch: fontdb::Stretch::Normal,
            style: fontdb::Style::Normal,
        };
        let font = self.db.query(&query).and_then(|id| {
            self.db
                .with_face_data(id, |data, index| {
                    FontArc::try_from_vec(data.to_vec()).ok().or_else(|| {
                        ab_glyph::FontVec::try_from_vec_and_index(data.to_vec(), index)
                            .ok()
                            .map(FontArc::from)
                    })
                })
                .flatten()
        });
        self.resolved
            .lock()
            .expect("font cache lock")
            .insert(family.to_string(), font.clone());
        font
    }
}

impl std::fmt::Debug for FontCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontCatalog")
            .field("faces", &self.db.len())
            .finish()
    }
}

/// Kerned left-aligned layout of a single line: `(glyph, x_offset)` pairs plus
/// total advance width.
fn layout_line(font: &FontArc, line: &str, font_size: f32) -> (Vec<(GlyphId, f32)>, f32) {
    let scaled = font.as_scaled(font_size);
    let mut glyphs = Vec::new();
    let mut cursor_x = 0.0f32;
    let mut last: Option<GlyphId> = None;
    for ch in line.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = last {
            cursor_x += scaled.kern(prev, id);
        }
        glyphs.push((id, cursor_x));
        cursor_x += scaled.h_advance(id);
        last = Some(id);
    }
    (glyphs, cursor_x)
}

/// Widest line of `text` at `font_size`, in pixels.
pub fn measure_text(font: &FontArc, text: &str, font_size: f32) -> f32 {
    text.split('\n')
        .map(|line| layout_line(font, line, font_size).1)
        .fold(0.0, f32::max)
}

/// Draw `text` with its block centered vertically on `cy` and each line
/// aligned relative to `cx`.
pub fn draw_text(
    surface: &mut Surface,
    font: &FontArc,
    text: &str,
    style: &TextStyle,
    cx: f32,
    cy: f32,
) {
    let scaled = font.as_scaled(style.font_size);
    let ascent = scaled.ascent();
    let descent = scaled.descent();
    let line_step = scaled.height() * style.line_height;

    let lines: Vec<&str> = text.split('\n').collect();
    let block_height = (ascent - descent) + line_step * (lines.len() as f32 - 1.0);
    let mut baseline = cy - block_height * 0.5 + ascent;

    for line in lines {
        let (glyphs, width) = layout_line(font, line, style.font_size);
        let origin_x = match style.align {
            TextAlign::Left => cx,
            TextAlign::Center => cx - width * 0.5,
            TextAlign::Right => cx - width,
        };

        if style.stroke_width > 0.0 && style.stroke.a > 0 {
            let r = style.stroke_width * 0.5;
            for k in 0..8 {
                let angle = k as f32 * FRAC_PI_4;
                draw_glyph_pass(
                    surface,
                    font,
                    &glyphs,
                    style.font_size,
                    origin_x + r * angle.cos(),
                    baseline + r * angle.sin(),
                    style.stroke,
                );
            }
        }
        draw_glyph_pass(
            surface,
            font,
            &glyphs,
            style.font_size,
            origin_x,
            baseline,
            style.fill,
        );

        baseline += line_step;
    }
}

fn draw_glyph_pass(
    surface: &mut Surface,
    font: &FontArc,
    glyphs: &[(GlyphId, f32)],
    font_size: f32,
    origin_x: f32,
    baseline_y: f32,
    color: Color,
) {
    for &(id, x) in glyphs {
        let glyph = id.with_scale_and_position(font_size, point(origin_x + x, baseline_y));
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            let (bx, by) = (bounds.min.x as i32, bounds.min.y as i32);
            outlined.draw(|px, py, cov| {
                surface.blend_coverage(bx + px as i32, by + py as i32, color, cov);
            });
        }
    }
}

/// Fixed-step bisection for the largest font size whose measured width stays
/// at or below `desired_width`.
///
/// Runs exactly `steps` measured halvings regardless of convergence: when the
/// probe measures under the target the floor moves up to the probe, otherwise
/// the ceiling moves down to it, and the next probe lands halfway toward the
/// opposite bound. Returns the largest probed size that fit, or `floor` when
/// nothing fit.
pub fn fit_font_size(
    measure: impl Fn(f32) -> f32,
    desired_width: f32,
    start: f32,
    floor: f32,
    ceil: f32,
    steps: u32,
) -> f32 {
    let mut size = start.clamp(floor, ceil);
    let mut lo = floor;
    let mut hi = ceil;
    let mut best = floor;
    for _ in 0..steps {
        let width = measure(size);
        if width <= desired_width {
            best = best.max(size);
            let next = size + (hi - size) * 0.5;
            lo = size;
            size = next;
        } else {
            let next = size + (lo - size) * 0.5;
            hi = size;
            size = next;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_converges_below_target_width() {
        // width grows linearly with size, so the ideal answer is exactly 200.
        let measure = |size: f32| size;
        let fitted = fit_font_size(
            measure,
            200.0,
            AUTO_FIT_START_SIZE,
            AUTO_FIT_MIN_SIZE,
            256.0,
            AUTO_FIT_STEPS,
        );
        assert!(measure(fitted) <= 200.0);
        // within one bisection step of the largest fitting size
        assert!(fitted > 200.0 - 256.0 / 2f32.powi(AUTO_FIT_STEPS as i32 - 2));
    }

    #[test]
    fn fit_is_monotone_in_target() {
        let measure = |size: f32| size * 1.7;
        let wide = fit_font_size(measure, 200.0, 50.0, 8.0, 256.0, AUTO_FIT_STEPS);
        let narrow = fit_font_size(measure, 100.0, 50.0, 8.0, 256.0, AUTO_FIT_STEPS);
        assert!(wide > narrow);
        assert!(measure(wide) <= 200.0);
        assert!(measure(narrow) <= 100.0);
    }

    #[test]
    fn fit_returns_floor_when_nothing_fits() {
        let fitted = fit_font_size(|_| 1000.0, 10.0, 50.0, 8.0, 256.0, AUTO_FIT_STEPS);
        assert_eq!(fitted, 8.0);
    }

    #[test]
    fn fit_runs_the_full_step_budget() {
        let calls = std::cell::Cell::new(0u32);
        let counting = |size: f32| {
            calls.set(calls.get() + 1);
            size
        };
        fit_font_size(counting, 200.0, 50.0, 8.0, 256.0, AUTO_FIT_STEPS);
        assert_eq!(calls.get(), AUTO_FIT_STEPS);
    }

    #[test]
    fn measure_unknown_family_resolves_to_none_on_empty_catalog() {
        let catalog = FontCatalog::empty();
        assert!(catalog.resolve("No Such Family").is_none());
    }
}
