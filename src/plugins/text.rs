use crate::{
    surface::{Color, Surface},
    text::{
        AUTO_FIT_MIN_SIZE, AUTO_FIT_START_SIZE, AUTO_FIT_STEPS, FontCatalog, TextAlign,
        TextStyle, draw_text, fit_font_size, measure_text,
    },
};

/// Styled text centered on the surface. Styling resolves synchronously at
/// draw time; there is no compute step.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TextOptions {
    pub text: String,
    /// When set, the font size is re-derived at draw time so the widest line
    /// spans the surface width.
    pub auto_fit_text: bool,
    pub font_size: f32,
    pub font_family: String,
    pub fill_style: Color,
    pub stroke_style: Color,
    pub stroke_width: f32,
    pub text_align: TextAlign,
    pub line_height: f32,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            text: String::new(),
            auto_fit_text: false,
            font_size: 24.0,
            font_family: "sans-serif".to_string(),
            fill_style: Color::WHITE,
            stroke_style: Color::BLACK,
            stroke_width: 4.0,
            text_align: TextAlign::Center,
            line_height: 1.1,
        }
    }
}

impl TextOptions {
    pub(crate) fn draw(&self, surface: &mut Surface, fonts: &FontCatalog) {
        let Some(font) = fonts.resolve(&self.font_family) else {
            tracing::debug!(family = %self.font_family, "no font resolved, skipping text layer");
            return;
        };

        let font_size = if self.auto_fit_text {
            fit_font_size(
                |size| measure_text(&font, &self.text, size),
                surface.width() as f32,
                AUTO_FIT_START_SIZE,
                AUTO_FIT_MIN_SIZE,
                surface.width() as f32,
                AUTO_FIT_STEPS,
            )
        } else {
            self.font_size
        };

        let style = TextStyle {
            font_size,
            fill: self.fill_style,
            stroke: self.stroke_style,
            stroke_width: self.stroke_width,
            align: self.text_align,
            line_height: self.line_height,
        };
        let cx = surface.width() as f32 * 0.5;
        let cy = surface.height() as f32 * 0.5;
        draw_text(surface, &font, &self.text, &style, cx, cy);
    }
}
