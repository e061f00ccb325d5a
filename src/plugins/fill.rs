use crate::surface::{Color, Surface};

/// Solid fill over the surface's full extent. No compute step.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FillOptions {
    pub fill_style: Color,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            fill_style: Color::TRANSPARENT,
        }
    }
}

impl FillOptions {
    pub(crate) fn draw(&self, surface: &mut Surface) {
        surface.fill(self.fill_style);
    }
}
