//! Image layers: fetch + decode in the compute step, scaled blit at draw.
//!
//! The compute step never fails past this boundary: a bad source or corrupt
//! payload yields a clearly labeled placeholder bitmap so the rest of the
//! pipeline keeps rendering.

use base64::Engine as _;

use crate::{
    cache::CacheEntry,
    error::{LaminaError, LaminaResult},
    plugins::ComputedValue,
    surface::{Bitmap, Color, Surface},
    text::{FontCatalog, TextAlign, TextStyle, draw_text},
};

/// Edge length of the generated error placeholder.
pub const PLACEHOLDER_SIZE: u32 = 256;

/// An image layer's single editable parameter: where the pixels come from.
/// Accepts an `http(s)` URL, a `data:` URI, or a local file path; all three
/// resolve through the same fetch-and-decode compute step.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImageOptions {
    pub src: String,
}

impl ImageOptions {
    #[tracing::instrument(skip(self), fields(src = %self.src))]
    pub(crate) async fn compute(&self) -> CacheEntry {
        let bitmap = match fetch_bytes(&self.src).await {
            Ok(bytes) => match Bitmap::decode(&bytes) {
                Ok(bitmap) => bitmap,
                Err(err) => {
                    tracing::warn!(src = %self.src, %err, "image decode failed");
                    placeholder_bitmap("bad image")
                }
            },
            Err(err) => {
                tracing::warn!(src = %self.src, %err, "image fetch failed");
                placeholder_bitmap("bad url")
            }
        };
        CacheEntry::new(ComputedValue::Image(bitmap))
    }

    pub(crate) fn draw(&self, surface: &mut Surface, computed: Option<&ComputedValue>) {
        let Some(bitmap) = computed.and_then(ComputedValue::as_image) else {
            tracing::debug!(src = %self.src, "image layer drawn before compute, skipping");
            return;
        };
        surface.draw_bitmap_fit(bitmap);
    }
}

/// Resolve the source to raw encoded bytes. Remote fetches send no
/// credentials.
async fn fetch_bytes(src: &str) -> LaminaResult<Vec<u8>> {
    if let Some(rest) = src.strip_prefix("data:") {
        return decode_data_uri(rest);
    }
    if src.starts_with("http://") || src.starts_with("https://") {
        let response = reqwest::get(src)
            .await
            .map_err(|err| LaminaError::validation(format!("fetch '{src}': {err}")))?;
        if !response.status().is_success() {
            return Err(LaminaError::validation(format!(
                "fetch '{src}': HTTP {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| LaminaError::validation(format!("read body of '{src}': {err}")))?;
        return Ok(bytes.to_vec());
    }
    tokio::fs::read(src)
        .await
        .map_err(|err| LaminaError::validation(format!("read file '{src}': {err}")))
}

fn decode_data_uri(rest: &str) -> LaminaResult<Vec<u8>> {
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| LaminaError::validation("data uri without payload"))?;
    if meta.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|err| LaminaError::validation(format!("data uri base64: {err}")))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

/// Red panel with a black frame, cross, and (font permitting) a label.
/// Distinct from any decodable source so failures are visible in the output.
fn placeholder_bitmap(label: &str) -> Bitmap {
    let side = PLACEHOLDER_SIZE;
    let mut surface = Surface::new(side, side);
    surface.fill(Color::RED);

    let border = 8;
    surface.fill_rect(0, 0, side, border, Color::BLACK);
    surface.fill_rect(0, (side - border) as i32, side, border, Color::BLACK);
    surface.fill_rect(0, 0, border, side, Color::BLACK);
    surface.fill_rect((side - border) as i32, 0, border, side, Color::BLACK);
    for i in 0..side as i32 {
        surface.fill_rect(i - 2, i, 4, 1, Color::BLACK);
        surface.fill_rect(side as i32 - i - 2, i, 4, 1, Color::BLACK);
    }

    if let Some(font) = FontCatalog::shared().resolve("monospace") {
        let style = TextStyle {
            font_size: (side as f32 / label.len().max(1) as f32).min(48.0),
            fill: Color::WHITE,
            stroke: Color::BLACK,
            stroke_width: 4.0,
            align: TextAlign::Center,
            line_height: 1.1,
        };
        draw_text(
            &mut surface,
            &font,
            label,
            &style,
            side as f32 * 0.5,
            side as f32 * 0.5,
        );
    }

    surface.to_bitmap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_base64_decodes() {
        let bytes = decode_data_uri("image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn data_uri_without_comma_is_an_error() {
        assert!(decode_data_uri("image/png;base64").is_err());
    }

    #[test]
    fn placeholder_is_painted() {
        let bmp = placeholder_bitmap("bad url");
        assert_eq!(bmp.width, PLACEHOLDER_SIZE);
        assert_eq!(bmp.height, PLACEHOLDER_SIZE);
        // interior is red, frame is black
        assert_eq!(bmp.pixel(128, 20), [255, 0, 0, 255]);
        assert_eq!(bmp.pixel(128, 2), [0, 0, 0, 255]);
    }
}
