//! CPU raster surface and pixel types.
//!
//! Everything here works on premultiplied RGBA8 with integer blend math, so
//! repeated renders of the same layer stack are bit-exact.

use std::{io::Cursor, path::Path, sync::Arc};

use anyhow::Context as _;

use crate::error::{LaminaError, LaminaResult};

/// Straight-alpha RGBA8 color parsed from a CSS-like string.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::new(0, 0, 0, 0);
    pub const BLACK: Color = Color::new(0, 0, 0, 255);
    pub const WHITE: Color = Color::new(255, 255, 255, 255);
    pub const RED: Color = Color::new(255, 0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rgb`, `#rrggbb`, `#rrggbbaa`, or one of a small named set.
    pub fn parse(s: &str) -> LaminaResult<Self> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return Self::parse_hex(hex)
                .ok_or_else(|| LaminaError::validation(format!("bad color literal '{s}'")));
        }
        match s.to_ascii_lowercase().as_str() {
            "transparent" => Ok(Self::TRANSPARENT),
            "black" => Ok(Self::BLACK),
            "white" => Ok(Self::WHITE),
            "red" => Ok(Self::RED),
            "green" => Ok(Self::new(0, 128, 0, 255)),
            "lime" => Ok(Self::new(0, 255, 0, 255)),
            "blue" => Ok(Self::new(0, 0, 255, 255)),
            "yellow" => Ok(Self::new(255, 255, 0, 255)),
            "purple" => Ok(Self::new(128, 0, 128, 255)),
            "orange" => Ok(Self::new(255, 165, 0, 255)),
            "magenta" => Ok(Self::new(255, 0, 255, 255)),
            "cyan" => Ok(Self::new(0, 255, 255, 255)),
            "gray" | "grey" => Ok(Self::new(128, 128, 128, 255)),
            _ => Err(LaminaError::validation(format!("unknown color name '{s}'"))),
        }
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        let nibble = |c: u8| (c as char).to_digit(16).map(|d| d as u8);
        let byte = |hi: u8, lo: u8| Some(nibble(hi)? * 16 + nibble(lo)?);
        let b = hex.as_bytes();
        match b.len() {
            3 => Some(Self::new(
                byte(b[0], b[0])?,
                byte(b[1], b[1])?,
                byte(b[2], b[2])?,
                255,
            )),
            6 => Some(Self::new(
                byte(b[0], b[1])?,
                byte(b[2], b[3])?,
                byte(b[4], b[5])?,
                255,
            )),
            8 => Some(Self::new(
                byte(b[0], b[1])?,
                byte(b[2], b[3])?,
                byte(b[4], b[5])?,
                byte(b[6], b[7])?,
            )),
            _ => None,
        }
    }

    pub fn to_css(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!(
                "#{:02x}{:02x}{:02x}{:02x}",
                self.r, self.g, self.b, self.a
            )
        }
    }

    pub fn premul(self) -> [u8; 4] {
        let a = u16::from(self.a);
        [
            mul_div255(u16::from(self.r), a),
            mul_div255(u16::from(self.g), a),
            mul_div255(u16::from(self.b), a),
            self.a,
        ]
    }
}

impl serde::Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_css())
    }
}

impl<'de> serde::Deserialize<'de> for Color {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Decoded raster image in premultiplied RGBA8 form.
///
/// Cheap to clone; the pixel bytes are shared.
#[derive(Clone, Debug)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl Bitmap {
    /// Decode encoded image bytes (PNG, JPEG, WebP, ...) and premultiply.
    pub fn decode(bytes: &[u8]) -> LaminaResult<Self> {
        let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
        Ok(Self::from_rgba_image(&dyn_img.to_rgba8()))
    }

    /// Build from a straight-alpha `image` buffer, premultiplying in place.
    pub fn from_rgba_image(img: &image::RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        let mut rgba8_premul = img.as_raw().clone();
        premultiply_rgba8_in_place(&mut rgba8_premul);
        Self {
            width,
            height,
            rgba8_premul: Arc::new(rgba8_premul),
        }
    }

    /// Convert back to a straight-alpha `image` buffer.
    pub fn to_rgba_image(&self) -> image::RgbaImage {
        let mut raw = self.rgba8_premul.as_ref().clone();
        unpremultiply_rgba8_in_place(&mut raw);
        image::RgbaImage::from_raw(self.width, self.height, raw)
            .unwrap_or_else(|| image::RgbaImage::new(self.width, self.height))
    }

    /// Premultiplied pixel at `(x, y)`; zero when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.width || y >= self.height {
            return [0; 4];
        }
        let i = ((y * self.width + x) * 4) as usize;
        let px = &self.rgba8_premul[i..i + 4];
        [px[0], px[1], px[2], px[3]]
    }

    pub fn to_png_bytes(&self) -> LaminaResult<Vec<u8>> {
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(self.to_rgba_image())
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .context("encode png")?;
        Ok(buf)
    }
}

/// Per-pixel compositing rule applied when blitting onto a [`Surface`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompositeMode {
    #[default]
    SourceOver,
    /// Keep source only where the destination already has alpha.
    SourceIn,
    /// Keep destination only where the source has alpha.
    DestinationIn,
    Copy,
}

/// Owned premultiplied-RGBA8 drawing target.
pub struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; (width as usize) * (height as usize) * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.width || y >= self.height {
            return [0; 4];
        }
        let i = ((y * self.width + x) * 4) as usize;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Fill the full extent with `color` (source-over).
    pub fn fill(&mut self, color: Color) {
        self.fill_rect(0, 0, self.width, self.height, color);
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: Color) {
        let src = color.premul();
        for ty in y.max(0)..(y + h as i32).min(self.height as i32) {
            for tx in x.max(0)..(x + w as i32).min(self.width as i32) {
                let i = ((ty as u32 * self.width + tx as u32) * 4) as usize;
                let dst = [
                    self.data[i],
                    self.data[i + 1],
                    self.data[i + 2],
                    self.data[i + 3],
                ];
                let out = over(dst, src);
                self.data[i..i + 4].copy_from_slice(&out);
            }
        }
    }

    /// Blit `bitmap` into the destination rect with nearest sampling.
    pub fn draw_bitmap(
        &mut self,
        bitmap: &Bitmap,
        dx: i32,
        dy: i32,
        dw: u32,
        dh: u32,
        mode: CompositeMode,
    ) {
        if dw == 0 || dh == 0 || bitmap.width == 0 || bitmap.height == 0 {
            return;
        }
        for y in 0..dh {
            let ty = dy + y as i32;
            if ty < 0 || ty >= self.height as i32 {
                continue;
            }
            let sy = (u64::from(y) * u64::from(bitmap.height) / u64::from(dh)) as u32;
            for x in 0..dw {
                let tx = dx + x as i32;
                if tx < 0 || tx >= self.width as i32 {
                    continue;
                }
                let sx = (u64::from(x) * u64::from(bitmap.width) / u64::from(dw)) as u32;
                let src = bitmap.pixel(sx, sy);
                let i = ((ty as u32 * self.width + tx as u32) * 4) as usize;
                let dst = [
                    self.data[i],
                    self.data[i + 1],
                    self.data[i + 2],
                    self.data[i + 3],
                ];
                let out = composite(dst, src, mode);
                self.data[i..i + 4].copy_from_slice(&out);
            }
        }
    }

    /// Blit `bitmap` scaled to fit within the surface, aspect preserved, centered.
    pub fn draw_bitmap_fit(&mut self, bitmap: &Bitmap) {
        if bitmap.width == 0 || bitmap.height == 0 {
            return;
        }
        let scale = (self.width as f64 / bitmap.width as f64)
            .min(self.height as f64 / bitmap.height as f64);
        let dw = ((bitmap.width as f64 * scale).round() as u32).max(1);
        let dh = ((bitmap.height as f64 * scale).round() as u32).max(1);
        let dx = (self.width as i32 - dw as i32) / 2;
        let dy = (self.height as i32 - dh as i32) / 2;
        self.draw_bitmap(bitmap, dx, dy, dw, dh, CompositeMode::SourceOver);
    }

    /// Blend `color` at fractional coverage `cov` (glyph anti-aliasing path).
    pub fn blend_coverage(&mut self, x: i32, y: i32, color: Color, cov: f32) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let cov = cov.clamp(0.0, 1.0);
        if cov <= 0.0 {
            return;
        }
        let c = ((cov * 255.0).round() as i32).clamp(0, 255) as u16;
        let base = color.premul();
        let src = [
            mul_div255(u16::from(base[0]), c),
            mul_div255(u16::from(base[1]), c),
            mul_div255(u16::from(base[2]), c),
            mul_div255(u16::from(base[3]), c),
        ];
        let i = ((y as u32 * self.width + x as u32) * 4) as usize;
        let dst = [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ];
        let out = over(dst, src);
        self.data[i..i + 4].copy_from_slice(&out);
    }

    pub fn to_bitmap(&self) -> Bitmap {
        Bitmap {
            width: self.width,
            height: self.height,
            rgba8_premul: Arc::new(self.data.clone()),
        }
    }

    pub fn to_png_bytes(&self) -> LaminaResult<Vec<u8>> {
        self.to_bitmap().to_png_bytes()
    }

    pub fn write_png(&self, path: &Path) -> LaminaResult<()> {
        let bytes = self.to_png_bytes()?;
        std::fs::write(path, bytes)
            .with_context(|| format!("write png to {}", path.display()))?;
        Ok(())
    }
}

pub fn over(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    if src[3] == 0 {
        return dst;
    }
    if src[3] == 255 {
        return src;
    }
    let inv = 255u16 - u16::from(src[3]);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = src[i].saturating_add(mul_div255(u16::from(dst[i]), inv));
    }
    out
}

fn composite(dst: [u8; 4], src: [u8; 4], mode: CompositeMode) -> [u8; 4] {
    match mode {
        CompositeMode::SourceOver => over(dst, src),
        CompositeMode::SourceIn => {
            let da = u16::from(dst[3]);
            [
                mul_div255(u16::from(src[0]), da),
                mul_div255(u16::from(src[1]), da),
                mul_div255(u16::from(src[2]), da),
                mul_div255(u16::from(src[3]), da),
            ]
        }
        CompositeMode::DestinationIn => {
            let sa = u16::from(src[3]);
            [
                mul_div255(u16::from(dst[0]), sa),
                mul_div255(u16::from(dst[1]), sa),
                mul_div255(u16::from(dst[2]), sa),
                mul_div255(u16::from(dst[3]), sa),
            ]
        }
        CompositeMode::Copy => src,
    }
}

pub(crate) fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        if a == 255 {
            continue;
        }
        px[0] = mul_div255(px[0] as u16, a);
        px[1] = mul_div255(px[1] as u16, a);
        px[2] = mul_div255(px[2] as u16, a);
    }
}

fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u32;
        if a == 0 || a == 255 {
            continue;
        }
        for c in px.iter_mut().take(3) {
            *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_and_named_colors() {
        assert_eq!(Color::parse("#f00").unwrap(), Color::RED);
        assert_eq!(Color::parse("#ff0000").unwrap(), Color::RED);
        assert_eq!(
            Color::parse("#ff000080").unwrap(),
            Color::new(255, 0, 0, 128)
        );
        assert_eq!(Color::parse("red").unwrap(), Color::RED);
        assert_eq!(Color::parse("Transparent").unwrap(), Color::TRANSPARENT);
        assert!(Color::parse("chartreuse-ish").is_err());
        assert!(Color::parse("#12345").is_err());
    }

    #[test]
    fn color_serde_round_trip() {
        let c = Color::new(255, 0, 0, 128);
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, "\"#ff000080\"");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn over_src_alpha_0_is_noop() {
        let dst = [10, 20, 30, 40];
        assert_eq!(over(dst, [255, 255, 255, 0]), dst);
    }

    #[test]
    fn over_src_opaque_replaces_dst() {
        let src = [255, 0, 0, 255];
        assert_eq!(over([0, 0, 0, 255], src), src);
    }

    #[test]
    fn fill_then_pixel_reads_back() {
        let mut s = Surface::new(4, 4);
        s.fill(Color::RED);
        assert_eq!(s.pixel(0, 0), [255, 0, 0, 255]);
        assert_eq!(s.pixel(3, 3), [255, 0, 0, 255]);
        s.clear();
        assert_eq!(s.pixel(0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn source_in_keeps_only_masked_pixels() {
        let mut s = Surface::new(2, 1);
        s.fill_rect(0, 0, 1, 1, Color::WHITE);
        let red = Bitmap::from_rgba_image(&image::RgbaImage::from_pixel(
            2,
            1,
            image::Rgba([255, 0, 0, 255]),
        ));
        s.draw_bitmap(&red, 0, 0, 2, 1, CompositeMode::SourceIn);
        assert_eq!(s.pixel(0, 0), [255, 0, 0, 255]);
        assert_eq!(s.pixel(1, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn bitmap_fit_centers_and_preserves_aspect() {
        // 2x1 bitmap into an 8x8 surface: scaled to 8x4, vertically centered.
        let bmp = Bitmap::from_rgba_image(&image::RgbaImage::from_pixel(
            2,
            1,
            image::Rgba([0, 255, 0, 255]),
        ));
        let mut s = Surface::new(8, 8);
        s.draw_bitmap_fit(&bmp);
        assert_eq!(s.pixel(0, 0), [0, 0, 0, 0]);
        assert_eq!(s.pixel(4, 4), [0, 255, 0, 255]);
        assert_eq!(s.pixel(0, 7), [0, 0, 0, 0]);
    }

    #[test]
    fn decode_premultiplies_pixels() {
        let img = image::RgbaImage::from_pixel(1, 1, image::Rgba([100, 50, 200, 128]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        let bmp = Bitmap::decode(&buf).unwrap();
        assert_eq!(bmp.width, 1);
        assert_eq!(
            bmp.pixel(0, 0),
            [
                mul_div255(100, 128),
                mul_div255(50, 128),
                mul_div255(200, 128),
                128
            ]
        );
    }
}
