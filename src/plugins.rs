//! Per-kind layer behavior.
//!
//! Rather than a string-keyed table of objects with optional methods, the
//! plugin set is a closed sum: [`LayerOptions`] tags each layer with its kind
//! and carries that kind's editable parameters, and compute/draw dispatch by
//! exhaustive match. [`PluginKind::from_id`] is the string boundary for
//! persisted documents and external callers.

pub mod fill;
pub mod image;
pub mod text;

pub use fill::FillOptions;
pub use image::ImageOptions;
pub use text::TextOptions;

use crate::{
    cache::CacheEntry,
    error::{LaminaError, LaminaResult},
    surface::{Bitmap, Surface},
    text::FontCatalog,
};

/// The closed set of layer kinds, fixed at process start.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    Fill,
    Text,
    Image,
}

impl PluginKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PluginKind::Fill => "fill",
            PluginKind::Text => "text",
            PluginKind::Image => "image",
        }
    }

    /// Resolve a kind tag by exact string match. Unknown tags are fatal for
    /// the layer that carries them.
    pub fn from_id(id: &str) -> LaminaResult<Self> {
        match id {
            "fill" => Ok(PluginKind::Fill),
            "text" => Ok(PluginKind::Text),
            "image" => Ok(PluginKind::Image),
            other => Err(LaminaError::unknown_plugin(other)),
        }
    }
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plugin-specific editable parameters, tagged by kind.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "plugin", rename_all = "lowercase")]
pub enum LayerOptions {
    Fill(FillOptions),
    Text(TextOptions),
    Image(ImageOptions),
}

impl LayerOptions {
    pub fn kind(&self) -> PluginKind {
        match self {
            LayerOptions::Fill(_) => PluginKind::Fill,
            LayerOptions::Text(_) => PluginKind::Text,
            LayerOptions::Image(_) => PluginKind::Image,
        }
    }

    /// Whether this kind owns an asynchronous precompute step.
    pub fn has_compute(&self) -> bool {
        matches!(self, LayerOptions::Image(_))
    }

    /// Run the kind's compute step, producing a cache entry to install under
    /// this options value. Kinds without a compute step return `None`.
    pub async fn compute(&self) -> LaminaResult<Option<CacheEntry>> {
        match self {
            LayerOptions::Image(options) => Ok(Some(options.compute().await)),
            LayerOptions::Fill(_) | LayerOptions::Text(_) => Ok(None),
        }
    }

    /// Paint this layer onto `surface`. Synchronous, no side effects beyond
    /// the surface. `computed` is the cached value produced by [`compute`],
    /// absent for kinds without one (and tolerated as absent otherwise).
    ///
    /// [`compute`]: LayerOptions::compute
    pub fn draw(&self, surface: &mut Surface, computed: Option<&ComputedValue>, fonts: &FontCatalog) {
        match self {
            LayerOptions::Fill(options) => options.draw(surface),
            LayerOptions::Text(options) => options.draw(surface, fonts),
            LayerOptions::Image(options) => options.draw(surface, computed),
        }
    }
}

/// Derived per-layer state produced by a compute step and owned by the cache.
#[derive(Clone, Debug)]
pub enum ComputedValue {
    /// Decoded, premultiplied bitmap for an image layer.
    Image(Bitmap),
}

impl ComputedValue {
    pub fn as_image(&self) -> Option<&Bitmap> {
        match self {
            ComputedValue::Image(bitmap) => Some(bitmap),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_id() {
        for kind in [PluginKind::Fill, PluginKind::Text, PluginKind::Image] {
            assert_eq!(PluginKind::from_id(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let err = PluginKind::from_id("sparkles").unwrap_err();
        assert!(matches!(err, LaminaError::UnknownPlugin(id) if id == "sparkles"));
    }

    #[test]
    fn options_serialize_with_plugin_tag() {
        let options = LayerOptions::Image(ImageOptions {
            src: "x.png".to_string(),
        });
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["plugin"], "image");
        assert_eq!(json["src"], "x.png");
    }

    #[test]
    fn only_image_has_compute() {
        assert!(
            LayerOptions::Image(ImageOptions {
                src: String::new()
            })
            .has_compute()
        );
        assert!(
            !LayerOptions::Fill(FillOptions {
                fill_style: crate::surface::Color::RED
            })
            .has_compute()
        );
    }
}
