//! Editor session: the layer stack behind a linear history, the computed
//! cache, and the composited output surface, plus the thin adapters around
//! them (paste/drop, PNG export, saved-session persistence).

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use base64::Engine as _;

use crate::{
    cache::ComputedCache,
    compositor,
    error::{LaminaError, LaminaResult},
    history::History,
    layer::{Layer, LayerId, LayerStack},
    plugins::{ComputedValue, ImageOptions, LayerOptions},
    removebg::{SegmentationBackend, remove_background},
    surface::{Color, Surface},
    text::FontCatalog,
};

/// File name for exported snapshots.
pub const EXPORT_FILE_NAME: &str = "lamina.png";
/// Directory under the platform data dir holding saved sessions.
pub const STATE_DIR_NAME: &str = "lamina";
/// File name of the persisted layer list.
pub const STATE_FILE_NAME: &str = "layers.json";
/// Default output dimensions (square), matching the reaction-image use case.
pub const DEFAULT_CANVAS_SIZE: u32 = 256;

pub struct EditorSession {
    history: History<LayerStack>,
    cache: ComputedCache,
    fonts: FontCatalog,
    surface: Surface,
    selected: Option<LayerId>,
}

impl EditorSession {
    pub fn new(width: u32, height: u32, fonts: FontCatalog) -> Self {
        Self {
            history: History::new(LayerStack::new()),
            cache: ComputedCache::new(),
            fonts,
            surface: Surface::new(width, height),
            selected: None,
        }
    }

    pub fn layers(&self) -> &LayerStack {
        self.history.present()
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn selected(&self) -> Option<LayerId> {
        self.selected
    }

    pub fn select(&mut self, id: Option<LayerId>) {
        self.selected = id;
    }

    pub fn selected_layer(&self) -> Option<&Layer> {
        self.selected.and_then(|id| self.layers().get(id))
    }

    /// One discrete mutation of the layer stack = one undo step.
    fn commit(&mut self, mutate: impl FnOnce(&mut LayerStack)) {
        let mut next = self.history.present().clone();
        mutate(&mut next);
        self.history.set(next);
    }

    /// Insert `layer` at the front (topmost) and select it.
    pub fn add_layer(&mut self, layer: Layer) -> LayerId {
        let id = layer.id;
        self.commit(|layers| {
            layers.insert_at_front(layer);
        });
        self.selected = Some(id);
        id
    }

    pub fn remove_layer(&mut self, id: LayerId) {
        self.commit(|layers| {
            layers.remove(id);
        });
        if self.selected == Some(id) {
            self.selected = None;
        }
    }

    pub fn reorder_layers(&mut self, order: &[LayerId]) -> LaminaResult<()> {
        let mut next = self.history.present().clone();
        next.reorder(order)?;
        self.history.set(next);
        Ok(())
    }

    pub fn set_layer_options(&mut self, id: LayerId, options: LayerOptions) {
        self.commit(|layers| layers.replace_options(id, options));
    }

    pub fn undo(&mut self) {
        self.history.undo();
    }

    pub fn redo(&mut self) {
        self.history.redo();
    }

    /// Dropped or pasted image bytes become a new topmost image layer backed
    /// by a data URI.
    pub fn insert_dropped_image(&mut self, bytes: &[u8], mime: &str) -> LayerId {
        let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
        self.add_layer(Layer::image(format!("data:{mime};base64,{payload}")))
    }

    /// Pasted plain text becomes a new topmost text layer.
    pub fn insert_dropped_text(&mut self, text: &str) -> LayerId {
        self.add_layer(Layer::text(text))
    }

    /// Settle the cache: run every outdated layer's compute concurrently and
    /// wait for all of them.
    pub async fn recompute(&mut self) {
        self.cache.compute_outdated(self.history.present()).await;
    }

    /// Recompute, then composite the stack into the owned surface.
    pub async fn recompute_and_render(&mut self) {
        self.recompute().await;
        compositor::render(
            &mut self.surface,
            self.history.present(),
            &self.cache,
            &self.fonts,
        );
    }

    pub fn cache(&self) -> &ComputedCache {
        &self.cache
    }

    /// Run background removal on an image layer's computed bitmap and swap
    /// the result in as its new source (a data URI, hence a new cache key).
    /// On failure the layer is untouched.
    pub fn apply_background_removal(
        &mut self,
        backend: &dyn SegmentationBackend,
        id: LayerId,
    ) -> LaminaResult<()> {
        let layer = self
            .layers()
            .get(id)
            .ok_or_else(|| LaminaError::validation(format!("no layer with id {id}")))?;
        if !matches!(layer.options, LayerOptions::Image(_)) {
            return Err(LaminaError::validation(format!(
                "background removal targets image layers, layer {id} is '{}'",
                layer.kind()
            )));
        }
        let entry = self.cache.get(&layer.options).ok_or_else(|| {
            LaminaError::validation(format!("layer {id} has not been computed yet"))
        })?;
        let ComputedValue::Image(bitmap) = &entry.computed;

        let masked = remove_background(backend, bitmap)?;
        let png = masked.to_png_bytes()?;
        let payload = base64::engine::general_purpose::STANDARD.encode(png);
        self.set_layer_options(
            id,
            LayerOptions::Image(ImageOptions {
                src: format!("data:image/png;base64,{payload}"),
            }),
        );
        Ok(())
    }

    /// Write the current composite as a PNG under the fixed export file name.
    pub fn export_png(&self, dir: &Path) -> LaminaResult<PathBuf> {
        let path = dir.join(EXPORT_FILE_NAME);
        self.surface.write_png(&path)?;
        Ok(path)
    }

    /// Default on-disk location of the persisted layer list.
    pub fn state_path() -> LaminaResult<PathBuf> {
        let base = dirs_next::data_dir()
            .ok_or_else(|| LaminaError::validation("no platform data directory"))?;
        Ok(base.join(STATE_DIR_NAME).join(STATE_FILE_NAME))
    }

    /// Persist the layer list (and only the layer list) as JSON.
    pub fn save_state_to(&self, path: &Path) -> LaminaResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self.layers())
            .map_err(|err| LaminaError::serde(err.to_string()))?;
        std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    pub fn save_state(&self) -> LaminaResult<()> {
        self.save_state_to(&Self::state_path()?)
    }

    /// Read a persisted layer list. A document carrying an unknown plugin
    /// tag fails here rather than producing half a stack.
    pub fn load_state_from(path: &Path) -> LaminaResult<LayerStack> {
        let json =
            std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&json).map_err(|err| LaminaError::serde(err.to_string()))
    }

    pub fn load_state() -> LaminaResult<LayerStack> {
        Self::load_state_from(&Self::state_path()?)
    }

    /// Replace the current stack with a restored one. Starts a fresh history.
    pub fn restore(&mut self, layers: LayerStack) {
        self.history = History::new(layers);
        self.selected = None;
    }

    /// Starter composition: a greeting over a solid backdrop.
    pub fn demo_composition() -> LayerStack {
        let mut layers = LayerStack::new();
        layers.insert_at_front(Layer::fill(Color::parse("purple").expect("known color")));
        layers.insert_at_front(Layer::text("Hello, world!"));
        layers
    }
}

impl Drop for EditorSession {
    fn drop(&mut self) {
        // Editor teardown fires every cache entry's cleanup.
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> EditorSession {
        EditorSession::new(DEFAULT_CANVAS_SIZE, DEFAULT_CANVAS_SIZE, FontCatalog::empty())
    }

    #[test]
    fn add_layer_selects_it_and_puts_it_on_top() {
        let mut editor = session();
        editor.add_layer(Layer::fill(Color::RED));
        let top = editor.add_layer(Layer::text("hi"));
        assert_eq!(editor.selected(), Some(top));
        assert_eq!(editor.layers().as_slice()[0].id, top);
    }

    #[test]
    fn each_mutation_is_one_undo_step() {
        let mut editor = session();
        let id = editor.add_layer(Layer::fill(Color::RED));
        editor.add_layer(Layer::text("hi"));
        assert_eq!(editor.layers().len(), 2);

        editor.undo();
        assert_eq!(editor.layers().len(), 1);
        assert_eq!(editor.layers().as_slice()[0].id, id);

        editor.redo();
        assert_eq!(editor.layers().len(), 2);
    }

    #[test]
    fn removal_clears_the_selection() {
        let mut editor = session();
        let id = editor.add_layer(Layer::fill(Color::RED));
        editor.remove_layer(id);
        assert_eq!(editor.selected(), None);
        assert!(editor.layers().is_empty());
    }

    #[test]
    fn dropped_text_becomes_a_topmost_text_layer() {
        let mut editor = session();
        editor.add_layer(Layer::fill(Color::RED));
        let id = editor.insert_dropped_text("pasted");
        let top = &editor.layers().as_slice()[0];
        assert_eq!(top.id, id);
        match &top.options {
            LayerOptions::Text(options) => assert_eq!(options.text, "pasted"),
            other => panic!("expected text options, got {other:?}"),
        }
    }

    #[test]
    fn dropped_image_bytes_become_a_data_uri_source() {
        let mut editor = session();
        let id = editor.insert_dropped_image(b"pngbytes", "image/png");
        let layer = editor.layers().get(id).unwrap();
        match &layer.options {
            LayerOptions::Image(options) => {
                assert!(options.src.starts_with("data:image/png;base64,"));
            }
            other => panic!("expected image options, got {other:?}"),
        }
    }
}
