//! Ordered stack of typed layers.
//!
//! Index 0 paints last, i.e. frontmost. The order is externally observable
//! and survives reorders and undo/redo unchanged.

use crate::{
    error::{LaminaError, LaminaResult},
    plugins::{FillOptions, ImageOptions, LayerOptions, PluginKind, TextOptions},
    surface::Color,
};

/// Opaque, stable layer identifier. Survives reorders and option edits.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct LayerId(uuid::Uuid);

impl LayerId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One entry in the composition stack. The plugin kind is carried by the
/// options variant and is fixed for the layer's lifetime; changing kind means
/// replacing the layer.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub options: LayerOptions,
}

impl Layer {
    pub fn new(options: LayerOptions) -> Self {
        Self {
            id: LayerId::new(),
            options,
        }
    }

    pub fn fill(fill_style: Color) -> Self {
        Self::new(LayerOptions::Fill(FillOptions { fill_style }))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(LayerOptions::Text(TextOptions {
            text: text.into(),
            ..TextOptions::default()
        }))
    }

    pub fn image(src: impl Into<String>) -> Self {
        Self::new(LayerOptions::Image(ImageOptions { src: src.into() }))
    }

    pub fn kind(&self) -> PluginKind {
        self.options.kind()
    }
}

/// The ordered layer collection.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct LayerStack {
    layers: Vec<Layer>,
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_layers(layers: Vec<Layer>) -> Self {
        Self { layers }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Layer> {
        self.layers.iter()
    }

    pub fn as_slice(&self) -> &[Layer] {
        &self.layers
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    /// Insert at index 0, making the layer frontmost. Returns its id.
    pub fn insert_at_front(&mut self, layer: Layer) -> LayerId {
        let id = layer.id;
        self.layers.insert(0, layer);
        id
    }

    /// Remove the layer with `id`, returning it if present.
    pub fn remove(&mut self, id: LayerId) -> Option<Layer> {
        let index = self.layers.iter().position(|layer| layer.id == id)?;
        Some(self.layers.remove(index))
    }

    /// Reorder to match `order`, which must be a permutation of the current
    /// ids. Foreign, missing, or duplicated ids are rejected without mutating
    /// the stack.
    pub fn reorder(&mut self, order: &[LayerId]) -> LaminaResult<()> {
        if order.len() != self.layers.len() {
            return Err(LaminaError::validation(format!(
                "reorder expects {} ids, got {}",
                self.layers.len(),
                order.len()
            )));
        }
        let mut picked: Vec<Option<Layer>> = self.layers.iter().cloned().map(Some).collect();
        let mut reordered = Vec::with_capacity(order.len());
        for id in order {
            let slot = picked
                .iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|layer| layer.id == *id))
                .ok_or_else(|| {
                    LaminaError::validation(format!("reorder references foreign layer id {id}"))
                })?;
            reordered.push(slot.take().expect("slot checked non-empty"));
        }
        self.layers = reordered;
        Ok(())
    }

    /// Replace a layer's options, keeping its id and kind.
    ///
    /// # Panics
    ///
    /// Panics when `id` is unknown or `options` carries a different plugin
    /// kind than the layer was created with. Both are caller bugs, not
    /// recoverable states.
    pub fn replace_options(&mut self, id: LayerId, options: LayerOptions) {
        let layer = self
            .layers
            .iter_mut()
            .find(|layer| layer.id == id)
            .unwrap_or_else(|| panic!("replace_options: no layer with id {id}"));
        assert_eq!(
            layer.options.kind(),
            options.kind(),
            "replace_options: layer {id} is '{}', got '{}' options",
            layer.options.kind(),
            options.kind()
        );
        layer.options = options;
    }
}

impl<'a> IntoIterator for &'a LayerStack {
    type Item = &'a Layer;
    type IntoIter = std::slice::Iter<'a, Layer>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_at_front_makes_layer_topmost() {
        let mut stack = LayerStack::new();
        let below = stack.insert_at_front(Layer::fill(Color::RED));
        let top = stack.insert_at_front(Layer::text("hi"));
        assert_eq!(stack.as_slice()[0].id, top);
        assert_eq!(stack.as_slice()[1].id, below);
    }

    #[test]
    fn remove_unknown_id_is_none() {
        let mut stack = LayerStack::new();
        stack.insert_at_front(Layer::fill(Color::RED));
        assert!(stack.remove(LayerId::new()).is_none());
        assert_eq!(stack.len(), 1);
    }

    #[test]
    #[should_panic(expected = "replace_options")]
    fn replace_options_rejects_kind_change() {
        let mut stack = LayerStack::new();
        let id = stack.insert_at_front(Layer::fill(Color::RED));
        stack.replace_options(
            id,
            LayerOptions::Image(ImageOptions {
                src: "x.png".to_string(),
            }),
        );
    }
}
