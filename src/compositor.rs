//! Back-to-front composition of a layer stack onto a surface.

use crate::{
    cache::ComputedCache, layer::LayerStack, surface::Surface, text::FontCatalog,
};

/// Clear `surface`, then paint `layers` last-to-first so index 0 lands on
/// top, feeding each draw its cached computed value.
///
/// Callers must settle the cache first (`cache.compute_outdated`); rendering
/// with outdated entries is a contract violation that produces stale pixels,
/// not a crash — a missing entry simply reaches the plugin as `None`.
pub fn render(
    surface: &mut Surface,
    layers: &LayerStack,
    cache: &ComputedCache,
    fonts: &FontCatalog,
) {
    debug_assert!(
        !cache.is_any_outdated(layers),
        "render called while cache entries are outdated"
    );
    surface.clear();
    for layer in layers.iter().rev() {
        let computed = cache.get(&layer.options).map(|entry| &entry.computed);
        layer.options.draw(surface, computed, fonts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        layer::{Layer, LayerStack},
        surface::Color,
    };

    #[test]
    fn front_layer_paints_last() {
        let mut layers = LayerStack::new();
        layers.insert_at_front(Layer::fill(Color::RED));
        layers.insert_at_front(Layer::fill(Color::WHITE));

        let mut surface = Surface::new(4, 4);
        let cache = ComputedCache::new();
        let fonts = FontCatalog::empty();
        render(&mut surface, &layers, &cache, &fonts);
        assert_eq!(surface.pixel(2, 2), [255, 255, 255, 255]);
    }

    #[test]
    fn render_is_idempotent() {
        let mut layers = LayerStack::new();
        layers.insert_at_front(Layer::fill(Color::parse("purple").unwrap()));

        let mut surface = Surface::new(8, 8);
        let cache = ComputedCache::new();
        let fonts = FontCatalog::empty();
        render(&mut surface, &layers, &cache, &fonts);
        let first = surface.data().to_vec();
        render(&mut surface, &layers, &cache, &fonts);
        assert_eq!(surface.data(), first.as_slice());
    }
}
