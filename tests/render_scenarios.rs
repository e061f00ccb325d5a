use lamina::{
    compositor, plugins::image::PLACEHOLDER_SIZE, Color, ComputedCache, FontCatalog, Layer,
    LayerOptions, LayerStack, Surface,
};

#[test]
fn text_over_fill_keeps_the_backdrop_in_the_corners() {
    let mut layers = LayerStack::new();
    layers.insert_at_front(Layer::fill(Color::RED));
    let id = layers.insert_at_front(Layer::text("X"));
    layers.replace_options(
        id,
        LayerOptions::Text(lamina::plugins::TextOptions {
            text: "X".to_string(),
            font_size: 60.0,
            ..Default::default()
        }),
    );

    let mut surface = Surface::new(64, 64);
    let cache = ComputedCache::new();
    let fonts = FontCatalog::system();
    compositor::render(&mut surface, &layers, &cache, &fonts);

    // A centered glyph never reaches the corner.
    assert_eq!(surface.pixel(0, 0), [255, 0, 0, 255]);
    assert_eq!(surface.pixel(63, 63), [255, 0, 0, 255]);

    // The glyph itself only lands when a system font resolves.
    if fonts.resolve("sans-serif").is_some() {
        assert_ne!(surface.pixel(32, 32), [255, 0, 0, 255]);
    }
}

#[tokio::test]
async fn unreachable_image_source_renders_a_placeholder() {
    let mut layers = LayerStack::new();
    // Port 9 (discard) refuses connections on loopback; the fetch fails fast.
    layers.insert_at_front(Layer::image("http://127.0.0.1:9/none.png"));

    let mut cache = ComputedCache::new();
    cache.compute_outdated(&layers).await;
    // A failed fetch still produces a bitmap; the cache settles.
    assert!(!cache.is_any_outdated(&layers));

    let entry = cache.get(&layers.as_slice()[0].options).unwrap();
    let bitmap = entry.computed.as_image().unwrap();
    assert_eq!(bitmap.width, PLACEHOLDER_SIZE);
    assert_eq!(bitmap.height, PLACEHOLDER_SIZE);
    // Red panel with a black border.
    assert_eq!(bitmap.pixel(PLACEHOLDER_SIZE / 2, 20), [255, 0, 0, 255]);
    assert_eq!(bitmap.pixel(PLACEHOLDER_SIZE / 2, 2), [0, 0, 0, 255]);
}

#[tokio::test]
async fn render_with_settled_cache_is_idempotent() {
    let mut layers = LayerStack::new();
    layers.insert_at_front(Layer::fill(Color::parse("purple").unwrap()));
    layers.insert_at_front(Layer::image("http://127.0.0.1:9/none.png"));

    let mut cache = ComputedCache::new();
    cache.compute_outdated(&layers).await;

    let mut surface = Surface::new(32, 32);
    let fonts = FontCatalog::empty();
    compositor::render(&mut surface, &layers, &cache, &fonts);
    let first = surface.data().to_vec();
    compositor::render(&mut surface, &layers, &cache, &fonts);
    assert_eq!(surface.data(), first.as_slice());
}
