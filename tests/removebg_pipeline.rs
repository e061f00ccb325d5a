use lamina::removebg::{remove_background, MockBackend};
use lamina::{Bitmap, Color, Surface};

fn solid_bitmap(width: u32, height: u32, color: Color) -> Bitmap {
    let mut surface = Surface::new(width, height);
    surface.fill(color);
    surface.to_bitmap()
}

#[test]
fn confident_foreground_leaves_alpha_untouched() {
    let source = solid_bitmap(16, 16, Color::new(10, 200, 30, 255));
    let backend = MockBackend::constant(1.0);

    let masked = remove_background(&backend, &source).unwrap();
    assert_eq!(masked.width, source.width);
    assert_eq!(masked.height, source.height);
    assert_eq!(masked.pixel(8, 8), [10, 200, 30, 255]);
}

#[test]
fn threshold_probability_halves_alpha() {
    let source = solid_bitmap(8, 8, Color::WHITE);
    let backend = MockBackend::constant(0.3);

    let masked = remove_background(&backend, &source).unwrap();
    assert_eq!(masked.pixel(4, 4)[3], 128);
}

#[test]
fn confident_background_is_fully_transparent() {
    let source = solid_bitmap(8, 8, Color::WHITE);
    let backend = MockBackend::constant(0.0);

    let masked = remove_background(&backend, &source).unwrap();
    assert_eq!(masked.pixel(4, 4), [0, 0, 0, 0]);
}

#[test]
fn spatial_mask_survives_the_resize_back() {
    let source = solid_bitmap(32, 32, Color::WHITE);
    // Foreground on the left half of the model grid, background on the right.
    let backend = MockBackend::from_fn(|input| {
        let (n, _c, h, w) = input.dim();
        ndarray::Array4::from_shape_fn((n, 1, h, w), |(_, _, _, x)| {
            if x < w / 2 { 1.0 } else { 0.0 }
        })
    });

    let masked = remove_background(&backend, &source).unwrap();
    assert_eq!(masked.pixel(2, 16)[3], 255);
    assert_eq!(masked.pixel(29, 16)[3], 0);
}
