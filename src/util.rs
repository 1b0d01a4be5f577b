use embedded_graphics::pixelcolor::Rgb888;

/// Fully saturated color for `hue` in `0.0..1.0` (wraps outside of that).
pub fn hue_to_rgb(hue: f32) -> Rgb888 {
    let h = hue.rem_euclid(1.0);
    let x = 1.0 - ((h * 6.0) % 2.0 - 1.0).abs();

    let (r, g, b) = match (h * 6.0) as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        5 => (1.0, 0.0, x),
        _ => (0.0, 0.0, 0.0),
    };

    Rgb888::new((r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8)
}

/// Scale a color by `percent` (0..=100).
pub fn dim(color: Rgb888, percent: u8) -> Rgb888 {
    use embedded_graphics::prelude::RgbColor;

    let scale = |c: u8| (u16::from(c) * u16::from(percent.min(100)) / 100) as u8;
    Rgb888::new(scale(color.r()), scale(color.g()), scale(color.b()))
}
