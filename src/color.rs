use palette::{Hsl, IntoColor, Srgb};
use plotters::style::RGBColor;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct series colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<RGBColor> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.45);
            let rgb: Srgb = hsl.into_color();
            let rgb: Srgb<u8> = rgb.into_format();
            RGBColor(rgb.red, rgb.green, rgb.blue)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_colours_are_distinct() {
        let colours: Vec<(u8, u8, u8)> = generate_palette(5)
            .into_iter()
            .map(|c| (c.0, c.1, c.2))
            .collect();
        assert_eq!(colours.len(), 5);
        for i in 0..colours.len() {
            for j in i + 1..colours.len() {
                assert_ne!(colours[i], colours[j]);
            }
        }
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn first_colour_is_a_saturated_red() {
        let RGBColor(r, g, b) = generate_palette(3)[0];
        assert!(r > 180 && g < 60 && b < 60, "{r},{g},{b}");
    }
}
