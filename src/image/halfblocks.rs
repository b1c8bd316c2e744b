use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};
use ratatui::buffer::Buffer;
use ratatui::layout::{Rect, Size};
use ratatui::style::Color;

use super::ImageRenderable;

const UPPER_HALF_BLOCK: &str = "▀";

/// Renderable that needs no graphics protocol at all
///
/// Each cell shows two vertically stacked pixels: the top one as the
/// foreground of `▀`, the bottom one as the background.
#[derive(Default)]
pub struct HalfblockRenderable {
    resized: Option<(Size, RgbImage)>,
}

impl HalfblockRenderable {
    pub fn new() -> Self {
        Self::default()
    }

    fn pixels_for(&mut self, image: &DynamicImage, size: Size) -> &RgbImage {
        if !matches!(&self.resized, Some((cached, _)) if *cached == size) {
            self.resized = None;
        }
        let (_, pixels) = self.resized.get_or_insert_with(|| {
            let pixels = image
                .resize_exact(
                    u32::from(size.width),
                    u32::from(size.height) * 2,
                    FilterType::Triangle,
                )
                .to_rgb8();
            (size, pixels)
        });
        pixels
    }
}

fn to_color(Rgb([r, g, b]): Rgb<u8>) -> Color {
    Color::Rgb(r, g, b)
}

impl ImageRenderable for HalfblockRenderable {
    fn render(&mut self, image: &DynamicImage, area: Rect, buf: &mut Buffer) {
        let area = area.intersection(buf.area);
        if area.is_empty() {
            return;
        }

        let pixels = self.pixels_for(image, area.as_size());
        for row in 0..area.height {
            for col in 0..area.width {
                let x = u32::from(col);
                let top = *pixels.get_pixel(x, u32::from(row) * 2);
                let bottom = *pixels.get_pixel(x, u32::from(row) * 2 + 1);
                if let Some(cell) = buf.cell_mut((area.x + col, area.y + row)) {
                    cell.set_symbol(UPPER_HALF_BLOCK)
                        .set_fg(to_color(top))
                        .set_bg(to_color(bottom));
                }
            }
        }
    }

    fn cleanup(&mut self) {
        self.resized = None;
    }
}
