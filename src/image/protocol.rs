use image::DynamicImage;
use image::imageops::FilterType;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::widgets::StatefulWidget;
use ratatui_image::StatefulImage;
use ratatui_image::picker::Picker;
use ratatui_image::protocol::StatefulProtocol;

use super::ImageRenderable;
use crate::geometry::TerminalCellMetrics;
use crate::terminal::CellMetricsProvider;

/// Terminal graphics protocol handler
/// Uses ratatui-image's picker which integrates with ratatui's rendering
pub struct ImageProtocol {
    /// Protocol picker that auto-detects terminal capabilities
    pub picker: Picker,
}

impl ImageProtocol {
    /// Auto-detect terminal capabilities (Kitty, Sixel, iTerm2, or Halfblocks fallback)
    ///
    /// Falls back to `fallback_font_size` when the terminal doesn't answer
    pub fn new(fallback_font_size: (u16, u16)) -> Self {
        let picker = Picker::from_query_stdio().unwrap_or_else(|e| {
            log::debug!(
                "Terminal capability query failed, using font size fallback: {:?}",
                e
            );
            Picker::from_fontsize(fallback_font_size)
        });

        ImageProtocol { picker }
    }

    /// Handler that skips the terminal query entirely
    pub fn from_fontsize(font_size: (u16, u16)) -> Self {
        ImageProtocol {
            picker: Picker::from_fontsize(font_size),
        }
    }

    /// Cell size in pixels as seen by the picker
    pub fn font_size(&self) -> (u16, u16) {
        self.picker.font_size()
    }
}

impl CellMetricsProvider for ImageProtocol {
    fn cell_pixel_metrics(&self) -> TerminalCellMetrics {
        TerminalCellMetrics::from(self.font_size())
    }
}

/// Renderable that draws through whichever graphics protocol the picker chose
pub struct ProtocolRenderable {
    protocol: ImageProtocol,
    state: Option<StatefulProtocol>,
}

impl ProtocolRenderable {
    pub fn new(protocol: ImageProtocol) -> Self {
        ProtocolRenderable {
            protocol,
            state: None,
        }
    }

    /// True while encoded protocol state is held
    pub fn is_prepared(&self) -> bool {
        self.state.is_some()
    }
}

impl ImageRenderable for ProtocolRenderable {
    fn render(&mut self, image: &DynamicImage, area: Rect, buf: &mut Buffer) {
        if self.state.is_none() {
            log::debug!(
                "Encoding {}x{} image for {}x{} cells",
                image.width(),
                image.height(),
                area.width,
                area.height
            );
            let image = fill_area(image, area, self.protocol.font_size());
            let state = self.protocol.picker.new_resize_protocol(image);
            self.state = Some(state);
        }

        if let Some(state) = self.state.as_mut() {
            StatefulImage::new(None).render(area, buf, state);
        }
    }

    fn cleanup(&mut self) {
        if self.state.take().is_some() {
            log::trace!("Released protocol image state");
        }
    }
}

/// Scale an image up so it covers `area`, keeping its aspect ratio
///
/// `StatefulImage` only ever shrinks, so an image smaller than its area in
/// pixels would otherwise be drawn at native size in the top-left corner.
fn fill_area(image: &DynamicImage, area: Rect, (font_w, font_h): (u16, u16)) -> DynamicImage {
    let target_w = u32::from(area.width) * u32::from(font_w);
    let target_h = u32::from(area.height) * u32::from(font_h);
    let covered = image.width() >= target_w || image.height() >= target_h;
    if covered {
        return image.clone();
    }
    image.resize(target_w, target_h, FilterType::Triangle)
}
