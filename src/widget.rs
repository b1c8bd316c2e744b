use image::DynamicImage;
use ratatui::buffer::Buffer;
use ratatui::layout::{Rect, Size};
use ratatui::widgets::Widget;
use std::cell::Cell;
use std::sync::Arc;

use crate::geometry::{ContainerBounds, GeometryError, ImageSize, ImageStyle};
use crate::image::{ImageLoadError, ImageRenderable, ImageSource, PixelMeta};
use crate::terminal::CellMetricsProvider;

/// Size reported when the terminal metrics are unusable
pub const DEFAULT_PLACEHOLDER: Size = Size {
    width: 1,
    height: 1,
};

/// Ratatui widget that shows one image
///
/// Tracks the image and its pixel size, asks the metrics provider how big a
/// cell is, and hands the actual drawing to a renderable.
pub struct ImageWidget {
    source: Option<ImageSource>,
    decoded: Option<Arc<DynamicImage>>,
    pixel_width: u32,
    pixel_height: u32,
    style: ImageStyle,
    renderable: Box<dyn ImageRenderable>,
    metrics: Box<dyn CellMetricsProvider>,
    placeholder: Size,
    /// Cell size of the last draw, to know when protocol state is stale
    last_drawn: Option<Size>,
    /// Set once unusable metrics have been reported, cleared when they recover
    metrics_warned: Cell<bool>,
}

impl ImageWidget {
    pub fn new(
        renderable: Box<dyn ImageRenderable>,
        metrics: Box<dyn CellMetricsProvider>,
    ) -> Self {
        ImageWidget {
            source: None,
            decoded: None,
            pixel_width: 0,
            pixel_height: 0,
            style: ImageStyle::default(),
            renderable,
            metrics,
            placeholder: DEFAULT_PLACEHOLDER,
            last_drawn: None,
            metrics_warned: Cell::new(false),
        }
    }

    pub fn with_style(mut self, style: ImageStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_placeholder(mut self, placeholder: Size) -> Self {
        self.placeholder = placeholder;
        self
    }

    pub fn style(&self) -> ImageStyle {
        self.style
    }

    pub fn set_style(&mut self, style: ImageStyle) {
        self.style = style;
    }

    /// Currently displayed image
    pub fn image(&self) -> Option<&ImageSource> {
        self.source.as_ref()
    }

    /// Pixel size of the current image, `(0, 0)` when there is none
    pub fn pixel_size(&self) -> (u32, u32) {
        (self.pixel_width, self.pixel_height)
    }

    /// Replace the image
    ///
    /// Protocol state for the old image is released first. On error the
    /// widget is left empty.
    pub fn set_image(&mut self, image: Option<ImageSource>) -> Result<(), ImageLoadError> {
        self.renderable.cleanup();
        self.last_drawn = None;
        self.decoded = None;

        let meta = match image.as_ref().map(PixelMeta::read).transpose() {
            Ok(meta) => meta.unwrap_or_default(),
            Err(e) => {
                self.source = None;
                self.pixel_width = 0;
                self.pixel_height = 0;
                return Err(e);
            }
        };

        if let Some(ImageSource::Decoded(img)) = &image {
            self.decoded = Some(Arc::clone(img));
        }
        self.source = image;
        self.pixel_width = meta.width;
        self.pixel_height = meta.height;
        log::debug!("Image set: {}x{} pixels", meta.width, meta.height);
        Ok(())
    }

    fn image_size(&self) -> ImageSize {
        ImageSize::styled(self.pixel_width, self.pixel_height, &self.style)
    }

    fn resolve(&self, bounds: ContainerBounds) -> Size {
        let image_size = self.image_size();
        if image_size.is_empty() {
            return Size::new(0, 0);
        }
        let metrics = self.metrics.cell_pixel_metrics();
        match image_size.cell_size(bounds, metrics) {
            Ok(size) => {
                self.metrics_warned.set(false);
                size
            }
            Err(GeometryError::InvalidMetrics { width, height }) => {
                if !self.metrics_warned.replace(true) {
                    log::warn!(
                        "Terminal reported unusable cell size {}x{}, using {}x{} placeholder",
                        width,
                        height,
                        self.placeholder.width,
                        self.placeholder.height
                    );
                }
                Size::new(
                    self.placeholder.width.min(bounds.width),
                    self.placeholder.height.min(bounds.height),
                )
            }
        }
    }

    /// Width pass: cells of width to reserve inside `container`
    pub fn content_width(&self, container: ContainerBounds) -> u16 {
        self.resolve(container).width
    }

    /// Height pass: cells of height to reserve once the width is known
    pub fn content_height(&self, container: ContainerBounds, width: u16) -> u16 {
        self.resolve(Size::new(width, container.height)).height
    }

    /// Both layout passes in one call
    pub fn desired_size(&self, container: ContainerBounds) -> Size {
        let width = self.content_width(container);
        let height = self.content_height(container, width);
        Size::new(width, height)
    }

    fn decoded_image(&mut self) -> Option<Arc<DynamicImage>> {
        if self.decoded.is_none()
            && let Some(source) = &self.source
        {
            match source.decode() {
                Ok(img) => self.decoded = Some(img),
                Err(e) => {
                    log::warn!("{}", e);
                    self.source = None;
                    self.pixel_width = 0;
                    self.pixel_height = 0;
                }
            }
        }
        self.decoded.clone()
    }
}

impl Widget for &mut ImageWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(image) = self.decoded_image() else {
            return;
        };

        let size = self.desired_size(area.as_size());
        if size.width == 0 || size.height == 0 {
            return;
        }

        if self.last_drawn != Some(size) {
            self.renderable.cleanup();
            self.last_drawn = Some(size);
        }

        let target = Rect::new(area.x, area.y, size.width, size.height);
        self.renderable.render(&image, target, buf);
    }
}
