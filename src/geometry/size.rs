use ratatui::layout::Size;

use super::{CellDimension, StyledSize};

/// Cell space the layout engine makes available to an image
pub type ContainerBounds = Size;

/// Errors produced while resolving an image's cell size
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("Invalid terminal cell metrics: {width}x{height} pixels per cell")]
    InvalidMetrics { width: f64, height: f64 },
}

/// Pixel footprint of a single terminal cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerminalCellMetrics {
    pub cell_pixel_width: f64,
    pub cell_pixel_height: f64,
}

impl TerminalCellMetrics {
    pub fn new(cell_pixel_width: f64, cell_pixel_height: f64) -> Self {
        TerminalCellMetrics {
            cell_pixel_width,
            cell_pixel_height,
        }
    }

    /// Both components must be finite and strictly positive
    pub fn validate(&self) -> Result<(), GeometryError> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if valid(self.cell_pixel_width) && valid(self.cell_pixel_height) {
            Ok(())
        } else {
            Err(GeometryError::InvalidMetrics {
                width: self.cell_pixel_width,
                height: self.cell_pixel_height,
            })
        }
    }
}

impl From<(u16, u16)> for TerminalCellMetrics {
    fn from((width, height): (u16, u16)) -> Self {
        TerminalCellMetrics::new(f64::from(width), f64::from(height))
    }
}

/// Pixel size of an image together with its requested cell dimensions
///
/// Built fresh for every layout pass. A zero pixel dimension means no image
/// is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageSize {
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub width: Option<CellDimension>,
    pub height: Option<CellDimension>,
}

impl ImageSize {
    pub fn new(
        pixel_width: u32,
        pixel_height: u32,
        width: Option<CellDimension>,
        height: Option<CellDimension>,
    ) -> Self {
        ImageSize {
            pixel_width,
            pixel_height,
            width,
            height,
        }
    }

    /// Image size with requests taken from a style collaborator
    pub fn styled(pixel_width: u32, pixel_height: u32, style: &impl StyledSize) -> Self {
        let (width, height) = style.styled_size();
        ImageSize::new(pixel_width, pixel_height, width, height)
    }

    /// True when no image is loaded
    pub fn is_empty(&self) -> bool {
        self.pixel_width == 0 || self.pixel_height == 0
    }

    /// Resolve the number of cells to allocate for this image
    ///
    /// With no fixed axis the image is sized at its native pixel resolution.
    /// With one fixed axis the other is derived from the pixel aspect ratio.
    /// With both fixed they are taken as-is. The result is always clamped to
    /// `container`.
    pub fn cell_size(
        &self,
        container: ContainerBounds,
        metrics: TerminalCellMetrics,
    ) -> Result<Size, GeometryError> {
        if self.is_empty() {
            return Ok(Size::new(0, 0));
        }
        metrics.validate()?;

        let pixel_width = f64::from(self.pixel_width);
        let pixel_height = f64::from(self.pixel_height);
        let cell_width = metrics.cell_pixel_width;
        let cell_height = metrics.cell_pixel_height;

        let fixed_width = self.width.and_then(CellDimension::fixed);
        let fixed_height = self.height.and_then(CellDimension::fixed);

        // Derived lengths are computed as a single quotient so integral
        // results stay exact before the ceil.
        let (width, height) = match (fixed_width, fixed_height) {
            (Some(w), Some(h)) => (f64::from(w), f64::from(h)),
            (Some(w), None) => {
                let w = f64::from(w);
                let height = (pixel_height * w * cell_width) / (pixel_width * cell_height);
                (w, height.ceil())
            }
            (None, Some(h)) => {
                let h = f64::from(h);
                let width = (pixel_width * h * cell_height) / (pixel_height * cell_width);
                (width.ceil(), h)
            }
            (None, None) => (
                (pixel_width / cell_width).ceil(),
                (pixel_height / cell_height).ceil(),
            ),
        };

        Ok(Size::new(
            clamp_cells(width, container.width),
            clamp_cells(height, container.height),
        ))
    }
}

fn clamp_cells(cells: f64, bound: u16) -> u16 {
    // Float to int casts saturate, so the min keeps us inside u16 anyway
    cells.min(f64::from(bound)).max(0.0) as u16
}

/// Resolve the cell size of `image` inside `container`
pub fn resolve_cell_size(
    image: &ImageSize,
    container: ContainerBounds,
    metrics: TerminalCellMetrics,
) -> Result<Size, GeometryError> {
    image.cell_size(container, metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ImageStyle;

    fn metrics() -> TerminalCellMetrics {
        TerminalCellMetrics::new(10.0, 20.0)
    }

    fn image(width: Option<CellDimension>, height: Option<CellDimension>) -> ImageSize {
        ImageSize::new(800, 400, width, height)
    }

    #[test]
    fn test_native_size() {
        let size = image(None, None)
            .cell_size(Size::new(100, 100), metrics())
            .unwrap();
        assert_eq!(size, Size::new(80, 20));
    }

    #[test]
    fn test_native_size_rounds_up() {
        let size = ImageSize::new(801, 401, None, None)
            .cell_size(Size::new(100, 100), metrics())
            .unwrap();
        assert_eq!(size, Size::new(81, 21));
    }

    #[test]
    fn test_native_size_is_ceil_per_axis() {
        let container = Size::new(200, 200);
        let cases = [
            (1, 1),
            (9, 19),
            (10, 20),
            (11, 21),
            (333, 777),
            (1919, 1079),
        ];
        for (pw, ph) in cases {
            let size = ImageSize::new(pw, ph, None, None)
                .cell_size(container, metrics())
                .unwrap();
            let expected_w = (f64::from(pw) / 10.0).ceil().min(200.0) as u16;
            let expected_h = (f64::from(ph) / 20.0).ceil().min(200.0) as u16;
            assert_eq!(size, Size::new(expected_w, expected_h), "{}x{}", pw, ph);
        }
    }

    #[test]
    fn test_native_size_clamped() {
        let size = image(None, None)
            .cell_size(Size::new(10, 10), metrics())
            .unwrap();
        assert_eq!(size, Size::new(10, 10));
    }

    #[test]
    fn test_both_auto_matches_native() {
        let auto = image(Some(CellDimension::Auto), Some(CellDimension::Auto))
            .cell_size(Size::new(100, 100), metrics())
            .unwrap();
        assert_eq!(auto, Size::new(80, 20));

        let clamped = image(Some(CellDimension::Auto), Some(CellDimension::Auto))
            .cell_size(Size::new(50, 5), metrics())
            .unwrap();
        assert_eq!(clamped, Size::new(50, 5));
    }

    #[test]
    fn test_fixed_width_derives_height() {
        let size = image(Some(CellDimension::Fixed(40)), None)
            .cell_size(Size::new(100, 100), metrics())
            .unwrap();
        assert_eq!(size, Size::new(40, 10));

        // Auto on the other axis behaves like unset
        let size = image(Some(CellDimension::Fixed(40)), Some(CellDimension::Auto))
            .cell_size(Size::new(100, 100), metrics())
            .unwrap();
        assert_eq!(size, Size::new(40, 10));
    }

    #[test]
    fn test_fixed_height_derives_width() {
        // 10 rows = 200px tall, so the image is drawn 400px wide = 40 columns
        let size = image(None, Some(CellDimension::Fixed(10)))
            .cell_size(Size::new(100, 100), metrics())
            .unwrap();
        assert_eq!(size, Size::new(40, 10));

        let size = image(Some(CellDimension::Auto), Some(CellDimension::Fixed(10)))
            .cell_size(Size::new(100, 100), metrics())
            .unwrap();
        assert_eq!(size, Size::new(40, 10));
    }

    #[test]
    fn test_derived_axis_clamped() {
        let size = image(Some(CellDimension::Fixed(40)), None)
            .cell_size(Size::new(100, 4), metrics())
            .unwrap();
        assert_eq!(size, Size::new(40, 4));

        let size = image(Some(CellDimension::Fixed(400)), None)
            .cell_size(Size::new(100, 100), metrics())
            .unwrap();
        assert_eq!(size, Size::new(100, 100));
    }

    #[test]
    fn test_both_fixed() {
        let fixed = |n| Some(CellDimension::Fixed(n));
        let size = image(fixed(7), fixed(3))
            .cell_size(Size::new(100, 100), metrics())
            .unwrap();
        assert_eq!(size, Size::new(7, 3));

        let size = image(fixed(70), fixed(30))
            .cell_size(Size::new(50, 20), metrics())
            .unwrap();
        assert_eq!(size, Size::new(50, 20));
    }

    #[test]
    fn test_zero_container_axis() {
        let size = image(None, None)
            .cell_size(Size::new(0, 100), metrics())
            .unwrap();
        assert_eq!(size, Size::new(0, 20));

        let size = image(Some(CellDimension::Fixed(5)), Some(CellDimension::Fixed(5)))
            .cell_size(Size::new(5, 0), metrics())
            .unwrap();
        assert_eq!(size, Size::new(5, 0));
    }

    #[test]
    fn test_aspect_preserved_within_one_cell() {
        let (pw, ph) = (1234u32, 567u32);
        for n in [1u16, 5, 17, 40, 99] {
            let size = ImageSize::new(pw, ph, Some(CellDimension::Fixed(n)), None)
                .cell_size(Size::new(u16::MAX, u16::MAX), metrics())
                .unwrap();
            let rendered_w = f64::from(size.width) * 10.0;
            let ideal_h = rendered_w * f64::from(ph) / f64::from(pw);
            let rendered_h = f64::from(size.height) * 20.0;
            assert!(rendered_h >= ideal_h, "n={}", n);
            assert!(rendered_h - ideal_h < 20.0, "n={}", n);
        }
    }

    #[test]
    fn test_no_image_returns_zero() {
        let empty = ImageSize::new(0, 400, Some(CellDimension::Fixed(40)), None);
        assert_eq!(
            empty.cell_size(Size::new(100, 100), metrics()).unwrap(),
            Size::new(0, 0)
        );

        // Even with unusable metrics
        let empty = ImageSize::new(800, 0, None, None);
        assert_eq!(
            empty
                .cell_size(Size::new(100, 100), TerminalCellMetrics::new(0.0, 0.0))
                .unwrap(),
            Size::new(0, 0)
        );
    }

    #[test]
    fn test_invalid_metrics() {
        let cases = [
            (0.0, 20.0),
            (10.0, 0.0),
            (-1.0, 20.0),
            (f64::NAN, 20.0),
            (10.0, f64::INFINITY),
        ];
        for (w, h) in cases {
            let metrics = TerminalCellMetrics::new(w, h);
            let result = image(None, None).cell_size(Size::new(100, 100), metrics);
            assert!(
                matches!(result, Err(GeometryError::InvalidMetrics { .. })),
                "{}x{}",
                w,
                h
            );
        }
    }

    #[test]
    fn test_idempotent() {
        let size = image(Some(CellDimension::Fixed(33)), Some(CellDimension::Auto));
        let first = resolve_cell_size(&size, Size::new(60, 60), metrics()).unwrap();
        let second = resolve_cell_size(&size, Size::new(60, 60), metrics()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_styled_constructor() {
        let style = ImageStyle::new().width(CellDimension::Fixed(40));
        let size = ImageSize::styled(800, 400, &style);
        assert_eq!(size.width, Some(CellDimension::Fixed(40)));
        assert_eq!(size.height, None);
        assert_eq!(
            size.cell_size(Size::new(100, 100), metrics()).unwrap(),
            Size::new(40, 10)
        );
    }

    #[test]
    fn test_metrics_from_font_size() {
        let metrics = TerminalCellMetrics::from((8, 16));
        assert_eq!(metrics, TerminalCellMetrics::new(8.0, 16.0));
        assert!(metrics.validate().is_ok());
        assert!(TerminalCellMetrics::from((0, 16)).validate().is_err());
    }
}
