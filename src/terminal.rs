use ratatui::crossterm::terminal;
use std::fmt;
use std::io::{self, IsTerminal};
use std::sync::{Arc, Mutex};

use crate::geometry::TerminalCellMetrics;

/// Cell width used when the terminal can't tell us
pub const DEFAULT_CELL_WIDTH: u16 = 10;

/// Cell height used when the terminal can't tell us
pub const DEFAULT_CELL_HEIGHT: u16 = 20;

/// Errors from querying the terminal
#[derive(Debug, thiserror::Error)]
pub enum TerminalError {
    #[error("stdout is not a terminal")]
    NotATerminal,

    #[error("Terminal reported an empty window: {columns}x{rows} cells, {width}x{height} pixels")]
    EmptyWindow {
        columns: u16,
        rows: u16,
        width: u16,
        height: u16,
    },

    #[error("Failed to query window size: {0}")]
    Io(#[from] io::Error),
}

/// Something that knows how big a terminal cell is in pixels
pub trait CellMetricsProvider: Send + Sync {
    /// Current cell pixel size
    fn cell_pixel_metrics(&self) -> TerminalCellMetrics;
}

impl<P: CellMetricsProvider + ?Sized> CellMetricsProvider for Arc<P> {
    fn cell_pixel_metrics(&self) -> TerminalCellMetrics {
        (**self).cell_pixel_metrics()
    }
}

/// Provider that always reports the same metrics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedMetrics(pub TerminalCellMetrics);

impl FixedMetrics {
    pub fn new(cell_pixel_width: f64, cell_pixel_height: f64) -> Self {
        FixedMetrics(TerminalCellMetrics::new(cell_pixel_width, cell_pixel_height))
    }
}

impl Default for FixedMetrics {
    fn default() -> Self {
        FixedMetrics(TerminalCellMetrics::from((DEFAULT_CELL_WIDTH, DEFAULT_CELL_HEIGHT)))
    }
}

impl CellMetricsProvider for FixedMetrics {
    fn cell_pixel_metrics(&self) -> TerminalCellMetrics {
        self.0
    }
}

/// Where a set of metrics came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsSource {
    /// Window-size query against the terminal
    Terminal,
    /// Configured fallback
    Fallback,
}

impl fmt::Display for MetricsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricsSource::Terminal => f.write_str("terminal"),
            MetricsSource::Fallback => f.write_str("fallback"),
        }
    }
}

/// Derive cell metrics from a window-size report
///
/// Uses whole-pixel division, so a 1283px wide window over 128 columns gives
/// 10px cells.
pub fn cell_metrics_from_window(
    columns: u16,
    rows: u16,
    width: u16,
    height: u16,
) -> Result<TerminalCellMetrics, TerminalError> {
    if columns == 0 || rows == 0 || width < columns || height < rows {
        return Err(TerminalError::EmptyWindow {
            columns,
            rows,
            width,
            height,
        });
    }
    Ok(TerminalCellMetrics::from((width / columns, height / rows)))
}

/// Ask the terminal attached to stdout for its cell size
pub fn query_cell_metrics() -> Result<TerminalCellMetrics, TerminalError> {
    if !io::stdout().is_terminal() {
        return Err(TerminalError::NotATerminal);
    }
    let size = terminal::window_size()?;
    cell_metrics_from_window(size.columns, size.rows, size.width, size.height)
}

/// Provider backed by the terminal's window-size report
///
/// The first answer is cached for the life of the provider; call
/// [`WindowMetrics::refresh`] after a resize or font change.
pub struct WindowMetrics {
    fallback: TerminalCellMetrics,
    cached: Mutex<Option<(TerminalCellMetrics, MetricsSource)>>,
}

impl WindowMetrics {
    pub fn new() -> Self {
        Self::with_fallback(FixedMetrics::default().0)
    }

    /// Provider that reports `fallback` when the terminal can't be queried
    pub fn with_fallback(fallback: TerminalCellMetrics) -> Self {
        WindowMetrics {
            fallback,
            cached: Mutex::new(None),
        }
    }

    /// Metrics plus where they came from
    pub fn detect(&self) -> (TerminalCellMetrics, MetricsSource) {
        if let Ok(cached) = self.cached.lock()
            && let Some(hit) = *cached
        {
            return hit;
        }

        let detected = match query_cell_metrics() {
            Ok(metrics) => {
                log::debug!(
                    "Terminal cell size: {}x{} pixels",
                    metrics.cell_pixel_width,
                    metrics.cell_pixel_height
                );
                (metrics, MetricsSource::Terminal)
            }
            Err(e) => {
                log::debug!("Failed to get cell size from terminal, using fallback: {}", e);
                (self.fallback, MetricsSource::Fallback)
            }
        };

        if let Ok(mut cached) = self.cached.lock() {
            *cached = Some(detected);
        }
        detected
    }

    /// Drop the cached answer so the next call queries the terminal again
    pub fn refresh(&self) {
        if let Ok(mut cached) = self.cached.lock() {
            *cached = None;
        }
    }
}

impl Default for WindowMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CellMetricsProvider for WindowMetrics {
    fn cell_pixel_metrics(&self) -> TerminalCellMetrics {
        self.detect().0
    }
}
