//! Image-to-cell geometry
//!
//! Everything here is pure: sizes go in, cell counts come out.

pub mod dimension;
pub mod size;

pub use dimension::{Axis, CellDimension, DimensionParseError, ImageStyle, StyledSize};
pub use size::{ContainerBounds, GeometryError, ImageSize, TerminalCellMetrics, resolve_cell_size};
