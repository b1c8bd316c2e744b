//! tuimg - Images in ratatui terminal UIs
//!
//! The core is [`geometry::ImageSize::cell_size`], which works out how many
//! terminal cells an image should occupy. [`widget::ImageWidget`] wires it
//! into ratatui's layout and hands drawing to an [`image::ImageRenderable`].

pub mod app;
pub mod geometry;
pub mod image;
pub mod logging;
pub mod storage;
pub mod terminal;
pub mod ui;
pub mod widget;

pub use geometry::{CellDimension, ImageSize, ImageStyle, TerminalCellMetrics, resolve_cell_size};
pub use widget::ImageWidget;
