use ratatui::layout::{Constraint, Direction, Layout, Rect, Size};

/// Create viewer layout with title bar, image pane, and status line
/// Returns [title_area, image_area, status_area]
pub fn create_main_layout(area: Rect) -> [Rect; 3] {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Title bar
            Constraint::Min(1),    // Image
            Constraint::Length(1), // Status / keyboard hints
        ])
        .split(area);

    [chunks[0], chunks[1], chunks[2]]
}

/// Rectangle of `size` centered in `area` (clamped to it)
pub fn center_in(area: Rect, size: Size) -> Rect {
    let width = size.width.min(area.width);
    let height = size.height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}
