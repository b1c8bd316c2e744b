pub mod layout;
pub mod status;

use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::app::App;

pub use layout::{center_in, create_main_layout};
pub use status::render_status;

/// Render title bar: file name, position in the list, and pixel size
pub fn render_title(frame: &mut Frame, area: Rect, app: &App) {
    let name = app
        .current_path()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "[no image]".to_string());

    let position = format!(" {}/{}", app.selected_index + 1, app.paths.len().max(1));

    let mut spans = vec![
        Span::styled(name, Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(position, Style::default().fg(Color::DarkGray)),
    ];

    let (width, height) = app.image_pixel_size();
    if width > 0 && height > 0 {
        spans.push(Span::styled(
            format!("  {}x{}px", width, height),
            Style::default().fg(Color::DarkGray),
        ));
    }

    let line = Line::from(spans);

    frame.render_widget(Paragraph::new(line), area);
}

/// Render a centered one-line notice in place of the image
pub fn render_notice(frame: &mut Frame, area: Rect, message: &str) {
    let [_, row, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(1),
        Constraint::Fill(1),
    ])
    .areas(area);

    let paragraph = Paragraph::new(message)
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, row);
}
