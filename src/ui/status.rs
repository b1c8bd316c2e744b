use log::Level;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::logging::FlashMessage;

const HINTS: &[(&[&str], &str)] = &[
    (&["n", "p"], "next/prev"),
    (&["r"], "reload"),
    (&["q"], "quit"),
];

fn flash_style(level: Level) -> Style {
    match level {
        Level::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        Level::Warn => Style::default().fg(Color::Yellow),
        _ => Style::default().fg(Color::Gray),
    }
}

/// Render the status line: the newest flash message if any, keyboard hints otherwise
pub fn render_status(frame: &mut Frame, area: Rect, flash_messages: &[FlashMessage]) {
    if let Some(msg) = flash_messages.last() {
        let line = Line::from(vec![
            Span::styled(format!("{} ", msg.level), flash_style(msg.level)),
            Span::raw(msg.message.as_str()),
        ]);
        frame.render_widget(Paragraph::new(line), area);
        return;
    }

    let key_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let desc_style = Style::default().fg(Color::DarkGray);

    let mut hints = Vec::new();
    for (keys, description) in HINTS {
        for (i, key) in keys.iter().enumerate() {
            if i > 0 {
                hints.push(Span::styled("/", desc_style));
            }
            hints.push(Span::styled(*key, key_style));
        }
        hints.push(Span::raw(" "));
        hints.push(Span::styled(*description, desc_style));
        hints.push(Span::raw("  "));
    }

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}
