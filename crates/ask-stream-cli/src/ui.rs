//! UI rendering with ratatui.
//!
//! A home panel fills the screen; opening the assistant adds the answer
//! sheet as a right-hand column.

use ask_stream_core::ResponseStatus;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap,
};
use ratatui::Frame;

use crate::app::{App, SUGGESTIONS};
use crate::markdown::render_markdown;

/// Horizontal padding for answer content.
const SHEET_PADDING: u16 = 2;

/// Render the UI.
pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header bar
            Constraint::Min(5),    // Main content
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    render_header_bar(frame, app, main_layout[0]);

    if app.is_open() {
        let content_layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(main_layout[1]);

        render_home_panel(frame, app, content_layout[0]);
        render_sheet(frame, app, content_layout[1]);
    } else {
        render_home_panel(frame, app, main_layout[1]);
    }

    render_status_bar(frame, app, main_layout[2]);
}

/// Truncate a string in the middle with ellipsis if it exceeds `max_len` characters.
fn truncate_middle(s: &str, max_len: usize) -> String {
    let len = s.chars().count();
    if len <= max_len {
        return s.to_string();
    }
    if max_len < 5 {
        return s.chars().take(max_len).collect();
    }
    let keep = (max_len - 3) / 2;
    let start: String = s.chars().take(keep).collect();
    let end: String = s.chars().skip(len - keep).collect();
    format!("{start}...{end}")
}

/// Render the header bar with the title and endpoint.
fn render_header_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "ASK";
    let max_url_width = (area.width as usize / 2).saturating_sub(2);
    let display_url = truncate_middle(app.endpoint_url(), max_url_width);
    let padding = (area.width as usize).saturating_sub(title.len() + display_url.chars().count());

    let line = Line::from(vec![
        Span::styled(title, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" ".repeat(padding)),
        Span::raw(display_url),
    ]);

    let header = Paragraph::new(line).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

/// Render the home panel.
fn render_home_panel(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Home ")
        .borders(Borders::ALL)
        .border_style(if app.is_open() {
            Style::default().fg(Color::Gray)
        } else {
            Style::default().fg(Color::Cyan)
        });

    let key = Style::default().fg(Color::Yellow);
    let text = Text::from(vec![
        Line::from(Span::styled(
            "Ask the docs",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("F2", key),
            Span::raw(" or "),
            Span::styled("Ctrl+O", key),
            Span::raw(if app.is_open() {
                " closes the assistant"
            } else {
                " opens the assistant"
            }),
        ]),
        Line::from(vec![
            Span::styled("Ctrl+C", key),
            Span::raw(" quits"),
        ]),
    ]);

    let paragraph = Paragraph::new(text)
        .block(block)
        .style(Style::default().fg(Color::Gray))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

/// Render the answer sheet: answer, suggestions, indicators and input.
fn render_sheet(frame: &mut Frame, app: &mut App, area: Rect) {
    let mut block = Block::default()
        .title(" Assistant ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    if app.is_loading() {
        block = block.title_bottom(
            Line::from(vec![
                Span::styled(" Esc", Style::default().fg(Color::Yellow)),
                Span::raw(": Stop generating "),
            ])
            .right_aligned(),
        );
    }

    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let inner_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Answer
            Constraint::Length(1), // Separator line
            Constraint::Length(1), // Input line
        ])
        .split(inner_area);

    let answer_area_full = inner_layout[0];
    let answer_area = Rect::new(
        answer_area_full.x + SHEET_PADDING,
        answer_area_full.y,
        answer_area_full.width.saturating_sub(SHEET_PADDING * 2 + 1), // +1 for scrollbar
        answer_area_full.height,
    );

    let text = Text::from(answer_lines(app, answer_area.width as usize));
    let visible_lines = answer_area.height as usize;
    let paragraph = Paragraph::new(text).wrap(Wrap { trim: true });
    // Rows after word wrapping.
    let total_wrapped_lines = paragraph.line_count(answer_area.width);

    app.set_viewport(total_wrapped_lines, visible_lines);
    let scroll_offset = app.scroll_offset();

    let paragraph = paragraph.scroll((u16::try_from(scroll_offset).unwrap_or(u16::MAX), 0));
    frame.render_widget(paragraph, answer_area);

    if total_wrapped_lines > visible_lines {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("▲"))
            .end_symbol(Some("▼"));

        let mut scrollbar_state = ScrollbarState::new(total_wrapped_lines)
            .position(scroll_offset)
            .viewport_content_length(visible_lines);

        frame.render_stateful_widget(scrollbar, answer_area_full, &mut scrollbar_state);
    }

    render_input_line(frame, app, inner_layout[1], inner_layout[2]);
}

/// Build the sheet's answer column.
fn answer_lines(app: &App, width: usize) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    if app.shows_suggestions() {
        lines.push(Line::from(Span::styled(
            "Try asking:",
            Style::default().fg(Color::DarkGray),
        )));
        lines.push(Line::from(""));
        for (i, suggestion) in SUGGESTIONS.iter().enumerate() {
            let selected = app.selected_suggestion == Some(i);
            let style = if selected {
                Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            lines.push(Line::from(vec![
                Span::styled(if selected { "> " } else { "  " }, Style::default().fg(Color::Cyan)),
                Span::styled(*suggestion, style),
            ]));
        }
        return lines;
    }

    let state = app.response();
    if !state.query.is_empty() {
        lines.push(Line::from(vec![
            Span::styled("[You] ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            Span::styled(state.query.clone(), Style::default().fg(Color::White)),
        ]));
        lines.push(Line::from(""));
    }

    if state.has_content() {
        lines.extend(render_markdown(&state.accumulated_text, width));
    } else if state.is_loading {
        lines.push(Line::from(vec![
            Span::styled(app.spinner_char(), Style::default().fg(Color::Yellow)),
            Span::styled(" Thinking...", Style::default().fg(Color::DarkGray)),
        ]));
    }

    if let Some(error) = &state.error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red).bold(),
        )));
    } else if state.status == ResponseStatus::Cancelled {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "(stopped)",
            Style::default().fg(Color::DarkGray).italic(),
        )));
    }

    lines
}

/// Render the input line at the bottom of the sheet.
fn render_input_line(frame: &mut Frame, app: &App, separator_area: Rect, input_area: Rect) {
    let separator = Paragraph::new("─".repeat(separator_area.width as usize))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(separator, separator_area);

    let prompt = "> ";
    let prompt_color = if app.can_submit() { Color::Cyan } else { Color::DarkGray };
    let input_line = Line::from(vec![
        Span::styled(prompt, Style::default().fg(prompt_color)),
        Span::styled(app.input.as_str(), Style::default().fg(Color::White)),
    ]);
    frame.render_widget(Paragraph::new(input_line), input_area);

    // Hidden while streaming to prevent flickering.
    if !app.is_loading() {
        let offset = Line::from(app.input_before_cursor()).width() + prompt.len();
        frame.set_cursor_position((
            input_area.x + u16::try_from(offset).unwrap_or(u16::MAX),
            input_area.y,
        ));
    }
}

/// Render the status bar.
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let status = app.response().status;
    let badge_style = Style::default().fg(Color::Black).bg(match status {
        ResponseStatus::Idle => Color::Green,
        ResponseStatus::Loading | ResponseStatus::Streaming => Color::Yellow,
        ResponseStatus::Error => Color::Red,
        ResponseStatus::Cancelled => Color::Blue,
    });
    let badge = Span::styled(format!(" {} ", status.as_str().to_uppercase()), badge_style);

    let key = Style::default().fg(Color::Yellow);
    let enter = if app.can_submit() || app.shows_suggestions() {
        key
    } else {
        Style::default().fg(Color::Gray)
    };

    let line = if app.is_open() {
        let mut spans = vec![badge];
        if !app.is_following() {
            spans.push(Span::styled(" [scroll paused]", Style::default().fg(Color::Yellow)));
        }
        spans.extend([
            Span::raw(" "),
            Span::styled("Enter", enter),
            Span::raw(":ask "),
        ]);
        if app.is_loading() {
            spans.extend([Span::styled("Esc", key), Span::raw(":stop ")]);
        } else {
            spans.extend([Span::styled("Esc", key), Span::raw(":close ")]);
        }
        spans.extend([
            Span::styled("PgUp/PgDn", key),
            Span::raw(":scroll "),
            Span::styled("Ctrl+C", key),
            Span::raw(":quit"),
        ]);
        Line::from(spans)
    } else {
        Line::from(vec![
            badge,
            Span::raw(" "),
            Span::styled("F2", key),
            Span::raw(":open "),
            Span::styled("Ctrl+C", key),
            Span::raw(":quit"),
        ])
    };

    let status_bar = Paragraph::new(line).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(status_bar, area);
}
