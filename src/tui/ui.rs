//! UI layout and rendering logic for the TUI.

use std::time::Instant;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use super::app::App;
use crate::view::ViewStatus;

/// Render the main UI
pub fn render_ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Input area
            Constraint::Min(5),    // Report + charts
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_input_area(frame, app, main_layout[0]);

    let regions = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(main_layout[1]);
    render_report_region(frame, app, regions[0]);
    render_chart_region(frame, app, regions[1]);

    render_status_bar(frame, app, main_layout[2]);

    // Render help overlay if requested
    if app.show_help {
        render_help_overlay(frame);
    }
}

/// Style for placeholder, progress and error text shared by both regions.
fn status_style(status: &ViewStatus) -> Style {
    match status {
        ViewStatus::Placeholder => Style::default().fg(Color::DarkGray),
        ViewStatus::Progress => Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        ViewStatus::Failed(_) => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ViewStatus::Rendered => Style::default(),
    }
}

/// Render the input area; the border flashes red after an empty submit.
fn render_input_area(frame: &mut Frame, app: &App, area: Rect) {
    let rejecting = app.is_rejecting(Instant::now());
    let (title, border) = if rejecting {
        ("Ask a data question - type a question first", Style::default().fg(Color::Red))
    } else {
        ("Ask a data question", Style::default())
    };

    let input_paragraph = Paragraph::new(app.input.as_str())
        .block(Block::default().borders(Borders::ALL).title(title).border_style(border));
    frame.render_widget(input_paragraph, area);

    if !app.show_help {
        frame.set_cursor_position((input_cursor_x(app, area), area.y + 1));
    }
}

/// Cursor column inside the input box, clamped to its inner right edge.
fn input_cursor_x(app: &App, area: Rect) -> u16 {
    let typed = u16::try_from(app.input_before_cursor().width()).unwrap_or(u16::MAX);
    area.x
        .saturating_add(1)
        .saturating_add(typed)
        .min(area.right().saturating_sub(2))
}

/// Render the report region
fn render_report_region(frame: &mut Frame, app: &App, area: Rect) {
    let status = app.view.status();
    let style = status_style(status);
    let mut lines: Vec<Line> = Vec::new();

    if *status == ViewStatus::Rendered {
        for line in app.view.report_markdown().lines() {
            lines.push(markdown_line(line));
        }
        if app.view.reformulated_intent().is_some() || app.view.sql_query().is_some() {
            lines.push(Line::from(""));
        }
        if let Some(intent) = app.view.reformulated_intent() {
            lines.push(Line::from(vec![
                Span::styled("Interpreted as ", Style::default().fg(Color::DarkGray)),
                Span::styled(intent.to_string(), Style::default().fg(Color::Cyan)),
            ]));
        }
        if let Some(sql) = app.view.sql_query() {
            lines.push(Line::from(vec![
                Span::styled("SQL ", Style::default().fg(Color::DarkGray)),
                Span::styled(sql.to_string(), Style::default().fg(Color::Cyan)),
            ]));
        }
    } else {
        lines.push(Line::from(Span::styled(app.view.report_text(), style)));
    }

    let title = match app.last_query.as_deref() {
        Some(q) => format!("Report - {}", q),
        None => "Report".to_string(),
    };
    let paragraph = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false })
        .scroll((app.report_scroll, 0));
    frame.render_widget(paragraph, area);
}

fn markdown_line(line: &str) -> Line<'static> {
    let heading = line.trim_start_matches('#');
    if heading.len() < line.len() && heading.starts_with(' ') {
        return Line::from(Span::styled(
            heading.trim().to_string(),
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        ));
    }
    Line::from(line.to_string())
}

/// Render the chart list region
fn render_chart_region(frame: &mut Frame, app: &App, area: Rect) {
    let status = app.view.status();
    let mut lines: Vec<Line> = Vec::new();
    let charts = app.view.chart_summaries();

    if *status == ViewStatus::Rendered && !charts.is_empty() {
        for chart in charts {
            lines.push(Line::from(vec![
                Span::styled(chart.label, Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
                Span::styled(
                    format!("  {} script(s)", chart.scripts),
                    Style::default().fg(Color::DarkGray),
                ),
            ]));
            if !chart.text.is_empty() {
                lines.push(Line::from(chart.text));
            }
            lines.push(Line::from(""));
        }
    } else {
        let style = if *status == ViewStatus::Rendered { status_style(&ViewStatus::Placeholder) } else { status_style(status) };
        lines.push(Line::from(Span::styled(app.view.charts_text(), style)));
    }

    let paragraph = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title("Charts"))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

/// Render the status bar
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let status_text = format!(
        "{} | {} | {} {} | scripts run: {} | {}",
        app.model,
        app.endpoint,
        app.state_label,
        app.generation,
        app.scripts_executed(),
        app.status_message
    );
    let status_paragraph =
        Paragraph::new(status_text).style(Style::default().bg(Color::DarkGray).fg(Color::White));
    frame.render_widget(status_paragraph, area);
}

/// Render help overlay
fn render_help_overlay(frame: &mut Frame) {
    let popup_area = centered_rect(70, 60, frame.area());
    frame.render_widget(Clear, popup_area);

    let help_lines = vec![
        Line::from("Khawarizmi Help"),
        Line::from(""),
        Line::from("Input:"),
        Line::from("  Enter          - Run the question"),
        Line::from("  ↑/↓, Ctrl+P/N  - Previous/next question"),
        Line::from("  ←/→ Home/End   - Move cursor"),
        Line::from(""),
        Line::from("View:"),
        Line::from("  PgUp/PgDn      - Scroll the report"),
        Line::from("  Ctrl+S         - Export the page as HTML"),
        Line::from("  F1             - Toggle this help"),
        Line::from(""),
        Line::from("  Esc, Ctrl+C x2 - Quit"),
    ];

    let help_paragraph = Paragraph::new(Text::from(help_lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Help")
                .title_style(
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(help_paragraph, popup_area);
}

/// Helper function to create a centered rectangle
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
