use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Cell, Clear, Gauge, Padding, Paragraph, Row, Table, TableState,
    Wrap,
};

use super::super::episode::{EpisodeDetail, duration_to_time_string, html_to_text, truncate};
use super::super::player::PlaybackState;
use super::{Control, PendingNotice};

#[allow(clippy::too_many_arguments)]
pub(super) fn draw_tui(
    frame: &mut Frame,
    items: &[EpisodeDetail],
    table_state: &mut TableState,
    playback: &PlaybackState,
    control: Control,
    status: &str,
    pending_notice: Option<&PendingNotice>,
    refreshing: bool,
) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let playing_text = match playback.current_episode() {
        Some(_) if playback.is_playing => "PLAYING",
        Some(_) => "PAUSED",
        None => "IDLE",
    };
    let mut header_spans = vec![
        Span::styled(
            "PODCASTER",
            Style::default()
                .fg(Color::Rgb(110, 170, 255))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(
            format!("{} episodes", items.len()),
            Style::default().fg(Color::Rgb(185, 195, 210)),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(
            format!("queue {}", playback.queue.len()),
            Style::default().fg(Color::Rgb(185, 195, 210)),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(playing_text, Style::default().fg(Color::Yellow)),
    ];
    if refreshing {
        header_spans.push(Span::styled("   ", Style::default()));
        header_spans.push(Span::styled(
            "refreshing...",
            Style::default().fg(Color::Rgb(205, 165, 255)),
        ));
    }
    let header = Paragraph::new(Line::from(header_spans))
        .alignment(Alignment::Center)
        .block(panel_block("Dashboard"));
    frame.render_widget(header, chunks[0]);

    let body_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[1]);
    let side_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(7), Constraint::Length(3)])
        .split(body_chunks[1]);

    let now_playing_url = playback.current_episode().map(|episode| episode.url.as_str());
    let rows: Vec<Row> = items
        .iter()
        .map(|item| {
            let marker = if now_playing_url == Some(item.url.as_str()) {
                "♪ "
            } else {
                ""
            };
            Row::new(vec![
                Cell::from(format!("{marker}{}", item.title)),
                Cell::from(item.members.clone()),
                Cell::from(item.published_at.clone()),
                Cell::from(item.duration_as_string.clone()),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(46),
            Constraint::Percentage(30),
            Constraint::Length(10),
            Constraint::Length(9),
        ],
    )
    .header(
        Row::new(vec!["Title", "Members", "Date", "Duration"]).style(
            Style::default()
                .fg(Color::Rgb(110, 170, 255))
                .add_modifier(Modifier::BOLD),
        ),
    )
    .block(panel_block("Episodes"))
    .row_highlight_style(
        Style::default()
            .bg(Color::Rgb(110, 170, 255))
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, body_chunks[0], table_state);

    let selection_text = match table_state.selected().and_then(|idx| items.get(idx)) {
        Some(item) => {
            let mut text = format!(
                "{}\n\n{}\n{}  ·  {}",
                truncate(&item.title, 80),
                truncate(&item.members, 60),
                item.published_at,
                item.duration_as_string,
            );
            let description = html_to_text(&item.description);
            if !description.is_empty() {
                text.push_str("\n\n");
                text.push_str(&description);
            }
            text
        }
        None => "No episodes loaded.\n\nPress r to refresh from the API.".to_string(),
    };
    let selection = Paragraph::new(selection_text)
        .style(Style::default().fg(Color::Rgb(230, 230, 230)))
        .wrap(Wrap { trim: true })
        .block(panel_block("Selected"));
    frame.render_widget(selection, side_chunks[0]);

    let now_playing_text = match playback.current_episode() {
        Some(episode) => format!(
            "{}\n{}\n{}",
            truncate(&episode.title, 60),
            truncate(&episode.members, 60),
            duration_to_time_string(episode.duration),
        ),
        None => "Nothing queued.\n\nEnter plays the list, p plays one episode.".to_string(),
    };
    let now_playing = Paragraph::new(now_playing_text)
        .style(Style::default().fg(Color::Rgb(230, 230, 230)))
        .wrap(Wrap { trim: true })
        .block(panel_block("Now Playing"));
    frame.render_widget(now_playing, side_chunks[1]);

    if let Some((ratio, label)) = queue_gauge(playback) {
        let progress = Gauge::default()
            .block(panel_block("Queue"))
            .gauge_style(
                Style::default()
                    .fg(Color::Rgb(130, 190, 255))
                    .bg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            )
            .label(label)
            .ratio(ratio);
        frame.render_widget(progress, side_chunks[2]);
    }

    let command_bar = Paragraph::new(control_selector_line(control, playback))
        .alignment(Alignment::Center)
        .block(panel_block("Controls"));
    frame.render_widget(command_bar, chunks[2]);

    let status_widget = Paragraph::new(status.to_string())
        .style(status_style(status))
        .block(panel_block("Status"));
    frame.render_widget(status_widget, chunks[3]);

    if let Some(notice) = pending_notice {
        let popup_area = popup_rect_for_text(frame.area(), &notice.message);
        render_popup_shadow(frame, popup_area);
        frame.render_widget(Clear, popup_area);
        let popup = Paragraph::new(notice.message.clone())
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(modal_block(notice.title));
        frame.render_widget(popup, popup_area);
    }
}

/// Position within the queue as a gauge ratio and `n/total` label.
pub(super) fn queue_gauge(playback: &PlaybackState) -> Option<(f64, String)> {
    playback.current_episode()?;
    let total = playback.queue.len();
    let shown = playback.current_index + 1;
    let ratio = (shown as f64 / total as f64).clamp(0.0, 1.0);
    Some((ratio, format!("{shown}/{total}")))
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn modal_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(
            Style::default()
                .fg(Color::Rgb(160, 190, 235))
                .add_modifier(Modifier::BOLD),
        )
        .title(title)
        .padding(Padding::new(2, 2, 1, 1))
}

fn pill_active() -> Style {
    Style::default()
        .bg(Color::Rgb(110, 170, 255))
        .fg(Color::Black)
        .add_modifier(Modifier::BOLD)
}

fn pill_inactive() -> Style {
    Style::default()
        .bg(Color::Rgb(72, 82, 96))
        .fg(Color::Rgb(230, 235, 242))
}

fn pill_disabled() -> Style {
    Style::default()
        .bg(Color::Rgb(40, 44, 52))
        .fg(Color::Rgb(110, 118, 130))
}

fn control_enabled(control: Control, playback: &PlaybackState) -> bool {
    match control {
        Control::Previous => playback.has_previous(),
        Control::Next => playback.has_next(),
        Control::PlayPause => playback.current_episode().is_some(),
        Control::Loop | Control::Shuffle => true,
    }
}

fn control_pill(control: Control, current: Control, playback: &PlaybackState) -> Span<'static> {
    let on = match control {
        Control::PlayPause => playback.is_playing,
        Control::Loop => playback.is_looping,
        Control::Shuffle => playback.is_shuffling,
        Control::Previous | Control::Next => false,
    };
    let label = if on {
        format!(" {} ● ", control.label())
    } else {
        format!(" {} ", control.label())
    };
    let style = if control == current {
        pill_active()
    } else if control_enabled(control, playback) {
        pill_inactive()
    } else {
        pill_disabled()
    };
    Span::styled(label, style)
}

fn control_selector_line(current: Control, playback: &PlaybackState) -> Line<'static> {
    let mut spans = Vec::new();
    for control in [
        Control::Previous,
        Control::PlayPause,
        Control::Next,
        Control::Loop,
        Control::Shuffle,
    ] {
        spans.push(control_pill(control, current, playback));
        spans.push(Span::styled(" ", Style::default()));
    }
    spans.push(Span::styled(
        "  ←/→ control  Space apply  Enter queue  p play  n/b next/prev  o open  r refresh  q quit",
        Style::default().fg(Color::Rgb(185, 195, 210)),
    ));
    Line::from(spans)
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else if status.starts_with("INFO:") {
        Style::default().fg(Color::Rgb(205, 165, 255))
    } else {
        Style::default().fg(Color::Rgb(230, 235, 242))
    }
}

fn centered_fixed_rect(width: u16, height: u16, area: Rect) -> Rect {
    let clamped_width = width.min(area.width.max(1));
    let clamped_height = height.min(area.height.max(1));
    let x = area.x + area.width.saturating_sub(clamped_width) / 2;
    let y = area.y + area.height.saturating_sub(clamped_height) / 2;
    Rect::new(x, y, clamped_width, clamped_height)
}

fn render_popup_shadow(frame: &mut Frame, popup_area: Rect) {
    let area = frame.area();
    let shadow = Rect::new(
        (popup_area.x + 1).min(area.x + area.width.saturating_sub(1)),
        (popup_area.y + 1).min(area.y + area.height.saturating_sub(1)),
        popup_area.width.saturating_sub(1),
        popup_area.height.saturating_sub(1),
    );
    if shadow.width == 0 || shadow.height == 0 {
        return;
    }
    let shadow_block = Block::default().style(Style::default().bg(Color::Rgb(14, 16, 24)));
    frame.render_widget(shadow_block, shadow);
}

pub(super) fn popup_rect_for_text(area: Rect, text: &str) -> Rect {
    let max_line_width = text
        .lines()
        .map(|line| line.chars().count() as u16)
        .max()
        .unwrap_or(0);
    let line_count = text.lines().count() as u16;

    let available_width = area.width.saturating_sub(2).max(1);
    let min_width = 48.min(available_width);
    let max_width = 72.min(available_width);
    let desired_width = max_line_width.saturating_add(12);
    let width = desired_width.clamp(min_width, max_width);

    let available_height = area.height.saturating_sub(2).max(1);
    let min_height = 10.min(available_height);
    let max_height = 18.min(available_height);
    let desired_height = line_count.saturating_add(6);
    let height = desired_height.clamp(min_height, max_height);

    centered_fixed_rect(width, height, area)
}
