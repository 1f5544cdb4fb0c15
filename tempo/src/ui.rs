use crate::app::{App, AppMode};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Gauge, List, ListItem, Paragraph},
    Frame,
};
use tempo_ipc::{PreferenceField, TimerStatus};

pub fn draw(f: &mut Frame, app: &App) {
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(7),
            Constraint::Min(8),
            Constraint::Length(1),
        ])
        .split(area);

    draw_header(f, chunks[0], app);
    draw_timer(f, chunks[1], app);
    draw_preferences(f, chunks[2], app);
    draw_status_bar(f, chunks[3], app);

    match app.mode {
        AppMode::EditingField(field) => draw_input_overlay(f, field, &app.input_buffer, app),
        AppMode::SelectingPreset => draw_preset_overlay(f, app),
        AppMode::Normal => {}
    }
}

/// `MM:SS`, minutes are not wrapped into hours.
pub fn format_remaining(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

pub fn progress(status: &TimerStatus) -> f64 {
    if status.total_seconds == 0 {
        return 0.0;
    }
    let elapsed = status.total_seconds.saturating_sub(status.seconds_remaining);
    (elapsed as f64 / status.total_seconds as f64).min(1.0)
}

fn field_label(field: PreferenceField) -> &'static str {
    match field {
        PreferenceField::WorkMinutes => "Work (min)",
        PreferenceField::BreakMinutes => "Break (min)",
        PreferenceField::LongBreakMinutes => "Long break (min)",
        PreferenceField::LongBreakEvery => "Long break every",
        PreferenceField::AutoStartNext => "Auto-start next",
        PreferenceField::NotificationsEnabled => "Notifications",
    }
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.config.theme;
    let icons = &app.config.icons;
    let text = Line::from(vec![
        Span::raw(icons.header_left.clone()),
        Span::styled(
            "TEMPO",
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        ),
        Span::raw(icons.header_right.clone()),
    ]);
    f.render_widget(
        Paragraph::new(text).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(Style::default().fg(theme.black)),
        ),
        area,
    );
}

fn draw_timer(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.config.theme;
    let icons = &app.config.icons;
    let status = app.scheduler.status();
    let phase_color = theme.phase(status.phase);
    let state_icon = if status.is_running {
        &icons.play
    } else {
        &icons.pause
    };

    let block = Block::default()
        .title(Span::styled(
            format!(" {} {} ", icons.timer, status.phase),
            Style::default().fg(phase_color).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(phase_color));
    let inner_area = block.inner(area);
    f.render_widget(block, area);
    let v_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner_area);
    f.render_widget(
        Paragraph::new(format!(
            "{} {}",
            state_icon,
            format_remaining(status.seconds_remaining)
        ))
        .style(
            Style::default()
                .fg(theme.foreground)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center),
        v_chunks[0],
    );
    f.render_widget(
        Gauge::default()
            .gauge_style(Style::default().fg(phase_color).bg(theme.black))
            .ratio(progress(&status)),
        v_chunks[1],
    );

    let every = app.scheduler.preferences().long_break_every;
    let sessions = if every > 0 {
        let done_in_cycle = status.completed_work_sessions % every;
        format!(
            "{} {}/{}  ({} total)",
            icons.session, done_in_cycle, every, status.completed_work_sessions
        )
    } else {
        format!("{} {} sessions", icons.session, status.completed_work_sessions)
    };
    f.render_widget(
        Paragraph::new(sessions)
            .style(Style::default().fg(theme.gray))
            .alignment(Alignment::Center),
        v_chunks[2],
    );
}

fn draw_preferences(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.config.theme;
    let icons = &app.config.icons;
    let prefs = app.scheduler.preferences();
    let block = Block::default()
        .title(Span::styled(
            format!(" {} Settings ", icons.settings),
            Style::default().fg(theme.gray),
        ))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.accent));

    let items: Vec<ListItem> = PreferenceField::ALL
        .iter()
        .enumerate()
        .map(|(i, &field)| {
            let selected = i == app.selected_field;
            let cursor = if selected {
                Span::styled(icons.select.clone(), Style::default().fg(theme.selection))
            } else {
                Span::raw(" ")
            };
            let line = Line::from(vec![
                cursor,
                Span::raw(" "),
                Span::styled(
                    format!("{:<18}", field_label(field)),
                    Style::default().fg(theme.foreground),
                ),
                Span::styled(prefs.get(field), Style::default().fg(theme.selection)),
            ]);
            let item = ListItem::new(line);
            if selected {
                item.style(Style::default().bg(theme.black))
            } else {
                item
            }
        })
        .collect();
    f.render_widget(List::new(items).block(block), area);
}

fn draw_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.config.theme;
    let (mode_text, mode_color) = match app.mode {
        AppMode::Normal => ("NORMAL", theme.short_break),
        AppMode::EditingField(_) => ("EDIT", theme.long_break),
        AppMode::SelectingPreset => ("PRESET", theme.accent),
    };
    let help = match app.mode {
        AppMode::Normal => {
            "space:start/pause │ s:skip │ r:reset │ R:reset all │ p:preset │ enter:edit │ q:quit"
        }
        AppMode::EditingField(_) => "enter:confirm │ esc:cancel",
        AppMode::SelectingPreset => "j/k:move │ enter:apply │ 1-9:quick pick │ esc:cancel",
    };
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(
                format!(" {} ", mode_text),
                Style::default()
                    .bg(mode_color)
                    .fg(theme.background)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::raw(help),
        ]))
        .block(Block::default().style(Style::default().bg(theme.black).fg(theme.gray))),
        area,
    );
}

fn draw_input_overlay(f: &mut Frame, field: PreferenceField, input: &str, app: &App) {
    let area = centered_rect(50, 20, f.area());
    f.render_widget(Clear, area);
    let block = Block::default()
        .title(format!(" {} ", field_label(field)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(app.config.theme.selection))
        .border_type(BorderType::Double)
        .style(Style::default().bg(app.config.theme.background));
    let inner_area = block.inner(area);
    f.render_widget(block, area);
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("▸ ", Style::default().fg(app.config.theme.foreground)),
            Span::styled(input, Style::default().fg(app.config.theme.foreground)),
            Span::styled(
                &app.config.icons.input_cursor,
                Style::default()
                    .fg(app.config.theme.foreground)
                    .add_modifier(Modifier::SLOW_BLINK),
            ),
        ])),
        inner_area,
    );
}

fn draw_preset_overlay(f: &mut Frame, app: &App) {
    let area = centered_rect(60, 50, f.area());
    f.render_widget(Clear, area);
    let theme = &app.config.theme;
    let items: Vec<ListItem> = app
        .scheduler
        .presets()
        .iter()
        .enumerate()
        .map(|(i, preset)| {
            let selected = i == app.selected_preset;
            let cursor = if selected {
                Span::styled(
                    app.config.icons.select.clone(),
                    Style::default().fg(theme.selection),
                )
            } else {
                Span::raw(" ")
            };
            let item = ListItem::new(Line::from(vec![
                cursor,
                Span::raw(" "),
                Span::styled(format!("{}. ", i + 1), Style::default().fg(theme.long_break)),
                Span::raw(preset.label.clone()),
                Span::styled(
                    format!(
                        " ({}/{}/{}m, long every {})",
                        preset.work_minutes,
                        preset.break_minutes,
                        preset.long_break_minutes,
                        preset.long_break_every
                    ),
                    Style::default().fg(theme.gray),
                ),
            ]));
            if selected {
                item.style(Style::default().bg(theme.black))
            } else {
                item
            }
        })
        .collect();
    f.render_widget(
        List::new(items).block(
            Block::default()
                .title(" Select Preset ")
                .borders(Borders::ALL)
                .border_type(BorderType::Double)
                .border_style(Style::default().fg(theme.accent))
                .style(Style::default().bg(theme.background)),
        ),
        area,
    );
}

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

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_ipc::Phase;

    #[test]
    fn remaining_time_is_minutes_and_seconds() {
        assert_eq!(format_remaining(1500), "25:00");
        assert_eq!(format_remaining(61), "01:01");
        assert_eq!(format_remaining(0), "00:00");
        assert_eq!(format_remaining(180 * 60), "180:00");
    }

    #[test]
    fn progress_tracks_elapsed_share() {
        let status = TimerStatus {
            phase: Phase::Break,
            seconds_remaining: 75,
            total_seconds: 300,
            is_running: true,
            completed_work_sessions: 1,
        };
        assert!((progress(&status) - 0.75).abs() < f64::EPSILON);
    }
}
