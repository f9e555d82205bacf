use crate::app::{Focus, ViewState};
use crate::controller::{PlaybackController, folder_display_name, format_clock};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Wrap};

const APP_TITLE: &str = "BangerPlayer  ";
const PLAYER_HEIGHT: u16 = 6;

#[derive(Clone, Copy)]
struct Palette {
    bg: Color,
    panel_bg: Color,
    panel_alt_bg: Color,
    border: Color,
    focus_border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    alert: Color,
    selected_bg: Color,
    popup_bg: Color,
}

const PALETTE: Palette = Palette {
    bg: Color::Rgb(10, 15, 24),
    panel_bg: Color::Rgb(19, 29, 43),
    panel_alt_bg: Color::Rgb(24, 38, 58),
    border: Color::Rgb(69, 121, 176),
    focus_border: Color::Rgb(100, 203, 184),
    text: Color::Rgb(214, 228, 248),
    muted: Color::Rgb(149, 173, 204),
    accent: Color::Rgb(100, 203, 184),
    alert: Color::Rgb(249, 174, 88),
    selected_bg: Color::Rgb(34, 55, 82),
    popup_bg: Color::Rgb(22, 33, 51),
};

struct Areas {
    header: Rect,
    folders: Rect,
    tracks: Rect,
    player: Option<Rect>,
    message: Rect,
}

fn split(area: Rect, player_visible: bool) -> Areas {
    let player_height = if player_visible { PLAYER_HEIGHT } else { 0 };
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(player_height),
            Constraint::Length(3),
        ])
        .split(area);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(32), Constraint::Percentage(68)])
        .split(vertical[1]);

    Areas {
        header: vertical[0],
        folders: body[0],
        tracks: body[1],
        player: player_visible.then_some(vertical[2]),
        message: vertical[3],
    }
}

/// Row of the progress gauge inside the player panel, for click-to-seek.
pub fn progress_rect(area: Rect, player_visible: bool) -> Rect {
    let Some(player) = split(area, player_visible).player else {
        return Rect::default();
    };
    let inner = player.inner(Margin {
        vertical: 1,
        horizontal: 1,
    });
    Rect {
        x: inner.x,
        y: inner.y.saturating_add(2),
        width: inner.width,
        height: inner.height.saturating_sub(2).min(1),
    }
}

pub fn draw(frame: &mut Frame, controller: &PlaybackController, view: &ViewState) {
    let colors = PALETTE;
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    let areas = split(frame.area(), controller.player_visible());

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            APP_TITLE,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("Folders {}", controller.folders().len()),
            Style::default().fg(colors.text),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            format!("Loop {}", controller.loop_mode().label()),
            Style::default().fg(colors.alert),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            format!("Shuffle {}", if controller.shuffle() { "on" } else { "off" }),
            Style::default().fg(colors.alert),
        ),
    ]))
    .block(panel_block("Status", colors.panel_bg, colors.border));
    frame.render_widget(header, areas.header);

    draw_folders(frame, controller, view, areas.folders, &colors);
    draw_tracks(frame, controller, view, areas.tracks, &colors);
    if let Some(player) = areas.player {
        draw_player(frame, controller, player, &colors);
    }

    let message = if view.command_mode {
        Line::from(vec![
            Span::styled(":", Style::default().fg(colors.accent)),
            Span::styled(view.command_buffer.as_str(), Style::default().fg(colors.text)),
        ])
    } else {
        Line::from(vec![
            Span::styled(
                "Tab focus, Enter open, Space play, p play folder, l loop, s shuffle, : command, q quit",
                Style::default().fg(colors.muted),
            ),
            Span::styled("  |  ", Style::default().fg(colors.muted)),
            Span::styled(controller.status.as_str(), Style::default().fg(colors.text)),
        ])
    };
    frame.render_widget(
        Paragraph::new(message).block(panel_block("Message", colors.panel_bg, colors.border)),
        areas.message,
    );

    if let Some(folder) = &view.confirm_remove {
        draw_confirm(frame, folder, &colors);
    }
}

fn draw_folders(
    frame: &mut Frame,
    controller: &PlaybackController,
    view: &ViewState,
    area: Rect,
    colors: &Palette,
) {
    let items: Vec<ListItem> = controller
        .folders()
        .iter()
        .map(|folder| {
            let open = controller.current_folder() == Some(folder.as_path());
            let marker = if open { "  > " } else { "    " };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(colors.muted)),
                Span::styled(folder_display_name(folder), Style::default().fg(colors.accent)),
            ]))
        })
        .collect();

    let mut state = ListState::default();
    state.select((!controller.folders().is_empty()).then_some(view.folder_cursor));

    let border = if view.focus == Focus::Folders {
        colors.focus_border
    } else {
        colors.border
    };
    let list = List::new(items)
        .block(panel_block("Folders", colors.panel_bg, border))
        .highlight_style(highlight(colors))
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_tracks(
    frame: &mut Frame,
    controller: &PlaybackController,
    view: &ViewState,
    area: Rect,
    colors: &Palette,
) {
    let items: Vec<ListItem> = controller
        .tracks()
        .iter()
        .map(|track| {
            let current = controller.current_track() == Some(track.path.as_path());
            let marker = if current { "  > " } else { "    " };
            let length = if track.duration_seconds > 0 {
                format_clock(track.duration_seconds)
            } else {
                String::from("-:--")
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(colors.muted)),
                Span::styled(track.title.as_str(), Style::default().fg(colors.text)),
                Span::styled(
                    format!("  {}", track.artist.as_deref().unwrap_or("-")),
                    Style::default().fg(colors.muted),
                ),
                Span::styled(format!("  {length}"), Style::default().fg(colors.alert)),
            ]))
        })
        .collect();

    let mut state = ListState::default();
    state.select((!controller.tracks().is_empty()).then_some(view.track_cursor));

    let title = controller
        .current_folder()
        .map(|folder| format!("Tracks / {}", folder_display_name(folder)))
        .unwrap_or_else(|| String::from("Tracks"));
    let border = if view.focus == Focus::Tracks {
        colors.focus_border
    } else {
        colors.border
    };
    let list = List::new(items)
        .block(panel_block(&title, colors.panel_bg, border))
        .highlight_style(highlight(colors))
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_player(frame: &mut Frame, controller: &PlaybackController, area: Rect, colors: &Palette) {
    let block = panel_block("Now Playing", colors.panel_alt_bg, colors.border);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(now) = controller.now_playing() else {
        return;
    };
    let state = if controller.is_playing() { "Playing" } else { "Paused" };
    let cover = match &now.cover {
        Some(bytes) => format!("cover {} KB", bytes.len().div_ceil(1024)),
        None => String::from("no cover"),
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(inner);

    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(
                format!("{state}  "),
                Style::default()
                    .fg(colors.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(now.title.as_str(), Style::default().fg(colors.text)),
        ]))
        .wrap(Wrap { trim: true }),
        rows[0],
    );
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(
                format!("Artist  {}", now.artist.as_deref().unwrap_or("-")),
                Style::default().fg(colors.muted),
            ),
            Span::styled(format!("  |  {cover}"), Style::default().fg(colors.muted)),
        ])),
        rows[1],
    );

    let position = controller.position_seconds();
    let duration = controller.duration_seconds();
    let ratio = if duration > 0 {
        (f64::from(position) / f64::from(duration)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(colors.accent).bg(colors.selected_bg))
        .ratio(ratio)
        .label(format!(
            "{} / {}",
            format_clock(position),
            format_clock(duration)
        ));
    frame.render_widget(gauge, rows[2]);
}

fn draw_confirm(frame: &mut Frame, folder: &std::path::Path, colors: &Palette) {
    let popup = centered_rect(frame.area(), 50, 20);
    frame.render_widget(Clear, popup);
    let text = vec![
        Line::from(Span::styled(
            format!("Remove {} from the list?", folder_display_name(folder)),
            Style::default().fg(colors.text),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "y confirm, any other key cancels",
            Style::default().fg(colors.muted),
        )),
    ];
    frame.render_widget(
        Paragraph::new(text)
            .block(panel_block("Remove Folder", colors.popup_bg, colors.alert))
            .wrap(Wrap { trim: true }),
        popup,
    );
}

fn highlight(colors: &Palette) -> Style {
    Style::default()
        .bg(colors.selected_bg)
        .fg(Color::White)
        .add_modifier(Modifier::BOLD)
}

fn panel_block(title: &str, bg: Color, border: Color) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default()
                .fg(PALETTE.text)
                .add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(bg))
}

fn centered_rect(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_row_is_empty_without_player_panel() {
        let area = Rect::new(0, 0, 100, 40);
        assert_eq!(progress_rect(area, false), Rect::default());
    }

    #[test]
    fn progress_row_sits_inside_player_panel() {
        let area = Rect::new(0, 0, 100, 40);
        let player = split(area, true).player.expect("player area");
        let row = progress_rect(area, true);

        assert_eq!(row.height, 1);
        assert!(row.y > player.y && row.y < player.y + player.height);
        assert_eq!(row.x, player.x + 1);
        assert_eq!(row.width, player.width - 2);
    }
}
