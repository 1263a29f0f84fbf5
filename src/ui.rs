use crate::config::ThemeColors;
use crate::core::PlayerCore;
use crate::model::{MediaKind, display_name};
use crate::sync::Readout;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

const APP_TITLE: &str = "playdeck  ";
const TIME_LABEL_WIDTH: u16 = 17;
const VOLUME_WIDTH: u16 = 24;
const VOLUME_BAR_WIDTH: usize = 12;

/// Everything the surface needs for one frame besides the session itself.
pub struct View<'a> {
    pub readout: &'a Readout,
    /// Slider value to draw; differs from the readout while dragging.
    pub progress: f64,
    pub highlight: usize,
    pub command: Option<&'a str>,
}

#[derive(Clone, Copy)]
struct Palette {
    bg: Color,
    text: Color,
    panel_bg: Color,
    panel_text: Color,
    muted: Color,
    accent: Color,
    selected_bg: Color,
}

fn palette(theme: &ThemeColors) -> Palette {
    let fallback = ThemeColors::default();
    let pick = |value: &str, default: &str| {
        parse_hex(value)
            .or_else(|| parse_hex(default))
            .unwrap_or(Color::Reset)
    };
    Palette {
        bg: pick(&theme.background, &fallback.background),
        text: pick(&theme.foreground, &fallback.foreground),
        panel_bg: pick(&theme.button_bg, &fallback.button_bg),
        panel_text: pick(&theme.button_fg, &fallback.button_fg),
        muted: Color::Rgb(149, 173, 204),
        accent: Color::Rgb(100, 203, 184),
        selected_bg: Color::Rgb(34, 55, 82),
    }
}

/// `#rrggbb` to a terminal color.
pub fn parse_hex(value: &str) -> Option<Color> {
    let hex = value.trim().strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some(Color::Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

struct Panes {
    header: Option<Rect>,
    playlist: Option<Rect>,
    stage: Option<Rect>,
    timeline: Rect,
    footer: Rect,
}

fn panes(area: Rect, fullscreen: bool) -> Panes {
    if fullscreen {
        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),
                Constraint::Length(3),
                Constraint::Length(3),
            ])
            .split(area);
        return Panes {
            header: None,
            playlist: None,
            stage: Some(vertical[0]),
            timeline: vertical[1],
            footer: vertical[2],
        };
    }

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(5),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(area);
    Panes {
        header: Some(vertical[0]),
        playlist: Some(vertical[1]),
        stage: None,
        timeline: vertical[2],
        footer: vertical[3],
    }
}

fn timeline_columns(timeline: Rect) -> [Rect; 3] {
    let inner = timeline.inner(Margin {
        vertical: 1,
        horizontal: 1,
    });
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(TIME_LABEL_WIDTH),
            Constraint::Min(4),
            Constraint::Length(VOLUME_WIDTH),
        ])
        .split(inner);
    [columns[0], columns[1], columns[2]]
}

/// Screen cells covered by the progress slider, for mouse hit-testing.
pub fn progress_rect(area: Rect, fullscreen: bool) -> Rect {
    timeline_columns(panes(area, fullscreen).timeline)[1]
}

/// Rows of the playlist inside its border; `None` in fullscreen.
pub fn playlist_rect(area: Rect, fullscreen: bool) -> Option<Rect> {
    panes(area, fullscreen).playlist.map(|rect| {
        rect.inner(Margin {
            vertical: 1,
            horizontal: 1,
        })
    })
}

/// Slider value in `0..=100` for a click at `column` on the progress bar.
pub fn percent_at(column: u16, bar: Rect) -> f64 {
    let track = bar.width.saturating_sub(2);
    if track <= 1 {
        return 0.0;
    }
    let offset = column.saturating_sub(bar.x.saturating_add(1)).min(track - 1);
    f64::from(offset) * 100.0 / f64::from(track - 1)
}

pub fn draw(frame: &mut Frame, core: &PlayerCore, theme: &ThemeColors, view: &View) {
    let colors = palette(theme);
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    let layout = panes(frame.area(), core.fullscreen);
    if let Some(header) = layout.header {
        draw_header(frame, core, &colors, header);
    }
    if let Some(playlist) = layout.playlist {
        draw_playlist(frame, core, &colors, view.highlight, playlist);
    }
    if let Some(stage) = layout.stage {
        draw_stage(frame, core, &colors, stage);
    }
    draw_timeline(frame, core, &colors, view, layout.timeline);
    draw_footer(frame, core, &colors, view.command, layout.footer);
}

fn draw_header(frame: &mut Frame, core: &PlayerCore, colors: &Palette, area: Rect) {
    let name = core.current_name().unwrap_or_else(|| String::from("-"));
    let kind = match core.media_kind() {
        Some(MediaKind::Audio) => "audio",
        Some(MediaKind::Video) => "video (audio track)",
        None => "-",
    };

    let lines = vec![
        Line::from(vec![
            Span::styled(
                APP_TITLE,
                Style::default()
                    .fg(colors.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(name, Style::default().fg(colors.text)),
        ]),
        Line::from(vec![
            Span::styled(
                core.state().label(),
                Style::default().fg(colors.accent),
            ),
            Span::styled("  |  ", Style::default().fg(colors.muted)),
            Span::styled(kind, Style::default().fg(colors.muted)),
            Span::styled("  |  ", Style::default().fg(colors.muted)),
            Span::styled(
                core.engine().output_name(),
                Style::default().fg(colors.muted),
            ),
        ]),
    ];
    frame.render_widget(
        Paragraph::new(lines).block(panel_block("Now Playing", colors.bg, colors)),
        area,
    );
}

fn draw_playlist(
    frame: &mut Frame,
    core: &PlayerCore,
    colors: &Palette,
    highlight: usize,
    area: Rect,
) {
    let playlist = core.playlist();
    let items: Vec<ListItem> = playlist
        .entries()
        .iter()
        .enumerate()
        .map(|(index, path)| {
            let marker = if playlist.cursor() == Some(index) {
                "  > "
            } else {
                "    "
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(colors.accent)),
                Span::styled(display_name(path), Style::default().fg(colors.text)),
            ]))
        })
        .collect();

    let mut state = ListState::default();
    state.select((!playlist.is_empty()).then(|| highlight.min(playlist.len() - 1)));

    let title = match playlist.cursor() {
        Some(cursor) => format!("Playlist {}/{}", cursor + 1, playlist.len()),
        None => String::from("Playlist"),
    };
    let list = List::new(items)
        .block(panel_block(&title, colors.bg, colors))
        .highlight_style(
            Style::default()
                .bg(colors.selected_bg)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_stage(frame: &mut Frame, core: &PlayerCore, colors: &Palette, area: Rect) {
    let name = core.current_name().unwrap_or_default();
    let top_padding = area.height.saturating_sub(2) / 2;
    let mut lines: Vec<Line> = (0..top_padding).map(|_| Line::from("")).collect();
    lines.push(Line::from(Span::styled(
        name,
        Style::default()
            .fg(colors.text)
            .add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(Span::styled(
        core.state().label(),
        Style::default().fg(colors.muted),
    )));
    frame.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .style(Style::default().bg(colors.bg)),
        area,
    );
}

fn draw_timeline(frame: &mut Frame, core: &PlayerCore, colors: &Palette, view: &View, area: Rect) {
    frame.render_widget(panel_block("Timeline", colors.panel_bg, colors), area);
    let [label, bar, volume] = timeline_columns(area);

    frame.render_widget(
        Paragraph::new(Span::styled(
            view.readout.label.as_str(),
            Style::default().fg(colors.panel_text),
        )),
        label,
    );
    frame.render_widget(
        Paragraph::new(Span::styled(
            progress_bar(view.progress / 100.0, usize::from(bar.width.saturating_sub(2))),
            Style::default().fg(colors.accent),
        )),
        bar,
    );

    let level = core.engine().get_volume();
    frame.render_widget(
        Paragraph::new(Span::styled(
            format!(
                " Vol {} {:>3}%",
                progress_bar(f64::from(level), VOLUME_BAR_WIDTH),
                (level * 100.0).round() as u16
            ),
            Style::default().fg(colors.panel_text),
        )),
        volume,
    );
}

fn draw_footer(
    frame: &mut Frame,
    core: &PlayerCore,
    colors: &Palette,
    command: Option<&str>,
    area: Rect,
) {
    let line = match command {
        Some(buffer) => Line::from(vec![
            Span::styled(":", Style::default().fg(colors.accent)),
            Span::styled(buffer, Style::default().fg(colors.text)),
        ]),
        None => Line::from(vec![
            Span::styled(
                "space play/pause, s stop, arrows prev/next/volume, shift+arrows seek, : command, q quit",
                Style::default().fg(colors.muted),
            ),
            Span::styled("  |  ", Style::default().fg(colors.muted)),
            Span::styled(core.status.as_str(), Style::default().fg(colors.text)),
        ]),
    };
    frame.render_widget(
        Paragraph::new(line)
            .block(panel_block("Message", colors.bg, colors))
            .wrap(Wrap { trim: true }),
        area,
    );
}

fn panel_block<'a>(title: &str, bg: Color, colors: &Palette) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default()
                .fg(colors.text)
                .add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(colors.muted))
        .style(Style::default().bg(bg))
}

fn progress_bar(ratio: f64, width: usize) -> String {
    let clamped = if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (clamped * width as f64).round() as usize;
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.push_str(&"#".repeat(filled));
    bar.push_str(&"-".repeat(width.saturating_sub(filled)));
    bar.push(']');
    bar
}
