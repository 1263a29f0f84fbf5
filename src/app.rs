use crate::audio::{AudioBackend, RodioBackend};
use crate::config::{self, Config, Shortcuts};
use crate::core::{PlayerCore, SEEK_STEP_SECONDS, VOLUME_STEP};
use crate::engine::PlaybackEngine;
use crate::error::PlayerError;
use crate::logging;
use crate::model::SessionState;
use crate::sync::{SYNC_INTERVAL, SyncLoop};
use crate::ui;
use anyhow::Result;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::Rect;
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info};

#[derive(Debug, Clone, Default)]
pub struct AppStartupOptions {
    pub config_dir: Option<PathBuf>,
    /// File or folder to open before the first frame.
    pub open: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    PlayPause,
    Stop,
    Next,
    Previous,
    VolumeUp,
    VolumeDown,
    ToggleFullscreen,
    ExitFullscreen,
    SeekForward,
    SeekBackward,
    HighlightUp,
    HighlightDown,
    PlayHighlighted,
    CommandMode,
    Quit,
}

#[derive(Debug, Default)]
struct Surface {
    command_mode: bool,
    command_buffer: String,
    highlight: usize,
    preview: Option<f64>,
    area: Rect,
}

impl Surface {
    fn follow_cursor(&mut self, core: &PlayerCore) {
        if let Some(cursor) = core.playlist().cursor() {
            self.highlight = cursor;
        }
    }
}

pub fn run_with_startup(options: AppStartupOptions) -> Result<()> {
    let root = match options.config_dir {
        Some(dir) => dir,
        None => config::config_root()?,
    };
    if let Err(err) = config::ensure_config_dir(&root) {
        eprintln!("warning: {err:#}");
    }
    logging::init(&root);
    info!(config_dir = %root.display(), "starting playdeck");

    let config = Config::load_from(&config::config_path(&root));

    let backend = match RodioBackend::new() {
        Ok(backend) => backend,
        Err(err) => {
            let fatal = PlayerError::FatalInit {
                reason: format!("{err:#}"),
            };
            error!("{fatal}");
            if let Some(help) = fatal.remediation() {
                eprintln!("{help}");
            }
            return Err(fatal.into());
        }
    };
    info!(output = %backend.output_name(), "audio output ready");

    let engine = PlaybackEngine::new(Box::new(backend), config.default_volume());
    let mut core = PlayerCore::new(engine, &config);
    if let Some(path) = options.open.as_deref() {
        open_path(&mut core, path);
    }

    run_terminal(&mut core, &config)
}

fn run_terminal(core: &mut PlayerCore, config: &Config) -> Result<()> {
    let theme = config.theme();
    let shortcuts = config.shortcuts();

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen, EnableMouseCapture)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(out))?;
    terminal.clear()?;

    let result = run_session(
        core,
        &shortcuts,
        |core, view, area| {
            terminal.draw(|frame| {
                *area = frame.area();
                ui::draw(frame, core, &theme, view);
            })?;
            Ok(())
        },
        |timeout| {
            if event::poll(timeout)? {
                Ok(Some(event::read()?))
            } else {
                Ok(None)
            }
        },
    );

    // Restore the terminal even when the loop failed; the loop error wins.
    let restored = disable_raw_mode()
        .and_then(|()| {
            execute!(
                terminal.backend_mut(),
                LeaveAlternateScreen,
                DisableMouseCapture
            )
        })
        .and_then(|()| terminal.show_cursor());
    result.and(restored.map_err(Into::into))
}

/// Runs the event loop and always shuts playback down afterwards, whether
/// the loop ended by quitting or by a draw/input error.
fn run_session<R, E>(
    core: &mut PlayerCore,
    shortcuts: &Shortcuts,
    render: R,
    next_event: E,
) -> Result<()>
where
    R: FnMut(&PlayerCore, &ui::View, &mut Rect) -> Result<()>,
    E: FnMut(Duration) -> Result<Option<Event>>,
{
    let result = event_loop(core, shortcuts, render, next_event);
    if let Err(err) = &result {
        error!("event loop stopped: {err:#}");
    }
    core.shutdown();
    result
}

fn event_loop<R, E>(
    core: &mut PlayerCore,
    shortcuts: &Shortcuts,
    mut render: R,
    mut next_event: E,
) -> Result<()>
where
    R: FnMut(&PlayerCore, &ui::View, &mut Rect) -> Result<()>,
    E: FnMut(Duration) -> Result<Option<Event>>,
{
    let mut surface = Surface::default();
    surface.follow_cursor(core);
    let mut sync = SyncLoop::new(SYNC_INTERVAL);

    loop {
        core.handle_track_end();
        if sync.tick(Instant::now(), core.engine(), core.dragging()) {
            core.dirty = true;
        }

        if core.dirty {
            let readout = sync.readout();
            let view = ui::View {
                readout,
                progress: surface.preview.unwrap_or(readout.progress),
                highlight: surface.highlight,
                command: surface
                    .command_mode
                    .then_some(surface.command_buffer.as_str()),
            };
            render(core, &view, &mut surface.area)?;
            core.dirty = false;
        }

        let Some(event) = next_event(sync.until_next_tick(Instant::now()))? else {
            continue;
        };
        if !handle_event(core, &mut surface, shortcuts, event) {
            return Ok(());
        }
    }
}

/// Returns `false` once the user asked to quit.
fn handle_event(
    core: &mut PlayerCore,
    surface: &mut Surface,
    shortcuts: &Shortcuts,
    event: Event,
) -> bool {
    match event {
        Event::Mouse(mouse) => handle_mouse(core, surface, mouse),
        Event::Resize(..) => core.dirty = true,
        Event::Key(key) if key.kind == KeyEventKind::Press => {
            if surface.command_mode {
                return handle_command_key(core, surface, key);
            }
            if let Some(action) = action_for(&key, shortcuts) {
                return apply(core, surface, action);
            }
        }
        _ => {}
    }
    true
}

fn open_path(core: &mut PlayerCore, path: &Path) {
    let path = config::normalize_path(path);
    if path.is_dir() {
        core.open_folder(&path);
    } else {
        core.open_file(&path);
    }
}

/// Name of a key in the vocabulary used by the `shortcuts` settings.
fn key_name(key: &KeyEvent) -> Option<String> {
    let name = match key.code {
        KeyCode::Char(' ') => String::from("space"),
        KeyCode::Char(ch) => ch.to_lowercase().to_string(),
        KeyCode::Left => String::from("left"),
        KeyCode::Right => String::from("right"),
        KeyCode::Up => String::from("up"),
        KeyCode::Down => String::from("down"),
        KeyCode::Home => String::from("home"),
        KeyCode::End => String::from("end"),
        KeyCode::PageUp => String::from("prior"),
        KeyCode::PageDown => String::from("next"),
        KeyCode::Tab => String::from("tab"),
        KeyCode::Delete => String::from("delete"),
        KeyCode::F(number) => format!("f{number}"),
        _ => return None,
    };
    Some(name)
}

pub fn action_for(key: &KeyEvent, shortcuts: &Shortcuts) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Action::Quit);
    }
    if key.modifiers.contains(KeyModifiers::SHIFT) {
        match key.code {
            KeyCode::Right => return Some(Action::SeekForward),
            KeyCode::Left => return Some(Action::SeekBackward),
            _ => {}
        }
    }

    if let Some(name) = key_name(key) {
        let bindings = [
            (&shortcuts.play_pause, Action::PlayPause),
            (&shortcuts.stop, Action::Stop),
            (&shortcuts.next, Action::Next),
            (&shortcuts.previous, Action::Previous),
            (&shortcuts.volume_up, Action::VolumeUp),
            (&shortcuts.volume_down, Action::VolumeDown),
            (&shortcuts.fullscreen, Action::ToggleFullscreen),
        ];
        if let Some((_, action)) = bindings
            .iter()
            .find(|(binding, _)| binding.trim().eq_ignore_ascii_case(&name))
        {
            return Some(*action);
        }
    }

    match key.code {
        KeyCode::Esc => Some(Action::ExitFullscreen),
        KeyCode::Enter => Some(Action::PlayHighlighted),
        KeyCode::Char('j') => Some(Action::HighlightDown),
        KeyCode::Char('k') => Some(Action::HighlightUp),
        KeyCode::Char(':') => Some(Action::CommandMode),
        KeyCode::Char('q') => Some(Action::Quit),
        _ => None,
    }
}

/// Returns `false` once the user asked to quit.
fn apply(core: &mut PlayerCore, surface: &mut Surface, action: Action) -> bool {
    match action {
        Action::PlayPause => core.toggle_play_pause(),
        Action::Stop => core.stop(),
        Action::Next => {
            core.next();
            surface.follow_cursor(core);
        }
        Action::Previous => {
            core.previous();
            surface.follow_cursor(core);
        }
        Action::VolumeUp => core.volume_step(VOLUME_STEP),
        Action::VolumeDown => core.volume_step(-VOLUME_STEP),
        Action::ToggleFullscreen => core.toggle_fullscreen(),
        Action::ExitFullscreen => core.exit_fullscreen(),
        Action::SeekForward => core.seek_by(SEEK_STEP_SECONDS),
        Action::SeekBackward => core.seek_by(-SEEK_STEP_SECONDS),
        Action::HighlightUp => {
            surface.highlight = surface.highlight.saturating_sub(1);
            core.dirty = true;
        }
        Action::HighlightDown => {
            if surface.highlight + 1 < core.playlist().len() {
                surface.highlight += 1;
            }
            core.dirty = true;
        }
        Action::PlayHighlighted => {
            core.select(surface.highlight);
            surface.follow_cursor(core);
        }
        Action::CommandMode => {
            surface.command_mode = true;
            core.dirty = true;
        }
        Action::Quit => return false,
    }
    true
}

/// Returns `false` when Ctrl+C asks to quit from the command line.
fn handle_command_key(core: &mut PlayerCore, surface: &mut Surface, key: KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return key.code != KeyCode::Char('c');
    }
    match key.code {
        KeyCode::Esc => {
            surface.command_mode = false;
            surface.command_buffer.clear();
        }
        KeyCode::Enter => {
            let input = std::mem::take(&mut surface.command_buffer);
            surface.command_mode = false;
            run_command(core, &input);
            surface.follow_cursor(core);
        }
        KeyCode::Backspace => {
            surface.command_buffer.pop();
        }
        KeyCode::Char(ch) => surface.command_buffer.push(ch),
        _ => return true,
    }
    core.dirty = true;
    true
}

fn handle_mouse(core: &mut PlayerCore, surface: &mut Surface, mouse: MouseEvent) {
    let bar = ui::progress_rect(surface.area, core.fullscreen);
    let on_playlist = ui::playlist_rect(surface.area, core.fullscreen)
        .is_some_and(|rect| point_in_rect(mouse.column, mouse.row, rect));

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left)
            if point_in_rect(mouse.column, mouse.row, bar)
                && core.state() != SessionState::Empty =>
        {
            core.begin_drag();
            surface.preview = Some(ui::percent_at(mouse.column, bar));
            core.dirty = true;
        }
        MouseEventKind::Drag(MouseButton::Left) if core.dragging() => {
            surface.preview = Some(ui::percent_at(mouse.column, bar));
            core.dirty = true;
        }
        MouseEventKind::Up(MouseButton::Left) if core.dragging() => {
            surface.preview = None;
            core.finish_drag(ui::percent_at(mouse.column, bar));
        }
        MouseEventKind::ScrollDown if on_playlist => {
            apply(core, surface, Action::HighlightDown);
        }
        MouseEventKind::ScrollUp if on_playlist => {
            apply(core, surface, Action::HighlightUp);
        }
        _ => {}
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    if rect.width == 0 || rect.height == 0 {
        return false;
    }
    x >= rect.x
        && x < rect.x.saturating_add(rect.width)
        && y >= rect.y
        && y < rect.y.saturating_add(rect.height)
}

fn run_command(core: &mut PlayerCore, raw: &str) {
    let input = raw.trim();
    if input.is_empty() {
        core.set_status("No command");
        return;
    }

    let mut command_split = input.splitn(2, char::is_whitespace);
    let command = command_split.next().unwrap_or_default();
    let rest = command_split.next().unwrap_or("").trim().trim_matches('"');

    match command {
        "help" => core.set_status(
            "Commands: open <file|folder> | folder <dir> | volume <0-100> | seek <seconds> | fullscreen",
        ),
        "open" | "folder" if rest.is_empty() => {
            core.set_status(&format!("Usage: {command} <path>"));
        }
        "open" => open_path(core, Path::new(rest)),
        "folder" => {
            core.open_folder(&config::normalize_path(Path::new(rest)));
        }
        "volume" => match rest.parse::<f32>() {
            Ok(percent) if percent.is_finite() => core.set_volume(percent / 100.0),
            _ => core.set_status("Usage: volume <0-100>"),
        },
        "seek" => match rest.parse::<f64>() {
            Ok(seconds) if core.state() != SessionState::Empty => core.seek(seconds),
            Ok(_) => core.set_status("Nothing to seek"),
            Err(_) => core.set_status("Usage: seek <seconds>"),
        },
        "fullscreen" => core.toggle_fullscreen(),
        _ => core.set_status("Unknown command. Use :help"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullBackend;
    use std::collections::VecDeque;
    use std::fs;
    use tempfile::tempdir;

    fn null_core(duration_secs: u64) -> PlayerCore {
        let backend = NullBackend::new().with_duration(Duration::from_secs(duration_secs));
        let engine = PlaybackEngine::new(Box::new(backend), 0.7);
        PlayerCore::new(engine, &Config::in_memory())
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn unknown_command_is_reported() {
        let mut core = null_core(60);
        run_command(&mut core, "wat");
        assert!(core.status.contains("Unknown command"));
    }

    #[test]
    fn open_command_accepts_paths_with_spaces() {
        let dir = tempdir().expect("tempdir");
        let folder = dir.path().join("My Music");
        fs::create_dir(&folder).expect("mkdir");
        fs::write(folder.join("a song.mp3"), b"x").expect("write");

        let mut core = null_core(60);
        run_command(&mut core, &format!("open {}", folder.join("a song.mp3").display()));

        assert_eq!(core.current_name().as_deref(), Some("a song.mp3"));
        assert_eq!(core.state(), SessionState::Playing);
    }

    #[test]
    fn typed_folder_command_builds_playlist_and_moves_highlight() {
        let dir = tempdir().expect("tempdir");
        for name in ["b.mp3", "a.mp3", "notes.txt"] {
            fs::write(dir.path().join(name), b"x").expect("write");
        }
        let mut core = null_core(60);
        let mut surface = Surface {
            highlight: 4,
            ..Surface::default()
        };

        apply(&mut core, &mut surface, Action::CommandMode);
        for ch in format!("folder {}", dir.path().display()).chars() {
            handle_command_key(&mut core, &mut surface, press(KeyCode::Char(ch)));
        }
        handle_command_key(&mut core, &mut surface, press(KeyCode::Enter));

        assert!(!surface.command_mode);
        assert!(surface.command_buffer.is_empty());
        assert_eq!(core.playlist().len(), 2);
        assert_eq!(surface.highlight, 0);
        assert_eq!(core.current_name().as_deref(), Some("a.mp3"));
    }

    #[test]
    fn volume_command_takes_percent() {
        let mut core = null_core(60);
        run_command(&mut core, "volume 35");
        assert!((core.engine().get_volume() - 0.35).abs() < 1e-6);

        run_command(&mut core, "volume loud");
        assert_eq!(core.status, "Usage: volume <0-100>");
    }

    #[test]
    fn default_shortcuts_map_to_actions() {
        let shortcuts = Shortcuts::default();
        assert_eq!(action_for(&press(KeyCode::Char(' ')), &shortcuts), Some(Action::PlayPause));
        assert_eq!(action_for(&press(KeyCode::Char('s')), &shortcuts), Some(Action::Stop));
        assert_eq!(action_for(&press(KeyCode::Right), &shortcuts), Some(Action::Next));
        assert_eq!(action_for(&press(KeyCode::Left), &shortcuts), Some(Action::Previous));
        assert_eq!(action_for(&press(KeyCode::Up), &shortcuts), Some(Action::VolumeUp));
        assert_eq!(action_for(&press(KeyCode::Down), &shortcuts), Some(Action::VolumeDown));
        assert_eq!(
            action_for(&press(KeyCode::F(11)), &shortcuts),
            Some(Action::ToggleFullscreen)
        );
        assert_eq!(action_for(&press(KeyCode::Esc), &shortcuts), Some(Action::ExitFullscreen));
        assert_eq!(
            action_for(&KeyEvent::new(KeyCode::Right, KeyModifiers::SHIFT), &shortcuts),
            Some(Action::SeekForward)
        );
        assert_eq!(
            action_for(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), &shortcuts),
            Some(Action::Quit)
        );
        assert_eq!(action_for(&press(KeyCode::Char('x')), &shortcuts), None);
    }

    #[test]
    fn custom_shortcuts_are_case_insensitive() {
        let shortcuts = Shortcuts {
            stop: String::from("F5"),
            play_pause: String::from("P"),
            ..Shortcuts::default()
        };
        assert_eq!(action_for(&press(KeyCode::F(5)), &shortcuts), Some(Action::Stop));
        assert_eq!(action_for(&press(KeyCode::Char('p')), &shortcuts), Some(Action::PlayPause));
        assert_eq!(action_for(&press(KeyCode::Char(' ')), &shortcuts), None);
    }

    #[test]
    fn dragging_progress_bar_seeks_on_release() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("long.mp3");
        fs::write(&track, b"x").expect("write");
        let mut core = null_core(200);
        assert!(core.open_file(&track));

        let mut surface = Surface {
            area: Rect::new(0, 0, 100, 30),
            ..Surface::default()
        };
        let bar = ui::progress_rect(surface.area, false);

        handle_mouse(
            &mut core,
            &mut surface,
            mouse(MouseEventKind::Down(MouseButton::Left), bar.x + 1, bar.y),
        );
        assert!(core.dragging());
        assert_eq!(surface.preview, Some(0.0));

        handle_mouse(
            &mut core,
            &mut surface,
            mouse(MouseEventKind::Drag(MouseButton::Left), bar.x + bar.width, bar.y),
        );
        assert_eq!(surface.preview, Some(100.0));

        handle_mouse(
            &mut core,
            &mut surface,
            mouse(MouseEventKind::Up(MouseButton::Left), bar.x + bar.width, bar.y),
        );
        assert!(!core.dragging());
        assert_eq!(surface.preview, None);
        assert_eq!(core.engine().session().position, 200.0);
    }

    #[test]
    fn click_outside_progress_bar_does_not_drag() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("song.mp3");
        fs::write(&track, b"x").expect("write");
        let mut core = null_core(200);
        assert!(core.open_file(&track));
        let mut surface = Surface {
            area: Rect::new(0, 0, 100, 30),
            ..Surface::default()
        };

        handle_mouse(
            &mut core,
            &mut surface,
            mouse(MouseEventKind::Down(MouseButton::Left), 1, 1),
        );
        assert!(!core.dragging());
    }

    #[test]
    fn highlight_stays_inside_playlist() {
        let dir = tempdir().expect("tempdir");
        for name in ["a.mp3", "b.mp3"] {
            fs::write(dir.path().join(name), b"x").expect("write");
        }
        let mut core = null_core(60);
        assert!(core.open_folder(dir.path()));
        let mut surface = Surface::default();

        for _ in 0..5 {
            apply(&mut core, &mut surface, Action::HighlightDown);
        }
        assert_eq!(surface.highlight, 1);

        apply(&mut core, &mut surface, Action::PlayHighlighted);
        assert_eq!(core.current_name().as_deref(), Some("b.mp3"));

        apply(&mut core, &mut surface, Action::Previous);
        assert_eq!(surface.highlight, 0);
        assert!(!apply(&mut core, &mut surface, Action::Quit));
    }

    #[test]
    fn ctrl_c_quits_from_command_line() {
        let mut core = null_core(60);
        let mut surface = Surface::default();
        apply(&mut core, &mut surface, Action::CommandMode);
        handle_command_key(&mut core, &mut surface, press(KeyCode::Char('v')));

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(!handle_command_key(&mut core, &mut surface, ctrl_c));
        assert_eq!(surface.command_buffer, "v");
        assert!(!handle_event(
            &mut core,
            &mut surface,
            &Shortcuts::default(),
            Event::Key(ctrl_c)
        ));
    }

    #[test]
    fn input_error_still_shuts_playback_down() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("song.mp3");
        fs::write(&track, b"x").expect("write");
        let mut core = null_core(60);
        assert!(core.open_file(&track));
        assert_eq!(core.state(), SessionState::Playing);

        let mut frames = 0;
        let result = run_session(
            &mut core,
            &Shortcuts::default(),
            |_, _, area| {
                *area = Rect::new(0, 0, 80, 24);
                frames += 1;
                Ok(())
            },
            |_| Err(anyhow::anyhow!("terminal went away")),
        );

        assert!(result.is_err());
        assert_eq!(frames, 1);
        assert_eq!(core.state(), SessionState::Loaded);
        assert_eq!(core.engine().session().position, 0.0);
    }

    #[test]
    fn quit_key_ends_session_and_stops_playback() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("song.mp3");
        fs::write(&track, b"x").expect("write");
        let mut core = null_core(60);
        assert!(core.open_file(&track));

        let mut events: VecDeque<Option<Event>> = VecDeque::from([
            None,
            Some(Event::Key(press(KeyCode::Char(':')))),
            Some(Event::Key(press(KeyCode::Char('q')))),
            Some(Event::Key(press(KeyCode::Esc))),
            Some(Event::Key(press(KeyCode::Char('q')))),
        ]);
        let result = run_session(
            &mut core,
            &Shortcuts::default(),
            |_, _, _| Ok(()),
            |_| Ok(events.pop_front().expect("quit before events ran out")),
        );

        assert!(result.is_ok());
        assert!(events.is_empty());
        assert_eq!(core.state(), SessionState::Loaded);
    }
}
