use crate::audio::{NullPlayer, Player, RodioPlayer};
use crate::config::{ConfigStore, JsonConfigStore};
use crate::controller::{ControllerEvent, POLL_INTERVAL, PlaybackController};
use crate::library::{FsCatalog, LoftyTagStore};
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

const SEEK_STEP_SECONDS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Folders,
    Tracks,
}

/// Terminal-side state that the controller does not own.
#[derive(Debug, Default)]
pub struct ViewState {
    pub focus: Focus,
    pub folder_cursor: usize,
    pub track_cursor: usize,
    pub command_mode: bool,
    pub command_buffer: String,
    pub confirm_remove: Option<PathBuf>,
}

pub fn run(config_dir: &Path) -> Result<()> {
    let store = JsonConfigStore::in_dir(config_dir);
    let config = store.load()?;

    let player: Box<dyn Player> = match RodioPlayer::new() {
        Ok(player) => Box::new(player),
        Err(err) => {
            log::warn!("no audio output, playing silently: {err:#}");
            Box::new(NullPlayer::new())
        }
    };
    let mut controller = PlaybackController::new(
        config,
        Box::new(store),
        Box::new(FsCatalog),
        Box::new(LoftyTagStore),
        player,
    );
    let mut view = ViewState::default();

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut last_draw = Instant::now();
    let mut progress = Rect::default();

    let result: Result<()> = loop {
        controller.poll_progress();
        let events = controller.drain_events();
        sync_view(&mut view, &controller, &events);

        if controller.dirty || last_draw.elapsed() > Duration::from_millis(250) {
            terminal.draw(|frame| {
                progress = crate::ui::progress_rect(frame.area(), controller.player_visible());
                crate::ui::draw(frame, &controller, &view)
            })?;
            controller.dirty = false;
            last_draw = Instant::now();
        }

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }

        match event::read()? {
            Event::Mouse(mouse) => handle_mouse(&mut controller, mouse, progress),
            Event::Key(key) => {
                if handle_key(&mut controller, &mut view, key) {
                    break Ok(());
                }
            }
            Event::Resize(_, _) => controller.dirty = true,
            _ => {}
        }
    };

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    let save_result = controller.save();
    log::info!("banger shutting down");
    result?;
    save_result?;
    Ok(())
}

/// Returns `true` when the user asked to quit.
pub fn handle_key(controller: &mut PlaybackController, view: &mut ViewState, key: KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }

    if let Some(folder) = view.confirm_remove.take() {
        if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
            controller.remove_folder(&folder);
        } else {
            controller.status = String::from("Removal cancelled");
        }
        controller.dirty = true;
        return false;
    }

    if view.command_mode {
        match key.code {
            KeyCode::Esc => {
                view.command_mode = false;
                view.command_buffer.clear();
            }
            KeyCode::Enter => {
                let input = std::mem::take(&mut view.command_buffer);
                view.command_mode = false;
                run_command(controller, &input);
            }
            KeyCode::Backspace => {
                view.command_buffer.pop();
            }
            KeyCode::Char(ch) => view.command_buffer.push(ch),
            _ => {}
        }
        controller.dirty = true;
        return false;
    }

    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
        KeyCode::Char('q') => return true,
        KeyCode::Tab | KeyCode::BackTab => {
            view.focus = match view.focus {
                Focus::Folders => Focus::Tracks,
                Focus::Tracks => Focus::Folders,
            };
            controller.dirty = true;
        }
        KeyCode::Down => move_cursor(controller, view, 1),
        KeyCode::Up => move_cursor(controller, view, -1),
        KeyCode::Enter => match view.focus {
            Focus::Folders => {
                if let Some(folder) = controller.folders().get(view.folder_cursor).cloned() {
                    controller.select_folder(&folder);
                }
            }
            Focus::Tracks => {
                if let Some(track) = controller
                    .tracks()
                    .get(view.track_cursor)
                    .map(|track| track.path.clone())
                {
                    controller.select_track(&track);
                }
            }
        },
        KeyCode::Char(' ') if controller.player_visible() => controller.toggle_play_pause(),
        KeyCode::Char('p') => controller.global_play(),
        KeyCode::Char('l') => controller.cycle_loop_mode(),
        KeyCode::Char('s') => controller.toggle_shuffle(),
        KeyCode::Left => controller.seek_by(-SEEK_STEP_SECONDS),
        KeyCode::Right => controller.seek_by(SEEK_STEP_SECONDS),
        KeyCode::Char('d') if view.focus == Focus::Folders => {
            if let Some(folder) = controller.folders().get(view.folder_cursor).cloned() {
                view.confirm_remove = Some(folder);
                controller.dirty = true;
            }
        }
        KeyCode::Char(':') => {
            view.command_mode = true;
            controller.dirty = true;
        }
        _ => {}
    }
    false
}

fn move_cursor(controller: &mut PlaybackController, view: &mut ViewState, step: isize) {
    let (cursor, len) = match view.focus {
        Focus::Folders => (&mut view.folder_cursor, controller.folders().len()),
        Focus::Tracks => (&mut view.track_cursor, controller.tracks().len()),
    };
    if len == 0 {
        return;
    }
    *cursor = cursor.saturating_add_signed(step).min(len - 1);
    controller.dirty = true;
}

/// Keeps cursors inside their lists after the controller changed them.
pub fn sync_view(view: &mut ViewState, controller: &PlaybackController, events: &[ControllerEvent]) {
    for event in events {
        match event {
            ControllerEvent::FolderSelected(_) => view.track_cursor = 0,
            ControllerEvent::TrackSelected(track) => {
                if let Some(index) = controller
                    .tracks()
                    .iter()
                    .position(|entry| &entry.path == track)
                {
                    view.track_cursor = index;
                }
            }
            _ => {}
        }
    }
    view.folder_cursor = view
        .folder_cursor
        .min(controller.folders().len().saturating_sub(1));
    view.track_cursor = view
        .track_cursor
        .min(controller.tracks().len().saturating_sub(1));
}

fn handle_mouse(controller: &mut PlaybackController, mouse: MouseEvent, progress: Rect) {
    if !matches!(mouse.kind, MouseEventKind::Down(MouseButton::Left))
        || !point_in_rect(mouse.column, mouse.row, progress)
    {
        return;
    }

    let offset = u32::from(mouse.column - progress.x);
    let width = u32::from(progress.width.max(1));
    let target = controller.duration_seconds() * offset / width;
    controller.seek(target);
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

fn run_command(controller: &mut PlaybackController, raw: &str) {
    let input = raw.trim();
    if input.is_empty() {
        controller.status = String::from("No command");
        controller.dirty = true;
        return;
    }

    let mut command_split = input.splitn(2, char::is_whitespace);
    let command = command_split.next().unwrap_or_default();
    let rest = command_split.next().unwrap_or("").trim();

    let outcome = match command {
        "help" => {
            controller.status = String::from(
                "Commands: add <folder> | title <text> | artist <text> | cover <image>",
            );
            Ok(())
        }
        "add" if rest.is_empty() => {
            controller.status = String::from("Usage: add <folder>");
            Ok(())
        }
        "add" => {
            controller.add_folder(Path::new(rest));
            Ok(())
        }
        "title" => controller.set_title(rest),
        "artist" => controller.set_artist(rest),
        "cover" => controller.set_cover(Path::new(rest)),
        _ => {
            controller.status = String::from("Unknown command. Use :help");
            Ok(())
        }
    };

    if let Err(err) = outcome {
        controller.status = format!("Warning: {err:#}");
    }
    controller.dirty = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::probe::tests::write_test_wav;
    use crate::model::Config;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn controller_in(dir: &TempDir, folders: Vec<PathBuf>) -> PlaybackController {
        let store = JsonConfigStore::in_dir(&dir.path().join("config")).with_home(None);
        let config = Config {
            folders,
            ..Config::default()
        };
        PlaybackController::new(
            config,
            Box::new(store),
            Box::new(FsCatalog),
            Box::new(LoftyTagStore),
            Box::new(NullPlayer::new()),
        )
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn unknown_command_is_reported() {
        let dir = tempdir().expect("tempdir");
        let mut controller = controller_in(&dir, Vec::new());
        run_command(&mut controller, "wat");
        assert!(controller.status.contains("Unknown command"));
    }

    #[test]
    fn add_command_accepts_paths_with_spaces() {
        let dir = tempdir().expect("tempdir");
        let music = dir.path().join("Music Folder");
        fs::create_dir(&music).expect("music dir");
        let mut controller = controller_in(&dir, Vec::new());

        run_command(&mut controller, &format!("add {}", music.display()));

        assert!(controller.folders().iter().any(|path| {
            path.to_string_lossy()
                .to_ascii_lowercase()
                .contains("music folder")
        }));
    }

    #[test]
    fn artist_command_surfaces_validation_warning() {
        let dir = tempdir().expect("tempdir");
        let mut controller = controller_in(&dir, Vec::new());
        run_command(&mut controller, "artist AC/DC");
        assert!(controller.status.starts_with("Warning:"));
        assert!(controller.status.contains("cannot contain"));
    }

    #[test]
    fn folder_removal_waits_for_confirmation() {
        let dir = tempdir().expect("tempdir");
        let folder = dir.path().join("album");
        fs::create_dir(&folder).expect("album dir");
        let mut controller = controller_in(&dir, vec![folder.clone()]);
        let mut view = ViewState::default();

        handle_key(&mut controller, &mut view, press(KeyCode::Char('d')));
        assert_eq!(view.confirm_remove.as_deref(), Some(folder.as_path()));
        handle_key(&mut controller, &mut view, press(KeyCode::Char('n')));
        assert_eq!(controller.folders(), &[folder.clone()]);
        assert!(view.confirm_remove.is_none());

        handle_key(&mut controller, &mut view, press(KeyCode::Char('d')));
        handle_key(&mut controller, &mut view, press(KeyCode::Char('y')));
        assert!(controller.folders().is_empty());
        assert!(folder.is_dir(), "the directory itself is left alone");
    }

    #[test]
    fn enter_opens_folder_then_track_and_space_plays() {
        let dir = tempdir().expect("tempdir");
        let folder = dir.path().join("album");
        fs::create_dir(&folder).expect("album dir");
        write_test_wav(&folder.join("a.wav"), 2_000);
        let mut controller = controller_in(&dir, vec![folder.clone()]);
        let mut view = ViewState::default();

        handle_key(&mut controller, &mut view, press(KeyCode::Char(' ')));
        assert!(!controller.is_playing(), "space needs a selected track");

        handle_key(&mut controller, &mut view, press(KeyCode::Enter));
        assert_eq!(controller.current_folder(), Some(folder.as_path()));
        handle_key(&mut controller, &mut view, press(KeyCode::Tab));
        handle_key(&mut controller, &mut view, press(KeyCode::Enter));
        assert_eq!(
            controller.current_track(),
            Some(folder.join("a.wav").as_path())
        );

        handle_key(&mut controller, &mut view, press(KeyCode::Char(' ')));
        assert!(controller.is_playing());
    }

    #[test]
    fn click_on_progress_bar_seeks_proportionally() {
        let dir = tempdir().expect("tempdir");
        let folder = dir.path().join("album");
        fs::create_dir(&folder).expect("album dir");
        write_test_wav(&folder.join("a.wav"), 2_000);
        let mut controller = controller_in(&dir, vec![folder.clone()]);
        controller.select_folder(&folder);
        controller.select_track(&folder.join("a.wav"));
        assert_eq!(controller.duration_seconds(), 2);

        let bar = Rect::new(10, 20, 40, 1);
        let click = MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 30,
            row: 20,
            modifiers: KeyModifiers::NONE,
        };
        handle_mouse(&mut controller, click, bar);
        assert_eq!(controller.position_seconds(), 1);

        let outside = MouseEvent { row: 5, ..click };
        controller.seek(0);
        handle_mouse(&mut controller, outside, bar);
        assert_eq!(controller.position_seconds(), 0);
    }

    #[test]
    fn quit_keys_end_the_loop() {
        let dir = tempdir().expect("tempdir");
        let mut controller = controller_in(&dir, Vec::new());
        let mut view = ViewState::default();
        assert!(handle_key(&mut controller, &mut view, press(KeyCode::Char('q'))));
        assert!(handle_key(
            &mut controller,
            &mut view,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)
        ));
    }

    #[test]
    fn sync_view_clamps_cursors() {
        let dir = tempdir().expect("tempdir");
        let controller = controller_in(&dir, vec![PathBuf::from("/nowhere")]);
        let mut view = ViewState {
            folder_cursor: 5,
            track_cursor: 9,
            ..ViewState::default()
        };
        sync_view(&mut view, &controller, &[]);
        assert_eq!(view.folder_cursor, 0);
        assert_eq!(view.track_cursor, 0);
    }

    #[test]
    fn point_in_rect_rejects_empty_rect() {
        assert!(!point_in_rect(0, 0, Rect::default()));
        assert!(point_in_rect(3, 4, Rect::new(2, 4, 2, 1)));
    }
}
