use crate::audio::Player;
use crate::config::{self, ConfigStore};
use crate::library::{self, MetadataStore, TrackCatalog};
use crate::model::{Config, LoopMode, NowPlaying, Track, TrackTags};
use anyhow::{Context, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How often the front end should call [`PlaybackController::poll_progress`] while playing.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// State changes the presentation layer reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    FoldersChanged,
    FolderSelected(PathBuf),
    TrackSelected(PathBuf),
    PlaybackStarted,
    PlaybackPaused,
    PositionChanged(u32),
    PlaybackEnded,
    ModesChanged,
    MetadataChanged,
}

/// Folder/track selection and the play, loop and shuffle state machine.
///
/// All transitions run on the caller's thread. The caller drives time by
/// calling [`poll_progress`](Self::poll_progress) every [`POLL_INTERVAL`]
/// while [`is_polling`](Self::is_polling) is true.
pub struct PlaybackController {
    config: Config,
    store: Box<dyn ConfigStore>,
    catalog: Box<dyn TrackCatalog>,
    tags: Box<dyn MetadataStore>,
    player: Box<dyn Player>,
    rng: SmallRng,
    current_folder: Option<PathBuf>,
    tracks: Vec<Track>,
    current_track: Option<PathBuf>,
    now_playing: Option<NowPlaying>,
    playing: bool,
    polling: bool,
    already_played: HashSet<PathBuf>,
    durations: HashMap<PathBuf, u32>,
    position_seconds: u32,
    duration_seconds: u32,
    events: Vec<ControllerEvent>,
    pub status: String,
    pub dirty: bool,
}

impl PlaybackController {
    pub fn new(
        config: Config,
        store: Box<dyn ConfigStore>,
        catalog: Box<dyn TrackCatalog>,
        tags: Box<dyn MetadataStore>,
        player: Box<dyn Player>,
    ) -> Self {
        Self {
            config,
            store,
            catalog,
            tags,
            player,
            rng: SmallRng::from_os_rng(),
            current_folder: None,
            tracks: Vec::new(),
            current_track: None,
            now_playing: None,
            playing: false,
            polling: false,
            already_played: HashSet::new(),
            durations: HashMap::new(),
            position_seconds: 0,
            duration_seconds: 0,
            events: Vec::new(),
            status: String::from("Ready"),
            dirty: true,
        }
    }

    pub fn with_rng(mut self, rng: SmallRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn folders(&self) -> &[PathBuf] {
        &self.config.folders
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.config.loop_mode
    }

    pub fn shuffle(&self) -> bool {
        self.config.shuffle
    }

    pub fn current_folder(&self) -> Option<&Path> {
        self.current_folder.as_deref()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn current_track(&self) -> Option<&Path> {
        self.current_track.as_deref()
    }

    pub fn now_playing(&self) -> Option<&NowPlaying> {
        self.now_playing.as_ref()
    }

    /// The player panel is shown exactly when a track is selected.
    pub fn player_visible(&self) -> bool {
        self.current_track.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_polling(&self) -> bool {
        self.polling
    }

    pub fn already_played(&self) -> &HashSet<PathBuf> {
        &self.already_played
    }

    pub fn position_seconds(&self) -> u32 {
        self.position_seconds
    }

    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    pub fn drain_events(&mut self) -> Vec<ControllerEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn save(&mut self) -> Result<()> {
        self.store.save(&self.config)?;
        self.set_status("Config saved");
        Ok(())
    }

    pub fn add_folder(&mut self, input: &Path) {
        let normalized = config::normalize_path(input);
        if !normalized.is_dir() {
            self.set_status(&format!("Not a folder: {}", normalized.display()));
            return;
        }
        if self.config.folders.iter().any(|folder| folder == &normalized) {
            self.set_status("Folder already added");
            return;
        }

        log::info!("added the folder {}", normalized.display());
        self.config.folders.push(normalized);
        self.persist();
        self.emit(ControllerEvent::FoldersChanged);
        self.set_status("Folder added");
    }

    /// Forgets `folder`; the directory itself is left alone.
    pub fn remove_folder(&mut self, folder: &Path) {
        let before = self.config.folders.len();
        self.config.folders.retain(|registered| registered != folder);
        if self.config.folders.len() == before {
            self.set_status("Folder is not registered");
            return;
        }
        self.persist();

        if self.current_folder.as_deref() == Some(folder) {
            self.unload_track();
            self.clear_track_selection();
            self.current_folder = None;
            self.tracks.clear();
        }

        log::info!("removed the folder {}", folder.display());
        self.emit(ControllerEvent::FoldersChanged);
        self.set_status("Folder removed");
    }

    pub fn select_folder(&mut self, folder: &Path) {
        if self.current_folder.as_deref() == Some(folder) {
            return;
        }

        self.unload_track();
        self.clear_track_selection();
        self.durations.clear();
        self.current_folder = Some(folder.to_path_buf());
        self.relist();
        self.emit(ControllerEvent::FolderSelected(folder.to_path_buf()));
        self.set_status(&format!(
            "{}: {} tracks",
            folder_display_name(folder),
            self.tracks.len()
        ));
    }

    /// Loads `track` paused at zero. Tracks outside the current listing are refused.
    pub fn select_track(&mut self, track: &Path) {
        if self.current_track.as_deref() == Some(track) {
            return;
        }
        if !self.tracks.iter().any(|entry| entry.path == track) {
            self.set_status("Track is not in the selected folder");
            return;
        }

        self.unload_track();
        self.current_track = Some(track.to_path_buf());
        self.load_current(track);
        self.emit(ControllerEvent::TrackSelected(track.to_path_buf()));
    }

    pub fn toggle_play_pause(&mut self) {
        if self.current_track.is_none() || !self.player.is_loaded() {
            self.set_status("No track loaded");
            return;
        }

        if self.playing {
            self.pause_playback();
        } else {
            self.start_playback();
        }
    }

    /// Play/pause when a track is selected, otherwise start the folder.
    pub fn global_play(&mut self) {
        if self.current_track.is_some() {
            self.toggle_play_pause();
            return;
        }

        if self.current_folder.is_none() {
            let Some(first) = self.config.folders.first().cloned() else {
                self.set_status("No folder registered");
                return;
            };
            self.select_folder(&first);
        }

        let Some(track) = self.initial_track() else {
            self.set_status("No tracks in this folder");
            return;
        };
        self.select_track(&track);
        self.start_playback();
    }

    pub fn on_track_ended(&mut self) {
        let Some(current) = self.current_track.clone() else {
            return;
        };

        if self.playing {
            self.pause_playback();
        }
        self.emit(ControllerEvent::PlaybackEnded);

        match self.config.loop_mode {
            LoopMode::Off => self.rewind(&current),
            LoopMode::One => {
                self.rewind(&current);
                self.start_playback();
            }
            LoopMode::Down | LoopMode::All => match self.next_after_end(&current) {
                Some(next) if next == current => {
                    self.rewind(&current);
                    self.start_playback();
                }
                Some(next) => {
                    self.select_track(&next);
                    self.start_playback();
                }
                None => {
                    self.rewind(&current);
                    self.set_status("Reached the end of the folder");
                }
            },
        }
    }

    /// Moves to `seconds`, clamped to the track length when it is known.
    pub fn seek(&mut self, seconds: u32) {
        if self.current_track.is_none() {
            return;
        }

        let target = if self.duration_seconds > 0 {
            seconds.min(self.duration_seconds)
        } else {
            seconds
        };
        self.position_seconds = target;
        self.emit(ControllerEvent::PositionChanged(target));

        if let Err(err) = self.player.set_time(Duration::from_secs(u64::from(target))) {
            log::warn!("seek to {target}s failed: {err:#}");
        }
        log::info!("changed the time to {}", format_clock(target));
    }

    pub fn seek_by(&mut self, delta_seconds: i64) {
        let target = (i64::from(self.position_seconds) + delta_seconds).max(0);
        self.seek(u32::try_from(target).unwrap_or(u32::MAX));
    }

    /// One timer tick: refresh the position and handle end of stream.
    pub fn poll_progress(&mut self) {
        if !self.polling {
            return;
        }

        if let Some(position) = self.player.time() {
            let seconds = u32::try_from(position.as_secs()).unwrap_or(u32::MAX);
            if seconds != self.position_seconds {
                self.position_seconds = seconds;
                self.emit(ControllerEvent::PositionChanged(seconds));
            }
        }

        if self.player.is_ended() {
            self.on_track_ended();
        }
    }

    pub fn cycle_loop_mode(&mut self) {
        let previous = self.config.loop_mode;
        self.config.loop_mode = previous.next();
        if previous == LoopMode::Down {
            self.already_played.clear();
        }
        self.persist();
        self.emit(ControllerEvent::ModesChanged);
        self.set_status(&format!("Loop: {}", self.config.loop_mode.label()));
    }

    pub fn toggle_shuffle(&mut self) {
        self.config.shuffle = !self.config.shuffle;
        self.persist();
        self.emit(ControllerEvent::ModesChanged);
        let state = if self.config.shuffle { "on" } else { "off" };
        self.set_status(&format!("Shuffle: {state}"));
    }

    pub fn set_title(&mut self, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(());
        }
        let track = self.require_track()?;

        self.tags.write_title(&track, title)?;
        self.after_tag_edit(&track);
        log::info!("changed the title of {} to {title}", track.display());
        Ok(())
    }

    pub fn set_artist(&mut self, artist: &str) -> Result<()> {
        let artist = artist.trim();
        if artist.is_empty() {
            return Ok(());
        }
        library::validate_artist(artist)?;
        let track = self.require_track()?;

        self.tags.write_artist(&track, artist)?;
        self.after_tag_edit(&track);
        log::info!("changed the author of {} to {artist}", track.display());
        Ok(())
    }

    pub fn set_cover(&mut self, image: &Path) -> Result<()> {
        if image.as_os_str().is_empty() {
            return Ok(());
        }
        if !image.exists() {
            anyhow::bail!("The selected file doesn't exist")
        }
        let track = self.require_track()?;

        let bytes =
            fs::read(image).with_context(|| format!("failed to read {}", image.display()))?;
        let mime = library::cover_mime_for_path(image);
        self.tags.write_cover(&track, &bytes, &mime)?;
        self.after_tag_edit(&track);
        log::info!("changed the cover of {}", track.display());
        Ok(())
    }

    fn require_track(&self) -> Result<PathBuf> {
        self.current_track.clone().context("no track selected")
    }

    fn after_tag_edit(&mut self, track: &Path) {
        self.relist();
        if self.current_track.as_deref() == Some(track) {
            self.now_playing = Some(self.describe_now_playing(track));
        }
        self.emit(ControllerEvent::MetadataChanged);
        self.set_status("Tags updated");
    }

    fn initial_track(&mut self) -> Option<PathBuf> {
        if self.tracks.is_empty() {
            return None;
        }
        let index = if self.config.shuffle {
            self.rng.random_range(0..self.tracks.len())
        } else {
            0
        };
        Some(self.tracks[index].path.clone())
    }

    fn next_after_end(&mut self, current: &Path) -> Option<PathBuf> {
        let repeat = self.config.loop_mode == LoopMode::All;

        if self.config.shuffle {
            if !repeat {
                self.already_played.insert(current.to_path_buf());
            }
            let candidates: Vec<&Track> = self
                .tracks
                .iter()
                .filter(|track| track.path != current)
                .filter(|track| repeat || !self.already_played.contains(&track.path))
                .collect();

            if candidates.is_empty() {
                self.already_played.clear();
                return repeat.then(|| current.to_path_buf());
            }
            let pick = self.rng.random_range(0..candidates.len());
            return Some(candidates[pick].path.clone());
        }

        let index = self.tracks.iter().position(|track| track.path == current)?;
        match self.tracks.get(index + 1) {
            Some(next) => Some(next.path.clone()),
            None if repeat => self.tracks.first().map(|track| track.path.clone()),
            None => None,
        }
    }

    fn relist(&mut self) {
        let Some(folder) = self.current_folder.clone() else {
            self.tracks.clear();
            return;
        };

        let paths = self.catalog.list_tracks(&folder);
        let mut tracks = Vec::with_capacity(paths.len());
        for path in paths {
            tracks.push(self.describe_track(path));
        }
        self.tracks = tracks;
        log::debug!("listed the tracks for {}", folder.display());

        let still_listed = self
            .current_track
            .as_ref()
            .is_none_or(|current| self.tracks.iter().any(|track| &track.path == current));
        if !still_listed {
            self.unload_track();
            self.clear_track_selection();
        }
    }

    fn describe_track(&mut self, path: PathBuf) -> Track {
        let tags = self.read_tags_or_default(&path);
        let duration_seconds = self.duration_of(&path);
        Track {
            title: tags
                .title
                .unwrap_or_else(|| library::fallback_title(&path)),
            artist: tags.artist,
            duration_seconds,
            path,
        }
    }

    /// Probed once per folder visit; 0 when unknown.
    fn duration_of(&mut self, track: &Path) -> u32 {
        if let Some(seconds) = self.durations.get(track) {
            return *seconds;
        }
        let seconds = self.player.probe_duration(track).unwrap_or(0);
        self.durations.insert(track.to_path_buf(), seconds);
        seconds
    }

    fn describe_now_playing(&self, track: &Path) -> NowPlaying {
        let tags = self.read_tags_or_default(track);
        NowPlaying {
            title: tags
                .title
                .unwrap_or_else(|| library::fallback_title(track)),
            artist: tags.artist,
            cover: tags.cover,
        }
    }

    fn read_tags_or_default(&self, track: &Path) -> TrackTags {
        match self.tags.read_tags(track) {
            Ok(tags) => tags,
            Err(err) => {
                log::error!("failed to fetch metadata for {}: {err:#}", track.display());
                TrackTags::default()
            }
        }
    }

    fn load_current(&mut self, track: &Path) {
        self.now_playing = Some(self.describe_now_playing(track));
        self.duration_seconds = self.duration_of(track);
        self.open_at_start(track);
        log::debug!("loaded {}", track.display());
    }

    fn open_at_start(&mut self, track: &Path) {
        self.position_seconds = 0;
        if let Err(err) = self.player.open(track) {
            log::warn!("failed to open {}: {err:#}", track.display());
            self.set_status(&format!("playback error: {err:#}"));
        }
        self.emit(ControllerEvent::PositionChanged(0));
    }

    /// Stops and reloads the track at zero without starting it.
    fn rewind(&mut self, track: &Path) {
        self.polling = false;
        self.player.release();
        self.open_at_start(track);
    }

    fn start_playback(&mut self) {
        if !self.player.is_loaded() {
            self.set_status("No track loaded");
            return;
        }
        self.playing = true;
        self.player.play();
        self.polling = true;
        self.emit(ControllerEvent::PlaybackStarted);
        self.set_status("Playing");
        log::info!("played the track");
    }

    fn pause_playback(&mut self) {
        self.playing = false;
        self.polling = false;
        self.player.pause();
        self.emit(ControllerEvent::PlaybackPaused);
        self.set_status("Paused");
        log::info!("paused the track");
    }

    /// Polling stops before the player lets go of the track.
    fn unload_track(&mut self) {
        if self.playing {
            self.pause_playback();
        }
        self.polling = false;
        self.player.release();
    }

    fn clear_track_selection(&mut self) {
        self.current_track = None;
        self.now_playing = None;
        self.already_played.clear();
        self.position_seconds = 0;
        self.duration_seconds = 0;
    }

    fn persist(&mut self) {
        if let Err(err) = self.store.save(&self.config) {
            log::warn!("failed to save config: {err:#}");
            self.set_status(&format!("save error: {err:#}"));
        }
    }

    fn emit(&mut self, event: ControllerEvent) {
        self.events.push(event);
        self.dirty = true;
    }

    fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
        self.dirty = true;
    }
}

/// `m:ss`, the way the progress labels read.
pub fn format_clock(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

pub fn folder_display_name(folder: &Path) -> String {
    folder
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| folder.display().to_string())
}
