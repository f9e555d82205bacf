pub mod probe;

use anyhow::{Context, Result};
use rodio::Source;
use rodio::cpal::traits::HostTrait;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
#[cfg(unix)]
use std::ffi::CString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub use probe::{PROBE_TIMEOUT, probe_duration};

/// Transport over a single loaded track.
///
/// `open` loads a track paused at zero; `release` drops it. Position and
/// end-of-stream queries are only meaningful while a track is loaded.
pub trait Player {
    fn probe_duration(&mut self, path: &Path) -> Option<u32>;
    fn open(&mut self, path: &Path) -> Result<()>;
    fn play(&mut self);
    fn pause(&mut self);
    fn set_time(&mut self, position: Duration) -> Result<()>;
    fn time(&self) -> Option<Duration>;
    fn is_ended(&self) -> bool;
    fn release(&mut self);
    fn is_loaded(&self) -> bool;
}

pub struct RodioPlayer {
    stream: OutputStream,
    sink: Sink,
    current: Option<PathBuf>,
    probe_timeout: Duration,
}

impl RodioPlayer {
    pub fn new() -> Result<Self> {
        let stream = open_output_stream()?;
        let sink = Sink::connect_new(stream.mixer());
        Ok(Self {
            stream,
            sink,
            current: None,
            probe_timeout: PROBE_TIMEOUT,
        })
    }
}

impl Player for RodioPlayer {
    fn probe_duration(&mut self, path: &Path) -> Option<u32> {
        probe::probe_duration(path, self.probe_timeout)
    }

    fn open(&mut self, path: &Path) -> Result<()> {
        self.release();
        self.sink = Sink::connect_new(self.stream.mixer());
        self.sink.pause();

        let file =
            File::open(path).with_context(|| format!("failed to open track {}", path.display()))?;
        let source = Decoder::try_from(file)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        self.sink.append(source);
        self.current = Some(path.to_path_buf());
        log::debug!("opened {}", path.display());
        Ok(())
    }

    fn play(&mut self) {
        self.sink.play();
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn set_time(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            return Err(anyhow::anyhow!("no track loaded"));
        }

        self.sink
            .try_seek(position)
            .map_err(|err| anyhow::anyhow!("failed to seek current track: {err:?}"))
    }

    fn time(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.sink.get_pos())
    }

    fn is_ended(&self) -> bool {
        self.current.is_some() && !self.sink.is_paused() && self.sink.empty()
    }

    fn release(&mut self) {
        self.sink.stop();
        self.current = None;
    }

    fn is_loaded(&self) -> bool {
        self.current.is_some()
    }
}

fn open_output_stream() -> Result<OutputStream> {
    let mut stream = with_silenced_stderr(|| {
        match OutputStreamBuilder::from_default_device()
            .context("failed to open default system output stream")
            .and_then(|builder| {
                builder
                    .with_error_callback(|_| {})
                    .open_stream_or_fallback()
                    .context("failed to start default output stream")
            }) {
            Ok(stream) => Ok(stream),
            Err(default_err) => {
                let host = rodio::cpal::default_host();
                let devices = host
                    .output_devices()
                    .context("failed to enumerate output devices")?;
                for device in devices {
                    let opened = OutputStreamBuilder::from_device(device)
                        .context("failed to open fallback output device")
                        .and_then(|builder| {
                            builder
                                .with_error_callback(|_| {})
                                .open_stream_or_fallback()
                                .context("failed to start fallback output stream")
                        });
                    if let Ok(stream) = opened {
                        return Ok(stream);
                    }
                }
                Err(default_err.context("no output device could be started"))
            }
        }
    })?;
    stream.log_on_drop(false);
    Ok(stream)
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

/// Silent player driven by the wall clock, used when no output device opens.
pub struct NullPlayer {
    paused: bool,
    current: Option<PathBuf>,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_duration: Option<Duration>,
}

impl NullPlayer {
    pub fn new() -> Self {
        Self {
            paused: true,
            current: None,
            started_at: None,
            position_offset: Duration::ZERO,
            track_duration: None,
        }
    }

    fn estimate_duration(path: &Path) -> Option<Duration> {
        let file = File::open(path).ok()?;
        let source = Decoder::try_from(file).ok()?;
        source
            .total_duration()
            .filter(|duration| !duration.is_zero())
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if !self.paused
            && self.current.is_some()
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        if let Some(duration) = self.track_duration {
            return position.min(duration);
        }
        position
    }
}

impl Default for NullPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Player for NullPlayer {
    fn probe_duration(&mut self, path: &Path) -> Option<u32> {
        probe::probe_duration(path, PROBE_TIMEOUT)
    }

    fn open(&mut self, path: &Path) -> Result<()> {
        self.paused = true;
        self.current = Some(path.to_path_buf());
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_duration = Self::estimate_duration(path);
        Ok(())
    }

    fn play(&mut self) {
        if self.current.is_some() {
            self.started_at = Some(Instant::now());
        }
        self.paused = false;
    }

    fn pause(&mut self) {
        self.position_offset = self.current_position();
        self.started_at = None;
        self.paused = true;
    }

    fn set_time(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            return Err(anyhow::anyhow!("no track loaded"));
        }

        self.position_offset = self
            .track_duration
            .map_or(position, |duration| position.min(duration));
        self.started_at = if self.paused {
            None
        } else {
            Some(Instant::now())
        };
        Ok(())
    }

    fn time(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.current_position())
    }

    fn is_ended(&self) -> bool {
        let Some(duration) = self.track_duration else {
            return false;
        };
        self.current.is_some() && !self.paused && self.current_position() >= duration
    }

    fn release(&mut self) {
        self.current = None;
        self.paused = true;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_duration = None;
    }

    fn is_loaded(&self) -> bool {
        self.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::probe::tests::write_test_wav;
    use super::{NullPlayer, Player};
    use std::path::Path;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn null_player_opens_paused_at_zero() {
        let mut player = NullPlayer::new();
        player
            .open(Path::new("nonexistent-track.flac"))
            .expect("open should still work in null mode");
        thread::sleep(Duration::from_millis(20));
        assert_eq!(player.time(), Some(Duration::ZERO));
        assert!(player.is_loaded());
    }

    #[test]
    fn null_player_pause_and_play_control_position_progression() {
        let mut player = NullPlayer::new();
        player
            .open(Path::new("nonexistent-track.flac"))
            .expect("open should still work in null mode");
        player.play();
        thread::sleep(Duration::from_millis(20));

        player.pause();
        let paused = player.time().expect("position should be present");
        assert!(paused > Duration::ZERO);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(player.time(), Some(paused), "position should freeze while paused");

        player.play();
        thread::sleep(Duration::from_millis(20));
        let resumed = player.time().expect("position should be present");
        assert!(resumed > paused, "position should continue after play");
    }

    #[test]
    fn null_player_set_time_moves_position() {
        let mut player = NullPlayer::new();
        player
            .open(Path::new("nonexistent-track.flac"))
            .expect("open should still work in null mode");

        let target = Duration::from_secs(12);
        player.set_time(target).expect("seek should succeed");
        assert_eq!(player.time(), Some(target));
    }

    #[test]
    fn null_player_set_time_without_track_fails() {
        let mut player = NullPlayer::new();
        assert!(player.set_time(Duration::from_secs(1)).is_err());
    }

    #[test]
    fn null_player_ends_when_known_duration_elapses() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("fixture.wav");
        write_test_wav(&track, 80);

        let mut player = NullPlayer::new();
        player.open(&track).expect("open should succeed for wav fixture");
        player.play();
        thread::sleep(Duration::from_millis(120));
        assert!(player.is_ended(), "known-duration playback should end");

        player.release();
        assert!(!player.is_ended());
        assert!(!player.is_loaded());
        assert_eq!(player.time(), None);
    }

    #[test]
    fn null_player_unknown_duration_never_ends() {
        let mut player = NullPlayer::new();
        player
            .open(Path::new("nonexistent-track.flac"))
            .expect("open should still work in null mode");
        player.play();
        thread::sleep(Duration::from_millis(40));
        assert!(!player.is_ended());
    }
}
