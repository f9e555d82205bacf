#![no_main]

use anyhow::Result;
use banger::audio::Player;
use banger::config::ConfigStore;
use banger::controller::PlaybackController;
use banger::library::{MetadataStore, TrackCatalog};
use banger::model::{Config, TrackTags};
use libfuzzer_sys::fuzz_target;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::path::{Path, PathBuf};
use std::time::Duration;

struct Catalog(usize);

impl TrackCatalog for Catalog {
    fn list_tracks(&self, folder: &Path) -> Vec<PathBuf> {
        if folder.ends_with("empty") {
            return Vec::new();
        }
        (0..self.0)
            .map(|idx| folder.join(format!("track_{idx}.mp3")))
            .collect()
    }
}

struct Tags;

impl MetadataStore for Tags {
    fn read_tags(&self, _track: &Path) -> Result<TrackTags> {
        Ok(TrackTags::default())
    }

    fn write_title(&mut self, _track: &Path, _title: &str) -> Result<()> {
        Ok(())
    }

    fn write_artist(&mut self, _track: &Path, _artist: &str) -> Result<()> {
        Ok(())
    }

    fn write_cover(&mut self, _track: &Path, _image: &[u8], _mime: &str) -> Result<()> {
        Ok(())
    }
}

struct Store;

impl ConfigStore for Store {
    fn load(&self) -> Result<Config> {
        Ok(Config::default())
    }

    fn save(&self, _config: &Config) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct ScriptedPlayer {
    loaded: bool,
    ended: bool,
    position: Duration,
}

impl Player for ScriptedPlayer {
    fn probe_duration(&mut self, _path: &Path) -> Option<u32> {
        Some(120)
    }

    fn open(&mut self, _path: &Path) -> Result<()> {
        self.loaded = true;
        self.ended = false;
        self.position = Duration::ZERO;
        Ok(())
    }

    fn play(&mut self) {}

    fn pause(&mut self) {}

    fn set_time(&mut self, position: Duration) -> Result<()> {
        self.position = position;
        Ok(())
    }

    fn time(&self) -> Option<Duration> {
        self.loaded.then_some(self.position)
    }

    fn is_ended(&self) -> bool {
        self.loaded && self.ended
    }

    fn release(&mut self) {
        self.loaded = false;
        self.ended = false;
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }
}

fuzz_target!(|data: &[u8]| {
    let len = (data.len() % 16).max(1);
    let config = Config {
        folders: vec![PathBuf::from("/fuzz/album"), PathBuf::from("/fuzz/empty")],
        ..Config::default()
    };
    let mut controller = PlaybackController::new(
        config,
        Box::new(Store),
        Box::new(Catalog(len)),
        Box::new(Tags),
        Box::new(ScriptedPlayer::default()),
    )
    .with_rng(SmallRng::seed_from_u64(data.len() as u64));

    for byte in data {
        match byte % 10 {
            0 => controller.select_folder(Path::new("/fuzz/album")),
            1 => controller.select_folder(Path::new("/fuzz/empty")),
            2 => {
                let track = format!("/fuzz/album/track_{}.mp3", usize::from(*byte) % len);
                controller.select_track(Path::new(&track));
            }
            3 => controller.toggle_play_pause(),
            4 => controller.global_play(),
            5 => controller.on_track_ended(),
            6 => controller.cycle_loop_mode(),
            7 => controller.toggle_shuffle(),
            8 => controller.seek(u32::from(*byte)),
            _ => controller.poll_progress(),
        }

        if let Some(current) = controller.current_track() {
            assert!(controller.tracks().iter().any(|track| track.path == current));
        }
        if controller.is_playing() {
            assert!(controller.current_track().is_some());
        }
    }
    let _ = controller.drain_events();
});
