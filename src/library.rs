use crate::model::TrackTags;
use anyhow::{Context, Result};
use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::prelude::{Accessor, ItemKey};
use lofty::probe::Probe;
use lofty::tag::{Tag, TagType};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Matched against the raw extension, so `SONG.MP3` is not a track.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "m4a"];

pub trait TrackCatalog {
    /// Supported audio files directly inside `folder`, in a stable order.
    fn list_tracks(&self, folder: &Path) -> Vec<PathBuf>;
}

pub trait MetadataStore {
    fn read_tags(&self, track: &Path) -> Result<TrackTags>;
    fn write_title(&mut self, track: &Path, title: &str) -> Result<()>;
    fn write_artist(&mut self, track: &Path, artist: &str) -> Result<()>;
    fn write_cover(&mut self, track: &Path, image: &[u8], mime: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsCatalog;

impl TrackCatalog for FsCatalog {
    fn list_tracks(&self, folder: &Path) -> Vec<PathBuf> {
        if !folder.is_dir() {
            log::warn!("folder {} is not a readable directory", folder.display());
            return Vec::new();
        }

        let mut tracks: Vec<PathBuf> = WalkDir::new(folder)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file() && is_audio(entry.path()))
            .map(|entry| entry.into_path())
            .collect();

        tracks.sort();
        log::debug!("listed {} tracks in {}", tracks.len(), folder.display());
        tracks
    }
}

pub fn is_audio(path: &Path) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    AUDIO_EXTENSIONS.contains(&ext)
}

/// Title shown when a track carries no title tag.
pub fn fallback_title(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Artist names end up in file names elsewhere, so path separators are refused.
pub fn validate_artist(artist: &str) -> Result<()> {
    if artist.contains('/') || artist.contains('\\') {
        anyhow::bail!("Author name cannot contain '/' or '\\' characters.")
    }
    Ok(())
}

/// `cover.jpg` is `image/jpeg`, anything else is `image/<extension>`.
pub fn cover_mime_for_path(path: &Path) -> String {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    if ext == "jpg" {
        String::from("image/jpeg")
    } else {
        format!("image/{ext}")
    }
}

/// Tag store backed by lofty. Writes go to the format's native tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyTagStore;

impl LoftyTagStore {
    fn edit_tag(&self, track: &Path, edit: impl FnOnce(&mut Tag) -> Result<()>) -> Result<()> {
        validate_tag_edit_target(track)?;

        let mut tagged_file = Probe::open(track)
            .with_context(|| format!("failed to open {}", track.display()))?
            .read()
            .with_context(|| format!("failed to parse tags for {}", track.display()))?;

        let tag_type = preferred_tag_type_for_path(track).unwrap_or(tagged_file.primary_tag_type());

        if tagged_file.tag_mut(tag_type).is_none() {
            tagged_file.insert_tag(Tag::new(tag_type));
        }

        let tag = tagged_file
            .tag_mut(tag_type)
            .context("failed to access primary tag")?;
        edit(tag)?;

        tagged_file
            .save_to_path(track, WriteOptions::default())
            .with_context(|| format!("failed to write tags for {}", track.display()))
    }
}

impl MetadataStore for LoftyTagStore {
    fn read_tags(&self, track: &Path) -> Result<TrackTags> {
        let tagged_file = Probe::open(track)
            .with_context(|| format!("failed to open {}", track.display()))?
            .read()
            .with_context(|| format!("failed to parse tags for {}", track.display()))?;

        let Some(tag) = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
        else {
            return Ok(TrackTags::default());
        };

        Ok(TrackTags {
            title: tag.title().and_then(|value| clean_metadata_value(&value)),
            artist: tag.artist().and_then(|value| clean_metadata_value(&value)),
            cover: tag
                .pictures()
                .iter()
                .find(|picture| !picture.data().is_empty())
                .map(|picture| picture.data().to_vec()),
        })
    }

    fn write_title(&mut self, track: &Path, title: &str) -> Result<()> {
        self.edit_tag(track, |tag| {
            set_tag_text(tag, ItemKey::TrackTitle, title);
            Ok(())
        })
    }

    fn write_artist(&mut self, track: &Path, artist: &str) -> Result<()> {
        validate_artist(artist)?;
        self.edit_tag(track, |tag| {
            set_tag_text(tag, ItemKey::TrackArtist, artist);
            Ok(())
        })
    }

    fn write_cover(&mut self, track: &Path, image: &[u8], mime: &str) -> Result<()> {
        self.edit_tag(track, |tag| replace_cover_picture(tag, image, mime))
    }
}

/// Stored with the caller's declared type; the bytes are not sniffed.
fn replace_cover_picture(tag: &mut Tag, image: &[u8], mime: &str) -> Result<()> {
    if image.is_empty() {
        anyhow::bail!("cover image is empty")
    }
    let picture = Picture::unchecked(image.to_vec())
        .pic_type(PictureType::CoverFront)
        .mime_type(MimeType::from_str(mime))
        .build();

    while !tag.pictures().is_empty() {
        let _ = tag.remove_picture(0);
    }
    tag.push_picture(picture);
    Ok(())
}

fn set_tag_text(tag: &mut Tag, key: ItemKey, value: &str) {
    tag.remove_key(key.clone());
    if let Some(text) = clean_metadata_value(value) {
        tag.insert_text(key, text);
    }
}

fn clean_metadata_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn validate_tag_edit_target(path: &Path) -> Result<()> {
    if !is_audio(path) {
        anyhow::bail!("unsupported audio format for metadata editing")
    }

    if !path.exists() {
        anyhow::bail!("track file not found")
    }

    if !path.is_file() {
        anyhow::bail!("track path is not a file")
    }

    Ok(())
}

fn preferred_tag_type_for_path(path: &Path) -> Option<TagType> {
    match path.extension().and_then(OsStr::to_str)? {
        "mp3" | "wav" => Some(TagType::Id3v2),
        "flac" | "ogg" => Some(TagType::VorbisComments),
        "m4a" => Some(TagType::Mp4Ilst),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::probe::tests::write_test_wav;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn catalog_filters_non_audio_files() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("b.mp3"), b"x").expect("write mp3");
        fs::write(dir.path().join("a.flac"), b"x").expect("write flac");
        fs::write(dir.path().join("notes.txt"), b"x").expect("write txt");

        let tracks = FsCatalog.list_tracks(dir.path());
        assert_eq!(
            tracks,
            vec![dir.path().join("a.flac"), dir.path().join("b.mp3")]
        );
    }

    #[test]
    fn catalog_extension_match_is_case_sensitive() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("LOUD.MP3"), b"x").expect("write");
        fs::write(dir.path().join("quiet.ogg"), b"x").expect("write");

        let tracks = FsCatalog.list_tracks(dir.path());
        assert_eq!(tracks, vec![dir.path().join("quiet.ogg")]);
    }

    #[test]
    fn catalog_does_not_descend_or_list_directories() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("album.mp3")).expect("dir named like a track");
        fs::create_dir(dir.path().join("nested")).expect("nested");
        fs::write(dir.path().join("nested").join("deep.wav"), b"x").expect("write");

        assert!(FsCatalog.list_tracks(dir.path()).is_empty());
    }

    #[test]
    fn catalog_of_missing_folder_is_empty() {
        let dir = tempdir().expect("tempdir");
        assert!(FsCatalog.list_tracks(&dir.path().join("gone")).is_empty());
    }

    #[test]
    fn artist_with_path_separators_is_rejected() {
        assert!(validate_artist("foo/bar").is_err());
        assert!(validate_artist(r"foo\bar").is_err());
        assert!(validate_artist("AC-DC").is_ok());
    }

    #[test]
    fn cover_mime_follows_extension() {
        assert_eq!(cover_mime_for_path(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(cover_mime_for_path(Path::new("a.png")), "image/png");
        assert_eq!(cover_mime_for_path(Path::new("a.webp")), "image/webp");
    }

    #[test]
    fn fallback_title_is_file_stem() {
        assert_eq!(fallback_title(Path::new("/m/Song Name.mp3")), "Song Name");
    }

    #[test]
    fn metadata_value_cleaning_trims_and_drops_empty() {
        assert_eq!(
            clean_metadata_value("  hello  "),
            Some(String::from("hello"))
        );
        assert_eq!(clean_metadata_value("   \t  "), None);
    }

    #[test]
    fn title_edit_rejects_non_audio_paths() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("note.txt");
        fs::write(&file, b"x").expect("write text");

        let err = LoftyTagStore.write_title(&file, "x").expect_err("error");
        assert!(
            err.to_string().contains("unsupported audio format"),
            "unexpected error: {err:#}"
        );
    }

    #[test]
    fn artist_edit_is_validated_before_touching_the_file() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("missing.mp3");

        let err = LoftyTagStore.write_artist(&file, "a/b").expect_err("error");
        assert!(err.to_string().contains("cannot contain"));
    }

    #[test]
    fn cover_edit_rejects_missing_track() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("missing.mp3");

        let err = LoftyTagStore
            .write_cover(&file, b"not-image", "image/png")
            .expect_err("error");
        assert!(
            err.to_string().contains("track file not found"),
            "unexpected error: {err:#}"
        );
    }

    #[test]
    fn tag_edits_round_trip_through_a_wav_file() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("song.wav");
        write_test_wav(&track, 200);
        let webp = b"RIFF\x1a\x00\x00\x00WEBPVP8 \x0e\x00\x00\x00fake-webp-data";

        let mut store = LoftyTagStore;
        store.write_title(&track, "Alpha").expect("title");
        store.write_artist(&track, "Someone").expect("artist");
        store.write_cover(&track, webp, "image/webp").expect("cover");

        let tags = store.read_tags(&track).expect("read back");
        assert_eq!(tags.title.as_deref(), Some("Alpha"));
        assert_eq!(tags.artist.as_deref(), Some("Someone"));
        assert_eq!(tags.cover.as_deref(), Some(&webp[..]));

        let tagged = Probe::open(&track)
            .expect("open")
            .read()
            .expect("parse");
        let tag = tagged
            .primary_tag()
            .or_else(|| tagged.first_tag())
            .expect("tag");
        let mime = tag.pictures()[0].mime_type().map(|kind| kind.as_str().to_string());
        assert_eq!(mime.as_deref(), Some("image/webp"));
    }

    #[test]
    fn cover_keeps_declared_mime_for_unsniffable_bytes() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("song.wav");
        write_test_wav(&track, 200);

        let mut store = LoftyTagStore;
        store
            .write_cover(&track, b"jpeg bytes", "image/jpeg")
            .expect("cover");
        store
            .write_cover(&track, b"second cover", "image/png")
            .expect("replace cover");

        let tags = store.read_tags(&track).expect("read back");
        assert_eq!(tags.cover.as_deref(), Some(&b"second cover"[..]));
    }
}
