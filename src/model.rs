use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::PathBuf;

pub const DEFAULT_SORT: &str = "+name";

/// What happens when the current track reaches its natural end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum LoopMode {
    /// Stop at the end of the track.
    #[default]
    Off,
    /// Walk the folder once, top to bottom (or every track once when shuffled).
    Down,
    /// Repeat the current track.
    One,
    /// Walk the folder forever.
    All,
}

impl LoopMode {
    pub fn next(self) -> Self {
        match self {
            Self::Off => Self::Down,
            Self::Down => Self::One,
            Self::One => Self::All,
            Self::All => Self::Off,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Down => "down",
            Self::One => "one",
            Self::All => "all",
        }
    }
}

impl Serialize for LoopMode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Off => serializer.serialize_bool(false),
            other => serializer.serialize_str(other.label()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLoopMode {
    Flag(bool),
    Named(String),
}

impl<'de> Deserialize<'de> for LoopMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawLoopMode::deserialize(deserializer)? {
            RawLoopMode::Flag(false) => Ok(Self::Off),
            RawLoopMode::Flag(true) => Err(serde::de::Error::custom(
                "loop must be false, \"down\", \"one\" or \"all\"",
            )),
            RawLoopMode::Named(name) => match name.as_str() {
                "down" => Ok(Self::Down),
                "one" => Ok(Self::One),
                "all" => Ok(Self::All),
                other => Err(serde::de::Error::custom(format!(
                    "unknown loop mode {other:?}"
                ))),
            },
        }
    }
}

/// Display attributes of one entry in a folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub path: PathBuf,
    pub title: String,
    pub artist: Option<String>,
    pub duration_seconds: u32,
}

/// Tags as read from the tag store. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub cover: Option<Vec<u8>>,
}

/// What the player panel shows for the selected track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NowPlaying {
    pub title: String,
    pub artist: Option<String>,
    pub cover: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub folders: Vec<PathBuf>,
    #[serde(default, rename = "loop")]
    pub loop_mode: LoopMode,
    #[serde(default)]
    pub shuffle: bool,
    #[serde(default = "default_sort")]
    pub sort: String,
    #[serde(default)]
    pub autoplay: bool,
}

fn default_sort() -> String {
    String::from(DEFAULT_SORT)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            folders: Vec::new(),
            loop_mode: LoopMode::Off,
            shuffle: false,
            sort: default_sort(),
            autoplay: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_toggles_return_to_start() {
        for start in [LoopMode::Off, LoopMode::Down, LoopMode::One, LoopMode::All] {
            assert_eq!(start.next().next().next().next(), start);
        }
        assert_eq!(LoopMode::Off.next(), LoopMode::Down);
        assert_eq!(LoopMode::Down.next(), LoopMode::One);
        assert_eq!(LoopMode::One.next(), LoopMode::All);
    }

    #[test]
    fn loop_mode_uses_false_or_name_on_the_wire() {
        assert_eq!(serde_json::to_string(&LoopMode::Off).expect("json"), "false");
        assert_eq!(
            serde_json::to_string(&LoopMode::Down).expect("json"),
            "\"down\""
        );

        let parsed: LoopMode = serde_json::from_str("\"all\"").expect("parse");
        assert_eq!(parsed, LoopMode::All);
        let parsed: LoopMode = serde_json::from_str("false").expect("parse");
        assert_eq!(parsed, LoopMode::Off);
        assert!(serde_json::from_str::<LoopMode>("true").is_err());
        assert!(serde_json::from_str::<LoopMode>("\"sideways\"").is_err());
    }

    #[test]
    fn config_fills_missing_fields_with_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"folders": ["/music"], "loop": "one"}"#).expect("parse");
        assert_eq!(config.folders, vec![PathBuf::from("/music")]);
        assert_eq!(config.loop_mode, LoopMode::One);
        assert!(!config.shuffle);
        assert_eq!(config.sort, "+name");
        assert!(!config.autoplay);
    }
}
