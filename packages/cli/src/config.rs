//! Runtime settings.
//!
//! Values are layered lowest to highest: built-in defaults, the optional
//! `parking_map.toml` file, `PARKING_MAP_*` environment variables, and
//! finally command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use parking_map_worker::DEFAULT_QUIESCENCE;
use serde::Deserialize;

/// Config file read from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "parking_map.toml";

/// Overrides the isochrones path.
pub const ENV_ISOCHRONES: &str = "PARKING_MAP_ISOCHRONES";
/// Overrides the status records path.
pub const ENV_RECORDS: &str = "PARKING_MAP_RECORDS";
/// Overrides the output directory.
pub const ENV_OUTPUT_DIR: &str = "PARKING_MAP_OUTPUT_DIR";
/// Overrides the debounce window, in milliseconds.
pub const ENV_DEBOUNCE_MS: &str = "PARKING_MAP_DEBOUNCE_MS";

const DEFAULT_ISOCHRONES: &str = "data/isochrones.geojson";
const DEFAULT_RECORDS: &str = "data/parsed_records.json";
const DEFAULT_OUTPUT_DIR: &str = "data/generated";

/// Errors that can occur while resolving settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error (config file read).
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// The config file being read.
        path: PathBuf,
        /// The underlying read error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`FileConfig`].
    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    /// An environment variable holds an unusable value.
    #[error("Invalid value '{value}' for {name}")]
    InvalidEnv {
        /// Name of the variable.
        name: &'static str,
        /// The value it held.
        value: String,
    },

    /// The configured UTC offset is out of range.
    #[error("UTC offset of {minutes} minutes is out of range")]
    InvalidOffset {
        /// The configured offset.
        minutes: i32,
    },
}

/// Contents of `parking_map.toml`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Lot isochrones `GeoJSON`.
    pub isochrones_path: Option<PathBuf>,
    /// Status records, raw or slotted.
    pub records_path: Option<PathBuf>,
    /// Where written layers go.
    pub output_dir: Option<PathBuf>,
    /// Quiet period before recomputing regions.
    pub debounce_ms: Option<u64>,
    /// Offset of the records' wall clock from UTC.
    pub utc_offset_minutes: Option<i32>,
}

impl FileConfig {
    /// Parses config file contents.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] on malformed TOML or unknown keys.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::de::from_str(toml_str)?)
    }

    /// Reads `path`. A missing file is only an error when `required`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                log::debug!("Reading config from {}", path.display());
                Self::parse(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--isochrones`.
    pub isochrones_path: Option<PathBuf>,
    /// `--records`.
    pub records_path: Option<PathBuf>,
    /// `--output-dir`.
    pub output_dir: Option<PathBuf>,
    /// `--debounce-ms`.
    pub debounce_ms: Option<u64>,
    /// `--utc-offset-minutes`.
    pub utc_offset_minutes: Option<i32>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Lot isochrones `GeoJSON`.
    pub isochrones_path: PathBuf,
    /// Status records, raw or slotted.
    pub records_path: PathBuf,
    /// Where written layers go.
    pub output_dir: PathBuf,
    /// Debounce window of the compute channel.
    pub quiescence: Duration,
    /// Fixed offset used to place record timestamps on the wall clock.
    /// `None` means the system's local time zone.
    pub utc_offset: Option<FixedOffset>,
}

impl Settings {
    /// Layers `file`, the environment as seen through `env`, and
    /// `overrides` on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an environment variable or the UTC offset
    /// is invalid.
    pub fn resolve(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
        overrides: Overrides,
    ) -> Result<Self, ConfigError> {
        let env_debounce = env(ENV_DEBOUNCE_MS)
            .map(|value| {
                value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidEnv {
                        name: ENV_DEBOUNCE_MS,
                        value,
                    })
            })
            .transpose()?;

        let isochrones_path = overrides
            .isochrones_path
            .or_else(|| env(ENV_ISOCHRONES).map(PathBuf::from))
            .or(file.isochrones_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ISOCHRONES));
        let records_path = overrides
            .records_path
            .or_else(|| env(ENV_RECORDS).map(PathBuf::from))
            .or(file.records_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RECORDS));
        let output_dir = overrides
            .output_dir
            .or_else(|| env(ENV_OUTPUT_DIR).map(PathBuf::from))
            .or(file.output_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        let quiescence = overrides
            .debounce_ms
            .or(env_debounce)
            .or(file.debounce_ms)
            .map_or(DEFAULT_QUIESCENCE, Duration::from_millis);

        let utc_offset = overrides
            .utc_offset_minutes
            .or(file.utc_offset_minutes)
            .map(|minutes| {
                minutes
                    .checked_mul(60)
                    .and_then(FixedOffset::east_opt)
                    .ok_or(ConfigError::InvalidOffset { minutes })
            })
            .transpose()?;

        Ok(Self {
            isochrones_path,
            records_path,
            output_dir,
            quiescence,
            utc_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_without_any_source() {
        let settings =
            Settings::resolve(FileConfig::default(), env_of(&[]), Overrides::default()).unwrap();
        assert_eq!(settings.isochrones_path, PathBuf::from(DEFAULT_ISOCHRONES));
        assert_eq!(settings.quiescence, Duration::from_millis(300));
        assert_eq!(settings.utc_offset, None);
    }

    #[test]
    fn flags_beat_env_beat_file() {
        let file = FileConfig::parse(
            r#"
            isochrones_path = "file/iso.geojson"
            records_path = "file/records.json"
            output_dir = "file/out"
            debounce_ms = 100
            utc_offset_minutes = 120
            "#,
        )
        .unwrap();
        let env = env_of(&[
            (ENV_RECORDS, "env/records.json"),
            (ENV_OUTPUT_DIR, "env/out"),
            (ENV_DEBOUNCE_MS, "200"),
        ]);
        let overrides = Overrides {
            output_dir: Some(PathBuf::from("flag/out")),
            ..Overrides::default()
        };

        let settings = Settings::resolve(file, env, overrides).unwrap();
        assert_eq!(settings.isochrones_path, PathBuf::from("file/iso.geojson"));
        assert_eq!(settings.records_path, PathBuf::from("env/records.json"));
        assert_eq!(settings.output_dir, PathBuf::from("flag/out"));
        assert_eq!(settings.quiescence, Duration::from_millis(200));
        assert_eq!(settings.utc_offset, FixedOffset::east_opt(7200));
    }

    #[test]
    fn rejects_bad_values() {
        let result = Settings::resolve(
            FileConfig::default(),
            env_of(&[(ENV_DEBOUNCE_MS, "soon")]),
            Overrides::default(),
        );
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnv { name: ENV_DEBOUNCE_MS, .. })
        ));

        let result = Settings::resolve(
            FileConfig::default(),
            env_of(&[]),
            Overrides {
                utc_offset_minutes: Some(24 * 60),
                ..Overrides::default()
            },
        );
        assert!(matches!(result, Err(ConfigError::InvalidOffset { minutes: 1440 })));

        assert!(FileConfig::parse("colour = \"red\"").is_err());
    }

    #[test]
    fn missing_optional_file_is_empty() {
        let config = FileConfig::load(Path::new("does/not/exist.toml"), false).unwrap();
        assert_eq!(config, FileConfig::default());
        assert!(FileConfig::load(Path::new("does/not/exist.toml"), true).is_err());
    }
}
