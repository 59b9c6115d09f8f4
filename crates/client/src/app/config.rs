use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use assault_engine::{MenuMetrics, MenuMetricsError, RoomMode, Seat, SeatParseError, SurfaceLayout, Vec2};
use serde::Deserialize;
use thiserror::Error;

pub(crate) const CONFIG_PATH_ENV_VAR: &str = "ASSAULT_CONFIG";
pub(crate) const ADDR_ENV_VAR: &str = "ASSAULT_ADDR";
pub(crate) const ROOM_ENV_VAR: &str = "ASSAULT_ROOM";
pub(crate) const SEAT_ENV_VAR: &str = "ASSAULT_SEAT";
pub(crate) const MODE_ENV_VAR: &str = "ASSAULT_MODE";
pub(crate) const CREATE_ENV_VAR: &str = "ASSAULT_CREATE";
pub(crate) const FPS_ENV_VAR: &str = "ASSAULT_FPS";
pub(crate) const MENU_METRICS_ENV_VAR: &str = "ASSAULT_MENU_METRICS";

const DEFAULT_ADDR: &str = assault_wire::DEFAULT_ADDR;
const DEFAULT_FPS: u32 = 20;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_INVENTORY_ORIGIN: [f32; 2] = [800.0, 0.0];

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config file {path} at {json_path}: {source}")]
    ParseFile {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid menu metrics file {path}: {source}")]
    MenuMetrics {
        path: PathBuf,
        #[source]
        source: MenuMetricsError,
    },
    #[error("invalid {setting} value '{value}' (expected {expected})")]
    InvalidValue {
        setting: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("invalid seat: {0}")]
    Seat(#[from] SeatParseError),
    #[error("a room id is required (set ASSAULT_ROOM or \"room\" in the config file)")]
    MissingRoom,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    addr: Option<String>,
    room: Option<String>,
    seat: Option<String>,
    mode: Option<String>,
    create: Option<bool>,
    fps: Option<u32>,
    menu_metrics: Option<PathBuf>,
    connect_timeout_ms: Option<u64>,
    map_origin: Option<[f32; 2]>,
    inventory_origin: Option<[f32; 2]>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ClientConfig {
    pub(crate) addr: String,
    pub(crate) room: String,
    pub(crate) seat: Seat,
    pub(crate) mode: RoomMode,
    pub(crate) create: bool,
    pub(crate) fps: u32,
    pub(crate) connect_timeout: Duration,
    pub(crate) menu_metrics: Option<PathBuf>,
    pub(crate) layout: SurfaceLayout,
}

impl ClientConfig {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(read_env_var)
    }

    pub(crate) fn resolve<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Result<Option<String>, ConfigError>,
    {
        let file = match lookup(CONFIG_PATH_ENV_VAR)? {
            Some(path) => load_file_config(Path::new(&path))?,
            None => FileConfig::default(),
        };

        let addr = lookup(ADDR_ENV_VAR)?
            .or(file.addr)
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let room = lookup(ROOM_ENV_VAR)?
            .or(file.room)
            .map(|room| room.trim().to_string())
            .filter(|room| !room.is_empty())
            .ok_or(ConfigError::MissingRoom)?;
        let seat = match lookup(SEAT_ENV_VAR)?.or(file.seat) {
            Some(raw) => Seat::parse(&raw)?,
            None => Seat::Spectator,
        };
        let mode = match lookup(MODE_ENV_VAR)?.or(file.mode) {
            Some(raw) => RoomMode::parse(&raw).ok_or(ConfigError::InvalidValue {
                setting: MODE_ENV_VAR,
                value: raw,
                expected: "delay, pause or fast",
            })?,
            None => RoomMode::Delay,
        };
        let create = match lookup(CREATE_ENV_VAR)? {
            Some(raw) => parse_flag(CREATE_ENV_VAR, &raw)?,
            None => file.create.unwrap_or(false),
        };
        let fps = match lookup(FPS_ENV_VAR)? {
            Some(raw) => parse_fps(&raw)?,
            None => file.fps.unwrap_or(DEFAULT_FPS),
        };
        if fps == 0 {
            return Err(ConfigError::InvalidValue {
                setting: FPS_ENV_VAR,
                value: fps.to_string(),
                expected: "a positive frame rate",
            });
        }
        let menu_metrics = lookup(MENU_METRICS_ENV_VAR)?
            .map(PathBuf::from)
            .or(file.menu_metrics);
        let [map_x, map_y] = file.map_origin.unwrap_or_default();
        let [inventory_x, inventory_y] = file.inventory_origin.unwrap_or(DEFAULT_INVENTORY_ORIGIN);

        Ok(Self {
            addr,
            room,
            seat,
            mode,
            create,
            fps,
            connect_timeout: Duration::from_millis(
                file.connect_timeout_ms.unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
            ),
            menu_metrics,
            layout: SurfaceLayout {
                map_origin_px: Vec2::new(map_x, map_y),
                inventory_origin_px: Vec2::new(inventory_x, inventory_y),
            },
        })
    }

    pub(crate) fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps
    }

    pub(crate) fn load_menu_metrics(&self) -> Result<MenuMetrics, ConfigError> {
        let Some(path) = &self.menu_metrics else {
            return Ok(MenuMetrics::default());
        };
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.clone(),
            source,
        })?;
        MenuMetrics::from_json(&raw).map_err(|source| ConfigError::MenuMetrics {
            path: path.clone(),
            source,
        })
    }
}

fn read_env_var(var: &'static str) -> Result<Option<String>, ConfigError> {
    match env::var(var) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(source) => Err(ConfigError::EnvVar { var, source }),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let mut deserializer = serde_json::Deserializer::from_str(&raw);
    serde_path_to_error::deserialize::<_, FileConfig>(&mut deserializer).map_err(|error| {
        let json_path = error.path().to_string();
        ConfigError::ParseFile {
            path: path.to_path_buf(),
            json_path,
            source: error.into_inner(),
        }
    })
}

fn parse_flag(setting: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            setting,
            value: raw.to_string(),
            expected: "a boolean flag",
        }),
    }
}

fn parse_fps(raw: &str) -> Result<u32, ConfigError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::InvalidValue {
            setting: FPS_ENV_VAR,
            value: raw.to_string(),
            expected: "a positive frame rate",
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    use assault_engine::Role;

    fn lookup(
        vars: &[(&'static str, &str)],
    ) -> impl Fn(&'static str) -> Result<Option<String>, ConfigError> {
        let vars: HashMap<&'static str, String> = vars
            .iter()
            .map(|(key, value)| (*key, value.to_string()))
            .collect();
        move |key| Ok(vars.get(key).cloned())
    }

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn env_only_config_uses_defaults() {
        let config = ClientConfig::resolve(lookup(&[(ROOM_ENV_VAR, "room-1"), (SEAT_ENV_VAR, "d")]))
            .expect("config");
        assert_eq!(config.addr, DEFAULT_ADDR);
        assert_eq!(config.room, "room-1");
        assert_eq!(config.seat, Seat::Player(Role::Defender));
        assert_eq!(config.mode, RoomMode::Delay);
        assert!(!config.create);
        assert_eq!(config.fps, DEFAULT_FPS);
        assert_eq!(config.frame_interval(), Duration::from_millis(50));
        assert_eq!(config.layout.inventory_origin_px, Vec2::new(800.0, 0.0));
    }

    #[test]
    fn missing_or_blank_room_is_rejected() {
        let err = ClientConfig::resolve(lookup(&[])).expect_err("no room");
        assert!(matches!(err, ConfigError::MissingRoom));
        let err = ClientConfig::resolve(lookup(&[(ROOM_ENV_VAR, "  ")])).expect_err("blank room");
        assert!(matches!(err, ConfigError::MissingRoom));
    }

    #[test]
    fn env_overrides_config_file() {
        let file = config_file(
            r#"{"addr": "10.0.0.1:7000", "room": "from-file", "seat": "h", "mode": "pause", "create": true, "fps": 10}"#,
        );
        let path = file.path().to_string_lossy().to_string();
        let config = ClientConfig::resolve(lookup(&[
            (CONFIG_PATH_ENV_VAR, path.as_str()),
            (ROOM_ENV_VAR, "from-env"),
            (CREATE_ENV_VAR, "0"),
        ]))
        .expect("config");
        assert_eq!(config.addr, "10.0.0.1:7000");
        assert_eq!(config.room, "from-env");
        assert_eq!(config.seat, Seat::Player(Role::Healer));
        assert_eq!(config.mode, RoomMode::Pause);
        assert!(!config.create);
        assert_eq!(config.fps, 10);
    }

    #[test]
    fn config_file_errors_name_the_field() {
        let file = config_file(r#"{"room": "r", "fps": "fast"}"#);
        let path = file.path().to_string_lossy().to_string();
        let err = ClientConfig::resolve(lookup(&[(CONFIG_PATH_ENV_VAR, path.as_str())]))
            .expect_err("bad fps");
        match err {
            ConfigError::ParseFile { json_path, .. } => assert_eq!(json_path, "fps"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = ClientConfig::resolve(lookup(&[(ROOM_ENV_VAR, "r"), (SEAT_ENV_VAR, "z")]))
            .expect_err("bad seat");
        assert!(matches!(err, ConfigError::Seat(_)));

        let err = ClientConfig::resolve(lookup(&[(ROOM_ENV_VAR, "r"), (MODE_ENV_VAR, "rewind")]))
            .expect_err("bad mode");
        assert!(matches!(err, ConfigError::InvalidValue { setting: MODE_ENV_VAR, .. }));

        let err = ClientConfig::resolve(lookup(&[(ROOM_ENV_VAR, "r"), (FPS_ENV_VAR, "0")]))
            .expect_err("zero fps");
        assert!(matches!(err, ConfigError::InvalidValue { setting: FPS_ENV_VAR, .. }));
    }

    #[test]
    fn menu_metrics_load_from_configured_file() {
        let file = config_file(
            r#"{"header": {"width": 80, "height": 18}, "footer": {"width": 80, "height": 4}, "right_border_width": 3}"#,
        );
        let path = file.path().to_string_lossy().to_string();
        let config = ClientConfig::resolve(lookup(&[
            (ROOM_ENV_VAR, "r"),
            (MENU_METRICS_ENV_VAR, path.as_str()),
        ]))
        .expect("config");
        let metrics = config.load_menu_metrics().expect("metrics");
        assert_eq!(metrics.header.height, 18.0);
        assert!(metrics.labels.is_empty());

        let defaults = ClientConfig::resolve(lookup(&[(ROOM_ENV_VAR, "r")]))
            .expect("config")
            .load_menu_metrics()
            .expect("defaults");
        assert!(defaults.label("walk").is_some());
    }
}
