//! Configuration Vault – reads/writes `~/.mimic/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mimic_control::ControlLoopConfig;
use mimic_hal::SerialSettings;
use mimic_types::MimicError;

/// `landmark_input` value that selects standard input.
pub const STDIN_INPUT: &str = "-";

/// Deployment settings stored in `~/.mimic/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Serial device of the servo controller.
    #[serde(default = "default_serial_port")]
    pub serial_port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Pause after opening the port while the board resets.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Longest wait for one landmark frame.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    /// Path of a JSON-lines landmark stream, or `-` for stdin.
    #[serde(default = "default_landmark_input")]
    pub landmark_input: String,

    #[serde(default)]
    pub min_visibility: f32,
}

fn default_serial_port() -> String {
    "/dev/ttyUSB0".to_string()
}
fn default_baud_rate() -> u32 {
    9600
}
fn default_settle_delay_ms() -> u64 {
    2000
}
fn default_write_timeout_ms() -> u64 {
    1000
}
fn default_acquire_timeout_ms() -> u64 {
    5000
}
fn default_landmark_input() -> String {
    STDIN_INPUT.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial_port: default_serial_port(),
            baud_rate: default_baud_rate(),
            settle_delay_ms: default_settle_delay_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            landmark_input: default_landmark_input(),
            min_visibility: 0.0,
        }
    }
}

impl Config {
    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings {
            path: self.serial_port.clone(),
            baud_rate: self.baud_rate,
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }

    /// # Errors
    ///
    /// Returns [`MimicError::Config`] when the loop settings are unusable.
    pub fn loop_config(&self) -> Result<ControlLoopConfig, MimicError> {
        let cfg = ControlLoopConfig {
            acquire_timeout: Duration::from_millis(self.acquire_timeout_ms),
            min_visibility: self.min_visibility,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// `true` when landmarks are read from standard input.
    pub fn reads_stdin(&self) -> bool {
        self.landmark_input == STDIN_INPUT
    }
}

/// Return the path to `~/.mimic/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".mimic").join("config.toml")
}

/// Load the config from disk, falling back to defaults when the file does
/// not exist, then apply `MIMIC_*` overrides.
pub fn load() -> Result<Config, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Config, String> {
    let mut cfg = if path.exists() {
        let raw = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?
    } else {
        Config::default()
    };
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Apply `MIMIC_*` environment variable overrides to `cfg`. Values that do
/// not parse are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `MIMIC_SERIAL_PORT` | `serial_port` |
/// | `MIMIC_BAUD_RATE` | `baud_rate` |
/// | `MIMIC_SETTLE_DELAY_MS` | `settle_delay_ms` |
/// | `MIMIC_WRITE_TIMEOUT_MS` | `write_timeout_ms` |
/// | `MIMIC_ACQUIRE_TIMEOUT_MS` | `acquire_timeout_ms` |
/// | `MIMIC_LANDMARK_INPUT` | `landmark_input` |
/// | `MIMIC_MIN_VISIBILITY` | `min_visibility` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("MIMIC_SERIAL_PORT") {
        cfg.serial_port = v;
    }
    if let Ok(v) = std::env::var("MIMIC_LANDMARK_INPUT") {
        cfg.landmark_input = v;
    }
    if let Ok(v) = std::env::var("MIMIC_BAUD_RATE")
        && let Ok(baud) = v.parse::<u32>()
    {
        cfg.baud_rate = baud;
    }
    override_millis("MIMIC_SETTLE_DELAY_MS", &mut cfg.settle_delay_ms);
    override_millis("MIMIC_WRITE_TIMEOUT_MS", &mut cfg.write_timeout_ms);
    override_millis("MIMIC_ACQUIRE_TIMEOUT_MS", &mut cfg.acquire_timeout_ms);
    if let Ok(v) = std::env::var("MIMIC_MIN_VISIBILITY")
        && let Ok(vis) = v.parse::<f32>()
    {
        cfg.min_visibility = vis;
    }
}

fn override_millis(var: &str, field: &mut u64) {
    if let Ok(v) = std::env::var(var)
        && let Ok(ms) = v.parse::<u64>()
    {
        *field = ms;
    }
}

/// Save the config to disk, creating `~/.mimic/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env-var tests mutate process state; run them one at a time.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env<F: FnOnce()>(var: &str, value: &str, f: F) {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        // SAFETY: serialized by ENV_LOCK; nothing else in this crate touches MIMIC_* vars.
        unsafe { std::env::set_var(var, value) };
        f();
        unsafe { std::env::remove_var(var) };
    }

    #[test]
    fn defaults_match_the_reference_rig() {
        let cfg = Config::default();
        assert_eq!(cfg.serial_port, "/dev/ttyUSB0");
        assert_eq!(cfg.baud_rate, 9600);
        assert_eq!(cfg.settle_delay_ms, 2000);
        assert!(cfg.reads_stdin());

        let serial = cfg.serial_settings();
        assert_eq!(serial, SerialSettings::default());

        let looped = cfg.loop_config().unwrap();
        assert_eq!(looped, ControlLoopConfig::default());
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");
        let loaded = {
            let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            load_from(&path).expect("load ok")
        };
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "serial_port = \"/dev/ttyACM0\"\nmin_visibility = 0.5\n").unwrap();

        let cfg = {
            let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            load_from(&path).expect("load ok")
        };
        assert_eq!(cfg.serial_port, "/dev/ttyACM0");
        assert_eq!(cfg.min_visibility, 0.5);
        assert_eq!(cfg.baud_rate, 9600);
        assert_eq!(cfg.acquire_timeout_ms, 5000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "baud_rate = \"fast\"\n").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(err.contains("Failed to parse config"), "{err}");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        let cfg = {
            let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            load_from(&path).expect("no error")
        };
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn config_path_points_to_mimic_dir() {
        let p = config_path_for_home("/home/testuser");
        assert_eq!(p, PathBuf::from("/home/testuser/.mimic/config.toml"));
    }

    #[test]
    fn env_overrides_serial_port() {
        with_env("MIMIC_SERIAL_PORT", "/dev/ttyS3", || {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            assert_eq!(cfg.serial_port, "/dev/ttyS3");
        });
    }

    #[test]
    fn env_overrides_baud_rate() {
        with_env("MIMIC_BAUD_RATE", "115200", || {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            assert_eq!(cfg.baud_rate, 115_200);
        });
    }

    #[test]
    fn env_override_ignores_unparsable_value() {
        with_env("MIMIC_ACQUIRE_TIMEOUT_MS", "soon", || {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            assert_eq!(cfg.acquire_timeout_ms, 5000);
        });
    }

    #[test]
    fn env_overrides_landmark_input_and_visibility() {
        with_env("MIMIC_LANDMARK_INPUT", "/tmp/session.jsonl", || {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            assert_eq!(cfg.landmark_input, "/tmp/session.jsonl");
            assert!(!cfg.reads_stdin());
        });
        with_env("MIMIC_MIN_VISIBILITY", "0.75", || {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            assert_eq!(cfg.min_visibility, 0.75);
        });
    }

    #[test]
    fn unusable_loop_settings_are_rejected() {
        let cfg = Config {
            acquire_timeout_ms: 0,
            ..Config::default()
        };
        assert!(matches!(cfg.loop_config(), Err(MimicError::Config(_))));

        let cfg = Config {
            min_visibility: 2.0,
            ..Config::default()
        };
        assert!(cfg.loop_config().is_err());
    }
}
