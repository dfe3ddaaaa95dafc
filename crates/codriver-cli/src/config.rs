//! Configuration file – reads/writes `~/.codriver/config.toml`.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use codriver_kernel::GateOverride;
use codriver_runtime::LogFormat;
use codriver_telemetry::SourceMode;
use serde::{Deserialize, Serialize};

/// Where telemetry comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TelemetryMode {
    /// Synthetic drive, no game needed.
    #[default]
    Mock,
    /// The game plugin's shared-memory segment.
    SharedMemory,
}

impl std::str::FromStr for TelemetryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "shared-memory" | "shm" => Ok(Self::SharedMemory),
            other => Err(format!("unknown telemetry mode '{other}'")),
        }
    }
}

impl std::fmt::Display for TelemetryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TelemetryMode::Mock => write!(f, "mock"),
            TelemetryMode::SharedMemory => write!(f, "shared-memory"),
        }
    }
}

/// `[telemetry]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub mode: TelemetryMode,

    /// Segment path on Unix, mapping name on Windows.
    #[serde(default = "default_shm_path")]
    pub shm_path: String,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Reference locations attached to each snapshot.
    #[serde(default = "default_nearest_locations")]
    pub nearest_locations: usize,

    /// JSON file of reference locations.  The bundled sample set is used
    /// when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations_path: Option<PathBuf>,

    /// Seed of the synthetic drive.  Random when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl TelemetryConfig {
    /// The source mode this table describes.  `fallback_seed` is used in mock
    /// mode when no seed is configured.
    pub fn source_mode(&self, fallback_seed: u64) -> SourceMode {
        match self.mode {
            TelemetryMode::Mock => SourceMode::Synthetic {
                seed: self.seed.unwrap_or(fallback_seed),
            },
            TelemetryMode::SharedMemory => SourceMode::SharedMemory {
                name: self.shm_path.clone(),
            },
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            mode: TelemetryMode::default(),
            shm_path: default_shm_path(),
            poll_interval_ms: default_poll_interval_ms(),
            nearest_locations: default_nearest_locations(),
            locations_path: None,
            seed: None,
        }
    }
}

/// Persisted user configuration stored in `~/.codriver/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Per-rule gate overrides, keyed by rule name.
    #[serde(default)]
    pub rules: BTreeMap<String, GateOverride>,
}

impl Config {
    pub fn rule_overrides(&self) -> HashMap<String, GateOverride> {
        self.rules
            .iter()
            .map(|(name, tweak)| (name.clone(), tweak.clone()))
            .collect()
    }
}

fn default_shm_path() -> String {
    if cfg!(windows) {
        r"Local\SCSTelemetry".to_string()
    } else {
        "/dev/shm/SCS/SCSTelemetry".to_string()
    }
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_nearest_locations() -> usize {
    codriver_telemetry::source::DEFAULT_NEAREST_LOCATIONS
}

/// Return the path to `~/.codriver/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".codriver").join("config.toml")
}

/// Load the config, writing the defaults first when the file is absent.
/// The `bool` is `true` when the file was just created.
pub fn load_or_init() -> Result<(Config, bool), String> {
    load_or_init_at(&config_path())
}

pub(crate) fn load_or_init_at(path: &Path) -> Result<(Config, bool), String> {
    if let Some(cfg) = load_from(path)? {
        return Ok((cfg, false));
    }
    let cfg = Config::default();
    save_to(&cfg, path)?;
    let mut cfg = cfg;
    apply_env_overrides(&mut cfg);
    Ok((cfg, true))
}

/// Load the config from a specific path.  Returns `None` if the file does
/// not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    if cfg.telemetry.poll_interval_ms == 0 {
        cfg.telemetry.poll_interval_ms = default_poll_interval_ms();
    }
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `CODRIVER_*` environment variable overrides to `cfg`.  Values that
/// do not parse are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `CODRIVER_TELEMETRY_MODE` | `telemetry.mode` |
/// | `CODRIVER_SHM_PATH` | `telemetry.shm_path` |
/// | `CODRIVER_POLL_INTERVAL_MS` | `telemetry.poll_interval_ms` |
/// | `CODRIVER_LOG_FORMAT` | `log_format` |
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides_from(cfg, |key| std::env::var(key).ok());
}

fn apply_overrides_from(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("CODRIVER_TELEMETRY_MODE")
        && let Ok(mode) = v.parse()
    {
        cfg.telemetry.mode = mode;
    }
    if let Some(v) = lookup("CODRIVER_SHM_PATH")
        && !v.trim().is_empty()
    {
        cfg.telemetry.shm_path = v;
    }
    if let Some(v) = lookup("CODRIVER_POLL_INTERVAL_MS")
        && let Ok(ms) = v.trim().parse::<u64>()
        && ms > 0
    {
        cfg.telemetry.poll_interval_ms = ms;
    }
    if let Some(v) = lookup("CODRIVER_LOG_FORMAT")
        && let Ok(format) = v.parse()
    {
        cfg.log_format = format;
    }
}

/// Save the config to a specific path, creating its directory if necessary.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn first_load_writes_the_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let (_, created) = load_or_init_at(&path).expect("init");
        assert!(created);
        assert!(path.exists());

        let (_, created) = load_or_init_at(&path).expect("reload");
        assert!(!created);
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .expect("dir")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn rule_tables_roundtrip() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"
log_format = "json"

[telemetry]
mode = "shared-memory"
poll_interval_ms = 250

[rules.speeding]
enabled = false

[rules.harsh_braking]
chance = 0.5
cooldown_secs = 60
"#,
        )
        .unwrap();

        let cfg = load_from(&path).expect("load").expect("some");
        assert_eq!(cfg.telemetry.mode, TelemetryMode::SharedMemory);
        assert_eq!(cfg.telemetry.poll_interval_ms, 250);
        assert_eq!(cfg.telemetry.nearest_locations, 5);
        assert_eq!(cfg.rules["speeding"].enabled, Some(false));
        assert_eq!(cfg.rules["harsh_braking"].chance, Some(0.5));

        save_to(&cfg, &path).expect("save");
        let reloaded = load_from(&path).expect("load").expect("some");
        assert_eq!(reloaded.rules, cfg.rules);
        assert_eq!(reloaded.telemetry.mode, cfg.telemetry.mode);
    }

    #[test]
    fn zero_poll_interval_falls_back_to_the_default() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[telemetry]\npoll_interval_ms = 0\n").unwrap();

        let cfg = load_from(&path).expect("load").expect("some");
        assert_eq!(cfg.telemetry.poll_interval_ms, 1000);
    }

    #[test]
    fn config_path_points_to_codriver_dir() {
        let p = config_path_for_home("/home/driver");
        assert!(p.to_string_lossy().contains(".codriver"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = Config::default();
        apply_overrides_from(
            &mut cfg,
            env(&[
                ("CODRIVER_TELEMETRY_MODE", "shared-memory"),
                ("CODRIVER_SHM_PATH", "/tmp/scs"),
                ("CODRIVER_POLL_INTERVAL_MS", "200"),
                ("CODRIVER_LOG_FORMAT", "json"),
            ]),
        );
        assert_eq!(cfg.telemetry.mode, TelemetryMode::SharedMemory);
        assert_eq!(cfg.telemetry.shm_path, "/tmp/scs");
        assert_eq!(cfg.telemetry.poll_interval_ms, 200);
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut cfg = Config::default();
        apply_overrides_from(
            &mut cfg,
            env(&[
                ("CODRIVER_TELEMETRY_MODE", "carrier-pigeon"),
                ("CODRIVER_POLL_INTERVAL_MS", "soon"),
                ("CODRIVER_LOG_FORMAT", "pretty"),
            ]),
        );
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn source_mode_follows_the_table() {
        let mut telemetry = TelemetryConfig::default();
        assert_eq!(telemetry.source_mode(9), SourceMode::Synthetic { seed: 9 });
        telemetry.seed = Some(3);
        assert_eq!(telemetry.source_mode(9), SourceMode::Synthetic { seed: 3 });
        telemetry.mode = TelemetryMode::SharedMemory;
        assert_eq!(
            telemetry.source_mode(9),
            SourceMode::SharedMemory {
                name: telemetry.shm_path.clone()
            }
        );
    }
}
