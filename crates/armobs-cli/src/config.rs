//! Task-instance configuration file – reads/writes `armobs.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use armobs_runtime::{RunArgs, TaskInstanceConfig};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Everything needed to construct one task instance.
///
/// ```toml
/// task = "insert"
/// in_sequence = false
///
/// [run]
/// precision = "f32"
/// device = "cpu"
///
/// [rl]
/// force_source = "force_sensor"
/// override_obs_goal_roll_angle = true
/// euler_convention = "xyz"
///
/// [extras]
/// peg = "round_12mm"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFile {
    #[serde(default)]
    pub in_sequence: bool,

    #[serde(flatten)]
    pub instance: TaskInstanceConfig,

    #[serde(default)]
    pub run: RunArgs,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, String>,
}

impl Default for TaskFile {
    fn default() -> Self {
        Self {
            instance: TaskInstanceConfig::new("insert"),
            in_sequence: false,
            run: RunArgs::default(),
            extras: BTreeMap::new(),
        }
    }
}

/// Config path from `ARMOBS_CONFIG`, falling back to `./armobs.toml`.
pub fn default_config_path() -> PathBuf {
    std::env::var("ARMOBS_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("armobs.toml"))
}

/// Load a task file.  Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<TaskFile>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut file: TaskFile =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut file);
    Ok(Some(file))
}

/// Apply `ARMOBS_*` environment variable overrides to `file`.
///
/// | Variable | Field |
/// |---|---|
/// | `ARMOBS_FORCE_SOURCE` | `rl.force_source` (`none` clears it) |
/// | `ARMOBS_PRECISION` | `run.precision` |
/// | `ARMOBS_DEVICE` | `run.device` |
///
/// Unparseable precision/device values are ignored with a warning; the force
/// source is passed through verbatim so a typo still fails task creation.
pub fn apply_env_overrides(file: &mut TaskFile) {
    if let Ok(v) = std::env::var("ARMOBS_FORCE_SOURCE") {
        file.instance.rl.force_source = if v.eq_ignore_ascii_case("none") || v.is_empty() {
            None
        } else {
            Some(v)
        };
    }
    if let Ok(v) = std::env::var("ARMOBS_PRECISION") {
        match v.parse() {
            Ok(precision) => file.run.precision = precision,
            Err(e) => warn!(value = %v, error = %e, "ignoring ARMOBS_PRECISION"),
        }
    }
    if let Ok(v) = std::env::var("ARMOBS_DEVICE") {
        match v.parse() {
            Ok(device) => file.run.device = device,
            Err(e) => warn!(value = %v, error = %e, "ignoring ARMOBS_DEVICE"),
        }
    }
}

/// Write `file` to `path`, creating parent directories as needed.
pub fn save_to(file: &TaskFile, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(file).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
