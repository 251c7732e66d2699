use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::paths::ToolDir;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "SURF_CONFIG";

pub const DEFAULT_PROFILE: &str = "default";
pub const DEFAULT_TRUNCATE_AFTER: usize = 100_000;
pub const DEFAULT_REQUEST_SECS: u64 = 60;
pub const DEFAULT_STARTUP_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// Config structs (parsed from TOML)
// ---------------------------------------------------------------------------

/// The parsed TOML file. Every field is optional.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigFile {
    pub browser: BrowserConfig,
    pub defaults: DefaultsConfig,
    pub timeouts: TimeoutsConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Use this browser instead of the provisioned one.
    pub executable: Option<String>,
    /// Archive to fetch when provisioning.
    pub download_url: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub profile: Option<String>,
    pub truncate_after: Option<usize>,
    pub headful: Option<bool>,
    pub window_size: Option<String>,
    pub stealth: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub request_secs: Option<u64>,
    pub startup_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// Resolved config (all defaults filled in)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub executable: Option<PathBuf>,
    pub download_url: Option<String>,
    pub profile: String,
    pub truncate_after: usize,
    pub headful: bool,
    pub window_size: Option<String>,
    pub stealth: bool,
    pub request_timeout: Duration,
    pub startup_timeout: Duration,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        resolve_config(&ConfigFile::default())
    }
}

/// Fill in defaults. Zero values count as unset.
#[must_use]
pub fn resolve_config(file: &ConfigFile) -> ResolvedConfig {
    let positive = |v: Option<u64>, default: u64| v.filter(|&n| n > 0).unwrap_or(default);

    ResolvedConfig {
        executable: file.browser.executable.as_ref().map(PathBuf::from),
        download_url: file.browser.download_url.clone(),
        profile: file
            .defaults
            .profile
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string()),
        truncate_after: file
            .defaults
            .truncate_after
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_TRUNCATE_AFTER),
        headful: file.defaults.headful.unwrap_or(false),
        window_size: file.defaults.window_size.clone(),
        stealth: file.defaults.stealth.unwrap_or(false),
        request_timeout: Duration::from_secs(positive(
            file.timeouts.request_secs,
            DEFAULT_REQUEST_SECS,
        )),
        startup_timeout: Duration::from_secs(positive(
            file.timeouts.startup_secs,
            DEFAULT_STARTUP_SECS,
        )),
    }
}

// ---------------------------------------------------------------------------
// Config file search
// ---------------------------------------------------------------------------

/// First existing config file, in priority order:
///
/// 1. `explicit_path` (from `--config`)
/// 2. `$SURF_CONFIG`
/// 3. `<tool dir>/config.toml`
/// 4. `<config_dir>/surf/config.toml`
#[must_use]
pub fn find_config_file(explicit_path: Option<&Path>, tool_dir: &ToolDir) -> Option<PathBuf> {
    find_config_file_with(explicit_path, std::env::var(CONFIG_ENV).ok(), tool_dir)
}

/// [`find_config_file`] with the environment value passed in.
#[must_use]
pub fn find_config_file_with(
    explicit_path: Option<&Path>,
    env_config: Option<String>,
    tool_dir: &ToolDir,
) -> Option<PathBuf> {
    let candidates = explicit_path
        .map(Path::to_path_buf)
        .into_iter()
        .chain(env_config.map(PathBuf::from))
        .chain(std::iter::once(tool_dir.config_file()))
        .chain(dirs::config_dir().map(|d| d.join("surf").join("config.toml")));

    for candidate in candidates {
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Locate and parse the config. Problems are logged, never fatal.
#[must_use]
pub fn load_config(explicit_path: Option<&Path>, tool_dir: &ToolDir) -> ConfigFile {
    match find_config_file(explicit_path, tool_dir) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            load_config_from(&path)
        }
        None => ConfigFile::default(),
    }
}

#[must_use]
pub fn load_config_from(path: &Path) -> ConfigFile {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_config(&contents, path),
        Err(e) => {
            tracing::warn!("could not read config file {}: {e}", path.display());
            ConfigFile::default()
        }
    }
}

/// Two passes: a strict parse to notice unknown keys, then a lenient one so
/// known keys still apply.
#[must_use]
pub fn parse_config(contents: &str, path: &Path) -> ConfigFile {
    match toml::from_str::<StrictConfigFile>(contents) {
        Ok(strict) => strict.into(),
        Err(strict_err) => match toml::from_str::<ConfigFile>(contents) {
            Ok(config) => {
                tracing::warn!("unknown keys in config file {}: {strict_err}", path.display());
                config
            }
            Err(parse_err) => {
                tracing::warn!("could not parse config file {}: {parse_err}", path.display());
                ConfigFile::default()
            }
        },
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct StrictConfigFile {
    #[serde(default)]
    browser: StrictBrowserConfig,
    #[serde(default)]
    defaults: StrictDefaultsConfig,
    #[serde(default)]
    timeouts: StrictTimeoutsConfig,
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StrictBrowserConfig {
    executable: Option<String>,
    download_url: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StrictDefaultsConfig {
    profile: Option<String>,
    truncate_after: Option<usize>,
    headful: Option<bool>,
    window_size: Option<String>,
    stealth: Option<bool>,
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StrictTimeoutsConfig {
    request_secs: Option<u64>,
    startup_secs: Option<u64>,
}

impl From<StrictConfigFile> for ConfigFile {
    fn from(s: StrictConfigFile) -> Self {
        Self {
            browser: BrowserConfig {
                executable: s.browser.executable,
                download_url: s.browser.download_url,
            },
            defaults: DefaultsConfig {
                profile: s.defaults.profile,
                truncate_after: s.defaults.truncate_after,
                headful: s.defaults.headful,
                window_size: s.defaults.window_size,
                stealth: s.defaults.stealth,
            },
            timeouts: TimeoutsConfig {
                request_secs: s.timeouts.request_secs,
                startup_secs: s.timeouts.startup_secs,
            },
        }
    }
}
