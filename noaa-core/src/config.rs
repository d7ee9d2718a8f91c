use directories::ProjectDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::ConfigError;

pub const TOKEN_VAR: &str = "NOAA_TOKEN";
pub const ENV_FILE_NAME: &str = ".env";
pub const DEFAULT_BASE_URL: &str = "https://www.ncei.noaa.gov/cdo-web/api/v2";

/// Largest page the CDO API will return.
pub const MAX_LIMIT: u32 = 1000;

/// The CDO data endpoint rejects date ranges longer than a year.
pub const MAX_LOOKBACK_DAYS: u32 = 365;

/// CDO web services token. Never printed in clear.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Result<Self, ConfigError> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        Ok(Self(token))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Only the last four characters are kept.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 4 {
            return "****".to_string();
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("****{tail}")
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiToken").field(&self.masked()).finish()
    }
}

impl fmt::Display for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// `[api]` section of `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    /// e.g. "GHCND" for daily summaries.
    pub dataset_id: String,
    /// e.g. "CITY:US390029".
    pub location_id: String,
    pub lookback_days: u32,
    pub limit: u32,
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            dataset_id: "GHCND".to_string(),
            location_id: "CITY:US390029".to_string(),
            lookback_days: 7,
            limit: 10,
            timeout_secs: 30,
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[store]` section of `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreSettings {
    pub bucket: Option<String>,
    pub prefix: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub allow_http: bool,
    /// Write to a local directory instead of S3.
    pub local_dir: Option<PathBuf>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            bucket: None,
            prefix: "noaa_raw".to_string(),
            region: None,
            endpoint: None,
            allow_http: false,
            local_dir: None,
        }
    }
}

/// Persistent settings stored on disk.
///
/// Example TOML:
/// [api]
/// location_id = "CITY:US390029"
///
/// [store]
/// bucket = "weather-raw"
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub store: StoreSettings,
}

impl Settings {
    /// Load settings from the platform config dir, or defaults if the file doesn't exist yet.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;

        toml::from_str(&contents)
            .map_err(|source| ConfigError::Settings { path: path.to_path_buf(), source })
    }

    /// Save settings to disk, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml = toml::to_string_pretty(self).context("Failed to serialize settings to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf, ConfigError> {
        let dirs =
            ProjectDirs::from("dev", "noaa-etl", "noaa-etl").ok_or(ConfigError::NoConfigDir)?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Variables from the process environment and the `.env` file.
///
/// Process variables win over file entries, and nothing is written back
/// into the process environment.
#[derive(Debug, Clone, Default)]
pub struct Vars {
    process: HashMap<String, String>,
    file: HashMap<String, String>,
    file_path: Option<PathBuf>,
}

impl Vars {
    pub fn new(process: HashMap<String, String>, file: HashMap<String, String>) -> Self {
        Self { process, file, file_path: None }
    }

    /// Capture the process environment and read the env file at `path`.
    pub fn from_env_file(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let file = match &path {
            Some(path) => read_env_file(path)?,
            None => HashMap::new(),
        };

        Ok(Self { process: std::env::vars().collect(), file, file_path: path })
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Non-blank value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        [&self.process, &self.file]
            .into_iter()
            .filter_map(|vars| vars.get(key))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
    }

    fn get_owned(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }
}

/// Search `start` and its ancestors for a file called `name`.
pub fn find_upward(start: &Path, name: &str) -> Option<PathBuf> {
    start.ancestors().map(|dir| dir.join(name)).find(|candidate| candidate.is_file())
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let env_err = |source| ConfigError::EnvFile { path: path.to_path_buf(), source };

    dotenv::from_path_iter(path)
        .map_err(env_err)?
        .map(|item| item.map_err(env_err))
        .collect()
}

/// Values supplied on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub dataset_id: Option<String>,
    pub location_id: Option<String>,
    pub lookback_days: Option<u32>,
    pub limit: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    pub local_dir: Option<PathBuf>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"****")
            .field("session_token", &self.session_token.as_ref().map(|_| "****"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub allow_http: bool,
    pub credentials: Option<S3Credentials>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    S3(S3Config),
    Local(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub prefix: String,
}

/// Everything a run needs, resolved once and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: ApiToken,
    pub api: ApiSettings,
    pub store: StoreConfig,
}

impl Config {
    /// Load the full configuration: settings file, `.env`, process environment, then overrides.
    ///
    /// With no explicit `env_file`, `.env` is searched upward from the working directory.
    pub fn load(env_file: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir()
            .map_err(|source| ConfigError::Io { path: PathBuf::from("."), source })?;
        info!("Current working directory: {}", cwd.display());

        let env_path = match env_file {
            Some(path) => Some(path.to_path_buf()),
            None => find_upward(&cwd, ENV_FILE_NAME),
        };
        match &env_path {
            Some(path) => info!("Found {ENV_FILE_NAME} at: {}", path.display()),
            None => warn!("No {ENV_FILE_NAME} file found from {}", cwd.display()),
        }

        let vars = Vars::from_env_file(env_path)?;
        let settings = Settings::load()?;

        let config = Self::resolve(settings, &vars, overrides)?;
        info!("{TOKEN_VAR} loaded: {}", config.token);

        Ok(config)
    }

    /// Layer `vars` and `overrides` over `settings` and validate the result.
    pub fn resolve(
        settings: Settings,
        vars: &Vars,
        overrides: &Overrides,
    ) -> Result<Self, ConfigError> {
        let token = ApiToken::new(vars.get(TOKEN_VAR).unwrap_or_default())?;

        let Settings { mut api, store } = settings;

        if let Some(base_url) = vars.get_owned("NOAA_BASE_URL") {
            api.base_url = base_url;
        }
        if let Some(dataset_id) = overrides.dataset_id.clone().or(vars.get_owned("NOAA_DATASET_ID"))
        {
            api.dataset_id = dataset_id;
        }
        if let Some(location_id) =
            overrides.location_id.clone().or(vars.get_owned("NOAA_LOCATION_ID"))
        {
            api.location_id = location_id;
        }
        if let Some(days) = overrides.lookback_days {
            api.lookback_days = days;
        }
        if let Some(limit) = overrides.limit {
            api.limit = limit;
        }
        if let Some(secs) = overrides.timeout_secs {
            api.timeout_secs = secs;
        }

        validate_api(&api)?;

        let prefix = overrides.prefix.clone().unwrap_or(store.prefix);

        let backend = match overrides.local_dir.clone().or(store.local_dir) {
            Some(dir) => StoreBackend::Local(dir),
            None => StoreBackend::S3(S3Config {
                bucket: overrides.bucket.clone().or(vars.get_owned("NOAA_BUCKET")).or(store.bucket),
                region: vars
                    .get_owned("AWS_REGION")
                    .or(vars.get_owned("AWS_DEFAULT_REGION"))
                    .or(store.region),
                endpoint: vars.get_owned("AWS_ENDPOINT_URL").or(store.endpoint),
                allow_http: store.allow_http,
                credentials: s3_credentials(vars),
            }),
        };

        Ok(Self { token, api, store: StoreConfig { backend, prefix } })
    }
}

fn s3_credentials(vars: &Vars) -> Option<S3Credentials> {
    Some(S3Credentials {
        access_key_id: vars.get_owned("AWS_ACCESS_KEY_ID")?,
        secret_access_key: vars.get_owned("AWS_SECRET_ACCESS_KEY")?,
        session_token: vars.get_owned("AWS_SESSION_TOKEN"),
    })
}

fn validate_api(api: &ApiSettings) -> Result<(), ConfigError> {
    if !(1..=MAX_LIMIT).contains(&api.limit) {
        return Err(ConfigError::Invalid(format!(
            "limit must be between 1 and {MAX_LIMIT}, got {}",
            api.limit
        )));
    }
    if api.lookback_days > MAX_LOOKBACK_DAYS {
        return Err(ConfigError::Invalid(format!(
            "lookback_days must be at most {MAX_LOOKBACK_DAYS}, got {}",
            api.lookback_days
        )));
    }
    if api.timeout_secs == 0 {
        return Err(ConfigError::Invalid("timeout_secs must be greater than zero".to_string()));
    }
    if !api.base_url.starts_with("http://") && !api.base_url.starts_with("https://") {
        return Err(ConfigError::Invalid(format!(
            "base_url must be an http(s) URL, got '{}'",
            api.base_url
        )));
    }
    Ok(())
}
