use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use log::LevelFilter;

use crate::integration::modrinth::{ModrinthClient, DEFAULT_API_URL};
use crate::modpacks::ModpackService;

const DEFAULT_ICON: &str = "default-icon.png";

/// Where modpacks live on disk and how much a single upload may weigh.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
    default_icon: PathBuf,
    max_upload_mb: u64,
}

#[derive(Clone)]
pub struct AdminCredentials {
    username: String,
    password: String,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    level: LevelFilter,
    file: Option<PathBuf>,
}

/// Startup configuration, read once from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    storage: StorageConfig,
    static_dir: PathBuf,
    admin: AdminCredentials,
    modrinth_url: String,
    addr: String,
    port: u16,
    debug: bool,
}

#[derive(Clone)]
pub struct AppData {
    modpacks: Arc<ModpackService>,
    mods: ModrinthClient,
    admin: AdminCredentials,
    static_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(root: PathBuf, default_icon: PathBuf, max_upload_mb: u64) -> StorageConfig {
        StorageConfig {
            root,
            default_icon,
            max_upload_mb,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn default_icon(&self) -> &Path {
        &self.default_icon
    }

    pub fn max_upload_mb(&self) -> u64 {
        self.max_upload_mb
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

impl AdminCredentials {
    pub fn new(username: &str, password: &str) -> AdminCredentials {
        AdminCredentials {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl LogConfig {
    /// Reads only the logging variables.
    pub fn from_env() -> anyhow::Result<LogConfig> {
        LogConfig::from_lookup(&|key: &str| dotenvy::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: &F) -> anyhow::Result<LogConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        Ok(LogConfig {
            level: LevelFilter::from_str(&level)
                .with_context(|| format!("LOG_LEVEL '{}' is not a log level", level))?,
            file: lookup("LOG_FILE").filter(|f| !f.is_empty()).map(PathBuf::from),
        })
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        Config::from_lookup(|key| dotenvy::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let password = lookup("ADMIN_PASSWORD")
            .filter(|p| !p.is_empty())
            .ok_or_else(|| anyhow!("ADMIN_PASSWORD must be set"))?;
        let static_dir = PathBuf::from(var("STATIC_DIR", "static"));

        Ok(Config {
            storage: StorageConfig::new(
                PathBuf::from(var("MODPACKS_DIR", "modpacks")),
                static_dir.join(DEFAULT_ICON),
                parse_var(&lookup, "MAX_UPLOAD_MB", 1024)?,
            ),
            static_dir,
            admin: AdminCredentials::new(&var("ADMIN_USERNAME", "admin"), &password),
            modrinth_url: var("MODRINTH_API_URL", DEFAULT_API_URL),
            addr: var("BIND_ADDR", "0.0.0.0"),
            port: parse_var(&lookup, "PORT", 5000)?,
            debug: var("APP_DEBUG", "0") == "1",
        })
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }

    pub fn admin(&self) -> &AdminCredentials {
        &self.admin
    }

    pub fn modrinth_url(&self) -> &str {
        &self.modrinth_url
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn debug(&self) -> bool {
        self.debug
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value '{}'", key, value)),
        None => Ok(default),
    }
}

impl AppData {
    pub fn new(config: &Config) -> anyhow::Result<AppData> {
        let root = config.storage().root();
        std::fs::create_dir_all(root)
            .with_context(|| format!("Failed to create storage root {}", root.display()))?;

        let mods = ModrinthClient::new(config.modrinth_url())
            .context("Failed to build the mod index client")?;
        let modpacks = ModpackService::new(config.storage().clone(), mods.clone());

        Ok(AppData {
            modpacks: Arc::new(modpacks),
            mods,
            admin: config.admin().clone(),
            static_dir: config.static_dir().to_path_buf(),
        })
    }

    pub fn modpacks(&self) -> &ModpackService {
        &self.modpacks
    }

    pub fn mods(&self) -> &ModrinthClient {
        &self.mods
    }

    pub fn admin(&self) -> &AdminCredentials {
        &self.admin
    }

    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }
}
