use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration: the embedded server, the host page
/// generation inputs, an optional dev-mode overlay, and logging.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Embedded static-file server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Host page generation configuration.
    #[serde(default)]
    pub pages: PagesConfig,
    /// Dev-mode overlay; set values override their `pages` counterparts.
    #[serde(default)]
    pub dev_mode: Option<DevModeConfig>,
    /// Logging configuration (optional, console defaults if None).
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Port the test server binds on loopback. 0 lets the OS pick.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory served under the root path.
    #[serde(default = "default_doc_root")]
    pub doc_root: PathBuf,
    /// How long `start` waits for the readiness signal.
    #[serde(with = "humantime_serde", default = "default_startup_timeout")]
    pub startup_timeout: Duration,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PagesConfig {
    /// Qualified module names host pages are generated for.
    #[serde(default)]
    pub modules: Vec<String>,
    /// Descriptor search roots, probed in order.
    #[serde(default)]
    pub search_roots: Vec<PathBuf>,
    /// Where host pages land; falls back to `server.doc_root`.
    #[serde(default)]
    pub out_dir: Option<PathBuf>,
    /// Optional host page template file.
    #[serde(default)]
    pub template: Option<PathBuf>,
    /// Suffix for the default document's `<title>`.
    #[serde(default = "default_title_suffix")]
    pub title_suffix: String,
}

/// Dev-mode overrides. Every field is optional; unset (and, for lists,
/// empty) values fall back to the base `pages` settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DevModeConfig {
    #[serde(default)]
    pub modules: Option<Vec<String>>,
    #[serde(default)]
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// "trace" | "debug" | "info" | "warn" | "error" | "off"
    #[serde(default = "default_console_level")]
    pub console_level: String,
    /// Log file path, relative paths resolved against the config base dir.
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_file_level")]
    pub file_level: String,
    /// Rotate once the file passes this size.
    #[serde(default)]
    pub max_size_mb: Option<u64>,
    /// How many rotated files to keep.
    #[serde(default)]
    pub max_backups: Option<usize>,
}

fn default_port() -> u16 {
    8080
}

fn default_doc_root() -> PathBuf {
    PathBuf::from("webapp")
}

fn default_startup_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_title_suffix() -> String {
    "Test".to_string()
}

fn default_console_level() -> String {
    "info".to_string()
}

fn default_file_level() -> String {
    "debug".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            doc_root: default_doc_root(),
            startup_timeout: default_startup_timeout(),
        }
    }
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            modules: Vec::new(),
            search_roots: Vec::new(),
            out_dir: None,
            template: None,
            title_suffix: default_title_suffix(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console_level: default_console_level(),
            file: None,
            file_level: default_file_level(),
            max_size_mb: None,
            max_backups: None,
        }
    }
}

impl AppConfig {
    /// Layered loading: defaults → YAML file → environment variables.
    /// `WEBHARNESS__SERVER__PORT=9090` maps to `server.port`.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        let figment = Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Yaml::file(config_path.as_ref()))
            .merge(Env::prefixed("WEBHARNESS__").split("__"));

        figment
            .extract()
            .with_context(|| "Failed to extract config from figment".to_string())
    }

    /// Load configuration from file, or fall back to defaults when no path
    /// was given.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_layered(path),
            None => Ok(Self::default()),
        }
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    /// Apply overrides from command line arguments.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(port) = args.port {
            self.server.port = port;
        }

        let logging = self.logging.get_or_insert_with(LoggingConfig::default);
        logging.console_level = match args.verbose {
            0 => logging.console_level.clone(), // keep
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        };
    }

    /// Module list with the dev-mode overlay applied.
    pub fn effective_modules(&self) -> Vec<String> {
        let dev = self.dev_mode.as_ref().and_then(|d| d.modules.clone());
        resolve_list(dev, self.pages.modules.clone())
    }

    /// Output directory with the full fallback chain applied:
    /// dev-mode → pages → server doc root.
    pub fn effective_out_dir(&self) -> PathBuf {
        let base = resolve(self.pages.out_dir.clone(), self.server.doc_root.clone());
        resolve(self.dev_mode.as_ref().and_then(|d| d.out_dir.clone()), base)
    }
}

/// Command line arguments structure.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub port: Option<u16>,
    pub print_config: bool,
    pub verbose: u8,
}

/// Overlay resolution for scalar settings: the override wins when set.
pub fn resolve<T>(overlay: Option<T>, base: T) -> T {
    overlay.unwrap_or(base)
}

/// Overlay resolution for list settings. A present-but-empty list counts
/// as absent and falls back to the base value; redirecting generation to
/// "nothing" is done by emptying the base list instead.
pub fn resolve_list<T>(overlay: Option<Vec<T>>, base: Vec<T>) -> Vec<T> {
    match overlay {
        Some(list) if !list.is_empty() => list,
        _ => base,
    }
}
