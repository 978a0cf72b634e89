use serde::Deserialize;
use std::time::Duration;

/// Group id value that asks for a fresh random consumer group per process
pub const RANDOM_GROUP_ID: &str = "RANDOM";

/// Main configuration structure for Pantopod
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub cluster: ClusterConfig,
    pub broker: BrokerConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "http-client", default)]
    pub http_client: HttpClientConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub tor: TorConfig,
    #[serde(rename = "resource", default)]
    pub resources: Vec<ResourceEntry>,
}

/// Coordination service settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterConfig {
    /// Connection string of the coordination service
    pub zk_connect_string: String,

    /// Name of the cluster this participant joins
    pub cluster_name: String,

    /// Name this participant registers under
    pub participant_name: String,
}

/// Message broker settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BrokerConfig {
    /// Comma-separated broker addresses
    pub broker_list: String,

    /// Consumer group id, or "RANDOM" for a per-process group
    #[serde(default = "default_group_id")]
    pub group_id: String,
}

impl BrokerConfig {
    /// Returns the consumer group id, generating one if configured as "RANDOM"
    pub fn resolved_group_id(&self) -> String {
        if self.group_id == RANDOM_GROUP_ID {
            uuid::Uuid::new_v4().to_string()
        } else {
            self.group_id.clone()
        }
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerType {
    /// SQLite tables
    Database,
    /// Directory tree with marker files
    File,
}

/// Crawl policy settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Which storage backend records crawl effects
    #[serde(default = "default_handler_type")]
    pub handler_type: HandlerType,

    /// Skip fetching URLs already marked errored
    #[serde(default = "default_true")]
    pub check_errors: bool,

    /// Follow links from pages that were already stored
    #[serde(default)]
    pub traverse_duplicates: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            handler_type: default_handler_type(),
            check_errors: true,
            traverse_duplicates: false,
        }
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HttpClientConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Total request timeout (milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Connection timeout (milliseconds)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl HttpClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Root directory of the filesystem store
    #[serde(default)]
    pub output_dir: String,

    /// Path to the SQLite database file
    #[serde(default)]
    pub database_path: String,
}

/// Tor proxy settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TorConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Directory holding one data directory per SOCKS port
    #[serde(default = "default_tor_root_dir")]
    pub root_dir: String,

    #[serde(default = "default_socks_port")]
    pub socks_port: u16,

    #[serde(default = "default_control_port")]
    pub control_port: u16,

    #[serde(default = "default_tor_executable")]
    pub executable: String,

    /// Interval between circuit resets (milliseconds); 0 disables the watchdog
    #[serde(default)]
    pub watchdog_delay_ms: u64,
}

impl TorConfig {
    pub fn watchdog_delay(&self) -> Option<Duration> {
        (self.watchdog_delay_ms > 0).then(|| Duration::from_millis(self.watchdog_delay_ms))
    }
}

impl Default for TorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            root_dir: default_tor_root_dir(),
            socks_port: default_socks_port(),
            control_port: default_control_port(),
            executable: default_tor_executable(),
            watchdog_delay_ms: 0,
        }
    }
}

/// A crawl resource this participant assigns to itself
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResourceEntry {
    /// Resource name; doubles as the broker topic and the seed host
    pub name: String,

    /// Path prefix the crawl is scoped to
    #[serde(default)]
    pub chroot: Option<String>,

    /// Page appended to the chroot for the seed URL
    #[serde(default)]
    pub start_page: Option<String>,
}

fn default_group_id() -> String {
    RANDOM_GROUP_ID.to_string()
}

fn default_handler_type() -> HandlerType {
    HandlerType::Database
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    format!("Pantopod/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_tor_root_dir() -> String {
    std::env::temp_dir()
        .join("pantopod-tor")
        .to_string_lossy()
        .into_owned()
}

fn default_socks_port() -> u16 {
    8050
}

fn default_control_port() -> u16 {
    8118
}

fn default_tor_executable() -> String {
    "tor".to_string()
}
