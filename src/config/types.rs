use serde::Deserialize;

/// Main configuration structure for Seo-Sweep
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub job: JobConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default, rename = "client")]
    pub clients: Vec<ClientEntry>,
}

/// HTTP fetching configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FetcherConfig {
    /// User-Agent strings rotated round-robin across requests
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,

    /// Timeout for discovery fetches (seconds)
    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout_secs: u64,

    /// Timeout for analysis fetches (seconds)
    #[serde(default = "default_analysis_timeout")]
    pub analysis_timeout_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agents: default_user_agents(),
            discovery_timeout_secs: default_discovery_timeout(),
            analysis_timeout_secs: default_analysis_timeout(),
        }
    }
}

/// Memory tier selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierSetting {
    /// Detect from available system memory at job start
    #[default]
    Auto,
    Low,
    Medium,
    High,
}

/// Audit pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AuditConfig {
    /// Memory tier policy to apply
    #[serde(default)]
    pub memory_tier: TierSetting,

    /// Number of URLs fetched concurrently per discovery batch
    #[serde(default = "default_discovery_batch_size")]
    pub discovery_batch_size: usize,

    /// Maximum number of pending URLs in the discovery queue
    #[serde(default = "default_max_queue")]
    pub max_queue: usize,

    /// Maximum number of new links admitted from a single page
    #[serde(default = "default_links_per_page")]
    pub links_per_page: usize,

    /// Maximum number of URLs seeded from sitemaps
    #[serde(default = "default_sitemap_seed_limit")]
    pub sitemap_seed_limit: usize,

    /// Overrides the tier's analysis batch size
    pub batch_size: Option<usize>,

    /// Overrides the tier's number of concurrently running batches
    pub parallel_batches: Option<usize>,

    /// Overrides the tier's pause between analysis groups (milliseconds)
    pub group_delay_ms: Option<u64>,

    /// Overrides the tier's pause between discovery batches (milliseconds)
    pub discovery_delay_ms: Option<u64>,

    /// Overrides whether deep checks (link liveness, redirects) run
    pub deep_analysis: Option<bool>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            memory_tier: TierSetting::Auto,
            discovery_batch_size: default_discovery_batch_size(),
            max_queue: default_max_queue(),
            links_per_page: default_links_per_page(),
            sitemap_seed_limit: default_sitemap_seed_limit(),
            batch_size: None,
            parallel_batches: None,
            group_delay_ms: None,
            discovery_delay_ms: None,
            deep_analysis: None,
        }
    }
}

/// Job execution configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JobConfig {
    /// Total attempts per audit, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay of the exponential backoff between attempts (seconds)
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,

    /// Wall-clock budget of a single attempt (seconds)
    #[serde(default = "default_job_timeout")]
    pub timeout_secs: u64,

    /// Interval at which a running audit renews its execution lock (seconds)
    #[serde(default = "default_lock_renew")]
    pub lock_renew_secs: u64,

    /// How many times a stalled audit may be re-dispatched
    #[serde(default = "default_max_stalled")]
    pub max_stalled: u32,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_secs: default_backoff_base(),
            timeout_secs: default_job_timeout(),
            lock_renew_secs: default_lock_renew(),
            max_stalled: default_max_stalled(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Path to the markdown report file
    #[serde(default = "default_report_path")]
    pub report_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            report_path: default_report_path(),
        }
    }
}

/// A known client and the website it owns
#[derive(Debug, Clone, Deserialize)]
pub struct ClientEntry {
    /// Client identifier used with `--client`
    pub id: String,

    /// Website root, with or without scheme (e.g., "example.com")
    pub website: String,
}

fn default_user_agents() -> Vec<String> {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15".to_string(),
        "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0".to_string(),
        "Mozilla/5.0 (compatible; SeoSweep/1.0; +https://github.com/seo-sweep)".to_string(),
    ]
}

fn default_discovery_timeout() -> u64 {
    15
}

fn default_analysis_timeout() -> u64 {
    30
}

fn default_discovery_batch_size() -> usize {
    15
}

fn default_max_queue() -> usize {
    200
}

fn default_links_per_page() -> usize {
    50
}

fn default_sitemap_seed_limit() -> usize {
    150
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base() -> u64 {
    5
}

fn default_job_timeout() -> u64 {
    600
}

fn default_lock_renew() -> u64 {
    30
}

fn default_max_stalled() -> u32 {
    2
}

fn default_database_path() -> String {
    "./seo-sweep.db".to_string()
}

fn default_report_path() -> String {
    "./seo-report.md".to_string()
}
