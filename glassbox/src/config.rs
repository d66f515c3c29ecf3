//! Engine configuration
//!
//! `GlassboxConfig` is built once at process start and handed to every
//! component constructor. Nothing below this module reads the environment.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use shared::filtering::{default_backend_log_levels, DEFAULT_TRUNCATE_CHARS};
use shared::{LevelSelection, SharedError};

pub const DEFAULT_EXECUTE_TIMEOUT_MS: u64 = 120_000;
pub const DEFAULT_COLLECTOR_MAX_RUN_MS: u64 = 300_000;
pub const DEFAULT_RUN_STORE_CAPACITY: usize = 50;
pub const DEFAULT_LOG_TAIL_LINES: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct GlassboxConfig {
    /// Process timeout; `None` disables the executor timer
    pub execute_timeout: Option<Duration>,
    /// Upper bound on one capture window
    pub collector_max_run: Duration,
    pub truncate_body_chars: usize,
    pub run_store_capacity: usize,
    pub backend_log_levels: Vec<String>,
    pub source_map_base_path: Option<PathBuf>,
    pub savepoint_container: Option<String>,
    pub trace_root: PathBuf,
    pub log_tail_lines: usize,
    pub container_cli: String,
    pub node_bin: String,
    pub playwright_dir: PathBuf,
}

impl Default for GlassboxConfig {
    fn default() -> Self {
        Self {
            execute_timeout: Some(Duration::from_millis(DEFAULT_EXECUTE_TIMEOUT_MS)),
            collector_max_run: Duration::from_millis(DEFAULT_COLLECTOR_MAX_RUN_MS),
            truncate_body_chars: DEFAULT_TRUNCATE_CHARS,
            run_store_capacity: DEFAULT_RUN_STORE_CAPACITY,
            backend_log_levels: default_backend_log_levels(),
            source_map_base_path: None,
            savepoint_container: None,
            trace_root: std::env::temp_dir().join("glassbox"),
            log_tail_lines: DEFAULT_LOG_TAIL_LINES,
            container_cli: "docker".to_string(),
            node_bin: "node".to_string(),
            playwright_dir: PathBuf::from("."),
        }
    }
}

impl GlassboxConfig {
    /// Directory that receives the trace of one run
    pub fn trace_dir_for(&self, run_id: &shared::RunId) -> PathBuf {
        self.trace_root.join(run_id.as_str())
    }
}

/// Configuration flags shared by every CLI subcommand.
///
/// Each flag also reads a `GLASSBOX_*` environment variable.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Test command timeout in milliseconds (0 disables)
    #[arg(long, env = "GLASSBOX_EXECUTE_TIMEOUT_MS", default_value_t = DEFAULT_EXECUTE_TIMEOUT_MS)]
    pub execute_timeout_ms: u64,

    /// Upper bound on one browser capture window in milliseconds
    #[arg(long, env = "GLASSBOX_COLLECTOR_MAX_RUN_MS", default_value_t = DEFAULT_COLLECTOR_MAX_RUN_MS)]
    pub collector_max_run_ms: u64,

    /// Maximum characters kept from each response body
    #[arg(long, env = "GLASSBOX_TRUNCATE_BODY_CHARS", default_value_t = DEFAULT_TRUNCATE_CHARS as i64, allow_hyphen_values = true)]
    pub truncate_body_chars: i64,

    /// Number of runs kept for later queries
    #[arg(long, env = "GLASSBOX_RUN_STORE_CAPACITY", default_value_t = DEFAULT_RUN_STORE_CAPACITY as i64, allow_hyphen_values = true)]
    pub run_store_capacity: i64,

    /// Comma separated level tokens kept in summaries
    #[arg(long, env = "GLASSBOX_BACKEND_LOG_LEVELS", default_value = "WARN,ERROR")]
    pub backend_log_levels: String,

    /// Directory holding `<artifact>.map` files
    #[arg(long, env = "GLASSBOX_SOURCE_MAP_BASE_PATH")]
    pub source_map_base_path: Option<PathBuf>,

    /// Container whose state savepoints capture
    #[arg(long, env = "GLASSBOX_SAVEPOINT_CONTAINER")]
    pub savepoint_container: Option<String>,

    /// Root directory for recorded traces
    #[arg(long, env = "GLASSBOX_TRACE_ROOT")]
    pub trace_root: Option<PathBuf>,

    /// Tail length requested per container
    #[arg(long, env = "GLASSBOX_LOG_TAIL_LINES", default_value_t = DEFAULT_LOG_TAIL_LINES)]
    pub log_tail_lines: usize,

    /// Container CLI binary
    #[arg(long, env = "GLASSBOX_CONTAINER_CLI", default_value = "docker")]
    pub container_cli: String,

    /// Node binary running the browser sidecar
    #[arg(long, env = "GLASSBOX_NODE_BIN", default_value = "node")]
    pub node_bin: String,

    /// Directory where the `playwright` package is installed
    #[arg(long, env = "GLASSBOX_PLAYWRIGHT_DIR", default_value = ".")]
    pub playwright_dir: PathBuf,
}

impl ConfigArgs {
    pub fn into_config(self) -> Result<GlassboxConfig, SharedError> {
        if self.collector_max_run_ms == 0 {
            return Err(SharedError::InvalidConfig {
                field: "collector_max_run_ms".to_string(),
                value: "0".to_string(),
            });
        }

        let defaults = GlassboxConfig::default();
        let backend_log_levels = LevelSelection::parse_levels(&self.backend_log_levels);

        Ok(GlassboxConfig {
            execute_timeout: (self.execute_timeout_ms > 0)
                .then(|| Duration::from_millis(self.execute_timeout_ms)),
            collector_max_run: Duration::from_millis(self.collector_max_run_ms),
            truncate_body_chars: positive_or(self.truncate_body_chars, DEFAULT_TRUNCATE_CHARS),
            run_store_capacity: positive_or(self.run_store_capacity, DEFAULT_RUN_STORE_CAPACITY),
            backend_log_levels,
            source_map_base_path: self.source_map_base_path,
            savepoint_container: self
                .savepoint_container
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            trace_root: self.trace_root.unwrap_or(defaults.trace_root),
            log_tail_lines: self.log_tail_lines.max(1),
            container_cli: self.container_cli,
            node_bin: self.node_bin,
            playwright_dir: self.playwright_dir,
        })
    }
}

fn positive_or(value: i64, default: usize) -> usize {
    if value > 0 {
        usize::try_from(value).unwrap_or(default)
    } else {
        default
    }
}
