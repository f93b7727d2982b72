//! Store configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default timeout applied to queries issued without an explicit one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default query-cache budget in cells (roughly 100 MB of cached results).
pub const DEFAULT_CACHE_BUDGET_CELLS: usize = 1_000_000;

/// Configuration for a [`SemanticCore`](crate::core::SemanticCore).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Local namespace (`lns`), typically derived from the wiki's base URL.
    pub local_namespace: String,
    /// Base namespace (`ns`) for the ontology itself.
    pub base_namespace: String,
    /// Timeout for queries issued through the default-parameter surface.
    pub default_timeout: Duration,
    /// Query-cache budget, counted in result cells.
    pub cache_budget_cells: usize,
    /// Worker pool size; `None` means 1.5 × available parallelism + 1.
    pub worker_threads: Option<usize>,
    /// Data directory for a persistent backend. `None` for memory-only mode.
    pub data_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            local_namespace: "http://semcore.local/wiki#".into(),
            base_namespace: "http://semcore.local/ontology#".into(),
            default_timeout: DEFAULT_TIMEOUT,
            cache_budget_cells: DEFAULT_CACHE_BUDGET_CELLS,
            worker_threads: None,
            data_dir: None,
        }
    }
}
