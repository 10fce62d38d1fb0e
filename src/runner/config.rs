//! Execution limits for a context and the workers it spawns.
//!
//! A [`ContextConfig`] can be built in code or loaded from TOML:
//!
//! ```toml
//! max_loop_iterations = 1000000
//! worker_max_loop_iterations = 0   # 0 means unlimited
//! max_call_depth = 200
//! gc_threshold = 5000
//! max_heap_cells = 0
//! max_workers = 8
//! worker_stack_size = 4194304
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextConfig {
    /// Loop iterations allowed per host entry (`eval`/`call`) on the main context.
    pub max_loop_iterations: Option<u64>,
    /// Loop iterations allowed per script run or message dispatch inside a worker.
    pub worker_max_loop_iterations: Option<u64>,
    pub max_call_depth: usize,
    /// Allocations between collections at safe points.
    pub gc_threshold: usize,
    pub max_heap_cells: Option<usize>,
    /// Live workers one context (or worker) may own at a time.
    pub max_workers: Option<usize>,
    pub worker_stack_size: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            max_loop_iterations: Some(10_000_000),
            worker_max_loop_iterations: Some(10_000_000),
            max_call_depth: 100,
            gc_threshold: 10_000,
            max_heap_cells: None,
            max_workers: Some(64),
            worker_stack_size: 8 * 1024 * 1024,
        }
    }
}

/// On-disk form, where `0` disables an optional limit.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawContextConfig {
    max_loop_iterations: u64,
    worker_max_loop_iterations: u64,
    max_call_depth: usize,
    gc_threshold: usize,
    max_heap_cells: usize,
    max_workers: usize,
    worker_stack_size: usize,
}

impl Default for RawContextConfig {
    fn default() -> Self {
        let defaults = ContextConfig::default();
        RawContextConfig {
            max_loop_iterations: defaults.max_loop_iterations.unwrap_or(0),
            worker_max_loop_iterations: defaults.worker_max_loop_iterations.unwrap_or(0),
            max_call_depth: defaults.max_call_depth,
            gc_threshold: defaults.gc_threshold,
            max_heap_cells: defaults.max_heap_cells.unwrap_or(0),
            max_workers: defaults.max_workers.unwrap_or(0),
            worker_stack_size: defaults.worker_stack_size,
        }
    }
}

fn limit<T: PartialEq + Default>(value: T) -> Option<T> {
    if value == T::default() {
        None
    } else {
        Some(value)
    }
}

impl From<RawContextConfig> for ContextConfig {
    fn from(raw: RawContextConfig) -> Self {
        ContextConfig {
            max_loop_iterations: limit(raw.max_loop_iterations),
            worker_max_loop_iterations: limit(raw.worker_max_loop_iterations),
            max_call_depth: raw.max_call_depth,
            gc_threshold: raw.gc_threshold.max(1),
            max_heap_cells: limit(raw.max_heap_cells),
            max_workers: limit(raw.max_workers),
            worker_stack_size: raw.worker_stack_size,
        }
    }
}

impl ContextConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string. Missing keys keep their defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let raw: RawContextConfig = toml::from_str(content)?;
        Ok(raw.into())
    }

    pub fn with_max_loop_iterations(mut self, limit: Option<u64>) -> Self {
        self.max_loop_iterations = limit;
        self
    }

    pub fn with_worker_max_loop_iterations(mut self, limit: Option<u64>) -> Self {
        self.worker_max_loop_iterations = limit;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_gc_threshold(mut self, threshold: usize) -> Self {
        self.gc_threshold = threshold.max(1);
        self
    }

    pub fn with_max_heap_cells(mut self, limit: Option<usize>) -> Self {
        self.max_heap_cells = limit;
        self
    }

    pub fn with_max_workers(mut self, limit: Option<usize>) -> Self {
        self.max_workers = limit;
        self
    }

    pub fn with_worker_stack_size(mut self, bytes: usize) -> Self {
        self.worker_stack_size = bytes;
        self
    }

    /// The configuration a worker runs under: the worker loop limit replaces the main one.
    pub fn for_worker(&self) -> Self {
        ContextConfig {
            max_loop_iterations: self.worker_max_loop_iterations,
            ..self.clone()
        }
    }
}
