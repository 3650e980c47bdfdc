//! Context configuration and validation.
//!
//! A context is parameterized by two byte budgets and an evaluation
//! timeout. The soft limit arms the garbage collector; the hard limit
//! cancels a running evaluation. Both are enforced against the byte
//! gauge kept by the allocator, not against OS-level usage.

/// Configuration for one interpreter context.
///
/// Most embedders only touch the four classic knobs (soft limit, hard
/// limit, GC verbosity, timeout); the rest have workable defaults.
///
/// # Examples
///
/// ```rust
/// use slip_core::ContextConfig;
///
/// let config = ContextConfig {
///     soft_limit_bytes: 256 * 1024,
///     hard_limit_bytes: 512 * 1024,
///     timeout_secs: 5,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Soft memory limit in bytes.
    ///
    /// Crossing it latches a warning and makes the next non-forced GC
    /// actually collect. Evaluation continues.
    pub soft_limit_bytes: usize,

    /// Hard memory limit in bytes. Must be greater than the soft limit.
    ///
    /// An allocation that would cross it stalls the worker until the
    /// supervisor cancels the evaluation; with no worker running the
    /// allocation simply fails.
    pub hard_limit_bytes: usize,

    /// Emit GC and soft-limit diagnostics at warn/info level instead of
    /// debug. Exposed to interpreted code as the `mem_verbosity` cvar.
    pub gc_verbose: bool,

    /// Wall-clock evaluation timeout in seconds. `0` disables the
    /// timeout. Exposed to interpreted code as the `thread_timeout`
    /// cvar (read-write).
    pub timeout_secs: u64,

    /// Stack size for the eval worker thread.
    ///
    /// Non-tail recursion in interpreted code consumes this stack; the
    /// default leaves ample headroom above `max_depth`.
    pub worker_stack_bytes: usize,

    /// Maximum non-tail evaluation depth before the evaluator gives up
    /// with an in-language Error value.
    pub max_depth: u32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            // The budgets the original embedding examples shipped with.
            soft_limit_bytes: 768 * 1024,
            hard_limit_bytes: 1024 * 1024,
            gc_verbose: false,
            timeout_secs: 60,
            worker_stack_bytes: 64 * 1024 * 1024,
            max_depth: 10_000,
        }
    }
}

impl ContextConfig {
    /// Build a config from the four classic knobs, keeping defaults for
    /// the rest.
    pub fn new(soft: usize, hard: usize, gc_verbose: bool, timeout_secs: u64) -> Self {
        ContextConfig {
            soft_limit_bytes: soft,
            hard_limit_bytes: hard,
            gc_verbose,
            timeout_secs,
            ..Default::default()
        }
    }

    /// Check that all values are in valid ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.soft_limit_bytes == 0 {
            return Err(ConfigError::InvalidLimit(
                "soft_limit_bytes must be > 0".to_string(),
            ));
        }

        if self.hard_limit_bytes <= self.soft_limit_bytes {
            return Err(ConfigError::InvalidLimit(
                "hard_limit_bytes must exceed soft_limit_bytes".to_string(),
            ));
        }

        if self.worker_stack_bytes < 1024 * 1024 {
            return Err(ConfigError::InvalidWorkerStack(
                "worker_stack_bytes must be at least 1MB".to_string(),
            ));
        }

        if self.max_depth == 0 {
            return Err(ConfigError::InvalidDepth(
                "max_depth must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Build configuration from environment variables.
    ///
    /// Overrides defaults with:
    /// - `SLIP_MEM_SOFT`
    /// - `SLIP_MEM_HARD`
    /// - `SLIP_TIMEOUT`
    /// - `SLIP_GC_VERBOSE`
    /// - `SLIP_MAX_DEPTH`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("SLIP_MEM_SOFT") {
            if let Ok(bytes) = val.parse::<usize>() {
                config.soft_limit_bytes = bytes;
            }
        }

        if let Ok(val) = std::env::var("SLIP_MEM_HARD") {
            if let Ok(bytes) = val.parse::<usize>() {
                config.hard_limit_bytes = bytes;
            }
        }

        if let Ok(val) = std::env::var("SLIP_TIMEOUT") {
            if let Ok(secs) = val.parse::<u64>() {
                config.timeout_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("SLIP_GC_VERBOSE") {
            config.gc_verbose = val == "1" || val.eq_ignore_ascii_case("true");
        }

        if let Ok(val) = std::env::var("SLIP_MAX_DEPTH") {
            if let Ok(depth) = val.parse::<u32>() {
                config.max_depth = depth;
            }
        }

        config
    }
}

/// Error types for configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid memory limit: {0}")]
    InvalidLimit(String),

    #[error("Invalid worker stack size: {0}")]
    InvalidWorkerStack(String),

    #[error("Invalid evaluation depth: {0}")]
    InvalidDepth(String),
}
