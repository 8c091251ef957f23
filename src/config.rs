//! Configuration types for znode-harvester
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - The traversal failure policy

use crate::error::{ConfigError, ConfigResult};
use crate::store::NodePath;
use clap::Parser;
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;

/// Maximum reasonable worker pool size
const MAX_POOL_SIZE: usize = 512;

/// Minimum result queue size
const MIN_QUEUE_SIZE: usize = 100;

/// Concurrent tree harvester for hierarchical key/value stores
#[derive(Parser, Debug, Clone)]
#[command(
    name = "znode-harvester",
    version,
    about = "Concurrently traverses a hierarchical key/value tree and collects leaf data",
    long_about = "Traverses a hierarchical key/value tree (fixture-backed) with a bounded \
                  worker pool and collects every leaf payload reachable from the given roots.\n\n\
                  Failed branches are pruned by default; use --on-error abort to fail the \
                  whole traversal on the first error instead.",
    after_help = "EXAMPLES:\n    \
        znode-harvester tree.json\n    \
        znode-harvester tree.json --root /config --root /services -w 16\n    \
        znode-harvester tree.json --on-error abort --deadline 60\n    \
        znode-harvester tree.json --exclude '\\.lock$' -o leaves.json"
)]
pub struct CliArgs {
    /// JSON fixture describing the tree to traverse
    #[arg(value_name = "FIXTURE")]
    pub fixture: PathBuf,

    /// Root path to seed the traversal with (can be repeated; default "/")
    #[arg(long = "root", value_name = "PATH", action = clap::ArgAction::Append)]
    pub roots: Vec<String>,

    /// Number of concurrent resolution workers
    #[arg(
        short = 'w',
        long,
        default_value_t = default_pool_size(),
        value_name = "NUM"
    )]
    pub workers: usize,

    /// Result queue size (controls buffering between workers and aggregator)
    #[arg(long, default_value = "10000", value_name = "NUM")]
    pub queue_size: usize,

    /// Per-call timeout in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    pub call_timeout: u64,

    /// Overall traversal deadline in seconds (unlimited if not set)
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<u64>,

    /// What to do when a single resolution fails
    #[arg(long = "on-error", value_enum, default_value_t = FailurePolicy::Prune)]
    pub failure_policy: FailurePolicy,

    /// Maximum traversal depth below the roots (unlimited if not set)
    #[arg(short = 'd', long, value_name = "NUM")]
    pub max_depth: Option<u32>,

    /// Exclude paths matching pattern (can be repeated)
    #[arg(long = "exclude", value_name = "PATTERN", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Write collected leaf values to a JSON file
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (show pruned branches and timings)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Parse and validate the initial path set
    pub fn initial_paths(&self) -> ConfigResult<Vec<NodePath>> {
        if self.roots.is_empty() {
            return Ok(vec![NodePath::root()]);
        }
        self.roots
            .iter()
            .map(|raw| {
                if raw.starts_with('/') {
                    Ok(NodePath::new(raw.as_str()))
                } else {
                    Err(ConfigError::InvalidRootPath { path: raw.clone() })
                }
            })
            .collect()
    }
}

/// What the aggregator does with a failed resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FailurePolicy {
    /// Treat the failure as an empty child list: the branch terminates
    /// silently without contributing data or aborting siblings
    #[default]
    Prune,

    /// Abort the entire traversal and surface the failure
    Abort,
}

fn default_pool_size() -> usize {
    // Resolutions are I/O bound, but the aggregator is the single
    // consumer: past a small pool the channel is the bottleneck
    (num_cpus::get() * 2).min(8)
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct TraverseConfig {
    /// Worker pool size (maximum concurrent resolutions)
    pub pool_size: usize,

    /// Result queue capacity
    pub queue_size: usize,

    /// Timeout applied to each remote call
    pub per_call_timeout: Duration,

    /// Optional traversal-wide deadline
    pub overall_timeout: Option<Duration>,

    /// Failure policy for per-call errors
    pub failure_policy: FailurePolicy,

    /// Maximum depth below the seeds
    pub max_depth: Option<u32>,

    /// Compiled exclude patterns
    pub exclude_patterns: Vec<Regex>,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl TraverseConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: &CliArgs) -> ConfigResult<Self> {
        if args.workers == 0 || args.workers > MAX_POOL_SIZE {
            return Err(ConfigError::InvalidPoolSize {
                count: args.workers,
                max: MAX_POOL_SIZE,
            });
        }

        if args.queue_size < MIN_QUEUE_SIZE {
            return Err(ConfigError::InvalidQueueSize {
                size: args.queue_size,
                min: MIN_QUEUE_SIZE,
            });
        }

        if args.call_timeout == 0 {
            return Err(ConfigError::InvalidTimeout {
                name: "call timeout",
                secs: args.call_timeout,
            });
        }

        if args.deadline == Some(0) {
            return Err(ConfigError::InvalidTimeout {
                name: "deadline",
                secs: 0,
            });
        }

        let exclude_patterns = args
            .exclude_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::InvalidExcludePattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self {
            pool_size: args.workers,
            queue_size: args.queue_size,
            per_call_timeout: Duration::from_secs(args.call_timeout),
            overall_timeout: args.deadline.map(Duration::from_secs),
            failure_policy: args.failure_policy,
            max_depth: args.max_depth,
            exclude_patterns,
            show_progress: !args.quiet,
            verbose: args.verbose,
        })
    }

    /// Check if a path should be excluded from traversal
    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclude_patterns.iter().any(|re| re.is_match(path))
    }
}

impl Default for TraverseConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            queue_size: 10_000,
            per_call_timeout: Duration::from_secs(30),
            overall_timeout: None,
            failure_policy: FailurePolicy::Prune,
            max_depth: None,
            exclude_patterns: Vec::new(),
            show_progress: false,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> CliArgs {
        CliArgs::parse_from(["znode-harvester", "tree.json"])
    }

    #[test]
    fn test_default_roots() {
        let args = base_args();
        assert_eq!(args.initial_paths().unwrap(), vec![NodePath::root()]);
    }

    #[test]
    fn test_explicit_roots() {
        let args = CliArgs::parse_from([
            "znode-harvester",
            "tree.json",
            "--root",
            "/config",
            "--root",
            "/services/",
        ]);
        assert_eq!(
            args.initial_paths().unwrap(),
            vec![NodePath::new("/config"), NodePath::new("/services")]
        );
    }

    #[test]
    fn test_relative_root_rejected() {
        let args = CliArgs::parse_from(["znode-harvester", "tree.json", "--root", "config"]);
        assert!(matches!(
            args.initial_paths(),
            Err(ConfigError::InvalidRootPath { .. })
        ));
    }

    #[test]
    fn test_invalid_pool_size() {
        let mut args = base_args();
        args.workers = 0;
        assert!(matches!(
            TraverseConfig::from_args(&args),
            Err(ConfigError::InvalidPoolSize { .. })
        ));

        args.workers = MAX_POOL_SIZE + 1;
        assert!(matches!(
            TraverseConfig::from_args(&args),
            Err(ConfigError::InvalidPoolSize { .. })
        ));
    }

    #[test]
    fn test_invalid_queue_size() {
        let mut args = base_args();
        args.queue_size = 10;
        assert!(matches!(
            TraverseConfig::from_args(&args),
            Err(ConfigError::InvalidQueueSize { .. })
        ));
    }

    #[test]
    fn test_invalid_exclude_pattern() {
        let mut args = base_args();
        args.exclude_patterns = vec!["[unclosed".to_string()];
        assert!(matches!(
            TraverseConfig::from_args(&args),
            Err(ConfigError::InvalidExcludePattern { .. })
        ));
    }

    #[test]
    fn test_failure_policy_parsing() {
        let args =
            CliArgs::parse_from(["znode-harvester", "tree.json", "--on-error", "abort"]);
        let config = TraverseConfig::from_args(&args).unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Abort);

        let config = TraverseConfig::from_args(&base_args()).unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Prune);
    }

    #[test]
    fn test_exclude_matching() {
        let mut args = base_args();
        args.exclude_patterns = vec![r"\.lock$".to_string()];
        let config = TraverseConfig::from_args(&args).unwrap();

        assert!(config.is_excluded("/services/db/.lock"));
        assert!(!config.is_excluded("/services/db/host"));
    }
}
