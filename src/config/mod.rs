//! Configuration module for Novel-Trail
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and validating the per-run parameters handed in by the caller.
//!
//! # Example
//!
//! ```no_run
//! use novel_trail::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("novel-trail.toml")).unwrap();
//! println!("Chapter files end in .{}", config.output.extension);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, OutputConfig, RunParams, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate_run_params;
