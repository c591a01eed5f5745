//! Configuration module for Seo-Sweep
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section has defaults, so a file may contain only the keys it changes.
//!
//! # Example
//!
//! ```no_run
//! use seo_sweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("seo-sweep.toml")).unwrap();
//! println!("Max attempts per audit: {}", config.job.max_attempts);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AuditConfig, ClientEntry, Config, FetcherConfig, JobConfig, OutputConfig, TierSetting,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
