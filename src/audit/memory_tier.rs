//! Memory-tier sizing policy
//!
//! The tier is chosen once when an audit starts, from the memory available
//! at that moment, and fixes the discovery and analysis limits for the whole
//! run.

use crate::config::{AuditConfig, TierSetting};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

const GIB: u64 = 1024 * 1024 * 1024;

/// Sizing tier derived from available system memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryTier {
    /// Less than 1 GiB available
    Low,
    /// 1 GiB up to 4 GiB available
    Medium,
    /// 4 GiB or more available
    High,
}

impl MemoryTier {
    /// Classifies an amount of available memory in bytes
    pub fn from_available_bytes(bytes: u64) -> Self {
        if bytes < GIB {
            Self::Low
        } else if bytes < 4 * GIB {
            Self::Medium
        } else {
            Self::High
        }
    }

    /// Detects the tier of the current machine
    ///
    /// Falls back to `Medium` when available memory cannot be read.
    pub fn detect() -> Self {
        match available_memory_bytes() {
            Some(bytes) => {
                let tier = Self::from_available_bytes(bytes);
                debug!(available_mib = bytes / (1024 * 1024), tier = %tier, "Detected memory tier");
                tier
            }
            None => Self::Medium,
        }
    }

    /// Resolves a configured tier setting, detecting when set to `auto`
    pub fn resolve(setting: TierSetting) -> Self {
        match setting {
            TierSetting::Auto => Self::detect(),
            TierSetting::Low => Self::Low,
            TierSetting::Medium => Self::Medium,
            TierSetting::High => Self::High,
        }
    }

    /// The default limits of this tier
    pub fn policy(&self) -> TierPolicy {
        match self {
            Self::Low => TierPolicy {
                tier: *self,
                max_discovery: 50,
                max_analysis: 25,
                batch_size: 5,
                parallel_batches: 2,
                group_delay: Duration::from_secs(3),
                discovery_delay: Duration::from_secs(1),
                deep_analysis: false,
            },
            Self::Medium => TierPolicy {
                tier: *self,
                max_discovery: 150,
                max_analysis: 75,
                batch_size: 10,
                parallel_batches: 3,
                group_delay: Duration::from_secs(2),
                discovery_delay: Duration::from_millis(500),
                deep_analysis: true,
            },
            Self::High => TierPolicy {
                tier: *self,
                max_discovery: 300,
                max_analysis: 150,
                batch_size: 10,
                parallel_batches: 3,
                group_delay: Duration::from_secs(2),
                discovery_delay: Duration::from_millis(500),
                deep_analysis: true,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for MemoryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Limits fixed for one audit run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierPolicy {
    pub tier: MemoryTier,
    /// Maximum pages discovered
    pub max_discovery: usize,
    /// Maximum pages analyzed
    pub max_analysis: usize,
    /// Pages per analysis batch
    pub batch_size: usize,
    /// Batches run concurrently per group
    pub parallel_batches: usize,
    /// Pause between analysis groups
    #[serde(with = "duration_ms")]
    pub group_delay: Duration,
    /// Pause between discovery batches
    #[serde(with = "duration_ms")]
    pub discovery_delay: Duration,
    /// Whether link-liveness, redirect and broken-link sweeps run
    pub deep_analysis: bool,
}

impl TierPolicy {
    /// Builds the policy for an audit from configuration
    ///
    /// The tier is resolved first, then any explicit overrides in the
    /// `[audit]` section are applied on top of the tier defaults.
    pub fn from_config(config: &AuditConfig) -> Self {
        MemoryTier::resolve(config.memory_tier)
            .policy()
            .with_overrides(config)
    }

    /// Applies configuration overrides to this policy
    pub fn with_overrides(mut self, config: &AuditConfig) -> Self {
        if let Some(size) = config.batch_size {
            self.batch_size = size.max(1);
        }
        if let Some(parallel) = config.parallel_batches {
            self.parallel_batches = parallel.max(1);
        }
        if let Some(ms) = config.group_delay_ms {
            self.group_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = config.discovery_delay_ms {
            self.discovery_delay = Duration::from_millis(ms);
        }
        if let Some(deep) = config.deep_analysis {
            self.deep_analysis = deep;
        }
        self
    }

    /// Clamps a requested page cap to the tier's discovery limit
    pub fn clamp_max_pages(&self, requested: Option<usize>) -> usize {
        match requested {
            Some(n) => n.min(self.max_discovery),
            None => self.max_discovery,
        }
    }

    /// Peak number of concurrent page analyses
    pub fn peak_concurrency(&self) -> usize {
        self.batch_size * self.parallel_batches
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Reads `MemAvailable` from /proc/meminfo
#[cfg(target_os = "linux")]
fn available_memory_bytes() -> Option<u64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    parse_mem_available(&meminfo)
}

#[cfg(not(target_os = "linux"))]
fn available_memory_bytes() -> Option<u64> {
    None
}

/// Extracts `MemAvailable` in bytes from meminfo content
pub fn parse_mem_available(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find(|line| line.starts_with("MemAvailable:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}
