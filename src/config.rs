use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub radio: RadioConfig,

    #[serde(default)]
    pub power: PowerConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub clients: ClientsConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load config from default locations or create default
    pub fn load_or_default() -> Result<Self> {
        let paths = [
            PathBuf::from("/etc/wavejack/config.toml"),
            dirs_next::config_dir()
                .map(|p| p.join("wavejack/config.toml"))
                .unwrap_or_default(),
            PathBuf::from("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }
}

/// Radio driver defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioConfig {
    /// Regulatory maximum transmit power in dBm
    #[serde(default = "default_region_max_tx_dbm")]
    pub region_max_tx_dbm: i8,

    /// Channel the radio idles on
    #[serde(default = "default_idle_channel")]
    pub idle_channel: u8,

    /// Monitor-mode delivery queue depth
    #[serde(default = "default_monitor_queue")]
    pub monitor_queue: usize,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            region_max_tx_dbm: default_region_max_tx_dbm(),
            idle_channel: default_idle_channel(),
            monitor_queue: default_monitor_queue(),
        }
    }
}

/// Power policy tiers (see `PowerThrottler`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerConfig {
    #[serde(default = "default_turbo_burst")]
    pub turbo_burst: u32,
    #[serde(default = "default_standard_burst")]
    pub standard_burst: u32,
    #[serde(default = "default_eco_burst")]
    pub eco_burst: u32,

    /// Inter-frame pacing per tier, microseconds
    #[serde(default = "default_turbo_gap_us")]
    pub turbo_gap_us: u64,
    #[serde(default = "default_standard_gap_us")]
    pub standard_gap_us: u64,
    #[serde(default = "default_eco_gap_us")]
    pub eco_gap_us: u64,

    /// Transmit power per tier, dBm
    #[serde(default = "default_turbo_tx_dbm")]
    pub turbo_tx_dbm: i8,
    #[serde(default = "default_standard_tx_dbm")]
    pub standard_tx_dbm: i8,
    #[serde(default = "default_eco_tx_dbm")]
    pub eco_tx_dbm: i8,

    /// Deauth duty cycle
    #[serde(default = "default_duty_on_ms")]
    pub duty_on_ms: u64,
    #[serde(default = "default_duty_off_ms")]
    pub duty_off_ms: u64,

    /// Seconds a capture attack runs at maximum performance before
    /// dropping to the low tier
    #[serde(default = "default_boost_window_secs")]
    pub boost_window_secs: u64,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            turbo_burst: default_turbo_burst(),
            standard_burst: default_standard_burst(),
            eco_burst: default_eco_burst(),
            turbo_gap_us: default_turbo_gap_us(),
            standard_gap_us: default_standard_gap_us(),
            eco_gap_us: default_eco_gap_us(),
            turbo_tx_dbm: default_turbo_tx_dbm(),
            standard_tx_dbm: default_standard_tx_dbm(),
            eco_tx_dbm: default_eco_tx_dbm(),
            duty_on_ms: default_duty_on_ms(),
            duty_off_ms: default_duty_off_ms(),
            boost_window_secs: default_boost_window_secs(),
        }
    }
}

/// Capture buffer sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Total buffer capacity in bytes, headers included
    #[serde(default = "default_capture_capacity")]
    pub capacity: usize,

    /// Usage fraction at which the storage collaborator should drain
    #[serde(default = "default_high_water")]
    pub high_water: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capacity: default_capture_capacity(),
            high_water: default_high_water(),
        }
    }
}

/// Client registry sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientsConfig {
    /// Maximum tracked clients before least-recently-seen eviction
    #[serde(default = "default_client_capacity")]
    pub capacity: usize,
}

impl Default for ClientsConfig {
    fn default() -> Self {
        Self {
            capacity: default_client_capacity(),
        }
    }
}

fn default_region_max_tx_dbm() -> i8 {
    20
}

fn default_idle_channel() -> u8 {
    1
}

fn default_monitor_queue() -> usize {
    256
}

fn default_turbo_burst() -> u32 {
    40
}

fn default_standard_burst() -> u32 {
    10
}

fn default_eco_burst() -> u32 {
    3
}

fn default_turbo_gap_us() -> u64 {
    50
}

fn default_standard_gap_us() -> u64 {
    200
}

fn default_eco_gap_us() -> u64 {
    1000
}

fn default_turbo_tx_dbm() -> i8 {
    20
}

fn default_standard_tx_dbm() -> i8 {
    10
}

fn default_eco_tx_dbm() -> i8 {
    8
}

fn default_duty_on_ms() -> u64 {
    2000
}

fn default_duty_off_ms() -> u64 {
    500
}

fn default_boost_window_secs() -> u64 {
    8
}

fn default_capture_capacity() -> usize {
    64 * 1024
}

fn default_high_water() -> f64 {
    0.75
}

fn default_client_capacity() -> usize {
    32
}
