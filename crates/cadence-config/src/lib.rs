//! Cadence configuration system
//!
//! This crate provides centralized configuration for the Cadence timing engine,
//! loading settings from `cadence.toml` with environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default file name looked up by [`EngineConfig::load_or_default`].
pub const CONFIG_FILE_NAME: &str = "cadence.toml";

/// Main configuration structure for the timing engine
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Clock and error-policy settings
    pub timing: TimingConfig,
    /// Compositor mirror settings
    pub compositor: CompositorConfig,
    /// Headless demo runner settings
    pub demo: DemoConfig,
}

/// Timing engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Abort instead of reporting illegal mutations and resolution failures
    pub fail_fast: bool,
    /// Let opted-in dependent animations tick on the UI thread
    pub allow_dependent_animations: bool,
    /// Slack (seconds) applied when comparing parent time against expiration
    pub time_tolerance_secs: f64,
    /// Progress distance from an iteration boundary that snaps to the boundary on expiry
    pub boundary_snap: f64,
}

/// Compositor mirror configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Mirror independent animations onto the compositor
    pub enabled: bool,
    /// Shortest duration (seconds) the compositor accepts
    pub minimum_duration_secs: f64,
    /// Longest duration, begin time or repeat span (seconds) the compositor accepts
    pub maximum_time_secs: f64,
}

/// Demo runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Simulated frame rate
    pub frames_per_second: u32,
    /// Simulated wall-clock span in seconds
    pub run_seconds: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            allow_dependent_animations: true,
            time_tolerance_secs: 0.0005, // half a millisecond
            boundary_snap: 0.001,
        }
    }
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            minimum_duration_secs: 0.001,
            maximum_time_secs: 24.0 * 24.0 * 60.0 * 60.0,
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            frames_per_second: 60,
            run_seconds: 2.0,
        }
    }
}

fn parse_flag(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}

impl EngineConfig {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the cadence.toml configuration file
    ///
    /// # Returns
    /// * `Ok(EngineConfig)` - Successfully loaded configuration
    /// * `Err(String)` - Error message if loading failed
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Load configuration from the default location (cadence.toml in the current directory)
    /// or return default configuration if file doesn't exist
    pub fn load_or_default() -> Self {
        Self::load_from_file(CONFIG_FILE_NAME).unwrap_or_default()
    }

    /// Merge configuration with environment variables
    ///
    /// Environment variables take precedence over configuration file values.
    pub fn merge_with_env(&mut self) {
        // Timing settings
        if let Ok(val) = std::env::var("CADENCE_FAIL_FAST") {
            self.timing.fail_fast = parse_flag(&val);
        }
        if let Ok(val) = std::env::var("CADENCE_ALLOW_DEPENDENT_ANIMATIONS") {
            self.timing.allow_dependent_animations = parse_flag(&val);
        }

        // Compositor settings
        if let Ok(val) = std::env::var("CADENCE_COMPOSITOR") {
            self.compositor.enabled = parse_flag(&val);
        }

        // Demo settings
        if let Ok(val) = std::env::var("CADENCE_DEMO_FPS") {
            if let Ok(fps) = val.parse::<u32>() {
                self.demo.frames_per_second = fps.max(1);
            }
        }
        if let Ok(val) = std::env::var("CADENCE_DEMO_SECONDS") {
            if let Ok(secs) = val.parse::<f64>() {
                self.demo.run_seconds = secs;
            }
        }
    }

    /// Load configuration with environment variable overrides
    ///
    /// 1. Load from cadence.toml (or use defaults if not found)
    /// 2. Override with environment variables if present
    pub fn load() -> Self {
        let mut config = Self::load_or_default();
        config.merge_with_env();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(!config.timing.fail_fast);
        assert!(config.timing.allow_dependent_animations);
        assert_eq!(config.timing.time_tolerance_secs, 0.0005);
        assert!(config.compositor.enabled);
        assert_eq!(config.compositor.maximum_time_secs, 2_073_600.0);
    }

    #[test]
    fn test_toml_serialization() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: EngineConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.timing.boundary_snap, 0.001);
        assert_eq!(parsed.demo.frames_per_second, 60);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[timing]\nfail_fast = true\n").unwrap();

        let config = EngineConfig::load_from_file(file.path()).unwrap();
        assert!(config.timing.fail_fast);
        assert!(config.timing.allow_dependent_animations);
        assert!(config.compositor.enabled);
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = EngineConfig::load_from_file("/definitely/not/here/cadence.toml").unwrap_err();
        assert!(err.starts_with("Failed to read config file"));
    }

    #[test]
    fn test_malformed_file() {
        let err = EngineConfig::from_toml_str("[timing\nfail_fast = ").unwrap_err();
        assert!(err.starts_with("Failed to parse config file"));
    }

    #[test]
    fn test_merge_with_env() {
        unsafe {
            std::env::set_var("CADENCE_FAIL_FAST", "1");
            std::env::set_var("CADENCE_COMPOSITOR", "false");
            std::env::set_var("CADENCE_DEMO_FPS", "30");
        }

        let mut config = EngineConfig::default();
        config.merge_with_env();

        assert!(config.timing.fail_fast);
        assert!(!config.compositor.enabled);
        assert_eq!(config.demo.frames_per_second, 30);

        unsafe {
            std::env::remove_var("CADENCE_FAIL_FAST");
            std::env::remove_var("CADENCE_COMPOSITOR");
            std::env::remove_var("CADENCE_DEMO_FPS");
        }
    }
}
