//! Runtime configuration for the dispatch binary.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Environment variable naming the directory for persisted state.
pub const DATA_DIR_VAR: &str = "DISPATCH_DATA_DIR";

/// Environment variable overriding the pacing unit, in milliseconds.
pub const PACING_MS_VAR: &str = "DISPATCH_PACING_MS";

/// Configuration parameters for the dispatcher and transfer runner.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    /// Base delay between passenger moves.
    pub pacing_unit: Duration,

    /// Fewest pacing units to wait between moves.
    pub min_pacing_units: f64,

    /// Most pacing units to wait between moves.
    pub max_pacing_units: f64,

    /// Where routes and pools are saved. Nothing is persisted when unset.
    pub data_dir: Option<PathBuf>,
}

impl DispatchConfig {
    /// Read overrides from the environment on top of the defaults.
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(dir) = lookup(DATA_DIR_VAR).filter(|d| !d.is_empty()) {
            config.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = lookup(PACING_MS_VAR) {
            match raw.parse::<u64>() {
                Ok(ms) => config.pacing_unit = Duration::from_millis(ms),
                Err(e) => warn!(value = %raw, error = %e, "Ignoring invalid {PACING_MS_VAR}"),
            }
        }
        config
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            pacing_unit: Duration::from_secs(1),
            min_pacing_units: 1.0,
            max_pacing_units: 2.0,
            data_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config() {
        let config = DispatchConfig::default();

        assert_eq!(config.pacing_unit, Duration::from_secs(1));
        assert_eq!(config.min_pacing_units, 1.0);
        assert_eq!(config.max_pacing_units, 2.0);
        assert_eq!(config.data_dir, None);
    }

    #[test]
    fn environment_overrides() {
        let env: HashMap<&str, &str> = [(DATA_DIR_VAR, "/var/lib/dispatch"), (PACING_MS_VAR, "250")]
            .into_iter()
            .collect();
        let config = DispatchConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/dispatch")));
        assert_eq!(config.pacing_unit, Duration::from_millis(250));
    }

    #[test]
    fn invalid_pacing_keeps_default() {
        let config =
            DispatchConfig::from_lookup(|k| (k == PACING_MS_VAR).then(|| "soon".to_string()));
        assert_eq!(config.pacing_unit, Duration::from_secs(1));
    }
}
