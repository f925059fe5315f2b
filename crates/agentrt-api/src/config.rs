// Loads the `MEMORY_*` tunables documented in spec.md §6 from the
// environment, the same `env::var(...).ok()`/`.unwrap_or(...)` style
// `everruns-observability::config::ObservabilityConfig::from_env` uses.
// An invalid value for a typed var is logged and the default is kept
// rather than failing startup.

use agentrt_memory::MemoryConfig;
use std::time::Duration;

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "invalid value for env var, using default");
            default
        }),
        Err(_) => default,
    }
}

fn parse_bool_env(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => {
                tracing::warn!(key, value = %raw, "invalid boolean value for env var, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Build the memory subsystem's tunables from `MEMORY_*` environment
/// variables, falling back to spec.md §6's documented defaults for
/// anything unset or unparsable.
pub fn load_memory_config() -> MemoryConfig {
    let defaults = MemoryConfig::default();
    MemoryConfig {
        max_tokens: parse_env("MEMORY_MAX_TOKENS", defaults.max_tokens),
        limit: parse_env("MEMORY_LIMIT", defaults.limit),
        search_threshold: parse_env("MEMORY_SEARCH_THRESHOLD", defaults.search_threshold),
        search_limit: parse_env("MEMORY_SEARCH_LIMIT", defaults.search_limit),
        enable_cache: parse_bool_env("MEMORY_ENABLE_CACHE", defaults.enable_cache),
        cache_size: parse_env("MEMORY_CACHE_SIZE", defaults.cache_size),
        decay_rate: parse_env("MEMORY_DECAY_RATE", defaults.decay_rate),
        importance_threshold: parse_env("MEMORY_IMPORTANCE_THRESHOLD", defaults.importance_threshold),
        auto_consolidation: parse_bool_env("MEMORY_AUTO_CONSOLIDATION", defaults.auto_consolidation),
        consolidation_interval: Duration::from_millis(parse_env(
            "MEMORY_CONSOLIDATION_INTERVAL",
            defaults.consolidation_interval.as_millis() as u64,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both assertions run against process-global env state; kept in one
    // test so they can't interleave with a parallel test mutating the same
    // keys.
    #[test]
    fn defaults_apply_and_invalid_values_fall_back() {
        for key in [
            "MEMORY_MAX_TOKENS",
            "MEMORY_LIMIT",
            "MEMORY_SEARCH_THRESHOLD",
            "MEMORY_SEARCH_LIMIT",
            "MEMORY_ENABLE_CACHE",
            "MEMORY_CACHE_SIZE",
            "MEMORY_DECAY_RATE",
            "MEMORY_IMPORTANCE_THRESHOLD",
            "MEMORY_AUTO_CONSOLIDATION",
            "MEMORY_CONSOLIDATION_INTERVAL",
        ] {
            std::env::remove_var(key);
        }

        let config = load_memory_config();
        assert_eq!(config.max_tokens, 8_000);
        assert_eq!(config.limit, 1_000);
        assert!((config.search_threshold - 0.7).abs() < 1e-6);
        assert_eq!(config.search_limit, 10);
        assert!(config.enable_cache);
        assert_eq!(config.cache_size, 1_024);
        assert!((config.importance_threshold - 0.3).abs() < 1e-6);
        assert!(config.auto_consolidation);

        std::env::set_var("MEMORY_MAX_TOKENS", "not-a-number");
        std::env::set_var("MEMORY_ENABLE_CACHE", "not-a-bool");
        let config = load_memory_config();
        assert_eq!(config.max_tokens, MemoryConfig::default().max_tokens);
        assert_eq!(config.enable_cache, MemoryConfig::default().enable_cache);

        std::env::remove_var("MEMORY_MAX_TOKENS");
        std::env::remove_var("MEMORY_ENABLE_CACHE");
    }
}
