use std::env;
use std::time::Duration;

/// Runtime knobs for play sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayConfig {
    /// Saved progress older than this is discarded instead of resumed.
    pub progress_ttl: chrono::Duration,
    /// Pause between the answer that costs the last life and the game-over screen.
    pub game_over_delay: Duration,
    /// Length of one countdown second. Shorter values are only useful in demos.
    pub tick_interval: Duration,
}

pub const DEFAULT_PROGRESS_TTL_HOURS: i64 = 24;
pub const DEFAULT_GAME_OVER_DELAY_MS: u64 = 1_500;
pub const DEFAULT_TICK_MILLIS: u64 = 1_000;

impl Default for PlayConfig {
    fn default() -> Self {
        Self {
            progress_ttl: chrono::Duration::hours(DEFAULT_PROGRESS_TTL_HOURS),
            game_over_delay: Duration::from_millis(DEFAULT_GAME_OVER_DELAY_MS),
            tick_interval: Duration::from_millis(DEFAULT_TICK_MILLIS),
        }
    }
}

impl PlayConfig {
    /// Reads `QUEST_PROGRESS_TTL_HOURS`, `QUEST_GAME_OVER_DELAY_MS` and
    /// `QUEST_TICK_MILLIS`, keeping the default for anything unset or invalid.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let positive = |name: &str| -> Option<u64> {
            let raw = lookup(name)?;
            match raw.trim().parse::<u64>() {
                Ok(value) if value > 0 => Some(value),
                _ => {
                    tracing::warn!(%name, %raw, "ignoring invalid setting");
                    None
                }
            }
        };

        let progress_ttl = positive("QUEST_PROGRESS_TTL_HOURS")
            .and_then(|hours| i64::try_from(hours).ok())
            .and_then(chrono::Duration::try_hours)
            .unwrap_or(defaults.progress_ttl);
        let game_over_delay = positive("QUEST_GAME_OVER_DELAY_MS")
            .map_or(defaults.game_over_delay, Duration::from_millis);
        let tick_interval =
            positive("QUEST_TICK_MILLIS").map_or(defaults.tick_interval, Duration::from_millis);

        Self {
            progress_ttl,
            game_over_delay,
            tick_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn unset_variables_keep_defaults() {
        assert_eq!(PlayConfig::from_lookup(lookup(&[])), PlayConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = PlayConfig::from_lookup(lookup(&[
            ("QUEST_PROGRESS_TTL_HOURS", "48"),
            ("QUEST_GAME_OVER_DELAY_MS", "10"),
            ("QUEST_TICK_MILLIS", " 250 "),
        ]));
        assert_eq!(cfg.progress_ttl, chrono::Duration::hours(48));
        assert_eq!(cfg.game_over_delay, Duration::from_millis(10));
        assert_eq!(cfg.tick_interval, Duration::from_millis(250));
    }

    #[test]
    fn zero_and_garbage_fall_back() {
        let cfg = PlayConfig::from_lookup(lookup(&[
            ("QUEST_PROGRESS_TTL_HOURS", "0"),
            ("QUEST_TICK_MILLIS", "fast"),
        ]));
        assert_eq!(cfg, PlayConfig::default());
    }
}
