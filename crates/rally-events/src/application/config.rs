//! Engine configuration.

use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use rally_core::error::EngineError;
use rally_core::ids::CommunityId;

/// Runtime settings for the engine and its trigger loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Interval between scheduler ticks.
    pub tick_interval: Duration,
    /// Upper bound on every persistence call.
    pub persist_timeout: Duration,
    /// Interval between status announcements of a running event.
    pub status_refresh_interval: Duration,
    /// Offset of the communities' local time from UTC, in minutes. Schedule
    /// windows and daily boundaries use it.
    pub utc_offset_minutes: i32,
    /// Communities the trigger loop serves.
    pub communities: Vec<CommunityId>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            persist_timeout: Duration::from_secs(10),
            status_refresh_interval: Duration::from_secs(300),
            utc_offset_minutes: 0,
            communities: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Reads overrides from `RALLY_*` environment variables on top of the
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Configuration` if a variable is present but
    /// malformed.
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`EngineConfig::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Configuration` if a variable is present but
    /// malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EngineError> {
        let mut config = Self::default();
        if let Some(secs) = seconds(&lookup, "RALLY_TICK_SECONDS")? {
            config.tick_interval = secs;
        }
        if let Some(secs) = seconds(&lookup, "RALLY_PERSIST_TIMEOUT_SECONDS")? {
            config.persist_timeout = secs;
        }
        if let Some(secs) = seconds(&lookup, "RALLY_STATUS_REFRESH_SECONDS")? {
            config.status_refresh_interval = secs;
        }
        if let Some(raw) = lookup("RALLY_UTC_OFFSET_MINUTES") {
            let minutes: i32 = raw.trim().parse().map_err(|e| {
                EngineError::Configuration(format!("RALLY_UTC_OFFSET_MINUTES={raw:?}: {e}"))
            })?;
            if minutes.abs() >= 24 * 60 {
                return Err(EngineError::Configuration(format!(
                    "RALLY_UTC_OFFSET_MINUTES={minutes} is not a valid offset"
                )));
            }
            config.utc_offset_minutes = minutes;
        }
        if let Some(raw) = lookup("RALLY_COMMUNITIES") {
            config.communities = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse().map(CommunityId).map_err(|e| {
                        EngineError::Configuration(format!("RALLY_COMMUNITIES entry {s:?}: {e}"))
                    })
                })
                .collect::<Result<_, _>>()?;
        }
        Ok(config)
    }

    /// The local offset as a chrono type. Out-of-range values fall back to UTC.
    #[must_use]
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<Duration>, EngineError> {
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|e| EngineError::Configuration(format!("{name}={raw:?}: {e}")))?;
    if secs == 0 {
        return Err(EngineError::Configuration(format!(
            "{name} must be greater than zero"
        )));
    }
    Ok(Some(Duration::from_secs(secs)))
}
