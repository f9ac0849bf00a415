use std::path::Path;

use chrono::{DateTime, Utc};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::viewable::{ReferenceClock, TimezonePolicy, ViewableError};

/// Environment variable prefix read by [`ViewableConfig::load`].
pub const ENV_PREFIX: &str = "VIEWABLE_";

/// Configuration for the visibility layer.
///
/// ```yaml
/// timezone: local
/// reference_time: 2024-06-01T00:00:00Z
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewableConfig {
    /// How zone-less timestamp columns are read and written.
    pub timezone: TimezonePolicy,
    /// Pin the reference time, e.g. for batch jobs replaying a past instant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_time: Option<DateTime<Utc>>,
}

impl ViewableConfig {
    /// Defaults, then `path` when it exists, then `VIEWABLE_*` variables.
    ///
    /// # Errors
    /// `ViewableError::Config` when a source cannot be parsed or contains an
    /// unknown key.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ViewableError> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(|e| ViewableError::Config(e.to_string()))
    }

    /// The clock this configuration describes.
    #[must_use]
    pub fn clock(&self) -> ReferenceClock {
        let clock = ReferenceClock::system().with_timezone(self.timezone);
        match self.reference_time {
            Some(at) => clock.with_as_of(at),
            None => clock,
        }
    }
}
