//! Reference time used to evaluate visibility.
//!
//! Resolution order for "now": the clock's own `as_of`, then the process-wide
//! override installed by [`override_reference_time`], then the wall clock.
//! The value is read each time a predicate or a delete mutation is built and
//! is never stored on records.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use parking_lot::RwLock;
use sea_orm::{ColumnType, Value};
use serde::{Deserialize, Serialize};

/// Installed overrides, oldest first, keyed by guard id. The newest one wins.
static REFERENCE_OVERRIDES: RwLock<Vec<(u64, DateTime<Utc>)>> =
    parking_lot::const_rwlock(Vec::new());
static NEXT_GUARD_ID: AtomicU64 = AtomicU64::new(0);

/// How naive (zone-less) timestamp columns are interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimezonePolicy {
    #[default]
    Utc,
    Local,
}

/// Source of the reference time for visibility checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceClock {
    as_of: Option<DateTime<Utc>>,
    timezone: TimezonePolicy,
}

impl ReferenceClock {
    /// Wall clock (or the process-wide override when one is installed).
    #[must_use]
    pub fn system() -> Self {
        Self::default()
    }

    /// A clock pinned to `at`; ignores the process-wide override.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self {
            as_of: Some(at),
            timezone: TimezonePolicy::Utc,
        }
    }

    #[must_use]
    pub fn with_timezone(mut self, timezone: TimezonePolicy) -> Self {
        self.timezone = timezone;
        self
    }

    #[must_use]
    pub fn with_as_of(mut self, at: DateTime<Utc>) -> Self {
        self.as_of = Some(at);
        self
    }

    #[must_use]
    pub fn as_of(&self) -> Option<DateTime<Utc>> {
        self.as_of
    }

    #[must_use]
    pub fn timezone(&self) -> TimezonePolicy {
        self.timezone
    }

    /// Resolve the reference time.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.as_of
            .or_else(current_override)
            .unwrap_or_else(Utc::now)
    }

    /// Bind `at` as a value of the column's declared type.
    ///
    /// Timezone-aware columns get a UTC instant; naive date-times and dates
    /// are rendered in the configured [`TimezonePolicy`].
    #[must_use]
    pub fn value_for(&self, column_type: &ColumnType, at: DateTime<Utc>) -> Value {
        match column_type {
            ColumnType::DateTime | ColumnType::Timestamp => self.naive(at).into(),
            ColumnType::Date => self.naive(at).date().into(),
            _ => at.into(),
        }
    }

    /// [`value_for`](Self::value_for) applied to [`now`](Self::now).
    #[must_use]
    pub fn now_value(&self, column_type: &ColumnType) -> Value {
        self.value_for(column_type, self.now())
    }

    /// A typed NULL for the column, used when clearing the visibility column.
    #[must_use]
    pub fn null_value(column_type: &ColumnType) -> Value {
        match column_type {
            ColumnType::DateTime | ColumnType::Timestamp => Option::<NaiveDateTime>::None.into(),
            ColumnType::Date => Option::<NaiveDate>::None.into(),
            _ => Option::<DateTime<Utc>>::None.into(),
        }
    }

    /// Read a stored visibility value back as an instant.
    ///
    /// Returns `None` for NULL and for values that are not date/time typed.
    #[must_use]
    pub fn read_value(&self, value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::ChronoDateTimeUtc(Some(v)) => Some(**v),
            Value::ChronoDateTimeWithTimeZone(Some(v)) => Some(v.with_timezone(&Utc)),
            Value::ChronoDateTimeLocal(Some(v)) => Some(v.with_timezone(&Utc)),
            Value::ChronoDateTime(Some(v)) => self.localize(**v),
            Value::ChronoDate(Some(d)) => self.localize(d.and_time(chrono::NaiveTime::MIN)),
            _ => None,
        }
    }

    fn naive(&self, at: DateTime<Utc>) -> NaiveDateTime {
        match self.timezone {
            TimezonePolicy::Utc => at.naive_utc(),
            TimezonePolicy::Local => at.with_timezone(&Local).naive_local(),
        }
    }

    fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self.timezone {
            TimezonePolicy::Utc => Some(naive.and_utc()),
            TimezonePolicy::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|t| t.with_timezone(&Utc)),
        }
    }
}

/// The process-wide override, if one is installed.
#[must_use]
pub fn current_override() -> Option<DateTime<Utc>> {
    REFERENCE_OVERRIDES.read().last().map(|(_, at)| *at)
}

/// Pin the reference time process-wide until the returned guard is dropped.
///
/// Guards nest: the newest live override is the current one. Dropping a
/// guard removes only its own override, in any order, so once every guard
/// is gone no override remains. Overrides from concurrent tasks are still
/// last-writer-wins while they overlap; prefer [`ReferenceClock::fixed`]
/// when a single operation needs a pinned time.
#[must_use = "the override is removed when the guard is dropped"]
pub fn override_reference_time(at: DateTime<Utc>) -> ReferenceTimeGuard {
    let id = NEXT_GUARD_ID.fetch_add(1, Ordering::Relaxed);
    REFERENCE_OVERRIDES.write().push((id, at));
    tracing::debug!(reference_time = %at, "reference time override installed");
    ReferenceTimeGuard { id }
}

/// Removes its reference-time override when dropped.
#[derive(Debug)]
pub struct ReferenceTimeGuard {
    id: u64,
}

impl Drop for ReferenceTimeGuard {
    fn drop(&mut self) {
        REFERENCE_OVERRIDES.write().retain(|(id, _)| *id != self.id);
    }
}
