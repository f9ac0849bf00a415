use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, IdenStatic, ModelTrait};

use crate::viewable::clock::ReferenceClock;

/// Contract for entities taking part in the visibility layer.
///
/// An entity opts in by naming a nullable timestamp column. A `NULL` value
/// means the row is published; a timestamp at or before the reference time
/// means it was soft-deleted; a timestamp after the reference time is a
/// scheduled unpublish and the row is still visible.
///
/// # Example (Manual Implementation)
/// ```rust,ignore
/// impl ViewableEntity for widget::Entity {
///     fn published_col() -> Option<Self::Column> {
///         Some(widget::Column::PublishedAt)
///     }
///     fn primary_col() -> Self::Column {
///         widget::Column::Id
///     }
/// }
/// ```
///
/// # Example (Using Derive Macro)
/// ```rust,ignore
/// use viewable_db::Viewable;
///
/// #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Viewable)]
/// #[sea_orm(table_name = "widgets")]
/// #[viewable]
/// pub struct Model {
///     #[sea_orm(primary_key)]
///     pub id: i32,
///     pub title: String,
///     pub published_at: Option<DateTimeUtc>,
/// }
/// ```
///
/// Entities that must be usable as association targets but have no
/// visibility column use `#[viewable(disabled)]`; every rewrite becomes a
/// no-op for them.
pub trait ViewableEntity: EntityTrait {
    /// The visibility column, or `None` when the layer is not enabled.
    fn published_col() -> Option<Self::Column>;

    /// Primary key column used for id lookups and per-record updates.
    fn primary_col() -> Self::Column;

    /// Capability query: does this type carry the visibility layer?
    #[must_use]
    fn supports_visibility() -> bool {
        Self::published_col().is_some()
    }

    /// Runtime reflection of the visibility setup.
    #[must_use]
    fn descriptor() -> VisibilityDescriptor {
        let column = Self::published_col();
        VisibilityDescriptor {
            table: Self::default().table_name().to_owned(),
            primary_key: Self::primary_col().as_str().to_owned(),
            column: column.map(|c| c.as_str().to_owned()),
            column_type: column.map(|c| format!("{:?}", c.def().get_column_type())),
            enabled: column.is_some(),
        }
    }
}

/// What [`ViewableEntity::descriptor`] reports about a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityDescriptor {
    pub table: String,
    pub primary_key: String,
    pub column: Option<String>,
    pub column_type: Option<String>,
    pub enabled: bool,
}

/// Published state of one record at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityState {
    /// Visibility column is `NULL`.
    Published,
    /// Stamped, but the stamp is still ahead of the reference time.
    ScheduledUnpublish(DateTime<Utc>),
    Unpublished(DateTime<Utc>),
}

impl VisibilityState {
    #[must_use]
    pub fn at(stamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        match stamp {
            None => Self::Published,
            Some(at) if at > now => Self::ScheduledUnpublish(at),
            Some(at) => Self::Unpublished(at),
        }
    }

    #[must_use]
    pub fn is_published(self) -> bool {
        !matches!(self, Self::Unpublished(_))
    }
}

/// Record-level visibility queries. Always computed from the current column
/// value; nothing is cached on the model.
pub trait ViewableModelExt: ModelTrait
where
    Self::Entity: ViewableEntity,
{
    /// The stored visibility stamp, read through `clock`'s timezone policy.
    fn published_stamp(&self, clock: &ReferenceClock) -> Option<DateTime<Utc>> {
        <Self::Entity as ViewableEntity>::published_col()
            .and_then(|col| clock.read_value(&self.get(col)))
    }

    fn visibility_state(&self, clock: &ReferenceClock) -> VisibilityState {
        VisibilityState::at(self.published_stamp(clock), clock.now())
    }

    /// State at `now`, reading naive date/time columns as UTC.
    ///
    /// Use [`visibility_state`](Self::visibility_state) with a clock built by
    /// `ReferenceClock::fixed(now).with_timezone(TimezonePolicy::Local)` for
    /// columns stored in local time.
    fn visibility_state_at(&self, now: DateTime<Utc>) -> VisibilityState {
        self.visibility_state(&ReferenceClock::fixed(now))
    }

    /// UTC-only, like [`visibility_state_at`](Self::visibility_state_at).
    fn is_published_at(&self, now: DateTime<Utc>) -> bool {
        self.visibility_state_at(now).is_published()
    }

    /// Published right now (honours a reference-time override).
    fn is_published(&self) -> bool {
        self.visibility_state(&ReferenceClock::system()).is_published()
    }
}

impl<M> ViewableModelExt for M
where
    M: ModelTrait,
    M::Entity: ViewableEntity,
{
}
