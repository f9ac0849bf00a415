//! Soft delete with scoped visibility.
//!
//! Rows are never physically removed by default. A nullable timestamp column
//! (`published_at` unless configured otherwise) marks a row as unpublished
//! once the reference time reaches it, and every read picks one of four
//! [`Visibility`] modes before it can execute.
//!
//! # Basic Example
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use viewable_db::viewable::{ReferenceClock, VisibilityState};
//!
//! let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
//! let clock = ReferenceClock::fixed(now);
//! assert_eq!(clock.now(), now);
//!
//! assert!(VisibilityState::at(None, now).is_published());
//! assert!(VisibilityState::at(Some(now + Duration::days(1)), now).is_published());
//! assert!(!VisibilityState::at(Some(now - Duration::days(5)), now).is_published());
//! ```
//!
//! # Quick Start with `SeaORM`
//!
//! ```rust,ignore
//! use sea_orm::entity::prelude::*;
//! use viewable_db::{Viewable, ViewableConn, Visibility, NoHooks};
//!
//! #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Viewable)]
//! #[sea_orm(table_name = "widgets")]
//! #[viewable]
//! pub struct Model {
//!     #[sea_orm(primary_key)]
//!     pub id: i32,
//!     pub title: String,
//!     pub published_at: Option<DateTimeUtc>,
//! }
//!
//! let db = ViewableConn::new(conn);
//! let w = db.find_by_id::<Entity, _>(Visibility::Default, 1).await?;
//! db.soft_delete(w, &NoHooks).await?;
//!
//! assert_eq!(db.count::<Entity>(Visibility::Default).await?, 0);
//! assert_eq!(db.count::<Entity>(Visibility::OnlyUnpublished).await?, 1);
//! ```
//!
//! # Modes
//!
//! | Mode | Predicate |
//! |------|-----------|
//! | `Default` | `col IS NULL OR col > now` |
//! | `WithPublished` | none |
//! | `OnlyPublished`, `OnlyUnpublished` | `col IS NOT NULL AND col <= now` |
//!
//! Entities declared `#[viewable(disabled)]` get no predicate in any mode.

mod association;
mod clock;
mod cond;
mod db_ops;
mod entity_traits;
mod error;
mod hooks;
mod runner;
mod scope;
mod select;
mod viewable_conn;

// Core types
pub use entity_traits::{VisibilityDescriptor, VisibilityState, ViewableEntity, ViewableModelExt};
pub use error::ViewableError;

// Reference time
pub use clock::{
    ReferenceClock, ReferenceTimeGuard, TimezonePolicy, current_override, override_reference_time,
};

// Predicates and ambient scope
pub use cond::{published, published_condition, unpublished, unpublished_condition};
pub use scope::{QueryScope, compose};

// Connection facade
pub use viewable_conn::{ViewableConn, ViewableTx};

#[doc(hidden)]
pub use runner::DBRunner;

pub(crate) use runner::{DBRunnerInternal, SeaOrmRunner};

// Select operations
pub use select::{
    Calculation, ExistsTarget, Resolved, Unresolved, ViewableSelect, ViewableSelectExt, Visibility,
};

// Lifecycle
pub use db_ops::{
    RecoverAssociation, RecoveryReport, SoftDeleted, bulk_hard_delete, bulk_soft_delete,
    hard_delete, recover, recover_with_associations, soft_delete,
};
pub use hooks::{DeleteHooks, HookOutcome, NoHooks};

// Associations
pub use association::{
    AssociationKind, AssociationReflection, BelongsTo, HasMany, HasManyThrough,
};

pub use viewable_db_macros::Viewable;
