#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Soft delete with scoped visibility for `SeaORM` entities.
//!
//! See the [`viewable`] module for the model and examples.

pub mod config;
pub mod viewable;

pub use config::ViewableConfig;
pub use viewable::{
    BelongsTo, Calculation, DBRunner, DeleteHooks, ExistsTarget, HasMany, HasManyThrough,
    HookOutcome, NoHooks, QueryScope, RecoverAssociation, RecoveryReport, ReferenceClock,
    SoftDeleted, TimezonePolicy, Viewable, ViewableConn, ViewableEntity, ViewableError,
    ViewableModelExt, ViewableSelect, ViewableSelectExt, ViewableTx, Visibility,
};
