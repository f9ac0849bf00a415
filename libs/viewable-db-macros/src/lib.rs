#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! # viewable-db-macros
//!
//! Procedural macros for the `viewable-db` visibility layer.
//!
//! ## `#[derive(Viewable)]`
//!
//! Implements `ViewableEntity` for a `SeaORM` entity, turning on soft delete
//! and scoped visibility for it.
//!
//! ### Example
//!
//! ```ignore
//! use sea_orm::entity::prelude::*;
//! use viewable_db::Viewable;
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
//! ```
//!
//! ### Attributes
//!
//! - `#[viewable]` - enable with defaults (`published_at`, primary key `id`)
//! - `column = "column_name"` - visibility column (must be an `Option<_>` field)
//! - `primary_key = "column_name"` - key used for per-record updates and id lookups
//! - `disabled` - implement the trait without the layer (plain lookup tables)

use proc_macro::TokenStream;
use proc_macro_error2::proc_macro_error;
use syn::{DeriveInput, parse_macro_input};

mod viewable;

/// Derive macro for implementing `ViewableEntity`.
///
/// Place this on your `SeaORM` Model struct. Without any `#[viewable(...)]`
/// settings the visibility column is `published_at` and the key is `id`.
///
/// Repeating an identical setting is accepted; conflicting settings are a
/// compile error.
///
/// ```ignore
/// #[derive(DeriveEntityModel, Viewable)]
/// #[sea_orm(table_name = "taggings")]
/// #[viewable(column = "hidden_at", primary_key = "tagging_id")]
/// pub struct Model {
///     #[sea_orm(primary_key)]
///     pub tagging_id: i32,
///     pub widget_id: i32,
///     pub tag_id: i32,
///     pub hidden_at: Option<DateTimeUtc>,
/// }
/// ```
///
/// # Entities Without Visibility
///
/// ```ignore
/// #[derive(DeriveEntityModel, Viewable)]
/// #[sea_orm(table_name = "androids")]
/// #[viewable(disabled)]
/// pub struct Model {
///     #[sea_orm(primary_key)]
///     pub id: i32,
///     pub name: String,
/// }
/// ```
#[proc_macro_derive(Viewable, attributes(viewable))]
#[proc_macro_error]
pub fn derive_viewable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    viewable::expand_derive_viewable(input).into()
}
