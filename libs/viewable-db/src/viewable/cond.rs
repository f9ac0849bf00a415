use sea_orm::{
    ColumnTrait, Condition, EntityTrait, Value,
    sea_query::{Expr, IntoIden},
};

use crate::viewable::{ReferenceClock, ViewableEntity};

/// Rows visible at `now`: `table.column IS NULL OR table.column > now`.
///
/// A stamp strictly after `now` is a scheduled unpublish, so the row is still
/// published. Always rendered as a parenthesised `OR` group so it can be
/// `AND`-ed with other clauses without distributing.
pub fn published<T, C>(table: T, column: C, now: Value) -> Condition
where
    T: IntoIden,
    C: IntoIden,
{
    let table = table.into_iden();
    let column = column.into_iden();
    Condition::any()
        .add(Expr::col((table.clone(), column.clone())).is_null())
        .add(Expr::col((table, column)).gt(now))
}

/// Exact complement of [`published`]: `table.column IS NOT NULL AND table.column <= now`.
pub fn unpublished<T, C>(table: T, column: C, now: Value) -> Condition
where
    T: IntoIden,
    C: IntoIden,
{
    let table = table.into_iden();
    let column = column.into_iden();
    Condition::all()
        .add(Expr::col((table.clone(), column.clone())).is_not_null())
        .add(Expr::col((table, column)).lte(now))
}

/// [`published`] for an entity's own table, or `None` when the entity has no
/// visibility column.
#[must_use]
pub fn published_condition<E>(clock: &ReferenceClock) -> Option<Condition>
where
    E: ViewableEntity,
{
    let col = E::published_col()?;
    let now = clock.now_value(col.def().get_column_type());
    Some(published(E::default(), col, now))
}

/// [`unpublished`] for an entity's own table, or `None` when the entity has no
/// visibility column.
#[must_use]
pub fn unpublished_condition<E>(clock: &ReferenceClock) -> Option<Condition>
where
    E: ViewableEntity,
{
    let col = E::published_col()?;
    let now = clock.now_value(col.def().get_column_type());
    Some(unpublished(E::default(), col, now))
}

/// Primary-key equality on the entity's own table.
pub(crate) fn primary_key_eq<E>(id: Value) -> Condition
where
    E: ViewableEntity + EntityTrait,
{
    Condition::all().add(Expr::col((E::default(), E::primary_col())).eq(id))
}

/// Primary-key membership on the entity's own table.
pub(crate) fn primary_key_in<E>(ids: Vec<Value>) -> Condition
where
    E: ViewableEntity + EntityTrait,
{
    Condition::all().add(Expr::col((E::default(), E::primary_col())).is_in(ids))
}
