//! Soft-delete lifecycle.
//!
//! | Operation | Statement | Hooks | Transaction |
//! |-----------|-----------|-------|-------------|
//! | [`soft_delete`] | `UPDATE .. SET col = now WHERE pk = id` | yes | yes (savepoint when nested) |
//! | [`hard_delete`] | `DELETE .. WHERE pk = id` | no | no |
//! | [`bulk_soft_delete`] | one `UPDATE` over the matching rows | no | no |
//! | [`bulk_hard_delete`] | one `DELETE` over the matching rows | no | no |
//! | [`recover`] | `ActiveModel` update setting `col = NULL` | `before_save` | no |

use std::collections::BTreeMap;
use std::ops::Deref;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, Condition, DeleteMany, EntityName, EntityTrait,
    IntoActiveModel, ModelTrait, QueryFilter, UpdateMany, sea_query::Expr,
};
use tracing::{Span, field::Empty, info, instrument, warn};

use crate::viewable::cond::primary_key_eq;
use crate::viewable::hooks::{DeleteHooks, HookOutcome};
use crate::viewable::runner::begin;
use crate::viewable::{
    DBRunner, DBRunnerInternal, ReferenceClock, SeaOrmRunner, ViewableEntity, ViewableError,
    ViewableModelExt, ViewableTx,
};

/// A model that has just been soft-deleted.
///
/// Only shared access is handed out; the instance reflects the row as
/// stamped and is not meant to be edited further.
#[derive(Debug)]
pub struct SoftDeleted<M>(M);

impl<M> Deref for SoftDeleted<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.0
    }
}

/// Soft-delete one record.
///
/// Opens a transaction (a savepoint when `runner` is already a transaction),
/// runs `before_delete`, stamps the visibility column with the reference time
/// on both the row and the returned model, runs `after_delete` and commits.
///
/// # Errors
/// - `ViewableError::Unsupported` when the entity has no visibility column.
/// - `ViewableError::DeleteAborted` when `before_delete` returns
///   [`HookOutcome::Abort`]; nothing is written.
/// - Any error raised by a hook, or `ViewableError::Db`; the transaction is
///   rolled back.
#[instrument(skip_all, fields(table = Empty))]
pub async fn soft_delete<M, H>(
    runner: &impl DBRunner,
    model: M,
    hooks: &H,
    clock: &ReferenceClock,
) -> Result<SoftDeleted<M>, ViewableError>
where
    M: ModelTrait + Send + Sync,
    M::Entity: ViewableEntity,
    H: DeleteHooks<M> + ?Sized,
{
    let col = <M::Entity as ViewableEntity>::published_col()
        .ok_or_else(ViewableError::unsupported::<M::Entity>)?;
    Span::current().record("table", M::Entity::default().table_name());

    let txn = begin(runner).await?;
    let tx = ViewableTx::new(&txn, *clock);

    let result = stamp(&tx, model, hooks, col).await;
    match result {
        Ok(model) => {
            txn.commit().await?;
            Ok(SoftDeleted(model))
        }
        Err(e) => {
            _ = txn.rollback().await;
            Err(e)
        }
    }
}

async fn stamp<M, H>(
    tx: &ViewableTx<'_>,
    mut model: M,
    hooks: &H,
    col: <M::Entity as EntityTrait>::Column,
) -> Result<M, ViewableError>
where
    M: ModelTrait + Send + Sync,
    M::Entity: ViewableEntity,
    H: DeleteHooks<M> + ?Sized,
{
    if let HookOutcome::Abort(reason) = hooks.before_delete(tx, &model).await? {
        warn!(%reason, "soft delete aborted by before_delete hook");
        return Err(ViewableError::DeleteAborted {
            entity: M::Entity::default().table_name().to_owned(),
            reason,
        });
    }

    let clock = tx.clock();
    let value = clock.now_value(col.def().get_column_type());
    let id = model.get(<M::Entity as ViewableEntity>::primary_col());

    let update = M::Entity::update_many()
        .col_expr(col, Expr::value(value.clone()))
        .filter(primary_key_eq::<M::Entity>(id));
    exec_update(tx, update).await?;
    model.set(col, value);

    hooks.after_delete(tx, &model).await?;
    Ok(model)
}

/// Physically delete one record. No hooks run.
///
/// Works whether or not the entity has a visibility column.
///
/// # Errors
/// Returns `ViewableError::Db` if the statement fails.
#[instrument(skip_all, fields(table = Empty))]
pub async fn hard_delete<M>(runner: &impl DBRunner, model: &M) -> Result<u64, ViewableError>
where
    M: ModelTrait + Sync,
    M::Entity: ViewableEntity,
{
    Span::current().record("table", M::Entity::default().table_name());
    let id = model.get(<M::Entity as ViewableEntity>::primary_col());
    let delete = M::Entity::delete_many().filter(primary_key_eq::<M::Entity>(id));
    exec_delete(runner, delete).await
}

/// Stamp every row matching `conditions` (every row when `None`) with the
/// same reference time in a single statement.
///
/// No hooks run and nothing cascades. Rows that are already stamped are
/// re-stamped.
///
/// # Errors
/// - `ViewableError::Unsupported` when the entity has no visibility column.
/// - `ViewableError::Db` if the statement fails.
#[instrument(skip_all, fields(table = E::default().table_name()))]
pub async fn bulk_soft_delete<E>(
    runner: &impl DBRunner,
    conditions: Option<Condition>,
    clock: &ReferenceClock,
) -> Result<u64, ViewableError>
where
    E: ViewableEntity,
{
    let col = E::published_col().ok_or_else(ViewableError::unsupported::<E>)?;
    let value = clock.now_value(col.def().get_column_type());

    let mut update = E::update_many().col_expr(col, Expr::value(value));
    if let Some(c) = conditions {
        update = update.filter(c);
    }
    let rows = exec_update(runner, update).await?;
    info!(rows, "bulk soft delete");
    Ok(rows)
}

/// Physically delete every row matching `conditions` (every row when `None`)
/// in a single statement. No hooks run.
///
/// # Errors
/// Returns `ViewableError::Db` if the statement fails.
#[instrument(skip_all, fields(table = E::default().table_name()))]
pub async fn bulk_hard_delete<E>(
    runner: &impl DBRunner,
    conditions: Option<Condition>,
) -> Result<u64, ViewableError>
where
    E: ViewableEntity,
{
    let mut delete = E::delete_many();
    if let Some(c) = conditions {
        delete = delete.filter(c);
    }
    let rows = exec_delete(runner, delete).await?;
    info!(rows, "bulk hard delete");
    Ok(rows)
}

/// Clear the visibility column through the `ActiveModel` update path, so
/// `ActiveModelBehavior::before_save` runs.
///
/// # Errors
/// - `ViewableError::Unsupported` when the entity has no visibility column.
/// - `ViewableError::ValidationFailed` when `before_save` returns `DbErr::Custom`.
/// - `ViewableError::Db` for any other failure.
#[instrument(skip_all, fields(table = E::default().table_name()))]
#[allow(clippy::disallowed_methods)]
pub async fn recover<E>(runner: &impl DBRunner, model: E::Model) -> Result<E::Model, ViewableError>
where
    E: ViewableEntity,
    E::Model: IntoActiveModel<E::ActiveModel> + Sync,
    E::ActiveModel: ActiveModelBehavior + Send,
{
    let col = E::published_col().ok_or_else(ViewableError::unsupported::<E>)?;

    let mut am: E::ActiveModel = model.into_active_model();
    am.set(col, ReferenceClock::null_value(col.def().get_column_type()));

    let updated = match DBRunnerInternal::as_seaorm(runner) {
        SeaOrmRunner::Conn(db) => am.update(db).await,
        SeaOrmRunner::Tx(tx) => am.update(tx).await,
    };
    updated.map_err(ViewableError::from_save)
}

/// Records recovered per association by [`recover_with_associations`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    recovered: BTreeMap<String, u64>,
}

impl RecoveryReport {
    /// Records recovered through `association`; zero when it was skipped.
    #[must_use]
    pub fn recovered(&self, association: &str) -> u64 {
        self.recovered.get(association).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.recovered.values().sum()
    }

    fn record(&mut self, association: &str, n: u64) {
        *self.recovered.entry(association.to_owned()).or_default() += n;
    }
}

/// An association [`recover_with_associations`] can cascade through.
///
/// Implemented by [`HasMany`](crate::HasMany) and
/// [`HasManyThrough`](crate::HasManyThrough).
#[async_trait]
pub trait RecoverAssociation<E: EntityTrait>: Send + Sync {
    fn association_name(&self) -> &str;

    /// Recover every stamped related record of `owner`, ignoring visibility
    /// when loading. Returns how many were recovered; zero when the target
    /// type has no visibility column.
    #[doc(hidden)]
    async fn recover_related(
        &self,
        runner: SeaOrmRunner<'_>,
        owner: &E::Model,
        clock: &ReferenceClock,
    ) -> Result<u64, ViewableError>;
}

/// Recover `model`, then every stamped record reachable through each of
/// `associations`.
///
/// The cascade is not transactional; wrap the call in a transaction when
/// all-or-nothing is needed.
///
/// # Errors
/// The first failure is returned unchanged. Records recovered before it stay
/// recovered and are logged at `warn` level.
#[instrument(skip_all, fields(table = E::default().table_name()))]
pub async fn recover_with_associations<E>(
    runner: &impl DBRunner,
    model: E::Model,
    associations: &[&dyn RecoverAssociation<E>],
    clock: &ReferenceClock,
) -> Result<(E::Model, RecoveryReport), ViewableError>
where
    E: ViewableEntity,
    E::Model: IntoActiveModel<E::ActiveModel> + Sync,
    E::ActiveModel: ActiveModelBehavior + Send,
{
    let model = recover::<E>(runner, model).await?;
    let mut report = RecoveryReport::default();

    for assoc in associations {
        match assoc
            .recover_related(runner.as_seaorm(), &model, clock)
            .await
        {
            Ok(n) => report.record(assoc.association_name(), n),
            Err(e) => {
                warn!(
                    association = assoc.association_name(),
                    recovered = report.total(),
                    error = %e,
                    "recover cascade stopped part way"
                );
                return Err(e);
            }
        }
    }
    Ok((model, report))
}

/// Recover each stamped model of `models`. Shared by the association impls.
pub(crate) async fn recover_stamped<R>(
    runner: SeaOrmRunner<'_>,
    models: Vec<R::Model>,
    clock: &ReferenceClock,
) -> Result<u64, ViewableError>
where
    R: ViewableEntity,
    R::Model: IntoActiveModel<R::ActiveModel> + Sync,
    R::ActiveModel: ActiveModelBehavior + Send,
{
    if !R::supports_visibility() {
        return Ok(0);
    }
    let mut n = 0;
    for m in models {
        if m.published_stamp(clock).is_some() {
            recover::<R>(&runner, m).await?;
            n += 1;
        }
    }
    Ok(n)
}

#[allow(clippy::disallowed_methods)]
async fn exec_update<E: EntityTrait>(
    runner: &impl DBRunner,
    update: UpdateMany<E>,
) -> Result<u64, ViewableError> {
    let res = match DBRunnerInternal::as_seaorm(runner) {
        SeaOrmRunner::Conn(db) => update.exec(db).await?,
        SeaOrmRunner::Tx(tx) => update.exec(tx).await?,
    };
    Ok(res.rows_affected)
}

#[allow(clippy::disallowed_methods)]
async fn exec_delete<E: EntityTrait>(
    runner: &impl DBRunner,
    delete: DeleteMany<E>,
) -> Result<u64, ViewableError> {
    let res = match DBRunnerInternal::as_seaorm(runner) {
        SeaOrmRunner::Conn(db) => delete.exec(db).await?,
        SeaOrmRunner::Tx(tx) => delete.exec(tx).await?,
    };
    Ok(res.rows_affected)
}
