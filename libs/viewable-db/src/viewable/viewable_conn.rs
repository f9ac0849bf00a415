//! Connection and transaction facade.
//!
//! [`ViewableConn`] owns a `SeaORM` connection plus the [`ReferenceClock`]
//! every read and delete on it uses. Inside [`ViewableConn::transaction_with`]
//! the closure gets a [`ViewableTx`] carrying the same clock.
//!
//! ```ignore
//! let db = ViewableConn::with_config(conn, &ViewableConfig::load("viewable.yaml")?);
//!
//! let live = db.count::<widget::Entity>(Visibility::Default).await?;
//! let all = db.count::<widget::Entity>(Visibility::WithPublished).await?;
//!
//! let w = db.find_by_id::<widget::Entity, _>(Visibility::Default, 1).await?;
//! let w = db.soft_delete(w, &CascadeCategories).await?;
//! ```

use std::future::Future;
use std::pin::Pin;

use sea_orm::{
    ActiveModelBehavior, Condition, DatabaseConnection, DatabaseTransaction, EntityTrait,
    IntoActiveModel, ModelTrait, TransactionTrait, TryGetable, Value,
};

use crate::config::ViewableConfig;
use crate::viewable::db_ops::{self, RecoverAssociation, RecoveryReport, SoftDeleted};
use crate::viewable::hooks::DeleteHooks;
use crate::viewable::select::{
    Calculation, ExistsTarget, Resolved, Unresolved, ViewableSelect, ViewableSelectExt, Visibility,
};
use crate::viewable::{DBRunnerInternal, ReferenceClock, SeaOrmRunner, ViewableEntity, ViewableError};

/// Transaction handle passed to closures and delete hooks.
///
/// Exposes no raw transaction API; use it as the runner for queries and
/// lifecycle calls.
pub struct ViewableTx<'a> {
    pub(crate) tx: &'a DatabaseTransaction,
    clock: ReferenceClock,
}

impl<'a> ViewableTx<'a> {
    #[must_use]
    pub(crate) fn new(tx: &'a DatabaseTransaction, clock: ReferenceClock) -> Self {
        Self { tx, clock }
    }

    #[must_use]
    pub fn clock(&self) -> ReferenceClock {
        self.clock
    }

    /// Unresolved select for `E` using this transaction's clock.
    pub fn select<E: ViewableEntity>(&self) -> ViewableSelect<E, Unresolved> {
        E::find().viewable().clock(self.clock)
    }

    /// Soft-delete inside this transaction (as a savepoint).
    ///
    /// # Errors
    /// See [`db_ops::soft_delete`].
    pub async fn soft_delete<M, H>(&self, model: M, hooks: &H) -> Result<SoftDeleted<M>, ViewableError>
    where
        M: ModelTrait + Send + Sync,
        M::Entity: ViewableEntity,
        H: DeleteHooks<M> + ?Sized,
    {
        db_ops::soft_delete(self, model, hooks, &self.clock).await
    }

    /// # Errors
    /// See [`db_ops::bulk_soft_delete`].
    pub async fn bulk_soft_delete<E: ViewableEntity>(
        &self,
        conditions: Option<Condition>,
    ) -> Result<u64, ViewableError> {
        db_ops::bulk_soft_delete::<E>(self, conditions, &self.clock).await
    }
}

impl DBRunnerInternal for ViewableTx<'_> {
    fn as_seaorm(&self) -> SeaOrmRunner<'_> {
        SeaOrmRunner::Tx(self.tx)
    }
}

/// Visibility-aware database connection.
///
/// Every convenience method takes the [`Visibility`] mode explicitly; there
/// is no hidden default read path.
pub struct ViewableConn {
    pub(crate) conn: DatabaseConnection,
    clock: ReferenceClock,
}

impl ViewableConn {
    #[must_use]
    pub fn new(conn: DatabaseConnection) -> Self {
        Self {
            conn,
            clock: ReferenceClock::system(),
        }
    }

    /// Wrap `conn` with the clock described by `config`.
    #[must_use]
    pub fn with_config(conn: DatabaseConnection, config: &ViewableConfig) -> Self {
        Self {
            conn,
            clock: config.clock(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: ReferenceClock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn clock(&self) -> ReferenceClock {
        self.clock
    }

    /// Return database engine identifier for tracing / logging.
    #[must_use]
    pub fn db_engine(&self) -> &'static str {
        use sea_orm::{ConnectionTrait, DbBackend};

        match self.conn.get_database_backend() {
            DbBackend::Postgres => "postgres",
            DbBackend::MySql => "mysql",
            DbBackend::Sqlite => "sqlite",
        }
    }

    /// Unresolved select for `E`; pick a mode before executing.
    pub fn select<E: ViewableEntity>(&self) -> ViewableSelect<E, Unresolved> {
        E::find().viewable().clock(self.clock)
    }

    /// Select for `E` resolved to `mode`.
    ///
    /// ```ignore
    /// let first = db
    ///     .find::<widget::Entity>(Visibility::WithPublished)
    ///     .order_by(widget::Column::Id, Order::Desc)
    ///     .one(&db)
    ///     .await?;
    /// ```
    pub fn find<E: ViewableEntity>(&self, mode: Visibility) -> ViewableSelect<E, Resolved> {
        self.select::<E>().mode(mode)
    }

    /// # Errors
    /// `ViewableError::RecordNotFound` when no row matches under `mode`.
    pub async fn find_by_id<E, V>(&self, mode: Visibility, id: V) -> Result<E::Model, ViewableError>
    where
        E: ViewableEntity,
        V: Into<Value>,
    {
        self.find::<E>(mode).find_by_id(self, id).await
    }

    /// # Errors
    /// `ViewableError::RecordNotFound` listing the ids missing under `mode`.
    pub async fn find_by_ids<E, I, V>(
        &self,
        mode: Visibility,
        ids: I,
    ) -> Result<Vec<E::Model>, ViewableError>
    where
        E: ViewableEntity,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.find::<E>(mode).find_by_ids(self, ids).await
    }

    /// # Errors
    /// Returns `ViewableError::Db` if the query fails.
    pub async fn count<E: ViewableEntity>(&self, mode: Visibility) -> Result<u64, ViewableError> {
        self.find::<E>(mode).count(self).await
    }

    /// # Errors
    /// Returns `ViewableError::Db` if the query fails.
    pub async fn calculate<E, T>(
        &self,
        mode: Visibility,
        calculation: Calculation,
        column: E::Column,
    ) -> Result<Option<T>, ViewableError>
    where
        E: ViewableEntity,
        T: TryGetable + Send + Sync,
    {
        self.find::<E>(mode)
            .calculate(self, calculation, column)
            .await
    }

    /// # Errors
    /// Returns `ViewableError::Db` if the query fails.
    pub async fn exists<E: ViewableEntity>(
        &self,
        mode: Visibility,
        target: impl Into<ExistsTarget>,
    ) -> Result<bool, ViewableError> {
        self.find::<E>(mode).exists(self, target).await
    }

    /// # Errors
    /// See [`db_ops::soft_delete`].
    pub async fn soft_delete<M, H>(&self, model: M, hooks: &H) -> Result<SoftDeleted<M>, ViewableError>
    where
        M: ModelTrait + Send + Sync,
        M::Entity: ViewableEntity,
        H: DeleteHooks<M> + ?Sized,
    {
        db_ops::soft_delete(self, model, hooks, &self.clock).await
    }

    /// # Errors
    /// See [`db_ops::hard_delete`].
    pub async fn hard_delete<M>(&self, model: &M) -> Result<u64, ViewableError>
    where
        M: ModelTrait + Sync,
        M::Entity: ViewableEntity,
    {
        db_ops::hard_delete(self, model).await
    }

    /// # Errors
    /// See [`db_ops::bulk_soft_delete`].
    pub async fn bulk_soft_delete<E: ViewableEntity>(
        &self,
        conditions: Option<Condition>,
    ) -> Result<u64, ViewableError> {
        db_ops::bulk_soft_delete::<E>(self, conditions, &self.clock).await
    }

    /// # Errors
    /// See [`db_ops::bulk_hard_delete`].
    pub async fn bulk_hard_delete<E: ViewableEntity>(
        &self,
        conditions: Option<Condition>,
    ) -> Result<u64, ViewableError> {
        db_ops::bulk_hard_delete::<E>(self, conditions).await
    }

    /// # Errors
    /// See [`db_ops::recover`].
    pub async fn recover<E>(&self, model: E::Model) -> Result<E::Model, ViewableError>
    where
        E: ViewableEntity,
        E::Model: IntoActiveModel<E::ActiveModel> + Sync,
        E::ActiveModel: ActiveModelBehavior + Send,
    {
        db_ops::recover::<E>(self, model).await
    }

    /// # Errors
    /// See [`db_ops::recover_with_associations`].
    pub async fn recover_with_associations<E>(
        &self,
        model: E::Model,
        associations: &[&dyn RecoverAssociation<E>],
    ) -> Result<(E::Model, RecoveryReport), ViewableError>
    where
        E: ViewableEntity,
        E::Model: IntoActiveModel<E::ActiveModel> + Sync,
        E::ActiveModel: ActiveModelBehavior + Send,
    {
        db_ops::recover_with_associations::<E>(self, model, associations, &self.clock).await
    }

    /// Execute a closure inside a database transaction and return its value.
    ///
    /// Consumes the connection and hands it back alongside the result so the
    /// outer connection cannot be used from inside the closure.
    ///
    /// ```ignore
    /// let (db, result) = db
    ///     .transaction_with(|tx| {
    ///         Box::pin(async move {
    ///             let w = tx.select::<widget::Entity>().published().one(tx).await?;
    ///             Ok(w.map(|w| w.id))
    ///         })
    ///     })
    ///     .await;
    /// ```
    ///
    /// # Errors
    ///
    /// The `Result` component is `Err(anyhow::Error)` if:
    /// - The transaction cannot be started
    /// - The closure fails (transaction is rolled back)
    /// - The commit fails
    pub async fn transaction_with<T, F>(self, f: F) -> (Self, anyhow::Result<T>)
    where
        T: Send + 'static,
        F: for<'a> FnOnce(
                &'a ViewableTx<'a>,
            )
                -> Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>
            + Send,
    {
        let txn = match self.conn.begin().await {
            Ok(t) => t,
            Err(e) => return (self, Err(e.into())),
        };
        let tx = ViewableTx::new(&txn, self.clock);

        let res = f(&tx).await;

        match res {
            Ok(v) => match txn.commit().await {
                Ok(()) => (self, Ok(v)),
                Err(e) => (self, Err(e.into())),
            },
            Err(e) => {
                _ = txn.rollback().await;
                (self, Err(e))
            }
        }
    }
}

impl DBRunnerInternal for ViewableConn {
    fn as_seaorm(&self) -> SeaOrmRunner<'_> {
        SeaOrmRunner::Conn(&self.conn)
    }
}
