//! Sealed database runner capability.
//!
//! Query and lifecycle functions accept `&impl DBRunner` so the same call works
//! on a [`ViewableConn`](crate::ViewableConn) and inside a
//! [`ViewableTx`](crate::ViewableTx) without exposing raw `SeaORM` handles.

use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait};

/// Borrowed `SeaORM` executor behind a runner.
#[doc(hidden)]
#[derive(Clone, Copy)]
pub enum SeaOrmRunner<'a> {
    Conn(&'a DatabaseConnection),
    Tx(&'a DatabaseTransaction),
}

/// Crate-private half of [`DBRunner`]. Lives in a private module so it cannot
/// be implemented or called outside this crate.
pub trait DBRunnerInternal: Send + Sync {
    fn as_seaorm(&self) -> SeaOrmRunner<'_>;
}

/// Anything that can execute queries for the visibility layer.
pub trait DBRunner: DBRunnerInternal {}

impl<T: DBRunnerInternal> DBRunner for T {}

impl DBRunnerInternal for SeaOrmRunner<'_> {
    fn as_seaorm(&self) -> SeaOrmRunner<'_> {
        *self
    }
}

/// Open a transaction on the runner; inside an existing transaction this is a savepoint.
pub(crate) async fn begin(runner: &impl DBRunner) -> Result<DatabaseTransaction, DbErr> {
    match runner.as_seaorm() {
        SeaOrmRunner::Conn(db) => db.begin().await,
        SeaOrmRunner::Tx(tx) => tx.begin().await,
    }
}
