use async_trait::async_trait;

use crate::viewable::{ViewableError, ViewableTx};

/// What a `before_delete` hook decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    Continue,
    /// Veto the soft delete; the transaction is rolled back and
    /// [`ViewableError::DeleteAborted`] carries the reason.
    Abort(String),
}

/// Callbacks around a single-record soft delete.
///
/// Both run inside the delete's transaction; use `tx` to cascade to related
/// rows so everything commits or rolls back together. Bulk operations and
/// hard deletes never invoke hooks.
///
/// ```rust,ignore
/// struct CascadeCategories;
///
/// #[async_trait]
/// impl DeleteHooks<widget::Model> for CascadeCategories {
///     async fn before_delete(
///         &self,
///         tx: &ViewableTx<'_>,
///         widget: &widget::Model,
///     ) -> Result<HookOutcome, ViewableError> {
///         for category in CATEGORIES.load(tx, widget).await? {
///             tx.soft_delete(category, &NoHooks).await?;
///         }
///         Ok(HookOutcome::Continue)
///     }
/// }
/// ```
#[async_trait]
pub trait DeleteHooks<M: Send + Sync>: Send + Sync {
    /// Runs before the visibility column is stamped.
    ///
    /// # Errors
    /// An error aborts the delete and is returned to the caller unchanged.
    async fn before_delete(
        &self,
        _tx: &ViewableTx<'_>,
        _model: &M,
    ) -> Result<HookOutcome, ViewableError> {
        Ok(HookOutcome::Continue)
    }

    /// Runs after the row and the in-memory model are stamped, before commit.
    ///
    /// # Errors
    /// An error rolls the delete back and is returned to the caller unchanged.
    async fn after_delete(&self, _tx: &ViewableTx<'_>, _model: &M) -> Result<(), ViewableError> {
        Ok(())
    }
}

/// No callbacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl<M: Send + Sync> DeleteHooks<M> for NoHooks {}
