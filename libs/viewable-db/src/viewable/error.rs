use sea_orm::{DbErr, EntityName};
use thiserror::Error;

/// Errors surfaced by the visibility layer.
///
/// Engine errors are wrapped in [`ViewableError::Db`] unmodified; the layer
/// never retries or swallows them.
#[derive(Debug, Error)]
pub enum ViewableError {
    /// One or more requested ids did not match a row under the active visibility predicate.
    ///
    /// The row may exist physically; an unpublished row looked up with the
    /// default visibility is reported here as well.
    #[error("record not found in {entity}: id(s) {}", .ids.join(", "))]
    RecordNotFound { entity: String, ids: Vec<String> },

    /// A `before_delete` hook vetoed the soft delete. Nothing was written.
    #[error("delete of {entity} aborted: {reason}")]
    DeleteAborted { entity: String, reason: String },

    /// Validation raised by `ActiveModelBehavior::before_save` while recovering.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// The operation needs the visibility column but the entity has none.
    #[error("entity {entity} does not support soft delete")]
    Unsupported { entity: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Db(#[from] DbErr),
}

impl ViewableError {
    pub(crate) fn unsupported<E: EntityName>() -> Self {
        Self::Unsupported {
            entity: E::default().table_name().to_owned(),
        }
    }

    pub(crate) fn not_found<E: EntityName>(ids: Vec<String>) -> Self {
        Self::RecordNotFound {
            entity: E::default().table_name().to_owned(),
            ids,
        }
    }

    /// Map a `save` failure: `DbErr::Custom` raised from `before_save` is a
    /// validation failure, anything else stays an engine error.
    pub(crate) fn from_save(err: DbErr) -> Self {
        match err {
            DbErr::Custom(msg) => Self::ValidationFailed(msg),
            other => Self::Db(other),
        }
    }

    /// Returns `true` for [`ViewableError::RecordNotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. })
    }
}
