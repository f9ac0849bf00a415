use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sea_orm::{
    Condition, DbBackend, EntityTrait, ModelTrait, QueryFilter, QueryOrder, QuerySelect,
    QueryTrait, Select, Statement, TryGetable, Value,
    sea_query::{Asterisk, Expr, Func, IntoCondition, SimpleExpr},
};
use tracing::debug;

use crate::viewable::cond::{
    primary_key_eq, primary_key_in, published_condition, unpublished_condition,
};
use crate::viewable::scope::{QueryScope, compose};
use crate::viewable::{
    DBRunner, DBRunnerInternal, ReferenceClock, SeaOrmRunner, ViewableEntity, ViewableError,
};

/// Which rows a read operation sees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Published rows only.
    #[default]
    Default,
    /// Every row, no visibility predicate.
    WithPublished,
    /// Alias of [`Visibility::OnlyUnpublished`]: rows whose stamp has passed.
    OnlyPublished,
    /// Rows whose visibility stamp has passed.
    OnlyUnpublished,
}

impl Visibility {
    /// The predicate this mode adds for `E`, or `None` when nothing is filtered.
    #[must_use]
    pub fn predicate<E: ViewableEntity>(self, clock: &ReferenceClock) -> Option<Condition> {
        match self {
            Self::Default => published_condition::<E>(clock),
            Self::WithPublished => None,
            Self::OnlyPublished | Self::OnlyUnpublished => unpublished_condition::<E>(clock),
        }
    }

    /// `true` for every mode except [`Visibility::WithPublished`].
    #[must_use]
    pub fn is_filtering(self) -> bool {
        !matches!(self, Self::WithPublished)
    }
}

/// Aggregates routed through [`ViewableSelect::calculate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Calculation {
    Count,
    Sum,
    Average,
    Minimum,
    Maximum,
}

impl Calculation {
    fn apply(self, expr: SimpleExpr) -> SimpleExpr {
        match self {
            Self::Count => Func::count(expr).into(),
            Self::Sum => Func::sum(expr).into(),
            Self::Average => Func::avg(expr).into(),
            Self::Minimum => Func::min(expr).into(),
            Self::Maximum => Func::max(expr).into(),
        }
    }
}

/// Argument for [`ViewableSelect::exists`].
#[derive(Debug, Clone)]
pub enum ExistsTarget {
    /// Any row.
    Any,
    /// The row with this primary key.
    Id(Value),
    /// Any row matching the condition.
    Conditions(Condition),
}

impl ExistsTarget {
    pub fn id<V: Into<Value>>(id: V) -> Self {
        Self::Id(id.into())
    }
}

impl From<Condition> for ExistsTarget {
    fn from(c: Condition) -> Self {
        Self::Conditions(c)
    }
}

impl From<SimpleExpr> for ExistsTarget {
    fn from(e: SimpleExpr) -> Self {
        Self::Conditions(e.into_condition())
    }
}

/// Typestate marker: visibility mode not chosen yet. Cannot execute.
#[derive(Debug, Clone, Copy)]
pub struct Unresolved;

/// Typestate marker: the predicate for `mode` at `reference_time` has been
/// composed into the query.
#[derive(Debug, Clone, Copy)]
pub struct Resolved {
    mode: Visibility,
    reference_time: DateTime<Utc>,
}

/// A `SeaORM` `Select` that must pick a [`Visibility`] before it can run.
///
/// Caller filters, orderings, limits and the ambient [`QueryScope`] are all
/// kept; the visibility predicate is `AND`-ed on top when the mode is chosen.
///
/// ```rust,ignore
/// use viewable_db::{ViewableSelectExt, QueryScope};
///
/// let scope = QueryScope::filtered(widget::Column::Title.contains("gear"));
/// let rows = widget::Entity::find()
///     .viewable()                // ViewableSelect<E, Unresolved>
///     .within(&scope)
///     .order_by(widget::Column::Id, Order::Asc)
///     .published()               // ViewableSelect<E, Resolved>
///     .all(&conn)
///     .await?;
/// ```
#[must_use]
#[derive(Clone, Debug)]
pub struct ViewableSelect<E: EntityTrait, S> {
    pub(crate) inner: Select<E>,
    pub(crate) scope: QueryScope,
    pub(crate) clock: ReferenceClock,
    pub(crate) state: S,
}

/// Extension trait to turn a `SeaORM` `Select` into a [`ViewableSelect`].
pub trait ViewableSelectExt<E: EntityTrait>: Sized {
    /// Wrap the select; a visibility mode must be chosen before executing.
    fn viewable(self) -> ViewableSelect<E, Unresolved>;
}

impl<E> ViewableSelectExt<E> for Select<E>
where
    E: EntityTrait,
{
    fn viewable(self) -> ViewableSelect<E, Unresolved> {
        ViewableSelect {
            inner: self,
            scope: QueryScope::new(),
            clock: ReferenceClock::system(),
            state: Unresolved,
        }
    }
}

// Builders before the mode is chosen.
impl<E> ViewableSelect<E, Unresolved>
where
    E: ViewableEntity,
{
    /// Run inside an ambient scope. Repeated calls narrow further.
    pub fn within(mut self, scope: &QueryScope) -> Self {
        self.scope = self.scope.merged(scope);
        self
    }

    /// Evaluate visibility as of `at`.
    pub fn as_of(mut self, at: DateTime<Utc>) -> Self {
        self.clock = self.clock.with_as_of(at);
        self
    }

    pub fn clock(mut self, clock: ReferenceClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn filter<F: IntoCondition>(mut self, filter: F) -> Self {
        self.inner = QueryFilter::filter(self.inner, filter.into_condition());
        self
    }

    pub fn order_by<C>(mut self, col: C, order: sea_orm::Order) -> Self
    where
        C: sea_orm::IntoSimpleExpr,
    {
        self.inner = QueryOrder::order_by(self.inner, col, order);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.inner = QuerySelect::limit(self.inner, limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.inner = QuerySelect::offset(self.inner, offset);
        self
    }

    /// Choose the visibility mode and compose its predicate into the query.
    ///
    /// The reference time is read here, once.
    pub fn mode(self, mode: Visibility) -> ViewableSelect<E, Resolved> {
        let reference_time = self.clock.now();
        let clock = self.clock.with_as_of(reference_time);
        let predicate = mode.predicate::<E>(&clock);
        debug!(
            table = E::default().table_name(),
            ?mode,
            %reference_time,
            filtered = predicate.is_some(),
            "resolved visibility"
        );

        let composed = compose(&self.scope, predicate);
        let inner = if composed.is_empty() {
            self.inner
        } else {
            QueryFilter::filter(self.inner, composed)
        };
        let inner = self.scope.apply_orderings(inner);

        ViewableSelect {
            inner,
            scope: self.scope,
            clock,
            state: Resolved {
                mode,
                reference_time,
            },
        }
    }

    pub fn published(self) -> ViewableSelect<E, Resolved> {
        self.mode(Visibility::Default)
    }

    pub fn with_published(self) -> ViewableSelect<E, Resolved> {
        self.mode(Visibility::WithPublished)
    }

    pub fn only_published(self) -> ViewableSelect<E, Resolved> {
        self.mode(Visibility::OnlyPublished)
    }

    pub fn only_unpublished(self) -> ViewableSelect<E, Resolved> {
        self.mode(Visibility::OnlyUnpublished)
    }
}

// Execution, available once the mode is chosen.
impl<E> ViewableSelect<E, Resolved>
where
    E: ViewableEntity,
{
    #[must_use]
    pub fn visibility(&self) -> Visibility {
        self.state.mode
    }

    #[must_use]
    pub fn reference_time(&self) -> DateTime<Utc> {
        self.state.reference_time
    }

    /// Add a filter after resolution; the visibility predicate stays in place.
    pub fn filter<F: IntoCondition>(mut self, filter: F) -> Self {
        self.inner = QueryFilter::filter(self.inner, filter.into_condition());
        self
    }

    pub fn order_by<C>(mut self, col: C, order: sea_orm::Order) -> Self
    where
        C: sea_orm::IntoSimpleExpr,
    {
        self.inner = QueryOrder::order_by(self.inner, col, order);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.inner = QuerySelect::limit(self.inner, limit);
        self
    }

    /// Execute the query and return all matching rows.
    ///
    /// # Errors
    /// Returns `ViewableError::Db` if the database query fails.
    #[allow(clippy::disallowed_methods)]
    pub async fn all(self, runner: &impl DBRunner) -> Result<Vec<E::Model>, ViewableError> {
        match DBRunnerInternal::as_seaorm(runner) {
            SeaOrmRunner::Conn(db) => Ok(self.inner.all(db).await?),
            SeaOrmRunner::Tx(tx) => Ok(self.inner.all(tx).await?),
        }
    }

    /// Execute the query and return the first row, honouring any ordering.
    ///
    /// # Errors
    /// Returns `ViewableError::Db` if the database query fails.
    #[allow(clippy::disallowed_methods)]
    pub async fn one(self, runner: &impl DBRunner) -> Result<Option<E::Model>, ViewableError> {
        match DBRunnerInternal::as_seaorm(runner) {
            SeaOrmRunner::Conn(db) => Ok(self.inner.one(db).await?),
            SeaOrmRunner::Tx(tx) => Ok(self.inner.one(tx).await?),
        }
    }

    /// Look up one row by primary key under the active mode.
    ///
    /// # Errors
    /// `ViewableError::RecordNotFound` when the row is absent or filtered out
    /// by the visibility predicate.
    pub async fn find_by_id<V>(self, runner: &impl DBRunner, id: V) -> Result<E::Model, ViewableError>
    where
        V: Into<Value>,
    {
        let id = id.into();
        let rendered = render_value(&id);
        self.filter(primary_key_eq::<E>(id))
            .one(runner)
            .await?
            .ok_or_else(|| ViewableError::not_found::<E>(vec![rendered]))
    }

    /// Look up several rows by primary key under the active mode.
    ///
    /// Rows come back in database order.
    ///
    /// # Errors
    /// `ViewableError::RecordNotFound` listing every requested id that did not
    /// match under the visibility predicate.
    pub async fn find_by_ids<I, V>(
        self,
        runner: &impl DBRunner,
        ids: I,
    ) -> Result<Vec<E::Model>, ViewableError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let ids: Vec<Value> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let requested: Vec<String> = ids.iter().map(render_value).collect();

        let rows = self.filter(primary_key_in::<E>(ids)).all(runner).await?;

        let mut seen: BTreeSet<String> = rows
            .iter()
            .map(|m| render_value(&m.get(E::primary_col())))
            .collect();
        let missing = missing_ids(requested, &mut seen);
        if !missing.is_empty() {
            return Err(ViewableError::not_found::<E>(missing));
        }
        Ok(rows)
    }

    /// Number of matching rows.
    ///
    /// # Errors
    /// Returns `ViewableError::Db` if the database query fails.
    pub async fn count(self, runner: &impl DBRunner) -> Result<u64, ViewableError> {
        let n: Option<i64> = self
            .aggregate(runner, Func::count(Expr::col(Asterisk)).into())
            .await?;
        Ok(n.map_or(0, |n| u64::try_from(n).unwrap_or_default()))
    }

    /// Run an aggregate over `column` for the matching rows.
    ///
    /// `None` means the aggregate is SQL `NULL` (e.g. `SUM` over no rows).
    ///
    /// # Errors
    /// Returns `ViewableError::Db` if the database query fails or the result
    /// cannot be decoded as `T`.
    pub async fn calculate<T>(
        self,
        runner: &impl DBRunner,
        calculation: Calculation,
        column: E::Column,
    ) -> Result<Option<T>, ViewableError>
    where
        T: TryGetable + Send + Sync,
    {
        let expr = calculation.apply(Expr::col((E::default(), column)).into());
        self.aggregate(runner, expr).await
    }

    /// Whether any row matches `target` under the active mode.
    ///
    /// # Errors
    /// Returns `ViewableError::Db` if the database query fails.
    pub async fn exists(
        self,
        runner: &impl DBRunner,
        target: impl Into<ExistsTarget>,
    ) -> Result<bool, ViewableError> {
        let select = match target.into() {
            ExistsTarget::Any => self,
            ExistsTarget::Id(id) => self.filter(primary_key_eq::<E>(id)),
            ExistsTarget::Conditions(c) => self.filter(c),
        };
        Ok(select.count(runner).await? > 0)
    }

    /// Single aggregation primitive behind `count`, `calculate` and `exists`.
    ///
    /// Orderings are dropped; they are meaningless for an aggregate row and
    /// some engines reject them.
    #[allow(clippy::disallowed_methods)]
    async fn aggregate<T>(
        self,
        runner: &impl DBRunner,
        expr: SimpleExpr,
    ) -> Result<Option<T>, ViewableError>
    where
        T: TryGetable + Send + Sync,
    {
        let mut select = self.inner;
        QueryTrait::query(&mut select).clear_order_by();
        let select = select
            .select_only()
            .expr_as(expr, "aggregate")
            .into_tuple::<Option<T>>();

        let row = match DBRunnerInternal::as_seaorm(runner) {
            SeaOrmRunner::Conn(db) => select.one(db).await?,
            SeaOrmRunner::Tx(tx) => select.one(tx).await?,
        };
        Ok(row.flatten())
    }

    /// Render the final statement, for logging and inspection.
    #[must_use]
    pub fn build(&self, backend: DbBackend) -> Statement {
        QueryTrait::build(&self.inner, backend)
    }

    /// Unwrap the inner `SeaORM` `Select`.
    ///
    /// The visibility predicate is already part of it.
    #[must_use]
    pub fn into_inner(self) -> Select<E> {
        self.inner
    }
}

/// Render a key value for error messages and id comparison.
/// Requested ids absent from `seen`, in request order, each reported once.
fn missing_ids(requested: Vec<String>, seen: &mut BTreeSet<String>) -> Vec<String> {
    requested
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

pub(crate) fn render_value(v: &Value) -> String {
    match v {
        Value::TinyInt(Some(n)) => n.to_string(),
        Value::SmallInt(Some(n)) => n.to_string(),
        Value::Int(Some(n)) => n.to_string(),
        Value::BigInt(Some(n)) => n.to_string(),
        Value::TinyUnsigned(Some(n)) => n.to_string(),
        Value::SmallUnsigned(Some(n)) => n.to_string(),
        Value::Unsigned(Some(n)) => n.to_string(),
        Value::BigUnsigned(Some(n)) => n.to_string(),
        Value::String(Some(s)) => s.to_string(),
        Value::Uuid(Some(u)) => u.to_string(),
        other => format!("{other:?}"),
    }
}
