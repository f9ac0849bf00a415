//! Ambient caller scope.
//!
//! A [`QueryScope`] carries the filters and orderings a caller wants applied
//! to every query issued inside some logical operation. It is a plain value:
//! narrowing produces a new scope and leaves the outer one untouched, so
//! leaving a nested block restores the outer scope on every exit path,
//! including `?` and panics.
//!
//! Visibility predicates are always `AND`-ed with the ambient filters; a
//! nested scope can only narrow what its parent allows.

use sea_orm::{
    Condition, EntityTrait, IntoSimpleExpr, Order, QueryOrder, Select,
    sea_query::{IntoCondition, SimpleExpr},
};

#[derive(Debug, Clone, Default)]
pub struct QueryScope {
    filters: Vec<Condition>,
    orderings: Vec<(SimpleExpr, Order)>,
}

impl QueryScope {
    /// The empty scope; composes to "no extra constraint".
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A root scope holding a single filter.
    #[must_use]
    pub fn filtered<F: IntoCondition>(filter: F) -> Self {
        Self::new().nest(filter)
    }

    /// A child scope: everything in `self`, `AND` the new filter.
    #[must_use]
    pub fn nest<F: IntoCondition>(&self, filter: F) -> Self {
        let mut child = self.clone();
        child.filters.push(filter.into_condition());
        child
    }

    /// A child scope with an extra ordering appended after the existing ones.
    #[must_use]
    pub fn order_by<C: IntoSimpleExpr>(&self, expr: C, order: Order) -> Self {
        let mut child = self.clone();
        child.orderings.push((expr.into_simple_expr(), order));
        child
    }

    /// Run `body` with a narrowed scope. The caller's `self` is unchanged
    /// afterwards regardless of how `body` exits.
    pub fn with<F, R>(&self, filter: F, body: impl FnOnce(&QueryScope) -> R) -> R
    where
        F: IntoCondition,
    {
        let inner = self.nest(filter);
        body(&inner)
    }

    /// Number of filters stacked in this scope.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.filters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.orderings.is_empty()
    }

    #[must_use]
    pub fn filters(&self) -> &[Condition] {
        &self.filters
    }

    /// All ambient filters `AND`-ed together.
    #[must_use]
    pub fn condition(&self) -> Condition {
        self.filters
            .iter()
            .cloned()
            .fold(Condition::all(), |acc, f| acc.add(f))
    }

    /// A child scope holding everything in `self` followed by everything in `other`.
    #[must_use]
    pub fn merged(&self, other: &QueryScope) -> Self {
        let mut child = self.clone();
        child.filters.extend(other.filters.iter().cloned());
        child.orderings.extend(other.orderings.iter().cloned());
        child
    }

    /// Append the ambient orderings after any the select already has.
    pub(crate) fn apply_orderings<E: EntityTrait>(&self, mut select: Select<E>) -> Select<E> {
        for (expr, order) in &self.orderings {
            select = QueryOrder::order_by(select, expr.clone(), order.clone());
        }
        select
    }
}

/// `AND` the ambient scope with an optional visibility predicate.
///
/// The merge strategy is always conjunction; a predicate never replaces an
/// ambient filter and vice versa.
#[must_use]
pub fn compose(ambient: &QueryScope, predicate: Option<Condition>) -> Condition {
    ambient.condition().add_option(predicate)
}
