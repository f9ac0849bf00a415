//! Association descriptors that carry visibility across relationships.
//!
//! | Descriptor | Shape | What is filtered |
//! |------------|-------|------------------|
//! | [`BelongsTo`] | many-to-one | target, `Default` unless `.with_published()` |
//! | [`HasMany`] | one-to-many, one-to-one, many-to-many via `Related::via` | target, by the caller's mode |
//! | [`HasManyThrough`] | many-to-many through a join entity | join rows in the `ON` clause, target by the caller's mode |
//!
//! Types whose [`ViewableEntity::published_col`] is `None` are never rewritten.

use std::marker::PhantomData;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelBehavior, ColumnTrait, Condition, EntityTrait, IntoActiveModel, JoinType,
    ModelTrait, QuerySelect, Related, RelationDef, Value,
    sea_query::{Expr, IntoCondition},
};

use crate::viewable::cond::{primary_key_eq, published};
use crate::viewable::db_ops::{RecoverAssociation, recover_stamped};
use crate::viewable::select::{Unresolved, ViewableSelect, ViewableSelectExt, Visibility};
use crate::viewable::{DBRunner, ReferenceClock, SeaOrmRunner, ViewableEntity, ViewableError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationKind {
    BelongsTo,
    HasMany,
    HasManyThrough,
}

/// Runtime description of an association, for diagnostics and admin tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationReflection {
    pub name: String,
    pub kind: AssociationKind,
    pub target_table: String,
    pub through_table: Option<String>,
    pub with_published: bool,
    pub has_conditions: bool,
}

fn mode_for(with_published: bool) -> Visibility {
    if with_published {
        Visibility::WithPublished
    } else {
        Visibility::Default
    }
}

fn apply_conditions<R: ViewableEntity>(
    select: ViewableSelect<R, Unresolved>,
    conditions: Option<&Condition>,
) -> ViewableSelect<R, Unresolved> {
    match conditions {
        Some(c) => select.filter(c.clone()),
        None => select,
    }
}

/// Many-to-one: the owner `E` holds a foreign key to the target `R`.
///
/// The target is looked up with [`Visibility::Default`], so an unpublished
/// parent reads as absent; `.with_published()` opts out.
pub struct BelongsTo<E: EntityTrait, R> {
    name: &'static str,
    foreign_key: E::Column,
    with_published: bool,
    conditions: Option<Condition>,
    _target: PhantomData<fn() -> R>,
}

impl<E, R> BelongsTo<E, R>
where
    E: EntityTrait,
    R: ViewableEntity,
{
    #[must_use]
    pub fn new(name: &'static str, foreign_key: E::Column) -> Self {
        Self {
            name,
            foreign_key,
            with_published: false,
            conditions: None,
            _target: PhantomData,
        }
    }

    /// Load the target regardless of its visibility.
    #[must_use]
    pub fn with_published(mut self) -> Self {
        self.with_published = true;
        self
    }

    /// Relationship-level conditions, `AND`-ed with everything else.
    #[must_use]
    pub fn conditions<C: IntoCondition>(mut self, conditions: C) -> Self {
        self.conditions = Some(conditions.into_condition());
        self
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The target lookup, or `None` when the foreign key is NULL.
    pub fn select(&self, owner: &E::Model) -> Option<ViewableSelect<R, Unresolved>> {
        let fk = owner.get(self.foreign_key);
        if fk == fk.as_null() {
            return None;
        }
        let select = R::find().viewable().filter(primary_key_eq::<R>(fk));
        Some(apply_conditions(select, self.conditions.as_ref()))
    }

    /// # Errors
    /// Returns `ViewableError::Db` if the query fails.
    pub async fn load(
        &self,
        runner: &impl DBRunner,
        owner: &E::Model,
        clock: &ReferenceClock,
    ) -> Result<Option<R::Model>, ViewableError>
    where
        E::Model: Sync,
    {
        let Some(select) = self.select(owner) else {
            return Ok(None);
        };
        select
            .clock(*clock)
            .mode(mode_for(self.with_published))
            .one(runner)
            .await
    }

    #[must_use]
    pub fn reflect(&self) -> AssociationReflection {
        AssociationReflection {
            name: self.name.to_owned(),
            kind: AssociationKind::BelongsTo,
            target_table: R::default().table_name().to_owned(),
            through_table: None,
            with_published: self.with_published,
            has_conditions: self.conditions.is_some(),
        }
    }
}

/// One-to-many (and one-to-one, and many-to-many declared with
/// `Related::via`) from `E` to `R`, following `E: Related<R>`.
///
/// ```ignore
/// const CATEGORIES: HasMany<widget::Entity, category::Entity> = HasMany::new("categories");
///
/// let visible = CATEGORIES.load(&db, &widget, &db.clock()).await?;
/// let matching = CATEGORIES
///     .select(&widget)
///     .filter(category::Column::Title.like("%c%"))
///     .with_published()
///     .all(&db)
///     .await?;
/// ```
pub struct HasMany<E, R> {
    name: &'static str,
    with_published: bool,
    conditions: Option<Condition>,
    _types: PhantomData<fn() -> (E, R)>,
}

impl<E, R> HasMany<E, R>
where
    E: EntityTrait + Related<R>,
    R: ViewableEntity,
{
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            with_published: false,
            conditions: None,
            _types: PhantomData,
        }
    }

    /// [`load`](Self::load) returns related rows regardless of visibility.
    #[must_use]
    pub fn with_published(mut self) -> Self {
        self.with_published = true;
        self
    }

    #[must_use]
    pub fn conditions<C: IntoCondition>(mut self, conditions: C) -> Self {
        self.conditions = Some(conditions.into_condition());
        self
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Related rows of `owner`; the caller picks the target's visibility mode.
    pub fn select(&self, owner: &E::Model) -> ViewableSelect<R, Unresolved> {
        let select = owner.find_related(R::default()).viewable();
        apply_conditions(select, self.conditions.as_ref())
    }

    /// # Errors
    /// Returns `ViewableError::Db` if the query fails.
    pub async fn load(
        &self,
        runner: &impl DBRunner,
        owner: &E::Model,
        clock: &ReferenceClock,
    ) -> Result<Vec<R::Model>, ViewableError> {
        self.select(owner)
            .clock(*clock)
            .mode(mode_for(self.with_published))
            .all(runner)
            .await
    }

    /// Has-one flavour of [`load`](Self::load).
    ///
    /// # Errors
    /// Returns `ViewableError::Db` if the query fails.
    pub async fn load_one(
        &self,
        runner: &impl DBRunner,
        owner: &E::Model,
        clock: &ReferenceClock,
    ) -> Result<Option<R::Model>, ViewableError> {
        self.select(owner)
            .clock(*clock)
            .mode(mode_for(self.with_published))
            .one(runner)
            .await
    }

    /// # Errors
    /// Returns `ViewableError::Db` if the query fails.
    pub async fn count(
        &self,
        runner: &impl DBRunner,
        owner: &E::Model,
        clock: &ReferenceClock,
    ) -> Result<u64, ViewableError> {
        self.select(owner)
            .clock(*clock)
            .mode(mode_for(self.with_published))
            .count(runner)
            .await
    }

    #[must_use]
    pub fn reflect(&self) -> AssociationReflection {
        AssociationReflection {
            name: self.name.to_owned(),
            kind: AssociationKind::HasMany,
            target_table: R::default().table_name().to_owned(),
            through_table: None,
            with_published: self.with_published,
            has_conditions: self.conditions.is_some(),
        }
    }
}

#[async_trait]
impl<E, R> RecoverAssociation<E> for HasMany<E, R>
where
    E: EntityTrait + Related<R>,
    E::Model: Sync,
    R: ViewableEntity,
    R::Model: IntoActiveModel<R::ActiveModel> + Sync,
    R::ActiveModel: ActiveModelBehavior + Send,
{
    fn association_name(&self) -> &str {
        self.name
    }

    async fn recover_related(
        &self,
        runner: SeaOrmRunner<'_>,
        owner: &E::Model,
        clock: &ReferenceClock,
    ) -> Result<u64, ViewableError> {
        if !R::supports_visibility() {
            return Ok(0);
        }
        let related = self
            .select(owner)
            .clock(*clock)
            .with_published()
            .all(&runner)
            .await?;
        recover_stamped::<R>(runner, related, clock).await
    }
}

/// Many-to-many from `E` to `R` through the join entity `T`.
///
/// `T` holds `owner_key` (pointing at `E`'s primary key) and `target_key`
/// (pointing at `R`'s `target_pk`). The select joins `T` onto `R` with
///
/// ```text
/// ON T.target_key = R.target_pk
///    AND (T.owner_key = <owner id>)
///    AND (T.col IS NULL OR T.col > <now>)   -- when T has the layer
///    AND (<conditions>)
/// ```
///
/// so unpublished join rows hide their targets even when the target itself
/// is published. The target's own visibility is the caller's mode choice.
pub struct HasManyThrough<E: EntityTrait, T: EntityTrait, R: EntityTrait> {
    name: &'static str,
    owner_key: T::Column,
    target_key: T::Column,
    target_pk: R::Column,
    with_published: bool,
    conditions: Option<Condition>,
    _owner: PhantomData<fn() -> E>,
}

impl<E, T, R> HasManyThrough<E, T, R>
where
    E: ViewableEntity,
    T: ViewableEntity,
    R: ViewableEntity,
{
    #[must_use]
    pub fn new(
        name: &'static str,
        owner_key: T::Column,
        target_key: T::Column,
        target_pk: R::Column,
    ) -> Self {
        Self {
            name,
            owner_key,
            target_key,
            target_pk,
            with_published: false,
            conditions: None,
            _owner: PhantomData,
        }
    }

    /// Keep unpublished join rows in the join.
    #[must_use]
    pub fn with_published(mut self) -> Self {
        self.with_published = true;
        self
    }

    /// Extra join conditions, `AND`-ed into the `ON` clause.
    #[must_use]
    pub fn conditions<C: IntoCondition>(mut self, conditions: C) -> Self {
        self.conditions = Some(conditions.into_condition());
        self
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Targets of `owner`, with the join rows filtered as of `clock`.
    pub fn select(&self, owner: &E::Model, clock: &ReferenceClock) -> ViewableSelect<R, Unresolved> {
        self.build(owner, clock, !self.with_published)
            .clock(*clock)
    }

    fn build(
        &self,
        owner: &E::Model,
        clock: &ReferenceClock,
        filter_join_rows: bool,
    ) -> ViewableSelect<R, Unresolved> {
        let rel = self.join_def(owner, clock, filter_join_rows);
        R::find().join_rev(JoinType::InnerJoin, rel).viewable()
    }

    /// The `T -> R` relation with the rewritten `ON` clause.
    fn join_def(&self, owner: &E::Model, clock: &ReferenceClock, filter_join_rows: bool) -> RelationDef {
        let owner_id: Value = owner.get(E::primary_col());
        let owner_key = self.owner_key;
        let conditions = self.conditions.clone();

        let join_predicate = T::published_col()
            .filter(|_| filter_join_rows)
            .map(|col| (col, clock.now_value(col.def().get_column_type())));

        let rel: RelationDef = T::belongs_to(R::default())
            .from(self.target_key)
            .to(self.target_pk)
            .into();

        rel.on_condition(move |through, _target| {
            Condition::all()
                .add(Expr::col((through.clone(), owner_key)).eq(owner_id.clone()))
                .add_option(
                    join_predicate
                        .clone()
                        .map(|(col, now)| published(through.clone(), col, now)),
                )
                .add_option(conditions.clone())
        })
    }

    /// Targets under [`Visibility::Default`].
    ///
    /// # Errors
    /// Returns `ViewableError::Db` if the query fails.
    pub async fn load(
        &self,
        runner: &impl DBRunner,
        owner: &E::Model,
        clock: &ReferenceClock,
    ) -> Result<Vec<R::Model>, ViewableError> {
        self.select(owner, clock).published().all(runner).await
    }

    /// # Errors
    /// Returns `ViewableError::Db` if the query fails.
    pub async fn count(
        &self,
        runner: &impl DBRunner,
        owner: &E::Model,
        clock: &ReferenceClock,
    ) -> Result<u64, ViewableError> {
        self.select(owner, clock).published().count(runner).await
    }

    #[must_use]
    pub fn reflect(&self) -> AssociationReflection {
        AssociationReflection {
            name: self.name.to_owned(),
            kind: AssociationKind::HasManyThrough,
            target_table: R::default().table_name().to_owned(),
            through_table: Some(T::default().table_name().to_owned()),
            with_published: self.with_published,
            has_conditions: self.conditions.is_some(),
        }
    }
}

#[async_trait]
impl<E, T, R> RecoverAssociation<E> for HasManyThrough<E, T, R>
where
    E: ViewableEntity,
    E::Model: Sync,
    T: ViewableEntity,
    R: ViewableEntity,
    R::Model: IntoActiveModel<R::ActiveModel> + Sync,
    R::ActiveModel: ActiveModelBehavior + Send,
{
    fn association_name(&self) -> &str {
        self.name
    }

    async fn recover_related(
        &self,
        runner: SeaOrmRunner<'_>,
        owner: &E::Model,
        clock: &ReferenceClock,
    ) -> Result<u64, ViewableError> {
        if !R::supports_visibility() {
            return Ok(0);
        }
        let related = self
            .build(owner, clock, false)
            .clock(*clock)
            .with_published()
            .all(&runner)
            .await?;
        recover_stamped::<R>(runner, related, clock).await
    }
}
