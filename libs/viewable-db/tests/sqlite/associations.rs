//! Visibility across associations.

use sea_orm::Order;
use viewable_db::{Visibility, viewable::AssociationKind};

use crate::common::{
    any_tags, categories, category, category_any_widget, category_widget, habtm_categories, setup,
    tag, tagged_widgets, tags, widget,
};

#[tokio::test]
async fn has_many_loads_published_children() {
    let db = setup().await;
    let clock = db.clock();
    let w1 = db.find_by_id::<widget::Entity, _>(Visibility::Default, 1).await.unwrap();
    let assoc = categories();

    let rows = assoc.load(&db, &w1, &clock).await.unwrap();
    assert_eq!(rows.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1]);
    assert_eq!(assoc.count(&db, &w1, &clock).await.unwrap(), 1);

    let first = assoc.load_one(&db, &w1, &clock).await.unwrap().unwrap();
    assert_eq!(first.id, 1);

    let everything = categories().with_published().load(&db, &w1, &clock).await.unwrap();
    assert_eq!(everything.len(), 2);
}

#[tokio::test]
async fn through_association_filters_join_rows() {
    let db = setup().await;
    let clock = db.clock();
    let w1 = db.find_by_id::<widget::Entity, _>(Visibility::Default, 1).await.unwrap();

    let visible = tags().load(&db, &w1, &clock).await.unwrap();
    assert_eq!(visible.iter().map(|t| t.id).collect::<Vec<_>>(), vec![2]);
    assert_eq!(tags().count(&db, &w1, &clock).await.unwrap(), 1);

    let all = any_tags()
        .select(&w1, &clock)
        .order_by(tag::Column::Id, Order::Asc)
        .published()
        .all(&db)
        .await
        .unwrap();
    assert_eq!(all.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 2]);
}

#[tokio::test]
async fn through_a_plain_join_table_only_targets_are_filtered() {
    let db = setup().await;
    let clock = db.clock();
    let w1 = db.find_by_id::<widget::Entity, _>(Visibility::Default, 1).await.unwrap();
    let w2 = db
        .find_by_id::<widget::Entity, _>(Visibility::WithPublished, 2)
        .await
        .unwrap();
    let assoc = habtm_categories();

    let rows = assoc.load(&db, &w1, &clock).await.unwrap();
    assert_eq!(rows.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1]);

    assert_eq!(assoc.count(&db, &w2, &clock).await.unwrap(), 0);
    let any = assoc.select(&w2, &clock).with_published().count(&db).await.unwrap();
    assert_eq!(any, 2);
}

#[tokio::test]
async fn many_to_many_via_related_applies_target_visibility() {
    let db = setup().await;
    let clock = db.clock();
    let tag1 = db.find_by_id::<tag::Entity, _>(Visibility::Default, 1).await.unwrap();
    let assoc = tagged_widgets();

    let visible = assoc.load(&db, &tag1, &clock).await.unwrap();
    assert_eq!(visible.iter().map(|w| w.id).collect::<Vec<_>>(), vec![1]);

    let all = assoc
        .select(&tag1)
        .order_by(widget::Column::Id, Order::Asc)
        .with_published()
        .all(&db)
        .await
        .unwrap();
    assert_eq!(all.iter().map(|w| w.id).collect::<Vec<_>>(), vec![1, 2]);
}

#[tokio::test]
async fn belongs_to_hides_unpublished_owner_unless_opted_out() {
    let db = setup().await;
    let clock = db.clock();
    let c3 = db
        .find_by_id::<category::Entity, _>(Visibility::WithPublished, 3)
        .await
        .unwrap();

    assert!(category_widget().load(&db, &c3, &clock).await.unwrap().is_none());

    let owner = category_any_widget().load(&db, &c3, &clock).await.unwrap().unwrap();
    assert_eq!(owner.id, 2);
}

#[tokio::test]
async fn reflection_describes_each_association() {
    let has_many = categories().reflect();
    assert_eq!(has_many.name, "categories");
    assert_eq!(has_many.kind, AssociationKind::HasMany);
    assert_eq!(has_many.target_table, "categories");
    assert!(!has_many.with_published);

    let through = any_tags().reflect();
    assert_eq!(through.kind, AssociationKind::HasManyThrough);
    assert_eq!(through.through_table.as_deref(), Some("taggings"));
    assert!(through.with_published);

    let belongs_to = category_any_widget().reflect();
    assert_eq!(belongs_to.kind, AssociationKind::BelongsTo);
    assert_eq!(belongs_to.target_table, "widgets");
}
