//! Ambient scopes and caller-built finders combined with visibility.

use sea_orm::{ColumnTrait, Order};
use viewable_db::{QueryScope, Visibility};

use crate::common::{categories, category, setup, widget};

fn category_ids(rows: &[category::Model]) -> Vec<i32> {
    rows.iter().map(|c| c.id).collect()
}

#[tokio::test]
async fn ambient_scope_is_anded_with_visibility() {
    let db = setup().await;
    let scope = QueryScope::filtered(widget::Column::Title.contains("widget"));

    let visible = db
        .select::<widget::Entity>()
        .within(&scope)
        .published()
        .count(&db)
        .await
        .unwrap();
    assert_eq!(visible, 1);

    let everything = db
        .select::<widget::Entity>()
        .within(&scope)
        .with_published()
        .count(&db)
        .await
        .unwrap();
    assert_eq!(everything, 2);
}

#[tokio::test]
async fn repeated_scopes_narrow_instead_of_replacing() {
    let db = setup().await;
    let outer = QueryScope::filtered(widget::Column::Title.contains("widget"));
    let inner = QueryScope::filtered(widget::Column::Title.starts_with("published"));

    let rows = db
        .select::<widget::Entity>()
        .within(&outer)
        .within(&inner)
        .with_published()
        .all(&db)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, 2);

    let hidden = db
        .select::<widget::Entity>()
        .within(&outer)
        .within(&inner)
        .published()
        .count(&db)
        .await
        .unwrap();
    assert_eq!(hidden, 0);
}

#[tokio::test]
async fn nested_scope_leaves_outer_scope_intact() {
    let db = setup().await;
    let outer = QueryScope::filtered(category::Column::WidgetId.eq(1));

    let narrowed = outer
        .with(category::Column::Title.eq("category 2"), |s| {
            db.select::<category::Entity>().within(s).with_published()
        })
        .count(&db)
        .await
        .unwrap();
    assert_eq!(narrowed, 1);

    let again = db
        .select::<category::Entity>()
        .within(&outer)
        .with_published()
        .count(&db)
        .await
        .unwrap();
    assert_eq!(again, 2);
}

#[tokio::test]
async fn scope_orderings_follow_caller_orderings() {
    let db = setup().await;
    let scope = QueryScope::new().order_by(category::Column::Id, Order::Desc);

    let rows = db
        .select::<category::Entity>()
        .within(&scope)
        .with_published()
        .all(&db)
        .await
        .unwrap();
    assert_eq!(category_ids(&rows), vec![4, 3, 2, 1]);

    let rows = db
        .select::<category::Entity>()
        .within(&scope)
        .order_by(category::Column::WidgetId, Order::Asc)
        .with_published()
        .all(&db)
        .await
        .unwrap();
    assert_eq!(category_ids(&rows), vec![2, 1, 4, 3]);
}

#[tokio::test]
async fn custom_finders_keep_their_conditions() {
    let db = setup().await;
    let finder = || {
        db.select::<category::Entity>()
            .filter(category::Column::Title.like("%c%"))
            .order_by(category::Column::Id, Order::Asc)
    };

    assert_eq!(category_ids(&finder().published().all(&db).await.unwrap()), vec![1]);
    assert_eq!(
        category_ids(&finder().with_published().all(&db).await.unwrap()),
        vec![1, 2, 3, 4]
    );
}

#[tokio::test]
async fn association_finders_combine_owner_and_mode() {
    let db = setup().await;
    let assoc = categories();
    let w1 = db.find_by_id::<widget::Entity, _>(Visibility::Default, 1).await.unwrap();
    let w2 = db
        .find_by_id::<widget::Entity, _>(Visibility::WithPublished, 2)
        .await
        .unwrap();

    let like_c = |w: &widget::Model| {
        assoc
            .select(w)
            .filter(category::Column::Title.like("%c%"))
            .order_by(category::Column::Id, Order::Asc)
    };

    assert_eq!(category_ids(&like_c(&w1).published().all(&db).await.unwrap()), vec![1]);
    assert_eq!(category_ids(&like_c(&w1).with_published().all(&db).await.unwrap()), vec![1, 2]);
    assert!(like_c(&w2).published().all(&db).await.unwrap().is_empty());
    assert_eq!(category_ids(&like_c(&w2).with_published().all(&db).await.unwrap()), vec![3, 4]);
}

#[tokio::test]
async fn resolved_select_renders_every_part() {
    let db = setup().await;
    let scope = QueryScope::filtered(widget::Column::Id.gt(0));

    let stmt = db
        .select::<widget::Entity>()
        .within(&scope)
        .filter(widget::Column::Title.like("w%"))
        .limit(5)
        .published()
        .build(sea_orm::DbBackend::Sqlite)
        .to_string();
    assert!(stmt.contains(r#""widgets"."title" LIKE 'w%'"#), "{stmt}");
    assert!(stmt.contains(r#""widgets"."id" > 0"#), "{stmt}");
    assert!(stmt.contains(r#""published_at" IS NULL OR"#), "{stmt}");
    assert!(stmt.ends_with("LIMIT 5"), "{stmt}");
}
