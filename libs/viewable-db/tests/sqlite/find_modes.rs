//! Reads under each visibility mode.

use chrono::{Duration, Utc};
use sea_orm::{ColumnTrait, EntityTrait, Order, Set};
use viewable_db::{
    Calculation, ExistsTarget, ReferenceClock, ViewableConn, ViewableEntity, ViewableError,
    Visibility,
};

use crate::common::{android, category, five_days_ago, fixture_db, setup, widget};

fn ids(rows: &[widget::Model]) -> Vec<i32> {
    rows.iter().map(|w| w.id).collect()
}

#[tokio::test]
async fn default_mode_hides_unpublished_rows() {
    let db = setup().await;

    let rows = db
        .find::<widget::Entity>(Visibility::Default)
        .order_by(widget::Column::Id, Order::Asc)
        .all(&db)
        .await
        .unwrap();
    assert_eq!(ids(&rows), vec![1]);
}

#[tokio::test]
async fn with_published_returns_every_row() {
    let db = setup().await;

    let rows = db
        .find::<widget::Entity>(Visibility::WithPublished)
        .order_by(widget::Column::Id, Order::Asc)
        .all(&db)
        .await
        .unwrap();
    assert_eq!(ids(&rows), vec![1, 2]);
}

#[tokio::test]
async fn only_modes_return_unpublished_rows() {
    let db = setup().await;

    for mode in [Visibility::OnlyPublished, Visibility::OnlyUnpublished] {
        let rows = db.find::<widget::Entity>(mode).all(&db).await.unwrap();
        assert_eq!(ids(&rows), vec![2], "{mode:?}");
    }
}

#[tokio::test]
async fn counts_follow_the_mode() {
    let db = setup().await;

    assert_eq!(db.count::<widget::Entity>(Visibility::Default).await.unwrap(), 1);
    assert_eq!(db.count::<widget::Entity>(Visibility::WithPublished).await.unwrap(), 2);
    assert_eq!(db.count::<widget::Entity>(Visibility::OnlyPublished).await.unwrap(), 1);
    assert_eq!(db.count::<category::Entity>(Visibility::Default).await.unwrap(), 1);
    assert_eq!(db.count::<category::Entity>(Visibility::WithPublished).await.unwrap(), 4);
}

#[tokio::test]
async fn count_ignores_ordering() {
    let db = setup().await;

    let n = db
        .find::<category::Entity>(Visibility::WithPublished)
        .order_by(category::Column::Title, Order::Desc)
        .count(&db)
        .await
        .unwrap();
    assert_eq!(n, 4);
}

#[tokio::test]
async fn calculations_respect_the_mode() {
    let db = setup().await;

    let count: Option<i64> = db
        .calculate::<category::Entity, _>(Visibility::WithPublished, Calculation::Count, category::Column::Id)
        .await
        .unwrap();
    assert_eq!(count, Some(4));

    let sum: Option<i64> = db
        .calculate::<category::Entity, _>(Visibility::Default, Calculation::Sum, category::Column::Id)
        .await
        .unwrap();
    assert_eq!(sum, Some(1));

    let max: Option<i64> = db
        .calculate::<category::Entity, _>(Visibility::OnlyUnpublished, Calculation::Maximum, category::Column::Id)
        .await
        .unwrap();
    assert_eq!(max, Some(4));

    let min: Option<i64> = db
        .calculate::<category::Entity, _>(Visibility::OnlyUnpublished, Calculation::Minimum, category::Column::Id)
        .await
        .unwrap();
    assert_eq!(min, Some(2));
}

#[tokio::test]
async fn sum_over_no_rows_is_null() {
    let db = setup().await;

    let sum: Option<i64> = db
        .find::<category::Entity>(Visibility::Default)
        .filter(category::Column::WidgetId.eq(2))
        .calculate(&db, Calculation::Sum, category::Column::Id)
        .await
        .unwrap();
    assert_eq!(sum, None);
}

#[tokio::test]
async fn exists_by_id_and_by_conditions() {
    let db = setup().await;

    assert!(db.exists::<widget::Entity>(Visibility::WithPublished, ExistsTarget::id(2)).await.unwrap());
    assert!(!db.exists::<widget::Entity>(Visibility::Default, ExistsTarget::id(2)).await.unwrap());
    assert!(!db.exists::<widget::Entity>(Visibility::OnlyPublished, ExistsTarget::id(1)).await.unwrap());
    assert!(db.exists::<widget::Entity>(Visibility::Default, ExistsTarget::Any).await.unwrap());

    let titled = widget::Column::Title.eq("published widget 2");
    assert!(!db.exists::<widget::Entity>(Visibility::Default, titled.clone()).await.unwrap());
    assert!(db.exists::<widget::Entity>(Visibility::WithPublished, titled).await.unwrap());
}

#[tokio::test]
async fn first_row_uses_caller_ordering() {
    let db = setup().await;

    let first = db
        .find::<widget::Entity>(Visibility::WithPublished)
        .order_by(widget::Column::Id, Order::Desc)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.id, 2);
}

#[tokio::test]
async fn find_by_id_reports_hidden_rows_as_missing() {
    let db = setup().await;

    let err = db
        .find_by_id::<widget::Entity, _>(Visibility::Default, 2)
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "{err}");

    let w = db
        .find_by_id::<widget::Entity, _>(Visibility::WithPublished, 2)
        .await
        .unwrap();
    assert_eq!(w.title, "published widget 2");
}

#[tokio::test]
async fn find_by_ids_lists_every_missing_id() {
    let db = setup().await;

    let err = db
        .find_by_ids::<widget::Entity, _, _>(Visibility::Default, [1, 2, 9])
        .await
        .unwrap_err();
    match err {
        ViewableError::RecordNotFound { entity, ids } => {
            assert_eq!(entity, "widgets");
            assert_eq!(ids, vec!["2".to_owned(), "9".to_owned()]);
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = db
        .find_by_ids::<widget::Entity, _, _>(Visibility::WithPublished, [9, 1, 9])
        .await
        .unwrap_err();
    assert!(
        matches!(&err, ViewableError::RecordNotFound { ids, .. } if ids == &["9".to_owned()]),
        "{err}"
    );

    let rows = db
        .find_by_ids::<widget::Entity, _, _>(Visibility::WithPublished, [1, 2])
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn entities_without_the_column_ignore_every_mode() {
    let db = setup().await;

    assert!(widget::Entity::supports_visibility());
    assert!(!android::Entity::supports_visibility());
    for mode in [
        Visibility::Default,
        Visibility::WithPublished,
        Visibility::OnlyPublished,
        Visibility::OnlyUnpublished,
    ] {
        assert_eq!(db.count::<android::Entity>(mode).await.unwrap(), 1, "{mode:?}");
    }
}

#[tokio::test]
async fn as_of_moves_the_reference_time() {
    let db = setup().await;

    let before_stamp = five_days_ago() - Duration::days(1);
    let rows = db
        .select::<widget::Entity>()
        .as_of(before_stamp)
        .published()
        .all(&db)
        .await
        .unwrap();
    assert_eq!(ids(&rows), vec![1, 2]);

    let pinned = db.select::<widget::Entity>().as_of(before_stamp).published();
    assert_eq!(pinned.reference_time(), before_stamp);
    assert_eq!(pinned.visibility(), Visibility::Default);
}

#[tokio::test]
async fn connection_clock_applies_to_every_read() {
    let db = setup()
        .await
        .with_clock(ReferenceClock::fixed(five_days_ago() - Duration::hours(1)));

    assert_eq!(db.count::<widget::Entity>(Visibility::Default).await.unwrap(), 2);
    assert_eq!(db.count::<widget::Entity>(Visibility::OnlyUnpublished).await.unwrap(), 0);
}

#[tokio::test]
async fn default_and_unpublished_partition_the_rows() {
    let raw = fixture_db().await;
    let now = Utc::now();
    let stamps = [
        (10, None),
        (11, Some(now - Duration::milliseconds(1))),
        (12, Some(now)),
        (13, Some(now + Duration::milliseconds(1))),
    ];
    widget::Entity::insert_many(stamps.map(|(id, published_at)| widget::ActiveModel {
        id: Set(id),
        title: Set(format!("stamped {id}")),
        published_at: Set(published_at),
    }))
    .exec_without_returning(&raw)
    .await
    .unwrap();
    let db = ViewableConn::new(raw).with_clock(ReferenceClock::fixed(now));

    let mode_ids = |mode| {
        let db = &db;
        async move {
            let rows = db
                .find::<widget::Entity>(mode)
                .filter(widget::Column::Id.gte(10))
                .order_by(widget::Column::Id, Order::Asc)
                .all(db)
                .await
                .unwrap();
            ids(&rows)
        }
    };
    let published = mode_ids(Visibility::Default).await;
    let unpublished = mode_ids(Visibility::OnlyUnpublished).await;
    let all = mode_ids(Visibility::WithPublished).await;

    assert_eq!(published, vec![10, 13]);
    assert_eq!(unpublished, vec![11, 12]);
    assert_eq!(published.len() + unpublished.len(), all.len());
    assert!(published.iter().all(|id| !unpublished.contains(id)));
}
