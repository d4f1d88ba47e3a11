use crate::{base_config, clear_tables, open};
use tanker_core::Driver;

/// Mixing aggregates into the projection adds GROUP BY over every plain
/// projection, in projection order.
pub async fn group_by_inference<D: Driver>(db_uri: &str) {
    let mut scope = open::<D>(base_config(db_uri)).await.unwrap();
    clear_tables(&mut scope).await.unwrap();
    scope
        .view_fields("event", &["name", "date"])
        .unwrap()
        .write()
        .exec(
            &mut scope,
            vec![
                vec!["fosdem".into(), "2023-02-04".into()],
                vec!["pycon".into(), "2023-04-19".into()],
                vec!["rustconf".into(), "2024-09-10".into()],
            ],
        )
        .await
        .unwrap();
    let view = scope
        .view_named(
            "event",
            &[("year", "(extract \"year\" date)"), ("n", "(count *)")],
        )
        .unwrap();
    let query = {
        let writer = scope.writer().unwrap();
        view.read().to_query(scope.config(), &writer).unwrap()
    };
    assert!(
        query.sql.contains("GROUP BY"),
        "inferred grouping missing from: {}",
        query.sql
    );
    let mut rows: Vec<(i64, i64)> = view
        .read()
        .order("(extract \"year\" date)")
        .fetch(&mut scope)
        .await
        .unwrap()
        .all()
        .into_iter()
        .map(|row| (row[0].as_i64().unwrap(), row[1].as_i64().unwrap()))
        .collect();
    rows.sort();
    assert_eq!(rows, [(2023, 2), (2024, 1)]);
    scope.commit().await.unwrap();
}
