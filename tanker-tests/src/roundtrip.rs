use crate::{base_config, clear_tables, open};
use tanker_core::{Driver, Row, Value};

fn names(rows: Vec<Row>) -> Vec<String> {
    let mut names: Vec<String> = rows
        .into_iter()
        .map(|row| match &row[0] {
            Value::Varchar(Some(v)) => v.clone(),
            other => panic!("expected a string, got {:?}", other),
        })
        .collect();
    names.sort();
    names
}

pub async fn country_roundtrip<D: Driver>(db_uri: &str) {
    let mut scope = open::<D>(base_config(db_uri)).await.unwrap();
    clear_tables(&mut scope).await.unwrap();
    let view = scope.view_fields("country", &["name"]).unwrap();
    view.write()
        .exec(
            &mut scope,
            vec![vec!["Belgium".into()], vec!["France".into()]],
        )
        .await
        .expect("failed to write countries");
    let rows = view.read().fetch(&mut scope).await.unwrap().all();
    assert_eq!(names(rows), ["Belgium", "France"]);
    scope.commit().await.unwrap();
}

pub async fn write_is_idempotent<D: Driver>(db_uri: &str) {
    let mut scope = open::<D>(base_config(db_uri)).await.unwrap();
    clear_tables(&mut scope).await.unwrap();
    let view = scope.view_fields("country", &["name"]).unwrap();
    let rows = vec![vec![Value::from("Belgium")], vec![Value::from("France")]];
    view.write().exec(&mut scope, rows.clone()).await.unwrap();
    view.write().exec(&mut scope, rows).await.unwrap();
    let rows = view.read().fetch(&mut scope).await.unwrap().all();
    assert_eq!(names(rows), ["Belgium", "France"]);
    scope.commit().await.unwrap();
}

/// Writing over an existing natural key updates the row in place.
pub async fn upsert_on_conflict<D: Driver>(db_uri: &str) {
    let mut scope = open::<D>(base_config(db_uri)).await.unwrap();
    clear_tables(&mut scope).await.unwrap();
    let view = scope.view_fields("speaker", &["name", "bio"]).unwrap();
    view.write()
        .exec(&mut scope, vec![vec!["John".into(), "Bio1".into()]])
        .await
        .unwrap();
    view.write()
        .exec(
            &mut scope,
            vec![
                vec!["John".into(), "Bio2".into()],
                vec!["Jack".into(), "Bio3".into()],
            ],
        )
        .await
        .unwrap();
    let mut rows: Vec<(String, String)> = view
        .read()
        .fetch(&mut scope)
        .await
        .unwrap()
        .all()
        .into_iter()
        .map(|row| {
            (
                row[0].as_str().unwrap().to_string(),
                row[1].as_str().unwrap().to_string(),
            )
        })
        .collect();
    rows.sort();
    assert_eq!(
        rows,
        [
            ("Jack".to_string(), "Bio3".to_string()),
            ("John".to_string(), "Bio2".to_string()),
        ]
    );
    scope.commit().await.unwrap();
}
