use crate::{base_config, clear_tables, open};
use tanker_core::{Driver, Error, Value};

pub async fn purge_and_partial_writes<D: Driver>(db_uri: &str) {
    let mut scope = open::<D>(base_config(db_uri)).await.unwrap();
    clear_tables(&mut scope).await.unwrap();
    let view = scope.view_fields("speaker", &["name", "bio"]).unwrap();
    view.write()
        .exec(
            &mut scope,
            vec![
                vec!["John".into(), "a".into()],
                vec!["Jack".into(), "b".into()],
            ],
        )
        .await
        .unwrap();

    // Purge drops the rows absent from the staged data.
    let result = view
        .write()
        .purge()
        .exec(&mut scope, vec![vec!["John".into(), "a2".into()]])
        .await
        .unwrap();
    assert_eq!(result.deleted, 1);
    let rows = view.read().fetch(&mut scope).await.unwrap();
    assert_eq!(rows.len(), 1);

    // update-only: no new rows appear.
    view.write()
        .no_insert()
        .exec(
            &mut scope,
            vec![
                vec!["John".into(), "a3".into()],
                vec!["Newcomer".into(), "x".into()],
            ],
        )
        .await
        .unwrap();
    let rows = view.read().fetch(&mut scope).await.unwrap();
    assert_eq!(rows.len(), 1);
    let row = view
        .read()
        .filter_eq("name", "John")
        .fetch(&mut scope)
        .await
        .unwrap()
        .one()
        .unwrap();
    assert_eq!(row[1], Value::Varchar(Some("a3".to_string())));

    // insert-only: existing rows stay untouched.
    view.write()
        .no_update()
        .exec(
            &mut scope,
            vec![
                vec!["John".into(), "clobbered".into()],
                vec!["Fresh".into(), "f".into()],
            ],
        )
        .await
        .unwrap();
    let row = view
        .read()
        .filter_eq("name", "John")
        .fetch(&mut scope)
        .await
        .unwrap()
        .one()
        .unwrap();
    assert_eq!(row[1], Value::Varchar(Some("a3".to_string())));
    let rows = view.read().fetch(&mut scope).await.unwrap();
    assert_eq!(rows.len(), 2);
    scope.commit().await.unwrap();
}

/// A NULL in a key column is refused at staging time and surfaces as a
/// constraint error.
pub async fn constraint_violation<D: Driver>(db_uri: &str) {
    let mut scope = open::<D>(base_config(db_uri)).await.unwrap();
    clear_tables(&mut scope).await.unwrap();
    let error = scope
        .view_fields("team", &["name", "country.name"])
        .unwrap()
        .write()
        .exec(&mut scope, vec![vec!["Blue".into(), Value::Null]])
        .await
        .expect_err("a NULL key column must fail");
    assert!(
        matches!(error, Error::Constraint { .. }),
        "expected a constraint violation, got {:?}",
        error
    );
    scope.rollback().await.unwrap();
}
