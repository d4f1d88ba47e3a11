use crate::{base_config, clear_tables, open};
use tanker_core::{ArgValue, Driver, Value};

async fn seed<D: Driver>(scope: &mut tanker_core::Scope<D>) {
    scope
        .view_fields("country", &["name"])
        .unwrap()
        .write()
        .exec(
            scope,
            vec![vec!["Belgium".into()], vec!["France".into()]],
        )
        .await
        .unwrap();
    scope
        .view_fields("team", &["name", "country.name"])
        .unwrap()
        .write()
        .exec(
            scope,
            vec![
                vec!["Blue".into(), "Belgium".into()],
                vec!["Red".into(), "Belgium".into()],
                vec!["Green".into(), "France".into()],
            ],
        )
        .await
        .unwrap();
}

/// `{name}` placeholders bind exactly one parameter each, in traversal
/// order.
pub async fn filter_with_argument<D: Driver>(db_uri: &str) {
    let mut scope = open::<D>(base_config(db_uri)).await.unwrap();
    clear_tables(&mut scope).await.unwrap();
    seed(&mut scope).await;
    let view = scope.view_fields("team", &["name"]).unwrap();
    let read = view
        .read()
        .filter("(= country.name {c})")
        .arg("c", "Belgium");
    // The compiled statement carries exactly one bound parameter.
    let query = {
        let writer = scope.writer().unwrap();
        read.to_query(scope.config(), &writer).unwrap()
    };
    assert_eq!(query.params, vec![Value::Varchar(Some("Belgium".into()))]);
    let mut names: Vec<String> = read
        .fetch(&mut scope)
        .await
        .unwrap()
        .all()
        .into_iter()
        .map(|row| row[0].as_str().unwrap().to_string())
        .collect();
    names.sort();
    assert_eq!(names, ["Blue", "Red"]);
    scope.commit().await.unwrap();
}

pub async fn filter_sugar_and_lists<D: Driver>(db_uri: &str) {
    let mut scope = open::<D>(base_config(db_uri)).await.unwrap();
    clear_tables(&mut scope).await.unwrap();
    seed(&mut scope).await;
    let view = scope.view_fields("team", &["name"]).unwrap();

    // Mapping sugar compiles to an equality conjunction.
    let rows = view
        .read()
        .filter_eq("country.name", "France")
        .fetch(&mut scope)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);

    // List arguments expand to one marker per element.
    let rows = view
        .read()
        .filter("(in name {wanted})")
        .arg(
            "wanted",
            ArgValue::List(vec![ArgValue::from("Blue"), ArgValue::from("Green")]),
        )
        .fetch(&mut scope)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);

    // Case-insensitive matching goes through the dialect shim.
    let rows = view
        .read()
        .filter("(ilike name 'bl%')")
        .fetch(&mut scope)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);

    // Multiple filters conjoin.
    let rows = view
        .read()
        .filter("(= country.name 'Belgium')")
        .filter("(!= name 'Red')")
        .fetch(&mut scope)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    scope.commit().await.unwrap();
}

pub async fn order_limit_offset<D: Driver>(db_uri: &str) {
    let mut scope = open::<D>(base_config(db_uri)).await.unwrap();
    clear_tables(&mut scope).await.unwrap();
    seed(&mut scope).await;
    let view = scope.view_fields("team", &["name"]).unwrap();
    let names = |rows: Vec<tanker_core::Row>| -> Vec<String> {
        rows.into_iter()
            .map(|row| row[0].as_str().unwrap().to_string())
            .collect()
    };
    let rows = view
        .read()
        .order("name")
        .fetch(&mut scope)
        .await
        .unwrap()
        .all();
    assert_eq!(names(rows), ["Blue", "Green", "Red"]);
    let rows = view
        .read()
        .order_desc("name")
        .limit(1)
        .fetch(&mut scope)
        .await
        .unwrap()
        .all();
    assert_eq!(names(rows), ["Red"]);
    let rows = view
        .read()
        .order("name")
        .limit(1)
        .offset(1)
        .fetch(&mut scope)
        .await
        .unwrap()
        .all();
    assert_eq!(names(rows), ["Green"]);
    scope.commit().await.unwrap();
}
