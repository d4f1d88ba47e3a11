use crate::{base_config, clear_tables, open};
use tanker_core::Driver;

pub async fn delete_by_filter_and_data<D: Driver>(db_uri: &str) {
    let mut scope = open::<D>(base_config(db_uri)).await.unwrap();
    clear_tables(&mut scope).await.unwrap();
    let view = scope.view_fields("speaker", &["name", "bio"]).unwrap();
    view.write()
        .exec(
            &mut scope,
            vec![
                vec!["John".into(), "a".into()],
                vec!["Jack".into(), "b".into()],
                vec!["Jill".into(), "c".into()],
            ],
        )
        .await
        .unwrap();

    // By filter, with a bound argument.
    let deleted = scope
        .view_fields("speaker", &["name"])
        .unwrap()
        .delete()
        .filter("(= name {who})")
        .arg("who", "John")
        .exec(&mut scope)
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    // By data: rows matching on the natural key go away.
    let deleted = scope
        .view_fields("speaker", &["name"])
        .unwrap()
        .delete()
        .exec_data(&mut scope, vec![vec!["Jack".into()]])
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    let rows = view.read().fetch(&mut scope).await.unwrap();
    assert_eq!(rows.len(), 1);

    // Swap inverts the match: everything else goes.
    let view_names = scope.view_fields("speaker", &["name"]).unwrap();
    view_names
        .write()
        .exec(&mut scope, vec![vec!["Joan".into()]])
        .await
        .unwrap();
    let deleted = view_names
        .delete()
        .filter("(= name 'Jill')")
        .swap()
        .exec(&mut scope)
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    scope.commit().await.unwrap();
}
