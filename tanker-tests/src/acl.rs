use crate::{base_config, clear_tables, open};
use tanker_core::Driver;

/// A correlated ACL-read filter hides speakers with no linked event.
pub async fn acl_read_correlated<D: Driver>(db_uri: &str) {
    {
        let mut scope = open::<D>(base_config(db_uri)).await.unwrap();
        clear_tables(&mut scope).await.unwrap();
        scope
            .view_fields("speaker", &["name"])
            .unwrap()
            .write()
            .exec(
                &mut scope,
                vec![vec!["John".into()], vec!["Jack".into()]],
            )
            .await
            .unwrap();
        scope
            .view_fields("event", &["name", "date"])
            .unwrap()
            .write()
            .exec(&mut scope, vec![vec!["fosdem".into(), "2023-02-04".into()]])
            .await
            .unwrap();
        scope
            .view_fields("event_speaker", &["event.name", "speaker.name"])
            .unwrap()
            .write()
            .exec(&mut scope, vec![vec!["fosdem".into(), "John".into()]])
            .await
            .unwrap();
        scope.commit().await.unwrap();
    }

    let config = base_config(db_uri).acl_read(
        "speaker",
        "(exists (from event_speaker (select 1) (where (= speaker _parent.id))))",
    );
    let mut scope = open::<D>(config).await.unwrap();
    let view = scope.view_fields("speaker", &["name"]).unwrap();
    let rows = view.read().fetch(&mut scope).await.unwrap().all();
    assert_eq!(rows.len(), 1, "only the linked speaker passes the ACL");
    assert_eq!(rows[0][0].as_str(), Some("John"));

    // The same read without the ACL sees both speakers.
    let rows = view
        .read()
        .disable_acl()
        .fetch(&mut scope)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    scope.commit().await.unwrap();
}

/// ACL-write purges violating rows from the staged data instead of
/// writing them; the caller learns how many were filtered.
pub async fn acl_write_filters_rows<D: Driver>(db_uri: &str) {
    {
        let mut scope = open::<D>(base_config(db_uri)).await.unwrap();
        clear_tables(&mut scope).await.unwrap();
        scope.commit().await.unwrap();
    }
    let config = base_config(db_uri).acl_write("speaker", "(!= name 'Jack')");
    let mut scope = open::<D>(config).await.unwrap();
    let view = scope.view_fields("speaker", &["name", "bio"]).unwrap();
    let result = view
        .write()
        .exec(
            &mut scope,
            vec![
                vec!["John".into(), "a".into()],
                vec!["Jack".into(), "b".into()],
            ],
        )
        .await
        .unwrap();
    assert_eq!(result.filtered, 1);
    let rows = view.read().fetch(&mut scope).await.unwrap().all();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0].as_str(), Some("John"));
    scope.commit().await.unwrap();
}
