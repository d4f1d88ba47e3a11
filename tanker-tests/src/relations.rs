use crate::{base_config, clear_tables, open};
use tanker_core::{Driver, Value};

async fn seed_teams<D: Driver>(scope: &mut tanker_core::Scope<D>) {
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
            ],
        )
        .await
        .unwrap();
}

/// Foreign keys are resolved from natural keys at write time and expanded
/// back through joins at read time.
pub async fn foreign_key_by_name<D: Driver>(db_uri: &str) {
    let mut scope = open::<D>(base_config(db_uri)).await.unwrap();
    clear_tables(&mut scope).await.unwrap();
    seed_teams(&mut scope).await;
    let view = scope
        .view_fields("team", &["name", "country.name"])
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
            ("Blue".to_string(), "Belgium".to_string()),
            ("Red".to_string(), "Belgium".to_string()),
        ]
    );

    // The stored fk is a plain integer pointing at the country row.
    let raw = scope
        .view_fields("team", &["name", "country"])
        .unwrap()
        .read()
        .filter_eq("name", "Blue")
        .fetch(&mut scope)
        .await
        .unwrap()
        .one()
        .unwrap();
    assert!(raw[1].as_i64().is_some());
    scope.commit().await.unwrap();
}

/// A write path crossing two relations resolves each hop on its own
/// natural key.
pub async fn nested_path_write<D: Driver>(db_uri: &str) {
    let mut scope = open::<D>(base_config(db_uri)).await.unwrap();
    clear_tables(&mut scope).await.unwrap();
    seed_teams(&mut scope).await;
    let view = scope
        .view_fields(
            "member",
            &["name", "registration_code", "team.name", "team.country.name"],
        )
        .unwrap();
    view.write()
        .exec(
            &mut scope,
            vec![
                vec![
                    "Bob".into(),
                    "B-1".into(),
                    "Blue".into(),
                    "Belgium".into(),
                ],
                vec!["Eve".into(), "E-1".into(), "Red".into(), "Belgium".into()],
            ],
        )
        .await
        .unwrap();
    let rows = view.read().order("registration_code").fetch(&mut scope).await.unwrap();
    let summary: Vec<(String, String)> = rows
        .iter()
        .map(|row| {
            (
                row[0].as_str().unwrap().to_string(),
                row[2].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        summary,
        [
            ("Bob".to_string(), "Blue".to_string()),
            ("Eve".to_string(), "Red".to_string()),
        ]
    );

    // Reading through the virtual one-to-many edge fans out per member.
    let members = scope
        .view_fields("team", &["name", "members.name"])
        .unwrap()
        .read()
        .filter_eq("name", "Blue")
        .fetch(&mut scope)
        .await
        .unwrap()
        .all();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0][1], Value::Varchar(Some("Bob".to_string())));
    scope.commit().await.unwrap();
}

/// Deleting a parent cascades along the stored fk edges.
pub async fn cascade_delete<D: Driver>(db_uri: &str) {
    let mut scope = open::<D>(base_config(db_uri)).await.unwrap();
    clear_tables(&mut scope).await.unwrap();
    seed_teams(&mut scope).await;
    scope
        .view_fields(
            "member",
            &["name", "registration_code", "team.name", "team.country.name"],
        )
        .unwrap()
        .write()
        .exec(
            &mut scope,
            vec![vec![
                "Bob".into(),
                "B-1".into(),
                "Blue".into(),
                "Belgium".into(),
            ]],
        )
        .await
        .unwrap();
    scope
        .view("country")
        .unwrap()
        .delete()
        .filter("(= name 'Belgium')")
        .exec(&mut scope)
        .await
        .unwrap();
    let teams = scope
        .view_fields("team", &["name"])
        .unwrap()
        .read()
        .fetch(&mut scope)
        .await
        .unwrap();
    assert!(teams.is_empty(), "cascade must remove the dependent teams");
    let members = scope
        .view_fields("member", &["name"])
        .unwrap()
        .read()
        .fetch(&mut scope)
        .await
        .unwrap();
    assert!(members.is_empty(), "cascade must chain through team");
    scope.commit().await.unwrap();
}
