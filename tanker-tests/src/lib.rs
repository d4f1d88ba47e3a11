mod acl;
mod aggregates;
mod deletes;
mod filters;
mod relations;
mod roundtrip;
mod writes;

use log::LevelFilter;
use tanker_core::{Config, Driver, Pool, Result, Scope, TableDecl};

pub fn init_logs() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(LevelFilter::Warn)
        .try_init();
}

/// The schema every scenario runs against.
pub fn schema() -> Vec<TableDecl> {
    vec![
        TableDecl::new("country").column("name", "varchar"),
        TableDecl::new("team")
            .column("name", "varchar")
            .column("country", "m2o country.id")
            .column("members", "o2m member.team")
            .key(&["name", "country"]),
        TableDecl::new("member")
            .column("name", "varchar")
            .column("registration_code", "varchar")
            .column("team", "m2o team.id")
            .key(&["registration_code"]),
        TableDecl::new("speaker")
            .column("name", "varchar")
            .column("bio", "varchar")
            .key(&["name"]),
        TableDecl::new("event")
            .column("name", "varchar")
            .column("date", "date")
            .key(&["name"]),
        TableDecl::new("event_speaker")
            .column("event", "m2o event.id")
            .column("speaker", "m2o speaker.id")
            .key(&["event", "speaker"]),
    ]
}

pub fn base_config(db_uri: &str) -> Config {
    Config::new(db_uri).schema(schema())
}

pub async fn open<D: Driver>(config: Config) -> Result<Scope<D>> {
    Pool::<D>::new(config)?.scope().await
}

/// Clear every table so a scenario starts from a known state.
pub async fn clear_tables<D: Driver>(scope: &mut Scope<D>) -> Result<()> {
    for table in [
        "event_speaker",
        "member",
        "team",
        "event",
        "speaker",
        "country",
    ] {
        scope.view(table)?.delete().exec(scope).await?;
    }
    Ok(())
}

pub async fn execute_tests<D: Driver>(db_uri: &str) {
    init_logs();
    {
        let mut scope = open::<D>(base_config(db_uri))
            .await
            .expect("cannot open the database");
        scope
            .create_tables()
            .await
            .expect("failed to deploy the schema");
        scope.commit().await.expect("failed to commit the schema");
    }
    roundtrip::country_roundtrip::<D>(db_uri).await;
    roundtrip::write_is_idempotent::<D>(db_uri).await;
    roundtrip::upsert_on_conflict::<D>(db_uri).await;
    relations::foreign_key_by_name::<D>(db_uri).await;
    relations::nested_path_write::<D>(db_uri).await;
    relations::cascade_delete::<D>(db_uri).await;
    filters::filter_with_argument::<D>(db_uri).await;
    filters::filter_sugar_and_lists::<D>(db_uri).await;
    filters::order_limit_offset::<D>(db_uri).await;
    aggregates::group_by_inference::<D>(db_uri).await;
    deletes::delete_by_filter_and_data::<D>(db_uri).await;
    writes::purge_and_partial_writes::<D>(db_uri).await;
    writes::constraint_violation::<D>(db_uri).await;
    acl::acl_read_correlated::<D>(db_uri).await;
    acl::acl_write_filters_rows::<D>(db_uri).await;
    scope_handling::<D>(db_uri).await;
}

/// Using a scope after commit fails instead of touching the database.
async fn scope_handling<D: Driver>(db_uri: &str) {
    let mut scope = open::<D>(base_config(db_uri)).await.unwrap();
    scope.commit().await.unwrap();
    let error = scope
        .view("country")
        .unwrap()
        .read()
        .fetch(&mut scope)
        .await
        .expect_err("closed scope must refuse to run queries");
    assert!(matches!(error, tanker_core::Error::NotInScope));
}
