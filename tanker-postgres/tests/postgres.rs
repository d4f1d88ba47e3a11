use std::env;
use tanker_postgres::PostgresDriver;
use tanker_tests::execute_tests;

/// Runs against the database named by TANKER_POSTGRES_TEST, e.g.
/// `postgresql://user:pw@localhost/tanker_test`. Skipped otherwise.
#[tokio::test]
async fn postgres() {
    let Ok(db_uri) = env::var("TANKER_POSTGRES_TEST") else {
        eprintln!("TANKER_POSTGRES_TEST not set, skipping the postgres scenarios");
        return;
    };
    execute_tests::<PostgresDriver>(&db_uri).await;
}
