use std::path::PathBuf;
use tanker_sqlite::SqliteDriver;
use tanker_tests::execute_tests;

#[tokio::test]
async fn sqlite() {
    let path: PathBuf = std::env::temp_dir().join("tanker_tests.sqlite");
    if path.exists() {
        std::fs::remove_file(&path).expect("failed to remove the previous test database");
    }
    let db_uri = format!("sqlite://{}", path.display());
    execute_tests::<SqliteDriver>(&db_uri).await;
}
