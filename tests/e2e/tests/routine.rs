//! Server-side routine execution.

use chrono::{DateTime, Utc};
use ephemdb_e2e::harness;

#[tokio::test]
async fn server_side_routine_returns_the_current_timestamp() {
    let mut db = harness::provision_postgres()
        .await
        .expect("provisioning must succeed");

    let client = db.connect().await.expect("connection must open");
    client
        .batch_execute(
            "CREATE OR REPLACE FUNCTION current_db_time() RETURNS timestamptz \
             LANGUAGE sql AS 'SELECT now()'",
        )
        .await
        .expect("routine creation must succeed");

    let row = client
        .query_one("SELECT current_db_time()", &[])
        .await
        .expect("routine invocation must succeed");
    let db_time: DateTime<Utc> = row.get(0);

    let skew = (Utc::now() - db_time).num_minutes().abs();
    assert!(skew < 5, "database clock skewed {skew} minutes from local clock");

    db.dispose().await;
}
