//! Provisioning lifecycle against a real container runtime.

use ephemdb_e2e::harness;
use ephemdb_harness::{EngineSpec, ProvisionError, Provisioner};
use tokio::net::TcpStream;

#[tokio::test]
async fn provisioned_instance_publishes_a_reachable_port() {
    harness::init_logging();
    let mut provisioner = Provisioner::new(EngineSpec::postgres(harness::POSTGRES_TAG));
    provisioner
        .initialize()
        .await
        .expect("instance must start");

    let descriptor = provisioner
        .descriptor()
        .expect("descriptor must be readable while ready")
        .clone();
    assert!(!descriptor.host().is_empty());
    assert!(descriptor.port() > 0);

    TcpStream::connect((descriptor.host(), descriptor.port()))
        .await
        .expect("published port must accept connections");

    provisioner.dispose().await;
}

#[tokio::test]
async fn direct_connection_reports_open() {
    let mut db = harness::provision_postgres()
        .await
        .expect("provisioning must succeed");

    let client = db.connect().await.expect("connection must open");
    client
        .simple_query("SELECT 1")
        .await
        .expect("open connection must answer a trivial query");
    assert!(!client.is_closed());

    db.dispose().await;
}

#[tokio::test]
async fn dispose_is_idempotent_and_seals_the_descriptor() {
    harness::init_logging();
    let mut provisioner = Provisioner::new(EngineSpec::postgres(harness::POSTGRES_TAG));
    provisioner
        .initialize()
        .await
        .expect("instance must start");

    provisioner.dispose().await;
    provisioner.dispose().await;

    let err = provisioner
        .descriptor()
        .expect_err("descriptor must be unobservable after dispose");
    assert!(matches!(err, ProvisionError::State { .. }), "got: {err}");
}
