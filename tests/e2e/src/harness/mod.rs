use std::sync::Once;

use anyhow::{Context, Result};
use ephemdb_harness::{EngineSpec, InstanceDescriptor, Provisioner};
use tokio_postgres::NoTls;
use tracing_subscriber::EnvFilter;

/// Pinned image tag every e2e test provisions against.
pub const POSTGRES_TAG: &str = "16-alpine";

static INIT_LOGGING: Once = Once::new();

/// Initialize structured logging once per test binary.
///
/// Uses the `RUST_LOG` env var if set, otherwise falls back to `info`.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// One ephemeral Postgres instance, owned by a single test.
///
/// Tests never share an instance; every case provisions its own container
/// and disposes it before returning.
pub struct TestDatabase {
    provisioner: Provisioner,
}

/// Provision a fresh Postgres container for the calling test.
pub async fn provision_postgres() -> Result<TestDatabase> {
    init_logging();
    let mut provisioner = Provisioner::new(EngineSpec::postgres(POSTGRES_TAG));
    provisioner
        .initialize()
        .await
        .context("failed to provision ephemeral postgres")?;
    Ok(TestDatabase { provisioner })
}

impl TestDatabase {
    /// Connection coordinates of the running instance.
    pub fn descriptor(&self) -> Result<&InstanceDescriptor> {
        Ok(self.provisioner.descriptor()?)
    }

    /// Open a client session against the instance.
    pub async fn connect(&self) -> Result<tokio_postgres::Client> {
        let descriptor = self.provisioner.descriptor()?;
        let (client, connection) = tokio_postgres::connect(&descriptor.keyword_connstr(), NoTls)
            .await
            .context("failed to connect to postgres")?;

        tokio::spawn(async move {
            let _ = connection.await;
        });

        Ok(client)
    }

    /// Tear the instance down. Safe to call more than once.
    pub async fn dispose(&mut self) {
        self.provisioner.dispose().await;
    }
}
