//! Provisioner error types.

use std::time::Duration;

use crate::provisioner::LifecyclePhase;

/// Errors produced while provisioning or tearing down an ephemeral
/// database instance.
///
/// Startup failures (`StartupTimeout`, `Probe`, `Runtime`,
/// `UnknownServiceName`) are fatal to the test that requested the
/// instance and are never retried internally. `State` marks caller
/// misuse. `Cleanup` is only produced during disposal and is logged and
/// swallowed by [`dispose`](crate::Provisioner::dispose) rather than
/// surfaced, so a teardown failure cannot mask an earlier test failure.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// The instance never accepted connections within the probe deadline.
    #[error("instance not ready after {waited:?}; last probe error: {last_error}")]
    StartupTimeout {
        /// Time spent probing before giving up.
        waited: Duration,
        /// Outcome of the final connection attempt.
        #[source]
        last_error: std::io::Error,
    },

    /// The readiness probe failed for a reason retrying cannot fix
    /// (e.g. the runtime handed back an unresolvable host).
    #[error("readiness probe failed: {0}")]
    Probe(#[source] std::io::Error),

    /// Container runtime failure while pulling, starting, or inspecting
    /// the instance.
    #[error("container runtime error: {0}")]
    Runtime(#[from] testcontainers::TestcontainersError),

    /// The image has no entry in the default-service-name mapping and the
    /// spec did not name a database explicitly.
    #[error("no default service name known for image {image}; set one with EngineSpec::with_database")]
    UnknownServiceName {
        /// Image reference (`repository:tag`) that failed to resolve.
        image: String,
    },

    /// An operation was invoked in the wrong lifecycle phase.
    #[error("{operation} is not valid while the instance is {phase}")]
    State {
        /// Operation the caller attempted.
        operation: &'static str,
        /// Phase the provisioner was observed in.
        phase: LifecyclePhase,
    },

    /// Teardown failure during container stop or removal.
    #[error("cleanup failed: {0}")]
    Cleanup(#[source] testcontainers::TestcontainersError),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ProvisionError>;
