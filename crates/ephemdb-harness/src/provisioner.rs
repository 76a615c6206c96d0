//! Ephemeral instance lifecycle.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

use crate::descriptor::InstanceDescriptor;
use crate::engine::{EngineSpec, ReadyMessage};
use crate::error::{ProvisionError, Result};
use crate::probe;

/// Tuning knobs for instance startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionOptions {
    /// Ceiling for container start plus the engine's ready-log line.
    pub startup_timeout: Duration,
    /// Ceiling for the TCP readiness probe once the container is up.
    pub probe_timeout: Duration,
    /// Delay between probe attempts.
    pub probe_interval: Duration,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(120),
            probe_timeout: Duration::from_secs(30),
            probe_interval: Duration::from_millis(500),
        }
    }
}

impl ProvisionOptions {
    #[must_use]
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }
}

/// Externally observable lifecycle phase of a [`Provisioner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Uninitialized,
    Starting,
    Ready,
    Failed,
    Disposed,
}

impl LifecyclePhase {
    /// Wire-format string for logs and error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Disposed => "disposed",
        }
    }
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

enum State {
    Uninitialized,
    Starting,
    Ready(Box<ReadyInstance>),
    Failed,
    Disposed,
}

impl State {
    fn phase(&self) -> LifecyclePhase {
        match self {
            Self::Uninitialized => LifecyclePhase::Uninitialized,
            Self::Starting => LifecyclePhase::Starting,
            Self::Ready(_) => LifecyclePhase::Ready,
            Self::Failed => LifecyclePhase::Failed,
            Self::Disposed => LifecyclePhase::Disposed,
        }
    }
}

struct ReadyInstance {
    container: ContainerAsync<GenericImage>,
    descriptor: InstanceDescriptor,
}

/// Provisions one disposable database container.
///
/// State machine: Uninitialized → Starting → {Ready, Failed}; every phase
/// moves to Disposed exactly once. No phase is re-enterable, so a
/// provisioner serves exactly one instance and one test.
///
/// If the owning task is cancelled while [`initialize`](Self::initialize)
/// is suspended, the container handle in scope is dropped and the runtime
/// drop guard removes the container; the same guard backs a provisioner
/// dropped without an explicit [`dispose`](Self::dispose).
pub struct Provisioner {
    spec: EngineSpec,
    options: ProvisionOptions,
    state: State,
}

impl Provisioner {
    /// Provisioner for `spec` with default options.
    #[must_use]
    pub fn new(spec: EngineSpec) -> Self {
        Self::with_options(spec, ProvisionOptions::default())
    }

    /// Provisioner for `spec` with explicit startup/probe tuning.
    #[must_use]
    pub fn with_options(spec: EngineSpec, options: ProvisionOptions) -> Self {
        Self {
            spec,
            options,
            state: State::Uninitialized,
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> LifecyclePhase {
        self.state.phase()
    }

    /// Launch the container and suspend until the engine accepts
    /// connections, then compute the instance descriptor.
    ///
    /// # Errors
    ///
    /// [`ProvisionError::State`] unless the provisioner is uninitialized.
    /// Startup failures ([`ProvisionError::Runtime`],
    /// [`ProvisionError::StartupTimeout`], [`ProvisionError::Probe`],
    /// [`ProvisionError::UnknownServiceName`]) leave the provisioner in
    /// the failed phase; they are fatal to the calling test and are not
    /// retried internally.
    pub async fn initialize(&mut self) -> Result<()> {
        if !matches!(self.state, State::Uninitialized) {
            return Err(ProvisionError::State {
                operation: "initialize",
                phase: self.phase(),
            });
        }
        self.state = State::Starting;

        match self.start_instance().await {
            Ok(ready) => {
                tracing::info!(
                    image = %self.spec.image(),
                    instance = %ready.descriptor,
                    "Ephemeral instance ready"
                );
                self.state = State::Ready(Box::new(ready));
                Ok(())
            }
            Err(err) => {
                tracing::error!(image = %self.spec.image(), error = %err, "Provisioning failed");
                self.state = State::Failed;
                Err(err)
            }
        }
    }

    /// Connection coordinates of the running instance.
    ///
    /// # Errors
    ///
    /// [`ProvisionError::State`] unless the instance is ready; a
    /// descriptor is never observable in any other phase.
    pub fn descriptor(&self) -> Result<&InstanceDescriptor> {
        match &self.state {
            State::Ready(ready) => Ok(&ready.descriptor),
            _ => Err(ProvisionError::State {
                operation: "descriptor",
                phase: self.phase(),
            }),
        }
    }

    /// Stop and remove the container, releasing its network and storage.
    ///
    /// Idempotent and safe in every phase, including after a failed or
    /// never-completed `initialize`. Cleanup failures are logged at
    /// `warn` and swallowed so they cannot mask an earlier test failure.
    pub async fn dispose(&mut self) {
        match std::mem::replace(&mut self.state, State::Disposed) {
            State::Ready(ready) => {
                tracing::debug!(instance = %ready.descriptor, "Disposing ephemeral instance");
                if let Err(err) = Self::tear_down(ready.container).await {
                    tracing::warn!(error = %err, "Ephemeral instance cleanup failed");
                }
            }
            State::Disposed => {
                tracing::debug!("dispose called on an already-disposed instance");
            }
            State::Uninitialized | State::Starting | State::Failed => {}
        }
    }

    async fn start_instance(&self) -> Result<ReadyInstance> {
        let Some(database) = self.spec.database() else {
            return Err(ProvisionError::UnknownServiceName {
                image: self.spec.image(),
            });
        };
        let database = database.to_owned();

        let mut image = GenericImage::new(self.spec.repository(), self.spec.tag())
            .with_exposed_port(self.spec.port().tcp());
        if let Some(message) = self.spec.ready_message() {
            image = image.with_wait_for(match message {
                ReadyMessage::Stdout(line) => WaitFor::message_on_stdout(line.as_str()),
                ReadyMessage::Stderr(line) => WaitFor::message_on_stderr(line.as_str()),
            });
        }

        let mut request = image.with_startup_timeout(self.options.startup_timeout);
        for (key, value) in self.spec.env() {
            request = request.with_env_var(key.as_str(), value.as_str());
        }

        tracing::debug!(image = %self.spec.image(), "Starting container");
        let container = request.start().await?;

        let host = container.get_host().await?.to_string();
        let port = container
            .get_host_port_ipv4(self.spec.port().tcp())
            .await?;

        probe::wait_until_accepting(
            &host,
            port,
            self.options.probe_timeout,
            self.options.probe_interval,
        )
        .await?;

        let descriptor = InstanceDescriptor::new(
            host,
            port,
            self.spec.username().to_owned(),
            self.spec.password().to_owned(),
            database,
        );
        Ok(ReadyInstance {
            container,
            descriptor,
        })
    }

    // Stop failures fall through to the runtime drop guard, which still
    // removes the container when the handle is dropped.
    async fn tear_down(container: ContainerAsync<GenericImage>) -> Result<()> {
        container.stop().await.map_err(ProvisionError::Cleanup)?;
        container.rm().await.map_err(ProvisionError::Cleanup)?;
        Ok(())
    }
}

impl Drop for Provisioner {
    fn drop(&mut self) {
        if matches!(self.state, State::Ready(_)) {
            tracing::warn!(
                image = %self.spec.image(),
                "Provisioner dropped while ready; container removal left to the runtime drop guard"
            );
        }
    }
}
