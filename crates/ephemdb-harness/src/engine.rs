//! Database engine and image specification.
//!
//! An [`EngineSpec`] pins the container image and carries everything the
//! provisioner needs to launch it: wire port, credential environment, the
//! engine's ready-log line, and the default service name for the image in
//! use. Default service names come from an explicit versioned mapping
//! rather than textual substitution; image families have renamed their
//! default pluggable database across major versions.

use serde::{Deserialize, Serialize};

/// Log line that marks engine startup, and the stream it appears on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyMessage {
    /// Line printed to the container's stdout.
    Stdout(String),
    /// Line printed to the container's stderr.
    Stderr(String),
}

/// Specification of the database image to provision.
///
/// Known engines come with complete presets ([`EngineSpec::postgres`],
/// [`EngineSpec::oracle_free`]); anything else starts from
/// [`EngineSpec::custom`] and wires credentials, environment, and the
/// service name explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSpec {
    repository: String,
    tag: String,
    port: u16,
    username: String,
    password: String,
    database: Option<String>,
    env: Vec<(String, String)>,
    ready_message: Option<ReadyMessage>,
}

impl EngineSpec {
    /// Postgres at the given pinned tag (e.g. `"16-alpine"`).
    #[must_use]
    pub fn postgres(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let database = default_service_name("postgres", &tag).map(str::to_owned);
        Self {
            repository: "postgres".to_owned(),
            port: 5432,
            username: "postgres".to_owned(),
            password: "postgres".to_owned(),
            env: vec![
                ("POSTGRES_USER".to_owned(), "postgres".to_owned()),
                ("POSTGRES_PASSWORD".to_owned(), "postgres".to_owned()),
                ("POSTGRES_DB".to_owned(), "postgres".to_owned()),
            ],
            ready_message: Some(ReadyMessage::Stderr(
                "database system is ready to accept connections".to_owned(),
            )),
            tag,
            database,
        }
    }

    /// Oracle Database Free (`gvenzl/oracle-free`) at the given pinned tag.
    #[must_use]
    pub fn oracle_free(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let database = default_service_name("gvenzl/oracle-free", &tag).map(str::to_owned);
        Self {
            repository: "gvenzl/oracle-free".to_owned(),
            port: 1521,
            username: "system".to_owned(),
            password: "oracle".to_owned(),
            env: vec![("ORACLE_PASSWORD".to_owned(), "oracle".to_owned())],
            ready_message: Some(ReadyMessage::Stdout("DATABASE IS READY TO USE!".to_owned())),
            tag,
            database,
        }
    }

    /// Arbitrary image. Credentials and environment start empty, and the
    /// service name resolves only if the repository is a known family;
    /// otherwise set one with [`with_database`](Self::with_database).
    #[must_use]
    pub fn custom(repository: impl Into<String>, tag: impl Into<String>, port: u16) -> Self {
        let repository = repository.into();
        let tag = tag.into();
        let database = default_service_name(&repository, &tag).map(str::to_owned);
        Self {
            repository,
            tag,
            port,
            username: String::new(),
            password: String::new(),
            database,
            env: Vec::new(),
            ready_message: None,
        }
    }

    /// Override the default schema/service name for the instance.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the credentials reported in the instance descriptor.
    ///
    /// Known-engine presets keep credentials and container environment in
    /// sync; for custom images pass the matching environment via
    /// [`with_env`](Self::with_env) as well.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Add a container environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the log line the runtime waits for before the probe runs.
    #[must_use]
    pub fn with_ready_message(mut self, message: ReadyMessage) -> Self {
        self.ready_message = Some(message);
        self
    }

    /// Image repository (e.g. `"postgres"`).
    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Pinned image tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Full image reference, `repository:tag`.
    #[must_use]
    pub fn image(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }

    /// Wire port the engine listens on inside the container.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Username reported in the instance descriptor.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password reported in the instance descriptor.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Default schema/service name, if resolved or set.
    #[must_use]
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Container environment passed at startup.
    #[must_use]
    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    /// Ready-log line, if the engine has one.
    #[must_use]
    pub fn ready_message(&self) -> Option<&ReadyMessage> {
        self.ready_message.as_ref()
    }
}

/// Default service name for a known image repository at a given tag.
///
/// Explicit, versioned entries only. `gvenzl/oracle-xe` renamed its
/// default pluggable database from `XE` to `XEPDB1` in 18c; non-numeric
/// tags (`latest`, `slim`) track the current major and resolve to the
/// modern name. Unknown repositories resolve to `None` and require the
/// caller to name the database explicitly.
#[must_use]
pub fn default_service_name(repository: &str, tag: &str) -> Option<&'static str> {
    match repository {
        "postgres" => Some("postgres"),
        "gvenzl/oracle-free" => Some("FREEPDB1"),
        "gvenzl/oracle-xe" => match tag_major(tag) {
            Some(major) if major < 18 => Some("XE"),
            _ => Some("XEPDB1"),
        },
        _ => None,
    }
}

/// Leading numeric component of an image tag (`"21-slim"` → 21).
fn tag_major(tag: &str) -> Option<u32> {
    let digits: String = tag.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}
