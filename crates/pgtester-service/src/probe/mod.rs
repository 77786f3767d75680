use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

pub mod dsn;
pub mod postgres;

pub use postgres::PgDatabaseProbe;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,

    #[error("{0}")]
    InvalidDsn(#[from] dsn::DsnError),

    #[error("{0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("{0}")]
    Query(#[from] diesel::result::Error),

    #[error("Probe task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ProbeError {
    /// Short name reported as the `type` of a failed probe.
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::MissingDatabaseUrl => "ConfigurationError",
            ProbeError::InvalidDsn(_) => "DsnError",
            ProbeError::Connection(_) => "ConnectionError",
            ProbeError::Query(_) => "QueryError",
            ProbeError::Task(_) => "TaskError",
        }
    }
}

/// What a probe saw of a database object it created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectReport {
    pub representation: String,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentReport {
    /// Database URL with the password masked.
    pub db_url: String,
    pub env_vars: BTreeMap<String, String>,
    pub connection_params: BTreeMap<String, String>,
}

/// The database side of the probe endpoints.
#[async_trait]
pub trait DatabaseProbe: Clone + Send + Sync + 'static {
    /// Open a connection and describe it.
    async fn connection(&self) -> Result<ObjectReport, ProbeError>;

    /// Open a connection, declare a cursor on it and describe the cursor.
    async fn cursor(&self) -> Result<ObjectReport, ProbeError>;

    /// Describe the configured connection and the `PG*` environment.
    async fn environment(&self) -> Result<EnvironmentReport, ProbeError>;
}
