use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_query;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::dsn::{connection_parameters, mask_password, pg_environment, render_parameters};
use super::{DatabaseProbe, EnvironmentReport, ObjectReport, ProbeError};

const CURSOR_NAME: &str = "pgtester_probe";
const CURSOR_QUERY: &str = "SELECT 1";

/// Probes a live PostgreSQL server.
///
/// Each call opens its own connection on the blocking pool and drops it before
/// returning, so nothing is held between requests.
#[derive(Clone)]
pub struct PgDatabaseProbe {
    database_url: Option<Arc<str>>,
}

impl PgDatabaseProbe {
    pub fn new(database_url: Option<String>) -> Self {
        Self {
            database_url: database_url.map(Arc::from),
        }
    }

    async fn run_blocking<T, F>(&self, probe: F) -> Result<T, ProbeError>
    where
        T: Send + 'static,
        F: FnOnce(&str) -> Result<T, ProbeError> + Send + 'static,
    {
        let database_url = self
            .database_url
            .clone()
            .ok_or(ProbeError::MissingDatabaseUrl)?;
        tokio::task::spawn_blocking(move || probe(&*database_url)).await?
    }
}

fn describe_connection(database_url: &str) -> Result<String, ProbeError> {
    let params = connection_parameters(database_url)?;
    Ok(format!(
        "<PgConnection object; dsn: '{}', closed: 0>",
        render_parameters(&params)
    ))
}

#[async_trait]
impl DatabaseProbe for PgDatabaseProbe {
    #[instrument(skip_all)]
    async fn connection(&self) -> Result<ObjectReport, ProbeError> {
        self.run_blocking(|database_url| {
            let connection = PgConnection::establish(database_url)?;
            debug!("Connection established");
            let representation = describe_connection(database_url)?;
            drop(connection);

            Ok(ObjectReport {
                representation,
                type_name: "PgConnection".to_string(),
            })
        })
        .await
    }

    #[instrument(skip_all)]
    async fn cursor(&self) -> Result<ObjectReport, ProbeError> {
        self.run_blocking(|database_url| {
            let mut connection = PgConnection::establish(database_url)?;
            let connection_repr = describe_connection(database_url)?;

            // Cursors only live inside a transaction
            let representation = connection.transaction::<_, ProbeError, _>(|conn| {
                sql_query(format!("DECLARE {CURSOR_NAME} CURSOR FOR {CURSOR_QUERY}"))
                    .execute(conn)?;
                let representation = format!(
                    "<PgCursor object; name: '{CURSOR_NAME}', query: '{CURSOR_QUERY}', \
                     connection: {connection_repr}, closed: 0>"
                );
                sql_query(format!("CLOSE {CURSOR_NAME}")).execute(conn)?;
                Ok(representation)
            })?;
            debug!("Cursor declared and closed");

            Ok(ObjectReport {
                representation,
                type_name: "PgCursor".to_string(),
            })
        })
        .await
    }

    #[instrument(skip_all)]
    async fn environment(&self) -> Result<EnvironmentReport, ProbeError> {
        self.run_blocking(|database_url| {
            let connection = PgConnection::establish(database_url)?;
            drop(connection);

            Ok(EnvironmentReport {
                db_url: mask_password(database_url)?,
                env_vars: pg_environment(std::env::vars_os()),
                connection_params: connection_parameters(database_url)?,
            })
        })
        .await
    }
}
