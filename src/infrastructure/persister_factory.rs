use std::sync::Arc;

use log::info;
use sqlx::postgres::PgConnectOptions;

use crate::{PostgresSqlPersister, RepositoryPersister, SqlitePersister, StdResult, StoreConfig};

/// Opens the persister described by the store configuration.
pub async fn open_persister(config: &StoreConfig) -> StdResult<Arc<dyn RepositoryPersister>> {
    let persister: Arc<dyn RepositoryPersister> = match config {
        StoreConfig::PostgresUrl(url) => {
            info!("Opening PostgreSQL store from connection string");
            Arc::new(PostgresSqlPersister::try_new(url).await?)
        }
        StoreConfig::Postgres {
            host,
            port,
            database,
            user,
            password,
        } => {
            info!("Opening PostgreSQL store {database} on {host}:{port}");
            Arc::new(
                PostgresSqlPersister::try_new_with_options(
                    PgConnectOptions::new()
                        .host(host)
                        .port(*port)
                        .database(database)
                        .username(user)
                        .password(password),
                )
                .await?,
            )
        }
        StoreConfig::SqliteUrl(url) => {
            info!("Opening SQLite store {url}");
            Arc::new(SqlitePersister::try_new_with_url(url).await?)
        }
        StoreConfig::SqlitePath(path) => {
            info!("Opening SQLite store {}", path.display());
            Arc::new(SqlitePersister::try_new(path).await?)
        }
    };

    Ok(persister)
}
