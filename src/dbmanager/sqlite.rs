use crate::dbmanager::account::AuthAccount;
use crate::dbmanager::driver::Driver;
use crate::error::PanelError;
use async_trait::async_trait;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};
use tracing::debug;

/// SQLite "login": the database name is a file path that must already exist.
pub struct SqliteDriver;

#[async_trait]
impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn login(&self, account: &AuthAccount) -> Result<(), PanelError> {
        if account.db.is_empty() {
            return Err(PanelError::EmptyCredentials("sqlite needs a database file"));
        }
        let failed = |e: sqlx::Error| PanelError::LoginFailed {
            driver: self.name().to_string(),
            reason: e.to_string(),
        };

        let mut conn = SqliteConnectOptions::new()
            .filename(&account.db)
            .create_if_missing(false)
            .read_only(true)
            .connect()
            .await
            .map_err(failed)?;
        conn.ping().await.map_err(failed)?;
        conn.close().await.map_err(failed)?;

        debug!(file = %account.db, "sqlite login verified");
        Ok(())
    }
}
