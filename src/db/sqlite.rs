use crate::db::models::{DbAccount, NewDbAccount};
use crate::db::schema::SQLITE_INIT;
use crate::error::PanelError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use tracing::debug;

pub type SqlitePool = Pool<Sqlite>;

const SELECT_COLUMNS: &str = "SELECT id, title, engine, host, user, password, name, options, \
     created_at, updated_at FROM db_accounts";

#[derive(Clone)]
pub struct AccountsStorage {
    pool: SqlitePool,
}

impl AccountsStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` (creating the file if missing) and initialize the schema.
    pub async fn open(database_url: &str) -> Result<Self, PanelError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(connect_opts).await?;
        let storage = Self::new(pool);
        storage.init_schema().await?;
        debug!(database_url, "account storage ready");
        Ok(storage)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), PanelError> {
        // sqlx::query runs a single statement at a time
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Insert a new account. Returns the row id.
    pub async fn insert(&self, account: &NewDbAccount) -> Result<i64, PanelError> {
        let options = account.options_json()?;
        let now = Utc::now().to_rfc3339();
        let res = sqlx::query(
            r#"
            INSERT INTO db_accounts (
                title, engine, host, user, password, name, options, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.title)
        .bind(&account.engine)
        .bind(&account.host)
        .bind(&account.user)
        .bind(account.password.as_deref().unwrap_or_default())
        .bind(&account.name)
        .bind(options.unwrap_or_default())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<DbAccount>, PanelError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_model).transpose()
    }

    pub async fn list(&self) -> Result<Vec<DbAccount>, PanelError> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_model).collect()
    }

    /// Replace the account fields by id, keeping the stored password and options
    /// when the payload leaves them out. Returns false when no such row exists.
    pub async fn update_by_id(&self, id: i64, account: &NewDbAccount) -> Result<bool, PanelError> {
        let options = account.options_json()?;
        let res = sqlx::query(
            r#"UPDATE db_accounts SET
                title = ?,
                engine = ?,
                host = ?,
                user = ?,
                password = COALESCE(?, password),
                name = ?,
                options = COALESCE(?, options),
                updated_at = ?
              WHERE id = ?"#,
        )
        .bind(&account.title)
        .bind(&account.engine)
        .bind(&account.host)
        .bind(&account.user)
        .bind(account.password.as_deref())
        .bind(&account.name)
        .bind(options)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn delete_by_id(&self, id: i64) -> Result<bool, PanelError> {
        let res = sqlx::query("DELETE FROM db_accounts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    fn row_to_model(row: SqliteRow) -> Result<DbAccount, PanelError> {
        let created_str: String = row.try_get("created_at")?;
        let updated_str: String = row.try_get("updated_at")?;

        Ok(DbAccount {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            engine: row.try_get("engine")?,
            host: row.try_get("host")?,
            user: row.try_get("user")?,
            password: row.try_get("password")?,
            name: row.try_get("name")?,
            options: row.try_get("options")?,
            created_at: parse_timestamp(&created_str)?,
            updated_at: parse_timestamp(&updated_str)?,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, PanelError> {
    let ts = DateTime::parse_from_rfc3339(raw)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
        .with_timezone(&Utc);
    Ok(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::AccountOptions;

    async fn memory_storage() -> AccountsStorage {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let storage = AccountsStorage::new(pool);
        storage.init_schema().await.unwrap();
        storage
    }

    fn new_account() -> NewDbAccount {
        NewDbAccount {
            title: "primary".into(),
            engine: "mysql".into(),
            host: "db.internal:3307".into(),
            user: "admin".into(),
            password: Some("hunter2".into()),
            name: "shop".into(),
            options: Some(AccountOptions {
                charset: Some("utf8".into()),
            }),
        }
    }

    #[tokio::test]
    async fn insert_then_fetch_round_trips_fields() {
        let storage = memory_storage().await;
        let id = storage.insert(&new_account()).await.unwrap();

        let row = storage.get_by_id(id).await.unwrap().expect("row exists");
        assert_eq!(row.id, id);
        assert_eq!(row.engine, "mysql");
        assert_eq!(row.host, "db.internal:3307");
        assert_eq!(row.password, "hunter2");
        assert_eq!(
            row.parsed_options().unwrap().charset.as_deref(),
            Some("utf8")
        );
        assert!(storage.get_by_id(id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_rows() {
        let storage = memory_storage().await;
        let id = storage.insert(&new_account()).await.unwrap();

        let mut changed = new_account();
        changed.name = "billing".into();
        changed.password = Some(String::new());
        changed.options = Some(AccountOptions::default());
        assert!(storage.update_by_id(id, &changed).await.unwrap());
        assert!(!storage.update_by_id(id + 7, &changed).await.unwrap());

        let row = storage.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(row.name, "billing");
        assert_eq!(row.password, "");
        assert_eq!(row.parsed_options().unwrap(), AccountOptions::default());

        assert_eq!(storage.list().await.unwrap().len(), 1);
        assert!(storage.delete_by_id(id).await.unwrap());
        assert!(!storage.delete_by_id(id).await.unwrap());
        assert!(storage.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn edit_without_password_keeps_stored_secret() {
        let storage = memory_storage().await;
        let id = storage.insert(&new_account()).await.unwrap();

        let fetched = storage.get_by_id(id).await.unwrap().unwrap();
        let mut edit: NewDbAccount =
            serde_json::from_value(serde_json::to_value(&fetched).unwrap()).unwrap();
        edit.host = "db.internal:3308".into();
        assert!(storage.update_by_id(id, &edit).await.unwrap());

        let row = storage.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(row.host, "db.internal:3308");
        assert_eq!(row.password, "hunter2");
        assert_eq!(
            row.parsed_options().unwrap().charset.as_deref(),
            Some("utf8")
        );

        edit.options = None;
        edit.password = None;
        assert!(storage.update_by_id(id, &edit).await.unwrap());
        let row = storage.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(row.password, "hunter2");
        assert_eq!(
            row.parsed_options().unwrap().charset.as_deref(),
            Some("utf8")
        );
    }
}
