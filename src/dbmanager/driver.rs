use crate::dbmanager::account::AuthAccount;
use crate::dbmanager::mysql::MySqlDriver;
use crate::dbmanager::sqlite::SqliteDriver;
use crate::error::PanelError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// A database engine the panel can log into.
#[async_trait]
pub trait Driver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Verify the credentials by opening (and closing) a connection.
    async fn login(&self, account: &AuthAccount) -> Result<(), PanelError>;

    async fn logout(&self, _account: &AuthAccount) -> Result<(), PanelError> {
        Ok(())
    }
}

/// Drivers by engine name. Built once at startup and shared read-only.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every driver shipped with the panel.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MySqlDriver));
        registry.register(Arc::new(SqliteDriver));
        registry
    }

    pub fn register(&mut self, driver: Arc<dyn Driver>) {
        self.drivers.insert(driver.name().to_string(), driver);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
