//! Driver-abstracted database manager.
//!
//! A [`Manager`] is built per request. It carries the credentials being
//! resolved, dispatches operations to the [`Driver`] named by the account and
//! records successful logins in the caller's session cache.

pub mod account;
pub mod driver;
pub mod mysql;
pub mod sqlite;

pub use account::{AuthAccount, AuthAccounts, CacheLookup, CacheMiss, DEFAULT_CHARSET, gen_key};
pub use driver::{Driver, DriverRegistry};

use crate::error::PanelError;
use crate::service::sessions_actor::SessionsHandle;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Operations a driver can run on behalf of the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Login,
    Logout,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Login => "login",
            Operation::Logout => "logout",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = PanelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(Operation::Login),
            "logout" => Ok(Operation::Logout),
            other => Err(PanelError::UnsupportedOperation(other.to_string())),
        }
    }
}

pub struct Manager {
    drivers: Arc<DriverRegistry>,
    sessions: SessionsHandle,
    session_id: String,
    account: AuthAccount,
}

impl Manager {
    pub fn new(
        drivers: Arc<DriverRegistry>,
        sessions: SessionsHandle,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            drivers,
            sessions,
            session_id: session_id.into(),
            account: AuthAccount::default(),
        }
    }

    pub fn account(&self) -> &AuthAccount {
        &self.account
    }

    pub fn account_mut(&mut self) -> &mut AuthAccount {
        &mut self.account
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn sessions(&self) -> &SessionsHandle {
        &self.sessions
    }

    /// Run `op` with the current credentials on the driver registered as `driver`.
    pub async fn run(&self, driver: &str, op: Operation) -> Result<(), PanelError> {
        self.account.ensure_complete()?;
        let Some(handler) = self.drivers.get(driver) else {
            warn!(driver, %op, "no driver registered");
            return Err(PanelError::UnknownDriver(driver.to_string()));
        };

        debug!(driver, %op, account_id = self.account.account_id, "running driver operation");
        let res = match op {
            Operation::Login => handler.login(&self.account).await,
            Operation::Logout => handler.logout(&self.account).await,
        };
        match &res {
            Ok(()) => info!(
                driver,
                %op,
                host = %self.account.host,
                db = %self.account.db,
                "driver operation succeeded"
            ),
            Err(e) => warn!(driver, %op, error = %e, "driver operation failed"),
        }
        res
    }

    /// Cache the current credentials in the session under `key`.
    pub async fn add_auth(&self, key: String) {
        self.sessions
            .store(&self.session_id, key, self.account.clone())
            .await;
    }
}
